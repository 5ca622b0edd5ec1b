use crate::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Strategy Trait
// ---------------------------------------------------------------------------

/// Errors raised while configuring or feeding a strategy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrategyError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Out-of-order bar: {current} is not after {previous}")]
    Sequence {
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
    #[error("Malformed bar: {0}")]
    Input(String),
    #[error("Unknown strategy '{name}' (available: {available})")]
    UnknownStrategy { name: String, available: String },
}

/// A trading strategy that evaluates bars one at a time and produces signals.
///
/// Evaluation is synchronous. Bars must be fed in strictly increasing
/// timestamp order; a rejected bar leaves the strategy state untouched.
pub trait Strategy: Send {
    /// Unique identifier for this strategy.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Number of bars needed before the first signal is produced.
    fn warmup(&self) -> usize;

    /// Called on every new bar. Returns `None` until warm-up is complete.
    fn on_bar(&mut self, bar: &Bar) -> Result<Option<Signal>, StrategyError>;

    /// Reset internal state (for replaying multiple runs).
    fn reset(&mut self);
}

// ---------------------------------------------------------------------------
// Data Provider Trait
// ---------------------------------------------------------------------------

/// Errors that can occur during data operations.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Data not found: {0}")]
    NotFound(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Provides historical bars for signal evaluation.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Load historical bars for an instrument within a date range (inclusive).
    async fn load_bars(
        &self,
        instrument: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, DataError>;

    /// List available instruments.
    async fn available_instruments(&self) -> Result<Vec<String>, DataError>;
}
