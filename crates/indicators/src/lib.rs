pub mod bollinger;
pub mod ema;
pub mod sma;

use rust_decimal::Decimal;

/// Invalid indicator parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndicatorError {
    #[error("{indicator} period must be > 0")]
    ZeroPeriod { indicator: &'static str },
    #[error("{indicator} multiplier must be positive, got {value}")]
    NonPositiveMultiplier {
        indicator: &'static str,
        value: Decimal,
    },
}

/// Trait for streaming (incremental) indicators.
/// Feed one value at a time; the indicator maintains internal state.
pub trait Indicator: Send + Sync {
    /// Process the next value and return the indicator output (if ready).
    fn next(&mut self, value: Decimal) -> Option<Decimal>;

    /// Reset the indicator to its initial state.
    fn reset(&mut self);

    /// The minimum number of data points needed before the indicator produces output.
    fn period(&self) -> usize;

    /// Whether the indicator has enough data to produce output.
    fn is_ready(&self) -> bool;
}
