use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::traits::StrategyError;

// ---------------------------------------------------------------------------
// Market Data
// ---------------------------------------------------------------------------

/// A single OHLCV bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub instrument: String,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    /// Build a bar from floating-point fields.
    ///
    /// Fails with [`StrategyError::Input`] when any field is NaN, infinite,
    /// or outside the range `Decimal` can represent.
    pub fn from_f64(
        instrument: &str,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, StrategyError> {
        Ok(Self {
            instrument: instrument.to_string(),
            timestamp,
            open: finite_decimal(open, "open")?,
            high: finite_decimal(high, "high")?,
            low: finite_decimal(low, "low")?,
            close: finite_decimal(close, "close")?,
            volume: finite_decimal(volume, "volume")?,
        })
    }

    /// Check the price fields are internally consistent.
    ///
    /// Prices and volume must be non-negative and `high` must not be below `low`.
    pub fn validate(&self) -> Result<(), StrategyError> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ];
        for (name, value) in fields {
            if value < Decimal::ZERO {
                return Err(StrategyError::Input(format!(
                    "{} is negative ({}) at {}",
                    name, value, self.timestamp
                )));
            }
        }
        if self.high < self.low {
            return Err(StrategyError::Input(format!(
                "high {} is below low {} at {}",
                self.high, self.low, self.timestamp
            )));
        }
        Ok(())
    }
}

fn finite_decimal(value: f64, field: &str) -> Result<Decimal, StrategyError> {
    if !value.is_finite() {
        return Err(StrategyError::Input(format!(
            "{} is not a finite number ({})",
            field, value
        )));
    }
    Decimal::try_from(value)
        .map_err(|e| StrategyError::Input(format!("{} cannot be represented ({}): {}", field, value, e)))
}

// ---------------------------------------------------------------------------
// Indicator State
// ---------------------------------------------------------------------------

/// Snapshot of the rolling indicator values at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorState {
    pub ema_fast: Decimal,
    pub ema_slow: Decimal,
    pub boll_middle: Decimal,
    pub boll_upper: Decimal,
    pub boll_lower: Decimal,
}

impl IndicatorState {
    /// `ema_fast - ema_slow`. Its sign change between bars marks a crossover.
    pub fn spread(&self) -> Decimal {
        self.ema_fast - self.ema_slow
    }

    /// Distance between the upper and lower band.
    pub fn bandwidth(&self) -> Decimal {
        self.boll_upper - self.boll_lower
    }
}

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

/// The discrete outcome of evaluating one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Long,
    Short,
    Flat,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Long => "long",
            SignalKind::Short => "short",
            SignalKind::Flat => "flat",
        }
    }

    /// Whether this signal asks for a position change.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, SignalKind::Flat)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trading signal emitted by a strategy for one bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub strategy_id: String,
    /// The bar this signal was computed for.
    pub bar: Bar,
    /// Indicator values after the bar was applied.
    pub indicators: IndicatorState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 11, 4, 0, 0).unwrap()
    }

    fn bar(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Bar {
        Bar {
            instrument: "XAUUSD".to_string(),
            timestamp: ts(),
            open,
            high,
            low,
            close,
            volume: dec!(10),
        }
    }

    #[test]
    fn test_from_f64_rejects_non_finite() {
        let err = Bar::from_f64("XAUUSD", ts(), 1.0, 2.0, 0.5, f64::NAN, 0.0).unwrap_err();
        assert!(matches!(err, StrategyError::Input(msg) if msg.contains("close")));

        let err = Bar::from_f64("XAUUSD", ts(), 1.0, f64::INFINITY, 0.5, 1.0, 0.0).unwrap_err();
        assert!(matches!(err, StrategyError::Input(msg) if msg.contains("high")));
    }

    #[test]
    fn test_from_f64_converts() {
        let bar = Bar::from_f64("XAUUSD", ts(), 1.5, 2.0, 1.0, 1.75, 100.0).unwrap();
        assert_eq!(bar.close, dec!(1.75));
        assert_eq!(bar.volume, dec!(100));
        assert!(bar.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let bar = bar(dec!(10), dec!(9), dec!(11), dec!(10));
        assert!(matches!(bar.validate(), Err(StrategyError::Input(_))));
    }

    #[test]
    fn test_validate_rejects_negative_price() {
        let bar = bar(dec!(10), dec!(11), dec!(9), dec!(-1));
        assert!(matches!(bar.validate(), Err(StrategyError::Input(_))));
    }

    #[test]
    fn test_signal_kind_serializes_snake_case() {
        let json = serde_json::to_string(&SignalKind::Long).unwrap();
        assert_eq!(json, "\"long\"");
        assert_eq!(SignalKind::Flat.to_string(), "flat");
        assert!(!SignalKind::Flat.is_actionable());
        assert!(SignalKind::Short.is_actionable());
    }
}
