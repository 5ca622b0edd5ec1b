use bandcross_core::*;
use bandcross_indicators::bollinger::BollingerBands;
use bandcross_indicators::ema::Ema;
use bandcross_indicators::{Indicator, IndicatorError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const NAME: &str = "ema_bollinger";

/// EMA crossover strategy filtered by Bollinger Band position.
///
/// Emits `Long` when the fast EMA crosses above the slow EMA while the close
/// is not above the upper band, `Short` on the downward crossover while the
/// close is not below the lower band, and `Flat` otherwise.
#[derive(Debug, Clone)]
pub struct EmaBollingerStrategy {
    id: String,
    fast_ema: Ema,
    slow_ema: Ema,
    bands: BollingerBands,
    warmup: usize,
    /// Largest close the indicators can absorb without overflow.
    max_close: Decimal,
    bars_seen: usize,
    last_timestamp: Option<DateTime<Utc>>,
    /// `ema_fast - ema_slow` at the previous accepted bar.
    prev_spread: Option<Decimal>,
    state: Option<IndicatorState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaBollingerConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    pub boll_period: usize,
    /// Band width in standard deviations.
    pub boll_k: Decimal,
}

impl Default for EmaBollingerConfig {
    fn default() -> Self {
        Self {
            fast_period: 20,
            slow_period: 50,
            boll_period: 20,
            boll_k: Decimal::TWO,
        }
    }
}

impl EmaBollingerStrategy {
    pub fn new(config: EmaBollingerConfig) -> Result<Self, StrategyError> {
        let (fast_ema, slow_ema, bands) = build_indicators(&config)?;
        let warmup = config
            .fast_period
            .max(config.slow_period)
            .max(config.boll_period);
        let max_close = fast_ema
            .max_input()
            .min(slow_ema.max_input())
            .min(bands.max_input());

        Ok(Self {
            id: format!(
                "{}_{}_{}_{}",
                NAME, config.fast_period, config.slow_period, config.boll_period
            ),
            fast_ema,
            slow_ema,
            bands,
            warmup,
            max_close,
            bars_seen: 0,
            last_timestamp: None,
            prev_spread: None,
            state: None,
        })
    }

    /// Bars needed before the first signal: `max(fast, slow, boll_period)`.
    pub fn warmup(&self) -> usize {
        self.warmup
    }

    /// Number of bars accepted since the last reset.
    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    /// Indicator values after the last accepted bar, once warm-up is complete.
    pub fn state(&self) -> Option<IndicatorState> {
        self.state
    }

    /// Feed the next bar.
    ///
    /// Returns `Ok(None)` until warm-up is complete, then exactly one signal
    /// per bar. A rejected bar does not touch the rolling state.
    pub fn update(&mut self, bar: &Bar) -> Result<Option<Signal>, StrategyError> {
        if let Some(previous) = self.last_timestamp {
            if bar.timestamp <= previous {
                return Err(StrategyError::Sequence {
                    previous,
                    current: bar.timestamp,
                });
            }
        }
        bar.validate()?;
        if bar.close > self.max_close {
            return Err(StrategyError::Input(format!(
                "close {} exceeds the supported maximum {}",
                bar.close,
                self.max_close.round_dp(0)
            )));
        }

        self.last_timestamp = Some(bar.timestamp);
        self.bars_seen += 1;

        let fast = self.fast_ema.next(bar.close);
        let slow = self.slow_ema.next(bar.close);
        let bands = self.bands.next_output(bar.close);

        let spread = match (fast, slow) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        };
        let prev_spread = self.prev_spread;
        if spread.is_some() {
            self.prev_spread = spread;
        }

        if self.bars_seen < self.warmup {
            return Ok(None);
        }
        let (Some(ema_fast), Some(ema_slow), Some(bands)) = (fast, slow, bands) else {
            return Ok(None);
        };

        let state = IndicatorState {
            ema_fast,
            ema_slow,
            boll_middle: bands.middle,
            boll_upper: bands.upper,
            boll_lower: bands.lower,
        };
        self.state = Some(state);

        let kind = classify(prev_spread, &state, bar.close);
        if kind.is_actionable() {
            debug!(
                strategy = %self.id,
                timestamp = %bar.timestamp,
                signal = %kind,
                close = %bar.close,
                ema_fast = %state.ema_fast,
                ema_slow = %state.ema_slow,
                "EMA crossover"
            );
        }

        Ok(Some(Signal {
            kind,
            strategy_id: self.id.clone(),
            bar: bar.clone(),
            indicators: state,
        }))
    }

    pub fn reset(&mut self) {
        self.fast_ema.reset();
        self.slow_ema.reset();
        self.bands.reset();
        self.bars_seen = 0;
        self.last_timestamp = None;
        self.prev_spread = None;
        self.state = None;
    }
}

fn build_indicators(
    config: &EmaBollingerConfig,
) -> Result<(Ema, Ema, BollingerBands), StrategyError> {
    let fast = Ema::new(config.fast_period).map_err(|e| named("fast_period", e))?;
    let slow = Ema::new(config.slow_period).map_err(|e| named("slow_period", e))?;
    let bands = BollingerBands::new(config.boll_period, config.boll_k).map_err(|e| match e {
        IndicatorError::ZeroPeriod { .. } => named("boll_period", e),
        IndicatorError::NonPositiveMultiplier { .. } => named("boll_k", e),
    })?;
    Ok((fast, slow, bands))
}

fn named(field: &str, e: IndicatorError) -> StrategyError {
    StrategyError::Config(format!("{}: {}", field, e))
}

/// Apply the crossover + band rule to one bar.
///
/// A zero spread counts as "not above" on the way up and "not below" on the
/// way down. A close exactly on a band passes the filter.
fn classify(prev_spread: Option<Decimal>, state: &IndicatorState, close: Decimal) -> SignalKind {
    let Some(prev) = prev_spread else {
        return SignalKind::Flat;
    };
    let spread = state.spread();

    if prev <= Decimal::ZERO && spread > Decimal::ZERO {
        if close <= state.boll_upper {
            return SignalKind::Long;
        }
        debug!(%close, upper = %state.boll_upper, "Bullish crossover above upper band, suppressed");
    } else if prev >= Decimal::ZERO && spread < Decimal::ZERO {
        if close >= state.boll_lower {
            return SignalKind::Short;
        }
        debug!(%close, lower = %state.boll_lower, "Bearish crossover below lower band, suppressed");
    }

    SignalKind::Flat
}

impl Strategy for EmaBollingerStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "EMA Crossover + Bollinger Bands"
    }

    fn warmup(&self) -> usize {
        self.warmup
    }

    fn on_bar(&mut self, bar: &Bar) -> Result<Option<Signal>, StrategyError> {
        self.update(bar)
    }

    fn reset(&mut self) {
        EmaBollingerStrategy::reset(self);
    }
}
