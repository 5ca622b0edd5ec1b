use bandcross_core::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::summary::{self, RunSummary};

/// What the driver does when the strategy rejects a bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the run and return the error.
    #[default]
    Abort,
    /// Record the bar as rejected and continue with the next one.
    Skip,
}

/// A bar the strategy refused, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedBar {
    /// Position in the input sequence.
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Output of a replay run.
#[derive(Debug, Clone)]
pub struct SignalRun {
    pub strategy_id: String,
    pub instrument: String,
    pub signals: Vec<Signal>,
    pub rejected: Vec<RejectedBar>,
    pub summary: RunSummary,
}

/// Replay bars through a strategy in order and collect its signals.
///
/// The strategy is reset first, so the same strategy can be replayed over
/// several runs.
pub fn run_signals(
    bars: &[Bar],
    strategy: &mut dyn Strategy,
    policy: ErrorPolicy,
) -> Result<SignalRun, StrategyError> {
    strategy.reset();

    let instrument = bars
        .first()
        .map(|b| b.instrument.clone())
        .unwrap_or_else(|| "unknown".to_string());

    info!(
        strategy = %strategy.id(),
        instrument = %instrument,
        bars = bars.len(),
        warmup = strategy.warmup(),
        ?policy,
        "Starting signal run"
    );

    let mut signals = Vec::with_capacity(bars.len().saturating_sub(strategy.warmup()));
    let mut rejected = Vec::new();
    let mut warmup_bars = 0;

    for (index, bar) in bars.iter().enumerate() {
        match strategy.on_bar(bar) {
            Ok(Some(signal)) => signals.push(signal),
            Ok(None) => warmup_bars += 1,
            Err(e) => match policy {
                ErrorPolicy::Abort => {
                    warn!(index, timestamp = %bar.timestamp, error = %e, "Bar rejected, aborting run");
                    return Err(e);
                }
                ErrorPolicy::Skip => {
                    warn!(index, timestamp = %bar.timestamp, error = %e, "Bar rejected, skipping");
                    rejected.push(RejectedBar {
                        index,
                        timestamp: bar.timestamp,
                        reason: e.to_string(),
                    });
                }
            },
        }
    }

    let summary = summary::summarize(bars, warmup_bars, &signals, &rejected);

    info!(
        strategy = %strategy.id(),
        signals = summary.signals,
        longs = summary.longs,
        shorts = summary.shorts,
        rejected = summary.rejected,
        "Signal run complete"
    );

    Ok(SignalRun {
        strategy_id: strategy.id().to_string(),
        instrument,
        signals,
        rejected,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bandcross_strategies::ema_bollinger::{EmaBollingerConfig, EmaBollingerStrategy};
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn bars(closes: &[Decimal]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| Bar {
                instrument: "GC".to_string(),
                timestamp: start + Duration::hours(i as i64),
                open: *c,
                high: *c,
                low: *c,
                close: *c,
                volume: Decimal::ZERO,
            })
            .collect()
    }

    fn strategy() -> EmaBollingerStrategy {
        EmaBollingerStrategy::new(EmaBollingerConfig {
            fast_period: 2,
            slow_period: 4,
            boll_period: 3,
            boll_k: Decimal::TWO,
        })
        .unwrap()
    }

    fn closes() -> Vec<Decimal> {
        vec![
            dec!(10),
            dec!(10),
            dec!(10),
            dec!(9),
            dec!(8),
            dec!(7),
            dec!(8),
            dec!(9),
            dec!(10),
            dec!(11),
            dec!(12),
        ]
    }

    #[test]
    fn test_run_collects_signals_after_warmup() {
        let input = bars(&closes());
        let mut strategy = strategy();
        let run = run_signals(&input, &mut strategy, ErrorPolicy::Abort).unwrap();

        assert_eq!(run.strategy_id, "ema_bollinger_2_4_3");
        assert_eq!(run.instrument, "GC");
        assert_eq!(run.signals.len(), 8);
        assert_eq!(run.signals[0].bar.timestamp, input[3].timestamp);
        assert!(run.rejected.is_empty());

        let summary = &run.summary;
        assert_eq!(summary.bars, 11);
        assert_eq!(summary.warmup_bars, 3);
        assert_eq!(summary.longs, 1);
        assert_eq!(summary.shorts, 0);
        assert_eq!(summary.flats, 7);
        assert_eq!(summary.start, Some(input[0].timestamp));
        assert_eq!(summary.end, Some(input[10].timestamp));
    }

    #[test]
    fn test_rerun_resets_strategy() {
        let input = bars(&closes());
        let mut strategy = strategy();
        let first = run_signals(&input, &mut strategy, ErrorPolicy::Abort).unwrap();
        let second = run_signals(&input, &mut strategy, ErrorPolicy::Abort).unwrap();
        assert_eq!(first.signals, second.signals);
        assert_eq!(first.summary, second.summary);
    }

    #[test]
    fn test_abort_policy_returns_first_error() {
        let mut input = bars(&closes());
        input[5].timestamp = input[4].timestamp;
        let mut strategy = strategy();
        let err = run_signals(&input, &mut strategy, ErrorPolicy::Abort).unwrap_err();
        assert!(matches!(err, StrategyError::Sequence { .. }));
    }

    #[test]
    fn test_skip_policy_records_rejected_bars() {
        let mut input = bars(&closes());
        input[5].timestamp = input[4].timestamp;
        input[7].low = dec!(100);
        let mut strategy = strategy();
        let run = run_signals(&input, &mut strategy, ErrorPolicy::Skip).unwrap();

        let indices: Vec<usize> = run.rejected.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![5, 7]);
        assert!(run.rejected[0].reason.starts_with("Out-of-order bar"));
        assert!(run.rejected[1].reason.starts_with("Malformed bar"));
        assert_eq!(run.summary.rejected, 2);
        assert_eq!(run.signals.len() + run.summary.warmup_bars + 2, input.len());
    }

    #[test]
    fn test_empty_input() {
        let mut strategy = strategy();
        let run = run_signals(&[], &mut strategy, ErrorPolicy::Abort).unwrap();
        assert_eq!(run.instrument, "unknown");
        assert!(run.signals.is_empty());
        assert_eq!(run.summary.start, None);
    }
}
