use bandcross_core::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::runner::RejectedBar;

/// Aggregate counts from one replay run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Bars offered to the strategy, including rejected ones.
    pub bars: usize,
    /// Accepted bars that produced no signal (insufficient history).
    pub warmup_bars: usize,
    pub signals: usize,
    pub longs: usize,
    pub shorts: usize,
    pub flats: usize,
    pub rejected: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Compute the run summary from the input and what the strategy produced.
pub fn summarize(
    bars: &[Bar],
    warmup_bars: usize,
    signals: &[Signal],
    rejected: &[RejectedBar],
) -> RunSummary {
    let count = |kind: SignalKind| signals.iter().filter(|s| s.kind == kind).count();

    RunSummary {
        bars: bars.len(),
        warmup_bars,
        signals: signals.len(),
        longs: count(SignalKind::Long),
        shorts: count(SignalKind::Short),
        flats: count(SignalKind::Flat),
        rejected: rejected.len(),
        start: bars.first().map(|b| b.timestamp),
        end: bars.last().map(|b| b.timestamp),
    }
}
