use bandcross_core::{DataError, Signal, SignalKind};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// One flat output row: the bar, its indicator values, and the signal.
#[derive(Debug, Serialize)]
struct SignalRow<'a> {
    timestamp: DateTime<Utc>,
    instrument: &'a str,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
    ema_fast: Decimal,
    ema_slow: Decimal,
    boll_middle: Decimal,
    boll_upper: Decimal,
    boll_lower: Decimal,
    boll_bandwidth: Decimal,
    signal: SignalKind,
}

impl<'a> From<&'a Signal> for SignalRow<'a> {
    fn from(s: &'a Signal) -> Self {
        Self {
            timestamp: s.bar.timestamp,
            instrument: &s.bar.instrument,
            open: s.bar.open,
            high: s.bar.high,
            low: s.bar.low,
            close: s.bar.close,
            volume: s.bar.volume,
            ema_fast: s.indicators.ema_fast,
            ema_slow: s.indicators.ema_slow,
            boll_middle: s.indicators.boll_middle,
            boll_upper: s.indicators.boll_upper,
            boll_lower: s.indicators.boll_lower,
            boll_bandwidth: s.indicators.bandwidth(),
            signal: s.kind,
        }
    }
}

/// Write signals as CSV with a header row, one row per signal.
///
/// The columns carry everything a chart needs to draw price, both EMAs, the
/// bands and the entry markers.
pub fn write_signals_csv<W: Write>(writer: W, signals: &[Signal]) -> Result<(), DataError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for signal in signals {
        csv_writer
            .serialize(SignalRow::from(signal))
            .map_err(|e| DataError::IoError(e.into()))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write signals as JSON lines, one full [`Signal`] object per line.
pub fn write_signals_jsonl<W: Write>(mut writer: W, signals: &[Signal]) -> Result<(), DataError> {
    for signal in signals {
        serde_json::to_writer(&mut writer, signal).map_err(|e| DataError::IoError(e.into()))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
