use bandcross_core::{Bar, DataError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Load OHLCV bars from a CSV file.
///
/// The instrument name is taken from the file stem. See
/// [`load_bars_from_reader`] for the accepted layout.
pub fn load_bars_from_csv(path: &Path) -> Result<Vec<Bar>, DataError> {
    let instrument = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let reader = reader_builder()
        .from_path(path)
        .map_err(|e| DataError::ParseError(format!("Failed to open CSV {}: {}", path.display(), e)))?;

    let bars = read_bars(reader, &instrument)?;
    debug!(path = %path.display(), bars = bars.len(), "Loaded bars from CSV");
    Ok(bars)
}

/// Whether a path names a CSV file, matching the extension in any case.
pub fn is_csv_path(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Load OHLCV bars from any CSV source.
///
/// Expected columns (case-insensitive, flexible ordering):
/// `timestamp` (or `date`, `datetime`, `time`), `open`, `high`, `low`, `close`,
/// and optionally `volume` (zero when absent). Extra columns are ignored.
///
/// Bars are returned sorted by timestamp. The sort is stable and keeps
/// duplicates, so a repeated timestamp still reaches the strategy's sequence
/// check.
pub fn load_bars_from_reader<R: Read>(source: R, instrument: &str) -> Result<Vec<Bar>, DataError> {
    read_bars(reader_builder().from_reader(source), instrument)
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.flexible(true).trim(csv::Trim::All);
    builder
}

fn read_bars<R: Read>(mut reader: csv::Reader<R>, instrument: &str) -> Result<Vec<Bar>, DataError> {
    let headers = reader
        .headers()
        .map_err(|e| DataError::ParseError(format!("Failed to read headers: {}", e)))?
        .clone();

    let col_map = resolve_bar_columns(&headers)?;

    let mut bars = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| DataError::ParseError(format!("CSV record error: {}", e)))?;
        // Header is line 1.
        let line = row + 2;

        let timestamp = parse_timestamp(field(&record, col_map.timestamp, "timestamp", line)?)?;
        let open = parse_decimal(field(&record, col_map.open, "open", line)?, "open", line)?;
        let high = parse_decimal(field(&record, col_map.high, "high", line)?, "high", line)?;
        let low = parse_decimal(field(&record, col_map.low, "low", line)?, "low", line)?;
        let close = parse_decimal(field(&record, col_map.close, "close", line)?, "close", line)?;
        let volume = match col_map.volume {
            Some(idx) => parse_decimal(field(&record, idx, "volume", line)?, "volume", line)?,
            None => Decimal::ZERO,
        };

        bars.push(Bar {
            instrument: instrument.to_string(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

struct BarColumnMap {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

fn resolve_bar_columns(headers: &csv::StringRecord) -> Result<BarColumnMap, DataError> {
    let ts = find_column(headers, &["timestamp", "date", "datetime", "time"])
        .ok_or_else(|| DataError::ParseError("No timestamp column found".into()))?;
    let open = find_column(headers, &["open", "o"])
        .ok_or_else(|| DataError::ParseError("No open column found".into()))?;
    let high = find_column(headers, &["high", "h"])
        .ok_or_else(|| DataError::ParseError("No high column found".into()))?;
    let low = find_column(headers, &["low", "l"])
        .ok_or_else(|| DataError::ParseError("No low column found".into()))?;
    let close = find_column(headers, &["close", "c"])
        .ok_or_else(|| DataError::ParseError("No close column found".into()))?;
    let volume = find_column(headers, &["volume", "vol", "v"]);

    Ok(BarColumnMap {
        timestamp: ts,
        open,
        high,
        low,
        close,
        volume,
    })
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let h = header.trim().to_lowercase();
        names.iter().any(|name| h == *name)
    })
}

fn field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    name: &str,
    line: usize,
) -> Result<&'r str, DataError> {
    match record.get(idx) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(DataError::ParseError(format!(
            "Missing {} value on line {}",
            name, line
        ))),
    }
}

fn parse_decimal(s: &str, field: &str, line: usize) -> Result<Decimal, DataError> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|e| {
            DataError::ParseError(format!(
                "Failed to parse {} '{}' on line {}: {}",
                field, s, line, e
            ))
        })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DataError> {
    let s = s.trim();

    // Try RFC 3339 / ISO 8601 with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Common formats (without timezone, assume UTC)
    let formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%Y%m%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }

    // yfinance writes offsets like "2024-06-11 04:00:00+00:00"
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::default()).and_utc());
    }

    // Unix timestamp (seconds)
    if let Ok(ts) = s.parse::<i64>() {
        if let Some(dt) = DateTime::from_timestamp(ts, 0) {
            return Ok(dt);
        }
    }

    Err(DataError::ParseError(format!(
        "Unable to parse timestamp: '{}'",
        s
    )))
}
