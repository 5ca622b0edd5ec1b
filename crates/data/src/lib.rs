pub mod csv_loader;
pub mod writer;

use async_trait::async_trait;
use bandcross_core::{Bar, DataError, DataProvider};
use chrono::{DateTime, Utc};
use crate::csv_loader::is_csv_path;
use std::path::PathBuf;

/// A CSV-file-based data provider: one `<instrument>.csv` per instrument.
/// The extension matches in any case (`.CSV` from spreadsheet exports).
pub struct CsvDataProvider {
    pub directory: PathBuf,
}

impl CsvDataProvider {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Locate `<instrument>.csv`, falling back to a directory scan for an
    /// upper- or mixed-case extension.
    fn find_file(&self, instrument: &str) -> Result<Option<PathBuf>, DataError> {
        let exact = self.directory.join(format!("{}.csv", instrument));
        if exact.is_file() {
            return Ok(Some(exact));
        }
        if !self.directory.is_dir() {
            return Ok(None);
        }
        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if is_csv_path(&path) && path.file_stem().map(|s| s == instrument).unwrap_or(false) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl DataProvider for CsvDataProvider {
    async fn load_bars(
        &self,
        instrument: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, DataError> {
        let Some(file_path) = self.find_file(instrument)? else {
            return Err(DataError::NotFound(format!(
                "CSV file not found: {}",
                self.directory.join(format!("{}.csv", instrument)).display()
            )));
        };
        let bars = csv_loader::load_bars_from_csv(&file_path)?;
        let filtered: Vec<Bar> = bars
            .into_iter()
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .collect();
        tracing::debug!(instrument, bars = filtered.len(), "Filtered bars to range");
        Ok(filtered)
    }

    async fn available_instruments(&self) -> Result<Vec<String>, DataError> {
        let mut instruments = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if is_csv_path(&path) {
                if let Some(stem) = path.file_stem() {
                    instruments.push(stem.to_string_lossy().to_string());
                }
            }
        }
        instruments.sort();
        Ok(instruments)
    }
}
