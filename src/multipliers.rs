//! The dataset-level stock multiplier file.
//!
//! A two-column CSV `Date, Stock Multiplier` keyed by period label. Periods
//! without an explicit entry default to a multiplier of 1, so a missing or
//! sparse file never blocks a build.

use crate::error::Result;
use crate::period::sort_periods;
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::Path;

const HEADER: [&str; 2] = ["Date", "Stock Multiplier"];

#[derive(Debug, Clone, Default)]
pub struct StockMultipliers {
    entries: BTreeMap<String, f64>,
}

impl StockMultipliers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, period: impl Into<String>, multiplier: f64) {
        self.entries.insert(period.into(), multiplier);
    }

    /// Multiplier for a period, defaulting to 1 when no entry exists.
    pub fn get(&self, period: &str) -> f64 {
        self.entries.get(period).copied().unwrap_or(1.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load multipliers from CSV. Rows with an empty date or a non-numeric
    /// multiplier are skipped with a warning rather than failing the load.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)?;

        let mut entries = BTreeMap::new();
        for record in reader.records() {
            let record = record?;
            let date = record.get(0).unwrap_or("").trim().to_string();
            if date.is_empty() {
                continue;
            }
            let raw = record.get(1).unwrap_or("").trim();
            match raw.parse::<f64>() {
                Ok(multiplier) => {
                    entries.insert(date, multiplier);
                }
                Err(_) => {
                    warn!(
                        "Skipping stock multiplier for '{}': unparseable value '{}'",
                        date, raw
                    );
                }
            }
        }

        info!(
            "Loaded {} stock multipliers from {}",
            entries.len(),
            path.display()
        );
        Ok(Self { entries })
    }

    /// Write the entries back out as `Date, Stock Multiplier` CSV.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.write_record(HEADER)?;
        for (date, multiplier) in &self.entries {
            writer.write_record([date.as_str(), &multiplier.to_string()])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Generate a fresh multiplier file listing the given periods in
    /// chronological order, all defaulted to 1.
    pub fn generate_default(path: impl AsRef<Path>, periods: &[String]) -> Result<Self> {
        let mut sorted = periods.to_vec();
        sort_periods(&mut sorted);

        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.write_record(HEADER)?;
        let mut entries = BTreeMap::new();
        for period in &sorted {
            writer.write_record([period.as_str(), "1"])?;
            entries.insert(period.clone(), 1.0);
        }
        writer.flush()?;

        info!(
            "Generated stock multiplier file with {} dates at {}",
            sorted.len(),
            path.as_ref().display()
        );
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_multiplier_is_one() {
        let multipliers = StockMultipliers::new();
        assert_eq!(multipliers.get("31.12.2021"), 1.0);
    }

    #[test]
    fn test_load_and_lookup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stock_multipliers.csv");
        fs::write(
            &path,
            "Date,Stock Multiplier\n30.06.2020,2\n30.06.2021,0.5\n,9\n30.06.2022,abc\n",
        )
        .unwrap();

        let multipliers = StockMultipliers::load(&path).unwrap();
        assert_eq!(multipliers.len(), 2);
        assert_eq!(multipliers.get("30.06.2020"), 2.0);
        assert_eq!(multipliers.get("30.06.2021"), 0.5);
        // Unlisted and skipped rows fall back to 1.
        assert_eq!(multipliers.get("30.06.2022"), 1.0);
    }

    #[test]
    fn test_generate_default_sorted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stock_multipliers.csv");
        let periods = vec!["30.06.2022".to_string(), "30.06.2020".to_string()];

        let multipliers = StockMultipliers::generate_default(&path, &periods).unwrap();
        assert_eq!(multipliers.len(), 2);

        let written = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "Date,Stock Multiplier");
        assert_eq!(lines[1], "30.06.2020,1");
        assert_eq!(lines[2], "30.06.2022,1");
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stock_multipliers.csv");

        let mut multipliers = StockMultipliers::new();
        multipliers.insert("31.12.2021", 4.0);
        multipliers.save(&path).unwrap();

        let reloaded = StockMultipliers::load(&path).unwrap();
        assert_eq!(reloaded.get("31.12.2021"), 4.0);
    }
}
