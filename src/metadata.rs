//! Provenance sidecar for a combined matrix.
//!
//! Stored as JSON next to the combined CSV, it records for every identity key
//! which source document and page supplied each period, so a reviewer can
//! jump from a plotted value back to the page it was scraped from.

use crate::error::Result;
use crate::table::SourceTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// The document and page one period value was scraped from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSource {
    pub pdf: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Provenance of one matrix row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowProvenance {
    #[serde(rename = "type")]
    pub section: String,
    pub category: String,
    pub item: String,
    pub note: String,
    pub periods: BTreeMap<String, PeriodSource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub rows: Vec<RowProvenance>,
}

impl DatasetMetadata {
    /// Derive provenance from the source tables of a build: every row of
    /// every table contributes its document (and first selected page) for
    /// each period the table covers.
    pub fn from_tables(tables: &[SourceTable]) -> Self {
        let mut by_key: BTreeMap<(String, String, String), RowProvenance> = BTreeMap::new();

        for table in tables {
            let source = PeriodSource {
                pdf: PathBuf::from(&table.document),
                page: table.pages.first().copied(),
            };
            for row in &table.rows {
                let key = (
                    table.section.clone(),
                    row.category.trim().to_string(),
                    row.item.trim().to_string(),
                );
                let provenance = by_key.entry(key.clone()).or_insert_with(|| RowProvenance {
                    section: key.0,
                    category: key.1,
                    item: key.2,
                    note: row.note.to_string(),
                    periods: BTreeMap::new(),
                });
                for (period, value) in table.periods.iter().zip(row.values.iter()) {
                    if value.trim().is_empty() {
                        continue;
                    }
                    provenance.periods.insert(period.clone(), source.clone());
                }
            }
        }

        Self {
            rows: by_key.into_values().collect(),
        }
    }

    /// Per-period sources for one identity, empty when the row is unknown.
    pub fn sources_for(
        &self,
        section: &str,
        category: &str,
        item: &str,
    ) -> BTreeMap<String, PeriodSource> {
        self.rows
            .iter()
            .find(|row| row.section == section && row.category == category && row.item == item)
            .map(|row| row.periods.clone())
            .unwrap_or_default()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let payload = serde_json::to_string_pretty(self)?;
        fs::write(path, payload)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let payload = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn sample_table() -> SourceTable {
        SourceTable::from_rows(
            "fy2022.pdf",
            "Financial",
            vec![12],
            &cells(&["CATEGORY", "SUBCATEGORY", "ITEM", "NOTE", "31.12.2022", "31.12.2021"]),
            &[cells(&["Assets", "", "Cash", "asis", "100", ""])],
        )
        .unwrap()
    }

    #[test]
    fn test_from_tables_records_covered_periods_only() {
        let metadata = DatasetMetadata::from_tables(&[sample_table()]);
        assert_eq!(metadata.rows.len(), 1);

        let sources = metadata.sources_for("Financial", "Assets", "Cash");
        assert_eq!(sources.len(), 1);
        let source = sources.get("31.12.2022").unwrap();
        assert_eq!(source.pdf, PathBuf::from("fy2022.pdf"));
        assert_eq!(source.page, Some(12));
    }

    #[test]
    fn test_unknown_row_yields_empty_sources() {
        let metadata = DatasetMetadata::from_tables(&[sample_table()]);
        assert!(metadata.sources_for("Income", "Assets", "Cash").is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("combined_metadata.json");

        let metadata = DatasetMetadata::from_tables(&[sample_table()]);
        metadata.save(&path).unwrap();

        let reloaded = DatasetMetadata::load(&path).unwrap();
        assert_eq!(reloaded.rows.len(), 1);
        assert_eq!(
            reloaded.sources_for("Financial", "Assets", "Cash"),
            metadata.sources_for("Financial", "Assets", "Cash")
        );
    }
}
