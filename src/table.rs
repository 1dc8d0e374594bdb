//! Source table ingestion: one table per (source document, category) pair.
//!
//! Tables arrive either as CSV files written by the scrape step or as
//! in-memory rows from programmatic callers. Loading validates the note
//! annotations, key uniqueness within the table, and the share-count row
//! invariants before any aggregation can see the table.

use crate::classify::Note;
use crate::error::{MalformedTableError, Result};
use crate::numeric::parse_numeric;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Fixed metadata prefix every table header must carry, in order.
pub const METADATA_COLUMNS: [&str; 4] = ["CATEGORY", "SUBCATEGORY", "ITEM", "NOTE"];

/// One financial statement line from one source table. `values` is aligned
/// with the owning table's `periods` and keeps the raw textual cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRow {
    pub category: String,
    pub subcategory: String,
    pub item: String,
    pub note: Note,
    pub values: Vec<String>,
}

impl SourceRow {
    /// Period values resolved to floats.
    pub fn numeric_values(&self) -> Vec<f64> {
        self.values.iter().map(|v| parse_numeric(v)).collect()
    }
}

/// A parsed per-(document, category) table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceTable {
    /// Source document name, e.g. `report_2023.pdf`.
    pub document: String,
    /// Statement section label this table was scraped from, e.g. `Financial`.
    pub section: String,
    /// 1-based source page numbers, for attribution rows.
    pub pages: Vec<u32>,
    /// Period column labels in the order they appear in the table.
    pub periods: Vec<String>,
    pub rows: Vec<SourceRow>,
}

/// Normalize a candidate header row.
///
/// Returns the trimmed header when the row matches the expected metadata
/// prefix case-insensitively, or when it at least leads with a `category`
/// token. Returns `None` for anything else, in which case the table is
/// treated as possibly headerless and left for the caller to decide.
pub fn normalize_header(cells: &[String]) -> Option<Vec<String>> {
    let normalized: Vec<String> = cells.iter().map(|c| c.trim().to_string()).collect();
    if normalized.iter().all(|c| c.is_empty()) {
        return None;
    }

    let prefix_len = METADATA_COLUMNS.len().min(normalized.len());
    let prefix_matches = (0..prefix_len)
        .all(|idx| normalized[idx].eq_ignore_ascii_case(METADATA_COLUMNS[idx]));
    if prefix_matches && prefix_len == METADATA_COLUMNS.len() {
        return Some(normalized);
    }

    if normalized
        .first()
        .is_some_and(|c| c.eq_ignore_ascii_case("category"))
    {
        return Some(normalized);
    }

    None
}

impl SourceTable {
    /// Build and validate a table from a header row and raw data rows.
    ///
    /// Short rows are padded with empty cells and overlong rows truncated to
    /// the header width, matching how the scrape output is tolerated.
    pub fn from_rows(
        document: impl Into<String>,
        section: impl Into<String>,
        pages: Vec<u32>,
        header: &[String],
        raw_rows: &[Vec<String>],
    ) -> Result<Self> {
        let document = document.into();
        let section = section.into();
        let table_name = format!("{}/{}", document, section);

        let header = normalize_header(header).ok_or_else(|| {
            MalformedTableError::MissingColumn {
                table: table_name.clone(),
                column: METADATA_COLUMNS[0].to_string(),
            }
        })?;
        if header.len() < METADATA_COLUMNS.len() {
            let missing = METADATA_COLUMNS[header.len()];
            return Err(MalformedTableError::MissingColumn {
                table: table_name,
                column: missing.to_string(),
            }
            .into());
        }

        let periods: Vec<String> = header[METADATA_COLUMNS.len()..].to_vec();

        let mut rows: Vec<SourceRow> = Vec::with_capacity(raw_rows.len());
        let mut seen_keys: BTreeSet<(String, String, String)> = BTreeSet::new();
        let mut share_count_seen = false;

        for (row_number, raw) in raw_rows.iter().enumerate() {
            if raw.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }

            let mut padded: Vec<String> = raw
                .iter()
                .take(header.len())
                .map(|c| c.trim().to_string())
                .collect();
            padded.resize(header.len(), String::new());

            let note_text = &padded[3];
            if note_text.is_empty() {
                return Err(MalformedTableError::MissingNote {
                    table: table_name,
                    row: row_number + 1,
                }
                .into());
            }
            let note = Note::parse(note_text).ok_or_else(|| MalformedTableError::UnsupportedNote {
                table: table_name.clone(),
                row: row_number + 1,
                note: note_text.clone(),
            })?;

            let row = SourceRow {
                category: padded[0].clone(),
                subcategory: padded[1].clone(),
                item: padded[2].clone(),
                note,
                values: padded[METADATA_COLUMNS.len()..].to_vec(),
            };

            let key = (row.category.clone(), row.subcategory.clone(), row.item.clone());
            if !seen_keys.insert(key) {
                return Err(MalformedTableError::DuplicateKey {
                    table: table_name,
                    category: row.category,
                    subcategory: row.subcategory,
                    item: row.item,
                }
                .into());
            }

            if note == Note::ShareCount {
                if share_count_seen {
                    return Err(
                        MalformedTableError::MultipleShareCountRows { table: table_name }.into(),
                    );
                }
                share_count_seen = true;
                for (period, value) in periods.iter().zip(row.values.iter()) {
                    if value.trim().is_empty() {
                        return Err(MalformedTableError::MissingShareCountValue {
                            table: table_name,
                            period: period.clone(),
                        }
                        .into());
                    }
                    if parse_numeric(value) == 0.0 {
                        return Err(MalformedTableError::InvalidShareCountValue {
                            table: table_name,
                            period: period.clone(),
                        }
                        .into());
                    }
                }
            }

            rows.push(row);
        }

        debug!(
            "Loaded table {} with {} rows over {} periods",
            table_name,
            rows.len(),
            periods.len()
        );

        Ok(Self {
            document,
            section,
            pages,
            periods,
            rows,
        })
    }

    /// Load a table from a CSV file written by the scrape step.
    pub fn from_csv_path(
        path: impl AsRef<Path>,
        document: impl Into<String>,
        section: impl Into<String>,
        pages: Vec<u32>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;

        let mut header: Option<Vec<String>> = None;
        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record?;
            let cells: Vec<String> = record.iter().map(|c| c.to_string()).collect();
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            if header.is_none() {
                header = Some(cells);
            } else {
                rows.push(cells);
            }
        }

        let document = document.into();
        let section = section.into();
        info!(
            "Reading source table {} ({}) from {}",
            document,
            section,
            path.display()
        );

        let header = header.unwrap_or_default();
        Self::from_rows(document, section, pages, &header, &rows)
    }

    /// The per-period share-count divisor series for this table, when a
    /// share-count row is present.
    pub fn share_counts(&self) -> Option<BTreeMap<String, f64>> {
        let row = self.rows.iter().find(|r| r.note == Note::ShareCount)?;
        Some(
            self.periods
                .iter()
                .cloned()
                .zip(row.numeric_values())
                .collect(),
        )
    }

    /// Source pages rendered for the attribution row, 1-based and
    /// semicolon-joined.
    pub fn pages_label(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(";")
    }
}
