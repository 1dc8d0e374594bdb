//! Assembly of the combined rectangular matrix for one company.
//!
//! The builder merges every per-(document, category) table into one matrix:
//! metadata columns first, then the chronologically merged union of period
//! columns. Two synthetic attribution rows precede the data so every period
//! column can be traced back to its source documents and pages.

use crate::aggregate::{self, Aggregation};
use crate::error::{DatasetError, Result};
use crate::numeric::{format_numeric, parse_numeric};
use crate::period::merge_periods;
use crate::table::SourceTable;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Fixed leading columns of the combined matrix.
pub const MATRIX_METADATA_COLUMNS: [&str; 5] = ["TYPE", "CATEGORY", "SUBCATEGORY", "ITEM", "NOTE"];

/// Label used in the TYPE cell of the synthetic attribution rows.
const META_TYPE: &str = "Meta";

/// The final period-aligned dataset: an ordered header plus string rows all
/// aligned to it. Absent (entity, period) cells are empty strings, which is
/// distinct from a reported zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CombinedMatrix {
    /// Period column labels, i.e. everything after the metadata prefix.
    pub fn period_columns(&self) -> &[String] {
        self.columns
            .get(MATRIX_METADATA_COLUMNS.len()..)
            .unwrap_or_default()
    }

    /// Data rows, skipping the synthetic attribution rows.
    pub fn data_rows(&self) -> impl Iterator<Item = &Vec<String>> {
        self.rows.iter().filter(|row| row.first().map(String::as_str) != Some(META_TYPE))
    }

    fn period_column_index(&self, label: &str) -> Option<usize> {
        self.columns
            .iter()
            .enumerate()
            .skip(MATRIX_METADATA_COLUMNS.len())
            .find(|(_, c)| c.as_str() == label)
            .map(|(idx, _)| idx)
    }

    /// Sum the `source` period column element-wise into `target`, then remove
    /// `source`. Both must be recognized period columns; row alignment is
    /// preserved. Attribution cells are joined instead of summed.
    pub fn merge_column_into(&mut self, source: &str, target: &str) -> Result<()> {
        let target_idx = self
            .period_column_index(target)
            .ok_or_else(|| DatasetError::UnknownPeriodColumn(target.to_string()))?;
        let source_idx = self
            .period_column_index(source)
            .ok_or_else(|| DatasetError::UnknownPeriodColumn(source.to_string()))?;
        if source_idx == target_idx {
            return Ok(());
        }

        for row in &mut self.rows {
            let source_cell = row.get(source_idx).cloned().unwrap_or_default();
            let target_cell = row.get(target_idx).cloned().unwrap_or_default();

            let merged = if source_cell.trim().is_empty() && target_cell.trim().is_empty() {
                String::new()
            } else if row.first().map(String::as_str) == Some(META_TYPE) {
                let parts: Vec<&str> = [target_cell.trim(), source_cell.trim()]
                    .into_iter()
                    .filter(|p| !p.is_empty())
                    .collect();
                parts.join(";")
            } else {
                format_numeric(parse_numeric(&target_cell) + parse_numeric(&source_cell))
            };

            if let Some(cell) = row.get_mut(target_idx) {
                *cell = merged;
            }
            if source_idx < row.len() {
                row.remove(source_idx);
            }
        }
        self.columns.remove(source_idx);
        Ok(())
    }

    /// Write the matrix as CSV, header first.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        info!(
            "Wrote combined matrix ({} rows x {} columns) to {}",
            self.rows.len(),
            self.columns.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Read a previously written combined matrix back from CSV.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path.as_ref())?;

        let mut records = reader.records();
        let header = match records.next() {
            Some(record) => record?.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
            None => return Err(DatasetError::NoDataColumns),
        };

        let mut rows = Vec::new();
        for record in records {
            let record = record?;
            let mut cells: Vec<String> = record.iter().map(|c| c.to_string()).collect();
            cells.resize(header.len(), String::new());
            rows.push(cells);
        }
        Ok(Self {
            columns: header,
            rows,
        })
    }
}

/// Builds the combined matrix from source tables.
///
/// The builder is stateless across runs: every `build` recomputes the matrix
/// in full from the tables it is given, so repeated invocations are
/// independent and side-effect-free.
#[derive(Debug, Default)]
pub struct CombinedMatrixBuilder {
    /// Positional renames against the merged period order: index -> label.
    renames: BTreeMap<usize, String>,
}

impl CombinedMatrixBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rename the period column at `position` in the merged order. Renames
    /// affect the header only; cell alignment follows the merged order.
    pub fn rename_column(&mut self, position: usize, label: impl Into<String>) -> &mut Self {
        self.renames.insert(position, label.into());
        self
    }

    /// Merge the given tables into one combined matrix.
    ///
    /// Aborts with the full batched conflict list when the aggregation
    /// reports any note conflict; no partial matrix is produced.
    pub fn build(&self, tables: &[SourceTable]) -> Result<CombinedMatrix> {
        let mut merged_periods: Vec<String> = Vec::new();
        for table in tables {
            merged_periods = merge_periods(&merged_periods, &table.periods);
        }

        let aggregation = aggregate::aggregate(tables);
        if !aggregation.conflicts.is_empty() {
            return Err(DatasetError::NoteConflicts(aggregation.conflicts));
        }

        let mut columns: Vec<String> = MATRIX_METADATA_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .collect();
        for (position, period) in merged_periods.iter().enumerate() {
            let label = self
                .renames
                .get(&position)
                .cloned()
                .unwrap_or_else(|| period.clone());
            columns.push(label);
        }

        let mut rows = Vec::with_capacity(aggregation.entities.len() + 2);
        rows.push(attribution_row(
            "PDF source",
            &merged_periods,
            tables,
            |table| table.document.clone(),
        ));
        rows.push(attribution_row(
            "PDF pages",
            &merged_periods,
            tables,
            SourceTable::pages_label,
        ));

        for (key, entity) in &aggregation.entities {
            let mut row = vec![
                key.section.clone(),
                key.category.clone(),
                key.subcategory.clone(),
                key.item.clone(),
                entity.note.to_string(),
            ];
            for period in &merged_periods {
                let cell = entity
                    .values
                    .get(period)
                    .map(|v| format_numeric(*v))
                    .unwrap_or_default();
                row.push(cell);
            }
            rows.push(row);
        }

        info!(
            "Built combined matrix: {} entities over {} periods from {} tables",
            aggregation.entities.len(),
            merged_periods.len(),
            tables.len()
        );
        Ok(CombinedMatrix { columns, rows })
    }

    /// Run the aggregation alone, without materializing a matrix. Useful for
    /// callers that want to inspect conflicts or entity series directly.
    pub fn aggregate(&self, tables: &[SourceTable]) -> Aggregation {
        aggregate::aggregate(tables)
    }
}

fn attribution_row(
    label: &str,
    periods: &[String],
    tables: &[SourceTable],
    describe: impl Fn(&SourceTable) -> String,
) -> Vec<String> {
    let mut row = vec![
        META_TYPE.to_string(),
        label.to_string(),
        String::new(),
        String::new(),
        "excluded".to_string(),
    ];
    for period in periods {
        let mut parts: Vec<String> = Vec::new();
        for table in tables {
            if !table.periods.contains(period) {
                continue;
            }
            let description = describe(table);
            if !description.is_empty() && !parts.contains(&description) {
                parts.push(description);
            }
        }
        row.push(parts.join(";"));
    }
    row
}
