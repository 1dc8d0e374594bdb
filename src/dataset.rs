//! Chart-ready view over a combined matrix.
//!
//! Loads a combined matrix (in memory or from its CSV) into Finance and
//! Income Statement series with the note state machine applied: negated rows
//! sign-flipped, excluded and all-zero rows dropped, the share-count row
//! captured as the per-period divisor. Periods are reordered chronologically
//! regardless of column order in the file.

use crate::classify::{Note, SeriesKind};
use crate::error::{DatasetError, MalformedTableError, Result};
use crate::matrix::{CombinedMatrix, MATRIX_METADATA_COLUMNS};
use crate::metadata::{DatasetMetadata, PeriodSource};
use crate::normalize;
use crate::numeric::parse_numeric;
use crate::period::sort_periods;
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::Path;

/// How segment values are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizationMode {
    /// Absolute values as reported.
    Reported,
    /// Values divided by the per-period share count.
    #[default]
    PerShare,
}

/// One plotted line item, values aligned with the dataset's period order.
#[derive(Debug, Clone)]
pub struct RowSegment {
    pub kind: SeriesKind,
    pub section: String,
    pub category: String,
    pub subcategory: String,
    pub item: String,
    pub note: Note,
    /// Sign-applied reported values.
    raw_values: Vec<f64>,
    /// Values under the current normalization mode.
    pub values: Vec<f64>,
    /// Per-period source documents, populated from the metadata sidecar.
    pub sources: BTreeMap<String, PeriodSource>,
}

impl RowSegment {
    /// Stable key for colors/legends, mirroring the matrix identity.
    pub fn key(&self) -> String {
        [&self.section, &self.category, &self.subcategory, &self.item]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn reported_values(&self) -> &[f64] {
        &self.raw_values
    }
}

/// All series of one company's combined matrix.
#[derive(Debug, Clone)]
pub struct CombinedDataset {
    pub periods: Vec<String>,
    pub finance_segments: Vec<RowSegment>,
    pub income_segments: Vec<RowSegment>,
    pub share_counts: Vec<f64>,
    mode: NormalizationMode,
}

impl CombinedDataset {
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let matrix = CombinedMatrix::read_csv(path.as_ref())?;
        info!("Loading combined dataset from {}", path.as_ref().display());
        Self::from_matrix(&matrix)
    }

    /// Build the dataset from a combined matrix.
    ///
    /// Requires exactly one share-count row with a nonzero value in every
    /// period; the default normalization mode is per-share.
    pub fn from_matrix(matrix: &CombinedMatrix) -> Result<Self> {
        let column_index = |name: &str| -> Result<usize> {
            matrix
                .columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(name))
                .ok_or_else(|| DatasetError::MissingMatrixColumn(name.to_string()))
        };
        let type_idx = column_index("TYPE")?;
        let category_idx = column_index("CATEGORY")?;
        let subcategory_idx = matrix
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case("SUBCATEGORY"));
        let item_idx = column_index("ITEM")?;
        let note_idx = column_index("NOTE")?;

        // Period columns are whatever the header carries beyond the known
        // metadata names, wherever they sit. A combined file written without
        // a SUBCATEGORY column must still load with every period intact.
        let period_indices: Vec<usize> = (0..matrix.columns.len())
            .filter(|&idx| {
                !MATRIX_METADATA_COLUMNS
                    .iter()
                    .any(|name| matrix.columns[idx].eq_ignore_ascii_case(name))
            })
            .collect();
        let periods: Vec<String> = period_indices
            .iter()
            .map(|&idx| matrix.columns[idx].clone())
            .collect();
        if periods.is_empty() {
            return Err(DatasetError::NoDataColumns);
        }

        let mut finance_segments = Vec::new();
        let mut income_segments = Vec::new();
        let mut share_counts: Option<(Vec<f64>, Vec<String>)> = None;

        for (row_number, row) in matrix.rows.iter().enumerate() {
            let cell = |idx: usize| row.get(idx).map(String::as_str).unwrap_or("").trim();

            let note_text = cell(note_idx);
            if note_text.is_empty() {
                return Err(MalformedTableError::MissingNote {
                    table: "combined".to_string(),
                    row: row_number + 1,
                }
                .into());
            }
            let note =
                Note::parse(note_text).ok_or_else(|| MalformedTableError::UnsupportedNote {
                    table: "combined".to_string(),
                    row: row_number + 1,
                    note: note_text.to_string(),
                })?;

            let values: Vec<f64> = period_indices
                .iter()
                .map(|&idx| parse_numeric(cell(idx)))
                .collect();

            if note == Note::ShareCount {
                if share_counts.is_some() {
                    return Err(DatasetError::MultipleShareCountRows);
                }
                let raw_cells: Vec<String> = period_indices
                    .iter()
                    .map(|&idx| cell(idx).to_string())
                    .collect();
                share_counts = Some((values, raw_cells));
                continue;
            }

            if values.iter().all(|v| *v == 0.0) {
                continue;
            }
            if note == Note::Excluded {
                continue;
            }

            let Some(kind) = SeriesKind::from_section(cell(type_idx)) else {
                // Other sections (Meta, Shares, ...) carry no plotted series.
                continue;
            };

            let raw_values = crate::classify::apply_sign(&values, note);

            let segment = RowSegment {
                kind,
                section: cell(type_idx).to_string(),
                category: cell(category_idx).to_string(),
                subcategory: subcategory_idx
                    .map(|idx| cell(idx).to_string())
                    .unwrap_or_default(),
                item: cell(item_idx).to_string(),
                note,
                values: raw_values.clone(),
                raw_values,
                sources: BTreeMap::new(),
            };
            match kind {
                SeriesKind::Finance => finance_segments.push(segment),
                SeriesKind::IncomeStatement => income_segments.push(segment),
            }
        }

        let (share_counts, share_cells) =
            share_counts.ok_or(DatasetError::MissingShareCountRow)?;
        for ((period, count), raw) in periods.iter().zip(share_counts.iter()).zip(&share_cells) {
            if raw.trim().is_empty() {
                return Err(MalformedTableError::MissingShareCountValue {
                    table: "combined".to_string(),
                    period: period.clone(),
                }
                .into());
            }
            if *count == 0.0 {
                return Err(MalformedTableError::InvalidShareCountValue {
                    table: "combined".to_string(),
                    period: period.clone(),
                }
                .into());
            }
        }

        let mut dataset = Self {
            periods,
            finance_segments,
            income_segments,
            share_counts,
            mode: NormalizationMode::Reported,
        };
        dataset.reorder_chronologically();
        dataset.set_normalization_mode(NormalizationMode::PerShare)?;
        Ok(dataset)
    }

    /// Reorder periods chronologically and realign every series and the
    /// share-count row with the new order.
    fn reorder_chronologically(&mut self) {
        let mut sorted = self.periods.clone();
        sort_periods(&mut sorted);
        if sorted == self.periods {
            return;
        }

        let indices: Vec<usize> = sorted
            .iter()
            .map(|label| {
                self.periods
                    .iter()
                    .position(|p| p == label)
                    .unwrap_or_default()
            })
            .collect();

        let reorder = |values: &[f64]| -> Vec<f64> {
            indices.iter().map(|idx| values[*idx]).collect()
        };
        self.share_counts = reorder(&self.share_counts);
        for segment in self
            .finance_segments
            .iter_mut()
            .chain(self.income_segments.iter_mut())
        {
            segment.raw_values = reorder(&segment.raw_values);
            segment.values = reorder(&segment.values);
        }
        debug!("Reordered periods chronologically: {:?}", sorted);
        self.periods = sorted;
    }

    pub fn normalization_mode(&self) -> NormalizationMode {
        self.mode
    }

    /// Switch every segment's `values` between reported and per-share.
    pub fn set_normalization_mode(&mut self, mode: NormalizationMode) -> Result<()> {
        let share_map: BTreeMap<String, f64> = self
            .periods
            .iter()
            .cloned()
            .zip(self.share_counts.iter().copied())
            .collect();

        let periods = self.periods.clone();
        for segment in self
            .finance_segments
            .iter_mut()
            .chain(self.income_segments.iter_mut())
        {
            match mode {
                NormalizationMode::Reported => {
                    segment.values = segment.raw_values.clone();
                }
                NormalizationMode::PerShare => {
                    let value_map: BTreeMap<String, f64> = periods
                        .iter()
                        .cloned()
                        .zip(segment.raw_values.iter().copied())
                        .collect();
                    let normalized = normalize::per_share(&value_map, &share_map)?;
                    segment.values = periods
                        .iter()
                        .map(|p| normalized.get(p).copied().unwrap_or(0.0))
                        .collect();
                }
            }
        }
        self.mode = mode;
        Ok(())
    }

    /// Element-wise totals of one series under the current mode, plus a flag
    /// for whether any segment contributed a nonzero value to the period.
    pub fn totals(&self, kind: SeriesKind) -> (Vec<f64>, Vec<bool>) {
        let segments = match kind {
            SeriesKind::Finance => &self.finance_segments,
            SeriesKind::IncomeStatement => &self.income_segments,
        };

        let mut totals = vec![0.0; self.periods.len()];
        let mut has_data = vec![false; self.periods.len()];
        for segment in segments {
            for (idx, value) in segment.values.iter().enumerate() {
                totals[idx] += value;
                if value.abs() > 1e-9 {
                    has_data[idx] = true;
                }
            }
        }
        (totals, has_data)
    }

    /// Attach per-period source documents from the metadata sidecar.
    pub fn attach_metadata(&mut self, metadata: &DatasetMetadata) {
        for segment in self
            .finance_segments
            .iter_mut()
            .chain(self.income_segments.iter_mut())
        {
            segment.sources =
                metadata.sources_for(&segment.section, &segment.category, &segment.item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::CombinedMatrix;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn sample_matrix() -> CombinedMatrix {
        CombinedMatrix {
            columns: cells(&[
                "TYPE",
                "CATEGORY",
                "SUBCATEGORY",
                "ITEM",
                "NOTE",
                "31.12.2022",
                "31.12.2021",
            ]),
            rows: vec![
                cells(&["Meta", "PDF source", "", "", "excluded", "b.pdf", "a.pdf"]),
                cells(&["Financial", "Assets", "", "Cash", "asis", "200", "100"]),
                cells(&["Financial", "Liabilities", "", "Loans", "negated", "50", "40"]),
                cells(&["Income", "Revenue", "", "Sales", "asis", "80", "60"]),
                cells(&["Income", "Noise", "", "Rounding", "excluded", "1", "1"]),
                cells(&["Income", "Empty", "", "Dormant", "asis", "0", "0"]),
                cells(&["Shares", "Shares", "", "Issued", "share_count", "20", "10"]),
            ],
        }
    }

    #[test]
    fn test_load_classifies_and_sorts() {
        let dataset = CombinedDataset::from_matrix(&sample_matrix()).unwrap();
        // Periods reordered chronologically.
        assert_eq!(dataset.periods, cells(&["31.12.2021", "31.12.2022"]));
        assert_eq!(dataset.share_counts, vec![10.0, 20.0]);

        // Excluded, all-zero, and Meta rows never become segments.
        assert_eq!(dataset.finance_segments.len(), 2);
        assert_eq!(dataset.income_segments.len(), 1);
    }

    #[test]
    fn test_default_mode_is_per_share() {
        let dataset = CombinedDataset::from_matrix(&sample_matrix()).unwrap();
        let cash = &dataset.finance_segments[0];
        assert_eq!(cash.item, "Cash");
        assert_eq!(cash.values, vec![10.0, 10.0]);
        // Negated row: sign applied before normalization.
        let loans = &dataset.finance_segments[1];
        assert_eq!(loans.values, vec![-4.0, -2.5]);
    }

    #[test]
    fn test_reported_mode_restores_raw_values() {
        let mut dataset = CombinedDataset::from_matrix(&sample_matrix()).unwrap();
        dataset
            .set_normalization_mode(NormalizationMode::Reported)
            .unwrap();
        let cash = &dataset.finance_segments[0];
        assert_eq!(cash.values, vec![100.0, 200.0]);
        assert_eq!(cash.reported_values(), &[100.0, 200.0]);
    }

    #[test]
    fn test_missing_share_count_row_errors() {
        let mut matrix = sample_matrix();
        matrix.rows.pop();
        let err = CombinedDataset::from_matrix(&matrix).unwrap_err();
        assert!(matches!(err, DatasetError::MissingShareCountRow));
    }

    #[test]
    fn test_multiple_share_count_rows_error() {
        let mut matrix = sample_matrix();
        matrix.rows.push(cells(&[
            "Shares",
            "Shares",
            "",
            "Diluted",
            "share_count",
            "22",
            "11",
        ]));
        let err = CombinedDataset::from_matrix(&matrix).unwrap_err();
        assert!(matches!(err, DatasetError::MultipleShareCountRows));
    }

    #[test]
    fn test_matrix_without_subcategory_column_keeps_all_periods() {
        let matrix = CombinedMatrix {
            columns: cells(&["TYPE", "CATEGORY", "ITEM", "NOTE", "31.12.2021", "31.12.2022"]),
            rows: vec![
                cells(&["Financial", "Assets", "Cash", "asis", "100", "200"]),
                cells(&["Shares", "Shares", "Issued", "share_count", "10", "20"]),
            ],
        };

        let dataset = CombinedDataset::from_matrix(&matrix).unwrap();
        assert_eq!(dataset.periods, cells(&["31.12.2021", "31.12.2022"]));
        assert_eq!(dataset.share_counts, vec![10.0, 20.0]);

        let cash = &dataset.finance_segments[0];
        assert_eq!(cash.subcategory, "");
        assert_eq!(cash.reported_values(), &[100.0, 200.0]);
    }

    #[test]
    fn test_matrix_without_period_columns_is_an_error() {
        let matrix = CombinedMatrix {
            columns: cells(&["TYPE", "CATEGORY", "ITEM", "NOTE"]),
            rows: vec![],
        };
        let err = CombinedDataset::from_matrix(&matrix).unwrap_err();
        assert!(matches!(err, DatasetError::NoDataColumns));
    }

    #[test]
    fn test_empty_share_count_cell_reports_missing_not_zero() {
        let mut matrix = sample_matrix();
        let last = matrix.rows.last_mut().unwrap();
        last[6] = "".to_string();
        let err = CombinedDataset::from_matrix(&matrix).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::MalformedTable(MalformedTableError::MissingShareCountValue {
                ref period,
                ..
            }) if period == "31.12.2021"
        ));
    }

    #[test]
    fn test_zero_share_count_errors() {
        let mut matrix = sample_matrix();
        let last = matrix.rows.last_mut().unwrap();
        last[6] = "0".to_string();
        let err = CombinedDataset::from_matrix(&matrix).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::MalformedTable(MalformedTableError::InvalidShareCountValue { .. })
        ));
    }

    #[test]
    fn test_unsupported_note_is_hard_error() {
        let mut matrix = sample_matrix();
        matrix.rows[1][4] = "maybe".to_string();
        let err = CombinedDataset::from_matrix(&matrix).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::MalformedTable(MalformedTableError::UnsupportedNote { .. })
        ));
    }

    #[test]
    fn test_totals_per_series() {
        let mut dataset = CombinedDataset::from_matrix(&sample_matrix()).unwrap();
        dataset
            .set_normalization_mode(NormalizationMode::Reported)
            .unwrap();
        let (totals, has_data) = dataset.totals(SeriesKind::Finance);
        // Cash minus negated loans.
        assert_eq!(totals, vec![100.0 - 40.0, 200.0 - 50.0]);
        assert_eq!(has_data, vec![true, true]);
    }
}
