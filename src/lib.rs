//! # Combined Dataset Builder
//!
//! A library for merging per-category tables scraped from annual-report PDFs
//! into a single period-aligned dataset per company, with per-share
//! normalization for charting.
//!
//! ## Core Concepts
//!
//! - **Source table**: one scraped CSV per (report PDF, statement category),
//!   with a `CATEGORY, SUBCATEGORY, ITEM, NOTE` prefix and one column per
//!   reporting period
//! - **Note**: a controlled annotation per row deciding sign and inclusion
//!   (`asis`, `negated`, `excluded`, `share_count`)
//! - **Identity key**: (section, category, subcategory, item), merging the
//!   same line item across report years
//! - **Combined matrix**: the rectangular union of all tables, periods
//!   chronologically merged, with attribution rows for traceability
//! - **Per-share normalization**: every series divided by the share-count
//!   row, never silently dividing by zero
//!
//! ## Example
//!
//! ```rust,ignore
//! use combined_dataset_builder::*;
//!
//! let fy2022 = SourceTable::from_csv_path(
//!     "companies/acme/openapiscrape/fy2022/Financial.csv",
//!     "fy2022.pdf",
//!     "Financial",
//!     vec![41],
//! )?;
//! let matrix = CombinedMatrixBuilder::new().build(&[fy2022])?;
//! matrix.write_csv("companies/acme/combined.csv")?;
//!
//! let dataset = CombinedDataset::from_matrix(&matrix)?;
//! let (totals, _) = dataset.totals(SeriesKind::Finance);
//! ```
//!
//! Conflicting note annotations for the same identity key across reports
//! abort the build with the full conflict list; the caller decides how to
//! present and resolve them.

pub mod aggregate;
pub mod classify;
pub mod dataset;
pub mod error;
pub mod matrix;
pub mod metadata;
pub mod multipliers;
pub mod normalize;
pub mod numeric;
pub mod period;
pub mod table;

pub use aggregate::{aggregate, AggregatedEntity, Aggregation, EntityKey, NoteConflict};
pub use classify::{apply_sign, Classification, Note, SeriesKind};
pub use dataset::{CombinedDataset, NormalizationMode, RowSegment};
pub use error::{DatasetError, MalformedTableError, NormalizationError, Result};
pub use matrix::{CombinedMatrix, CombinedMatrixBuilder, MATRIX_METADATA_COLUMNS};
pub use metadata::{DatasetMetadata, PeriodSource, RowProvenance};
pub use multipliers::StockMultipliers;
pub use normalize::per_share;
pub use numeric::{format_numeric, parse_numeric};
pub use period::{merge_periods, parse_period_key, sort_periods};
pub use table::{normalize_header, SourceRow, SourceTable, METADATA_COLUMNS};

use log::info;

/// Merge the given source tables into a combined matrix.
///
/// Convenience wrapper over [`CombinedMatrixBuilder`] for callers without
/// column renames.
pub fn build_combined_matrix(tables: &[SourceTable]) -> Result<CombinedMatrix> {
    info!("Building combined matrix from {} source tables", tables.len());
    CombinedMatrixBuilder::new().build(tables)
}

/// Build the combined matrix together with its provenance sidecar.
pub fn build_with_metadata(tables: &[SourceTable]) -> Result<(CombinedMatrix, DatasetMetadata)> {
    let matrix = build_combined_matrix(tables)?;
    let metadata = DatasetMetadata::from_tables(tables);
    Ok((matrix, metadata))
}
