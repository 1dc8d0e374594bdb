use crate::aggregate::NoteConflict;
use thiserror::Error;

/// A structural problem in a single source table. Fatal to that table's load
/// only; other tables in the same run are unaffected.
#[derive(Error, Debug)]
pub enum MalformedTableError {
    #[error("Table '{table}' is missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("Table '{table}' row {row} has unsupported note value '{note}'")]
    UnsupportedNote {
        table: String,
        row: usize,
        note: String,
    },

    #[error("Table '{table}' row {row} is missing a note value")]
    MissingNote { table: String, row: usize },

    #[error(
        "Table '{table}' contains duplicate CATEGORY/SUBCATEGORY/ITEM entry \
         ('{category}', '{subcategory}', '{item}')"
    )]
    DuplicateKey {
        table: String,
        category: String,
        subcategory: String,
        item: String,
    },

    #[error("Table '{table}' contains multiple share_count rows")]
    MultipleShareCountRows { table: String },

    #[error("Table '{table}' share_count value for period '{period}' is zero")]
    InvalidShareCountValue { table: String, period: String },

    #[error("Table '{table}' share_count row has no value for period '{period}'")]
    MissingShareCountValue { table: String, period: String },
}

/// Failure of a per-share normalization call. Fatal to that call only.
#[derive(Error, Debug)]
pub enum NormalizationError {
    #[error("No share_count series is available for normalization")]
    MissingShareCountSeries,

    #[error("Missing share_count entry for period '{0}'")]
    MissingShareCount(String),

    #[error("share_count for period '{0}' is zero")]
    ZeroShareCount(String),
}

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error(transparent)]
    MalformedTable(#[from] MalformedTableError),

    #[error("{} note conflict(s) detected while combining datasets", .0.len())]
    NoteConflicts(Vec<NoteConflict>),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error("Combined matrix is missing a share_count row")]
    MissingShareCountRow,

    #[error("Combined matrix contains multiple share_count rows")]
    MultipleShareCountRows,

    #[error("Combined matrix is missing column '{0}'")]
    MissingMatrixColumn(String),

    #[error("Combined matrix does not contain numeric data columns")]
    NoDataColumns,

    #[error("'{0}' is not a recognized period column")]
    UnknownPeriodColumn(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DatasetError>;
