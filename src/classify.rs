//! The note state machine governing sign, inclusion, and share-count capture.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Controlled annotation attached to every row of a source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Note {
    #[serde(rename = "asis")]
    AsIs,
    Negated,
    Excluded,
    ShareCount,
}

impl Note {
    /// Parse a note annotation case-insensitively. Returns `None` for any
    /// value outside the controlled set; callers treat that as a hard
    /// table-parse error.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "asis" => Some(Self::AsIs),
            "negated" => Some(Self::Negated),
            "excluded" => Some(Self::Excluded),
            "share_count" => Some(Self::ShareCount),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AsIs => "asis",
            Self::Negated => "negated",
            Self::Excluded => "excluded",
            Self::ShareCount => "share_count",
        }
    }

    /// Decide how a row with this note participates in the dataset.
    pub fn classify(&self) -> Classification {
        match self {
            Self::AsIs => Classification {
                sign: 1.0,
                include: true,
                is_share_count: false,
            },
            Self::Negated => Classification {
                sign: -1.0,
                include: true,
                is_share_count: false,
            },
            Self::Excluded => Classification {
                sign: 1.0,
                include: false,
                is_share_count: false,
            },
            Self::ShareCount => Classification {
                sign: 1.0,
                include: false,
                is_share_count: true,
            },
        }
    }
}

impl FromStr for Note {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unsupported note value '{}'", s))
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying a row's note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// Multiplier applied to every period value (+1 or -1).
    pub sign: f64,
    /// Whether the row contributes a plotted/aggregated series.
    pub include: bool,
    /// Whether the row is the per-period share-count divisor for its table.
    pub is_share_count: bool,
}

/// Apply the note's sign transform to a value series.
pub fn apply_sign(values: &[f64], note: Note) -> Vec<f64> {
    let sign = note.classify().sign;
    values.iter().map(|v| v * sign).collect()
}

/// Semantic series a source section label maps into. Sections outside the
/// controlled set are dropped from charting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeriesKind {
    Finance,
    IncomeStatement,
}

impl SeriesKind {
    pub fn from_section(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "financial" | "finance" | "financial position" => Some(Self::Finance),
            "income" | "income statement" => Some(Self::IncomeStatement),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Finance => "Finance",
            Self::IncomeStatement => "Income Statement",
        }
    }
}
