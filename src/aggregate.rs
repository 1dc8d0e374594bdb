//! Identity-keyed merging of rows across source tables.
//!
//! Every row is keyed by (section, category, subcategory, item). Rows sharing
//! a key across tables merge into one entity; differing note annotations for
//! the same key are collected as conflicts instead of being resolved.
//!
//! Precondition: input tables must not overlap on (key, period) unless the
//! caller intends last-write-wins in table-processing order. The aggregator
//! does not detect such overlaps.

use crate::classify::Note;
use crate::table::SourceTable;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of one financial line item across documents. Fields are trimmed
/// and case-sensitive; ordering gives the deterministic matrix row order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub section: String,
    pub category: String,
    pub subcategory: String,
    pub item: String,
}

/// Two source tables disagreeing on the note annotation for one key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteConflict {
    pub key: EntityKey,
    /// The two differing annotations, existing first.
    pub notes: [Note; 2],
    /// Documents that supplied them, aligned with `notes`.
    pub documents: [String; 2],
}

/// All rows sharing one identity key, merged across source tables.
///
/// Values are kept as reported (no sign transform); the note decides how a
/// consumer turns them into a plotted series. Absent periods are absent, not
/// zero-filled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedEntity {
    pub note: Note,
    pub values: BTreeMap<String, f64>,
    /// Documents that contributed at least one cell, in processing order.
    pub documents: Vec<String>,
}

impl AggregatedEntity {
    /// Values with the note's sign transform applied, aligned with `periods`.
    /// Periods the entity never saw come back as `None`.
    pub fn series_values(&self, periods: &[String]) -> Vec<Option<f64>> {
        let sign = self.note.classify().sign;
        periods
            .iter()
            .map(|p| self.values.get(p).map(|v| v * sign))
            .collect()
    }

    /// True when every period value the entity carries is exactly zero.
    pub fn is_all_zero(&self) -> bool {
        self.values.values().all(|v| *v == 0.0)
    }
}

/// Result of one aggregation pass.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// Every entity, keyed and key-sorted, notes preserved.
    pub entities: BTreeMap<EntityKey, AggregatedEntity>,
    /// Batched note conflicts. Non-empty means the run must not produce a
    /// combined matrix.
    pub conflicts: Vec<NoteConflict>,
    /// Merged per-period share-count divisor series across all tables.
    pub share_counts: BTreeMap<String, f64>,
}

impl Aggregation {
    /// Entities that contribute plotted series: excluded and share-count rows
    /// are dropped by note, and otherwise-included rows whose every value is
    /// zero are dropped as non-contributing line items.
    pub fn included(&self) -> impl Iterator<Item = (&EntityKey, &AggregatedEntity)> {
        self.entities.iter().filter(|(_, entity)| {
            entity.note.classify().include && !entity.is_all_zero()
        })
    }
}

/// Merge all rows of the given tables by identity key.
///
/// Tables are processed in the given order; numeric cells are resolved
/// through the tolerant numeric parser. Note disagreements are collected into
/// `conflicts` rather than resolved, and no entity is silently omitted
/// because of one.
pub fn aggregate(tables: &[SourceTable]) -> Aggregation {
    let mut aggregation = Aggregation::default();

    for table in tables {
        for row in &table.rows {
            let key = EntityKey {
                section: table.section.trim().to_string(),
                category: row.category.trim().to_string(),
                subcategory: row.subcategory.trim().to_string(),
                item: row.item.trim().to_string(),
            };

            let entity = aggregation
                .entities
                .entry(key.clone())
                .or_insert_with(|| AggregatedEntity {
                    note: row.note,
                    values: BTreeMap::new(),
                    documents: Vec::new(),
                });

            if entity.note != row.note {
                warn!(
                    "Note conflict for {:?}: '{}' vs '{}' (from {})",
                    key,
                    entity.note,
                    row.note,
                    table.document
                );
                let existing_document = entity
                    .documents
                    .first()
                    .cloned()
                    .unwrap_or_default();
                aggregation.conflicts.push(NoteConflict {
                    key,
                    notes: [entity.note, row.note],
                    documents: [existing_document, table.document.clone()],
                });
                continue;
            }

            for (period, raw) in table.periods.iter().zip(row.values.iter()) {
                if raw.trim().is_empty() {
                    continue;
                }
                entity
                    .values
                    .insert(period.clone(), crate::numeric::parse_numeric(raw));
            }
            if !entity.documents.contains(&table.document) {
                entity.documents.push(table.document.clone());
            }
        }

        if let Some(counts) = table.share_counts() {
            for (period, count) in counts {
                aggregation.share_counts.insert(period, count);
            }
        }
    }

    debug!(
        "Aggregated {} entities from {} tables ({} conflicts)",
        aggregation.entities.len(),
        tables.len(),
        aggregation.conflicts.len()
    );
    aggregation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::SourceTable;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn table(document: &str, section: &str, periods: &[&str], rows: &[Vec<String>]) -> SourceTable {
        let mut header = cells(&["CATEGORY", "SUBCATEGORY", "ITEM", "NOTE"]);
        header.extend(periods.iter().map(|p| p.to_string()));
        SourceTable::from_rows(document, section, vec![], &header, rows).unwrap()
    }

    #[test]
    fn test_merges_same_key_across_tables() {
        let a = table(
            "fy2021.pdf",
            "Financial",
            &["31.12.2021"],
            &[cells(&["Assets", "", "Cash", "asis", "100"])],
        );
        let b = table(
            "fy2022.pdf",
            "Financial",
            &["31.12.2022"],
            &[cells(&["Assets", "", "Cash", "asis", "120"])],
        );

        let aggregation = aggregate(&[a, b]);
        assert!(aggregation.conflicts.is_empty());
        assert_eq!(aggregation.entities.len(), 1);

        let entity = aggregation.entities.values().next().unwrap();
        assert_eq!(entity.values.get("31.12.2021"), Some(&100.0));
        assert_eq!(entity.values.get("31.12.2022"), Some(&120.0));
        assert_eq!(entity.documents, cells(&["fy2021.pdf", "fy2022.pdf"]));
    }

    #[test]
    fn test_section_participates_in_key() {
        let a = table(
            "fy2021.pdf",
            "Financial",
            &["31.12.2021"],
            &[cells(&["CatA", "", "Item1", "asis", "100"])],
        );
        let b = table(
            "fy2021.pdf",
            "Income",
            &["31.12.2021"],
            &[cells(&["CatA", "", "Item1", "asis", "50"])],
        );

        let aggregation = aggregate(&[a, b]);
        assert_eq!(aggregation.entities.len(), 2);
    }

    #[test]
    fn test_note_conflict_collected_not_resolved() {
        let a = table(
            "fy2021.pdf",
            "Financial",
            &["31.12.2021"],
            &[cells(&["CatA", "", "Item1", "asis", "100"])],
        );
        let b = table(
            "fy2022.pdf",
            "Financial",
            &["31.12.2022"],
            &[cells(&["CatA", "", "Item1", "negated", "80"])],
        );

        let aggregation = aggregate(&[a, b]);
        assert_eq!(aggregation.conflicts.len(), 1);
        let conflict = &aggregation.conflicts[0];
        assert_eq!(conflict.notes, [Note::AsIs, Note::Negated]);
        assert_eq!(conflict.documents[0], "fy2021.pdf");
        assert_eq!(conflict.documents[1], "fy2022.pdf");
        // The entity itself is still present, not silently omitted.
        assert_eq!(aggregation.entities.len(), 1);
    }

    #[test]
    fn test_all_zero_row_dropped_from_included() {
        let a = table(
            "fy2021.pdf",
            "Financial",
            &["31.12.2021", "31.12.2020"],
            &[
                cells(&["CatA", "", "Empty", "asis", "0", "0"]),
                cells(&["CatA", "", "Cash", "asis", "100", "90"]),
            ],
        );

        let aggregation = aggregate(&[a]);
        assert_eq!(aggregation.entities.len(), 2);
        let included: Vec<_> = aggregation.included().collect();
        assert_eq!(included.len(), 1);
        assert_eq!(included[0].0.item, "Cash");
    }

    #[test]
    fn test_excluded_note_dropped_regardless_of_values() {
        let a = table(
            "fy2021.pdf",
            "Financial",
            &["31.12.2021"],
            &[cells(&["CatA", "", "Noise", "excluded", "999"])],
        );
        let aggregation = aggregate(&[a]);
        assert_eq!(aggregation.included().count(), 0);
        assert_eq!(aggregation.entities.len(), 1);
    }

    #[test]
    fn test_share_counts_merged_across_tables() {
        let a = table(
            "fy2021.pdf",
            "Shares",
            &["31.12.2021"],
            &[cells(&["Shares", "", "Issued", "share_count", "1000"])],
        );
        let b = table(
            "fy2022.pdf",
            "Shares",
            &["31.12.2022"],
            &[cells(&["Shares", "", "Issued", "share_count", "1100"])],
        );

        let aggregation = aggregate(&[a, b]);
        assert_eq!(aggregation.share_counts.get("31.12.2021"), Some(&1000.0));
        assert_eq!(aggregation.share_counts.get("31.12.2022"), Some(&1100.0));
        assert_eq!(aggregation.included().count(), 0);
    }

    #[test]
    fn test_series_values_sign_and_absent_periods() {
        let a = table(
            "fy2021.pdf",
            "Income",
            &["31.12.2021", "31.12.2020"],
            &[cells(&["Costs", "", "Wages", "negated", "100", "(50)"])],
        );
        let aggregation = aggregate(&[a]);
        let entity = aggregation.entities.values().next().unwrap();
        let periods = vec![
            "31.12.2020".to_string(),
            "31.12.2021".to_string(),
            "31.12.2022".to_string(),
        ];
        assert_eq!(
            entity.series_values(&periods),
            vec![Some(50.0), Some(-100.0), None]
        );
    }
}
