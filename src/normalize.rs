//! Per-share normalization of absolute value series.

use crate::error::NormalizationError;
use log::debug;
use std::collections::BTreeMap;

/// Divide every period value by that period's share count.
///
/// Every period present in `values` must have a nonzero share-count entry;
/// a missing or zero divisor is an error rather than a silent skip or a
/// division by zero.
pub fn per_share(
    values: &BTreeMap<String, f64>,
    share_counts: &BTreeMap<String, f64>,
) -> Result<BTreeMap<String, f64>, NormalizationError> {
    if share_counts.is_empty() {
        return Err(NormalizationError::MissingShareCountSeries);
    }

    let mut normalized = BTreeMap::new();
    for (period, value) in values {
        let count = share_counts
            .get(period)
            .ok_or_else(|| NormalizationError::MissingShareCount(period.clone()))?;
        if *count == 0.0 {
            return Err(NormalizationError::ZeroShareCount(period.clone()));
        }
        normalized.insert(period.clone(), value / count);
    }

    debug!("Normalized {} periods to per-share values", normalized.len());
    Ok(normalized)
}
