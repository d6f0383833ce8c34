//! Validation of user selections.
//!
//! Column names picked at runtime (group-by keys, metrics, the exclude
//! flag) are checked here before any aggregation runs:
//!
//! - [`check_group_by`] - at least one key, no repeats
//! - [`check_metrics`] - at least one metric, none reused as a key
//! - [`check_columns`] - every named column exists in the loaded table
//!
//! # Example
//!
//! ```rust,ignore
//! use hce::validation::{check_group_by, check_columns};
//!
//! check_group_by(&["SMI_CODE".to_string()])?;
//! check_columns(&table, ["SMI_CODE", "OBJECTID"])?;
//! ```

use std::collections::HashSet;

use crate::error::{ColumnResult, ValidationError};
use crate::models::Table;

/// Group-by selection must be non-empty and free of repeats.
pub fn check_group_by(group_by: &[String]) -> Result<(), ValidationError> {
    if group_by.is_empty() {
        return Err(ValidationError::EmptyGroupBy);
    }
    first_duplicate(group_by).map_or(Ok(()), |dup| Err(ValidationError::DuplicateColumn(dup)))
}

/// Metric selection must be non-empty, free of repeats, and disjoint from
/// the group-by keys.
pub fn check_metrics(group_by: &[String], metrics: &[String]) -> Result<(), ValidationError> {
    if metrics.is_empty() {
        return Err(ValidationError::EmptyMetrics);
    }
    if let Some(dup) = first_duplicate(metrics) {
        return Err(ValidationError::DuplicateColumn(dup));
    }
    match metrics.iter().find(|m| group_by.contains(*m)) {
        Some(m) => Err(ValidationError::MetricIsGroupKey(m.clone())),
        None => Ok(()),
    }
}

/// Every column must exist in `table`; the first missing one is reported.
pub fn check_columns<'a>(
    table: &Table,
    columns: impl IntoIterator<Item = &'a str>,
) -> ColumnResult<()> {
    for column in columns {
        table.column_index(column)?;
    }
    Ok(())
}

fn first_duplicate(columns: &[String]) -> Option<String> {
    let mut seen = HashSet::new();
    columns.iter().find(|c| !seen.insert(c.as_str())).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ColumnError;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn table() -> Table {
        Table::new("POSDATA", cols(&["SMI_CODE", "Function", "CMP1"]))
    }

    #[test]
    fn test_empty_group_by_rejected() {
        assert_eq!(check_group_by(&[]), Err(ValidationError::EmptyGroupBy));
    }

    #[test]
    fn test_duplicate_group_by_rejected() {
        assert_eq!(
            check_group_by(&cols(&["SMI_CODE", "SMI_CODE"])),
            Err(ValidationError::DuplicateColumn("SMI_CODE".into()))
        );
    }

    #[test]
    fn test_metrics() {
        let group_by = cols(&["SMI_CODE"]);
        assert_eq!(check_metrics(&group_by, &[]), Err(ValidationError::EmptyMetrics));
        assert_eq!(
            check_metrics(&group_by, &cols(&["SMI_CODE"])),
            Err(ValidationError::MetricIsGroupKey("SMI_CODE".into()))
        );
        assert!(check_metrics(&group_by, &cols(&["CMP1", "CMP5"])).is_ok());
    }

    #[test]
    fn test_missing_column_reported_by_name() {
        let err = check_columns(&table(), ["SMI_CODE", "CMP9"]).unwrap_err();
        match err {
            ColumnError::MissingColumn { column, table } => {
                assert_eq!(column, "CMP9");
                assert_eq!(table, "POSDATA");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
