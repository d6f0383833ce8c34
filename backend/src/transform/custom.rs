//! Ad-hoc group-by chosen at runtime.
//!
//! A [`CustomRequest`] names the group-by columns and either a headcount or a
//! compensation aggregation. Requests are validated before any row is read.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineResult, ValidationError};
use crate::models::columns::OBJECT_ID;
use crate::models::{Cell, Table};
use crate::validation::{check_columns, check_group_by, check_metrics};

use super::pivot::{group_aggregate, Aggregation};

/// Aggregation applied to compensation metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Sum,
    Mean,
}

impl From<Method> for Aggregation {
    fn from(method: Method) -> Self {
        match method {
            Method::Sum => Aggregation::Sum,
            Method::Mean => Aggregation::Mean,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AggregationMode {
    /// Count of non-null `OBJECTID` per group.
    Headcount,
    /// Sum or mean of each metric per group.
    #[serde(rename_all = "camelCase")]
    Compensation {
        metrics: Vec<String>,
        #[serde(default)]
        method: Method,
        /// Rows with a non-null value in this column are left out.
        #[serde(default)]
        exclude_flag: Option<String>,
    },
}

/// A user's group-by selection.
///
/// JSON shape:
///
/// ```json
/// { "groupBy": ["SMI_CODE", "Function"], "mode": "compensation",
///   "metrics": ["CMP1"], "method": "mean", "excludeFlag": "EXCL_PML" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRequest {
    pub group_by: Vec<String>,
    #[serde(flatten)]
    pub mode: AggregationMode,
}

impl CustomRequest {
    pub fn headcount(group_by: Vec<String>) -> Self {
        Self {
            group_by,
            mode: AggregationMode::Headcount,
        }
    }

    pub fn compensation(
        group_by: Vec<String>,
        metrics: Vec<String>,
        method: Method,
        exclude_flag: Option<String>,
    ) -> Self {
        Self {
            group_by,
            mode: AggregationMode::Compensation {
                metrics,
                method,
                exclude_flag,
            },
        }
    }

    /// Check the selection itself, without looking at any table.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_group_by(&self.group_by)?;
        match &self.mode {
            AggregationMode::Headcount if self.group_by.iter().any(|c| c == OBJECT_ID) => {
                Err(ValidationError::MetricIsGroupKey(OBJECT_ID.to_string()))
            }
            AggregationMode::Headcount => Ok(()),
            AggregationMode::Compensation { metrics, .. } => check_metrics(&self.group_by, metrics),
        }
    }

    /// Every column this request reads.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = self.group_by.iter().map(String::as_str).collect();
        match &self.mode {
            AggregationMode::Headcount => columns.push(OBJECT_ID),
            AggregationMode::Compensation {
                metrics, exclude_flag, ..
            } => {
                columns.extend(metrics.iter().map(String::as_str));
                columns.extend(exclude_flag.as_deref());
            }
        }
        columns
    }
}

/// Run a custom group-by over `table`.
///
/// Output columns are the group-by columns followed by `OBJECTID` (headcount)
/// or the metrics (compensation); one row per key combination, sorted.
pub fn custom_groupby(table: &Table, request: &CustomRequest) -> PipelineResult<Table> {
    request.validate()?;
    check_columns(table, request.referenced_columns())?;

    let keys: Vec<&str> = request.group_by.iter().map(String::as_str).collect();

    let out = match &request.mode {
        AggregationMode::Headcount => {
            group_aggregate(table, &keys, &[(OBJECT_ID, Aggregation::Count)])?
        }
        AggregationMode::Compensation {
            metrics,
            method,
            exclude_flag,
        } => {
            let values: Vec<(&str, Aggregation)> = metrics
                .iter()
                .map(|m| (m.as_str(), Aggregation::from(*method)))
                .collect();
            match exclude_flag {
                Some(flag) => {
                    let filtered = without_flagged(table, flag)?;
                    group_aggregate(&filtered, &keys, &values)?
                }
                None => group_aggregate(table, &keys, &values)?,
            }
        }
    };
    Ok(out)
}

/// Rows whose `flag` cell is null.
fn without_flagged(table: &Table, flag: &str) -> PipelineResult<Table> {
    let idx = table.column_index(flag)?;
    Ok(table.filter_rows(|row| matches!(row[idx], Cell::Null)))
}
