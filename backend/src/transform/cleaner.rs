//! POSDATA cleaning and PNAME merge.
//!
//! # Steps
//!
//! ```text
//! POSDATA ─┬─ ratio columns ÷ 100
//!          ├─ Tenure = year − HIRE_YEAR ─▶ Tenure Distribution
//!          └─ left join PNAME (nulls filled "NA") on TRS_POS_CODE = Job Code
//!                 ─▶ project ─▶ drop Comments == "N" job codes ─▶ drop Job Code
//! ```
//!
//! Inputs are never modified; every step builds a new table.

use chrono::Datelike;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::error::{PipelineError, PipelineResult};
use crate::models::columns::*;
use crate::models::{Cell, CellKey, Table, TenureBucket};

/// Cleaning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanOptions {
    /// Year tenure is measured against
    pub current_year: i32,
}

impl CleanOptions {
    pub fn for_year(current_year: i32) -> Self {
        Self { current_year }
    }
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self::for_year(chrono::Local::now().year())
    }
}

/// Row counts collected while cleaning
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanStats {
    pub input_rows: usize,
    /// Rows with at least one PNAME match (after join fan-out)
    pub matched_rows: usize,
    /// Rows without a PNAME match
    pub unmatched_rows: usize,
    /// Rows removed by the Comments == "N" rule
    pub excluded_rows: usize,
    pub output_rows: usize,
}

/// Cleaned table plus counts
#[derive(Debug, Clone)]
pub struct Cleaned {
    pub table: Table,
    pub stats: CleanStats,
}

/// POSDATA columns the cleaner reads.
pub fn required_posdata_columns() -> Vec<&'static str> {
    let mut required: Vec<&str> = BASIC_INFO_COLUMNS
        .iter()
        .copied()
        .filter(|c| *c != TENURE && *c != TENURE_DISTRIBUTION)
        .collect();
    required.push(HIRE_YEAR);
    required.extend(RATIO_COLUMNS);
    required.extend(COMPENSATION_COLUMNS);
    required
}

/// PNAME columns the cleaner reads.
pub fn required_pname_columns() -> Vec<&'static str> {
    let mut required = PNAME_KEEP_COLUMNS.to_vec();
    required.push(COMMENTS);
    required
}

/// Output column order of [`clean`].
pub fn cleaned_columns() -> Vec<&'static str> {
    BASIC_INFO_COLUMNS
        .iter()
        .chain(PNAME_KEEP_COLUMNS.iter().filter(|c| **c != JOB_CODE))
        .chain(RATIO_COLUMNS.iter())
        .chain(COMPENSATION_COLUMNS.iter())
        .copied()
        .collect()
}

/// Clean POSDATA and merge it with PNAME.
pub fn clean(posdata: &Table, pname: &Table, options: &CleanOptions) -> PipelineResult<Cleaned> {
    if posdata.is_empty() {
        return Err(PipelineError::EmptyInput(posdata.name().to_string()));
    }
    if pname.is_empty() {
        return Err(PipelineError::EmptyInput(pname.name().to_string()));
    }
    posdata.require(&required_posdata_columns())?;
    pname.require(&required_pname_columns())?;

    let mut stats = CleanStats {
        input_rows: posdata.len(),
        ..Default::default()
    };

    let mut working = scale_ratios(posdata)?;
    add_tenure(&mut working, options.current_year)?;

    let reference = reference_table(pname)?;
    let merged = left_join(&working, &reference, &mut stats)?;

    let mut projection: Vec<&str> = BASIC_INFO_COLUMNS.to_vec();
    projection.extend(PNAME_KEEP_COLUMNS);
    projection.extend(RATIO_COLUMNS);
    projection.extend(COMPENSATION_COLUMNS);
    let projected = merged.select(&projection)?;

    let excluded = excluded_job_codes(pname)?;
    let code_idx = projected.column_index(POSITION_CODE)?;
    let kept = projected.filter_rows(|row| {
        row[code_idx]
            .key()
            .map_or(true, |k| !excluded.contains(&k))
    });
    stats.excluded_rows = projected.len() - kept.len();

    let table = kept.drop_column(JOB_CODE)?;
    stats.output_rows = table.len();

    Ok(Cleaned { table, stats })
}

/// Ratio columns divided by 100, nulls kept.
fn scale_ratios(posdata: &Table) -> PipelineResult<Table> {
    let mut scaled = posdata.clone();
    for column in RATIO_COLUMNS {
        let values = posdata
            .column(column)?
            .map(|cell| -> PipelineResult<Cell> {
                Ok(Cell::from(cell.as_number(column)?.map(|v| v / 100.0)))
            })
            .collect::<PipelineResult<Vec<_>>>()?;
        scaled.set_column(column, values);
    }
    Ok(scaled)
}

/// Append `Tenure` and `Tenure Distribution`.
fn add_tenure(table: &mut Table, current_year: i32) -> PipelineResult<()> {
    let tenure = table
        .column(HIRE_YEAR)?
        .map(|cell| -> PipelineResult<Option<f64>> {
            Ok(cell.as_number(HIRE_YEAR)?.map(|year| f64::from(current_year) - year))
        })
        .collect::<PipelineResult<Vec<Option<f64>>>>()?;

    let buckets = tenure
        .iter()
        .map(|t| {
            t.and_then(TenureBucket::from_tenure)
                .map_or(Cell::Null, |b| Cell::text(b.label()))
        })
        .collect();

    table.set_column(TENURE, tenure.into_iter().map(Cell::from).collect());
    table.set_column(TENURE_DISTRIBUTION, buckets);
    Ok(())
}

/// PNAME join columns with null cells replaced by "NA".
fn reference_table(pname: &Table) -> PipelineResult<Table> {
    let mut reference = pname.select(&PNAME_KEEP_COLUMNS)?;
    for column in PNAME_KEEP_COLUMNS {
        let filled = reference
            .column(column)?
            .map(|cell| match cell {
                Cell::Null => Cell::text(REFERENCE_FILL),
                other => other.clone(),
            })
            .collect();
        reference.set_column(column, filled);
    }
    Ok(reference)
}

/// Left join on `TRS_POS_CODE = Job Code`.
///
/// One output row per matching reference row, in reference order; rows
/// without a match keep null reference cells. POSDATA columns sharing a name
/// with a reference column are replaced by the reference column.
fn left_join(left: &Table, reference: &Table, stats: &mut CleanStats) -> PipelineResult<Table> {
    let left_key = left.column_index(POSITION_CODE)?;
    let right_key = reference.column_index(JOB_CODE)?;

    let mut index: HashMap<CellKey, Vec<usize>> = HashMap::new();
    for (r, row) in reference.rows().iter().enumerate() {
        if let Some(key) = row[right_key].key() {
            index.entry(key).or_default().push(r);
        }
    }

    let kept: Vec<usize> = (0..left.width())
        .filter(|&i| !reference.has_column(&left.columns()[i]))
        .collect();
    let columns = kept
        .iter()
        .map(|&i| left.columns()[i].clone())
        .chain(reference.columns().iter().cloned())
        .collect();
    let mut merged = Table::new(left.name(), columns);

    for row in left.rows() {
        let base: Vec<Cell> = kept.iter().map(|&i| row[i].clone()).collect();
        match row[left_key].key().and_then(|k| index.get(&k)) {
            Some(matches) => {
                for &m in matches {
                    let mut out = base.clone();
                    out.extend(reference.rows()[m].iter().cloned());
                    merged.push_row(out);
                    stats.matched_rows += 1;
                }
            }
            None => {
                merged.push_row(base);
                stats.unmatched_rows += 1;
            }
        }
    }
    Ok(merged)
}

/// Job codes whose `Comments` is exactly the exclusion marker.
fn excluded_job_codes(pname: &Table) -> PipelineResult<HashSet<CellKey>> {
    let code_idx = pname.column_index(JOB_CODE)?;
    let comment_idx = pname.column_index(COMMENTS)?;
    Ok(pname
        .rows()
        .iter()
        .filter(|row| matches!(&row[comment_idx], Cell::Text(s) if s == EXCLUSION_MARKER))
        .filter_map(|row| row[code_idx].key())
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ColumnError;

    fn t(s: &str) -> Cell {
        Cell::text(s)
    }

    fn n(v: f64) -> Cell {
        Cell::Number(v)
    }

    /// POSDATA row with the given org, position code, hire year and BON_TPER.
    pub(crate) fn posdata_row(
        id: f64,
        org: &str,
        code: &str,
        hire_year: Option<f64>,
        bon_tper: Option<f64>,
    ) -> Vec<Cell> {
        let mut row = Vec::new();
        for column in posdata_columns() {
            row.push(match column.as_str() {
                OBJECT_ID => n(id),
                SMI_CODE => t(org),
                POSITION_CODE => t(code),
                HIRE_YEAR => Cell::from(hire_year),
                BON_TPER => Cell::from(bon_tper),
                INCENT_TPER => n(20.0),
                "EXCL_PML" => Cell::Null,
                c if COMPENSATION_COLUMNS.contains(&c) => n(1000.0 * id),
                c if RATIO_COLUMNS.contains(&c) => Cell::Null,
                other => t(&format!("{}-{}", other, id)),
            });
        }
        row
    }

    pub(crate) fn posdata_columns() -> Vec<String> {
        required_posdata_columns().into_iter().map(String::from).collect()
    }

    pub(crate) fn pname_table(rows: &[(&str, &str, &str, Option<&str>)]) -> Table {
        Table::from_rows(
            PNAME,
            required_pname_columns().into_iter().map(String::from).collect(),
            rows.iter()
                .map(|(code, function, level, comment)| {
                    vec![
                        t(code),
                        t(function),
                        t(&format!("{}-sub", function)),
                        t(level),
                        Cell::Null,
                        t("S1"),
                        comment.map_or(Cell::Null, t),
                    ]
                })
                .collect(),
        )
    }

    fn posdata(rows: Vec<Vec<Cell>>) -> Table {
        Table::from_rows(POSDATA, posdata_columns(), rows)
    }

    fn value(table: &Table, row: usize, column: &str) -> Cell {
        table.get(row, column).unwrap().cloned().unwrap()
    }

    #[test]
    fn test_ratio_columns_scaled_nulls_kept() {
        let input = posdata(vec![
            posdata_row(1.0, "ORG1", "J1", Some(2020.0), Some(15.0)),
            posdata_row(2.0, "ORG1", "J1", Some(2020.0), None),
        ]);
        let pname = pname_table(&[("J1", "Sales", "L1", None)]);

        let out = clean(&input, &pname, &CleanOptions::for_year(2024)).unwrap().table;

        assert_eq!(value(&out, 0, BON_TPER), n(0.15));
        assert_eq!(value(&out, 1, BON_TPER), Cell::Null);
        assert_eq!(value(&out, 0, INCENT_TPER), n(0.2));
        assert_eq!(value(&out, 0, OTHBON_APER), Cell::Null);
        // source untouched
        assert_eq!(input.get(0, BON_TPER).unwrap(), Some(&n(15.0)));
    }

    #[test]
    fn test_tenure_and_distribution() {
        let input = posdata(vec![
            posdata_row(1.0, "ORG1", "J1", Some(2024.0), None),
            posdata_row(2.0, "ORG1", "J1", Some(2021.0), None),
            posdata_row(3.0, "ORG1", "J1", Some(2013.0), None),
            posdata_row(4.0, "ORG1", "J1", None, None),
            posdata_row(5.0, "ORG1", "J1", Some(2026.0), None),
        ]);
        let pname = pname_table(&[("J1", "Sales", "L1", None)]);

        let out = clean(&input, &pname, &CleanOptions::for_year(2024)).unwrap().table;

        assert_eq!(value(&out, 0, TENURE), n(0.0));
        assert_eq!(value(&out, 0, TENURE_DISTRIBUTION), t("<1Y"));
        assert_eq!(value(&out, 1, TENURE), n(3.0));
        assert_eq!(value(&out, 1, TENURE_DISTRIBUTION), t("3-5Y"));
        assert_eq!(value(&out, 2, TENURE), n(11.0));
        assert_eq!(value(&out, 2, TENURE_DISTRIBUTION), t(">10Y"));
        assert_eq!(value(&out, 3, TENURE), Cell::Null);
        assert_eq!(value(&out, 3, TENURE_DISTRIBUTION), Cell::Null);
        assert_eq!(value(&out, 4, TENURE), n(-2.0));
        assert_eq!(value(&out, 4, TENURE_DISTRIBUTION), Cell::Null);
    }

    #[test]
    fn test_join_fills_na_and_keeps_unmatched() {
        let input = posdata(vec![
            posdata_row(1.0, "ORG1", "J1", Some(2020.0), None),
            posdata_row(2.0, "ORG2", "J404", Some(2020.0), None),
        ]);
        let pname = pname_table(&[("J1", "Sales", "L1", None)]);

        let cleaned = clean(&input, &pname, &CleanOptions::for_year(2024)).unwrap();
        let out = cleaned.table;

        assert_eq!(value(&out, 0, FUNCTION), t("Sales"));
        assert_eq!(value(&out, 0, CL_SALES), t("NA"));
        assert_eq!(value(&out, 1, FUNCTION), Cell::Null);
        assert_eq!(cleaned.stats.matched_rows, 1);
        assert_eq!(cleaned.stats.unmatched_rows, 1);
    }

    #[test]
    fn test_excluded_job_codes_dropped() {
        let input = posdata(vec![
            posdata_row(1.0, "ORG1", "J1", Some(2020.0), None),
            posdata_row(2.0, "ORG1", "J2", Some(2020.0), None),
            posdata_row(3.0, "ORG2", "J3", Some(2020.0), None),
        ]);
        let pname = pname_table(&[
            ("J1", "Sales", "L1", None),
            ("J2", "HR", "L2", Some("N")),
            ("J3", "HR", "L2", Some("Y")),
        ]);

        let cleaned = clean(&input, &pname, &CleanOptions::for_year(2024)).unwrap();

        let codes: Vec<Cell> = cleaned.table.column(POSITION_CODE).unwrap().cloned().collect();
        assert_eq!(codes, vec![t("J1"), t("J3")]);
        assert_eq!(cleaned.stats.excluded_rows, 1);
        assert_eq!(cleaned.stats.output_rows, 2);
    }

    #[test]
    fn test_output_columns() {
        let input = posdata(vec![posdata_row(1.0, "ORG1", "J1", Some(2020.0), None)]);
        let pname = pname_table(&[("J1", "Sales", "L1", None)]);

        let out = clean(&input, &pname, &CleanOptions::for_year(2024)).unwrap().table;

        let expected: Vec<String> = cleaned_columns().into_iter().map(String::from).collect();
        assert_eq!(out.columns(), expected.as_slice());
        assert!(!out.has_column(JOB_CODE));
        assert!(!out.has_column(COMMENTS));
        assert_eq!(out.width(), 28);
    }

    #[test]
    fn test_duplicate_job_codes_fan_out() {
        let input = posdata(vec![posdata_row(1.0, "ORG1", "J1", Some(2020.0), None)]);
        let pname = pname_table(&[("J1", "Sales", "L1", None), ("J1", "HR", "L2", None)]);

        let out = clean(&input, &pname, &CleanOptions::for_year(2024)).unwrap().table;

        assert_eq!(out.len(), 2);
        assert_eq!(value(&out, 0, FUNCTION), t("Sales"));
        assert_eq!(value(&out, 1, FUNCTION), t("HR"));
    }

    #[test]
    fn test_missing_column_named() {
        let input = posdata(vec![posdata_row(1.0, "ORG1", "J1", Some(2020.0), None)])
            .drop_column(HIRE_YEAR)
            .unwrap();
        let pname = pname_table(&[("J1", "Sales", "L1", None)]);

        let err = clean(&input, &pname, &CleanOptions::for_year(2024)).unwrap_err();
        match err {
            PipelineError::Column(ColumnError::MissingColumn { table, column }) => {
                assert_eq!(table, POSDATA);
                assert_eq!(column, HIRE_YEAR);
            }
            other => panic!("unexpected: {:?}", other),
        }

        let pname = pname.drop_column(COMMENTS).unwrap();
        let input = posdata(vec![posdata_row(1.0, "ORG1", "J1", Some(2020.0), None)]);
        let err = clean(&input, &pname, &CleanOptions::for_year(2024)).unwrap_err();
        assert!(err.to_string().contains("Comments"));
    }

    #[test]
    fn test_empty_input_rejected() {
        let pname = pname_table(&[("J1", "Sales", "L1", None)]);
        let err = clean(&posdata(vec![]), &pname, &CleanOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput(_)));
    }
}
