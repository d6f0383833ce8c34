//! Group-by primitives shared by the RDPAC report and custom group-bys.
//!
//! ```text
//! rows ──group_rows──▶ {(SMI_CODE, Function) → [row, ...]} ──aggregate──▶ value
//!                                │
//!                                ├── group_aggregate ──▶ flat Table (keys + values)
//!                                ├── pivot ────────────▶ PivotTable (dims unstacked)
//!                                └── summarize ────────▶ PivotTable (named aggregates)
//! ```
//!
//! Rows with a null in any key column are left out of the grouping. Keys are
//! sorted ascending, numbers before text. Count skips null cells, sum skips
//! nulls (no values gives 0), mean skips nulls (no values gives null).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::ColumnResult;
use crate::models::{Cell, CellKey, PivotTable, Table};

/// How a group's values collapse into one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Count,
    Sum,
    Mean,
}

/// Row indices per distinct key tuple.
pub type Groups = BTreeMap<Vec<CellKey>, Vec<usize>>;

/// Group the rows of `table` by `keys`.
pub fn group_rows(table: &Table, keys: &[&str]) -> ColumnResult<Groups> {
    let key_idx = keys
        .iter()
        .map(|k| table.column_index(k))
        .collect::<ColumnResult<Vec<_>>>()?;

    let mut groups = Groups::new();
    'rows: for (r, row) in table.rows().iter().enumerate() {
        let mut key = Vec::with_capacity(key_idx.len());
        for &i in &key_idx {
            match row[i].key() {
                Some(k) => key.push(k),
                None => continue 'rows,
            }
        }
        groups.entry(key).or_default().push(r);
    }
    Ok(groups)
}

/// Collapse `column` over `rows` with `agg`.
pub fn aggregate(
    table: &Table,
    rows: &[usize],
    column: &str,
    agg: Aggregation,
) -> ColumnResult<Cell> {
    let col = table.column_index(column)?;
    let cells = rows.iter().map(|&r| &table.rows()[r][col]);

    match agg {
        Aggregation::Count => Ok(Cell::Number(cells.filter(|c| !c.is_null()).count() as f64)),
        Aggregation::Sum | Aggregation::Mean => {
            let mut total = 0.0;
            let mut n = 0usize;
            for cell in cells {
                if let Some(v) = cell.as_number(column)? {
                    total += v;
                    n += 1;
                }
            }
            Ok(match agg {
                Aggregation::Mean if n == 0 => Cell::Null,
                Aggregation::Mean => Cell::Number(total / n as f64),
                _ => Cell::Number(total),
            })
        }
    }
}

/// One row per distinct key tuple: key columns followed by one aggregated
/// column per `(column, aggregation)`, named after the source column.
pub fn group_aggregate(
    table: &Table,
    keys: &[&str],
    values: &[(&str, Aggregation)],
) -> ColumnResult<Table> {
    for (column, _) in values {
        table.column_index(column)?;
    }
    let groups = group_rows(table, keys)?;

    let columns = keys
        .iter()
        .chain(values.iter().map(|(c, _)| c))
        .map(|c| c.to_string())
        .collect();
    let mut out = Table::new(table.name(), columns);

    for (key, rows) in &groups {
        let mut row: Vec<Cell> = key.iter().map(Cell::from).collect();
        for (column, agg) in values {
            row.push(aggregate(table, rows, column, *agg)?);
        }
        out.push_row(row);
    }
    Ok(out)
}

/// Group by `index` plus `dims`, aggregate `values`, and unstack every dim
/// into the columns.
///
/// Output columns are the product of each dim's observed values (outer dim
/// first). With more than one value column the value name becomes the
/// outermost header level. Combinations without rows are null.
pub fn pivot(
    table: &Table,
    index: &str,
    dims: &[&str],
    values: &[&str],
    agg: Aggregation,
) -> ColumnResult<PivotTable> {
    let mut keys = Vec::with_capacity(dims.len() + 1);
    keys.push(index);
    keys.extend_from_slice(dims);

    for value in values {
        table.column_index(value)?;
    }
    let groups = group_rows(table, &keys)?;

    let mut index_keys = BTreeSet::new();
    let mut dim_keys: Vec<BTreeSet<CellKey>> = vec![BTreeSet::new(); dims.len()];
    let mut cells: HashMap<&[CellKey], Vec<Cell>> = HashMap::with_capacity(groups.len());

    for (key, rows) in &groups {
        index_keys.insert(key[0].clone());
        for (set, part) in dim_keys.iter_mut().zip(&key[1..]) {
            set.insert(part.clone());
        }
        let aggregated = values
            .iter()
            .map(|v| aggregate(table, rows, v, agg))
            .collect::<ColumnResult<Vec<_>>>()?;
        cells.insert(key.as_slice(), aggregated);
    }

    let combos = product(&dim_keys);
    let multi_value = values.len() > 1;

    let mut header_levels = Vec::with_capacity(dims.len() + 1);
    if multi_value {
        header_levels.push(String::new());
    }
    header_levels.extend(dims.iter().map(|d| d.to_string()));

    let mut columns = Vec::with_capacity(values.len() * combos.len());
    for value in values {
        for combo in &combos {
            let mut column: Vec<Cell> = Vec::with_capacity(header_levels.len());
            if multi_value {
                column.push(Cell::text(*value));
            }
            column.extend(combo.iter().map(Cell::from));
            columns.push(column);
        }
    }

    let mut index_cells = Vec::with_capacity(index_keys.len());
    let mut grid = Vec::with_capacity(index_keys.len());
    let mut lookup: Vec<CellKey> = Vec::with_capacity(keys.len());

    for idx in index_keys {
        let mut row = Vec::with_capacity(columns.len());
        for v in 0..values.len() {
            for combo in &combos {
                lookup.clear();
                lookup.push(idx.clone());
                lookup.extend(combo.iter().cloned());
                let cell = cells
                    .get(lookup.as_slice())
                    .map(|agg| agg[v].clone())
                    .unwrap_or_default();
                row.push(cell);
            }
        }
        index_cells.push(Cell::from(idx));
        grid.push(row);
    }

    Ok(PivotTable {
        index_name: index.to_string(),
        header_levels,
        columns,
        index: index_cells,
        values: grid,
    })
}

/// Per `index` value, one named aggregate per `(output, column, aggregation)`.
pub fn summarize(
    table: &Table,
    index: &str,
    specs: &[(&str, &str, Aggregation)],
) -> ColumnResult<PivotTable> {
    for (_, column, _) in specs {
        table.column_index(column)?;
    }
    let groups = group_rows(table, &[index])?;

    let mut index_cells = Vec::with_capacity(groups.len());
    let mut grid = Vec::with_capacity(groups.len());
    for (key, rows) in &groups {
        let row = specs
            .iter()
            .map(|(_, column, agg)| aggregate(table, rows, column, *agg))
            .collect::<ColumnResult<Vec<_>>>()?;
        index_cells.push(Cell::from(&key[0]));
        grid.push(row);
    }

    Ok(PivotTable {
        index_name: index.to_string(),
        header_levels: Vec::new(),
        columns: specs.iter().map(|(name, _, _)| vec![Cell::text(*name)]).collect(),
        index: index_cells,
        values: grid,
    })
}

/// Cartesian product of the sets, first set outermost.
fn product(sets: &[BTreeSet<CellKey>]) -> Vec<Vec<CellKey>> {
    sets.iter().fold(vec![Vec::new()], |acc, set| {
        acc.iter()
            .flat_map(|prefix| {
                set.iter().map(move |k| {
                    let mut next = prefix.clone();
                    next.push(k.clone());
                    next
                })
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Cell {
        Cell::text(s)
    }

    fn n(v: f64) -> Cell {
        Cell::Number(v)
    }

    fn sample() -> Table {
        Table::from_rows(
            "POSDATA",
            vec!["ORG".into(), "FUNC".into(), "LEVEL".into(), "PAY".into()],
            vec![
                vec![t("B"), t("Sales"), n(2.0), n(100.0)],
                vec![t("A"), t("Sales"), n(1.0), n(50.0)],
                vec![t("A"), t("HR"), n(1.0), Cell::Null],
                vec![t("A"), t("Sales"), n(2.0), n(70.0)],
                vec![Cell::Null, t("Sales"), n(1.0), n(999.0)],
            ],
        )
    }

    #[test]
    fn test_group_rows_skips_null_keys_and_sorts() {
        let groups = group_rows(&sample(), &["ORG"]).unwrap();
        let keys: Vec<Cell> = groups.keys().map(|k| Cell::from(&k[0])).collect();
        assert_eq!(keys, vec![t("A"), t("B")]);
        assert_eq!(groups.values().map(Vec::len).sum::<usize>(), 4);
    }

    #[test]
    fn test_aggregations() {
        let table = sample();
        let rows = [1, 2, 3];
        assert_eq!(aggregate(&table, &rows, "PAY", Aggregation::Count).unwrap(), n(2.0));
        assert_eq!(aggregate(&table, &rows, "PAY", Aggregation::Sum).unwrap(), n(120.0));
        assert_eq!(aggregate(&table, &rows, "PAY", Aggregation::Mean).unwrap(), n(60.0));
        assert_eq!(aggregate(&table, &[2], "PAY", Aggregation::Mean).unwrap(), Cell::Null);
        assert_eq!(aggregate(&table, &[2], "PAY", Aggregation::Sum).unwrap(), n(0.0));
    }

    #[test]
    fn test_group_aggregate_flat() {
        let out =
            group_aggregate(&sample(), &["ORG", "FUNC"], &[("PAY", Aggregation::Sum)]).unwrap();
        assert_eq!(out.columns(), &["ORG".to_string(), "FUNC".to_string(), "PAY".to_string()]);
        assert_eq!(
            out.rows(),
            &[
                vec![t("A"), t("HR"), n(0.0)],
                vec![t("A"), t("Sales"), n(120.0)],
                vec![t("B"), t("Sales"), n(100.0)],
            ]
        );
    }

    #[test]
    fn test_pivot_single_dim_fills_null() {
        let p = pivot(&sample(), "ORG", &["FUNC"], &["PAY"], Aggregation::Count).unwrap();
        assert_eq!(p.header_levels, vec!["FUNC".to_string()]);
        assert_eq!(p.columns, vec![vec![t("HR")], vec![t("Sales")]]);
        assert_eq!(p.index, vec![t("A"), t("B")]);
        assert_eq!(p.values, vec![vec![n(0.0), n(2.0)], vec![Cell::Null, n(1.0)]]);
    }

    #[test]
    fn test_pivot_two_dims_is_full_product() {
        let p = pivot(&sample(), "ORG", &["FUNC", "LEVEL"], &["PAY"], Aggregation::Mean).unwrap();
        assert_eq!(p.column_count(), 4);
        assert_eq!(p.columns[0], vec![t("HR"), n(1.0)]);
        assert_eq!(p.columns[3], vec![t("Sales"), n(2.0)]);
        assert_eq!(p.value(&t("A"), &[t("Sales"), n(1.0)]), Some(&n(50.0)));
        assert_eq!(p.value(&t("B"), &[t("HR"), n(2.0)]), Some(&Cell::Null));
    }

    #[test]
    fn test_pivot_multiple_values_outermost() {
        let mut table = sample();
        table.set_column("BONUS", vec![n(1.0), n(2.0), n(3.0), n(4.0), n(5.0)]);
        let p = pivot(&table, "ORG", &["FUNC"], &["PAY", "BONUS"], Aggregation::Mean).unwrap();
        assert_eq!(p.header_levels, vec![String::new(), "FUNC".to_string()]);
        assert_eq!(p.column_count(), 4);
        assert_eq!(p.columns[2], vec![t("BONUS"), t("HR")]);
        assert_eq!(p.value(&t("A"), &[t("BONUS"), t("Sales")]), Some(&n(3.0)));
    }

    #[test]
    fn test_summarize_named() {
        let p = summarize(
            &sample(),
            "ORG",
            &[("pay_sum", "PAY", Aggregation::Sum), ("pay_mean", "PAY", Aggregation::Mean)],
        )
        .unwrap();
        assert!(p.header_levels.is_empty());
        assert_eq!(p.value(&t("A"), &[t("pay_sum")]), Some(&n(120.0)));
        assert_eq!(p.value(&t("A"), &[t("pay_mean")]), Some(&n(60.0)));
    }

    #[test]
    fn test_missing_value_column() {
        let err = pivot(&sample(), "ORG", &["FUNC"], &["NOPE"], Aggregation::Sum).unwrap_err();
        assert!(err.to_string().contains("NOPE"));
    }

    #[test]
    fn test_non_numeric_sum_fails() {
        let err = group_aggregate(&sample(), &["ORG"], &[("FUNC", Aggregation::Sum)]).unwrap_err();
        assert!(err.to_string().contains("FUNC"));
    }
}
