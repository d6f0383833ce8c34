//! In-memory tables.
//!
//! [`Table`] is the loaded/cleaned row set; [`PivotTable`] is what a
//! group-by with unstacked dimensions produces.

use serde::Serialize;
use serde_json::{Map, Value};

use super::Cell;
use crate::error::{ColumnError, ColumnResult};

// =============================================================================
// Table
// =============================================================================

/// Ordered columns plus rows. Every row has one cell per column.
///
/// `name` labels the table in error messages ("POSDATA", "PNAME", ...) and
/// does not take part in equality.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns && self.rows == other.rows
    }
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from rows, padding short rows with `Null` and
    /// truncating long ones.
    pub fn from_rows(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut table = Self::new(name, columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    /// Position of `column`, or a Missing-Column error naming it.
    pub fn column_index(&self, column: &str) -> ColumnResult<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| ColumnError::missing(&self.name, column))
    }

    /// Fail on the first of `columns` that the table lacks.
    pub fn require<S: AsRef<str>>(&self, columns: &[S]) -> ColumnResult<()> {
        for column in columns {
            self.column_index(column.as_ref())?;
        }
        Ok(())
    }

    pub fn column(&self, column: &str) -> ColumnResult<impl Iterator<Item = &Cell> + '_> {
        let idx = self.column_index(column)?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Cell at `row` in `column`.
    pub fn get(&self, row: usize, column: &str) -> ColumnResult<Option<&Cell>> {
        let idx = self.column_index(column)?;
        Ok(self.rows.get(row).map(|r| &r[idx]))
    }

    /// Replace the values of `column`, or append it when absent.
    pub fn set_column(&mut self, column: &str, values: Vec<Cell>) {
        debug_assert_eq!(values.len(), self.rows.len());
        match self.columns.iter().position(|c| c == column) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(column.to_string());
                let mut values = values.into_iter();
                for row in self.rows.iter_mut() {
                    row.push(values.next().unwrap_or_default());
                }
            }
        }
    }

    /// New table with only `columns`, in that order.
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> ColumnResult<Table> {
        let indices = columns
            .iter()
            .map(|c| self.column_index(c.as_ref()))
            .collect::<ColumnResult<Vec<_>>>()?;

        Ok(Table {
            name: self.name.clone(),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// New table without `column`.
    pub fn drop_column(&self, column: &str) -> ColumnResult<Table> {
        let idx = self.column_index(column)?;
        let mut out = self.clone();
        out.columns.remove(idx);
        for row in out.rows.iter_mut() {
            row.remove(idx);
        }
        Ok(out)
    }

    /// New table with the rows for which `keep` returns true.
    pub fn filter_rows(&self, mut keep: impl FnMut(&[Cell]) -> bool) -> Table {
        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }

    /// First `limit` rows as JSON objects keyed by column name.
    pub fn preview(&self, limit: usize) -> Vec<Value> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                let obj: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(c, v)| (c.clone(), serde_json::to_value(v).unwrap_or(Value::Null)))
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }
}

// =============================================================================
// PivotTable
// =============================================================================

/// Result of a group-by whose non-index dimensions were unstacked into
/// columns.
///
/// `header_levels` names the column levels (outermost first) and every entry
/// of `columns` has one key part per level. `values[r][c]` is the cell for
/// `index[r]` and `columns[c]`; combinations absent from the data are `Null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable {
    pub index_name: String,
    pub header_levels: Vec<String>,
    pub columns: Vec<Vec<Cell>>,
    pub index: Vec<Cell>,
    pub values: Vec<Vec<Cell>>,
}

impl PivotTable {
    pub fn row_count(&self) -> usize {
        self.index.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_position(&self, key: &[Cell]) -> Option<usize> {
        self.columns.iter().position(|c| c.as_slice() == key)
    }

    pub fn row_position(&self, index: &Cell) -> Option<usize> {
        self.index.iter().position(|i| i == index)
    }

    /// Value at (`index`, `column`), `None` when either key is absent.
    pub fn value(&self, index: &Cell, column: &[Cell]) -> Option<&Cell> {
        let r = self.row_position(index)?;
        let c = self.column_position(column)?;
        self.values.get(r).and_then(|row| row.get(c))
    }

    /// Append a column; the key is padded to the number of header levels.
    pub fn push_column(&mut self, mut key: Vec<Cell>, values: Vec<Cell>) {
        key.resize(self.header_levels.len().max(1), Cell::Null);
        self.columns.push(key);
        let mut values = values.into_iter();
        for row in self.values.iter_mut() {
            row.push(values.next().unwrap_or_default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            "POSDATA",
            vec!["A".into(), "B".into()],
            vec![
                vec![Cell::Number(1.0), Cell::text("x")],
                vec![Cell::Number(2.0)],
            ],
        )
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = sample();
        assert_eq!(table.rows()[1], vec![Cell::Number(2.0), Cell::Null]);
    }

    #[test]
    fn test_missing_column_names_table() {
        let err = sample().column_index("C").unwrap_err();
        assert_eq!(err.to_string(), "Missing column 'C' in POSDATA");
    }

    #[test]
    fn test_select_reorders() {
        let selected = sample().select(&["B", "A"]).unwrap();
        assert_eq!(selected.columns(), &["B".to_string(), "A".to_string()]);
        assert_eq!(selected.rows()[0], vec![Cell::text("x"), Cell::Number(1.0)]);
    }

    #[test]
    fn test_set_column_appends_and_replaces() {
        let mut table = sample();
        table.set_column("C", vec![Cell::Number(9.0), Cell::Null]);
        assert_eq!(table.width(), 3);
        table.set_column("A", vec![Cell::Null, Cell::Null]);
        assert!(table.column("A").unwrap().all(Cell::is_null));
    }

    #[test]
    fn test_filter_does_not_touch_source() {
        let table = sample();
        let filtered = table.filter_rows(|row| row[1].is_null());
        assert_eq!(filtered.len(), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_equality_ignores_name() {
        assert_eq!(sample(), sample().with_name("other"));
    }

    #[test]
    fn test_preview_json() {
        let preview = sample().preview(1);
        assert_eq!(preview.len(), 1);
        assert_eq!(preview[0]["A"], 1.0);
        assert_eq!(preview[0]["B"], "x");
    }

    #[test]
    fn test_pivot_lookup() {
        let mut pivot = PivotTable {
            index_name: "SMI_CODE".into(),
            header_levels: vec!["Function".into()],
            columns: vec![vec![Cell::text("Sales")]],
            index: vec![Cell::text("ORG1")],
            values: vec![vec![Cell::Number(3.0)]],
        };
        pivot.push_column(vec![Cell::text("Headcount")], vec![Cell::Number(3.0)]);

        assert_eq!(pivot.column_count(), 2);
        assert_eq!(
            pivot.value(&Cell::text("ORG1"), &[Cell::text("Headcount")]),
            Some(&Cell::Number(3.0))
        );
        assert!(pivot.value(&Cell::text("ORG2"), &[Cell::text("Sales")]).is_none());
    }
}
