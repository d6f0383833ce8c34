//! xlsx serialization of tables and pivot reports.
//!
//! Two layouts:
//!
//! - [`export_table`] writes a flat [`Table`] to `Sheet1`: header row, then
//!   one row per record, no index column.
//! - [`export_report`] writes one sheet per [`PivotTable`]. With a single
//!   header level the first row holds the index name followed by the column
//!   keys. With several levels each level gets its own row (level name in
//!   column A) and a final row holds the index name above the index values.

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::error::{ExportError, ExportResult};
use crate::models::{Cell, PivotTable, Table};

/// Download name of the cleaned POSDATA.
pub const POSDATA_FILE_NAME: &str = "POSDATA_NEW.xlsx";
/// Download name of a custom group-by.
pub const CUSTOM_FILE_NAME: &str = "Customise_groupby.xlsx";
/// Download name of the RDPAC report.
pub const RDPAC_FILE_NAME: &str = "Grouped_Data.xlsx";

/// Sheet used for flat tables.
pub const DEFAULT_SHEET: &str = "Sheet1";

/// MIME type of xlsx downloads.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

/// Write a flat table to a single-sheet workbook.
pub fn export_table(table: &Table) -> ExportResult<Vec<u8>> {
    check_size(DEFAULT_SHEET, table.len() + 1, table.width())?;

    let mut workbook = Workbook::new();
    let header = header_format();
    let sheet = workbook.add_worksheet().set_name(DEFAULT_SHEET)?;

    for (c, name) in table.columns().iter().enumerate() {
        sheet.write_string_with_format(0, c as u16, name, &header)?;
    }
    for (r, row) in table.rows().iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            write_cell(sheet, r as u32 + 1, c as u16, cell)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Write one sheet per pivot table, named by `sheet_names` in order.
pub fn export_report(tables: &[PivotTable], sheet_names: &[&str]) -> ExportResult<Vec<u8>> {
    if tables.len() != sheet_names.len() {
        return Err(ExportError::SheetCountMismatch {
            tables: tables.len(),
            names: sheet_names.len(),
        });
    }

    let mut workbook = Workbook::new();
    let header = header_format();
    for (pivot, name) in tables.iter().zip(sheet_names) {
        let sheet = workbook.add_worksheet().set_name(*name)?;
        write_pivot(sheet, name, pivot, &header)?;
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_pivot(
    sheet: &mut Worksheet,
    name: &str,
    pivot: &PivotTable,
    header: &Format,
) -> ExportResult<()> {
    let levels = pivot.header_levels.len();
    let header_rows = if levels > 1 { levels + 1 } else { 1 };
    check_size(name, header_rows + pivot.row_count(), pivot.column_count() + 1)?;

    if levels > 1 {
        for (l, level) in pivot.header_levels.iter().enumerate() {
            sheet.write_string_with_format(l as u32, 0, level, header)?;
            for (c, key) in pivot.columns.iter().enumerate() {
                write_header_cell(sheet, l as u32, c as u16 + 1, key.get(l), header)?;
            }
        }
        sheet.write_string_with_format(levels as u32, 0, &pivot.index_name, header)?;
    } else {
        sheet.write_string_with_format(0, 0, &pivot.index_name, header)?;
        for (c, key) in pivot.columns.iter().enumerate() {
            write_header_cell(sheet, 0, c as u16 + 1, key.first(), header)?;
        }
    }

    for (r, (index, row)) in pivot.index.iter().zip(&pivot.values).enumerate() {
        let at = (header_rows + r) as u32;
        write_cell(sheet, at, 0, index)?;
        for (c, cell) in row.iter().enumerate() {
            write_cell(sheet, at, c as u16 + 1, cell)?;
        }
    }
    Ok(())
}

fn write_header_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    key: Option<&Cell>,
    header: &Format,
) -> ExportResult<()> {
    match key {
        Some(Cell::Number(n)) if n.is_finite() => {
            sheet.write_number_with_format(row, col, *n, header)?;
        }
        Some(Cell::Text(s)) => {
            sheet.write_string_with_format(row, col, s, header)?;
        }
        _ => {}
    }
    Ok(())
}

/// Number → numeric cell, text → string cell, null (and non-finite) → blank.
fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> ExportResult<()> {
    match cell {
        Cell::Number(n) if n.is_finite() => {
            sheet.write_number(row, col, *n)?;
        }
        Cell::Text(s) => {
            sheet.write_string(row, col, s)?;
        }
        _ => {}
    }
    Ok(())
}

fn header_format() -> Format {
    Format::new().set_bold()
}

fn check_size(sheet: &str, rows: usize, cols: usize) -> ExportResult<()> {
    if rows > MAX_ROWS || cols > MAX_COLS {
        return Err(ExportError::TooLarge {
            sheet: sheet.to_string(),
            rows,
            cols,
        });
    }
    Ok(())
}
