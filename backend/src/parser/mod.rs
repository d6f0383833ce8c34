//! Tabular data loader.
//!
//! Turns uploaded bytes into a [`Table`]. Workbooks (xlsx, xlsm, xls, ods)
//! go through calamine and only the first sheet is read. CSV files get
//! encoding and delimiter auto-detection. No domain logic here.

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use crate::error::{LoadError, LoadResult};
use crate::models::{Cell, Table};

/// Spreadsheet formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Xlsx,
    Xls,
    Ods,
    Csv,
}

impl SourceFormat {
    /// Format from a file name's extension. Unknown extensions are rejected.
    pub fn from_file_name(name: &str) -> LoadResult<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "xlsx" | "xlsm" => Ok(SourceFormat::Xlsx),
            "xls" => Ok(SourceFormat::Xls),
            "ods" => Ok(SourceFormat::Ods),
            "csv" => Ok(SourceFormat::Csv),
            _ => Err(LoadError::UnsupportedFormat(name.to_string())),
        }
    }

    /// Guess the format from magic bytes: ZIP container (xlsx/ods),
    /// OLE2 compound file (xls), anything else is treated as CSV text.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"PK\x03\x04") {
            SourceFormat::Xlsx
        } else if bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
            SourceFormat::Xls
        } else {
            SourceFormat::Csv
        }
    }

    /// Format `load_bytes` will use: the extension when a name is given,
    /// otherwise the sniffed content.
    pub fn resolve(bytes: &[u8], file_name: Option<&str>) -> LoadResult<Self> {
        match file_name {
            Some(name) => Self::from_file_name(name),
            None => Ok(Self::sniff(bytes)),
        }
    }

    pub fn is_workbook(self) -> bool {
        !matches!(self, SourceFormat::Csv)
    }
}

/// Result of loading with metadata
#[derive(Debug, Clone, Serialize)]
pub struct ParseResult {
    /// Loaded table
    pub table: Table,
    /// Format used to parse
    pub format: SourceFormat,
    /// Sheet read (workbooks only)
    pub sheet: Option<String>,
    /// Detected encoding (CSV only)
    pub encoding: Option<String>,
    /// Detected delimiter (CSV only)
    pub delimiter: Option<char>,
}

impl ParseResult {
    pub fn headers(&self) -> &[String] {
        self.table.columns()
    }
}

/// Load a spreadsheet from raw bytes.
///
/// `file_name` selects the format by extension; without it the format is
/// sniffed from the content. `table_name` labels the table in later
/// Missing-Column errors.
pub fn load_bytes(
    bytes: &[u8],
    file_name: Option<&str>,
    table_name: &str,
) -> LoadResult<ParseResult> {
    if bytes.is_empty() {
        return Err(LoadError::EmptyFile);
    }

    let format = SourceFormat::resolve(bytes, file_name)?;

    if format.is_workbook() {
        let (table, sheet) = parse_workbook(bytes, table_name)?;
        Ok(ParseResult {
            table,
            format,
            sheet: Some(sheet),
            encoding: None,
            delimiter: None,
        })
    } else {
        let encoding = detect_encoding(bytes);
        let content = decode_content(bytes, &encoding)?;
        let delimiter = detect_delimiter(&content);
        let table = parse_csv_str(&content, delimiter, table_name)?;
        Ok(ParseResult {
            table,
            format,
            sheet: None,
            encoding: Some(encoding),
            delimiter: Some(delimiter),
        })
    }
}

/// Load a spreadsheet file from disk.
pub fn load_file<P: AsRef<Path>>(path: P, table_name: &str) -> LoadResult<ParseResult> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let name = path.file_name().and_then(|n| n.to_str());
    load_bytes(&bytes, name, table_name)
}

// =============================================================================
// Workbooks
// =============================================================================

/// Read the first sheet of a workbook. First row is the header.
pub fn parse_workbook(bytes: &[u8], table_name: &str) -> LoadResult<(Table, String)> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| LoadError::Workbook(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(LoadError::NoSheets)?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| LoadError::Workbook(format!("Failed to read sheet '{}': {}", sheet_name, e)))?;

    Ok((range_to_table(&range, table_name)?, sheet_name))
}

fn range_to_table(range: &Range<Data>, table_name: &str) -> LoadResult<Table> {
    let (height, width) = range.get_size();
    if height == 0 || width == 0 {
        return Err(LoadError::EmptyFile);
    }

    let mut rows = range.rows();
    let header_row = rows.next().ok_or(LoadError::NoHeaders)?;
    let headers: Vec<Cell> = header_row.iter().map(data_to_cell).collect();
    if headers.iter().all(Cell::is_null) {
        return Err(LoadError::NoHeaders);
    }

    let mut table = Table::new(table_name, header_names(&headers));
    for row in rows {
        table.push_row(row.iter().map(data_to_cell).collect());
    }
    Ok(table)
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Null,
        Data::String(s) if s.is_empty() => Cell::Null,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::text(if *b { "TRUE" } else { "FALSE" }),
        // Date cells keep their serial number
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Header names: blank cells become `Unnamed: {i}`, repeats get `.1`, `.2`.
fn header_names(cells: &[Cell]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let base = match cell {
                Cell::Null => format!("Unnamed: {}", i),
                other => other.to_string(),
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}

// =============================================================================
// CSV
// =============================================================================

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> LoadResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8(bytes.to_vec())
            .map_err(|e| LoadError::EncodingError(e.to_string())),
        "iso-8859-1" | "latin-1" | "latin1" => {
            Ok(encoding_rs::ISO_8859_15.decode(bytes).0.into_owned())
        }
        "windows-1252" | "cp1252" => Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()),
        // Unknown charset: best effort
        _ => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text with an explicit delimiter. Numeric-looking cells become
/// numbers, empty cells become nulls, blank lines are skipped.
pub fn parse_csv_str(content: &str, delimiter: char, table_name: &str) -> LoadResult<Table> {
    if content.trim().is_empty() {
        return Err(LoadError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let header_cells: Vec<Cell> = reader
        .headers()
        .map_err(|e| LoadError::Csv(e.to_string()))?
        .iter()
        .map(|h| if h.is_empty() { Cell::Null } else { Cell::text(h) })
        .collect();

    if header_cells.iter().all(Cell::is_null) {
        return Err(LoadError::NoHeaders);
    }

    let mut table = Table::new(table_name, header_names(&header_cells));
    for record in reader.records() {
        let record = record.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(0);
            LoadError::Csv(format!("line {}: {}", line, e))
        })?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        table.push_row(record.iter().map(csv_cell).collect());
    }

    Ok(table)
}

fn csv_cell(raw: &str) -> Cell {
    if raw.is_empty() {
        return Cell::Null;
    }
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Cell::Number(n),
        _ => Cell::text(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let table = parse_csv_str("name;age\nAlice;30\nBob;", ';', "T").unwrap();

        assert_eq!(table.columns(), &["name".to_string(), "age".to_string()]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0], vec![Cell::text("Alice"), Cell::Number(30.0)]);
        assert_eq!(table.rows()[1], vec![Cell::text("Bob"), Cell::Null]);
    }

    #[test]
    fn test_quoted_values() {
        let csv = "name,value\n\"Alice\",\"Hello, World\"";
        let table = parse_csv_str(csv, ',', "T").unwrap();
        assert_eq!(table.rows()[0][1], Cell::text("Hello, World"));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = parse_csv_str("a;b\n1;2\n\n3;4\n", ';', "T").unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_blank_and_duplicate_headers() {
        let table = parse_csv_str("a,,a\n1,2,3", ',', "T").unwrap();
        assert_eq!(
            table.columns(),
            &["a".to_string(), "Unnamed: 1".to_string(), "a.1".to_string()]
        );
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(parse_csv_str("", ';', "T"), Err(LoadError::EmptyFile)));
        assert!(matches!(load_bytes(b"", None, "T"), Err(LoadError::EmptyFile)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_auto_load_csv_bytes() {
        let result = load_bytes(b"OBJECTID;SMI_CODE\n1;ORG1\n2;ORG2", None, "POSDATA").unwrap();

        assert_eq!(result.format, SourceFormat::Csv);
        assert_eq!(result.delimiter, Some(';'));
        assert_eq!(result.table.name(), "POSDATA");
        assert_eq!(result.headers(), &["OBJECTID".to_string(), "SMI_CODE".to_string()]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert!(decoded.starts_with("Soci"));
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let err = load_bytes(b"whatever", Some("report.pdf"), "T").unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(_)));
        assert_eq!(SourceFormat::from_file_name("POSDATA.XLSX").unwrap(), SourceFormat::Xlsx);
    }

    #[test]
    fn test_sniff() {
        assert_eq!(SourceFormat::sniff(b"PK\x03\x04rest"), SourceFormat::Xlsx);
        assert_eq!(SourceFormat::sniff(&[0xD0, 0xCF, 0x11, 0xE0, 0]), SourceFormat::Xls);
        assert_eq!(SourceFormat::sniff(b"a,b\n1,2"), SourceFormat::Csv);
    }

    #[test]
    fn test_corrupt_workbook_is_parse_error() {
        let bytes = b"PK\x03\x04 definitely not a zip";
        let err = load_bytes(bytes, Some("POSDATA.xlsx"), "POSDATA").unwrap_err();
        assert!(matches!(err, LoadError::Workbook(_)));
    }

    #[test]
    fn test_load_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pname.csv");
        std::fs::write(&path, "Job Code;Function;Comments\nJ1;Sales;\nJ2;HR;N\n").unwrap();

        let result = load_file(&path, "PNAME").unwrap();

        assert_eq!(result.format, SourceFormat::Csv);
        assert_eq!(result.delimiter, Some(';'));
        assert_eq!(result.table.name(), "PNAME");
        assert_eq!(result.table.rows()[0][2], Cell::Null);
        assert_eq!(result.table.rows()[1][2], Cell::text("N"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(dir.path().join("absent.xlsx"), "POSDATA").unwrap_err();
        assert!(matches!(err, LoadError::IoError(_)));
    }
}
