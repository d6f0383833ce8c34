//! Error types for the HCE cleaning and aggregation pipeline.
//!
//! This module defines one error type per concern:
//!
//! - [`LoadError`] - Spreadsheet / CSV parsing errors
//! - [`ColumnError`] - Missing or non-numeric columns
//! - [`ValidationError`] - Invalid user selections (group-by, metrics)
//! - [`ExportError`] - xlsx serialization errors
//! - [`ConfigError`] - Invalid environment configuration
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Loading Errors
// =============================================================================

/// Errors while turning uploaded bytes into a table.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// File extension is not a supported spreadsheet format.
    #[error("Unsupported file type '{0}' (expected .xlsx, .xlsm, .xls, .ods or .csv)")]
    UnsupportedFormat(String),

    /// The workbook could not be opened or a sheet could not be read.
    #[error("Invalid workbook: {0}")]
    Workbook(String),

    /// The workbook has no worksheet.
    #[error("Workbook contains no sheets")]
    NoSheets,

    /// Invalid CSV content.
    #[error("Invalid CSV format: {0}")]
    Csv(String),

    /// Failed to decode the text encoding.
    #[error("Failed to decode content: {0}")]
    EncodingError(String),

    /// Empty file or sheet.
    #[error("File is empty")]
    EmptyFile,

    /// No header row found.
    #[error("No header row found")]
    NoHeaders,
}

// =============================================================================
// Column Errors
// =============================================================================

/// Errors about the columns of a table.
#[derive(Debug, Error)]
pub enum ColumnError {
    /// A required column is absent from a table.
    #[error("Missing column '{column}' in {table}")]
    MissingColumn { table: String, column: String },

    /// A numeric column holds a value that is not a number.
    #[error("Column '{column}' holds non-numeric value '{value}'")]
    NotNumeric { column: String, value: String },
}

impl ColumnError {
    pub fn missing(table: impl Into<String>, column: impl Into<String>) -> Self {
        ColumnError::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Invalid user selections, reported before any computation runs.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// No group-by column selected.
    #[error("Select at least one group-by column")]
    EmptyGroupBy,

    /// Compensation mode without any metric column.
    #[error("Select at least one compensation metric")]
    EmptyMetrics,

    /// The same column was selected twice.
    #[error("Column '{0}' is selected more than once")]
    DuplicateColumn(String),

    /// A metric column is also used as a group-by key.
    #[error("Column '{0}' cannot be both a group-by key and a metric")]
    MetricIsGroupKey(String),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing xlsx output.
#[derive(Debug, Error)]
pub enum ExportError {
    /// rust_xlsxwriter failure.
    #[error("xlsx writer error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Number of sheet names does not match number of tables.
    #[error("Got {tables} tables but {names} sheet names")]
    SheetCountMismatch { tables: usize, names: usize },

    /// Table exceeds the worksheet limits.
    #[error("Sheet '{sheet}' is too large: {rows} rows x {cols} columns")]
    TooLarge { sheet: String, rows: usize, cols: usize },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid configuration value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {message}")]
    InvalidValue {
        key: &'static str,
        value: String,
        message: String,
    },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by everything in
/// [`crate::transform::pipeline`]. It wraps all lower-level errors and adds
/// pipeline-specific variants.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Parse error.
    #[error("Parse error: {0}")]
    Load(#[from] LoadError),

    /// Missing-column error.
    #[error("{0}")]
    Column(#[from] ColumnError),

    /// Invalid selection.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// An input table has no rows.
    #[error("{0} has no rows")]
    EmptyInput(String),

    /// A required upload has not been provided yet.
    #[error("{0} file has not been uploaded")]
    MissingUpload(&'static str),
}

impl PipelineError {
    /// Short machine-readable category, used by the HTTP layer.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Load(_) => "parse",
            PipelineError::Column(_) => "column",
            PipelineError::Validation(_) => "validation",
            PipelineError::Export(_) => "export",
            PipelineError::EmptyInput(_) => "empty_input",
            PipelineError::MissingUpload(_) => "missing_upload",
        }
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Unknown session identifier.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Upload larger than the configured limit.
    #[error("Upload exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<LoadError> for ServerError {
    fn from(e: LoadError) -> Self {
        ServerError::Pipeline(e.into())
    }
}

impl From<ValidationError> for ServerError {
    fn from(e: ValidationError) -> Self {
        ServerError::Pipeline(e.into())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for column lookups.
pub type ColumnResult<T> = Result<T, ColumnError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // LoadError -> PipelineError
        let load_err = LoadError::EmptyFile;
        let pipeline_err: PipelineError = load_err.into();
        assert!(pipeline_err.to_string().contains("empty"));
        assert_eq!(pipeline_err.kind(), "parse");

        // ColumnError -> PipelineError
        let column_err = ColumnError::missing("POSDATA", "HIRE_YEAR");
        let pipeline_err: PipelineError = column_err.into();
        assert!(pipeline_err.to_string().contains("HIRE_YEAR"));
        assert_eq!(pipeline_err.kind(), "column");
    }

    #[test]
    fn test_missing_column_names_table_and_column() {
        let msg = ColumnError::missing("PNAME", "Comments").to_string();
        assert!(msg.contains("PNAME"));
        assert!(msg.contains("'Comments'"));
    }

    #[test]
    fn test_server_error_wraps_validation() {
        let err: ServerError = ValidationError::EmptyGroupBy.into();
        match err {
            ServerError::Pipeline(PipelineError::Validation(ValidationError::EmptyGroupBy)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
}
