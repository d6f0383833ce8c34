//! # HCE - HR compensation data explorer
//!
//! Cleans a POSDATA position extract against the PNAME job reference and
//! produces grouped compensation reports as xlsx files.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐    ┌───────────┐    ┌──────────┐    ┌───────────┐    ┌──────┐
//! │ POSDATA  │───▶│  Parser   │───▶│ Cleaner  │───▶│  Grouper  │───▶│ xlsx │
//! │ + PNAME  │    │ (auto-fmt)│    │ (merge)  │    │ (RDPAC /  │    │      │
//! │          │    │           │    │          │    │  custom)  │    │      │
//! └──────────┘    └───────────┘    └──────────┘    └───────────┘    └──────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hce::{load_file, CleanOptions};
//! use hce::transform::pipeline::rdpac_to_xlsx;
//!
//! let posdata = load_file("POSDATA.xlsx", "POSDATA")?;
//! let pname = load_file("PNAME.xlsx", "PNAME")?;
//! let download = rdpac_to_xlsx(&posdata.table, &pname.table, &CleanOptions::default())?;
//! std::fs::write(download.file_name, download.bytes)?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, tables, pivot tables, column names
//! - [`parser`] - Workbook and CSV loading
//! - [`cache`] - Content-addressed parse cache
//! - [`validation`] - Group-by and metric selection checks
//! - [`transform`] - Cleaning, pivots, RDPAC and custom group-bys
//! - [`export`] - xlsx writing
//! - [`config`] - Environment settings
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Loading
pub mod cache;
pub mod parser;

// Transformation
pub mod transform;
pub mod validation;

// Output
pub mod export;

pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ColumnError, ConfigError, ExportError, LoadError, PipelineError, PipelineResult, ServerError,
    ValidationError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, CellKey, PivotTable, Table, TenureBucket};

// =============================================================================
// Re-exports - Loading
// =============================================================================

pub use cache::LoadCache;
pub use parser::{load_bytes, load_file, ParseResult, SourceFormat};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    group_rdpac, AggregationMode, CleanOptions, CleanStats, Cleaned, CustomRequest, Method,
    RdpacReport, RDPAC_SHEET_NAMES,
};

pub use transform::pipeline::Download;

// =============================================================================
// Re-exports - Export
// =============================================================================

pub use export::{export_report, export_table, CUSTOM_FILE_NAME, POSDATA_FILE_NAME, RDPAC_FILE_NAME};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::Settings;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
