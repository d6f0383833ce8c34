//! High-level pipeline API: load → clean → aggregate → export.
//!
//! Each function takes its tables explicitly and reports progress through
//! the log broadcaster. The HTTP handlers and the CLI are thin wrappers over
//! these functions.
//!
//! # Example
//!
//! ```rust,ignore
//! use hce::cache::LoadCache;
//! use hce::transform::pipeline::{load_table, rdpac_to_xlsx};
//! use hce::transform::CleanOptions;
//!
//! let mut cache = LoadCache::default();
//! let posdata = load_table(&mut cache, &posdata_bytes, Some("POSDATA.xlsx"), "POSDATA")?;
//! let pname = load_table(&mut cache, &pname_bytes, Some("PNAME.xlsx"), "PNAME")?;
//! let download = rdpac_to_xlsx(&posdata.table, &pname.table, &CleanOptions::default())?;
//! std::fs::write(download.file_name, &download.bytes)?;
//! ```

use serde::Serialize;
use std::sync::Arc;

use crate::api::logs::{log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::cache::{cache_key, LoadCache};
use crate::error::PipelineResult;
use crate::export::{
    export_report, export_table, CUSTOM_FILE_NAME, POSDATA_FILE_NAME, RDPAC_FILE_NAME,
};
use crate::models::Table;
use crate::parser::{load_bytes, ParseResult, SourceFormat};

use super::cleaner::{self, CleanOptions, CleanStats, Cleaned};
use super::custom::{self, AggregationMode, CustomRequest};
use super::grouper::{group_rdpac, RdpacReport, RDPAC_SHEET_NAMES};

/// An xlsx file ready to hand to the user.
#[derive(Debug, Clone, Serialize)]
pub struct Download {
    pub file_name: &'static str,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Load an upload through `cache`.
pub fn load_table(
    cache: &mut LoadCache,
    bytes: &[u8],
    file_name: Option<&str>,
    table_name: &str,
) -> PipelineResult<Arc<ParseResult>> {
    let key = cache_key(bytes, file_name, table_name)?;
    if let Some(hit) = cache.get(&key) {
        log_cache_hit(&hit, table_name);
        return Ok(hit);
    }

    let parsed = read_upload(bytes, file_name, table_name)?;
    Ok(cache.insert(key, Arc::new(parsed)))
}

/// Parse an upload without touching any cache.
pub fn read_upload(
    bytes: &[u8],
    file_name: Option<&str>,
    table_name: &str,
) -> PipelineResult<ParseResult> {
    log_info(format!("📖 Reading {}...", file_name.unwrap_or(table_name)));
    let parsed = load_bytes(bytes, file_name, table_name)?;

    match (&parsed.sheet, &parsed.encoding) {
        (Some(sheet), _) => log_info_indent(format!("Sheet: {}", sheet), 1),
        (None, Some(encoding)) => log_info_indent(format!("Encoding: {}", encoding), 1),
        (None, None) => {}
    }
    if parsed.format == SourceFormat::Csv {
        if let Some(delimiter) = parsed.delimiter {
            log_info_indent(format!("Separator: {}", format_delimiter(delimiter)), 1);
        }
    }
    log_loaded(&parsed, table_name);
    Ok(parsed)
}

/// Log an upload served from the cache.
pub fn log_cache_hit(parsed: &ParseResult, table_name: &str) {
    log_success(format!("{} served from cache", table_name));
    log_loaded(parsed, table_name);
}

fn log_loaded(parsed: &ParseResult, table_name: &str) {
    log_success(format!(
        "{}: {} rows, {} columns",
        table_name,
        parsed.table.len(),
        parsed.table.width()
    ));
}

/// Clean POSDATA against PNAME.
pub fn clean(posdata: &Table, pname: &Table, options: &CleanOptions) -> PipelineResult<Cleaned> {
    log_info(format!("🧹 Cleaning {} (tenure year {})...", posdata.name(), options.current_year));
    let cleaned = cleaner::clean(posdata, pname, options)?;
    log_clean_stats(&cleaned.stats);
    Ok(cleaned)
}

fn log_clean_stats(stats: &CleanStats) {
    log_info_indent(format!("{} rows matched a job code", stats.matched_rows), 1);
    if stats.unmatched_rows > 0 {
        log_warning_indent(format!("{} rows without a PNAME match", stats.unmatched_rows), 1);
    }
    if stats.excluded_rows > 0 {
        log_info_indent(format!("{} rows dropped by Comments = N", stats.excluded_rows), 1);
    }
    log_success(format!("Cleaned: {} → {} rows", stats.input_rows, stats.output_rows));
}

/// The eleven RDPAC tables from a cleaned table.
pub fn rdpac_report(cleaned: &Table) -> PipelineResult<RdpacReport> {
    log_info("📊 Building RDPAC report...");
    let report = group_rdpac(cleaned)?;
    for (name, pivot) in report.sheets() {
        log_info_indent(format!("{}: {} x {}", name, pivot.row_count(), pivot.column_count()), 1);
    }
    log_success(format!("{} tables", report.len()));
    Ok(report)
}

/// Custom group-by over `table`.
pub fn custom_groupby(table: &Table, request: &CustomRequest) -> PipelineResult<Table> {
    let what = match &request.mode {
        AggregationMode::Headcount => "headcount".to_string(),
        AggregationMode::Compensation { metrics, method, .. } => {
            format!("{:?} of {}", method, metrics.join(", ")).to_lowercase()
        }
    };
    log_info(format!("🔎 Grouping by {} ({})...", request.group_by.join(", "), what));

    let out = custom::custom_groupby(table, request)?;
    if out.is_empty() {
        log_warning("No rows left to group");
    }
    log_success(format!("{} groups", out.len()));
    Ok(out)
}

/// Clean and serialize as `POSDATA_NEW.xlsx`.
pub fn clean_to_xlsx(
    posdata: &Table,
    pname: &Table,
    options: &CleanOptions,
) -> PipelineResult<Download> {
    let cleaned = clean(posdata, pname, options)?;
    let bytes = export_table(&cleaned.table)?;
    log_success(format!("💾 {} ready ({} bytes)", POSDATA_FILE_NAME, bytes.len()));
    Ok(Download {
        file_name: POSDATA_FILE_NAME,
        bytes,
    })
}

/// Clean, group, and serialize as the eleven-sheet `Grouped_Data.xlsx`.
pub fn rdpac_to_xlsx(
    posdata: &Table,
    pname: &Table,
    options: &CleanOptions,
) -> PipelineResult<Download> {
    let cleaned = clean(posdata, pname, options)?;
    let report = rdpac_report(&cleaned.table)?;
    let bytes = export_report(&report.tables, &RDPAC_SHEET_NAMES)?;
    log_success(format!("💾 {} ready ({} bytes)", RDPAC_FILE_NAME, bytes.len()));
    Ok(Download {
        file_name: RDPAC_FILE_NAME,
        bytes,
    })
}

/// Group and serialize as `Customise_groupby.xlsx`.
pub fn custom_to_xlsx(table: &Table, request: &CustomRequest) -> PipelineResult<Download> {
    let grouped = custom_groupby(table, request)?;
    let bytes = export_table(&grouped)?;
    log_success(format!("💾 {} ready ({} bytes)", CUSTOM_FILE_NAME, bytes.len()));
    Ok(Download {
        file_name: CUSTOM_FILE_NAME,
        bytes,
    })
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        ';' => "semicolon".to_string(),
        ',' => "comma".to_string(),
        '|' => "pipe".to_string(),
        _ => d.to_string(),
    }
}
