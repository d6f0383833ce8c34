//! REST API response types and error mapping.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{PipelineError, ServerError};
use crate::export::XLSX_CONTENT_TYPE;
use crate::parser::{ParseResult, SourceFormat};
use crate::transform::pipeline::Download;

/// Rows echoed back after an upload
pub const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

/// What the server knows about one uploaded file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub role: String,
    pub file_name: String,
    pub format: SourceFormat,
    pub sheet: Option<String>,
    pub encoding: Option<String>,
    pub row_count: usize,
    pub columns: Vec<String>,
    /// Same bytes were already parsed
    pub cached: bool,
    pub preview: Vec<Value>,
}

impl UploadSummary {
    pub fn new(role: &str, file_name: &str, parsed: &ParseResult, cached: bool) -> Self {
        Self {
            role: role.to_string(),
            file_name: file_name.to_string(),
            format: parsed.format,
            sheet: parsed.sheet.clone(),
            encoding: parsed.encoding.clone(),
            row_count: parsed.table.len(),
            columns: parsed.headers().to_vec(),
            cached,
            preview: parsed.table.preview(PREVIEW_ROWS),
        }
    }
}

/// Session state for the UI: which inputs are present and the choices
/// offered for custom group-bys.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub posdata: Option<UploadSummary>,
    pub pname: Option<UploadSummary>,
    /// Both inputs uploaded; clean and RDPAC are available
    pub ready: bool,
    /// POSDATA columns, for group-by and exclude-flag selection
    pub group_by_options: Vec<String>,
    pub metric_options: Vec<&'static str>,
}

/// Error body: `{ "status": "error", "error": ..., "kind": ... }`
pub fn error_response(error: &str, kind: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
        "kind": kind,
    })
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Pipeline(e) => match e {
                PipelineError::Load(_) => StatusCode::BAD_REQUEST,
                PipelineError::Column(_)
                | PipelineError::Validation(_)
                | PipelineError::EmptyInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
                PipelineError::MissingUpload(_) => StatusCode::CONFLICT,
                PipelineError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Pipeline(e) => e.kind(),
            ServerError::BadRequest(_) => "bad_request",
            ServerError::SessionNotFound(_) => "not_found",
            ServerError::PayloadTooLarge(_) => "too_large",
            ServerError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            eprintln!("❌ {}", self);
        }
        (status, Json(error_response(&self.to_string(), self.kind()))).into_response()
    }
}

/// xlsx attachment named after the download.
impl IntoResponse for Download {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", self.file_name),
                ),
            ],
            self.bytes,
        )
            .into_response()
    }
}
