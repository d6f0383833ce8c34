//! HTTP server for the compensation explorer.
//!
//! # API Endpoints
//!
//! | Method | Path                          | Description                           |
//! |--------|-------------------------------|---------------------------------------|
//! | GET    | `/health`                     | Health check                          |
//! | POST   | `/api/sessions`               | Create a session                      |
//! | GET    | `/api/sessions/{id}`          | Upload state, columns, metric options |
//! | DELETE | `/api/sessions/{id}`          | Drop a session                        |
//! | POST   | `/api/sessions/{id}/posdata`  | Upload POSDATA (multipart `file`)     |
//! | POST   | `/api/sessions/{id}/pname`    | Upload PNAME (multipart `file`)       |
//! | POST   | `/api/sessions/{id}/clean`    | Download `POSDATA_NEW.xlsx`           |
//! | POST   | `/api/sessions/{id}/rdpac`    | Download `Grouped_Data.xlsx`          |
//! | POST   | `/api/sessions/{id}/groupby`  | Download `Customise_groupby.xlsx`     |
//! | GET    | `/api/logs`                   | SSE stream for progress logs          |

use axum::{
    extract::{
        multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, Multipart, Path,
        State,
    },
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::sessions::{Role, SessionStore};
use super::types::{SessionCreated, SessionState, UploadSummary};
use crate::config::Settings;
use crate::error::{ServerError, ServerResult};
use crate::transform::pipeline::{clean_to_xlsx, custom_to_xlsx, rdpac_to_xlsx, Download};
use crate::transform::CustomRequest;

/// Shared handler state
#[derive(Debug)]
pub struct AppState {
    pub settings: Settings,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let sessions = SessionStore::new(settings.cache_capacity, settings.max_sessions);
        Self { settings, sessions }
    }
}

pub type SharedState = Arc<AppState>;

/// All routes, CORS and the upload size limit.
pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let upload_limit = state.settings.max_upload_bytes;

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(session_state).delete(delete_session))
        .route("/api/sessions/{id}/posdata", post(upload_posdata))
        .route("/api/sessions/{id}/pname", post(upload_pname))
        .route("/api/sessions/{id}/clean", post(clean))
        .route("/api/sessions/{id}/rdpac", post(rdpac))
        .route("/api/sessions/{id}/groupby", post(groupby))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let port = settings.port;
    let state = Arc::new(AppState::new(settings));
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 HCE server running on http://localhost:{}", port);
    println!("   POST /api/sessions                - Create session");
    println!("   POST /api/sessions/{{id}}/posdata   - Upload POSDATA");
    println!("   POST /api/sessions/{{id}}/pname     - Upload PNAME");
    println!("   POST /api/sessions/{{id}}/clean     - POSDATA_NEW.xlsx");
    println!("   POST /api/sessions/{{id}}/rdpac     - Grouped_Data.xlsx");
    println!("   POST /api/sessions/{{id}}/groupby   - Customise_groupby.xlsx");
    println!("   GET  /api/logs                    - SSE log stream");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "hce",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // lagged receivers skip missed entries
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn create_session(
    State(state): State<SharedState>,
) -> ServerResult<(StatusCode, Json<SessionCreated>)> {
    let session = state.sessions.create()?;
    log_info(format!("🆕 Session {}", session.id));
    Ok((
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: session.id,
            created_at: session.created_at,
        }),
    ))
}

async fn session_state(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ServerResult<Json<SessionState>> {
    Ok(Json(state.sessions.state(&id)?))
}

async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ServerResult<StatusCode> {
    state.sessions.remove(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_posdata(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ServerResult<Json<UploadSummary>> {
    upload(&state, &id, Role::Posdata, multipart).await
}

async fn upload_pname(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ServerResult<Json<UploadSummary>> {
    upload(&state, &id, Role::Pname, multipart).await
}

async fn upload(
    state: &AppState,
    id: &str,
    role: Role,
    mut multipart: Multipart,
) -> ServerResult<Json<UploadSummary>> {
    let limit = state.settings.max_upload_bytes;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(e, limit))? {
        if field.name() == Some("file") {
            let file_name = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| ServerError::BadRequest("file field has no file name".to_string()))?;
            let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
            file = Some((file_name, bytes.to_vec()));
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;
    if bytes.len() > limit {
        return Err(ServerError::PayloadTooLarge(limit));
    }

    log_info(format!("📄 {} upload: {} ({} bytes)", role.table_name(), file_name, bytes.len()));
    let summary = state
        .sessions
        .upload(id, role, &file_name, &bytes)
        .inspect_err(|e| log_error(e.to_string()))?;
    Ok(Json(summary))
}

fn multipart_error(e: MultipartError, limit: usize) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge(limit)
    } else {
        ServerError::BadRequest(format!("Multipart error: {}", e.body_text()))
    }
}

async fn clean(State(state): State<SharedState>, Path(id): Path<String>) -> ServerResult<Download> {
    let (posdata, pname) = state.sessions.inputs(&id)?;
    let options = state.settings.clean_options();
    Ok(clean_to_xlsx(&posdata.table, &pname.table, &options)
        .inspect_err(|e| log_error(e.to_string()))?)
}

async fn rdpac(State(state): State<SharedState>, Path(id): Path<String>) -> ServerResult<Download> {
    let (posdata, pname) = state.sessions.inputs(&id)?;
    let options = state.settings.clean_options();
    Ok(rdpac_to_xlsx(&posdata.table, &pname.table, &options)
        .inspect_err(|e| log_error(e.to_string()))?)
}

async fn groupby(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    request: Result<Json<CustomRequest>, JsonRejection>,
) -> ServerResult<Download> {
    let Json(request) = request.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let posdata = state.sessions.posdata(&id)?;
    Ok(custom_to_xlsx(&posdata.table, &request).inspect_err(|e| log_error(e.to_string()))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use axum::response::IntoResponse;

    const POSDATA_CSV: &[u8] = b"OBJECTID,SMI_CODE,Function\n1,ORG1,Sales\n2,ORG1,HR\n3,ORG2,Sales";

    fn state() -> SharedState {
        Arc::new(AppState::new(Settings::default()))
    }

    async fn new_session(state: &SharedState) -> String {
        let (status, Json(created)) = create_session(State(state.clone())).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        created.session_id
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let state = state();
        let id = new_session(&state).await;

        let Json(session) = session_state(State(state.clone()), Path(id.clone())).await.unwrap();
        assert!(!session.ready);

        let status = delete_session(State(state.clone()), Path(id.clone())).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let err = session_state(State(state), Path(id)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_groupby_download() {
        let state = state();
        let id = new_session(&state).await;
        state.sessions.upload(&id, Role::Posdata, "posdata.csv", POSDATA_CSV).unwrap();

        let request = CustomRequest::headcount(vec!["SMI_CODE".into()]);
        let download = groupby(State(state), Path(id), Ok(Json(request))).await.unwrap();

        assert_eq!(download.file_name, "Customise_groupby.xlsx");
        assert!(download.bytes.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn test_rdpac_needs_both_uploads() {
        let state = state();
        let id = new_session(&state).await;
        state.sessions.upload(&id, Role::Posdata, "posdata.csv", POSDATA_CSV).unwrap();

        let err = rdpac(State(state), Path(id)).await.unwrap_err();
        assert!(matches!(err, ServerError::Pipeline(PipelineError::MissingUpload(_))));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_groupby_validation_error() {
        let state = state();
        let id = new_session(&state).await;
        state.sessions.upload(&id, Role::Posdata, "posdata.csv", POSDATA_CSV).unwrap();

        let request = CustomRequest::headcount(vec![]);
        let err = groupby(State(state), Path(id), Ok(Json(request))).await.unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }
}
