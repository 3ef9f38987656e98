//! HTTP Server for the unique-contact API.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                               |
//! |--------|-------------------|-------------------------------------------|
//! | GET    | `/health`         | Health check                              |
//! | POST   | `/api/merge`      | Merge a JSON request (records + selectors)|
//! | POST   | `/api/upload`     | Merge an uploaded CSV file                |
//! | GET    | `/api/logs`       | SSE stream for real-time logs             |

use axum::{
    extract::{Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, MergeResponse};
use crate::error::{PipelineError, PresetError, ServerResult};
use crate::merge::pipeline::{
    merge_bytes, merge_bytes_with_best_preset, merge_request, MergeOptions, PipelineOutcome,
};
use crate::models::Selectors;
use crate::presets::PresetRegistry;

type ApiError = (StatusCode, Json<Value>);

/// Build the application router
pub fn router(options: MergeOptions) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/merge", post(merge_json))
        .route("/api/upload", post(upload_csv))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(options)
}

/// Start the HTTP server
pub async fn start_server(port: u16, options: MergeOptions) -> ServerResult<()> {
    let app = router(options);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 unique-contact server running on http://localhost:{}", port);
    println!("   POST /api/merge  - Merge JSON records");
    println!("   POST /api/upload - Upload CSV file");
    println!("   GET  /api/logs   - SSE log stream");
    println!("   GET  /health     - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "unique-contact",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "merge": "POST /api/merge",
            "upload": "POST /api/upload",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers drop the missed entries.
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

/// Merge a JSON request
async fn merge_json(
    State(options): State<MergeOptions>,
    Json(body): Json<Value>,
) -> Result<Json<MergeResponse>, ApiError> {
    let outcome = merge_request(&body, &options).map_err(to_api_error)?;
    Ok(Json(MergeResponse::from(outcome)))
}

/// Upload CSV endpoint.
///
/// Multipart fields: `file` (the CSV) and optionally `selectors` (JSON) or
/// `preset` (a stored preset id). With neither, the stored preset that best
/// fits the CSV header is used.
async fn upload_csv(
    State(options): State<MergeOptions>,
    mut multipart: Multipart,
) -> Result<Json<MergeResponse>, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                form.file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(&format!("Read error: {}", e)))?;
                form.file = Some(bytes.to_vec());
            }
            "selectors" | "preset" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_request(&format!("Read error: {}", e)))?;
                form.set_text(&name, &text)?;
            }
            _ => {}
        }
    }

    let outcome = merge_upload(form, &options)?;
    Ok(Json(MergeResponse::from(outcome)))
}

/// Fields collected from an upload request.
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<Vec<u8>>,
    file_name: Option<String>,
    selectors: Option<Selectors>,
    preset: Option<String>,
}

impl UploadForm {
    /// Store a text field. Unknown names are ignored.
    fn set_text(&mut self, name: &str, text: &str) -> Result<(), ApiError> {
        match name {
            "selectors" => {
                let parsed = serde_json::from_str(text)
                    .map_err(|e| bad_request(&format!("Invalid selectors: {}", e)))?;
                self.selectors = Some(parsed);
            }
            "preset" => {
                let id = text.trim();
                if !id.is_empty() {
                    self.preset = Some(id.to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Merge an upload with explicit selectors, a named preset, or the best
/// compatible preset, in that order.
fn merge_upload(form: UploadForm, options: &MergeOptions) -> Result<PipelineOutcome, ApiError> {
    let bytes = form.file.ok_or_else(|| bad_request("No file provided"))?;

    log_info(format!(
        "📄 NEW UPLOAD: {} ({} bytes)",
        form.file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let result = match (form.selectors, form.preset) {
        (Some(selectors), _) => merge_bytes(&bytes, &selectors, options),
        (None, Some(id)) => resolve_preset(options, &id)
            .and_then(|selectors| merge_bytes(&bytes, &selectors, options)),
        (None, None) => merge_bytes_with_best_preset(&bytes, options),
    };

    result.map_err(to_api_error)
}

fn resolve_preset(options: &MergeOptions, id: &str) -> Result<Selectors, PipelineError> {
    let mut registry = PresetRegistry::with_dir(&options.preset_dir);
    let selectors = registry.require(id)?.selectors.clone();
    registry.mark_used(id)?;
    Ok(selectors)
}

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(error_response(message)))
}

fn status_for(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::Argument(_) | PipelineError::Csv(_) | PipelineError::Json(_) => {
            StatusCode::BAD_REQUEST
        }
        PipelineError::Preset(PresetError::NotFound(_)) => StatusCode::NOT_FOUND,
        PipelineError::Preset(PresetError::NoCompatible { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn to_api_error(err: PipelineError) -> ApiError {
    log_error(format!("Merge error: {}", err));
    (status_for(&err), Json(error_response(&err.to_string())))
}
