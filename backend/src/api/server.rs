//! HTTP server for the retention API.
//!
//! Stateless: every upload is parsed, normalized and projected within its
//! own request. Nothing survives the response.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Health check                         |
//! | POST   | `/api/upload`     | Upload CSV, get all four views       |
//! | GET    | `/api/logs`       | SSE stream for real-time logs        |

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
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
use uuid::Uuid;

use super::logs::{current_job, log_error, with_job, LOG_BROADCASTER};
use super::types::{error_response, UploadResponse, UploadSelection};
use crate::config::ServerConfig;
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::retention::pipeline::{run_bytes, PipelineOptions, Selection};

type ApiError = (StatusCode, Json<Value>);

/// Build the router; split out so tests can drive it without a socket.
pub fn router(config: ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    // Multipart framing needs headroom over the file itself
    let body_limit = config.max_upload_bytes.saturating_add(64 * 1024);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/upload", post(upload_csv))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(Arc::new(config))
}

/// Start the HTTP server
pub async fn start_server(config: ServerConfig) -> ServerResult<()> {
    let port = config.port;
    let app = router(config);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Retention server running on http://localhost:{}", port);
    println!("   POST /api/upload - Upload cohort CSV");
    println!("   GET  /api/logs   - SSE log stream");
    println!("   GET  /health     - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "cohort-retention",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "upload": "POST /api/upload",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        // Lagged receivers just skip ahead
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Upload CSV endpoint
///
/// Multipart fields: `file` (required), `cohorts` (one trend cohort per
/// field, repeatable), `cohort` (single-cohort series). Identifiers are
/// matched verbatim.
async fn upload_csv(
    State(config): State<Arc<ServerConfig>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let job_id = Uuid::new_v4().to_string();
    with_job(job_id.clone(), process_upload(config, multipart, job_id)).await
}

async fn process_upload(
    config: Arc<ServerConfig>,
    mut multipart: Multipart,
    job_id: String,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut selection = UploadSelection::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Read error: {}", e)))?;
                file_data = Some(bytes.to_vec());
            }
            "cohorts" => {
                let cohort = read_text(field).await?;
                selection.push_cohort(cohort);
            }
            "cohort" => {
                selection.cohort = Some(read_text(field).await?);
            }
            _ => {}
        }
    }

    let bytes = file_data.ok_or_else(|| bad_request("No file provided"))?;
    if bytes.len() > config.max_upload_bytes {
        return Err(into_api_error(ServerError::PayloadTooLarge {
            size: bytes.len(),
            limit: config.max_upload_bytes,
        }));
    }

    println!("\n{}", "=".repeat(70));
    println!(
        "📄 NEW UPLOAD: {} ({} bytes) job {}",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len(),
        job_id
    );
    println!("{}\n", "=".repeat(70));

    let options = PipelineOptions {
        default_trend_cohorts: config.default_trend_cohorts,
        ..PipelineOptions::default()
    };
    let selection = Selection {
        trend: selection.trend(),
        series: selection.series(),
    };

    let run = run_bytes(&bytes, &options).map_err(|e| into_api_error(e.into()))?;
    let dashboard = run
        .dashboard(&selection)
        .map_err(|e| into_api_error(e.into()))?;

    Ok(Json(UploadResponse::new(job_id, &run, dashboard)))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| bad_request(format!("Read error: {}", e)))
}

fn bad_request(message: impl Into<String>) -> ApiError {
    into_api_error(ServerError::BadRequest(message.into()))
}

fn status_for(err: &ServerError) -> StatusCode {
    match err {
        ServerError::Pipeline(PipelineError::NotFound(_)) => StatusCode::NOT_FOUND,
        ServerError::Pipeline(_) | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ServerError::Config(_) | ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn into_api_error(err: ServerError) -> ApiError {
    log_error(err.to_string());
    let job_id = current_job().unwrap_or_else(|| Uuid::new_v4().to_string());
    (status_for(&err), Json(error_response(&job_id, &err.to_string())))
}
