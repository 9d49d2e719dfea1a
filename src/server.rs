//! HTTP server: JSON API plus a single-page UI.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Single-page UI |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/api/analyze` | Multipart `resume` file + optional `job_description` text → analysis |
//! | `POST` | `/api/index` | Multipart `resume` file → replaces the question-answering index |
//! | `POST` | `/api/ask` | JSON `{"question": "..."}` → answer with sources |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "missing_input", "message": "Please upload a resume before analyzing." } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `missing_input` | 400 |
//! | `bad_request` | 400 |
//! | `no_index` | 404 |
//! | `payload_too_large` | 413 |
//! | `unsupported_content_type` | 415 |
//! | `extraction_empty`, `extraction_failed` | 422 |
//! | `internal` | 500 |
//! | `generation_failed`, `embedding_failed` | 502 |
//!
//! A model reply that cannot be parsed is still a `200` with
//! `"status": "parse_failure"`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the UI can be served
//! from elsewhere during development.

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::analyze::{AnalysisRequest, AnalyzeError, Analyzer};
use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::extract::{self, ExtractError};
use crate::generation::{self, Generator};
use crate::index::{self, IndexError, VectorIndex};
use crate::models::{IndexSummary, Normalized, QaAnswer, Upload};
use crate::progress::NoProgress;
use crate::qa::{self, AskError};
use crate::render;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    analyzer: Arc<Analyzer>,
    generator: Arc<dyn Generator>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: VectorIndex,
}

impl AppState {
    pub fn new(
        config: Config,
        generator: Arc<dyn Generator>,
        embedder: Arc<dyn EmbeddingProvider>,
        pool: SqlitePool,
    ) -> Self {
        let analyzer = Analyzer::new(generator.clone(), config.analysis.clone());
        Self {
            config: Arc::new(config),
            analyzer: Arc::new(analyzer),
            generator,
            embedder,
            index: VectorIndex::new(pool),
        }
    }
}

/// Build the application router with CORS, request tracing and the upload limit.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.config.analysis.max_upload_bytes;

    Router::new()
        .route("/", get(handle_index_page))
        .route("/health", get(handle_health))
        .route("/api/analyze", post(handle_analyze))
        .route("/api/index", post(handle_index))
        .route("/api/ask", post(handle_ask))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let generator: Arc<dyn Generator> =
        Arc::from(generation::create_generator(&config.generation)?);
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);
    let pool = db::open(&config.db).await?;

    if !config.generation.is_enabled() {
        tracing::warn!("generation provider is disabled; /api/analyze and /api/ask will fail");
    }

    let bind_addr = config.server.bind.clone();
    let app = router(AppState::new(config.clone(), generator, embedder, pool));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "resume analyzer listening");
    println!("Resume analyzer listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, message = %self.message, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn internal(err: impl std::fmt::Display) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", err.to_string())
}

fn extraction_error(err: &ExtractError, message: String) -> AppError {
    match err {
        ExtractError::UnsupportedContentType(_) => AppError::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported_content_type",
            message,
        ),
        _ => AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "extraction_failed", message),
    }
}

impl From<AnalyzeError> for AppError {
    fn from(err: AnalyzeError) -> Self {
        let message = render::user_message(&err);
        match &err {
            AnalyzeError::MissingInput(_) => {
                AppError::new(StatusCode::BAD_REQUEST, "missing_input", message)
            }
            AnalyzeError::ExtractionEmpty { .. } => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "extraction_empty", message)
            }
            AnalyzeError::Extraction(e) => extraction_error(e, message),
            AnalyzeError::Generation(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "generation_failed", message)
            }
        }
    }
}

impl From<IndexError> for AppError {
    fn from(err: IndexError) -> Self {
        let message = err.to_string();
        match &err {
            IndexError::ExtractionEmpty => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "extraction_empty", message)
            }
            IndexError::Extraction(e) => extraction_error(e, message),
            IndexError::Embedding(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "embedding_failed", message)
            }
            IndexError::Storage(_) => internal(message),
        }
    }
}

impl From<AskError> for AppError {
    fn from(err: AskError) -> Self {
        let message = err.to_string();
        match &err {
            AskError::EmptyQuestion => bad_request(message),
            AskError::NoIndex => AppError::new(
                StatusCode::NOT_FOUND,
                "no_index",
                "No resume has been indexed yet. Upload one to /api/index first.",
            ),
            AskError::Embedding(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "embedding_failed", message)
            }
            AskError::Generation(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "generation_failed", message)
            }
            AskError::ModelMismatch { .. } => {
                AppError::new(StatusCode::CONFLICT, "index_model_mismatch", message)
            }
            AskError::Storage(_) => internal(message),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                "upload exceeds the size limit",
            )
        } else {
            bad_request(err.body_text())
        }
    }
}

// ============ Multipart form ============

#[derive(Default)]
struct UploadForm {
    resume: Option<Upload>,
    job_description: Option<String>,
}

/// Declared content type, or a guess from the file name when the browser sent none.
fn upload_content_type(declared: Option<&str>, file_name: &str) -> String {
    match declared {
        Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_string(),
        _ => extract::content_type_for_path(Path::new(file_name))
            .unwrap_or("application/octet-stream")
            .to_string(),
    }
}

async fn read_form(mut multipart: Multipart, max_bytes: usize) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" => {
                let file_name = field.file_name().unwrap_or("resume").to_string();
                let content_type = upload_content_type(field.content_type(), &file_name);
                let bytes = field.bytes().await?;
                if bytes.len() > max_bytes {
                    return Err(AppError::new(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        "payload_too_large",
                        format!("resume exceeds the {} byte limit", max_bytes),
                    ));
                }
                if !bytes.is_empty() {
                    form.resume = Some(Upload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            "job_description" => {
                form.job_description = Some(field.text().await?);
            }
            other => {
                tracing::debug!(field = other, "ignoring unknown form field");
            }
        }
    }

    Ok(form)
}

// ============ GET / and GET /health ============

async fn handle_index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ POST /api/analyze ============

async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Normalized>, AppError> {
    let form = read_form(multipart, state.config.analysis.max_upload_bytes).await?;
    let request = AnalysisRequest {
        resume: form.resume,
        job_description: form.job_description,
    };
    let outcome = state.analyzer.analyze(&request).await?;
    Ok(Json(outcome))
}

// ============ POST /api/index ============

async fn handle_index(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<IndexSummary>, AppError> {
    let form = read_form(multipart, state.config.analysis.max_upload_bytes).await?;
    let upload = form.resume.ok_or_else(|| {
        AppError::new(
            StatusCode::BAD_REQUEST,
            "missing_input",
            "Please upload a resume first.",
        )
    })?;

    let summary = index::index_resume(
        &state.index,
        &state.config,
        state.embedder.as_ref(),
        &upload,
        &NoProgress,
    )
    .await?;
    Ok(Json(summary))
}

// ============ POST /api/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<QaAnswer>, AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    let answer = qa::answer_question(
        &state.index,
        state.embedder.as_ref(),
        state.generator.as_ref(),
        &req.question,
        state.config.retrieval.top_k,
    )
    .await?;
    Ok(Json(answer))
}
