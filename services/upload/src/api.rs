use crate::config::ApiConfig;
use crate::form::{FormField, UploadForm};
use crate::validator::SelectedFile;
use crate::writer::{RemoteWriter, SubmissionReport, WriteStage};
use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub writer: Arc<RemoteWriter>,
}

/// A stored and registered file
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: Uuid,
    pub file_name: String,
    pub object_key: String,
    pub bucket_name: String,
    pub bucket_key: String,
    pub expire_time: i64,
}

/// A file whose write failed
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub file_name: String,
    pub object_key: String,
    pub stage: WriteStage,
    pub error: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Success,
    Partial,
    Failed,
}

/// Submission response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: SubmissionStatus,
    pub uploaded: Vec<UploadedFile>,
    pub failed: Vec<FailedFile>,
    /// Files skipped for an unsupported extension
    pub rejected: Vec<String>,
}

impl UploadResponse {
    fn from_report(report: &SubmissionReport, rejected: Vec<String>) -> Self {
        let uploaded: Vec<UploadedFile> = report
            .stored()
            .map(|record| UploadedFile {
                id: record.id,
                file_name: record.file_meta.file_name.clone(),
                object_key: record.object_key.clone(),
                bucket_name: record.storage_location.bucket_name.clone(),
                bucket_key: record.storage_location.bucket_key.clone(),
                expire_time: record.expire_time,
            })
            .collect();

        let failed: Vec<FailedFile> = report
            .failed()
            .map(|(candidate, object_key, error)| FailedFile {
                file_name: candidate.name().to_string(),
                object_key: object_key.to_string(),
                stage: error.stage(),
                error: error.to_string(),
            })
            .collect();

        let status = if failed.is_empty() {
            SubmissionStatus::Success
        } else if uploaded.is_empty() {
            SubmissionStatus::Failed
        } else {
            SubmissionStatus::Partial
        };

        Self {
            status,
            uploaded,
            failed,
            rejected,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.status {
            SubmissionStatus::Success => StatusCode::CREATED,
            SubmissionStatus::Partial => StatusCode::MULTI_STATUS,
            SubmissionStatus::Failed => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    /// Requirements blocking submission
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<&'static str>,
    /// Files skipped for an unsupported extension
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<String>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
            missing: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<HeaderValue> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/api/v1/uploads", post(create_upload))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "upload-service"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.writer.check_ready().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "storage": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "storage": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}

/// Accept a multipart upload form and write every valid file
#[instrument(skip_all)]
async fn create_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let mut form = UploadForm::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!(error = %e, "Malformed multipart body");
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(e.body_text(), "MALFORMED_BODY")),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            // An empty file input arrives with a blank filename
            if file_name.is_empty() {
                continue;
            }
            let mime_type = field.content_type().unwrap_or_default().to_string();
            let payload = field.bytes().await.map_err(|e| {
                warn!(error = %e, file_name = %file_name, "Failed to read file part");
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new(e.body_text(), "MALFORMED_BODY")),
                )
            })?;
            files.push(SelectedFile::new(file_name, mime_type, payload));
            continue;
        }

        let value = field.text().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(e.body_text(), "MALFORMED_BODY")),
            )
        })?;

        match name.parse::<FormField>() {
            Ok(form_field) => form.set_field(form_field, value),
            Err(e) => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new(e.to_string(), "UNKNOWN_FIELD")),
                ))
            }
        }
    }

    form.select_files(files);
    let rejected = form.rejected().to_vec();

    if !form.can_submit() {
        let missing = form.missing_requirements();
        info!(missing = ?missing, rejected = ?rejected, "Upload form incomplete");
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: "Submission requires SOP, jurisdiction, description and a supported audio file".to_string(),
                code: "FORM_INCOMPLETE".to_string(),
                missing,
                rejected,
            }),
        ));
    }

    let report = form.submit(&state.writer).await.map_err(|e| {
        error!(error = %e, "Submission refused");
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::new(e.to_string(), "FORM_INCOMPLETE")),
        )
    })?;

    let response = UploadResponse::from_report(report, rejected);
    Ok((response.status_code(), Json(response)))
}

/// Start the upload API server
pub async fn start_api_server(state: AppState, config: &ApiConfig) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting upload API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}
