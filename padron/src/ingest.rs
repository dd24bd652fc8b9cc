//! Upload and export endpoints: the bridge between the HTTP surface, the
//! sheet adapter and the record store. Ingestion is all-or-nothing; a sheet
//! with a structural problem is rejected before any record is stored.

use crate::metrics_defs::{EXPORTS, UPLOADS};
use axum::Router;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use chrono::Utc;
use registry::store::ClientStore;
use registry::types::{Client, ClientStats};
use serde::{Deserialize, Serialize};
use sheets::errors::SheetError;
use shared::counter;
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct IngestState {
    pub store: ClientStore,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
}

pub fn router(state: IngestState) -> Router {
    // Leave some headroom above the payload cap for the multipart framing.
    let body_limit = state.max_upload_bytes as usize + (64 << 10);
    Router::new()
        .route("/upload", post(upload))
        .route("/export", get(export))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("no \"file\" field in the upload form")]
    MissingFile,

    #[error("the uploaded file is empty")]
    EmptyFile,

    #[error("only .csv files are accepted")]
    InvalidExtension,

    #[error("the file exceeds the {0} byte limit")]
    TooLarge(u64),

    #[error("no clients to export")]
    NothingToExport,

    #[error("could not read the upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sheet(#[from] SheetError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IngestError {
    fn status(&self) -> StatusCode {
        match self {
            IngestError::MissingFile
            | IngestError::EmptyFile
            | IngestError::InvalidExtension
            | IngestError::TooLarge(_)
            | IngestError::NothingToExport
            | IngestError::Multipart(_) => StatusCode::BAD_REQUEST,
            IngestError::Sheet(err) => match err {
                SheetError::InvalidFormat
                | SheetError::Empty
                | SheetError::InvalidStructure(_) => StatusCode::BAD_REQUEST,
                SheetError::Processing(_) | SheetError::Io(_) | SheetError::Csv(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            IngestError::Io(_) | IngestError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let body = Json(registry::api::ApiErrorResponse {
            error_message: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}

#[derive(Serialize)]
struct UploadResponse {
    filename: String,
    stored_as: String,
    total_clients: usize,
    valid_clients: usize,
    invalid_clients: usize,
    stats: ClientStats,
    preview: Vec<Client>,
}

#[derive(Serialize)]
struct ExportResponse {
    file: String,
    errors_file: Option<String>,
}

/// Receives a roster sheet, saves it under the upload dir and replaces the
/// store contents with the validated batch.
async fn upload(
    State(state): State<IngestState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, IngestError> {
    let mut payload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let filename = field
                .file_name()
                .map(str::to_string)
                .unwrap_or_else(|| "upload.csv".to_string());
            let data = field.bytes().await?;
            payload = Some((filename, data));
            break;
        }
    }
    let (filename, data) = payload.ok_or(IngestError::MissingFile)?;

    if data.is_empty() {
        return Err(IngestError::EmptyFile);
    }
    if data.len() as u64 > state.max_upload_bytes {
        return Err(IngestError::TooLarge(state.max_upload_bytes));
    }
    if !filename.to_lowercase().ends_with(".csv") {
        return Err(IngestError::InvalidExtension);
    }

    tokio::fs::create_dir_all(&state.upload_dir).await?;
    let stored_as = format!(
        "{}_{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        sanitize_filename(&filename)
    );
    let path = state.upload_dir.join(&stored_as);
    tokio::fs::write(&path, &data).await?;

    tracing::info!(file = %filename, bytes = data.len(), "processing upload");

    let store = state.store.clone();
    let ingest_path = path.clone();
    let result = tokio::task::spawn_blocking(move || ingest_file(&store, &ingest_path)).await?;

    let clients = match result {
        Ok(clients) => clients,
        Err(err) => {
            // All-or-nothing: a failed ingest leaves no file behind.
            let _ = tokio::fs::remove_file(&path).await;
            return Err(err.into());
        }
    };

    counter!(UPLOADS).increment(1);
    let stats = state.store.stats();
    let preview: Vec<Client> = clients.iter().take(5).cloned().collect();
    Ok(Json(UploadResponse {
        filename,
        stored_as,
        total_clients: clients.len(),
        valid_clients: stats.valid,
        invalid_clients: stats.invalid,
        stats,
        preview,
    }))
}

/// Structure check, read, batch validation, store swap. Runs on a blocking
/// thread because the batch runner spawns its own workers.
fn ingest_file(store: &ClientStore, path: &Path) -> Result<Vec<Client>, SheetError> {
    sheets::reader::validate_structure(path)?;
    let clients = sheets::reader::read_file(path)?;
    let clients = registry::batch::validate_all(clients);
    store.replace_all(clients.clone());
    Ok(clients)
}

#[derive(Deserialize)]
struct ExportParams {
    filename: Option<String>,
}

/// Writes the current store contents back to sheet form under the upload
/// dir, error annotations included.
async fn export(
    State(state): State<IngestState>,
    Query(params): Query<ExportParams>,
) -> Result<Json<ExportResponse>, IngestError> {
    let clients = state.store.get_all();
    if clients.is_empty() {
        return Err(IngestError::NothingToExport);
    }

    let mut filename = params
        .filename
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("clientes_{}", Utc::now().format("%Y%m%d_%H%M%S")));
    if !filename.to_lowercase().ends_with(".csv") {
        filename.push_str(".csv");
    }

    tokio::fs::create_dir_all(&state.upload_dir).await?;
    let path = state.upload_dir.join(sanitize_filename(&filename));

    let written =
        tokio::task::spawn_blocking(move || sheets::writer::write_file(&clients, &path)).await??;

    counter!(EXPORTS).increment(1);
    tracing::info!(file = %written.roster.display(), "exported roster");
    Ok(Json(ExportResponse {
        file: written.roster.display().to_string(),
        errors_file: written.errors.map(|path| path.display().to_string()),
    }))
}

/// Strips any path components and maps everything outside
/// `[A-Za-z0-9._-]` to an underscore, so upload names cannot escape the
/// upload dir.
fn sanitize_filename(name: &str) -> String {
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
