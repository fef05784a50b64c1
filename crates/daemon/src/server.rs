//! HTTP front end.
//!
//! Read actions arrive as `GET /` query parameters, write actions as `POST /`
//! form or multipart bodies. Every request is parsed into a
//! [`protocol::Request`] and handed to the [`RequestRouter`] on the blocking
//! thread pool; outcomes are turned into JSON documents or streamed bodies.

use std::future::Future;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use futures_util::StreamExt;
use protocol::{OperationResult, Params, Request};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::files::{
    attachment_disposition, sweep_stale_archives, FileError, UploadedFile, OCTET_STREAM,
    STALE_ARCHIVE_AGE,
};
use crate::router::{log_failure, Outcome, RequestRouter, RouterError};

/// Content type of zip archives.
const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Request router, shared across blocking tasks.
    router: Arc<RequestRouter>,
    /// Directory multipart parts are spooled into.
    spool_dir: PathBuf,
    /// Per-file upload limit; parts are cut off one byte past it.
    max_file_size: u64,
}

impl AppState {
    /// Create application state.
    pub fn new(router: RequestRouter, spool_dir: PathBuf, max_file_size: u64) -> Self {
        Self {
            router: Arc::new(router),
            spool_dir,
            max_file_size,
        }
    }

    /// Build state from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let router = RequestRouter::from_config(config)?;
        let spool_dir = router.temp_dir().to_path_buf();
        Ok(Self::new(router, spool_dir, config.upload.max_file_size))
    }

    /// The request router.
    pub fn router(&self) -> &RequestRouter {
        &self.router
    }
}

/// Build the axum application.
pub fn app(state: AppState, max_request_size: u64) -> Router {
    let body_limit = usize::try_from(max_request_size).unwrap_or(usize::MAX);

    Router::new()
        .route("/", get(handle_get).post(handle_post))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Serve until `shutdown` resolves.
///
/// Stale archives left by an earlier run are swept before binding and again
/// after the listener closes.
pub async fn serve<F>(config: &Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.bind_addr()?;
    let state = AppState::from_config(config)?;
    let temp_dir = state.router().temp_dir().to_path_buf();

    sweep(&temp_dir);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(
        addr = %listener.local_addr()?,
        root = %state.router().resolver().root().display(),
        "PathGate listening"
    );

    axum::serve(listener, app(state, config.upload.max_request_size))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");
    sweep(&temp_dir);
    Ok(())
}

fn sweep(temp_dir: &Path) {
    match sweep_stale_archives(temp_dir, STALE_ARCHIVE_AGE) {
        Ok(0) => {}
        Ok(removed) => info!(removed, "Removed stale archives"),
        Err(e) => warn!(error = %e, "Failed to sweep stale archives"),
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_get(State(state): State<AppState>, Query(params): Query<Params>) -> Response {
    let request = match Request::from_query(&params) {
        Ok(request) => request,
        Err(e) => return error_response(RouterError::from(e)),
    };

    // A listing of "." is the root listing; other actions resolve "." as the root.
    if let Request::List(list) = &request {
        if list.path == "." {
            return Redirect::to("/").into_response();
        }
    }

    dispatch(&state, request, Vec::new()).await
}

async fn handle_post(State(state): State<AppState>, req: axum::extract::Request) -> Response {
    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let (params, files) = if is_multipart {
        let multipart = match Multipart::from_request(req, &state).await {
            Ok(m) => m,
            Err(rejection) => return rejection.into_response(),
        };
        match read_multipart(&state, multipart).await {
            Ok(parts) => parts,
            Err(response) => return response,
        }
    } else {
        match Form::<Params>::from_request(req, &state).await {
            Ok(Form(params)) => (params, Vec::new()),
            Err(rejection) => return rejection.into_response(),
        }
    };

    match Request::from_form(&params) {
        Ok(request) => dispatch(&state, request, files).await,
        Err(e) => error_response(RouterError::from(e)),
    }
}

/// Run a request on the blocking pool and render its outcome.
async fn dispatch(state: &AppState, request: Request, files: Vec<UploadedFile>) -> Response {
    let router = Arc::clone(&state.router);
    let result = tokio::task::spawn_blocking(move || router.route(request, files)).await;

    match result {
        Ok(Ok(outcome)) => outcome_response(outcome),
        Ok(Err(e)) => error_response(e),
        Err(e) => {
            error!(error = %e, "Request task failed");
            error_response(RouterError::File(FileError::Io(std::io::Error::other(e))))
        }
    }
}

// ============================================================================
// Multipart
// ============================================================================

/// Split a multipart body into text parameters and spooled file parts.
async fn read_multipart(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<(Params, Vec<UploadedFile>), Response> {
    let mut params = Params::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            // Browsers send an empty part when no file was chosen.
            if file_name.is_empty() {
                continue;
            }
            let file = spool_field(field, &state.spool_dir, state.max_file_size, file_name)
                .await
                .map_err(|e| match e {
                    SpoolError::Multipart(e) => multipart_error(e),
                    SpoolError::Io(e) => error_response(RouterError::File(FileError::Io(e))),
                })?;
            files.push(file);
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            params.insert(name, value);
        }
    }

    debug!(files = files.len(), "Read multipart body");
    Ok((params, files))
}

enum SpoolError {
    Multipart(MultipartError),
    Io(std::io::Error),
}

/// Copy one file part into an anonymous temp file.
///
/// At most `limit + 1` bytes are kept; `size` still counts everything seen so
/// the engine can reject the part by size.
async fn spool_field(
    mut field: Field<'_>,
    dir: &Path,
    limit: u64,
    name: String,
) -> Result<UploadedFile, SpoolError> {
    let spool = tempfile::tempfile_in(dir).map_err(SpoolError::Io)?;
    let mut file = tokio::fs::File::from_std(spool);

    let mut size = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(SpoolError::Multipart)? {
        size = size.saturating_add(chunk.len() as u64);
        if size > limit {
            debug!(name = %name, limit, "Upload part exceeds limit, discarding the rest");
            break;
        }
        file.write_all(&chunk).await.map_err(SpoolError::Io)?;
    }
    file.flush().await.map_err(SpoolError::Io)?;

    let mut spool = file.into_std().await;
    spool.seek(SeekFrom::Start(0)).map_err(SpoolError::Io)?;

    Ok(UploadedFile {
        name,
        size,
        source: Box::new(spool),
    })
}

fn multipart_error(err: MultipartError) -> Response {
    let status = err.status();
    warn!(status = %status, error = %err.body_text(), "Rejected multipart body");
    (status, Json(OperationResult::failure(err.body_text()))).into_response()
}

// ============================================================================
// Responses
// ============================================================================

fn outcome_response(outcome: Outcome) -> Response {
    match outcome {
        Outcome::Listing(listing) => Json(listing).into_response(),
        Outcome::Operation(result) => Json(result).into_response(),
        Outcome::File(opened) => {
            let mut headers = HeaderMap::new();
            let content_type = HeaderValue::from_str(&opened.headers.content_type)
                .unwrap_or_else(|_| HeaderValue::from_static(OCTET_STREAM));
            headers.insert(header::CONTENT_TYPE, content_type);
            headers.insert(
                header::CONTENT_LENGTH,
                HeaderValue::from(opened.headers.content_length),
            );
            if let Some(disposition) = &opened.headers.content_disposition {
                headers.insert(header::CONTENT_DISPOSITION, disposition_value(disposition));
            }
            headers.insert(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            );

            let file = tokio::fs::File::from_std(opened.file);
            let body = Body::from_stream(ReaderStream::new(file));
            (StatusCode::OK, headers, body).into_response()
        }
        Outcome::Archive(job) => {
            let size = job.size();
            let disposition = attachment_disposition(job.download_name());
            let (file, guard) = match job.open() {
                Ok(parts) => parts,
                Err(e) => return error_response(RouterError::File(e)),
            };

            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(ZIP_CONTENT_TYPE));
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
            headers.insert(header::CONTENT_DISPOSITION, disposition_value(&disposition));
            headers.insert(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            );

            // The temp file lives exactly as long as the body stream.
            let stream = ReaderStream::new(tokio::fs::File::from_std(file)).map(move |chunk| {
                let _guard = &guard;
                chunk
            });
            (StatusCode::OK, headers, Body::from_stream(stream)).into_response()
        }
    }
}

fn disposition_value(disposition: &str) -> HeaderValue {
    HeaderValue::from_str(disposition).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

fn error_response(err: RouterError) -> Response {
    log_failure(&err);
    let status = StatusCode::from_u16(err.code().status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.to_operation_result())).into_response()
}
