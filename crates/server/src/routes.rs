//! HTTP routes for browsing, transfer, and the shared text slot.
//!
//! Handlers are thin: they pull parameters out of the request, call into
//! `phonedrop-core`, and serialize the result. Every per-request failure
//! becomes a structured JSON body carrying the attempted path and its parent
//! where relevant, so the front-end can always offer an "up" action.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use phonedrop_core::files::listing::{self, DirectoryEntry, EntryKind, ListError, Listing, MediaKind};
use phonedrop_core::files::resolve::{resolve_request_path, ResolveError};
use phonedrop_core::files::transfer::{self, DownloadError, Inbox, UploadSummary};
use phonedrop_core::text::TextStore;

const INDEX_HTML: &str = include_str!("../static/index.html");
const APP_JS: &str = include_str!("../static/app.js");
const STYLE_CSS: &str = include_str!("../static/style.css");

/// Shared state injected into every handler.
pub struct AppState {
    /// Directory a browse request resolves against when no path is given.
    pub browse_root: PathBuf,
    /// Fixed destination for all uploads.
    pub inbox: Inbox,
    /// The shared text slot.
    pub text: TextStore,
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/app.js", get(app_js))
        .route("/style.css", get(style_css))
        .route("/files", get(list_files))
        .route("/download", get(download))
        .route("/upload", post(upload).layer(DefaultBodyLimit::disable()))
        .route("/text", get(get_text).post(set_text))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn app_js() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        APP_JS,
    )
}

async fn style_css() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], STYLE_CSS)
}

#[derive(Deserialize)]
struct PathQuery {
    path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListingResponse {
    path: String,
    parent_path: String,
    entries: Vec<EntryResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryResponse {
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    path: String,
    is_previewable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_type: Option<&'static str>,
}

impl From<&Listing> for ListingResponse {
    fn from(listing: &Listing) -> Self {
        Self {
            path: listing.path.to_string_lossy().into_owned(),
            parent_path: listing.parent.to_string_lossy().into_owned(),
            entries: listing.entries.iter().map(EntryResponse::from).collect(),
        }
    }
}

impl From<&DirectoryEntry> for EntryResponse {
    fn from(entry: &DirectoryEntry) -> Self {
        Self {
            name: entry.name.clone(),
            kind: match entry.kind {
                EntryKind::Directory => "directory",
                EntryKind::File => "file",
            },
            path: entry.path.to_string_lossy().into_owned(),
            is_previewable: entry.previewable(),
            media_type: entry.media.map(|media| match media {
                MediaKind::Image => "image",
                MediaKind::Video => "video",
            }),
        }
    }
}

async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<Json<ListingResponse>, ApiError> {
    let path = resolve_request_path(query.path.as_deref(), &state.browse_root)?;
    let listing = listing::list_directory(&path)?;

    debug!(
        path = %listing.path.display(),
        entries = listing.entries.len(),
        "directory listed"
    );

    Ok(Json(ListingResponse::from(&listing)))
}

async fn download(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<Response, ApiError> {
    let raw = query
        .path
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("path query parameter is required"))?;

    let path = resolve_request_path(Some(raw), &state.browse_root)?;
    let download = transfer::open_download(&path).await?;

    info!(
        path = %path.display(),
        bytes = download.len,
        "download started"
    );

    let mime = mime_guess::from_path(&download.file_name).first_or_octet_stream();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.essence_str())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(download.len));
    let disposition = format!(
        "attachment; filename=\"{}\"",
        download.file_name.replace(['"', '\r', '\n'], "_")
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    // Once headers are flushed a mid-stream read failure can only truncate
    // the body; it is logged here and never re-signaled. A client closing
    // the connection just drops the stream, a silent abort.
    let name = download.file_name.clone();
    let stream = ReaderStream::new(download.file).inspect_err(move |err| {
        debug!(file = %name, error = %err, "download stream ended early");
    });

    Ok((headers, Body::from_stream(stream)).into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    files_accepted: usize,
    files_failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<UploadFailure>,
}

#[derive(Debug, Serialize)]
struct UploadFailure {
    name: String,
    error: String,
}

impl From<&UploadSummary> for UploadResponse {
    fn from(summary: &UploadSummary) -> Self {
        Self {
            files_accepted: summary.accepted(),
            files_failed: summary.rejected(),
            failures: summary
                .failed
                .iter()
                .map(|failure| UploadFailure {
                    name: failure.name.clone(),
                    error: failure.reason.clone(),
                })
                .collect(),
        }
    }
}

async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut summary = UploadSummary::default();

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                if summary.is_empty() {
                    return Err(ApiError::bad_request(format!(
                        "malformed upload request: {err}"
                    )));
                }
                // Files already published stay published; just stop reading.
                warn!(error = %err, "upload request ended early");
                break;
            }
        };

        if field.name() != Some("files") {
            continue;
        }
        let declared = field.file_name().unwrap_or("").to_string();

        let mut incoming = match state.inbox.begin(&declared).await {
            Ok(incoming) => incoming,
            Err(err) => {
                warn!(name = %declared, error = %err, "upload rejected");
                summary.record_failed(declared, err);
                continue;
            }
        };

        let mut failure: Option<String> = None;
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    if let Err(err) = incoming.write_chunk(&chunk).await {
                        failure = Some(err.to_string());
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    failure = Some(format!("upload stream interrupted: {err}"));
                    break;
                }
            }
        }

        match failure {
            Some(reason) => {
                warn!(name = %incoming.name(), reason = %reason, "upload failed");
                incoming.discard().await;
                summary.record_failed(declared, reason);
            }
            None => match incoming.finish().await {
                Ok(stored) => {
                    info!(name = %stored.name, bytes = stored.bytes, "file received");
                    summary.record_saved(stored);
                }
                Err(err) => {
                    warn!(name = %declared, error = %err, "upload finalize failed");
                    summary.record_failed(declared, err);
                }
            },
        }
    }

    if summary.is_empty() {
        return Err(ApiError::bad_request("no files provided"));
    }

    Ok(Json(UploadResponse::from(&summary)))
}

#[derive(Serialize)]
struct TextResponse {
    text: String,
}

#[derive(Deserialize)]
struct TextUpdate {
    text: String,
}

#[derive(Serialize)]
struct TextUpdated {
    success: bool,
    text: String,
}

async fn get_text(State(state): State<Arc<AppState>>) -> Json<TextResponse> {
    Json(TextResponse {
        text: state.text.get(),
    })
}

/// Replace the shared text. A request whose `text` is not a JSON string is
/// rejected by the extractor before this runs; that is the validation.
async fn set_text(
    State(state): State<Arc<AppState>>,
    Json(update): Json<TextUpdate>,
) -> Json<TextUpdated> {
    debug!(len = update.text.len(), "shared text replaced");
    state.text.set(update.text.clone());
    Json(TextUpdated {
        success: true,
        text: update.text,
    })
}

/// A per-request failure, serialized as `{error, path?, parentPath?}`.
///
/// The message is what the client sees; anything with more internal detail
/// is logged server-side at the point of failure.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    path: Option<String>,
    parent: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_path: Option<String>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            path: None,
            parent: None,
        }
    }

    #[cfg(test)]
    fn status(&self) -> StatusCode {
        self.status
    }

    #[cfg(test)]
    fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            path: self.path,
            parent_path: self.parent,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        debug!(error = %err, "path resolution failed");
        let status = match &err {
            ResolveError::NotFound { .. } => StatusCode::NOT_FOUND,
            ResolveError::AccessDenied { .. } => StatusCode::FORBIDDEN,
            ResolveError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
            path: Some(err.path().display().to_string()),
            parent: Some(err.parent().display().to_string()),
        }
    }
}

impl From<ListError> for ApiError {
    fn from(err: ListError) -> Self {
        debug!(error = %err, "directory listing failed");
        let status = match err.source.kind() {
            std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            std::io::ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            std::io::ErrorKind::NotADirectory => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
            path: Some(err.path.display().to_string()),
            parent: Some(err.parent.display().to_string()),
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        debug!(error = %err, "download failed");
        let status = match &err {
            DownloadError::NotFound(_) => StatusCode::NOT_FOUND,
            DownloadError::NotAFile(_) => StatusCode::BAD_REQUEST,
            DownloadError::AccessDenied(_) => StatusCode::FORBIDDEN,
            DownloadError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let path = err.path();
        let parent = path.parent().map(|p| p.display().to_string());
        Self {
            status,
            message: err.to_string(),
            path: Some(path.display().to_string()),
            parent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::FromRequest;
    use axum::http::Request;
    use std::fs;
    use tempfile::TempDir;

    async fn make_state(root: &TempDir) -> Arc<AppState> {
        let inbox_dir = root.path().join("inbox");
        let inbox = Inbox::open(&inbox_dir).await.unwrap();
        Arc::new(AppState {
            browse_root: fs::canonicalize(root.path()).unwrap(),
            inbox,
            text: TextStore::new(),
        })
    }

    #[tokio::test]
    async fn list_files_defaults_to_the_browse_root_and_orders_entries() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.txt"), "b").unwrap();
        fs::create_dir(temp.path().join("A")).unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        let state = make_state(&temp).await;

        let Json(listing) = list_files(State(state.clone()), Query(PathQuery { path: None }))
            .await
            .unwrap();

        let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "inbox", "a.txt", "b.txt"]);
        assert_eq!(listing.path, state.browse_root.display().to_string());
        assert_eq!(listing.entries[0].kind, "directory");
        assert_eq!(listing.entries[2].kind, "file");
    }

    #[test]
    fn entry_wire_shape_matches_the_front_end_contract() {
        let entry = EntryResponse {
            name: "clip.mp4".to_string(),
            kind: "file",
            path: "/home/user/clip.mp4".to_string(),
            is_previewable: true,
            media_type: Some("video"),
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["name"], "clip.mp4");
        assert_eq!(value["type"], "file");
        assert_eq!(value["isPreviewable"], true);
        assert_eq!(value["mediaType"], "video");

        // Non-previewable entries omit mediaType entirely.
        let plain = EntryResponse {
            name: "notes.txt".to_string(),
            kind: "file",
            path: "/home/user/notes.txt".to_string(),
            is_previewable: false,
            media_type: None,
        };
        let value = serde_json::to_value(&plain).unwrap();
        assert!(value.get("mediaType").is_none());
    }

    #[tokio::test]
    async fn list_files_of_missing_path_is_not_found_with_path_context() {
        let temp = TempDir::new().unwrap();
        let state = make_state(&temp).await;
        let missing = temp.path().join("ghost");

        let err = list_files(
            State(state),
            Query(PathQuery {
                path: Some(missing.display().to_string()),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.path(), Some(missing.display().to_string().as_str()));
    }

    #[tokio::test]
    async fn download_requires_a_path() {
        let temp = TempDir::new().unwrap();
        let state = make_state(&temp).await;

        let err = download(State(state), Query(PathQuery { path: None }))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn download_sets_attachment_headers() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("photo.jpg"), b"not really a jpeg").unwrap();
        let state = make_state(&temp).await;

        let response = download(
            State(state),
            Query(PathQuery {
                path: Some(temp.path().join("photo.jpg").display().to_string()),
            }),
        )
        .await
        .unwrap();

        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(headers[header::CONTENT_LENGTH], "17");
        assert!(headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment"));
    }

    fn multipart_request(parts: &[(&str, &str)]) -> Request<Body> {
        let boundary = "PHONEDROPTESTBOUNDARY";
        let mut body = String::new();
        for (filename, content) in parts {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{boundary}--\r\n"));

        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn upload_sanitizes_names_and_counts_files() {
        let temp = TempDir::new().unwrap();
        let state = make_state(&temp).await;

        let request = multipart_request(&[("../../evil.txt", "payload"), ("ok.txt", "hello")]);
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        let Json(response) = upload(State(state.clone()), multipart).await.unwrap();
        assert_eq!(response.files_accepted, 2);
        assert_eq!(response.files_failed, 0);

        // The traversal name was reduced to its base name inside the inbox.
        assert_eq!(
            fs::read(state.inbox.dir().join("evil.txt")).unwrap(),
            b"payload"
        );
        assert_eq!(fs::read(state.inbox.dir().join("ok.txt")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn upload_with_no_file_parts_is_rejected() {
        let temp = TempDir::new().unwrap();
        let state = make_state(&temp).await;

        let request = multipart_request(&[]);
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        let err = upload(State(state), multipart).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_failures_do_not_abort_siblings() {
        let temp = TempDir::new().unwrap();
        let state = make_state(&temp).await;

        // ".." sanitizes to nothing and fails; the sibling still lands.
        let request = multipart_request(&[("..", "nope"), ("fine.txt", "kept")]);
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        let Json(response) = upload(State(state.clone()), multipart).await.unwrap();
        assert_eq!(response.files_accepted, 1);
        assert_eq!(response.files_failed, 1);
        assert_eq!(response.failures[0].name, "..");
        assert_eq!(
            fs::read(state.inbox.dir().join("fine.txt")).unwrap(),
            b"kept"
        );
    }

    #[tokio::test]
    async fn text_roundtrip_is_last_write_wins() {
        let temp = TempDir::new().unwrap();
        let state = make_state(&temp).await;

        let Json(first) = get_text(State(state.clone())).await;
        assert_eq!(first.text, "");

        set_text(
            State(state.clone()),
            Json(TextUpdate {
                text: "hello".to_string(),
            }),
        )
        .await;
        let Json(updated) = set_text(
            State(state.clone()),
            Json(TextUpdate {
                text: "world".to_string(),
            }),
        )
        .await;
        assert!(updated.success);
        assert_eq!(updated.text, "world");

        let Json(current) = get_text(State(state)).await;
        assert_eq!(current.text, "world");
    }
}
