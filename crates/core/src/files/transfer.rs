//! Streaming downloads and inbox uploads with atomic writes.
//!
//! Downloads open a validated file handle the boundary streams from; nothing
//! is buffered whole. Uploads always land in the fixed [`Inbox`] directory:
//! bytes go to a uniquely named temporary file alongside the destination and
//! an atomic rename publishes the final name, so a reader opening that name
//! observes either the previous complete file or the new one, never a
//! partial write. Same-name collisions are deliberately overwritten:
//! last write wins in a personal drop folder.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Errors that can occur opening a file for download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The requested file does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The requested path names a directory, not a regular file.
    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    /// The process may not read the requested file.
    #[error("permission denied: {}", .0.display())]
    AccessDenied(PathBuf),

    /// Any other IO failure.
    #[error("cannot open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// The path the client asked for.
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(path) | Self::NotAFile(path) | Self::AccessDenied(path) => path,
            Self::Io { path, .. } => path,
        }
    }
}

/// An open, validated download source.
///
/// The boundary streams from `file`; dropping it mid-stream aborts the
/// download with no side effects, which is how client disconnects are
/// handled. A fresh [`open_download`] call always re-opens at offset zero.
#[derive(Debug)]
pub struct Download {
    pub file: File,
    pub len: u64,
    pub file_name: String,
}

/// Open `path` for sequential read-only streaming.
pub async fn open_download(path: &Path) -> Result<Download, DownloadError> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|source| map_download_err(path, source))?;

    if !metadata.is_file() {
        return Err(DownloadError::NotAFile(path.to_path_buf()));
    }

    let file = File::open(path)
        .await
        .map_err(|source| map_download_err(path, source))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());

    Ok(Download {
        file,
        len: metadata.len(),
        file_name,
    })
}

fn map_download_err(path: &Path, source: std::io::Error) -> DownloadError {
    match source.kind() {
        ErrorKind::NotFound => DownloadError::NotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => DownloadError::AccessDenied(path.to_path_buf()),
        _ => DownloadError::Io {
            path: path.to_path_buf(),
            source,
        },
    }
}

/// Errors that can occur receiving one uploaded file.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The declared name is empty once path separators are stripped.
    #[error("unusable file name: {0:?}")]
    UnusableName(String),

    /// A write to the temporary file or the final rename failed.
    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The inbox directory could not be created or opened. Fatal at startup,
/// never per-request.
#[derive(Debug, Error)]
#[error("upload inbox unavailable at {}: {source}", path.display())]
pub struct InboxError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The fixed directory all uploads land in.
///
/// Clients never choose a destination; the only client influence on the
/// final path is the sanitized base name.
#[derive(Debug, Clone)]
pub struct Inbox {
    dir: PathBuf,
}

impl Inbox {
    /// Open the inbox, creating the directory if it is missing.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, InboxError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| InboxError {
                path: dir.clone(),
                source,
            })?;
        Ok(Self { dir })
    }

    /// The inbox directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reduce a client-declared name to a bare base name.
    ///
    /// Everything up to the last `/` or `\` is dropped, so `"../../evil"`
    /// becomes `"evil"` and the destination can never leave the inbox.
    /// Returns `None` when nothing usable remains.
    pub fn sanitize_file_name(raw: &str) -> Option<String> {
        let name = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
        match name {
            "" | "." | ".." => None,
            _ => Some(name.to_string()),
        }
    }

    /// Begin receiving one file.
    ///
    /// Bytes are written to a uniquely named dot-prefixed temporary file in
    /// the inbox itself (same directory, so the final rename is atomic; dot
    /// prefix, so in-flight uploads never show up in listings). The final
    /// name appears only on [`IncomingFile::finish`].
    pub async fn begin(&self, declared_name: &str) -> Result<IncomingFile, UploadError> {
        let name = Self::sanitize_file_name(declared_name)
            .ok_or_else(|| UploadError::UnusableName(declared_name.to_string()))?;

        let destination = self.dir.join(&name);
        let temp_path = self
            .dir
            .join(format!(".{}.{:08x}.part", name, rand::random::<u32>()));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await
            .map_err(|source| UploadError::Io {
                path: temp_path.clone(),
                source,
            })?;

        debug!(name = %name, temp = %temp_path.display(), "upload started");

        Ok(IncomingFile {
            name,
            destination,
            temp_path,
            file,
            bytes: 0,
        })
    }
}

/// One file mid-upload.
///
/// Call [`finish`](Self::finish) to publish it or [`discard`](Self::discard)
/// to drop it; either way the temporary file is gone afterwards and the
/// final name was never in a partial state.
#[derive(Debug)]
pub struct IncomingFile {
    name: String,
    destination: PathBuf,
    temp_path: PathBuf,
    file: File,
    bytes: u64,
}

impl IncomingFile {
    /// Sanitized final name this upload will publish as.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Destination path inside the inbox.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Bytes accepted so far.
    pub fn bytes_received(&self) -> u64 {
        self.bytes
    }

    /// Append a chunk to the temporary file.
    pub async fn write_chunk(&mut self, data: &[u8]) -> Result<(), UploadError> {
        self.file
            .write_all(data)
            .await
            .map_err(|source| UploadError::Io {
                path: self.temp_path.clone(),
                source,
            })?;
        self.bytes += data.len() as u64;
        Ok(())
    }

    /// Flush and atomically rename over the final name.
    ///
    /// An existing same-named file is replaced wholesale; a concurrent
    /// reader of that name sees the old complete file or the new one.
    pub async fn finish(mut self) -> Result<StoredFile, UploadError> {
        if let Err(source) = self.file.flush().await {
            remove_temp(&self.temp_path).await;
            return Err(UploadError::Io {
                path: self.temp_path.clone(),
                source,
            });
        }
        // Close the handle before renaming; Windows refuses to rename an
        // open file.
        drop(self.file);

        if let Err(source) = fs::rename(&self.temp_path, &self.destination).await {
            remove_temp(&self.temp_path).await;
            return Err(UploadError::Io {
                path: self.destination.clone(),
                source,
            });
        }

        debug!(name = %self.name, bytes = self.bytes, "upload finished");

        Ok(StoredFile {
            name: self.name,
            path: self.destination,
            bytes: self.bytes,
        })
    }

    /// Remove the temporary file; the final name is untouched.
    pub async fn discard(self) {
        drop(self.file);
        remove_temp(&self.temp_path).await;
        debug!(name = %self.name, "upload discarded");
    }
}

async fn remove_temp(path: &Path) {
    if let Err(err) = fs::remove_file(path).await {
        warn!(path = %path.display(), error = %err, "failed to remove upload temp file");
    }
}

/// A successfully published upload.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub name: String,
    pub path: PathBuf,
    pub bytes: u64,
}

/// One file of an upload request that did not make it.
#[derive(Debug)]
pub struct FailedUpload {
    pub name: String,
    pub reason: String,
}

/// Aggregate result of a multi-file upload request.
///
/// Files are independent: one failure never aborts siblings, it is just
/// recorded here next to the successes.
#[derive(Debug, Default)]
pub struct UploadSummary {
    pub saved: Vec<StoredFile>,
    pub failed: Vec<FailedUpload>,
}

impl UploadSummary {
    pub fn record_saved(&mut self, stored: StoredFile) {
        self.saved.push(stored);
    }

    pub fn record_failed(&mut self, name: impl Into<String>, reason: impl ToString) {
        self.failed.push(FailedUpload {
            name: name.into(),
            reason: reason.to_string(),
        });
    }

    pub fn accepted(&self) -> usize {
        self.saved.len()
    }

    pub fn rejected(&self) -> usize {
        self.failed.len()
    }

    /// True when the request carried no file parts at all.
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty() && self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    async fn receive(inbox: &Inbox, name: &str, content: &[u8]) -> StoredFile {
        let mut incoming = inbox.begin(name).await.unwrap();
        incoming.write_chunk(content).await.unwrap();
        incoming.finish().await.unwrap()
    }

    #[test]
    fn sanitize_strips_path_separators() {
        assert_eq!(
            Inbox::sanitize_file_name("report.pdf").as_deref(),
            Some("report.pdf")
        );
        assert_eq!(
            Inbox::sanitize_file_name("../../evil").as_deref(),
            Some("evil")
        );
        assert_eq!(
            Inbox::sanitize_file_name("a/b/c.txt").as_deref(),
            Some("c.txt")
        );
        assert_eq!(
            Inbox::sanitize_file_name("C:\\Users\\me\\photo.jpg").as_deref(),
            Some("photo.jpg")
        );
        assert_eq!(Inbox::sanitize_file_name(""), None);
        assert_eq!(Inbox::sanitize_file_name(".."), None);
        assert_eq!(Inbox::sanitize_file_name("a/.."), None);
        assert_eq!(Inbox::sanitize_file_name("dir/"), None);
    }

    #[tokio::test]
    async fn open_creates_the_inbox_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("drop").join("inbox");

        let inbox = Inbox::open(&dir).await.unwrap();
        assert_eq!(inbox.dir(), dir);
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn upload_lands_inside_the_inbox_even_with_traversal_names() {
        let temp = TempDir::new().unwrap();
        let inbox = Inbox::open(temp.path()).await.unwrap();

        let stored = receive(&inbox, "../../evil", b"payload").await;
        assert_eq!(stored.name, "evil");
        assert_eq!(stored.path.parent().unwrap(), inbox.dir());
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn chunked_upload_roundtrip() {
        let temp = TempDir::new().unwrap();
        let inbox = Inbox::open(temp.path()).await.unwrap();

        let mut incoming = inbox.begin("data.bin").await.unwrap();
        incoming.write_chunk(b"hello ").await.unwrap();
        incoming.write_chunk(b"world").await.unwrap();
        assert_eq!(incoming.bytes_received(), 11);
        let stored = incoming.finish().await.unwrap();

        assert_eq!(stored.bytes, 11);
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn same_name_overwrites_and_leaves_no_temp_artifacts() {
        let temp = TempDir::new().unwrap();
        let inbox = Inbox::open(temp.path()).await.unwrap();

        receive(&inbox, "report.pdf", b"first version").await;
        receive(&inbox, "report.pdf", b"second version").await;

        assert_eq!(
            std::fs::read(temp.path().join("report.pdf")).unwrap(),
            b"second version"
        );
        let leftovers: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(leftovers, vec!["report.pdf"]);
    }

    #[tokio::test]
    async fn in_flight_upload_does_not_disturb_the_published_file() {
        let temp = TempDir::new().unwrap();
        let inbox = Inbox::open(temp.path()).await.unwrap();
        receive(&inbox, "shared.txt", b"old complete content").await;

        // A second upload of the same name is mid-flight...
        let mut incoming = inbox.begin("shared.txt").await.unwrap();
        incoming.write_chunk(b"new ").await.unwrap();

        // ...and a reader of the final name still sees the old bytes whole.
        let download = open_download(&temp.path().join("shared.txt"))
            .await
            .unwrap();
        let mut contents = Vec::new();
        let mut file = download.file;
        file.read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"old complete content");

        incoming.write_chunk(b"complete content").await.unwrap();
        incoming.finish().await.unwrap();
        assert_eq!(
            std::fs::read(temp.path().join("shared.txt")).unwrap(),
            b"new complete content"
        );
    }

    #[tokio::test]
    async fn discard_removes_the_temp_and_never_publishes() {
        let temp = TempDir::new().unwrap();
        let inbox = Inbox::open(temp.path()).await.unwrap();

        let mut incoming = inbox.begin("cancelled.txt").await.unwrap();
        incoming.write_chunk(b"partial").await.unwrap();
        incoming.discard().await;

        assert!(!temp.path().join("cancelled.txt").exists());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn download_of_missing_path_reports_not_found() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nonexistent");

        let err = open_download(&missing).await.unwrap_err();
        assert!(matches!(err, DownloadError::NotFound(_)));
        assert_eq!(err.path(), missing.as_path());
    }

    #[tokio::test]
    async fn download_of_a_directory_is_rejected() {
        let temp = TempDir::new().unwrap();

        let err = open_download(temp.path()).await.unwrap_err();
        assert!(matches!(err, DownloadError::NotAFile(_)));
    }

    #[tokio::test]
    async fn download_exposes_name_and_length() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("notes.txt"), b"0123456789").unwrap();

        let download = open_download(&temp.path().join("notes.txt")).await.unwrap();
        assert_eq!(download.file_name, "notes.txt");
        assert_eq!(download.len, 10);
    }
}
