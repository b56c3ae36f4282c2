//! Filesystem module for browsing and transfer.
//!
//! This module provides the filesystem-facing operations of the server:
//! - Request path resolution with structured errors
//! - Directory listing with classification and deterministic ordering
//! - Streaming file downloads
//! - Inbox uploads with atomic temp-file-then-rename finalization
//!
//! # Safety
//!
//! Browsing deliberately spans everything the process can read (this is a
//! trusted-LAN tool); the protections that do exist are the listing-level
//! suppression of trash/system entries and dotfiles, and the strict
//! sanitization of upload file names so a declared name can never escape the
//! inbox directory.

pub mod listing;
pub mod resolve;
pub mod transfer;

pub use listing::{DirectoryEntry, EntryKind, ListError, Listing, MediaKind};
pub use resolve::{resolve_request_path, ResolveError};
pub use transfer::{
    open_download, Download, DownloadError, FailedUpload, Inbox, InboxError, IncomingFile,
    StoredFile, UploadError, UploadSummary,
};

use std::path::{Path, PathBuf};

/// Parent of `path`, or `path` itself at a filesystem root.
///
/// No existence check is made; the caller may use the result for an "up"
/// action even when the parent is not itself listable.
pub(crate) fn parent_of(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.to_path_buf())
}
