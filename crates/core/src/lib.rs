//! # PhoneDrop Core
//!
//! This crate provides the filesystem and shared-state primitives behind the
//! PhoneDrop LAN exchange server:
//!
//! - **Path resolution**: turn client-supplied path strings into canonical
//!   absolute paths with structured errors
//! - **Directory listing**: enumerate, classify, and deterministically order
//!   directory entries
//! - **File transfer**: streaming downloads and inbox uploads with atomic
//!   temp-file-then-rename finalization
//! - **Shared text**: a single concurrently-accessible text slot
//!
//! The HTTP surface lives in the `phonedrop-server` crate; everything here is
//! transport-agnostic and unit-testable against a plain filesystem.
//!
//! ## Modules
//!
//! - [`files`]: path resolution, directory listing, and file transfer
//! - [`text`]: the shared text slot

pub mod files;
pub mod text;

// Re-export files types for convenience
pub use files::listing::{DirectoryEntry, EntryKind, ListError, Listing, MediaKind};
pub use files::resolve::{resolve_request_path, ResolveError};
pub use files::transfer::{
    open_download, Download, DownloadError, FailedUpload, Inbox, InboxError, IncomingFile,
    StoredFile, UploadError, UploadSummary,
};

// Re-export text types for convenience
pub use text::TextStore;
