//! Directory listing with entry classification and deterministic ordering.
//!
//! A listing enumerates the immediate children of one directory, suppresses
//! platform trash entries and dotfiles, classifies what remains, and orders
//! it so repeated requests over an unchanged directory yield identical
//! results: directories before files, then case-insensitive name order.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::parent_of;

/// Entry names never shown in listings, regardless of platform.
const BLOCKED_NAMES: &[&str] = &["$RECYCLE.BIN", "System Volume Information"];

/// Extensions the front-end can render inline as images.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg"];

/// Extensions the front-end can render inline as videos.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg", "mov"];

/// What a directory entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// Media classification of a previewable file, derived purely from the
/// lowercase filename extension; content is never sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// One child of a listed directory.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// Base name, no path separators.
    pub name: String,
    /// Resolved absolute path usable for further requests.
    pub path: PathBuf,
    /// File or directory.
    pub kind: EntryKind,
    /// Present only for previewable files; directories never carry one.
    pub media: Option<MediaKind>,
}

impl DirectoryEntry {
    /// Whether the front-end may render this entry inline.
    pub fn previewable(&self) -> bool {
        self.media.is_some()
    }
}

/// The response to a directory browse. Constructed fresh per request,
/// never cached.
#[derive(Debug, Clone)]
pub struct Listing {
    /// Absolute path actually listed.
    pub path: PathBuf,
    /// One level up; equals `path` at a filesystem root.
    pub parent: PathBuf,
    /// Ordered entries.
    pub entries: Vec<DirectoryEntry>,
}

/// A directory could not be listed.
///
/// Carries the parent path so the caller can still offer an "up" action.
#[derive(Debug, Error)]
#[error("cannot list {}: {source}", path.display())]
pub struct ListError {
    pub path: PathBuf,
    pub parent: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// List the immediate children of `path`.
///
/// Unreadable children are skipped rather than failing the whole listing;
/// entries that are neither regular files nor directories (sockets, broken
/// symlinks) are omitted.
pub fn list_directory(path: &Path) -> Result<Listing, ListError> {
    let parent = parent_of(path);

    let read = fs::read_dir(path).map_err(|source| ListError {
        path: path.to_path_buf(),
        parent: parent.clone(),
        source,
    })?;

    let mut entries = Vec::new();
    for entry in read {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(error = %err, "skipping unreadable entry");
                continue;
            }
        };

        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                debug!(name = ?raw, "skipping non-UTF-8 entry name");
                continue;
            }
        };

        if is_suppressed(&name) {
            continue;
        }

        // Follow symlinks so a linked directory browses as a directory.
        let metadata = match fs::metadata(entry.path()) {
            Ok(metadata) => metadata,
            Err(err) => {
                debug!(name = %name, error = %err, "skipping unstatable entry");
                continue;
            }
        };

        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else if metadata.is_file() {
            EntryKind::File
        } else {
            continue;
        };

        let media = match kind {
            EntryKind::Directory => None,
            EntryKind::File => media_kind(&name),
        };

        entries.push(DirectoryEntry {
            name,
            path: entry.path(),
            kind,
            media,
        });
    }

    sort_entries(&mut entries);

    Ok(Listing {
        path: path.to_path_buf(),
        parent,
        entries,
    })
}

/// Dotfiles and platform trash/system entries are never listed.
fn is_suppressed(name: &str) -> bool {
    name.starts_with('.') || BLOCKED_NAMES.contains(&name)
}

/// Directories before files, then case-insensitive name order. The sort is
/// stable, so names differing only in case keep their input order.
fn sort_entries(entries: &mut [DirectoryEntry]) {
    entries.sort_by(|a, b| {
        let a_is_dir = a.kind == EntryKind::Directory;
        let b_is_dir = b.kind == EntryKind::Directory;
        match (a_is_dir, b_is_dir) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        }
    });
}

/// Media classification by lowercase extension, or `None` when the file is
/// not previewable.
fn media_kind(name: &str) -> Option<MediaKind> {
    let ext = Path::new(name).extension()?.to_str()?.to_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}
