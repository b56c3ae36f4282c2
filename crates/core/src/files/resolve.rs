//! Request path resolution.
//!
//! Turns a client-supplied path string into a canonical absolute path.
//! Symlinks are followed and `.`/`..` segments collapse; the result is
//! wherever the filesystem actually leads. There is deliberately no root
//! jail (the browsing scope is everything the process can read), so the
//! only outcomes are a canonical path or a structured error carrying the
//! attempted path and its parent.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::parent_of;

/// Errors that can occur while resolving a request path.
///
/// Every variant carries the attempted path and its parent so the caller can
/// report the failure and still offer an "up" navigation.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The requested path does not exist.
    #[error("path does not exist: {}", path.display())]
    NotFound { path: PathBuf, parent: PathBuf },

    /// The process may not read the requested path.
    #[error("permission denied: {}", path.display())]
    AccessDenied { path: PathBuf, parent: PathBuf },

    /// Any other IO failure during canonicalization.
    #[error("cannot resolve {}: {source}", path.display())]
    Io {
        path: PathBuf,
        parent: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ResolveError {
    /// The path the client asked for.
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound { path, .. } | Self::AccessDenied { path, .. } | Self::Io { path, .. } => {
                path
            }
        }
    }

    /// Parent of the attempted path.
    pub fn parent(&self) -> &Path {
        match self {
            Self::NotFound { parent, .. }
            | Self::AccessDenied { parent, .. }
            | Self::Io { parent, .. } => parent,
        }
    }
}

/// Resolve a client-supplied path against the configured browsing root.
///
/// An empty or absent `raw` resolves to `default_root`. Anything else is
/// canonicalized to an absolute path; relative input resolves against the
/// process working directory, matching ordinary filesystem semantics.
pub fn resolve_request_path(
    raw: Option<&str>,
    default_root: &Path,
) -> Result<PathBuf, ResolveError> {
    let requested = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => PathBuf::from(s),
        None => default_root.to_path_buf(),
    };

    fs::canonicalize(&requested).map_err(|source| {
        let parent = parent_of(&requested);
        match source.kind() {
            ErrorKind::NotFound => ResolveError::NotFound {
                path: requested,
                parent,
            },
            ErrorKind::PermissionDenied => ResolveError::AccessDenied {
                path: requested,
                parent,
            },
            _ => ResolveError::Io {
                path: requested,
                parent,
                source,
            },
        }
    })
}
