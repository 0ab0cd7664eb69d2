//! Sync Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. The underlying remote, store or
//! mirror error is kept as a child in the tree.

use derive_more::{Display, Error};

/// A sync error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a sync failure.
///
/// ### Fatal (the run stops)
/// - [`ErrorKind::Courses`]
/// - [`ErrorKind::Store`]
/// - [`ErrorKind::MirrorIo`]
///
/// ### Recoverable (the scope is skipped and recorded in the report)
/// - [`ErrorKind::Remote`]
/// - [`ErrorKind::Download`]
/// - [`ErrorKind::Placement`]
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The top-level course listing failed; there is nothing to walk.
    #[display("listing courses failed")]
    Courses,
    /// Recording metadata failed. The history can't be trusted to match the
    /// mirror any more.
    #[display("metadata store failed")]
    Store,
    /// The mirror directory itself failed (I/O, permissions).
    #[display("writing to the mirror failed")]
    MirrorIo,
    /// A listing or fetch below the course level failed.
    #[display("fetching from the remote failed")]
    Remote,
    /// Downloading a file's contents failed.
    #[display("downloading file failed")]
    Download,
    /// A download could not be placed, but the mirror is otherwise fine.
    #[display("placing download failed")]
    Placement,
}

impl ErrorKind {
    /// Returns `true` if the run must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Courses | Self::Store | Self::MirrorIo)
    }

    /// Returns `true` if retrying (on the next run) might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote | Self::Download)
    }
}

/// Wrap a mirror error, keeping the fatal/recoverable split of its cause.
pub(crate) fn mirror(err: mirror_files::error::Error) -> Error {
    let kind = if err.is_fatal() { ErrorKind::MirrorIo } else { ErrorKind::Placement };
    err.raise(kind)
}
