//! Errors from the on-disk mirror.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A mirror error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for mirror operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O failures are mapped onto the variants the caller can act on; see
/// [`ErrorKind::is_fatal`].
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Path contains invalid components or escapes the mirror root
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// A bare file has to become a numbered directory, but there is no
    /// earlier version number to give the existing file.
    #[display("cannot number the existing version of {} (placing version {version})", path.display())]
    UnknownHistory { path: PathBuf, version: u32 },
    /// What is on disk at the path belongs to another resource, or already
    /// holds a later version than the one being placed.
    #[display("{} is occupied by other content (placing version {version})", path.display())]
    Occupied { path: PathBuf, version: u32 },
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if the mirror itself can no longer be trusted to be
    /// written to. Anything else only affects the one path being placed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_) | Self::PermissionDenied(_) | Self::NotFound(_))
    }

    pub(crate) fn from_io(err: IoError, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.into()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.into()),
            _ => Self::Io(err),
        }
    }
}
