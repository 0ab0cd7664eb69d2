//! Remote Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A remote error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for remote operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Endpoint or link could not be turned into an absolute URL.
    #[display("invalid url: {_0}")]
    InvalidUrl(#[error(not(source))] String),
    /// The request never produced a response (DNS, TLS, connection reset, timeout).
    #[display("transport error: {_0}")]
    Transport(#[error(not(source))] String),
    /// A page of a collection came back with a non-success status.
    #[display("fetching collection {endpoint} failed with status {status}")]
    CollectionFetch { endpoint: String, status: u16 },
    /// A single (non-paginated) resource came back with a non-success status.
    #[display("fetching {endpoint} failed with status {status}")]
    Fetch { endpoint: String, status: u16 },
    /// The response body was not the JSON shape we asked for.
    #[display("could not decode response from {_0}")]
    Decode(#[error(not(source))] String),
    /// A file download came back with a non-success status.
    #[display("downloading {url} failed with status {status}")]
    Download { url: String, status: u16 },
    /// The cookie file could not be read.
    #[display("could not read cookie file: {}", _0.display())]
    CookieFile(#[error(not(source))] PathBuf),
    /// The cookie file contains a malformed line.
    #[display("malformed cookie on line {_0}")]
    Cookie(#[error(not(source))] usize),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Nothing in this workspace retries automatically; this only informs
    /// what gets logged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::CollectionFetch { status, .. } | Self::Fetch { status, .. } | Self::Download { status, .. } => {
                *status == 429 || *status >= 500
            },
            _ => false,
        }
    }
}
