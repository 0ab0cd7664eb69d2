//! Configuration errors. `figment`'s own error, which names the offending
//! key and source, is kept as the cause of [`ErrorKind::Invalid`].

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// None of these get better by retrying; the user has to fix their setup.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// An explicitly requested config file does not exist.
    #[display("config file not found: {}", _0.display())]
    FileNotFound(#[error(not(source))] PathBuf),
    /// A value in one of the sources has the wrong type or shape.
    #[display("invalid configuration")]
    Invalid,
    #[display("no site configured (pass it as an argument or set MIRROR_SITE)")]
    MissingSite,
    #[display("site must be an absolute http(s) URL: {_0}")]
    InvalidSite(#[error(not(source))] String),
}
