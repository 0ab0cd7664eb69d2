//! The on-disk half of the mirror: file contents and their history.
//!
//! Downloads are streamed into a hidden temporary file while being hashed
//! ([`Staging`]), then [`Mirror::place`] decides whether they are new content
//! and where they go. Nothing that was ever placed is overwritten or deleted.

pub mod error;
mod mirror;
mod path;
mod staging;

pub use crate::mirror::{Layout, Mirror, Placement};
pub use crate::path::{qualify, sanitize};
pub use crate::path::validate as validate_path;
pub use crate::staging::{Staged, Staging};
