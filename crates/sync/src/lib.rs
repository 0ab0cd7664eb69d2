//! One sync run: walk the remote course tree, record every resource's
//! metadata in the history store and mirror file contents to disk.
//!
//! Each course is walked in two branches, modules (and their items) and
//! the folder tree (and its files). A failure below the course level only
//! skips that scope; see [`Report::failures`].

pub mod error;
mod report;
mod synchronizer;

pub use crate::report::{Failure, Placements, Report, Scope};
pub use crate::synchronizer::Synchronizer;
