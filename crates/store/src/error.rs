//! Errors raised by the metadata history. The `sqlx` error that caused a
//! [`Database`](ErrorKind::Database) or [`Migration`](ErrorKind::Migration)
//! failure is kept as a child in the `exn` tree.

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Every one of these is fatal to a sync run: carrying on after a failed
/// write would leave the version history inconsistent with the mirror.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A value could not be converted to or from its stored representation.
    #[display("invalid store data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}
