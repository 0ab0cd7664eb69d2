use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use serde_json::Value;
use time::UtcDateTime;

/// Result of [`Table::insert`](crate::Table::insert).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Whether this insert created (or, for a dry run, would create) a new version.
    pub written: bool,
    /// The version that is current after the insert.
    pub version: u32,
}

/// The current version of an identity, without its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Current {
    pub version: u32,
    pub hash: String,
}

/// One row of an identity's history.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRecord {
    pub version: u32,
    pub is_current: bool,
    pub saved_on: UtcDateTime,
    pub last_seen_on: UtcDateTime,
    /// The raw payload as fetched (not normalized).
    pub data: Value,
    pub hash: String,
}

#[derive(sqlx::FromRow)]
pub(crate) struct VersionRow {
    version: i64,
    is_current: bool,
    saved_on: i64,
    last_seen_on: i64,
    data: String,
    data_hash: String,
}
impl TryFrom<VersionRow> for VersionRecord {
    type Error = Error;
    fn try_from(row: VersionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            version: version_from_row(row.version)?,
            is_current: row.is_current,
            saved_on: UtcDateTime::from_unix_timestamp(row.saved_on).or_raise(|| ErrorKind::InvalidData("saved on"))?,
            last_seen_on: UtcDateTime::from_unix_timestamp(row.last_seen_on)
                .or_raise(|| ErrorKind::InvalidData("last seen on"))?,
            data: serde_json::from_str(&row.data).or_raise(|| ErrorKind::InvalidData("payload"))?,
            hash: row.data_hash,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CurrentRow {
    version: i64,
    data_hash: String,
}
impl TryFrom<CurrentRow> for Current {
    type Error = Error;
    fn try_from(row: CurrentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            version: version_from_row(row.version)?,
            hash: row.data_hash,
        })
    }
}

fn version_from_row(version: i64) -> Result<u32, Error> {
    u32::try_from(version).or_raise(|| ErrorKind::InvalidData("version"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(version: i64) -> VersionRow {
        VersionRow {
            version,
            is_current: true,
            saved_on: 1_700_000_000,
            last_seen_on: 1_700_000_100,
            data: r#"{"id": 7}"#.to_string(),
            data_hash: "0".repeat(64),
        }
    }

    #[test]
    fn test_row_to_model() {
        let record = VersionRecord::try_from(row(3)).unwrap();
        assert_eq!(record.version, 3);
        assert_eq!(record.data["id"], 7);
        assert_eq!(record.last_seen_on.unix_timestamp() - record.saved_on.unix_timestamp(), 100);
    }

    #[test]
    fn test_negative_version_is_invalid() {
        let err = VersionRecord::try_from(row(-1)).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData("version"));
    }
}
