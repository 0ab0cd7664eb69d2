//! SQLite pool for the history database.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Where the history lives.
#[derive(Debug, Clone, Copy)]
enum Location<'a> {
    File(&'a Path),
    /// Each connection to `:memory:` is a separate database, so the pool is
    /// capped at one connection.
    Memory,
}

impl Location<'_> {
    fn options(self) -> SqliteConnectOptions {
        let options = SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            // Rows are never deleted, so there is nothing to reclaim.
            .auto_vacuum(SqliteAutoVacuum::None);
        match self {
            Self::File(path) => options.filename(path).create_if_missing(true),
            Self::Memory => options.filename(":memory:"),
        }
    }

    fn max_connections(self) -> u32 {
        match self {
            // One writer; a second connection lets audits read alongside it.
            Self::File(_) => 2,
            Self::Memory => 1,
        }
    }
}

/// Connection pool for the history database, migrated on open.
#[derive(Debug, Clone)]
pub(crate) struct Database {
    pool: SqlitePool,
}

impl Database {
    #[instrument("opening history database", skip_all)]
    async fn open(location: Location<'_>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Applied to every connection the pool opens, not only the first.
            .after_connect(|conn, _meta| Box::pin(async move { tune(conn).await }))
            .max_connections(location.max_connections())
            .connect_with(location.options())
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open (creating if needed) the database file at `path`.
    pub(crate) async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(Location::File(path.as_ref())).await
    }

    pub(crate) async fn connect_in_memory() -> Result<Self> {
        Self::open(Location::Memory).await
    }

    #[instrument("applying history migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Refresh planner statistics, then wait for every connection to be
    /// returned and close them.
    pub(crate) async fn close(&self) {
        if let Err(e) = sqlx::query("PRAGMA optimize").execute(&self.pool).await {
            tracing::debug!(error = %e, "PRAGMA optimize failed");
        }
        self.pool.close().await;
    }
}

/// Per-connection settings that `SqliteConnectOptions` doesn't expose.
async fn tune(conn: &mut SqliteConnection) -> sqlx::Result<()> {
    sqlx::query(
        r#"
            PRAGMA wal_autocheckpoint = 1000;
            PRAGMA cache_size = -4096;
            PRAGMA temp_store = MEMORY;
            PRAGMA analysis_limit = 400;
        "#,
    )
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close() {
        let db = Database::connect_in_memory().await.unwrap();
        assert!(!db.pool().is_closed());
        db.close().await;
        assert!(db.pool().is_closed());
    }

    #[tokio::test]
    async fn test_migrating_twice() {
        let db = Database::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let (applied,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _sqlx_migrations").fetch_one(db.pool()).await.unwrap();
        assert_eq!(applied, MIGRATOR.iter().count() as i64);
        db.close().await;
    }

    #[tokio::test]
    async fn test_file_database_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("history.sqlite3")).await.unwrap();
        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode").fetch_one(db.pool()).await.unwrap();
        assert_eq!(mode, "wal");
        let (checkpoint,): (i64,) = sqlx::query_as("PRAGMA wal_autocheckpoint").fetch_one(db.pool()).await.unwrap();
        assert_eq!(checkpoint, 1000);
        db.close().await;
    }
}
