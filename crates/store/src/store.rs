use crate::db::Database;
use crate::error::Result;
use crate::resource::{Course, File, Folder, Module, ModuleItem};
use crate::table::Table;
use std::path::Path;

/// The metadata history: one [`Table`] per resource kind.
///
/// Assumes a single writer. Two processes syncing into the same database
/// will not corrupt it (every insert is a transaction), but may each decide
/// they are the one creating version `n`, and one of them will fail.
#[derive(Debug, Clone)]
pub struct Store {
    db: Database,
    courses: Table<Course>,
    folders: Table<Folder>,
    files: Table<File>,
    modules: Table<Module>,
    module_items: Table<ModuleItem>,
}

impl Store {
    /// Open (creating if necessary) the database at `path` and run migrations.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = Database::connect(path).await?;
        tracing::info!(path = %path.display(), "Opened metadata store");
        Ok(Self::new(db))
    }

    /// Open a fresh in-memory store.
    ///
    /// Not behind `#[cfg(test)]` so that other crates can use it in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        Ok(Self::new(Database::connect_in_memory().await?))
    }

    fn new(db: Database) -> Self {
        let pool = db.pool().clone();
        Self {
            courses: Table::new(pool.clone()),
            folders: Table::new(pool.clone()),
            files: Table::new(pool.clone()),
            modules: Table::new(pool.clone()),
            module_items: Table::new(pool),
            db,
        }
    }

    pub fn courses(&self) -> &Table<Course> {
        &self.courses
    }

    pub fn folders(&self) -> &Table<Folder> {
        &self.folders
    }

    pub fn files(&self) -> &Table<File> {
        &self.files
    }

    pub fn modules(&self) -> &Table<Module> {
        &self.modules
    }

    pub fn module_items(&self) -> &Table<ModuleItem> {
        &self.module_items
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &sqlx::SqlitePool {
        self.db.pool()
    }

    /// Close the store. It must not be used afterwards.
    pub async fn close(&self) {
        self.db.close().await;
    }
}
