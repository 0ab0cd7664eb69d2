//! Per-kind access to the version history.

use crate::error::{ErrorKind, Result};
use crate::models::{Current, CurrentRow, Outcome, VersionRecord, VersionRow};
use crate::normalize::content_hash;
use crate::resource::{Identity, Resource, Schema};
use exn::ResultExt;
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use std::marker::PhantomData;
use time::UtcDateTime;

/// Statements for one table, rendered once from its [`Schema`].
#[derive(Debug, Clone)]
struct Statements {
    current: String,
    get: String,
    touch: String,
    retire: String,
    insert: String,
    history: String,
}
impl Statements {
    fn new(schema: &Schema) -> Self {
        let table = schema.table;
        let keys = schema.keys.join(", ");
        let matches = schema.keys.iter().map(|key| format!("{key} = ?")).collect::<Vec<_>>().join(" AND ");
        let placeholders = vec!["?"; schema.keys.len()].join(", ");
        Self {
            current: format!("SELECT version, data_hash FROM {table} WHERE {matches} AND is_current = 1"),
            get: format!("SELECT data FROM {table} WHERE {matches} AND is_current = 1"),
            // Parameter order: last_seen_on, then keys.
            touch: format!(
                "UPDATE {table} SET last_seen_on = MAX(last_seen_on, ?) WHERE {matches} AND is_current = 1"
            ),
            retire: format!("UPDATE {table} SET is_current = 0 WHERE {matches} AND is_current = 1"),
            // Parameter order: keys, then saved_on, last_seen_on, version, data, data_hash.
            insert: format!(
                "INSERT INTO {table} ({keys}, saved_on, last_seen_on, version, is_current, data, data_hash) \
                 VALUES ({placeholders}, ?, ?, ?, 1, ?, ?)"
            ),
            history: format!(
                "SELECT version, is_current, saved_on, last_seen_on, data, data_hash \
                 FROM {table} WHERE {matches} ORDER BY version"
            ),
        }
    }
}

/// Handle on the history table of one resource kind.
///
/// Built once per kind when the [`Store`](crate::Store) is opened.
#[derive(Debug, Clone)]
pub struct Table<R: Resource> {
    pool: SqlitePool,
    sql: Statements,
    _kind: PhantomData<R>,
}

fn keys<R: Resource>(id: &R::Id) -> Result<Vec<i64>> {
    id.keys()
        .into_iter()
        .map(|key| i64::try_from(key).or_raise(|| ErrorKind::InvalidData("identity")))
        .collect()
}

impl<R: Resource> Table<R> {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            sql: Statements::new(R::KIND.schema()),
            _kind: PhantomData,
        }
    }

    /// The raw payload of the current version, if the identity has ever been recorded.
    pub async fn get(&self, id: &R::Id) -> Result<Option<Value>> {
        let mut query = sqlx::query_as::<_, (String,)>(&self.sql.get);
        for key in keys::<R>(id)? {
            query = query.bind(key);
        }
        let row = query.fetch_optional(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        row.map(|(data,)| serde_json::from_str(&data).or_raise(|| ErrorKind::InvalidData("payload")))
            .transpose()
    }

    /// Version number and content hash of the current version.
    pub async fn current(&self, id: &R::Id) -> Result<Option<Current>> {
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        self.fetch_current(&mut conn, &keys::<R>(id)?).await
    }

    /// Every recorded version of the identity, oldest first.
    pub async fn history(&self, id: &R::Id) -> Result<Vec<VersionRecord>> {
        let mut query = sqlx::query_as::<_, VersionRow>(&self.sql.history);
        for key in keys::<R>(id)? {
            query = query.bind(key);
        }
        let rows = query.fetch_all(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(VersionRecord::try_from).collect()
    }

    /// Record `payload` as the latest state of `id`.
    ///
    /// A new version is written only if the normalized content hash differs
    /// from the current version's; otherwise only `last_seen_on` moves
    /// forward. With `dry_run` nothing is written, but the returned
    /// [`Outcome`] is exactly what a real insert would return right now.
    pub async fn insert(&self, id: &R::Id, payload: &Value, dry_run: bool) -> Result<Outcome> {
        self.insert_at(id, payload, dry_run, UtcDateTime::now()).await
    }

    pub(crate) async fn insert_at(
        &self,
        id: &R::Id,
        payload: &Value,
        dry_run: bool,
        now: UtcDateTime,
    ) -> Result<Outcome> {
        let keys = keys::<R>(id)?;
        let hash = content_hash(R::KIND, payload)?;

        if dry_run {
            let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
            let current = self.fetch_current(&mut conn, &keys).await?;
            return Ok(match current {
                None => Outcome { written: true, version: 0 },
                Some(current) if current.hash == hash => Outcome {
                    written: false,
                    version: current.version,
                },
                Some(current) => Outcome {
                    written: true,
                    version: current.version + 1,
                },
            });
        }

        let now = now.unix_timestamp();
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let outcome = match self.fetch_current(&mut tx, &keys).await? {
            None => {
                self.write_version(&mut tx, &keys, 0, payload, &hash, now).await?;
                Outcome { written: true, version: 0 }
            },
            Some(current) if current.hash == hash => {
                let mut query = sqlx::query(&self.sql.touch).bind(now);
                for key in &keys {
                    query = query.bind(*key);
                }
                query.execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
                Outcome {
                    written: false,
                    version: current.version,
                }
            },
            Some(current) => {
                let version = current.version + 1;
                let mut query = sqlx::query(&self.sql.retire);
                for key in &keys {
                    query = query.bind(*key);
                }
                query.execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
                self.write_version(&mut tx, &keys, version, payload, &hash, now).await?;
                Outcome { written: true, version }
            },
        };
        tx.commit().await.or_raise(|| ErrorKind::Database)?;

        if outcome.written {
            tracing::debug!(kind = %R::KIND, id = ?id, version = outcome.version, "Recorded new version");
        } else {
            tracing::trace!(kind = %R::KIND, id = ?id, version = outcome.version, "Unchanged");
        }
        Ok(outcome)
    }

    async fn fetch_current(&self, conn: &mut SqliteConnection, keys: &[i64]) -> Result<Option<Current>> {
        let mut query = sqlx::query_as::<_, CurrentRow>(&self.sql.current);
        for key in keys {
            query = query.bind(*key);
        }
        let row = query.fetch_optional(&mut *conn).await.or_raise(|| ErrorKind::Database)?;
        row.map(Current::try_from).transpose()
    }

    async fn write_version(
        &self,
        conn: &mut SqliteConnection,
        keys: &[i64],
        version: u32,
        payload: &Value,
        hash: &str,
        now: i64,
    ) -> Result<()> {
        let data = serde_json::to_string(payload).or_raise(|| ErrorKind::InvalidData("payload"))?;
        let mut query = sqlx::query(&self.sql.insert);
        for key in keys {
            query = query.bind(*key);
        }
        query
            .bind(now)
            .bind(now)
            .bind(i64::from(version))
            .bind(data)
            .bind(hash)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use crate::resource::{self, ModuleId, ModuleItemId};
    use serde_json::json;
    use time::Duration;

    #[test]
    fn test_statements_for_composite_identity() {
        let sql = Statements::new(resource::ResourceKind::ModuleItem.schema());
        assert_eq!(
            sql.current,
            "SELECT version, data_hash FROM moduleitem WHERE id = ? AND course_id = ? AND module_id = ? AND is_current = 1"
        );
        assert!(sql.insert.contains("(id, course_id, module_id, saved_on,"));
        assert!(sql.insert.contains("VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)"));
    }

    #[tokio::test]
    async fn test_first_insert_is_version_zero() {
        let store = Store::connect_in_memory().await.unwrap();
        let table = store.folders();
        let outcome = table.insert(&10, &json!({ "id": 10, "name": "Week 1" }), false).await.unwrap();
        assert_eq!(outcome, Outcome { written: true, version: 0 });
        assert_eq!(table.get(&10).await.unwrap(), Some(json!({ "id": 10, "name": "Week 1" })));
        assert_eq!(table.get(&11).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_identical_insert_only_touches_last_seen() {
        let store = Store::connect_in_memory().await.unwrap();
        let table = store.folders();
        let payload = json!({ "id": 10, "name": "Week 1" });
        let first = UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let later = first + Duration::hours(1);
        table.insert_at(&10, &payload, false, first).await.unwrap();
        let outcome = table.insert_at(&10, &payload, false, later).await.unwrap();
        assert_eq!(outcome, Outcome { written: false, version: 0 });

        let history = table.history(&10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].saved_on, first);
        assert_eq!(history[0].last_seen_on, later);

        // last_seen_on never moves backwards.
        table.insert_at(&10, &payload, false, first).await.unwrap();
        assert_eq!(table.history(&10).await.unwrap()[0].last_seen_on, later);
    }

    #[tokio::test]
    async fn test_versions_are_contiguous_with_one_current() {
        let store = Store::connect_in_memory().await.unwrap();
        let table = store.folders();
        for (expected, name) in ["a", "b", "c"].into_iter().enumerate() {
            let outcome = table.insert(&10, &json!({ "id": 10, "name": name }), false).await.unwrap();
            assert_eq!(outcome, Outcome { written: true, version: expected as u32 });
        }
        let history = table.history(&10).await.unwrap();
        assert_eq!(history.iter().map(|r| r.version).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(history.iter().filter(|r| r.is_current).count(), 1);
        assert!(history[2].is_current);
        assert_eq!(table.get(&10).await.unwrap().unwrap()["name"], "c");
        assert_eq!(table.current(&10).await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_dry_run_never_writes() {
        let store = Store::connect_in_memory().await.unwrap();
        let table = store.files();
        let v0 = json!({ "id": 100, "filename": "a.pdf", "size": 1 });
        let v1 = json!({ "id": 100, "filename": "a.pdf", "size": 2 });

        assert_eq!(table.insert(&100, &v0, true).await.unwrap(), Outcome { written: true, version: 0 });
        assert!(table.history(&100).await.unwrap().is_empty());

        table.insert(&100, &v0, false).await.unwrap();
        let before = table.history(&100).await.unwrap();
        assert_eq!(table.insert(&100, &v0, true).await.unwrap(), Outcome { written: false, version: 0 });
        assert_eq!(table.insert(&100, &v1, true).await.unwrap(), Outcome { written: true, version: 1 });
        assert_eq!(table.history(&100).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_normalized_fields_do_not_create_versions() {
        let store = Store::connect_in_memory().await.unwrap();
        let table = store.files();
        let first = json!({ "id": 100, "filename": "a.pdf", "url": "https://x.example.com/files/100/download?verifier=one" });
        let second = json!({ "id": 100, "filename": "a.pdf", "url": "https://x.example.com/files/100/download?verifier=two" });
        table.insert(&100, &first, false).await.unwrap();
        let outcome = table.insert(&100, &second, false).await.unwrap();
        assert_eq!(outcome, Outcome { written: false, version: 0 });
        let history = table.history(&100).await.unwrap();
        assert_eq!(history.len(), 1);
        // A fetch that differs only in normalized fields is not new data. It
        // only touches last_seen_on, so the stored payload stays the raw fetch
        // that created the version rather than following the latest fetch.
        assert_eq!(history[0].data, first);
        assert!(history[0].last_seen_on >= history[0].saved_on);
        assert_eq!(table.get(&100).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_composite_identities_are_independent() {
        let store = Store::connect_in_memory().await.unwrap();
        let modules = store.modules();
        let payload = json!({ "id": 5, "name": "Intro" });
        let a = ModuleId { id: 5, course_id: 1 };
        let b = ModuleId { id: 5, course_id: 2 };
        assert!(modules.insert(&a, &payload, false).await.unwrap().written);
        assert!(modules.insert(&b, &payload, false).await.unwrap().written);
        assert_eq!(modules.history(&a).await.unwrap().len(), 1);

        let items = store.module_items();
        let item = ModuleItemId { id: 9, course_id: 1, module_id: 5 };
        items.insert(&item, &json!({ "id": 9, "type": "File" }), false).await.unwrap();
        let outcome = items.insert(&item, &json!({ "id": 9, "type": "Page" }), false).await.unwrap();
        assert_eq!(outcome, Outcome { written: true, version: 1 });
    }

    #[tokio::test]
    async fn test_identity_out_of_range() {
        let store = Store::connect_in_memory().await.unwrap();
        let err = store.courses().insert(&u64::MAX, &json!({}), false).await.unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData("identity"));
    }

    #[tokio::test]
    async fn test_second_current_row_is_rejected() {
        let store = Store::connect_in_memory().await.unwrap();
        store.courses().insert(&1, &json!({ "id": 1 }), false).await.unwrap();
        let result = sqlx::query(
            "INSERT INTO course (id, saved_on, last_seen_on, version, is_current, data, data_hash) \
             VALUES (1, 0, 0, 1, 1, '{}', ?)",
        )
        .bind("0".repeat(64))
        .execute(store.pool())
        .await;
        assert!(result.is_err(), "partial unique index allows one current row per identity");
    }
}
