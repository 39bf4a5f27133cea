use atlas_sql::{SQLError, SQLStore, Value};
use tracing::debug;

// One row per property key in the config database.
const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS profile (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

/// Row-level access to the property table.
///
/// Values are opaque payloads here; interpreting them is the store's job.
pub struct PropertyTable<'a> {
    db: &'a dyn SQLStore,
}

impl<'a> PropertyTable<'a> {
    pub fn new(db: &'a dyn SQLStore) -> Self {
        Self { db }
    }

    /// Create the table if it does not exist yet.
    pub fn init_schema(&self) -> Result<(), SQLError> {
        self.db.execute_batch(SCHEMA)
    }

    pub fn read(&self, key: &str) -> Result<Option<String>, SQLError> {
        let row = self
            .db
            .query_opt("SELECT value FROM profile WHERE key = ?1", &[Value::from(key)])?;
        Ok(row.and_then(|r| r.take_str("value")))
    }

    /// Insert or replace the payload for `key`.
    pub fn write(&self, key: &str, raw: &str) -> Result<(), SQLError> {
        let now = chrono::Utc::now().to_rfc3339();
        self.db.exec(
            "INSERT INTO profile (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            &[Value::from(key), Value::from(raw), Value::Text(now)],
        )?;
        debug!(key, "property row written");
        Ok(())
    }

    /// Delete the row for `key`. Returns whether a row existed.
    pub fn delete(&self, key: &str) -> Result<bool, SQLError> {
        let affected = self
            .db
            .exec("DELETE FROM profile WHERE key = ?1", &[Value::from(key)])?;
        Ok(affected > 0)
    }

    /// All stored keys in lexicographic order.
    pub fn keys(&self) -> Result<Vec<String>, SQLError> {
        let rows = self.db.query("SELECT key FROM profile ORDER BY key", &[])?;
        Ok(rows.into_iter().filter_map(|r| r.take_str("key")).collect())
    }

    pub fn updated_at(&self, key: &str) -> Result<Option<String>, SQLError> {
        let row = self.db.query_opt(
            "SELECT updated_at FROM profile WHERE key = ?1",
            &[Value::from(key)],
        )?;
        Ok(row.and_then(|r| r.take_str("updated_at")))
    }
}
