use super::{KvStore, StoreError, now_unix};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::time::Duration;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        // Server handlers and the player may write concurrently.
        conn.busy_timeout(Duration::from_secs(5))?;
        let s = Self { conn };
        s.init_schema()?;
        Ok(s)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let s = Self {
            conn: Connection::open_in_memory()?,
        };
        s.init_schema()?;
        Ok(s)
    }

    pub fn release(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::Transport(e))
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS kv_strings (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  expires_at INTEGER,
  updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS kv_sets (
  key TEXT NOT NULL,
  member TEXT NOT NULL,
  added_at INTEGER NOT NULL,
  PRIMARY KEY (key, member)
);

CREATE INDEX IF NOT EXISTS idx_kv_strings_expires ON kv_strings(expires_at);
"#,
        )?;
        Ok(())
    }
}

impl KvStore for SqliteStore {
    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String, Option<i64>)> = self
            .conn
            .query_row(
                "SELECT value, expires_at FROM kv_strings WHERE key=?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((value, None)) => Ok(Some(value)),
            Some((value, Some(exp))) if exp > now_unix() => Ok(Some(value)),
            Some(_) => {
                self.conn
                    .execute("DELETE FROM kv_strings WHERE key=?1", params![key])?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set_string(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let now = now_unix();
        let expires_at = ttl.map(|t| now + t.as_secs() as i64);
        self.conn.execute(
            r#"
INSERT INTO kv_strings(key, value, expires_at, updated_at)
VALUES(?1, ?2, ?3, ?4)
ON CONFLICT(key) DO UPDATE SET
  value=excluded.value,
  expires_at=excluded.expires_at,
  updated_at=excluded.updated_at
"#,
            params![key, value, expires_at, now],
        )?;
        Ok(())
    }

    fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO kv_sets(key, member, added_at) VALUES(?1, ?2, ?3)",
            params![key, member, now_unix()],
        )?;
        Ok(())
    }

    fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM kv_sets WHERE key=?1 AND member=?2",
            params![key, member],
        )?;
        Ok(())
    }

    fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT member FROM kv_sets WHERE key=?1 ORDER BY rowid")?;
        let members = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(members)
    }

    fn atomically<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Self) -> Result<T, StoreError>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }
}
