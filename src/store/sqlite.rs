use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::Connection;
use tracing::debug;

use super::LaunchStore;
use crate::error::PersistenceError;
use crate::launch::{LaunchRecord, LaunchSet};

/// `launches` table, one row per record, ordered by `position`.
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        SqliteStore { path: path.as_ref().to_path_buf() }
    }

}

fn connect(path: &Path) -> Result<Connection, PersistenceError> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<(), PersistenceError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS launches (
            position  INTEGER PRIMARY KEY,
            date      TEXT NOT NULL,
            all_day   BOOLEAN NOT NULL,
            payload   TEXT NOT NULL,
            vehicle   TEXT NOT NULL,
            customer  TEXT NOT NULL,
            saved_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

fn save_all(conn: &Connection, launches: &LaunchSet) -> Result<(), PersistenceError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM launches", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO launches (position, date, all_day, payload, vehicle, customer)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (i, r) in launches.iter().enumerate() {
            // Same date encoding as the JSON store.
            let stored = serde_json::to_value(r)?;
            stmt.execute(rusqlite::params![
                i as i64,
                stored["date"].as_str().unwrap_or_default(),
                r.all_day(),
                r.payload,
                r.vehicle,
                r.customer,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

fn load_all(conn: &Connection) -> Result<LaunchSet, PersistenceError> {
    let mut stmt = conn.prepare(
        "SELECT date, all_day, payload, vehicle, customer FROM launches ORDER BY position",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(serde_json::json!({
                "date": row.get::<_, String>(0)?,
                "allDay": row.get::<_, bool>(1)?,
                "payload": row.get::<_, String>(2)?,
                "vehicle": row.get::<_, String>(3)?,
                "customer": row.get::<_, String>(4)?,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let records = rows
        .into_iter()
        .map(serde_json::from_value::<LaunchRecord>)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(LaunchSet::new(records))
}

#[async_trait]
impl LaunchStore for SqliteStore {
    async fn save(&self, launches: &LaunchSet) -> Result<(), PersistenceError> {
        let path = self.path.clone();
        let owned = launches.clone();
        tokio::task::spawn_blocking(move || save_all(&connect(&path)?, &owned)).await??;
        debug!(path = %self.path.display(), count = launches.len(), "Saved launches");
        Ok(())
    }

    async fn load(&self) -> Result<LaunchSet, PersistenceError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || load_all(&connect(&path)?)).await?
    }
}

// ── Tests ──
