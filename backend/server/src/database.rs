//! # SQLite
//!
//! One database file per device.
//!
//! Every anonymous client gets its own store at `{db_dir}/{device_id}.db`.
//! Nothing is shared between files, so one device can never read or lock
//! another device's data.
//!
//! ## Requirements
//!
//! - Lazily created on first contact from a device
//! - Schema applied idempotently on every open (`CREATE TABLE IF NOT EXISTS`)
//! - Cards reference their list and disappear with it
//!
//! ## Implementation
//!
//! - One `Connection` per request, dropped when the request is done
//! - Statements run in autocommit mode, no explicit transactions
//! - Foreign keys are off by default in SQLite, so every open turns them on
//! - Work runs on the blocking pool, rusqlite is synchronous
//!
//! ## Schema
//! - `lists`: id, name, last_used (seconds since epoch)
//! - `cards`: id, list_id, chunk_id, term, translation, secondary_translation,
//!   correct_attempts, total_attempts, starred
use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
};

use rusqlite::Connection;
use tokio::task::spawn_blocking;
use tracing::debug;

use crate::{device::DeviceId, error::AppError, state::AppState};

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS lists (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        last_used TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS cards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        list_id INTEGER NOT NULL,
        chunk_id INTEGER DEFAULT 0,
        term TEXT DEFAULT '',
        translation TEXT DEFAULT '',
        secondary_translation TEXT DEFAULT '',
        correct_attempts INTEGER DEFAULT 0,
        total_attempts INTEGER DEFAULT 0,
        starred BOOLEAN DEFAULT FALSE,
        FOREIGN KEY (list_id) REFERENCES lists(id) ON DELETE CASCADE
    );
";

pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    pub fn open(db_dir: &Path, device: &DeviceId) -> Result<Self, AppError> {
        prepare_storage(db_dir)?;

        let path = store_path(db_dir, device);
        debug!("Opening store {}", path.display());

        let store = Store {
            conn: Connection::open(&path)?,
        };
        store.ensure_schema()?;

        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, AppError> {
        let store = Store {
            conn: Connection::open_in_memory()?,
        };
        store.ensure_schema()?;

        Ok(store)
    }

    fn ensure_schema(&self) -> Result<(), AppError> {
        self.conn.execute_batch(SCHEMA)?;

        Ok(())
    }
}

pub fn store_path(db_dir: &Path, device: &DeviceId) -> PathBuf {
    db_dir.join(format!("{}.db", device.as_str()))
}

pub fn prepare_storage(db_dir: &Path) -> Result<(), AppError> {
    create_dir_all(db_dir).map_err(|e| AppError::InternalError(e.into()))
}

/// Opens the device's store on the blocking pool and runs `op` against it.
pub async fn with_store<T, F>(state: &AppState, device: &DeviceId, op: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&Store) -> Result<T, AppError> + Send + 'static,
{
    let db_dir = state.config.db_dir.clone();
    let device = device.clone();

    spawn_blocking(move || {
        let store = Store::open(&db_dir, &device)?;
        op(&store)
    })
    .await?
}
