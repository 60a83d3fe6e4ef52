//! Connection handling, schema, savepoints

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use super::{Result, StorageError};

/// Savepoint held open while a named checkpoint is pending
const CHECKPOINT_SAVEPOINT: &str = "mnemos_checkpoint";

/// Savepoint wrapping a single storage operation
const OP_SAVEPOINT: &str = "mnemos_op";

pub struct SqliteStorage {
    pub(super) conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStorage {
    /// Open (creating if needed) a collection file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let storage = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        storage.create_schema()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self { conn, path: None };
        storage.create_schema()?;
        Ok(storage)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY,
                nid INTEGER NOT NULL,
                did INTEGER NOT NULL,
                ord INTEGER NOT NULL,
                mod INTEGER NOT NULL,
                type INTEGER NOT NULL,
                queue INTEGER NOT NULL,
                due INTEGER NOT NULL,
                ivl INTEGER NOT NULL,
                factor INTEGER NOT NULL,
                reps INTEGER NOT NULL,
                lapses INTEGER NOT NULL,
                left INTEGER NOT NULL,
                odue INTEGER NOT NULL,
                odid INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY,
                mod INTEGER NOT NULL,
                tags TEXT NOT NULL
            );

            -- Review history; id is the answer time in milliseconds
            CREATE TABLE IF NOT EXISTS revlog (
                id INTEGER PRIMARY KEY,
                cid INTEGER NOT NULL,
                ease INTEGER NOT NULL,
                ivl INTEGER NOT NULL,
                lastIvl INTEGER NOT NULL,
                factor INTEGER NOT NULL,
                time INTEGER NOT NULL,
                type INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS decks (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                mtime INTEGER NOT NULL,
                kind TEXT NOT NULL,
                today TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS deck_config (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                mtime INTEGER NOT NULL,
                config TEXT NOT NULL
            );

            -- Collection settings as JSON values
            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                val TEXT NOT NULL
            );

            -- Removed objects, kept for sync tombstoning
            CREATE TABLE IF NOT EXISTS graves (
                oid INTEGER NOT NULL,
                kind INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS ix_cards_nid ON cards(nid);
            CREATE INDEX IF NOT EXISTS ix_cards_sched ON cards(did, queue, due);
            CREATE INDEX IF NOT EXISTS ix_revlog_cid ON revlog(cid);
            "#,
        )?;
        Ok(())
    }

    // ==================== Transactions ====================

    /// Run `func` inside a savepoint; every write it makes is rolled back if
    /// it returns an error. Nested calls nest savepoints.
    pub fn transact<T, E, F>(&self, func: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&SqliteStorage) -> std::result::Result<T, E>,
        E: From<StorageError>,
    {
        self.conn
            .execute_batch(&format!("SAVEPOINT {OP_SAVEPOINT}"))
            .map_err(StorageError::from)?;

        match func(self) {
            Ok(value) => {
                self.conn
                    .execute_batch(&format!("RELEASE {OP_SAVEPOINT}"))
                    .map_err(StorageError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.conn.execute_batch(&format!(
                    "ROLLBACK TO {OP_SAVEPOINT}; RELEASE {OP_SAVEPOINT}"
                )) {
                    log::warn!("Failed to roll back savepoint: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    /// Open the checkpoint savepoint. Writes made until it is released or
    /// rolled back can be discarded as one unit.
    pub fn begin_checkpoint(&self) -> Result<()> {
        self.conn
            .execute_batch(&format!("SAVEPOINT {CHECKPOINT_SAVEPOINT}"))?;
        Ok(())
    }

    /// Keep everything written since the checkpoint began.
    pub fn release_checkpoint(&self) -> Result<()> {
        self.conn
            .execute_batch(&format!("RELEASE {CHECKPOINT_SAVEPOINT}"))?;
        Ok(())
    }

    /// Discard everything written since the checkpoint began.
    pub fn rollback_checkpoint(&self) -> Result<()> {
        self.conn.execute_batch(&format!(
            "ROLLBACK TO {CHECKPOINT_SAVEPOINT}; RELEASE {CHECKPOINT_SAVEPOINT}"
        ))?;
        Ok(())
    }

    /// Run raw SQL. Used by migrations and by tests that need to break things.
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}
