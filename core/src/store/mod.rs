//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Handlers and the time engine call store methods; they never execute SQL
//! directly.

use crate::{error::GameResult, types::{FiefdomId, Timestamp}};
use rusqlite::{params, Connection, Transaction};
use serde::{Deserialize, Serialize};

mod building;
mod fiefdom;
mod roster;
mod wall;

pub struct GameStore {
    conn: Connection,
}

/// One committed action, as persisted in `action_log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub id:           Option<i64>,
    pub request_id:   String,
    pub fiefdom_id:   FiefdomId,
    pub character_id: i64,
    pub kind:         String,
    pub status:       String,
    /// JSON array of field diffs.
    pub diffs:        String,
    pub created_at:   Timestamp,
}

impl GameStore {
    pub fn open(path: &str) -> GameResult<Self> {
        let conn = Connection::open(path)?;
        // WAL only matters for real files.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> GameResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> GameResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_action_log.sql"))?;
        Ok(())
    }

    /// Start a transaction on the store's connection. Store methods called
    /// while it is alive run inside it; dropping it without `commit` rolls
    /// everything back.
    pub fn begin_transaction(&self) -> GameResult<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    /// True while a transaction opened by `begin_transaction` is pending.
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    // ── Action log ─────────────────────────────────────────────

    pub fn append_action_log(&self, entry: &ActionLogEntry) -> GameResult<i64> {
        self.conn.execute(
            "INSERT INTO action_log
                 (request_id, fiefdom_id, character_id, kind, status, diffs, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.request_id,
                entry.fiefdom_id,
                entry.character_id,
                entry.kind,
                entry.status,
                entry.diffs,
                entry.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn action_log_for_fiefdom(&self, fiefdom_id: FiefdomId) -> GameResult<Vec<ActionLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, request_id, fiefdom_id, character_id, kind, status, diffs, created_at
             FROM action_log WHERE fiefdom_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![fiefdom_id], |row| {
                Ok(ActionLogEntry {
                    id:           Some(row.get(0)?),
                    request_id:   row.get(1)?,
                    fiefdom_id:   row.get(2)?,
                    character_id: row.get(3)?,
                    kind:         row.get(4)?,
                    status:       row.get(5)?,
                    diffs:        row.get(6)?,
                    created_at:   row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Number of logged actions for a fiefdom (for tests).
    pub fn action_log_count(&self, fiefdom_id: FiefdomId) -> GameResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM action_log WHERE fiefdom_id = ?1",
            params![fiefdom_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
