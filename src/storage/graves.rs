//! Tombstones for removed objects

use rusqlite::params;

use super::{Result, SqliteStorage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraveKind {
    Card,
    Note,
    Deck,
}

impl GraveKind {
    fn as_u8(self) -> u8 {
        match self {
            Self::Card => 0,
            Self::Note => 1,
            Self::Deck => 2,
        }
    }
}

impl SqliteStorage {
    pub fn add_grave(&self, oid: i64, kind: GraveKind) -> Result<()> {
        self.conn.execute(
            "INSERT INTO graves (oid, kind) VALUES (?1, ?2)",
            params![oid, kind.as_u8()],
        )?;
        Ok(())
    }

    pub fn grave_count(&self, kind: GraveKind) -> Result<u32> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM graves WHERE kind = ?",
            params![kind.as_u8()],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }
}
