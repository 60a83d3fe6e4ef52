//! Note rows

use rusqlite::{params, OptionalExtension};

use super::{Result, SqliteStorage, StorageError};
use crate::notes::{Note, NoteId};
use crate::timestamp::{TimestampMillis, TimestampSecs};

impl SqliteStorage {
    // ==================== Note Operations ====================

    pub fn get_note(&self, id: NoteId) -> Result<Option<Note>> {
        let note = self
            .conn
            .query_row(
                "SELECT id, mod, tags FROM notes WHERE id = ?",
                params![id.0],
                |row| {
                    Ok(Note {
                        id: NoteId(row.get(0)?),
                        mtime: TimestampSecs(row.get(1)?),
                        tags: Note::tags_from_string(&row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;
        Ok(note)
    }

    pub fn get_note_required(&self, id: NoteId) -> Result<Note> {
        self.get_note(id)?.ok_or(StorageError::NoteNotFound(id))
    }

    pub fn add_note(&self, note: &mut Note) -> Result<()> {
        if note.id.0 == 0 {
            let max_id: i64 = self
                .conn
                .query_row("SELECT COALESCE(MAX(id), 0) FROM notes", [], |row| row.get(0))?;
            note.id = NoteId(TimestampMillis::now().0.max(max_id + 1));
        }
        self.conn.execute(
            "INSERT INTO notes (id, mod, tags) VALUES (?1, ?2, ?3)",
            params![note.id.0, note.mtime.0, note.tags_to_string()],
        )?;
        Ok(())
    }

    pub fn update_note(&self, note: &Note) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE notes SET mod = ?2, tags = ?3 WHERE id = ?1",
            params![note.id.0, note.mtime.0, note.tags_to_string()],
        )?;
        if changed == 0 {
            return Err(StorageError::NoteNotFound(note.id));
        }
        Ok(())
    }

    pub fn remove_note(&self, id: NoteId) -> Result<()> {
        self.conn
            .execute("DELETE FROM notes WHERE id = ?", params![id.0])?;
        Ok(())
    }
}
