//! Note/attachment repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist notes scoped to a section and optionally to a question.
//! - Store picked attachments and bind them to notes in caller order.
//!
//! # Invariants
//! - Note listings are ordered newest first: `date DESC`, then most
//!   recent insertion.
//! - `question_id IS NULL` is the only representation of "unattached".
//! - Binding attachments happens in the same transaction as the note insert.
//! - Removing a bound attachment keeps positions contiguous and puts the
//!   owning note back in the upload queue.

use crate::model::note::{
    validate_local_filename, AttachmentId, NewNote, Note, NoteAttachment, NoteId,
};
use crate::model::section::SectionUuid;
use crate::repo::{
    begin_immediate, count_unsynced_rows, now_epoch_ms, parse_flag, parse_uuid, section_exists,
    RepoError, RepoResult, SyncScope, UnsyncedCount,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

const NOTE_SELECT_SQL: &str = "SELECT
    uuid,
    section_uuid,
    question_id,
    body,
    date,
    synced
FROM notes";

const ATTACHMENT_SELECT_SQL: &str = "SELECT
    uuid,
    note_uuid,
    position,
    local_filename,
    data,
    pick_date
FROM note_attachments";

/// Repository interface for notes and note attachments.
pub trait NoteRepository {
    /// Inserts the note and binds `attachment_ids` to it in order.
    fn save_note(&self, note: &NewNote) -> RepoResult<Note>;
    fn get_note(&self, uuid: NoteId) -> RepoResult<Option<Note>>;
    /// Notes of one section whose question link equals `question_id`.
    fn list_notes(&self, section_uuid: SectionUuid, question_id: Option<i64>)
        -> RepoResult<Vec<Note>>;
    fn list_unsynced_notes(&self, scope: SyncScope<'_>) -> RepoResult<Vec<Note>>;
    fn count_unsynced_notes(&self) -> RepoResult<UnsyncedCount>;
    fn mark_note_synced(&self, uuid: NoteId) -> RepoResult<()>;
    /// Stores a picked attachment that is not yet bound to any note.
    fn save_attachment(&self, local_filename: &str, data: &[u8]) -> RepoResult<NoteAttachment>;
    fn get_attachment(&self, uuid: AttachmentId) -> RepoResult<Option<NoteAttachment>>;
    fn delete_attachment(&self, uuid: AttachmentId) -> RepoResult<()>;
    fn list_attachments(&self, note_uuid: NoteId) -> RepoResult<Vec<NoteAttachment>>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_notes(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            let mut note = parse_note_row(row)?;
            note.attachments = self.list_attachments(note.uuid)?;
            notes.push(note);
        }
        Ok(notes)
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn save_note(&self, note: &NewNote) -> RepoResult<Note> {
        let note_uuid = Uuid::new_v4();
        let note_text = note_uuid.to_string();
        let section_text = note.section_uuid.to_string();

        let tx = begin_immediate(self.conn)?;
        if !section_exists(&tx, section_text.as_str())? {
            return Err(RepoError::SectionNotFound(note.section_uuid));
        }

        tx.execute(
            "INSERT INTO notes (uuid, section_uuid, question_id, body, date, synced)
             VALUES (?1, ?2, ?3, ?4, ?5, 0);",
            params![
                note_text.as_str(),
                section_text.as_str(),
                note.question_id,
                note.body.as_str(),
                now_epoch_ms(),
            ],
        )?;

        {
            let mut bind = tx.prepare_cached(
                "UPDATE note_attachments
                 SET note_uuid = ?2, position = ?3
                 WHERE uuid = ?1 AND note_uuid IS NULL;",
            )?;
            for (position, attachment_id) in note.attachment_ids.iter().enumerate() {
                let position = i64::try_from(position).map_err(|_| {
                    RepoError::InvalidData("attachment position overflow".to_string())
                })?;
                let changed = bind.execute(params![
                    attachment_id.to_string(),
                    note_text.as_str(),
                    position,
                ])?;
                if changed == 0 {
                    return Err(classify_unbindable(&tx, *attachment_id)?);
                }
            }
        }
        tx.commit()?;

        self.get_note(note_uuid)?
            .ok_or(RepoError::NoteNotFound(note_uuid))
    }

    fn get_note(&self, uuid: NoteId) -> RepoResult<Option<Note>> {
        let mut found = self.query_notes(
            &format!("{NOTE_SELECT_SQL} WHERE uuid = ?;"),
            vec![Value::Text(uuid.to_string())],
        )?;
        Ok(found.pop())
    }

    fn list_notes(
        &self,
        section_uuid: SectionUuid,
        question_id: Option<i64>,
    ) -> RepoResult<Vec<Note>> {
        let question_value = match question_id {
            Some(id) => Value::Integer(id),
            None => Value::Null,
        };
        self.query_notes(
            &format!(
                "{NOTE_SELECT_SQL}
                 WHERE section_uuid = ?
                   AND question_id IS ?
                 ORDER BY date DESC, rowid DESC;"
            ),
            vec![Value::Text(section_uuid.to_string()), question_value],
        )
    }

    fn list_unsynced_notes(&self, scope: SyncScope<'_>) -> RepoResult<Vec<Note>> {
        let mut sql = format!("{NOTE_SELECT_SQL} WHERE synced = 0");
        let mut bind_values = Vec::new();
        if let Some(section_uuid) = scope.section_uuid() {
            sql.push_str(" AND section_uuid = ?");
            bind_values.push(Value::Text(section_uuid));
        }
        self.query_notes(&sql, bind_values)
    }

    fn count_unsynced_notes(&self) -> RepoResult<UnsyncedCount> {
        count_unsynced_rows(self.conn, "notes")
    }

    fn mark_note_synced(&self, uuid: NoteId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("UPDATE notes SET synced = 1 WHERE uuid = ?1;", [uuid.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NoteNotFound(uuid));
        }
        Ok(())
    }

    fn save_attachment(&self, local_filename: &str, data: &[u8]) -> RepoResult<NoteAttachment> {
        validate_local_filename(local_filename)?;

        let uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO note_attachments (uuid, note_uuid, position, local_filename, data, pick_date)
             VALUES (?1, NULL, NULL, ?2, ?3, ?4);",
            params![uuid.to_string(), local_filename, data, now_epoch_ms()],
        )?;

        self.get_attachment(uuid)?
            .ok_or(RepoError::AttachmentNotFound(uuid))
    }

    fn get_attachment(&self, uuid: AttachmentId) -> RepoResult<Option<NoteAttachment>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{ATTACHMENT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let row = stmt
            .query_row([uuid.to_string()], |row| Ok(parse_attachment_row(row)))
            .optional()?;
        row.transpose()
    }

    fn delete_attachment(&self, uuid: AttachmentId) -> RepoResult<()> {
        let uuid_text = uuid.to_string();
        let tx = begin_immediate(self.conn)?;
        let binding = tx
            .query_row(
                "SELECT note_uuid, position FROM note_attachments WHERE uuid = ?1;",
                [uuid_text.as_str()],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                    ))
                },
            )
            .optional()?
            .ok_or(RepoError::AttachmentNotFound(uuid))?;

        tx.execute(
            "DELETE FROM note_attachments WHERE uuid = ?1;",
            [uuid_text.as_str()],
        )?;

        if let (Some(note_uuid), Some(removed_position)) = binding {
            // One row at a time, lowest first: the (note_uuid, position) index is unique.
            let later = {
                let mut stmt = tx.prepare(
                    "SELECT uuid FROM note_attachments
                     WHERE note_uuid = ?1 AND position > ?2
                     ORDER BY position ASC;",
                )?;
                let rows = stmt.query_map(params![note_uuid.as_str(), removed_position], |row| {
                    row.get::<_, String>(0)
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };
            for attachment_uuid in &later {
                tx.execute(
                    "UPDATE note_attachments SET position = position - 1 WHERE uuid = ?1;",
                    [attachment_uuid.as_str()],
                )?;
            }
            tx.execute(
                "UPDATE notes SET synced = 0 WHERE uuid = ?1;",
                [note_uuid.as_str()],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn list_attachments(&self, note_uuid: NoteId) -> RepoResult<Vec<NoteAttachment>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{ATTACHMENT_SELECT_SQL} WHERE note_uuid = ?1 ORDER BY position ASC;"
        ))?;
        let mut rows = stmt.query([note_uuid.to_string()])?;
        let mut attachments = Vec::new();
        while let Some(row) = rows.next()? {
            attachments.push(parse_attachment_row(row)?);
        }
        Ok(attachments)
    }
}

fn classify_unbindable(conn: &Connection, attachment_id: AttachmentId) -> RepoResult<RepoError> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM note_attachments WHERE uuid = ?1);",
        [attachment_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(if exists == 1 {
        RepoError::AttachmentAlreadyBound(attachment_id)
    } else {
        RepoError::AttachmentNotFound(attachment_id)
    })
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let uuid_text: String = row.get("uuid")?;
    let section_text: String = row.get("section_uuid")?;
    Ok(Note {
        uuid: parse_uuid(&uuid_text, "notes.uuid")?,
        section_uuid: parse_uuid(&section_text, "notes.section_uuid")?,
        question_id: row.get("question_id")?,
        body: row.get("body")?,
        date: row.get("date")?,
        synced: parse_flag(row.get("synced")?, "notes.synced")?,
        attachments: Vec::new(),
    })
}

fn parse_attachment_row(row: &Row<'_>) -> RepoResult<NoteAttachment> {
    let uuid_text: String = row.get("uuid")?;
    let note_uuid = match row.get::<_, Option<String>>("note_uuid")? {
        Some(value) => Some(parse_uuid(&value, "note_attachments.note_uuid")?),
        None => None,
    };
    let position = match row.get::<_, Option<i64>>("position")? {
        Some(value) => Some(u32::try_from(value).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid position `{value}` in note_attachments.position"
            ))
        })?),
        None => None,
    };
    Ok(NoteAttachment {
        uuid: parse_uuid(&uuid_text, "note_attachments.uuid")?,
        note_uuid,
        position,
        local_filename: row.get("local_filename")?,
        data: row.get("data")?,
        pick_date: row.get("pick_date")?,
    })
}
