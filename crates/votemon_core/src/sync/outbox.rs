//! Upload outbox over unsynced store records.
//!
//! # Responsibility
//! - Snapshot unsynced sections, questions and notes into one upload batch.
//! - Mark a batch as synced once the remote service confirmed it.
//!
//! # Invariants
//! - A snapshot carries every section referenced by its questions/notes.
//! - Sections and questions are only acknowledged at the captured
//!   `revision`; later local edits stay pending.
//! - Acknowledgement is one transaction.

use crate::model::note::{AttachmentId, Note, NoteId};
use crate::model::question::Question;
use crate::model::section::{SectionInfo, SectionUuid};
use crate::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use crate::repo::question_repo::{QuestionRepository, SqliteQuestionRepository};
use crate::repo::section_repo::{SectionRepository, SqliteSectionRepository};
use crate::repo::{begin_immediate, RepoResult, SyncScope};
use log::info;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attachment metadata sent ahead of the binary upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentManifest {
    pub uuid: AttachmentId,
    pub position: u32,
    pub local_filename: String,
    pub pick_date: i64,
    pub size_bytes: u64,
}

/// Note as carried by an upload batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNote {
    pub uuid: NoteId,
    pub section_uuid: SectionUuid,
    pub question_id: Option<i64>,
    pub body: String,
    pub date: i64,
    pub attachments: Vec<AttachmentManifest>,
}

impl From<Note> for PendingNote {
    fn from(note: Note) -> Self {
        let attachments = note
            .attachments
            .into_iter()
            .map(|attachment| AttachmentManifest {
                uuid: attachment.uuid,
                position: attachment.position.unwrap_or_default(),
                local_filename: attachment.local_filename,
                pick_date: attachment.pick_date,
                size_bytes: attachment.data.len() as u64,
            })
            .collect();
        Self {
            uuid: note.uuid,
            section_uuid: note.section_uuid,
            question_id: note.question_id,
            body: note.body,
            date: note.date,
            attachments,
        }
    }
}

/// Snapshot of everything waiting for upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBatch {
    pub sections: Vec<SectionInfo>,
    pub questions: Vec<Question>,
    pub notes: Vec<PendingNote>,
}

impl SyncBatch {
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
            && self.notes.is_empty()
            && self.sections.iter().all(|section| section.synced)
    }
}

/// Record counts, used for pending badges and acknowledgement results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub sections: usize,
    pub questions: usize,
    pub notes: usize,
}

impl SyncSummary {
    pub fn is_empty(&self) -> bool {
        self.sections == 0 && self.questions == 0 && self.notes == 0
    }
}

/// SQLite-backed outbox.
pub struct SqliteSyncOutbox<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSyncOutbox<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Counts unsynced records across all sections.
    pub fn summary(&self) -> RepoResult<SyncSummary> {
        Ok(SyncSummary {
            sections: self.count_unsynced("sections")?,
            questions: SqliteQuestionRepository::new(self.conn)
                .count_unsynced_questions()?
                .records,
            notes: SqliteNoteRepository::new(self.conn)
                .count_unsynced_notes()?
                .records,
        })
    }

    /// Captures the current unsynced state for `scope`.
    pub fn pending_sync(&self, scope: SyncScope<'_>) -> RepoResult<SyncBatch> {
        let section_repo = SqliteSectionRepository::new(self.conn);
        let questions = SqliteQuestionRepository::new(self.conn).list_unsynced_questions(scope)?;
        let notes = SqliteNoteRepository::new(self.conn).list_unsynced_notes(scope)?;

        let mut sections = BTreeMap::new();
        match scope {
            SyncScope::All => {
                for section in section_repo.list_unsynced_sections()? {
                    sections.insert(section.uuid, section);
                }
            }
            SyncScope::Section(section) => {
                if let Some(current) = section_repo.get_section(section.uuid)? {
                    if !current.synced {
                        sections.insert(current.uuid, current);
                    }
                }
            }
        }

        let referenced = questions
            .iter()
            .map(|question| question.section_uuid)
            .chain(notes.iter().map(|note| note.section_uuid))
            .collect::<Vec<_>>();
        for section_uuid in referenced {
            if sections.contains_key(&section_uuid) {
                continue;
            }
            if let Some(section) = section_repo.get_section(section_uuid)? {
                sections.insert(section_uuid, section);
            }
        }

        Ok(SyncBatch {
            sections: sections.into_values().collect(),
            questions,
            notes: notes.into_iter().map(PendingNote::from).collect(),
        })
    }

    /// Marks the records of a confirmed upload as synced.
    ///
    /// Returns how many records were actually flipped. Records edited or
    /// deleted after the snapshot are skipped.
    pub fn acknowledge_sync(&self, batch: &SyncBatch) -> RepoResult<SyncSummary> {
        let tx = begin_immediate(self.conn)?;
        let mut summary = SyncSummary::default();
        {
            let mut ack_section = tx.prepare_cached(
                "UPDATE sections SET synced = 1
                 WHERE uuid = ?1 AND revision = ?2 AND synced = 0;",
            )?;
            for section in &batch.sections {
                summary.sections +=
                    ack_section.execute(params![section.uuid.to_string(), section.revision])?;
            }

            let mut ack_question = tx.prepare_cached(
                "UPDATE questions SET synced = 1
                 WHERE section_uuid = ?1 AND question_id = ?2 AND revision = ?3 AND synced = 0;",
            )?;
            for question in &batch.questions {
                summary.questions += ack_question.execute(params![
                    question.section_uuid.to_string(),
                    question.id,
                    question.revision,
                ])?;
            }

            let mut ack_note = tx
                .prepare_cached("UPDATE notes SET synced = 1 WHERE uuid = ?1 AND synced = 0;")?;
            for note in &batch.notes {
                summary.notes += ack_note.execute([note.uuid.to_string()])?;
            }
        }
        tx.commit()?;

        info!(
            "event=sync_ack module=sync status=ok sections={} questions={} notes={}",
            summary.sections, summary.questions, summary.notes
        );
        Ok(summary)
    }

    fn count_unsynced(&self, table: &'static str) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE synced = 0;"),
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
