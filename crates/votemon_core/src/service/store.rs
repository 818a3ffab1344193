//! Local store facade used by the mobile UI.
//!
//! # Responsibility
//! - Resolve the caller's `SectionContext` into the current section.
//! - Expose section/question/note use-cases over the repositories.
//! - Derive "needs sync" state from unsynced records on demand.
//!
//! # Invariants
//! - Section-scoped reads with an unresolvable context return empty results.
//! - Section-scoped writes with an unresolvable context fail with
//!   `StoreError::NoCurrentSection` and write nothing.
//! - Delete failures are surfaced to the caller and logged.

use crate::model::note::{NewNote, Note, NoteAttachment};
use crate::model::question::{Question, QuestionDraft};
use crate::model::section::{NewSection, SectionContext, SectionInfo, SectionKey};
use crate::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use crate::repo::question_repo::{DeleteSummary, QuestionRepository, SqliteQuestionRepository};
use crate::repo::section_repo::{SectionRepository, SqliteSectionRepository};
use crate::repo::{RepoError, RepoResult, SyncScope};
use log::{debug, error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Store error for section-scoped writes.
#[derive(Debug)]
pub enum StoreError {
    /// The selection context does not resolve to a stored section.
    NoCurrentSection,
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCurrentSection => write!(f, "no current polling station selected"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NoCurrentSection => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Store over the SQLite repositories sharing one connection.
pub type SqliteLocalStore<'conn> = LocalStore<
    SqliteSectionRepository<'conn>,
    SqliteQuestionRepository<'conn>,
    SqliteNoteRepository<'conn>,
>;

/// Single source of truth for sections, questions and notes.
pub struct LocalStore<S, Q, N>
where
    S: SectionRepository,
    Q: QuestionRepository,
    N: NoteRepository,
{
    sections: S,
    questions: Q,
    notes: N,
}

impl<'conn> SqliteLocalStore<'conn> {
    /// Builds a store over a migrated connection.
    pub fn sqlite(conn: &'conn Connection) -> Self {
        Self::new(
            SqliteSectionRepository::new(conn),
            SqliteQuestionRepository::new(conn),
            SqliteNoteRepository::new(conn),
        )
    }
}

impl<S, Q, N> LocalStore<S, Q, N>
where
    S: SectionRepository,
    Q: QuestionRepository,
    N: NoteRepository,
{
    pub fn new(sections: S, questions: Q, notes: N) -> Self {
        Self {
            sections,
            questions,
            notes,
        }
    }

    /// Resolves the selected polling station, if fully selected and stored.
    pub fn current_section(&self, ctx: &SectionContext) -> RepoResult<Option<SectionInfo>> {
        match ctx.key() {
            Some(key) => self.sections.find_section(&key),
            None => Ok(None),
        }
    }

    pub fn find_section(&self, key: &SectionKey) -> RepoResult<Option<SectionInfo>> {
        self.sections.find_section(key)
    }

    /// Inserts a new section. Callers wanting "find else create" use
    /// [`Self::find_or_create_section`].
    pub fn create_section(&self, section: &NewSection) -> RepoResult<SectionInfo> {
        let created = self.sections.create_section(section)?;
        info!(
            "event=section_create module=store status=ok section_uuid={}",
            created.uuid
        );
        Ok(created)
    }

    /// Returns the stored section for `section`'s key, creating it on first visit.
    pub fn find_or_create_section(&self, section: &NewSection) -> RepoResult<SectionInfo> {
        match self.sections.find_section(&section.key())? {
            Some(existing) => Ok(existing),
            None => self.create_section(section),
        }
    }

    pub fn record_arrival(&self, section: &SectionInfo, at_epoch_ms: i64) -> RepoResult<()> {
        self.sections.record_arrival(section.uuid, at_epoch_ms)
    }

    pub fn record_departure(&self, section: &SectionInfo, at_epoch_ms: i64) -> RepoResult<()> {
        self.sections.record_departure(section.uuid, at_epoch_ms)
    }

    /// All sections, earliest arrival first; never-arrived sections last.
    pub fn list_visited_sections(&self) -> RepoResult<Vec<SectionInfo>> {
        self.sections.list_visited_sections()
    }

    pub fn list_unsynced_notes(&self, scope: SyncScope<'_>) -> RepoResult<Vec<Note>> {
        self.notes.list_unsynced_notes(scope)
    }

    pub fn list_unsynced_questions(&self, scope: SyncScope<'_>) -> RepoResult<Vec<Question>> {
        self.questions.list_unsynced_questions(scope)
    }

    /// Whether any note or question still waits for upload.
    ///
    /// Recomputed on every call.
    pub fn needs_sync(&self) -> RepoResult<bool> {
        let notes = self.notes.count_unsynced_notes()?;
        let questions = self.questions.count_unsynced_questions()?;
        debug!(
            "event=needs_sync module=store status=ok unsynced_notes={} unsynced_questions={} sections_with_notes={} sections_with_questions={}",
            notes.records,
            questions.records,
            notes.sections,
            questions.sections
        );
        Ok(notes.records + questions.records > 0)
    }

    /// Questions of `form` in the current section, for every form version up
    /// to and including `form_version`.
    pub fn list_questions(
        &self,
        ctx: &SectionContext,
        form: &str,
        form_version: i64,
    ) -> RepoResult<Vec<Question>> {
        match self.current_section(ctx)? {
            Some(section) => self
                .questions
                .list_questions(section.uuid, form, form_version),
            None => Ok(Vec::new()),
        }
    }

    pub fn find_question(&self, id: i64, section: &SectionInfo) -> RepoResult<Option<Question>> {
        self.questions.find_question(section.uuid, id)
    }

    pub fn list_answered_questions(
        &self,
        ctx: &SectionContext,
        form: &str,
    ) -> RepoResult<Vec<Question>> {
        match self.current_section(ctx)? {
            Some(section) => self.questions.list_answered_questions(section.uuid, form),
            None => Ok(Vec::new()),
        }
    }

    /// Creates or replaces the answers of one question in `section`.
    pub fn save_question(
        &self,
        section: &SectionInfo,
        draft: &QuestionDraft,
    ) -> RepoResult<Question> {
        self.questions.save_question(section.uuid, draft)
    }

    /// Deletes questions together with their answers and linked notes.
    ///
    /// The batch is atomic: on error nothing is removed.
    pub fn delete_questions(&self, questions: &[Question]) -> RepoResult<DeleteSummary> {
        let started_at = Instant::now();
        match self.questions.delete_questions(questions) {
            Ok(summary) => {
                info!(
                    "event=questions_delete module=store status=ok duration_ms={} questions={} answers={} notes={} attachments={}",
                    started_at.elapsed().as_millis(),
                    summary.questions,
                    summary.answers,
                    summary.notes,
                    summary.attachments
                );
                Ok(summary)
            }
            Err(err) => {
                error!(
                    "event=questions_delete module=store status=error duration_ms={} requested={} error={}",
                    started_at.elapsed().as_millis(),
                    questions.len(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Notes of the current section linked to `question_id` (`None` for
    /// unattached notes), newest first.
    pub fn list_notes(
        &self,
        ctx: &SectionContext,
        question_id: Option<i64>,
    ) -> RepoResult<Vec<Note>> {
        match self.current_section(ctx)? {
            Some(section) => self.notes.list_notes(section.uuid, question_id),
            None => Ok(Vec::new()),
        }
    }

    /// Saves a note in the current section with the given attachments.
    pub fn save_note(
        &self,
        ctx: &SectionContext,
        text: impl Into<String>,
        attachments: &[NoteAttachment],
        question_id: Option<i64>,
    ) -> Result<Note, StoreError> {
        let section = self
            .current_section(ctx)?
            .ok_or(StoreError::NoCurrentSection)?;
        let new_note = NewNote {
            section_uuid: section.uuid,
            question_id,
            body: text.into(),
            attachment_ids: attachments
                .iter()
                .map(|attachment| attachment.uuid)
                .collect(),
        };

        match self.notes.save_note(&new_note) {
            Ok(note) => {
                info!(
                    "event=note_save module=store status=ok note_uuid={} attached={} attachments={}",
                    note.uuid,
                    note.is_attached_to_question(),
                    note.attachments.len()
                );
                Ok(note)
            }
            Err(err) => {
                error!(
                    "event=note_save module=store status=error section_uuid={} error={}",
                    section.uuid, err
                );
                Err(err.into())
            }
        }
    }

    /// Stores a picked attachment until it is bound by [`Self::save_note`].
    pub fn save_note_attachment(
        &self,
        local_filename: &str,
        data: &[u8],
    ) -> RepoResult<NoteAttachment> {
        self.notes.save_attachment(local_filename, data)
    }

    pub fn delete_note_attachment(&self, attachment: &NoteAttachment) -> RepoResult<()> {
        self.notes.delete_attachment(attachment.uuid).map_err(|err| {
            error!(
                "event=attachment_delete module=store status=error attachment_uuid={} error={}",
                attachment.uuid, err
            );
            err
        })
    }

    pub fn note_attachments(&self, note: &Note) -> RepoResult<Vec<NoteAttachment>> {
        self.notes.list_attachments(note.uuid)
    }

    pub fn mark_note_synced(&self, note: &Note) -> RepoResult<()> {
        self.notes.mark_note_synced(note.uuid)
    }

    pub fn mark_question_synced(&self, question: &Question) -> RepoResult<()> {
        self.questions
            .mark_question_synced(question.section_uuid, question.id)
    }

    pub fn mark_section_synced(&self, section: &SectionInfo) -> RepoResult<()> {
        self.sections.mark_section_synced(section.uuid)
    }
}
