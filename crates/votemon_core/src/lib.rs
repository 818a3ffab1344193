//! Core local store for VoteMon polling-station observers.
//! This crate is the single source of truth for sections, answers and notes.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::note::{AttachmentId, NewNote, Note, NoteAttachment, NoteId};
pub use model::question::{Answer, Question, QuestionDraft};
pub use model::section::{NewSection, SectionContext, SectionInfo, SectionKey, SectionUuid};
pub use model::validation::ValidationError;
pub use repo::note_repo::{NoteRepository, SqliteNoteRepository};
pub use repo::question_repo::{DeleteSummary, QuestionRepository, SqliteQuestionRepository};
pub use repo::section_repo::{SectionRepository, SqliteSectionRepository};
pub use repo::{now_epoch_ms, RepoError, RepoResult, SyncScope, UnsyncedCount};
pub use service::store::{LocalStore, SqliteLocalStore, StoreError};
pub use sync::outbox::{
    AttachmentManifest, PendingNote, SqliteSyncOutbox, SyncBatch, SyncSummary,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
