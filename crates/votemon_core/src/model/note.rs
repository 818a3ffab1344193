//! Note and note attachment model.
//!
//! # Responsibility
//! - Define free-text notes scoped to a section and optionally a question.
//! - Define binary attachments picked before the owning note is saved.
//!
//! # Invariants
//! - `question_id == None` means "not attached to any question".
//! - Attachment `position` is set exactly when `note_uuid` is set.
//! - `local_filename` names a file, never a path; any other text is kept
//!   as picked, including spaces and non-ASCII letters.

use crate::model::section::SectionUuid;
use crate::model::validation::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NoteId = Uuid;
pub type AttachmentId = Uuid;

static PATH_LIKE_FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\.{1,2}$|/").expect("valid filename regex"));

/// Persisted note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub uuid: NoteId,
    pub section_uuid: SectionUuid,
    pub question_id: Option<i64>,
    pub body: String,
    /// Creation time in unix epoch milliseconds.
    pub date: i64,
    pub synced: bool,
    /// Ordered as given when the note was saved.
    pub attachments: Vec<NoteAttachment>,
}

impl Note {
    pub fn is_attached_to_question(&self) -> bool {
        self.question_id.is_some()
    }
}

/// Binary payload (usually a photo) picked for a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteAttachment {
    pub uuid: AttachmentId,
    /// `None` while the attachment is picked but the note is not saved yet.
    pub note_uuid: Option<NoteId>,
    pub position: Option<u32>,
    pub local_filename: String,
    pub data: Vec<u8>,
    /// Unix epoch milliseconds.
    pub pick_date: i64,
}

/// Write model for a new note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub section_uuid: SectionUuid,
    pub question_id: Option<i64>,
    pub body: String,
    pub attachment_ids: Vec<AttachmentId>,
}

/// Rejects file names that would escape the attachment directory.
pub fn validate_local_filename(filename: &str) -> Result<(), ValidationError> {
    if PATH_LIKE_FILENAME_RE.is_match(filename) {
        return Err(ValidationError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}
