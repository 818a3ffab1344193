//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from the store facade.
//!
//! # Invariants
//! - Write paths validate their input before any SQL mutation.
//! - Multi-row writes run inside one `IMMEDIATE` transaction.
//! - Lookups return `Option`/empty lists; only writes report `*NotFound`.

use crate::db::DbError;
use crate::model::note::{AttachmentId, NoteId};
use crate::model::section::{SectionInfo, SectionKey, SectionUuid};
use crate::model::validation::ValidationError;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub mod note_repo;
pub mod question_repo;
pub mod section_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence error for store reads and writes.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    /// A section with the same natural key already exists.
    DuplicateSection(SectionKey),
    SectionNotFound(SectionUuid),
    QuestionNotFound {
        section_uuid: SectionUuid,
        question_id: i64,
    },
    NoteNotFound(NoteId),
    AttachmentNotFound(AttachmentId),
    /// Attachment is already bound to another note.
    AttachmentAlreadyBound(AttachmentId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::DuplicateSection(key) => write!(
                f,
                "section already exists: {}/{}/{}/{}",
                key.province_code, key.county_code, key.municipality_code, key.section_id
            ),
            Self::SectionNotFound(id) => write!(f, "section not found: {id}"),
            Self::QuestionNotFound {
                section_uuid,
                question_id,
            } => write!(
                f,
                "question {question_id} not found in section {section_uuid}"
            ),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::AttachmentNotFound(id) => write!(f, "attachment not found: {id}"),
            Self::AttachmentAlreadyBound(id) => {
                write!(f, "attachment already belongs to a note: {id}")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted store data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Which records an unsynced-record query covers.
#[derive(Debug, Clone, Copy)]
pub enum SyncScope<'a> {
    /// Every visited section.
    All,
    /// A single section.
    Section(&'a SectionInfo),
}

impl SyncScope<'_> {
    pub(crate) fn section_uuid(&self) -> Option<String> {
        match self {
            Self::All => None,
            Self::Section(section) => Some(section.uuid.to_string()),
        }
    }
}

/// Unsynced rows of one table and the number of sections they span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnsyncedCount {
    pub records: usize,
    pub sections: usize,
}

/// Counts without loading rows; `table` must carry `section_uuid` and `synced`.
pub(crate) fn count_unsynced_rows(
    conn: &Connection,
    table: &'static str,
) -> RepoResult<UnsyncedCount> {
    let (records, sections): (i64, i64) = conn.query_row(
        &format!(
            "SELECT COUNT(*), COUNT(DISTINCT section_uuid) FROM {table} WHERE synced = 0;"
        ),
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(UnsyncedCount {
        records: usize::try_from(records).unwrap_or_default(),
        sections: usize::try_from(sections).unwrap_or_default(),
    })
}

/// Current wall-clock time in unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Starts an `IMMEDIATE` transaction on a shared connection borrow.
///
/// Repositories only hold `&Connection`; the store is single-writer, so no
/// other transaction can be open on the same connection.
pub(crate) fn begin_immediate(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn parse_flag(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn section_exists(conn: &Connection, section_uuid: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sections WHERE uuid = ?1);",
        [section_uuid],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
