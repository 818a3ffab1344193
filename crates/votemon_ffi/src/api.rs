//! FFI use-case API for the mobile UI.
//!
//! # Responsibility
//! - Expose store use-cases to Dart via FRB.
//! - Translate the UI's preference selection into a `SectionContext`.
//! - Hand upload batches to the sync service as JSON and take them back
//!   for acknowledgement.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Failures are reported in response envelopes, never thrown.

use log::error;
use std::path::PathBuf;
use std::sync::OnceLock;
use uuid::Uuid;
use votemon_core::db::open_db;
use votemon_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, now_epoch_ms,
    ping as ping_inner, Answer, NewSection, Note, NoteAttachment, NoteRepository, Question,
    QuestionDraft, SectionContext, SectionInfo, SqliteLocalStore, SqliteNoteRepository,
    SqliteSyncOutbox, StoreError, SyncBatch, SyncScope,
};

const STORE_DB_FILE_NAME: &str = "votemon_store.sqlite3";
const STORE_DB_PATH_ENV: &str = "VOTEMON_DB_PATH";
const NO_SECTION_MESSAGE: &str = "no polling station selected";
static STORE_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes core logging once per process.
///
/// `level` is one of `trace|debug|info|warn|error`; `log_dir` is an absolute
/// directory. Returns an empty string on success, the error message otherwise.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Polling station currently selected in the app's preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionSelection {
    pub province_code: Option<String>,
    pub county_code: Option<String>,
    pub municipality_code: Option<String>,
    pub section_id: Option<i64>,
}

impl SectionSelection {
    fn to_context(&self) -> SectionContext {
        SectionContext {
            province_code: self.province_code.clone(),
            county_code: self.county_code.clone(),
            municipality_code: self.municipality_code.clone(),
            section_id: self.section_id,
        }
    }
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreActionResponse {
    pub ok: bool,
    /// Identity of the created or affected record.
    pub id: Option<String>,
    pub message: String,
}

impl StoreActionResponse {
    fn success(message: impl Into<String>, id: Option<String>) -> Self {
        Self {
            ok: true,
            id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id: None,
            message: message.into(),
        }
    }
}

/// Visited polling station row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionItem {
    pub section_uuid: String,
    pub province_code: String,
    pub province_name: String,
    pub county_code: String,
    pub county_name: String,
    pub municipality_code: String,
    pub municipality_name: String,
    pub section_id: i64,
    pub arrive_time_epoch_ms: Option<i64>,
    pub leave_time_epoch_ms: Option<i64>,
    pub synced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionListResponse {
    pub items: Vec<SectionItem>,
    pub message: String,
}

/// One chosen option, with the free text typed next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerItem {
    pub option_id: i64,
    pub text: Option<String>,
}

/// Stored question state of the selected section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionItem {
    pub question_id: i64,
    pub form: String,
    pub form_version: i64,
    pub answered: bool,
    pub synced: bool,
    pub answers: Vec<AnswerItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionListResponse {
    pub items: Vec<QuestionItem>,
    pub message: String,
}

/// `item` is `None` when the question has no stored state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionLookupResponse {
    pub ok: bool,
    pub item: Option<QuestionItem>,
    pub message: String,
}

/// Note row rendered by the notes feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteItem {
    pub note_id: String,
    pub question_id: Option<i64>,
    pub body: String,
    pub date_epoch_ms: i64,
    pub synced: bool,
    pub attachment_count: u32,
}

/// Notes feed envelope, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteListResponse {
    pub items: Vec<NoteItem>,
    pub message: String,
}

/// Pending upload counts for the sync badge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatusResponse {
    pub needs_sync: bool,
    pub pending_sections: u32,
    pub pending_questions: u32,
    pub pending_notes: u32,
    pub message: String,
}

/// Upload snapshot for the sync service.
///
/// `batch_json` must be passed back unchanged to `store_acknowledge_sync`
/// once the server confirmed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncBatchResponse {
    pub ok: bool,
    pub batch_json: Option<String>,
    pub sections: u32,
    pub questions: u32,
    pub notes: u32,
    pub message: String,
}

/// Records actually flipped to synced by an acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncAckResponse {
    pub ok: bool,
    pub sections: u32,
    pub questions: u32,
    pub notes: u32,
    pub message: String,
}

/// Resolves the polling station chosen at login, creating it on first visit.
#[flutter_rust_bridge::frb(sync)]
#[allow(clippy::too_many_arguments)]
pub fn store_open_section(
    province_code: String,
    province_name: String,
    county_code: String,
    county_name: String,
    municipality_code: String,
    municipality_name: String,
    section_id: i64,
) -> StoreActionResponse {
    let section = NewSection {
        province_code: province_code.trim().to_string(),
        province_name: province_name.trim().to_string(),
        county_code: county_code.trim().to_string(),
        county_name: county_name.trim().to_string(),
        municipality_code: municipality_code.trim().to_string(),
        municipality_name: municipality_name.trim().to_string(),
        section_id,
    };
    match with_store(|store| {
        store
            .find_or_create_section(&section)
            .map_err(|err| err.to_string())
    }) {
        Ok(info) => StoreActionResponse::success("Section ready.", Some(info.uuid.to_string())),
        Err(err) => StoreActionResponse::failure(format!("store_open_section failed: {err}")),
    }
}

/// Lists every stored polling station, earliest arrival first.
#[flutter_rust_bridge::frb(sync)]
pub fn store_list_visited_sections() -> SectionListResponse {
    match with_store(|store| store.list_visited_sections().map_err(|err| err.to_string())) {
        Ok(sections) => {
            let items = sections.into_iter().map(to_section_item).collect::<Vec<_>>();
            let message = format!("Found {} section(s).", items.len());
            SectionListResponse { items, message }
        }
        Err(err) => SectionListResponse {
            items: Vec::new(),
            message: format!("store_list_visited_sections failed: {err}"),
        },
    }
}

/// Records check-in at the selected station. `at_epoch_ms = None` means now.
#[flutter_rust_bridge::frb(sync)]
pub fn store_record_arrival(
    selection: SectionSelection,
    at_epoch_ms: Option<i64>,
) -> StoreActionResponse {
    let at = at_epoch_ms.unwrap_or_else(now_epoch_ms);
    section_action("store_record_arrival", &selection, "Arrival recorded.", |store, section| {
        store.record_arrival(section, at)
    })
}

/// Records check-out at the selected station. `at_epoch_ms = None` means now.
#[flutter_rust_bridge::frb(sync)]
pub fn store_record_departure(
    selection: SectionSelection,
    at_epoch_ms: Option<i64>,
) -> StoreActionResponse {
    let at = at_epoch_ms.unwrap_or_else(now_epoch_ms);
    section_action(
        "store_record_departure",
        &selection,
        "Departure recorded.",
        |store, section| store.record_departure(section, at),
    )
}

/// Questions of `form` answered up to `form_version` in the selected section.
#[flutter_rust_bridge::frb(sync)]
pub fn store_list_questions(
    selection: SectionSelection,
    form: String,
    form_version: i64,
) -> QuestionListResponse {
    let ctx = selection.to_context();
    question_list("store_list_questions", |store| {
        store.list_questions(&ctx, form.trim(), form_version)
    })
}

/// Questions of `form` with at least one answer in the selected section.
#[flutter_rust_bridge::frb(sync)]
pub fn store_list_answered_questions(
    selection: SectionSelection,
    form: String,
) -> QuestionListResponse {
    let ctx = selection.to_context();
    question_list("store_list_answered_questions", |store| {
        store.list_answered_questions(&ctx, form.trim())
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn store_find_question(
    selection: SectionSelection,
    question_id: i64,
) -> QuestionLookupResponse {
    let result = with_store(|store| {
        let section = resolve_section(store, &selection)?;
        store
            .find_question(question_id, &section)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(Some(question)) => QuestionLookupResponse {
            ok: true,
            item: Some(to_question_item(question)),
            message: "Question found.".to_string(),
        },
        Ok(None) => QuestionLookupResponse {
            ok: true,
            item: None,
            message: "Question not answered yet.".to_string(),
        },
        Err(err) => QuestionLookupResponse {
            ok: false,
            item: None,
            message: format!("store_find_question failed: {err}"),
        },
    }
}

/// Stores the answers of one question, replacing any previous answers.
///
/// An empty `answers` list keeps the question but marks it unanswered.
#[flutter_rust_bridge::frb(sync)]
pub fn store_save_question(
    selection: SectionSelection,
    question_id: i64,
    form: String,
    form_version: i64,
    answers: Vec<AnswerItem>,
) -> StoreActionResponse {
    let draft = answers.into_iter().fold(
        QuestionDraft::new(question_id, form.trim(), form_version),
        |draft, answer| {
            draft.with_answer(Answer {
                option_id: answer.option_id,
                text: answer.text,
            })
        },
    );
    match with_store(|store| {
        let section = resolve_section(store, &selection)?;
        store
            .save_question(&section, &draft)
            .map_err(|err| err.to_string())
    }) {
        Ok(question) => {
            StoreActionResponse::success("Answers saved.", Some(question.id.to_string()))
        }
        Err(err) => StoreActionResponse::failure(format!("store_save_question failed: {err}")),
    }
}

/// Deletes questions of the selected section with their answers and notes.
///
/// Ids without stored state are skipped. All or nothing.
#[flutter_rust_bridge::frb(sync)]
pub fn store_delete_questions(
    selection: SectionSelection,
    question_ids: Vec<i64>,
) -> StoreActionResponse {
    let result = with_store(|store| {
        let section = resolve_section(store, &selection)?;
        let mut questions = Vec::with_capacity(question_ids.len());
        for question_id in &question_ids {
            if let Some(question) = store
                .find_question(*question_id, &section)
                .map_err(|err| err.to_string())?
            {
                questions.push(question);
            }
        }
        store
            .delete_questions(&questions)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(summary) => StoreActionResponse::success(
            format!(
                "Deleted {} question(s), {} answer(s), {} note(s), {} attachment(s).",
                summary.questions, summary.answers, summary.notes, summary.attachments
            ),
            None,
        ),
        Err(err) => StoreActionResponse::failure(format!("store_delete_questions failed: {err}")),
    }
}

/// Stores a picked photo until the note that uses it is saved.
#[flutter_rust_bridge::frb(sync)]
pub fn store_save_attachment(local_filename: String, data: Vec<u8>) -> StoreActionResponse {
    match with_store(|store| {
        store
            .save_note_attachment(local_filename.trim(), &data)
            .map_err(|err| err.to_string())
    }) {
        Ok(attachment) => {
            StoreActionResponse::success("Attachment saved.", Some(attachment.uuid.to_string()))
        }
        Err(err) => StoreActionResponse::failure(format!("store_save_attachment failed: {err}")),
    }
}

/// Removes a picked or bound attachment.
#[flutter_rust_bridge::frb(sync)]
pub fn store_delete_attachment(attachment_id: String) -> StoreActionResponse {
    let result = with_connection(|conn| {
        let attachment = load_attachment(&SqliteNoteRepository::new(conn), &attachment_id)?;
        SqliteLocalStore::sqlite(conn)
            .delete_note_attachment(&attachment)
            .map_err(|err| err.to_string())?;
        Ok(attachment.uuid)
    });
    match result {
        Ok(id) => StoreActionResponse::success("Attachment deleted.", Some(id.to_string())),
        Err(err) => StoreActionResponse::failure(format!("store_delete_attachment failed: {err}")),
    }
}

/// Saves a note in the selected section.
///
/// `attachment_ids` are ids returned by `store_save_attachment`, in display
/// order. `question_id = None` saves a general note.
#[flutter_rust_bridge::frb(sync)]
pub fn store_save_note(
    selection: SectionSelection,
    text: String,
    attachment_ids: Vec<String>,
    question_id: Option<i64>,
) -> StoreActionResponse {
    let ctx = selection.to_context();
    let result = with_connection(|conn| {
        let repo = SqliteNoteRepository::new(conn);
        let attachments = attachment_ids
            .iter()
            .map(|raw| load_attachment(&repo, raw))
            .collect::<Result<Vec<NoteAttachment>, String>>()?;
        SqliteLocalStore::sqlite(conn)
            .save_note(&ctx, text, &attachments, question_id)
            .map_err(|err| match err {
                StoreError::NoCurrentSection => NO_SECTION_MESSAGE.to_string(),
                other => other.to_string(),
            })
    });
    match result {
        Ok(note) => StoreActionResponse::success("Note saved.", Some(note.uuid.to_string())),
        Err(err) => StoreActionResponse::failure(format!("store_save_note failed: {err}")),
    }
}

/// Lists notes of the selected section, newest first.
#[flutter_rust_bridge::frb(sync)]
pub fn store_list_notes(selection: SectionSelection, question_id: Option<i64>) -> NoteListResponse {
    let ctx = selection.to_context();
    match with_store(|store| {
        store
            .list_notes(&ctx, question_id)
            .map_err(|err| err.to_string())
    }) {
        Ok(notes) => {
            let items = notes.into_iter().map(to_note_item).collect::<Vec<_>>();
            let message = if items.is_empty() {
                "No notes.".to_string()
            } else {
                format!("Found {} note(s).", items.len())
            };
            NoteListResponse { items, message }
        }
        Err(err) => NoteListResponse {
            items: Vec::new(),
            message: format!("store_list_notes failed: {err}"),
        },
    }
}

/// Whether anything waits for upload. Returns `false` when the store is
/// unreadable; the failure is logged.
#[flutter_rust_bridge::frb(sync)]
pub fn store_needs_sync() -> bool {
    match with_store(|store| store.needs_sync().map_err(|err| err.to_string())) {
        Ok(value) => value,
        Err(err) => {
            error!("event=needs_sync module=ffi status=error error={err}");
            false
        }
    }
}

/// Pending upload counts across all visited sections.
#[flutter_rust_bridge::frb(sync)]
pub fn store_sync_summary() -> SyncStatusResponse {
    let result = with_connection(|conn| {
        let summary = SqliteSyncOutbox::new(conn)
            .summary()
            .map_err(|err| err.to_string())?;
        let needs_sync = SqliteLocalStore::sqlite(conn)
            .needs_sync()
            .map_err(|err| err.to_string())?;
        Ok((needs_sync, summary))
    });
    match result {
        Ok((needs_sync, summary)) => SyncStatusResponse {
            needs_sync,
            pending_sections: clamp_count(summary.sections),
            pending_questions: clamp_count(summary.questions),
            pending_notes: clamp_count(summary.notes),
            message: if needs_sync {
                "Sync pending.".to_string()
            } else {
                "Everything synced.".to_string()
            },
        },
        Err(err) => SyncStatusResponse {
            needs_sync: false,
            pending_sections: 0,
            pending_questions: 0,
            pending_notes: 0,
            message: format!("store_sync_summary failed: {err}"),
        },
    }
}

/// Snapshots what must be uploaded. `selection = None` covers every section.
#[flutter_rust_bridge::frb(sync)]
pub fn store_pending_sync(selection: Option<SectionSelection>) -> SyncBatchResponse {
    let result = with_connection(|conn| {
        let outbox = SqliteSyncOutbox::new(conn);
        let batch = match &selection {
            None => outbox.pending_sync(SyncScope::All),
            Some(selection) => {
                let section = resolve_section(&SqliteLocalStore::sqlite(conn), selection)?;
                outbox.pending_sync(SyncScope::Section(&section))
            }
        }
        .map_err(|err| err.to_string())?;
        let json = serde_json::to_string(&batch)
            .map_err(|err| format!("batch encoding failed: {err}"))?;
        Ok((batch, json))
    });
    match result {
        Ok((batch, json)) => SyncBatchResponse {
            ok: true,
            batch_json: Some(json),
            sections: clamp_count(batch.sections.len()),
            questions: clamp_count(batch.questions.len()),
            notes: clamp_count(batch.notes.len()),
            message: if batch.is_empty() {
                "Nothing to upload.".to_string()
            } else {
                "Upload batch ready.".to_string()
            },
        },
        Err(err) => SyncBatchResponse {
            ok: false,
            batch_json: None,
            sections: 0,
            questions: 0,
            notes: 0,
            message: format!("store_pending_sync failed: {err}"),
        },
    }
}

/// Marks a batch from `store_pending_sync` as uploaded.
///
/// Records edited after the snapshot stay pending.
#[flutter_rust_bridge::frb(sync)]
pub fn store_acknowledge_sync(batch_json: String) -> SyncAckResponse {
    let result = serde_json::from_str::<SyncBatch>(&batch_json)
        .map_err(|err| format!("invalid batch: {err}"))
        .and_then(|batch| {
            with_connection(|conn| {
                SqliteSyncOutbox::new(conn)
                    .acknowledge_sync(&batch)
                    .map_err(|err| err.to_string())
            })
        });
    match result {
        Ok(summary) => SyncAckResponse {
            ok: true,
            sections: clamp_count(summary.sections),
            questions: clamp_count(summary.questions),
            notes: clamp_count(summary.notes),
            message: "Upload acknowledged.".to_string(),
        },
        Err(err) => SyncAckResponse {
            ok: false,
            sections: 0,
            questions: 0,
            notes: 0,
            message: format!("store_acknowledge_sync failed: {err}"),
        },
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn store_mark_note_synced(note_id: String) -> StoreActionResponse {
    let result = with_connection(|conn| {
        let id = parse_id("note", &note_id)?;
        let note = SqliteNoteRepository::new(conn)
            .get_note(id)
            .map_err(|err| err.to_string())?
            .ok_or_else(|| format!("note not found: {id}"))?;
        SqliteLocalStore::sqlite(conn)
            .mark_note_synced(&note)
            .map_err(|err| err.to_string())?;
        Ok(id)
    });
    match result {
        Ok(id) => StoreActionResponse::success("Note synced.", Some(id.to_string())),
        Err(err) => StoreActionResponse::failure(format!("store_mark_note_synced failed: {err}")),
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn store_mark_question_synced(
    selection: SectionSelection,
    question_id: i64,
) -> StoreActionResponse {
    let result = with_store(|store| {
        let section = resolve_section(store, &selection)?;
        let question = store
            .find_question(question_id, &section)
            .map_err(|err| err.to_string())?
            .ok_or_else(|| format!("question {question_id} not found"))?;
        store
            .mark_question_synced(&question)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(()) => StoreActionResponse::success("Question synced.", Some(question_id.to_string())),
        Err(err) => {
            StoreActionResponse::failure(format!("store_mark_question_synced failed: {err}"))
        }
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn store_mark_section_synced(selection: SectionSelection) -> StoreActionResponse {
    section_action(
        "store_mark_section_synced",
        &selection,
        "Section synced.",
        |store, section| store.mark_section_synced(section),
    )
}

fn resolve_store_db_path() -> PathBuf {
    STORE_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(STORE_DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(STORE_DB_FILE_NAME)
        })
        .clone()
}

fn with_connection<T>(
    f: impl FnOnce(&rusqlite::Connection) -> Result<T, String>,
) -> Result<T, String> {
    let db_path = resolve_store_db_path();
    let conn = open_db(&db_path).map_err(|err| format!("store DB open failed: {err}"))?;
    f(&conn)
}

fn with_store<T>(
    f: impl FnOnce(&SqliteLocalStore<'_>) -> Result<T, String>,
) -> Result<T, String> {
    with_connection(|conn| f(&SqliteLocalStore::sqlite(conn)))
}

fn resolve_section(
    store: &SqliteLocalStore<'_>,
    selection: &SectionSelection,
) -> Result<SectionInfo, String> {
    store
        .current_section(&selection.to_context())
        .map_err(|err| err.to_string())?
        .ok_or_else(|| NO_SECTION_MESSAGE.to_string())
}

fn section_action(
    operation: &str,
    selection: &SectionSelection,
    message: &str,
    action: impl FnOnce(&SqliteLocalStore<'_>, &SectionInfo) -> votemon_core::RepoResult<()>,
) -> StoreActionResponse {
    let result = with_store(|store| {
        let section = resolve_section(store, selection)?;
        action(store, &section).map_err(|err| err.to_string())?;
        Ok(section.uuid)
    });
    match result {
        Ok(uuid) => StoreActionResponse::success(message, Some(uuid.to_string())),
        Err(err) => StoreActionResponse::failure(format!("{operation} failed: {err}")),
    }
}

fn question_list(
    operation: &str,
    query: impl FnOnce(&SqliteLocalStore<'_>) -> votemon_core::RepoResult<Vec<Question>>,
) -> QuestionListResponse {
    match with_store(|store| query(store).map_err(|err| err.to_string())) {
        Ok(questions) => {
            let items = questions.into_iter().map(to_question_item).collect::<Vec<_>>();
            let message = format!("Found {} question(s).", items.len());
            QuestionListResponse { items, message }
        }
        Err(err) => QuestionListResponse {
            items: Vec::new(),
            message: format!("{operation} failed: {err}"),
        },
    }
}

fn parse_id(kind: &str, raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("invalid {kind} id `{raw}`"))
}

fn load_attachment(
    repo: &SqliteNoteRepository<'_>,
    raw_id: &str,
) -> Result<NoteAttachment, String> {
    let id = parse_id("attachment", raw_id)?;
    repo.get_attachment(id)
        .map_err(|err| err.to_string())?
        .ok_or_else(|| format!("attachment not found: {id}"))
}

fn to_section_item(section: SectionInfo) -> SectionItem {
    SectionItem {
        section_uuid: section.uuid.to_string(),
        province_code: section.province_code,
        province_name: section.province_name,
        county_code: section.county_code,
        county_name: section.county_name,
        municipality_code: section.municipality_code,
        municipality_name: section.municipality_name,
        section_id: section.section_id,
        arrive_time_epoch_ms: section.arrive_time,
        leave_time_epoch_ms: section.leave_time,
        synced: section.synced,
    }
}

fn to_question_item(question: Question) -> QuestionItem {
    QuestionItem {
        question_id: question.id,
        form: question.form,
        form_version: question.form_version,
        answered: question.answered,
        synced: question.synced,
        answers: question
            .answers
            .into_iter()
            .map(|answer| AnswerItem {
                option_id: answer.option_id,
                text: answer.text,
            })
            .collect(),
    }
}

fn to_note_item(note: Note) -> NoteItem {
    NoteItem {
        note_id: note.uuid.to_string(),
        question_id: note.question_id,
        body: note.body,
        date_epoch_ms: note.date,
        synced: note.synced,
        attachment_count: clamp_count(note.attachments.len()),
    }
}

fn clamp_count(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, init_logging, ping, store_acknowledge_sync, store_delete_attachment,
        store_delete_questions, store_find_question, store_list_answered_questions,
        store_list_notes, store_list_questions, store_list_visited_sections,
        store_mark_note_synced, store_mark_question_synced, store_mark_section_synced,
        store_needs_sync, store_open_section, store_pending_sync, store_record_arrival,
        store_record_departure, store_save_attachment, store_save_note, store_save_question,
        store_sync_summary, AnswerItem, SectionSelection, StoreActionResponse,
    };
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static NEXT_SECTION: AtomicI64 = AtomicI64::new(0);

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn open_section_is_idempotent_for_same_key() {
        let section_id = unique_section_id();
        let first = open_test_section(section_id);
        let second = open_test_section(section_id);
        assert!(first.ok, "{}", first.message);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn saved_note_with_attachment_is_listed_and_pending_sync() {
        let section_id = unique_section_id();
        let opened = open_test_section(section_id);
        assert!(opened.ok, "{}", opened.message);
        let selection = selection_for(section_id);

        let photo = store_save_attachment("poză 1.jpg".to_string(), vec![1, 2, 3]);
        assert!(photo.ok, "{}", photo.message);
        let photo_id = photo.id.expect("attachment should return id");

        let saved = store_save_note(
            selection.clone(),
            "line at entrance".to_string(),
            vec![photo_id],
            None,
        );
        assert!(saved.ok, "{}", saved.message);

        let listed = store_list_notes(selection, None);
        assert_eq!(listed.items.len(), 1, "{}", listed.message);
        assert_eq!(listed.items[0].note_id, saved.id.expect("note id"));
        assert_eq!(listed.items[0].attachment_count, 1);
        assert!(!listed.items[0].synced);

        assert!(store_needs_sync());
        let summary = store_sync_summary();
        assert!(summary.needs_sync, "{}", summary.message);
        assert!(summary.pending_notes >= 1);
    }

    #[test]
    fn save_note_without_selection_fails() {
        let response = store_save_note(
            SectionSelection::default(),
            "orphan".to_string(),
            Vec::new(),
            None,
        );
        assert!(!response.ok);
        assert!(response.message.contains("no polling station selected"));
    }

    #[test]
    fn save_note_rejects_malformed_attachment_id() {
        let section_id = unique_section_id();
        open_test_section(section_id);
        let response = store_save_note(
            selection_for(section_id),
            "bad".to_string(),
            vec!["not-a-uuid".to_string()],
            None,
        );
        assert!(!response.ok);
        assert!(response.message.contains("invalid attachment id"));
    }

    #[test]
    fn questionnaire_answers_can_be_saved_listed_and_deleted() {
        let section_id = unique_section_id();
        open_test_section(section_id);
        let selection = selection_for(section_id);

        let saved = store_save_question(
            selection.clone(),
            7,
            "A".to_string(),
            2,
            vec![
                AnswerItem {
                    option_id: 3,
                    text: Some("late opening".to_string()),
                },
                AnswerItem {
                    option_id: 1,
                    text: None,
                },
            ],
        );
        assert!(saved.ok, "{}", saved.message);
        let unanswered = store_save_question(selection.clone(), 8, "A".to_string(), 3, Vec::new());
        assert!(unanswered.ok, "{}", unanswered.message);

        let listed = store_list_questions(selection.clone(), "A".to_string(), 2);
        assert_eq!(
            listed
                .items
                .iter()
                .map(|item| item.question_id)
                .collect::<Vec<_>>(),
            vec![7]
        );
        let answered = store_list_answered_questions(selection.clone(), "A".to_string());
        assert_eq!(answered.items.len(), 1, "{}", answered.message);

        let found = store_find_question(selection.clone(), 7);
        let item = found.item.expect("question should be stored");
        assert!(item.answered);
        assert_eq!(
            item.answers
                .iter()
                .map(|answer| answer.option_id)
                .collect::<Vec<_>>(),
            vec![1, 3]
        );

        store_save_note(selection.clone(), "about q7".to_string(), Vec::new(), Some(7));
        let deleted = store_delete_questions(selection.clone(), vec![7, 99]);
        assert!(deleted.ok, "{}", deleted.message);
        assert!(deleted.message.contains("Deleted 1 question(s)"));

        let after = store_find_question(selection.clone(), 7);
        assert!(after.ok);
        assert!(after.item.is_none());
        assert!(store_list_notes(selection, Some(7)).items.is_empty());
    }

    #[test]
    fn question_calls_without_selection_report_missing_section() {
        let response = store_save_question(
            SectionSelection::default(),
            1,
            "A".to_string(),
            1,
            Vec::new(),
        );
        assert!(!response.ok);
        assert!(response.message.contains("no polling station selected"));

        let lookup = store_find_question(SectionSelection::default(), 1);
        assert!(!lookup.ok);
        assert!(store_list_questions(SectionSelection::default(), "A".to_string(), 9)
            .items
            .is_empty());
    }

    #[test]
    fn attachment_can_be_deleted_once() {
        let picked = store_save_attachment("draft.jpg".to_string(), Vec::new());
        assert!(picked.ok, "{}", picked.message);
        let id = picked.id.expect("attachment id");

        let deleted = store_delete_attachment(id.clone());
        assert!(deleted.ok, "{}", deleted.message);
        let again = store_delete_attachment(id);
        assert!(!again.ok);
        assert!(again.message.contains("attachment not found"));
    }

    #[test]
    fn arrival_and_departure_show_in_visited_sections() {
        let section_id = unique_section_id();
        let opened = open_test_section(section_id);
        let selection = selection_for(section_id);

        assert!(store_record_arrival(selection.clone(), Some(1_000)).ok);
        assert!(store_record_departure(selection, Some(9_000)).ok);

        let visited = store_list_visited_sections();
        let item = visited
            .items
            .iter()
            .find(|item| Some(item.section_uuid.clone()) == opened.id)
            .expect("opened section should be listed");
        assert_eq!(item.arrive_time_epoch_ms, Some(1_000));
        assert_eq!(item.leave_time_epoch_ms, Some(9_000));
        assert!(!item.synced);
    }

    #[test]
    fn section_scoped_upload_round_trip_clears_that_section() {
        let section_id = unique_section_id();
        open_test_section(section_id);
        let selection = selection_for(section_id);
        store_save_question(
            selection.clone(),
            1,
            "B".to_string(),
            1,
            vec![AnswerItem {
                option_id: 2,
                text: None,
            }],
        );
        store_save_note(selection.clone(), "queue".to_string(), Vec::new(), None);

        let pending = store_pending_sync(Some(selection.clone()));
        assert!(pending.ok, "{}", pending.message);
        assert_eq!((pending.sections, pending.questions, pending.notes), (1, 1, 1));

        let acked = store_acknowledge_sync(pending.batch_json.expect("batch json"));
        assert!(acked.ok, "{}", acked.message);
        assert_eq!((acked.sections, acked.questions, acked.notes), (1, 1, 1));

        let after = store_pending_sync(Some(selection.clone()));
        assert_eq!((after.questions, after.notes), (0, 0));
        assert!(store_list_notes(selection, None).items[0].synced);
    }

    #[test]
    fn acknowledge_rejects_malformed_batch() {
        let response = store_acknowledge_sync("{not json".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("invalid batch"));
    }

    #[test]
    fn records_can_be_marked_synced_one_by_one() {
        let section_id = unique_section_id();
        open_test_section(section_id);
        let selection = selection_for(section_id);

        let note = store_save_note(selection.clone(), "n".to_string(), Vec::new(), None);
        store_save_question(selection.clone(), 4, "C".to_string(), 1, Vec::new());

        assert!(store_mark_note_synced(note.id.expect("note id")).ok);
        assert!(store_mark_question_synced(selection.clone(), 4).ok);
        assert!(store_mark_section_synced(selection.clone()).ok);

        let pending = store_pending_sync(Some(selection.clone()));
        assert_eq!(
            (pending.sections, pending.questions, pending.notes),
            (0, 0, 0)
        );
        assert!(!store_mark_question_synced(selection, 5).ok);
        assert!(!store_mark_note_synced("nope".to_string()).ok);
    }

    fn open_test_section(section_id: i64) -> StoreActionResponse {
        store_open_section(
            "FFI".to_string(),
            "Test Province".to_string(),
            "C1".to_string(),
            "County".to_string(),
            "M1".to_string(),
            "Town".to_string(),
            section_id,
        )
    }

    fn selection_for(section_id: i64) -> SectionSelection {
        SectionSelection {
            province_code: Some("FFI".to_string()),
            county_code: Some("C1".to_string()),
            municipality_code: Some("M1".to_string()),
            section_id: Some(section_id),
        }
    }

    /// Section numbers unique across tests and runs sharing the store file.
    fn unique_section_id() -> i64 {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_millis();
        let base = i64::try_from(millis).expect("fits in i64") * 1_000;
        base + NEXT_SECTION.fetch_add(1, Ordering::SeqCst)
    }
}
