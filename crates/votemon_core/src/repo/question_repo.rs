//! Question/answer repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist questionnaire answers per section.
//! - Own the cascading question delete (answers, linked notes, attachments).
//!
//! # Invariants
//! - `save_question` replaces the full answer set in one transaction.
//! - `delete_questions` collects every dependent row first and commits the
//!   whole batch once; on any failure nothing is deleted.
//! - Form listings match `form_version <= requested`, so answers given
//!   against older form revisions stay visible.

use crate::model::question::{Answer, Question, QuestionDraft};
use crate::model::section::SectionUuid;
use crate::repo::{
    begin_immediate, bool_to_int, count_unsynced_rows, now_epoch_ms, parse_flag, parse_uuid,
    section_exists, RepoError, RepoResult, SyncScope, UnsyncedCount,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const QUESTION_SELECT_SQL: &str = "SELECT
    section_uuid,
    question_id,
    form,
    form_version,
    answered,
    synced,
    revision
FROM questions";

/// Row counts removed by one `delete_questions` batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub questions: usize,
    pub answers: usize,
    pub notes: usize,
    pub attachments: usize,
}

/// Repository interface for questions and their answers.
pub trait QuestionRepository {
    /// Creates or updates one question and replaces its answers.
    fn save_question(&self, section_uuid: SectionUuid, draft: &QuestionDraft)
        -> RepoResult<Question>;
    /// Exact match on `(section, id)`.
    fn find_question(&self, section_uuid: SectionUuid, id: i64) -> RepoResult<Option<Question>>;
    fn list_questions(
        &self,
        section_uuid: SectionUuid,
        form: &str,
        max_form_version: i64,
    ) -> RepoResult<Vec<Question>>;
    fn list_answered_questions(
        &self,
        section_uuid: SectionUuid,
        form: &str,
    ) -> RepoResult<Vec<Question>>;
    fn list_unsynced_questions(&self, scope: SyncScope<'_>) -> RepoResult<Vec<Question>>;
    fn count_unsynced_questions(&self) -> RepoResult<UnsyncedCount>;
    /// Deletes questions with their answers, linked notes and attachments.
    fn delete_questions(&self, questions: &[Question]) -> RepoResult<DeleteSummary>;
    fn mark_question_synced(&self, section_uuid: SectionUuid, id: i64) -> RepoResult<()>;
}

/// SQLite-backed question repository.
pub struct SqliteQuestionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteQuestionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_questions(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Question>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut questions = Vec::new();
        while let Some(row) = rows.next()? {
            let mut question = parse_question_row(row)?;
            question.answers = load_answers(self.conn, question.section_uuid, question.id)?;
            questions.push(question);
        }
        Ok(questions)
    }
}

impl QuestionRepository for SqliteQuestionRepository<'_> {
    fn save_question(
        &self,
        section_uuid: SectionUuid,
        draft: &QuestionDraft,
    ) -> RepoResult<Question> {
        draft.validate()?;

        let section_text = section_uuid.to_string();
        let tx = begin_immediate(self.conn)?;
        if !section_exists(&tx, section_text.as_str())? {
            return Err(RepoError::SectionNotFound(section_uuid));
        }

        tx.execute(
            "INSERT INTO questions (
                section_uuid,
                question_id,
                form,
                form_version,
                answered,
                synced,
                revision,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, 1, ?6)
            ON CONFLICT (section_uuid, question_id) DO UPDATE SET
                form = excluded.form,
                form_version = excluded.form_version,
                answered = excluded.answered,
                synced = 0,
                revision = questions.revision + 1,
                updated_at = excluded.updated_at;",
            params![
                section_text.as_str(),
                draft.id,
                draft.form.as_str(),
                draft.form_version,
                bool_to_int(draft.is_answered()),
                now_epoch_ms(),
            ],
        )?;

        tx.execute(
            "DELETE FROM answers WHERE section_uuid = ?1 AND question_id = ?2;",
            params![section_text.as_str(), draft.id],
        )?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO answers (section_uuid, question_id, option_id, text)
                 VALUES (?1, ?2, ?3, ?4);",
            )?;
            for answer in &draft.answers {
                insert.execute(params![
                    section_text.as_str(),
                    draft.id,
                    answer.option_id,
                    answer.text.as_deref(),
                ])?;
            }
        }
        tx.commit()?;

        self.find_question(section_uuid, draft.id)?
            .ok_or(RepoError::QuestionNotFound {
                section_uuid,
                question_id: draft.id,
            })
    }

    fn find_question(&self, section_uuid: SectionUuid, id: i64) -> RepoResult<Option<Question>> {
        let mut found = self.query_questions(
            &format!("{QUESTION_SELECT_SQL} WHERE section_uuid = ? AND question_id = ? LIMIT 1;"),
            vec![Value::Text(section_uuid.to_string()), Value::Integer(id)],
        )?;
        Ok(found.pop())
    }

    fn list_questions(
        &self,
        section_uuid: SectionUuid,
        form: &str,
        max_form_version: i64,
    ) -> RepoResult<Vec<Question>> {
        self.query_questions(
            &format!(
                "{QUESTION_SELECT_SQL}
                 WHERE section_uuid = ?
                   AND form = ?
                   AND form_version <= ?
                 ORDER BY question_id ASC;"
            ),
            vec![
                Value::Text(section_uuid.to_string()),
                Value::Text(form.to_string()),
                Value::Integer(max_form_version),
            ],
        )
    }

    fn list_answered_questions(
        &self,
        section_uuid: SectionUuid,
        form: &str,
    ) -> RepoResult<Vec<Question>> {
        self.query_questions(
            &format!(
                "{QUESTION_SELECT_SQL}
                 WHERE section_uuid = ?
                   AND form = ?
                   AND answered = 1
                 ORDER BY question_id ASC;"
            ),
            vec![
                Value::Text(section_uuid.to_string()),
                Value::Text(form.to_string()),
            ],
        )
    }

    fn list_unsynced_questions(&self, scope: SyncScope<'_>) -> RepoResult<Vec<Question>> {
        let mut sql = format!("{QUESTION_SELECT_SQL} WHERE synced = 0");
        let mut bind_values = Vec::new();
        if let Some(section_uuid) = scope.section_uuid() {
            sql.push_str(" AND section_uuid = ?");
            bind_values.push(Value::Text(section_uuid));
        }
        self.query_questions(&sql, bind_values)
    }

    fn count_unsynced_questions(&self) -> RepoResult<UnsyncedCount> {
        count_unsynced_rows(self.conn, "questions")
    }

    fn delete_questions(&self, questions: &[Question]) -> RepoResult<DeleteSummary> {
        let tx = begin_immediate(self.conn)?;

        let keys = questions
            .iter()
            .map(|question| (question.section_uuid.to_string(), question.id))
            .collect::<Vec<_>>();

        let mut note_ids = Vec::new();
        {
            let mut linked_notes = tx.prepare_cached(
                "SELECT uuid FROM notes WHERE section_uuid = ?1 AND question_id = ?2;",
            )?;
            for (section_uuid, question_id) in &keys {
                let mut rows = linked_notes.query(params![section_uuid.as_str(), question_id])?;
                while let Some(row) = rows.next()? {
                    note_ids.push(row.get::<_, String>(0)?);
                }
            }
        }

        let mut summary = DeleteSummary::default();
        {
            let mut delete_attachments =
                tx.prepare_cached("DELETE FROM note_attachments WHERE note_uuid = ?1;")?;
            let mut delete_note = tx.prepare_cached("DELETE FROM notes WHERE uuid = ?1;")?;
            for note_id in &note_ids {
                summary.attachments += delete_attachments.execute([note_id.as_str()])?;
                summary.notes += delete_note.execute([note_id.as_str()])?;
            }

            let mut delete_answers = tx.prepare_cached(
                "DELETE FROM answers WHERE section_uuid = ?1 AND question_id = ?2;",
            )?;
            let mut delete_question = tx.prepare_cached(
                "DELETE FROM questions WHERE section_uuid = ?1 AND question_id = ?2;",
            )?;
            for (section_uuid, question_id) in &keys {
                summary.answers +=
                    delete_answers.execute(params![section_uuid.as_str(), question_id])?;
                summary.questions +=
                    delete_question.execute(params![section_uuid.as_str(), question_id])?;
            }
        }

        tx.commit()?;
        Ok(summary)
    }

    fn mark_question_synced(&self, section_uuid: SectionUuid, id: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE questions SET synced = 1 WHERE section_uuid = ?1 AND question_id = ?2;",
            params![section_uuid.to_string(), id],
        )?;
        if changed == 0 {
            return Err(RepoError::QuestionNotFound {
                section_uuid,
                question_id: id,
            });
        }
        Ok(())
    }
}

fn parse_question_row(row: &Row<'_>) -> RepoResult<Question> {
    let section_text: String = row.get("section_uuid")?;
    Ok(Question {
        section_uuid: parse_uuid(&section_text, "questions.section_uuid")?,
        id: row.get("question_id")?,
        form: row.get("form")?,
        form_version: row.get("form_version")?,
        answered: parse_flag(row.get("answered")?, "questions.answered")?,
        synced: parse_flag(row.get("synced")?, "questions.synced")?,
        revision: row.get("revision")?,
        answers: Vec::new(),
    })
}

pub(crate) fn load_answers(
    conn: &Connection,
    section_uuid: SectionUuid,
    question_id: i64,
) -> RepoResult<Vec<Answer>> {
    let mut stmt = conn.prepare_cached(
        "SELECT option_id, text
         FROM answers
         WHERE section_uuid = ?1 AND question_id = ?2
         ORDER BY option_id ASC;",
    )?;
    let mut rows = stmt.query(params![section_uuid.to_string(), question_id])?;
    let mut answers = Vec::new();
    while let Some(row) = rows.next()? {
        answers.push(Answer {
            option_id: row.get("option_id")?,
            text: row.get("text")?,
        });
    }
    Ok(answers)
}
