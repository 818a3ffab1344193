//! Questionnaire question/answer model.
//!
//! # Invariants
//! - A question is identified by `(section_uuid, id)`.
//! - `answered` mirrors whether the question currently owns any answer.
//! - Answers live and die with their question.

use crate::model::section::SectionUuid;
use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One selected option of a question, with optional free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub option_id: i64,
    pub text: Option<String>,
}

impl Answer {
    pub fn selected(option_id: i64) -> Self {
        Self {
            option_id,
            text: None,
        }
    }

    pub fn with_text(option_id: i64, text: impl Into<String>) -> Self {
        Self {
            option_id,
            text: Some(text.into()),
        }
    }
}

/// Persisted question state for one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub section_uuid: SectionUuid,
    pub id: i64,
    pub form: String,
    pub form_version: i64,
    pub answered: bool,
    pub synced: bool,
    pub revision: i64,
    /// Ordered by `option_id`.
    pub answers: Vec<Answer>,
}

/// Write model used to create or replace a question's answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub id: i64,
    pub form: String,
    pub form_version: i64,
    pub answers: Vec<Answer>,
}

impl QuestionDraft {
    pub fn new(id: i64, form: impl Into<String>, form_version: i64) -> Self {
        Self {
            id,
            form: form.into(),
            form_version,
            answers: Vec::new(),
        }
    }

    pub fn with_answer(mut self, answer: Answer) -> Self {
        self.answers.push(answer);
        self
    }

    pub fn is_answered(&self) -> bool {
        !self.answers.is_empty()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id < 0 {
            return Err(ValidationError::NegativeQuestionId(self.id));
        }
        if self.form.trim().is_empty() {
            return Err(ValidationError::EmptyForm);
        }
        if self.form_version < 0 {
            return Err(ValidationError::NegativeFormVersion(self.form_version));
        }

        let mut seen = BTreeSet::new();
        for answer in &self.answers {
            if !seen.insert(answer.option_id) {
                return Err(ValidationError::DuplicateAnswerOption(answer.option_id));
            }
        }
        Ok(())
    }
}
