//! Validation errors shared by the domain model.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Domain invariant violation detected before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A province/county/municipality code is blank. Carries the field name.
    EmptyCode(&'static str),
    EmptyForm,
    NegativeQuestionId(i64),
    NegativeFormVersion(i64),
    /// The same answer option appears twice in one question draft.
    DuplicateAnswerOption(i64),
    /// Attachment file name is a path or a directory alias.
    InvalidFilename(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCode(field) => write!(f, "`{field}` cannot be empty"),
            Self::EmptyForm => write!(f, "question form code cannot be empty"),
            Self::NegativeQuestionId(value) => {
                write!(f, "question id must be non-negative, got {value}")
            }
            Self::NegativeFormVersion(value) => {
                write!(f, "form version must be non-negative, got {value}")
            }
            Self::DuplicateAnswerOption(option) => {
                write!(f, "answer option {option} appears more than once")
            }
            Self::InvalidFilename(value) => {
                write!(f, "attachment filename `{value}` is a path, not a file name")
            }
        }
    }
}

impl Error for ValidationError {}
