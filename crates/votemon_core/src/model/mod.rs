//! Domain model for the polling-station store.
//!
//! # Responsibility
//! - Define sections, questions/answers and notes/attachments.
//! - Validate write models before they reach persistence.
//!
//! # Invariants
//! - Every question and note belongs to exactly one section.
//! - `synced` is `false` for every freshly written record.

pub mod note;
pub mod question;
pub mod section;
pub mod validation;
