//! Polling station ("section") model.
//!
//! # Responsibility
//! - Define the section record and its natural key.
//! - Define the explicit selection context that scopes store queries.
//!
//! # Invariants
//! - `(province_code, county_code, municipality_code, section_id)` is unique.
//! - `synced` starts `false` and every local mutation bumps `revision`.

use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable storage identity of a section row.
pub type SectionUuid = Uuid;

/// Natural key of a polling station.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionKey {
    pub province_code: String,
    pub county_code: String,
    pub municipality_code: String,
    pub section_id: i64,
}

impl SectionKey {
    pub fn new(
        province_code: impl Into<String>,
        county_code: impl Into<String>,
        municipality_code: impl Into<String>,
        section_id: i64,
    ) -> Self {
        Self {
            province_code: province_code.into(),
            county_code: county_code.into(),
            municipality_code: municipality_code.into(),
            section_id,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_code("province_code", &self.province_code)?;
        require_code("county_code", &self.county_code)?;
        require_code("municipality_code", &self.municipality_code)
    }
}

/// Caller-supplied selection of the active polling station.
///
/// Mirrors what the app's preferences hold after login. Any missing field
/// means "no current section"; blank codes count as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionContext {
    pub province_code: Option<String>,
    pub county_code: Option<String>,
    pub municipality_code: Option<String>,
    pub section_id: Option<i64>,
}

impl SectionContext {
    /// Context with nothing selected.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Context fully selecting `key`.
    pub fn for_key(key: &SectionKey) -> Self {
        Self {
            province_code: Some(key.province_code.clone()),
            county_code: Some(key.county_code.clone()),
            municipality_code: Some(key.municipality_code.clone()),
            section_id: Some(key.section_id),
        }
    }

    /// Returns the selected key, or `None` when any part is missing.
    pub fn key(&self) -> Option<SectionKey> {
        Some(SectionKey {
            province_code: present(self.province_code.as_deref())?,
            county_code: present(self.county_code.as_deref())?,
            municipality_code: present(self.municipality_code.as_deref())?,
            section_id: self.section_id?,
        })
    }
}

/// Input for creating a section on first visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSection {
    pub province_code: String,
    pub province_name: String,
    pub county_code: String,
    pub county_name: String,
    pub municipality_code: String,
    pub municipality_name: String,
    pub section_id: i64,
}

impl NewSection {
    pub fn key(&self) -> SectionKey {
        SectionKey::new(
            self.province_code.as_str(),
            self.county_code.as_str(),
            self.municipality_code.as_str(),
            self.section_id,
        )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.key().validate()
    }
}

/// Persisted polling station record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionInfo {
    pub uuid: SectionUuid,
    pub province_code: String,
    pub province_name: String,
    pub county_code: String,
    pub county_name: String,
    pub municipality_code: String,
    pub municipality_name: String,
    pub section_id: i64,
    /// Unix epoch milliseconds. `None` until the observer checks in.
    pub arrive_time: Option<i64>,
    /// Unix epoch milliseconds. `None` until the observer leaves.
    pub leave_time: Option<i64>,
    pub synced: bool,
    /// Monotonic local edit counter used to acknowledge uploads.
    pub revision: i64,
}

impl SectionInfo {
    pub fn key(&self) -> SectionKey {
        SectionKey::new(
            self.province_code.as_str(),
            self.county_code.as_str(),
            self.municipality_code.as_str(),
            self.section_id,
        )
    }

    /// Context selecting this section.
    pub fn context(&self) -> SectionContext {
        SectionContext::for_key(&self.key())
    }
}

fn require_code(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyCode(field));
    }
    Ok(())
}

fn present(value: Option<&str>) -> Option<String> {
    value
        .filter(|code| !code.trim().is_empty())
        .map(str::to_string)
}
