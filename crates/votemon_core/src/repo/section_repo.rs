//! Section repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Create and look up polling stations by natural key.
//! - Track arrival/departure times and the synced flag.
//!
//! # Invariants
//! - The natural key unique index is the source of truth for duplicates.
//! - Visited sections are listed by `arrive_time ASC`, never-arrived last,
//!   ties in insertion order.
//! - Every local mutation resets `synced` and bumps `revision`.

use crate::model::section::{NewSection, SectionInfo, SectionKey, SectionUuid};
use crate::repo::{is_unique_violation, parse_flag, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

pub(crate) const SECTION_SELECT_SQL: &str = "SELECT
    uuid,
    province_code,
    province_name,
    county_code,
    county_name,
    municipality_code,
    municipality_name,
    section_id,
    arrive_time,
    leave_time,
    synced,
    revision
FROM sections";

/// Repository interface for polling stations.
pub trait SectionRepository {
    /// Exact match on all four natural key fields.
    fn find_section(&self, key: &SectionKey) -> RepoResult<Option<SectionInfo>>;
    fn get_section(&self, uuid: SectionUuid) -> RepoResult<Option<SectionInfo>>;
    /// Inserts a new unsynced section. Duplicates are rejected, not merged.
    fn create_section(&self, section: &NewSection) -> RepoResult<SectionInfo>;
    fn list_visited_sections(&self) -> RepoResult<Vec<SectionInfo>>;
    fn list_unsynced_sections(&self) -> RepoResult<Vec<SectionInfo>>;
    fn record_arrival(&self, uuid: SectionUuid, at_epoch_ms: i64) -> RepoResult<()>;
    fn record_departure(&self, uuid: SectionUuid, at_epoch_ms: i64) -> RepoResult<()>;
    fn mark_section_synced(&self, uuid: SectionUuid) -> RepoResult<()>;
}

/// SQLite-backed section repository.
pub struct SqliteSectionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSectionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_sections(&self, sql: &str) -> RepoResult<Vec<SectionInfo>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut sections = Vec::new();
        while let Some(row) = rows.next()? {
            sections.push(parse_section_row(row)?);
        }
        Ok(sections)
    }

    fn touch(&self, uuid: SectionUuid, sql: &str, value: i64) -> RepoResult<()> {
        let changed = self.conn.execute(sql, params![uuid.to_string(), value])?;
        if changed == 0 {
            return Err(RepoError::SectionNotFound(uuid));
        }
        Ok(())
    }
}

impl SectionRepository for SqliteSectionRepository<'_> {
    fn find_section(&self, key: &SectionKey) -> RepoResult<Option<SectionInfo>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SECTION_SELECT_SQL}
             WHERE province_code = ?1
               AND county_code = ?2
               AND municipality_code = ?3
               AND section_id = ?4
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query(params![
            key.province_code.as_str(),
            key.county_code.as_str(),
            key.municipality_code.as_str(),
            key.section_id,
        ])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_section_row(row)?));
        }
        Ok(None)
    }

    fn get_section(&self, uuid: SectionUuid) -> RepoResult<Option<SectionInfo>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SECTION_SELECT_SQL} WHERE uuid = ?1;"))?;
        let row = stmt
            .query_row([uuid.to_string()], |row| Ok(parse_section_row(row)))
            .optional()?;
        row.transpose()
    }

    fn create_section(&self, section: &NewSection) -> RepoResult<SectionInfo> {
        section.validate()?;

        let uuid = Uuid::new_v4();
        let inserted = self.conn.execute(
            "INSERT INTO sections (
                uuid,
                province_code,
                province_name,
                county_code,
                county_name,
                municipality_code,
                municipality_name,
                section_id,
                synced,
                revision
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, 1);",
            params![
                uuid.to_string(),
                section.province_code.as_str(),
                section.province_name.as_str(),
                section.county_code.as_str(),
                section.county_name.as_str(),
                section.municipality_code.as_str(),
                section.municipality_name.as_str(),
                section.section_id,
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(RepoError::DuplicateSection(section.key()));
            }
            Err(err) => return Err(err.into()),
        }

        self.get_section(uuid)?.ok_or_else(|| {
            RepoError::InvalidData(format!("created section {uuid} missing in read-back"))
        })
    }

    fn list_visited_sections(&self) -> RepoResult<Vec<SectionInfo>> {
        self.query_sections(&format!(
            "{SECTION_SELECT_SQL}
             ORDER BY arrive_time IS NULL ASC, arrive_time ASC, rowid ASC;"
        ))
    }

    fn list_unsynced_sections(&self) -> RepoResult<Vec<SectionInfo>> {
        self.query_sections(&format!("{SECTION_SELECT_SQL} WHERE synced = 0;"))
    }

    fn record_arrival(&self, uuid: SectionUuid, at_epoch_ms: i64) -> RepoResult<()> {
        self.touch(
            uuid,
            "UPDATE sections
             SET arrive_time = ?2, synced = 0, revision = revision + 1
             WHERE uuid = ?1;",
            at_epoch_ms,
        )
    }

    fn record_departure(&self, uuid: SectionUuid, at_epoch_ms: i64) -> RepoResult<()> {
        self.touch(
            uuid,
            "UPDATE sections
             SET leave_time = ?2, synced = 0, revision = revision + 1
             WHERE uuid = ?1;",
            at_epoch_ms,
        )
    }

    fn mark_section_synced(&self, uuid: SectionUuid) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("UPDATE sections SET synced = 1 WHERE uuid = ?1;", [uuid.to_string()])?;
        if changed == 0 {
            return Err(RepoError::SectionNotFound(uuid));
        }
        Ok(())
    }
}

pub(crate) fn parse_section_row(row: &Row<'_>) -> RepoResult<SectionInfo> {
    let uuid_text: String = row.get("uuid")?;
    Ok(SectionInfo {
        uuid: parse_uuid(&uuid_text, "sections.uuid")?,
        province_code: row.get("province_code")?,
        province_name: row.get("province_name")?,
        county_code: row.get("county_code")?,
        county_name: row.get("county_name")?,
        municipality_code: row.get("municipality_code")?,
        municipality_name: row.get("municipality_name")?,
        section_id: row.get("section_id")?,
        arrive_time: row.get("arrive_time")?,
        leave_time: row.get("leave_time")?,
        synced: parse_flag(row.get("synced")?, "sections.synced")?,
        revision: row.get("revision")?,
    })
}
