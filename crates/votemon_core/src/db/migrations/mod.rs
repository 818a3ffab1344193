//! Ordered schema steps for the local store.
//!
//! Each step is a SQL file applied once. Steps after the stored
//! `user_version` run in a single transaction together with the version
//! bumps, so a store is either fully upgraded or left untouched.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "sections_questions",
        sql: include_str!("0001_sections_questions.sql"),
    },
    SchemaStep {
        version: 2,
        name: "notes_attachments",
        sql: include_str!("0002_notes_attachments.sql"),
    },
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Version currently recorded in the store file.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}

/// Brings the store schema up to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let stored = schema_version(conn)?;
    let latest = latest_version();
    if stored > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: stored,
            latest_supported: latest,
        });
    }

    let pending = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > stored)
        .collect::<Vec<_>>();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in &pending {
        let applied = tx
            .execute_batch(step.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version));
        if let Err(source) = applied {
            error!(
                "event=db_migrate module=db status=error version={} step={} error={}",
                step.version, step.name, source
            );
            return Err(DbError::MigrationFailed {
                version: step.version,
                name: step.name,
                source,
            });
        }
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} steps={}",
        stored,
        latest,
        pending.len()
    );
    Ok(())
}
