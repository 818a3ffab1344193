//! CLI smoke entry point.
//!
//! Prints linkage info. With a database path argument it also prints the
//! pending upload counts of that store.

use std::process::ExitCode;
use votemon_core::db::open_db;
use votemon_core::{SqliteLocalStore, SqliteSyncOutbox};

fn main() -> ExitCode {
    println!("votemon_core ping={}", votemon_core::ping());
    println!("votemon_core version={}", votemon_core::core_version());

    let Some(db_path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    match print_sync_status(&db_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("votemon_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn print_sync_status(db_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let conn = open_db(db_path)?;
    let summary = SqliteSyncOutbox::new(&conn).summary()?;
    let store = SqliteLocalStore::sqlite(&conn);

    println!("store path={db_path}");
    println!("store visited_sections={}", store.list_visited_sections()?.len());
    println!(
        "store pending sections={} questions={} notes={}",
        summary.sections, summary.questions, summary.notes
    );
    println!("store needs_sync={}", store.needs_sync()?);
    Ok(())
}
