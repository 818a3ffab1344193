use votemon_core::db::open_db_in_memory;
use votemon_core::{
    Answer, NewSection, QuestionDraft, SectionInfo, SectionRepository, SqliteLocalStore,
    SqliteSectionRepository, SqliteSyncOutbox, SyncScope, SyncSummary,
};

fn open_section(store: &SqliteLocalStore<'_>, id: i64) -> SectionInfo {
    store
        .create_section(&NewSection {
            province_code: "B".to_string(),
            province_name: "Bucuresti".to_string(),
            county_code: "S1".to_string(),
            county_name: "Sector 1".to_string(),
            municipality_code: "S1".to_string(),
            municipality_name: "Sector 1".to_string(),
            section_id: id,
        })
        .unwrap()
}

#[test]
fn pending_sync_snapshots_unsynced_records_with_their_sections() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteLocalStore::sqlite(&conn);
    let outbox = SqliteSyncOutbox::new(&conn);
    let section = open_section(&store, 10);
    store.mark_section_synced(&section).unwrap();

    store
        .save_question(
            &section,
            &QuestionDraft::new(1, "A", 1).with_answer(Answer::selected(2)),
        )
        .unwrap();
    let photo = store.save_note_attachment("photo.jpg", b"12345").unwrap();
    store
        .save_note(&section.context(), "see photo", &[photo], Some(1))
        .unwrap();

    let batch = outbox.pending_sync(SyncScope::All).unwrap();
    assert_eq!(batch.sections.len(), 1);
    assert!(batch.sections[0].synced);
    assert_eq!(batch.questions.len(), 1);
    assert_eq!(batch.notes.len(), 1);
    assert_eq!(batch.notes[0].attachments[0].size_bytes, 5);
    assert_eq!(batch.notes[0].attachments[0].local_filename, "photo.jpg");

    let payload = serde_json::to_value(&batch).unwrap();
    assert_eq!(payload["questions"][0]["answers"][0]["option_id"], 2);
    assert_eq!(payload["notes"][0]["question_id"], 1);
    assert!(payload["notes"][0]["attachments"][0].get("data").is_none());
}

#[test]
fn acknowledge_sync_clears_needs_sync() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteLocalStore::sqlite(&conn);
    let outbox = SqliteSyncOutbox::new(&conn);
    let first = open_section(&store, 10);
    let second = open_section(&store, 11);

    store.save_question(&first, &QuestionDraft::new(1, "A", 1)).unwrap();
    store.save_note(&second.context(), "note", &[], None).unwrap();
    assert!(store.needs_sync().unwrap());
    assert_eq!(
        outbox.summary().unwrap(),
        SyncSummary {
            sections: 2,
            questions: 1,
            notes: 1,
        }
    );

    let batch = outbox.pending_sync(SyncScope::All).unwrap();
    let acked = outbox.acknowledge_sync(&batch).unwrap();
    assert_eq!(
        acked,
        SyncSummary {
            sections: 2,
            questions: 1,
            notes: 1,
        }
    );

    assert!(!store.needs_sync().unwrap());
    assert!(outbox.summary().unwrap().is_empty());
    assert!(outbox.pending_sync(SyncScope::All).unwrap().is_empty());
}

#[test]
fn edits_made_after_snapshot_stay_pending() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteLocalStore::sqlite(&conn);
    let outbox = SqliteSyncOutbox::new(&conn);
    let section = open_section(&store, 10);

    store.save_question(&section, &QuestionDraft::new(1, "A", 1)).unwrap();
    let batch = outbox.pending_sync(SyncScope::All).unwrap();

    store
        .save_question(
            &section,
            &QuestionDraft::new(1, "A", 1).with_answer(Answer::selected(4)),
        )
        .unwrap();
    store.record_arrival(&section, 1_000).unwrap();

    let acked = outbox.acknowledge_sync(&batch).unwrap();
    assert_eq!(acked.questions, 0);
    assert_eq!(acked.sections, 0);
    assert!(store.needs_sync().unwrap());

    let reloaded = SqliteSectionRepository::new(&conn)
        .get_section(section.uuid)
        .unwrap()
        .unwrap();
    assert!(!reloaded.synced);
}

#[test]
fn section_scope_limits_snapshot() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteLocalStore::sqlite(&conn);
    let outbox = SqliteSyncOutbox::new(&conn);
    let first = open_section(&store, 10);
    let second = open_section(&store, 11);

    store.save_note(&first.context(), "first", &[], None).unwrap();
    store.save_note(&second.context(), "second", &[], None).unwrap();

    let batch = outbox.pending_sync(SyncScope::Section(&first)).unwrap();
    assert_eq!(batch.notes.len(), 1);
    assert_eq!(batch.notes[0].body, "first");
    assert_eq!(
        batch
            .sections
            .iter()
            .map(|section| section.uuid)
            .collect::<Vec<_>>(),
        vec![first.uuid]
    );
}
