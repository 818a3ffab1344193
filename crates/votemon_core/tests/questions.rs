use rusqlite::Connection;
use votemon_core::db::open_db_in_memory;
use votemon_core::{
    Answer, NewSection, QuestionDraft, RepoError, SectionContext, SectionInfo, SqliteLocalStore,
    SyncScope,
};

fn open_section(store: &SqliteLocalStore<'_>, id: i64) -> SectionInfo {
    store
        .create_section(&NewSection {
            province_code: "P1".to_string(),
            province_name: "Province".to_string(),
            county_code: "C1".to_string(),
            county_name: "County".to_string(),
            municipality_code: "M1".to_string(),
            municipality_name: "Town".to_string(),
            section_id: id,
        })
        .unwrap()
}

fn count_rows(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

#[test]
fn save_question_persists_answers_and_answered_flag() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteLocalStore::sqlite(&conn);
    let section = open_section(&store, 10);

    let saved = store
        .save_question(
            &section,
            &QuestionDraft::new(5, "F1", 2)
                .with_answer(Answer::with_text(9, "late opening"))
                .with_answer(Answer::selected(3)),
        )
        .unwrap();

    assert!(saved.answered);
    assert!(!saved.synced);
    assert_eq!(saved.section_uuid, section.uuid);
    assert_eq!(
        saved.answers,
        vec![Answer::selected(3), Answer::with_text(9, "late opening")]
    );

    let found = store.find_question(5, &section).unwrap().unwrap();
    assert_eq!(found, saved);
}

#[test]
fn resaving_replaces_answers_and_marks_unsynced() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteLocalStore::sqlite(&conn);
    let section = open_section(&store, 10);

    let first = store
        .save_question(
            &section,
            &QuestionDraft::new(5, "F1", 1).with_answer(Answer::selected(1)),
        )
        .unwrap();
    store.mark_question_synced(&first).unwrap();

    let second = store
        .save_question(&section, &QuestionDraft::new(5, "F1", 1))
        .unwrap();
    assert!(!second.answered);
    assert!(!second.synced);
    assert!(second.answers.is_empty());
    assert_eq!(second.revision, first.revision + 1);
    assert_eq!(count_rows(&conn, "SELECT COUNT(*) FROM answers;"), 0);
}

#[test]
fn list_questions_includes_older_form_versions_only() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteLocalStore::sqlite(&conn);
    let section = open_section(&store, 10);

    store.save_question(&section, &QuestionDraft::new(1, "F1", 2)).unwrap();
    store.save_question(&section, &QuestionDraft::new(2, "F1", 3)).unwrap();
    store.save_question(&section, &QuestionDraft::new(3, "F1", 4)).unwrap();
    store.save_question(&section, &QuestionDraft::new(4, "F2", 1)).unwrap();

    let ids = store
        .list_questions(&section.context(), "F1", 3)
        .unwrap()
        .into_iter()
        .map(|question| question.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn section_scoped_queries_are_empty_without_current_section() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteLocalStore::sqlite(&conn);
    let section = open_section(&store, 10);
    store
        .save_question(
            &section,
            &QuestionDraft::new(1, "F1", 1).with_answer(Answer::selected(1)),
        )
        .unwrap();

    let empty = SectionContext::empty();
    assert!(store.list_questions(&empty, "F1", 9).unwrap().is_empty());
    assert!(store.list_answered_questions(&empty, "F1").unwrap().is_empty());
}

#[test]
fn questions_are_isolated_per_section() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteLocalStore::sqlite(&conn);
    let first = open_section(&store, 10);
    let second = open_section(&store, 11);

    store.save_question(&first, &QuestionDraft::new(1, "F1", 1)).unwrap();

    assert!(store.find_question(1, &first).unwrap().is_some());
    assert!(store.find_question(1, &second).unwrap().is_none());
    assert!(store
        .list_questions(&second.context(), "F1", 1)
        .unwrap()
        .is_empty());
}

#[test]
fn list_answered_questions_filters_by_form_and_answered() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteLocalStore::sqlite(&conn);
    let section = open_section(&store, 10);

    store
        .save_question(
            &section,
            &QuestionDraft::new(1, "F1", 1).with_answer(Answer::selected(1)),
        )
        .unwrap();
    store.save_question(&section, &QuestionDraft::new(2, "F1", 1)).unwrap();
    store
        .save_question(
            &section,
            &QuestionDraft::new(3, "F2", 1).with_answer(Answer::selected(1)),
        )
        .unwrap();

    let answered = store
        .list_answered_questions(&section.context(), "F1")
        .unwrap();
    assert_eq!(answered.len(), 1);
    assert_eq!(answered[0].id, 1);
}

#[test]
fn delete_questions_cascades_to_answers_and_linked_notes() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteLocalStore::sqlite(&conn);
    let section = open_section(&store, 10);
    let ctx = section.context();

    let question = store
        .save_question(
            &section,
            &QuestionDraft::new(5, "F1", 1)
                .with_answer(Answer::selected(1))
                .with_answer(Answer::selected(2)),
        )
        .unwrap();
    let kept = store
        .save_question(
            &section,
            &QuestionDraft::new(6, "F1", 1).with_answer(Answer::selected(1)),
        )
        .unwrap();

    let photo = store.save_note_attachment("photo.jpg", b"jpeg").unwrap();
    store
        .save_note(&ctx, "about q5", std::slice::from_ref(&photo), Some(5))
        .unwrap();
    store.save_note(&ctx, "also q5", &[], Some(5)).unwrap();
    let kept_note = store.save_note(&ctx, "about q6", &[], Some(6)).unwrap();
    let loose_note = store.save_note(&ctx, "general", &[], None).unwrap();

    let summary = store.delete_questions(&[question]).unwrap();
    assert_eq!(summary.questions, 1);
    assert_eq!(summary.answers, 2);
    assert_eq!(summary.notes, 2);
    assert_eq!(summary.attachments, 1);

    assert!(store.find_question(5, &section).unwrap().is_none());
    assert!(store.list_notes(&ctx, Some(5)).unwrap().is_empty());
    assert_eq!(
        count_rows(
            &conn,
            "SELECT COUNT(*) FROM answers WHERE question_id = 5;"
        ),
        0
    );
    assert_eq!(count_rows(&conn, "SELECT COUNT(*) FROM note_attachments;"), 0);

    assert_eq!(store.find_question(6, &section).unwrap(), Some(kept));
    assert_eq!(store.list_notes(&ctx, Some(6)).unwrap(), vec![kept_note]);
    assert_eq!(store.list_notes(&ctx, None).unwrap(), vec![loose_note]);
}

#[test]
fn delete_questions_only_touches_notes_of_the_same_section() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteLocalStore::sqlite(&conn);
    let first = open_section(&store, 10);
    let second = open_section(&store, 11);

    let question = store.save_question(&first, &QuestionDraft::new(5, "F1", 1)).unwrap();
    store.save_note(&second.context(), "other station", &[], Some(5)).unwrap();

    let summary = store.delete_questions(&[question]).unwrap();
    assert_eq!(summary.notes, 0);
    assert_eq!(store.list_notes(&second.context(), Some(5)).unwrap().len(), 1);
}

#[test]
fn delete_questions_rolls_back_whole_batch_on_failure() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteLocalStore::sqlite(&conn);
    let section = open_section(&store, 10);

    let first = store
        .save_question(
            &section,
            &QuestionDraft::new(1, "F1", 1).with_answer(Answer::selected(1)),
        )
        .unwrap();
    let second = store
        .save_question(
            &section,
            &QuestionDraft::new(2, "F1", 1).with_answer(Answer::selected(1)),
        )
        .unwrap();

    conn.execute_batch(
        "CREATE TRIGGER block_question_two
         BEFORE DELETE ON questions
         WHEN OLD.question_id = 2
         BEGIN
             SELECT RAISE(ABORT, 'blocked');
         END;",
    )
    .unwrap();

    let err = store.delete_questions(&[first, second]).unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));

    assert!(store.find_question(1, &section).unwrap().is_some());
    assert_eq!(count_rows(&conn, "SELECT COUNT(*) FROM answers;"), 2);
}

#[test]
fn unsynced_questions_can_be_scoped_and_marked_synced() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteLocalStore::sqlite(&conn);
    let first = open_section(&store, 10);
    let second = open_section(&store, 11);

    let q1 = store.save_question(&first, &QuestionDraft::new(1, "F1", 1)).unwrap();
    store.save_question(&second, &QuestionDraft::new(1, "F1", 1)).unwrap();

    assert_eq!(store.list_unsynced_questions(SyncScope::All).unwrap().len(), 2);
    assert_eq!(
        store
            .list_unsynced_questions(SyncScope::Section(&first))
            .unwrap()
            .len(),
        1
    );

    store.mark_question_synced(&q1).unwrap();
    assert!(store
        .list_unsynced_questions(SyncScope::Section(&first))
        .unwrap()
        .is_empty());
    assert_eq!(store.list_unsynced_questions(SyncScope::All).unwrap().len(), 1);
}

#[test]
fn save_question_rejects_invalid_drafts() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteLocalStore::sqlite(&conn);
    let section = open_section(&store, 10);

    let err = store
        .save_question(&section, &QuestionDraft::new(-1, "F1", 1))
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}
