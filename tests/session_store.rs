//! Session store integration tests

use stickllm::prompts::build_prompt;
use stickllm::providers::{Message, Role};
use stickllm::StickllmError;

mod common;
use common::create_temp_storage;

#[test]
fn test_conversation_round_trip_and_prompt() {
    let (storage, _tmp) = create_temp_storage();

    let id = storage.create_session(None, &[]).unwrap();
    let session = storage.get_session(id).unwrap();
    assert!(session.name.starts_with("Session "));

    storage.append_message(id, Role::User, "hi").unwrap();
    storage.append_message(id, Role::Assistant, "hello").unwrap();

    let history = storage.load_messages(id).unwrap();
    assert_eq!(
        history,
        vec![Message::user("hi"), Message::assistant("hello")]
    );

    let no_context: [&str; 0] = [];
    assert_eq!(
        build_prompt("P", &no_context, &history),
        "System: P\n\nUser: hi\n\nAssistant: hello\n\nAssistant: "
    );
}

#[test]
fn test_many_appends_keep_order() {
    let (storage, _tmp) = create_temp_storage();
    let id = storage.create_session(Some("order"), &[]).unwrap();

    let mut expected = Vec::new();
    for i in 0..50 {
        let msg = if i % 2 == 0 {
            Message::user(format!("question {}", i))
        } else {
            Message::assistant(format!("answer {}", i))
        };
        storage.append_message(id, msg.role, &msg.content).unwrap();
        expected.push(msg);
    }

    assert_eq!(storage.load_messages(id).unwrap(), expected);
    assert_eq!(storage.get_session(id).unwrap().message_count, 50);
}

#[test]
fn test_rename_moves_session_to_front() {
    let (storage, _tmp) = create_temp_storage();
    let first = storage.create_session(Some("first"), &[]).unwrap();
    let second = storage.create_session(Some("second"), &[]).unwrap();

    storage.append_message(second, Role::User, "bump").unwrap();
    assert_eq!(storage.list_sessions().unwrap()[0].id, second);

    storage.rename_session(first, "renamed").unwrap();
    let sessions = storage.list_sessions().unwrap();
    assert_eq!(sessions[0].id, first);
    assert_eq!(sessions[0].name, "renamed");
    assert_eq!(sessions[1].id, second);
    assert!(sessions.iter().all(|s| s.updated_at >= s.created_at));
}

#[test]
fn test_missing_session_is_distinct_from_empty_session() {
    let (storage, _tmp) = create_temp_storage();
    let id = storage.create_session(Some("empty"), &[]).unwrap();

    assert!(storage.load_messages(id).unwrap().is_empty());

    let err = storage.load_messages(id + 100).unwrap_err();
    assert!(StickllmError::is_not_found(&err));

    let err = storage
        .append_message(id + 100, Role::User, "orphan")
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StickllmError>(),
        Some(StickllmError::Storage(_))
    ));
}

#[test]
fn test_storage_survives_reopen() {
    let (storage, tmp) = create_temp_storage();
    let id = storage
        .create_session(Some("persisted"), &["/tmp/notes.md".to_string()])
        .unwrap();
    storage.append_message(id, Role::User, "remember me").unwrap();
    drop(storage);

    let reopened =
        stickllm::SqliteStorage::new_with_path(tmp.path().join("sessions.db")).unwrap();
    let session = reopened.get_session(id).unwrap();
    assert_eq!(session.name, "persisted");
    assert_eq!(session.context, vec!["/tmp/notes.md".to_string()]);
    assert_eq!(
        reopened.load_messages(id).unwrap(),
        vec![Message::user("remember me")]
    );
}
