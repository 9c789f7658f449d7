//! Behavioural contract shared by every ConversationStore backend.
//!
//! Each scenario is written once against `&dyn ConversationStore` and run
//! against both the SQLite and the flat-file implementation.

use std::sync::Arc;

use tempfile::TempDir;

use zmai_core::error::ZmaiError;
use zmai_core::types::{
    Conversation, ConversationMeta, Message, NewConversation, DEFAULT_COLOR, DEFAULT_TITLE,
};
use zmai_storage::{ConversationStore, Database, FileConversationStore, SqliteConversationStore};

// =============================================================================
// Helpers
// =============================================================================

type StoreFactory = fn() -> (Option<TempDir>, Box<dyn ConversationStore>);

fn sqlite_store() -> (Option<TempDir>, Box<dyn ConversationStore>) {
    let db = Database::in_memory().unwrap();
    (None, Box::new(SqliteConversationStore::new(Arc::new(db))))
}

fn file_store() -> (Option<TempDir>, Box<dyn ConversationStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = FileConversationStore::new(dir.path()).unwrap();
    (Some(dir), Box::new(store))
}

fn backends() -> [StoreFactory; 2] {
    [sqlite_store, file_store]
}

fn on_both_backends(scenario: fn(&dyn ConversationStore)) {
    for make in backends() {
        let (_dir, store) = make();
        scenario(store.as_ref());
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_create_then_get_round_trips_metadata() {
    on_both_backends(|store| {
        let created = store
            .create_conversation(NewConversation {
                title: Some("T".to_string()),
                color: Some("C".to_string()),
                owner_id: None,
            })
            .unwrap();

        let conv = store.get_conversation(&created.id).unwrap();
        assert_eq!(
            conv.meta,
            ConversationMeta {
                title: "T".to_string(),
                color: "C".to_string(),
                owner_id: None,
                search_enabled: false,
            }
        );
        assert!(conv.messages.is_empty());
    });
}

#[test]
fn test_create_uses_defaults_and_fresh_ids() {
    on_both_backends(|store| {
        let a = store.create_conversation(NewConversation::default()).unwrap();
        let b = store.create_conversation(NewConversation::default()).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.meta.title, DEFAULT_TITLE);
        assert_eq!(a.meta.color, DEFAULT_COLOR);
        assert!(store.exists(&a.id).unwrap());
    });
}

#[test]
fn test_unknown_id_reads_as_empty_default() {
    on_both_backends(|store| {
        assert_eq!(
            store.get_conversation("ghost").unwrap(),
            Conversation::empty("ghost")
        );
        assert!(!store.exists("ghost").unwrap());
    });
}

#[test]
fn test_append_turn_grows_log_by_exactly_two() {
    on_both_backends(|store| {
        let conv = store.create_conversation(NewConversation::default()).unwrap();
        store
            .append_turn(&conv.id, &Message::user("q1"), &Message::assistant("a1"))
            .unwrap();
        let before = store.get_conversation(&conv.id).unwrap().messages.len();

        store
            .append_turn(&conv.id, &Message::user("Hello"), &Message::assistant("Hi there"))
            .unwrap();

        let after = store.get_conversation(&conv.id).unwrap().messages;
        assert_eq!(after.len(), before + 2);
        assert_eq!(
            &after[after.len() - 2..],
            &[Message::user("Hello"), Message::assistant("Hi there")]
        );
    });
}

#[test]
fn test_append_turn_on_unknown_id_creates_conversation() {
    on_both_backends(|store| {
        store
            .append_turn("ghost", &Message::user("Hello"), &Message::assistant("Hi"))
            .unwrap();
        let conv = store.get_conversation("ghost").unwrap();
        assert_eq!(conv.messages.len(), 2);
        assert!(store.exists("ghost").unwrap());
        assert!(store
            .list_conversations(None)
            .unwrap()
            .iter()
            .any(|s| s.id == "ghost"));
    });
}

#[test]
fn test_metadata_mutations_create_on_demand() {
    on_both_backends(|store| {
        let meta = store.rename_conversation("fresh", "Renamed").unwrap();
        assert_eq!(meta.title, "Renamed");
        assert_eq!(meta.color, DEFAULT_COLOR);

        store.set_color("fresh", "#ff0000").unwrap();
        store.set_search_enabled("fresh", true).unwrap();

        let conv = store.get_conversation("fresh").unwrap();
        assert_eq!(conv.meta.title, "Renamed");
        assert_eq!(conv.meta.color, "#ff0000");
        assert!(conv.meta.search_enabled);
        assert!(conv.messages.is_empty());

        store.set_search_enabled("fresh", false).unwrap();
        assert!(!store.get_conversation("fresh").unwrap().meta.search_enabled);
    });
}

#[test]
fn test_mutations_never_touch_the_log() {
    on_both_backends(|store| {
        store
            .append_turn("c1", &Message::user("u"), &Message::assistant("a"))
            .unwrap();
        store.rename_conversation("c1", "x").unwrap();
        store.set_color("c1", "y").unwrap();
        store.set_search_enabled("c1", true).unwrap();
        assert_eq!(store.get_conversation("c1").unwrap().messages.len(), 2);
    });
}

#[test]
fn test_owner_is_fixed_at_creation() {
    on_both_backends(|store| {
        let conv = store
            .create_conversation(NewConversation {
                owner_id: Some("u1".to_string()),
                ..Default::default()
            })
            .unwrap();
        store.rename_conversation(&conv.id, "new title").unwrap();
        assert_eq!(
            store.get_conversation(&conv.id).unwrap().meta.owner_id.as_deref(),
            Some("u1")
        );
    });
}

#[test]
fn test_list_filters_by_owner() {
    on_both_backends(|store| {
        for owner in ["u1", "u2", "u1"] {
            store
                .create_conversation(NewConversation {
                    owner_id: Some(owner.to_string()),
                    ..Default::default()
                })
                .unwrap();
        }
        store.create_conversation(NewConversation::default()).unwrap();

        assert_eq!(store.list_conversations(None).unwrap().len(), 4);
        let u1 = store.list_conversations(Some("u1")).unwrap();
        assert_eq!(u1.len(), 2);
        assert!(u1.iter().all(|s| s.owner_id.as_deref() == Some("u1")));
        assert!(store.list_conversations(Some("nobody")).unwrap().is_empty());
    });
}

#[test]
fn test_list_order_is_stable() {
    on_both_backends(|store| {
        for i in 0..5 {
            store
                .create_conversation(NewConversation {
                    title: Some(format!("t{}", i)),
                    ..Default::default()
                })
                .unwrap();
        }
        let first = store.list_conversations(None).unwrap();
        let second = store.list_conversations(None).unwrap();
        assert_eq!(first, second);
    });
}

#[test]
fn test_delete_is_idempotent_and_total() {
    on_both_backends(|store| {
        let conv = store.create_conversation(NewConversation::default()).unwrap();
        store
            .append_turn(&conv.id, &Message::user("u"), &Message::assistant("a"))
            .unwrap();

        store.delete_conversation(&conv.id).unwrap();
        store.delete_conversation(&conv.id).unwrap();
        store.delete_conversation("never-existed").unwrap();

        assert_eq!(
            store.get_conversation(&conv.id).unwrap(),
            Conversation::empty(conv.id.clone())
        );
        assert!(!store.exists(&conv.id).unwrap());
        assert!(store
            .list_conversations(None)
            .unwrap()
            .iter()
            .all(|s| s.id != conv.id));
    });
}

#[test]
fn test_invalid_ids_are_rejected_before_any_write() {
    on_both_backends(|store| {
        for id in ["../x", "a/b", ".hidden", ""] {
            let is_validation =
                |r: Result<(), ZmaiError>| matches!(r, Err(ZmaiError::Validation(_)));

            assert!(is_validation(store.get_conversation(id).map(|_| ())), "get {id:?}");
            assert!(is_validation(store.exists(id).map(|_| ())), "exists {id:?}");
            assert!(is_validation(store.append_turn(
                id,
                &Message::user("u"),
                &Message::assistant("a"),
            )));
            assert!(is_validation(store.rename_conversation(id, "T").map(|_| ())));
            assert!(is_validation(store.set_color(id, "C").map(|_| ())));
            assert!(is_validation(store.set_search_enabled(id, true).map(|_| ())));
            assert!(is_validation(store.delete_conversation(id)));
        }
        assert!(store.list_conversations(None).unwrap().is_empty());
    });
}

#[test]
fn test_concurrent_appends_on_distinct_ids_all_land() {
    for make in backends() {
        let (_dir, store) = make();
        let store: Arc<dyn ConversationStore> = Arc::from(store);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let id = format!("c{}", i);
                    for j in 0..5 {
                        store
                            .append_turn(
                                &id,
                                &Message::user(format!("q{}", j)),
                                &Message::assistant(format!("a{}", j)),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for i in 0..8 {
            let conv = store.get_conversation(&format!("c{}", i)).unwrap();
            assert_eq!(conv.messages.len(), 10);
        }
    }
}
