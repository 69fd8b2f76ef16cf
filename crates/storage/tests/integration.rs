//! Integration tests for the storage crate.
//!
//! Uses in-memory SQLite for fast, isolated tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use veil_context::AppId;
use veil_lock::{PolicySnapshot, ProtectedSet, Quadrant, SecretPattern};
use veil_storage::{
    Database, PolicyListener, PolicyRepository, PolicyStore, KEY_PROTECTED, KEY_SECRET_PATTERN,
};

fn create_test_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn create_test_store() -> PolicyStore {
    PolicyStore::new(Arc::new(create_test_db()))
}

fn recorder() -> (PolicyListener, Arc<Mutex<Vec<PolicySnapshot>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener: PolicyListener = Arc::new(move |snapshot: &PolicySnapshot| {
        sink.lock().unwrap().push(snapshot.clone());
    });
    (listener, seen)
}

// =============================================================================
// Database Initialization Tests
// =============================================================================

mod initialization {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok(), "Should create in-memory database");
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("veil.db");

        let db = Database::open(&db_path);
        assert!(db.is_ok(), "Should create file-based database");
        assert!(db_path.exists(), "Database file should exist");
    }

    #[test]
    fn test_reopen_existing_database() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("veil.db");

        {
            let db = Database::open(&db_path).unwrap();
            let apps: ProtectedSet = ["com.bank", "com.chat"].into_iter().collect();
            db.save_protected_apps(&apps).unwrap();
        }

        {
            let db = Database::open(&db_path).unwrap();
            let apps = db.load_protected_apps().unwrap();
            assert_eq!(apps.len(), 2, "Protected apps should persist after reopen");
        }
    }

    #[test]
    fn test_invalid_path_fails() {
        let result = Database::open(&PathBuf::from("/nonexistent/path/db.sqlite"));
        assert!(result.is_err(), "Should fail with invalid path");
    }
}

// =============================================================================
// Settings Tests
// =============================================================================

mod settings {
    use super::*;

    #[test]
    fn test_missing_setting_is_none() {
        let db = create_test_db();
        assert_eq!(db.get_setting("nope").unwrap(), None);
    }

    #[test]
    fn test_set_overwrites() {
        let db = create_test_db();
        db.set_setting("k", "one").unwrap();
        db.set_setting("k", "two").unwrap();
        assert_eq!(db.get_setting("k").unwrap().as_deref(), Some("two"));
    }
}

// =============================================================================
// Policy Repository Tests
// =============================================================================

mod policy {
    use super::*;

    #[test]
    fn test_defaults_on_empty_database() {
        let db = create_test_db();
        assert!(db.load_protected_apps().unwrap().is_empty());
        assert_eq!(db.load_secret_pattern().unwrap(), SecretPattern::default());
    }

    #[test]
    fn test_protected_apps_stored_as_json_array() {
        let db = create_test_db();
        let apps: ProtectedSet = ["com.b", "com.a"].into_iter().collect();
        db.save_protected_apps(&apps).unwrap();

        let raw = db.get_setting(KEY_PROTECTED).unwrap().unwrap();
        assert_eq!(raw, r#"["com.a","com.b"]"#);
        assert!(db.load_protected_apps().unwrap().contains(&AppId::from("com.a")));
    }

    #[test]
    fn test_malformed_protected_apps_load_empty() {
        let db = create_test_db();
        db.set_setting(KEY_PROTECTED, "{not json").unwrap();
        assert!(db.load_protected_apps().unwrap().is_empty());
    }

    #[test]
    fn test_pattern_stored_comma_delimited() {
        let db = create_test_db();
        let pattern = SecretPattern::from_codes([3, 3, 0]).unwrap();
        db.save_secret_pattern(&pattern).unwrap();

        assert_eq!(
            db.get_setting(KEY_SECRET_PATTERN).unwrap().as_deref(),
            Some("3,3,0")
        );
        let loaded = db.load_secret_pattern().unwrap();
        assert_eq!(
            loaded.quadrants(),
            &[Quadrant::BottomRight, Quadrant::BottomRight, Quadrant::TopLeft]
        );
    }

    #[test]
    fn test_malformed_pattern_loads_default() {
        let db = create_test_db();
        db.set_setting(KEY_SECRET_PATTERN, "0,7,x").unwrap();
        assert_eq!(db.load_secret_pattern().unwrap(), SecretPattern::default());
    }
}

// =============================================================================
// Policy Store Tests
// =============================================================================

mod store {
    use super::*;

    #[test]
    fn test_snapshot_reflects_saves() {
        let store = create_test_store();
        let apps: ProtectedSet = ["com.bank"].into_iter().collect();
        store.save_protected_apps(&apps).unwrap();
        store
            .save_secret_pattern(&SecretPattern::from_codes([1, 1]).unwrap())
            .unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.protected, apps);
        assert_eq!(snapshot.pattern.codes(), vec![1, 1]);
    }

    #[test]
    fn test_listeners_receive_fresh_snapshot() {
        let store = create_test_store();
        let (listener, seen) = recorder();
        store.subscribe(listener);

        let apps: ProtectedSet = ["com.bank"].into_iter().collect();
        store.save_protected_apps(&apps).unwrap();
        store
            .save_secret_pattern(&SecretPattern::from_codes([2]).unwrap())
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].protected, apps);
        assert_eq!(seen[0].pattern, SecretPattern::default());
        assert_eq!(seen[1].pattern.codes(), vec![2]);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let store = create_test_store();
        let (listener, seen) = recorder();
        let id = store.subscribe(listener);
        assert_eq!(store.listener_count(), 1);

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        assert_eq!(store.listener_count(), 0);

        store.save_protected_apps(&ProtectedSet::new()).unwrap();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_saves_notify_in_commit_order() {
        let store = Arc::new(create_test_store());
        let (record, seen) = recorder();
        let first_call = Arc::new(AtomicBool::new(true));
        let stall = Arc::clone(&first_call);
        // The first notification is slow, as an engine listener under load
        // might be.
        store.subscribe(Arc::new(move |snapshot: &PolicySnapshot| {
            if stall.swap(false, Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(200));
            }
            record(snapshot);
        }));

        let clearing = {
            let store = Arc::clone(&store);
            thread::spawn(move || store.save_protected_apps(&ProtectedSet::new()).unwrap())
        };
        while first_call.load(Ordering::SeqCst) {
            thread::yield_now();
        }
        let adding = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let apps: ProtectedSet = ["com.bank"].into_iter().collect();
                store.save_protected_apps(&apps).unwrap();
            })
        };
        clearing.join().unwrap();
        adding.join().unwrap();

        let stored = store.protected_apps().unwrap();
        assert!(stored.contains(&AppId::from("com.bank")));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].protected.is_empty());
        assert_eq!(seen.last().unwrap().protected, stored);
    }

    #[test]
    fn test_saves_work_without_listeners() {
        let store = create_test_store();
        let apps: ProtectedSet = ["com.notes"].into_iter().collect();
        store.save_protected_apps(&apps).unwrap();
        assert_eq!(store.protected_apps().unwrap(), apps);
    }
}
