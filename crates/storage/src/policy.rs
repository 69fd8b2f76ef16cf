//! Policy persistence and change notification.

use crate::{Database, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use veil_context::AppId;
use veil_lock::{PolicySnapshot, ProtectedSet, SecretPattern};

/// Settings key for the protected app list (JSON array of strings).
pub const KEY_PROTECTED: &str = "protected_packages";

/// Settings key for the secret pattern (comma-delimited codes).
pub const KEY_SECRET_PATTERN: &str = "secret_tap_pattern";

/// Repository for policy persistence.
pub trait PolicyRepository {
    type Error;
    fn load_protected_apps(&self) -> std::result::Result<ProtectedSet, Self::Error>;
    fn save_protected_apps(&self, apps: &ProtectedSet) -> std::result::Result<(), Self::Error>;
    /// Never fails on malformed content; falls back to the default pattern.
    fn load_secret_pattern(&self) -> std::result::Result<SecretPattern, Self::Error>;
    fn save_secret_pattern(&self, pattern: &SecretPattern)
        -> std::result::Result<(), Self::Error>;
}

impl PolicyRepository for Database {
    type Error = crate::StorageError;

    fn load_protected_apps(&self) -> Result<ProtectedSet> {
        let Some(json) = self.get_setting(KEY_PROTECTED)? else {
            return Ok(ProtectedSet::new());
        };
        match serde_json::from_str::<Vec<AppId>>(&json) {
            Ok(apps) => Ok(apps.into_iter().collect()),
            Err(e) => {
                tracing::warn!(error = %e, "malformed protected app list, treating as empty");
                Ok(ProtectedSet::new())
            }
        }
    }

    fn save_protected_apps(&self, apps: &ProtectedSet) -> Result<()> {
        let json = serde_json::to_string(apps)?;
        self.set_setting(KEY_PROTECTED, &json)
    }

    fn load_secret_pattern(&self) -> Result<SecretPattern> {
        let stored = self.get_setting(KEY_SECRET_PATTERN)?.unwrap_or_default();
        Ok(SecretPattern::decode(&stored))
    }

    fn save_secret_pattern(&self, pattern: &SecretPattern) -> Result<()> {
        self.set_setting(KEY_SECRET_PATTERN, &pattern.encode())
    }
}

/// Callback invoked with the fresh policy after every save.
pub type PolicyListener = Arc<dyn Fn(&PolicySnapshot) + Send + Sync + 'static>;

/// Handle returned by [`PolicyStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Policy persistence with change notification.
///
/// Readable and writable whether or not any engine is listening.
///
/// Saves are serialized end to end: the write, the snapshot and the listener
/// calls of one save complete before the next save starts, so listeners see
/// policies in commit order. Listeners may (un)subscribe from the callback but
/// must not save.
pub struct PolicyStore {
    db: Arc<Database>,
    listeners: Mutex<Vec<(ListenerId, PolicyListener)>>,
    writes: Mutex<()>,
    next_id: AtomicU64,
}

impl PolicyStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            listeners: Mutex::new(Vec::new()),
            writes: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn snapshot(&self) -> Result<PolicySnapshot> {
        Ok(PolicySnapshot::new(
            self.db.load_protected_apps()?,
            self.db.load_secret_pattern()?,
        ))
    }

    pub fn protected_apps(&self) -> Result<ProtectedSet> {
        self.db.load_protected_apps()
    }

    pub fn secret_pattern(&self) -> Result<SecretPattern> {
        self.db.load_secret_pattern()
    }

    pub fn save_protected_apps(&self, apps: &ProtectedSet) -> Result<()> {
        let _write = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        self.db.save_protected_apps(apps)?;
        tracing::info!(count = apps.len(), "protected apps saved");
        self.notify()
    }

    pub fn save_secret_pattern(&self, pattern: &SecretPattern) -> Result<()> {
        let _write = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        self.db.save_secret_pattern(pattern)?;
        tracing::info!(len = pattern.len(), "secret pattern saved");
        self.notify()
    }

    pub fn subscribe(&self, listener: PolicyListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    /// Returns `false` if the listener was already gone.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Caller holds `writes`.
    fn notify(&self) -> Result<()> {
        // Snapshot the list so listeners can (un)subscribe from the callback.
        let listeners: Vec<PolicyListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        if listeners.is_empty() {
            return Ok(());
        }

        let snapshot = self.snapshot()?;
        for listener in listeners {
            listener(&snapshot);
        }
        Ok(())
    }
}
