//! The session store: save/load/clear of the one persisted session.
//!
//! There is exactly one session record per application, kept under
//! [`SESSION_STORAGE_KEY`]. The store is a best-effort mirror of the
//! manager's in-memory session:
//!
//! - writes that fail are logged and forgotten,
//! - reads that fail (missing, unreadable, malformed) look like "no session",
//! - a record that has already expired is deleted on load and reported as
//!   absent.
//!
//! None of these methods return an error. That is the contract: storage
//! trouble must never break a login.

use std::sync::Arc;

use walletgate_protocol::{Codec, JsonCodec, Session};

use crate::{Clock, KeyValueStore, StorageError};

/// The well-known key the session record lives under.
pub const SESSION_STORAGE_KEY: &str = "midnight_session";

/// Persists a single [`Session`] through a [`KeyValueStore`].
pub struct SessionStore<C: Codec = JsonCodec> {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    codec: C,
    key: String,
}

impl SessionStore<JsonCodec> {
    /// Creates a JSON-encoding store under the default key.
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_codec(storage, clock, JsonCodec)
    }
}

impl<C: Codec> SessionStore<C> {
    /// Creates a store with an explicit codec.
    pub fn with_codec(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, codec: C) -> Self {
        Self {
            storage,
            clock,
            codec,
            key: SESSION_STORAGE_KEY.to_string(),
        }
    }

    /// Uses `key` instead of [`SESSION_STORAGE_KEY`], e.g. to keep two
    /// applications sharing one storage directory apart.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// The key this store reads and writes.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Writes `session`. Failures are logged, never returned.
    pub fn save(&self, session: &Session) {
        if let Err(e) = self.try_save(session) {
            tracing::warn!(key = %self.key, error = %e, "failed to persist session");
        }
    }

    /// Reads the stored session.
    ///
    /// Returns `None` if nothing is stored, the record can't be read or
    /// parsed, or it has expired. An expired record is also deleted, so a
    /// second `load()` finds nothing and returns `None` again.
    pub fn load(&self) -> Option<Session> {
        let session = match self.try_load() {
            Ok(Some(session)) => session,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(key = %self.key, error = %e, "ignoring unreadable stored session");
                return None;
            }
        };

        if session.is_expired_at(self.clock.now_millis()) {
            tracing::info!(
                address = %session.address,
                "stored session expired, discarding"
            );
            self.clear();
            return None;
        }

        Some(session)
    }

    /// Deletes the stored session. Failures are logged, never returned.
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(&self.key) {
            tracing::warn!(key = %self.key, error = %e, "failed to clear stored session");
        }
    }

    fn try_save(&self, session: &Session) -> Result<(), StorageError> {
        let bytes = self.codec.encode(session)?;
        // JSON is UTF-8 by construction; a binary codec gets a lossy copy,
        // which the matching decode below would reject rather than misread.
        let text = String::from_utf8_lossy(&bytes);
        self.storage.set(&self.key, &text)
    }

    fn try_load(&self) -> Result<Option<Session>, StorageError> {
        let Some(raw) = self.storage.get(&self.key)? else {
            return Ok(None);
        };
        let session: Session = self.codec.decode(raw.as_bytes())?;
        session.validate()?;
        Ok(Some(session))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{ManualClock, MemoryStorage};

    const START: u64 = 1_700_000_000_000;

    fn setup() -> (SessionStore, MemoryStorage, ManualClock) {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(START);
        let store = SessionStore::new(Arc::new(storage.clone()), Arc::new(clock.clone()));
        (store, storage, clock)
    }

    // =====================================================================
    // save() / load()
    // =====================================================================

    #[test]
    fn test_save_then_load_returns_equal_session() {
        let (store, _, _) = setup();
        let mut session = Session::new("addr1", START, Some(60_000));
        session.merge_metadata(json!({"theme": "dark"}).as_object().unwrap().clone());

        store.save(&session);

        assert_eq!(store.load(), Some(session));
    }

    #[test]
    fn test_load_missing_returns_none() {
        let (store, _, _) = setup();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_load_malformed_returns_none() {
        let (store, storage, _) = setup();
        storage.set(SESSION_STORAGE_KEY, "{ definitely not json").unwrap();

        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_load_rejects_record_with_empty_address() {
        let (store, storage, _) = setup();
        storage
            .set(SESSION_STORAGE_KEY, r#"{"address":"","connectedAt":1}"#)
            .unwrap();

        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_load_session_without_expiry_never_expires() {
        let (store, _, clock) = setup();
        store.save(&Session::new("addr1", START, None));

        clock.advance(Duration::from_secs(365 * 24 * 3600));

        assert!(store.load().is_some());
    }

    // =====================================================================
    // Expiry on load
    // =====================================================================

    #[test]
    fn test_load_expired_returns_none_and_deletes_record() {
        let (store, storage, clock) = setup();
        store.save(&Session::new("addr1", START, Some(1_000)));

        clock.advance(Duration::from_millis(1_500));

        assert_eq!(store.load(), None);
        assert!(storage.raw(SESSION_STORAGE_KEY).is_none(), "record should be removed");
        // Idempotent: nothing left to find, nothing to fail on.
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_load_exactly_at_expiry_still_valid() {
        let (store, _, clock) = setup();
        store.save(&Session::new("addr1", START, Some(1_000)));

        clock.advance(Duration::from_millis(1_000));

        assert!(store.load().is_some());
    }

    // =====================================================================
    // Failures are swallowed
    // =====================================================================

    #[test]
    fn test_save_with_unavailable_storage_does_not_panic() {
        let (store, storage, _) = setup();
        storage.set_unavailable(true);

        store.save(&Session::new("addr1", START, None));
        store.clear();

        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_clear_removes_record() {
        let (store, storage, _) = setup();
        store.save(&Session::new("addr1", START, None));

        store.clear();

        assert!(storage.raw(SESSION_STORAGE_KEY).is_none());
    }

    #[test]
    fn test_with_key_isolates_records() {
        let storage = MemoryStorage::new();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(START));
        let a = SessionStore::new(Arc::new(storage.clone()), clock.clone()).with_key("app_a");
        let b = SessionStore::new(Arc::new(storage.clone()), clock).with_key("app_b");

        a.save(&Session::new("addr-a", START, None));

        assert!(a.load().is_some());
        assert!(b.load().is_none());
    }
}
