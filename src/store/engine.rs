//! Thread-Safe Item Store
//!
//! This module implements the shared store behind every connection: a flat
//! `key -> Item` map plus the monotonic CAS counter, both guarded by a single
//! reader/writer lock so that compare-and-swap and read-modify-write commands
//! are atomic with respect to concurrent connections.
//!
//! ## Concurrency model
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   Store                     │
//! │  ┌───────────────────────────────────────┐  │
//! │  │ RwLock                                │  │
//! │  │   items:     HashMap<String, Item>    │  │
//! │  │   cas_token: u64                      │  │
//! │  └───────────────────────────────────────┘  │
//! │                 clock: Arc<dyn Clock>       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Every mutating command holds the write lock across its whole
//! read-validate-bump-write section. Retrieval takes the read lock only for
//! the map lookup; the preceding lazy invalidation takes the write lock.
//!
//! ## Lazy expiration
//!
//! There is no background sweeper. Before any per-key operation touches the
//! map, [`Store::invalidate`] checks the item's expiration against the clock
//! and removes it if expired. An expired key is therefore indistinguishable
//! from an absent one.
//!
//! ## CAS ledger
//!
//! The counter starts at 0 and is incremented by exactly one whenever a
//! state-changing operation commits (`set`, `add`, `replace`, `append`,
//! `prepend`, `cas`, `incr`, `decr`, `flush_all`); the fresh value is written
//! into the affected item. `touch` and `delete` never bump it. No two live
//! items carry the same token.

use crate::clock::Clock;
use crate::store::item::Item;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Why an `incr`/`decr` could not run against the stored value.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IncrDecrError {
    /// The key does not exist (or has lazily expired).
    #[error("key not found")]
    NotFound,

    /// The stored value is not an unsigned 64-bit decimal integer.
    #[error("cannot increment or decrement non-numeric value")]
    NonNumeric,
}

/// Outcome of a compare-and-swap attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The token matched and the item was replaced.
    Stored,
    /// The key does not exist (or has lazily expired).
    NotFound,
    /// The key exists but the token did not match.
    Exists,
}

#[derive(Default)]
struct Inner {
    items: HashMap<String, Item>,
    cas_token: u64,
}

/// The shared key/value store.
///
/// Designed to be wrapped in an `Arc` and shared by every connection task.
/// All operations are synchronous and thread-safe.
///
/// # Example
///
/// ```
/// use mini_memcached::clock::SystemClock;
/// use mini_memcached::store::Store;
/// use bytes::Bytes;
/// use std::sync::Arc;
///
/// let store = Store::new(Arc::new(SystemClock::new()));
/// store.set("name", 0, 0, Bytes::from("value"));
///
/// let item = store.get("name").unwrap();
/// assert_eq!(item.value, Bytes::from("value"));
/// assert_eq!(item.cas_token, 1);
/// ```
pub struct Store {
    inner: RwLock<Inner>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().unwrap();
        f.debug_struct("Store")
            .field("items", &inner.items.len())
            .field("cas_token", &inner.cas_token)
            .finish()
    }
}

impl Store {
    /// Creates an empty store reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            clock,
        }
    }

    /// Removes `key` if its item is expired at the current clock reading.
    ///
    /// Called by every per-key operation before it touches the map.
    fn invalidate(&self, key: &str) {
        let now = self.clock.now();
        let mut inner = self.inner.write().unwrap();
        if let Some(item) = inner.items.get(key) {
            if item.is_expired(now) {
                inner.items.remove(key);
            }
        }
    }

    /// Returns a snapshot of the item under `key`, or `None` on a miss.
    ///
    /// Expired items are removed first, so a returned item is never expired
    /// at the time of retrieval.
    pub fn get(&self, key: &str) -> Option<Item> {
        self.invalidate(key);
        let inner = self.inner.read().unwrap();
        inner.items.get(key).cloned()
    }

    /// Unconditionally stores `value` under `key`, replacing any previous
    /// item.
    pub fn set(&self, key: &str, flags: u32, expiration: i32, value: Bytes) {
        self.invalidate(key);
        let created_at = self.clock.now();
        let mut inner = self.inner.write().unwrap();
        inner.cas_token += 1;
        let item = Item {
            value,
            flags,
            expiration,
            cas_token: inner.cas_token,
            created_at,
        };
        inner.items.insert(key.to_owned(), item);
    }

    /// Stores `value` only if `key` is absent. Returns whether it was stored.
    pub fn add(&self, key: &str, flags: u32, expiration: i32, value: Bytes) -> bool {
        self.invalidate(key);
        let created_at = self.clock.now();
        let mut inner = self.inner.write().unwrap();
        if inner.items.contains_key(key) {
            return false;
        }
        inner.cas_token += 1;
        let item = Item {
            value,
            flags,
            expiration,
            cas_token: inner.cas_token,
            created_at,
        };
        inner.items.insert(key.to_owned(), item);
        true
    }

    /// Stores `value` only if `key` is present. Returns whether it was
    /// stored.
    pub fn replace(&self, key: &str, flags: u32, expiration: i32, value: Bytes) -> bool {
        self.invalidate(key);
        let created_at = self.clock.now();
        let mut inner = self.inner.write().unwrap();
        if !inner.items.contains_key(key) {
            return false;
        }
        inner.cas_token += 1;
        let item = Item {
            value,
            flags,
            expiration,
            cas_token: inner.cas_token,
            created_at,
        };
        inner.items.insert(key.to_owned(), item);
        true
    }

    /// Appends `suffix` to the existing value. Flags, expiration and
    /// `created_at` are left untouched; the CAS token is bumped. Returns
    /// whether the key existed.
    pub fn append(&self, key: &str, suffix: &[u8]) -> bool {
        self.invalidate(key);
        let mut guard = self.inner.write().unwrap();
        let Inner { items, cas_token } = &mut *guard;
        let Some(item) = items.get_mut(key) else {
            return false;
        };
        *cas_token += 1;
        item.cas_token = *cas_token;
        let mut value = Vec::with_capacity(item.value.len() + suffix.len());
        value.extend_from_slice(&item.value);
        value.extend_from_slice(suffix);
        item.value = Bytes::from(value);
        true
    }

    /// Prepends `prefix` to the existing value. Same contract as
    /// [`Store::append`].
    pub fn prepend(&self, key: &str, prefix: &[u8]) -> bool {
        self.invalidate(key);
        let mut guard = self.inner.write().unwrap();
        let Inner { items, cas_token } = &mut *guard;
        let Some(item) = items.get_mut(key) else {
            return false;
        };
        *cas_token += 1;
        item.cas_token = *cas_token;
        let mut value = Vec::with_capacity(prefix.len() + item.value.len());
        value.extend_from_slice(prefix);
        value.extend_from_slice(&item.value);
        item.value = Bytes::from(value);
        true
    }

    /// Removes `key`. Returns whether it existed. Does not bump the CAS
    /// counter.
    pub fn delete(&self, key: &str) -> bool {
        self.invalidate(key);
        let mut inner = self.inner.write().unwrap();
        inner.items.remove(key).is_some()
    }

    /// Adds `delta` to the stored numeric value and returns the new value.
    ///
    /// A sum past `u64::MAX` wraps to 0. The stored value is rewritten as
    /// decimal ASCII and the CAS token is bumped.
    pub fn incr(&self, key: &str, delta: u64) -> Result<u64, IncrDecrError> {
        self.apply_numeric(key, |current| current.checked_add(delta).unwrap_or(0))
    }

    /// Subtracts `delta` from the stored numeric value and returns the new
    /// value, clamping at 0. Same contract as [`Store::incr`] otherwise.
    pub fn decr(&self, key: &str, delta: u64) -> Result<u64, IncrDecrError> {
        self.apply_numeric(key, |current| current.saturating_sub(delta))
    }

    fn apply_numeric(
        &self,
        key: &str,
        op: impl FnOnce(u64) -> u64,
    ) -> Result<u64, IncrDecrError> {
        self.invalidate(key);
        let mut guard = self.inner.write().unwrap();
        let Inner { items, cas_token } = &mut *guard;
        let item = items.get_mut(key).ok_or(IncrDecrError::NotFound)?;
        let current = parse_numeric(&item.value).ok_or(IncrDecrError::NonNumeric)?;
        *cas_token += 1;
        item.cas_token = *cas_token;
        let next = op(current);
        item.value = Bytes::from(next.to_string());
        Ok(next)
    }

    /// Overwrites the expiration of an existing item. Returns whether the
    /// key existed.
    ///
    /// `created_at` is not refreshed, so a relative TTL keeps counting from
    /// the original creation time; the CAS token is not bumped.
    pub fn touch(&self, key: &str, expiration: i32) -> bool {
        self.invalidate(key);
        let mut inner = self.inner.write().unwrap();
        match inner.items.get_mut(key) {
            Some(item) => {
                item.expiration = expiration;
                true
            }
            None => false,
        }
    }

    /// Empties the map. The CAS counter is bumped once and keeps counting
    /// from there.
    pub fn flush_all(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.cas_token += 1;
        inner.items.clear();
    }

    /// Replaces the item under `key` if its CAS token equals `token`.
    pub fn cas(
        &self,
        key: &str,
        flags: u32,
        expiration: i32,
        value: Bytes,
        token: u64,
    ) -> CasOutcome {
        self.invalidate(key);
        let created_at = self.clock.now();
        let mut inner = self.inner.write().unwrap();
        match inner.items.get(key) {
            None => return CasOutcome::NotFound,
            Some(prev) if prev.cas_token != token => return CasOutcome::Exists,
            Some(_) => {}
        }
        inner.cas_token += 1;
        let item = Item {
            value,
            flags,
            expiration,
            cas_token: inner.cas_token,
            created_at,
        };
        inner.items.insert(key.to_owned(), item);
        CasOutcome::Stored
    }

    /// Drops every item without bumping the CAS counter. Used on server
    /// close.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.items.clear();
    }

    /// Number of items currently in the map, expired or not.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().items.len()
    }

    /// Returns true if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parses a stored value as memcached's "numeric" type: an unsigned 64-bit
/// decimal integer with no sign, no whitespace and no leading `+`.
fn parse_numeric(value: &[u8]) -> Option<u64> {
    if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(value).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use std::time::Duration;

    fn mock_store() -> (Store, Arc<MockClock>) {
        let clock = Arc::new(MockClock::new());
        (Store::new(Arc::clone(&clock) as Arc<dyn Clock>), clock)
    }

    #[test]
    fn test_set_and_get() {
        let (store, _) = mock_store();

        store.set("key", 7, 0, Bytes::from("value"));

        let item = store.get("key").unwrap();
        assert_eq!(item.value, Bytes::from("value"));
        assert_eq!(item.flags, 7);
        assert_eq!(item.cas_token, 1);
    }

    #[test]
    fn test_get_miss() {
        let (store, _) = mock_store();
        assert!(store.get("nonexistent").is_none());
    }

    #[test]
    fn test_set_twice_bumps_cas_each_time() {
        let (store, _) = mock_store();

        store.set("key", 0, 0, Bytes::from("a"));
        assert_eq!(store.get("key").unwrap().cas_token, 1);

        store.set("key", 0, 0, Bytes::from("a"));
        assert_eq!(store.get("key").unwrap().cas_token, 2);
        assert_eq!(store.get("key").unwrap().value, Bytes::from("a"));
    }

    #[test]
    fn test_add_only_when_absent() {
        let (store, _) = mock_store();

        assert!(store.add("key", 0, 0, Bytes::from("a")));
        assert!(!store.add("key", 0, 0, Bytes::from("b")));
        assert_eq!(store.get("key").unwrap().value, Bytes::from("a"));
    }

    #[test]
    fn test_add_succeeds_after_expiry() {
        let (store, clock) = mock_store();

        store.set("key", 0, 2, Bytes::from("a"));
        clock.advance(Duration::from_secs(3));

        assert!(store.add("key", 0, 0, Bytes::from("b")));
        assert_eq!(store.get("key").unwrap().value, Bytes::from("b"));
    }

    #[test]
    fn test_replace_only_when_present() {
        let (store, _) = mock_store();

        assert!(!store.replace("key", 0, 0, Bytes::from("a")));
        store.set("key", 0, 0, Bytes::from("a"));
        assert!(store.replace("key", 3, 0, Bytes::from("b")));

        let item = store.get("key").unwrap();
        assert_eq!(item.value, Bytes::from("b"));
        assert_eq!(item.flags, 3);
        assert_eq!(item.cas_token, 2);
    }

    #[test]
    fn test_replace_fails_on_expired_item() {
        let (store, clock) = mock_store();

        store.set("key", 0, 2, Bytes::from("a"));
        clock.advance(Duration::from_secs(3));

        assert!(!store.replace("key", 0, 0, Bytes::from("b")));
        assert!(store.get("key").is_none());
    }

    #[test]
    fn test_append_and_prepend() {
        let (store, _) = mock_store();

        store.set("key", 0, 0, Bytes::from("value"));
        assert!(store.append("key", b"End"));
        assert_eq!(store.get("key").unwrap().value, Bytes::from("valueEnd"));

        assert!(store.prepend("key", b"Pre_"));
        let item = store.get("key").unwrap();
        assert_eq!(item.value, Bytes::from("Pre_valueEnd"));
        assert_eq!(item.cas_token, 3);
    }

    #[test]
    fn test_append_prepend_miss() {
        let (store, _) = mock_store();
        assert!(!store.append("key", b"x"));
        assert!(!store.prepend("key", b"x"));
    }

    #[test]
    fn test_delete() {
        let (store, _) = mock_store();

        store.set("key", 0, 0, Bytes::from("value"));
        assert!(store.delete("key"));
        assert!(store.get("key").is_none());
        assert!(!store.delete("key"));
    }

    #[test]
    fn test_delete_does_not_bump_cas() {
        let (store, _) = mock_store();

        store.set("a", 0, 0, Bytes::from("1"));
        store.delete("a");
        store.set("b", 0, 0, Bytes::from("2"));

        assert_eq!(store.get("b").unwrap().cas_token, 2);
    }

    #[test]
    fn test_incr() {
        let (store, _) = mock_store();

        store.set("n", 0, 0, Bytes::from("26"));
        assert_eq!(store.incr("n", 10), Ok(36));
        assert_eq!(store.get("n").unwrap().value, Bytes::from("36"));
    }

    #[test]
    fn test_incr_overflow_wraps_to_zero() {
        let (store, _) = mock_store();

        store.set("n", 0, 0, Bytes::from("1"));
        assert_eq!(store.incr("n", u64::MAX), Ok(0));
        assert_eq!(store.get("n").unwrap().value, Bytes::from("0"));
    }

    #[test]
    fn test_decr_clamps_at_zero() {
        let (store, _) = mock_store();

        store.set("n", 0, 0, Bytes::from("30"));
        assert_eq!(store.decr("n", 100), Ok(0));
        assert_eq!(store.get("n").unwrap().value, Bytes::from("0"));
    }

    #[test]
    fn test_incr_decr_errors() {
        let (store, _) = mock_store();

        assert_eq!(store.incr("missing", 1), Err(IncrDecrError::NotFound));
        assert_eq!(store.decr("missing", 1), Err(IncrDecrError::NotFound));

        store.set("text", 0, 0, Bytes::from("hello"));
        assert_eq!(store.incr("text", 1), Err(IncrDecrError::NonNumeric));
        assert_eq!(store.decr("text", 1), Err(IncrDecrError::NonNumeric));
    }

    #[test]
    fn test_incr_rejects_signed_and_padded_values() {
        let (store, _) = mock_store();

        store.set("plus", 0, 0, Bytes::from("+5"));
        assert_eq!(store.incr("plus", 1), Err(IncrDecrError::NonNumeric));

        store.set("spaced", 0, 0, Bytes::from(" 5"));
        assert_eq!(store.incr("spaced", 1), Err(IncrDecrError::NonNumeric));
    }

    #[test]
    fn test_incr_decr_bump_cas() {
        let (store, _) = mock_store();

        store.set("n", 0, 0, Bytes::from("1"));
        store.incr("n", 1).unwrap();
        store.decr("n", 1).unwrap();

        assert_eq!(store.get("n").unwrap().cas_token, 3);
    }

    #[test]
    fn test_touch_overwrites_expiration_only() {
        let (store, clock) = mock_store();

        store.set("key", 0, 2, Bytes::from("v"));
        assert!(store.touch("key", 60));

        // Survives the original deadline under the new TTL, with the same
        // CAS token.
        clock.advance(Duration::from_secs(3));
        let item = store.get("key").unwrap();
        assert_eq!(item.cas_token, 1);

        // The TTL window still counts from the original created_at.
        clock.advance(Duration::from_secs(57));
        assert!(store.get("key").is_none());
    }

    #[test]
    fn test_touch_miss() {
        let (store, _) = mock_store();
        assert!(!store.touch("missing", 60));
    }

    #[test]
    fn test_flush_all_empties_and_bumps_cas() {
        let (store, _) = mock_store();

        store.set("a", 0, 0, Bytes::from("1"));
        store.set("b", 0, 0, Bytes::from("2"));
        store.flush_all();

        assert!(store.is_empty());
        assert!(store.get("a").is_none());

        // set after flush_all sees the bumped counter.
        store.set("c", 0, 0, Bytes::from("3"));
        assert_eq!(store.get("c").unwrap().cas_token, 4);
    }

    #[test]
    fn test_cas_outcomes() {
        let (store, _) = mock_store();

        assert_eq!(
            store.cas("key", 0, 0, Bytes::from("x"), 1),
            CasOutcome::NotFound
        );

        store.set("key", 0, 0, Bytes::from("a"));
        let token = store.get("key").unwrap().cas_token;

        assert_eq!(
            store.cas("key", 0, 0, Bytes::from("b"), token + 1),
            CasOutcome::Exists
        );
        assert_eq!(store.get("key").unwrap().value, Bytes::from("a"));

        assert_eq!(
            store.cas("key", 0, 0, Bytes::from("b"), token),
            CasOutcome::Stored
        );
        let item = store.get("key").unwrap();
        assert_eq!(item.value, Bytes::from("b"));
        assert_eq!(item.cas_token, token + 1);
    }

    #[test]
    fn test_cas_invalidated_by_interleaved_replace() {
        let (store, _) = mock_store();

        store.set("key", 0, 0, Bytes::from("a"));
        let stale = store.get("key").unwrap().cas_token;
        store.replace("key", 0, 0, Bytes::from("b"));

        assert_eq!(
            store.cas("key", 0, 0, Bytes::from("c"), stale),
            CasOutcome::Exists
        );
        assert_eq!(store.get("key").unwrap().value, Bytes::from("b"));
    }

    #[test]
    fn test_relative_ttl_expiry() {
        let (store, clock) = mock_store();

        store.set("key", 0, 2, Bytes::from("x"));
        assert!(store.get("key").is_some());

        clock.advance(Duration::from_secs(3));
        assert!(store.get("key").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_absolute_ttl_expiry() {
        let (store, clock) = mock_store();

        let deadline = clock.now() + 5;
        assert!(deadline > i64::from(crate::store::item::RELATIVE_TTL_CUTOFF));

        store.set("key", 0, deadline as i32, Bytes::from("x"));
        clock.advance(Duration::from_secs(4));
        assert!(store.get("key").is_some());

        clock.advance(Duration::from_secs(2));
        assert!(store.get("key").is_none());
    }

    #[test]
    fn test_negative_expiration_is_an_immediate_miss() {
        let (store, _) = mock_store();

        store.set("key", 0, -1, Bytes::from("x"));
        assert!(store.get("key").is_none());
    }

    #[test]
    fn test_concurrent_cas_single_winner() {
        use std::thread;

        let clock = Arc::new(MockClock::new());
        let store = Arc::new(Store::new(clock as Arc<dyn Clock>));
        store.set("key", 0, 0, Bytes::from("base"));
        let token = store.get("key").unwrap().cas_token;

        let mut handles = vec![];
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                store.cas("key", 0, 0, Bytes::from(format!("w{}", i)), token)
            }));
        }

        let outcomes: Vec<CasOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = outcomes
            .iter()
            .filter(|o| **o == CasOutcome::Stored)
            .count();
        let conflicts = outcomes
            .iter()
            .filter(|o| **o == CasOutcome::Exists)
            .count();

        assert_eq!(wins, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(store.get("key").unwrap().cas_token, token + 1);
    }

    #[test]
    fn test_concurrent_writers_produce_distinct_tokens() {
        use std::collections::HashSet;
        use std::thread;

        let clock = Arc::new(MockClock::new());
        let store = Arc::new(Store::new(clock as Arc<dyn Clock>));

        let mut handles = vec![];
        for t in 0..4 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    store.set(&format!("key-{}-{}", t, i), 0, 0, Bytes::from("v"));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 200);
        let mut tokens = HashSet::new();
        for t in 0..4 {
            for i in 0..50 {
                let item = store.get(&format!("key-{}-{}", t, i)).unwrap();
                assert!(tokens.insert(item.cas_token));
            }
        }
    }
}
