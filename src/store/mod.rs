//! Store Module
//!
//! The in-memory store shared by every connection: a flat `key -> Item` map
//! with a monotonic CAS counter and lazy TTL invalidation, all behind one
//! reader/writer lock.
//!
//! - [`item`]: the [`Item`] struct and its expiration semantics
//! - [`engine`]: the [`Store`] itself and its per-command operations
//!
//! ## Example
//!
//! ```
//! use mini_memcached::clock::SystemClock;
//! use mini_memcached::store::{CasOutcome, Store};
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let store = Store::new(Arc::new(SystemClock::new()));
//!
//! store.set("greeting", 0, 0, Bytes::from("hello"));
//! let token = store.get("greeting").unwrap().cas_token;
//!
//! let outcome = store.cas("greeting", 0, 0, Bytes::from("goodbye"), token);
//! assert_eq!(outcome, CasOutcome::Stored);
//! ```

pub mod engine;
pub mod item;

// Re-export commonly used types
pub use engine::{CasOutcome, IncrDecrError, Store};
pub use item::Item;
