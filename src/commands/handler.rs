//! Command Executor
//!
//! This module turns parsed [`Command`]s into store mutations and selects
//! the exact response bytes the memcached text protocol requires.
//!
//! ## Validation gates
//!
//! Every command validates its key before touching the store: a key longer
//! than 250 bytes, or containing a byte at or below `0x20` (space and
//! control characters) or `0x7f` (DEL), answers
//! `CLIENT_ERROR bad command line format`. The one exception is `append`,
//! which answers a bare `ERROR` on an illegal key while every sibling
//! command (including `prepend`) answers the CLIENT_ERROR line.
//!
//! Storage commands additionally require the declared byte count to match
//! the actual data block length; a mismatch answers
//! `CLIENT_ERROR bad data chunk`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  parse_command  │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - validate     │
//! │  - dispatch     │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │      Store      │  (store module)
//! └─────────────────┘
//! ```

use crate::protocol::types::{
    ClientError, Command, ConcatPayload, Response, StorePayload, ValueEntry,
};
use crate::store::{CasOutcome, IncrDecrError, Store};
use std::sync::Arc;

/// Keys longer than this are illegal.
pub(crate) const MAX_KEY_LENGTH: usize = 250;

/// Executes commands against the shared store.
#[derive(Clone)]
pub struct CommandHandler {
    store: Arc<Store>,
}

impl CommandHandler {
    /// Creates a handler over the given store.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Executes one command and returns the response to send.
    pub fn execute(&self, command: Command) -> Response {
        match command {
            Command::Get { keys } | Command::Gets { keys } => self.retrieve(&keys),
            Command::Set(payload) => self.set(payload),
            Command::Add(payload) => self.add(payload),
            Command::Replace(payload) => self.replace(payload),
            Command::Append(payload) => self.append(payload),
            Command::Prepend(payload) => self.prepend(payload),
            Command::Cas { payload, cas_token } => self.cas(payload, cas_token),
            Command::Delete { key } => self.delete(&key),
            Command::Incr { key, delta } => self.incr_decr(&key, delta, true),
            Command::Decr { key, delta } => self.incr_decr(&key, delta, false),
            Command::Touch { key, exptime } => self.touch(&key, exptime),
            Command::FlushAll => {
                self.store.flush_all();
                Response::Ok
            }
            Command::Version => Response::Version,
        }
    }

    /// `get`/`gets`: one `VALUE` line per hit, then `END`. An illegal key
    /// anywhere in the batch aborts the whole request.
    fn retrieve(&self, keys: &[String]) -> Response {
        for key in keys {
            if !is_legal_key(key) {
                return Response::ClientError(ClientError::BadCommandLineFormat);
            }
        }

        let mut values = Vec::new();
        for key in keys {
            if let Some(item) = self.store.get(key) {
                values.push(ValueEntry {
                    key: key.clone(),
                    flags: item.flags,
                    cas_token: item.cas_token,
                    data: item.value,
                });
            }
        }
        Response::Values(values)
    }

    fn set(&self, payload: StorePayload) -> Response {
        if !is_legal_key(&payload.key) {
            return Response::ClientError(ClientError::BadCommandLineFormat);
        }
        if payload.data.len() != payload.declared_len {
            return Response::ClientError(ClientError::BadDataChunk);
        }
        self.store
            .set(&payload.key, payload.flags, payload.exptime, payload.data);
        Response::Stored
    }

    fn add(&self, payload: StorePayload) -> Response {
        if !is_legal_key(&payload.key) {
            return Response::ClientError(ClientError::BadCommandLineFormat);
        }
        if payload.data.len() != payload.declared_len {
            return Response::ClientError(ClientError::BadDataChunk);
        }
        if self
            .store
            .add(&payload.key, payload.flags, payload.exptime, payload.data)
        {
            Response::Stored
        } else {
            Response::NotStored
        }
    }

    fn replace(&self, payload: StorePayload) -> Response {
        if !is_legal_key(&payload.key) {
            return Response::ClientError(ClientError::BadCommandLineFormat);
        }
        if payload.data.len() != payload.declared_len {
            return Response::ClientError(ClientError::BadDataChunk);
        }
        if self
            .store
            .replace(&payload.key, payload.flags, payload.exptime, payload.data)
        {
            Response::Stored
        } else {
            Response::NotStored
        }
    }

    fn append(&self, payload: ConcatPayload) -> Response {
        if !is_legal_key(&payload.key) {
            // Historical asymmetry: append alone answers a bare ERROR here.
            return Response::Error;
        }
        if payload.data.len() != payload.declared_len {
            return Response::ClientError(ClientError::BadDataChunk);
        }
        if self.store.append(&payload.key, &payload.data) {
            Response::Stored
        } else {
            Response::NotStored
        }
    }

    fn prepend(&self, payload: ConcatPayload) -> Response {
        if !is_legal_key(&payload.key) {
            return Response::ClientError(ClientError::BadCommandLineFormat);
        }
        if payload.data.len() != payload.declared_len {
            return Response::ClientError(ClientError::BadDataChunk);
        }
        if self.store.prepend(&payload.key, &payload.data) {
            Response::Stored
        } else {
            Response::NotStored
        }
    }

    fn cas(&self, payload: StorePayload, cas_token: u64) -> Response {
        if !is_legal_key(&payload.key) {
            return Response::ClientError(ClientError::BadCommandLineFormat);
        }
        if payload.data.len() != payload.declared_len {
            return Response::ClientError(ClientError::BadDataChunk);
        }
        match self.store.cas(
            &payload.key,
            payload.flags,
            payload.exptime,
            payload.data,
            cas_token,
        ) {
            CasOutcome::Stored => Response::Stored,
            CasOutcome::NotFound => Response::NotFound,
            CasOutcome::Exists => Response::Exists,
        }
    }

    fn delete(&self, key: &str) -> Response {
        if !is_legal_key(key) {
            return Response::ClientError(ClientError::BadCommandLineFormat);
        }
        if self.store.delete(key) {
            Response::Deleted
        } else {
            Response::NotFound
        }
    }

    fn incr_decr(&self, key: &str, delta: u64, increment: bool) -> Response {
        if !is_legal_key(key) {
            return Response::ClientError(ClientError::BadCommandLineFormat);
        }
        let result = if increment {
            self.store.incr(key, delta)
        } else {
            self.store.decr(key, delta)
        };
        match result {
            Ok(value) => Response::Number(value),
            Err(IncrDecrError::NotFound) => Response::NotFound,
            Err(IncrDecrError::NonNumeric) => {
                Response::ClientError(ClientError::NonNumericValue)
            }
        }
    }

    fn touch(&self, key: &str, exptime: i32) -> Response {
        if !is_legal_key(key) {
            return Response::ClientError(ClientError::BadCommandLineFormat);
        }
        if self.store.touch(key, exptime) {
            Response::Touched
        } else {
            Response::NotFound
        }
    }
}

/// A legal key is at most 250 bytes and contains no byte at or below space
/// and no DEL.
fn is_legal_key(key: &str) -> bool {
    if key.len() > MAX_KEY_LENGTH {
        return false;
    }
    key.bytes().all(|b| b > b' ' && b != 0x7f)
}
