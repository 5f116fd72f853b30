//! Command Execution Module
//!
//! This module implements the per-command semantics of the supported
//! memcached text protocol subset. It receives parsed commands from the
//! protocol framer, runs the validation gates (key legality, declared vs
//! actual data block length), mutates the shared store, and selects the
//! exact response token.
//!
//! ## Supported commands
//!
//! - Retrieval: `get`, `gets`
//! - Storage: `set`, `add`, `replace`, `append`, `prepend`, `cas`
//! - Mutation: `incr`, `decr`, `touch`, `delete`
//! - Maintenance: `flush_all`, `version`

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
