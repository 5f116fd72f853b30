//! ASCII Protocol Implementation
//!
//! This module implements the wire side of the memcached text protocol:
//! the request/response types and the incremental framer that carves
//! commands (and their inline data blocks) out of a TCP byte stream.
//!
//! ## Modules
//!
//! - `types`: the [`Command`] and [`Response`] enums and response
//!   serialization
//! - `parser`: the incremental framer with its
//!   `Some((parsed, consumed))` / `None` contract
//!
//! ## Example
//!
//! ```
//! use mini_memcached::protocol::{parse_command, ParsedCommand, Command};
//!
//! let buf = b"gets foo\r\n";
//! let (parsed, consumed) = parse_command(buf).unwrap();
//! assert_eq!(consumed, buf.len());
//! assert_eq!(
//!     parsed,
//!     ParsedCommand::Dispatch(Command::Gets { keys: vec!["foo".to_string()] })
//! );
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_command, ParsedCommand};
pub use types::{ClientError, Command, ConcatPayload, Response, StorePayload, ValueEntry};
