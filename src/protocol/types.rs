//! Memcached ASCII Protocol Types
//!
//! This module defines the parsed request ([`Command`]) and the wire response
//! ([`Response`]) for the supported subset of the memcached text protocol.
//!
//! ## Wire format
//!
//! Requests are single lines terminated by CRLF; storage commands are
//! followed by a length-prefixed data block and its own CRLF:
//!
//! ```text
//! set <key> <flags> <exptime> <bytes>\r\n<data>\r\n
//! cas <key> <flags> <exptime> <bytes> <cas token>\r\n<data>\r\n
//! gets <key1> <key2> ...\r\n
//! incr <key> <delta>\r\n
//! ```
//!
//! Every response also ends with CRLF. A retrieval response is a `VALUE`
//! line per hit, each followed by its data block, then a final `END`:
//!
//! ```text
//! VALUE <key> <flags> <bytes> <cas token>\r\n<data>\r\nEND\r\n
//! ```

use bytes::Bytes;
use std::fmt;

/// The CRLF line terminator.
pub const CRLF: &[u8] = b"\r\n";

/// A fully parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `get <key1> <key2> ...`
    Get { keys: Vec<String> },
    /// `gets <key1> <key2> ...`
    Gets { keys: Vec<String> },
    /// `set <key> <flags> <exptime> <bytes>` plus data block
    Set(StorePayload),
    /// `add <key> <flags> <exptime> <bytes>` plus data block
    Add(StorePayload),
    /// `replace <key> <flags> <exptime> <bytes>` plus data block
    Replace(StorePayload),
    /// `append <key> <flags> <exptime> <bytes>` plus data block; flags and
    /// exptime are carried on the wire but never used
    Append(ConcatPayload),
    /// `prepend <key> <flags> <exptime> <bytes>` plus data block; flags and
    /// exptime are carried on the wire but never used
    Prepend(ConcatPayload),
    /// `cas <key> <flags> <exptime> <bytes> <cas token>` plus data block
    Cas {
        payload: StorePayload,
        cas_token: u64,
    },
    /// `delete <key>`
    Delete { key: String },
    /// `incr <key> <delta>`
    Incr { key: String, delta: u64 },
    /// `decr <key> <delta>`
    Decr { key: String, delta: u64 },
    /// `touch <key> <exptime>`
    Touch { key: String, exptime: i32 },
    /// `flush_all`
    FlushAll,
    /// `version`
    Version,
}

/// Arguments of a storage command that carries flags and an expiration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePayload {
    pub key: String,
    pub flags: u32,
    pub exptime: i32,
    /// The byte count the client declared on the command line. The executor
    /// rejects the command when this differs from `data.len()`.
    pub declared_len: usize,
    /// The data block as read off the wire.
    pub data: Bytes,
}

/// Arguments of `append`/`prepend`, which only concatenate bytes onto an
/// existing item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatPayload {
    pub key: String,
    pub declared_len: usize,
    pub data: Bytes,
}

/// The `CLIENT_ERROR` taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientError {
    /// Illegal key, or a non-numeric CAS token.
    BadCommandLineFormat,
    /// Declared byte count differs from the actual data block length.
    BadDataChunk,
    /// `incr`/`decr` against a value that is not an unsigned 64-bit decimal.
    NonNumericValue,
    /// `incr`/`decr` delta that is not an unsigned 64-bit decimal.
    InvalidDelta,
    /// `touch` exptime that is not a 32-bit integer.
    InvalidExptime,
}

impl ClientError {
    /// The full response line for this error.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            ClientError::BadCommandLineFormat => b"CLIENT_ERROR bad command line format\r\n",
            ClientError::BadDataChunk => b"CLIENT_ERROR bad data chunk\r\n",
            ClientError::NonNumericValue => {
                b"CLIENT_ERROR cannot increment or decrement non-numeric value\r\n"
            }
            ClientError::InvalidDelta => b"CLIENT_ERROR invalid numeric delta argument\r\n",
            ClientError::InvalidExptime => b"CLIENT_ERROR invalid exptime argument\r\n",
        }
    }
}

/// One `VALUE` line of a retrieval response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueEntry {
    pub key: String,
    pub flags: u32,
    pub cas_token: u64,
    pub data: Bytes,
}

/// A response ready to be serialized onto the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `STORED`
    Stored,
    /// `NOT_STORED`
    NotStored,
    /// `EXISTS`
    Exists,
    /// `NOT_FOUND`
    NotFound,
    /// `DELETED`
    Deleted,
    /// `TOUCHED`
    Touched,
    /// `OK`
    Ok,
    /// `ERROR` - unknown command, wrong arity, or an un-parseable numeric
    /// field in a storage line
    Error,
    /// One of the `CLIENT_ERROR` lines
    ClientError(ClientError),
    /// `VALUE` lines followed by `END`
    Values(Vec<ValueEntry>),
    /// The new value after `incr`/`decr`
    Number(u64),
    /// `VERSION mini-memcached <version>`
    Version,
}

impl Response {
    /// Serializes the response to wire bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the response into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Response::Stored => buf.extend_from_slice(b"STORED\r\n"),
            Response::NotStored => buf.extend_from_slice(b"NOT_STORED\r\n"),
            Response::Exists => buf.extend_from_slice(b"EXISTS\r\n"),
            Response::NotFound => buf.extend_from_slice(b"NOT_FOUND\r\n"),
            Response::Deleted => buf.extend_from_slice(b"DELETED\r\n"),
            Response::Touched => buf.extend_from_slice(b"TOUCHED\r\n"),
            Response::Ok => buf.extend_from_slice(b"OK\r\n"),
            Response::Error => buf.extend_from_slice(b"ERROR\r\n"),
            Response::ClientError(e) => buf.extend_from_slice(e.as_bytes()),
            Response::Values(values) => {
                for value in values {
                    buf.extend_from_slice(
                        format!(
                            "VALUE {} {} {} {}\r\n",
                            value.key,
                            value.flags,
                            value.data.len(),
                            value.cas_token
                        )
                        .as_bytes(),
                    );
                    buf.extend_from_slice(&value.data);
                    buf.extend_from_slice(CRLF);
                }
                buf.extend_from_slice(b"END\r\n");
            }
            Response::Number(n) => {
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Response::Version => {
                buf.extend_from_slice(
                    format!("VERSION mini-memcached {}\r\n", crate::VERSION).as_bytes(),
                );
            }
        }
    }

    /// Returns true if this response is `ERROR` or a `CLIENT_ERROR`.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error | Response::ClientError(_))
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.serialize()))
    }
}
