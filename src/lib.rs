//! # mini-memcached - An Embeddable Memcached Test Double
//!
//! mini-memcached is an in-process implementation of the memcached text
//! ("ASCII") protocol, written in Rust. It is intended primarily as a test
//! double for applications that talk to a real memcached: start it on an
//! ephemeral port, point your client library at it, and get byte-identical
//! responses for the supported commands.
//!
//! ## Features
//!
//! - **Wire-compatible**: responses match a real memcached byte for byte
//! - **Embeddable**: a library with a three-call surface (run, port, close)
//! - **CAS support**: a monotonic 64-bit token ledger backs the `cas` command
//! - **Deterministic expiry**: inject a [`clock::MockClock`] and advance
//!   time by hand instead of sleeping in tests
//! - **Async I/O**: built on Tokio, one task per connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        mini-memcached                           │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐          │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │          │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │          │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘          │
//! │                            │                  │                 │
//! │                            ▼                  ▼                 │
//! │                     ┌─────────────┐    ┌─────────────┐          │
//! │                     │   ASCII     │    │    Store    │          │
//! │                     │   Framer    │    │ RwLock map  │          │
//! │                     └─────────────┘    │ CAS counter │          │
//! │                                        └──────┬──────┘          │
//! │                                               │                 │
//! │                                        ┌──────┴──────┐          │
//! │                                        │    Clock    │          │
//! │                                        └─────────────┘          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use mini_memcached::{Config, MiniMemcached};
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//! use tokio::net::TcpStream;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! // Port 0 binds an ephemeral port; read it back with port().
//! let server = MiniMemcached::run(Config::default()).await.unwrap();
//!
//! let mut client = TcpStream::connect(("127.0.0.1", server.port()))
//!     .await
//!     .unwrap();
//! client.write_all(b"set greeting 0 0 5\r\nhello\r\n").await.unwrap();
//!
//! let mut response = [0u8; 8];
//! client.read_exact(&mut response).await.unwrap();
//! assert_eq!(&response, b"STORED\r\n");
//!
//! server.close();
//! # }
//! ```
//!
//! ## Supported Commands
//!
//! - Retrieval: `get`, `gets` (both emit `VALUE <key> <flags> <bytes> <cas>`)
//! - Storage: `set`, `add`, `replace`, `append`, `prepend`, `cas`
//! - Mutation: `incr`, `decr`, `touch`, `delete`
//! - Maintenance: `flush_all`, `version`
//!
//! The binary protocol, UDP transport, SASL, eviction and the `stats`
//! command are out of scope; the store is a flat map without memory limits,
//! and keys only leave it via explicit commands or lazy TTL checks.
//!
//! ## Module Overview
//!
//! - [`server`]: lifecycle - bind, accept loop, close
//! - [`connection`]: per-client read-execute-respond task
//! - [`protocol`]: request/response types and the incremental framer
//! - [`commands`]: per-command semantics and validation gates
//! - [`store`]: the shared map, CAS counter and lazy expiry
//! - [`clock`]: injectable time source

pub mod clock;
pub mod commands;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod store;

// Re-export commonly used types for convenience
pub use clock::{Clock, MockClock, SystemClock};
pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionError, ConnectionHandler};
pub use protocol::{Command, Response};
pub use server::{Config, LogLevel, MiniMemcached, ServerError};
pub use store::{Item, Store};

/// Version of mini-memcached, reported by the `version` command.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
