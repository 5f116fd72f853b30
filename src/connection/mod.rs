//! Connection Handling Module
//!
//! Each accepted client connection runs in its own tokio task, which loops
//! over the shared accumulation buffer: frame a request, execute it, write
//! the response, read more bytes when the buffer runs dry.
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  TCP Listener                    │
//! │                  (server.rs)                     │
//! └──────────────────────┬───────────────────────────┘
//!                        │ accept()
//!                        ▼
//!            spawn one task per client
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────────┐
//! │               ConnectionHandler                  │
//! │                                                  │
//! │  read bytes -> frame command -> execute -> write │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Connections are independent: one slow or misbehaving client never blocks
//! another. The only per-connection state is the read buffer; commands carry
//! no session.

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler};
