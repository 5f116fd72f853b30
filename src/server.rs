//! Server Lifecycle
//!
//! This module ties the pieces together: it binds the TCP listener, runs the
//! accept loop on its own task, spawns one connection task per client, and
//! offers a handle with the embedding API (`run`, `port`, `close`).
//!
//! ```text
//! MiniMemcached::run(config)
//!        │
//!        ├── Store (shared, behind Arc)
//!        │
//!        └── accept task ──┬── connection task (client 1)
//!                          ├── connection task (client 2)
//!                          └── ...
//! ```
//!
//! `close()` stops the accept task (dropping the listener and freeing the
//! port) and clears the store. Connections already in flight drain and end
//! when their sockets close. `close()` is idempotent.

use crate::clock::{Clock, SystemClock};
use crate::commands::CommandHandler;
use crate::connection::handle_connection;
use crate::store::Store;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Verbosity of the tracing events the server emits.
///
/// This gates event emission before it reaches any subscriber, so an
/// embedding application keeps full control of its own log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    /// Emit nothing.
    Off,
    /// Emit server and connection lifecycle events.
    #[default]
    Info,
    /// Additionally emit every response sent back to a client.
    Debug,
}

/// Minimum attributes to run mini-memcached.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    /// The port to listen on. 0 binds an ephemeral port; read the assigned
    /// one back with [`MiniMemcached::port`].
    pub port: u16,
    /// How chatty the server should be.
    pub log_level: LogLevel,
}

/// Errors surfaced synchronously from [`MiniMemcached::run`].
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound (or its address read back).
    #[error("failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
}

/// A running mini-memcached server.
///
/// # Example
///
/// ```
/// use mini_memcached::{Config, MiniMemcached};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let server = MiniMemcached::run(Config::default()).await.unwrap();
/// assert_ne!(server.port(), 0);
/// server.close();
/// # }
/// ```
pub struct MiniMemcached {
    store: Arc<Store>,
    port: u16,
    log_level: LogLevel,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl MiniMemcached {
    /// Starts a server on `config.port` using the system clock.
    pub async fn run(config: Config) -> Result<Self, ServerError> {
        Self::run_with_clock(config, Arc::new(SystemClock::new())).await
    }

    /// Starts a server reading time from a custom [`Clock`].
    ///
    /// Inject a [`crate::clock::MockClock`] here to test expiry behavior
    /// without sleeping.
    pub async fn run_with_clock(
        config: Config,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(("127.0.0.1", config.port)).await?;
        let port = listener.local_addr()?.port();

        let store = Arc::new(Store::new(clock));
        let accept_store = Arc::clone(&store);
        let accept_task = tokio::spawn(accept_loop(listener, accept_store, config.log_level));

        if config.log_level >= LogLevel::Info {
            info!(port, "mini-memcached listening");
        }

        Ok(Self {
            store,
            port,
            log_level: config.log_level,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    /// The port the server actually bound. Useful with `config.port == 0`.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stops accepting connections and clears all stored items.
    ///
    /// Idempotent; calling it again is a no-op. Connections already
    /// established keep being served until their sockets close.
    pub fn close(&self) {
        let handle = self.accept_task.lock().unwrap().take();
        let Some(handle) = handle else {
            return;
        };
        handle.abort();
        self.store.clear();

        if self.log_level >= LogLevel::Info {
            info!("closed mini-memcached");
        }
    }
}

/// Accepts connections until the task is stopped, spawning one handler task
/// per client.
async fn accept_loop(listener: TcpListener, store: Arc<Store>, log_level: LogLevel) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let commands = CommandHandler::new(Arc::clone(&store));
                tokio::spawn(handle_connection(stream, addr, commands, log_level));
            }
            Err(e) => {
                if log_level >= LogLevel::Info {
                    error!(error = %e, "failed to accept connection");
                }
            }
        }
    }
}
