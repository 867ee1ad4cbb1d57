//! discord-ipc-client library entry point.
//!
//! An async client for the local IPC socket exposed by the Discord desktop
//! application.
//!
//! # How a session works
//!
//! 1. [`Connection::open`] finds the endpoint (`discord-ipc-0` through
//!    `discord-ipc-9` in the runtime directory, or a named pipe on Windows)
//!    and spawns the reader task.
//! 2. [`Connection::login`] sends the HANDSHAKE frame and waits for the
//!    READY dispatch.
//! 3. [`Connection::send_command`] writes a command with a fresh nonce and
//!    waits for the reply carrying that nonce.  Commands may be in flight
//!    concurrently; replies are matched regardless of arrival order.
//! 4. [`Connection::subscribe`] yields every frame read off the socket,
//!    followed by [`IpcEvent::Close`] when the connection ends.
//!
//! ```no_run
//! use discord_ipc_client::{ClientConfig, Connection};
//! use discord_ipc_core::Command;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), discord_ipc_client::RpcError> {
//! let conn = Connection::open(&ClientConfig::default()).await?;
//! let ready = conn.login("123456789012345678").await?;
//! println!("logged in as {}", ready["user"]["username"]);
//!
//! let guilds = conn.send_command(Command::GetGuilds, json!({}), None).await?;
//! println!("{guilds}");
//! conn.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! The library only emits `tracing` events; installing a subscriber is up to
//! the application.

/// Application layer: correlation and event fan-out.
pub mod application;

/// Domain layer: configuration and event types.
pub mod domain;

/// Error type shared by every operation.
pub mod error;

/// Infrastructure layer: discovery, framing and the connection.
pub mod infrastructure;

pub use application::event_hub::Subscription;
pub use domain::config::{ClientConfig, ConfigError};
pub use domain::events::{IpcEvent, Packet, PacketBody};
pub use error::RpcError;
pub use infrastructure::connection::Connection;
pub use infrastructure::locator::SocketLocator;
