//! Infrastructure layer: sockets and tasks.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `discord_ipc_core`, but MUST NOT be imported by them.
//!
//! # Sub-modules
//!
//! - **`locator`** – probes `discord-ipc-0` through `discord-ipc-9` for the
//!   desktop application's endpoint.
//! - **`transport`** – reads and writes whole frames on a byte stream.
//! - **`reader`** – the single background task that reads, correlates and
//!   publishes every incoming frame.
//! - **`connection`** – the public handle tying the above together.

pub mod connection;
pub mod locator;
pub mod reader;
pub mod transport;
