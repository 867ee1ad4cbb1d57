//! Domain layer: plain data with no I/O.
//!
//! - **`config`** – [`ClientConfig`](config::ClientConfig), the socket
//!   discovery settings, loadable from TOML.
//! - **`events`** – items delivered on the event stream.

pub mod config;
pub mod events;
