//! Application layer: the coordination state of a connection.
//!
//! - **`correlation`** – matches replies to pending commands by nonce and
//!   gates `login` on the READY dispatch.
//! - **`event_hub`** – broadcasts every frame to independent subscribers.
//!
//! Nothing here touches a socket; the reader loop in `infrastructure` drives
//! both pieces.

pub mod correlation;
pub mod event_hub;
