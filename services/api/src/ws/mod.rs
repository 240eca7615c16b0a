//! WebSocket Interview Sessions
//!
//! - `protocol`: the JSON message format for client-server communication.
//! - `session`: the connection lifecycle, from `init` to the final feedback frame.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
