//! WebSocket Presentation Endpoint
//!
//! Each connection gets its own turn scheduler. It is structured into submodules:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the WebSocket connection lifecycle and bridges it to the scheduler.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
