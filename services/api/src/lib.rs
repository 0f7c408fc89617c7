//! Duologue API Library Crate
//!
//! Configuration, application state, the HTTP boundary, and the WebSocket
//! presentation endpoint. The binaries are thin wrappers around this library.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod ws;
