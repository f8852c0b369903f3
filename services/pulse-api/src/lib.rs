//! GreenPulse API service library.
//!
//! - `config`: city roster and environment settings
//! - `state`: shared application state and update fan-out
//! - `poller`: background WAQI polling and aggregation
//! - `handlers`: HTTP, SSE, and WebSocket endpoints

pub mod config;
pub mod handlers;
pub mod poller;
pub mod state;
