//! Socket-level tests for the live channel.
//!
//! - `harness.rs`    - Local WebSocket server and channel wiring
//! - `connection.rs` - Connect, disconnect and reconnect behavior
//! - `messaging.rs`  - Inbound dispatch, echo suppression, send and ping

mod messaging;
