//! Integration tests for the session gateway.
//!
//! - `harness.rs` - Mock backend, recording notifier and gateway wiring
//! - `refresh.rs` - Coordinated refresh and tier stickiness
//! - `retry.rs`   - Retry bound and failure classification
//! - `headers.rs` - Outbound headers, bodies and URLs
//! - `public.rs`  - Anonymous public API client
