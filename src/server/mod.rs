//! HTTP/WebSocket surface over the discussion engine.
//!
//! The core is transport-agnostic; everything here is a thin adapter that
//! maps requests onto the lifecycle controller, the transcript store, and
//! the broadcast hub.
//!
//! # Endpoints
//!
//! - `GET  /health`            — Liveness probe
//! - `POST /discussion/start`  — Start a discussion session
//! - `POST /discussion/stop`   — Request a cooperative stop
//! - `GET  /discussion/status` — Lifecycle status
//! - `GET  /transcript`        — Full transcript history
//! - `POST /transcript/clear`  — Purge the transcript (rejected while running)
//! - `GET/PUT /strategy`       — Read / replace the strategy document
//! - `GET/PUT /goal`           — Read / replace the goal text
//! - `GET  /ws`                — WebSocket observer stream

pub mod routes;
pub mod ws;

pub use routes::{app_router, AppState};
