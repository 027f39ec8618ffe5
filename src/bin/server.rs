//! Roundtable HTTP server binary.
//!
//! Starts an axum server exposing the discussion engine: lifecycle
//! commands, transcript/strategy/goal state, and the WebSocket observer
//! stream.
//!
//! # Environment Variables
//!
//! - `PORT` — HTTP port (default: 8080)
//! - `ROUNDTABLE_DATA_DIR` — durable state directory (default: ./data)
//! - `ROUNDTABLE_MODEL` — Gemini model name
//! - `ROUNDTABLE_MAX_ROUNDS` — round cap per session (default: 10)
//! - `GOOGLE_API_KEY` / `GEMINI_API_KEY` — generation capability key
//! - `RUST_LOG` — tracing filter (default: "info")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! ```

use std::sync::Arc;

use anyhow::Context;

use roundtable::config::{self, Config};
use roundtable::hub::BroadcastHub;
use roundtable::lifecycle::DiscussionController;
use roundtable::llm::GeminiGenerator;
use roundtable::server::{app_router, AppState};
use roundtable::transcript::TranscriptStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,roundtable=debug".into()),
        )
        .init();

    let cfg = Config::from_env();
    let bind_addr = format!("0.0.0.0:{}", cfg.port);

    let store = Arc::new(
        TranscriptStore::open(&cfg.data_dir)
            .with_context(|| format!("opening store at {}", cfg.data_dir.display()))?,
    );
    let hub = Arc::new(BroadcastHub::new(store.clone()));
    let generator = Arc::new(GeminiGenerator::new(cfg.model.clone(), None));
    let registry = Arc::new(config::build_registry(generator));
    let controller = Arc::new(DiscussionController::new(
        store.clone(),
        hub.clone(),
        registry,
        cfg.max_rounds,
    ));

    let app = app_router(AppState {
        controller,
        store,
        hub,
    });

    tracing::info!("roundtable server starting on {}", bind_addr);
    tracing::info!("model: {}", cfg.model);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health             — liveness probe");
    tracing::info!("  POST /discussion/start   — start a discussion");
    tracing::info!("  POST /discussion/stop    — stop the discussion");
    tracing::info!("  GET  /discussion/status  — lifecycle status");
    tracing::info!("  GET  /transcript         — full history");
    tracing::info!("  POST /transcript/clear   — purge history");
    tracing::info!("  GET/PUT /strategy, /goal — shared state");
    tracing::info!("  GET  /ws                 — live observer stream");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown signal received");
    }
}
