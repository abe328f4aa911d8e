//! # BizTask API Server
//!
//! JSON and SSE API for the BizTask business task manager.
//!
//! ## Startup
//!
//! 1. Load configuration from the environment (`.env` is honoured)
//! 2. Pick the store: in-memory, `DATABASE_URL`, or the saved settings file;
//!    without any of them the server starts in setup mode
//! 3. Enable dictation when `GEMINI_API_KEY` is set
//! 4. Serve until Ctrl+C
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=$(openssl rand -hex 32) cargo run -p biztask-api
//! ```

use biztask_api::{app, config::Config, store};
use biztask_shared::dictation::GeminiTranscriber;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "biztask_api=debug,tower_http=debug".into());

    // JSON lines in production, human-readable otherwise
    if config.api.production {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        "BizTask API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let mut state = app::AppState::new(config.clone());

    if let Some(gateway) = store::initial_gateway(&config, &state.settings).await {
        state = state.with_gateway(gateway);
    }

    match &config.dictation.api_key {
        Some(key) => {
            let transcriber = GeminiTranscriber::new(key.clone(), config.dictation.model.clone())?;
            tracing::info!(model = transcriber.model(), "Voice dictation enabled");
            state = state.with_transcriber(Arc::new(transcriber));
        }
        None => tracing::warn!("GEMINI_API_KEY not set, voice dictation disabled"),
    }

    let router = app::build_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, exiting...");
}
