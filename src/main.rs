//! PDF Preview Server
//!
//! Upload PDFs from the browser and watch their page previews appear.

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdf_preview_server::{create_app, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_preview_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting PDF Preview Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Artifacts directory: {}", config.storage.artifacts_dir.display());
    tracing::info!("Preview resolution: {} dpi", config.render.dpi);

    tokio::fs::create_dir_all(&config.storage.artifacts_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create artifacts directory {}",
                config.storage.artifacts_dir.display()
            )
        })?;

    let (app_state, shutdown) = AppState::new(config.clone());

    // Idle session cleanup
    match config.session_ttl() {
        Some(ttl) => {
            let store = app_state.store().clone();
            let every = config.sweep_interval();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                loop {
                    ticker.tick().await;
                    match store.sweep_expired(ttl).await {
                        Ok(removed) if !removed.is_empty() => {
                            tracing::info!("Removed {} expired sessions", removed.len());
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!("Session sweep failed: {}", e),
                    }
                }
            });
        }
        None => tracing::info!("Session sweeping disabled"),
    }

    let app = create_app(app_state);

    // Start server with graceful shutdown
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("PDF Preview Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Ends open event streams
            shutdown.trigger();
        })
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
