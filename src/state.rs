//! Application state management

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::Config;
use crate::render::RenderOptions;
use crate::store::ArtifactStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    store: ArtifactStore,
    shutdown: watch::Receiver<bool>,
}

/// Flips the server-wide shutdown signal
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Tell long-lived streams to finish
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl AppState {
    /// Create the application state and the handle that ends its event streams
    pub fn new(config: Config) -> (Self, ShutdownHandle) {
        let (tx, shutdown) = watch::channel(false);
        let store = ArtifactStore::new(config.storage.artifacts_dir.clone());

        let state = Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                shutdown,
            }),
        };

        (state, ShutdownHandle { tx })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the artifact store
    pub fn store(&self) -> &ArtifactStore {
        &self.inner.store
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            dpi: self.inner.config.render.dpi,
            timeout: self.inner.config.render_timeout(),
        }
    }

    /// A fresh receiver of the shutdown signal
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.clone()
    }
}
