use std::future::Future;
use std::sync::Arc;

use lapse_crypto::SignatureAuthenticator;
use lapse_gate::AuthorizationGate;
use lapse_store::EphemeralStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// Lapse HTTP server.
pub struct LapseServer {
    config: ServerConfig,
    state: AppState,
}

impl LapseServer {
    /// Open the store and load the verification key.
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        let authenticator = Arc::new(SignatureAuthenticator::from_file(&config.public_key_path)?);
        let store = EphemeralStore::open(&config.store).await?;
        let gate = Arc::new(AuthorizationGate::new(authenticator, config.gate.clone()));

        let mut state = AppState::new(store, gate);
        state.public_base_url = config.public_base_url.clone();
        state.max_upload_bytes = config.max_upload_bytes;
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Serve on the configured address until SIGINT or SIGTERM.
    pub async fn serve(self) -> ServerResult<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight
    /// requests and stop background reclamation.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        let reload = CancellationToken::new();
        spawn_key_reloader(
            Arc::clone(self.state.gate.authenticator()),
            self.config.public_key_path.clone(),
            reload.clone(),
        );

        info!(%addr, storage = %self.config.store.root.display(), "lapse server listening");
        let result = axum::serve(listener, build_router(self.state.clone()))
            .with_graceful_shutdown(shutdown)
            .await;

        reload.cancel();
        self.state.store.shutdown().await;
        info!("lapse server stopped");
        result.map_err(ServerError::Io)
    }
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

/// Reload the public key from `path` on every `SIGHUP`. A failed reload
/// keeps the current key.
#[cfg(unix)]
fn spawn_key_reloader(
    authenticator: Arc<SignatureAuthenticator>,
    path: std::path::PathBuf,
    cancel: CancellationToken,
) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "SIGHUP key reload unavailable");
            return;
        }
    };
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = hangups.recv() => {
                    if received.is_none() {
                        break;
                    }
                    if let Err(e) = authenticator.reload_public_key(&path) {
                        tracing::warn!(path = %path.display(), error = %e, "public key reload failed, keeping current key");
                    }
                }
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_key_reloader(
    _authenticator: Arc<SignatureAuthenticator>,
    _path: std::path::PathBuf,
    _cancel: CancellationToken,
) {
}
