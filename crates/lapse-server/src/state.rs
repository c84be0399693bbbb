use std::sync::Arc;

use lapse_gate::AuthorizationGate;
use lapse_store::EphemeralStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: EphemeralStore,
    pub gate: Arc<AuthorizationGate>,
    /// Base for download links; `None` derives it from the `Host` header.
    pub public_base_url: Option<String>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(store: EphemeralStore, gate: Arc<AuthorizationGate>) -> Self {
        Self {
            store,
            gate,
            public_base_url: None,
            max_upload_bytes: 32 * 1024 * 1024,
        }
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into());
        self
    }
}
