//! HTTP server for Lapse.
//!
//! Serves the ephemeral store over HTTP: signed uploads and deletes,
//! unauthenticated downloads and metadata lookups. Expired objects answer
//! `410 Gone` until the reaper removes them.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult, ServerError, ServerResult};
pub use handler::UploadResponse;
pub use router::build_router;
pub use server::LapseServer;
pub use state::AppState;
