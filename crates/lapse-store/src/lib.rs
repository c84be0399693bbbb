//! Time-limited object storage for Lapse.
//!
//! Every stored object carries an expiry. Once `now >= expires_at` the object
//! is unreadable, and it is physically removed either on the next read or by
//! the background reaper, whichever comes first.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectBackend`] trait:
//!
//! - [`FsBackend`] -- `metadata/<id>.json` plus `files/<id>` under a root directory
//! - [`InMemoryBackend`] -- `HashMap`-based backend for tests and embedding
//!
//! # Design Rules
//!
//! 1. Identifiers are generated by the store, never taken from callers.
//! 2. Content is written before metadata; an object becomes visible only when
//!    its metadata exists.
//! 3. Metadata is removed before content.
//! 4. Deletion is idempotent.
//! 5. A failed create leaves no blob behind.

pub mod backend;
pub mod config;
pub mod error;
pub mod fs;
pub mod memory;
pub mod reaper;
pub mod store;

pub use backend::ObjectBackend;
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use fs::FsBackend;
pub use memory::InMemoryBackend;
pub use reaper::SweepReport;
pub use store::{EphemeralStore, StoreBuilder};
