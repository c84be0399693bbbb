//! Foundation types for Lapse, an ephemeral object store.
//!
//! Every other Lapse crate depends on `lapse-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`]: 128-bit random identifier rendered as 32 lowercase hex characters
//! - [`ObjectRecord`]: metadata persisted alongside every stored blob
//! - [`Clock`]: injectable wall clock ([`SystemClock`] in production,
//!   [`ManualClock`] for deterministic TTL tests)

pub mod clock;
pub mod error;
pub mod object;
pub mod record;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::TypeError;
pub use object::ObjectId;
pub use record::ObjectRecord;
