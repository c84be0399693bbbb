use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::object::ObjectId;

/// Metadata for one stored object.
///
/// This is also the durable on-disk format: a JSON object with the fields
/// `id`, `name`, `size`, `content_type`, `upload_time` and `expires_at`
/// (timestamps in RFC 3339).
///
/// `name` is caller-supplied and untrusted. The store keeps it as an opaque
/// field and never uses it to build a path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Identifier assigned at creation. Never reassigned.
    pub id: ObjectId,
    /// Caller-supplied display name.
    pub name: String,
    /// Byte length of the content at creation time.
    pub size: u64,
    /// Caller-supplied MIME type, opaque to the store.
    pub content_type: String,
    /// Creation time.
    pub upload_time: DateTime<Utc>,
    /// `upload_time + ttl`.
    pub expires_at: DateTime<Utc>,
}

impl ObjectRecord {
    /// Build a record whose expiry is `upload_time + ttl`.
    ///
    /// Fails if the expiry is not representable.
    pub fn new(
        id: ObjectId,
        name: impl Into<String>,
        size: u64,
        content_type: impl Into<String>,
        upload_time: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, TypeError> {
        let expires_at = upload_time
            .checked_add_signed(ttl)
            .ok_or(TypeError::TtlOverflow)?;
        Ok(Self {
            id,
            name: name.into(),
            size,
            content_type: content_type.into(),
            upload_time,
            expires_at,
        })
    }

    /// Returns `true` once `now` has reached `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Time left before expiry, or zero if already expired.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    /// Encode as the on-disk JSON document.
    pub fn to_json(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Decode the on-disk JSON document.
    pub fn from_json(data: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(data).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
