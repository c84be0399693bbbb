use lapse_types::{ObjectId, TypeError};

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object with this identifier exists.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// The object exists but its expiry has passed.
    #[error("object expired: {0}")]
    Expired(ObjectId),

    /// The identifier is not a well-formed object id.
    #[error("invalid object id: {0}")]
    InvalidId(String),

    /// The requested time-to-live cannot be represented.
    #[error("invalid time-to-live: {0:?}")]
    InvalidTtl(std::time::Duration),

    /// A metadata document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Rejected store configuration.
    #[error("invalid store configuration: {0}")]
    Config(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` for [`StoreError::Expired`].
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired(_))
    }
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidObjectId { id, reason } => Self::InvalidId(format!("{id:?}: {reason}")),
            TypeError::Serialization(msg) => Self::Serialization(msg),
            TypeError::TtlOverflow => Self::Serialization("time-to-live overflow".into()),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
