use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::GateError;

/// Header carrying the base64 request signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";
/// Header carrying the RFC 3339 request timestamp.
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";

// ---------------------------------------------------------------------------
// AuthState
// ---------------------------------------------------------------------------

/// States of the request authorization machine, in order.
///
/// A request starts at `Start` and advances one state per successful check.
/// Any failed check ends evaluation; the state reached so far is reported in
/// the [`Rejection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AuthState {
    Start,
    HeaderPresent,
    TimestampParsed,
    TimestampFresh,
    SignatureValid,
    Authorized,
}

impl AuthState {
    /// The state that follows this one, or `None` for `Authorized`.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::HeaderPresent),
            Self::HeaderPresent => Some(Self::TimestampParsed),
            Self::TimestampParsed => Some(Self::TimestampFresh),
            Self::TimestampFresh => Some(Self::SignatureValid),
            Self::SignatureValid => Some(Self::Authorized),
            Self::Authorized => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::HeaderPresent => "header-present",
            Self::TimestampParsed => "timestamp-parsed",
            Self::TimestampFresh => "timestamp-fresh",
            Self::SignatureValid => "signature-valid",
            Self::Authorized => "authorized",
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RequestParts
// ---------------------------------------------------------------------------

/// The parts of an inbound request the gate looks at.
///
/// Transport-agnostic: the HTTP layer copies the two auth headers and any
/// signed form fields in here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestParts {
    pub method: String,
    pub path: String,
    pub signature: Option<String>,
    pub timestamp: Option<String>,
    pub form: BTreeMap<String, String>,
}

impl RequestParts {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set both auth headers.
    pub fn with_auth(mut self, signature: impl Into<String>, timestamp: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Add a signed form field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// A request that passed every check.
#[derive(Clone, Debug)]
pub struct Authorization {
    /// Every state visited, `Start` through `Authorized`.
    pub trail: Vec<AuthState>,
    /// The parsed request timestamp.
    pub timestamp: DateTime<Utc>,
}

/// A request that failed a check.
#[derive(Debug)]
pub struct Rejection {
    /// The last state reached before the failing check.
    pub state: AuthState,
    /// Why the check failed.
    pub error: GateError,
}

impl Rejection {
    /// The only message that should reach the client, whatever the reason.
    pub fn public_message(&self) -> &'static str {
        "unauthorized"
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rejected after {}: {}", self.state, self.error)
    }
}

impl std::error::Error for Rejection {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
