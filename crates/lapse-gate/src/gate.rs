use std::sync::Arc;

use chrono::{DateTime, Utc};
use lapse_crypto::SignatureAuthenticator;
use lapse_types::{Clock, SystemClock};
use tracing::debug;

use crate::canonical::CanonicalRequest;
use crate::config::GateConfig;
use crate::error::GateError;
use crate::state::{
    AuthState, Authorization, Rejection, RequestParts, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};

/// The request authorization gate.
///
/// Runs the checks in a fixed order and stops at the first failure:
/// both headers present, timestamp parses, timestamp is within the freshness
/// window, signature verifies over the canonical string. The cheap checks run
/// first so a stale or malformed request never costs an RSA operation.
///
/// There is no nonce tracking; the freshness window alone bounds replay.
pub struct AuthorizationGate {
    authenticator: Arc<SignatureAuthenticator>,
    clock: Arc<dyn Clock>,
    config: GateConfig,
}

impl AuthorizationGate {
    pub fn new(authenticator: Arc<SignatureAuthenticator>, config: GateConfig) -> Self {
        Self {
            authenticator,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Judge freshness against `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// The authenticator holding the verification key.
    pub fn authenticator(&self) -> &Arc<SignatureAuthenticator> {
        &self.authenticator
    }

    /// Decide whether `request` is authorized.
    pub fn authorize(&self, request: &RequestParts) -> Result<Authorization, Rejection> {
        let mut trail = vec![AuthState::Start];

        let result = self.walk(request, &mut trail);
        let state = trail.last().copied().unwrap_or(AuthState::Start);

        match result {
            Ok(timestamp) => Ok(Authorization { trail, timestamp }),
            Err(error) => {
                debug!(
                    method = %request.method,
                    path = %request.path,
                    state = %state,
                    reason = %error,
                    "request rejected"
                );
                Err(Rejection { state, error })
            }
        }
    }

    fn walk(
        &self,
        request: &RequestParts,
        trail: &mut Vec<AuthState>,
    ) -> Result<DateTime<Utc>, GateError> {
        // Start -> HeaderPresent
        let signature = required_header(request.signature.as_deref(), SIGNATURE_HEADER)?;
        let raw_timestamp = required_header(request.timestamp.as_deref(), TIMESTAMP_HEADER)?;
        trail.push(AuthState::HeaderPresent);

        // HeaderPresent -> TimestampParsed
        let timestamp = DateTime::parse_from_rfc3339(raw_timestamp)
            .map_err(|_| GateError::MalformedTimestamp(raw_timestamp.to_string()))?
            .with_timezone(&Utc);
        trail.push(AuthState::TimestampParsed);

        // TimestampParsed -> TimestampFresh
        self.check_freshness(timestamp)?;
        trail.push(AuthState::TimestampFresh);

        // TimestampFresh -> SignatureValid
        let canonical = CanonicalRequest::new(&request.method, &request.path, raw_timestamp)
            .with_form(request.form.clone());
        self.authenticator
            .verify_str(&canonical.render(), signature)?;
        trail.push(AuthState::SignatureValid);

        trail.push(AuthState::Authorized);
        Ok(timestamp)
    }

    /// Accept iff `|now - timestamp| <= tolerance`.
    fn check_freshness(&self, timestamp: DateTime<Utc>) -> Result<(), GateError> {
        let skew = self.clock.now().signed_duration_since(timestamp);
        let magnitude = if skew < chrono::Duration::zero() { -skew } else { skew };
        let too_far = magnitude
            .to_std()
            .map_or(true, |m| m > self.config.tolerance);
        if too_far {
            return Err(GateError::TimestampOutOfRange {
                skew_secs: skew.num_seconds(),
                tolerance_secs: self.config.tolerance.as_secs(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("authenticator", &self.authenticator)
            .field("config", &self.config)
            .finish()
    }
}

fn required_header<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, GateError> {
    match value.map(str::trim) {
        None => Err(GateError::MissingHeader(name)),
        Some("") => Err(GateError::MalformedHeader(name)),
        Some(v) => Ok(v),
    }
}
