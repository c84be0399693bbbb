use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use lapse_gate::{RequestParts, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Copy what the gate needs out of an HTTP request. Header values that are
/// not valid UTF-8 count as missing.
pub fn request_parts(method: &str, path: &str, headers: &HeaderMap) -> RequestParts {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    RequestParts {
        signature: header(SIGNATURE_HEADER),
        timestamp: header(TIMESTAMP_HEADER),
        ..RequestParts::new(method, path)
    }
}

/// Middleware guarding mutating routes.
///
/// Every rejection is answered with the same 401 body; the specific reason
/// only goes to the log.
pub async fn require_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let parts = request_parts(
        request.method().as_str(),
        request.uri().path(),
        request.headers(),
    );
    match state.gate.authorize(&parts) {
        Ok(_) => next.run(request).await,
        Err(rejection) => {
            warn!(
                method = %parts.method,
                path = %parts.path,
                state = %rejection.state,
                reason = %rejection.error,
                "unauthorized request"
            );
            ApiError::Unauthorized.into_response()
        }
    }
}
