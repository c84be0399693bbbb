use std::time::Duration;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use lapse_types::{ObjectId, ObjectRecord};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const DEFAULT_FILE_NAME: &str = "file";

/// RFC 3986 unreserved characters pass through; everything else is escaped.
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const X_FILE_NAME: HeaderName = HeaderName::from_static("x-file-name");
const X_UPLOAD_TIME: HeaderName = HeaderName::from_static("x-upload-time");
const X_EXPIRES_AT: HeaderName = HeaderName::from_static("x-expires-at");

/// Upload response: the stored record plus a link to fetch it.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub record: ObjectRecord,
    pub download_url: String,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /api/v1/upload`
///
/// Multipart fields: `file` (required) and `ttl` (optional, e.g. `30m`).
/// A `ttl` that does not parse is ignored and the default applies. Fields
/// may arrive in any order.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut file: Option<(String, String, Bytes)> = None;
    let mut ttl_field: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or(DEFAULT_FILE_NAME).to_string();
                let content_type = field.content_type().unwrap_or(DEFAULT_CONTENT_TYPE).to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(multipart_error)?;
                file = Some((name, content_type, data));
            }
            Some("ttl") => {
                ttl_field = Some(
                    field
                        .text()
                        .await
                        .map_err(multipart_error)?,
                );
            }
            _ => {}
        }
    }

    let (name, content_type, data) =
        file.ok_or_else(|| ApiError::BadRequest("file is required".into()))?;
    let ttl = ttl_field.as_deref().and_then(parse_ttl);

    let record = state
        .store
        .create_bytes(&data, &name, &content_type, ttl)
        .await?;
    info!(id = %record.id, size = record.size, expires_at = %record.expires_at, "file uploaded");

    let download_url = format!(
        "{}/api/v1/download/{}",
        base_url(&state, &headers),
        record.id
    );
    Ok(Json(UploadResponse {
        record,
        download_url,
    }))
}

/// `GET /api/v1/download/:id`
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    let (record, content) = state.store.get(&id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(&record.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
    );
    headers.insert(CONTENT_DISPOSITION, ascii_header(&content_disposition(&record.name)));
    headers.insert(X_FILE_NAME, ascii_header(&ascii_file_name(&record.name)));
    headers.insert(X_UPLOAD_TIME, ascii_header(&rfc3339(record.upload_time)));
    headers.insert(X_EXPIRES_AT, ascii_header(&rfc3339(record.expires_at)));

    Ok((headers, content).into_response())
}

/// `GET /api/v1/file/:id/metadata`
pub async fn metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ObjectRecord>> {
    let id = parse_id(&id)?;
    Ok(Json(state.store.get_metadata(&id).await?))
}

/// `DELETE /api/v1/file/:id`
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_id(&id)?;
    state.store.delete(&id).await?;
    info!(id = %id, "file deleted");
    Ok(Json(json!({ "message": "file deleted successfully" })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Keep the status the extractor assigned, so an over-limit body is 413.
fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

fn parse_id(raw: &str) -> ApiResult<ObjectId> {
    ObjectId::from_hex(raw).map_err(|_| ApiError::InvalidId)
}

/// Parse a human-readable TTL (`90s`, `30m`, `2h 30m`). Zero and garbage
/// yield `None`.
pub fn parse_ttl(raw: &str) -> Option<Duration> {
    humantime::parse_duration(raw.trim())
        .ok()
        .filter(|d| !d.is_zero())
}

fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(base) = &state.public_base_url {
        return base.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The display name reduced to printable ASCII with quotes and backslashes
/// replaced, safe inside a quoted header parameter.
fn ascii_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    if cleaned.trim().is_empty() {
        DEFAULT_FILE_NAME.to_string()
    } else {
        cleaned
    }
}

/// `attachment` with an ASCII fallback name and the exact UTF-8 name as
/// `filename*`.
fn content_disposition(name: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_file_name(name),
        utf8_percent_encode(name, FILENAME_ENCODE_SET)
    )
}

fn ascii_header(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_FILE_NAME))
}
