use axum::{
    body::{Body, Bytes},
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::core::http::response_envelope::{ApiErrorDetail, ApiResponse};

/// Rejection bodies larger than this are cut; they are plain-text messages.
const MAX_REJECTION_BODY: usize = 64 * 1024;

/// Rewrites axum's plain-text extractor rejections (400/415/422) into the
/// JSON envelope. Responses that are already JSON pass through untouched.
pub async fn json_error_mapper(req: Request<Body>, next: Next) -> Response {
    let res = next.run(req).await;
    let status = res.status();

    let mapped = matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNSUPPORTED_MEDIA_TYPE | StatusCode::UNPROCESSABLE_ENTITY
    );
    if !mapped || is_json(&res) {
        return res;
    }

    let (mut parts, body) = res.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_REJECTION_BODY)
        .await
        .unwrap_or_else(|_| Bytes::new());
    let original = String::from_utf8_lossy(&bytes);
    debug!("api::json_error_mapper {status}: {}", original.trim());

    let code = match status {
        StatusCode::BAD_REQUEST => "BAD_REQUEST",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "UNSUPPORTED_MEDIA_TYPE",
        _ => "UNPROCESSABLE_ENTITY",
    };
    let envelope = ApiResponse::<()>::error(code, original.trim(), vec![detail_for(&original)]);

    let body = match serde_json::to_vec(&envelope) {
        Ok(v) => v,
        Err(_) => bytes.to_vec(),
    };
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(body))
}

fn is_json(res: &Response) -> bool {
    res.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

/// serde messages look like `documents[0]: missing field `raw_text` at line 1 column 40`.
fn detail_for(msg: &str) -> ApiErrorDetail {
    let segments: Vec<&str> = msg.split(": ").collect();
    let path = segments
        .len()
        .checked_sub(2)
        .map(|i| segments[i].trim())
        .filter(|p| !p.is_empty() && !p.contains(' '))
        .map(str::to_string);

    let hint = if msg.contains("missing field") {
        Some("A required field is missing from the JSON body.".to_string())
    } else if msg.contains("expected a sequence") {
        Some("Expected an array for this field, e.g. [{\"id\": \"…\"}].".to_string())
    } else if msg.contains("expected a map") || msg.contains("expected struct") {
        Some("Expected a JSON object here, e.g. { \"field\": \"value\" }.".to_string())
    } else if msg.contains("Content-Type") {
        Some("Send the body with `Content-Type: application/json`.".to_string())
    } else {
        None
    };

    ApiErrorDetail { path, hint }
}
