use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reuses the caller's `X-Request-Id` or mints one, exposes it to handlers
/// through the request headers and echoes it on the response.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let id = match incoming(req.headers()) {
        Some(id) => id,
        None => {
            let id = mint();
            if let Ok(v) = HeaderValue::from_str(&id) {
                req.headers_mut().insert(REQUEST_ID_HEADER, v);
            }
            id
        }
    };

    let mut res = next.run(req).await;
    if let Ok(v) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, v);
    }
    res
}

/// Request id as seen by a handler; `"-"` when absent.
pub fn of(headers: &HeaderMap) -> String {
    incoming(headers).unwrap_or_else(|| "-".to_string())
}

fn incoming(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn mint() -> String {
    let nanos = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros() * 1000);
    format!("req-{nanos}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_header_is_ignored() {
        let mut h = HeaderMap::new();
        h.insert(REQUEST_ID_HEADER, HeaderValue::from_static("  "));
        assert_eq!(of(&h), "-");
        h.insert(REQUEST_ID_HEADER, HeaderValue::from_static("abc"));
        assert_eq!(of(&h), "abc");
    }

    #[test]
    fn minted_ids_are_prefixed() {
        assert!(mint().starts_with("req-"));
    }
}
