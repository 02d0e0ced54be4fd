//! Request ID propagation and per-request response logging.
//!
//! A caller-supplied `X-Request-Id` is reused when it is a short non-empty
//! token; otherwise a ULID is minted. Handlers run inside a `request` span
//! carrying the ID, and the ID is echoed back on the response.

use axum::extract::Request;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;
use tracing::Instrument;

static REQUEST_ID: &str = "x-request-id";
const MAX_INCOMING_LEN: usize = 128;

fn resolve_request_id(req: &Request) -> String {
    req.headers()
        .get(REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_INCOMING_LEN)
        .map(String::from)
        .unwrap_or_else(|| ulid::Ulid::new().to_string())
}

/// Successful lookups are debug noise; client mistakes are info; the rest warn.
fn log_response(method: &Method, path: &str, status: StatusCode, duration_ms: u64) {
    let status = status.as_u16();
    match status {
        0..=399 => tracing::debug!(%method, path, status, duration_ms, "Response"),
        400..=499 => tracing::info!(%method, path, status, duration_ms, "Response"),
        _ => tracing::warn!(%method, path, status, duration_ms, "Response"),
    }
}

/// `axum::middleware::from_fn` handler installed outermost on the router.
pub async fn request_id(req: Request, next: Next) -> Response {
    let req_id = resolve_request_id(&req);
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let span = tracing::info_span!("request", req_id = %req_id);
    let start = Instant::now();

    let mut response = next.run(req).instrument(span.clone()).await;

    span.in_scope(|| {
        log_response(
            &method,
            &path,
            response.status(),
            start.elapsed().as_millis() as u64,
        )
    });
    if let Ok(value) = HeaderValue::from_str(&req_id) {
        response.headers_mut().insert(REQUEST_ID, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::{Router, middleware};
    use tower::ServiceExt;

    fn request(header: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/ping");
        if let Some(value) = header {
            builder = builder.header(REQUEST_ID, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn reuses_incoming_id() {
        assert_eq!(resolve_request_id(&request(Some("abc-123"))), "abc-123");
    }

    #[test]
    fn generates_ulid_when_missing_or_oversized() {
        let generated = resolve_request_id(&request(None));
        assert!(generated.parse::<ulid::Ulid>().is_ok());

        let long = "x".repeat(MAX_INCOMING_LEN + 1);
        let replaced = resolve_request_id(&request(Some(&long)));
        assert_ne!(replaced, long);
    }

    #[tokio::test]
    async fn echoes_id_on_error_responses_too() {
        let router = Router::new()
            .route("/ping", get(|| async { StatusCode::NOT_FOUND }))
            .layer(middleware::from_fn(request_id));

        let response = router.oneshot(request(Some("req-7"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[REQUEST_ID], "req-7");
    }
}
