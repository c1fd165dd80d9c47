//! Caller identity. Session/cookie termination happens at the fronting
//! gateway; by the time a request reaches this service the authenticated user
//! id is carried in `X-User-Id`.

use axum::http::HeaderMap;
use uuid::Uuid;

pub fn user_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get("x-user-id")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_valid_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-user-id",
            HeaderValue::from_static("550e8400-e29b-41d4-a716-446655440000"),
        );
        assert!(user_id_from_headers(&headers).is_some());
    }

    #[test]
    fn missing_or_malformed_header_is_none() {
        assert!(user_id_from_headers(&HeaderMap::new()).is_none());
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("not-a-uuid"));
        assert!(user_id_from_headers(&headers).is_none());
    }
}
