use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use http_body_util::{BodyExt, Full};
use std::time::Instant;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// Per-request context, built once at the top of the pipeline and threaded
/// through every stage. The body is read exactly once up front (§3: "Body is
/// read at most once") so later stages — feature extraction, the
/// dispatcher's retry loop — reuse the same buffered bytes.
pub struct RequestContext {
    pub client_ip: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub api_key: Option<String>,
    pub client_id: Option<String>,
    pub start: Instant,
}

impl RequestContext {
    pub fn new(client_ip: String, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        let api_key = headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        Self {
            client_ip,
            method,
            uri,
            headers,
            body,
            api_key,
            client_id: None,
            start: Instant::now(),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get("user-agent").and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").and_then(|v| v.to_str().ok())
    }

    /// Body size counted for feature extraction: only meaningful for
    /// methods that carry a body (§4.3 point 6).
    pub fn body_size_for_features(&self) -> u64 {
        match self.method {
            Method::POST | Method::PUT | Method::PATCH => self.body.len() as u64,
            _ => 0,
        }
    }

    /// Rate-limit / analytics key: prefer the authenticated client id,
    /// falling back to the IP for whitelisted/unauthenticated flows.
    pub fn rate_limit_key(&self) -> &str {
        self.client_id.as_deref().unwrap_or(&self.client_ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn ctx() -> RequestContext {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("k1"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        RequestContext::new(
            "1.2.3.4".to_string(),
            Method::POST,
            "/foo?x=1".parse().unwrap(),
            headers,
            Bytes::from_static(b"{}"),
        )
    }

    #[test]
    fn test_extracts_api_key() {
        assert_eq!(ctx().api_key.as_deref(), Some("k1"));
    }

    #[test]
    fn test_path_excludes_query() {
        assert_eq!(ctx().path(), "/foo");
    }

    #[test]
    fn test_body_size_counted_for_post() {
        assert_eq!(ctx().body_size_for_features(), 2);
    }

    #[test]
    fn test_body_size_zero_for_get() {
        let mut c = ctx();
        c.method = Method::GET;
        assert_eq!(c.body_size_for_features(), 0);
    }

    #[test]
    fn test_rate_limit_key_prefers_client_id() {
        let mut c = ctx();
        assert_eq!(c.rate_limit_key(), "1.2.3.4");
        c.client_id = Some("c1".to_string());
        assert_eq!(c.rate_limit_key(), "c1");
    }
}
