//! # Request Context
//!
//! Per-request collaborator handed to adapted handlers.
//!
//! Exposes the request data the decode pipeline reads (path parameters,
//! query arguments, headers, client address, body) and the response
//! primitives the handler adapter writes through. The query string is
//! parsed on first access.

use crate::config::Config;
use crate::error::{BoxError, Error, Result};
use crate::json::{parse_json_bytes, to_json_vec};
use crate::source::{HeaderFields, ParamMap, Params, QueryArgs, QueryMap};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Response being assembled for the current request
#[derive(Debug)]
struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    written: bool,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            written: false,
        }
    }
}

/// Per-request context
#[derive(Debug)]
pub struct Context {
    method: Method,
    path: String,
    query_string: Option<String>,
    query: OnceLock<QueryMap>,
    headers: HeaderMap,
    params: ParamMap,
    remote_addr: Option<SocketAddr>,
    trust_proxy_headers: bool,
    body: Bytes,
    cancellation: CancellationToken,
    response: ResponseState,
}

impl Context {
    /// Create a context for `method` and a request target such as `/users?page=2`
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query_string) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (target.to_string(), None),
        };

        Self {
            method,
            path,
            query_string,
            query: OnceLock::new(),
            headers: HeaderMap::new(),
            params: ParamMap::new(),
            remote_addr: None,
            trust_proxy_headers: true,
            body: Bytes::new(),
            cancellation: CancellationToken::new(),
            response: ResponseState::default(),
        }
    }

    /// Build a context from a hyper request, collecting at most `config.max_body_size` bytes
    ///
    /// # Errors
    ///
    /// Returns `Error::PayloadTooLarge` when the body exceeds the limit and
    /// `Error::Body` when the body stream fails.
    pub async fn from_hyper<B>(req: Request<B>, remote_addr: SocketAddr, config: &Config) -> Result<Self>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let limit = config.max_body_size;
        let (parts, body) = req.into_parts();

        let declared = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > limit) {
            return Err(Error::PayloadTooLarge { limit });
        }

        let body = match Limited::new(body, limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return Err(Error::PayloadTooLarge { limit });
            }
            Err(e) => return Err(Error::Body(e)),
        };

        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query_string: parts.uri.query().map(String::from),
            query: OnceLock::new(),
            headers: parts.headers,
            params: ParamMap::new(),
            remote_addr: Some(remote_addr),
            trust_proxy_headers: config.trust_proxy_headers,
            body,
            cancellation: CancellationToken::new(),
            response: ResponseState::default(),
        })
    }

    /// Add a request header; invalid names or values are ignored
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(n, v);
        }
        self
    }

    /// Add a routed path parameter
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Set the request body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the peer address
    #[must_use]
    pub const fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Use a host-provided cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Trust or ignore proxy headers in [`Context::real_ip`]
    #[must_use]
    pub const fn with_trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    /// HTTP method
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Request path without the query string
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Query arguments, parsed on first access
    pub fn query(&self) -> &QueryMap {
        self.query
            .get_or_init(|| parse_query_string(self.query_string.as_deref()))
    }

    /// Request headers
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
    }

    /// Routed path parameters
    #[must_use]
    pub const fn params(&self) -> &ParamMap {
        &self.params
    }

    /// Get a path parameter, `""` when absent
    #[must_use]
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).map_or("", String::as_str)
    }

    /// Replace the routed path parameters
    pub fn set_params(&mut self, params: ParamMap) {
        self.params = params;
    }

    /// Peer address of the connection
    #[must_use]
    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Client IP address
    ///
    /// First `X-Forwarded-For` entry, then `X-Real-IP` (when proxy headers are
    /// trusted), then the peer address. Empty when none is known.
    #[must_use]
    pub fn real_ip(&self) -> String {
        if self.trust_proxy_headers {
            if let Some(forwarded) = self.header("x-forwarded-for").filter(|v| !v.is_empty()) {
                return forwarded.split(',').next().unwrap_or("").trim().to_string();
            }
            if let Some(real) = self.header("x-real-ip").filter(|v| !v.is_empty()) {
                return real.to_string();
            }
        }
        self.remote_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default()
    }

    /// Raw request body
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Whether the body phase applies: a non-empty body on a method that carries one
    #[must_use]
    pub fn carries_body(&self) -> bool {
        !self.body.is_empty() && self.method != Method::GET && self.method != Method::HEAD
    }

    /// Cancellation signal for this request
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Query argument source view
    #[must_use]
    pub fn query_source(&self) -> QueryArgs<'_> {
        QueryArgs(Some(self.query()))
    }

    /// Header source view
    #[must_use]
    pub const fn header_source(&self) -> HeaderFields<'_> {
        HeaderFields(Some(&self.headers))
    }

    /// Path parameter source view
    #[must_use]
    pub const fn path_source(&self) -> Params<'_> {
        Params(Some(&self.params))
    }

    /// Decode the body into `T`
    ///
    /// JSON is assumed when `Content-Type` is absent.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedMediaType` for non-JSON content types and
    /// `Error::InvalidBody` when parsing fails.
    pub fn read<T: DeserializeOwned>(&self) -> Result<T> {
        if let Some(content_type) = self.header(CONTENT_TYPE.as_str()) {
            let mime = content_type.split(';').next().unwrap_or("").trim();
            if !is_json(mime) {
                return Err(Error::UnsupportedMediaType {
                    content_type: content_type.to_string(),
                });
            }
        }
        let mut buf = self.body.to_vec();
        parse_json_bytes(&mut buf)
    }

    /// Current response status
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.response.status
    }

    /// Set the response status; ignored once output has been written
    pub fn set_status(&mut self, status: StatusCode) {
        if self.response.written {
            debug!(status = %status, "status change after write ignored");
            return;
        }
        self.response.status = status;
    }

    /// Response headers
    #[must_use]
    pub const fn response_headers(&self) -> &HeaderMap {
        &self.response.headers
    }

    /// Mutable response headers
    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response.headers
    }

    /// Serialize `value` as JSON and append it to the response body
    ///
    /// # Errors
    ///
    /// Returns `Error::Write` if serialization fails; nothing is appended then.
    pub fn write<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let bytes = to_json_vec(value)?;
        self.write_bytes(&bytes, JSON_CONTENT_TYPE);
        Ok(())
    }

    /// Append raw bytes to the response body, setting `Content-Type` if unset
    pub fn write_bytes(&mut self, bytes: &[u8], content_type: &'static str) {
        self.response
            .headers
            .entry(CONTENT_TYPE)
            .or_insert_with(|| HeaderValue::from_static(content_type));
        self.response.body.extend_from_slice(bytes);
        self.response.written = true;
    }

    /// Whether any output has been written
    #[must_use]
    pub const fn is_written(&self) -> bool {
        self.response.written
    }

    /// Response body written so far
    #[must_use]
    pub fn response_body(&self) -> &[u8] {
        &self.response.body
    }

    /// Convert the assembled response into a hyper response
    #[must_use]
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(self.response.body)));
        *response.status_mut() = self.response.status;
        *response.headers_mut() = self.response.headers;
        response
    }
}

fn is_json(mime: &str) -> bool {
    mime.eq_ignore_ascii_case(JSON_CONTENT_TYPE)
        || mime
            .rsplit_once('+')
            .is_some_and(|(_, suffix)| suffix.eq_ignore_ascii_case("json"))
}

/// Parse a query string into multi-valued arguments
///
/// Handles URL decoding; repeated keys keep every value in order.
fn parse_query_string(query: Option<&str>) -> QueryMap {
    let mut args = QueryMap::new();
    for pair in query.unwrap_or("").split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        args.entry(url_decode(key))
            .or_default()
            .push(url_decode(value));
    }
    args
}

/// Percent and `+` decoding; malformed escapes are kept verbatim
fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                if let Some(byte) = hex {
                    out.push(byte);
                    i += 2;
                } else {
                    out.push(b'%');
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Source;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        name: String,
    }

    #[test]
    fn test_parse_query_string_simple() {
        let result = parse_query_string(Some("page=1&limit=10"));
        assert_eq!(result.get("page"), Some(&vec!["1".to_string()]));
        assert_eq!(result.get("limit"), Some(&vec!["10".to_string()]));
    }

    #[test]
    fn test_parse_query_string_repeated_keys() {
        let result = parse_query_string(Some("tag=a&tag=b&flag"));
        assert_eq!(result.get("tag"), Some(&vec!["a".to_string(), "b".to_string()]));
        assert_eq!(result.get("flag"), Some(&vec![String::new()]));
    }

    #[test]
    fn test_parse_query_string_empty() {
        assert!(parse_query_string(None).is_empty());
        assert!(parse_query_string(Some("")).is_empty());
    }

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("hello+world"), "hello world");
        assert_eq!(url_decode("hello%20world"), "hello world");
        assert_eq!(url_decode("100%25"), "100%");
        assert_eq!(url_decode("caf%C3%A9"), "café");
        assert_eq!(url_decode("bad%zz"), "bad%zz");
        assert_eq!(url_decode("trail%"), "trail%");
    }

    #[test]
    fn test_new_splits_target() {
        let c = Context::new(Method::GET, "/users?page=2&page=3");
        assert_eq!(c.path(), "/users");
        assert_eq!(c.query_string(), Some("page=2&page=3"));
        assert_eq!(c.query_source().values("page"), vec!["2", "3"]);
    }

    #[test]
    fn test_real_ip_precedence() {
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let c = Context::new(Method::GET, "/").with_remote_addr(peer);
        assert_eq!(c.real_ip(), "10.0.0.9");

        let c = Context::new(Method::GET, "/")
            .with_remote_addr(peer)
            .with_header("X-Real-IP", "192.168.1.1");
        assert_eq!(c.real_ip(), "192.168.1.1");

        let c = Context::new(Method::GET, "/")
            .with_remote_addr(peer)
            .with_header("X-Real-IP", "192.168.1.1")
            .with_header("X-Forwarded-For", " 203.0.113.5 , 10.1.1.1");
        assert_eq!(c.real_ip(), "203.0.113.5");

        let c = c.with_trust_proxy_headers(false);
        assert_eq!(c.real_ip(), "10.0.0.9");

        assert_eq!(Context::new(Method::GET, "/").real_ip(), "");
    }

    #[test]
    fn test_carries_body() {
        assert!(!Context::new(Method::POST, "/").carries_body());
        assert!(Context::new(Method::POST, "/").with_body("{}").carries_body());
        assert!(!Context::new(Method::GET, "/").with_body("{}").carries_body());
        assert!(!Context::new(Method::HEAD, "/").with_body("{}").carries_body());
    }

    #[test]
    fn test_read_json() {
        let c = Context::new(Method::POST, "/")
            .with_header("Content-Type", "application/json; charset=utf-8")
            .with_body(r#"{"name":"mat"}"#);
        let p: Payload = c.read().unwrap();
        assert_eq!(p.name, "mat");

        let c = Context::new(Method::POST, "/").with_body(r#"{"name":"bare"}"#);
        assert_eq!(c.read::<Payload>().unwrap().name, "bare");

        let c = Context::new(Method::POST, "/")
            .with_header("Content-Type", "application/problem+json")
            .with_body(r#"{"name":"suffix"}"#);
        assert_eq!(c.read::<Payload>().unwrap().name, "suffix");
    }

    #[test]
    fn test_read_rejects_other_media_types() {
        let c = Context::new(Method::POST, "/")
            .with_header("Content-Type", "text/plain")
            .with_body("name=mat");
        assert!(matches!(
            c.read::<Payload>(),
            Err(Error::UnsupportedMediaType { .. })
        ));
    }

    #[test]
    fn test_write_sets_content_type_and_body() {
        let mut c = Context::new(Method::GET, "/");
        c.write(&vec![1, 2, 3]).unwrap();
        assert!(c.is_written());
        assert_eq!(c.response_body(), b"[1,2,3]");
        assert_eq!(
            c.response_headers().get(CONTENT_TYPE).unwrap(),
            JSON_CONTENT_TYPE
        );
    }

    #[test]
    fn test_status_locked_after_write() {
        let mut c = Context::new(Method::GET, "/");
        c.set_status(StatusCode::CREATED);
        c.write("done").unwrap();
        c.set_status(StatusCode::ACCEPTED);
        assert_eq!(c.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_into_response() {
        let mut c = Context::new(Method::GET, "/");
        c.set_status(StatusCode::CREATED);
        c.response_headers_mut()
            .insert("x-created", HeaderValue::from_static("true"));
        c.write("ok").unwrap();
        let resp = c.into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(resp.headers().get("x-created").unwrap(), "true");
    }

    #[tokio::test]
    async fn test_from_hyper() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/items/7?q=rust")
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from_static(br#"{"name":"x"}"#)))
            .unwrap();
        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let c = Context::from_hyper(req, peer, &Config::default()).await.unwrap();
        assert_eq!(c.path(), "/items/7");
        assert_eq!(c.query_source().get("q"), "rust");
        assert_eq!(c.read::<Payload>().unwrap().name, "x");
        assert_eq!(c.real_ip(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_from_hyper_body_limit() {
        let config = Config::default().with_max_body_size(4);
        let req = Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(Full::new(Bytes::from_static(b"0123456789")))
            .unwrap();
        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let err = Context::from_hyper(req, peer, &config).await.unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { limit: 4 }));
    }
}
