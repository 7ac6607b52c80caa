//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};

/// An incoming HTTP request.
///
/// The body is fully collected before dispatch and held as [`Bytes`].
/// Cloning a `Request` is cheap: `Bytes` is reference-counted and the header
/// map is small. That is what lets route handlers take the request by value
/// while the per-request [`Context`](crate::Context) keeps its own copy for
/// middleware running after them.
#[derive(Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    pub(crate) params: HashMap<String, String>,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
        params: HashMap<String, String>,
    ) -> Self {
        Self { method, uri, headers, body, params }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Header lookup by name. `HeaderMap` is case-insensitive already.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Build a `Request` with the `http` crate's builder. This is the entry point
/// for in-process dispatch via [`Router::respond`](crate::Router::respond),
/// most useful in tests:
///
/// ```rust
/// use bytes::Bytes;
/// use hashi::Request;
///
/// let req: Request = http::Request::builder()
///     .method("GET")
///     .uri("/users/42")
///     .body(Bytes::new())
///     .unwrap()
///     .into();
/// assert_eq!(req.path(), "/users/42");
/// ```
impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts.method, parts.uri, parts.headers, body, HashMap::new())
    }
}
