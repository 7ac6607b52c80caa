//! Per-request context and sequential chain execution.
//!
//! A [`Context`] is created for every matched request and threaded by
//! mutable reference through the middleware chain, ending at the route
//! handler. It carries the four pieces of per-request state the chain shares:
//!
//! | State | Access during the chain | After the chain |
//! |---|---|---|
//! | request | read | read |
//! | response (status, headers, body) | read / write | read |
//! | error list | append | read |
//! | string-keyed store | read / write | read |
//!
//! Execution is strictly sequential within one request's task: [`next`]
//! runs the remaining chain entries in registration order, and an entry that
//! awaits [`next`] itself wraps everything after it. No locks anywhere —
//! exactly one logical thread of control ever touches a given `Context`.
//!
//! [`next`]: Context::next

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;

use crate::error::BoxError;
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// The per-request execution context.
///
/// See the [module docs](self) for the state it carries and the execution
/// model. Middleware receives `&mut Context`; route handlers receive a clone
/// of the [`Request`] and return a [`Response`] that is written back here.
pub struct Context {
    request: Request,
    response: Response,
    store: HashMap<String, Box<dyn Any + Send + Sync>>,
    errors: Vec<BoxError>,
    chain: Vec<Arc<dyn Middleware>>,
    index: usize,
    aborted: bool,
}

impl Context {
    pub(crate) fn new(request: Request, chain: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            request,
            response: Response::status(StatusCode::OK),
            store: HashMap::new(),
            errors: Vec::new(),
            chain,
            index: 0,
            aborted: false,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    // ── Response state ────────────────────────────────────────────────────────

    /// The response status as it currently stands. Downstream handlers may
    /// still change it until the chain finishes.
    pub fn status(&self) -> StatusCode {
        self.response.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.status = status;
    }

    /// Replace the response under construction. This is what the router does
    /// with a route handler's return value; middleware may use it too.
    pub fn set_response(&mut self, response: impl IntoResponse) {
        self.response = response.into_response();
    }

    pub(crate) fn into_response(self) -> Response {
        self.response
    }

    // ── Error list ────────────────────────────────────────────────────────────

    /// Append an error to the request's error list.
    ///
    /// Errors do not short-circuit anything by themselves; they are collected
    /// in insertion order for post-chain processing (see
    /// [`ErrorLogger`](crate::middleware::ErrorLogger)). `&str` and `String`
    /// convert directly:
    ///
    /// ```rust,ignore
    /// ctx.error("user not found");
    /// ctx.error(io_err);
    /// ```
    pub fn error(&mut self, err: impl Into<BoxError>) {
        self.errors.push(err.into());
    }

    /// Errors accumulated so far, in insertion order.
    pub fn errors(&self) -> &[BoxError] {
        &self.errors
    }

    // ── String-keyed store ────────────────────────────────────────────────────

    /// Store a value under `key` for the remainder of the request.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.store.insert(key.into(), Box::new(value));
    }

    /// Fetch a previously stored value, downcast to `T`. Returns `None` when
    /// the key is absent *or* holds a different type; callers that must tell
    /// those cases apart use [`get_any`](Context::get_any).
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.store.get(key).and_then(|v| v.downcast_ref())
    }

    /// Fetch a stored value without downcasting.
    pub fn get_any(&self, key: &str) -> Option<&(dyn Any + Send + Sync)> {
        self.store.get(key).map(Box::as_ref)
    }

    // ── Chain execution ───────────────────────────────────────────────────────

    /// Run the remaining chain entries in order.
    ///
    /// Middleware that wants to wrap the rest of the chain awaits this and
    /// then continues with its own post-processing. Middleware that returns
    /// without calling it does not stop the chain — the outer loop keeps
    /// advancing. Only [`abort`](Context::abort) and friends do that.
    pub async fn next(&mut self) {
        while self.index < self.chain.len() {
            let entry = Arc::clone(&self.chain[self.index]);
            self.index += 1;
            entry.handle(self).await;
        }
    }

    /// Skip every chain entry that has not run yet.
    ///
    /// Entries already on the stack (those that awaited [`next`]) still get
    /// to finish their post-processing.
    pub fn abort(&mut self) {
        self.index = self.chain.len();
        self.aborted = true;
    }

    /// [`abort`](Context::abort) and set the response status.
    pub fn abort_with_status(&mut self, status: StatusCode) {
        self.abort();
        self.set_status(status);
    }

    /// [`abort`](Context::abort), set the response status, record `err` in
    /// the error list, and write its message as a `text/plain` body so the
    /// client sees it.
    pub fn abort_with_error(&mut self, status: StatusCode, err: impl Into<BoxError>) {
        let err = err.into();
        self.abort();
        let message = err.to_string();
        self.errors.push(err);
        let mut response = Response::text(message);
        response.status = status;
        self.response = response;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub(crate) async fn run(mut self) -> Response {
        self.next().await;
        self.response
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;

    use super::*;
    use crate::handler::BoxFuture;

    fn request(path: &str) -> Request {
        http::Request::builder()
            .uri(path)
            .body(Bytes::new())
            .unwrap()
            .into()
    }

    /// Appends its position to a shared log, then optionally aborts.
    struct Step {
        log: Arc<Mutex<Vec<usize>>>,
        position: usize,
        abort: bool,
    }

    impl Middleware for Step {
        fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a> {
            Box::pin(async move {
                self.log.lock().unwrap().push(self.position);
                if self.abort {
                    ctx.abort_with_status(StatusCode::FORBIDDEN);
                }
            })
        }
    }

    fn step(log: &Arc<Mutex<Vec<usize>>>, position: usize, abort: bool) -> Arc<dyn Middleware> {
        Arc::new(Step { log: Arc::clone(log), position, abort })
    }

    #[tokio::test]
    async fn next_runs_all_entries_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = vec![step(&log, 0, false), step(&log, 1, false), step(&log, 2, false)];
        let mut ctx = Context::new(request("/"), chain);
        ctx.next().await;
        assert_eq!(*log.lock().unwrap(), [0, 1, 2]);
        assert!(!ctx.is_aborted());
    }

    #[tokio::test]
    async fn abort_skips_remaining_entries() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = vec![step(&log, 0, false), step(&log, 1, true), step(&log, 2, false)];
        let mut ctx = Context::new(request("/"), chain);
        ctx.next().await;
        assert_eq!(*log.lock().unwrap(), [0, 1]);
        assert!(ctx.is_aborted());
        assert_eq!(ctx.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn abort_with_error_records_error_and_writes_body() {
        let mut ctx = Context::new(request("/"), Vec::new());
        ctx.abort_with_error(StatusCode::SERVICE_UNAVAILABLE, "db down");

        assert_eq!(ctx.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ctx.errors().len(), 1);
        assert_eq!(ctx.errors()[0].to_string(), "db down");
        let response = ctx.into_response();
        assert_eq!(response.body().as_ref(), b"db down");
    }

    #[test]
    fn store_roundtrips_typed_values() {
        let mut ctx = Context::new(request("/"), Vec::new());
        ctx.set("n", 7_u32);
        assert_eq!(ctx.get::<u32>("n"), Some(&7));
        // Wrong type reads as absent through the typed accessor...
        assert_eq!(ctx.get::<String>("n"), None);
        // ...but get_any still sees the entry.
        assert!(ctx.get_any("n").is_some());
        assert!(ctx.get_any("missing").is_none());
    }

    #[test]
    fn errors_keep_insertion_order() {
        let mut ctx = Context::new(request("/"), Vec::new());
        ctx.error("first");
        ctx.error("second");
        let messages: Vec<String> = ctx.errors().iter().map(|e| e.to_string()).collect();
        assert_eq!(messages, ["first", "second"]);
    }
}
