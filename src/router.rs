//! Radix-tree request router and chain assembly.
//!
//! One tree per HTTP method. O(path-length) lookup. You register a path, you
//! get a handler. Middleware registered with [`Router::layer`] runs before
//! every matched route, in registration order; unmatched requests get a 404
//! without entering the chain.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::context::Context;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// One radix tree per HTTP method — O(path-length) lookup, no allocations on
/// the hot path. Build it once at startup; pass it to [`Server::serve`].
/// Each registration call returns `self` so the whole app chains naturally:
///
/// ```rust,no_run
/// # use hashi::{Request, Response, Router};
/// # async fn get_user(_: Request) -> Response { Response::text("") }
/// # async fn create_user(_: Request) -> Response { Response::text("") }
/// let app = Router::new()
///     .get("/users/{id}", get_user)
///     .post("/users", create_user);
/// ```
///
/// [`Server::serve`]: crate::Server::serve
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Arc<dyn Middleware>>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), middleware: Vec::new() }
    }

    /// Append a middleware to the chain. Middleware runs in registration
    /// order, before the route handler, for every matched request.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax — `req.param("name")` retrieves them.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(method, path, handler)
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.add(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.add(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.add(Method::PUT, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.add(Method::PATCH, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.add(Method::DELETE, path, handler)
    }

    fn add(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        let endpoint: Arc<dyn Middleware> = Arc::new(Endpoint(handler.into_boxed_handler()));
        self.routes
            .entry(method)
            .or_default()
            .insert(path, endpoint)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Dispatch one request through middleware and route handler, in-process.
    ///
    /// This is the whole request pipeline minus the network: the server calls
    /// it per request, and tests call it directly with a request built via
    /// `http::Request::builder()`.
    pub async fn respond(&self, request: impl Into<Request>) -> Response {
        let mut request: Request = request.into();

        let Some((endpoint, params)) = self.lookup(request.method(), request.path()) else {
            return Response::status(StatusCode::NOT_FOUND);
        };
        request.params = params;

        let mut chain = Vec::with_capacity(self.middleware.len() + 1);
        chain.extend(self.middleware.iter().cloned());
        chain.push(endpoint);

        Context::new(request, chain).run().await
    }

    fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(Arc<dyn Middleware>, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let endpoint = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((endpoint, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

// ── Endpoint adapter ──────────────────────────────────────────────────────────

/// The chain's tail: hands the route handler its own copy of the request and
/// writes the returned response into the context. Runs only if no earlier
/// middleware aborted.
struct Endpoint(BoxedHandler);

impl Middleware for Endpoint {
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a> {
        let fut = self.0.call(ctx.request().clone());
        Box::pin(async move {
            let response = fut.await;
            ctx.set_response(response);
        })
    }
}
