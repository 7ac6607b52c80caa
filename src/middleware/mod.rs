//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: platform-context bridging, panic recovery,
//! severity-routed error logging, request-id injection, and
//! authentication-header inspection.
//!
//! A middleware is any type implementing [`Middleware`]: it receives the
//! per-request [`Context`] by mutable reference and a boxed future ties its
//! work to that borrow. The chain model is sequential (see
//! [`Context::next`]): an entry that awaits `ctx.next()` wraps everything
//! registered after it, an entry that just returns lets the chain keep
//! advancing on its own.
//!
//! Free functions work directly through [`from_fn`]:
//!
//! ```rust,no_run
//! use hashi::{BoxFuture, Context, Router, middleware::from_fn};
//!
//! fn stamp<'a>(ctx: &'a mut Context) -> BoxFuture<'a> {
//!     Box::pin(async move {
//!         ctx.set("request.start", std::time::Instant::now());
//!         ctx.next().await;
//!     })
//! }
//!
//! let app = Router::new().layer(from_fn(stamp));
//! ```
//!
//! Built-in middleware:
//! - [`ErrorLogger`] — panic recovery + status-severity error routing into a
//!   [`Platform`](crate::platform::Platform) log sink

mod logger;

pub use logger::ErrorLogger;

use crate::context::Context;
use crate::handler::BoxFuture;

/// A unit of the per-request handler chain.
///
/// Implement this on a struct when the middleware carries state (see
/// [`ErrorLogger`] for the canonical example), or wrap a free function with
/// [`from_fn`]. The boxed return type is what makes the trait usable as
/// `dyn Middleware` — the same erasure trade the router makes for handlers.
pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a>;
}

/// Wrap a free function as a [`Middleware`].
///
/// The function signature is `fn(&mut Context) -> BoxFuture<'_>`, written
/// out in full:
///
/// ```rust
/// use hashi::{BoxFuture, Context};
///
/// fn my_middleware<'a>(ctx: &'a mut Context) -> BoxFuture<'a> {
///     Box::pin(async move {
///         ctx.next().await;
///     })
/// }
/// ```
///
/// Plain `fn` items satisfy the higher-ranked bound; closures that capture
/// state generally do not infer it, so stateful middleware should implement
/// [`Middleware`] directly instead.
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a> + Send + Sync + 'static,
{
    FromFn(f)
}

/// A [`Middleware`] built from a free function. Obtain via [`from_fn`].
pub struct FromFn<F>(F);

impl<F> Middleware for FromFn<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a> + Send + Sync + 'static,
{
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a> {
        (self.0)(ctx)
    }
}
