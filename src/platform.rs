//! Platform context bridging.
//!
//! Hosting platforms hand out a per-request context object that their own
//! APIs (logging, storage, queues) require back. This module bridges that
//! world into the handler chain:
//!
//! - [`Platform`] is the seam: construct a context from a request, and log a
//!   message at a [`Severity`] against one. Implement it once per platform;
//!   inject it where needed. [`TracingPlatform`] is the built-in
//!   implementation backed by the `tracing` crate.
//! - [`platform_context`] derives the [`PlatformContext`] for a request
//!   lazily and memoizes it in the request's store, so every handler in the
//!   chain shares one handle and the platform constructor runs at most once
//!   per request.
//! - [`with_platform_context`] adapts a handler written against
//!   `(Context, PlatformContext)` into a plain [`Middleware`], performing
//!   the bridge transparently on every invocation.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::{error, warn};

use crate::context::Context;
use crate::handler::BoxFuture;
use crate::middleware::Middleware;
use crate::request::Request;

/// The store key under which the memoized [`PlatformContext`] lives.
///
/// Only [`platform_context`] writes this key. Anything else found under it is
/// a bug in the surrounding application, and the bridge panics rather than
/// constructing a shadow context.
pub const PLATFORM_CONTEXT_KEY: &str = "platform.context";

// ── Severity ──────────────────────────────────────────────────────────────────

/// Log importance levels understood by platform log sinks.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warning  => "warning",
            Self::Error    => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── PlatformContext ───────────────────────────────────────────────────────────

/// An opaque per-request handle recognized by platform APIs.
///
/// Constructed at most once per request by [`platform_context`]. Cloning is
/// a reference-count bump; every clone refers to the same underlying
/// context, which [`same`](PlatformContext::same) can verify.
#[derive(Clone)]
pub struct PlatformContext {
    inner: Arc<dyn Any + Send + Sync>,
}

impl PlatformContext {
    /// Wrap a platform's own context value into an opaque handle.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self { inner: Arc::new(value) }
    }

    /// Borrow the platform's context value back out.
    ///
    /// Returns `None` if the handle was created by a different platform
    /// implementation — receiving one is a wiring bug in the application.
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// Whether two handles refer to the same underlying context.
    pub fn same(&self, other: &PlatformContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for PlatformContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformContext").finish_non_exhaustive()
    }
}

// ── Platform ──────────────────────────────────────────────────────────────────

/// The two platform operations this crate consumes.
///
/// Logging is fire-and-forget: implementations must not fail, only degrade
/// (drop the message, write to stderr, etc.).
pub trait Platform: Send + Sync + 'static {
    /// Construct a fresh platform context for an incoming request.
    ///
    /// Called at most once per request, by [`platform_context`].
    fn new_context(&self, request: &Request) -> PlatformContext;

    /// Emit `message` at `severity` against the request's context.
    fn log(&self, ctx: &PlatformContext, severity: Severity, message: &str);
}

// ── Context bridge ────────────────────────────────────────────────────────────

/// Fetch the request's [`PlatformContext`], constructing and caching it on
/// first use.
///
/// The first call per request asks `platform` for a new context and stores
/// it under [`PLATFORM_CONTEXT_KEY`]; every later call in the same request
/// returns a clone of that handle without touching the platform again.
///
/// # Panics
///
/// Panics if the reserved key holds anything other than a
/// `PlatformContext`. Only this function writes the key, so a mismatch is a
/// type-confusion bug in the surrounding application and must surface during
/// development, not be papered over with a second construction.
pub fn platform_context(ctx: &mut Context, platform: &dyn Platform) -> PlatformContext {
    if let Some(value) = ctx.get_any(PLATFORM_CONTEXT_KEY) {
        return value
            .downcast_ref::<PlatformContext>()
            .unwrap_or_else(|| {
                panic!("store key `{PLATFORM_CONTEXT_KEY}` holds a foreign value")
            })
            .clone();
    }
    let platform_ctx = platform.new_context(ctx.request());
    ctx.set(PLATFORM_CONTEXT_KEY, platform_ctx.clone());
    platform_ctx
}

/// Adapt a platform-typed handler into a plain [`Middleware`].
///
/// `handler` is written against `(Context, PlatformContext)`; the returned
/// middleware performs the bridge before every invocation, so however many
/// adapted handlers a chain contains, the platform constructor still runs at
/// most once per request.
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use hashi::{BoxFuture, Context, Router};
/// use hashi::platform::{PlatformContext, TracingPlatform, with_platform_context};
///
/// fn audit<'a>(ctx: &'a mut Context, platform_ctx: PlatformContext) -> BoxFuture<'a> {
///     Box::pin(async move {
///         // platform_ctx is ready for platform API calls here
///         ctx.next().await;
///     })
/// }
///
/// let platform = Arc::new(TracingPlatform);
/// let app = Router::new().layer(with_platform_context(platform, audit));
/// ```
pub fn with_platform_context<F>(
    platform: Arc<dyn Platform>,
    handler: F,
) -> WithPlatformContext<F>
where
    F: for<'a> Fn(&'a mut Context, PlatformContext) -> BoxFuture<'a> + Send + Sync + 'static,
{
    WithPlatformContext { platform, handler }
}

/// The [`Middleware`] produced by [`with_platform_context`].
pub struct WithPlatformContext<F> {
    platform: Arc<dyn Platform>,
    handler: F,
}

impl<F> Middleware for WithPlatformContext<F>
where
    F: for<'a> Fn(&'a mut Context, PlatformContext) -> BoxFuture<'a> + Send + Sync + 'static,
{
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a> {
        Box::pin(async move {
            let platform_ctx = platform_context(ctx, &*self.platform);
            (self.handler)(ctx, platform_ctx).await
        })
    }
}

// ── TracingPlatform ───────────────────────────────────────────────────────────

/// A [`Platform`] backed by the [`tracing`] crate.
///
/// The context carries the request's method and path so every log line is
/// attributable without threading the request around. `tracing` has no level
/// above `error`, so [`Severity::Critical`] maps to an `error!` event tagged
/// `severity = "critical"` for filtering downstream.
pub struct TracingPlatform;

struct RequestMeta {
    method: http::Method,
    path: String,
}

impl Platform for TracingPlatform {
    fn new_context(&self, request: &Request) -> PlatformContext {
        PlatformContext::new(RequestMeta {
            method: request.method().clone(),
            path: request.path().to_owned(),
        })
    }

    fn log(&self, ctx: &PlatformContext, severity: Severity, message: &str) {
        let meta = ctx
            .downcast_ref::<RequestMeta>()
            .unwrap_or_else(|| panic!("platform context was not created by TracingPlatform"));
        match severity {
            Severity::Warning => {
                warn!(method = %meta.method, path = %meta.path, "{message}");
            }
            Severity::Error => {
                error!(method = %meta.method, path = %meta.path, "{message}");
            }
            Severity::Critical => {
                error!(method = %meta.method, path = %meta.path, severity = "critical", "{message}");
            }
        }
    }
}
