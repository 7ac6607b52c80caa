//! End-to-end middleware-chain behavior, driven through `Router::respond`
//! with a recording platform double.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use hashi::middleware::{ErrorLogger, from_fn};
use hashi::platform::{Platform, PlatformContext, Severity, with_platform_context};
use hashi::{BoxFuture, Context, Request, Response, Router, StatusCode};

/// Counts context constructions and records every log call, in order.
#[derive(Default)]
struct RecordingPlatform {
    constructed: AtomicUsize,
    logs: Mutex<Vec<(Severity, String)>>,
}

impl RecordingPlatform {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn constructions(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    fn logs(&self) -> Vec<(Severity, String)> {
        self.logs.lock().unwrap().clone()
    }
}

impl Platform for RecordingPlatform {
    fn new_context(&self, _request: &Request) -> PlatformContext {
        let n = self.constructed.fetch_add(1, Ordering::SeqCst);
        PlatformContext::new(n)
    }

    fn log(&self, _ctx: &PlatformContext, severity: Severity, message: &str) {
        self.logs.lock().unwrap().push((severity, message.to_owned()));
    }
}

fn get(path: &str) -> http::Request<Bytes> {
    http::Request::builder()
        .method("GET")
        .uri(path)
        .body(Bytes::new())
        .unwrap()
}

// ── Endpoints ─────────────────────────────────────────────────────────────────

async fn ok(_req: Request) -> Response {
    Response::text("fine")
}

async fn missing(_req: Request) -> Response {
    Response::builder().status(StatusCode::NOT_FOUND).text("gone")
}

async fn broken(_req: Request) -> Response {
    Response::status(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn boom(_req: Request) -> Response {
    panic!("boom");
}

// ── Chain middleware (free functions, wrapped with `from_fn`) ─────────────────

fn record_not_found<'a>(ctx: &'a mut Context) -> BoxFuture<'a> {
    Box::pin(async move {
        ctx.error("not found");
        ctx.next().await;
    })
}

fn db_down<'a>(ctx: &'a mut Context) -> BoxFuture<'a> {
    Box::pin(async move {
        ctx.abort_with_error(StatusCode::SERVICE_UNAVAILABLE, "db down");
    })
}

// ── Severity routing ──────────────────────────────────────────────────────────

#[tokio::test]
async fn error_with_sub_500_status_logs_a_warning() {
    let platform = RecordingPlatform::new();
    let app = Router::new()
        .layer(ErrorLogger::new(platform.clone()))
        .layer(from_fn(record_not_found))
        .get("/users/{id}", missing);

    let res = app.respond(get("/users/42")).await;

    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    let logs = platform.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0], (Severity::Warning, "not found".to_owned()));
}

#[tokio::test]
async fn error_with_500_plus_status_logs_an_error() {
    let platform = RecordingPlatform::new();
    let app = Router::new()
        .layer(ErrorLogger::new(platform.clone()))
        .layer(from_fn(db_down))
        .get("/users/{id}", ok);

    let res = app.respond(get("/users/42")).await;

    // The abort short-circuited the endpoint and put its message on the wire.
    assert_eq!(res.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.body().as_ref(), b"db down");
    let logs = platform.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0], (Severity::Error, "db down".to_owned()));
}

#[tokio::test]
async fn every_recorded_error_is_logged_in_insertion_order() {
    fn two_errors<'a>(ctx: &'a mut Context) -> BoxFuture<'a> {
        Box::pin(async move {
            ctx.error("first");
            ctx.next().await;
            ctx.error("second");
        })
    }

    let platform = RecordingPlatform::new();
    let app = Router::new()
        .layer(ErrorLogger::new(platform.clone()))
        .layer(from_fn(two_errors))
        .get("/", broken);

    let res = app.respond(get("/")).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let logs = platform.logs();
    assert_eq!(
        logs,
        vec![
            (Severity::Error, "first".to_owned()),
            (Severity::Error, "second".to_owned()),
        ]
    );
}

#[tokio::test]
async fn no_errors_means_no_log_calls_whatever_the_status() {
    let platform = RecordingPlatform::new();
    let app = Router::new()
        .layer(ErrorLogger::new(platform.clone()))
        .get("/ok", ok)
        .get("/broken", broken);

    assert_eq!(app.respond(get("/ok")).await.status_code(), StatusCode::OK);
    assert_eq!(
        app.respond(get("/broken")).await.status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert!(platform.logs().is_empty());
}

// ── Panic containment ─────────────────────────────────────────────────────────

#[tokio::test]
async fn panic_becomes_a_generic_500_and_a_critical_log() {
    let platform = RecordingPlatform::new();
    let app = Router::new()
        .layer(ErrorLogger::new(platform.clone()))
        .get("/", boom);

    let res = app.respond(get("/")).await;

    // The client learns nothing about the cause.
    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body().as_ref(), b"Shouldn't happen. See platform log.");

    // The operator learns everything: panic value plus a backtrace.
    let logs = platform.logs();
    assert_eq!(logs.len(), 1);
    let (severity, message) = &logs[0];
    assert_eq!(*severity, Severity::Critical);
    assert!(message.contains("boom"));
    let trace = message
        .split_once("Stack trace:\n")
        .map(|(_, trace)| trace)
        .unwrap_or("");
    assert!(!trace.trim().is_empty());
}

#[tokio::test]
async fn panic_suppresses_normal_error_processing() {
    fn record_then_continue<'a>(ctx: &'a mut Context) -> BoxFuture<'a> {
        Box::pin(async move {
            ctx.error("recorded before the panic");
            ctx.next().await;
        })
    }

    let platform = RecordingPlatform::new();
    let app = Router::new()
        .layer(ErrorLogger::new(platform.clone()))
        .layer(from_fn(record_then_continue))
        .get("/", boom);

    let res = app.respond(get("/")).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let logs = platform.logs();
    assert_eq!(logs.len(), 1, "only the critical log, no severity routing");
    assert_eq!(logs[0].0, Severity::Critical);
}

#[tokio::test]
async fn requests_after_a_panic_are_served_normally() {
    let platform = RecordingPlatform::new();
    let app = Router::new()
        .layer(ErrorLogger::new(platform.clone()))
        .get("/", boom)
        .get("/ok", ok);

    assert_eq!(
        app.respond(get("/")).await.status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    let res = app.respond(get("/ok")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.body().as_ref(), b"fine");
}

// ── Bridge memoization through the chain ──────────────────────────────────────

fn pass_through<'a>(ctx: &'a mut Context, _platform_ctx: PlatformContext) -> BoxFuture<'a> {
    Box::pin(async move {
        ctx.next().await;
    })
}

#[tokio::test]
async fn one_platform_construction_per_request() {
    let platform = RecordingPlatform::new();
    let app = Router::new()
        .layer(ErrorLogger::new(platform.clone()))
        .layer(with_platform_context(platform.clone(), pass_through))
        .get("/", ok);

    app.respond(get("/")).await;
    assert_eq!(platform.constructions(), 1);

    // A fresh request gets a fresh context.
    app.respond(get("/")).await;
    assert_eq!(platform.constructions(), 2);
}

#[tokio::test]
async fn stacked_adapters_still_construct_once() {
    fn verify_shared<'a>(ctx: &'a mut Context, platform_ctx: PlatformContext) -> BoxFuture<'a> {
        Box::pin(async move {
            // Both adapter layers and the logger see the same handle.
            let stored = ctx
                .get::<PlatformContext>(hashi::platform::PLATFORM_CONTEXT_KEY)
                .expect("bridge stored the context");
            assert!(stored.same(&platform_ctx));
            ctx.next().await;
        })
    }

    let platform = RecordingPlatform::new();
    let app = Router::new()
        .layer(ErrorLogger::new(platform.clone()))
        .layer(with_platform_context(platform.clone(), pass_through))
        .layer(with_platform_context(platform.clone(), verify_shared))
        .get("/", ok);

    let res = app.respond(get("/")).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(platform.constructions(), 1);
}

// ── Chain mechanics ───────────────────────────────────────────────────────────

#[tokio::test]
async fn abort_skips_the_endpoint_entirely() {
    static ENDPOINT_RAN: AtomicUsize = AtomicUsize::new(0);

    async fn counting(_req: Request) -> Response {
        ENDPOINT_RAN.fetch_add(1, Ordering::SeqCst);
        Response::text("ran")
    }

    let platform = RecordingPlatform::new();
    let app = Router::new()
        .layer(ErrorLogger::new(platform.clone()))
        .layer(from_fn(db_down))
        .get("/", counting);

    app.respond(get("/")).await;
    assert_eq!(ENDPOINT_RAN.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unmatched_routes_bypass_the_chain() {
    let platform = RecordingPlatform::new();
    let app = Router::new()
        .layer(ErrorLogger::new(platform.clone()))
        .get("/known", ok);

    let res = app.respond(get("/unknown")).await;

    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(platform.constructions(), 0);
    assert!(platform.logs().is_empty());
}
