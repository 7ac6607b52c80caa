//! Minimal hashi example — platform-bridged middleware around JSON endpoints.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl http://localhost:3000/users/0        ← 404, error recorded → warning log
//!   curl http://localhost:3000/crash          ← panics, recovered → 500 + critical log
//!   curl http://localhost:3000/healthz

use std::sync::Arc;

use hashi::middleware::ErrorLogger;
use hashi::platform::{Platform, PlatformContext, TracingPlatform, with_platform_context};
use hashi::{BoxFuture, Context, Request, Response, Router, Server, StatusCode, health};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let platform: Arc<dyn Platform> = Arc::new(TracingPlatform);

    let app = Router::new()
        // First in the chain so it wraps everything: panic recovery plus
        // severity-routed error logging into the platform.
        .layer(ErrorLogger::new(Arc::clone(&platform)))
        // A handler that wants the platform context handle directly.
        .layer(with_platform_context(platform, flag_failures))
        .get("/users/{id}", get_user)
        .get("/crash", crash)
        .get("/healthz", health::liveness)
        .get("/readyz", health::readiness);

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// Platform-typed middleware: the bridge already ran (or runs here, whichever
// comes first), so `_platform_ctx` is the same handle ErrorLogger uses.
// Records an error for any failed response; ErrorLogger picks the severity
// from the final status.
fn flag_failures<'a>(ctx: &'a mut Context, _platform_ctx: PlatformContext) -> BoxFuture<'a> {
    Box::pin(async move {
        ctx.next().await;
        let status = ctx.status();
        if status.is_client_error() || status.is_server_error() {
            ctx.error(format!("request failed with {status}"));
        }
    })
}

// GET /users/{id}
//
// Response::json takes anything Into<Bytes> — pass bytes from your serialiser:
//   serde_json:  Response::json(serde_json::to_vec(&user).unwrap())
//   hand-built:  Response::json(format!(...).into_bytes())  ← zero-cost, no copy
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    if id == "0" {
        return Response::builder()
            .status(StatusCode::NOT_FOUND)
            .text("no such user");
    }
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#).into_bytes())
}

// GET /crash — what an unhandled bug looks like. The client gets a generic
// 500; the panic value and backtrace land in the platform log.
async fn crash(_req: Request) -> Response {
    panic!("demo panic");
}
