//! # hashi
//!
//! A minimal HTTP framework with a platform-bridging middleware chain.
//! Nothing more. Nothing less.
//!
//! ## The contract
//!
//! Hosting platforms hand every request a context object their own APIs
//! (logging, storage, queues) demand back. hashi's job is the plumbing
//! between that world and yours, done once, correctly:
//!
//! - **Context bridge** — [`platform::platform_context`] derives the
//!   platform's per-request context lazily, memoizes it in the request's
//!   store, and shares one handle across the whole handler chain. The
//!   platform constructor runs at most once per request, guaranteed.
//! - **Recovery boundary** — [`middleware::ErrorLogger`] wraps the chain:
//!   panics stop there and become a clean 500 plus a critical-severity log
//!   with the panic-site backtrace; handler-reported errors are routed to
//!   the platform log at a severity picked from the response status.
//!
//! What's left is a deliberately small framework for the chain to live in:
//!
//! - Radix-tree routing — O(path-length) lookup via [`matchit`]
//! - hyper 1.x serving — HTTP/1.1 and HTTP/2, whatever the client negotiates
//! - Graceful shutdown — SIGTERM / Ctrl-C, drains in-flight requests
//! - A sequential middleware chain — [`Context::next`], gin-style, no tower
//!   onion to climb
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use hashi::middleware::ErrorLogger;
//! use hashi::platform::TracingPlatform;
//! use hashi::{Request, Response, Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let platform = Arc::new(TracingPlatform);
//!
//!     let app = Router::new()
//!         .layer(ErrorLogger::new(platform))
//!         .get("/users/{id}", get_user)
//!         .post("/users", create_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     // hashi sends bytes — it doesn't care how you build them:
//!     //   serde_json::to_vec(&user).unwrap()
//!     //   format!(r#"{{"id":"{id}"}}"#).into_bytes()
//!     # let bytes: Vec<u8> = vec![];
//!     Response::json(bytes)
//! }
//!
//! async fn create_user(req: Request) -> Response {
//!     if req.body().is_empty() {
//!         return Response::status(StatusCode::BAD_REQUEST);
//!     }
//!     # let bytes: Vec<u8> = vec![];
//!     Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/users/99")
//!         .json(bytes)
//! }
//! ```
//!
//! ## Error routing at a glance
//!
//! Handlers record failures on the request [`Context`] instead of inventing
//! per-app logging conventions; [`middleware::ErrorLogger`] turns them into
//! platform log lines after the chain finishes:
//!
//! | What happened | Client sees | Platform log |
//! |---|---|---|
//! | errors recorded, final status < 500 | handler's response | one **warning** per error |
//! | errors recorded, final status >= 500 | handler's response | one **error** per error |
//! | no errors | handler's response | nothing |
//! | panic | 500, fixed body | one **critical** with backtrace |

mod context;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod health;
pub mod middleware;
pub mod platform;

pub use context::Context;
pub use error::{BoxError, Error};
pub use handler::{BoxFuture, Handler};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response};
pub use router::Router;
pub use server::Server;

// The wire types come from the `http` crate; re-exported so applications
// don't need to depend on it directly.
pub use http::{Method, StatusCode};
