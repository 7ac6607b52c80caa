//! Panic recovery and status-severity error routing.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};

use futures_util::FutureExt;
use http::StatusCode;

use crate::context::Context;
use crate::handler::BoxFuture;
use crate::middleware::Middleware;
use crate::platform::{Platform, PlatformContext, Severity, platform_context};

/// Cap on the formatted backtrace shipped to the platform log.
const MAX_BACKTRACE_BYTES: usize = 64 * 1024;

/// What the client sees when a handler panics. Deliberately says nothing
/// about the real cause; the operator finds that in the platform log.
const PANIC_RESPONSE: &str = "Shouldn't happen. See platform log.";

/// Terminal middleware: panic recovery plus severity-routed error logging.
///
/// Install it first so it wraps the whole chain. For every request it
/// obtains the [`PlatformContext`] through the
/// [bridge](crate::platform::platform_context), runs the rest of the chain,
/// and then:
///
/// - **Normal completion** — walks the [error list](Context::errors) in
///   insertion order and logs each message against the response status as it
///   stands when that error is processed: below 500 at
///   [`Severity::Warning`], 500 and above at [`Severity::Error`]. No errors,
///   no log calls.
/// - **Panic** — the unwind stops here. The panic value and the backtrace
///   captured at the panic site (bounded to 64 KiB) go to the platform log
///   at [`Severity::Critical`], and the response is replaced with a 500
///   whose body never echoes the panic value.
///
/// Nothing below this middleware escapes it; the server only ever sees a
/// completed response.
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use hashi::Router;
/// use hashi::middleware::ErrorLogger;
/// use hashi::platform::TracingPlatform;
///
/// let app = Router::new().layer(ErrorLogger::new(Arc::new(TracingPlatform)));
/// ```
pub struct ErrorLogger {
    platform: Arc<dyn Platform>,
}

impl ErrorLogger {
    /// Build the middleware around an injected platform.
    ///
    /// The first construction process-wide also installs a panic hook that
    /// records the panicking thread's backtrace for the recovery path; the
    /// hook chains to whatever hook was already set, so default stderr
    /// reporting is preserved.
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        install_panic_hook();
        Self { platform }
    }

    fn log_accumulated_errors(&self, ctx: &Context, platform_ctx: &PlatformContext) {
        for err in ctx.errors() {
            // The status is read per error, at processing time. Whatever the
            // chain last set is what classifies this error.
            let severity = if ctx.status().as_u16() < 500 {
                Severity::Warning
            } else {
                Severity::Error
            };
            self.platform.log(platform_ctx, severity, &err.to_string());
        }
    }

    fn log_panic(&self, platform_ctx: &PlatformContext, payload: &(dyn Any + Send)) {
        let trace = take_panic_backtrace();
        let message = format!(
            "{}\nStack trace:\n{}",
            panic_message(payload),
            trace,
        );
        self.platform.log(platform_ctx, Severity::Critical, &message);
    }
}

impl Middleware for ErrorLogger {
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a> {
        Box::pin(async move {
            let platform_ctx = platform_context(ctx, &*self.platform);

            // The recovery boundary. A panicking poll is caught right here,
            // on this thread, and the match below resumes synchronously —
            // which is what makes the thread-local backtrace hand-off sound.
            let outcome = AssertUnwindSafe(ctx.next()).catch_unwind().await;

            match outcome {
                Ok(()) => self.log_accumulated_errors(ctx, &platform_ctx),
                Err(payload) => {
                    self.log_panic(&platform_ctx, payload.as_ref());
                    ctx.abort_with_error(StatusCode::INTERNAL_SERVER_ERROR, PANIC_RESPONSE);
                }
            }
        })
    }
}

// ── Panic-site backtrace capture ──────────────────────────────────────────────
//
// By the time `catch_unwind` hands back the payload the stack is already
// unwound, so capturing there would show the recovery site. The hook runs at
// the panic site instead and parks the formatted backtrace in a
// thread-local; the recovery path drains it before its next await point.

static PANIC_HOOK: Once = Once::new();

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let mut trace = Backtrace::force_capture().to_string();
            truncate_on_char_boundary(&mut trace, MAX_BACKTRACE_BYTES);
            PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_panic_backtrace() -> String {
    PANIC_BACKTRACE
        .with(|slot| slot.borrow_mut().take())
        // Reachable only if the panic predates hook installation; fall back
        // to the recovery site's own trace rather than log nothing.
        .unwrap_or_else(|| Backtrace::force_capture().to_string())
}

fn truncate_on_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

/// Render a panic payload the way `std` does: `&str` and `String` payloads
/// verbatim, anything else opaquely.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "Box<dyn Any>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_lands_on_a_char_boundary() {
        let mut s = "aé".repeat(10); // 'é' is two bytes
        truncate_on_char_boundary(&mut s, 4);
        assert_eq!(s, "aéa");
    }

    #[test]
    fn short_strings_are_untouched() {
        let mut s = String::from("short");
        truncate_on_char_boundary(&mut s, MAX_BACKTRACE_BYTES);
        assert_eq!(s, "short");
    }

    #[test]
    fn panic_payload_rendering() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("boom2"));
        assert_eq!(panic_message(boxed.as_ref()), "boom2");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "Box<dyn Any>");
    }
}
