//! Unified error types.

use std::fmt;

/// The error carrier for the per-request error list.
///
/// Handlers report errors of any concrete type; the chain only needs `Display`
/// for the log message, so the list stores them type-erased. `&str` and
/// `String` convert via the standard `From` impls, which keeps
/// `ctx.error("not found")` as cheap to write as it should be.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by hashi's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values or recorded on the request
/// [`Context`](crate::Context), not as `Error`s. This type surfaces
/// infrastructure failures: binding to a port or accepting a connection.
#[derive(Debug)]
pub struct Error(std::io::Error);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "io: {}", self.0)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self(e)
    }
}
