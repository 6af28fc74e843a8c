//! Unified error type.

use http::StatusCode;

use crate::template::TemplateError;

/// Boxed error accepted from handlers and request bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by the shim's fallible operations.
///
/// Only [`Error::Io`] ever leaves the crate as a `Result`. Everything that
/// happens inside one request is absorbed at the adapter boundary and turned
/// into a response (see [`Error::status`]), so the surrounding server never
/// sees a handler-side failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Binding the listener or accepting a connection failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Reading the inbound request body failed. The handler is not invoked.
    #[error("failed to read request body: {0}")]
    BodyRead(#[source] BoxError),

    /// The configured route template could not be compiled.
    #[error("invalid route template: {0}")]
    Template(#[from] TemplateError),

    /// The handler returned an error or panicked.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    /// The handler succeeded but its output is not a usable response.
    #[error("malformed handler response: {0}")]
    MalformedResponse(String),
}

impl Error {
    /// The status a client observes when this error ends a request.
    ///
    /// Every per-request failure is a `500`: a caller of the original event
    /// contract cannot tell a failing handler from a broken one, and neither
    /// can a caller of the shim.
    pub fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
