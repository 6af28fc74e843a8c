//! The proxy-event response and its replay onto the wire.
//!
//! A handler produces something that should be a [`ProxyResponse`]. What it
//! actually produced is reduced to a [`ProxyOutcome`] by [`IntoProxyResponse`],
//! and [`replay`] turns the outcome (or the handler's error) into the
//! `http::Response` hyper sends.

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::error::Error;

/// Body written for every failed request.
const ERROR_BODY: &[u8] = b"error";

// ── ProxyResponse ─────────────────────────────────────────────────────────────

/// An API Gateway proxy response.
///
/// Both header maps are written out: a name present in both ends up on the
/// wire once per value, the `headers` entry first.
///
/// ```rust
/// use http::StatusCode;
/// use proxy_shim::ProxyResponse;
///
/// ProxyResponse::new(200, r#"{"id":1}"#);
///
/// ProxyResponse::builder()
///     .status(StatusCode::CREATED)
///     .header("Location", "/users/42")
///     .multi_header("Set-Cookie", "a=1")
///     .multi_header("Set-Cookie", "b=2")
///     .body(r#"{"id":42}"#);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub multi_value_headers: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub body: String,
}

impl ProxyResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self { status_code, body: body.into(), ..Self::default() }
    }

    /// Builder for responses with headers. Defaults to `200 OK`.
    pub fn builder() -> ProxyResponseBuilder {
        ProxyResponseBuilder { response: Self::new(StatusCode::OK.as_u16(), "") }
    }
}

/// Fluent builder for [`ProxyResponse`], terminated by a body method.
pub struct ProxyResponseBuilder {
    response: ProxyResponse,
}

impl ProxyResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.response.status_code = code.as_u16();
        self
    }

    /// Sets a single-value header, replacing an earlier one of the same name.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.response.headers.insert(name.to_owned(), value.to_owned());
        self
    }

    /// Appends one value to a multi-value header.
    pub fn multi_header(mut self, name: &str, value: &str) -> Self {
        self.response.multi_value_headers
            .entry(name.to_owned())
            .or_default()
            .push(value.to_owned());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> ProxyResponse {
        self.response.body = body.into();
        self.response
    }

    pub fn no_body(self) -> ProxyResponse {
        self.response
    }
}

// ── ProxyOutcome / IntoProxyResponse ──────────────────────────────────────────

/// What a successful handler call produced.
#[derive(Clone, Debug, PartialEq)]
pub enum ProxyOutcome {
    Valid(ProxyResponse),
    /// Anything not shaped like a response: `None`, `null`, a JSON value
    /// missing `statusCode`, ...
    Invalid,
}

/// Conversion from a handler's return value into a [`ProxyOutcome`].
///
/// Implemented for the shapes a proxy-event handler can reasonably return.
/// Implement it on your own types to return them directly from handlers.
///
/// ```rust
/// use proxy_shim::{IntoProxyResponse, ProxyOutcome, ProxyResponse};
///
/// assert!(matches!(ProxyResponse::new(204, "").into_proxy_response(), ProxyOutcome::Valid(_)));
/// assert_eq!(None::<ProxyResponse>.into_proxy_response(), ProxyOutcome::Invalid);
/// assert_eq!(serde_json::Value::Null.into_proxy_response(), ProxyOutcome::Invalid);
/// ```
pub trait IntoProxyResponse {
    fn into_proxy_response(self) -> ProxyOutcome;
}

impl IntoProxyResponse for ProxyOutcome {
    fn into_proxy_response(self) -> ProxyOutcome { self }
}

impl IntoProxyResponse for ProxyResponse {
    fn into_proxy_response(self) -> ProxyOutcome { ProxyOutcome::Valid(self) }
}

impl IntoProxyResponse for Box<ProxyResponse> {
    fn into_proxy_response(self) -> ProxyOutcome { ProxyOutcome::Valid(*self) }
}

impl<T: IntoProxyResponse> IntoProxyResponse for Option<T> {
    fn into_proxy_response(self) -> ProxyOutcome {
        self.map_or(ProxyOutcome::Invalid, IntoProxyResponse::into_proxy_response)
    }
}

/// Accepted when the value deserializes as a [`ProxyResponse`]; `statusCode`
/// is the only required field.
impl IntoProxyResponse for Value {
    fn into_proxy_response(self) -> ProxyOutcome {
        if self.is_null() {
            return ProxyOutcome::Invalid;
        }
        serde_json::from_value::<ProxyResponse>(self)
            .map_or(ProxyOutcome::Invalid, ProxyOutcome::Valid)
    }
}

// ── Replay ────────────────────────────────────────────────────────────────────

/// Turns the result of one handler call into the outgoing response.
///
/// Failures and invalid output both become `500` with body `error`; the
/// detail is logged, never sent. A valid response is replayed as-is: every
/// `headers` entry, then every `multi_value_headers` value, the status, and
/// the body bytes. The response is complete before hyper sees it, so headers
/// can never trail the status line.
pub fn replay(result: Result<ProxyOutcome, Error>) -> http::Response<Full<Bytes>> {
    let response = match result {
        Ok(ProxyOutcome::Valid(response)) => response,
        Ok(ProxyOutcome::Invalid) => {
            return error_response(&Error::MalformedResponse(
                "handler output is not a proxy response".to_owned(),
            ));
        }
        Err(e) => return error_response(&e),
    };

    to_http(response).unwrap_or_else(|e| error_response(&e))
}

/// The response every failed request gets.
pub(crate) fn error_response(err: &Error) -> http::Response<Full<Bytes>> {
    error!(error = %err, "request failed");
    let mut out = http::Response::new(Full::new(Bytes::from_static(ERROR_BODY)));
    *out.status_mut() = err.status();
    out
}

/// Fails if the response cannot be represented on the wire.
fn to_http(response: ProxyResponse) -> Result<http::Response<Full<Bytes>>, Error> {
    let status = StatusCode::from_u16(response.status_code).map_err(|_| {
        Error::MalformedResponse(format!("invalid status code {}", response.status_code))
    })?;

    let mut headers = HeaderMap::new();
    for (name, value) in &response.headers {
        append_header(&mut headers, name, value)?;
    }
    for (name, values) in &response.multi_value_headers {
        for value in values {
            append_header(&mut headers, name, value)?;
        }
    }

    let mut out = http::Response::new(Full::new(Bytes::from(response.body)));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    Ok(out)
}

fn append_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), Error> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| Error::MalformedResponse(format!("invalid header name `{name}`")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|_| Error::MalformedResponse(format!("invalid value for header `{name}`")))?;
    headers.append(header_name, header_value);
    Ok(())
}
