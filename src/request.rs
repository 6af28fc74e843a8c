//! The proxy-event request and its translation from a raw HTTP request.

use std::borrow::Cow;
use std::collections::HashMap;

use bytes::Bytes;
use http::HeaderMap;
use http::request::Parts;
use http_body_util::BodyExt;
use hyper::body::Body;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::form_urlencoded;

use crate::config::AdapterConfig;
use crate::error::{BoxError, Error};
use crate::fold::{fold, push_value};
use crate::template::RouteTemplate;

/// API Gateway request context.
///
/// The shim never derives any of this; it is copied from
/// [`AdapterConfig`] into every request. Fields the struct does not name
/// (`identity`, `authorizer`, ...) survive in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestContext {
    pub account_id: String,
    pub resource_id: String,
    pub stage: String,
    pub request_id: String,
    pub resource_path: String,
    pub http_method: String,
    pub api_id: String,
    pub protocol: String,
    pub domain_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An API Gateway REST proxy event, rebuilt from a plain HTTP request.
///
/// Serializes to the same JSON an API Gateway proxy integration sends, so a
/// handler can be fed a captured event in tests just as easily.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyRequest {
    /// The declared route template, e.g. `/users/{userId}`. Not the path.
    pub resource: String,
    /// The concrete, percent-decoded path.
    pub path: String,
    pub http_method: String,
    /// First value of every header, keyed by canonical name.
    pub headers: HashMap<String, String>,
    /// Every header value in arrival order, keyed by canonical name.
    pub multi_value_headers: HashMap<String, Vec<String>>,
    pub query_string_parameters: HashMap<String, String>,
    pub multi_value_query_string_parameters: HashMap<String, Vec<String>>,
    /// Empty when the path does not match the template.
    pub path_parameters: HashMap<String, String>,
    pub stage_variables: HashMap<String, String>,
    pub request_context: RequestContext,
    /// Raw payload. Bytes that are not UTF-8 are replaced.
    pub body: String,
}

impl ProxyRequest {
    /// Builds the event from request parts and an already-read body.
    ///
    /// `template` is the compiled form of the configured resource template;
    /// `None` means it failed to compile and no path parameters are
    /// extracted.
    pub(crate) fn from_parts(
        parts: &Parts,
        body: &[u8],
        config: &AdapterConfig,
        template: Option<&RouteTemplate>,
    ) -> Self {
        let path = decode_path(parts.uri.path());
        let multi_value_headers = collect_headers(&parts.headers);
        let multi_value_query = collect_query(parts.uri.query());
        let path_parameters = template.map(|t| t.extract(&path)).unwrap_or_default();

        Self {
            resource: config.resource_template().to_owned(),
            http_method: parts.method.as_str().to_ascii_uppercase(),
            headers: fold(&multi_value_headers),
            multi_value_headers,
            query_string_parameters: fold(&multi_value_query),
            multi_value_query_string_parameters: multi_value_query,
            path_parameters,
            stage_variables: config.stage_variables().clone(),
            request_context: config.request_context().cloned().unwrap_or_default(),
            body: String::from_utf8_lossy(body).into_owned(),
            path,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First value of a query parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query_string_parameters.get(key).map(String::as_str)
    }

    /// Returns a named path parameter.
    ///
    /// For a template `/users/{userId}`, `req.path_param("userId")` on
    /// `/users/42` returns `Some("42")`.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_parameters.get(name).map(String::as_str)
    }
}

/// Reads `req` fully and translates it against `config`.
///
/// The template is compiled on every call; [`ProxyAdapter`](crate::ProxyAdapter)
/// compiles it once instead. A body that fails to read yields
/// [`Error::BodyRead`].
pub async fn translate<B>(req: http::Request<B>, config: &AdapterConfig) -> Result<ProxyRequest, Error>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let (parts, body) = req.into_parts();
    let body = read_body(body).await?;
    let template = match RouteTemplate::compile(config.resource_template()) {
        Ok(t) => Some(t),
        Err(e) => {
            debug!(template = config.resource_template(), error = %e, "route template ignored");
            None
        }
    };
    Ok(ProxyRequest::from_parts(&parts, &body, config, template.as_ref()))
}

pub(crate) async fn read_body<B>(body: B) -> Result<Bytes, Error>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| Error::BodyRead(e.into()))
}

/// `content-type` → `Content-Type`, `x-request-id` → `X-Request-Id`.
///
/// hyper lowercases every header name; proxy-event handlers expect the
/// canonical MIME spelling.
pub(crate) fn canonical_header_name(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() };
            upper = c == '-';
            out
        })
        .collect()
}

fn collect_headers(headers: &HeaderMap) -> HashMap<String, Vec<String>> {
    let mut multi = HashMap::new();
    for (name, value) in headers {
        push_value(
            &mut multi,
            canonical_header_name(name.as_str()),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }
    multi
}

fn collect_query(query: Option<&str>) -> HashMap<String, Vec<String>> {
    let mut multi = HashMap::new();
    for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        push_value(&mut multi, key.into_owned(), value.into_owned());
    }
    multi
}

fn decode_path(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| raw.to_owned())
}
