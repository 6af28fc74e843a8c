//! The adapter: one proxy-event handler served as an HTTP service.
//!
//! ```text
//! http::Request ──read body──▶ ProxyRequest ──handler──▶ ProxyOutcome ──replay──▶ http::Response
//!                     │                                       │
//!                     └── failure: 500 "error" ◀──────────────┴── Err / panic / Invalid
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::service::Service;
use tracing::{debug, warn};

use crate::config::AdapterConfig;
use crate::context::Context;
use crate::error::{BoxError, Error};
use crate::handler::{BoxedHandler, Handler};
use crate::request::{ProxyRequest, read_body};
use crate::response::{IntoProxyResponse, ProxyOutcome, replay};
use crate::template::RouteTemplate;

/// Serves one proxy-event handler for one route template.
///
/// Cheap to clone: every clone shares the same immutable configuration,
/// compiled template and handler. Use it as a hyper [`Service`], host it
/// with [`Server`](crate::Server), or call [`handle`](ProxyAdapter::handle)
/// directly.
///
/// ```rust
/// use proxy_shim::{AdapterConfig, ProxyAdapter, ProxyRequest, ProxyResponse};
///
/// async fn get_user(req: ProxyRequest) -> Result<ProxyResponse, std::convert::Infallible> {
///     let id = req.path_param("userId").unwrap_or("unknown");
///     Ok(ProxyResponse::new(200, format!(r#"{{"id":"{id}"}}"#)))
/// }
///
/// let adapter = ProxyAdapter::new(get_user, AdapterConfig::new("/users/{userId}"));
/// ```
#[derive(Clone)]
pub struct ProxyAdapter {
    inner: Arc<Inner>,
}

struct Inner {
    handler: BoxedHandler,
    config: AdapterConfig,
    /// `None` when the configured template does not compile.
    template: Option<RouteTemplate>,
}

impl ProxyAdapter {
    /// Adapts a handler that takes only the request.
    pub fn new<F, Fut, R, E>(handler: F, config: AdapterConfig) -> Self
    where
        F: Fn(ProxyRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: IntoProxyResponse + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        Self::with_context(move |_: Context, req: ProxyRequest| handler(req), config)
    }

    /// Adapts a handler that also receives the invocation [`Context`].
    pub fn with_context(handler: impl Handler, config: AdapterConfig) -> Self {
        let template = match RouteTemplate::compile(config.resource_template()) {
            Ok(t) => Some(t),
            Err(e) => {
                let err = Error::from(e);
                warn!(
                    template = config.resource_template(),
                    error = %err,
                    "route template does not compile, path parameters will be empty"
                );
                None
            }
        };

        Self {
            inner: Arc::new(Inner {
                handler: handler.into_boxed_handler(),
                config,
                template,
            }),
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.inner.config
    }

    /// The compiled route template, if it compiled.
    pub fn template(&self) -> Option<&RouteTemplate> {
        self.inner.template.as_ref()
    }

    /// Handles one HTTP request end to end. Never fails: every error is
    /// already a `500` by the time this returns.
    ///
    /// Inside a tokio runtime the handler runs on its own task and a panic
    /// becomes a `500`. Any other executor polls the handler inline, where a
    /// panic unwinds into the caller.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        replay(self.invoke(req).await)
    }

    async fn invoke<B>(&self, req: http::Request<B>) -> Result<ProxyOutcome, Error>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        let body = read_body(body).await?;

        let event = ProxyRequest::from_parts(
            &parts,
            &body,
            &self.inner.config,
            self.inner.template.as_ref(),
        );
        debug!(
            method = %event.http_method,
            path = %event.path,
            resource = %event.resource,
            "invoking handler"
        );

        let fut = self.inner.handler.dispatch(Context::new(parts.extensions), event);
        let result = match tokio::runtime::Handle::try_current() {
            // Own task, so a panicking handler only fails its own request.
            Ok(runtime) => runtime
                .spawn(fut)
                .await
                .map_err(|e| Error::Handler(format!("handler task failed: {e}").into()))?,
            // Outside tokio there is no task to contain a panic.
            Err(_) => fut.await,
        };
        result.map_err(Error::Handler)
    }
}

impl<B> Service<http::Request<B>> for ProxyAdapter
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError> + Send,
{
    type Response = http::Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Infallible>> + Send>>;

    fn call(&self, req: http::Request<B>) -> Self::Future {
        let adapter = self.clone();
        Box::pin(async move { Ok::<_, Infallible>(adapter.handle(req).await) })
    }
}
