//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! An adapter owns exactly one handler, but its concrete type is whatever
//! closure or `async fn` the caller passed in. The adapter is not generic
//! over it: the handler is erased behind `dyn ErasedHandler` once, at
//! construction, and shared through an `Arc`.
//!
//! ```text
//! async fn get_user(ctx: Context, req: ProxyRequest) -> Result<ProxyResponse, E>
//!        ↓ ProxyAdapter::with_context(get_user, config)
//! get_user.into_boxed_handler()                    ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(get_user))                    ← stored as BoxedHandler
//!        ↓
//! handler.dispatch(ctx, req)  at request time      ← one vtable dispatch
//!        ↓
//! Box::pin(async { ... .into_proxy_response() })   ← BoxFuture
//! ```
//!
//! Context-free handlers (`Fn(ProxyRequest)`) are wrapped into this shape by
//! [`ProxyAdapter::new`](crate::ProxyAdapter::new); there is only one erased
//! form.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::BoxError;
use crate::request::ProxyRequest;
use crate::response::{IntoProxyResponse, ProxyOutcome};

/// A heap-allocated, type-erased handler future.
///
/// `Send + 'static` so the adapter can run it on its own tokio task.
pub(crate) type BoxFuture =
    Pin<Box<dyn Future<Output = Result<ProxyOutcome, BoxError>> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn dispatch(&self, ctx: Context, req: ProxyRequest) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every context-carrying proxy-event handler.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure of the shape:
///
/// ```text
/// async fn name(ctx: Context, req: ProxyRequest) -> Result<impl IntoProxyResponse, impl Into<BoxError>>
/// ```
///
/// Sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R, E> private::Sealed for F
where
    F: Fn(Context, ProxyRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoProxyResponse + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
}

impl<F, Fut, R, E> Handler for F
where
    F: Fn(Context, ProxyRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoProxyResponse + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Newtype bridging a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R, E> ErasedHandler for FnHandler<F>
where
    F: Fn(Context, ProxyRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoProxyResponse + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    fn dispatch(&self, ctx: Context, req: ProxyRequest) -> BoxFuture {
        let fut = (self.0)(ctx, req);
        Box::pin(async move {
            fut.await
                .map(IntoProxyResponse::into_proxy_response)
                .map_err(Into::<BoxError>::into)
        })
    }
}
