//! Invocation context handed to context-carrying handlers.

use std::net::SocketAddr;

use http::Extensions;

/// Request-scoped context for one handler invocation.
///
/// Carries the inbound request's [`Extensions`], so anything a surrounding
/// server or middleware stored there (tracing ids, auth claims, the peer
/// address) reaches the handler. `Context::default()` is the empty context
/// context-free handlers are invoked with.
#[derive(Clone, Debug, Default)]
pub struct Context {
    extensions: Extensions,
}

impl Context {
    pub(crate) fn new(extensions: Extensions) -> Self {
        Self { extensions }
    }

    /// Peer address, when the server recorded one.
    ///
    /// [`Server`](crate::Server) always does.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.extensions.get::<SocketAddr>().copied()
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }
}
