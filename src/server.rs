//! A local HTTP server hosting one adapter.
//!
//! Every request on every path goes to the one [`ProxyAdapter`]; there is no
//! routing here. Paths that do not fit the adapter's template still reach
//! the handler, with empty path parameters, the same way a misrouted event
//! would.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server:
//! 1. Immediately stops `listener.accept()`, so no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`].

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;

use hyper::Request;
use hyper::body::Incoming;
use hyper::service::Service;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::adapter::ProxyAdapter;
use crate::error::Error;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust,no_run
    /// use proxy_shim::Server;
    /// let server = Server::bind(([0, 0, 0, 0], 3000));
    /// ```
    pub fn bind(addr: impl Into<SocketAddr>) -> Self {
        Self { addr: addr.into() }
    }

    /// Serves `adapter` until SIGTERM or Ctrl-C, then drains.
    pub async fn serve(self, adapter: ProxyAdapter) -> Result<(), Error> {
        self.serve_with_shutdown(adapter, shutdown_signal()).await
    }

    /// Serves `adapter` until `signal` resolves, then drains.
    pub async fn serve_with_shutdown(
        self,
        adapter: ProxyAdapter,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(
            addr = %self.addr,
            resource = adapter.config().resource_template(),
            "proxy shim listening"
        );
        serve_listener(listener, adapter, signal).await;
        Ok(())
    }
}

/// Accepts connections on an already-bound `listener` until `signal`
/// resolves, then waits for in-flight connections to finish.
pub async fn serve_listener(
    listener: TcpListener,
    adapter: ProxyAdapter,
    signal: impl Future<Output = ()>,
) {
    let mut connections = JoinSet::new();
    tokio::pin!(signal);

    loop {
        let (stream, peer) = tokio::select! {
            // A signal stops accepting even if more connections are queued.
            biased;

            () = &mut signal => break,

            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    error!("accept error: {e}");
                    continue;
                }
            },

            // Reap finished connections so the set stays small.
            Some(_) = connections.join_next(), if !connections.is_empty() => continue,
        };

        connections.spawn(serve_connection(stream, PeerService { adapter: adapter.clone(), peer }));
    }

    info!(in_flight = connections.len(), "shutdown signal received, draining connections");
    while connections.join_next().await.is_some() {}
    info!("proxy shim stopped");
}

/// Serves one connection, HTTP/1.1 or HTTP/2, whatever the client speaks.
async fn serve_connection(stream: TcpStream, service: PeerService) {
    let peer = service.peer;
    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        error!(%peer, "connection error: {e}");
    }
}

/// The adapter as seen from one connection: records the peer address on
/// every request, which handlers read through
/// [`Context::remote_addr`](crate::Context::remote_addr).
#[derive(Clone)]
struct PeerService {
    adapter: ProxyAdapter,
    peer: SocketAddr,
}

impl Service<Request<Incoming>> for PeerService {
    type Response = <ProxyAdapter as Service<Request<Incoming>>>::Response;
    type Error = Infallible;
    type Future = <ProxyAdapter as Service<Request<Incoming>>>::Future;

    fn call(&self, mut req: Request<Incoming>) -> Self::Future {
        req.extensions_mut().insert(self.peer);
        self.adapter.call(req)
    }
}

/// Resolves on SIGTERM or Ctrl-C. A signal that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
