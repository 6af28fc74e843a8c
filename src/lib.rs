//! # proxy-shim
//!
//! Run API Gateway proxy-event handlers behind a plain HTTP server.
//!
//! A proxy-event handler never sees a socket. It gets a structured request
//! (method, path, headers and query parameters in both single and
//! multi-value form, path parameters, stage variables, body) and returns a
//! structured response (status, headers, multi-value headers, body). This
//! crate rebuilds that structured request from an `http::Request` and
//! replays the structured response onto an `http::Response`, so the same
//! handler runs on hyper, locally or in a container.
//!
//! What the shim does:
//!
//! - Path parameters from the declared resource template (`/users/{userId}`)
//! - Headers and query parameters in both single and multi-value form
//! - Response replay with both header maps, byte-for-byte body
//! - Every handler-side failure becomes `500` with body `error`, exactly what
//!   API Gateway answers when a function fails
//!
//! What it leaves to others: TLS, routing between handlers, body limits,
//! authentication. Put the shim behind something that does those.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use proxy_shim::{AdapterConfig, ProxyAdapter, ProxyRequest, ProxyResponse, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AdapterConfig::new("/users/{userId}")
//!         .with_stage_variable("table", "users-dev");
//!
//!     Server::bind(([0, 0, 0, 0], 3000))
//!         .serve(ProxyAdapter::new(get_user, config))
//!         .await
//!         .unwrap();
//! }
//!
//! async fn get_user(req: ProxyRequest) -> Result<ProxyResponse, std::io::Error> {
//!     let id = req.path_param("userId").unwrap_or("unknown");
//!     Ok(ProxyResponse::builder()
//!         .header("Content-Type", "application/json")
//!         .body(format!(r#"{{"id":"{id}"}}"#)))
//! }
//! ```

mod adapter;
mod config;
mod context;
mod error;
mod fold;
mod handler;
mod request;
mod response;
mod server;
mod template;

pub use adapter::ProxyAdapter;
pub use config::AdapterConfig;
pub use context::Context;
pub use error::{BoxError, Error};
pub use fold::fold;
pub use handler::Handler;
pub use request::{ProxyRequest, RequestContext, translate};
pub use response::{IntoProxyResponse, ProxyOutcome, ProxyResponse, ProxyResponseBuilder, replay};
pub use server::{Server, serve_listener};
pub use template::{RouteTemplate, TemplateError};
