//! Minimal proxy-shim demo: one proxy-event handler behind a local server.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42?verbose=1
//!   curl -i -X POST http://localhost:3000/users/42 \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -i http://localhost:3000/users/0        # handler error → 500 "error"

use proxy_shim::{AdapterConfig, Context, ProxyAdapter, ProxyRequest, ProxyResponse, Server};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = AdapterConfig::new("/users/{userId}")
        .with_stage_variable("table", "users-dev");

    if let Err(e) = Server::bind(([0, 0, 0, 0], 3000))
        .serve(ProxyAdapter::with_context(user, config))
        .await
    {
        eprintln!("server error: {e}");
    }
}

// GET|POST /users/{userId}
//
// The handler only ever sees the proxy event; the same function could be
// deployed behind API Gateway unchanged.
async fn user(ctx: Context, req: ProxyRequest) -> Result<ProxyResponse, String> {
    let id = req.path_param("userId").unwrap_or("unknown");
    if id == "0" {
        return Err("user 0 is reserved".to_owned());
    }

    let table = req.stage_variables.get("table").map_or("?", String::as_str);
    let peer = ctx.remote_addr().map(|a| a.to_string()).unwrap_or_default();

    Ok(ProxyResponse::builder()
        .header("Content-Type", "application/json")
        .multi_header("X-Served-By", "proxy-shim")
        .multi_header("X-Served-By", table)
        .body(format!(
            r#"{{"id":"{id}","method":"{}","verbose":{},"peer":"{peer}","body":{}}}"#,
            req.http_method,
            req.query("verbose").is_some(),
            if req.body.is_empty() { "null" } else { req.body.as_str() },
        )))
}
