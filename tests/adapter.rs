// End-to-end adapter tests: http::Request in, http::Response out.
#![allow(clippy::unwrap_used)]

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context as TaskContext, Poll};

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Frame};
use proxy_shim::{
    AdapterConfig, BoxError, Context, ProxyAdapter, ProxyOutcome, ProxyRequest, ProxyResponse,
    RequestContext,
};
use serde_json::json;

fn request(method: &str, uri: &str, headers: &[(&str, &str)], body: &str) -> http::Request<Full<Bytes>> {
    let mut builder = http::Request::builder().method(method).uri(uri);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    builder.body(Full::new(Bytes::from(body.to_owned()))).unwrap()
}

async fn body_text(res: http::Response<Full<Bytes>>) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// An adapter whose handler stores the event it was given.
fn capturing(config: AdapterConfig) -> (ProxyAdapter, Arc<Mutex<Option<ProxyRequest>>>) {
    let seen = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&seen);
    let adapter = ProxyAdapter::new(
        move |req: ProxyRequest| {
            let slot = Arc::clone(&slot);
            async move {
                *slot.lock().unwrap() = Some(req);
                Ok::<_, BoxError>(ProxyResponse::new(200, "captured"))
            }
        },
        config,
    );
    (adapter, seen)
}

/// A body that fails on the first read.
struct FailingBody;

impl Body for FailingBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut TaskContext<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        Poll::Ready(Some(Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"))))
    }
}

#[tokio::test]
async fn post_is_translated_into_a_full_proxy_event() {
    let config = AdapterConfig::new("/users/{userId}").with_stage_variable("var1", "varValue1");
    let (adapter, seen) = capturing(config);

    let res = adapter
        .handle(request(
            "POST",
            "/users/123?abc=123",
            &[("Content-Type", "application/json")],
            "req_body",
        ))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(res).await, "captured");

    let event = seen.lock().unwrap().take().unwrap();
    assert_eq!(event.resource, "/users/{userId}");
    assert_eq!(event.path, "/users/123");
    assert_eq!(event.http_method, "POST");
    assert_eq!(event.path_parameters.len(), 1);
    assert_eq!(event.path_param("userId"), Some("123"));
    assert_eq!(event.query_string_parameters.len(), 1);
    assert_eq!(event.query("abc"), Some("123"));
    assert_eq!(event.multi_value_query_string_parameters["abc"], ["123"]);
    assert_eq!(event.headers["Content-Type"], "application/json");
    assert_eq!(event.multi_value_headers["Content-Type"], ["application/json"]);
    assert_eq!(event.body, "req_body");
    assert_eq!(event.stage_variables["var1"], "varValue1");
    assert_eq!(event.request_context, RequestContext::default());
}

#[tokio::test]
async fn path_outside_the_template_still_reaches_the_handler() {
    let (adapter, seen) = capturing(AdapterConfig::new("/users/{userId}"));

    let res = adapter.handle(request("GET", "/accounts/9/users", &[], "")).await;
    assert_eq!(res.status(), StatusCode::OK);

    let event = seen.lock().unwrap().take().unwrap();
    assert!(event.path_parameters.is_empty());
    assert_eq!(event.path, "/accounts/9/users");
    assert_eq!(event.resource, "/users/{userId}");
}

#[tokio::test]
async fn constrained_and_mixed_placeholders_reach_the_handler() {
    let (adapter, seen) = capturing(AdapterConfig::new("/users/{id:[0-9]+}/files/{name}.json"));

    let res = adapter.handle(request("GET", "/users/12/files/report.json", &[], "")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let event = seen.lock().unwrap().take().unwrap();
    assert_eq!(event.path_param("id"), Some("12"));
    assert_eq!(event.path_param("name"), Some("report"));

    let res = adapter.handle(request("GET", "/users/ab/files/report.json", &[], "")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(seen.lock().unwrap().take().unwrap().path_parameters.is_empty());
}

#[tokio::test]
async fn malformed_template_degrades_to_empty_params() {
    let (adapter, seen) = capturing(AdapterConfig::new("/users/{userId"));

    let res = adapter.handle(request("GET", "/users/1", &[], "")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(seen.lock().unwrap().take().unwrap().path_parameters.is_empty());
}

#[tokio::test]
async fn response_headers_are_replayed_without_merging() {
    let adapter = ProxyAdapter::new(
        |_: ProxyRequest| async {
            let mut response = ProxyResponse::new(201, r#"{"ok":true}"#);
            response.headers.insert("H".into(), "a".into());
            response.multi_value_headers.insert("H".into(), vec!["b".into(), "c".into()]);
            response.multi_value_headers.insert("Set-Cookie".into(), vec!["s=1".into(), "t=2".into()]);
            Ok::<_, BoxError>(response)
        },
        AdapterConfig::new("/"),
    );

    let res = adapter.handle(request("GET", "/", &[], "")).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let h: Vec<_> = res.headers().get_all("H").iter().map(|v| v.to_str().unwrap()).collect();
    assert_eq!(h, ["a", "b", "c"]);
    let cookies: Vec<_> = res.headers().get_all("set-cookie").iter().map(|v| v.to_str().unwrap()).collect();
    assert_eq!(cookies, ["s=1", "t=2"]);
    assert_eq!(body_text(res).await, r#"{"ok":true}"#);
}

#[tokio::test]
async fn handler_error_is_a_generic_500() {
    let adapter = ProxyAdapter::new(
        |_: ProxyRequest| async { Err::<ProxyResponse, _>(anyhow::anyhow!("secret connection string")) },
        AdapterConfig::new("/"),
    );

    let res = adapter.handle(request("GET", "/", &[], "")).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(res).await, "error");
}

#[tokio::test]
async fn unexpected_output_shapes_are_a_generic_500() {
    let null = ProxyAdapter::new(
        |_: ProxyRequest| async { Ok::<_, BoxError>(serde_json::Value::Null) },
        AdapterConfig::new("/"),
    );
    let none = ProxyAdapter::new(
        |_: ProxyRequest| async { Ok::<Option<ProxyResponse>, BoxError>(None) },
        AdapterConfig::new("/"),
    );
    let default = ProxyAdapter::new(
        |_: ProxyRequest| async { Ok::<_, BoxError>(ProxyResponse::default()) },
        AdapterConfig::new("/"),
    );
    let invalid = ProxyAdapter::new(
        |_: ProxyRequest| async { Ok::<_, BoxError>(ProxyOutcome::Invalid) },
        AdapterConfig::new("/"),
    );

    for adapter in [null, none, default, invalid] {
        let res = adapter.handle(request("GET", "/", &[], "")).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(res).await, "error");
    }
}

#[tokio::test]
async fn json_value_output_is_replayed() {
    let adapter = ProxyAdapter::new(
        |req: ProxyRequest| async move {
            Ok::<_, BoxError>(json!({
                "statusCode": 202,
                "headers": {"X-Id": req.path_param("id").unwrap_or_default()},
                "body": "accepted"
            }))
        },
        AdapterConfig::new("/jobs/{id}"),
    );

    let res = adapter.handle(request("PUT", "/jobs/j-17", &[], "")).await;
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    assert_eq!(res.headers()["x-id"], "j-17");
    assert_eq!(body_text(res).await, "accepted");
}

#[tokio::test]
async fn panicking_handler_fails_only_its_request() {
    let adapter = ProxyAdapter::new(
        |req: ProxyRequest| async move {
            if req.path == "/boom" {
                panic!("handler bug");
            }
            Ok::<_, BoxError>(ProxyResponse::new(200, "fine"))
        },
        AdapterConfig::new("/{name}"),
    );

    let res = adapter.handle(request("GET", "/boom", &[], "")).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(res).await, "error");

    let res = adapter.handle(request("GET", "/calm", &[], "")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(res).await, "fine");
}

#[tokio::test]
async fn body_read_failure_skips_the_handler() {
    let invoked = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&invoked);
    let adapter = ProxyAdapter::new(
        move |_: ProxyRequest| {
            flag.store(true, Ordering::SeqCst);
            async { Ok::<_, BoxError>(ProxyResponse::new(200, "should not happen")) }
        },
        AdapterConfig::new("/"),
    );

    let req = http::Request::builder().method("POST").uri("/").body(FailingBody).unwrap();
    let res = adapter.handle(req).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(res).await, "error");
    assert!(!invoked.load(Ordering::SeqCst));
}

#[tokio::test]
async fn context_handler_sees_request_extensions() {
    #[derive(Clone)]
    struct TraceId(&'static str);

    let adapter = ProxyAdapter::with_context(
        |ctx: Context, _: ProxyRequest| async move {
            let trace = ctx.extensions().get::<TraceId>().map_or("none", |t| t.0);
            Ok::<_, BoxError>(ProxyResponse::new(200, trace))
        },
        AdapterConfig::new("/"),
    );

    let mut req = request("GET", "/", &[], "");
    req.extensions_mut().insert(TraceId("abc-123"));
    let res = adapter.handle(req).await;
    assert_eq!(body_text(res).await, "abc-123");
}

#[tokio::test]
async fn concurrent_requests_are_independent() {
    let adapter = ProxyAdapter::new(
        |req: ProxyRequest| async move {
            let id = req.path_param("id").unwrap_or_default().to_owned();
            tokio::task::yield_now().await;
            Ok::<_, BoxError>(ProxyResponse::new(200, id))
        },
        AdapterConfig::new("/items/{id}"),
    );

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..32 {
        let adapter = adapter.clone();
        tasks.spawn(async move {
            let res = adapter.handle(request("GET", &format!("/items/{i}"), &[], "")).await;
            (i, body_text(res).await)
        });
    }
    while let Some(joined) = tasks.join_next().await {
        let (i, body) = joined.unwrap();
        assert_eq!(body, i.to_string());
    }
}
