//! End-to-end checks of the in-memory client against a small front.

use std::sync::Arc;

use hermes_core::{DispatchError, SharedContext};
use hermes_middleware::{Flow, FnMiddleware, Middleware, MiddlewareRegistry};
use hermes_router::{DispatchTable, Outcome, Unit};
use hermes_server::HttpFront;
use hermes_test::TestClient;
use serde_json::{json, Value};

fn front() -> HttpFront {
    let mut registry = MiddlewareRegistry::new();
    registry.register_instance(
        "__caller",
        Arc::new(FnMiddleware::new("caller", |req: hermes_core::RequestParts, _acc| async move {
            match req.header("token") {
                Some(token) => Ok(Flow::Continue(json!(token))),
                None => Err(DispatchError::authentication("Unauthorized")),
            }
        })) as Arc<dyn Middleware>,
    );

    let unit = Unit::builder("echo")
        .expose("post=say")
        .expose("get=whoami")
        .operation("say", "{ text }", |input| async move {
            let text = input.require_str("text")?.to_string();
            Ok(Outcome::Data(json!({ "text": text })))
        })
        .operation("whoami", "{ __caller }", |input| async move {
            Ok(Outcome::Data(json!({ "caller": input.get("__caller").cloned() })))
        })
        .build();

    let table = DispatchTable::build([Arc::new(unit)], &registry).unwrap();
    let set = registry.instantiate(&SharedContext::new()).unwrap();
    HttpFront::new(Arc::new(table), set)
}

#[tokio::test]
async fn test_json_post() {
    let client = TestClient::new(front());
    let response = client
        .post("/api/echo/say")
        .json(&json!({ "text": "hi" }))
        .send()
        .await;
    response.assert_status(200).assert_ok();
    assert_eq!(response.data(), json!({ "text": "hi" }));
    assert_eq!(response.message(), "");
}

#[tokio::test]
async fn test_validation_error_envelope() {
    let client = TestClient::new(front());
    let response = client.post("/api/echo/say").json(&json!({})).send().await;
    response.assert_status(400);
    assert!(!response.ok());
    assert_eq!(response.errors(), ["text is required"]);
}

#[tokio::test]
async fn test_token_helper_and_default_headers() {
    let client = TestClient::new(front());
    client.get("/api/echo/whoami").send().await.assert_status(401);

    let response = client.get("/api/echo/whoami").token("abc").send().await;
    assert_eq!(response.data()["caller"], "abc");

    let client = client.with_default_header("token", "default");
    let response = client.get("/api/echo/whoami").send().await;
    assert_eq!(response.data()["caller"], "default");
}

#[tokio::test]
async fn test_raw_body_and_typed_json() {
    let client = TestClient::new(front());
    let response = client.post("/api/echo/say").body("{oops").send().await;
    response.assert_status(400);

    let body: Value = response.json().unwrap();
    assert_eq!(body["ok"], false);
}
