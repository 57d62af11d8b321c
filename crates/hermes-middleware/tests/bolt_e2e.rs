//! Table-driven middleware resolution through the standard registry.

use std::sync::Arc;

use hermes_auth::{LongTokenClaims, TokenConfig, TokenService};
use hermes_core::{JsonMap, RequestParts, ResponseHandle, SharedContext, Verb};
use hermes_middleware::stages::{standard_registry, TOKEN_HEADER};
use hermes_middleware::BoltOutcome;
use hermes_router::{DispatchTable, Outcome, Unit};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde_json::json;

fn tokens() -> Arc<TokenService> {
    Arc::new(TokenService::new(&TokenConfig::new("long-secret", "short-secret")))
}

fn school_unit() -> Arc<Unit> {
    Arc::new(
        Unit::builder("school")
            .expose("get=get")
            .operation("get", "{ __shortToken, __device, schoolId }", |_input| async {
                Ok(Outcome::Data(json!({})))
            })
            .build(),
    )
}

fn request_with_token(token: &str) -> RequestParts {
    let mut headers = HeaderMap::new();
    headers.insert(TOKEN_HEADER, HeaderValue::from_str(token).unwrap());
    headers.insert("user-agent", HeaderValue::from_static("itest"));
    RequestParts::new(headers, JsonMap::new())
}

#[tokio::test]
async fn test_stack_runs_in_declaration_order() {
    let tokens = tokens();
    let registry = standard_registry();
    let table = DispatchTable::build([school_unit()], &registry).unwrap();
    let set = registry
        .instantiate(&SharedContext::new().with(Arc::clone(&tokens)))
        .unwrap();

    let route = table.resolve("school", Some(Verb::Get), "get").unwrap();
    assert_eq!(route.middleware, ["__shortToken", "__device"]);

    let short = tokens
        .gen_short_token(
            &LongTokenClaims::new("u-1", "k-1").with_role("superadmin"),
            "sess",
            "dev",
        )
        .unwrap();
    let bolt = set.bolt(route.middleware).unwrap();
    let BoltOutcome::Completed(acc) = bolt
        .run(&request_with_token(&short), &ResponseHandle::new())
        .await
    else {
        panic!("expected Completed");
    };
    assert_eq!(acc.names().collect::<Vec<_>>(), ["__shortToken", "__device"]);
    assert_eq!(acc.get("__device").unwrap()["agent"], "itest");
}

#[tokio::test]
async fn test_bad_token_short_circuits_before_device() {
    let registry = standard_registry();
    let set = registry
        .instantiate(&SharedContext::new().with(tokens()))
        .unwrap();
    let bolt = set
        .bolt(&["__shortToken".to_string(), "__device".to_string()])
        .unwrap();

    let response = ResponseHandle::new();
    let outcome = bolt.run(&request_with_token("garbage"), &response).await;
    assert!(matches!(outcome, BoltOutcome::ShortCircuited { ref stage } if stage == "__shortToken"));

    let written = response.take().unwrap();
    assert_eq!(written.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        written.body,
        json!({ "ok": false, "data": {}, "errors": ["Unauthorized"], "message": "Unauthorized" })
    );
}

#[test]
fn test_unknown_marker_fails_table_build() {
    let unit = Arc::new(
        Unit::builder("school")
            .expose("post=create")
            .operation("create", "{ __shortToken, __quota }", |_input| async {
                Ok(Outcome::Data(json!({})))
            })
            .build(),
    );
    let err = DispatchTable::build([unit], &standard_registry()).unwrap_err();
    assert!(err.to_string().contains("__quota"));
}
