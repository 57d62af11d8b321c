//! HTTP dispatch front.
//!
//! One call to [`HttpFront::handle`] produces exactly one response:
//!
//! 1. Resolve `(unit, verb, operation)`; a miss answers 404.
//! 2. Run the operation's bolt. A stage that responded ends the request; a
//!    stage that failed is answered from its error.
//! 3. Merge the accumulator over the request body (contributions win) and
//!    invoke the operation.
//! 4. Dispatch the result or the error. If nothing was written by then, the
//!    front answers 500.
//!
//! Panics inside middleware or operations are caught at this boundary and
//! answered as internal errors.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures_util::FutureExt;
use hermes_core::{
    DispatchError, DispatchResult, Envelope, JsonMap, RequestParts, ResponseDispatcher,
    ResponseHandle, Verb, WrittenResponse,
};
use hermes_middleware::{BoltOutcome, MiddlewareSet};
use hermes_router::{DispatchTable, OperationInput, Outcome};
use http::header::CONTENT_TYPE;
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use serde_json::Value;

/// Path prefix of dispatchable operations.
pub const API_PREFIX: &str = "/api/";

/// HTTP response type produced by the front.
pub type HttpResponse = Response<Full<Bytes>>;

/// Splits `/api/{unit}/{operation}`.
///
/// ```rust
/// use hermes_server::split_api_path;
///
/// assert_eq!(split_api_path("/api/school/list"), Some(("school", "list")));
/// assert_eq!(split_api_path("/api/school"), None);
/// ```
#[must_use]
pub fn split_api_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix(API_PREFIX)?;
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    let (unit, operation) = rest.split_once('/')?;
    if unit.is_empty() || operation.is_empty() || operation.contains('/') {
        return None;
    }
    Some((unit, operation))
}

/// Parses a request body into a JSON object. An empty body is `{}`.
pub fn parse_body(bytes: &[u8]) -> DispatchResult<JsonMap> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(JsonMap::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DispatchError::validation("Request body must be a JSON object")),
        Err(e) => {
            tracing::debug!(error = %e, "malformed request body");
            Err(DispatchError::validation("Malformed JSON body"))
        }
    }
}

/// Builds the JSON response for a written envelope.
pub(crate) fn json_response(status: StatusCode, body: &Value) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    response
}

/// Writes `envelope` as a complete response.
pub(crate) fn envelope_response(envelope: Envelope) -> HttpResponse {
    let status = envelope.status();
    json_response(status, &envelope.into_body())
}

/// Routes HTTP calls through the dispatch table and middleware bolts.
#[derive(Debug, Clone)]
pub struct HttpFront {
    table: Arc<DispatchTable>,
    middleware: Arc<MiddlewareSet>,
}

impl HttpFront {
    /// Creates a front over a built table and instantiated middleware.
    #[must_use]
    pub fn new(table: Arc<DispatchTable>, middleware: MiddlewareSet) -> Self {
        Self {
            table,
            middleware: Arc::new(middleware),
        }
    }

    /// The dispatch table.
    #[must_use]
    pub fn table(&self) -> &Arc<DispatchTable> {
        &self.table
    }

    /// Serves a fully read request addressed by path.
    pub async fn serve(&self, request: Request<Bytes>, remote_addr: Option<SocketAddr>) -> HttpResponse {
        let (parts, body) = request.into_parts();
        let Some((unit, operation)) = split_api_path(parts.uri.path()) else {
            return envelope_response(Envelope::error(StatusCode::NOT_FOUND, "Not found").with_error("Not found"));
        };
        let body = match parse_body(&body) {
            Ok(body) => body,
            Err(error) => {
                record(unit, operation, StatusCode::BAD_REQUEST);
                return envelope_response(Envelope::from_error(&error));
            }
        };
        let mut request = RequestParts::new(parts.headers, body);
        if let Some(addr) = remote_addr {
            request = request.with_remote_addr(addr);
        }
        self.handle(unit, operation, &parts.method, request).await
    }

    /// Dispatches one call and returns its single response.
    pub async fn handle(
        &self,
        unit: &str,
        operation: &str,
        method: &Method,
        request: RequestParts,
    ) -> HttpResponse {
        let started = Instant::now();
        let request_id = request.request_id();
        let response = ResponseHandle::new();

        let dispatched = AssertUnwindSafe(self.dispatch(unit, operation, method, request, &response))
            .catch_unwind()
            .await;
        if dispatched.is_err() {
            tracing::error!(%request_id, unit, operation, "operation panicked");
            ResponseDispatcher::dispatch_error(&response, &DispatchError::internal("operation panicked"));
        }

        let written = response.take().unwrap_or_else(|| {
            tracing::error!(%request_id, unit, operation, "operation produced no response");
            WrittenResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: Envelope::from_error(&DispatchError::internal("no response written")).into_body(),
            }
        });

        tracing::info!(
            %request_id,
            unit,
            operation,
            status = written.status.as_u16(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "request completed"
        );
        record(unit, operation, written.status);
        metrics::histogram!("hermes_request_duration_seconds", "unit" => unit.to_string())
            .record(started.elapsed().as_secs_f64());
        json_response(written.status, &written.body)
    }

    async fn dispatch(
        &self,
        unit: &str,
        operation: &str,
        method: &Method,
        request: RequestParts,
        response: &ResponseHandle,
    ) {
        let request_id = request.request_id();
        let route = match self.table.resolve(unit, Verb::from_method(method), operation) {
            Ok(route) => route,
            Err(error) => {
                tracing::debug!(%request_id, %method, unit, operation, error = %error, "route not found");
                ResponseDispatcher::dispatch_error(response, &error);
                return;
            }
        };

        let bolt = match self.middleware.bolt(route.middleware) {
            Ok(bolt) => bolt,
            Err(error) => {
                tracing::error!(%request_id, unit, operation, error = %error, "middleware stack unavailable");
                ResponseDispatcher::dispatch_error(response, &error);
                return;
            }
        };

        let accumulator = match bolt.run(&request, response).await {
            BoltOutcome::Completed(accumulator) => accumulator,
            BoltOutcome::ShortCircuited { .. } => return,
            BoltOutcome::Failed { stage, error } => {
                report(request_id, unit, operation, &error, Some(&stage));
                ResponseDispatcher::dispatch_error(response, &error);
                return;
            }
        };

        let data = accumulator.merge_over(request.into_body());
        let input = OperationInput::new(data, response.clone()).with_request_id(request_id);
        match route.unit.invoke(route.operation, input).await {
            Ok(Outcome::Data(value)) => {
                ResponseDispatcher::dispatch(response, Envelope::ok(value));
            }
            Ok(Outcome::SelfHandled) => {}
            Err(error) => {
                report(request_id, unit, operation, &error, None);
                ResponseDispatcher::dispatch_error(response, &error);
            }
        }
    }
}

fn report(
    request_id: hermes_core::RequestId,
    unit: &str,
    operation: &str,
    error: &DispatchError,
    stage: Option<&str>,
) {
    if error.category().is_client_visible() {
        tracing::debug!(%request_id, unit, operation, stage, error = %error, "request rejected");
    } else {
        tracing::error!(%request_id, unit, operation, stage, error = ?error, "request failed");
    }
}

fn record(unit: &str, operation: &str, status: StatusCode) {
    metrics::counter!(
        "hermes_requests_total",
        "unit" => unit.to_string(),
        "operation" => operation.to_string(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_middleware::{Flow, FnMiddleware, Middleware, MiddlewareRegistry};
    use hermes_core::SharedContext;
    use hermes_router::Unit;
    use http_body_util::BodyExt;
    use serde_json::json;

    fn front() -> HttpFront {
        let unit = Unit::builder("school")
            .expose("get=get")
            .expose("post=create")
            .expose("post=selfish")
            .expose("post=lazy")
            .expose("post=regret")
            .expose("post=crash")
            .operation("get", "{ __tenant, schoolId }", |input| async move {
                Ok(Outcome::Data(json!({
                    "tenant": input.get("__tenant").cloned(),
                    "schoolId": input.get("schoolId").cloned(),
                })))
            })
            .operation("create", "{ name }", |input| async move {
                input.require_str("name")?;
                Err::<Outcome, _>(DispatchError::internal("disk full"))
            })
            .operation("selfish", "{}", |input| async move {
                ResponseDispatcher::dispatch(
                    input.response(),
                    Envelope::ok(json!({ "custom": true })).with_code(StatusCode::CREATED),
                );
                Ok(Outcome::SelfHandled)
            })
            .operation("lazy", "{}", |_input| async { Ok(Outcome::SelfHandled) })
            .operation("regret", "{}", |input| async move {
                ResponseDispatcher::dispatch(
                    input.response(),
                    Envelope::ok(json!({ "first": true })).with_code(StatusCode::CREATED),
                );
                Err::<Outcome, _>(DispatchError::internal("failed after responding"))
            })
            .operation("crash", "{}", |_input| async {
                if true {
                    panic!("boom");
                }
                Ok(Outcome::SelfHandled)
            })
            .build();

        let mut registry = MiddlewareRegistry::new();
        registry.register_instance(
            "__tenant",
            Arc::new(FnMiddleware::new("tenant", |_req, _acc| async {
                Ok(Flow::Continue(json!("acme")))
            })) as Arc<dyn Middleware>,
        );
        let table = DispatchTable::build([Arc::new(unit)], &registry).unwrap();
        let set = registry.instantiate(&SharedContext::new()).unwrap();
        HttpFront::new(Arc::new(table), set)
    }

    async fn call(front: &HttpFront, method: Method, path: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Bytes::from(body.to_string()))
            .unwrap();
        let response = front.serve(request, None).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_split_api_path() {
        assert_eq!(split_api_path("/api/a/b/"), Some(("a", "b")));
        assert_eq!(split_api_path("/api/a/b/c"), None);
        assert_eq!(split_api_path("/health"), None);
    }

    #[test]
    fn test_parse_body() {
        assert!(parse_body(b"").unwrap().is_empty());
        assert!(parse_body(b"  \n").unwrap().is_empty());
        assert!(parse_body(b"[1,2]").is_err());
        assert!(parse_body(b"{not json").is_err());
        assert_eq!(parse_body(br#"{"a":1}"#).unwrap()["a"], 1);
    }

    #[tokio::test]
    async fn test_contribution_overrides_body() {
        let (status, body) = call(
            &front(),
            Method::GET,
            "/api/school/get",
            r#"{"schoolId":"s1","__tenant":"spoofed"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({ "tenant": "acme", "schoolId": "s1" }));
    }

    #[tokio::test]
    async fn test_routing_misses() {
        let front = front();
        let (status, body) = call(&front, Method::GET, "/api/ghost/get", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Module ghost not found");

        let (status, body) = call(&front, Method::DELETE, "/api/school/get", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Method get not found for school");

        let (status, _) = call(&front, Method::OPTIONS, "/api/school/get", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_errors_by_category() {
        let front = front();
        let (status, body) = call(&front, Method::POST, "/api/school/create", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"], json!(["name is required"]));

        let (status, body) = call(&front, Method::POST, "/api/school/create", r#"{"name":"x"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");

        let (status, _) = call(&front, Method::POST, "/api/school/create", "[]").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_self_handled_and_missing_response() {
        let front = front();
        let (status, body) = call(&front, Method::POST, "/api/school/selfish", "").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["custom"], true);

        let (status, body) = call(&front, Method::POST, "/api/school/lazy", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_error_after_own_response_keeps_first_write() {
        let (status, body) = call(&front(), Method::POST, "/api/school/regret", "").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"], json!({ "first": true }));
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let (status, body) = call(&front(), Method::POST, "/api/school/crash", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }
}
