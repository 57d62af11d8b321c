//! Middleware contract.
//!
//! A [`Middleware`] inspects the request and everything earlier stages
//! contributed, then returns a [`Flow`]:
//!
//! - [`Flow::Continue`] carries the stage's contribution, which the bolt
//!   stores in the [`Accumulator`] under the middleware's registry name.
//! - [`Flow::Respond`] carries a terminal response. The bolt writes it and no
//!   later stage or operation runs.
//!
//! Returning `Err` marks the request failed; the dispatch front answers it.

use std::future::Future;

use hermes_core::{BoxFuture, DispatchError, DispatchResult, Envelope, JsonMap, RequestParts, ResponseHandle};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// What a middleware decided.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Continue with this contribution.
    Continue(Value),
    /// Stop and answer with this envelope.
    Respond(Envelope),
}

/// Per-request contributions, keyed by middleware name.
///
/// Owned by one request; discarded once it is answered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accumulator {
    entries: JsonMap,
}

impl Accumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a contribution. A later contribution under the same name
    /// replaces the earlier one.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(name.into(), value);
    }

    /// A contribution by middleware name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Deserializes a contribution.
    pub fn decode<T: DeserializeOwned>(&self, name: &str) -> DispatchResult<Option<T>> {
        self.entries
            .get(name)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(|e| DispatchError::internal_with_source(format!("malformed {name}"), e))
    }

    /// Number of contributions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was contributed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Contribution names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Shallow merge: `body` fields first, contributions override on
    /// collision.
    #[must_use]
    pub fn merge_over(self, mut body: JsonMap) -> JsonMap {
        for (key, value) in self.entries {
            if body.contains_key(&key) {
                tracing::debug!(key = %key, "middleware contribution overrides body field");
            }
            body.insert(key, value);
        }
        body
    }
}

/// One stage of an operation's middleware chain.
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Runs the stage.
    ///
    /// The response handle is shared with the rest of the request. A stage
    /// that writes through it directly is treated as having responded.
    fn process<'a>(
        &'a self,
        request: &'a RequestParts,
        accumulator: &'a Accumulator,
        response: &'a ResponseHandle,
    ) -> BoxFuture<'a, DispatchResult<Flow>>;
}

/// Middleware from a closure over owned request data.
pub struct FnMiddleware<F> {
    name: String,
    f: F,
}

impl<F, Fut> FnMiddleware<F>
where
    F: Fn(RequestParts, Accumulator) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DispatchResult<Flow>> + Send + 'static,
{
    /// Wraps a closure.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(RequestParts, Accumulator) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DispatchResult<Flow>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process<'a>(
        &'a self,
        request: &'a RequestParts,
        accumulator: &'a Accumulator,
        _response: &'a ResponseHandle,
    ) -> BoxFuture<'a, DispatchResult<Flow>> {
        Box::pin((self.f)(request.clone(), accumulator.clone()))
    }
}

impl<F> std::fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnMiddleware")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_overrides_body_on_collision() {
        let body = json!({ "name": "x", "__shortToken": "raw" })
            .as_object()
            .cloned()
            .unwrap();
        let mut acc = Accumulator::new();
        acc.insert("__shortToken", json!({ "userId": 1 }));

        let merged = acc.merge_over(body);
        assert_eq!(merged["__shortToken"], json!({ "userId": 1 }));
        assert_eq!(merged["name"], "x");
    }

    #[test]
    fn test_decode_contribution() {
        let mut acc = Accumulator::new();
        acc.insert("__n", json!(5));
        assert_eq!(acc.decode::<u32>("__n").unwrap(), Some(5));
        assert_eq!(acc.decode::<u32>("__missing").unwrap(), None);
        assert!(acc.decode::<String>("__n").is_err());
    }

    #[tokio::test]
    async fn test_fn_middleware() {
        let mw = FnMiddleware::new("echo", |req: RequestParts, _acc| async move {
            Ok(Flow::Continue(json!(req.header("x-echo"))))
        });
        assert_eq!(mw.name(), "echo");
        let flow = mw
            .process(&RequestParts::default(), &Accumulator::new(), &ResponseHandle::new())
            .await
            .unwrap();
        assert_eq!(flow, Flow::Continue(Value::Null));
    }
}
