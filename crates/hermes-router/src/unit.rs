//! Units: named groups of operations.
//!
//! A [`Unit`] declares which operations it exposes (`"verb=name"` strings),
//! registers a handler plus parameter manifest per operation, and optionally
//! an interceptor that makes it reachable over the bus.
//!
//! ```rust
//! use hermes_router::{Outcome, Unit};
//! use serde_json::json;
//!
//! let unit = Unit::builder("echo")
//!     .expose("get=ping")
//!     .operation("ping", "{ message }", |input| async move {
//!         Ok(Outcome::Data(json!({ "pong": input.get("message").cloned() })))
//!     })
//!     .build();
//!
//! assert_eq!(unit.name(), "echo");
//! assert!(unit.signature("ping").is_some());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use hermes_core::{
    BoxFuture, DispatchError, DispatchResult, JsonMap, Reply, RequestId, ResponseHandle,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::signature::Signature;

/// Merged input handed to an operation.
#[derive(Debug, Clone)]
pub struct OperationInput {
    data: JsonMap,
    response: ResponseHandle,
    request_id: Option<RequestId>,
    meta: Value,
}

impl OperationInput {
    /// Creates input from merged data and the transport response handle.
    #[must_use]
    pub fn new(data: JsonMap, response: ResponseHandle) -> Self {
        Self {
            data,
            response,
            request_id: None,
            meta: Value::Null,
        }
    }

    /// Input with a detached response handle, as used by bus calls.
    #[must_use]
    pub fn detached(data: JsonMap) -> Self {
        Self::new(data, ResponseHandle::new())
    }

    /// Tags the input with the originating request id.
    #[must_use]
    pub fn with_request_id(mut self, id: RequestId) -> Self {
        self.request_id = Some(id);
        self
    }

    /// Attaches bus message metadata.
    #[must_use]
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }

    /// Bus message metadata. `null` for HTTP calls.
    #[must_use]
    pub const fn meta(&self) -> &Value {
        &self.meta
    }

    /// Originating request id, for HTTP calls.
    #[must_use]
    pub const fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    /// A merged field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// A string field.
    #[must_use]
    pub fn str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// A string field that must be present and non-empty.
    pub fn require_str(&self, key: &str) -> DispatchResult<&str> {
        match self.str(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(DispatchError::validation(format!("{key} is required"))),
        }
    }

    /// Deserializes a middleware contribution (or any field).
    pub fn contribution<T: DeserializeOwned>(&self, key: &str) -> DispatchResult<T> {
        let value = self
            .data
            .get(key)
            .ok_or_else(|| DispatchError::internal(format!("missing contribution {key}")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| DispatchError::internal_with_source(format!("malformed {key}"), e))
    }

    /// All merged data.
    #[must_use]
    pub const fn data(&self) -> &JsonMap {
        &self.data
    }

    /// Consumes the input, returning merged data.
    #[must_use]
    pub fn into_data(self) -> JsonMap {
        self.data
    }

    /// Transport response handle. Operations that write through it directly
    /// return [`Outcome::SelfHandled`].
    #[must_use]
    pub const fn response(&self) -> &ResponseHandle {
        &self.response
    }
}

/// What an operation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Result data, dispatched as `{ ok: true, data }`.
    Data(Value),
    /// The operation wrote its own response.
    SelfHandled,
}

/// Erased operation handler.
pub type OperationFn =
    Arc<dyn Fn(OperationInput) -> BoxFuture<'static, DispatchResult<Outcome>> + Send + Sync>;

/// A bus message delivered to a unit's interceptor.
#[derive(Debug, Clone)]
pub struct BusCall {
    /// Target operation name.
    pub operation: String,
    /// Message payload.
    pub data: Value,
    /// Message metadata.
    pub meta: Value,
    /// Reply callback.
    pub reply: Reply,
}

/// Erased bus interceptor.
pub type InterceptorFn =
    Arc<dyn Fn(Arc<Unit>, BusCall) -> BoxFuture<'static, DispatchResult<()>> + Send + Sync>;

/// One registered operation.
#[derive(Clone)]
pub struct Operation {
    signature: Signature,
    handler: OperationFn,
}

impl Operation {
    /// The operation's parameter manifest.
    #[must_use]
    pub const fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Calls the handler.
    pub fn call(&self, input: OperationInput) -> BoxFuture<'static, DispatchResult<Outcome>> {
        (self.handler)(input)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// A named business-logic component.
pub struct Unit {
    name: String,
    exposed: Vec<String>,
    operations: HashMap<String, Operation>,
    interceptor: Option<InterceptorFn>,
}

impl Unit {
    /// Starts building a unit.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> UnitBuilder {
        UnitBuilder {
            name: name.into(),
            exposed: Vec::new(),
            operations: HashMap::new(),
            interceptor: None,
        }
    }

    /// Unit name, used as the first path segment.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exposed descriptor strings in declaration order.
    #[must_use]
    pub fn exposed(&self) -> &[String] {
        &self.exposed
    }

    /// A registered operation.
    #[must_use]
    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    /// Manifest of a registered operation.
    #[must_use]
    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.operations.get(name).map(Operation::signature)
    }

    /// Invokes an operation by name.
    pub async fn invoke(&self, name: &str, input: OperationInput) -> DispatchResult<Outcome> {
        let operation = self
            .operations
            .get(name)
            .ok_or_else(|| DispatchError::operation_not_found(&self.name, name))?;
        operation.call(input).await
    }

    /// Whether the unit accepts bus messages.
    #[must_use]
    pub fn has_interceptor(&self) -> bool {
        self.interceptor.is_some()
    }

    /// Runs the interceptor for a bus message.
    ///
    /// Returns a routing error when the unit has no interceptor.
    pub async fn intercept(self: Arc<Self>, call: BusCall) -> DispatchResult<()> {
        let interceptor = self.interceptor.clone().ok_or_else(|| {
            DispatchError::routing(format!(
                "Module {} or method {} not found",
                self.name, call.operation
            ))
        })?;
        interceptor(self, call).await
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut operations: Vec<&String> = self.operations.keys().collect();
        operations.sort();
        f.debug_struct("Unit")
            .field("name", &self.name)
            .field("exposed", &self.exposed)
            .field("operations", &operations)
            .field("interceptor", &self.interceptor.is_some())
            .finish()
    }
}

/// Builder for [`Unit`].
pub struct UnitBuilder {
    name: String,
    exposed: Vec<String>,
    operations: HashMap<String, Operation>,
    interceptor: Option<InterceptorFn>,
}

impl UnitBuilder {
    /// Exposes an operation, `"verb=name"` or `"name"`.
    #[must_use]
    pub fn expose(mut self, descriptor: impl Into<String>) -> Self {
        self.exposed.push(descriptor.into());
        self
    }

    /// Registers an operation handler with its parameter manifest.
    #[must_use]
    pub fn operation<F, Fut>(mut self, name: impl Into<String>, signature: impl Into<Signature>, handler: F) -> Self
    where
        F: Fn(OperationInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult<Outcome>> + Send + 'static,
    {
        let handler: OperationFn = Arc::new(move |input| Box::pin(handler(input)));
        self.operations.insert(
            name.into(),
            Operation {
                signature: signature.into(),
                handler,
            },
        );
        self
    }

    /// Registers an operation that calls a method on shared state.
    #[must_use]
    pub fn method<S, F, Fut>(
        self,
        name: impl Into<String>,
        signature: impl Into<Signature>,
        state: &Arc<S>,
        method: F,
    ) -> Self
    where
        S: Send + Sync + 'static,
        F: Fn(Arc<S>, OperationInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult<Outcome>> + Send + 'static,
    {
        let state = Arc::clone(state);
        self.operation(name, signature, move |input| method(Arc::clone(&state), input))
    }

    /// Installs a custom bus interceptor.
    #[must_use]
    pub fn interceptor<F, Fut>(mut self, interceptor: F) -> Self
    where
        F: Fn(Arc<Unit>, BusCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult<()>> + Send + 'static,
    {
        self.interceptor = Some(Arc::new(move |unit, call| Box::pin(interceptor(unit, call))));
        self
    }

    /// Installs the standard interceptor: the named operation is invoked with
    /// the message data and its result is the reply.
    ///
    /// Bus calls skip middleware. The bus is an internal transport and its
    /// callers supply trusted values directly in `data`.
    #[must_use]
    pub fn intercept_operations(self) -> Self {
        self.interceptor(|unit: Arc<Unit>, call: BusCall| async move {
            let data = match call.data {
                Value::Object(map) => map,
                Value::Null => JsonMap::new(),
                other => {
                    return Err(DispatchError::validation(format!(
                        "bus payload must be an object, got {other}"
                    )))
                }
            };
            let input = OperationInput::detached(data).with_meta(call.meta);
            let response = input.response().clone();
            match unit.invoke(&call.operation, input).await? {
                Outcome::Data(value) => {
                    call.reply.send(value);
                }
                Outcome::SelfHandled => {
                    let body = response.take().map_or_else(|| json!({}), |w| w.body);
                    call.reply.send(body);
                }
            }
            Ok(())
        })
    }

    /// Finishes the unit.
    #[must_use]
    pub fn build(self) -> Unit {
        Unit {
            name: self.name,
            exposed: self.exposed,
            operations: self.operations,
            interceptor: self.interceptor,
        }
    }
}
