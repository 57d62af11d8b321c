//! Per-request middleware chain executor.
//!
//! A [`Bolt`] runs an operation's middleware strictly in declaration order.
//! Stages are never reordered or run concurrently: later stages may read
//! what earlier ones contributed. The bolt itself has no timeout; a stage
//! that never resolves stalls only its own request.

use std::sync::Arc;

use hermes_core::{DispatchError, RequestParts, ResponseDispatcher, ResponseHandle};

use crate::middleware::{Accumulator, Flow, Middleware};

/// Where a bolt is in its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoltState {
    /// Not started.
    Pending,
    /// Running the stage at this index.
    Running(usize),
    /// Every stage continued.
    Completed,
    /// A stage responded.
    ShortCircuited,
    /// A stage returned an error.
    Failed,
}

impl BoltState {
    /// Whether the bolt has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::ShortCircuited | Self::Failed)
    }
}

/// Terminal result of a bolt run. Exactly one is produced per run.
#[derive(Debug)]
pub enum BoltOutcome {
    /// All stages continued. The operation may run with this accumulator.
    Completed(Accumulator),
    /// A stage responded. The response is written; nothing else may run.
    ShortCircuited {
        /// The stage that responded.
        stage: String,
    },
    /// A stage failed. The caller answers the request.
    Failed {
        /// The stage that failed.
        stage: String,
        /// The error.
        error: DispatchError,
    },
}

/// One request's instantiated middleware chain.
pub struct Bolt {
    stages: Vec<(String, Arc<dyn Middleware>)>,
    state: BoltState,
}

impl Bolt {
    /// Creates a bolt over named stages.
    #[must_use]
    pub fn new(stages: Vec<(String, Arc<dyn Middleware>)>) -> Self {
        Self {
            stages,
            state: BoltState::Pending,
        }
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` for an empty chain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> BoltState {
        self.state
    }

    /// Runs the chain once.
    pub async fn run(mut self, request: &RequestParts, response: &ResponseHandle) -> BoltOutcome {
        self.execute(request, response).await
    }

    /// Runs the chain, leaving the final state readable on `self`.
    pub async fn execute(&mut self, request: &RequestParts, response: &ResponseHandle) -> BoltOutcome {
        debug_assert_eq!(self.state, BoltState::Pending, "a bolt runs once");
        let mut accumulator = Accumulator::new();
        let request_id = request.request_id();

        for (index, (name, middleware)) in self.stages.iter().enumerate() {
            self.state = BoltState::Running(index);

            if response.is_sent() {
                tracing::warn!(%request_id, stage = %name, "response written before stage ran");
                self.state = BoltState::ShortCircuited;
                return BoltOutcome::ShortCircuited { stage: name.clone() };
            }

            match middleware.process(request, &accumulator, response).await {
                Ok(Flow::Continue(contribution)) => {
                    if response.is_sent() {
                        tracing::debug!(%request_id, stage = %name, "stage wrote the response directly");
                        return self.short_circuit(name.clone());
                    }
                    tracing::debug!(%request_id, stage = %name, "stage continued");
                    accumulator.insert(name.clone(), contribution);
                }
                Ok(Flow::Respond(envelope)) => {
                    tracing::debug!(
                        %request_id,
                        stage = %name,
                        status = %envelope.status(),
                        "stage responded"
                    );
                    ResponseDispatcher::dispatch(response, envelope);
                    return self.short_circuit(name.clone());
                }
                Err(error) => {
                    tracing::warn!(%request_id, stage = %name, error = %error, "stage failed");
                    self.state = BoltState::Failed;
                    return BoltOutcome::Failed {
                        stage: name.clone(),
                        error,
                    };
                }
            }
        }

        self.state = BoltState::Completed;
        BoltOutcome::Completed(accumulator)
    }

    fn short_circuit(&mut self, stage: String) -> BoltOutcome {
        metrics::counter!("hermes_middleware_short_circuits_total", "stage" => stage.clone())
            .increment(1);
        self.state = BoltState::ShortCircuited;
        BoltOutcome::ShortCircuited { stage }
    }
}

impl std::fmt::Debug for Bolt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bolt")
            .field(
                "stages",
                &self.stages.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            )
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::FnMiddleware;
    use hermes_core::Envelope;
    use http::StatusCode;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn stage<F, Fut>(name: &str, f: F) -> (String, Arc<dyn Middleware>)
    where
        F: Fn(RequestParts, Accumulator) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = hermes_core::DispatchResult<Flow>> + Send + 'static,
    {
        (name.to_string(), Arc::new(FnMiddleware::new(name, f)))
    }

    /// Contributes what it saw of `__a`, so ordering is observable.
    fn observer(name: &str) -> (String, Arc<dyn Middleware>) {
        stage(name, |_req, acc: Accumulator| async move {
            Ok(Flow::Continue(json!({ "saw_a": acc.get("__a").cloned() })))
        })
    }

    fn contributor(name: &str, value: Value) -> (String, Arc<dyn Middleware>) {
        stage(name, move |_req, _acc| {
            let value = value.clone();
            async move { Ok(Flow::Continue(value)) }
        })
    }

    #[tokio::test]
    async fn test_empty_chain_completes_immediately() {
        let mut bolt = Bolt::new(Vec::new());
        let outcome = bolt.execute(&RequestParts::default(), &ResponseHandle::new()).await;
        match outcome {
            BoltOutcome::Completed(acc) => assert!(acc.is_empty()),
            other => panic!("expected Completed, got {other:?}"),
        }
        assert_eq!(bolt.state(), BoltState::Completed);
    }

    #[tokio::test]
    async fn test_later_stage_observes_earlier_contribution() {
        let bolt = Bolt::new(vec![contributor("__a", json!("A")), observer("__b")]);
        let BoltOutcome::Completed(acc) =
            bolt.run(&RequestParts::default(), &ResponseHandle::new()).await
        else {
            panic!("expected Completed");
        };
        assert_eq!(acc.get("__a"), Some(&json!("A")));
        assert_eq!(acc.get("__b"), Some(&json!({ "saw_a": "A" })));
    }

    #[tokio::test]
    async fn test_swapping_order_changes_observation() {
        let bolt = Bolt::new(vec![observer("__b"), contributor("__a", json!("A"))]);
        let BoltOutcome::Completed(acc) =
            bolt.run(&RequestParts::default(), &ResponseHandle::new()).await
        else {
            panic!("expected Completed");
        };
        assert_eq!(acc.get("__b"), Some(&json!({ "saw_a": null })));
    }

    #[tokio::test]
    async fn test_respond_short_circuits_and_skips_later_stages() {
        let later_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&later_calls);
        let later = stage("__later", move |_req, _acc| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Flow::Continue(Value::Null)) }
        });
        let gate = stage("__gate", |_req, _acc| async {
            Ok(Flow::Respond(Envelope::error(StatusCode::UNAUTHORIZED, "Unauthorized")))
        });

        let response = ResponseHandle::new();
        let mut bolt = Bolt::new(vec![gate, later]);
        let outcome = bolt.execute(&RequestParts::default(), &response).await;

        assert!(matches!(outcome, BoltOutcome::ShortCircuited { ref stage } if stage == "__gate"));
        assert_eq!(bolt.state(), BoltState::ShortCircuited);
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
        assert_eq!(response.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn test_direct_write_counts_as_short_circuit() {
        struct Writer;
        impl Middleware for Writer {
            fn name(&self) -> &str {
                "writer"
            }
            fn process<'a>(
                &'a self,
                _request: &'a RequestParts,
                _accumulator: &'a Accumulator,
                response: &'a ResponseHandle,
            ) -> hermes_core::BoxFuture<'a, hermes_core::DispatchResult<Flow>> {
                Box::pin(async move {
                    ResponseDispatcher::dispatch(response, Envelope::ok(json!({ "early": true })));
                    Ok(Flow::Continue(Value::Null))
                })
            }
        }

        let response = ResponseHandle::new();
        let bolt = Bolt::new(vec![("__writer".to_string(), Arc::new(Writer) as Arc<dyn Middleware>)]);
        let outcome = bolt.run(&RequestParts::default(), &response).await;
        assert!(matches!(outcome, BoltOutcome::ShortCircuited { .. }));
        assert_eq!(response.take().unwrap().body["data"], json!({ "early": true }));
    }

    #[tokio::test]
    async fn test_error_fails_without_writing() {
        let failing = stage("__boom", |_req, _acc| async {
            Err(DispatchError::internal("kaput"))
        });
        let response = ResponseHandle::new();
        let mut bolt = Bolt::new(vec![failing]);
        let outcome = bolt.execute(&RequestParts::default(), &response).await;
        match outcome {
            BoltOutcome::Failed { stage, error } => {
                assert_eq!(stage, "__boom");
                assert_eq!(error.client_message(), "Internal server error");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(bolt.state().is_terminal());
        assert!(!response.is_sent());
    }
}
