//! Bus dispatch front.
//!
//! Subscribes to every bus message and hands each one to the target unit's
//! interceptor in its own task. Whatever happens, the message's reply fires
//! once:
//!
//! | Situation                          | Reply                                            |
//! |------------------------------------|--------------------------------------------------|
//! | interceptor replied                | its value                                        |
//! | target not found                   | `{ "error": "Module U or method O not found" }`  |
//! | interceptor returned an error      | `{ "error": "Failed to execute O: msg" }`        |
//! | interceptor panicked               | `{ "error": "Failed to execute O: panicked" }`   |
//! | interceptor returned without reply | the reply's drop fallback                        |

use std::sync::Arc;

use hermes_core::{DispatchError, ErrorCategory};
use hermes_router::{BusCall, DispatchTable};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bus::{BusHandle, BusMessage};

/// Running bus front.
#[derive(Debug)]
pub struct BusFront {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl BusFront {
    /// Subscribes to `bus` and starts dispatching into `table`'s units.
    #[must_use]
    pub fn spawn(bus: BusHandle, table: Arc<DispatchTable>) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut subscription = bus.subscribe_all();
        let task = tokio::spawn(async move {
            tracing::info!(units = table.len(), "bus front started");
            while let Some(message) = subscription.recv_or_shutdown(&shutdown_rx).await {
                let table = Arc::clone(&table);
                tokio::spawn(handle_message(table, message));
            }
            tracing::info!("bus front stopped");
        });
        Self { shutdown, task }
    }

    /// Stops accepting messages. Tasks already started run to completion.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "bus front task failed");
        }
    }
}

async fn handle_message(table: Arc<DispatchTable>, message: Arc<BusMessage>) {
    let envelope = &message.envelope;
    let unit_name = envelope.target_unit.clone();
    let operation = envelope.target_operation.clone();
    let reply = message.reply.clone();

    let Some(unit) = table
        .unit(&unit_name)
        .filter(|unit| unit.has_interceptor())
        .cloned()
    else {
        tracing::warn!(unit = %unit_name, operation = %operation, "bus target not found");
        reply.send_error(format!("Module {unit_name} or method {operation} not found"));
        record(&unit_name, &operation, "not_found");
        return;
    };

    let call = BusCall {
        operation: operation.clone(),
        data: envelope.data.clone(),
        meta: envelope.meta.clone(),
        reply: reply.clone(),
    };
    drop(message);

    let outcome = match tokio::spawn(unit.intercept(call)).await {
        Ok(Ok(())) => "replied",
        Ok(Err(error)) if error.category() == ErrorCategory::Routing => {
            tracing::warn!(unit = %unit_name, operation = %operation, "bus operation not found");
            reply.send_error(format!("Module {unit_name} or method {operation} not found"));
            "not_found"
        }
        Ok(Err(error)) => {
            report_failure(&unit_name, &operation, &error);
            reply.send_error(format!(
                "Failed to execute {operation}: {}",
                error.client_message()
            ));
            "failed"
        }
        Err(join_error) => {
            tracing::error!(
                unit = %unit_name,
                operation = %operation,
                error = %join_error,
                "bus interceptor panicked"
            );
            reply.send_error(format!("Failed to execute {operation}: panicked"));
            "panicked"
        }
    };
    record(&unit_name, &operation, outcome);
}

fn report_failure(unit: &str, operation: &str, error: &DispatchError) {
    if error.category().is_client_visible() {
        tracing::debug!(unit, operation, error = %error, "bus call rejected");
    } else {
        tracing::error!(unit, operation, error = ?error, "bus call failed");
    }
}

fn record(unit: &str, operation: &str, outcome: &'static str) {
    metrics::counter!(
        "hermes_bus_messages_total",
        "unit" => unit.to_string(),
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
