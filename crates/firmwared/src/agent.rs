// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Request handling actor
//!
//! All requests funnel through one command channel and are processed one at
//! a time, so an upgrade or reset blocks the queue for its whole duration —
//! the mutual exclusion of the two operations holds by construction. For
//! the destructive operations the response is sent before the operation
//! runs (ack-then-act): the outcome outlives the request.

use crate::error::FirmwareError;
use crate::executor::Executor;
use crate::inspector::Inspector;
use crate::store::{FirmwareRecord, Store};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub code: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { code: 200, body }
    }

    pub fn bad_request(message: &str) -> Self {
        Self {
            code: 400,
            body: serde_json::json!({ "message": message }),
        }
    }

    fn internal_error() -> Self {
        Self {
            code: 500,
            body: serde_json::json!({ "message": "Unknown error." }),
        }
    }
}

#[derive(Debug)]
pub enum Command {
    Get { reply: oneshot::Sender<ApiResponse> },
    Check { reply: oneshot::Sender<ApiResponse> },
    Put {
        body: Vec<u8>,
        reply: oneshot::Sender<ApiResponse>,
    },
}

#[derive(Debug)]
pub struct Agent {
    record: FirmwareRecord,
    store: Store,
    inspector: Inspector,
    executor: Executor,
}

impl Agent {
    pub fn new(
        record: FirmwareRecord,
        store: Store,
        inspector: Inspector,
        executor: Executor,
    ) -> Self {
        Self {
            record,
            store,
            inspector,
            executor,
        }
    }

    /// Drain the command channel until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Get { reply } => {
                    let _ = reply.send(self.get());
                }
                Command::Check { reply } => {
                    let _ = reply.send(self.check());
                }
                Command::Put { body, reply } => {
                    self.put(&body, reply).await;
                }
            }
        }
    }

    /// GET /system/firmware — refresh the version and return the record.
    fn get(&mut self) -> ApiResponse {
        self.record.version = match self.inspector.current_version() {
            Ok(version) => version,
            Err(e) => {
                warn!("Version query failed, reporting empty version: {e}");
                String::new()
            }
        };

        match serde_json::to_value(&self.record) {
            Ok(body) => ApiResponse::ok(body),
            Err(e) => {
                error!("Cannot serialize firmware record: {e}");
                ApiResponse::internal_error()
            }
        }
    }

    /// GET /system/firmware/check — distinct messages per failure kind.
    fn check(&self) -> ApiResponse {
        match self.inspector.check_for_update(self.record.server.as_deref()) {
            Ok(check) => match serde_json::to_value(&check) {
                Ok(body) => ApiResponse::ok(body),
                Err(e) => {
                    error!("Cannot serialize check result: {e}");
                    ApiResponse::internal_error()
                }
            },
            Err(FirmwareError::UpdateCheckFailed(e)) => {
                warn!("Update check failed: {e}");
                ApiResponse::bad_request("Update failed.")
            }
            Err(FirmwareError::FirmwareNotInstalled) => {
                warn!("Firmware package not installed");
                ApiResponse::bad_request("Firmware not installed.")
            }
            Err(e) => {
                warn!("Update check failed with unknown error: {e}");
                ApiResponse::bad_request("Unknown error.")
            }
        }
    }

    /// PUT /system/firmware — reset, server update, or upgrade, evaluated
    /// in that order. Reset and upgrade acknowledge before they act.
    async fn put(&mut self, body: &[u8], reply: oneshot::Sender<ApiResponse>) {
        let Some(data) = parse_put_body(body) else {
            let _ = reply.send(ApiResponse::bad_request("Invalid Input."));
            return;
        };

        if data.get("reset").and_then(Value::as_i64) == Some(1) {
            let _ = reply.send(ApiResponse::ok(Value::Null));
            self.executor.reset_to_factory_default(&mut self.record).await;
            return;
        }

        if let Some(server) = data.get("server").and_then(Value::as_str) {
            self.record.server = Some(server.to_string());
            if let Err(e) = self.store.save(&self.record) {
                error!("Cannot persist server update: {e}");
                let _ = reply.send(ApiResponse::internal_error());
                return;
            }
        }

        if data.get("upgrade").and_then(Value::as_i64) == Some(1) {
            let _ = reply.send(ApiResponse::ok(Value::Null));
            self.executor.upgrade(&mut self.record).await;
            return;
        }

        let _ = reply.send(ApiResponse::ok(Value::Null));
    }
}

/// A PUT body must be a JSON object naming at least one of `reset`,
/// `upgrade`, or `server`.
fn parse_put_body(body: &[u8]) -> Option<Map<String, Value>> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let object = value.as_object()?;
    if ["reset", "upgrade", "server"]
        .iter()
        .any(|key| object.contains_key(*key))
    {
        Some(object.clone())
    } else {
        None
    }
}
