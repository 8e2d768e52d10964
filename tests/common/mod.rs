use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use neo_node_pool::{RpcTransport, TransportError};
use serde_json::{json, Value};

#[derive(Debug, Clone)]
enum Behavior {
    Healthy { height: u64, delay: Duration },
    Failing,
}

/// In-memory transport answering per endpoint from a mutable script.
///
/// Endpoints without a script fail like an unreachable host.
#[derive(Default)]
pub struct MockTransport {
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answers `getblockcount` with `height` after `delay`.
    pub fn healthy(&self, endpoint: &str, height: u64, delay: Duration) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), Behavior::Healthy { height, delay });
    }

    pub fn failing(&self, endpoint: &str) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), Behavior::Failing);
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn send(
        &self,
        endpoint: &str,
        method: &str,
        params: Vec<Value>,
        _id: u64,
    ) -> Result<Value, TransportError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(endpoint.to_string())
            .or_default() += 1;

        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(endpoint)
            .cloned()
            .unwrap_or(Behavior::Failing);

        match behavior {
            Behavior::Failing => Err(TransportError::Remote {
                code: -1,
                message: "connection refused".into(),
            }),
            Behavior::Healthy { height, delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }

                Ok(match method {
                    "getblockcount" => json!(height),
                    "getversion" => json!({ "tcpport": 20333, "useragent": "/Neo:3.6.2/" }),
                    "getblock" => json!({ "index": params[0], "confirmations": 1 }),
                    _ => Value::Null,
                })
            }
        }
    }
}
