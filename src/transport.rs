//! JSON-RPC transport used by [`Node`](crate::node::Node).
//!
//! The node only needs "send method and params to an endpoint, get a result or
//! an error"; latency is measured by the node around the call. Anything that
//! implements [`RpcTransport`] can stand in for the default HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::errors::TransportError;

/// Sends a single JSON-RPC request to an endpoint.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Sends `method` with `params` to `endpoint` and returns the `result` payload.
    async fn send(
        &self,
        endpoint: &str,
        method: &str,
        params: Vec<Value>,
        id: u64,
    ) -> Result<Value, TransportError>;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a [Value],
    id: u64,
}

/// JSON-RPC 2.0 over HTTP POST.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport whose requests time out after `request_timeout`.
    pub fn new(request_timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self { http })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(
        &self,
        endpoint: &str,
        method: &str,
        params: Vec<Value>,
        id: u64,
    ) -> Result<Value, TransportError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params: &params,
            id,
        };

        let response = self.http.post(endpoint).json(&request).send().await?;
        let status = response.status();

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(TransportError::MalformedResponse(format!(
                    "http status {status}"
                )))
            }
            Err(e) => return Err(e.into()),
        };

        parse_response(body)
    }
}

/// Extracts the `result` member of a JSON-RPC response body.
pub fn parse_response(mut body: Value) -> Result<Value, TransportError> {
    let Some(obj) = body.as_object_mut() else {
        return Err(TransportError::MalformedResponse(
            "response is not a JSON object".into(),
        ));
    };

    if let Some(error) = obj.remove("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(TransportError::Remote { code, message });
    }

    obj.remove("result")
        .ok_or_else(|| TransportError::MalformedResponse("missing `result` member".into()))
}
