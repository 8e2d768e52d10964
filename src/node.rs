//! Health-tracking wrapper around a single Neo RPC endpoint.
//!
//! Every call made through a [`Node`] is benchmarked as a side effect: the
//! node counts in-flight requests, records the round trip of successful calls,
//! remembers the last reported chain height and client version, and flips its
//! activity flag on each completion. Callers never drive this bookkeeping
//! themselves.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, SystemTime},
};

use serde_json::Value;
use tokio::{sync::broadcast, time::Instant};
use tracing::debug;

use crate::{
    config::NodeConfig,
    errors::{NodeError, TransportError},
    events::{event_channel, EventSink, NodeEvent},
    transport::{HttpTransport, RpcTransport},
};

/// RPC method returning the current block count.
pub const GET_BLOCK_COUNT: &str = "getblockcount";
/// RPC method returning a block by height.
pub const GET_BLOCK: &str = "getblock";
/// RPC method returning the node's version information.
pub const GET_VERSION: &str = "getversion";

/// Snapshot of the health metadata derived for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMeta {
    /// Endpoint URL.
    pub endpoint: String,
    /// `None` until the first call completes, then whether it succeeded.
    pub is_active: Option<bool>,
    /// Calls started but not yet completed.
    pub pending_requests: usize,
    /// Round trip of the last successful call, in milliseconds.
    pub latency_ms: Option<u64>,
    /// Height last reported by `getblockcount`.
    pub block_height: Option<u64>,
    /// Completion time of the last call, successful or not.
    pub last_seen: Option<SystemTime>,
    /// Client software last reported by `getversion`.
    pub user_agent: Option<String>,
}

impl NodeMeta {
    /// Metadata of an endpoint nothing has been observed for yet.
    pub fn unknown(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            is_active: None,
            pending_requests: 0,
            latency_ms: None,
            block_height: None,
            last_seen: None,
            user_agent: None,
        }
    }
}

#[derive(Debug, Default)]
struct NodeState {
    is_active: Option<bool>,
    pending_requests: usize,
    latency_ms: Option<u64>,
    block_height: Option<u64>,
    last_seen: Option<SystemTime>,
    user_agent: Option<String>,
}

/// Metadata extracted from a successful result.
#[derive(Debug, Default)]
struct Observation {
    block_height: Option<u64>,
    user_agent: Option<String>,
}

impl Observation {
    fn from_result(method: &str, result: &Value) -> Result<Self, TransportError> {
        match method {
            GET_BLOCK_COUNT => {
                let height = result.as_u64().ok_or_else(|| {
                    TransportError::MalformedResponse(format!(
                        "expected a non-negative integer height, got {result}"
                    ))
                })?;
                Ok(Self {
                    block_height: Some(height),
                    ..Self::default()
                })
            }
            GET_VERSION => Ok(Self {
                user_agent: result
                    .get("useragent")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                ..Self::default()
            }),
            _ => Ok(Self::default()),
        }
    }
}

/// A Neo RPC endpoint together with the health metadata observed while using it.
pub struct Node {
    endpoint: String,
    transport: Arc<dyn RpcTransport>,
    state: Mutex<NodeState>,
    events: EventSink,
    sink: Option<EventSink>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("endpoint", &self.endpoint)
            .field("state", &*self.state())
            .finish_non_exhaustive()
    }
}

impl Node {
    /// Creates a node that sends its calls through `transport`.
    pub fn new(endpoint: impl Into<String>, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport,
            state: Mutex::new(NodeState::default()),
            events: event_channel(),
            sink: None,
            next_id: AtomicU64::new(0),
        }
    }

    /// Creates a node backed by its own [`HttpTransport`].
    pub fn http(endpoint: impl Into<String>, cfg: &NodeConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(cfg.request_timeout)?;
        Ok(Self::new(endpoint, Arc::new(transport)))
    }

    /// Additionally publishes this node's events into `sink`.
    pub fn with_event_sink(mut self, sink: EventSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_active(&self) -> Option<bool> {
        self.state().is_active
    }

    pub fn latency_ms(&self) -> Option<u64> {
        self.state().latency_ms
    }

    pub fn block_height(&self) -> Option<u64> {
        self.state().block_height
    }

    pub fn pending_requests(&self) -> usize {
        self.state().pending_requests
    }

    /// Returns a consistent snapshot of all derived metadata.
    pub fn meta(&self) -> NodeMeta {
        let state = self.state();
        NodeMeta {
            endpoint: self.endpoint.clone(),
            is_active: state.is_active,
            pending_requests: state.pending_requests,
            latency_ms: state.latency_ms,
            block_height: state.block_height,
            last_seen: state.last_seen,
            user_agent: state.user_agent.clone(),
        }
    }

    /// Subscribes to this node's call lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    /// Gets the current block count and records it as the node's height.
    pub async fn get_block_count(&self) -> Result<u64, NodeError> {
        debug!(endpoint = %self.endpoint, "get_block_count");

        let (_, observed) = self.call(GET_BLOCK_COUNT, Vec::new()).await?;
        observed.block_height.ok_or_else(|| NodeError::Rpc {
            endpoint: self.endpoint.clone(),
            method: GET_BLOCK_COUNT.to_string(),
            source: TransportError::MalformedResponse("missing block height".into()),
        })
    }

    /// Gets the block at `height`.
    ///
    /// `verbose` asks the node for the decoded JSON form instead of the
    /// serialized hex string. A negative height is rejected without touching
    /// the network.
    pub async fn get_block(&self, height: i64, verbose: bool) -> Result<Value, NodeError> {
        debug!(endpoint = %self.endpoint, height, "get_block");

        if height < 0 {
            return Err(NodeError::Validation(format!(
                "block height must be a non-negative integer, got {height}"
            )));
        }

        let verbose_key = if verbose { 1 } else { 0 };
        self.query(GET_BLOCK, vec![Value::from(height), Value::from(verbose_key)])
            .await
    }

    /// Gets the verbose form of the block at `height`.
    pub async fn get_block_verbose(&self, height: i64) -> Result<Value, NodeError> {
        self.get_block(height, true).await
    }

    /// Gets the node's version information and records its user agent.
    pub async fn get_version(&self) -> Result<Value, NodeError> {
        debug!(endpoint = %self.endpoint, "get_version");
        self.query(GET_VERSION, Vec::new()).await
    }

    /// Sends an arbitrary RPC call and returns its `result` payload.
    ///
    /// The call is benchmarked like every other: it counts as pending until the
    /// transport resolves and its outcome updates the node's health metadata.
    /// Failures are returned as-is, without retrying.
    pub async fn query(&self, method: &str, params: Vec<Value>) -> Result<Value, NodeError> {
        let (result, _) = self.call(method, params).await?;
        Ok(result)
    }

    async fn call(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<(Value, Observation), NodeError> {
        let call = self.start_call(method);
        let started = Instant::now();

        let outcome = self
            .transport
            .send(&self.endpoint, method, params, call.id)
            .await
            .and_then(|result| {
                let observed = Observation::from_result(method, &result)?;
                Ok((result, observed))
            });

        match outcome {
            Ok((result, observed)) => {
                call.succeed(started.elapsed(), &observed);
                Ok((result, observed))
            }
            Err(source) => {
                call.fail(&source);
                Err(NodeError::Rpc {
                    endpoint: self.endpoint.clone(),
                    method: method.to_string(),
                    source,
                })
            }
        }
    }

    fn start_call<'a>(&'a self, method: &'a str) -> PendingCall<'a> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.state().pending_requests += 1;

        debug!(endpoint = %self.endpoint, method, id, "query started");
        self.emit(NodeEvent::QueryStarted {
            endpoint: self.endpoint.clone(),
            method: method.to_string(),
            id,
        });

        PendingCall {
            node: self,
            method,
            id,
            finished: false,
        }
    }

    fn state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: NodeEvent) {
        if let Some(sink) = &self.sink {
            let _ = sink.send(event.clone());
        }
        let _ = self.events.send(event);
    }
}

/// An in-flight call.
///
/// Closes the call exactly once: through `succeed`/`fail`, or on drop if the
/// caller abandoned the future before the transport resolved.
struct PendingCall<'a> {
    node: &'a Node,
    method: &'a str,
    id: u64,
    finished: bool,
}

impl PendingCall<'_> {
    fn succeed(mut self, latency: Duration, observed: &Observation) {
        self.finished = true;
        let node = self.node;
        let latency_ms = latency.as_millis() as u64;

        {
            let mut state = node.state();
            state.pending_requests = state.pending_requests.saturating_sub(1);
            state.latency_ms = Some(latency_ms);
            state.last_seen = Some(SystemTime::now());
            state.is_active = Some(true);
            if let Some(height) = observed.block_height {
                state.block_height = Some(height);
            }
            if let Some(user_agent) = &observed.user_agent {
                state.user_agent = Some(user_agent.clone());
            }
        }

        debug!(
            endpoint = %node.endpoint,
            method = self.method,
            id = self.id,
            latency_ms,
            "query succeeded"
        );
        node.emit(NodeEvent::QuerySucceeded {
            endpoint: node.endpoint.clone(),
            method: self.method.to_string(),
            id: self.id,
            latency,
            block_height: observed.block_height,
            user_agent: observed.user_agent.clone(),
        });
    }

    fn fail(mut self, error: &TransportError) {
        self.finished = true;
        let node = self.node;

        {
            let mut state = node.state();
            state.pending_requests = state.pending_requests.saturating_sub(1);
            state.last_seen = Some(SystemTime::now());
            state.is_active = Some(false);
        }

        debug!(
            endpoint = %node.endpoint,
            method = self.method,
            id = self.id,
            %error,
            "query failed"
        );
        node.emit(NodeEvent::QueryFailed {
            endpoint: node.endpoint.clone(),
            method: self.method.to_string(),
            id: self.id,
            error: error.to_string(),
        });
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let node = self.node;
        {
            let mut state = node.state();
            state.pending_requests = state.pending_requests.saturating_sub(1);
        }

        debug!(endpoint = %node.endpoint, method = self.method, id = self.id, "query cancelled");
        node.emit(NodeEvent::QueryCancelled {
            endpoint: node.endpoint.clone(),
            method: self.method.to_string(),
            id: self.id,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct Scripted {
        replies: Mutex<VecDeque<Result<Value, TransportError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Value, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RpcTransport for Scripted {
        async fn send(
            &self,
            _endpoint: &str,
            _method: &str,
            _params: Vec<Value>,
            _id: u64,
        ) -> Result<Value, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::MalformedResponse("script empty".into())))
        }
    }

    struct Hanging;

    #[async_trait]
    impl RpcTransport for Hanging {
        async fn send(
            &self,
            _endpoint: &str,
            _method: &str,
            _params: Vec<Value>,
            _id: u64,
        ) -> Result<Value, TransportError> {
            futures::future::pending().await
        }
    }

    fn remote_error() -> TransportError {
        TransportError::Remote {
            code: -32603,
            message: "internal error".into(),
        }
    }

    #[test]
    fn fresh_node_has_unknown_health() {
        let node = Node::new("http://a", Scripted::new(vec![]));
        let meta = node.meta();

        assert_eq!(meta.endpoint, "http://a");
        assert_eq!(meta.is_active, None);
        assert_eq!(meta.pending_requests, 0);
        assert_eq!(meta.latency_ms, None);
        assert_eq!(meta.block_height, None);
        assert_eq!(meta.last_seen, None);
        assert_eq!(meta.user_agent, None);
    }

    #[test]
    fn http_node_starts_idle() {
        let cfg = NodeConfig::default();
        let node = Node::http("http://seed1.neo.org:20332", &cfg).unwrap();

        assert_eq!(node.endpoint(), "http://seed1.neo.org:20332");
        assert_eq!(node.pending_requests(), 0);
        assert_eq!(node.is_active(), None);
    }

    #[tokio::test]
    async fn successful_block_count_updates_height() {
        let node = Node::new("http://a", Scripted::new(vec![Ok(json!(1_234_567))]));

        let height = node.get_block_count().await.unwrap();

        let meta = node.meta();
        assert_eq!(height, 1_234_567);
        assert_eq!(meta.block_height, Some(1_234_567));
        assert_eq!(meta.is_active, Some(true));
        assert!(meta.latency_ms.is_some());
        assert!(meta.last_seen.is_some());
        assert_eq!(meta.pending_requests, 0);
    }

    #[tokio::test]
    async fn failure_keeps_previous_metadata() {
        let node = Node::new(
            "http://a",
            Scripted::new(vec![Ok(json!(100)), Err(remote_error())]),
        );

        node.get_block_count().await.unwrap();
        let latency = node.latency_ms();

        let err = node.get_block_count().await.unwrap_err();
        assert!(matches!(
            err,
            NodeError::Rpc {
                source: TransportError::Remote { code: -32603, .. },
                ..
            }
        ));

        let meta = node.meta();
        assert_eq!(meta.is_active, Some(false));
        assert_eq!(meta.block_height, Some(100));
        assert_eq!(meta.latency_ms, latency);
        assert_eq!(meta.pending_requests, 0);
    }

    #[tokio::test]
    async fn non_integer_height_is_a_failed_call() {
        let node = Node::new("http://a", Scripted::new(vec![Ok(json!("tall"))]));

        let err = node.get_block_count().await.unwrap_err();

        assert!(matches!(
            err,
            NodeError::Rpc {
                source: TransportError::MalformedResponse(_),
                ..
            }
        ));
        assert_eq!(node.is_active(), Some(false));
        assert_eq!(node.block_height(), None);
    }

    #[tokio::test]
    async fn version_updates_user_agent() {
        let node = Node::new(
            "http://a",
            Scripted::new(vec![Ok(json!({
                "tcpport": 10333,
                "nonce": 1_830_245_934,
                "useragent": "/Neo:3.6.2/"
            }))]),
        );

        let version = node.get_version().await.unwrap();

        assert_eq!(version["tcpport"], json!(10333));
        assert_eq!(node.meta().user_agent.as_deref(), Some("/Neo:3.6.2/"));
        assert_eq!(node.block_height(), None);
    }

    #[tokio::test]
    async fn negative_height_is_rejected_before_the_network() {
        let transport = Scripted::new(vec![Ok(json!({}))]);
        let node = Node::new("http://a", transport.clone());

        let err = node.get_block(-1, true).await.unwrap_err();

        assert!(matches!(err, NodeError::Validation(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(node.is_active(), None);
        assert_eq!(node.pending_requests(), 0);
    }

    #[tokio::test]
    async fn events_pair_start_with_completion() {
        let node = Node::new(
            "http://a",
            Scripted::new(vec![Ok(json!(5)), Err(remote_error())]),
        );
        let mut rx = node.subscribe();

        node.get_block_count().await.unwrap();
        node.get_block_count().await.unwrap_err();

        let events: Vec<NodeEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(events.len(), 4);

        assert!(matches!(&events[0], NodeEvent::QueryStarted { id: 0, .. }));
        assert!(matches!(
            &events[1],
            NodeEvent::QuerySucceeded {
                id: 0,
                block_height: Some(5),
                ..
            }
        ));
        assert!(matches!(&events[2], NodeEvent::QueryStarted { id: 1, .. }));
        assert!(matches!(&events[3], NodeEvent::QueryFailed { id: 1, .. }));
    }

    #[tokio::test]
    async fn external_sink_receives_events() {
        let sink = event_channel();
        let mut rx = sink.subscribe();
        let node = Node::new("http://a", Scripted::new(vec![Ok(json!(9))])).with_event_sink(sink);

        node.get_block_count().await.unwrap();

        let started = rx.try_recv().unwrap();
        let finished = rx.try_recv().unwrap();
        assert_eq!(started.endpoint(), "http://a");
        assert!(!started.is_completion());
        assert!(finished.is_completion());
        assert_eq!(started.id(), finished.id());
    }

    #[tokio::test]
    async fn dropped_call_releases_pending_slot() {
        let node = Arc::new(Node::new("http://a", Arc::new(Hanging)));
        let mut rx = node.subscribe();

        let task = tokio::spawn({
            let node = node.clone();
            async move { node.get_block_count().await }
        });

        while node.pending_requests() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(node.pending_requests(), 1);

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert_eq!(node.pending_requests(), 0);
        assert_eq!(node.is_active(), None);
        assert!(matches!(rx.try_recv().unwrap(), NodeEvent::QueryStarted { .. }));
        assert!(matches!(rx.try_recv().unwrap(), NodeEvent::QueryCancelled { .. }));
    }

    #[tokio::test]
    async fn pending_count_tracks_concurrent_calls() {
        let node = Arc::new(Node::new("http://a", Arc::new(Hanging)));

        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let node = node.clone();
                tokio::spawn(async move { node.get_version().await })
            })
            .collect();

        while node.pending_requests() < 3 {
            tokio::task::yield_now().await;
        }
        assert_eq!(node.pending_requests(), 3);

        tasks[0].abort();
        while node.pending_requests() != 2 {
            tokio::task::yield_now().await;
        }

        for task in &tasks[1..] {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }
        assert_eq!(node.pending_requests(), 0);
    }
}
