use std::{
    cmp::Reverse,
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, OnceLock,
    },
    time::Duration,
};

use rand::Rng;
use serde_json::Value;
use tokio::{
    sync::{broadcast, oneshot},
    task::{JoinHandle, JoinSet},
    time::{self, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    config::{Network, PoolConfig},
    errors::{NodeError, PoolError},
    events::{event_channel, EventSink, NodeEvent},
    node::{Node, NodeMeta},
    transport::{HttpTransport, RpcTransport},
};

/// Rule used to pick the node calls are dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionPolicy {
    /// The first configured endpoint.
    Default,
    /// The active node with the lowest observed latency.
    Fastest,
    /// The active node reporting the greatest block height.
    Highest,
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::Default => f.write_str("default"),
            SelectionPolicy::Fastest => f.write_str("fastest"),
            SelectionPolicy::Highest => f.write_str("highest"),
        }
    }
}

/// One configured endpoint; its node is built the first time it is needed.
struct NodeSlot {
    endpoint: String,
    node: OnceLock<Arc<Node>>,
}

struct PoolInner {
    slots: Vec<NodeSlot>,
    current: AtomicUsize,
    transport: Arc<dyn RpcTransport>,
    sink: EventSink,
}

impl PoolInner {
    fn node_at(&self, idx: usize) -> Arc<Node> {
        let slot = &self.slots[idx];
        slot.node
            .get_or_init(|| {
                debug!(idx, endpoint = %slot.endpoint, "initializing node");
                Arc::new(
                    Node::new(slot.endpoint.clone(), self.transport.clone())
                        .with_event_sink(self.sink.clone()),
                )
            })
            .clone()
    }

    fn initialized(&self) -> impl Iterator<Item = (usize, &Arc<Node>)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.node.get().map(|node| (idx, node)))
    }

    fn fastest_index(&self) -> usize {
        self.initialized()
            .filter_map(|(idx, node)| {
                let meta = node.meta();
                match (meta.is_active, meta.latency_ms) {
                    (Some(true), Some(latency)) => Some((idx, latency)),
                    _ => None,
                }
            })
            .min_by_key(|&(_, latency)| latency)
            .map_or(0, |(idx, _)| idx)
    }

    fn highest_index(&self) -> usize {
        // min_by_key keeps the first of equal keys, max_by_key the last.
        self.initialized()
            .filter_map(|(idx, node)| {
                let meta = node.meta();
                match (meta.is_active, meta.block_height) {
                    (Some(true), Some(height)) => Some((idx, height)),
                    _ => None,
                }
            })
            .min_by_key(|&(_, height)| Reverse(height))
            .map_or(0, |(idx, _)| idx)
    }

    fn index_for(&self, policy: SelectionPolicy) -> usize {
        match policy {
            SelectionPolicy::Default => 0,
            SelectionPolicy::Fastest => self.fastest_index(),
            SelectionPolicy::Highest => self.highest_index(),
        }
    }

    fn random_index(&self) -> usize {
        rand::thread_rng().gen_range(0..self.slots.len())
    }

    async fn diagnose(&self, idx: usize) {
        let node = self.node_at(idx);
        debug!(idx, endpoint = node.endpoint(), "=> diagnostic sample");

        match node.get_block_count().await {
            Ok(height) => debug!(
                idx,
                endpoint = node.endpoint(),
                height,
                latency_ms = ?node.latency_ms(),
                "<= diagnostic sample"
            ),
            Err(error) => debug!(
                idx,
                endpoint = node.endpoint(),
                %error,
                "<= diagnostic sample failed"
            ),
        }
    }

    fn log_leaderboard(&self) {
        let fastest = self.node_at(self.fastest_index());
        let highest = self.node_at(self.highest_index());

        info!(
            endpoint = fastest.endpoint(),
            latency_ms = ?fastest.latency_ms(),
            pending_requests = fastest.pending_requests(),
            "fastest node"
        );
        info!(
            endpoint = highest.endpoint(),
            block_height = ?highest.block_height(),
            pending_requests = highest.pending_requests(),
            "highest node"
        );
    }
}

struct DiagnosticTask {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

/// A pool of Neo RPC nodes with background health sampling and policy-based
/// selection.
///
/// Calls made through the pool go to the *current* node, which starts out as
/// the first configured endpoint and only changes through the `set_*`
/// operations. Selection reads the health metadata every node accumulates
/// from the calls made through it, whether issued by the caller or by the
/// diagnostic sampler.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// use neo_node_pool::{NodePool, PoolConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = NodePool::new(PoolConfig::testnet())?;
///
/// tokio::time::sleep(Duration::from_secs(10)).await;
/// pool.set_highest_node();
///
/// let height = pool.get_block_count().await?;
/// println!("{} is at height {height}", pool.current_node_url());
/// # Ok(())
/// # }
/// ```
pub struct NodePool {
    inner: Arc<PoolInner>,
    network: Network,
    diagnostics: Option<DiagnosticTask>,
}

impl fmt::Debug for NodePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodePool")
            .field("network", &self.network)
            .field("nodes", &self.nodes_meta())
            .field("current", &self.current_index())
            .field("diagnostics", &self.diagnostics.is_some())
            .finish()
    }
}

impl NodePool {
    /// Creates a pool whose nodes talk JSON-RPC over HTTP.
    ///
    /// When `config.diagnostic_interval` is non-zero the diagnostic sampler is
    /// started immediately, which requires a running tokio runtime.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let transport = HttpTransport::new(config.node.request_timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a pool whose nodes send their calls through `transport`.
    pub fn with_transport(
        config: PoolConfig,
        transport: Arc<dyn RpcTransport>,
    ) -> Result<Self, PoolError> {
        let endpoints = config.resolved_endpoints();
        if endpoints.is_empty() {
            return Err(PoolError::NoEndpoints);
        }

        let runtime = if config.diagnostic_interval.is_zero() {
            None
        } else {
            Some(tokio::runtime::Handle::try_current().map_err(|_| PoolError::NoRuntime)?)
        };

        let slots = endpoints
            .into_iter()
            .map(|endpoint| NodeSlot {
                endpoint,
                node: OnceLock::new(),
            })
            .collect();

        let inner = Arc::new(PoolInner {
            slots,
            current: AtomicUsize::new(0),
            transport,
            sink: config.event_sink.unwrap_or_else(event_channel),
        });

        info!(
            network = %config.network,
            nodes = inner.slots.len(),
            diagnostic_interval = ?config.diagnostic_interval,
            "node pool initialized"
        );

        let mut pool = Self {
            inner,
            network: config.network,
            diagnostics: None,
        };
        pool.set_default_node();

        if let Some(runtime) = runtime {
            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            let handle = runtime.spawn(run_diagnostics(
                pool.inner.clone(),
                config.diagnostic_interval,
                config.leaderboard_interval,
                shutdown_rx,
            ));
            pool.diagnostics = Some(DiagnosticTask {
                shutdown: Some(shutdown_tx),
                handle,
            });
        }

        Ok(pool)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Number of configured endpoints.
    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    /// Always `false`: construction rejects empty endpoint lists.
    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }

    /// Configured endpoint URLs in pool order.
    pub fn endpoints(&self) -> Vec<&str> {
        self.inner
            .slots
            .iter()
            .map(|slot| slot.endpoint.as_str())
            .collect()
    }

    /// Returns the node at `idx`, initializing it on first access.
    pub fn node(&self, idx: usize) -> Option<Arc<Node>> {
        (idx < self.len()).then(|| self.inner.node_at(idx))
    }

    /// Health snapshot of every endpoint in pool order.
    ///
    /// Endpoints whose node has not been initialized yet report unknown health.
    pub fn nodes_meta(&self) -> Vec<NodeMeta> {
        self.inner
            .slots
            .iter()
            .map(|slot| match slot.node.get() {
                Some(node) => node.meta(),
                None => NodeMeta::unknown(slot.endpoint.clone()),
            })
            .collect()
    }

    /// Subscribes to the call events of every node in the pool.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.inner.sink.subscribe()
    }

    /// Whether the diagnostic sampler is running.
    pub fn is_diagnosing(&self) -> bool {
        self.diagnostics
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    pub fn set_default_node(&self) {
        self.set_node(SelectionPolicy::Default);
    }

    pub fn set_fastest_node(&self) {
        self.set_node(SelectionPolicy::Fastest);
    }

    pub fn set_highest_node(&self) {
        self.set_node(SelectionPolicy::Highest);
    }

    /// Makes the node chosen by `policy` the current node.
    pub fn set_node(&self, policy: SelectionPolicy) {
        let idx = self.inner.index_for(policy);
        let node = self.inner.node_at(idx);
        self.inner.current.store(idx, Ordering::Relaxed);

        debug!(%policy, idx, endpoint = node.endpoint(), "current node set");
    }

    /// Returns the active node with the lowest latency.
    ///
    /// Falls back to the first endpoint when no node is active. Ties go to the
    /// node configured first.
    pub fn get_fastest_node(&self) -> Arc<Node> {
        self.select(SelectionPolicy::Fastest)
    }

    /// Returns the active node reporting the greatest block height.
    ///
    /// Falls back to the first endpoint when no node is active. Ties go to the
    /// node configured first.
    pub fn get_highest_node(&self) -> Arc<Node> {
        self.select(SelectionPolicy::Highest)
    }

    /// Returns the node `policy` would pick, without making it current.
    pub fn select(&self, policy: SelectionPolicy) -> Arc<Node> {
        self.inner.node_at(self.inner.index_for(policy))
    }

    pub fn current_index(&self) -> usize {
        self.inner.current.load(Ordering::Relaxed)
    }

    pub fn current_node(&self) -> Arc<Node> {
        self.inner.node_at(self.current_index())
    }

    pub fn current_node_url(&self) -> String {
        self.current_node().endpoint().to_string()
    }

    /// Gets the block count from the current node.
    pub async fn get_block_count(&self) -> Result<u64, NodeError> {
        self.current_node().get_block_count().await
    }

    /// Gets the verbose block at `height` from the current node.
    pub async fn get_block(&self, height: i64) -> Result<Value, NodeError> {
        self.current_node().get_block(height, true).await
    }

    /// Gets version information from the current node.
    pub async fn get_version(&self) -> Result<Value, NodeError> {
        self.current_node().get_version().await
    }

    /// Sends an arbitrary RPC call through the current node.
    pub async fn query(&self, method: &str, params: Vec<Value>) -> Result<Value, NodeError> {
        self.current_node().query(method, params).await
    }

    /// Runs one diagnostic sample against a randomly chosen node and waits
    /// for it to complete.
    ///
    /// A failed sample only marks the node inactive. Returns the index of the
    /// sampled node.
    pub async fn diagnose_random_node(&self) -> usize {
        let idx = self.inner.random_index();
        self.inner.diagnose(idx).await;
        idx
    }

    /// Stops the diagnostic sampler and aborts samples still in flight.
    pub async fn shutdown(&mut self) {
        let Some(mut task) = self.diagnostics.take() else {
            return;
        };

        if let Some(tx) = task.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = task.handle.await {
            if e.is_panic() {
                warn!("diagnostic sampler panicked: {e}");
            }
        }

        info!(network = %self.network, "diagnostic sampler stopped");
    }
}

impl Drop for NodePool {
    fn drop(&mut self) {
        if let Some(task) = self.diagnostics.take() {
            task.handle.abort();
        }
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => futures::future::pending().await,
    }
}

fn periodic(period: Duration) -> Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Samples one random node per period until `shutdown` fires.
///
/// Samples are spawned rather than awaited so a slow endpoint never delays
/// the next one.
async fn run_diagnostics(
    inner: Arc<PoolInner>,
    period: Duration,
    leaderboard: Option<Duration>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut sampler = periodic(period);
    let mut leaderboard = leaderboard.filter(|p| !p.is_zero()).map(periodic);
    let mut samples = JoinSet::new();

    info!(?period, "diagnostic sampler started");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = sampler.tick() => {
                let idx = inner.random_index();
                let inner = inner.clone();
                samples.spawn(async move { inner.diagnose(idx).await });
            }
            Some(joined) = samples.join_next(), if !samples.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        warn!("diagnostic sample panicked: {e}");
                    }
                }
            }
            _ = tick(&mut leaderboard) => inner.log_leaderboard(),
        }
    }

    samples.shutdown().await;
}
