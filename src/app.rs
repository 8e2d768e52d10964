//! Application state and logic for the TUI dashboard.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::{Duration, Instant},
};

use neo_node_pool::{Network, NodeEvent, NodeMeta, NodePool, PoolConfig, SelectionPolicy};

/// RPC method to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Fetch the current block count.
    BlockCount,
    /// Fetch the node's version information.
    Version,
    /// Fetch the newest block the node knows about.
    LatestBlock,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::BlockCount => "getblockcount",
            Method::Version => "getversion",
            Method::LatestBlock => "getblock (latest)",
        }
    }
}

/// Node a manual call is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The pool's current node.
    Current,
    /// The node highlighted in the table.
    Selected,
}

/// Events emitted by RPC operations.
#[derive(Debug)]
pub enum AppEvent {
    /// An RPC call completed.
    RpcFinished {
        endpoint: String,
        latency_ms: f64,
        ok: bool,
        message: String,
    },
}

/// Main application state for the TUI.
pub struct App {
    pub pool: Arc<NodePool>,
    pub network: Network,
    pub diagnostic_interval: Duration,
    pub nodes: Vec<NodeMeta>,
    pub selected_idx: usize,
    pub policy: SelectionPolicy,
    pub method: Method,
    pub last_message: String,
    pub last_endpoint: Option<String>,
    pub last_latency_ms: Option<f64>,
    pub batch_mode: bool,
    pub batch_count: usize,
    pub batch_current: usize,
    pub session_start: Instant,
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_errors: u64,
    pub completions_seen: u64,
    pub latency_history: HashMap<String, VecDeque<u64>>,
    pub call_timestamps: VecDeque<Instant>,
}

impl App {
    pub fn new(pool: NodePool, cfg: &PoolConfig) -> Self {
        let nodes = pool.nodes_meta();

        let mut latency_history = HashMap::new();
        for meta in &nodes {
            latency_history.insert(meta.endpoint.clone(), VecDeque::with_capacity(100));
        }

        Self {
            pool: Arc::new(pool),
            network: cfg.network,
            diagnostic_interval: cfg.diagnostic_interval,
            nodes,
            selected_idx: 0,
            policy: SelectionPolicy::Default,
            method: Method::BlockCount,
            last_message: String::from(
                "Gathering node health. Press 'f'/'h' to pick a node or 'r' to run a call",
            ),
            last_endpoint: None,
            last_latency_ms: None,
            batch_mode: false,
            batch_count: 10,
            batch_current: 0,
            session_start: Instant::now(),
            total_calls: 0,
            total_successes: 0,
            total_errors: 0,
            completions_seen: 0,
            latency_history,
            call_timestamps: VecDeque::with_capacity(1000),
        }
    }

    pub fn next_node(&mut self) {
        if !self.nodes.is_empty() {
            self.selected_idx = (self.selected_idx + 1) % self.nodes.len();
        }
    }

    pub fn prev_node(&mut self) {
        if !self.nodes.is_empty() {
            if self.selected_idx == 0 {
                self.selected_idx = self.nodes.len() - 1;
            } else {
                self.selected_idx -= 1;
            }
        }
    }

    pub fn toggle_method(&mut self) {
        self.method = match self.method {
            Method::BlockCount => Method::Version,
            Method::Version => Method::LatestBlock,
            Method::LatestBlock => Method::BlockCount,
        };
    }

    /// Re-selects the pool's current node using `policy`.
    pub fn apply_policy(&mut self, policy: SelectionPolicy) {
        self.pool.set_node(policy);
        self.policy = policy;
        self.last_message = format!(
            "Policy '{}': current node is now {}",
            policy,
            self.pool.current_node_url()
        );
    }

    pub fn toggle_batch_mode(&mut self) {
        self.batch_mode = !self.batch_mode;
        if self.batch_mode {
            self.batch_current = 0;
            self.last_message = format!("Batch mode ON: {} calls queued", self.batch_count);
        } else {
            self.last_message = "Batch mode OFF".to_string();
        }
    }

    pub fn increase_batch_count(&mut self) {
        self.batch_count = (self.batch_count + 10).min(1000);
    }

    pub fn decrease_batch_count(&mut self) {
        self.batch_count = (self.batch_count.saturating_sub(10)).max(10);
    }

    pub fn reset_stats(&mut self) {
        self.total_calls = 0;
        self.total_successes = 0;
        self.total_errors = 0;
        self.completions_seen = 0;
        self.call_timestamps.clear();
        for history in self.latency_history.values_mut() {
            history.clear();
        }
        self.last_message = "Stats reset".to_string();
    }

    /// Pulls a fresh health snapshot from the pool.
    pub fn refresh_nodes(&mut self) {
        self.nodes = self.pool.nodes_meta();
    }

    /// Feeds a pool event into the latency trends and the completion count.
    ///
    /// Covers diagnostic samples as well as calls made from the dashboard.
    pub fn record_event(&mut self, event: &NodeEvent) {
        if let NodeEvent::QuerySucceeded {
            endpoint, latency, ..
        } = event
        {
            self.completions_seen += 1;
            let history = self
                .latency_history
                .entry(endpoint.clone())
                .or_insert_with(|| VecDeque::with_capacity(100));
            history.push_back(latency.as_millis() as u64);
            if history.len() > 100 {
                history.pop_front();
            }
        } else if event.is_completion() {
            self.completions_seen += 1;
        }
    }

    pub fn set_last_result(&mut self, endpoint: String, latency_ms: f64, ok: bool, message: String) {
        self.last_endpoint = Some(endpoint);
        self.last_latency_ms = Some(latency_ms);

        self.total_calls += 1;
        if ok {
            self.total_successes += 1;
        } else {
            self.total_errors += 1;
        }

        self.call_timestamps.push_back(Instant::now());
        if self.call_timestamps.len() > 1000 {
            self.call_timestamps.pop_front();
        }

        let status = if ok { "✓" } else { "✗" };
        self.last_message = format!("{} {} ({:.0} ms)", status, message, latency_ms);

        if self.batch_mode {
            self.batch_current += 1;
            if self.batch_current >= self.batch_count {
                self.batch_mode = false;
                self.last_message = format!("Batch complete! {} calls finished", self.batch_count);
            }
        }
    }

    pub fn selected_endpoint(&self) -> Option<&str> {
        self.nodes.get(self.selected_idx).map(|m| m.endpoint.as_str())
    }

    pub fn current_idx(&self) -> usize {
        self.pool.current_index()
    }

    pub fn should_run_call(&self) -> bool {
        self.batch_mode && self.batch_current < self.batch_count
    }

    /// Greatest height reported by any active node.
    pub fn best_height(&self) -> Option<u64> {
        self.nodes
            .iter()
            .filter(|m| m.is_active == Some(true))
            .filter_map(|m| m.block_height)
            .max()
    }

    pub fn active_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|m| m.is_active == Some(true))
            .count()
    }

    pub fn session_uptime(&self) -> Duration {
        self.session_start.elapsed()
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_calls > 0 {
            (self.total_successes as f64 / self.total_calls as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn calls_per_second(&self) -> f64 {
        let now = Instant::now();
        let one_sec_ago = now - Duration::from_secs(1);

        self.call_timestamps
            .iter()
            .filter(|&&ts| ts > one_sec_ago)
            .count() as f64
    }

    pub fn average_latency(&self) -> f64 {
        let mut total = 0u64;
        let mut count = 0usize;

        for history in self.latency_history.values() {
            for &latency in history {
                total += latency;
                count += 1;
            }
        }

        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        let cfg = PoolConfig::new(Network::Testnet).with_endpoints(["http://a", "http://b"]);
        let pool = NodePool::new(cfg.clone()).unwrap();
        App::new(pool, &cfg)
    }

    fn started(endpoint: &str, id: u64) -> NodeEvent {
        NodeEvent::QueryStarted {
            endpoint: endpoint.into(),
            method: "getblockcount".into(),
            id,
        }
    }

    #[test]
    fn every_completion_is_counted_once() {
        let mut app = app();

        app.record_event(&started("http://a", 0));
        app.record_event(&NodeEvent::QuerySucceeded {
            endpoint: "http://a".into(),
            method: "getblockcount".into(),
            id: 0,
            latency: Duration::from_millis(42),
            block_height: Some(7),
            user_agent: None,
        });
        app.record_event(&started("http://b", 0));
        app.record_event(&NodeEvent::QueryFailed {
            endpoint: "http://b".into(),
            method: "getversion".into(),
            id: 0,
            error: "timed out".into(),
        });
        app.record_event(&started("http://b", 1));
        app.record_event(&NodeEvent::QueryCancelled {
            endpoint: "http://b".into(),
            method: "getblock".into(),
            id: 1,
        });

        assert_eq!(app.completions_seen, 3);
        assert_eq!(app.latency_history["http://a"], [42]);
        assert!(app.latency_history["http://b"].is_empty());

        app.reset_stats();
        assert_eq!(app.completions_seen, 0);
    }
}
