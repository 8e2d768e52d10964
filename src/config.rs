use std::{fmt, str::FromStr, time::Duration};

use tokio::sync::broadcast;

use crate::events::NodeEvent;

/// Neo network a pool connects to.
///
/// Selects the built-in list of seed endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Built-in seed endpoints for this network, in default order.
    pub fn seed_endpoints(&self) -> Vec<String> {
        let port = match self {
            Network::Mainnet => 10332,
            Network::Testnet => 20332,
        };

        (1..=5)
            .map(|n| format!("http://seed{n}.neo.org:{port}"))
            .collect()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Testnet => f.write_str("testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(format!("unknown network `{other}`")),
        }
    }
}

/// Per-node transport settings.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Timeout applied by the default HTTP transport to each request.
    pub request_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Node pool configuration.
///
/// Controls which endpoints the pool knows about and how aggressively it
/// refreshes their health metadata in the background.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Network whose seed list is used when `endpoints` is unset.
    pub network: Network,

    /// Explicit endpoint list, overriding the network's seed list.
    ///
    /// The first entry becomes the default node.
    pub endpoints: Option<Vec<String>>,

    /// Period of the background diagnostic sampler.
    ///
    /// `Duration::ZERO` disables sampling; node health is then only updated
    /// by calls the caller makes itself.
    pub diagnostic_interval: Duration,

    /// How often to log the current fastest and highest node.
    ///
    /// Only takes effect while the diagnostic sampler is running.
    pub leaderboard_interval: Option<Duration>,

    /// Externally supplied sink receiving the events of every node.
    ///
    /// When unset the pool creates its own; either way
    /// [`NodePool::subscribe`](crate::pool::NodePool::subscribe) attaches to it.
    pub event_sink: Option<broadcast::Sender<NodeEvent>>,

    /// Settings shared by every node of the pool.
    pub node: NodeConfig,
}

impl PoolConfig {
    /// Creates a configuration for `network` with sampling disabled.
    pub fn new(network: Network) -> Self {
        Self {
            network,
            endpoints: None,
            diagnostic_interval: Duration::ZERO,
            leaderboard_interval: None,
            event_sink: None,
            node: NodeConfig::default(),
        }
    }

    /// Mainnet seed list, diagnosing a node every second.
    pub fn mainnet() -> Self {
        Self::new(Network::Mainnet).with_diagnostic_interval(Duration::from_secs(1))
    }

    /// Testnet seed list, diagnosing a node every second.
    pub fn testnet() -> Self {
        Self::new(Network::Testnet).with_diagnostic_interval(Duration::from_secs(1))
    }

    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = Some(endpoints.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_diagnostic_interval(mut self, interval: Duration) -> Self {
        self.diagnostic_interval = interval;
        self
    }

    pub fn with_leaderboard_interval(mut self, interval: Duration) -> Self {
        self.leaderboard_interval = Some(interval);
        self
    }

    pub fn with_event_sink(mut self, sink: broadcast::Sender<NodeEvent>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.node.request_timeout = timeout;
        self
    }

    /// Endpoints the pool will manage, in pool order.
    pub fn resolved_endpoints(&self) -> Vec<String> {
        match &self.endpoints {
            Some(endpoints) => endpoints.clone(),
            None => self.network.seed_endpoints(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_list_depends_on_network() {
        let main = Network::Mainnet.seed_endpoints();
        let test = Network::Testnet.seed_endpoints();

        assert_eq!(main.len(), 5);
        assert_eq!(main[0], "http://seed1.neo.org:10332");
        assert_eq!(test[4], "http://seed5.neo.org:20332");
    }

    #[test]
    fn explicit_endpoints_override_seeds() {
        let cfg = PoolConfig::new(Network::Testnet).with_endpoints(["http://a", "http://b"]);
        assert_eq!(cfg.resolved_endpoints(), vec!["http://a", "http://b"]);

        let cfg = PoolConfig::new(Network::Testnet);
        assert_eq!(cfg.resolved_endpoints(), Network::Testnet.seed_endpoints());

        let cfg = PoolConfig::new(Network::Mainnet).with_endpoints(Vec::<String>::new());
        assert!(cfg.resolved_endpoints().is_empty());
    }

    #[test]
    fn network_parses_case_insensitively() {
        assert_eq!("MainNet".parse::<Network>(), Ok(Network::Mainnet));
        assert_eq!("testnet".parse::<Network>(), Ok(Network::Testnet));
        assert!("devnet".parse::<Network>().is_err());
    }
}
