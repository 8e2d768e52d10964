//! A Neo JSON-RPC client that tracks the health of every node it talks to.
//!
//! The pool keeps a list of known endpoints, learns each node's latency, chain
//! height and reachability from the calls made through it, and lets the caller
//! pick the node further calls should go to.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use neo_node_pool::{NodePool, PoolConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Diagnose one random testnet seed every second.
//! let pool = NodePool::new(PoolConfig::testnet())?;
//! println!("default node: {}", pool.current_node_url());
//!
//! tokio::time::sleep(Duration::from_secs(10)).await;
//!
//! let fastest = pool.get_fastest_node();
//! println!("fastest: {} ({:?} ms)", fastest.endpoint(), fastest.latency_ms());
//!
//! pool.set_highest_node();
//! println!("block count: {}", pool.get_block_count().await?);
//! # Ok(())
//! # }
//! ```
//!
//! # Health Tracking
//!
//! Each [`Node`] benchmarks its own calls:
//! 1. A call counts as pending from dispatch until the transport resolves
//! 2. A success records the round trip, marks the node active and, for
//!    `getblockcount` / `getversion`, its height or user agent
//! 3. A failure marks the node inactive but keeps previously observed values
//! 4. Every step is published as a [`NodeEvent`]
//!
//! # Selection
//!
//! [`NodePool::get_fastest_node`] and [`NodePool::get_highest_node`] consider
//! active nodes only and fall back to the first configured endpoint, so
//! selection never fails. Health for nodes the caller does not use itself is
//! refreshed by the diagnostic sampler configured through
//! [`PoolConfig::diagnostic_interval`].

pub mod config;
pub mod errors;
pub mod events;
pub mod node;
pub mod pool;
pub mod transport;

pub use config::{Network, NodeConfig, PoolConfig};
pub use errors::{NodeError, PoolError, TransportError};
pub use events::{EventSink, NodeEvent};
pub use node::{Node, NodeMeta};
pub use pool::{NodePool, SelectionPolicy};
pub use transport::{HttpTransport, RpcTransport};
