//! Basic example: call a Neo node through the pool and inspect its health.
//!
//! Sampling is disabled here, so the only health information is what the
//! calls below produce on the default node.

use std::{env, time::Instant};

use neo_node_pool::{Network, Node, NodeConfig, NodePool, PoolConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let network: Network = env::var("NEO_NETWORK")
        .unwrap_or_else(|_| "testnet".into())
        .parse()?;

    let mut cfg = PoolConfig::new(network);
    if let Ok(url) = env::var("NEO_RPC_URL") {
        cfg = cfg.with_endpoints([url]);
    }

    let pool = NodePool::new(cfg)?;

    eprintln!(
        "Known {} nodes:\n{}",
        network,
        pool.endpoints()
            .iter()
            .map(|url| format!("- {url}"))
            .collect::<Vec<_>>()
            .join("\n")
    );

    let t0 = Instant::now();
    let height = pool.get_block_count().await?;
    println!(
        "[blockcount] node={} latency={:?} height={}",
        pool.current_node_url(),
        t0.elapsed(),
        height,
    );

    let version = pool.get_version().await?;
    println!("[version]    {version}");

    let block = pool.get_block(i64::try_from(height.saturating_sub(1))?).await?;
    println!(
        "[block]      index={} hash={}",
        block["index"], block["hash"]
    );

    let meta = pool.current_node().meta();
    println!("active={:?}", meta.is_active);
    println!("latency_ms={:?}", meta.latency_ms);
    println!("block_height={:?}", meta.block_height);
    println!("user_agent={:?}", meta.user_agent);

    // A node can also be used on its own, outside any pool.
    let standalone = Node::http(pool.current_node_url(), &NodeConfig::default())?;
    let version = standalone.get_version().await?;
    println!(
        "[standalone] node={} useragent={}",
        standalone.endpoint(),
        version["useragent"]
    );
    println!("standalone user_agent={:?}", standalone.meta().user_agent);

    Ok(())
}
