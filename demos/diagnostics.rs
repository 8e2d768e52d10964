//! Background diagnostics: let the pool probe random nodes, then pick the
//! fastest and the highest one.
//!
//! Run with `RUST_LOG=neo_node_pool=debug` to watch every diagnostic sample.

use std::time::Duration;

use neo_node_pool::{NodePool, PoolConfig};
use tracing_subscriber::EnvFilter;

fn print_leaderboard(pool: &NodePool) {
    let fastest = pool.get_fastest_node();
    println!(
        "Fastest node: {} latency: {:?} ms",
        fastest.endpoint(),
        fastest.latency_ms()
    );
    let highest = pool.get_highest_node();
    println!(
        "Highest node: {} blockHeight: {:?}",
        highest.endpoint(),
        highest.block_height()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = PoolConfig::testnet()
        .with_diagnostic_interval(Duration::from_millis(1000))
        .with_leaderboard_interval(Duration::from_secs(5));
    let mut pool = NodePool::new(cfg)?;
    println!("current node: {}", pool.current_node_url());

    println!("give it 10 seconds to gather diagnostic information...");
    tokio::time::sleep(Duration::from_secs(10)).await;
    print_leaderboard(&pool);

    println!("another 10 seconds to see if the rankings change...");
    tokio::time::sleep(Duration::from_secs(10)).await;
    print_leaderboard(&pool);

    pool.set_fastest_node();
    println!("set_fastest_node(): current node is now {}", pool.current_node_url());
    println!("block count: {}", pool.get_block_count().await?);

    pool.set_highest_node();
    println!("set_highest_node(): current node is now {}", pool.current_node_url());
    println!("block count: {}", pool.get_block_count().await?);

    for meta in pool.nodes_meta() {
        println!(
            "{:<32} active={:<12} latency={:<10} height={:<10} pending={}",
            meta.endpoint,
            format!("{:?}", meta.is_active),
            format!("{:?}", meta.latency_ms),
            format!("{:?}", meta.block_height),
            meta.pending_requests,
        );
    }

    pool.shutdown().await;
    Ok(())
}
