//! Concurrent load against every node of a pool.
//!
//! Fires a batch of `getblockcount` calls spread across all nodes with a cap on
//! calls in flight, watches the pool's event stream, and prints the health
//! each node ends up with. Useful for comparing nodes under load.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use futures::{stream::FuturesUnordered, StreamExt};
use neo_node_pool::{NodeEvent, NodePool, PoolConfig};
use tokio::sync::{broadcast::error::RecvError, Semaphore};

const NUM_CALLS: usize = 500;
const MAX_IN_FLIGHT: usize = 32;

#[derive(Debug)]
enum CallOutcome {
    Ok { height: u64, latency: Duration },
    Err { error: String, latency: Duration },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let pool = Arc::new(NodePool::new(PoolConfig::new(
        std::env::var("NEO_NETWORK")
            .unwrap_or_else(|_| "testnet".into())
            .parse()
            .map_err(anyhow::Error::msg)?,
    ))?);

    let mut events = pool.subscribe();
    let watcher = tokio::spawn(async move {
        let mut peak_in_flight: HashMap<String, usize> = HashMap::new();
        let mut in_flight: HashMap<String, usize> = HashMap::new();

        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            let count = in_flight.entry(event.endpoint().to_string()).or_default();
            match event {
                NodeEvent::QueryStarted { .. } => *count += 1,
                _ => *count = count.saturating_sub(1),
            }
            let peak = peak_in_flight.entry(event.endpoint().to_string()).or_default();
            *peak = (*peak).max(*count);
        }

        peak_in_flight
    });

    let semaphore = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
    let mut calls = FuturesUnordered::new();

    for i in 0..NUM_CALLS {
        let node = pool.node(i % pool.len()).expect("index within pool");
        let sem = semaphore.clone();

        calls.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.expect("semaphore closed");

            let start = Instant::now();
            let res = node.get_block_count().await;
            let latency = start.elapsed();

            let outcome = match res {
                Ok(height) => CallOutcome::Ok { height, latency },
                Err(e) => CallOutcome::Err {
                    error: e.to_string(),
                    latency,
                },
            };
            (i, node.endpoint().to_string(), outcome)
        }));
    }

    let mut ok_latency: HashMap<String, (usize, Duration)> = HashMap::new();
    let mut error_count = 0usize;

    while let Some(joined) = calls.next().await {
        let (idx, endpoint, outcome) = joined?;
        match outcome {
            CallOutcome::Ok { height, latency } => {
                println!("[call {idx:04}] OK   node={endpoint} height={height} latency={latency:?}");
                let entry = ok_latency.entry(endpoint).or_insert((0, Duration::ZERO));
                entry.0 += 1;
                entry.1 += latency;
            }
            CallOutcome::Err { error, latency } => {
                println!("[call {idx:04}] ERR  node={endpoint} latency={latency:?} error={error}");
                error_count += 1;
            }
        }
    }

    println!("\n=== summary ===");
    println!("total calls          : {}", NUM_CALLS);
    println!("successes            : {}", NUM_CALLS - error_count);
    println!("errors (any kind)    : {}", error_count);

    for meta in pool.nodes_meta() {
        let avg_ms = ok_latency
            .get(&meta.endpoint)
            .map(|(count, total)| total.as_secs_f64() * 1000.0 / *count as f64);
        println!(
            "{:<32} active={:?} height={:?} last_latency={:?} avg_latency={:?} pending={}",
            meta.endpoint,
            meta.is_active,
            meta.block_height,
            meta.latency_ms,
            avg_ms,
            meta.pending_requests,
        );
    }

    drop(pool);
    let peaks = watcher.await?;
    for (endpoint, peak) in peaks {
        println!("peak in flight {:<32}: {}", endpoint, peak);
    }

    Ok(())
}
