mod common;

use std::{sync::Arc, time::Duration};

use common::MockTransport;
use neo_node_pool::{
    events::event_channel, Network, NodeError, NodeEvent, NodePool, PoolConfig, SelectionPolicy,
};

const A: &str = "http://a.test:20332";
const B: &str = "http://b.test:20332";
const C: &str = "http://c.test:20332";

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn pool(transport: &Arc<MockTransport>, interval: Duration) -> NodePool {
    let cfg = PoolConfig::new(Network::Testnet)
        .with_endpoints([A, B, C])
        .with_diagnostic_interval(interval);
    NodePool::with_transport(cfg, transport.clone()).unwrap()
}

async fn touch_all(pool: &NodePool) {
    for idx in 0..pool.len() {
        let _ = pool.node(idx).unwrap().get_block_count().await;
    }
}

#[tokio::test(start_paused = true)]
async fn fastest_is_lowest_latency_active_node() {
    let transport = MockTransport::new();
    transport.healthy(A, 100, ms(50));
    transport.healthy(B, 100, ms(20));
    transport.failing(C);
    let pool = pool(&transport, Duration::ZERO);

    touch_all(&pool).await;

    let metas = pool.nodes_meta();
    assert!(metas[0].latency_ms >= Some(50));
    assert!(metas[1].latency_ms >= Some(20));
    assert!(metas[1].latency_ms < metas[0].latency_ms);
    assert_eq!(metas[2].latency_ms, None);
    assert_eq!(metas[2].is_active, Some(false));

    assert_eq!(pool.get_fastest_node().endpoint(), B);

    pool.set_fastest_node();
    assert_eq!(pool.current_node_url(), B);
    assert_eq!(pool.current_index(), 1);
}

#[tokio::test(start_paused = true)]
async fn selection_falls_back_to_default_when_nothing_is_active() {
    let transport = MockTransport::new();
    transport.healthy(A, 10, ms(30));
    transport.healthy(B, 20, ms(10));
    let pool = pool(&transport, Duration::ZERO);

    touch_all(&pool).await;
    assert_eq!(pool.get_fastest_node().endpoint(), B);

    transport.failing(A);
    transport.failing(B);
    touch_all(&pool).await;

    // Stale metadata survives the failure but no longer counts.
    assert!(pool.node(1).unwrap().latency_ms().is_some());
    assert_eq!(pool.node(1).unwrap().block_height(), Some(20));
    assert_eq!(pool.get_fastest_node().endpoint(), A);
    assert_eq!(pool.get_highest_node().endpoint(), A);

    pool.set_highest_node();
    assert_eq!(pool.current_node_url(), A);
}

#[tokio::test(start_paused = true)]
async fn highest_tie_goes_to_first_configured_node() {
    let transport = MockTransport::new();
    transport.healthy(A, 90, ms(5));
    transport.healthy(B, 100, ms(5));
    transport.healthy(C, 100, ms(1));
    let pool = pool(&transport, Duration::ZERO);

    touch_all(&pool).await;

    assert_eq!(pool.get_highest_node().endpoint(), B);
    assert_eq!(pool.select(SelectionPolicy::Highest).endpoint(), B);
    assert_eq!(pool.select(SelectionPolicy::Fastest).endpoint(), C);
    assert_eq!(pool.select(SelectionPolicy::Default).endpoint(), A);
}

#[tokio::test(start_paused = true)]
async fn fastest_tie_goes_to_first_configured_node() {
    let transport = MockTransport::new();
    transport.healthy(A, 100, ms(30));
    transport.healthy(B, 100, ms(20));
    transport.healthy(C, 100, ms(20));
    let pool = pool(&transport, Duration::ZERO);

    touch_all(&pool).await;

    let metas = pool.nodes_meta();
    assert_eq!(metas[1].latency_ms, metas[2].latency_ms);
    assert!(metas[1].latency_ms < metas[0].latency_ms);

    assert_eq!(pool.get_fastest_node().endpoint(), B);

    pool.set_fastest_node();
    assert_eq!(pool.current_node_url(), B);
    assert_eq!(pool.current_index(), 1);
}

#[tokio::test]
async fn invalid_height_never_reaches_the_network() {
    let transport = MockTransport::new();
    transport.healthy(A, 1, Duration::ZERO);
    let pool = pool(&transport, Duration::ZERO);

    let err = pool.get_block(-1).await.unwrap_err();

    assert!(matches!(err, NodeError::Validation(_)));
    assert_eq!(transport.total_calls(), 0);
    assert_eq!(pool.current_node().pending_requests(), 0);
}

#[tokio::test]
async fn calls_are_dispatched_to_the_current_node() {
    let transport = MockTransport::new();
    transport.healthy(A, 10, Duration::ZERO);
    transport.healthy(B, 30, Duration::ZERO);
    transport.healthy(C, 20, Duration::ZERO);
    let pool = pool(&transport, Duration::ZERO);

    assert_eq!(pool.get_block_count().await.unwrap(), 10);
    assert_eq!(transport.calls(A), 1);

    touch_all(&pool).await;
    pool.set_highest_node();
    assert_eq!(pool.current_node_url(), B);

    let block = pool.get_block(5).await.unwrap();
    assert_eq!(block["index"], 5);
    pool.get_version().await.unwrap();

    assert_eq!(transport.calls(B), 3);
    assert_eq!(
        pool.current_node().meta().user_agent.as_deref(),
        Some("/Neo:3.6.2/")
    );

    pool.set_default_node();
    assert_eq!(pool.current_node_url(), A);
}

#[tokio::test(start_paused = true)]
async fn pending_requests_follow_in_flight_calls() {
    let transport = MockTransport::new();
    transport.healthy(A, 1, ms(100));
    let pool = pool(&transport, Duration::ZERO);
    let node = pool.current_node();

    let calls: Vec<_> = (0..5)
        .map(|_| {
            let node = node.clone();
            tokio::spawn(async move { node.get_block_count().await })
        })
        .collect();

    tokio::time::sleep(ms(50)).await;
    assert_eq!(node.pending_requests(), 5);

    for call in calls {
        call.await.unwrap().unwrap();
    }
    assert_eq!(node.pending_requests(), 0);
    assert!(node.latency_ms() >= Some(100));
}

#[tokio::test(start_paused = true)]
async fn sampler_feeds_highest_selection() {
    let transport = MockTransport::new();
    transport.healthy(A, 100, ms(30));
    transport.failing(B);
    transport.healthy(C, 200, ms(80));
    let mut pool = pool(&transport, ms(1000));
    assert!(pool.is_diagnosing());

    for _ in 0..1000 {
        if pool.nodes_meta().iter().all(|m| m.is_active.is_some()) {
            break;
        }
        tokio::time::sleep(ms(1000)).await;
    }
    // Let samples spawned by the last tick finish.
    tokio::time::sleep(ms(500)).await;

    let metas = pool.nodes_meta();
    assert_eq!(metas[0].is_active, Some(true));
    assert_eq!(metas[1].is_active, Some(false));
    assert_eq!(metas[2].is_active, Some(true));

    pool.set_highest_node();
    assert_eq!(pool.current_node().endpoint(), C);
    assert_eq!(pool.current_node().block_height(), Some(200));

    pool.set_fastest_node();
    assert_eq!(pool.current_node_url(), A);

    pool.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_samples_do_not_stop_the_sampler() {
    let transport = MockTransport::new();
    let pool = pool(&transport, ms(1000));

    tokio::time::sleep(ms(10_500)).await;

    assert!(transport.total_calls() >= 10);
    assert!(pool.is_diagnosing());
    assert!(pool
        .nodes_meta()
        .iter()
        .all(|m| m.is_active != Some(true)));
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_sampling() {
    let transport = MockTransport::new();
    transport.healthy(A, 1, ms(10));
    transport.healthy(B, 1, ms(10));
    transport.healthy(C, 1, ms(10));
    let mut pool = pool(&transport, ms(100));

    tokio::time::sleep(ms(1_050)).await;
    pool.shutdown().await;
    let sampled = transport.total_calls();
    assert!(sampled >= 10);
    assert!(!pool.is_diagnosing());

    tokio::time::sleep(ms(5_000)).await;
    assert_eq!(transport.total_calls(), sampled);

    // A second shutdown is a no-op.
    pool.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn dropping_the_pool_stops_sampling() {
    let transport = MockTransport::new();
    let pool = pool(&transport, ms(100));

    tokio::time::sleep(ms(550)).await;
    drop(pool);
    tokio::task::yield_now().await;
    let sampled = transport.total_calls();

    tokio::time::sleep(ms(5_000)).await;
    assert_eq!(transport.total_calls(), sampled);
}

#[tokio::test(start_paused = true)]
async fn disabled_sampler_leaves_health_unknown() {
    let transport = MockTransport::new();
    transport.healthy(A, 1, Duration::ZERO);
    let pool = pool(&transport, Duration::ZERO);

    tokio::time::sleep(ms(10_000)).await;

    assert!(!pool.is_diagnosing());
    assert_eq!(transport.total_calls(), 0);
    assert!(pool.nodes_meta().iter().all(|m| m.is_active.is_none()));
}

#[tokio::test]
async fn manual_diagnosis_updates_sampled_node() {
    let transport = MockTransport::new();
    transport.healthy(A, 7, Duration::ZERO);
    transport.healthy(B, 7, Duration::ZERO);
    transport.healthy(C, 7, Duration::ZERO);
    let pool = pool(&transport, Duration::ZERO);

    let idx = pool.diagnose_random_node().await;

    assert!(idx < pool.len());
    assert_eq!(pool.nodes_meta()[idx].block_height, Some(7));
    assert_eq!(transport.total_calls(), 1);
}

#[tokio::test]
async fn pool_republishes_node_events() {
    let transport = MockTransport::new();
    transport.healthy(A, 1, Duration::ZERO);
    let pool = pool(&transport, Duration::ZERO);
    let mut rx = pool.subscribe();

    pool.node(0).unwrap().get_block_count().await.unwrap();
    pool.node(1).unwrap().get_block_count().await.unwrap_err();

    let events: Vec<NodeEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0].endpoint(), A);
    assert!(matches!(events[1], NodeEvent::QuerySucceeded { .. }));
    assert_eq!(events[2].endpoint(), B);
    assert!(matches!(events[3], NodeEvent::QueryFailed { .. }));
}

#[tokio::test]
async fn external_sink_receives_pool_events() {
    let transport = MockTransport::new();
    transport.healthy(A, 1, Duration::ZERO);
    let sink = event_channel();
    let mut rx = sink.subscribe();

    let cfg = PoolConfig::new(Network::Mainnet)
        .with_endpoints([A])
        .with_event_sink(sink);
    let pool = NodePool::with_transport(cfg, transport.clone()).unwrap();

    pool.get_block_count().await.unwrap();

    assert!(matches!(
        rx.try_recv().unwrap(),
        NodeEvent::QueryStarted { .. }
    ));
    assert!(matches!(
        rx.try_recv().unwrap(),
        NodeEvent::QuerySucceeded {
            block_height: Some(1),
            ..
        }
    ));
}
