//! RPC call execution logic for the TUI dashboard.

use std::{sync::Arc, time::Instant};

use color_eyre::Result;
use neo_node_pool::Node;
use tokio::sync::mpsc;

use crate::app::{App, AppEvent, Method, Target};

/// Spawns an asynchronous RPC call against `target` using the selected method.
///
/// The call is executed in a background task and sends the result via the provided channel.
pub fn spawn_rpc_call(app: &App, target: Target, tx: mpsc::UnboundedSender<AppEvent>) {
    let node = match target {
        Target::Current => Some(app.pool.current_node()),
        Target::Selected => app.pool.node(app.selected_idx),
    };
    let Some(node) = node else {
        return;
    };
    let method = app.method;

    tokio::spawn(async move {
        let start = Instant::now();

        let result = run_method(&node, method).await;

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let (ok, message) = match result {
            Ok(msg) => (true, msg),
            Err(e) => (false, e.to_string()),
        };

        let _ = tx.send(AppEvent::RpcFinished {
            endpoint: node.endpoint().to_string(),
            latency_ms: elapsed_ms,
            ok,
            message,
        });
    });
}

async fn run_method(node: &Arc<Node>, method: Method) -> Result<String> {
    match method {
        Method::BlockCount => {
            let height = node.get_block_count().await?;
            Ok(format!("height={height}"))
        }
        Method::Version => {
            let version = node.get_version().await?;
            let user_agent = version
                .get("useragent")
                .and_then(|v| v.as_str())
                .unwrap_or("-");
            Ok(format!("useragent={user_agent}"))
        }
        Method::LatestBlock => {
            let count = node.get_block_count().await?;
            let height = i64::try_from(count.saturating_sub(1))?;
            let block = node.get_block_verbose(height).await?;
            let hash = block.get("hash").and_then(|v| v.as_str()).unwrap_or("-");
            let tx_count = block
                .get("tx")
                .and_then(|v| v.as_array())
                .map_or(0, |txs| txs.len());
            Ok(format!("block={height}, hash={hash}, txs={tx_count}"))
        }
    }
}
