//! Environment configuration for the dashboard: node pool settings and logging.

use std::{env, fs::File, sync::Mutex, time::Duration};

use color_eyre::{eyre::WrapErr, Result};
use neo_node_pool::{Network, NodePool, PoolConfig};
use tracing_subscriber::EnvFilter;

const DEFAULT_DIAGNOSTIC_INTERVAL_MS: u64 = 1000;

/// Reads a millisecond duration from `key`, falling back to `default`.
fn millis_from_env(key: &str, default: u64) -> Result<Duration> {
    match env::var(key) {
        Ok(raw) => {
            let ms: u64 = raw
                .trim()
                .parse()
                .wrap_err_with(|| format!("{key} must be a number of milliseconds"))?;
            Ok(Duration::from_millis(ms))
        }
        Err(_) => Ok(Duration::from_millis(default)),
    }
}

/// Builds the pool configuration from environment variables.
///
/// Looks for the following environment variables:
/// - `NEO_NETWORK`: `mainnet` or `testnet` (default `testnet`)
/// - `NEO_RPC_URLS`: comma-separated endpoints replacing the network's seed list
/// - `NEO_DIAGNOSTIC_INTERVAL_MS`: sampling period, `0` disables (default 1000)
/// - `NEO_REQUEST_TIMEOUT_MS`: per-request HTTP timeout (default 5000)
pub fn pool_config_from_env() -> Result<PoolConfig> {
    let network = match env::var("NEO_NETWORK") {
        Ok(raw) => raw
            .parse::<Network>()
            .map_err(|e| color_eyre::eyre::eyre!("NEO_NETWORK: {e}"))?,
        Err(_) => Network::Testnet,
    };

    let mut cfg = PoolConfig::new(network)
        .with_diagnostic_interval(millis_from_env(
            "NEO_DIAGNOSTIC_INTERVAL_MS",
            DEFAULT_DIAGNOSTIC_INTERVAL_MS,
        )?)
        .with_request_timeout(millis_from_env("NEO_REQUEST_TIMEOUT_MS", 5000)?);

    if let Ok(urls) = env::var("NEO_RPC_URLS") {
        let endpoints: Vec<String> = urls
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .collect();

        if endpoints.is_empty() {
            color_eyre::eyre::bail!(
                "NEO_RPC_URLS is set but lists no endpoints.\n\
                 Unset it to use the {network} seed list."
            );
        }
        cfg = cfg.with_endpoints(endpoints);
    }

    Ok(cfg)
}

/// Builds the node pool from environment variables.
///
/// Must be called inside the tokio runtime so the diagnostic sampler can start.
pub fn build_pool_from_env() -> Result<(NodePool, PoolConfig)> {
    let cfg = pool_config_from_env()?;
    let pool = NodePool::new(cfg.clone())?;
    Ok((pool, cfg))
}

/// Sends logs to the file named by `NEO_LOG_FILE`, filtered by `RUST_LOG`.
///
/// Without `NEO_LOG_FILE` nothing is logged, since the terminal belongs to
/// the dashboard.
pub fn init_tracing_from_env() -> Result<()> {
    let Ok(path) = env::var("NEO_LOG_FILE") else {
        return Ok(());
    };

    let file = File::create(&path).wrap_err_with(|| format!("cannot create log file {path}"))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| color_eyre::eyre::eyre!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}
