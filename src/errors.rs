/// Errors reported by an [`RpcTransport`](crate::transport::RpcTransport).
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The request never produced a usable HTTP response.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a JSON-RPC error object.
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    /// The response could not be interpreted as a JSON-RPC result.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Errors that can occur when calling a single node.
#[derive(thiserror::Error, Debug)]
pub enum NodeError {
    /// The caller supplied an argument the node would reject.
    ///
    /// Raised before any network access.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// The transport reported a failure for this call.
    #[error("rpc call `{method}` to {endpoint} failed: {source}")]
    Rpc {
        endpoint: String,
        method: String,
        #[source]
        source: TransportError,
    },
}

/// Errors that can occur while building a [`NodePool`](crate::pool::NodePool).
#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    /// No endpoints were configured for the pool.
    #[error("no endpoints configured")]
    NoEndpoints,

    /// The diagnostic sampler was enabled outside of a tokio runtime.
    #[error("diagnostic sampling requires a running tokio runtime")]
    NoRuntime,

    /// The default HTTP transport could not be built.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
