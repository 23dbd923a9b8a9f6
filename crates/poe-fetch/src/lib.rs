//! Network collaborators for proof verification: an HTTP data fetcher and transaction
//! lookups through a block explorer or a Bitcoin Core node.

use std::time::Duration;

use poe_verify::FetchError;

pub mod data;
pub mod explorer;
pub mod rpc;

pub use data::HttpDataFetcher;
pub use explorer::ExplorerTransactionFetcher;
pub use rpc::{BitcoinRpcTransactionFetcher, RpcClientError};

/// Timeout of a single RPC attempt; failed attempts are retried with backoff
pub const RPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

fn transport_error(err: reqwest::Error) -> FetchError {
    FetchError::Failed {
        status: err.status().map(|status| status.as_u16()),
        body: err.to_string(),
    }
}

/// HTTP client whose requests, body included, are bounded by `timeout` when one is given
fn http_client(timeout: Option<Duration>) -> Result<reqwest::Client, FetchError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(transport_error)
}
