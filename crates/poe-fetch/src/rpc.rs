//! Transaction lookups through a Bitcoin Core node, with retry logic.

use std::str::FromStr;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bitcoin::Txid;
use jsonrpsee::core::client::{ClientT, Error as RpcError};
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HeaderMap, HeaderValue, HttpClient};
use jsonrpsee::rpc_params;
use poe_verify::{FetchError, TransactionFetcher, TransactionRecord};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::RPC_REQUEST_TIMEOUT;

/// `RPC_INVALID_ADDRESS_OR_KEY`, returned by `getrawtransaction` for unknown transactions
const RPC_INVALID_ADDRESS_OR_KEY: i32 = -5;

/// Error types for Bitcoin RPC client operations
#[derive(Error, Debug)]
pub enum RpcClientError {
    /// RPC client errors
    #[error("RPC client error: {0}")]
    RpcClient(#[from] RpcError),
    /// Invalid HTTP header value
    #[error("Invalid HTTP header value")]
    InvalidHeader,
}

/// Verbose `getrawtransaction` result, reduced to the fields anchoring checks need
#[derive(Debug, Deserialize)]
struct RawTransactionVerbose {
    vout: Vec<RawVout>,
    /// Absent for mempool transactions
    confirmations: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawVout {
    #[serde(rename = "scriptPubKey")]
    script_pub_key: RawScriptPubKey,
}

#[derive(Debug, Deserialize)]
struct RawScriptPubKey {
    hex: String,
}

/// Looks transactions up with `getrawtransaction` on a Bitcoin Core node.
///
/// The node must run with `-txindex` to find transactions outside its wallet and mempool.
pub struct BitcoinRpcTransactionFetcher {
    client: HttpClient,
    backoff: backoff::ExponentialBackoff,
}

impl BitcoinRpcTransactionFetcher {
    /// Create a new Bitcoin RPC client with default retry settings (exponential backoff)
    pub fn new(url: String, userpwd: Option<String>) -> Result<Self, RpcClientError> {
        Self::with_backoff(url, userpwd, backoff::ExponentialBackoff::default())
    }

    /// Create a client retrying transport failures according to `backoff`
    pub fn with_backoff(
        url: String,
        userpwd: Option<String>,
        backoff: backoff::ExponentialBackoff,
    ) -> Result<Self, RpcClientError> {
        let mut headers = HeaderMap::new();
        if let Some(userpwd) = userpwd {
            let creds = general_purpose::STANDARD.encode(userpwd);
            headers.insert(
                "Authorization",
                HeaderValue::from_str(&format!("Basic {creds}"))
                    .map_err(|_| RpcClientError::InvalidHeader)?,
            );
        };

        let client = HttpClient::builder()
            .set_headers(headers)
            .request_timeout(RPC_REQUEST_TIMEOUT)
            .build(url)?;

        Ok(Self { client, backoff })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: ArrayParams,
    ) -> Result<T, RpcClientError> {
        request_with_retry(self.backoff.clone(), || async {
            self.client
                .request(method, params.clone())
                .await
                .map_err(Into::into)
        })
        .await
    }

    /// Get a transaction with its decoded outputs and confirmation count
    async fn get_raw_transaction(
        &self,
        txid: &Txid,
    ) -> Result<RawTransactionVerbose, RpcClientError> {
        self.request("getrawtransaction", rpc_params![txid.to_string(), true])
            .await
    }
}

#[async_trait]
impl TransactionFetcher for BitcoinRpcTransactionFetcher {
    async fn fetch(&self, transaction_id: &str) -> Result<TransactionRecord, FetchError> {
        // An id that is not a txid cannot name an existing transaction
        let Ok(txid) = Txid::from_str(transaction_id) else {
            debug!("Invalid transaction id {}", transaction_id);
            return Err(FetchError::NotFound);
        };

        info!("Fetching transaction {} from Bitcoin RPC ...", txid);
        match self.get_raw_transaction(&txid).await {
            Ok(RawTransactionVerbose {
                vout,
                confirmations,
            }) => Ok(TransactionRecord {
                outputs: vout
                    .into_iter()
                    .map(|output| output.script_pub_key.hex)
                    .collect(),
                confirmations: confirmations.unwrap_or(0),
            }),
            Err(err) if is_not_found(&err) => Err(FetchError::NotFound),
            Err(err) => Err(FetchError::Failed {
                status: None,
                body: err.to_string(),
            }),
        }
    }
}

fn is_not_found(err: &RpcClientError) -> bool {
    matches!(
        err,
        RpcClientError::RpcClient(RpcError::Call(call)) if call.code() == RPC_INVALID_ADDRESS_OR_KEY
    )
}

/// Execute a request with retry logic using exponential backoff
/// Only retries on unexpected HTTP errors, never on JSON-RPC errors
async fn request_with_retry<F, Fut, T>(
    backoff: backoff::ExponentialBackoff,
    operation: F,
) -> Result<T, RpcClientError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, RpcClientError>>,
{
    use backoff::{future::retry_notify, Error};

    retry_notify(
        backoff,
        || async {
            match operation().await {
                Ok(result) => Ok(result),
                Err(err) => {
                    if is_retryable_error(&err) {
                        Err(Error::transient(err))
                    } else {
                        Err(Error::permanent(err))
                    }
                }
            }
        },
        |err, duration| {
            info!("Request failed, retrying in {:?}: {}", duration, err);
        },
    )
    .await
}

/// Determines if an error should be retried - only transport level failures are
fn is_retryable_error(err: &RpcClientError) -> bool {
    match err {
        RpcClientError::RpcClient(rpc_err) => matches!(
            rpc_err,
            RpcError::Transport(_)
                | RpcError::RequestTimeout
                | RpcError::RestartNeeded(_)
                | RpcError::ServiceDisconnect
        ),
        RpcClientError::InvalidHeader => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonrpsee::types::ErrorObjectOwned;

    #[test]
    fn test_not_found_code() {
        let err = RpcClientError::RpcClient(RpcError::Call(ErrorObjectOwned::owned(
            RPC_INVALID_ADDRESS_OR_KEY,
            "No such mempool or blockchain transaction",
            None::<()>,
        )));
        assert!(is_not_found(&err));
        assert!(!is_retryable_error(&err));

        let err = RpcClientError::RpcClient(RpcError::Call(ErrorObjectOwned::owned(
            -8,
            "parameter 1 must be hexadecimal",
            None::<()>,
        )));
        assert!(!is_not_found(&err));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(is_retryable_error(&RpcClientError::RpcClient(
            RpcError::RequestTimeout
        )));
        assert!(!is_retryable_error(&RpcClientError::InvalidHeader));
    }

    #[tokio::test]
    async fn test_invalid_txid_is_not_found() {
        let fetcher =
            BitcoinRpcTransactionFetcher::new("http://127.0.0.1:1".to_string(), None).unwrap();
        assert_eq!(
            fetcher.fetch("not-a-txid").await.unwrap_err(),
            FetchError::NotFound
        );
    }
}
