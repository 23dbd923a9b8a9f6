//! Transaction lookups through the blockchain.info explorer API.

use std::time::Duration;

use async_trait::async_trait;
use poe_verify::{FetchError, TransactionFetcher, TransactionRecord};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{http_client, transport_error};

/// Default explorer endpoint
pub const DEFAULT_EXPLORER_URL: &str = "https://blockchain.info";

/// Message the explorer returns, with a server error status, for unknown transactions
const TRANSACTION_NOT_FOUND: &str = "Transaction not found";

/// Raw transaction as served by `/rawtx/<txid>`
#[derive(Debug, Deserialize)]
struct RawTransaction {
    #[serde(default)]
    out: Vec<RawOutput>,
    /// Absent while the transaction sits in the mempool
    block_height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    script: Option<String>,
}

/// Looks transactions up on a blockchain.info compatible explorer
#[derive(Debug, Clone)]
pub struct ExplorerTransactionFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl ExplorerTransactionFetcher {
    pub fn new(base_url: String) -> Result<Self, FetchError> {
        Self::build(base_url, None)
    }

    /// Explorer client whose requests give up after `timeout`
    pub fn with_timeout(base_url: String, timeout: Duration) -> Result<Self, FetchError> {
        Self::build(base_url, Some(timeout))
    }

    fn build(base_url: String, timeout: Option<Duration>) -> Result<Self, FetchError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_raw_transaction(&self, txid: &str) -> Result<RawTransaction, FetchError> {
        let url = format!("{}/rawtx/{}?cors=true", self.base_url, txid);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(transport_error);
        }

        let body = response.text().await.unwrap_or_default();
        if is_not_found(status, &body) {
            Err(FetchError::NotFound)
        } else {
            Err(FetchError::Failed {
                status: Some(status.as_u16()),
                body,
            })
        }
    }

    /// Current chain height
    async fn get_block_count(&self) -> Result<u64, FetchError> {
        let url = format!("{}/q/getblockcount", self.base_url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(transport_error)?;
        let text = response.text().await.map_err(transport_error)?;
        text.trim().parse().map_err(|_| FetchError::Failed {
            status: None,
            body: format!("Invalid block count: {text}"),
        })
    }
}

/// The explorer reports unknown transactions either as 404 or as a 500 carrying a message.
fn is_not_found(status: StatusCode, body: &str) -> bool {
    status == StatusCode::NOT_FOUND
        || (status == StatusCode::INTERNAL_SERVER_ERROR && body.contains(TRANSACTION_NOT_FOUND))
}

#[async_trait]
impl TransactionFetcher for ExplorerTransactionFetcher {
    async fn fetch(&self, transaction_id: &str) -> Result<TransactionRecord, FetchError> {
        info!("Fetching transaction {} from {} ...", transaction_id, self.base_url);
        let RawTransaction { out, block_height } =
            self.get_raw_transaction(transaction_id).await?;

        let confirmations = match block_height {
            Some(height) => {
                let tip = self.get_block_count().await?;
                tip.saturating_sub(height) + 1
            }
            None => 0,
        };
        debug!(
            "Transaction {} has {} outputs and {} confirmations",
            transaction_id,
            out.len(),
            confirmations
        );

        Ok(TransactionRecord {
            outputs: out.into_iter().filter_map(|output| output.script).collect(),
            confirmations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_mapping() {
        assert!(is_not_found(StatusCode::NOT_FOUND, ""));
        assert!(is_not_found(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Transaction not found"
        ));
        assert!(!is_not_found(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal error"
        ));
        assert!(!is_not_found(StatusCode::SERVICE_UNAVAILABLE, "Transaction not found"));
    }
}
