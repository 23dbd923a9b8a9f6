//! Anchoring checks against a blockchain transaction, and the per-proof lookup cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::fetch::{with_timeout, FetchError, TransactionFetcher};

/// Transaction data needed to check anchoring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Output scripts, hex encoded
    pub outputs: Vec<String>,
    /// Number of blocks built on top of (and including) the confirming block
    pub confirmations: u64,
}

/// Resolved outcome of a transaction lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionLookup {
    Found(TransactionRecord),
    NotFound,
}

/// Whether any output script of `tx` ends with `merkle_root`.
///
/// Scripts and root are compared as lowercase hex text. Only a suffix counts: anchoring
/// scripts carry the commitment as their last push.
pub fn is_anchored(tx: &TransactionRecord, merkle_root: &str) -> bool {
    let root = merkle_root.trim().to_ascii_lowercase();
    if root.is_empty() {
        return false;
    }
    tx.outputs
        .iter()
        .any(|script| script.trim().to_ascii_lowercase().ends_with(&root))
}

pub fn confirmations(tx: &TransactionRecord) -> u64 {
    tx.confirmations
}

/// Memoized transaction lookup.
///
/// The first caller performs the fetch; concurrent callers wait for it. A record or a
/// not-found answer is kept for the lifetime of the cache, transport failures are not.
#[derive(Debug, Default)]
pub struct TransactionCache {
    lookup: OnceCell<TransactionLookup>,
}

impl TransactionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached lookup, if one has resolved
    pub(crate) fn get(&self) -> Option<&TransactionLookup> {
        self.lookup.get()
    }

    /// Return the cached lookup, fetching `transaction_id` through `fetcher` on first use
    pub async fn get_or_fetch(
        &self,
        fetcher: &dyn TransactionFetcher,
        transaction_id: &str,
        timeout: Option<Duration>,
    ) -> Result<&TransactionLookup, FetchError> {
        self.lookup
            .get_or_try_init(|| async {
                debug!("Fetching transaction {} ...", transaction_id);
                match with_timeout(timeout, "transaction lookup", fetcher.fetch(transaction_id))
                    .await
                {
                    Ok(record) => Ok(TransactionLookup::Found(record)),
                    Err(FetchError::NotFound) => {
                        info!("Transaction {} not found", transaction_id);
                        Ok(TransactionLookup::NotFound)
                    }
                    Err(err) => Err(err),
                }
            })
            .await
    }
}
