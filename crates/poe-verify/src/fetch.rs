//! Collaborators the verifier relies on for network access.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::transaction::TransactionRecord;

/// Failures reported by the fetch collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The requested resource does not exist
    #[error("Resource not found")]
    NotFound,
    /// Transport level failure (unexpected status, timeout, connection error)
    #[error("Fetch failed with status {status:?}: {body}")]
    Failed { status: Option<u16>, body: String },
}

/// Retrieves raw bytes from a data location
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataFetcher: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError>;
}

/// Looks up a transaction by id.
///
/// Implementations must report absent transactions as [`FetchError::NotFound`], whatever
/// status the underlying transport uses for it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionFetcher: Send + Sync {
    async fn fetch(&self, transaction_id: &str) -> Result<TransactionRecord, FetchError>;
}

/// Await `future`, failing with [`FetchError::Failed`] if `timeout` expires first.
pub(crate) async fn with_timeout<T, F>(
    timeout: Option<Duration>,
    operation: &str,
    future: F,
) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| FetchError::Failed {
                status: None,
                body: format!("{operation} timed out after {limit:?}"),
            })?,
        None => future.await,
    }
}
