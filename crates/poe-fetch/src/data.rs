//! Plain HTTP retrieval of registered data.

use std::time::Duration;

use async_trait::async_trait;
use poe_verify::{DataFetcher, FetchError};
use tracing::{debug, info};

use crate::{http_client, transport_error};

/// Fetches data with an HTTP GET request
#[derive(Debug, Clone)]
pub struct HttpDataFetcher {
    client: reqwest::Client,
}

impl HttpDataFetcher {
    /// Fetcher without a client side deadline, downloads take as long as they take
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self {
            client: http_client(None)?,
        })
    }

    /// Fetcher giving up on a download after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: http_client(Some(timeout))?,
        })
    }
}

#[async_trait]
impl DataFetcher for HttpDataFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        info!("Downloading data from {} ...", location);
        let response = self
            .client
            .get(location)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Failed {
                status: Some(status.as_u16()),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}
