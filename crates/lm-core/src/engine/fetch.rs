//! Remote retrieval of weight artifacts.

use crate::config::NetworkConfig;
use crate::error::{MachineError, Result};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Source of raw artifact bytes.
///
/// Implementations report every transport failure as
/// [`MachineError::WeightsUnavailable`].
pub trait WeightFetcher: Send {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP fetcher.
///
/// The client is built per download and dropped before returning, so the
/// fetcher itself can be created and dropped on an async runtime thread.
/// `fetch` must run off the runtime (e.g. `spawn_blocking`).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_timeout(NetworkConfig::WEIGHTS_DOWNLOAD_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn client(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.timeout)
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| MachineError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        info!("Downloading weights from {}", url);
        let unavailable = |message: String| MachineError::WeightsUnavailable {
            url: url.to_string(),
            message,
        };

        let response = self
            .client()?
            .get(url)
            .send()
            .map_err(|e| unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {}", status)));
        }
        let bytes = response.bytes().map_err(|e| unavailable(e.to_string()))?;
        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}
