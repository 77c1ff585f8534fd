//! HTTP client abstraction for testability

use std::future::Future;
use std::time::Duration;

use crate::error::TerrainError;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Trait for fetching heightmap images.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock clients in tests. The returned future must be `Send`
/// because requests run on spawned tasks.
pub trait HeightmapClient: Send + Sync + 'static {
    /// Performs an HTTP GET request.
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error.
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, TerrainError>> + Send;
}

/// Real HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHeightmapClient {
    client: reqwest::Client,
}

impl ReqwestHeightmapClient {
    /// Creates a new client with default configuration.
    pub fn new() -> Result<Self, TerrainError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a new client with custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, TerrainError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TerrainError::Network {
                url: String::new(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

impl HeightmapClient for ReqwestHeightmapClient {
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, TerrainError>> + Send {
        let request = self.client.get(url);
        let url = url.to_string();

        async move {
            let response = request.send().await.map_err(|e| TerrainError::Network {
                url: url.clone(),
                reason: e.to_string(),
            })?;

            // Check HTTP status
            let status = response.status();
            if !status.is_success() {
                return Err(TerrainError::HttpStatus {
                    url,
                    status: status.as_u16(),
                });
            }

            // Read response body
            response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| TerrainError::Network {
                    url,
                    reason: format!("Failed to read response: {}", e),
                })
        }
    }
}
