//! Heightmap acquisition.
//!
//! A [`TileFetcher`] turns a tile key into a network request for its
//! heightmap image. Requests are bounded by a shared [`RequestLimiter`]; a
//! request that finds the budget exhausted is not queued and the caller
//! retries later. Responses are decoded into a [`HeightRaster`] on the
//! runtime worker and handed back through a completion callback.

mod http;
mod limiter;
mod url;

pub use http::{HeightmapClient, ReqwestHeightmapClient, DEFAULT_TIMEOUT_SECS};
pub use limiter::{RequestLimiter, RequestPermit, DEFAULT_MAX_REQUESTS_IN_FLIGHT};
pub use url::{PrefixProxy, Proxy, TileUrlBuilder};

#[cfg(test)]
pub(crate) use http::tests::{encode_png, MockHeightmapClient};

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::codec::HeightRaster;
use crate::error::{TerrainError, TerrainResult};
use crate::geo::GeographicTilingScheme;
use crate::tile::TileKey;

/// Deepest level the remote source serves.
pub const DEFAULT_MAX_LEVEL: u32 = 11;

/// Outcome of trying to start a fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchStart {
    /// The request is in flight; the callback will run exactly once.
    Started,
    /// The request budget is exhausted. Nothing was sent.
    Deferred,
    /// The tile can never be fetched. Nothing was sent.
    Unsupported(TerrainError),
}

/// Issues heightmap requests within a request budget.
pub struct TileFetcher<C> {
    client: Arc<C>,
    urls: TileUrlBuilder,
    limiter: Arc<RequestLimiter>,
    max_level: u32,
    runtime: Handle,
}

impl<C: HeightmapClient> TileFetcher<C> {
    pub fn new(
        client: Arc<C>,
        urls: TileUrlBuilder,
        limiter: Arc<RequestLimiter>,
        max_level: u32,
        runtime: Handle,
    ) -> Self {
        Self {
            client,
            urls,
            limiter,
            max_level,
            runtime,
        }
    }

    /// Replaces the request budget, e.g. with one shared by other fetchers.
    pub fn with_limiter(mut self, limiter: Arc<RequestLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn limiter(&self) -> &Arc<RequestLimiter> {
        &self.limiter
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    pub fn url_for(&self, key: TileKey, scheme: &GeographicTilingScheme) -> String {
        self.urls.build(key, scheme)
    }

    /// Starts fetching the heightmap for `key`.
    ///
    /// `on_complete` runs on a runtime worker after the request permit has
    /// been released. It is not called unless [`FetchStart::Started`] is
    /// returned.
    pub fn start<F>(&self, key: TileKey, scheme: &GeographicTilingScheme, on_complete: F) -> FetchStart
    where
        F: FnOnce(TerrainResult<HeightRaster>) + Send + 'static,
    {
        if !scheme.contains(key) {
            return FetchStart::Unsupported(TerrainError::OutsideGrid(key));
        }
        if key.level() > self.max_level {
            return FetchStart::Unsupported(TerrainError::LevelUnsupported {
                level: key.level(),
                max_level: self.max_level,
            });
        }

        let Some(permit) = self.limiter.try_acquire() else {
            tracing::trace!(tile = %key, limiter = self.limiter.label(), "Request budget exhausted");
            return FetchStart::Deferred;
        };

        let url = self.urls.build(key, scheme);
        tracing::debug!(tile = %key, url = %url, "Requesting heightmap");

        let client = Arc::clone(&self.client);
        self.runtime.spawn(async move {
            let result = match client.get(&url).await {
                Ok(bytes) => decode_heightmap(&bytes),
                Err(e) => Err(e),
            };
            drop(permit);
            on_complete(result);
        });

        FetchStart::Started
    }
}

/// Decodes an encoded image into a heightmap raster.
pub fn decode_heightmap(bytes: &[u8]) -> TerrainResult<HeightRaster> {
    let image =
        image::load_from_memory(bytes).map_err(|e| TerrainError::ImageDecode(e.to_string()))?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(HeightRaster::from_rgba(width, height, rgba.into_raw())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::{oneshot, Semaphore};

    fn fetcher(client: MockHeightmapClient, budget: usize) -> TileFetcher<MockHeightmapClient> {
        TileFetcher::new(
            Arc::new(client),
            TileUrlBuilder::new("http://tiles", "png"),
            Arc::new(RequestLimiter::new(budget, "test")),
            DEFAULT_MAX_LEVEL,
            Handle::current(),
        )
    }

    #[test]
    fn test_decode_heightmap() {
        let mut raster = HeightRaster::filled(8, 8, 0);
        raster.set_height(0, 0, 70_000);
        let decoded = decode_heightmap(&encode_png(&raster)).unwrap();
        assert_eq!(decoded, raster);
    }

    #[test]
    fn test_decode_garbage_is_image_error() {
        let result = decode_heightmap(b"not an image");
        assert!(matches!(result, Err(TerrainError::ImageDecode(_))));
    }

    #[tokio::test]
    async fn test_successful_fetch_decodes_and_releases_permit() {
        let raster = HeightRaster::filled(4, 4, 1234);
        let fetcher = fetcher(MockHeightmapClient::succeeding(encode_png(&raster)), 6);
        let scheme = GeographicTilingScheme::default();
        let (tx, rx) = oneshot::channel();

        let start = fetcher.start(TileKey::new(0, 0, 0), &scheme, move |result| {
            let _ = tx.send(result);
        });
        assert_eq!(start, FetchStart::Started);

        let result = rx.await.unwrap();
        assert_eq!(result.unwrap(), raster);
        assert_eq!(fetcher.limiter().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_reports_error() {
        let fetcher = fetcher(MockHeightmapClient::failing(), 6);
        let scheme = GeographicTilingScheme::default();
        let (tx, rx) = oneshot::channel();

        fetcher.start(TileKey::new(1, 0, 0), &scheme, move |result| {
            let _ = tx.send(result);
        });

        let result = rx.await.unwrap();
        assert!(matches!(result, Err(TerrainError::HttpStatus { status: 404, .. })));
        assert_eq!(fetcher.limiter().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_level_above_max_is_unsupported() {
        let client = MockHeightmapClient::failing();
        let fetcher = fetcher(client, 6);
        let scheme = GeographicTilingScheme::default();

        let start = fetcher.start(TileKey::new(12, 0, 0), &scheme, |_| {
            panic!("no request expected");
        });
        assert_eq!(
            start,
            FetchStart::Unsupported(TerrainError::LevelUnsupported {
                level: 12,
                max_level: 11
            })
        );
        assert_eq!(fetcher.limiter().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_key_outside_grid_is_unsupported() {
        let fetcher = fetcher(MockHeightmapClient::failing(), 6);
        let scheme = GeographicTilingScheme::default();
        let key = TileKey::new(1, 0, 2);

        let start = fetcher.start(key, &scheme, |_| panic!("no request expected"));

        assert_eq!(start, FetchStart::Unsupported(TerrainError::OutsideGrid(key)));
        assert_eq!(fetcher.limiter().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_budget_defers() {
        let gate = Arc::new(Semaphore::new(0));
        let client = MockHeightmapClient::failing().with_gate(Arc::clone(&gate));
        let fetcher = fetcher(client, 2);
        let scheme = GeographicTilingScheme::default();

        let a = fetcher.start(TileKey::new(1, 0, 0), &scheme, |_| {});
        let b = fetcher.start(TileKey::new(1, 1, 0), &scheme, |_| {});
        let c = fetcher.start(TileKey::new(1, 2, 0), &scheme, |_| {});

        assert_eq!(a, FetchStart::Started);
        assert_eq!(b, FetchStart::Started);
        assert_eq!(c, FetchStart::Deferred);
        assert_eq!(fetcher.limiter().in_flight(), 2);
        gate.add_permits(2);
    }

    #[test]
    fn test_url_for_uses_flipped_row() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let fetcher = TileFetcher::new(
            Arc::new(MockHeightmapClient::failing()),
            TileUrlBuilder::new("http://tiles", "png"),
            Arc::new(RequestLimiter::with_defaults("test")),
            DEFAULT_MAX_LEVEL,
            runtime.handle().clone(),
        );
        let scheme = GeographicTilingScheme::default();
        assert_eq!(fetcher.url_for(TileKey::new(2, 3, 0), &scheme), "http://tiles/2/3/3.png");
    }
}
