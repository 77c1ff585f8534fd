//! Tile lifecycle orchestration.
//!
//! [`TerrainProvider`] moves tiles of a caller-owned [`TileTree`] through
//! the pipeline one stage per [`advance`](TerrainProvider::advance) call:
//!
//! | State         | `advance` does                           |
//! |---------------|------------------------------------------|
//! | `Unloaded`    | starts a fetch (or upsamples past max level) |
//! | `Received`    | starts a transform                       |
//! | `Transformed` | assembles render resources               |
//! | others        | nothing                                  |
//!
//! Fetches and transforms finish on other threads. Their results are queued
//! on a channel and only touch tiles when the tree owner calls
//! [`process_completions`](TerrainProvider::process_completions) or awaits
//! [`next_completion`](TerrainProvider::next_completion). Results for tiles
//! that have since been evicted are dropped, even when a new tile has been
//! inserted under the same key.

mod completion;

pub use completion::Completion;

use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::assemble::{RenderContext, ResourceAssembler};
use crate::codec::HeightRaster;
use crate::config::{ConfigError, TerrainConfig};
use crate::error::{TerrainError, TerrainResult};
use crate::fetch::{
    FetchStart, HeightmapClient, ReqwestHeightmapClient, RequestLimiter, TileFetcher,
    TileUrlBuilder,
};
use crate::geo::GeographicTilingScheme;
use crate::mesh::{GeometryTransformer, TransformPool, TransformStart, TransformedGeometry};
use crate::telemetry::TerrainMetrics;
use crate::tile::{TileKey, TileState, TileTree};
use crate::upsample::AncestorUpsampler;

/// Skirts never drop further than this, in metres.
pub const MAX_SKIRT_HEIGHT: f64 = 1000.0;

/// Drives heightmap tiles from an empty cell to renderable geometry.
pub struct TerrainProvider<C> {
    config: TerrainConfig,
    tiling_scheme: GeographicTilingScheme,
    fetcher: TileFetcher<C>,
    upsampler: AncestorUpsampler,
    transformer: GeometryTransformer,
    assembler: ResourceAssembler,
    level_zero_error: f64,
    metrics: Arc<TerrainMetrics>,
    /// Fetches and transforms started but not yet taken from the queue.
    pending: AtomicUsize,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
}

impl TerrainProvider<ReqwestHeightmapClient> {
    /// Creates a provider that fetches over HTTP.
    pub fn from_config(config: TerrainConfig) -> Result<Self, ConfigError> {
        let client = ReqwestHeightmapClient::with_timeout(config.request_timeout_secs)
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Self::new(config, client)
    }
}

impl<C: HeightmapClient> TerrainProvider<C> {
    /// Creates a provider using `client` for requests.
    ///
    /// Must be called from within a tokio runtime; requests are spawned on
    /// that runtime.
    pub fn new(config: TerrainConfig, client: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        let tiling_scheme = GeographicTilingScheme::default();
        let ellipsoid = *tiling_scheme.ellipsoid();

        let urls = TileUrlBuilder::new(config.url.clone(), config.image_extension.clone())
            .with_proxy(config.proxy.clone());
        let limiter = Arc::new(RequestLimiter::new(
            config.max_requests_in_flight,
            "heightmap-requests",
        ));
        let fetcher = TileFetcher::new(Arc::new(client), urls, limiter, config.max_level, runtime);

        let pool = Arc::new(TransformPool::new(config.max_active_transforms));
        let transformer = GeometryTransformer::new(
            &tiling_scheme,
            config.heightmap_width,
            config.height_scale,
            config.height_offset,
            pool,
        )
        .map_err(|e| ConfigError::InvalidValue {
            key: "heightmap_width".to_string(),
            value: config.heightmap_width.to_string(),
            reason: e.to_string(),
        })?;

        let level_zero_error = ellipsoid.maximum_radius() * 2.0 * PI * 0.25
            / (config.heightmap_width as f64
                * tiling_scheme.number_of_x_tiles_at_level(0) as f64);

        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        tracing::info!(
            url = %config.url,
            max_level = config.max_level,
            max_requests_in_flight = config.max_requests_in_flight,
            max_active_transforms = config.max_active_transforms,
            "Terrain provider created"
        );

        Ok(Self {
            upsampler: AncestorUpsampler::new(config.heightmap_width),
            assembler: ResourceAssembler::new(ellipsoid),
            config,
            tiling_scheme,
            fetcher,
            transformer,
            level_zero_error,
            metrics: Arc::new(TerrainMetrics::new()),
            pending: AtomicUsize::new(0),
            completion_tx,
            completion_rx,
        })
    }

    /// Shares a request budget with other providers.
    pub fn with_request_limiter(mut self, limiter: Arc<RequestLimiter>) -> Self {
        self.fetcher = self.fetcher.with_limiter(limiter);
        self
    }

    /// Shares a transform pool with other providers.
    pub fn with_transform_pool(mut self, pool: Arc<TransformPool>) -> Self {
        self.transformer = self.transformer.with_pool(pool);
        self
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn tiling_scheme(&self) -> &GeographicTilingScheme {
        &self.tiling_scheme
    }

    /// An empty tree using this provider's tiling scheme.
    pub fn create_tile_tree(&self) -> TileTree {
        TileTree::new(self.tiling_scheme)
    }

    pub fn metrics(&self) -> &Arc<TerrainMetrics> {
        &self.metrics
    }

    pub fn request_limiter(&self) -> &Arc<RequestLimiter> {
        self.fetcher.limiter()
    }

    pub fn transform_pool(&self) -> &Arc<TransformPool> {
        self.transformer.pool()
    }

    /// Number of started fetches and transforms whose results have not been
    /// applied yet.
    pub fn pending_completions(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Geometric error, in metres, of a tile at `level`.
    pub fn level_maximum_geometric_error(&self, level: u32) -> f64 {
        self.level_zero_error / (1u64 << level.min(63)) as f64
    }

    /// Depth of the skirt hung around tiles at `level`.
    pub fn skirt_height(&self, level: u32) -> f64 {
        (self.level_maximum_geometric_error(level) * 10.0).min(MAX_SKIRT_HEIGHT)
    }

    /// Moves the tile one stage forward.
    ///
    /// Returns the tile's state after the call, or `None` if the tree has no
    /// tile for `key`.
    pub fn advance<R>(&self, tree: &mut TileTree, key: TileKey, context: &mut R) -> Option<TileState>
    where
        R: RenderContext + ?Sized,
    {
        match tree.get(key)?.state() {
            TileState::Unloaded => self.request_tile(tree, key),
            TileState::Received => self.transform_tile(tree, key),
            TileState::Transformed => self.assemble_tile(tree, key, context),
            TileState::Receiving
            | TileState::Transforming
            | TileState::Ready
            | TileState::Failed => {}
        }
        tree.get(key).map(|tile| tile.state())
    }

    /// Starts fetching an unloaded tile.
    ///
    /// Tiles beyond the deepest served level are upsampled immediately. When
    /// the request budget is exhausted the tile stays unloaded.
    pub fn request_tile(&self, tree: &mut TileTree, key: TileKey) {
        let Some(tile) = tree.get_mut(key) else {
            return;
        };
        if tile.state() != TileState::Unloaded {
            return;
        }
        tile.set_state(TileState::Receiving);
        let generation = tile.generation();

        let tx = self.completion_tx.clone();
        let start = self.fetcher.start(key, &self.tiling_scheme, move |result| {
            let _ = tx.send(Completion::Fetched {
                key,
                generation,
                result,
            });
        });

        match start {
            FetchStart::Started => {
                self.pending.fetch_add(1, Ordering::AcqRel);
                self.metrics.request_issued();
            }
            FetchStart::Deferred => {
                self.metrics.request_deferred();
                if let Some(tile) = tree.get_mut(key) {
                    tile.set_state(TileState::Unloaded);
                }
            }
            FetchStart::Unsupported(error) => {
                tracing::debug!(tile = %key, "Level not served, upsampling");
                self.recover_from_fetch_failure(tree, key, error);
            }
        }
    }

    /// Starts tessellating a received tile.
    ///
    /// A saturated transform pool leaves the tile received with its heightmap
    /// intact.
    pub fn transform_tile(&self, tree: &mut TileTree, key: TileKey) {
        let skirt_height = self.skirt_height(key.level());
        let Some(tile) = tree.get_mut(key) else {
            return;
        };
        if tile.state() != TileState::Received {
            return;
        }

        let generation = tile.generation();
        let tx = self.completion_tx.clone();
        let start = self.transformer.start(tile, skirt_height, move |result| {
            let _ = tx.send(Completion::Transformed {
                key,
                generation,
                result,
            });
        });

        match start {
            Ok(TransformStart::Scheduled) => {
                self.pending.fetch_add(1, Ordering::AcqRel);
                tile.set_state(TileState::Transforming);
            }
            Ok(TransformStart::Postponed) => self.metrics.transform_postponed(),
            Err(error) => {
                tracing::error!(tile = %key, error = %error, "Failed to start transform");
                tile.fail(error);
                self.metrics.transform_failed();
                self.metrics.tile_failed();
            }
        }
    }

    /// Builds render resources for a transformed tile.
    pub fn assemble_tile<R>(&self, tree: &mut TileTree, key: TileKey, context: &mut R)
    where
        R: RenderContext + ?Sized,
    {
        let Some(tile) = tree.get_mut(key) else {
            return;
        };
        if tile.state() != TileState::Transformed {
            return;
        }

        match self.assembler.assemble(tile, context) {
            Ok(()) => {
                self.metrics.tile_ready();
                tracing::debug!(tile = %key, "Tile ready");
            }
            Err(error) => {
                tracing::error!(tile = %key, error = %error, "Failed to assemble tile");
                tile.fail(error);
                self.metrics.tile_failed();
            }
        }
    }

    /// Applies every queued completion without waiting.
    ///
    /// Returns the number of completions taken from the queue.
    pub fn process_completions(&mut self, tree: &mut TileTree) -> usize {
        let mut processed = 0;
        while let Ok(completion) = self.completion_rx.try_recv() {
            self.apply(tree, completion);
            processed += 1;
        }
        processed
    }

    /// Waits for the next completion and applies it.
    ///
    /// Returns the key of the tile the completion belonged to, or `None`
    /// without waiting when no fetch or transform is outstanding.
    pub async fn next_completion(&mut self, tree: &mut TileTree) -> Option<TileKey> {
        if self.pending_completions() == 0 {
            return None;
        }
        let completion = self.completion_rx.recv().await?;
        let key = completion.key();
        self.apply(tree, completion);
        Some(key)
    }

    fn apply(&self, tree: &mut TileTree, completion: Completion) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
        match completion {
            Completion::Fetched {
                key,
                generation,
                result,
            } => self.apply_fetch(tree, key, generation, result),
            Completion::Transformed {
                key,
                generation,
                result,
            } => self.apply_transform(tree, key, generation, result),
        }
    }

    fn apply_fetch(
        &self,
        tree: &mut TileTree,
        key: TileKey,
        generation: u64,
        result: TerrainResult<HeightRaster>,
    ) {
        match result {
            Ok(_) => self.metrics.fetch_succeeded(),
            Err(_) => self.metrics.fetch_failed(),
        }

        let Some(tile) = tree.get_mut(key).filter(|tile| tile.generation() == generation) else {
            tracing::debug!(tile = %key, "Discarding heightmap for evicted tile");
            return;
        };
        if tile.state() != TileState::Receiving {
            tracing::debug!(tile = %key, state = %tile.state(), "Discarding unexpected heightmap");
            return;
        }

        match result {
            Ok(raster) => {
                tracing::debug!(tile = %key, "Heightmap received");
                tile.set_real_geometry(raster);
            }
            Err(error) => {
                tracing::warn!(tile = %key, error = %error, "Heightmap fetch failed");
                self.recover_from_fetch_failure(tree, key, error);
            }
        }
    }

    /// Replaces missing remote data with heights from the nearest ancestor.
    fn recover_from_fetch_failure(&self, tree: &mut TileTree, key: TileKey, error: TerrainError) {
        let outcome = if error.is_recoverable() {
            self.upsampler.upsample(tree, key)
        } else {
            Err(error.clone())
        };

        let Some(tile) = tree.get_mut(key) else {
            return;
        };
        match outcome {
            Ok(raster) => {
                tile.record_error(error);
                tile.set_upsampled_geometry(raster);
                self.metrics.tile_upsampled();
            }
            Err(failure) => {
                tracing::warn!(tile = %key, error = %failure, "Tile failed");
                tile.fail(failure);
                self.metrics.tile_failed();
            }
        }
    }

    fn apply_transform(
        &self,
        tree: &mut TileTree,
        key: TileKey,
        generation: u64,
        result: TerrainResult<TransformedGeometry>,
    ) {
        let Some(tile) = tree.get_mut(key).filter(|tile| tile.generation() == generation) else {
            tracing::debug!(tile = %key, "Discarding mesh for evicted tile");
            return;
        };
        if tile.state() != TileState::Transforming {
            tracing::debug!(tile = %key, state = %tile.state(), "Discarding unexpected mesh");
            return;
        }

        match result {
            Ok(geometry) => {
                tracing::debug!(tile = %key, vertices = geometry.vertex_count(), "Mesh generated");
                tile.set_transformed_geometry(geometry);
                self.metrics.transform_completed();
            }
            Err(error) => {
                tracing::error!(tile = %key, error = %error, "Geometry transform failed");
                tile.fail(error);
                self.metrics.transform_failed();
                self.metrics.tile_failed();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::VertexArrayHandle;
    use crate::fetch::{encode_png, MockHeightmapClient};
    use tokio::sync::Semaphore;

    #[derive(Default)]
    struct CountingContext {
        created: u64,
    }

    impl RenderContext for CountingContext {
        fn create_vertex_array(&mut self, _: &[f32], _: &[u16], _: usize) -> VertexArrayHandle {
            self.created += 1;
            VertexArrayHandle(self.created)
        }
    }

    fn config() -> TerrainConfig {
        TerrainConfig::new("http://tiles.test/heightmaps")
    }

    fn flat_png(value: u32) -> Vec<u8> {
        encode_png(&HeightRaster::filled(32, 32, value))
    }

    async fn drive_until_settled(
        provider: &mut TerrainProvider<MockHeightmapClient>,
        tree: &mut TileTree,
        key: TileKey,
    ) -> TileState {
        let mut context = CountingContext::default();
        loop {
            let state = provider.advance(tree, key, &mut context).unwrap();
            match state {
                TileState::Ready | TileState::Failed => return state,
                TileState::Receiving | TileState::Transforming => {
                    provider.next_completion(tree).await;
                }
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_level_zero_tile_becomes_ready() {
        let client = MockHeightmapClient::succeeding(flat_png(10_000));
        let mut provider = TerrainProvider::new(config(), client).unwrap();
        let mut tree = provider.create_tile_tree();
        let key = TileKey::new(0, 0, 0);
        tree.insert(key);

        let state = drive_until_settled(&mut provider, &mut tree, key).await;

        assert_eq!(state, TileState::Ready);
        let tile = tree.get(key).unwrap();
        assert!(tile.has_real_data());
        assert!(tile.transformed_geometry().is_none());
        assert_eq!(tile.render().unwrap().max_height, 1000.0);

        let snapshot = provider.metrics().snapshot();
        assert_eq!(snapshot.requests_issued, 1);
        assert_eq!(snapshot.fetch_succeeded, 1);
        assert_eq!(snapshot.tiles_ready, 1);
        assert_eq!(provider.request_limiter().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_upsamples_from_parent() {
        let parent = TileKey::new(2, 3, 1);
        let child = parent.children()[2];
        let client = MockHeightmapClient::failing();
        let mut provider = TerrainProvider::new(config(), client).unwrap();
        let mut tree = provider.create_tile_tree();
        tree.insert(parent)
            .set_real_geometry(HeightRaster::filled(32, 32, 100));
        tree.insert(child);

        provider.advance(&mut tree, child, &mut CountingContext::default());
        assert_eq!(tree.get(child).unwrap().state(), TileState::Receiving);
        provider.next_completion(&mut tree).await;

        let tile = tree.get(child).unwrap();
        assert_eq!(tile.state(), TileState::Received);
        assert!(!tile.has_real_data());
        assert!(tile.geometry().unwrap().heights().all(|h| h == 100));
        assert!(matches!(tile.last_error(), Some(TerrainError::HttpStatus { .. })));
        assert_eq!(provider.metrics().snapshot().tiles_upsampled, 1);
    }

    #[tokio::test]
    async fn test_deep_level_skips_network() {
        let client = MockHeightmapClient::succeeding(flat_png(0));
        let provider = TerrainProvider::new(config(), client).unwrap();
        let mut tree = provider.create_tile_tree();
        let key = TileKey::new(12, 100, 50);
        tree.insert_with_ancestors(key);
        let root = key.ancestors().last().unwrap();
        tree.get_mut(root)
            .unwrap()
            .set_real_geometry(HeightRaster::filled(32, 32, 7));

        let state = provider.advance(&mut tree, key, &mut CountingContext::default());

        assert_eq!(state, Some(TileState::Received));
        assert_eq!(provider.metrics().snapshot().requests_issued, 0);
        assert_eq!(
            tree.get(key).unwrap().last_error(),
            Some(&TerrainError::LevelUnsupported {
                level: 12,
                max_level: 11
            })
        );
    }

    #[tokio::test]
    async fn test_seventh_request_is_deferred() {
        let gate = Arc::new(Semaphore::new(0));
        let client = MockHeightmapClient::succeeding(flat_png(0)).with_gate(Arc::clone(&gate));
        let provider = TerrainProvider::new(config(), client).unwrap();
        let mut tree = provider.create_tile_tree();
        let keys: Vec<_> = (0..7).map(|x| TileKey::new(3, x, 2)).collect();
        for &key in &keys {
            tree.insert(key);
        }

        let mut context = CountingContext::default();
        let states: Vec<_> = keys
            .iter()
            .map(|&key| provider.advance(&mut tree, key, &mut context).unwrap())
            .collect();

        assert!(states[..6].iter().all(|&s| s == TileState::Receiving));
        assert_eq!(states[6], TileState::Unloaded);
        assert_eq!(provider.request_limiter().in_flight(), 6);
        assert_eq!(provider.metrics().snapshot().requests_deferred, 1);
        gate.add_permits(7);
    }

    #[tokio::test]
    async fn test_advance_while_receiving_is_noop() {
        let gate = Arc::new(Semaphore::new(0));
        let client = MockHeightmapClient::succeeding(flat_png(0)).with_gate(Arc::clone(&gate));
        let provider = TerrainProvider::new(config(), client).unwrap();
        let mut tree = provider.create_tile_tree();
        let key = TileKey::new(1, 1, 0);
        tree.insert(key);

        let mut context = CountingContext::default();
        provider.advance(&mut tree, key, &mut context);
        provider.advance(&mut tree, key, &mut context);

        assert_eq!(provider.metrics().snapshot().requests_issued, 1);
        assert_eq!(provider.request_limiter().in_flight(), 1);
        gate.add_permits(1);
    }

    #[tokio::test]
    async fn test_postponed_transform_keeps_geometry() {
        let pool = Arc::new(TransformPool::new(1));
        let provider = TerrainProvider::new(config(), MockHeightmapClient::failing())
            .unwrap()
            .with_transform_pool(Arc::clone(&pool));
        let mut tree = provider.create_tile_tree();
        let key = TileKey::new(0, 1, 0);
        tree.insert(key)
            .set_real_geometry(HeightRaster::filled(32, 32, 0));

        let _held = pool.try_acquire().unwrap();
        let state = provider.advance(&mut tree, key, &mut CountingContext::default());

        assert_eq!(state, Some(TileState::Received));
        assert!(tree.get(key).unwrap().geometry().is_some());
        assert_eq!(provider.metrics().snapshot().transforms_postponed, 1);
    }

    #[tokio::test]
    async fn test_no_ancestor_fails_tile() {
        let mut provider = TerrainProvider::new(config(), MockHeightmapClient::failing()).unwrap();
        let mut tree = provider.create_tile_tree();
        let key = TileKey::new(4, 3, 3);
        tree.insert_with_ancestors(key);

        provider.advance(&mut tree, key, &mut CountingContext::default());
        provider.next_completion(&mut tree).await;

        let tile = tree.get(key).unwrap();
        assert_eq!(tile.state(), TileState::Failed);
        assert_eq!(tile.last_error(), Some(&TerrainError::NoAncestorData(key)));
        assert_eq!(
            provider.advance(&mut tree, key, &mut CountingContext::default()),
            Some(TileState::Failed)
        );
    }

    #[tokio::test]
    async fn test_completion_for_evicted_tile_is_discarded() {
        let mut provider =
            TerrainProvider::new(config(), MockHeightmapClient::succeeding(flat_png(0))).unwrap();
        let mut tree = provider.create_tile_tree();
        let key = TileKey::new(1, 0, 0);
        tree.insert(key);

        provider.advance(&mut tree, key, &mut CountingContext::default());
        tree.remove(key);

        assert_eq!(provider.next_completion(&mut tree).await, Some(key));
        assert!(tree.get(key).is_none());
        assert_eq!(provider.request_limiter().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_result_for_evicted_tile_skips_reinserted_tile() {
        let gate = Arc::new(Semaphore::new(0));
        let client = MockHeightmapClient::failing().with_gate(Arc::clone(&gate));
        let mut provider = TerrainProvider::new(config(), client).unwrap();
        let mut tree = provider.create_tile_tree();
        let key = TileKey::new(1, 0, 0);
        let mut context = CountingContext::default();

        let evicted = tree.insert(key).generation();
        provider.advance(&mut tree, key, &mut context);
        tree.remove(key);
        let fresh = tree.insert(key).generation();
        assert_ne!(evicted, fresh);
        assert_eq!(provider.advance(&mut tree, key, &mut context), Some(TileState::Receiving));

        // Release only the request started for the evicted tile.
        gate.add_permits(1);
        assert_eq!(provider.next_completion(&mut tree).await, Some(key));
        assert_eq!(tree.get(key).unwrap().state(), TileState::Receiving);
        assert_eq!(provider.pending_completions(), 1);

        gate.add_permits(1);
        provider.next_completion(&mut tree).await;
        let tile = tree.get(key).unwrap();
        assert_eq!(tile.state(), TileState::Failed);
        assert_eq!(tile.last_error(), Some(&TerrainError::NoAncestorData(key)));
        assert_eq!(provider.request_limiter().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_oversized_heightmap_fails_transform() {
        let png = encode_png(&HeightRaster::filled(256, 256, 0));
        let mut provider =
            TerrainProvider::new(config(), MockHeightmapClient::succeeding(png)).unwrap();
        let mut tree = provider.create_tile_tree();
        let key = TileKey::new(0, 0, 0);
        tree.insert(key);

        let state = drive_until_settled(&mut provider, &mut tree, key).await;

        assert_eq!(state, TileState::Failed);
        assert!(matches!(
            tree.get(key).unwrap().last_error(),
            Some(TerrainError::Transform(_))
        ));
        let snapshot = provider.metrics().snapshot();
        assert_eq!(snapshot.transforms_failed, 1);
        assert_eq!(snapshot.tiles_failed, 1);
        assert_eq!(provider.transform_pool().active(), 0);
    }

    #[tokio::test]
    async fn test_key_outside_grid_fails() {
        let provider = TerrainProvider::new(config(), MockHeightmapClient::failing()).unwrap();
        let mut tree = provider.create_tile_tree();
        let key = TileKey::new(1, 0, 5);
        tree.insert(key);

        let state = provider.advance(&mut tree, key, &mut CountingContext::default());

        assert_eq!(state, Some(TileState::Failed));
        assert_eq!(
            tree.get(key).unwrap().last_error(),
            Some(&TerrainError::OutsideGrid(key))
        );
        assert_eq!(provider.metrics().snapshot().requests_issued, 0);
    }

    #[tokio::test]
    async fn test_next_completion_returns_none_when_idle() {
        let mut provider =
            TerrainProvider::new(config(), MockHeightmapClient::succeeding(flat_png(0))).unwrap();
        let mut tree = provider.create_tile_tree();
        assert_eq!(provider.next_completion(&mut tree).await, None);

        let key = TileKey::new(0, 1, 0);
        tree.insert(key);
        provider.advance(&mut tree, key, &mut CountingContext::default());
        assert_eq!(provider.pending_completions(), 1);
        assert_eq!(provider.next_completion(&mut tree).await, Some(key));
        assert_eq!(provider.pending_completions(), 0);
        assert_eq!(provider.next_completion(&mut tree).await, None);
    }

    #[tokio::test]
    async fn test_shared_request_limiter() {
        let shared = Arc::new(RequestLimiter::new(1, "shared"));
        let gate = Arc::new(Semaphore::new(0));
        let a = TerrainProvider::new(
            config(),
            MockHeightmapClient::succeeding(flat_png(0)).with_gate(Arc::clone(&gate)),
        )
        .unwrap()
        .with_request_limiter(Arc::clone(&shared));
        let b = TerrainProvider::new(config(), MockHeightmapClient::succeeding(flat_png(0)))
            .unwrap()
            .with_request_limiter(Arc::clone(&shared));

        let mut tree_a = a.create_tile_tree();
        let mut tree_b = b.create_tile_tree();
        let key = TileKey::new(0, 0, 0);
        tree_a.insert(key);
        tree_b.insert(key);

        let mut context = CountingContext::default();
        assert_eq!(a.advance(&mut tree_a, key, &mut context), Some(TileState::Receiving));
        assert_eq!(b.advance(&mut tree_b, key, &mut context), Some(TileState::Unloaded));
        gate.add_permits(1);
    }

    #[tokio::test]
    async fn test_geometric_error_and_skirt_height() {
        let provider = TerrainProvider::new(config(), MockHeightmapClient::failing()).unwrap();
        let level_zero = provider.level_maximum_geometric_error(0);
        assert!((level_zero - 156_543.033_928).abs() < 1e-3);
        assert_eq!(provider.level_maximum_geometric_error(3), level_zero / 8.0);
        assert_eq!(provider.skirt_height(0), 1000.0);
        assert!((provider.skirt_height(11) - level_zero * 10.0 / 2048.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_tile_returns_none() {
        let provider = TerrainProvider::new(config(), MockHeightmapClient::failing()).unwrap();
        let mut tree = provider.create_tile_tree();
        let state = provider.advance(&mut tree, TileKey::new(0, 0, 0), &mut CountingContext::default());
        assert_eq!(state, None);
    }

    #[test]
    fn test_requires_runtime() {
        let result = TerrainProvider::new(config(), MockHeightmapClient::failing());
        assert!(matches!(result, Err(ConfigError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let result = TerrainProvider::new(
            config().with_max_requests_in_flight(0),
            MockHeightmapClient::failing(),
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
