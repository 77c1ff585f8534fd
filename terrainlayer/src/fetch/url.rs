//! Heightmap URL construction.

use std::fmt;
use std::sync::Arc;

use crate::geo::GeographicTilingScheme;
use crate::tile::TileKey;

/// Rewrites request URLs, typically to route them through a proxy server.
pub trait Proxy: Send + Sync {
    fn rewrite(&self, url: &str) -> String;
}

impl<F> Proxy for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn rewrite(&self, url: &str) -> String {
        self(url)
    }
}

/// Proxy that passes the original URL as the query string of a prefix.
///
/// ```
/// use terrainlayer::fetch::{PrefixProxy, Proxy};
///
/// let proxy = PrefixProxy::new("/proxy/");
/// assert_eq!(proxy.rewrite("http://tiles/0/0/0.png"), "/proxy/?http://tiles/0/0/0.png");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixProxy {
    prefix: String,
}

impl PrefixProxy {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Proxy for PrefixProxy {
    fn rewrite(&self, url: &str) -> String {
        format!("{}?{}", self.prefix, url)
    }
}

/// Builds `{base}/{level}/{x}/{y}.{extension}` addresses.
///
/// The server counts rows from the south edge while the tiling scheme counts
/// from the north, so the row is flipped before formatting.
#[derive(Clone)]
pub struct TileUrlBuilder {
    base_url: String,
    extension: String,
    proxy: Option<Arc<dyn Proxy>>,
}

impl TileUrlBuilder {
    pub fn new(base_url: impl Into<String>, extension: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            extension: extension.into(),
            proxy: None,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<Arc<dyn Proxy>>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build(&self, key: TileKey, scheme: &GeographicTilingScheme) -> String {
        let rows = scheme.number_of_y_tiles_at_level(key.level());
        // Saturates for keys outside the grid.
        let flipped_y = rows.saturating_sub(key.y()).saturating_sub(1);
        let url = format!(
            "{}/{}/{}/{}.{}",
            self.base_url,
            key.level(),
            key.x(),
            flipped_y,
            self.extension
        );

        match &self.proxy {
            Some(proxy) => proxy.rewrite(&url),
            None => url,
        }
    }
}

impl fmt::Debug for TileUrlBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileUrlBuilder")
            .field("base_url", &self.base_url)
            .field("extension", &self.extension)
            .field("proxy", &self.proxy.is_some())
            .finish()
    }
}
