//! Provider configuration.
//!
//! A [`TerrainConfig`] is built in code with builder-style setters, or read
//! from the `[terrain]` section of an INI file:
//!
//! ```ini
//! [terrain]
//! url = https://tiles.example.com/heightmaps
//! image_extension = png
//! proxy_prefix = /proxy/
//! max_requests_in_flight = 6
//! ```
//!
//! Only `url` is required. Every other key falls back to the defaults below.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use ini::Ini;
use thiserror::Error;

use crate::fetch::{PrefixProxy, Proxy, DEFAULT_MAX_LEVEL, DEFAULT_MAX_REQUESTS_IN_FLIGHT, DEFAULT_TIMEOUT_SECS};
use crate::mesh::{default_max_active_transforms, DEFAULT_HEIGHT_OFFSET, DEFAULT_HEIGHT_SCALE};

/// INI section holding provider settings.
pub const CONFIG_SECTION: &str = "terrain";

/// Samples per heightmap row and column.
pub const DEFAULT_HEIGHTMAP_WIDTH: u32 = 32;

/// Default image file extension on the tile server.
pub const DEFAULT_IMAGE_EXTENSION: &str = "png";

/// Largest heightmap whose skirted grid still fits 16-bit indices.
const MAX_HEIGHTMAP_WIDTH: u32 = 254;

/// Errors raised while building or loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required key '{key}' in [{section}]")]
    MissingKey { section: String, key: String },

    #[error("Invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(String),

    #[error("No tokio runtime is available to run heightmap requests")]
    NoRuntime,

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Configuration of a [`TerrainProvider`](crate::TerrainProvider).
#[derive(Clone)]
pub struct TerrainConfig {
    pub url: String,
    pub image_extension: String,
    pub proxy: Option<Arc<dyn Proxy>>,
    pub heightmap_width: u32,
    pub max_level: u32,
    pub max_requests_in_flight: usize,
    pub max_active_transforms: usize,
    pub height_scale: f64,
    pub height_offset: f64,
    pub request_timeout_secs: u64,
}

impl TerrainConfig {
    /// Creates a configuration for the server at `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            image_extension: DEFAULT_IMAGE_EXTENSION.to_string(),
            proxy: None,
            heightmap_width: DEFAULT_HEIGHTMAP_WIDTH,
            max_level: DEFAULT_MAX_LEVEL,
            max_requests_in_flight: DEFAULT_MAX_REQUESTS_IN_FLIGHT,
            max_active_transforms: default_max_active_transforms(),
            height_scale: DEFAULT_HEIGHT_SCALE,
            height_offset: DEFAULT_HEIGHT_OFFSET,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_image_extension(mut self, extension: impl Into<String>) -> Self {
        self.image_extension = extension.into();
        self
    }

    pub fn with_proxy(mut self, proxy: impl Proxy + 'static) -> Self {
        self.proxy = Some(Arc::new(proxy));
        self
    }

    pub fn with_max_level(mut self, max_level: u32) -> Self {
        self.max_level = max_level;
        self
    }

    pub fn with_max_requests_in_flight(mut self, max: usize) -> Self {
        self.max_requests_in_flight = max;
        self
    }

    pub fn with_max_active_transforms(mut self, max: usize) -> Self {
        self.max_active_transforms = max;
        self
    }

    pub fn with_height_encoding(mut self, scale: f64, offset: f64) -> Self {
        self.height_scale = scale;
        self.height_offset = offset;
        self
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Loads the `[terrain]` section of an INI file.
    pub fn from_ini_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parses the `[terrain]` section from INI text.
    pub fn from_ini_str(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let missing_url = || ConfigError::MissingKey {
            section: CONFIG_SECTION.to_string(),
            key: "url".to_string(),
        };
        let section = ini.section(Some(CONFIG_SECTION)).ok_or_else(missing_url)?;
        let url = section
            .get("url")
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(missing_url)?;

        let mut config = Self::new(url);

        if let Some(extension) = section.get("image_extension") {
            config.image_extension = extension.trim().to_string();
        }
        if let Some(prefix) = section.get("proxy_prefix") {
            let prefix = prefix.trim();
            if !prefix.is_empty() {
                config.proxy = Some(Arc::new(PrefixProxy::new(prefix)));
            }
        }
        if let Some(value) = section.get("max_level") {
            config.max_level = parse_value("max_level", value)?;
        }
        if let Some(value) = section.get("max_requests_in_flight") {
            config.max_requests_in_flight = parse_value("max_requests_in_flight", value)?;
        }
        if let Some(value) = section.get("max_active_transforms") {
            config.max_active_transforms = parse_value("max_active_transforms", value)?;
        }
        if let Some(value) = section.get("height_scale") {
            config.height_scale = parse_value("height_scale", value)?;
        }
        if let Some(value) = section.get("height_offset") {
            config.height_offset = parse_value("height_offset", value)?;
        }
        if let Some(value) = section.get("request_timeout_secs") {
            config.request_timeout_secs = parse_value("request_timeout_secs", value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that the settings can drive a provider.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingKey {
                section: CONFIG_SECTION.to_string(),
                key: "url".to_string(),
            });
        }
        if self.heightmap_width < 2 || self.heightmap_width > MAX_HEIGHTMAP_WIDTH {
            return Err(invalid(
                "heightmap_width",
                self.heightmap_width,
                format!("must be between 2 and {}", MAX_HEIGHTMAP_WIDTH),
            ));
        }
        if self.max_requests_in_flight == 0 {
            return Err(invalid("max_requests_in_flight", 0, "must be at least 1"));
        }
        if self.max_active_transforms == 0 {
            return Err(invalid("max_active_transforms", 0, "must be at least 1"));
        }
        if !self.height_scale.is_finite() || self.height_scale == 0.0 {
            return Err(invalid("height_scale", self.height_scale, "must be finite and non-zero"));
        }
        if !self.height_offset.is_finite() {
            return Err(invalid("height_offset", self.height_offset, "must be finite"));
        }
        Ok(())
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, value, e.to_string()))
}

fn invalid(key: &str, value: impl fmt::Display, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

impl fmt::Debug for TerrainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerrainConfig")
            .field("url", &self.url)
            .field("image_extension", &self.image_extension)
            .field("proxy", &self.proxy.is_some())
            .field("heightmap_width", &self.heightmap_width)
            .field("max_level", &self.max_level)
            .field("max_requests_in_flight", &self.max_requests_in_flight)
            .field("max_active_transforms", &self.max_active_transforms)
            .field("height_scale", &self.height_scale)
            .field("height_offset", &self.height_offset)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}
