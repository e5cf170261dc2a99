//! Engine configuration from environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use runshape_core::{RefineConfig, RouteError, RoutingConfig, RoutingProfile, SuggestConfig};
use runshape_router::{
    ChunkedSettings, DirectionsRouter, OsrmRouter, PointToPointSettings, RoadSnapper,
    DEFAULT_MAPBOX_URL, DEFAULT_OSRM_URL,
};
use thiserror::Error;

use crate::catalog::{CatalogError, ShapeCatalog};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown routing backend '{0}' (expected osrm or mapbox)")]
    UnknownBackend(String),
    #[error("MAPBOX_TOKEN must be set when RUNSHAPE_BACKEND=mapbox")]
    MissingMapboxToken,
    #[error("failed to read tuning file {path}: {source}")]
    TuningIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid tuning file {path}: {source}")]
    Tuning {
        path: PathBuf,
        #[source]
        source: RouteError,
    },
    #[error("RUNSHAPE_SHAPES_PATH is not set")]
    NoShapesPath,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Route(#[from] RouteError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Osrm,
    Mapbox,
}

impl Backend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "osrm" | "point-to-point" => Some(Backend::Osrm),
            "mapbox" | "chunked" => Some(Backend::Mapbox),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,
    pub osrm_url: String,
    pub mapbox_url: String,
    pub mapbox_token: Option<String>,
    pub profile: RoutingProfile,
    pub max_concurrent: usize,
    /// Per-request timeout; backend default when unset.
    pub timeout: Option<Duration>,
    pub shapes_path: Option<PathBuf>,
    pub routing: RoutingConfig,
    pub refine: RefineConfig,
    pub suggest: SuggestConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Osrm,
            osrm_url: DEFAULT_OSRM_URL.to_string(),
            mapbox_url: DEFAULT_MAPBOX_URL.to_string(),
            mapbox_token: None,
            profile: RoutingProfile::Foot,
            max_concurrent: PointToPointSettings::default().max_concurrent,
            timeout: None,
            shapes_path: None,
            routing: RoutingConfig::default(),
            refine: RefineConfig::default(),
            suggest: SuggestConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let backend = match lookup("RUNSHAPE_BACKEND") {
            Some(raw) => Backend::parse(&raw).ok_or(ConfigError::UnknownBackend(raw))?,
            None => defaults.backend,
        };
        let mapbox_token = lookup("MAPBOX_TOKEN").filter(|t| !t.trim().is_empty());
        if backend == Backend::Mapbox && mapbox_token.is_none() {
            return Err(ConfigError::MissingMapboxToken);
        }

        let routing = match lookup("RUNSHAPE_TUNING_PATH").map(PathBuf::from) {
            Some(path) => {
                let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::TuningIo {
                    path: path.clone(),
                    source,
                })?;
                RoutingConfig::from_json(&raw)
                    .map_err(|source| ConfigError::Tuning { path, source })?
            }
            None => defaults.routing,
        };

        Ok(Self {
            backend,
            osrm_url: lookup("OSRM_URL").unwrap_or(defaults.osrm_url),
            mapbox_url: lookup("MAPBOX_URL").unwrap_or(defaults.mapbox_url),
            mapbox_token,
            profile: lookup("RUNSHAPE_PROFILE")
                .and_then(|s| RoutingProfile::parse(&s))
                .unwrap_or(defaults.profile),
            max_concurrent: lookup("RUNSHAPE_MAX_CONCURRENT")
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent),
            timeout: lookup("RUNSHAPE_TIMEOUT_S")
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .map(Duration::from_secs_f64),
            shapes_path: lookup("RUNSHAPE_SHAPES_PATH").map(PathBuf::from),
            routing,
            refine: defaults.refine,
            suggest: defaults.suggest,
        })
    }

    /// Construct the configured road snapper.
    pub fn build_snapper(&self) -> Result<RoadSnapper, ConfigError> {
        match self.backend {
            Backend::Osrm => {
                let defaults = PointToPointSettings::default();
                let settings = PointToPointSettings {
                    max_concurrent: self.max_concurrent,
                    timeout: self.timeout.unwrap_or(defaults.timeout),
                    ..defaults
                };
                tracing::info!(
                    "Using OSRM backend at {} ({} concurrent)",
                    self.osrm_url,
                    settings.max_concurrent
                );
                Ok(RoadSnapper::PointToPoint(OsrmRouter::new(
                    self.osrm_url.clone(),
                    settings,
                )))
            }
            Backend::Mapbox => {
                let token = self
                    .mapbox_token
                    .clone()
                    .ok_or(ConfigError::MissingMapboxToken)?;
                let defaults = ChunkedSettings::default();
                let settings = ChunkedSettings {
                    timeout: self.timeout.unwrap_or(defaults.timeout),
                    ..defaults
                };
                tracing::info!("Using Mapbox backend at {}", self.mapbox_url);
                Ok(RoadSnapper::Chunked(DirectionsRouter::new(
                    self.mapbox_url.clone(),
                    token,
                    settings,
                )?))
            }
        }
    }

    /// Load the shape catalog named by `RUNSHAPE_SHAPES_PATH`.
    pub async fn load_catalog(&self) -> Result<ShapeCatalog, ConfigError> {
        let path = self.shapes_path.as_ref().ok_or(ConfigError::NoShapesPath)?;
        Ok(ShapeCatalog::load(path).await?)
    }
}
