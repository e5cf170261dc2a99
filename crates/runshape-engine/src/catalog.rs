//! Named shape catalog.
//!
//! Shapes are loaded from a JSON object mapping names to point lists:
//!
//! ```json
//! { "heart": [[0.5, 0.2], [0.8, 0.1], ...], "star": [...] }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use runshape_core::{validate_shape, AbstractPoint};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read shape catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse shape catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("catalog was not loaded from a file")]
    NoSource,
}

/// A shape resolved from the catalog.
#[derive(Debug, Clone)]
pub struct NamedShape {
    pub name: String,
    pub points: Arc<[AbstractPoint]>,
}

impl NamedShape {
    pub fn new(name: impl Into<String>, points: Vec<AbstractPoint>) -> Self {
        Self {
            name: name.into(),
            points: points.into(),
        }
    }

    /// "thumbs-up" -> "Thumbs Up"
    pub fn display_name(&self) -> String {
        self.name
            .split(['-', '_', ' '])
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }
}

type ShapeMap = BTreeMap<String, Arc<[AbstractPoint]>>;

/// In-memory shape store with explicit load and reload.
#[derive(Debug, Default)]
pub struct ShapeCatalog {
    source: Option<PathBuf>,
    shapes: RwLock<ShapeMap>,
}

impl ShapeCatalog {
    /// Load shapes from a JSON file. Invalid shapes are skipped with a warning.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref().to_path_buf();
        let shapes = read_shapes(&path).await?;
        tracing::info!("Loaded {} shapes from {}", shapes.len(), path.display());
        Ok(Self {
            source: Some(path),
            shapes: RwLock::new(shapes),
        })
    }

    /// Build a catalog from shapes already in memory.
    pub fn from_shapes<I, N>(shapes: I) -> Self
    where
        I: IntoIterator<Item = (N, Vec<AbstractPoint>)>,
        N: Into<String>,
    {
        Self {
            source: None,
            shapes: RwLock::new(collect_valid(
                shapes.into_iter().map(|(name, points)| (name.into(), points)),
            )),
        }
    }

    /// Re-read the source file. On failure the current shapes stay in place.
    pub async fn reload(&self) -> Result<usize, CatalogError> {
        let path = self.source.as_ref().ok_or(CatalogError::NoSource)?;
        let fresh = read_shapes(path).await?;
        let count = fresh.len();
        match self.shapes.write() {
            Ok(mut shapes) => *shapes = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
        tracing::info!("Reloaded {} shapes from {}", count, path.display());
        Ok(count)
    }

    pub fn get(&self, name: &str) -> Option<NamedShape> {
        let shapes = self.shapes.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        shapes.get(name).map(|points| NamedShape {
            name: name.to_string(),
            points: Arc::clone(points),
        })
    }

    /// All shape names, sorted.
    pub fn names(&self) -> Vec<String> {
        let shapes = self.shapes.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        shapes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.shapes.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up `names` in order, skipping any that are missing.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Vec<NamedShape> {
        names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                let found = self.get(name);
                if found.is_none() {
                    tracing::warn!("Shape '{}' not found in catalog", name);
                }
                found
            })
            .collect()
    }
}

async fn read_shapes(path: &Path) -> Result<ShapeMap, CatalogError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let parsed: BTreeMap<String, Vec<[f64; 2]>> =
        serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(collect_valid(parsed.into_iter().map(|(name, points)| {
        (name, points.into_iter().map(AbstractPoint::from).collect())
    })))
}

fn collect_valid(shapes: impl Iterator<Item = (String, Vec<AbstractPoint>)>) -> ShapeMap {
    shapes
        .filter_map(|(name, points)| match validate_shape(&points) {
            Ok(()) => Some((name, Arc::from(points))),
            Err(err) => {
                tracing::warn!("Skipping shape '{}': {}", name, err);
                None
            }
        })
        .collect()
}
