//! Shape input for the CLI: a catalog name or a JSON file of points.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use runshape_core::AbstractPoint;
use runshape_engine::ShapeCatalog;

/// Where a subcommand's shape comes from.
#[derive(Debug, Clone)]
pub enum ShapeSource {
    Named(String),
    File(PathBuf),
}

impl ShapeSource {
    pub fn from_args(shape: Option<String>, points: Option<PathBuf>) -> Result<Self> {
        match (shape, points) {
            (Some(name), None) => Ok(ShapeSource::Named(name)),
            (None, Some(path)) => Ok(ShapeSource::File(path)),
            (Some(_), Some(_)) => bail!("pass either --shape or --points, not both"),
            (None, None) => bail!("a shape is required: --shape NAME or --points FILE"),
        }
    }

    /// Resolve to a display name and the shape's points.
    pub fn resolve(&self, catalog: Option<&ShapeCatalog>) -> Result<(Option<String>, Vec<AbstractPoint>)> {
        match self {
            ShapeSource::Named(name) => {
                let catalog = catalog
                    .context("--shape needs a catalog; set RUNSHAPE_SHAPES_PATH")?;
                let shape = catalog
                    .get(name)
                    .with_context(|| format!("shape '{}' not found in catalog", name))?;
                Ok((Some(shape.name), shape.points.to_vec()))
            }
            ShapeSource::File(path) => {
                let points = load_points_file(path)?;
                let name = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned());
                Ok((name, points))
            }
        }
    }
}

/// Parse `[[x, y], ...]` or `[{"x": .., "y": ..}, ...]`.
pub fn parse_points(raw: &str) -> Result<Vec<AbstractPoint>> {
    if let Ok(pairs) = serde_json::from_str::<Vec<[f64; 2]>>(raw) {
        return Ok(pairs.into_iter().map(AbstractPoint::from).collect());
    }
    serde_json::from_str::<Vec<AbstractPoint>>(raw)
        .context("points must be a JSON array of [x, y] pairs or {x, y} objects")
}

pub fn load_points_file(path: &Path) -> Result<Vec<AbstractPoint>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read points file {}", path.display()))?;
    parse_points(&raw).with_context(|| format!("invalid points file {}", path.display()))
}
