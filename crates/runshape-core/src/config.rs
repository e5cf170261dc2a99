//! Tunable parameters for scaling, scoring, refinement and suggestion.
//!
//! The defaults are empirical: they were tuned by inspection against real
//! road networks and are kept as plain fields so deployments can override
//! them from a JSON file.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RouteError};

/// Relative weights of the score components. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// How close to the target distance
    pub distance: f64,
    /// What share of segments routed on roads
    pub coverage: f64,
    /// How close the route end is to its start
    pub closure: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            distance: 0.40,
            coverage: 0.40,
            closure: 0.20,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.distance + self.coverage + self.closure
    }
}

/// Configuration for perimeter scaling, the convergence loop and scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Roads add roughly this factor to straight-line perimeter.
    pub road_detour_factor: f64,
    /// How aggressively to adjust scale between iterations (0-1).
    pub scale_damping: f64,
    pub scale_min: f64,
    pub scale_max: f64,
    pub max_iterations: usize,
    /// Lowest routed/target distance ratio that counts as converged.
    pub target_ratio_min: f64,
    /// Highest routed/target distance ratio that counts as converged.
    pub target_ratio_max: f64,
    /// Reject if more than this share of segments fail routing.
    pub max_failed_segment_ratio: f64,
    pub min_acceptable_score: f64,
    pub weights: ScoreWeights,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            road_detour_factor: 1.4,
            scale_damping: 0.6,
            scale_min: 0.3,
            scale_max: 2.5,
            max_iterations: 4,
            target_ratio_min: 0.7,
            target_ratio_max: 1.5,
            max_failed_segment_ratio: 0.25,
            min_acceptable_score: 40.0,
            weights: ScoreWeights::default(),
        }
    }
}

impl RoutingConfig {
    /// Parse a (possibly partial) JSON override; missing fields keep defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: RoutingConfig = serde_json::from_str(raw)
            .map_err(|err| RouteError::InvalidConfig(format!("tuning parse failed: {}", err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("road_detour_factor", self.road_detour_factor),
            ("scale_min", self.scale_min),
            ("scale_max", self.scale_max),
            ("target_ratio_min", self.target_ratio_min),
            ("target_ratio_max", self.target_ratio_max),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(RouteError::InvalidConfig(format!("{} must be > 0", name)));
            }
        }
        if self.scale_min > self.scale_max {
            return Err(RouteError::InvalidConfig(
                "scale_min must not exceed scale_max".to_string(),
            ));
        }
        if self.target_ratio_min > self.target_ratio_max {
            return Err(RouteError::InvalidConfig(
                "target_ratio_min must not exceed target_ratio_max".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.scale_damping) {
            return Err(RouteError::InvalidConfig(
                "scale_damping must be within 0..=1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_failed_segment_ratio) {
            return Err(RouteError::InvalidConfig(
                "max_failed_segment_ratio must be within 0..=1".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(RouteError::InvalidConfig(
                "max_iterations must be > 0".to_string(),
            ));
        }
        let w = &self.weights;
        if [w.distance, w.coverage, w.closure].iter().any(|v| *v < 0.0)
            || (w.sum() - 1.0).abs() > 1e-6
        {
            return Err(RouteError::InvalidConfig(format!(
                "score weights must be non-negative and sum to 1.0 (got {:.3})",
                w.sum()
            )));
        }
        Ok(())
    }

    /// Whether a distance ratio falls in the converged band.
    pub fn ratio_in_band(&self, ratio: f64) -> bool {
        (self.target_ratio_min..=self.target_ratio_max).contains(&ratio)
    }
}

/// Hill-climbing refinement parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    pub max_rounds: usize,
    pub nudge_distance_m: f64,
    /// Minimum score gain for a move to be accepted.
    pub improvement_threshold: f64,
    /// Keep the loop anchors fixed.
    pub skip_first_last: bool,
    pub max_parallel_evaluations: usize,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            nudge_distance_m: 50.0,
            improvement_threshold: 1.0,
            skip_first_last: true,
            max_parallel_evaluations: 4,
        }
    }
}

/// Candidate selection parameters for shape suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestConfig {
    pub num_candidates: usize,
    pub top_alternatives: usize,
    /// Curated shape names considered for suggestion.
    pub whitelist: Vec<String>,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            num_candidates: 10,
            top_alternatives: 5,
            whitelist: [
                "heart",
                "star",
                "triangle",
                "sixty7",
                "figure8",
                "lightning",
                "merlion",
                "banana",
                "snowflake",
                "thumbsup",
                "sword",
                "toilet",
            ]
            .iter()
            .map(|name| name.to_string())
            .collect(),
        }
    }
}
