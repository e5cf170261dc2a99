//! Unified route scoring, used by every generation path.
//!
//! A route scores 0-100 from three components (weights in [`ScoreWeights`]):
//! - distance accuracy: how close to the target distance
//! - road coverage: what share of segments routed successfully
//! - loop closure: how close the end of the route is to its start

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{RoutingConfig, ScoreWeights};
use crate::models::RoutingResult;
use crate::spatial::lnglat_distance;

/// Per-component scores (each 0-1) and the weighted total (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub distance: f64,
    pub coverage: f64,
    pub closure: f64,
    pub total: f64,
}

/// Why a route failed the acceptability check.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("too many failed segments ({:.0}%)", .ratio * 100.0)]
    TooManyFailedSegments { ratio: f64 },
    #[error("route too long ({ratio:.1}x target)")]
    TooLong { ratio: f64 },
    #[error("route too short ({ratio:.1}x target)")]
    TooShort { ratio: f64 },
    #[error("quality too low (score {score:.0})")]
    QualityTooLow { score: f64 },
}

/// Distance accuracy for a routed/target ratio.
///
/// 1.0 within 10% of target, falling linearly to 0.5 at 30% off and to 0.2
/// at 50% off; 0.2 beyond that.
pub fn distance_score(ratio: f64) -> f64 {
    if !ratio.is_finite() {
        return 0.2;
    }
    // Absorb float noise at the band edges (1.1 - 1.0 > 0.1 in f64).
    let off = ((ratio - 1.0).abs() - 1e-9).max(0.0);
    if off <= 0.1 {
        1.0
    } else if off <= 0.3 {
        1.0 - (off - 0.1) / 0.2 * 0.5
    } else if off <= 0.5 {
        0.5 - (off - 0.3) / 0.2 * 0.3
    } else {
        0.2
    }
}

/// Share of segments that routed on roads.
pub fn coverage_score(result: &RoutingResult) -> f64 {
    (1.0 - result.failed_ratio()).clamp(0.0, 1.0)
}

/// 1.0 for a perfectly closed loop, decaying smoothly with the end gap.
pub fn closure_score(result: &RoutingResult) -> f64 {
    match (result.polyline.first(), result.polyline.last()) {
        (Some(first), Some(last)) if result.polyline.len() >= 2 => {
            let gap_m = lnglat_distance(first, last);
            1.0 / (gap_m / 100.0 + 1.0)
        }
        _ => 0.5,
    }
}

/// Round to one decimal place, as scores are reported.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Scores routing results and decides whether they are good enough to return.
#[derive(Debug, Clone)]
pub struct RouteScorer {
    weights: ScoreWeights,
    max_failed_segment_ratio: f64,
    target_ratio_min: f64,
    target_ratio_max: f64,
    min_acceptable_score: f64,
}

impl Default for RouteScorer {
    fn default() -> Self {
        Self::new(&RoutingConfig::default())
    }
}

impl RouteScorer {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            weights: config.weights,
            max_failed_segment_ratio: config.max_failed_segment_ratio,
            target_ratio_min: config.target_ratio_min,
            target_ratio_max: config.target_ratio_max,
            min_acceptable_score: config.min_acceptable_score,
        }
    }

    /// Score a route from 0-100. Higher is better.
    pub fn score(&self, result: &RoutingResult, target_distance_km: f64) -> ScoreBreakdown {
        let distance = if target_distance_km > 0.0 {
            distance_score(result.distance_km() / target_distance_km)
        } else {
            0.5
        };
        let coverage = coverage_score(result);
        let closure = closure_score(result);

        let total = (self.weights.distance * distance
            + self.weights.coverage * coverage
            + self.weights.closure * closure)
            * 100.0;

        ScoreBreakdown {
            distance,
            coverage,
            closure,
            total: round1(total.clamp(0.0, 100.0)),
        }
    }

    /// Check a route against minimum quality standards.
    ///
    /// Conditions are checked in priority order and the first violation wins.
    pub fn is_acceptable(
        &self,
        result: &RoutingResult,
        target_distance_km: f64,
    ) -> Result<(), Rejection> {
        let failed_ratio = result.failed_ratio();
        if failed_ratio > self.max_failed_segment_ratio {
            return Err(Rejection::TooManyFailedSegments { ratio: failed_ratio });
        }

        let ratio = result.distance_km() / target_distance_km;
        if ratio.is_nan() || ratio > self.target_ratio_max {
            return Err(Rejection::TooLong { ratio });
        }
        if ratio < self.target_ratio_min {
            return Err(Rejection::TooShort { ratio });
        }

        let score = self.score(result, target_distance_km).total;
        if score < self.min_acceptable_score {
            return Err(Rejection::QualityTooLow { score });
        }

        Ok(())
    }
}
