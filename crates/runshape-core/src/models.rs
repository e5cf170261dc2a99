//! Core data models for shape-to-route generation.

use serde::{Deserialize, Serialize};

use crate::scoring::ScoreBreakdown;

/// A polyline vertex in `[lng, lat]` order, as routing backends emit it.
pub type LngLat = [f64; 2];

/// A point of an abstract shape in an unbounded normalized plane.
///
/// Y grows downward (screen/SVG convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbstractPoint {
    pub x: f64,
    pub y: f64,
}

impl AbstractPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for AbstractPoint {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for AbstractPoint {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

/// A GPS coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsWaypoint {
    pub lat: f64,
    pub lng: f64,
}

impl GpsWaypoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// The waypoint as a `[lng, lat]` polyline vertex.
    pub fn to_lnglat(self) -> LngLat {
        [self.lng, self.lat]
    }
}

/// Size, orientation and stretch applied when projecting a shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleParams {
    /// Multiplier on the perimeter-matched size.
    pub scale_factor: f64,
    pub rotation_deg: f64,
    /// >1 = taller/narrower, <1 = wider/shorter
    pub aspect_ratio: f64,
}

impl Default for ScaleParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            rotation_deg: 0.0,
            aspect_ratio: 1.0,
        }
    }
}

/// An explicit GPS bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl GpsBounds {
    pub fn center(&self) -> GpsWaypoint {
        GpsWaypoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    pub fn is_valid(&self) -> bool {
        [self.min_lat, self.max_lat, self.min_lng, self.max_lng]
            .iter()
            .all(|v| v.is_finite())
            && self.min_lat < self.max_lat
            && self.min_lng < self.max_lng
    }
}

/// Travel mode passed to the routing backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingProfile {
    #[default]
    Foot,
    Bike,
    Car,
}

impl RoutingProfile {
    /// Profile segment used in OSRM URLs.
    pub fn osrm_name(self) -> &'static str {
        match self {
            RoutingProfile::Foot => "foot",
            RoutingProfile::Bike => "bike",
            RoutingProfile::Car => "car",
        }
    }

    /// Profile segment used in Mapbox directions URLs.
    pub fn mapbox_name(self) -> &'static str {
        match self {
            RoutingProfile::Foot => "walking",
            RoutingProfile::Bike => "cycling",
            RoutingProfile::Car => "driving",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "foot" | "walking" | "walk" | "run" => Some(RoutingProfile::Foot),
            "bike" | "cycling" | "bicycle" => Some(RoutingProfile::Bike),
            "car" | "driving" => Some(RoutingProfile::Car),
            _ => None,
        }
    }
}

/// Output of one road-snapping call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingResult {
    /// Routed geometry in `[lng, lat]` order.
    pub polyline: Vec<LngLat>,
    pub distance_m: f64,
    pub duration_s: f64,
    pub total_segments: usize,
    /// Never exceeds `total_segments`.
    pub failed_segments: usize,
    pub skipped_points: usize,
    pub max_detour_ratio: f64,
}

impl RoutingResult {
    pub fn distance_km(&self) -> f64 {
        self.distance_m / 1000.0
    }

    /// Fraction of segments that fell back to straight lines.
    pub fn failed_ratio(&self) -> f64 {
        self.failed_segments as f64 / self.total_segments.max(1) as f64
    }
}

/// How the scaling loop ended for an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Convergence {
    /// Distance ratio landed inside the accepted band.
    Converged,
    /// Iteration budget ran out; best candidate passed the acceptability check.
    Exhausted,
    /// Single-pass bounds fit, no iteration.
    Fixed,
}

/// One iteration of the scaling loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub scale_factor: f64,
    pub distance_m: f64,
    pub distance_ratio: f64,
    pub score: f64,
}

/// A routed candidate and everything needed to compare it against others.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateEvaluation {
    pub shape_name: Option<String>,
    pub params: ScaleParams,
    pub waypoints: Vec<GpsWaypoint>,
    pub result: RoutingResult,
    pub score: ScoreBreakdown,
    pub distance_ratio: f64,
    /// Iterations run before the loop stopped (not the index of the best one).
    pub iterations: usize,
    pub convergence: Convergence,
    pub trace: Vec<IterationRecord>,
}

impl CandidateEvaluation {
    pub fn total_score(&self) -> f64 {
        self.score.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_ratio_handles_zero_segments() {
        let result = RoutingResult {
            polyline: vec![[0.0, 0.0]],
            distance_m: 0.0,
            duration_s: 0.0,
            total_segments: 0,
            failed_segments: 0,
            skipped_points: 0,
            max_detour_ratio: 1.0,
        };
        assert_eq!(result.failed_ratio(), 0.0);
    }

    #[test]
    fn profile_names_map_per_backend() {
        assert_eq!(RoutingProfile::Foot.osrm_name(), "foot");
        assert_eq!(RoutingProfile::Foot.mapbox_name(), "walking");
        assert_eq!(RoutingProfile::parse("Cycling"), Some(RoutingProfile::Bike));
        assert_eq!(RoutingProfile::parse("hover"), None);
    }

    #[test]
    fn bounds_center_and_validity() {
        let bounds = GpsBounds {
            min_lat: 1.0,
            max_lat: 2.0,
            min_lng: 103.0,
            max_lng: 104.0,
        };
        assert!(bounds.is_valid());
        assert_eq!(bounds.center(), GpsWaypoint::new(1.5, 103.5));

        let inverted = GpsBounds { min_lat: 2.0, max_lat: 1.0, ..bounds };
        assert!(!inverted.is_valid());
    }

    #[test]
    fn convergence_serializes_snake_case() {
        let json = serde_json::to_string(&Convergence::Converged).unwrap();
        assert_eq!(json, "\"converged\"");
    }
}
