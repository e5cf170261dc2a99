//! Runshape core - geometry, scoring and data model for turning abstract
//! closed shapes into road-following GPS loops.
//!
//! Nothing in this crate performs I/O; routing backends live in
//! `runshape-router` and orchestration in `runshape-engine`.

pub mod config;
pub mod error;
pub mod models;
pub mod scaler;
pub mod scoring;
pub mod spatial;

pub use config::{RefineConfig, RoutingConfig, ScoreWeights, SuggestConfig};
pub use error::{ErrorKind, Result, RouteError};
pub use models::{
    AbstractPoint, CandidateEvaluation, Convergence, GpsBounds, GpsWaypoint, IterationRecord,
    LngLat, RoutingProfile, RoutingResult, ScaleParams,
};
pub use scaler::{close_loop, scale_to_bounds, scale_to_gps, validate_shape};
pub use scoring::{Rejection, RouteScorer, ScoreBreakdown};
pub use spatial::haversine_distance;
