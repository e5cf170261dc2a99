//! Runshape engine - turns named or custom shapes into accepted road loops.
//!
//! The pipeline is: scale the shape around a start point, snap it to roads,
//! score it, and rescale until the routed distance matches the target.
//! Optional local search nudges waypoints afterwards, and the suggestion mode
//! runs the whole pipeline for several catalog shapes at once.

pub mod catalog;
pub mod config;
pub mod controller;
pub mod generator;
pub mod refiner;
pub mod suggest;

pub use catalog::{CatalogError, NamedShape, ShapeCatalog};
pub use config::{Backend, Config, ConfigError};
pub use controller::{next_scale_factor, IterativeScalingController, ScalingRequest};
pub use generator::{
    BoundsRequest, Diagnostics, GenerateRequest, GeneratedRoute, RouteGenerator, SuggestRequest,
    SuggestedRoute, SuggestionMetadata, TravelDistances,
};
pub use refiner::{Direction, LocalSearchRefiner, Refinement, RefinementSummary};
pub use suggest::{Alternative, CandidateFailure, Suggestion, SuggestionSelector};
