//! Route generation entry points.
//!
//! [`RouteGenerator`] wires the scaling controller, refiner and suggestion
//! selector around one road snapper and turns their evaluations into
//! caller-facing [`GeneratedRoute`]s.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use runshape_core::scoring::round1;
use runshape_core::spatial::flat_distance_m;
use runshape_core::{
    close_loop, scale_to_bounds, validate_shape, AbstractPoint, CandidateEvaluation, Convergence, GpsBounds,
    GpsWaypoint, IterationRecord, LngLat, RefineConfig, Result, RouteError, RoutingConfig,
    RoutingProfile, RoutingResult, ScaleParams, ScoreBreakdown, SuggestConfig,
};
use runshape_router::RoadSnap;
use serde::Serialize;

use crate::catalog::ShapeCatalog;
use crate::config::Config;
use crate::controller::{IterativeScalingController, ScalingRequest};
use crate::refiner::{LocalSearchRefiner, RefinementSummary};
use crate::suggest::{Alternative, CandidateFailure, SuggestionSelector};

/// Distance-targeted generation input.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub shape_name: Option<String>,
    pub shape: Vec<AbstractPoint>,
    pub start_lat: f64,
    pub start_lng: f64,
    pub distance_km: f64,
    pub aspect_ratio: f64,
    pub rotation_deg: f64,
    /// Run local search on the converged waypoints.
    pub refine: bool,
}

impl GenerateRequest {
    pub fn new(shape: Vec<AbstractPoint>, start_lat: f64, start_lng: f64, distance_km: f64) -> Self {
        Self {
            shape_name: None,
            shape,
            start_lat,
            start_lng,
            distance_km,
            aspect_ratio: 1.0,
            rotation_deg: 0.0,
            refine: false,
        }
    }
}

/// Box-fitted generation input.
#[derive(Debug, Clone)]
pub struct BoundsRequest {
    pub shape_name: Option<String>,
    pub shape: Vec<AbstractPoint>,
    pub bounds: GpsBounds,
    pub rotation_deg: f64,
}

/// Suggestion input.
#[derive(Debug, Clone)]
pub struct SuggestRequest {
    pub start_lat: f64,
    pub start_lng: f64,
    pub distance_km: f64,
    pub aspect_ratio: f64,
    /// Overrides the configured pool size.
    pub num_candidates: Option<usize>,
}

/// Distances between the user's position and the loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TravelDistances {
    pub approach_distance_m: f64,
    pub return_distance_m: f64,
    pub total_with_travel_m: f64,
}

impl TravelDistances {
    /// Flat-earth distance from `origin` to the first polyline point and from
    /// the last point back to `origin`.
    pub fn measure(origin: GpsWaypoint, polyline: &[LngLat], route_distance_m: f64) -> Self {
        let (Some(first), Some(last)) = (polyline.first(), polyline.last()) else {
            return Self {
                approach_distance_m: 0.0,
                return_distance_m: 0.0,
                total_with_travel_m: round1(route_distance_m),
            };
        };
        let approach = flat_distance_m(origin.lat, origin.lng, first[1], first[0]);
        let back = flat_distance_m(last[1], last[0], origin.lat, origin.lng);
        Self {
            approach_distance_m: round1(approach),
            return_distance_m: round1(back),
            total_with_travel_m: round1(route_distance_m + approach + back),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub score_breakdown: ScoreBreakdown,
    pub distance_ratio: f64,
    pub scale_factor: f64,
    pub rotation_deg: f64,
    pub aspect_ratio: f64,
    pub iterations: usize,
    pub convergence: Convergence,
    pub total_segments: usize,
    pub failed_segments: usize,
    pub skipped_points: usize,
    pub max_detour_ratio: f64,
    pub trace: Vec<IterationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refinement: Option<RefinementSummary>,
}

/// An accepted route.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedRoute {
    pub shape_name: Option<String>,
    /// `[lng, lat]` pairs.
    pub polyline: Vec<LngLat>,
    pub waypoints: Vec<GpsWaypoint>,
    pub distance_m: f64,
    pub duration_s: f64,
    pub score: f64,
    #[serde(flatten)]
    pub travel: TravelDistances,
    pub diagnostics: Diagnostics,
    pub generated_at: DateTime<Utc>,
}

impl GeneratedRoute {
    fn from_evaluation(
        evaluation: CandidateEvaluation,
        origin: GpsWaypoint,
        refinement: Option<RefinementSummary>,
    ) -> Self {
        let CandidateEvaluation {
            shape_name,
            params,
            waypoints,
            result,
            score,
            distance_ratio,
            iterations,
            convergence,
            trace,
        } = evaluation;
        let travel = TravelDistances::measure(origin, &result.polyline, result.distance_m);
        Self {
            shape_name,
            waypoints,
            distance_m: result.distance_m,
            duration_s: result.duration_s,
            score: round1(score.total),
            travel,
            diagnostics: Diagnostics {
                score_breakdown: score,
                distance_ratio,
                scale_factor: params.scale_factor,
                rotation_deg: params.rotation_deg,
                aspect_ratio: params.aspect_ratio,
                iterations,
                convergence,
                total_segments: result.total_segments,
                failed_segments: result.failed_segments,
                skipped_points: result.skipped_points,
                max_detour_ratio: result.max_detour_ratio,
                trace,
                refinement,
            },
            polyline: result.polyline,
            generated_at: Utc::now(),
        }
    }
}

/// Suggestion transparency data.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionMetadata {
    pub candidates_tried: usize,
    pub candidates_passed: usize,
    pub alternatives: Vec<Alternative>,
    pub failures: Vec<CandidateFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestedRoute {
    pub display_name: String,
    #[serde(flatten)]
    pub route: GeneratedRoute,
    pub suggestion_metadata: SuggestionMetadata,
}

/// Facade over the generation pipeline for one routing backend.
pub struct RouteGenerator<S> {
    controller: IterativeScalingController<S>,
    refiner: LocalSearchRefiner,
    selector: SuggestionSelector,
    catalog: Option<Arc<ShapeCatalog>>,
}

impl<S: RoadSnap> RouteGenerator<S> {
    pub fn new(snapper: S, routing: RoutingConfig, profile: RoutingProfile) -> Self {
        Self {
            controller: IterativeScalingController::new(snapper, routing, profile),
            refiner: LocalSearchRefiner::new(RefineConfig::default()),
            selector: SuggestionSelector::new(SuggestConfig::default()),
            catalog: None,
        }
    }

    /// Build from engine configuration; the catalog is attached separately.
    pub fn from_config(snapper: S, config: &Config) -> Self {
        Self::new(snapper, config.routing.clone(), config.profile)
            .with_refine_config(config.refine.clone())
            .with_suggest_config(config.suggest.clone())
    }

    pub fn with_refine_config(mut self, config: RefineConfig) -> Self {
        self.refiner = LocalSearchRefiner::new(config);
        self
    }

    pub fn with_suggest_config(mut self, config: SuggestConfig) -> Self {
        self.selector = SuggestionSelector::new(config);
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<ShapeCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn catalog(&self) -> Option<&ShapeCatalog> {
        self.catalog.as_deref()
    }

    /// Generate a loop of roughly `distance_km` around the start point.
    pub async fn generate(&self, request: GenerateRequest) -> Result<GeneratedRoute> {
        let start = GpsWaypoint::new(request.start_lat, request.start_lng);
        let evaluation = self
            .controller
            .run(ScalingRequest {
                shape_name: request.shape_name.as_deref(),
                shape: &request.shape,
                start,
                distance_km: request.distance_km,
                aspect_ratio: request.aspect_ratio,
                rotation_deg: request.rotation_deg,
            })
            .await?;

        let (evaluation, refinement) = if request.refine {
            let (evaluation, summary) = self.refine(evaluation, request.distance_km).await;
            (evaluation, Some(summary))
        } else {
            (evaluation, None)
        };

        Ok(GeneratedRoute::from_evaluation(evaluation, start, refinement))
    }

    /// Generate a route that fills an explicit bounding box.
    ///
    /// Routed once with no distance feedback. The route's own distance is
    /// used as the scoring target.
    pub async fn generate_with_bounds(&self, request: BoundsRequest) -> Result<GeneratedRoute> {
        validate_shape(&request.shape)?;
        let mut waypoints = scale_to_bounds(&request.shape, &request.bounds, request.rotation_deg)?;
        close_loop(&mut waypoints);
        let b = request.bounds;
        tracing::info!(
            "Route with bounds: {} pts, box=({:.4},{:.4})->({:.4},{:.4})",
            waypoints.len(),
            b.min_lat,
            b.min_lng,
            b.max_lat,
            b.max_lng
        );

        let result = self
            .controller
            .snapper()
            .route(&waypoints, self.controller.profile())
            .await?;

        let failed_ratio = result.failed_ratio();
        if failed_ratio > self.controller.config().max_failed_segment_ratio {
            return Err(RouteError::UnroutableLocation { failed_ratio });
        }

        let score = self.controller.scorer().score(&result, result.distance_km());
        tracing::info!(
            "Bounds route: dist={:.0}m, score={:.0}",
            result.distance_m,
            score.total
        );

        let evaluation = CandidateEvaluation {
            shape_name: request.shape_name,
            params: ScaleParams {
                scale_factor: 1.0,
                rotation_deg: request.rotation_deg,
                aspect_ratio: 1.0,
            },
            waypoints,
            result,
            score,
            distance_ratio: 1.0,
            iterations: 1,
            convergence: Convergence::Fixed,
            trace: Vec::new(),
        };
        Ok(GeneratedRoute::from_evaluation(evaluation, b.center(), None))
    }

    /// Try the whitelisted catalog shapes and return the best route.
    pub async fn suggest(&self, request: SuggestRequest) -> Result<SuggestedRoute> {
        let catalog = self
            .catalog
            .as_ref()
            .ok_or_else(|| RouteError::InvalidConfig("no shape catalog configured".to_string()))?;
        let pool = catalog.resolve(&self.selector.config().whitelist);
        let start = GpsWaypoint::new(request.start_lat, request.start_lng);

        let resized;
        let selector = match request.num_candidates {
            Some(n) => {
                resized = SuggestionSelector::new(SuggestConfig {
                    num_candidates: n,
                    ..self.selector.config().clone()
                });
                &resized
            }
            None => &self.selector,
        };

        let suggestion = selector
            .select(
                &self.controller,
                pool,
                start,
                request.distance_km,
                request.aspect_ratio,
            )
            .await?;

        Ok(SuggestedRoute {
            display_name: suggestion.best_shape.display_name(),
            route: GeneratedRoute::from_evaluation(suggestion.best, start, None),
            suggestion_metadata: SuggestionMetadata {
                candidates_tried: suggestion.candidates_tried,
                candidates_passed: suggestion.candidates_passed,
                alternatives: suggestion.alternatives,
                failures: suggestion.failures,
            },
        })
    }

    /// Re-snap and re-score nudged waypoint sets around a converged evaluation.
    ///
    /// A refined route that fails the acceptability check is discarded in
    /// favour of the unrefined one.
    async fn refine(
        &self,
        evaluation: CandidateEvaluation,
        target_km: f64,
    ) -> (CandidateEvaluation, RefinementSummary) {
        let snapper = self.controller.snapper();
        let scorer = self.controller.scorer();
        let profile = self.controller.profile();

        let seed_outcome = (evaluation.result.clone(), evaluation.score);
        let refined = self
            .refiner
            .refine(
                evaluation.waypoints.clone(),
                evaluation.score.total,
                seed_outcome,
                |points: Vec<GpsWaypoint>| async move {
                    let result: RoutingResult = snapper.route(&points, profile).await?;
                    let score = scorer.score(&result, target_km);
                    Ok::<_, RouteError>((score.total, (result, score)))
                },
            )
            .await;

        let (result, score) = refined.outcome;
        if let Err(rejection) = scorer.is_acceptable(&result, target_km) {
            tracing::warn!("Refined route rejected ({}), keeping unrefined route", rejection);
            let summary = RefinementSummary {
                accepted_moves: 0,
                score_after: refined.summary.score_before,
                ..refined.summary
            };
            return (evaluation, summary);
        }

        let distance_ratio = result.distance_km() / target_km;
        let evaluation = CandidateEvaluation {
            waypoints: refined.waypoints,
            result,
            score,
            distance_ratio,
            ..evaluation
        };
        (evaluation, refined.summary)
    }
}
