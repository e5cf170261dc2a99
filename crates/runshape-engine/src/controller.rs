//! Iterative scaling controller.
//!
//! Scales a shape, routes it, compares the routed distance against the
//! target and rescales until the distance lands in the accepted band or the
//! iteration budget runs out.

use runshape_core::{
    close_loop, scale_to_gps, validate_shape, AbstractPoint, CandidateEvaluation, Convergence,
    GpsWaypoint, IterationRecord, Result, RouteError, RouteScorer, RoutingConfig, RoutingProfile,
    ScaleParams,
};
use runshape_router::RoadSnap;

/// One scaling job: a shape placed around a start point at a target distance.
#[derive(Debug, Clone, Copy)]
pub struct ScalingRequest<'a> {
    pub shape_name: Option<&'a str>,
    pub shape: &'a [AbstractPoint],
    pub start: GpsWaypoint,
    pub distance_km: f64,
    pub aspect_ratio: f64,
    pub rotation_deg: f64,
}

/// Next scale factor after observing `actual_km` for a `target_km` goal.
///
/// Moves part of the way (`scale_damping`) towards the proportional correction
/// and clamps to the configured bounds. A zero-length route jumps to the
/// upper bound.
pub fn next_scale_factor(current: f64, target_km: f64, actual_km: f64, config: &RoutingConfig) -> f64 {
    if !(actual_km.is_finite() && actual_km > 0.0) {
        return config.scale_max;
    }
    let adjustment = target_km / actual_km;
    let next = current * (1.0 + (adjustment - 1.0) * config.scale_damping);
    next.clamp(config.scale_min, config.scale_max)
}

/// Drives scaler, snapper and scorer in a feedback loop.
pub struct IterativeScalingController<S> {
    snapper: S,
    config: RoutingConfig,
    scorer: RouteScorer,
    profile: RoutingProfile,
}

impl<S: RoadSnap> IterativeScalingController<S> {
    pub fn new(snapper: S, config: RoutingConfig, profile: RoutingProfile) -> Self {
        let scorer = RouteScorer::new(&config);
        Self {
            snapper,
            config,
            scorer,
            profile,
        }
    }

    pub fn snapper(&self) -> &S {
        &self.snapper
    }

    pub fn scorer(&self) -> &RouteScorer {
        &self.scorer
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn profile(&self) -> RoutingProfile {
        self.profile
    }

    /// Run the loop to convergence or exhaustion.
    ///
    /// Fails immediately with [`RouteError::UnroutableLocation`] when any
    /// iteration's failed-segment share exceeds the ceiling, and with
    /// [`RouteError::QualityBelowThreshold`] when the returned candidate
    /// (converged or closest after exhaustion) is not acceptable.
    pub async fn run(&self, request: ScalingRequest<'_>) -> Result<CandidateEvaluation> {
        validate_shape(request.shape)?;
        let target_km = request.distance_km;
        let label = request.shape_name.unwrap_or("custom");

        let mut scale_factor = 1.0;
        let mut best: Option<(f64, CandidateEvaluation)> = None;
        let mut trace: Vec<IterationRecord> = Vec::new();

        tracing::info!(
            "Route with scaling [{}]: {} pts, {} max iterations",
            label,
            request.shape.len(),
            self.config.max_iterations
        );

        for iteration in 1..=self.config.max_iterations {
            let params = ScaleParams {
                scale_factor,
                rotation_deg: request.rotation_deg,
                aspect_ratio: request.aspect_ratio,
            };
            let mut waypoints = scale_to_gps(
                request.shape,
                request.start,
                target_km,
                &params,
                self.config.road_detour_factor,
            )?;
            close_loop(&mut waypoints);

            let result = self.snapper.route(&waypoints, self.profile).await?;

            let failed_ratio = result.failed_ratio();
            if failed_ratio > self.config.max_failed_segment_ratio {
                tracing::warn!(
                    "[{}] {}/{} segments failed, giving up on location",
                    label,
                    result.failed_segments,
                    result.total_segments
                );
                return Err(RouteError::UnroutableLocation { failed_ratio });
            }

            let actual_km = result.distance_km();
            let distance_ratio = actual_km / target_km;
            let score = self.scorer.score(&result, target_km);

            tracing::info!(
                "[{}] Iter {}: scale={:.2}, dist={:.1}km ({:.2}x), score={:.0}",
                label,
                iteration,
                scale_factor,
                actual_km,
                distance_ratio,
                score.total
            );
            trace.push(IterationRecord {
                iteration,
                scale_factor,
                distance_m: result.distance_m,
                distance_ratio,
                score: score.total,
            });

            let candidate = CandidateEvaluation {
                shape_name: request.shape_name.map(str::to_string),
                params,
                waypoints,
                result,
                score,
                distance_ratio,
                iterations: iteration,
                convergence: Convergence::Converged,
                trace: Vec::new(),
            };

            // An in-band iteration wins even if an earlier miss was closer to 1.0.
            if self.config.ratio_in_band(distance_ratio) {
                if let Err(rejection) = self.scorer.is_acceptable(&candidate.result, target_km) {
                    tracing::warn!("[{}] Converged but rejected: {}", label, rejection);
                    return Err(rejection.into());
                }
                tracing::info!("[{}] Converged in {} iterations", label, iteration);
                return Ok(finish(candidate, iteration, Convergence::Converged, trace));
            }

            let diff = (distance_ratio - 1.0).abs();
            if best.as_ref().map_or(true, |(best_diff, _)| diff < *best_diff) {
                best = Some((diff, candidate));
            }

            scale_factor = next_scale_factor(scale_factor, target_km, actual_km, &self.config);
        }

        let iterations = self.config.max_iterations;
        let Some((_, candidate)) = best else {
            return Err(RouteError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        };

        if let Err(rejection) = self.scorer.is_acceptable(&candidate.result, target_km) {
            tracing::warn!("[{}] Exhausted without acceptable route: {}", label, rejection);
            return Err(rejection.into());
        }

        tracing::info!(
            "[{}] Best after {} iterations: scale={:.2}, dist={:.0}m, score={:.0}",
            label,
            iterations,
            candidate.params.scale_factor,
            candidate.result.distance_m,
            candidate.score.total
        );
        Ok(finish(candidate, iterations, Convergence::Exhausted, trace))
    }
}

fn finish(
    mut candidate: CandidateEvaluation,
    iterations: usize,
    convergence: Convergence,
    trace: Vec<IterationRecord>,
) -> CandidateEvaluation {
    candidate.iterations = iterations;
    candidate.convergence = convergence;
    candidate.trace = trace;
    candidate
}
