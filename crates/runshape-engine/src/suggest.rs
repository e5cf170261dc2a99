//! Shape suggestion: run the scaling loop for several shapes at once and pick
//! the best scoring route.

use futures::future::join_all;
use rand::seq::SliceRandom;
use rand::Rng;
use runshape_core::scoring::round1;
use runshape_core::{CandidateEvaluation, ErrorKind, GpsWaypoint, Result, RouteError, SuggestConfig};
use runshape_router::RoadSnap;
use serde::Serialize;

use crate::catalog::NamedShape;
use crate::controller::{IterativeScalingController, ScalingRequest};

/// A ranked alternative shown next to the winner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alternative {
    pub name: String,
    pub score: f64,
}

/// A shape that did not produce an acceptable route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateFailure {
    pub name: String,
    pub kind: ErrorKind,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Suggestion {
    pub best: CandidateEvaluation,
    pub best_shape: NamedShape,
    pub candidates_tried: usize,
    pub candidates_passed: usize,
    /// Successful candidates by descending score, winner included.
    pub alternatives: Vec<Alternative>,
    pub failures: Vec<CandidateFailure>,
}

/// Keep at most `limit` candidates, chosen at random when the pool is larger.
pub fn subsample<T, R: Rng + ?Sized>(mut pool: Vec<T>, limit: usize, rng: &mut R) -> Vec<T> {
    if pool.len() > limit {
        pool.shuffle(rng);
        pool.truncate(limit);
    }
    pool
}

pub struct SuggestionSelector {
    config: SuggestConfig,
}

impl SuggestionSelector {
    pub fn new(config: SuggestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SuggestConfig {
        &self.config
    }

    /// Evaluate every candidate concurrently and pick the highest score.
    ///
    /// Pools larger than `num_candidates` are randomly subsampled first.
    pub async fn select<S: RoadSnap>(
        &self,
        controller: &IterativeScalingController<S>,
        pool: Vec<NamedShape>,
        start: GpsWaypoint,
        distance_km: f64,
        aspect_ratio: f64,
    ) -> Result<Suggestion> {
        let candidates = subsample(pool, self.config.num_candidates, &mut rand::rng());
        tracing::info!("Auto-suggest: evaluating {} shapes", candidates.len());

        let evaluations = join_all(candidates.iter().map(|shape| {
            controller.run(ScalingRequest {
                shape_name: Some(shape.name.as_str()),
                shape: &shape.points,
                start,
                distance_km,
                aspect_ratio,
                rotation_deg: 0.0,
            })
        }))
        .await;

        let tried = candidates.len();
        let mut passed: Vec<(NamedShape, CandidateEvaluation)> = Vec::new();
        let mut failures: Vec<CandidateFailure> = Vec::new();
        for (shape, outcome) in candidates.into_iter().zip(evaluations) {
            match outcome {
                Ok(evaluation) => passed.push((shape, evaluation)),
                Err(err) => failures.push(CandidateFailure {
                    name: shape.name,
                    kind: err.kind(),
                    reason: err.to_string(),
                }),
            }
        }

        tracing::info!("Auto-suggest results: {}/{} shapes passed", passed.len(), tried);
        for failure in failures.iter().take(3) {
            tracing::info!("  {} failed: {}", failure.name, failure.reason);
        }

        // Stable sort keeps pool order among equal scores.
        passed.sort_by(|a, b| b.1.total_score().total_cmp(&a.1.total_score()));

        let alternatives: Vec<Alternative> = passed
            .iter()
            .take(self.config.top_alternatives)
            .map(|(shape, evaluation)| Alternative {
                name: shape.name.clone(),
                score: round1(evaluation.total_score()),
            })
            .collect();
        let candidates_passed = passed.len();

        let Some((best_shape, best)) = passed.into_iter().next() else {
            return Err(RouteError::NoCandidatesSucceeded { tried });
        };
        tracing::info!("Best: {} (score {:.1})", best_shape.name, best.total_score());

        Ok(Suggestion {
            best,
            best_shape,
            candidates_tried: tried,
            candidates_passed,
            alternatives,
            failures,
        })
    }
}
