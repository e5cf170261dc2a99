//! Local search refinement.
//!
//! Greedy hill climbing over waypoint positions: every round nudges each
//! movable waypoint a fixed distance in the four cardinal directions, scores
//! all candidates and keeps the single best move if it clears the threshold.

use std::future::Future;

use futures::stream::{self, StreamExt};
use runshape_core::spatial::{meters_to_lat, meters_to_lng};
use runshape_core::{GpsWaypoint, RefineConfig, Result};
use serde::Serialize;

/// Cardinal nudge direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Move a waypoint `distance_m` meters in this direction.
    pub fn nudge(self, point: GpsWaypoint, distance_m: f64) -> GpsWaypoint {
        let d_lat = meters_to_lat(distance_m);
        let d_lng = meters_to_lng(distance_m, point.lat);
        match self {
            Direction::North => GpsWaypoint::new(point.lat + d_lat, point.lng),
            Direction::South => GpsWaypoint::new(point.lat - d_lat, point.lng),
            Direction::East => GpsWaypoint::new(point.lat, point.lng + d_lng),
            Direction::West => GpsWaypoint::new(point.lat, point.lng - d_lng),
        }
    }
}

/// Outcome of a refinement run.
#[derive(Debug, Clone)]
pub struct Refinement<T> {
    pub waypoints: Vec<GpsWaypoint>,
    pub score: f64,
    pub outcome: T,
    pub summary: RefinementSummary,
}

/// What the refiner did, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RefinementSummary {
    pub rounds: usize,
    pub accepted_moves: usize,
    pub score_before: f64,
    pub score_after: f64,
}

pub struct LocalSearchRefiner {
    config: RefineConfig,
}

impl LocalSearchRefiner {
    pub fn new(config: RefineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RefineConfig {
        &self.config
    }

    /// Indices the refiner is allowed to move.
    pub fn movable_indices(&self, len: usize) -> std::ops::Range<usize> {
        if self.config.skip_first_last && len > 2 {
            1..len - 1
        } else {
            0..len
        }
    }

    /// Hill-climb from `seed`.
    ///
    /// `evaluate` scores a candidate waypoint set; errors count as no
    /// improvement. Candidates are evaluated with at most
    /// `max_parallel_evaluations` in flight and compared in a fixed order, so
    /// ties resolve to the lowest waypoint index and N, S, E, W order.
    pub async fn refine<T, F, Fut>(
        &self,
        seed: Vec<GpsWaypoint>,
        seed_score: f64,
        seed_outcome: T,
        evaluate: F,
    ) -> Refinement<T>
    where
        F: Fn(Vec<GpsWaypoint>) -> Fut,
        Fut: Future<Output = Result<(f64, T)>>,
    {
        let mut current = seed;
        let mut current_score = seed_score;
        let mut current_outcome = seed_outcome;
        let mut rounds = 0;
        let mut accepted_moves = 0;
        let parallel = self.config.max_parallel_evaluations.max(1);

        for round in 1..=self.config.max_rounds {
            rounds = round;
            tracing::debug!(
                "Refinement round {}/{} (score: {:.2})",
                round,
                self.config.max_rounds,
                current_score
            );

            let candidates: Vec<Vec<GpsWaypoint>> = self
                .movable_indices(current.len())
                .flat_map(|idx| Direction::ALL.into_iter().map(move |dir| (idx, dir)))
                .map(|(idx, dir)| {
                    let mut points = current.clone();
                    points[idx] = dir.nudge(points[idx], self.config.nudge_distance_m);
                    points
                })
                .collect();

            let scored: Vec<(Vec<GpsWaypoint>, Result<(f64, T)>)> = stream::iter(candidates)
                .map(|points| {
                    let fut = evaluate(points.clone());
                    async move { (points, fut.await) }
                })
                .buffered(parallel)
                .collect()
                .await;

            let mut best: Option<(f64, Vec<GpsWaypoint>, f64, T)> = None;
            for (points, outcome) in scored {
                let Ok((score, value)) = outcome else {
                    continue;
                };
                let improvement = score - current_score;
                let best_so_far = best.as_ref().map_or(0.0, |(gain, ..)| *gain);
                if improvement > best_so_far {
                    best = Some((improvement, points, score, value));
                }
            }

            match best {
                Some((gain, points, score, value)) if gain >= self.config.improvement_threshold => {
                    tracing::info!("Refinement improved by {:.2} -> score {:.2}", gain, score);
                    current = points;
                    current_score = score;
                    current_outcome = value;
                    accepted_moves += 1;
                }
                _ => {
                    tracing::info!(
                        "Refinement converged after {} rounds (no improvement >= {})",
                        round,
                        self.config.improvement_threshold
                    );
                    break;
                }
            }
        }

        Refinement {
            waypoints: current,
            score: current_score,
            outcome: current_outcome,
            summary: RefinementSummary {
                rounds,
                accepted_moves,
                score_before: seed_score,
                score_after: current_score,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runshape_core::spatial::waypoint_distance;
    use runshape_core::RouteError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn seed() -> Vec<GpsWaypoint> {
        vec![
            GpsWaypoint::new(1.300, 103.800),
            GpsWaypoint::new(1.302, 103.801),
            GpsWaypoint::new(1.303, 103.803),
            GpsWaypoint::new(1.300, 103.800),
        ]
    }

    #[test]
    fn nudge_moves_fixed_distance() {
        let origin = GpsWaypoint::new(45.0, 10.0);
        for dir in Direction::ALL {
            let moved = dir.nudge(origin, 50.0);
            let d = waypoint_distance(&origin, &moved);
            assert!((d - 50.0).abs() < 0.5, "{dir:?} moved {d}m");
        }
    }

    #[test]
    fn anchors_are_fixed_by_default() {
        let refiner = LocalSearchRefiner::new(RefineConfig::default());
        assert_eq!(refiner.movable_indices(6), 1..5);
        assert_eq!(refiner.movable_indices(2), 0..2);
    }

    #[tokio::test]
    async fn returns_seed_when_every_nudge_is_worse() {
        let refiner = LocalSearchRefiner::new(RefineConfig::default());
        let calls = AtomicUsize::new(0);
        let refined = refiner
            .refine(seed(), 80.0, "seed", |_points| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok((70.0, "nudged")) }
            })
            .await;

        assert_eq!(refined.waypoints, seed());
        assert_eq!(refined.score, 80.0);
        assert_eq!(refined.outcome, "seed");
        assert_eq!(refined.summary.rounds, 1);
        assert_eq!(refined.summary.accepted_moves, 0);
        // two interior points, four directions each
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn accepts_best_move_per_round() {
        let refiner = LocalSearchRefiner::new(RefineConfig::default());
        let target = seed()[1];
        // Score rises as waypoint 1 moves north.
        let refined = refiner
            .refine(seed(), 50.0, (), |points: Vec<GpsWaypoint>| {
                let gain = (points[1].lat - target.lat) * 111_320.0 / 10.0;
                async move { Ok((50.0 + gain, ())) }
            })
            .await;

        assert_eq!(refined.summary.rounds, 3);
        assert_eq!(refined.summary.accepted_moves, 3);
        assert!((refined.score - 65.0).abs() < 1e-6);
        assert!(refined.waypoints[1].lat > target.lat);
        assert_eq!(refined.waypoints[2], seed()[2]);
    }

    #[tokio::test]
    async fn small_gains_below_threshold_stop_search() {
        let refiner = LocalSearchRefiner::new(RefineConfig::default());
        let refined = refiner
            .refine(seed(), 50.0, (), |_points| async { Ok((50.5, ())) })
            .await;
        assert_eq!(refined.summary.accepted_moves, 0);
        assert_eq!(refined.score, 50.0);
    }

    #[tokio::test]
    async fn failed_evaluations_are_ignored() {
        let refiner = LocalSearchRefiner::new(RefineConfig {
            max_rounds: 1,
            ..RefineConfig::default()
        });
        let refined = refiner
            .refine(seed(), 40.0, (), |points: Vec<GpsWaypoint>| async move {
                if points[2] != seed()[2] {
                    Ok((60.0, ()))
                } else {
                    Err(RouteError::ExternalService("timeout".to_string()))
                }
            })
            .await;
        assert_eq!(refined.summary.accepted_moves, 1);
        assert_eq!(refined.score, 60.0);
        assert_ne!(refined.waypoints[2], seed()[2]);
    }
}
