//! OSRM point-to-point router.
//!
//! Routes between each consecutive pair of waypoints independently, which
//! avoids the cross-back artifacts of multi-waypoint requests. Segments whose
//! routed distance is wildly longer than the straight line usually end at a
//! waypoint inside a park, lake or campus; those waypoints are dropped and the
//! reduced sequence is routed again.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use reqwest::{Client, StatusCode};
use runshape_core::spatial::waypoint_distance;
use runshape_core::{GpsWaypoint, LngLat, Result, RouteError, RoutingProfile, RoutingResult};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::snapper::{ensure_routable, RoadSnap};

pub const DEFAULT_OSRM_URL: &str = "http://localhost:5000";

/// Tuning for the point-to-point backend.
#[derive(Debug, Clone)]
pub struct PointToPointSettings {
    /// Max segment requests in flight across all callers of this router.
    pub max_concurrent: usize,
    pub timeout: Duration,
    /// Mark a segment as an outlier above this routed/straight ratio.
    pub detour_threshold: f64,
    /// Skip at most this share of waypoints.
    pub max_skip_ratio: f64,
    /// Floor for straight-line distance when computing detour ratios.
    pub min_straight_line_m: f64,
    /// Pause after a 429 before giving the segment up.
    pub rate_limit_pause: Duration,
}

impl Default for PointToPointSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 20,
            timeout: Duration::from_secs(10),
            detour_threshold: 10.0,
            max_skip_ratio: 0.15,
            min_straight_line_m: 10.0,
            rate_limit_pause: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SegmentRoute {
    pub coordinates: Vec<LngLat>,
    pub distance_m: f64,
    pub duration_s: f64,
}

#[derive(Debug, Error)]
pub(crate) enum SegmentError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("rate limited")]
    RateLimited,
    #[error("HTTP {0}")]
    Status(StatusCode),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("no route ({0})")]
    NoRoute(String),
}

type SegmentOutcome = std::result::Result<SegmentRoute, SegmentError>;

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
    distance: f64,
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<LngLat>,
}

/// HTTP client for an OSRM `route` service.
pub struct OsrmRouter {
    client: Client,
    base_url: String,
    settings: PointToPointSettings,
    gate: Arc<Semaphore>,
}

impl OsrmRouter {
    pub fn new(base_url: impl Into<String>, settings: PointToPointSettings) -> Self {
        Self::with_client(Client::new(), base_url, settings)
    }

    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        settings: PointToPointSettings,
    ) -> Self {
        let permits = settings.max_concurrent.max(1);
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            settings,
            gate: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn settings(&self) -> &PointToPointSettings {
        &self.settings
    }

    async fn route_segment(
        &self,
        start: GpsWaypoint,
        end: GpsWaypoint,
        profile: RoutingProfile,
    ) -> SegmentOutcome {
        // OSRM expects lng,lat order
        let url = format!(
            "{}/route/v1/{}/{},{};{},{}",
            self.base_url,
            profile.osrm_name(),
            start.lng,
            start.lat,
            end.lng,
            end.lat
        );

        let response = self
            .client
            .get(url)
            .query(&[("overview", "full"), ("geometries", "geojson"), ("steps", "false")])
            .timeout(self.settings.timeout)
            .send()
            .await
            .map_err(|err| SegmentError::Transport(err.to_string()))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("OSRM rate limited, pausing {:?}", self.settings.rate_limit_pause);
            tokio::time::sleep(self.settings.rate_limit_pause).await;
            return Err(SegmentError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(SegmentError::Status(response.status()));
        }

        let payload: OsrmResponse = response
            .json()
            .await
            .map_err(|err| SegmentError::Malformed(err.to_string()))?;
        if payload.code != "Ok" {
            return Err(SegmentError::NoRoute(payload.code));
        }
        let route = payload
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| SegmentError::NoRoute("empty routes".to_string()))?;
        if route.geometry.coordinates.is_empty() {
            return Err(SegmentError::NoRoute("empty geometry".to_string()));
        }

        Ok(SegmentRoute {
            coordinates: route.geometry.coordinates,
            distance_m: route.distance,
            duration_s: route.duration,
        })
    }

    /// Route every consecutive pair. Results are index-aligned with the pairs.
    async fn route_pass(
        &self,
        waypoints: &[GpsWaypoint],
        profile: RoutingProfile,
    ) -> Vec<SegmentOutcome> {
        let tasks = waypoints.windows(2).map(|pair| {
            let (start, end) = (pair[0], pair[1]);
            async move {
                let _permit = self
                    .gate
                    .acquire()
                    .await
                    .map_err(|_| SegmentError::Transport("concurrency gate closed".to_string()))?;
                self.route_segment(start, end, profile).await
            }
        });
        join_all(tasks).await
    }
}

impl RoadSnap for OsrmRouter {
    async fn route(
        &self,
        waypoints: &[GpsWaypoint],
        profile: RoutingProfile,
    ) -> Result<RoutingResult> {
        ensure_routable(waypoints)?;

        let original_count = waypoints.len();
        let max_skips = (original_count as f64 * self.settings.max_skip_ratio) as usize;
        tracing::info!(
            "OSRM flexible routing: {} points (max {} skips)",
            original_count,
            max_skips
        );

        let first_pass = self.route_pass(waypoints, profile).await;
        let routed: Vec<Option<f64>> = first_pass
            .iter()
            .map(|outcome| outcome.as_ref().ok().map(|seg| seg.distance_m))
            .collect();
        let scan = detect_outliers(waypoints, &routed, &self.settings);

        let (points, outcomes, skipped_points) =
            if !scan.outliers.is_empty() && scan.outliers.len() <= max_skips {
                tracing::info!(
                    "Skipping {} problematic points: {:?}",
                    scan.outliers.len(),
                    scan.outliers
                );
                let filtered: Vec<GpsWaypoint> = waypoints
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| !scan.outliers.contains(idx))
                    .map(|(_, wp)| *wp)
                    .collect();
                let second_pass = self.route_pass(&filtered, profile).await;
                (filtered, second_pass, scan.outliers.len())
            } else {
                if scan.outliers.len() > max_skips {
                    tracing::warn!(
                        "Too many outliers ({} > {}), keeping original",
                        scan.outliers.len(),
                        max_skips
                    );
                }
                (waypoints.to_vec(), first_pass, 0)
            };

        let total_segments = points.len() - 1;
        let assembled = assemble(&points, outcomes);

        if skipped_points > 0 {
            tracing::info!(
                "Routed with {} skips ({:.0}%), max detour: {:.1}x",
                skipped_points,
                skipped_points as f64 / original_count as f64 * 100.0,
                scan.max_detour_ratio
            );
        } else if assembled.failed_segments > 0 {
            tracing::warn!(
                "{}/{} segments failed, used straight lines",
                assembled.failed_segments,
                total_segments
            );
        } else {
            tracing::info!(
                "All {} segments routed (max detour: {:.1}x)",
                total_segments,
                scan.max_detour_ratio
            );
        }

        if assembled.polyline.is_empty() {
            return Err(RouteError::EmptyRouteResult);
        }

        Ok(RoutingResult {
            polyline: assembled.polyline,
            distance_m: assembled.distance_m,
            duration_s: assembled.duration_s,
            total_segments,
            failed_segments: assembled.failed_segments,
            skipped_points,
            max_detour_ratio: (scan.max_detour_ratio * 100.0).round() / 100.0,
        })
    }
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct OutlierScan {
    /// Waypoint indices to drop, ascending.
    pub outliers: Vec<usize>,
    pub max_detour_ratio: f64,
}

/// Flag the end waypoint of every segment whose detour ratio exceeds the
/// threshold. Loop anchors (first and last waypoint) are never flagged.
pub(crate) fn detect_outliers(
    waypoints: &[GpsWaypoint],
    routed_m: &[Option<f64>],
    settings: &PointToPointSettings,
) -> OutlierScan {
    let mut scan = OutlierScan {
        outliers: Vec::new(),
        max_detour_ratio: 1.0,
    };
    let last = waypoints.len().saturating_sub(1);

    for (idx, (pair, routed)) in waypoints.windows(2).zip(routed_m).enumerate() {
        let Some(routed) = routed else {
            continue;
        };
        let straight_m = waypoint_distance(&pair[0], &pair[1]).max(settings.min_straight_line_m);
        let detour_ratio = routed / straight_m;
        scan.max_detour_ratio = scan.max_detour_ratio.max(detour_ratio);

        if detour_ratio > settings.detour_threshold {
            let end_idx = idx + 1;
            if end_idx < last {
                tracing::debug!(
                    "Segment {} outlier: {:.1}x detour ({:.0}m -> {:.0}m)",
                    idx,
                    detour_ratio,
                    straight_m,
                    routed
                );
                scan.outliers.push(end_idx);
            }
        }
    }

    scan
}

#[derive(Debug, Default)]
pub(crate) struct Assembled {
    pub polyline: Vec<LngLat>,
    pub distance_m: f64,
    pub duration_s: f64,
    pub failed_segments: usize,
}

/// Stitch segment results back together in waypoint order.
///
/// Failed segments become straight lines and contribute no distance.
pub(crate) fn assemble(waypoints: &[GpsWaypoint], outcomes: Vec<SegmentOutcome>) -> Assembled {
    let mut out = Assembled::default();

    for (idx, (pair, outcome)) in waypoints.windows(2).zip(outcomes).enumerate() {
        match outcome {
            Ok(segment) => {
                // Skip the first vertex of later segments; it duplicates the previous end.
                let skip = usize::from(idx > 0);
                out.polyline
                    .extend(segment.coordinates.into_iter().skip(skip));
                out.distance_m += segment.distance_m;
                out.duration_s += segment.duration_s;
            }
            Err(err) => {
                tracing::debug!("Segment {} fell back to straight line: {}", idx, err);
                out.failed_segments += 1;
                if idx == 0 {
                    out.polyline.push(pair[0].to_lnglat());
                }
                out.polyline.push(pair[1].to_lnglat());
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use runshape_core::spatial::meters_to_lat;

    fn column(count: usize, spacing_m: f64) -> Vec<GpsWaypoint> {
        (0..count)
            .map(|i| GpsWaypoint::new(1.30 + meters_to_lat(spacing_m * i as f64), 103.80))
            .collect()
    }

    fn segment(start: GpsWaypoint, end: GpsWaypoint, distance_m: f64) -> SegmentOutcome {
        Ok(SegmentRoute {
            coordinates: vec![start.to_lnglat(), end.to_lnglat()],
            distance_m,
            duration_s: distance_m / 1.4,
        })
    }

    #[test]
    fn flags_end_point_of_detour_segment() {
        let points = column(5, 100.0);
        let routed = vec![Some(120.0), Some(5_000.0), Some(120.0), Some(120.0)];
        let scan = detect_outliers(&points, &routed, &PointToPointSettings::default());
        assert_eq!(scan.outliers, vec![2]);
        assert!(scan.max_detour_ratio > 40.0);
    }

    #[test]
    fn never_flags_loop_anchors() {
        let points = column(3, 100.0);
        let routed = vec![Some(120.0), Some(5_000.0)];
        let scan = detect_outliers(&points, &routed, &PointToPointSettings::default());
        assert!(scan.outliers.is_empty());
        assert!(scan.max_detour_ratio > 10.0);
    }

    #[test]
    fn near_coincident_points_use_straight_line_floor() {
        let points = vec![GpsWaypoint::new(1.3, 103.8), GpsWaypoint::new(1.3, 103.8), GpsWaypoint::new(1.31, 103.8)];
        let routed = vec![Some(50.0), Some(1_200.0)];
        let scan = detect_outliers(&points, &routed, &PointToPointSettings::default());
        // 50m over the 10m floor is 5x, below the threshold.
        assert!(scan.outliers.is_empty());
        assert!((scan.max_detour_ratio - 5.0).abs() < 1e-9);
    }

    #[test]
    fn failed_segments_are_ignored_by_scan() {
        let points = column(4, 100.0);
        let routed = vec![None, None, None];
        let scan = detect_outliers(&points, &routed, &PointToPointSettings::default());
        assert_eq!(scan, OutlierScan { outliers: Vec::new(), max_detour_ratio: 1.0 });
    }

    #[test]
    fn assemble_drops_duplicate_vertices() {
        let points = column(3, 100.0);
        let outcomes = vec![
            segment(points[0], points[1], 110.0),
            segment(points[1], points[2], 130.0),
        ];
        let out = assemble(&points, outcomes);
        assert_eq!(out.polyline.len(), 3);
        assert_eq!(out.distance_m, 240.0);
        assert_eq!(out.failed_segments, 0);
    }

    #[test]
    fn assemble_substitutes_straight_lines() {
        let points = column(4, 100.0);
        let outcomes = vec![
            Err(SegmentError::RateLimited),
            segment(points[1], points[2], 130.0),
            Err(SegmentError::NoRoute("NoSegment".to_string())),
        ];
        let out = assemble(&points, outcomes);
        assert_eq!(out.failed_segments, 2);
        assert_eq!(out.distance_m, 130.0);
        assert_eq!(out.polyline.first(), Some(&points[0].to_lnglat()));
        assert_eq!(out.polyline.last(), Some(&points[3].to_lnglat()));
    }
}
