//! Mapbox directions router.
//!
//! The directions API accepts a bounded number of coordinates per request, so
//! longer sequences are split into windows that share one point with the next
//! window and routed one after another.

use std::time::Duration;

use reqwest::Client;
use runshape_core::spatial::waypoint_distance;
use runshape_core::{GpsWaypoint, LngLat, Result, RouteError, RoutingProfile, RoutingResult};
use serde::Deserialize;

use crate::snapper::{ensure_routable, RoadSnap};

pub const DEFAULT_MAPBOX_URL: &str = "https://api.mapbox.com";

/// Tuning for the chunked backend.
#[derive(Debug, Clone)]
pub struct ChunkedSettings {
    /// Coordinates per request (API limit).
    pub max_waypoints: usize,
    /// How far the API may move each waypoint to reach a road.
    pub snap_radius_m: u32,
    pub timeout: Duration,
}

impl Default for ChunkedSettings {
    fn default() -> Self {
        Self {
            max_waypoints: 25,
            snap_radius_m: 200,
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    geometry: DirectionsGeometry,
    distance: f64,
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct DirectionsGeometry {
    coordinates: Vec<LngLat>,
}

struct ChunkRoute {
    coordinates: Vec<LngLat>,
    distance_m: f64,
    duration_s: f64,
}

/// HTTP client for the Mapbox directions API.
pub struct DirectionsRouter {
    client: Client,
    base_url: String,
    access_token: String,
    settings: ChunkedSettings,
}

impl DirectionsRouter {
    /// Fails when the access token is blank.
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        settings: ChunkedSettings,
    ) -> Result<Self> {
        Self::with_client(Client::new(), base_url, access_token, settings)
    }

    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        settings: ChunkedSettings,
    ) -> Result<Self> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(RouteError::InvalidConfig(
                "Mapbox access token is required for the chunked backend".to_string(),
            ));
        }
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
            settings,
        })
    }

    pub fn settings(&self) -> &ChunkedSettings {
        &self.settings
    }

    async fn route_chunk(&self, chunk: &[GpsWaypoint], profile: RoutingProfile) -> Result<ChunkRoute> {
        let coords = chunk
            .iter()
            .map(|wp| format!("{},{}", wp.lng, wp.lat))
            .collect::<Vec<_>>()
            .join(";");
        let radiuses = vec![self.settings.snap_radius_m.to_string(); chunk.len()].join(";");
        let url = format!(
            "{}/directions/v5/mapbox/{}/{}",
            self.base_url,
            profile.mapbox_name(),
            coords
        );

        let response = self
            .client
            .get(url)
            .query(&[
                ("access_token", self.access_token.as_str()),
                ("geometries", "geojson"),
                ("overview", "full"),
                ("steps", "false"),
                ("radiuses", radiuses.as_str()),
            ])
            .timeout(self.settings.timeout)
            .send()
            .await
            .map_err(|err| RouteError::ExternalService(format!("Mapbox request failed: {}", err)))?;

        let status = response.status();
        let payload: DirectionsResponse = response.json().await.map_err(|err| {
            RouteError::ExternalService(format!("Mapbox returned unreadable body ({}): {}", status, err))
        })?;

        let code = payload.code.as_deref().unwrap_or("Unknown");
        if !status.is_success() || code != "Ok" {
            let detail = payload.message.map(|m| format!(": {}", m)).unwrap_or_default();
            return Err(RouteError::ExternalService(format!(
                "Mapbox API error {}{}",
                code, detail
            )));
        }

        let route = payload
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| RouteError::ExternalService("Mapbox returned no routes".to_string()))?;

        Ok(ChunkRoute {
            coordinates: route.geometry.coordinates,
            distance_m: route.distance,
            duration_s: route.duration,
        })
    }
}

impl RoadSnap for DirectionsRouter {
    async fn route(
        &self,
        waypoints: &[GpsWaypoint],
        profile: RoutingProfile,
    ) -> Result<RoutingResult> {
        ensure_routable(waypoints)?;

        let chunks = chunk_waypoints(waypoints, self.settings.max_waypoints);
        if chunks.len() > 1 {
            tracing::info!(
                "Chunked routing: {} points -> {} chunks",
                waypoints.len(),
                chunks.len()
            );
        }

        let mut polyline: Vec<LngLat> = Vec::new();
        let mut distance_m = 0.0;
        let mut duration_s = 0.0;
        let mut max_detour_ratio: f64 = 1.0;

        // Chunks run in order; each one starts where the previous ended.
        for (idx, chunk) in chunks.iter().enumerate() {
            let routed = match self.route_chunk(chunk, profile).await {
                Ok(routed) => routed,
                Err(err) => {
                    tracing::warn!("Chunk {} of {} failed: {}", idx + 1, chunks.len(), err);
                    return Err(err);
                }
            };

            let path_m: f64 = chunk
                .windows(2)
                .map(|pair| waypoint_distance(&pair[0], &pair[1]))
                .sum();
            if path_m > 0.0 {
                max_detour_ratio = max_detour_ratio.max(routed.distance_m / path_m);
            }

            let skip = usize::from(idx > 0);
            polyline.extend(routed.coordinates.into_iter().skip(skip));
            distance_m += routed.distance_m;
            duration_s += routed.duration_s;
        }

        if polyline.is_empty() {
            return Err(RouteError::EmptyRouteResult);
        }

        tracing::info!(
            "Mapbox routed {} points in {} chunks ({:.0}m)",
            waypoints.len(),
            chunks.len(),
            distance_m
        );

        Ok(RoutingResult {
            polyline,
            distance_m,
            duration_s,
            total_segments: chunks.len(),
            failed_segments: 0,
            skipped_points: 0,
            max_detour_ratio: (max_detour_ratio * 100.0).round() / 100.0,
        })
    }
}

/// Split waypoints into windows of at most `max` points where each window
/// starts with the previous window's last point.
pub fn chunk_waypoints(waypoints: &[GpsWaypoint], max: usize) -> Vec<&[GpsWaypoint]> {
    let max = max.max(2);
    if waypoints.len() <= max {
        return vec![waypoints];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < waypoints.len() - 1 {
        let end = (start + max).min(waypoints.len());
        chunks.push(&waypoints[start..end]);
        start = end - 1;
    }
    chunks
}
