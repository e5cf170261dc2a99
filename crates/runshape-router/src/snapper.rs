//! Backend-agnostic road snapping.

use std::future::Future;
use std::sync::Arc;

use runshape_core::{GpsWaypoint, Result, RouteError, RoutingProfile, RoutingResult};

use crate::directions::DirectionsRouter;
use crate::osrm::OsrmRouter;

/// Snaps an ordered waypoint sequence onto the road network.
///
/// Implementations must return a non-empty polyline or an error; an empty
/// geometry is never a success.
pub trait RoadSnap: Send + Sync {
    fn route(
        &self,
        waypoints: &[GpsWaypoint],
        profile: RoutingProfile,
    ) -> impl Future<Output = Result<RoutingResult>> + Send;
}

impl<T: RoadSnap> RoadSnap for Arc<T> {
    fn route(
        &self,
        waypoints: &[GpsWaypoint],
        profile: RoutingProfile,
    ) -> impl Future<Output = Result<RoutingResult>> + Send {
        (**self).route(waypoints, profile)
    }
}

impl<T: RoadSnap> RoadSnap for &T {
    fn route(
        &self,
        waypoints: &[GpsWaypoint],
        profile: RoutingProfile,
    ) -> impl Future<Output = Result<RoutingResult>> + Send {
        (**self).route(waypoints, profile)
    }
}

/// The configured routing backend.
pub enum RoadSnapper {
    /// Self-hosted OSRM, one request per consecutive waypoint pair.
    PointToPoint(OsrmRouter),
    /// Mapbox directions, overlapping multi-waypoint chunks.
    Chunked(DirectionsRouter),
}

impl RoadSnapper {
    pub fn backend_name(&self) -> &'static str {
        match self {
            RoadSnapper::PointToPoint(_) => "osrm",
            RoadSnapper::Chunked(_) => "mapbox",
        }
    }
}

impl RoadSnap for RoadSnapper {
    async fn route(
        &self,
        waypoints: &[GpsWaypoint],
        profile: RoutingProfile,
    ) -> Result<RoutingResult> {
        match self {
            RoadSnapper::PointToPoint(router) => router.route(waypoints, profile).await,
            RoadSnapper::Chunked(router) => router.route(waypoints, profile).await,
        }
    }
}

pub(crate) fn ensure_routable(waypoints: &[GpsWaypoint]) -> Result<()> {
    if waypoints.len() < 2 {
        return Err(RouteError::InsufficientWaypoints(waypoints.len()));
    }
    Ok(())
}
