//! Stub road snappers shared by the engine tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use runshape_core::spatial::closed_loop_length_m;
use runshape_core::{AbstractPoint, GpsWaypoint, Result, RouteError, RoutingProfile, RoutingResult};
use runshape_router::RoadSnap;

type Respond = dyn Fn(&[GpsWaypoint]) -> Result<RoutingResult> + Send + Sync;

/// Answers every routing call with a closure and records what it was asked.
pub struct StubSnapper {
    respond: Box<Respond>,
    calls: AtomicUsize,
    spans: Mutex<Vec<f64>>,
    routed: Mutex<Vec<Vec<GpsWaypoint>>>,
}

impl StubSnapper {
    pub fn new(respond: impl Fn(&[GpsWaypoint]) -> Result<RoutingResult> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            spans: Mutex::new(Vec::new()),
            routed: Mutex::new(Vec::new()),
        }
    }

    /// Always routes to `distance_m` with the given failure counts.
    pub fn fixed(distance_m: f64, failed: usize, total: usize) -> Self {
        Self::new(move |waypoints| Ok(closed_route(waypoints, distance_m, failed, total)))
    }

    /// Routed distance is the waypoint loop length times `detour`.
    pub fn proportional(detour: f64) -> Self {
        Self::new(move |waypoints| {
            let distance_m = closed_loop_length_m(waypoints) * detour;
            Ok(closed_route(waypoints, distance_m, 0, waypoints.len()))
        })
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(RouteError::ExternalService("backend down".to_string())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Latitude extent of each routed waypoint set, in call order.
    pub fn spans(&self) -> Vec<f64> {
        self.spans.lock().unwrap().clone()
    }

    /// Every waypoint sequence passed to `route`, in call order.
    pub fn routed(&self) -> Vec<Vec<GpsWaypoint>> {
        self.routed.lock().unwrap().clone()
    }
}

impl RoadSnap for StubSnapper {
    async fn route(&self, waypoints: &[GpsWaypoint], _profile: RoutingProfile) -> Result<RoutingResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (min, max) = waypoints
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), wp| (lo.min(wp.lat), hi.max(wp.lat)));
        self.spans.lock().unwrap().push(max - min);
        self.routed.lock().unwrap().push(waypoints.to_vec());
        (self.respond)(waypoints)
    }
}

/// A routed loop through the waypoints that returns to its start.
pub fn closed_route(waypoints: &[GpsWaypoint], distance_m: f64, failed: usize, total: usize) -> RoutingResult {
    let mut polyline: Vec<[f64; 2]> = waypoints.iter().map(|wp| wp.to_lnglat()).collect();
    if let Some(first) = polyline.first().copied() {
        if polyline.last() != Some(&first) {
            polyline.push(first);
        }
    }
    RoutingResult {
        polyline,
        distance_m,
        duration_s: distance_m / 1.4,
        total_segments: total,
        failed_segments: failed,
        skipped_points: 0,
        max_detour_ratio: 1.3,
    }
}

pub fn square() -> Vec<AbstractPoint> {
    vec![
        AbstractPoint::new(0.0, 0.0),
        AbstractPoint::new(1.0, 0.0),
        AbstractPoint::new(1.0, 1.0),
        AbstractPoint::new(0.0, 1.0),
    ]
}

/// A regular polygon with `sides` vertices.
pub fn polygon(sides: usize) -> Vec<AbstractPoint> {
    (0..sides)
        .map(|i| {
            let theta = i as f64 / sides as f64 * std::f64::consts::TAU;
            AbstractPoint::new(0.5 + 0.5 * theta.cos(), 0.5 + 0.5 * theta.sin())
        })
        .collect()
}

pub const START_LAT: f64 = 1.3521;
pub const START_LNG: f64 = 103.8198;
