//! Spatial math for distance calculations and local degree conversions.
//!
//! Two families of helpers live here: great-circle distance (haversine) for
//! measuring real-world gaps, and a local flat-earth approximation for turning
//! kilometre or metre offsets into degree offsets around a reference latitude.

use crate::models::{GpsWaypoint, LngLat};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Kilometres spanned by one degree of latitude in the flat-earth model.
pub const KM_PER_DEG_LAT: f64 = 111.32;

/// Meters spanned by one degree of latitude in the flat-earth model.
pub const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Calculate distance between two points in meters (Haversine formula).
///
/// # Arguments
/// * `lat1`, `lng1` - First point coordinates in decimal degrees
/// * `lat2`, `lng2` - Second point coordinates in decimal degrees
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lng2 - lng1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Haversine distance between two waypoints in meters.
pub fn waypoint_distance(a: &GpsWaypoint, b: &GpsWaypoint) -> f64 {
    haversine_distance(a.lat, a.lng, b.lat, b.lng)
}

/// Haversine distance between two `[lng, lat]` polyline vertices in meters.
pub fn lnglat_distance(a: &LngLat, b: &LngLat) -> f64 {
    haversine_distance(a[1], a[0], b[1], b[0])
}

// ==== Flat-earth conversion ====
// Valid for offsets of a few tens of kilometres around the reference latitude.

fn lng_scale(ref_lat_deg: f64) -> f64 {
    ref_lat_deg.to_radians().cos().abs().max(0.01)
}

/// Degrees of latitude per kilometre.
pub fn deg_per_km_lat() -> f64 {
    1.0 / KM_PER_DEG_LAT
}

/// Degrees of longitude per kilometre at the given latitude.
pub fn deg_per_km_lng(ref_lat_deg: f64) -> f64 {
    1.0 / (KM_PER_DEG_LAT * lng_scale(ref_lat_deg))
}

/// Convert a north/south offset in meters to degrees latitude.
pub fn meters_to_lat(meters: f64) -> f64 {
    meters / METERS_PER_DEG_LAT
}

/// Convert an east/west offset in meters to degrees longitude.
/// Requires the reference latitude for proper scaling.
pub fn meters_to_lng(meters: f64, ref_lat_deg: f64) -> f64 {
    meters / (METERS_PER_DEG_LAT * lng_scale(ref_lat_deg))
}

/// Planar distance in meters using the flat-earth model, scaled at `lat1`.
pub fn flat_distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let dlat = (lat2 - lat1) * METERS_PER_DEG_LAT;
    let dlng = (lng2 - lng1) * METERS_PER_DEG_LAT * lat1.to_radians().cos();
    (dlat * dlat + dlng * dlng).sqrt()
}

/// Haversine length of a closed waypoint loop (last point wraps to first).
pub fn closed_loop_length_m(waypoints: &[GpsWaypoint]) -> f64 {
    if waypoints.len() < 2 {
        return 0.0;
    }
    waypoints
        .iter()
        .zip(waypoints.iter().cycle().skip(1))
        .map(|(a, b)| waypoint_distance(a, b))
        .sum()
}
