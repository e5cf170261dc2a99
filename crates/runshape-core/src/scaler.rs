//! Projection of abstract shapes onto GPS coordinates.
//!
//! Two modes are supported:
//! - perimeter matching ([`scale_to_gps`]): size the shape so that its
//!   closed perimeter, inflated by the road detour factor, approximates a
//!   target route distance around an anchor point;
//! - bounds fitting ([`scale_to_bounds`]): stretch the shape to fill an
//!   explicit GPS box.
//!
//! Both are pure functions of their inputs.

use crate::error::{Result, RouteError};
use crate::models::{AbstractPoint, GpsBounds, GpsWaypoint, ScaleParams};
use crate::spatial::{deg_per_km_lat, deg_per_km_lng};

/// Abstract perimeters below this are treated as degenerate.
const MIN_ABSTRACT_PERIMETER: f64 = 0.01;
/// Perimeter assumed for a degenerate shape (a unit square).
const FALLBACK_ABSTRACT_PERIMETER: f64 = 4.0;

/// Check that a shape can be routed: at least 3 distinct, finite points.
pub fn validate_shape(points: &[AbstractPoint]) -> Result<()> {
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(RouteError::InvalidShape(
            "shape contains non-finite coordinates".to_string(),
        ));
    }
    let mut distinct: Vec<AbstractPoint> = Vec::with_capacity(3);
    for point in points {
        if !distinct.contains(point) {
            distinct.push(*point);
            if distinct.len() >= 3 {
                return Ok(());
            }
        }
    }
    Err(RouteError::InvalidShape(format!(
        "shape needs at least 3 distinct points, got {}",
        distinct.len()
    )))
}

/// Append the first waypoint when the sequence does not already end on it,
/// so the routed path returns to its start.
pub fn close_loop(waypoints: &mut Vec<GpsWaypoint>) {
    let Some(&first) = waypoints.first() else {
        return;
    };
    if waypoints.len() > 1 && waypoints.last() != Some(&first) {
        waypoints.push(first);
    }
}

/// Closed-loop perimeter of a planar point sequence (last wraps to first).
pub fn closed_perimeter(points: &[(f64, f64)]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt())
        .sum()
}

fn bounding_box(points: &[AbstractPoint]) -> (f64, f64, f64, f64) {
    points.iter().fold(
        (
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
        ),
        |(min_x, max_x, min_y, max_y), p| {
            (min_x.min(p.x), max_x.max(p.x), min_y.min(p.y), max_y.max(p.y))
        },
    )
}

fn rotate_about(points: &mut [(f64, f64)], rotation_deg: f64, cx: f64, cy: f64) {
    if rotation_deg == 0.0 {
        return;
    }
    let (sin_r, cos_r) = rotation_deg.to_radians().sin_cos();
    for (x, y) in points.iter_mut() {
        let dx = *x - cx;
        let dy = *y - cy;
        *x = cx + dx * cos_r - dy * sin_r;
        *y = cy + dx * sin_r + dy * cos_r;
    }
}

fn ensure_points(points: &[AbstractPoint]) -> Result<()> {
    if points.is_empty() {
        return Err(RouteError::InvalidShape("shape has no points".to_string()));
    }
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(RouteError::InvalidShape(
            "shape contains non-finite coordinates".to_string(),
        ));
    }
    Ok(())
}

/// Center the shape on the origin and divide by its larger extent.
///
/// Keeps the native aspect ratio of the source shape.
pub fn normalize_centered(points: &[AbstractPoint]) -> Vec<(f64, f64)> {
    let (min_x, max_x, min_y, max_y) = bounding_box(points);
    let extent = (max_x - min_x).max(max_y - min_y);
    let extent = if extent > 0.0 { extent } else { 1.0 };
    let cx = (min_x + max_x) / 2.0;
    let cy = (min_y + max_y) / 2.0;
    points
        .iter()
        .map(|p| ((p.x - cx) / extent, (p.y - cy) / extent))
        .collect()
}

/// Convert abstract shape points to GPS waypoints using perimeter-based scaling.
///
/// The abstract perimeter is scaled so that, once roads inflate it by
/// `road_detour_factor`, the routed loop approximates `distance_km`.
/// Returns one waypoint per input point, in order.
pub fn scale_to_gps(
    points: &[AbstractPoint],
    anchor: GpsWaypoint,
    distance_km: f64,
    params: &ScaleParams,
    road_detour_factor: f64,
) -> Result<Vec<GpsWaypoint>> {
    ensure_points(points)?;
    if !distance_km.is_finite() || distance_km <= 0.0 {
        return Err(RouteError::InvalidConfig(format!(
            "distance_km must be > 0 (got {})",
            distance_km
        )));
    }
    if !params.scale_factor.is_finite() || params.scale_factor <= 0.0 {
        return Err(RouteError::InvalidConfig("scale_factor must be > 0".to_string()));
    }
    if !params.aspect_ratio.is_finite() || params.aspect_ratio <= 0.0 {
        return Err(RouteError::InvalidConfig("aspect_ratio must be > 0".to_string()));
    }
    if !road_detour_factor.is_finite() || road_detour_factor <= 0.0 {
        return Err(RouteError::InvalidConfig(
            "road_detour_factor must be > 0".to_string(),
        ));
    }

    let mut normalized = normalize_centered(points);
    rotate_about(&mut normalized, params.rotation_deg, 0.0, 0.0);

    let mut abstract_perimeter = closed_perimeter(&normalized);
    if abstract_perimeter < MIN_ABSTRACT_PERIMETER {
        abstract_perimeter = FALLBACK_ABSTRACT_PERIMETER;
    }

    let target_perimeter_km = distance_km / road_detour_factor;
    let km_per_unit = target_perimeter_km / abstract_perimeter * params.scale_factor;

    // Stretching by sqrt on each axis keeps the x*y product fixed.
    let ar = params.aspect_ratio.sqrt();
    let scale_x_km = km_per_unit / ar;
    let scale_y_km = km_per_unit * ar;

    let lat_per_km = deg_per_km_lat();
    let lng_per_km = deg_per_km_lng(anchor.lat);

    Ok(normalized
        .into_iter()
        .map(|(nx, ny)| {
            // Abstract Y grows downward, latitude grows upward.
            GpsWaypoint::new(
                anchor.lat - ny * scale_y_km * lat_per_km,
                anchor.lng + nx * scale_x_km * lng_per_km,
            )
        })
        .collect())
}

/// Fit abstract shape points exactly into a GPS bounding box.
///
/// Each axis is normalized independently to `[0, 1]`, optionally rotated
/// about `(0.5, 0.5)`, then mapped linearly onto the box.
pub fn scale_to_bounds(
    points: &[AbstractPoint],
    bounds: &GpsBounds,
    rotation_deg: f64,
) -> Result<Vec<GpsWaypoint>> {
    ensure_points(points)?;
    if !bounds.is_valid() {
        return Err(RouteError::InvalidConfig(format!(
            "invalid bounds ({:.5},{:.5})->({:.5},{:.5})",
            bounds.min_lat, bounds.min_lng, bounds.max_lat, bounds.max_lng
        )));
    }

    let (min_x, max_x, min_y, max_y) = bounding_box(points);
    let width = if max_x > min_x { max_x - min_x } else { 1.0 };
    let height = if max_y > min_y { max_y - min_y } else { 1.0 };

    let mut unit: Vec<(f64, f64)> = points
        .iter()
        .map(|p| ((p.x - min_x) / width, (p.y - min_y) / height))
        .collect();
    rotate_about(&mut unit, rotation_deg, 0.5, 0.5);

    let lat_span = bounds.max_lat - bounds.min_lat;
    let lng_span = bounds.max_lng - bounds.min_lng;

    Ok(unit
        .into_iter()
        .map(|(ux, uy)| {
            GpsWaypoint::new(bounds.max_lat - uy * lat_span, bounds.min_lng + ux * lng_span)
        })
        .collect())
}
