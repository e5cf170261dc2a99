//! End-to-end generation through the facade with stub snappers.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::{closed_route, polygon, square, StubSnapper, START_LAT, START_LNG};
use runshape_core::{
    Convergence, ErrorKind, GpsBounds, RouteScorer, RoutingConfig, RoutingProfile, RoutingResult,
};
use runshape_engine::{
    BoundsRequest, GenerateRequest, RouteGenerator, ShapeCatalog, SuggestRequest,
};

fn generator(stub: Arc<StubSnapper>) -> RouteGenerator<Arc<StubSnapper>> {
    RouteGenerator::new(stub, RoutingConfig::default(), RoutingProfile::Foot)
}

fn suggest_request() -> SuggestRequest {
    SuggestRequest {
        start_lat: START_LAT,
        start_lng: START_LNG,
        distance_km: 5.0,
        aspect_ratio: 1.0,
        num_candidates: None,
    }
}

/// Catalog whose shapes are told apart by vertex count.
fn catalog() -> Arc<ShapeCatalog> {
    Arc::new(ShapeCatalog::from_shapes([
        ("heart", polygon(5)),
        ("star", polygon(6)),
        ("triangle", polygon(3)),
        ("not-whitelisted", polygon(7)),
    ]))
}

#[tokio::test]
async fn test_square_scores_perfectly() {
    let stub = Arc::new(StubSnapper::fixed(5000.0, 0, 4));
    let route = generator(stub.clone())
        .generate(GenerateRequest::new(square(), START_LAT, START_LNG, 5.0))
        .await
        .expect("Square should route");

    assert_eq!(route.score, 100.0);
    assert_eq!(route.distance_m, 5000.0);
    assert_eq!(route.diagnostics.distance_ratio, 1.0);
    assert_eq!(route.diagnostics.iterations, 1);
    assert_eq!(route.diagnostics.convergence, Convergence::Converged);
    // Four corners plus the start repeated to close the loop.
    assert_eq!(route.waypoints.len(), 5);
    assert_eq!(route.waypoints.first(), route.waypoints.last());
    assert_eq!(route.polyline.first(), route.polyline.last());
    assert!(route.diagnostics.refinement.is_none());
    assert_eq!(stub.calls(), 1);

    // Start sits at the square's center; corners are ~630m away.
    let travel = route.travel;
    assert!(travel.approach_distance_m > 550.0 && travel.approach_distance_m < 700.0);
    assert!((travel.approach_distance_m - travel.return_distance_m).abs() <= 0.2);
    let expected_total = 5000.0 + travel.approach_distance_m + travel.return_distance_m;
    assert!((travel.total_with_travel_m - expected_total).abs() <= 0.2);
}

#[tokio::test]
async fn test_half_failed_segments_is_rejected() {
    let scorer = RouteScorer::default();
    let result = closed_route(&[], 5000.0, 5, 10);
    let rejection = scorer
        .is_acceptable(&result, 5.0)
        .expect_err("Half the segments failed");
    assert_eq!(rejection.to_string(), "too many failed segments (50%)");

    let stub = Arc::new(StubSnapper::fixed(5000.0, 5, 10));
    let err = generator(stub)
        .generate(GenerateRequest::new(square(), START_LAT, START_LNG, 5.0))
        .await
        .expect_err("Generation must fail");
    assert_eq!(err.kind(), ErrorKind::UnroutableLocation);
}

#[tokio::test]
async fn test_refinement_keeps_seed_without_improvement() {
    let stub = Arc::new(StubSnapper::fixed(5000.0, 0, 6));
    let mut request = GenerateRequest::new(polygon(6), START_LAT, START_LNG, 5.0);
    request.refine = true;

    let route = generator(stub.clone())
        .generate(request)
        .await
        .expect("Route should be generated");

    let summary = route.diagnostics.refinement.expect("Refinement ran");
    assert_eq!(summary.rounds, 1);
    assert_eq!(summary.accepted_moves, 0);
    assert_eq!(summary.score_before, summary.score_after);
    assert_eq!(route.score, 100.0);
    // One scaling call, then four nudges for each of the five interior points
    // of the closed hexagon.
    assert_eq!(stub.calls(), 21);
}

#[tokio::test]
async fn test_refined_route_failing_quality_check_is_discarded() {
    // Seed: 1.45x target with an open end, acceptable but low scoring.
    // Every nudge: on target and closed, but 30% of segments fail.
    let first_call = AtomicBool::new(true);
    let stub = Arc::new(StubSnapper::new(move |waypoints| {
        if first_call.swap(false, Ordering::SeqCst) {
            let start = waypoints[0];
            Ok(RoutingResult {
                polyline: vec![start.to_lnglat(), [start.lng, start.lat + 0.045]],
                distance_m: 7250.0,
                duration_s: 5000.0,
                total_segments: 6,
                failed_segments: 0,
                skipped_points: 0,
                max_detour_ratio: 1.2,
            })
        } else {
            Ok(closed_route(waypoints, 5000.0, 3, 10))
        }
    }));
    let mut request = GenerateRequest::new(polygon(6), START_LAT, START_LNG, 5.0);
    request.refine = true;

    let route = generator(stub.clone())
        .generate(request)
        .await
        .expect("Unrefined route is still acceptable");

    let summary = route.diagnostics.refinement.expect("Refinement ran");
    assert_eq!(summary.accepted_moves, 0);
    assert_eq!(summary.score_after, summary.score_before);
    assert_eq!(route.diagnostics.failed_segments, 0);
    assert_eq!(route.distance_m, 7250.0);
    assert!(route.score > 40.0 && route.score < 60.0, "score {}", route.score);
    assert_eq!(route.waypoints, stub.routed()[0]);
}

#[tokio::test]
async fn test_bounds_route_fits_box() {
    let stub = Arc::new(StubSnapper::fixed(4000.0, 0, 4));
    let bounds = GpsBounds {
        min_lat: START_LAT - 0.01,
        max_lat: START_LAT + 0.01,
        min_lng: START_LNG - 0.01,
        max_lng: START_LNG + 0.01,
    };

    let route = generator(stub)
        .generate_with_bounds(BoundsRequest {
            shape_name: Some("square".to_string()),
            shape: square(),
            bounds,
            rotation_deg: 0.0,
        })
        .await
        .expect("Bounds route should succeed");

    for wp in &route.waypoints {
        assert!(wp.lat >= bounds.min_lat - 1e-9 && wp.lat <= bounds.max_lat + 1e-9);
        assert!(wp.lng >= bounds.min_lng - 1e-9 && wp.lng <= bounds.max_lng + 1e-9);
    }
    assert_eq!(route.diagnostics.convergence, Convergence::Fixed);
    assert_eq!(route.diagnostics.distance_ratio, 1.0);
    assert_eq!(route.diagnostics.scale_factor, 1.0);
    assert_eq!(route.score, 100.0);
    assert_eq!(route.shape_name.as_deref(), Some("square"));
    // Measured from the box center to a corner.
    assert!(route.travel.approach_distance_m > 1000.0);
}

#[tokio::test]
async fn test_bounds_route_rejects_poor_coverage() {
    let stub = Arc::new(StubSnapper::fixed(4000.0, 3, 4));
    let err = generator(stub)
        .generate_with_bounds(BoundsRequest {
            shape_name: None,
            shape: square(),
            bounds: GpsBounds {
                min_lat: 1.30,
                max_lat: 1.31,
                min_lng: 103.80,
                max_lng: 103.81,
            },
            rotation_deg: 0.0,
        })
        .await
        .expect_err("75% failure");
    assert_eq!(err.to_string(), "location has poor road coverage (75% segments failed)");
}

#[tokio::test]
async fn test_suggest_picks_highest_score() {
    let stub = Arc::new(StubSnapper::new(|waypoints| {
        // Closed loops: pentagon heart has 6 waypoints, hexagon star 7.
        Ok(match waypoints.len() {
            6 => closed_route(waypoints, 5000.0, 0, 5),
            7 => closed_route(waypoints, 5600.0, 0, 6),
            _ => closed_route(waypoints, 5000.0, 5, 10),
        })
    }));

    let suggested = generator(stub)
        .with_catalog(catalog())
        .suggest(suggest_request())
        .await
        .expect("Two candidates pass");

    assert_eq!(suggested.route.shape_name.as_deref(), Some("heart"));
    assert_eq!(suggested.display_name, "Heart");
    assert_eq!(suggested.route.score, 100.0);

    let meta = &suggested.suggestion_metadata;
    assert_eq!(meta.candidates_tried, 3);
    assert_eq!(meta.candidates_passed, 2);
    let names: Vec<&str> = meta.alternatives.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["heart", "star"]);
    assert_eq!(meta.alternatives[1].score, 98.0);
    assert_eq!(meta.failures.len(), 1);
    assert_eq!(meta.failures[0].name, "triangle");
    assert_eq!(meta.failures[0].kind, ErrorKind::UnroutableLocation);
}

#[tokio::test]
async fn test_suggest_fails_when_no_candidate_passes() {
    let stub = Arc::new(StubSnapper::failing());
    let err = generator(stub)
        .with_catalog(catalog())
        .suggest(suggest_request())
        .await
        .expect_err("Every candidate fails");

    assert_eq!(err.kind(), ErrorKind::NoCandidatesSucceeded);
    assert_eq!(err.to_string(), "could not find a suitable route; tried 3 shapes");
}

#[tokio::test]
async fn test_suggest_respects_candidate_limit() {
    let stub = Arc::new(StubSnapper::fixed(5000.0, 0, 4));
    let mut request = suggest_request();
    request.num_candidates = Some(2);

    let suggested = generator(stub.clone())
        .with_catalog(catalog())
        .suggest(request)
        .await
        .expect("Any candidate passes");

    assert_eq!(suggested.suggestion_metadata.candidates_tried, 2);
    assert_eq!(stub.calls(), 2);
}

#[tokio::test]
async fn test_suggest_requires_catalog() {
    let stub = Arc::new(StubSnapper::fixed(5000.0, 0, 4));
    let err = generator(stub)
        .suggest(suggest_request())
        .await
        .expect_err("No catalog configured");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_route_serializes_flat_travel_fields() {
    let stub = Arc::new(StubSnapper::fixed(5000.0, 0, 4));
    let route = generator(stub)
        .generate(GenerateRequest::new(square(), START_LAT, START_LNG, 5.0))
        .await
        .expect("Square should route");

    let value = serde_json::to_value(&route).expect("serializable");
    assert!(value.get("approach_distance_m").is_some());
    assert!(value.get("total_with_travel_m").is_some());
    assert_eq!(value["diagnostics"]["convergence"], "converged");
    assert_eq!(value["diagnostics"]["trace"].as_array().map(Vec::len), Some(1));
    assert!(value.get("generated_at").is_some());
}
