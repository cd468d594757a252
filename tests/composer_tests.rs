//! Integration tests for route planning.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use route_planner::cluster::ClusterMethod;
use route_planner::composer::{open_length, RouteComposer};
use route_planner::config::Config;
use route_planner::distance::distances_sparse;
use route_planner::error::PlanError;
use route_planner::exact;
use route_planner::plan_route;
use route_planner::problem::{load_points, Coord, Point};
use route_planner::solution::{RoutePlan, TourMode};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::time::Duration;

fn create_random_points(count: usize, seed: u64) -> Vec<Point> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            Point::new(
                format!("P{}", i),
                rng.gen_range(0.0..10000.0),
                rng.gen_range(0.0..10000.0),
            )
        })
        .collect()
}

fn create_test_config() -> Config {
    Config::new()
        .with_cluster_count(2)
        .with_direct_threshold(100)
        .with_time_limit(Duration::from_secs(10))
}

fn assert_is_permutation(plan: &RoutePlan, points: &[Point]) {
    let planned: HashSet<&str> = plan.path.iter().map(String::as_str).collect();
    let expected: HashSet<&str> = points.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(plan.path.len(), points.len());
    assert_eq!(planned, expected);
}

/// Length of the route through the ids in `path`.
fn route_length(path: &[String], points: &[Point]) -> f64 {
    let by_id: HashMap<&str, Coord> = points.iter().map(|p| (p.id.as_str(), p.coord())).collect();
    path.windows(2)
        .map(|pair| by_id[pair[0].as_str()].distance(&by_id[pair[1].as_str()]))
        .sum()
}

fn input_order_length(points: &[Point]) -> f64 {
    let coords: Vec<Coord> = points.iter().map(Point::coord).collect();
    open_length(&(0..points.len()).collect::<Vec<_>>(), &coords)
}

#[test]
fn test_large_input_is_clustered() {
    let points = create_random_points(250, 42);
    let plan = plan_route(&points, &create_test_config()).unwrap();

    assert_is_permutation(&plan, &points);
    assert_eq!(plan.cluster_count(), 2);
    assert_eq!(plan.cluster_lengths.len(), 2);
    assert!(plan.length <= input_order_length(&points));
    assert!((plan.length - route_length(&plan.path, &points)).abs() < 1e-6);

    // Cluster sub-paths concatenate to the full path
    let stitched: Vec<String> = plan.cluster_paths.concat();
    assert_eq!(stitched, plan.path);
    for (path, &length) in plan.cluster_paths.iter().zip(&plan.cluster_lengths) {
        assert!((length - route_length(path, &points)).abs() < 1e-6);
    }
}

#[test]
fn test_clusters_are_stitched_at_the_nearest_member() {
    // Two blobs far apart, small enough for exact cluster solves
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let points: Vec<Point> = (0..20)
        .map(|i| {
            let base = if i < 10 { 0.0 } else { 5000.0 };
            Point::new(
                format!("P{}", i),
                base + rng.gen_range(0.0..100.0),
                base + rng.gen_range(0.0..100.0),
            )
        })
        .collect();
    let config = create_test_config()
        .with_direct_threshold(10)
        .with_exact_limit(12);

    let plan = plan_route(&points, &config).unwrap();
    assert_is_permutation(&plan, &points);
    assert_eq!(plan.cluster_count(), 2);

    let coords: Vec<Coord> = points.iter().map(Point::coord).collect();
    let index: HashMap<&str, usize> = points
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id.as_str(), i))
        .collect();
    let sub_paths: Vec<Vec<usize>> = plan
        .cluster_paths
        .iter()
        .map(|path| path.iter().map(|id| index[id.as_str()]).collect())
        .collect();

    // Each cluster after the first starts at its member closest to the
    // previous cluster's last stop
    for pair in sub_paths.windows(2) {
        let last = coords[*pair[0].last().unwrap()];
        let nearest = *pair[1]
            .iter()
            .min_by(|&&a, &&b| {
                coords[a]
                    .distance(&last)
                    .partial_cmp(&coords[b].distance(&last))
                    .unwrap()
            })
            .unwrap();
        assert_eq!(pair[1][0], nearest);
    }

    // Each sub-path is the cluster's own exact tour, rotated as a ring
    for (i, sub_path) in sub_paths.iter().enumerate() {
        let members: BTreeMap<usize, Coord> =
            sub_path.iter().map(|&key| (key, coords[key])).collect();
        let tour = exact::solve_sparse(&distances_sparse(&members), TourMode::Open).unwrap();

        if i == 0 {
            assert_eq!(*sub_path, tour.path);
        } else {
            let start = tour.path.iter().position(|&key| key == sub_path[0]).unwrap();
            assert_eq!(*sub_path, tour.rotated(start));
        }
    }
}

#[test]
fn test_every_cluster_method_plans_a_permutation() {
    let points = create_random_points(180, 7);

    for method in [ClusterMethod::Ward, ClusterMethod::Single, ClusterMethod::KMeans] {
        let config = create_test_config()
            .with_cluster_count(4)
            .with_cluster_method(method);
        let plan = plan_route(&points, &config).unwrap();

        assert_is_permutation(&plan, &points);
        assert_eq!(plan.cluster_paths.concat(), plan.path);
    }
}

#[test]
fn test_small_input_is_solved_directly_from_first_point() {
    let points = create_random_points(10, 3);
    let plan = plan_route(&points, &create_test_config()).unwrap();

    assert_is_permutation(&plan, &points);
    assert_eq!(plan.path[0], "P0");
    assert_eq!(plan.cluster_count(), 1);
    assert_eq!(plan.cluster_paths[0], plan.path);
}

#[test]
fn test_medium_input_uses_heuristic_directly() {
    let points = create_random_points(60, 5);
    let plan = plan_route(&points, &create_test_config()).unwrap();

    assert_is_permutation(&plan, &points);
    assert_eq!(plan.path[0], "P0");
    assert!(plan.length <= input_order_length(&points));
}

#[test]
fn test_square_from_origin() {
    let points = vec![
        Point::new("a", 0.0, 0.0),
        Point::new("b", 10.0, 0.0),
        Point::new("c", 10.0, 10.0),
        Point::new("d", 0.0, 10.0),
    ];
    let plan = plan_route(&points, &Config::default()).unwrap();

    assert_eq!(plan.path[0], "a");
    assert!((plan.length - 30.0).abs() < 1e-9);
}

#[test]
fn test_degenerate_sizes() {
    let config = Config::default();

    let single = vec![Point::new("only", 3.0, 4.0)];
    let plan = plan_route(&single, &config).unwrap();
    assert_eq!(plan.path, vec!["only".to_string()]);
    assert_eq!(plan.length, 0.0);

    let pair = vec![Point::new("x", 0.0, 0.0), Point::new("y", 3.0, 4.0)];
    let plan = plan_route(&pair, &config).unwrap();
    assert_eq!(plan.path, vec!["x".to_string(), "y".to_string()]);
    assert!((plan.length - 5.0).abs() < 1e-12);
}

#[test]
fn test_invalid_inputs() {
    let config = Config::default();

    assert!(matches!(
        plan_route(&[], &config),
        Err(PlanError::InvalidInput(_))
    ));

    let duplicates = vec![Point::new("a", 0.0, 0.0), Point::new("a", 1.0, 1.0)];
    assert!(matches!(
        plan_route(&duplicates, &config),
        Err(PlanError::InvalidInput(_))
    ));

    let not_finite = vec![Point::new("a", 0.0, 0.0), Point::new("b", f64::NAN, 1.0)];
    assert!(matches!(
        plan_route(&not_finite, &config),
        Err(PlanError::InvalidInput(_))
    ));

    let bad_config = Config::new().with_cluster_count(0);
    assert!(matches!(
        plan_route(&create_random_points(5, 1), &bad_config),
        Err(PlanError::InvalidInput(_))
    ));
}

#[test]
fn test_more_clusters_than_points_is_clamped() {
    let points = create_random_points(6, 2);
    let config = Config::new()
        .with_cluster_count(10)
        .with_direct_threshold(3);
    let plan = plan_route(&points, &config).unwrap();

    assert_is_permutation(&plan, &points);
    assert_eq!(plan.cluster_count(), 6);
}

#[test]
fn test_seam_refinement_never_lengthens_the_route() {
    let points = create_random_points(220, 19);
    let config = create_test_config().with_cluster_count(5);

    let plain = plan_route(&points, &config).unwrap();
    let refined = plan_route(&points, &config.clone().with_seam_refinement(true)).unwrap();

    assert_is_permutation(&refined, &points);
    assert!(refined.length <= plain.length + 1e-3);
}

#[test]
fn test_timeout_falls_back_to_local_search() {
    let points = create_random_points(150, 23);
    let coords: Vec<Coord> = points.iter().map(Point::coord).collect();
    let config = create_test_config().with_time_limit(Duration::ZERO);

    let plan = RouteComposer::new(&config).compose(&coords).unwrap();
    assert_eq!(plan.path.len(), 150);

    let strict = config.with_fallback_on_timeout(false);
    let result = RouteComposer::new(&strict).compose(&coords);
    assert!(matches!(result, Err(PlanError::SolverFailure(_))));
}

#[test]
fn test_load_points_from_text_and_json() {
    let dir = std::env::temp_dir().join(format!("route-planner-points-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();

    let text = dir.join("points.txt");
    fs::write(&text, "# id x y\nA 0 0\n\nB 1.5 2\nC 3 4\n").unwrap();
    let points = load_points(&text).unwrap();
    assert_eq!(points.len(), 3);
    assert_eq!(points[1], Point::new("B", 1.5, 2.0));

    let json = dir.join("points.json");
    fs::write(&json, serde_json::to_string(&points).unwrap()).unwrap();
    assert_eq!(load_points(&json).unwrap(), points);

    let broken = dir.join("broken.txt");
    fs::write(&broken, "A 0\n").unwrap();
    assert!(matches!(load_points(&broken), Err(PlanError::InvalidInput(_))));

    fs::remove_dir_all(&dir).unwrap();
}
