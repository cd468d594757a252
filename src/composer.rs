//! Compose one route over many points from per-cluster tours.
//!
//! Small inputs are solved in one piece. Larger inputs are clustered, the
//! clusters are ordered by an exact tour over their centroids, each cluster
//! is ordered on its own, and the sub-tours are joined end to end. Each
//! sub-tour is rotated, as a ring, to start at its point nearest to the end
//! of the route built so far.

use crate::cluster::{cluster_points, Clustering};
use crate::config::Config;
use crate::distance::{distances_dense, distances_sparse, path_length};
use crate::error::{FailureKind, PlanError, Result};
use crate::exact;
use crate::heuristic::HeuristicSolver;
use crate::local_search::utils::CostMatrix;
use crate::local_search::LocalSearch;
use crate::problem::{validate_points, Coord, Point};
use crate::solution::{RoutePlan, Tour, TourMode};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::time::Instant;

/// A composed route over point indices.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPlan {
    pub path: Vec<usize>,
    pub length: f64,
    pub cluster_paths: Vec<Vec<usize>>,
    pub cluster_lengths: Vec<f64>,
}

impl IndexedPlan {
    /// Replace indices with the identifiers of `points`.
    pub fn into_plan(self, points: &[Point]) -> RoutePlan {
        RoutePlan {
            path: to_ids(&self.path, points),
            length: self.length,
            cluster_paths: self
                .cluster_paths
                .iter()
                .map(|path| to_ids(path, points))
                .collect(),
            cluster_lengths: self.cluster_lengths,
        }
    }
}

fn to_ids(path: &[usize], points: &[Point]) -> Vec<String> {
    path.iter().map(|&index| points[index].id.clone()).collect()
}

/// Plans routes under one configuration.
pub struct RouteComposer<'a> {
    config: &'a Config,
    heuristic: HeuristicSolver,
}

impl<'a> RouteComposer<'a> {
    pub fn new(config: &'a Config) -> Self {
        RouteComposer {
            config,
            heuristic: HeuristicSolver::from_config(config),
        }
    }

    /// Order all coordinates into one open route.
    pub fn compose(&self, coords: &[Coord]) -> Result<IndexedPlan> {
        let n = coords.len();
        if n == 0 {
            return Err(PlanError::invalid("cannot plan a route without points"));
        }

        let start_time = Instant::now();

        if n < self.config.direct_threshold {
            let members: BTreeMap<usize, Coord> = coords.iter().copied().enumerate().collect();
            let tour = self.order_cluster(&members)?;
            let length = open_length(&tour.path, coords);
            debug!("solved {} points directly in {:?}", n, start_time.elapsed());

            return Ok(IndexedPlan {
                path: tour.path.clone(),
                length,
                cluster_paths: vec![tour.path],
                cluster_lengths: vec![length],
            });
        }

        let k = self.config.cluster_count.min(n);
        let clustering = cluster_points(coords, k, self.config.cluster_method, self.config.seed)?;
        let visiting_order = self.order_clusters(&clustering)?;

        let mut path: Vec<usize> = Vec::with_capacity(n);
        let mut cluster_paths = Vec::with_capacity(k);
        let mut cluster_lengths = Vec::with_capacity(k);

        for &cluster_id in &visiting_order {
            let cluster = &clustering.clusters[cluster_id];
            if cluster.is_empty() {
                continue;
            }

            let tour = self.order_cluster(&cluster.members)?;
            let sub_path = match path.last() {
                Some(&last) => tour.rotated(nearest_position(&tour.path, coords, &coords[last])),
                None => tour.path,
            };

            let sub_length = open_length(&sub_path, coords);
            path.extend_from_slice(&sub_path);
            cluster_paths.push(sub_path);
            cluster_lengths.push(sub_length);
        }

        if self.config.seam_refinement {
            self.refine(&mut path, coords)?;
        }

        let length = open_length(&path, coords);
        debug!(
            "composed {} points from {} clusters in {:?}",
            n,
            cluster_paths.len(),
            start_time.elapsed()
        );

        Ok(IndexedPlan {
            path,
            length,
            cluster_paths,
            cluster_lengths,
        })
    }

    /// Visiting order of the clusters: an exact open tour over the centroids.
    fn order_clusters(&self, clustering: &Clustering) -> Result<Vec<usize>> {
        let centroids = distances_dense(&clustering.centroids());
        let order = exact::solve(&centroids, TourMode::Open)?;
        Ok(order.path)
    }

    /// Order the members of one cluster, starting at its first key.
    ///
    /// Clusters up to `exact_limit` points are solved exactly, larger ones by
    /// the heuristic.
    fn order_cluster(&self, members: &BTreeMap<usize, Coord>) -> Result<Tour> {
        match members.len() {
            0 => Err(PlanError::invalid("cannot order an empty cluster")),
            1 => {
                let key = *members.keys().next().ok_or_else(|| {
                    PlanError::invalid("cannot order an empty cluster")
                })?;
                Ok(Tour::single(key))
            }
            size if size <= self.config.exact_limit => {
                exact::solve_sparse(&distances_sparse(members), TourMode::Open)
            }
            size => {
                let matrix = distances_sparse(members);
                let deadline = self
                    .config
                    .heuristic_time_limit
                    .map(|limit| Instant::now() + limit);
                match self.heuristic.solve_sparse(&matrix) {
                    Err(PlanError::SolverFailure(FailureKind::TimedOut))
                        if self.config.fallback_on_timeout =>
                    {
                        warn!(
                            "heuristic timed out on {} points, ordering by local search only",
                            size
                        );
                        self.heuristic.improve_supply_order(&matrix, deadline)
                    }
                    result => result,
                }
            }
        }
    }

    /// One local search pass over the whole stitched route.
    fn refine(&self, path: &mut Vec<usize>, coords: &[Coord]) -> Result<()> {
        let ordered: Vec<Coord> = path.iter().map(|&index| coords[index]).collect();
        let costs = CostMatrix::from_distances(&distances_dense(&ordered), self.config.distance_scale)?;
        let deadline = self
            .config
            .heuristic_time_limit
            .map(|limit| Instant::now() + limit);

        let mut local: Vec<usize> = (0..path.len()).collect();
        let changed = LocalSearch::new(&costs, self.config.granularity)
            .with_deadline(deadline)
            .improve(&mut local, &costs);

        if changed {
            *path = local.iter().map(|&pos| path[pos]).collect();
        }
        Ok(())
    }
}

/// Plan a route over identified points.
///
/// The returned path is a permutation of the point ids, starting at the first
/// point when the input is solved directly.
pub fn plan_route(points: &[Point], config: &Config) -> Result<RoutePlan> {
    config.validate()?;
    validate_points(points)?;

    let coords: Vec<Coord> = points.iter().map(Point::coord).collect();
    let plan = RouteComposer::new(config).compose(&coords)?.into_plan(points);

    info!(
        "planned {} stops in {} clusters, length {:.2}",
        plan.stop_count(),
        plan.cluster_count(),
        plan.length
    );

    Ok(plan)
}

/// Open path length over point indices.
pub fn open_length(path: &[usize], coords: &[Coord]) -> f64 {
    path_length(path, |a, b| coords[a].distance(&coords[b]))
}

/// Position in `path` of the point closest to `target`.
fn nearest_position(path: &[usize], coords: &[Coord], target: &Coord) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (pos, &index) in path.iter().enumerate() {
        let d = coords[index].distance(target);
        if d < best_dist {
            best_dist = d;
            best = pos;
        }
    }
    best
}
