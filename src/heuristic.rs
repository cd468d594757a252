//! Heuristic TSP for point sets too large for the exact solver.
//!
//! A path is built by cheapest-arc extension from the depot and then improved
//! by granular 2-opt and Or-opt moves. Remaining budget is spent on
//! double-bridge perturbations, each followed by another local search, keeping
//! the best path seen. All arithmetic runs on fixed-point integer costs.

use crate::config::Config;
use crate::distance::{DistanceMatrix, SparseMatrix};
use crate::error::{FailureKind, PlanError, Result};
use crate::local_search::utils::CostMatrix;
use crate::local_search::LocalSearch;
use crate::solution::Tour;
use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};

/// Parameters of one heuristic solve.
#[derive(Debug, Clone)]
pub struct HeuristicOptions {
    /// Optional wall-clock budget
    pub time_limit: Option<Duration>,
    /// Fixed-point factor for integral arc costs
    pub distance_scale: f64,
    /// Neighbour list size for local search
    pub granularity: usize,
    /// Perturbation rounds after the first local optimum
    pub perturbation_rounds: usize,
    /// Seed for the perturbation RNG
    pub seed: u64,
}

impl Default for HeuristicOptions {
    fn default() -> Self {
        HeuristicOptions::from(&Config::default())
    }
}

impl From<&Config> for HeuristicOptions {
    fn from(config: &Config) -> Self {
        HeuristicOptions {
            time_limit: config.heuristic_time_limit,
            distance_scale: config.distance_scale,
            granularity: config.granularity,
            perturbation_rounds: config.perturbation_rounds,
            seed: config.seed,
        }
    }
}

/// Approximate open-tour solver starting at position 0.
#[derive(Debug, Clone, Default)]
pub struct HeuristicSolver {
    pub options: HeuristicOptions,
}

impl HeuristicSolver {
    pub fn new(options: HeuristicOptions) -> Self {
        HeuristicSolver { options }
    }

    pub fn from_config(config: &Config) -> Self {
        HeuristicSolver::new(HeuristicOptions::from(config))
    }

    /// Solve over a dense matrix; the path holds positions.
    ///
    /// Fails with [`FailureKind::TimedOut`] when the budget expires before
    /// the first complete path exists.
    pub fn solve(&self, matrix: &DistanceMatrix) -> Result<Tour> {
        let n = matrix.size();
        if n == 0 {
            return Err(PlanError::invalid(
                "heuristic solver needs at least one point",
            ));
        }
        if n <= 2 {
            let path: Vec<usize> = (0..n).collect();
            let length = matrix.path_length(&path);
            return Ok(Tour::new(path, length));
        }

        let start_time = Instant::now();
        let deadline = self.options.time_limit.map(|limit| start_time + limit);

        let costs = CostMatrix::from_distances(matrix, self.options.distance_scale)?;
        let mut path = cheapest_arc(&costs, deadline)?;

        let mut local_search = LocalSearch::new(&costs, self.options.granularity)
            .with_deadline(deadline);
        local_search.improve(&mut path, &costs);

        let mut best_cost = costs.path_cost(&path);
        let mut rng = ChaCha8Rng::seed_from_u64(self.options.seed);
        let mut rounds = 0;

        while rounds < self.options.perturbation_rounds && !local_search.expired() && n >= 5 {
            let mut candidate = path.clone();
            double_bridge(&mut candidate, &mut rng);
            local_search.improve(&mut candidate, &costs);

            let cost = costs.path_cost(&candidate);
            if cost < best_cost {
                best_cost = cost;
                path = candidate;
            }
            rounds += 1;
        }

        let length = matrix.path_length(&path);
        debug!(
            "heuristic solved {} points in {:?} ({} perturbation rounds), length {:.3}",
            n,
            start_time.elapsed(),
            rounds,
            length
        );

        Ok(Tour::new(path, length))
    }

    /// Solve over a sparse matrix starting at its first key; the path holds keys.
    pub fn solve_sparse(&self, matrix: &SparseMatrix) -> Result<Tour> {
        let tour = self.solve(&matrix.to_dense())?;
        Ok(remap(tour, matrix.keys()))
    }

    /// Improve the supply order by local search alone, stopping at `deadline`.
    ///
    /// An already expired deadline returns the supply order unchanged.
    pub fn improve_supply_order(
        &self,
        matrix: &SparseMatrix,
        deadline: Option<Instant>,
    ) -> Result<Tour> {
        let dense = matrix.to_dense();
        let n = dense.size();
        if n == 0 {
            return Err(PlanError::invalid(
                "heuristic solver needs at least one point",
            ));
        }

        let costs = CostMatrix::from_distances(&dense, self.options.distance_scale)?;
        let mut path: Vec<usize> = (0..n).collect();
        LocalSearch::new(&costs, self.options.granularity)
            .with_deadline(deadline)
            .improve(&mut path, &costs);

        let length = dense.path_length(&path);
        Ok(remap(Tour::new(path, length), matrix.keys()))
    }
}

fn remap(tour: Tour, keys: &[usize]) -> Tour {
    let path = tour.path.iter().map(|&pos| keys[pos]).collect();
    Tour::new(path, tour.length)
}

/// Grow a path from position 0, always taking the cheapest arc out of its end.
fn cheapest_arc(costs: &CostMatrix, deadline: Option<Instant>) -> Result<Vec<usize>> {
    let n = costs.size();
    let mut visited = vec![false; n];
    let mut path = Vec::with_capacity(n);

    let mut current = 0;
    visited[current] = true;
    path.push(current);

    while path.len() < n {
        if deadline.map_or(false, |deadline| Instant::now() >= deadline) {
            return Err(PlanError::SolverFailure(FailureKind::TimedOut));
        }

        let mut next = None;
        let mut next_cost = i64::MAX;
        for candidate in 0..n {
            if !visited[candidate] && costs.get(current, candidate) < next_cost {
                next_cost = costs.get(current, candidate);
                next = Some(candidate);
            }
        }

        match next {
            Some(node) => {
                visited[node] = true;
                path.push(node);
                current = node;
            }
            None => return Err(PlanError::SolverFailure(FailureKind::Infeasible)),
        }
    }

    Ok(path)
}

/// Double-bridge kick on an open path, keeping position 0 in place.
///
/// `A B C D` becomes `A C B D` for three random cut points.
fn double_bridge<R: Rng>(path: &mut Vec<usize>, rng: &mut R) {
    let n = path.len();
    let mut cuts = [
        rng.gen_range(1..n),
        rng.gen_range(1..n),
        rng.gen_range(1..n),
    ];
    cuts.sort_unstable();
    let [a, b, c] = cuts;
    if a == b || b == c {
        // Degenerate cut: fall back to swapping two single points
        path.swap(a, c);
        return;
    }

    let mut kicked = Vec::with_capacity(n);
    kicked.extend_from_slice(&path[..a]);
    kicked.extend_from_slice(&path[b..c]);
    kicked.extend_from_slice(&path[a..b]);
    kicked.extend_from_slice(&path[c..]);
    *path = kicked;
}
