//! Local search operators for open tours.
//!
//! Paths are sequences of positions into a [`CostMatrix`]; position 0 of the
//! path is the depot and never moves. Moves are restricted to the
//! `granularity` nearest neighbours of each node.

pub mod or_opt;
pub mod two_opt;
pub mod utils;

use std::time::Instant;

use self::utils::CostMatrix;

/// Manages the improvement phase of the heuristic solver.
pub struct LocalSearch {
    pub granularity: usize,
    /// Preprocessed neighbours for each node
    neighbors: Vec<Vec<usize>>,
    /// Position of each node in the path being improved
    positions: Vec<usize>,
    /// Moves stop being evaluated once this instant has passed
    deadline: Option<Instant>,
}

impl LocalSearch {
    /// Create a local search over the given costs.
    pub fn new(costs: &CostMatrix, granularity: usize) -> Self {
        let neighbors = (0..costs.size())
            .map(|node| utils::get_neighbors(node, costs, granularity))
            .collect();

        LocalSearch {
            granularity,
            neighbors,
            positions: vec![0; costs.size()],
            deadline: None,
        }
    }

    /// Stop improving once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Improve `path` until no move helps or the deadline passes.
    ///
    /// Returns whether the path changed.
    pub fn improve(&mut self, path: &mut Vec<usize>, costs: &CostMatrix) -> bool {
        self.refresh_positions(path);

        let mut changed = false;
        let mut improvement = true;
        while improvement && !self.expired() {
            improvement = false;
            improvement |= self.two_opt_neighborhood(path, costs);
            improvement |= self.or_opt_neighborhood(path, costs);
            changed |= improvement;
        }

        changed
    }

    pub(crate) fn expired(&self) -> bool {
        self.deadline.map_or(false, |deadline| Instant::now() >= deadline)
    }

    fn refresh_positions(&mut self, path: &[usize]) {
        for (pos, &node) in path.iter().enumerate() {
            self.positions[node] = pos;
        }
    }
}
