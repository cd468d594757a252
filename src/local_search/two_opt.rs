//! 2-Opt neighborhood on an open path.

use super::utils::{two_opt_delta, CostMatrix};
use super::LocalSearch;

impl LocalSearch {
    /// One sweep of granular 2-opt moves, applying every improving move found.
    ///
    /// For each position `i` the new edge `(path[i], c)` is tried for every
    /// neighbour `c`. Position 0 never moves.
    pub fn two_opt_neighborhood(&mut self, path: &mut [usize], costs: &CostMatrix) -> bool {
        let n = path.len();
        if n < 3 {
            return false;
        }

        let mut improvement = false;

        for i in 0..n - 1 {
            if self.expired() {
                break;
            }

            for k in 0..self.neighbors[path[i]].len() {
                let c = self.neighbors[path[i]][k];
                let q = self.positions[c];

                // Orient the move so the reversed segment lies between the two edges
                let (from, to) = if q > i + 1 {
                    (i, q)
                } else if q + 2 <= i {
                    (q, i)
                } else {
                    continue;
                };

                if two_opt_delta(path, costs, from, to) < 0 {
                    self.apply_two_opt(path, from, to);
                    improvement = true;
                }
            }
        }

        improvement
    }

    /// Reverse `path[i + 1..=j]` and update positions.
    fn apply_two_opt(&mut self, path: &mut [usize], i: usize, j: usize) {
        path[i + 1..=j].reverse();
        for pos in i + 1..=j {
            self.positions[path[pos]] = pos;
        }
    }
}
