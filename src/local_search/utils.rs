//! Integer arc costs and neighbour lists for local search operations.

use crate::distance::DistanceMatrix;
use crate::error::{PlanError, Result};

/// Arc costs scaled to fixed-point integers.
///
/// Each entry is `round(distance × scale)`, so the rounding error per arc is
/// at most `0.5 / scale`.
#[derive(Debug, Clone)]
pub struct CostMatrix {
    data: Vec<i64>,
    size: usize,
}

impl CostMatrix {
    /// Scale a distance matrix to integral costs.
    pub fn from_distances(matrix: &DistanceMatrix, scale: f64) -> Result<Self> {
        let n = matrix.size();
        // Any path sum must stay representable.
        let ceiling = i64::MAX as f64 / (n.max(1) as f64 + 1.0);
        let mut data = Vec::with_capacity(n * n);

        for from in 0..n {
            for to in 0..n {
                let scaled = (matrix.get(from, to) * scale).round();
                if !scaled.is_finite() || scaled < 0.0 || scaled > ceiling {
                    return Err(PlanError::invalid(format!(
                        "distance {} cannot be scaled by {} to an integral cost",
                        matrix.get(from, to),
                        scale
                    )));
                }
                data.push(scaled as i64);
            }
        }

        Ok(CostMatrix { data, size: n })
    }

    /// Cost of the arc `from → to`.
    pub fn get(&self, from: usize, to: usize) -> i64 {
        self.data[from * self.size + to]
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Total cost of an open path.
    pub fn path_cost(&self, path: &[usize]) -> i64 {
        path.windows(2).map(|pair| self.get(pair[0], pair[1])).sum()
    }
}

/// The `granularity` nodes closest to `node`, nearest first.
pub fn get_neighbors(node: usize, costs: &CostMatrix, granularity: usize) -> Vec<usize> {
    let mut distances: Vec<(usize, i64)> = (0..costs.size())
        .filter(|&other| other != node)
        .map(|other| (other, costs.get(node, other)))
        .collect();

    // Sort by cost, ties by index
    distances.sort_unstable_by_key(|&(other, cost)| (cost, other));

    let count = std::cmp::min(granularity, distances.len());
    distances.truncate(count);

    distances.into_iter().map(|(other, _)| other).collect()
}

/// Cost change of reversing `path[i + 1..=j]` in an open path.
pub fn two_opt_delta(path: &[usize], costs: &CostMatrix, i: usize, j: usize) -> i64 {
    let a = path[i];
    let b = path[i + 1];
    let c = path[j];

    let mut delta = costs.get(a, c) - costs.get(a, b);
    if let Some(&d) = path.get(j + 1) {
        delta += costs.get(b, d) - costs.get(c, d);
    }
    delta
}
