//! Exact TSP through the Held-Karp dynamic program.
//!
//! The start point is fixed at position 0. For every subset `S` of the other
//! points and every `last ∈ S`, `dp[S][last]` is the cheapest path that
//! leaves the start, visits exactly `S` and ends at `last`. Subsets are bit
//! masks over the non-start points, so every proper subset of a mask is
//! numerically smaller and masks can be processed in increasing order.
//!
//! Time is O(2ⁿ·n²) and memory O(2ⁿ·n); inputs are capped at
//! [`MAX_EXACT_POINTS`].

use crate::distance::{DistanceMatrix, SparseMatrix};
use crate::error::{FailureKind, PlanError, Result};
use crate::solution::{Tour, TourMode};
use log::debug;
use std::time::Instant;

/// Hard ceiling on the number of points the exact solver accepts.
pub const MAX_EXACT_POINTS: usize = 20;

const NO_PARENT: u8 = u8::MAX;

/// Solve TSP exactly over a dense matrix, starting at position 0.
pub fn solve(matrix: &DistanceMatrix, mode: TourMode) -> Result<Tour> {
    let n = matrix.size();
    if n == 0 {
        return Err(PlanError::invalid("exact solver needs at least one point"));
    }
    if n > MAX_EXACT_POINTS {
        return Err(PlanError::invalid(format!(
            "exact solver accepts at most {} points, got {}",
            MAX_EXACT_POINTS, n
        )));
    }
    if n == 1 {
        return Ok(Tour::single(0));
    }

    let start_time = Instant::now();

    // Point `b + 1` is bit `b`; the start point is not part of any mask.
    let m = n - 1;
    let full = (1usize << m) - 1;
    let mut cost = vec![f64::INFINITY; (full + 1) * m];
    let mut parent = vec![NO_PARENT; (full + 1) * m];

    for b in 0..m {
        cost[(1 << b) * m + b] = matrix.get(0, b + 1);
    }

    for mask in 1..=full {
        for last in 0..m {
            if mask & (1 << last) == 0 {
                continue;
            }
            let current = cost[mask * m + last];
            if !current.is_finite() {
                continue;
            }

            for next in 0..m {
                if mask & (1 << next) != 0 {
                    continue;
                }
                let extended = mask | (1 << next);
                let candidate = current + matrix.get(last + 1, next + 1);
                let slot = extended * m + next;
                if candidate < cost[slot] {
                    cost[slot] = candidate;
                    parent[slot] = last as u8;
                }
            }
        }
    }

    let mut best = f64::INFINITY;
    let mut best_last = None;
    for last in 0..m {
        let closing = match mode {
            TourMode::Open => 0.0,
            TourMode::Closed => matrix.get(last + 1, 0),
        };
        let total = cost[full * m + last] + closing;
        if total < best {
            best = total;
            best_last = Some(last);
        }
    }

    let mut current = match best_last {
        Some(last) if best.is_finite() => last,
        _ => return Err(PlanError::SolverFailure(FailureKind::Infeasible)),
    };

    let mut path = Vec::with_capacity(n);
    let mut mask = full;
    loop {
        path.push(current + 1);
        let previous = parent[mask * m + current];
        mask &= !(1 << current);
        if previous == NO_PARENT {
            break;
        }
        current = previous as usize;
    }
    path.push(0);
    path.reverse();

    debug!(
        "held-karp solved {} points ({:?}) in {:?}, length {:.3}",
        n,
        mode,
        start_time.elapsed(),
        best
    );

    Ok(Tour::new(path, best))
}

/// Solve TSP exactly over a sparse matrix, starting at its first key.
///
/// The returned path holds keys rather than positions.
pub fn solve_sparse(matrix: &SparseMatrix, mode: TourMode) -> Result<Tour> {
    let tour = solve(&matrix.to_dense(), mode)?;
    let keys = matrix.keys();
    let path = tour.path.iter().map(|&pos| keys[pos]).collect();
    Ok(Tour::new(path, tour.length))
}
