//! Dense and sparse Euclidean distance matrices.
//!
//! The dense form is indexed by position in the input slice. The sparse form
//! is keyed by point index and is used once points are split into clusters,
//! where the indices of a cluster are no longer contiguous.

use crate::error::{PlanError, Result};
use crate::problem::Coord;
use itertools::Itertools;
use std::collections::{BTreeMap, HashMap};

/// A dense n×n distance matrix stored in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    data: Vec<f64>,
    size: usize,
}

impl DistanceMatrix {
    /// Create a matrix of the given size, initialized to zero.
    pub fn new(size: usize) -> Self {
        DistanceMatrix {
            data: vec![0.0; size * size],
            size,
        }
    }

    /// Compute the pairwise Euclidean distances between coordinates.
    pub fn from_coords(coords: &[Coord]) -> Self {
        let n = coords.len();
        let mut matrix = Self::new(n);

        for i in 0..n {
            for j in (i + 1)..n {
                let d = coords[i].distance(&coords[j]);
                matrix.set(i, j, d);
                matrix.set(j, i, d);
            }
        }

        matrix
    }

    /// Build a matrix from an explicit row-major grid.
    pub fn from_data(size: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != size * size {
            return Err(PlanError::invalid(format!(
                "distance matrix is not square: {} values for size {}",
                data.len(),
                size
            )));
        }
        if data.iter().any(|d| d.is_nan() || *d < 0.0) {
            return Err(PlanError::invalid(
                "distance matrix contains negative or NaN entries",
            ));
        }
        Ok(DistanceMatrix { data, size })
    }

    /// Build a matrix from nested rows, rejecting ragged input.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let size = rows.len();
        if rows.iter().any(|row| row.len() != size) {
            return Err(PlanError::invalid(
                "distance matrix is not square: ragged rows",
            ));
        }
        Self::from_data(size, rows.iter().flatten().copied().collect())
    }

    /// Distance from position `from` to position `to`.
    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.data[from * self.size + to]
    }

    pub(crate) fn set(&mut self, from: usize, to: usize, distance: f64) {
        self.data[from * self.size + to] = distance;
    }

    /// Number of points in the matrix.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Whether `d(i,j)` and `d(j,i)` agree within `tol` everywhere.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        for i in 0..self.size {
            for j in (i + 1)..self.size {
                if (self.get(i, j) - self.get(j, i)).abs() > tol {
                    return false;
                }
            }
        }
        true
    }

    /// The candidate closest to `from`, `None` when there are no candidates.
    pub fn nearest(&self, from: usize, candidates: &[usize]) -> Option<usize> {
        candidates
            .iter()
            .copied()
            .min_by(|&a, &b| self.get(from, a).total_cmp(&self.get(from, b)))
    }

    /// Length of an open path through the given positions.
    pub fn path_length(&self, path: &[usize]) -> f64 {
        path_length(path, |a, b| self.get(a, b))
    }
}

/// Distances keyed by point index.
///
/// The key order is the order in which points were supplied; the first key
/// is the depot for every solver fed from this matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    keys: Vec<usize>,
    rows: HashMap<usize, HashMap<usize, f64>>,
}

impl SparseMatrix {
    /// Compute the pairwise distances of a keyed point set.
    pub fn from_points(points: &BTreeMap<usize, Coord>) -> Self {
        let keys: Vec<usize> = points.keys().copied().collect();
        let mut rows: HashMap<usize, HashMap<usize, f64>> = keys
            .iter()
            .map(|&key| {
                let mut row = HashMap::with_capacity(keys.len());
                row.insert(key, 0.0);
                (key, row)
            })
            .collect();

        for (i, (&key_i, coord_i)) in points.iter().enumerate() {
            for (&key_j, coord_j) in points.iter().skip(i + 1) {
                let d = coord_i.distance(coord_j);
                rows.entry(key_i).or_default().insert(key_j, d);
                rows.entry(key_j).or_default().insert(key_i, d);
            }
        }

        SparseMatrix { keys, rows }
    }

    /// Point indices in supply order.
    pub fn keys(&self) -> &[usize] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Distance between two keys, `None` if either key is unknown.
    pub fn get(&self, from: usize, to: usize) -> Option<f64> {
        self.rows.get(&from).and_then(|row| row.get(&to)).copied()
    }

    /// Re-index into a dense matrix whose position `i` is `keys()[i]`.
    pub fn to_dense(&self) -> DistanceMatrix {
        let n = self.keys.len();
        let mut matrix = DistanceMatrix::new(n);

        for (i, &key_i) in self.keys.iter().enumerate() {
            let row = &self.rows[&key_i];
            for (j, &key_j) in self.keys.iter().enumerate() {
                if i != j {
                    matrix.set(i, j, row.get(&key_j).copied().unwrap_or(f64::INFINITY));
                }
            }
        }

        matrix
    }

    /// Length of an open path through the given keys, `None` on an unknown key.
    pub fn path_length(&self, path: &[usize]) -> Option<f64> {
        path.windows(2)
            .map(|pair| self.get(pair[0], pair[1]))
            .sum::<Option<f64>>()
    }
}

/// Dense pairwise distances over an ordered sequence of coordinates.
pub fn distances_dense(points: &[Coord]) -> DistanceMatrix {
    DistanceMatrix::from_coords(points)
}

/// Sparse pairwise distances over a keyed point set.
pub fn distances_sparse(points: &BTreeMap<usize, Coord>) -> SparseMatrix {
    SparseMatrix::from_points(points)
}

/// Sum of consecutive distances along an open path.
pub fn path_length<F>(path: &[usize], distance: F) -> f64
where
    F: Fn(usize, usize) -> f64,
{
    path.iter()
        .tuple_windows()
        .map(|(&a, &b)| distance(a, b))
        .sum()
}
