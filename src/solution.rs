//! Tour and route plan representations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a tour returns to its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TourMode {
    /// No closing edge back to the start.
    #[default]
    Open,
    /// The last point connects back to the start.
    Closed,
}

/// An ordered visiting sequence of point keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    /// The point keys in visiting order, starting at the depot
    pub path: Vec<usize>,
    /// The total length under the mode the tour was solved for
    pub length: f64,
}

impl Tour {
    /// Create a tour from a path and its length.
    pub fn new(path: Vec<usize>, length: f64) -> Self {
        Tour { path, length }
    }

    /// A tour visiting a single point.
    pub fn single(key: usize) -> Self {
        Tour {
            path: vec![key],
            length: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Treat the path as a ring and start it at position `start`.
    pub fn rotated(&self, start: usize) -> Vec<usize> {
        let mut path = self.path.clone();
        if !path.is_empty() {
            path.rotate_left(start % self.path.len());
        }
        path
    }
}

/// The planner's answer for one point set.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    /// Point identifiers in visiting order
    pub path: Vec<String>,
    /// Open path length along `path`
    pub length: f64,
    /// The stitched sub-path of each visited cluster, in visiting order
    pub cluster_paths: Vec<Vec<String>>,
    /// The open length of each sub-path
    pub cluster_lengths: Vec<f64>,
}

impl RoutePlan {
    /// An empty plan with no stops.
    pub fn empty() -> Self {
        RoutePlan::default()
    }

    /// Number of stops on the route.
    pub fn stop_count(&self) -> usize {
        self.path.len()
    }

    /// Number of clusters the route was composed from.
    pub fn cluster_count(&self) -> usize {
        self.cluster_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

impl fmt::Debug for RoutePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RoutePlan:")?;
        writeln!(f, "  Length: {:.2}", self.length)?;
        writeln!(f, "  Stops: {}", self.path.len())?;
        writeln!(f, "  Clusters: {}", self.cluster_paths.len())?;

        for (i, (path, length)) in self
            .cluster_paths
            .iter()
            .zip(&self.cluster_lengths)
            .enumerate()
        {
            writeln!(
                f,
                "  Cluster #{}: {} stops, length {:.2}",
                i + 1,
                path.len(),
                length
            )?;
        }

        Ok(())
    }
}
