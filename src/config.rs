//! Configuration parameters for route planning and daily assignment.

use crate::cluster::ClusterMethod;
use crate::error::{PlanError, Result};
use crate::exact::MAX_EXACT_POINTS;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Configuration settings for the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of clusters used once the direct-solve threshold is reached
    pub cluster_count: usize,
    /// Clustering algorithm used to partition large point sets
    pub cluster_method: ClusterMethod,
    /// Point sets smaller than this are solved without clustering
    pub direct_threshold: usize,
    /// Largest point set handed to the exact solver; larger sets use the heuristic
    pub exact_limit: usize,
    /// Time budget for each heuristic solve
    pub heuristic_time_limit: Option<Duration>,
    /// Fixed-point factor applied to distances for integral arc costs
    pub distance_scale: f64,
    /// Number of nearest neighbours considered by local search moves
    pub granularity: usize,
    /// Perturbation rounds run by the heuristic after the first local optimum
    pub perturbation_rounds: usize,
    /// Seed for clustering and perturbation randomness
    pub seed: u64,
    /// Run one local search pass over the whole stitched tour
    pub seam_refinement: bool,
    /// Order a cluster by local search alone when the heuristic times out
    pub fallback_on_timeout: bool,
    /// Bounded wait for every lock taken by a daily assignment, in the task
    /// cache and in the store
    pub lock_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cluster_count: 2,
            cluster_method: ClusterMethod::Ward,
            direct_threshold: 100,
            exact_limit: 12,
            heuristic_time_limit: Some(Duration::from_secs(10)),
            distance_scale: 1e6,
            granularity: 20,
            perturbation_rounds: 8,
            seed: 42,
            seam_refinement: false,
            fallback_on_timeout: true,
            lock_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Config::default()
    }

    /// Set the number of clusters.
    pub fn with_cluster_count(mut self, k: usize) -> Self {
        self.cluster_count = k;
        self
    }

    /// Set the clustering algorithm.
    pub fn with_cluster_method(mut self, method: ClusterMethod) -> Self {
        self.cluster_method = method;
        self
    }

    /// Set the direct-solve size threshold.
    pub fn with_direct_threshold(mut self, threshold: usize) -> Self {
        self.direct_threshold = threshold;
        self
    }

    /// Set the exact solver cutoff.
    pub fn with_exact_limit(mut self, limit: usize) -> Self {
        self.exact_limit = limit;
        self
    }

    /// Set the heuristic time budget.
    pub fn with_time_limit(mut self, duration: Duration) -> Self {
        self.heuristic_time_limit = Some(duration);
        self
    }

    /// Remove the heuristic time budget.
    pub fn without_time_limit(mut self) -> Self {
        self.heuristic_time_limit = None;
        self
    }

    /// Set the distance-to-integer scaling factor.
    pub fn with_distance_scale(mut self, scale: f64) -> Self {
        self.distance_scale = scale;
        self
    }

    /// Set the granularity parameter.
    pub fn with_granularity(mut self, g: usize) -> Self {
        self.granularity = g;
        self
    }

    /// Set the number of perturbation rounds.
    pub fn with_perturbation_rounds(mut self, rounds: usize) -> Self {
        self.perturbation_rounds = rounds;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable the cross-seam local search pass.
    pub fn with_seam_refinement(mut self, enabled: bool) -> Self {
        self.seam_refinement = enabled;
        self
    }

    /// Enable or disable the timeout fallback.
    pub fn with_fallback_on_timeout(mut self, enabled: bool) -> Self {
        self.fallback_on_timeout = enabled;
        self
    }

    /// Set the lock acquisition timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Read a configuration from a JSON file. Missing fields keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Config = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all values are usable by the planner.
    pub fn validate(&self) -> Result<()> {
        if self.cluster_count == 0 || self.cluster_count > MAX_EXACT_POINTS {
            return Err(PlanError::invalid(format!(
                "cluster_count must be within 1..={}, got {}",
                MAX_EXACT_POINTS, self.cluster_count
            )));
        }
        if self.exact_limit == 0 || self.exact_limit > MAX_EXACT_POINTS {
            return Err(PlanError::invalid(format!(
                "exact_limit must be within 1..={}, got {}",
                MAX_EXACT_POINTS, self.exact_limit
            )));
        }
        if self.direct_threshold == 0 {
            return Err(PlanError::invalid("direct_threshold must be positive"));
        }
        if !self.distance_scale.is_finite() || self.distance_scale <= 0.0 {
            return Err(PlanError::invalid(format!(
                "distance_scale must be a positive finite number, got {}",
                self.distance_scale
            )));
        }
        if self.granularity == 0 {
            return Err(PlanError::invalid("granularity must be positive"));
        }
        Ok(())
    }
}
