//! # Route Planner
//!
//! Daily route planning for couriers delivering to a set of receiver
//! locations in the plane.
//!
//! Small point sets are ordered directly, exactly with Held-Karp up to a
//! configurable size and heuristically above it. Larger sets are split into
//! clusters, the clusters are visited in the order of an exact tour over their
//! centroids, and the per-cluster tours are stitched into one open route.
//!
//! On top of the planner sits a per-courier daily task cache: the first
//! assignment of the day plans a route over all received orders, dispatches
//! them to the courier, and every later request on the same day returns that
//! same record.

pub mod cluster;
pub mod composer;
pub mod config;
pub mod distance;
pub mod error;
pub mod exact;
pub mod heuristic;
pub mod local_search;
pub mod lock;
pub mod problem;
pub mod solution;
pub mod store;
pub mod task;
pub mod utils;

pub use crate::cluster::ClusterMethod;
pub use crate::composer::plan_route;
pub use crate::config::Config;
pub use crate::error::{FailureKind, PlanError, Result};
pub use crate::problem::{Coord, Point};
pub use crate::solution::{RoutePlan, Tour, TourMode};
pub use crate::store::Store;
pub use crate::task::{assign_daily_task, TaskCache, TaskRecord};
