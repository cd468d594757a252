//! Per-courier daily route assignment.
//!
//! Each courier owns one slot in the [`TaskCache`]. A slot is empty until the
//! first assignment, then holds the record computed for one day. Asking again
//! on the same day returns that record unchanged; asking on a later day plans
//! again and replaces it.

use crate::composer::plan_route;
use crate::config::Config;
use crate::error::Result;
use crate::lock;
use crate::problem::{Coord, Point};
use crate::solution::RoutePlan;
use crate::store::Store;
use chrono::NaiveDate;
use itertools::Itertools;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The route assigned to one courier for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Strictly increasing across the cache; every computation gets a new one
    pub revision: u64,
    pub courier_id: String,
    pub date: NaiveDate,
    /// Order ids in visiting order
    pub path: Vec<String>,
    pub length: f64,
    pub cluster_paths: Vec<Vec<String>>,
    pub cluster_lengths: Vec<f64>,
}

impl TaskRecord {
    fn from_plan(revision: u64, courier_id: &str, date: NaiveDate, plan: RoutePlan) -> Self {
        TaskRecord {
            revision,
            courier_id: courier_id.to_string(),
            date,
            path: plan.path,
            length: plan.length,
            cluster_paths: plan.cluster_paths,
            cluster_lengths: plan.cluster_lengths,
        }
    }

    pub fn stop_count(&self) -> usize {
        self.path.len()
    }
}

type Slot = Arc<Mutex<Option<Arc<TaskRecord>>>>;

/// Daily task records keyed by courier.
#[derive(Default)]
pub struct TaskCache {
    slots: RwLock<HashMap<String, Slot>>,
    next_revision: AtomicU64,
}

impl TaskCache {
    pub fn new() -> Self {
        TaskCache::default()
    }

    /// Number of couriers with a slot, computed or not.
    pub fn len(&self, timeout: Duration) -> Result<usize> {
        Ok(lock::read(&self.slots, "task slots", timeout)?.len())
    }

    pub fn is_empty(&self, timeout: Duration) -> Result<bool> {
        Ok(self.len(timeout)? == 0)
    }

    /// The courier's current record, whatever its date.
    pub fn get(&self, courier_id: &str, timeout: Duration) -> Result<Option<Arc<TaskRecord>>> {
        let slot = {
            let slots = lock::read(&self.slots, "task slots", timeout)?;
            match slots.get(courier_id) {
                Some(slot) => Arc::clone(slot),
                None => return Ok(None),
            }
        };
        let record = lock::exclusive(&slot, "task slot", timeout)?;
        Ok(record.clone())
    }

    /// Drop the courier's record so the next assignment plans again.
    ///
    /// Returns whether a record was present.
    pub fn invalidate(&self, courier_id: &str, timeout: Duration) -> Result<bool> {
        let slot = {
            let slots = lock::read(&self.slots, "task slots", timeout)?;
            match slots.get(courier_id) {
                Some(slot) => Arc::clone(slot),
                None => return Ok(false),
            }
        };
        let mut record = lock::exclusive(&slot, "task slot", timeout)?;
        Ok(record.take().is_some())
    }

    /// Assign the courier's route for `today`. See [`assign_daily_task`].
    pub fn assign(
        &self,
        store: &Store,
        courier_id: &str,
        today: NaiveDate,
        config: &Config,
    ) -> Result<Arc<TaskRecord>> {
        let timeout = config.lock_timeout;
        store.courier_within(courier_id, timeout)?;

        let slot = self.slot(courier_id, timeout)?;
        let mut current = lock::exclusive(&slot, "task slot", timeout)?;

        if let Some(record) = current.as_ref() {
            if record.date == today {
                info!(
                    "task for courier {} on {} already assigned (revision {})",
                    courier_id, today, record.revision
                );
                return Ok(Arc::clone(record));
            }
        }

        info!("planning task for courier {} on {}", courier_id, today);

        let orders = store.eligible_orders_within(timeout)?;
        let plan = if orders.is_empty() {
            RoutePlan::empty()
        } else {
            let points: Vec<Point> = orders.iter().map(|order| order.point()).collect();
            plan_route(&points, config)?
        };

        let mut skipped = HashSet::new();
        for order_id in &plan.path {
            match store.dispatch_order_within(order_id, courier_id, timeout) {
                Ok(delivery) => {
                    debug!("created delivery {} for order {}", delivery.id, order_id);
                }
                Err(err) => {
                    warn!(
                        "order {} left off the route of courier {}: {}",
                        order_id, courier_id, err
                    );
                    skipped.insert(order_id.clone());
                }
            }
        }

        let plan = if skipped.is_empty() {
            plan
        } else {
            let coords: HashMap<&str, Coord> = orders
                .iter()
                .map(|order| (order.id.as_str(), order.receiver))
                .collect();
            without_stops(plan, &skipped, &coords)
        };

        let revision = self.next_revision.fetch_add(1, Ordering::SeqCst) + 1;
        let record = Arc::new(TaskRecord::from_plan(revision, courier_id, today, plan));
        *current = Some(Arc::clone(&record));

        info!(
            "assigned {} stops to courier {} on {} (revision {}, length {:.2})",
            record.stop_count(),
            courier_id,
            today,
            revision,
            record.length
        );
        Ok(record)
    }

    /// The courier's slot, created empty on first use.
    fn slot(&self, courier_id: &str, timeout: Duration) -> Result<Slot> {
        let mut slots = lock::write(&self.slots, "task slots", timeout)?;
        Ok(Arc::clone(slots.entry(courier_id.to_string()).or_default()))
    }
}

/// Remove `skipped` stops from every path of `plan` and measure what is left.
fn without_stops(
    plan: RoutePlan,
    skipped: &HashSet<String>,
    coords: &HashMap<&str, Coord>,
) -> RoutePlan {
    let keep = |path: Vec<String>| -> Vec<String> {
        path.into_iter().filter(|id| !skipped.contains(id)).collect()
    };

    let path = keep(plan.path);
    let cluster_paths: Vec<Vec<String>> = plan
        .cluster_paths
        .into_iter()
        .map(keep)
        .filter(|stops| !stops.is_empty())
        .collect();

    RoutePlan {
        length: stops_length(&path, coords),
        cluster_lengths: cluster_paths
            .iter()
            .map(|stops| stops_length(stops, coords))
            .collect(),
        path,
        cluster_paths,
    }
}

/// Open length through the coordinates of `path`.
fn stops_length(path: &[String], coords: &HashMap<&str, Coord>) -> f64 {
    path.iter()
        .filter_map(|id| coords.get(id.as_str()))
        .tuple_windows()
        .map(|(a, b)| a.distance(b))
        .sum()
}

/// Return the courier's route for `today`, planning it on the first call of
/// the day.
///
/// A fresh plan dispatches every order on the route: the order and its
/// package move to dispatched and a pending delivery is created, in route
/// order. An order that cannot be dispatched stays received and is left off
/// the record. If planning fails the error is returned and the slot keeps
/// its previous record.
pub fn assign_daily_task(
    cache: &TaskCache,
    store: &Store,
    courier_id: &str,
    today: NaiveDate,
    config: &Config,
) -> Result<Arc<TaskRecord>> {
    cache.assign(store, courier_id, today, config)
}
