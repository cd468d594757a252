//! In-process store of couriers, orders, packages and deliveries.
//!
//! The store is an explicitly owned object: construct it (empty or from a
//! JSON snapshot), pass it by reference to the operations that need it, and
//! [`Store::flush`] it back to disk when done. Each collection sits behind its
//! own reader/writer lock; locks are always taken in the order orders →
//! packages → deliveries.

use crate::error::{PlanError, Result};
use crate::lock;
use crate::problem::{Coord, Point};
use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default bounded wait for store locks. Daily assignment passes
/// `Config::lock_timeout` through the `*_within` variants instead.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Received,
    Dispatched,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Only received orders are planned.
    pub fn is_eligible(self) -> bool {
        matches!(self, OrderStatus::Received)
    }

    pub fn transition(self, to: OrderStatus) -> Result<OrderStatus> {
        use OrderStatus::*;
        match (self, to) {
            (Received, Dispatched) | (Received, Cancelled) | (Dispatched, Delivered) => Ok(to),
            (from, to) => Err(invalid_transition("order", from, to)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    Created,
    Received,
    Dispatched,
    Delivered,
}

impl PackageStatus {
    pub fn transition(self, to: PackageStatus) -> Result<PackageStatus> {
        use PackageStatus::*;
        match (self, to) {
            (Created, Received)
            | (Created, Dispatched)
            | (Received, Dispatched)
            | (Dispatched, Delivered) => Ok(to),
            (from, to) => Err(invalid_transition("package", from, to)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    InTransit,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn transition(self, to: DeliveryStatus) -> Result<DeliveryStatus> {
        use DeliveryStatus::*;
        match (self, to) {
            (Pending, InTransit)
            | (InTransit, Delivered)
            | (Pending, Failed)
            | (InTransit, Failed) => Ok(to),
            (from, to) => Err(invalid_transition("delivery", from, to)),
        }
    }
}

fn invalid_transition<S: fmt::Debug>(kind: &str, from: S, to: S) -> PlanError {
    PlanError::invalid(format!("{} cannot move from {:?} to {:?}", kind, from, to))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Courier {
    pub id: String,
    pub name: String,
}

impl Courier {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Courier {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A request to deliver one package to a receiver location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub package_id: String,
    pub receiver: Coord,
    pub status: OrderStatus,
}

impl Order {
    /// A new order in the received state.
    pub fn new(id: impl Into<String>, package_id: impl Into<String>, receiver: Coord) -> Self {
        Order {
            id: id.into(),
            package_id: package_id.into(),
            receiver,
            status: OrderStatus::Received,
        }
    }

    /// The route stop for this order.
    pub fn point(&self) -> Point {
        Point::new(self.id.clone(), self.receiver.x, self.receiver.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub status: PackageStatus,
    pub history: Vec<(PackageStatus, DateTime<Utc>)>,
}

impl Package {
    /// A new package in the created state.
    pub fn new(id: impl Into<String>, sender: impl Into<String>, receiver: impl Into<String>) -> Self {
        let status = PackageStatus::Created;
        Package {
            id: id.into(),
            sender: sender.into(),
            receiver: receiver.into(),
            status,
            history: vec![(status, Utc::now())],
        }
    }

    /// Move to `to`, recording the change in the history.
    pub fn advance(&mut self, to: PackageStatus) -> Result<()> {
        self.status = self.status.transition(to)?;
        self.history.push((to, Utc::now()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: String,
    pub package_id: String,
    pub courier_id: String,
    pub status: DeliveryStatus,
    pub history: Vec<(DeliveryStatus, DateTime<Utc>)>,
}

impl Delivery {
    /// Move to `to`, recording the change in the history.
    pub fn advance(&mut self, to: DeliveryStatus) -> Result<()> {
        self.status = self.status.transition(to)?;
        self.history.push((to, Utc::now()));
        Ok(())
    }
}

/// Serialized form of the whole store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub couriers: Vec<Courier>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default)]
    pub deliveries: Vec<Delivery>,
    #[serde(default)]
    pub next_delivery_id: u64,
}

pub struct Store {
    couriers: RwLock<HashMap<String, Courier>>,
    orders: RwLock<BTreeMap<String, Order>>,
    packages: RwLock<HashMap<String, Package>>,
    deliveries: RwLock<BTreeMap<String, Delivery>>,
    next_delivery_id: AtomicU64,
    lock_timeout: Duration,
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Store::from_snapshot(Snapshot::default())
    }

    /// Rebuild a store from a snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let next_id = snapshot
            .deliveries
            .iter()
            .filter_map(|delivery| delivery.id.trim_start_matches('D').parse::<u64>().ok())
            .max()
            .map_or(0, |max| max + 1)
            .max(snapshot.next_delivery_id);

        Store {
            couriers: RwLock::new(
                snapshot.couriers.into_iter().map(|c| (c.id.clone(), c)).collect(),
            ),
            orders: RwLock::new(
                snapshot.orders.into_iter().map(|o| (o.id.clone(), o)).collect(),
            ),
            packages: RwLock::new(
                snapshot.packages.into_iter().map(|p| (p.id.clone(), p)).collect(),
            ),
            deliveries: RwLock::new(
                snapshot.deliveries.into_iter().map(|d| (d.id.clone(), d)).collect(),
            ),
            next_delivery_id: AtomicU64::new(next_id),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Set the bounded wait used for every lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Load a store from a JSON snapshot file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: Snapshot = serde_json::from_reader(reader)?;
        Ok(Store::from_snapshot(snapshot))
    }

    /// Write the current contents to a JSON snapshot file.
    pub fn flush<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let snapshot = self.snapshot()?;
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writer.flush()?;
        Ok(())
    }

    /// Copy the current contents out of the store.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let timeout = self.lock_timeout;
        let couriers = lock::read(&self.couriers, "couriers", timeout)?;
        let orders = lock::read(&self.orders, "orders", timeout)?;
        let packages = lock::read(&self.packages, "packages", timeout)?;
        let deliveries = lock::read(&self.deliveries, "deliveries", timeout)?;

        let mut snapshot = Snapshot {
            couriers: couriers.values().cloned().collect(),
            orders: orders.values().cloned().collect(),
            packages: packages.values().cloned().collect(),
            deliveries: deliveries.values().cloned().collect(),
            next_delivery_id: self.next_delivery_id.load(Ordering::SeqCst),
        };
        snapshot.couriers.sort_by(|a, b| a.id.cmp(&b.id));
        snapshot.packages.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(snapshot)
    }

    pub fn add_courier(&self, courier: Courier) -> Result<()> {
        let mut couriers = lock::write(&self.couriers, "couriers", self.lock_timeout)?;
        couriers.insert(courier.id.clone(), courier);
        Ok(())
    }

    pub fn courier(&self, id: &str) -> Result<Courier> {
        self.courier_within(id, self.lock_timeout)
    }

    /// [`Store::courier`] with an explicit bounded wait.
    pub fn courier_within(&self, id: &str, timeout: Duration) -> Result<Courier> {
        let couriers = lock::read(&self.couriers, "couriers", timeout)?;
        couriers
            .get(id)
            .cloned()
            .ok_or_else(|| PlanError::not_found("courier", id))
    }

    pub fn add_package(&self, package: Package) -> Result<()> {
        let mut packages = lock::write(&self.packages, "packages", self.lock_timeout)?;
        packages.insert(package.id.clone(), package);
        Ok(())
    }

    pub fn package(&self, id: &str) -> Result<Package> {
        let packages = lock::read(&self.packages, "packages", self.lock_timeout)?;
        packages
            .get(id)
            .cloned()
            .ok_or_else(|| PlanError::not_found("package", id))
    }

    /// Add an order; its package must already exist.
    pub fn add_order(&self, order: Order) -> Result<()> {
        if !order.receiver.is_finite() {
            return Err(PlanError::invalid(format!(
                "order {} has a non-finite receiver coordinate",
                order.id
            )));
        }
        let mut orders = lock::write(&self.orders, "orders", self.lock_timeout)?;
        let packages = lock::read(&self.packages, "packages", self.lock_timeout)?;
        if !packages.contains_key(&order.package_id) {
            return Err(PlanError::not_found("package", order.package_id));
        }
        orders.insert(order.id.clone(), order);
        Ok(())
    }

    pub fn order(&self, id: &str) -> Result<Order> {
        let orders = lock::read(&self.orders, "orders", self.lock_timeout)?;
        orders
            .get(id)
            .cloned()
            .ok_or_else(|| PlanError::not_found("order", id))
    }

    /// Orders awaiting a route, in identifier order.
    pub fn eligible_orders(&self) -> Result<Vec<Order>> {
        self.eligible_orders_within(self.lock_timeout)
    }

    /// [`Store::eligible_orders`] with an explicit bounded wait.
    pub fn eligible_orders_within(&self, timeout: Duration) -> Result<Vec<Order>> {
        let orders = lock::read(&self.orders, "orders", timeout)?;
        Ok(orders
            .values()
            .filter(|order| order.status.is_eligible())
            .cloned()
            .collect())
    }

    /// Hand an order to a courier.
    ///
    /// The order and its package move to dispatched and a pending delivery is
    /// created. Both transitions are checked before anything changes.
    pub fn dispatch_order(&self, order_id: &str, courier_id: &str) -> Result<Delivery> {
        self.dispatch_order_within(order_id, courier_id, self.lock_timeout)
    }

    /// [`Store::dispatch_order`] with an explicit bounded wait.
    pub fn dispatch_order_within(
        &self,
        order_id: &str,
        courier_id: &str,
        timeout: Duration,
    ) -> Result<Delivery> {
        let mut orders = lock::write(&self.orders, "orders", timeout)?;
        let mut packages = lock::write(&self.packages, "packages", timeout)?;

        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| PlanError::not_found("order", order_id))?;
        let package = packages
            .get_mut(&order.package_id)
            .ok_or_else(|| PlanError::not_found("package", order.package_id.clone()))?;

        let order_status = order.status.transition(OrderStatus::Dispatched)?;
        package.status.transition(PackageStatus::Dispatched)?;

        let mut deliveries = lock::write(&self.deliveries, "deliveries", timeout)?;
        order.status = order_status;
        package.advance(PackageStatus::Dispatched)?;

        let id = format!("D{:06}", self.next_delivery_id.fetch_add(1, Ordering::SeqCst));
        let status = DeliveryStatus::Pending;
        let delivery = Delivery {
            id: id.clone(),
            package_id: package.id.clone(),
            courier_id: courier_id.to_string(),
            status,
            history: vec![(status, Utc::now())],
        };
        deliveries.insert(id, delivery.clone());

        debug!(
            "dispatched order {} (package {}) to courier {} as {}",
            order_id, delivery.package_id, courier_id, delivery.id
        );
        Ok(delivery)
    }

    pub fn delivery(&self, id: &str) -> Result<Delivery> {
        let deliveries = lock::read(&self.deliveries, "deliveries", self.lock_timeout)?;
        deliveries
            .get(id)
            .cloned()
            .ok_or_else(|| PlanError::not_found("delivery", id))
    }

    /// Deliveries assigned to a courier, in creation order.
    pub fn deliveries_for(&self, courier_id: &str) -> Result<Vec<Delivery>> {
        let deliveries = lock::read(&self.deliveries, "deliveries", self.lock_timeout)?;
        Ok(deliveries
            .values()
            .filter(|delivery| delivery.courier_id == courier_id)
            .cloned()
            .collect())
    }

    pub fn delivery_count(&self) -> Result<usize> {
        Ok(lock::read(&self.deliveries, "deliveries", self.lock_timeout)?.len())
    }

    pub fn update_delivery_status(&self, id: &str, status: DeliveryStatus) -> Result<()> {
        let mut deliveries = lock::write(&self.deliveries, "deliveries", self.lock_timeout)?;
        deliveries
            .get_mut(id)
            .ok_or_else(|| PlanError::not_found("delivery", id))?
            .advance(status)
    }

    pub fn update_package_status(&self, id: &str, status: PackageStatus) -> Result<()> {
        let mut packages = lock::write(&self.packages, "packages", self.lock_timeout)?;
        packages
            .get_mut(id)
            .ok_or_else(|| PlanError::not_found("package", id))?
            .advance(status)
    }
}
