//! Tests for daily task assignment.

use chrono::NaiveDate;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use route_planner::config::Config;
use route_planner::error::PlanError;
use route_planner::problem::Coord;
use route_planner::store::{
    Courier, DeliveryStatus, Order, OrderStatus, Package, PackageStatus, Store,
};
use route_planner::task::{assign_daily_task, TaskCache};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

fn add_orders(store: &Store, prefix: &str, count: usize, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for i in 0..count {
        let package_id = format!("{}-PK{:03}", prefix, i);
        store
            .add_package(Package::new(package_id.clone(), "hub", "receiver"))
            .unwrap();
        let receiver = Coord::new(rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0));
        store
            .add_order(Order::new(format!("{}-O{:03}", prefix, i), package_id, receiver))
            .unwrap();
    }
}

/// Two couriers and `count` received orders.
fn create_test_store(count: usize) -> Store {
    let store = Store::new();
    store.add_courier(Courier::new("C1", "Ada")).unwrap();
    store.add_courier(Courier::new("C2", "Grace")).unwrap();
    add_orders(&store, "A", count, 5);
    store
}

fn create_test_config() -> Config {
    Config::new().with_time_limit(Duration::from_secs(5))
}

#[test]
fn test_first_assignment_dispatches_every_order() {
    let store = create_test_store(15);
    let cache = TaskCache::new();

    let record = assign_daily_task(&cache, &store, "C1", day(4), &create_test_config()).unwrap();
    assert_eq!(record.courier_id, "C1");
    assert_eq!(record.date, day(4));
    assert_eq!(record.stop_count(), 15);
    assert_eq!(record.path.iter().collect::<HashSet<_>>().len(), 15);

    assert!(store.eligible_orders().unwrap().is_empty());
    let deliveries = store.deliveries_for("C1").unwrap();
    assert_eq!(deliveries.len(), 15);
    assert!(deliveries
        .iter()
        .all(|delivery| delivery.status == DeliveryStatus::Pending));

    // Deliveries are created in route order
    let packages: Vec<String> = record
        .path
        .iter()
        .map(|order_id| store.order(order_id).unwrap().package_id)
        .collect();
    let delivered: Vec<String> = deliveries.into_iter().map(|d| d.package_id).collect();
    assert_eq!(packages, delivered);

    for order_id in &record.path {
        assert_eq!(store.order(order_id).unwrap().status, OrderStatus::Dispatched);
    }
}

#[test]
fn test_same_day_returns_the_same_record() {
    let store = create_test_store(8);
    let cache = TaskCache::new();
    let config = create_test_config();

    let first = assign_daily_task(&cache, &store, "C1", day(4), &config).unwrap();
    let deliveries = store.delivery_count().unwrap();

    // New orders arriving later the same day do not change the record
    add_orders(&store, "B", 3, 9);
    let second = assign_daily_task(&cache, &store, "C1", day(4), &config).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.revision, second.revision);
    assert_eq!(store.delivery_count().unwrap(), deliveries);
    assert_eq!(store.eligible_orders().unwrap().len(), 3);
}

#[test]
fn test_new_day_recomputes() {
    let store = create_test_store(8);
    let cache = TaskCache::new();
    let config = create_test_config();

    let first = assign_daily_task(&cache, &store, "C1", day(4), &config).unwrap();
    add_orders(&store, "B", 5, 11);
    let second = assign_daily_task(&cache, &store, "C1", day(5), &config).unwrap();

    assert!(second.revision > first.revision);
    assert_eq!(second.date, day(5));
    assert_eq!(second.stop_count(), 5);
    assert!(second.path.iter().all(|id| id.starts_with("B-")));
    assert_eq!(store.delivery_count().unwrap(), 13);

    let current = cache.get("C1", config.lock_timeout).unwrap().unwrap();
    assert!(Arc::ptr_eq(&current, &second));
}

#[test]
fn test_no_orders_gives_an_empty_record() {
    let store = create_test_store(0);
    let cache = TaskCache::new();

    let record = assign_daily_task(&cache, &store, "C2", day(4), &create_test_config()).unwrap();
    assert!(record.path.is_empty());
    assert_eq!(record.length, 0.0);
    assert!(record.cluster_paths.is_empty());
    assert_eq!(store.delivery_count().unwrap(), 0);
}

#[test]
fn test_unknown_courier() {
    let store = create_test_store(3);
    let cache = TaskCache::new();

    let result = assign_daily_task(&cache, &store, "C9", day(4), &create_test_config());
    assert!(matches!(
        result,
        Err(PlanError::NotFound { kind: "courier", .. })
    ));
    assert!(cache.is_empty(Duration::from_millis(50)).unwrap());
    assert_eq!(store.delivery_count().unwrap(), 0);
}

#[test]
fn test_second_courier_gets_remaining_orders_only() {
    let store = create_test_store(6);
    let cache = TaskCache::new();
    let config = create_test_config();
    assert_eq!(cache.len(config.lock_timeout).unwrap(), 0);

    let first = assign_daily_task(&cache, &store, "C1", day(4), &config).unwrap();
    add_orders(&store, "B", 4, 3);
    let second = assign_daily_task(&cache, &store, "C2", day(4), &config).unwrap();

    assert_eq!(first.stop_count(), 6);
    assert_eq!(second.stop_count(), 4);
    assert_ne!(first.revision, second.revision);
    assert_eq!(cache.len(config.lock_timeout).unwrap(), 2);
    assert!(!cache.is_empty(config.lock_timeout).unwrap());
}

#[test]
fn test_concurrent_requests_for_one_courier() {
    let store = create_test_store(25);
    let cache = TaskCache::new();
    let config = create_test_config();

    let records: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| assign_daily_task(&cache, &store, "C1", day(4), &config)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap().unwrap())
            .collect()
    });

    for record in &records[1..] {
        assert!(Arc::ptr_eq(&records[0], record));
    }
    assert_eq!(store.delivery_count().unwrap(), 25);
}

#[test]
fn test_invalidate_forces_a_new_plan() {
    let store = create_test_store(5);
    let cache = TaskCache::new();
    let config = create_test_config();

    let first = assign_daily_task(&cache, &store, "C1", day(4), &config).unwrap();
    assert!(cache.invalidate("C1", config.lock_timeout).unwrap());
    assert!(cache.get("C1", config.lock_timeout).unwrap().is_none());
    assert!(!cache.invalidate("C2", config.lock_timeout).unwrap());

    add_orders(&store, "B", 2, 6);
    let second = assign_daily_task(&cache, &store, "C1", day(4), &config).unwrap();
    assert!(second.revision > first.revision);
    assert_eq!(second.stop_count(), 2);
}

#[test]
fn test_failed_planning_keeps_the_previous_record() {
    let store = create_test_store(5);
    let cache = TaskCache::new();
    let config = create_test_config();

    let first = assign_daily_task(&cache, &store, "C1", day(4), &config).unwrap();
    add_orders(&store, "B", 3, 8);

    let broken = config.clone().with_exact_limit(0);
    assert!(assign_daily_task(&cache, &store, "C1", day(5), &broken).is_err());

    let current = cache.get("C1", config.lock_timeout).unwrap().unwrap();
    assert!(Arc::ptr_eq(&current, &first));
    assert_eq!(store.eligible_orders().unwrap().len(), 3);
}

#[test]
fn test_undispatchable_order_is_left_off_the_route() {
    let store = create_test_store(5);
    let cache = TaskCache::new();
    let config = create_test_config();

    // The package of A-O004 is already delivered, so the order cannot be dispatched
    store
        .update_package_status("A-PK004", PackageStatus::Dispatched)
        .unwrap();
    store
        .update_package_status("A-PK004", PackageStatus::Delivered)
        .unwrap();

    let record = assign_daily_task(&cache, &store, "C1", day(4), &config).unwrap();
    assert_eq!(record.stop_count(), 4);
    assert!(!record.path.contains(&"A-O004".to_string()));
    assert_eq!(record.cluster_paths.concat(), record.path);
    assert_eq!(record.cluster_paths.len(), record.cluster_lengths.len());

    let receivers: Vec<Coord> = record
        .path
        .iter()
        .map(|order_id| store.order(order_id).unwrap().receiver)
        .collect();
    let length: f64 = receivers
        .windows(2)
        .map(|pair| pair[0].distance(&pair[1]))
        .sum();
    assert!((record.length - length).abs() < 1e-6);
    assert!(record.cluster_lengths.iter().sum::<f64>() <= length + 1e-6);

    assert_eq!(store.deliveries_for("C1").unwrap().len(), 4);
    for order_id in &record.path {
        assert_eq!(store.order(order_id).unwrap().status, OrderStatus::Dispatched);
    }
    assert_eq!(store.order("A-O004").unwrap().status, OrderStatus::Received);

    // Asking again the same day returns the stored record
    let again = assign_daily_task(&cache, &store, "C1", day(4), &config).unwrap();
    assert!(Arc::ptr_eq(&record, &again));

    // The stuck order never blocks another courier's assignment
    let other = assign_daily_task(&cache, &store, "C2", day(4), &config).unwrap();
    assert!(other.path.is_empty());
    assert!(other.cluster_paths.is_empty());
    assert!(other.cluster_lengths.is_empty());
    assert_eq!(other.length, 0.0);
    assert_eq!(store.delivery_count().unwrap(), 4);
    assert_eq!(store.eligible_orders().unwrap().len(), 1);
}

#[test]
fn test_assignment_waits_on_store_locks_with_the_configured_timeout() {
    let store = Store::new().with_lock_timeout(Duration::ZERO);
    store.add_courier(Courier::new("C1", "Ada")).unwrap();
    store.add_courier(Courier::new("C2", "Grace")).unwrap();
    add_orders(&store, "A", 30, 13);
    let cache = TaskCache::new();
    let config = create_test_config().with_lock_timeout(Duration::from_secs(2));

    let timeout = config.lock_timeout;
    assert_eq!(
        store.courier_within("C1", timeout).unwrap(),
        store.courier("C1").unwrap()
    );
    assert_eq!(
        store.eligible_orders_within(timeout).unwrap(),
        store.eligible_orders().unwrap()
    );

    let records: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = ["C1", "C2", "C1", "C2"]
            .into_iter()
            .map(|courier| {
                let (cache, store, config) = (&cache, &store, &config);
                scope.spawn(move || assign_daily_task(cache, store, courier, day(4), config))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap().unwrap())
            .collect()
    });

    let stops: usize = records
        .iter()
        .filter(|record| record.courier_id == "C1")
        .take(1)
        .chain(records.iter().filter(|record| record.courier_id == "C2").take(1))
        .map(|record| record.stop_count())
        .sum();
    assert_eq!(stops, 30);
    assert_eq!(store.delivery_count().unwrap(), 30);
    assert!(store.eligible_orders_within(timeout).unwrap().is_empty());
}
