//! Bounded-wait lock acquisition.
//!
//! Every lock on shared state is taken through these helpers so that a
//! stalled holder surfaces as [`PlanError::LockTimeout`] instead of blocking
//! the caller forever. Guards release on drop, on every exit path.

use crate::error::{PlanError, Result};
use log::warn;
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Shared access to `lock`, waiting at most `timeout`.
pub fn read<'a, T>(
    lock: &'a RwLock<T>,
    resource: &'static str,
    timeout: Duration,
) -> Result<RwLockReadGuard<'a, T>> {
    lock.try_read_for(timeout)
        .ok_or_else(|| timed_out(resource, timeout))
}

/// Exclusive access to `lock`, waiting at most `timeout`.
pub fn write<'a, T>(
    lock: &'a RwLock<T>,
    resource: &'static str,
    timeout: Duration,
) -> Result<RwLockWriteGuard<'a, T>> {
    lock.try_write_for(timeout)
        .ok_or_else(|| timed_out(resource, timeout))
}

/// Exclusive access to `mutex`, waiting at most `timeout`.
pub fn exclusive<'a, T>(
    mutex: &'a Mutex<T>,
    resource: &'static str,
    timeout: Duration,
) -> Result<MutexGuard<'a, T>> {
    mutex
        .try_lock_for(timeout)
        .ok_or_else(|| timed_out(resource, timeout))
}

fn timed_out(resource: &'static str, timeout: Duration) -> PlanError {
    warn!("lock on {} not acquired within {:?}", resource, timeout);
    PlanError::LockTimeout { resource, timeout }
}
