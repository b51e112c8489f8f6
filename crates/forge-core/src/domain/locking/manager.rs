//! Lock manager for coordinating resource locks
//!
//! The lock manager is the single owner of lock state. It handles:
//! - All-or-nothing acquisition of a task's whole resource set
//! - Deadlock-avoidance ordering of every request
//! - Wait queues for blocked tasks and wake-ups on release
//! - Expiry: per-task deadlines, a reaper task and a stale-lock sweep
//!
//! Lock state only changes through `acquire_requests`, `release_locks`,
//! `expire_task`/`expire_due` and `cleanup_stale_locks`.

use super::event::{LockEvent, LockTimeout};
use super::expiry::ExpiryQueue;
use super::ordering::sort_requests;
use super::types::{
    AcquireOutcome, LockConfig, LockConflict, LockRecord, LockRequest, ResourceId,
};
use super::wait_queue::WaitQueue;
use crate::domain::blueprint::Blueprint;
use crate::error::Result;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, info, warn};

/// Capacity of the timeout notification channel
const TIMEOUT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct RegistryState {
    /// Live grants per resource (several only for shared reads)
    locks: HashMap<ResourceId, Vec<LockRecord>>,
    wait_queue: WaitQueue,
    expiry: ExpiryQueue,
    history: Vec<LockEvent>,
}

impl RegistryState {
    fn held_by(&self, task_id: &str) -> Vec<ResourceId> {
        let mut held: Vec<ResourceId> = self
            .locks
            .iter()
            .filter(|(_, records)| records.iter().any(|r| r.holder == task_id))
            .map(|(resource, _)| resource.clone())
            .collect();
        held.sort();
        held
    }

    /// Remove every lock a task holds and drain the freed wait queues
    ///
    /// `event` builds the audit entry written for each freed resource.
    fn remove_holder(
        &mut self,
        task_id: &str,
        event: fn(ResourceId, &str) -> LockEvent,
    ) -> Vec<ResourceId> {
        let freed = self.held_by(task_id);
        for resource in &freed {
            if let Some(records) = self.locks.get_mut(resource) {
                records.retain(|r| r.holder != task_id);
                if records.is_empty() {
                    self.locks.remove(resource);
                }
            }
            self.history.push(event(resource.clone(), task_id));

            let waiters = self.wait_queue.drain(resource);
            if !waiters.is_empty() {
                debug!(
                    resource = %resource,
                    waiters = ?waiters,
                    "Drained wait queue"
                );
            }
        }
        self.expiry.cancel(task_id);
        freed
    }

    /// Holders with at least one lapsed grant
    fn expired_holders(&self, now: Instant) -> BTreeSet<String> {
        self.locks
            .values()
            .flatten()
            .filter(|r| r.is_expired_at(now))
            .map(|r| r.holder.clone())
            .collect()
    }
}

/// Lock manager for coordinating resource locks between tasks
///
/// Cloning is cheap; clones share the same registry.
#[derive(Debug, Clone)]
pub struct LockManager {
    /// Configuration
    config: LockConfig,

    /// Registry state, guarded by a single mutex
    state: Arc<Mutex<RegistryState>>,

    /// Woken whenever resources are freed
    released: Arc<Notify>,

    /// Woken whenever a deadline is armed, so the reaper can re-plan
    armed: Arc<Notify>,

    /// Timeout notifications for the scheduler
    timeouts: broadcast::Sender<LockTimeout>,
}

impl LockManager {
    /// Create a new lock manager with the given configuration
    pub fn new(config: LockConfig) -> Self {
        let (timeouts, _) = broadcast::channel(TIMEOUT_CHANNEL_CAPACITY);

        Self {
            config,
            state: Arc::new(Mutex::new(RegistryState::default())),
            released: Arc::new(Notify::new()),
            armed: Arc::new(Notify::new()),
            timeouts,
        }
    }

    /// Create a lock manager with default configuration
    pub fn with_defaults() -> Self {
        Self::new(LockConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Subscribe to lock timeout notifications
    pub fn subscribe_timeouts(&self) -> broadcast::Receiver<LockTimeout> {
        self.timeouts.subscribe()
    }

    /// Try to acquire every resource a blueprint declares, in write mode
    pub async fn acquire_locks(&self, blueprint: &Blueprint) -> AcquireOutcome {
        self.acquire_requests(&blueprint.id, blueprint.lock_requests())
            .await
    }

    /// Acquire a blueprint's locks or fail with a conflict error
    pub async fn try_acquire_locks(&self, blueprint: &Blueprint) -> Result<Vec<LockRecord>> {
        Ok(self.acquire_locks(blueprint).await.into_result()?)
    }

    /// Try to acquire a set of locks for a task, all or nothing
    ///
    /// Requests are sorted into deadlock-avoidance order first. On any
    /// conflict nothing is granted and the task is queued behind every
    /// conflicting resource.
    pub async fn acquire_requests(
        &self,
        task_id: &str,
        requests: Vec<LockRequest>,
    ) -> AcquireOutcome {
        let sorted = sort_requests(requests);
        if sorted.is_empty() {
            return AcquireOutcome::Granted(Vec::new());
        }

        let mut state = self.state.lock().await;
        let now = Instant::now();

        let mut conflicts = Vec::new();
        let mut lapsed_holders = BTreeSet::new();
        for request in &sorted {
            for existing in state.locks.get(&request.resource).into_iter().flatten() {
                if existing.holder == task_id {
                    continue;
                }
                if existing.is_expired_at(now) {
                    lapsed_holders.insert(existing.holder.clone());
                } else if existing.mode.conflicts_with(request.mode) {
                    conflicts.push(LockConflict {
                        resource: request.resource.clone(),
                        holder: existing.holder.clone(),
                        held_mode: existing.mode,
                        requested_mode: request.mode,
                    });
                }
            }
        }

        if !conflicts.is_empty() {
            for conflict in &conflicts {
                state.wait_queue.enqueue(&conflict.resource, task_id);
            }
            info!(
                task_id = %task_id,
                conflicts = conflicts.len(),
                first = %conflicts[0].resource,
                holder = %conflicts[0].holder,
                "Lock request blocked"
            );
            return AcquireOutcome::Blocked(conflicts);
        }

        // Lapsed holders in the way lose all their locks, not just these.
        let mut reclaimed = Vec::new();
        for holder in lapsed_holders {
            reclaimed.push(self.reclaim(&mut state, &holder));
        }

        let acquired_at = Utc::now();
        let mut granted = Vec::with_capacity(sorted.len());
        for request in &sorted {
            let record = LockRecord::new(
                request,
                task_id,
                acquired_at,
                now,
                self.config.max_duration,
            );
            let records = state.locks.entry(request.resource.clone()).or_default();
            records.retain(|r| r.holder != task_id);
            records.push(record.clone());
            state
                .history
                .push(LockEvent::acquired(request.resource.clone(), task_id));
            granted.push(record);
        }

        // A re-acquiring holder keeps one deadline across everything it holds.
        for records in state.locks.values_mut() {
            for record in records.iter_mut().filter(|r| r.holder == task_id) {
                record.refresh(acquired_at, now, self.config.max_duration);
            }
        }

        state.wait_queue.remove_task(task_id);
        state.expiry.arm(task_id, now + self.config.max_duration);
        drop(state);

        self.armed.notify_one();
        self.publish(reclaimed);

        info!(
            task_id = %task_id,
            locks = granted.len(),
            "Locks acquired"
        );
        AcquireOutcome::Granted(granted)
    }

    /// Acquire a blueprint's locks, waiting as long as it takes
    ///
    /// Blocked attempts park until a release or expiry wakes them, or the
    /// retry interval passes. Conflicts never turn into errors here.
    pub async fn acquire_locks_waiting(&self, blueprint: &Blueprint) -> Vec<LockRecord> {
        let mut attempts = 0u32;
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            attempts += 1;
            match self.acquire_locks(blueprint).await {
                AcquireOutcome::Granted(records) => {
                    if attempts > 1 {
                        debug!(task_id = %blueprint.id, attempts, "Acquired after waiting");
                    }
                    return records;
                }
                AcquireOutcome::Blocked(_) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = sleep(self.config.retry_interval) => {}
                    }
                }
            }
        }
    }

    /// Release every lock a task holds
    ///
    /// Idempotent: a task holding nothing gets an empty list and nothing
    /// changes.
    pub async fn release_locks(&self, task_id: &str) -> Vec<ResourceId> {
        let mut state = self.state.lock().await;
        let freed = state.remove_holder(task_id, LockEvent::released);
        drop(state);

        if !freed.is_empty() {
            info!(task_id = %task_id, locks = freed.len(), "Locks released");
            self.released.notify_waiters();
        }
        freed
    }

    /// Force-release a task's locks because its deadline passed
    pub async fn expire_task(&self, task_id: &str) -> Option<LockTimeout> {
        let mut state = self.state.lock().await;
        let timeout = self.reclaim(&mut state, task_id);
        drop(state);

        if timeout.resources.is_empty() {
            return None;
        }
        self.publish(vec![timeout.clone()]);
        Some(timeout)
    }

    /// Fire every deadline that has passed
    pub async fn expire_due(&self) -> Vec<LockTimeout> {
        let mut state = self.state.lock().await;
        let due = state.expiry.pop_due(Instant::now());
        let timeouts: Vec<LockTimeout> = due
            .iter()
            .map(|task_id| self.reclaim(&mut state, task_id))
            .filter(|t| !t.resources.is_empty())
            .collect();
        drop(state);

        self.publish(timeouts.clone());
        timeouts
    }

    /// Sweep for grants whose expiry time has passed
    ///
    /// Covers deadlines that never fired, e.g. when no reaper was running.
    /// A holder with any lapsed lock loses all of its locks.
    pub async fn cleanup_stale_locks(&self) -> Vec<LockTimeout> {
        let mut state = self.state.lock().await;
        let stale = state.expired_holders(Instant::now());
        let timeouts: Vec<LockTimeout> = stale
            .iter()
            .map(|task_id| self.reclaim(&mut state, task_id))
            .collect();
        drop(state);

        if !timeouts.is_empty() {
            info!(holders = timeouts.len(), "Cleaned up stale locks");
        }
        self.publish(timeouts.clone());
        timeouts
    }

    /// Spawn the background reaper
    ///
    /// The reaper sleeps until the earliest deadline, fires it, and runs a
    /// stale-lock sweep every `sweep_interval`. It stops when the returned
    /// handle is dropped.
    pub fn spawn_reaper(&self) -> ReaperHandle {
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            let mut sweep = tokio::time::interval(manager.config.sweep_interval);
            loop {
                let next = manager.state.lock().await.expiry.next_deadline();
                tokio::select! {
                    _ = sleep_until(next.unwrap_or_else(Instant::now)), if next.is_some() => {
                        manager.expire_due().await;
                    }
                    _ = sweep.tick() => {
                        manager.cleanup_stale_locks().await;
                    }
                    _ = manager.armed.notified() => {}
                }
            }
        });
        ReaperHandle { handle }
    }

    /// Live locks on a resource
    pub async fn lock_for(&self, resource: &ResourceId) -> Vec<LockRecord> {
        let state = self.state.lock().await;
        let now = Instant::now();
        state
            .locks
            .get(resource)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| !r.is_expired_at(now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// List all granted locks, including lapsed ones not yet reclaimed
    pub async fn list_active_locks(&self) -> Vec<LockRecord> {
        let state = self.state.lock().await;
        let mut all: Vec<LockRecord> = state.locks.values().flatten().cloned().collect();
        all.sort_by(|a, b| a.resource.cmp(&b.resource).then(a.holder.cmp(&b.holder)));
        all
    }

    /// Tasks waiting on a resource, in arrival order
    pub async fn wait_queue(&self, resource: &ResourceId) -> Vec<String> {
        self.state.lock().await.wait_queue.waiters(resource)
    }

    /// Resources currently held by a task
    pub async fn held_by(&self, task_id: &str) -> Vec<ResourceId> {
        self.state.lock().await.held_by(task_id)
    }

    pub async fn holds_locks(&self, task_id: &str) -> bool {
        !self.held_by(task_id).await.is_empty()
    }

    /// Snapshot of the audit log
    pub async fn history(&self) -> Vec<LockEvent> {
        self.state.lock().await.history.clone()
    }

    // ========== Internal Methods ==========

    fn reclaim(&self, state: &mut RegistryState, task_id: &str) -> LockTimeout {
        let resources = state.remove_holder(task_id, LockEvent::expired);
        if !resources.is_empty() {
            warn!(
                task_id = %task_id,
                locks = resources.len(),
                max_duration_secs = self.config.max_duration.as_secs(),
                "Lock holder timed out, locks force-released"
            );
        }
        LockTimeout {
            task_id: task_id.to_string(),
            resources,
        }
    }

    fn publish(&self, timeouts: Vec<LockTimeout>) {
        let mut any = false;
        for timeout in timeouts.into_iter().filter(|t| !t.resources.is_empty()) {
            any = true;
            // No subscribers is fine; nobody is waiting on this task.
            let _ = self.timeouts.send(timeout);
        }
        if any {
            self.released.notify_waiters();
        }
    }
}

/// Handle to the background reaper task; aborts it on drop
#[derive(Debug)]
pub struct ReaperHandle {
    handle: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stop the reaper
    pub fn stop(self) {}
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blueprint::{BlueprintResources, BlueprintType};
    use crate::domain::locking::event::LockAction;
    use crate::domain::locking::types::LockMode;
    use std::time::Duration;

    fn blueprint(id: &str, tables: &[&str], routes: &[&str]) -> Blueprint {
        Blueprint::new(id, BlueprintType::Database).with_resources(BlueprintResources {
            tables: tables.iter().map(|s| s.to_string()).collect(),
            routes: routes.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_scenario_a_one_writer_then_retry() {
        let manager = LockManager::with_defaults();
        let x = blueprint("x", &["orders"], &[]);
        let y = blueprint("y", &["orders"], &[]);
        let orders = ResourceId::table("orders");

        assert!(manager.acquire_locks(&x).await.is_granted());

        let blocked = manager.acquire_locks(&y).await;
        assert!(!blocked.is_granted());
        assert_eq!(blocked.conflicts()[0].holder, "x");
        assert_eq!(manager.wait_queue(&orders).await, vec!["y"]);

        assert_eq!(manager.release_locks("x").await, vec![orders.clone()]);
        assert!(manager.wait_queue(&orders).await.is_empty());

        assert!(manager.acquire_locks(&y).await.is_granted());
        assert_eq!(manager.lock_for(&orders).await[0].holder, "y");
    }

    #[tokio::test]
    async fn test_scenario_b_acquisition_order() {
        let manager = LockManager::with_defaults();
        let task = blueprint("t", &["orders"], &["/api/x"]);
        let requests = vec![
            LockRequest::write(ResourceId::route("/api/x")),
            LockRequest::write(ResourceId::table("orders")),
        ];

        let outcome = manager.acquire_requests(&task.id, requests).await;
        let AcquireOutcome::Granted(records) = outcome else {
            panic!("expected grant");
        };
        let order: Vec<String> = records.iter().map(|r| r.resource.to_string()).collect();
        assert_eq!(order, vec!["table:orders", "route:/api/x"]);

        let history: Vec<String> = manager
            .history()
            .await
            .iter()
            .map(|e| e.resource.to_string())
            .collect();
        assert_eq!(history, vec!["table:orders", "route:/api/x"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_c_sweep_reclaims_expired_holder() {
        let manager = LockManager::with_defaults();
        let x = blueprint("x", &["orders"], &[]);
        let z = blueprint("z", &["orders"], &[]);
        let mut timeouts = manager.subscribe_timeouts();

        assert!(manager.acquire_locks(&x).await.is_granted());
        tokio::time::advance(Duration::from_secs(16 * 60)).await;

        let reclaimed = manager.cleanup_stale_locks().await;
        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].task_id, "x");

        let history = manager.history().await;
        let last = history.last().unwrap();
        assert_eq!(last.action, LockAction::Expired);
        assert_eq!(last.task_id, "x");

        assert_eq!(timeouts.recv().await.unwrap().task_id, "x");
        assert!(manager.acquire_locks(&z).await.is_granted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires_through_expire_due() {
        let manager = LockManager::new(
            LockConfig::default().with_max_duration(Duration::from_secs(60)),
        );
        let x = blueprint("x", &["orders"], &["/api/x"]);
        assert!(manager.acquire_locks(&x).await.is_granted());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(manager.expire_due().await.is_empty());

        tokio::time::advance(Duration::from_secs(31)).await;
        let fired = manager.expire_due().await;
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].resources.len(), 2);
        assert!(!manager.holds_locks("x").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_drains_wait_queue() {
        let manager = LockManager::with_defaults();
        let orders = ResourceId::table("orders");
        let x = blueprint("x", &["orders"], &[]);
        let y = blueprint("y", &["orders"], &[]);

        assert!(manager.acquire_locks(&x).await.is_granted());
        assert!(!manager.acquire_locks(&y).await.is_granted());
        assert_eq!(manager.wait_queue(&orders).await, vec!["y"]);

        tokio::time::advance(Duration::from_secs(16 * 60)).await;
        assert_eq!(manager.cleanup_stale_locks().await.len(), 1);

        assert!(manager.wait_queue(&orders).await.is_empty());
        assert!(manager.acquire_locks(&y).await.is_granted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_drains_wait_queue() {
        let manager = LockManager::new(
            LockConfig::default().with_max_duration(Duration::from_secs(60)),
        );
        let orders = ResourceId::table("orders");
        let route = ResourceId::route("/api/x");
        let x = blueprint("x", &["orders"], &["/api/x"]);
        let y = blueprint("y", &["orders"], &[]);
        let z = blueprint("z", &[], &["/api/x"]);

        assert!(manager.acquire_locks(&x).await.is_granted());
        assert!(!manager.acquire_locks(&y).await.is_granted());
        assert!(!manager.acquire_locks(&z).await.is_granted());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(manager.expire_due().await.len(), 1);

        assert!(manager.wait_queue(&orders).await.is_empty());
        assert!(manager.wait_queue(&route).await.is_empty());
        let expired: Vec<String> = manager
            .history()
            .await
            .iter()
            .filter(|e| e.action == LockAction::Expired)
            .map(|e| e.resource.to_string())
            .collect();
        assert_eq!(expired, vec!["table:orders", "route:/api/x"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_drains_wait_queue() {
        let manager = LockManager::new(
            LockConfig::default().with_max_duration(Duration::from_secs(60)),
        );
        let orders = ResourceId::table("orders");
        let mut timeouts = manager.subscribe_timeouts();
        let _reaper = manager.spawn_reaper();

        let x = blueprint("x", &["orders"], &[]);
        let y = blueprint("y", &["orders"], &[]);
        assert!(manager.acquire_locks(&x).await.is_granted());
        assert!(!manager.acquire_locks(&y).await.is_granted());
        assert_eq!(manager.wait_queue(&orders).await, vec!["y"]);

        assert_eq!(timeouts.recv().await.unwrap().task_id, "x");
        assert!(manager.wait_queue(&orders).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_reclaims_without_explicit_calls() {
        let manager = LockManager::with_defaults();
        let mut timeouts = manager.subscribe_timeouts();
        let _reaper = manager.spawn_reaper();

        let x = blueprint("x", &["orders"], &[]);
        assert!(manager.acquire_locks(&x).await.is_granted());

        let timeout = timeouts.recv().await.unwrap();
        assert_eq!(timeout.task_id, "x");
        assert_eq!(timeout.resources, vec![ResourceId::table("orders")]);
        assert!(manager.list_active_locks().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lapsed_holder_does_not_block_and_is_fully_reclaimed() {
        let manager = LockManager::with_defaults();
        let x = blueprint("x", &["orders", "users"], &[]);
        let y = blueprint("y", &["orders"], &[]);

        assert!(manager.acquire_locks(&x).await.is_granted());
        tokio::time::advance(Duration::from_secs(15 * 60)).await;

        assert!(manager.acquire_locks(&y).await.is_granted());
        assert!(!manager.holds_locks("x").await);
        assert!(manager.lock_for(&ResourceId::table("users")).await.is_empty());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let manager = LockManager::with_defaults();
        assert!(manager.release_locks("nobody").await.is_empty());
        assert!(manager.history().await.is_empty());

        let x = blueprint("x", &["orders"], &[]);
        manager.acquire_locks(&x).await;
        assert_eq!(manager.release_locks("x").await.len(), 1);
        let before = manager.history().await.len();
        assert!(manager.release_locks("x").await.is_empty());
        assert_eq!(manager.history().await.len(), before);
    }

    #[tokio::test]
    async fn test_blocked_request_grants_nothing() {
        let manager = LockManager::with_defaults();
        let x = blueprint("x", &["orders"], &[]);
        let y = blueprint("y", &["orders", "users"], &["/api/users"]);

        manager.acquire_locks(&x).await;
        let outcome = manager.acquire_locks(&y).await;

        assert_eq!(outcome.conflicts().len(), 1);
        assert!(!manager.holds_locks("y").await);
        assert!(manager.lock_for(&ResourceId::table("users")).await.is_empty());
        assert_eq!(manager.wait_queue(&ResourceId::table("orders")).await, vec!["y"]);
        assert!(manager.wait_queue(&ResourceId::table("users")).await.is_empty());
    }

    #[tokio::test]
    async fn test_try_acquire_reports_conflict() {
        let manager = LockManager::with_defaults();
        let x = blueprint("x", &["orders"], &[]);
        let y = blueprint("y", &["orders"], &[]);

        assert_eq!(manager.try_acquire_locks(&x).await.unwrap().len(), 1);
        let err = manager.try_acquire_locks(&y).await.unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(err.code(), "E301");
        assert!(manager.wait_queue(&ResourceId::table("orders")).await.contains(&"y".to_string()));
    }

    #[tokio::test]
    async fn test_read_locks_share_but_exclude_writers() {
        let manager = LockManager::with_defaults();
        let orders = ResourceId::table("orders");

        let r1 = manager
            .acquire_requests("r1", vec![LockRequest::read(orders.clone())])
            .await;
        let r2 = manager
            .acquire_requests("r2", vec![LockRequest::read(orders.clone())])
            .await;
        assert!(r1.is_granted() && r2.is_granted());

        let w = manager
            .acquire_requests("w", vec![LockRequest::write(orders.clone())])
            .await;
        assert_eq!(w.conflicts().len(), 2);
        assert!(w.conflicts().iter().all(|c| c.held_mode == LockMode::Read));

        manager.release_locks("r1").await;
        manager.release_locks("r2").await;
        assert!(
            manager
                .acquire_requests("w", vec![LockRequest::write(orders)])
                .await
                .is_granted()
        );
    }

    #[tokio::test]
    async fn test_reacquire_by_holder_is_not_a_conflict() {
        let manager = LockManager::with_defaults();
        let x = blueprint("x", &["orders"], &[]);
        assert!(manager.acquire_locks(&x).await.is_granted());
        assert!(manager.acquire_locks(&x).await.is_granted());
        assert_eq!(manager.list_active_locks().await.len(), 1);
    }

    #[tokio::test]
    async fn test_waiting_acquire_wakes_on_release() {
        let manager = LockManager::with_defaults();
        let x = blueprint("x", &["orders"], &[]);
        let y = blueprint("y", &["orders"], &[]);
        manager.acquire_locks(&x).await;

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.acquire_locks_waiting(&y).await })
        };

        tokio::task::yield_now().await;
        manager.release_locks("x").await;

        let records = waiter.await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].holder, "y");
    }

    #[tokio::test]
    async fn test_blueprint_without_resources_is_granted_empty() {
        let manager = LockManager::with_defaults();
        let bare = Blueprint::new("bare", BlueprintType::Other);
        let AcquireOutcome::Granted(records) = manager.acquire_locks(&bare).await else {
            panic!("expected grant");
        };
        assert!(records.is_empty());
        assert!(manager.release_locks("bare").await.is_empty());
    }
}
