//! # codegraph-pool
//!
//! Worker Pool Manager (C4, spec §4.2): allocates per-worker concurrency
//! slots under a process-wide cap, owns one circuit breaker per worker
//! class, and runs a background sweep that clamps leaked slot counters.

mod breaker;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use codegraph_core::constants::{BACKOFF_MAX, BACKOFF_MIN, PROTECTIVE_MODE_FACTOR, SLOT_LEAK_SWEEP_INTERVAL};
use codegraph_core::errors::PoolError;
use parking_lot::{Condvar, Mutex};

pub use breaker::CircuitState;
use breaker::{Admission, Breaker};

struct WorkerState {
    base_concurrency: usize,
    max_concurrency: usize,
    active_jobs: usize,
    protective_mode: bool,
    breaker: Breaker,
}

impl WorkerState {
    /// Effective concurrency, halved while in protective mode (spec §4.2).
    fn effective_concurrency(&self) -> usize {
        if self.protective_mode {
            ((self.base_concurrency as f64) * PROTECTIVE_MODE_FACTOR).floor().max(1.0) as usize
        } else {
            self.base_concurrency
        }
    }
}

struct PoolInner {
    workers: HashMap<String, WorkerState>,
    global_active: usize,
    global_cap: usize,
}

/// Either the pool refused/timed out the call, or the operation itself
/// returned an error (which still counts as a failure for the breaker).
#[derive(Debug)]
pub enum ManagedError<E> {
    Pool(PoolError),
    Operation(E),
}

impl<E: std::fmt::Display> std::fmt::Display for ManagedError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pool(e) => write!(f, "{e}"),
            Self::Operation(e) => write!(f, "{e}"),
        }
    }
}

/// A held concurrency slot. Must be released via [`WorkerPool::release_slot`].
#[derive(Debug)]
pub struct Slot {
    worker_type: String,
    released: bool,
}

impl Slot {
    pub fn worker_type(&self) -> &str {
        &self.worker_type
    }
}

#[derive(Debug, Clone)]
pub struct WorkerStatus {
    pub worker_type: String,
    pub registered: usize,
    pub active: usize,
    pub utilisation: f64,
    pub circuit_state: CircuitState,
}

pub struct WorkerPool {
    inner: Mutex<PoolInner>,
    condvar: Condvar,
    shutting_down: AtomicBool,
}

impl WorkerPool {
    pub fn new(global_cap: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(PoolInner {
                workers: HashMap::new(),
                global_active: 0,
                global_cap,
            }),
            condvar: Condvar::new(),
            shutting_down: AtomicBool::new(false),
        })
    }

    pub fn register_worker(
        &self,
        worker_type: &str,
        base_concurrency: usize,
        max_concurrency: usize,
        failure_threshold: u32,
        reset_timeout: Duration,
    ) {
        let mut inner = self.inner.lock();
        inner.workers.insert(
            worker_type.to_string(),
            WorkerState {
                base_concurrency,
                max_concurrency,
                active_jobs: 0,
                protective_mode: false,
                breaker: Breaker::new(failure_threshold, reset_timeout),
            },
        );
    }

    /// Non-blocking: fails with `CapacityExceeded` if saturated.
    pub fn request_slot(&self, worker_type: &str) -> Result<Slot, PoolError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(PoolError::ShuttingDown);
        }
        let mut inner = self.inner.lock();
        self.try_admit(&mut inner, worker_type)
    }

    /// Blocks with exponential backoff (100ms → 2s cap) until a slot
    /// frees up or `timeout` elapses.
    pub fn wait_for_slot(&self, worker_type: &str, timeout: Duration) -> Result<Slot, PoolError> {
        let deadline = Instant::now() + timeout;
        let mut backoff = BACKOFF_MIN;
        loop {
            if self.shutting_down.load(Ordering::SeqCst) {
                return Err(PoolError::ShuttingDown);
            }
            match self.request_slot(worker_type) {
                Ok(slot) => return Ok(slot),
                Err(PoolError::CapacityExceeded { .. }) => {
                    if Instant::now() >= deadline {
                        return Err(PoolError::SlotTimeout {
                            worker_type: worker_type.to_string(),
                            waited_ms: timeout.as_millis() as u64,
                        });
                    }
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    let wait = backoff.min(remaining);
                    let mut inner = self.inner.lock();
                    self.condvar.wait_for(&mut inner, wait);
                    backoff = (backoff * 2).min(BACKOFF_MAX);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn try_admit(&self, inner: &mut PoolInner, worker_type: &str) -> Result<Slot, PoolError> {
        let global_cap = inner.global_cap;
        let worker = inner
            .workers
            .get_mut(worker_type)
            .ok_or_else(|| PoolError::UnknownWorkerType(worker_type.to_string()))?;

        match worker.breaker.admit() {
            Admission::Reject => return Err(PoolError::CircuitOpen {
                worker_type: worker_type.to_string(),
            }),
            Admission::Allow | Admission::AllowTrial => {}
        }

        if inner.global_active >= global_cap {
            return Err(PoolError::CapacityExceeded {
                worker_type: worker_type.to_string(),
            });
        }
        let worker = inner.workers.get_mut(worker_type).expect("checked above");
        if worker.active_jobs >= worker.effective_concurrency() {
            return Err(PoolError::CapacityExceeded {
                worker_type: worker_type.to_string(),
            });
        }

        worker.active_jobs += 1;
        inner.global_active += 1;
        Ok(Slot {
            worker_type: worker_type.to_string(),
            released: false,
        })
    }

    pub fn release_slot(&self, mut slot: Slot, success: bool) {
        slot.released = true;
        let mut inner = self.inner.lock();
        inner.global_active = inner.global_active.saturating_sub(1);
        if let Some(worker) = inner.workers.get_mut(&slot.worker_type) {
            worker.active_jobs = worker.active_jobs.saturating_sub(1);
            if success {
                worker.breaker.record_success();
            } else {
                worker.breaker.record_failure();
            }
            let opened = worker.breaker.state() == CircuitState::Open;
            worker.protective_mode = opened;
        }
        drop(inner);
        self.condvar.notify_all();
    }

    /// Wraps `requestSlot`/`releaseSlot` and runs `operation` in a
    /// worker thread with a hard timeout, consulting the breaker first.
    pub fn execute_with_management<T, E, F>(
        &self,
        worker_type: &str,
        timeout: Duration,
        operation: F,
    ) -> Result<T, ManagedError<E>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let slot = self.request_slot(worker_type).map_err(ManagedError::Pool)?;
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = std::thread::spawn(move || {
            let result = operation();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(Ok(value)) => {
                self.release_slot(slot, true);
                let _ = handle.join();
                Ok(value)
            }
            Ok(Err(e)) => {
                tracing::warn!(worker_type, error = %e, "managed call failed");
                self.release_slot(slot, false);
                let _ = handle.join();
                Err(ManagedError::Operation(e))
            }
            Err(_) => {
                self.release_slot(slot, false);
                Err(ManagedError::Pool(PoolError::JobTimeout(timeout.as_millis() as u64)))
            }
        }
    }

    pub fn scale(&self, worker_type: &str, target: usize) -> Result<(), PoolError> {
        let mut inner = self.inner.lock();
        let worker = inner
            .workers
            .get_mut(worker_type)
            .ok_or_else(|| PoolError::UnknownWorkerType(worker_type.to_string()))?;
        worker.base_concurrency = target.min(worker.max_concurrency);
        Ok(())
    }

    pub fn status(&self) -> Vec<WorkerStatus> {
        let inner = self.inner.lock();
        inner
            .workers
            .iter()
            .map(|(name, w)| WorkerStatus {
                worker_type: name.clone(),
                registered: w.effective_concurrency(),
                active: w.active_jobs,
                utilisation: if w.effective_concurrency() == 0 {
                    0.0
                } else {
                    w.active_jobs as f64 / w.effective_concurrency() as f64
                },
                circuit_state: w.breaker.state(),
            })
            .collect()
    }

    /// Stop admitting new work. Callers should still drain active jobs
    /// themselves up to their own grace period.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.condvar.notify_all();
    }

    /// Background sweep (spec §4.2 "slot-leak recovery"): clamps any
    /// worker whose `active_jobs` exceeds its declared concurrency back
    /// down, and floors negative counters at zero. Intended to be run
    /// periodically on a dedicated thread (see [`Self::spawn_leak_sweeper`]).
    pub fn sweep_leaked_slots(&self) {
        let mut inner = self.inner.lock();
        for (name, worker) in inner.workers.iter_mut() {
            let cap = worker.max_concurrency;
            if worker.active_jobs > cap {
                tracing::warn!(worker_type = name, active = worker.active_jobs, cap, "slot leak detected, clamping");
                worker.active_jobs = cap;
            }
        }
    }

    pub fn spawn_leak_sweeper(self: &Arc<Self>) -> std::thread::JoinHandle<()> {
        let pool = Arc::clone(self);
        std::thread::Builder::new()
            .name("codegraph-pool-sweeper".to_string())
            .spawn(move || loop {
                std::thread::sleep(SLOT_LEAK_SWEEP_INTERVAL);
                if pool.shutting_down.load(Ordering::SeqCst) {
                    break;
                }
                pool.sweep_leaked_slots();
            })
            .expect("failed to spawn slot-leak sweeper")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denies_when_worker_saturated() {
        let pool = WorkerPool::new(10);
        pool.register_worker("llm", 1, 1, 3, Duration::from_secs(5));
        let slot = pool.request_slot("llm").unwrap();
        let err = pool.request_slot("llm").unwrap_err();
        assert!(matches!(err, PoolError::CapacityExceeded { .. }));
        pool.release_slot(slot, true);
        assert!(pool.request_slot("llm").is_ok());
    }

    #[test]
    fn global_cap_overrides_per_worker_budget() {
        let pool = WorkerPool::new(1);
        pool.register_worker("a", 5, 5, 3, Duration::from_secs(5));
        pool.register_worker("b", 5, 5, 3, Duration::from_secs(5));
        let _slot = pool.request_slot("a").unwrap();
        let err = pool.request_slot("b").unwrap_err();
        assert!(matches!(err, PoolError::CapacityExceeded { .. }));
    }

    #[test]
    fn breaker_opens_and_blocks_requests() {
        let pool = WorkerPool::new(10);
        pool.register_worker("llm", 5, 5, 2, Duration::from_secs(5));
        for _ in 0..2 {
            let slot = pool.request_slot("llm").unwrap();
            pool.release_slot(slot, false);
        }
        let err = pool.request_slot("llm").unwrap_err();
        assert!(matches!(err, PoolError::CircuitOpen { .. }));
    }

    #[test]
    fn sweep_clamps_leaked_counters() {
        let pool = WorkerPool::new(10);
        pool.register_worker("llm", 2, 2, 3, Duration::from_secs(5));
        {
            let mut inner = pool.inner.lock();
            inner.workers.get_mut("llm").unwrap().active_jobs = 9;
        }
        pool.sweep_leaked_slots();
        let status = pool.status();
        let llm = status.iter().find(|s| s.worker_type == "llm").unwrap();
        assert_eq!(llm.active, 2);
    }

    #[test]
    fn execute_with_management_runs_and_releases() {
        let pool = WorkerPool::new(10);
        pool.register_worker("llm", 2, 2, 3, Duration::from_secs(5));
        let result: Result<i32, ManagedError<String>> =
            pool.execute_with_management("llm", Duration::from_secs(1), || Ok::<i32, String>(42));
        assert_eq!(result.unwrap(), 42);
        let status = pool.status();
        assert_eq!(status.iter().find(|s| s.worker_type == "llm").unwrap().active, 0);
    }
}
