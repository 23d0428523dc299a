//! # codegraph-queue
//!
//! Abstract named work-queues delivering job payloads to workers with
//! at-least-once semantics (spec §6 "Queue contract"). The core depends
//! only on the trait below; this crate also ships an in-process
//! reference implementation over `crossbeam-channel` — the Redis/queue
//! vendor specifics a production deployment would use are out of scope.

use std::collections::HashMap;

use codegraph_core::constants::NAMED_QUEUES;
use codegraph_core::errors::QueueError;
use serde_json::Value;

/// A unit of work delivered to a consumer.
#[derive(Debug, Clone)]
pub struct Job {
    pub queue: String,
    pub job_type: String,
    pub payload: Value,
}

/// The abstract queue contract C3 exposes to the rest of the core.
/// Implementations only need to guarantee at-least-once delivery per
/// named queue; consumers are expected to be idempotent.
pub trait QueueBackend: Send + Sync {
    fn enqueue(&self, queue_name: &str, job_type: &str, payload: Value) -> Result<(), QueueError>;

    /// Register a handler that runs on a dedicated thread for every job
    /// delivered to `queue_name`, until the queue is dropped.
    fn consume(
        &self,
        queue_name: &str,
        handler: Box<dyn Fn(Job) + Send + Sync>,
    ) -> Result<(), QueueError>;
}

/// In-process reference implementation: one bounded channel per named
/// queue. Durable only for the lifetime of the process — real
/// deployments plug in a vendor-backed `QueueBackend` instead.
pub struct InMemoryQueue {
    channels: HashMap<String, (crossbeam_channel::Sender<Job>, crossbeam_channel::Receiver<Job>)>,
}

const CHANNEL_BOUND: usize = 4096;

impl Default for InMemoryQueue {
    fn default() -> Self {
        let mut channels = HashMap::new();
        for name in NAMED_QUEUES {
            channels.insert(name.to_string(), crossbeam_channel::bounded(CHANNEL_BOUND));
        }
        Self { channels }
    }
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current depth of a named queue. Used for tests and queue-depth
    /// observability; unknown queue names read as empty rather than erroring.
    pub fn len(&self, queue_name: &str) -> usize {
        self.channels.get(queue_name).map(|(_, rx)| rx.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, queue_name: &str) -> bool {
        self.len(queue_name) == 0
    }
}

impl QueueBackend for InMemoryQueue {
    fn enqueue(&self, queue_name: &str, job_type: &str, payload: Value) -> Result<(), QueueError> {
        let (tx, _) = self.channels.get(queue_name).ok_or_else(|| QueueError::UnknownQueue(queue_name.to_string()))?;
        tx.send(Job {
            queue: queue_name.to_string(),
            job_type: job_type.to_string(),
            payload,
        })
        .map_err(|e| QueueError::EnqueueFailed {
            queue: queue_name.to_string(),
            reason: e.to_string(),
        })
    }

    fn consume(&self, queue_name: &str, handler: Box<dyn Fn(Job) + Send + Sync>) -> Result<(), QueueError> {
        let (_, rx) = self
            .channels
            .get(queue_name)
            .ok_or_else(|| QueueError::UnknownQueue(queue_name.to_string()))?
            .clone();
        std::thread::Builder::new()
            .name(format!("codegraph-queue-{queue_name}"))
            .spawn(move || {
                for job in rx.iter() {
                    handler(job);
                }
            })
            .map_err(|e| QueueError::ConsumeFailed {
                queue: queue_name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn delivers_enqueued_jobs_to_consumer() {
        let queue = InMemoryQueue::new();
        let received = Arc::new(AtomicUsize::new(0));
        let counter = received.clone();
        queue
            .consume(
                "validation",
                Box::new(move |_job| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        for _ in 0..5 {
            queue.enqueue("validation", "validate-relationship", serde_json::json!({})).unwrap();
        }
        for _ in 0..100 {
            if received.load(Ordering::SeqCst) == 5 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(received.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn reports_queue_depth() {
        let queue = InMemoryQueue::new();
        assert!(queue.is_empty("relationship-resolution"));
        queue.enqueue("relationship-resolution", "resolve-relationships", serde_json::json!({})).unwrap();
        queue.enqueue("relationship-resolution", "resolve-relationships", serde_json::json!({})).unwrap();
        assert_eq!(queue.len("relationship-resolution"), 2);
    }

    #[test]
    fn rejects_unknown_queue() {
        let queue = InMemoryQueue::new();
        let err = queue.enqueue("not-a-real-queue", "x", serde_json::json!({})).unwrap_err();
        assert!(matches!(err, QueueError::UnknownQueue(_)));
    }
}
