//! Defaults named throughout spec.md, centralized so every crate
//! references one source of truth instead of repeating magic numbers.

use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

pub const DEFAULT_GLOBAL_CONCURRENCY_CAP: usize = 100;
pub const PROTECTIVE_MODE_FACTOR: f64 = 0.5;
pub const SLOT_LEAK_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_SLOT_WAIT_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);
pub const BACKOFF_MIN: Duration = Duration::from_millis(100);
pub const BACKOFF_MAX: Duration = Duration::from_secs(2);

pub const RESET_TIMEOUT_STATEFUL: Duration = Duration::from_secs(10);
pub const RESET_TIMEOUT_API: Duration = Duration::from_secs(5);
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_POLL_BATCH: usize = 100;

pub const CONFIDENCE_WEIGHT_SYNTACTIC: f64 = 0.3;
pub const CONFIDENCE_WEIGHT_SEMANTIC: f64 = 0.3;
pub const CONFIDENCE_WEIGHT_CONTEXT: f64 = 0.2;
pub const CONFIDENCE_WEIGHT_CROSS_REFERENCE: f64 = 0.2;

pub const CONFIDENCE_THRESHOLD_HIGH: f64 = 0.85;
pub const CONFIDENCE_THRESHOLD_MEDIUM: f64 = 0.65;
pub const CONFIDENCE_THRESHOLD_LOW: f64 = 0.45;
pub const CONFIDENCE_THRESHOLD_ESCALATION: f64 = 0.5;
pub const PER_FACTOR_FLOOR: f64 = 0.3;

pub const ENHANCEMENT_INDIVIDUAL_THRESHOLD: f64 = 0.70;
pub const ENHANCEMENT_CONFIDENCE_THRESHOLD: f64 = 0.50;

pub const TRIANGULATION_PRIORITY_URGENT_CEIL: f64 = 0.2;
pub const TRIANGULATION_PRIORITY_HIGH_CEIL: f64 = 0.35;

pub const LLM_CALL_TIMEOUT: Duration = Duration::from_secs(150);

pub const QUEUE_RELATIONSHIP_RESOLUTION: &str = "relationship-resolution";
pub const QUEUE_VALIDATION: &str = "validation";
pub const QUEUE_GLOBAL_RELATIONSHIP_ANALYSIS: &str = "global-relationship-analysis";
pub const QUEUE_TRIANGULATED_ANALYSIS: &str = "triangulated-analysis";
pub const QUEUE_FAILED_JOBS: &str = "failed-jobs";

pub const NAMED_QUEUES: &[&str] = &[
    QUEUE_RELATIONSHIP_RESOLUTION,
    QUEUE_VALIDATION,
    QUEUE_GLOBAL_RELATIONSHIP_ANALYSIS,
    QUEUE_TRIANGULATED_ANALYSIS,
    QUEUE_FAILED_JOBS,
];
