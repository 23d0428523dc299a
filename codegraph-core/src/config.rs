//! Configuration surface enumerated in spec §6, composed into one
//! [`PipelineConfig`]. Modeled on the teacher's per-subsystem config
//! structs: every field is `Option`, so callers can tell "unset" from
//! "explicitly set to the default"; `effective_*()` accessors supply the
//! defaults from [`crate::constants`].

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::errors::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutboxConfig {
    pub polling_interval_ms: Option<u64>,
    pub poll_batch_size: Option<usize>,
}

impl OutboxConfig {
    pub fn effective_polling_interval(&self) -> std::time::Duration {
        self.polling_interval_ms
            .map(std::time::Duration::from_millis)
            .unwrap_or(DEFAULT_POLLING_INTERVAL)
    }

    pub fn effective_poll_batch_size(&self) -> usize {
        self.poll_batch_size.unwrap_or(DEFAULT_POLL_BATCH)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WriterConfig {
    pub batch_size: Option<usize>,
    pub flush_interval_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

impl WriterConfig {
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    pub fn effective_flush_interval(&self) -> std::time::Duration {
        self.flush_interval_ms
            .map(std::time::Duration::from_millis)
            .unwrap_or(DEFAULT_FLUSH_INTERVAL)
    }

    pub fn effective_max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn effective_retry_delay(&self) -> std::time::Duration {
        self.retry_delay_ms
            .map(std::time::Duration::from_millis)
            .unwrap_or(DEFAULT_RETRY_DELAY)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    pub base_concurrency: usize,
    pub max_concurrency: usize,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub job_timeout_ms: u64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            base_concurrency: 5,
            max_concurrency: 20,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout_ms: RESET_TIMEOUT_API.as_millis() as u64,
            job_timeout_ms: LLM_CALL_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PoolConfig {
    pub global_concurrency_cap: Option<usize>,
    pub workers: HashMap<String, WorkerPoolConfig>,
}

impl PoolConfig {
    pub fn effective_global_cap(&self) -> usize {
        self.global_concurrency_cap
            .unwrap_or(DEFAULT_GLOBAL_CONCURRENCY_CAP)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub syntactic: f64,
    pub semantic: f64,
    pub context: f64,
    pub cross_reference: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            syntactic: CONFIDENCE_WEIGHT_SYNTACTIC,
            semantic: CONFIDENCE_WEIGHT_SEMANTIC,
            context: CONFIDENCE_WEIGHT_CONTEXT,
            cross_reference: CONFIDENCE_WEIGHT_CROSS_REFERENCE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
    pub escalation: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: CONFIDENCE_THRESHOLD_HIGH,
            medium: CONFIDENCE_THRESHOLD_MEDIUM,
            low: CONFIDENCE_THRESHOLD_LOW,
            escalation: CONFIDENCE_THRESHOLD_ESCALATION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub weights: ConfidenceWeights,
    pub thresholds: ConfidenceThresholds,
    pub per_factor_floor: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    pub individual_threshold: f64,
    pub confidence_threshold: f64,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            individual_threshold: ENHANCEMENT_INDIVIDUAL_THRESHOLD,
            confidence_threshold: ENHANCEMENT_CONFIDENCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TriangulationConfig {
    pub enabled: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

impl TriangulationConfig {
    pub fn effective_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// The full configuration surface enumerated in spec §6.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub outbox: OutboxConfig,
    pub writer: WriterConfig,
    pub pool: PoolConfig,
    pub confidence: ConfidenceConfig,
    pub enhancement: EnhancementConfig,
    pub triangulation: TriangulationConfig,
}

impl PipelineConfig {
    /// Load from an optional TOML file, falling back to defaults for
    /// anything unset. Environment variables are not read here; the
    /// caller composes them in before calling `load` if needed, the way
    /// `ferrex-config`-style loaders layer file < env < explicit override.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| CoreError::Config(format!("parsing {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.writer.effective_batch_size(), DEFAULT_BATCH_SIZE);
        assert_eq!(cfg.pool.effective_global_cap(), DEFAULT_GLOBAL_CONCURRENCY_CAP);
        assert_eq!(cfg.confidence.thresholds.high, CONFIDENCE_THRESHOLD_HIGH);
    }

    #[test]
    fn loads_partial_toml_over_defaults() {
        let dir = tempfile_dir();
        let path = dir.join("pipeline.toml");
        std::fs::write(&path, "[writer]\nbatch_size = 50\n").unwrap();
        let cfg = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.writer.effective_batch_size(), 50);
        assert_eq!(cfg.writer.effective_max_retries(), DEFAULT_MAX_RETRIES);
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("codegraph-core-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
