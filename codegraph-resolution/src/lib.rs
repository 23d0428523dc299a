//! # codegraph-resolution
//!
//! Orchestration aspects of the Relationship Resolution Worker (C8,
//! spec §4.7): confidence scoring, the enhanced re-prompt loop, and
//! escalation-trigger evaluation on parsed LLM output. The worker's
//! *code extraction* and the LLM transport itself are out of scope —
//! callers provide the parsed relationships and an `enhance` callback
//! that performs the actual re-prompt through their own LLM client.

use codegraph_confidence::{score, Breakdown, ConfidenceLevel, EvidenceItem, Factor, ScoreResult};
use codegraph_core::config::{ConfidenceConfig, EnhancementConfig};
use codegraph_core::constants::{LLM_CALL_TIMEOUT, PER_FACTOR_FLOOR};
use codegraph_core::errors::ValidationError;
use codegraph_pool::{ManagedError, WorkerPool};

pub use codegraph_confidence::EvidenceItem as Evidence;

const WORKER_TYPE: &str = "relationship-resolution";

#[derive(Debug, Clone)]
pub struct ParsedRelationship {
    pub from: String,
    pub to: String,
    pub relationship_type: String,
    pub reason: Option<String>,
    pub confidence: Option<f64>,
}

/// Heuristic contextual signal available without an LLM round trip:
/// whether the two semantic ids share a domain prefix, and whether both
/// endpoints resolve to the same entity class (spec §4.7 step 2).
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextHint {
    pub same_domain_prefix: bool,
    pub same_entity_class: bool,
}

/// Build the initial evidence set from the LLM's own output and the
/// heuristic context signal.
pub fn build_evidence(parsed: &ParsedRelationship, ctx: ContextHint) -> Vec<EvidenceItem> {
    vec![
        EvidenceItem {
            factor: Factor::Syntactic,
            value: parsed.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
        },
        EvidenceItem {
            factor: Factor::Semantic,
            value: if parsed.reason.as_ref().is_some_and(|r| !r.trim().is_empty()) {
                0.7
            } else {
                0.3
            },
        },
        EvidenceItem {
            factor: Factor::Context,
            value: if ctx.same_domain_prefix { 0.8 } else { 0.4 },
        },
        EvidenceItem {
            factor: Factor::CrossReference,
            value: if ctx.same_entity_class { 0.6 } else { 0.4 },
        },
    ]
}

#[derive(Debug, Clone)]
pub struct Finding {
    pub from: String,
    pub to: String,
    pub relationship_type: String,
    pub reason: Option<String>,
    pub confidence: f64,
    pub escalate: bool,
}

#[derive(Debug)]
pub enum Decision {
    Emit { finding: Finding, score: ScoreResult },
    Drop { reason: String, score: ScoreResult },
}

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("enhanced re-prompt failed: {0}")]
    EnhancePoolError(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Run the full C8 orchestration for one parsed relationship: score,
/// optionally enhance once, then decide emit vs. drop.
///
/// `enhance` performs the actual re-prompt (an LLM call) targeted at
/// `breakdown.lowest_factor()` and returns the additional evidence it
/// gathered; it is only invoked when the score falls in the
/// enhancement band and is never retried.
pub fn resolve<F>(
    pool: &WorkerPool,
    parsed: &ParsedRelationship,
    mut evidence: Vec<EvidenceItem>,
    confidence: &ConfidenceConfig,
    enhancement: &EnhancementConfig,
    enhance: F,
) -> Result<Decision, ResolutionError>
where
    F: FnOnce(Factor) -> Result<Vec<EvidenceItem>, String> + Send + 'static,
{
    if parsed.from.trim().is_empty() || parsed.to.trim().is_empty() {
        return Err(ValidationError::MissingField { field: "from/to" }.into());
    }

    let per_factor_floor = confidence.per_factor_floor.unwrap_or(PER_FACTOR_FLOOR);
    let mut result = score(&evidence, &confidence.weights, &confidence.thresholds, per_factor_floor);

    if result.final_score < enhancement.individual_threshold && result.final_score >= enhancement.confidence_threshold {
        let focus = result.breakdown.lowest_factor();
        let outcome: Result<Vec<EvidenceItem>, ResolutionError> = pool
            .execute_with_management(WORKER_TYPE, LLM_CALL_TIMEOUT, move || enhance(focus))
            .map_err(|e: ManagedError<String>| ResolutionError::EnhancePoolError(e.to_string()));
        match outcome {
            Ok(additional) => {
                evidence.extend(additional);
                result = score(&evidence, &confidence.weights, &confidence.thresholds, per_factor_floor);
            }
            Err(e) => {
                tracing::warn!(error = %e, "enhanced re-prompt failed, keeping original score");
            }
        }
    }

    let (relationship_type, clamped_confidence) = codegraph_core::model::Relationship::normalize(
        &parsed.relationship_type,
        Some(result.final_score),
    );

    if result.final_score >= enhancement.confidence_threshold {
        Ok(Decision::Emit {
            finding: Finding {
                from: parsed.from.clone(),
                to: parsed.to.clone(),
                relationship_type,
                reason: parsed.reason.clone(),
                confidence: clamped_confidence,
                escalate: result.escalate,
            },
            score: result,
        })
    } else {
        Ok(Decision::Drop {
            reason: format!(
                "confidence {:.3} below threshold {:.3}",
                result.final_score, enhancement.confidence_threshold
            ),
            score: result,
        })
    }
}

pub fn level_label(level: ConfidenceLevel) -> &'static str {
    match level {
        ConfidenceLevel::High => "HIGH",
        ConfidenceLevel::Medium => "MEDIUM",
        ConfidenceLevel::Low => "LOW",
        ConfidenceLevel::VeryLow => "VERY_LOW",
    }
}

pub fn breakdown_lowest(breakdown: &Breakdown) -> Factor {
    breakdown.lowest_factor()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(confidence: Option<f64>) -> ParsedRelationship {
        ParsedRelationship {
            from: "auth_func_validate".into(),
            to: "auth_var_db_url".into(),
            relationship_type: "reads".into(),
            reason: Some("queries the connection string".into()),
            confidence,
        }
    }

    #[test]
    fn high_confidence_emits_without_enhancement() {
        let pool = WorkerPool::new(10);
        pool.register_worker(WORKER_TYPE, 2, 2, 3, std::time::Duration::from_secs(5));
        let evidence = build_evidence(&parsed(Some(0.95)), ContextHint { same_domain_prefix: true, same_entity_class: true });
        let decision = resolve(
            &pool,
            &parsed(Some(0.95)),
            evidence,
            &ConfidenceConfig::default(),
            &EnhancementConfig::default(),
            |_| Ok(vec![]),
        )
        .unwrap();
        assert!(matches!(decision, Decision::Emit { .. }));
    }

    #[test]
    fn mid_band_invokes_enhancement_exactly_once() {
        let pool = WorkerPool::new(10);
        pool.register_worker(WORKER_TYPE, 2, 2, 3, std::time::Duration::from_secs(5));
        let evidence = build_evidence(&parsed(Some(0.5)), ContextHint { same_domain_prefix: false, same_entity_class: false });
        let decision = resolve(
            &pool,
            &parsed(Some(0.5)),
            evidence,
            &ConfidenceConfig::default(),
            &EnhancementConfig::default(),
            |focus| Ok(vec![EvidenceItem { factor: focus, value: 0.95 }]),
        )
        .unwrap();
        match decision {
            Decision::Emit { score, .. } => assert!(score.final_score > 0.0),
            Decision::Drop { score, .. } => assert!(score.final_score >= 0.0),
        }
    }

    #[test]
    fn very_low_confidence_drops() {
        let pool = WorkerPool::new(10);
        pool.register_worker(WORKER_TYPE, 2, 2, 3, std::time::Duration::from_secs(5));
        let evidence = vec![
            EvidenceItem { factor: Factor::Syntactic, value: 0.05 },
            EvidenceItem { factor: Factor::Semantic, value: 0.05 },
        ];
        let decision = resolve(
            &pool,
            &parsed(Some(0.05)),
            evidence,
            &ConfidenceConfig::default(),
            &EnhancementConfig::default(),
            |_| Ok(vec![]),
        )
        .unwrap();
        assert!(matches!(decision, Decision::Drop { .. }));
    }

    #[test]
    fn rejects_empty_endpoints() {
        let pool = WorkerPool::new(10);
        pool.register_worker(WORKER_TYPE, 2, 2, 3, std::time::Duration::from_secs(5));
        let mut bad = parsed(Some(0.9));
        bad.from = "".into();
        let err = resolve(
            &pool,
            &bad,
            vec![],
            &ConfidenceConfig::default(),
            &EnhancementConfig::default(),
            |_| Ok(vec![]),
        )
        .unwrap_err();
        assert!(matches!(err, ResolutionError::Validation(_)));
    }
}
