//! # codegraph-confidence
//!
//! Confidence Scorer (C5, spec §4.3): a pure, deterministic function
//! mapping a relationship plus its evidence items to a score, a coarse
//! level, and an escalation flag. Never touches the store — all inputs
//! are explicit data, so the same call always produces the same result.

use codegraph_core::config::{ConfidenceThresholds, ConfidenceWeights};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Factor {
    Syntactic,
    Semantic,
    Context,
    CrossReference,
}

impl Factor {
    pub const ALL: [Factor; 4] = [Factor::Syntactic, Factor::Semantic, Factor::Context, Factor::CrossReference];
}

/// A single piece of evidence for one factor, in `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct EvidenceItem {
    pub factor: Factor,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    VeryLow,
}

/// Average evidence value actually observed per factor (an absent
/// factor contributes 0.0 — no evidence is the weakest evidence).
#[derive(Debug, Clone, Copy)]
pub struct Breakdown {
    pub syntactic: f64,
    pub semantic: f64,
    pub context: f64,
    pub cross_reference: f64,
}

impl Breakdown {
    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::Syntactic => self.syntactic,
            Factor::Semantic => self.semantic,
            Factor::Context => self.context,
            Factor::CrossReference => self.cross_reference,
        }
    }

    /// The weakest factor, used to pick the enhanced re-prompt's focus
    /// area (spec §4.3 "re-usable for enhanced-prompt focus-area selection").
    pub fn lowest_factor(&self) -> Factor {
        Factor::ALL
            .into_iter()
            .min_by(|a, b| self.get(*a).partial_cmp(&self.get(*b)).unwrap())
            .expect("ALL is non-empty")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreResult {
    pub final_score: f64,
    pub level: ConfidenceLevel,
    pub breakdown: Breakdown,
    pub escalate: bool,
}

fn average(items: &[EvidenceItem], factor: Factor) -> f64 {
    let matching: Vec<f64> = items.iter().filter(|i| i.factor == factor).map(|i| i.value).collect();
    if matching.is_empty() {
        0.0
    } else {
        matching.iter().sum::<f64>() / matching.len() as f64
    }
}

/// `score(relationship, evidenceItems) → { final, level, breakdown, escalate }`.
pub fn score(
    evidence_items: &[EvidenceItem],
    weights: &ConfidenceWeights,
    thresholds: &ConfidenceThresholds,
    per_factor_floor: f64,
) -> ScoreResult {
    let breakdown = Breakdown {
        syntactic: average(evidence_items, Factor::Syntactic),
        semantic: average(evidence_items, Factor::Semantic),
        context: average(evidence_items, Factor::Context),
        cross_reference: average(evidence_items, Factor::CrossReference),
    };

    let final_score = (weights.syntactic * breakdown.syntactic
        + weights.semantic * breakdown.semantic
        + weights.context * breakdown.context
        + weights.cross_reference * breakdown.cross_reference)
        .clamp(0.0, 1.0);

    let level = if final_score >= thresholds.high {
        ConfidenceLevel::High
    } else if final_score >= thresholds.medium {
        ConfidenceLevel::Medium
    } else if final_score >= thresholds.low {
        ConfidenceLevel::Low
    } else {
        ConfidenceLevel::VeryLow
    };

    let any_factor_below_floor = Factor::ALL.into_iter().any(|f| breakdown.get(f) < per_factor_floor);
    let escalate = any_factor_below_floor || final_score < thresholds.escalation;

    ScoreResult {
        final_score,
        level,
        breakdown,
        escalate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(syntactic: f64, semantic: f64, context: f64, cross_reference: f64) -> Vec<EvidenceItem> {
        vec![
            EvidenceItem { factor: Factor::Syntactic, value: syntactic },
            EvidenceItem { factor: Factor::Semantic, value: semantic },
            EvidenceItem { factor: Factor::Context, value: context },
            EvidenceItem { factor: Factor::CrossReference, value: cross_reference },
        ]
    }

    #[test]
    fn high_evidence_scores_high_and_does_not_escalate() {
        let result = score(
            &items(0.95, 0.9, 0.9, 0.9),
            &ConfidenceWeights::default(),
            &ConfidenceThresholds::default(),
            0.3,
        );
        assert_eq!(result.level, ConfidenceLevel::High);
        assert!(!result.escalate);
    }

    #[test]
    fn low_evidence_escalates() {
        let result = score(
            &items(0.2, 0.2, 0.2, 0.2),
            &ConfidenceWeights::default(),
            &ConfidenceThresholds::default(),
            0.3,
        );
        assert!(result.escalate);
        assert_eq!(result.level, ConfidenceLevel::VeryLow);
    }

    #[test]
    fn single_weak_factor_triggers_escalation_even_with_high_final() {
        // cross_reference far below the floor, but weighted enough that
        // the composite still clears the escalation threshold.
        let result = score(
            &items(0.95, 0.95, 0.95, 0.05),
            &ConfidenceWeights::default(),
            &ConfidenceThresholds::default(),
            0.3,
        );
        assert!(result.final_score >= ConfidenceThresholds::default().escalation);
        assert!(result.escalate);
    }

    #[test]
    fn missing_factor_counts_as_zero_evidence() {
        let only_syntactic = vec![EvidenceItem { factor: Factor::Syntactic, value: 1.0 }];
        let result = score(
            &only_syntactic,
            &ConfidenceWeights::default(),
            &ConfidenceThresholds::default(),
            0.3,
        );
        assert_eq!(result.breakdown.semantic, 0.0);
        assert_eq!(result.breakdown.lowest_factor(), Factor::Semantic);
    }

    proptest::proptest! {
        #[test]
        fn final_score_always_clamped(a in 0.0f64..2.0, b in -1.0f64..2.0, c in 0.0f64..2.0, d in -1.0f64..2.0) {
            let result = score(&items(a, b, c, d), &ConfidenceWeights::default(), &ConfidenceThresholds::default(), 0.3);
            proptest::prop_assert!(result.final_score >= 0.0 && result.final_score <= 1.0);
        }
    }
}
