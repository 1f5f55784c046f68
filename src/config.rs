//! Pipeline configuration surface.
//!
//! Everything a caller can tune: semantic augmentation on/off, extraction
//! concurrency, the per-call semantic timeout, the essential-capability
//! baseline, and the severity threshold tables. All fields have defaults so
//! a bare `AnalysisConfig::default()` runs the documented behavior.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::CapabilityKind;

/// Per-kind set of capabilities considered minimally necessary for a region.
///
/// A region missing items from this baseline is a desert candidate.
/// `BTreeSet` keeps iteration order deterministic, which the idempotence
/// guarantee of the rule-only pipeline depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EssentialBaseline {
    pub procedures: BTreeSet<String>,
    pub equipment: BTreeSet<String>,
    pub specialties: BTreeSet<String>,
}

impl EssentialBaseline {
    pub fn names_of_kind(&self, kind: CapabilityKind) -> &BTreeSet<String> {
        match kind {
            CapabilityKind::Procedure => &self.procedures,
            CapabilityKind::Equipment => &self.equipment,
            CapabilityKind::Specialty => &self.specialties,
        }
    }

    pub fn len(&self) -> usize {
        self.procedures.len() + self.equipment.len() + self.specialties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Baseline for the default medical vocabulary: the capabilities a
    /// region needs for basic emergency, maternal, and diagnostic care.
    pub fn default_medical() -> Self {
        let set = |names: &[&str]| names.iter().map(|n| n.to_string()).collect();
        Self {
            procedures: set(&["Cesarean Section", "Fracture Management", "Trauma Surgery"]),
            equipment: set(&[
                "X-Ray",
                "Ultrasound",
                "Blood Bank",
                "Operating Theater",
                "ICU",
            ]),
            specialties: set(&["Obstetrics", "Pediatrics", "Emergency Medicine"]),
        }
    }
}

impl Default for EssentialBaseline {
    fn default() -> Self {
        Self::default_medical()
    }
}

/// Severity threshold tables.
///
/// Two tables exist because severity is stated two ways upstream: a
/// missing-essential count (authoritative for desert classification) and a
/// 0–100 risk-score banding (used for summary wording). Both are kept
/// configurable; classification always uses the missing-count table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityThresholds {
    /// Missing-essential counts: critical at ≥5, severe at 3–4, moderate at 1–2.
    pub critical_missing: usize,
    pub severe_missing: usize,
    pub moderate_missing: usize,

    /// Risk-score bands for summary wording: critical ≥75, high ≥60, moderate ≥40.
    pub score_critical: f32,
    pub score_high: f32,
    pub score_moderate: f32,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            critical_missing: 5,
            severe_missing: 3,
            moderate_missing: 1,
            score_critical: 75.0,
            score_high: 60.0,
            score_moderate: 40.0,
        }
    }
}

/// Top-level configuration for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// When false, the pipeline runs rule-only and marks the run degraded.
    pub enable_semantic_augmentation: bool,
    /// Upper bound on concurrent per-facility extraction workers.
    pub concurrency_limit: usize,
    /// Per-call timeout for the external semantic extraction service.
    pub semantic_timeout_ms: u64,
    pub essential_baseline: EssentialBaseline,
    pub severity_thresholds: SeverityThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enable_semantic_augmentation: true,
            concurrency_limit: 4,
            semantic_timeout_ms: 10_000,
            essential_baseline: EssentialBaseline::default(),
            severity_thresholds: SeverityThresholds::default(),
        }
    }
}
