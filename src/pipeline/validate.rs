//! Cross-validation of a facility's merged candidate list.
//!
//! A fixed set of consistency rules, each independent and order-insensitive.
//! This step is pure: the same candidates and structured fields always yield
//! the same anomalies — no randomness, no external calls.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{
    Anomaly, AnomalySeverity, CapabilityKind, FacilityRecord, OperationalStatus,
    ValidatedCapability,
};

use super::merge::MergedCandidate;

/// Procedures that require supporting equipment, with their dependency sets.
/// A claim passes when at least one item from its set is present.
const PROCEDURE_DEPENDENCIES: &[(&str, &[&str])] = &[
    (
        "Cardiac Surgery",
        &["CT Scanner", "MRI Scanner", "Catheterization Lab", "ICU"],
    ),
    ("Neurosurgery", &["CT Scanner", "MRI Scanner", "ICU"]),
    ("Transplantation", &["ICU", "Blood Bank", "Laboratory"]),
    ("Joint Replacement", &["X-Ray", "Operating Theater"]),
    ("Cesarean Section", &["Operating Theater", "Blood Bank"]),
    ("Trauma Surgery", &["X-Ray", "Operating Theater", "Blood Bank"]),
    ("Cataract Surgery", &["Operating Theater"]),
    ("Chemotherapy", &["Laboratory"]),
];

/// Specialty → staff-role stems used to check staff notes for explicit
/// absence ("no cardiologist on staff").
const SPECIALTY_ROLES: &[(&str, &[&str])] = &[
    ("Cardiology", &["cardiolog"]),
    ("Neurology", &["neurolog"]),
    ("Orthopedics", &["orthoped", "orthopaed"]),
    ("Obstetrics", &["obstetric", "midwi"]),
    ("Gynecology", &["gynecolog", "gynaecolog"]),
    ("Pediatrics", &["pediatric", "paediatric"]),
    ("Oncology", &["oncolog"]),
    ("Nephrology", &["nephrolog"]),
    ("Emergency Medicine", &["emergency"]),
    ("Ophthalmology", &["ophthalmolog"]),
    ("General Surgery", &["surgeon"]),
];

/// "no X on (permanent) staff" phrases in staff notes.
static NO_STAFF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"no\s+([a-z][a-z /-]*?)s?\s+on\s+(?:permanent\s+)?staff").unwrap()
});

/// Result of cross-validating one facility.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub capabilities: Vec<ValidatedCapability>,
    pub anomalies: Vec<Anomaly>,
}

/// Apply the consistency rules to a facility's merged candidates.
///
/// Rules:
/// 1. A procedure with a dependency set needs at least one supporting
///    equipment item present → otherwise `Suspicious`, claim invalid.
/// 2. If every present supporting item is broken → `Contradictory`,
///    claim invalid.
/// 3. A specialty whose staff notes explicitly report no matching role →
///    `Unverifiable` (the claim itself stays valid — it cannot be checked).
///
/// A single candidate may trigger multiple anomalies.
pub fn cross_validate(facility: &FacilityRecord, merged: &[MergedCandidate]) -> ValidationOutcome {
    let mut anomalies: Vec<Anomaly> = Vec::new();
    let mut capabilities: Vec<ValidatedCapability> = Vec::new();

    let absent_roles = parse_absent_roles(&facility.staff_notes);

    for item in merged {
        let cand = &item.primary;
        let mut valid = true;
        let mut anomaly_index = None;

        match cand.kind {
            CapabilityKind::Procedure => {
                if let Some(dependencies) = dependency_set(&cand.name) {
                    let support: Vec<&MergedCandidate> = merged
                        .iter()
                        .filter(|m| {
                            m.primary.kind == CapabilityKind::Equipment
                                && dependencies
                                    .iter()
                                    .any(|d| d.eq_ignore_ascii_case(&m.primary.name))
                        })
                        .collect();

                    if support.is_empty() {
                        valid = false;
                        anomaly_index = Some(anomalies.len());
                        anomalies.push(Anomaly {
                            facility_id: facility.facility_id.clone(),
                            claim: cand.name.clone(),
                            missing_evidence: format!(
                                "no supporting equipment ({})",
                                dependencies.join(", ")
                            ),
                            severity: AnomalySeverity::Suspicious,
                            citation: cand.citation.clone(),
                        });
                    } else if support
                        .iter()
                        .all(|m| m.primary.status == OperationalStatus::Broken)
                    {
                        valid = false;
                        anomaly_index = Some(anomalies.len());
                        let broken: Vec<&str> = support
                            .iter()
                            .map(|m| m.primary.name.as_str())
                            .collect();
                        anomalies.push(Anomaly {
                            facility_id: facility.facility_id.clone(),
                            claim: cand.name.clone(),
                            missing_evidence: format!(
                                "sole supporting equipment reported broken ({})",
                                broken.join(", ")
                            ),
                            severity: AnomalySeverity::Contradictory,
                            citation: cand.citation.clone(),
                        });
                    }
                }
            }
            CapabilityKind::Specialty => {
                if let Some(stems) = role_stems(&cand.name) {
                    let role_absent = absent_roles
                        .iter()
                        .any(|role| stems.iter().any(|stem| role.contains(stem)));
                    if role_absent {
                        anomaly_index = Some(anomalies.len());
                        anomalies.push(Anomaly {
                            facility_id: facility.facility_id.clone(),
                            claim: cand.name.clone(),
                            missing_evidence: "staff notes report no matching staff role".into(),
                            severity: AnomalySeverity::Unverifiable,
                            citation: cand.citation.clone(),
                        });
                    }
                }
            }
            CapabilityKind::Equipment => {}
        }

        capabilities.push(ValidatedCapability {
            kind: cand.kind,
            name: cand.name.clone(),
            quantity: cand.quantity,
            status: cand.status,
            confidence: cand.confidence,
            source: cand.source,
            valid,
            anomaly: anomaly_index,
            citations: item.citations.clone(),
        });
    }

    ValidationOutcome {
        capabilities,
        anomalies,
    }
}

fn dependency_set(procedure: &str) -> Option<&'static [&'static str]> {
    PROCEDURE_DEPENDENCIES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(procedure))
        .map(|(_, deps)| *deps)
}

fn role_stems(specialty: &str) -> Option<&'static [&'static str]> {
    SPECIALTY_ROLES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(specialty))
        .map(|(_, stems)| *stems)
}

/// Roles the staff notes explicitly say are absent.
fn parse_absent_roles(staff_notes: &str) -> Vec<String> {
    if staff_notes.trim().is_empty() {
        return Vec::new();
    }
    let lower = staff_notes.to_ascii_lowercase();
    NO_STAFF_RE
        .captures_iter(&lower)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}
