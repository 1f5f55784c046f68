//! Per-facility extraction unit: vocabulary matching over each free-text
//! field, optional semantic augmentation, merging, and cross-validation.
//!
//! Each facility is processed independently — a semantic failure here
//! degrades this facility to rule-only candidates without touching
//! siblings, and a malformed record is isolated by the runner.

use crate::models::{
    Anomaly, AnomalySeverity, CandidateSource, CapabilityCandidate, CapabilityKind, Citation,
    FacilityRecord, InputError, SourceField, ValidatedCapability,
};
use crate::vocabulary::{CitationContext, Vocabulary, VocabularyMatcher};

use super::merge::merge_candidates;
use super::semantic::SemanticExtractor;
use super::validate::cross_validate;

/// Texts shorter than this are not worth a semantic round trip.
const MIN_SEMANTIC_TEXT_LEN: usize = 20;

/// Snippet length for semantic citations (the service reports no spans, so
/// the citation carries the head of the source field).
const SEMANTIC_SNIPPET_LEN: usize = 100;

/// Fields mined per facility and the capability kinds searched in each.
/// Staff notes are mined for all kinds — they mention anything.
const FIELD_KINDS: &[(SourceField, &[CapabilityKind])] = &[
    (SourceField::Procedures, &[CapabilityKind::Procedure]),
    (SourceField::Equipment, &[CapabilityKind::Equipment]),
    (SourceField::Specialties, &[CapabilityKind::Specialty]),
    (
        SourceField::StaffNotes,
        &[
            CapabilityKind::Procedure,
            CapabilityKind::Equipment,
            CapabilityKind::Specialty,
        ],
    ),
];

/// Everything extracted and validated for one facility.
#[derive(Debug, Clone)]
pub struct FacilityExtraction {
    pub facility_id: String,
    pub facility_name: String,
    pub region: String,
    pub facility_type: crate::models::FacilityType,
    pub row_index: usize,
    pub capabilities: Vec<ValidatedCapability>,
    pub anomalies: Vec<Anomaly>,
    /// True when semantic augmentation was attempted and failed for any
    /// field of this facility.
    pub degraded: bool,
}

impl FacilityExtraction {
    /// All citations gathered for this facility, in capability order then
    /// anomaly order. Used by the runner to populate the ledger.
    pub fn citations(&self) -> Vec<Citation> {
        let mut out: Vec<Citation> = Vec::new();
        for cap in &self.capabilities {
            out.extend(cap.citations.iter().cloned());
        }
        for anomaly in &self.anomalies {
            out.push(anomaly.citation.clone());
        }
        out
    }
}

/// Run the full extraction unit for one facility.
///
/// Fails only on a malformed record (`InputError`); semantic failures are
/// recovered into `degraded`.
pub fn extract_facility(
    facility: &FacilityRecord,
    vocab: &Vocabulary,
    semantic: Option<&dyn SemanticExtractor>,
) -> Result<FacilityExtraction, InputError> {
    facility.validate()?;

    let matcher = VocabularyMatcher::new(vocab);
    let mut rule_candidates: Vec<CapabilityCandidate> = Vec::new();
    let mut semantic_candidates: Vec<CapabilityCandidate> = Vec::new();
    let mut degraded = false;

    for (field, kinds) in FIELD_KINDS {
        let Some(text) = facility.text_field(*field) else {
            continue;
        };
        if text.trim().is_empty() {
            continue;
        }

        let ctx = CitationContext {
            facility_id: &facility.facility_id,
            field: *field,
            row_index: facility.row_index,
        };
        rule_candidates.extend(matcher.match_text(text, kinds, &ctx));

        if let Some(client) = semantic {
            if text.len() < MIN_SEMANTIC_TEXT_LEN {
                continue;
            }
            match client.extract(&facility.facility_id, *field, text) {
                Ok(findings) => {
                    for finding in findings {
                        // Canonicalize service output against the vocabulary
                        // when possible so merge keys line up.
                        let name = vocab
                            .canonicalize(&finding.name)
                            .map(|t| t.canonical.clone())
                            .unwrap_or(finding.name);
                        semantic_candidates.push(CapabilityCandidate {
                            kind: finding.kind,
                            name,
                            quantity: finding.quantity,
                            status: finding.status,
                            confidence: finding.confidence,
                            source: CandidateSource::Semantic,
                            citation: Citation::new(
                                &facility.facility_id,
                                *field,
                                truncate(text, SEMANTIC_SNIPPET_LEN),
                                facility.row_index,
                                finding.confidence,
                            ),
                        });
                    }
                }
                Err(e) => {
                    degraded = true;
                    tracing::warn!(
                        facility_id = %facility.facility_id,
                        field = field.as_str(),
                        error = %e,
                        "Semantic augmentation failed, falling back to rule-only candidates"
                    );
                }
            }
        }
    }

    let merged = merge_candidates(rule_candidates, semantic_candidates);
    let outcome = cross_validate(facility, &merged);
    let (capabilities, anomalies) = enforce_citation_invariant(facility, outcome);

    Ok(FacilityExtraction {
        facility_id: facility.facility_id.clone(),
        facility_name: facility.facility_name.clone(),
        region: facility.region.clone(),
        facility_type: facility.facility_type,
        row_index: facility.row_index,
        capabilities,
        anomalies,
        degraded,
    })
}

/// A claim with zero citations is an internal defect. It is dropped from
/// the capability set and reported as an anomaly rather than silently
/// passed downstream. By construction this should never fire.
fn enforce_citation_invariant(
    facility: &FacilityRecord,
    outcome: super::validate::ValidationOutcome,
) -> (Vec<ValidatedCapability>, Vec<Anomaly>) {
    let mut anomalies = outcome.anomalies;
    let mut kept = Vec::with_capacity(outcome.capabilities.len());

    for cap in outcome.capabilities {
        if cap.citations.is_empty() {
            tracing::error!(
                facility_id = %facility.facility_id,
                claim = %cap.name,
                "Citation invariant violated — dropping claim and reporting anomaly"
            );
            anomalies.push(Anomaly {
                facility_id: facility.facility_id.clone(),
                claim: cap.name.clone(),
                missing_evidence: "claim produced with zero citations (internal defect)".into(),
                severity: AnomalySeverity::Unverifiable,
                citation: Citation::for_record(
                    &facility.facility_id,
                    &facility.facility_name,
                    facility.row_index,
                ),
            });
            continue;
        }
        kept.push(cap);
    }

    (kept, anomalies)
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FacilityType, OperationalStatus};
    use crate::pipeline::semantic::{SemanticError, SemanticFinding};

    fn facility() -> FacilityRecord {
        FacilityRecord {
            facility_id: "FAC001".into(),
            facility_name: "Korle Bu Teaching Hospital".into(),
            region: "Greater Accra".into(),
            district: "Accra Metro".into(),
            latitude: 5.536,
            longitude: -0.226,
            facility_type: FacilityType::TeachingHospital,
            procedures_text: "Advanced cardiac surgery including bypass and valve replacement. \
                              Approximately 200 cardiac surgeries annually."
                .into(),
            equipment_text: "3 Tesla MRI scanner, 128-slice CT scanner, ICU with 12 beds".into(),
            specialties_text: "Cardiology, emergency medicine".into(),
            staff_notes: String::new(),
            staff_count: Some(1200),
            bed_capacity: Some(2000),
            row_index: 0,
        }
    }

    struct StubSemantic {
        findings: Vec<SemanticFinding>,
    }

    impl SemanticExtractor for StubSemantic {
        fn extract(
            &self,
            _facility_id: &str,
            field: SourceField,
            _text: &str,
        ) -> Result<Vec<SemanticFinding>, SemanticError> {
            if field == SourceField::Equipment {
                Ok(self.findings.clone())
            } else {
                Ok(vec![])
            }
        }
    }

    struct FailingSemantic;

    impl SemanticExtractor for FailingSemantic {
        fn extract(
            &self,
            _facility_id: &str,
            _field: SourceField,
            _text: &str,
        ) -> Result<Vec<SemanticFinding>, SemanticError> {
            Err(SemanticError::Timeout(10))
        }
    }

    // ── Rule-only path ──────────────────────────────────────────────

    #[test]
    fn cardiac_scenario_extracts_expected_candidates_with_no_anomalies() {
        let vocab = Vocabulary::medical_default();
        let out = extract_facility(&facility(), &vocab, None).unwrap();

        let cardiac = out
            .capabilities
            .iter()
            .find(|c| c.name.contains("Cardiac Surgery"))
            .expect("cardiac surgery extracted");
        assert_eq!(cardiac.kind, CapabilityKind::Procedure);
        assert_eq!(cardiac.quantity, Some(200));
        assert!(cardiac.valid);

        let mri = out
            .capabilities
            .iter()
            .find(|c| c.name == "MRI Scanner")
            .expect("MRI extracted");
        assert_eq!(mri.kind, CapabilityKind::Equipment);
        assert_eq!(mri.quantity, Some(1));
        assert_eq!(mri.status, OperationalStatus::Operational);

        assert!(out.anomalies.is_empty(), "equipment dependency satisfied");
        assert!(!out.degraded);
    }

    #[test]
    fn every_capability_is_cited() {
        let vocab = Vocabulary::medical_default();
        let out = extract_facility(&facility(), &vocab, None).unwrap();
        assert!(!out.capabilities.is_empty());
        for cap in &out.capabilities {
            assert!(!cap.citations.is_empty(), "{} lacks citations", cap.name);
        }
    }

    #[test]
    fn malformed_record_is_an_input_error() {
        let vocab = Vocabulary::medical_default();
        let mut bad = facility();
        bad.facility_id = String::new();
        assert!(matches!(
            extract_facility(&bad, &vocab, None),
            Err(InputError::MissingField { .. })
        ));
    }

    // ── Semantic augmentation ───────────────────────────────────────

    #[test]
    fn semantic_findings_merge_with_rule_candidates() {
        let vocab = Vocabulary::medical_default();
        let stub = StubSemantic {
            findings: vec![SemanticFinding {
                name: "mri".into(),
                kind: CapabilityKind::Equipment,
                quantity: None,
                status: OperationalStatus::Operational,
                confidence: 0.95,
            }],
        };
        let out = extract_facility(&facility(), &vocab, Some(&stub)).unwrap();

        let mri = out
            .capabilities
            .iter()
            .find(|c| c.name == "MRI Scanner")
            .unwrap();
        // Semantic 0.95 beats rule 0.90; both citations retained.
        assert!((mri.confidence - 0.95).abs() < f32::EPSILON);
        assert_eq!(mri.source, CandidateSource::Semantic);
        assert_eq!(mri.citations.len(), 2);
    }

    #[test]
    fn semantic_failure_degrades_without_changing_rule_candidates() {
        let vocab = Vocabulary::medical_default();
        let rule_only = extract_facility(&facility(), &vocab, None).unwrap();
        let degraded = extract_facility(&facility(), &vocab, Some(&FailingSemantic)).unwrap();

        assert!(degraded.degraded);
        assert!(!rule_only.degraded);
        let names = |e: &FacilityExtraction| {
            e.capabilities
                .iter()
                .map(|c| (c.kind, c.name.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&rule_only), names(&degraded));
    }
}
