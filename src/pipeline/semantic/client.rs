use serde::{Deserialize, Serialize};

use crate::models::{CapabilityKind, OperationalStatus, SourceField};

use super::SemanticError;

/// Narrow capability interface over the external extraction service.
///
/// The pipeline only ever calls `extract`; everything else (transport,
/// retries, model selection) lives behind the implementation. Tests use a
/// deterministic stub.
pub trait SemanticExtractor: Send + Sync {
    fn extract(
        &self,
        facility_id: &str,
        field: SourceField,
        text: &str,
    ) -> Result<Vec<SemanticFinding>, SemanticError>;
}

/// Wire shape of one extracted capability as the service reports it.
/// Untrusted until it passes [`validate_findings`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFinding {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    pub confidence: f32,
}

/// A schema-validated semantic extraction result.
#[derive(Debug, Clone)]
pub struct SemanticFinding {
    pub name: String,
    pub kind: CapabilityKind,
    pub quantity: Option<u32>,
    pub status: OperationalStatus,
    pub confidence: f32,
}

/// Validate raw service output into typed findings.
///
/// Anything that fails to parse into the candidate shape is discarded, not
/// trusted: unknown kinds, empty names, confidences outside [0, 1], and
/// unrecognized status strings all drop the finding.
pub fn validate_findings(raw: Vec<RawFinding>) -> Vec<SemanticFinding> {
    let mut findings = Vec::with_capacity(raw.len());
    for item in raw {
        let name = item.name.trim();
        if name.is_empty() {
            tracing::debug!("discarding semantic finding with empty name");
            continue;
        }
        let Some(kind) = CapabilityKind::parse(&item.kind) else {
            tracing::debug!(kind = %item.kind, "discarding semantic finding with unknown kind");
            continue;
        };
        if !(0.0..=1.0).contains(&item.confidence) {
            tracing::debug!(
                confidence = item.confidence,
                "discarding semantic finding with out-of-range confidence"
            );
            continue;
        }
        let status = match item.status.as_deref() {
            None => OperationalStatus::Operational,
            Some(s) => match OperationalStatus::parse(s) {
                Some(parsed) => parsed,
                None => {
                    tracing::debug!(status = %s, "discarding semantic finding with unknown status");
                    continue;
                }
            },
        };
        findings.push(SemanticFinding {
            name: name.to_string(),
            kind,
            quantity: item.quantity,
            status,
            confidence: item.confidence,
        });
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, kind: &str, confidence: f32) -> RawFinding {
        RawFinding {
            name: name.into(),
            kind: kind.into(),
            quantity: None,
            status: None,
            confidence,
        }
    }

    #[test]
    fn valid_findings_pass() {
        let out = validate_findings(vec![
            raw("MRI Scanner", "equipment", 0.8),
            raw("Cardiac Surgery", "procedure", 0.75),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind, CapabilityKind::Equipment);
        assert_eq!(out[0].status, OperationalStatus::Operational);
    }

    #[test]
    fn unknown_kind_discarded() {
        let out = validate_findings(vec![raw("Teleporter", "miracle", 0.9)]);
        assert!(out.is_empty());
    }

    #[test]
    fn empty_name_discarded() {
        let out = validate_findings(vec![raw("   ", "equipment", 0.9)]);
        assert!(out.is_empty());
    }

    #[test]
    fn out_of_range_confidence_discarded() {
        let out = validate_findings(vec![
            raw("MRI Scanner", "equipment", 1.5),
            raw("CT Scanner", "equipment", -0.1),
        ]);
        assert!(out.is_empty());
    }

    #[test]
    fn unknown_status_discarded_but_known_parses() {
        let mut bad = raw("MRI Scanner", "equipment", 0.9);
        bad.status = Some("haunted".into());
        let mut good = raw("CT Scanner", "equipment", 0.9);
        good.status = Some("broken".into());

        let out = validate_findings(vec![bad, good]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "CT Scanner");
        assert_eq!(out[0].status, OperationalStatus::Broken);
    }
}
