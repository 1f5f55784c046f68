use serde::{Deserialize, Serialize};

use super::citation::Citation;

/// How strongly an inconsistency contradicts the facility's claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    /// A claim whose supporting evidence is absent (e.g. cardiac surgery
    /// with no imaging or catheterization equipment listed).
    Suspicious,
    /// A claim that cannot be checked against available evidence (e.g. a
    /// specialty with no matching staff in the notes).
    Unverifiable,
    /// A claim directly contradicted by the evidence (e.g. the only
    /// supporting equipment is reported broken).
    Contradictory,
}

/// A flagged inconsistency between a claimed capability and its evidence.
///
/// Created only by cross-validation. The citation points at the claim's
/// source text so a reviewer can see exactly what was asserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub facility_id: String,
    /// The conflicting claim, e.g. "Cardiac Surgery".
    pub claim: String,
    /// The supporting evidence that is missing or contradicted.
    pub missing_evidence: String,
    pub severity: AnomalySeverity,
    pub citation: Citation,
}
