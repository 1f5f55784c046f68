use serde::{Deserialize, Serialize};

use super::citation::Citation;

/// What kind of capability a claim describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Procedure,
    Equipment,
    Specialty,
}

impl CapabilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Procedure => "procedure",
            CapabilityKind::Equipment => "equipment",
            CapabilityKind::Specialty => "specialty",
        }
    }

    /// Parse a kind from external (semantic service) output. Unknown kinds
    /// are rejected so unvalidated shapes never enter the pipeline.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "procedure" => Some(CapabilityKind::Procedure),
            "equipment" => Some(CapabilityKind::Equipment),
            "specialty" | "speciality" => Some(CapabilityKind::Specialty),
            _ => None,
        }
    }
}

/// Operational status inferred from the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationalStatus {
    Operational,
    Broken,
    ClaimedUnverified,
}

impl OperationalStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "operational" | "available" => Some(OperationalStatus::Operational),
            "broken" | "non-functional" | "nonfunctional" => Some(OperationalStatus::Broken),
            "claimed" | "claimed_unverified" | "unverified" => {
                Some(OperationalStatus::ClaimedUnverified)
            }
            _ => None,
        }
    }
}

/// Which extraction path produced a candidate.
///
/// A tagged variant rather than a type hierarchy — merge logic stays a flat
/// comparison over candidates regardless of origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    Rule,
    Semantic,
}

/// A provisional capability extraction from one free-text field.
///
/// Created by the vocabulary matcher or the semantic augmentor, merged and
/// consumed by cross-validation. Not persisted beyond the pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityCandidate {
    pub kind: CapabilityKind,
    /// Canonical capability name (vocabulary spelling, not raw text).
    pub name: String,
    pub quantity: Option<u32>,
    pub status: OperationalStatus,
    /// Confidence in [0, 1]. Fixed per match type for rule candidates,
    /// model-reported for semantic candidates.
    pub confidence: f32,
    pub source: CandidateSource,
    pub citation: Citation,
}

/// A capability claim after cross-validation.
///
/// Immutable once produced — later stages only read it. Carries every
/// citation that contributed to the claim (rule and semantic when both
/// detected the same capability).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedCapability {
    pub kind: CapabilityKind,
    pub name: String,
    pub quantity: Option<u32>,
    pub status: OperationalStatus,
    pub confidence: f32,
    pub source: CandidateSource,
    /// False when a consistency rule found the claim unsupported.
    pub valid: bool,
    /// Index into the facility's anomaly list, when a rule flagged this claim.
    pub anomaly: Option<usize>,
    /// Non-empty by construction; a claim with zero citations is a defect.
    pub citations: Vec<Citation>,
}
