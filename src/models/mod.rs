//! Core data model: facility records, capability entries, anomalies,
//! and the citations that tie every derived claim back to source text.

pub mod anomaly;
pub mod capability;
pub mod citation;
pub mod facility;

pub use anomaly::{Anomaly, AnomalySeverity};
pub use capability::{
    CandidateSource, CapabilityCandidate, CapabilityKind, OperationalStatus, ValidatedCapability,
};
pub use citation::{Citation, SourceField};
pub use facility::{FacilityRecord, FacilityType};

/// Errors raised for malformed facility records.
///
/// Raised only for missing required fields or impossible structured values —
/// malformed free text never fails, it simply yields no candidates.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InputError {
    #[error("facility record at row {row} is missing required field '{field}'")]
    MissingField { row: usize, field: &'static str },

    #[error("facility record at row {row} has invalid coordinates ({lat}, {lon})")]
    InvalidCoordinates { row: usize, lat: f64, lon: f64 },
}
