use serde::{Deserialize, Serialize};

use super::citation::SourceField;
use super::InputError;

/// Facility classification. Drives the maximum-possible capability score
/// used to normalize per-facility scores to 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityType {
    TeachingHospital,
    RegionalHospital,
    DistrictHospital,
    MissionHospital,
    Clinic,
}

impl FacilityType {
    /// Display label for summaries.
    pub fn label(&self) -> &'static str {
        match self {
            FacilityType::TeachingHospital => "teaching hospital",
            FacilityType::RegionalHospital => "regional hospital",
            FacilityType::DistrictHospital => "district hospital",
            FacilityType::MissionHospital => "mission hospital",
            FacilityType::Clinic => "clinic",
        }
    }

    /// Fixed maximum raw capability score per facility type.
    ///
    /// Raw scores (specialties ×5 + equipment ×3 + procedures ×2) are
    /// normalized against this constant, so a well-equipped clinic scores
    /// high *for a clinic* rather than being dwarfed by teaching hospitals.
    pub fn max_raw_score(&self) -> f32 {
        match self {
            FacilityType::TeachingHospital => 80.0,
            FacilityType::RegionalHospital => 60.0,
            FacilityType::DistrictHospital => 40.0,
            FacilityType::MissionHospital => 45.0,
            FacilityType::Clinic => 25.0,
        }
    }
}

/// Immutable input record describing one healthcare facility.
///
/// Owned by the external data-ingestion layer; the pipeline only reads it.
/// Free-text fields may contain anything — they are mined for capability
/// mentions and never cause failures. Only missing required identity
/// fields are an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityRecord {
    pub facility_id: String,
    pub facility_name: String,
    pub region: String,
    #[serde(default)]
    pub district: String,
    pub latitude: f64,
    pub longitude: f64,
    pub facility_type: FacilityType,

    /// Free-text fields, mined by the extraction stage.
    #[serde(default)]
    pub procedures_text: String,
    #[serde(default)]
    pub equipment_text: String,
    #[serde(default)]
    pub specialties_text: String,
    #[serde(default)]
    pub staff_notes: String,

    /// Structured fields, consumed by cross-validation.
    #[serde(default)]
    pub staff_count: Option<u32>,
    #[serde(default)]
    pub bed_capacity: Option<u32>,

    /// Zero-based row index in the source table, carried into citations.
    pub row_index: usize,
}

impl FacilityRecord {
    /// Check required fields. Free text is never validated — only identity
    /// fields and coordinates can make a record unusable.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.facility_id.trim().is_empty() {
            return Err(InputError::MissingField {
                row: self.row_index,
                field: "facility_id",
            });
        }
        if self.facility_name.trim().is_empty() {
            return Err(InputError::MissingField {
                row: self.row_index,
                field: "facility_name",
            });
        }
        if self.region.trim().is_empty() {
            return Err(InputError::MissingField {
                row: self.row_index,
                field: "region",
            });
        }
        if !self.latitude.is_finite()
            || !self.longitude.is_finite()
            || self.latitude.abs() > 90.0
            || self.longitude.abs() > 180.0
        {
            return Err(InputError::InvalidCoordinates {
                row: self.row_index,
                lat: self.latitude,
                lon: self.longitude,
            });
        }
        Ok(())
    }

    /// The free-text field for a given source, if it has one.
    pub fn text_field(&self, field: SourceField) -> Option<&str> {
        match field {
            SourceField::Procedures => Some(&self.procedures_text),
            SourceField::Equipment => Some(&self.equipment_text),
            SourceField::Specialties => Some(&self.specialties_text),
            SourceField::StaffNotes => Some(&self.staff_notes),
            SourceField::Record | SourceField::Query => None,
        }
    }
}
