use serde::{Deserialize, Serialize};

/// The facility field a piece of source text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceField {
    Procedures,
    Equipment,
    Specialties,
    StaffNotes,
    /// The facility row itself (used for aggregate findings that cite a
    /// whole record rather than one text field).
    Record,
    /// The user's query string.
    Query,
}

impl SourceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceField::Procedures => "procedures",
            SourceField::Equipment => "equipment",
            SourceField::Specialties => "specialties",
            SourceField::StaffNotes => "staff_notes",
            SourceField::Record => "record",
            SourceField::Query => "query",
        }
    }
}

/// A pointer from a derived claim back to its exact source text.
///
/// Attached 1:1 to every capability candidate, anomaly, and aggregate
/// finding. Never shared between claims and never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub facility_id: String,
    pub field: SourceField,
    /// Literal source substring (context window around the match).
    pub snippet: String,
    /// Zero-based row index of the record in the input sequence.
    pub row_index: usize,
    pub confidence: f32,
}

impl Citation {
    pub fn new(
        facility_id: impl Into<String>,
        field: SourceField,
        snippet: impl Into<String>,
        row_index: usize,
        confidence: f32,
    ) -> Self {
        Self {
            facility_id: facility_id.into(),
            field,
            snippet: snippet.into(),
            row_index,
            confidence,
        }
    }

    /// Citation for a whole facility row, used by regional findings.
    pub fn for_record(facility_id: &str, facility_name: &str, row_index: usize) -> Self {
        Self::new(facility_id, SourceField::Record, facility_name, row_index, 1.0)
    }
}
