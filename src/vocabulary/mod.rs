//! Domain vocabulary: canonical capability terms with synonym lists,
//! grouped by kind, plus the phrase matcher that mines free text for them.

pub mod matcher;

pub use matcher::{CitationContext, VocabularyMatcher};

use serde::{Deserialize, Serialize};

use crate::models::CapabilityKind;

/// One canonical capability term and the surface forms that map to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyTerm {
    pub canonical: String,
    pub kind: CapabilityKind,
    /// Lowercase surface forms. The canonical spelling itself is always
    /// matched in addition to these.
    pub synonyms: Vec<String>,
}

/// The full domain vocabulary used for rule-based extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    terms: Vec<VocabularyTerm>,
}

impl Vocabulary {
    pub fn new(terms: Vec<VocabularyTerm>) -> Self {
        Self { terms }
    }

    pub fn terms(&self) -> &[VocabularyTerm] {
        &self.terms
    }

    pub fn terms_of_kind(&self, kind: CapabilityKind) -> impl Iterator<Item = &VocabularyTerm> {
        self.terms.iter().filter(move |t| t.kind == kind)
    }

    /// Look up a canonical term by any surface form, case-insensitively.
    pub fn canonicalize(&self, surface: &str) -> Option<&VocabularyTerm> {
        let lower = surface.trim().to_ascii_lowercase();
        self.terms.iter().find(|t| {
            t.canonical.to_ascii_lowercase() == lower
                || t.synonyms.iter().any(|s| s.as_str() == lower)
        })
    }

    /// Built-in medical vocabulary covering the procedures, equipment, and
    /// specialties the extraction rules know about.
    pub fn medical_default() -> Self {
        fn term(canonical: &str, kind: CapabilityKind, synonyms: &[&str]) -> VocabularyTerm {
            VocabularyTerm {
                canonical: canonical.to_string(),
                kind,
                synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            }
        }
        use CapabilityKind::{Equipment, Procedure, Specialty};

        Vocabulary::new(vec![
            // Procedures
            term(
                "Cardiac Surgery",
                Procedure,
                &["heart surgery", "bypass", "valve replacement", "open heart surgery"],
            ),
            term("Neurosurgery", Procedure, &["brain surgery"]),
            term("Transplantation", Procedure, &["transplant", "organ transplant"]),
            term(
                "Cesarean Section",
                Procedure,
                &["cesarean", "caesarean", "c-section"],
            ),
            term("Appendectomy", Procedure, &[]),
            term("Hernia Repair", Procedure, &[]),
            term(
                "Fracture Management",
                Procedure,
                &["fracture treatment", "fracture care"],
            ),
            term("Laparoscopic Surgery", Procedure, &["laparoscopic", "laparoscopy"]),
            term("Cataract Surgery", Procedure, &["cataract removal"]),
            term("Joint Replacement", Procedure, &["hip replacement", "knee replacement"]),
            term("Trauma Surgery", Procedure, &["trauma care"]),
            term("Cleft Repair", Procedure, &["cleft lip repair", "cleft palate repair"]),
            term("Chemotherapy", Procedure, &["chemo"]),
            term("Dialysis", Procedure, &["haemodialysis", "hemodialysis"]),
            // Equipment
            term(
                "MRI Scanner",
                Equipment,
                &["mri", "magnetic resonance imaging"],
            ),
            term("CT Scanner", Equipment, &["ct scan", "computed tomography"]),
            term("X-Ray", Equipment, &["xray", "x ray", "radiography"]),
            term("Ultrasound", Equipment, &["sonography", "ultrasound scanner"]),
            term("Ventilator", Equipment, &["ventilators"]),
            term(
                "Operating Theater",
                Equipment,
                &["operating theatre", "operating room", "surgical theater"],
            ),
            term("ICU", Equipment, &["intensive care unit", "intensive care"]),
            term(
                "Catheterization Lab",
                Equipment,
                &["catheterisation lab", "cath lab", "catheterization laboratory"],
            ),
            term("Blood Bank", Equipment, &["blood banking"]),
            term("Mammography", Equipment, &["mammogram"]),
            term("Endoscopy", Equipment, &["endoscope"]),
            term("Autoclave", Equipment, &[]),
            term("Laboratory", Equipment, &["lab services", "diagnostic laboratory"]),
            term("Ambulance", Equipment, &["ambulances"]),
            // Specialties
            term("Cardiology", Specialty, &["cardiology department", "cardiac care"]),
            term("Neurology", Specialty, &[]),
            term("Orthopedics", Specialty, &["orthopaedics", "orthopedic"]),
            term("Obstetrics", Specialty, &["obstetric", "maternity"]),
            term("Gynecology", Specialty, &["gynaecology"]),
            term("Pediatrics", Specialty, &["paediatrics", "child health"]),
            term("Oncology", Specialty, &["cancer care"]),
            term("Nephrology", Specialty, &["renal medicine"]),
            term(
                "Emergency Medicine",
                Specialty,
                &["emergency department", "emergency care", "a&e"],
            ),
            term("Ophthalmology", Specialty, &["eye care", "eye clinic"]),
            term("Internal Medicine", Specialty, &["general medicine"]),
            term("General Surgery", Specialty, &["surgical department"]),
        ])
    }
}
