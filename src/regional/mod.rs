//! Regional aggregation and desert-risk scoring.
//!
//! Groups validated capability sets by region, compares against the
//! essential-capability baseline, and produces ranked findings. The whole
//! computation is deterministic and re-derived in full on every call —
//! there is no cached partial state to mutate.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::models::{CapabilityKind, Citation, OperationalStatus};
use crate::pipeline::FacilityExtraction;

/// Risk weighting: contribution of low average capability score.
const WEIGHT_LOW_CAPABILITY: f32 = 0.4;
/// Risk points per missing essential capability, and the cap.
const MISSING_POINTS: f32 = 8.0;
const MISSING_CAP: f32 = 40.0;
/// Risk points per broken critical equipment item, and the cap.
const BROKEN_POINTS: f32 = 10.0;
const BROKEN_CAP: f32 = 20.0;

/// Equipment whose broken status directly raises desert risk.
const CRITICAL_EQUIPMENT: &[&str] = &[
    "CT Scanner",
    "MRI Scanner",
    "ICU",
    "Operating Theater",
    "X-Ray",
];

/// Desert severity class. Classification is by missing-essential count;
/// the score bands in the config drive summary wording only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesertSeverity {
    Critical,
    Severe,
    Moderate,
    Low,
}

/// An essential capability absent from an entire region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingCapability {
    pub kind: CapabilityKind,
    pub name: String,
}

/// A prioritized intervention suggestion, cited back to the facility
/// records whose capability sets justified the missing determination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub region: String,
    pub capability: MissingCapability,
    pub desert_risk_score: f32,
    pub rationale: String,
    pub citations: Vec<Citation>,
}

/// Per-facility score detail contributing to a regional profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityScore {
    pub facility_id: String,
    pub facility_name: String,
    pub capability_score: f32,
}

/// Aggregate findings for one region. Recomputed fully on each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionalProfile {
    pub region: String,
    pub facility_count: usize,
    /// Union of validated capability names across member facilities.
    pub capabilities: BTreeSet<String>,
    pub missing_essential: Vec<MissingCapability>,
    pub average_capability_score: f32,
    pub broken_critical_equipment: Vec<String>,
    pub desert_risk_score: f32,
    pub severity: DesertSeverity,
    pub facility_scores: Vec<FacilityScore>,
    pub recommendations: Vec<Recommendation>,
    /// Facility-record citations backing this profile. Non-empty by
    /// construction — a region only exists because records mention it.
    pub citations: Vec<Citation>,
}

/// Output of the Analyzing stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionalAnalysis {
    /// Sorted descending by desert risk.
    pub profiles: Vec<RegionalProfile>,
    /// Flattened recommendations across regions, ranked by risk.
    pub recommendations: Vec<Recommendation>,
    pub total_facilities: usize,
    pub facilities_with_anomalies: usize,
    pub average_capability_score: f32,
}

/// The Analyzing stage received nothing to aggregate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AggregationError {
    #[error("no validated capabilities available for aggregation")]
    EmptyInput,
}

/// Regional aggregation engine. Holds only configuration; all state is
/// derived from the inputs on each call.
pub struct RegionalAggregator<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> RegionalAggregator<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Compute regional profiles from all facility extractions.
    pub fn analyze(
        &self,
        extractions: &[FacilityExtraction],
    ) -> Result<RegionalAnalysis, AggregationError> {
        if extractions.iter().all(|e| e.capabilities.is_empty()) {
            return Err(AggregationError::EmptyInput);
        }

        let mut by_region: BTreeMap<&str, Vec<&FacilityExtraction>> = BTreeMap::new();
        for extraction in extractions {
            by_region.entry(&extraction.region).or_default().push(extraction);
        }

        let mut profiles: Vec<RegionalProfile> = by_region
            .into_iter()
            .map(|(region, members)| self.profile_region(region, &members))
            .collect();

        profiles.sort_by(|a, b| {
            b.desert_risk_score
                .total_cmp(&a.desert_risk_score)
                .then_with(|| a.region.cmp(&b.region))
        });

        let mut recommendations: Vec<Recommendation> = profiles
            .iter()
            .flat_map(|p| p.recommendations.iter().cloned())
            .collect();
        recommendations.sort_by(|a, b| {
            b.desert_risk_score
                .total_cmp(&a.desert_risk_score)
                .then_with(|| a.region.cmp(&b.region))
                .then_with(|| a.capability.name.cmp(&b.capability.name))
        });

        let total_facilities = extractions.len();
        let facilities_with_anomalies =
            extractions.iter().filter(|e| !e.anomalies.is_empty()).count();
        let average_capability_score = if total_facilities == 0 {
            0.0
        } else {
            extractions.iter().map(|e| capability_score(e)).sum::<f32>() / total_facilities as f32
        };

        Ok(RegionalAnalysis {
            profiles,
            recommendations,
            total_facilities,
            facilities_with_anomalies,
            average_capability_score,
        })
    }

    fn profile_region(&self, region: &str, members: &[&FacilityExtraction]) -> RegionalProfile {
        let mut capabilities: BTreeSet<String> = BTreeSet::new();
        let mut broken_critical: BTreeSet<String> = BTreeSet::new();
        let mut facility_scores = Vec::with_capacity(members.len());
        let mut citations = Vec::with_capacity(members.len());

        for member in members {
            for cap in &member.capabilities {
                if cap.valid && cap.status != OperationalStatus::Broken {
                    capabilities.insert(cap.name.clone());
                }
                if cap.status == OperationalStatus::Broken
                    && CRITICAL_EQUIPMENT
                        .iter()
                        .any(|c| c.eq_ignore_ascii_case(&cap.name))
                {
                    broken_critical.insert(cap.name.clone());
                }
            }
            facility_scores.push(FacilityScore {
                facility_id: member.facility_id.clone(),
                facility_name: member.facility_name.clone(),
                capability_score: capability_score(member),
            });
            citations.push(Citation::for_record(
                &member.facility_id,
                &member.facility_name,
                member.row_index,
            ));
        }

        let missing_essential = self.missing_essential(&capabilities);
        let average_capability_score = if facility_scores.is_empty() {
            0.0
        } else {
            facility_scores.iter().map(|f| f.capability_score).sum::<f32>()
                / facility_scores.len() as f32
        };

        let desert_risk_score = desert_risk(
            average_capability_score,
            missing_essential.len(),
            broken_critical.len(),
        );
        let severity = self.classify_missing(missing_essential.len());

        let recommendations = missing_essential
            .iter()
            .map(|missing| Recommendation {
                region: region.to_string(),
                capability: missing.clone(),
                desert_risk_score,
                rationale: format!(
                    "no facility in {} provides essential {} '{}'",
                    region,
                    missing.kind.as_str(),
                    missing.name
                ),
                citations: citations.clone(),
            })
            .collect();

        RegionalProfile {
            region: region.to_string(),
            facility_count: members.len(),
            capabilities,
            missing_essential,
            average_capability_score,
            broken_critical_equipment: broken_critical.into_iter().collect(),
            desert_risk_score,
            severity,
            facility_scores,
            recommendations,
            citations,
        }
    }

    fn missing_essential(&self, present: &BTreeSet<String>) -> Vec<MissingCapability> {
        let baseline = &self.config.essential_baseline;
        let mut missing = Vec::new();
        for kind in [
            CapabilityKind::Procedure,
            CapabilityKind::Equipment,
            CapabilityKind::Specialty,
        ] {
            for name in baseline.names_of_kind(kind) {
                if !present.iter().any(|p| p.eq_ignore_ascii_case(name)) {
                    missing.push(MissingCapability {
                        kind,
                        name: name.clone(),
                    });
                }
            }
        }
        missing
    }

    /// Missing-count severity classification (the authoritative variant).
    pub fn classify_missing(&self, missing_count: usize) -> DesertSeverity {
        let t = &self.config.severity_thresholds;
        if missing_count >= t.critical_missing {
            DesertSeverity::Critical
        } else if missing_count >= t.severe_missing {
            DesertSeverity::Severe
        } else if missing_count >= t.moderate_missing {
            DesertSeverity::Moderate
        } else {
            DesertSeverity::Low
        }
    }

    /// Score-band wording for summaries ("critical" ≥75, "high" ≥60, ...).
    pub fn risk_band(&self, score: f32) -> &'static str {
        let t = &self.config.severity_thresholds;
        if score >= t.score_critical {
            "critical"
        } else if score >= t.score_high {
            "high"
        } else if score >= t.score_moderate {
            "moderate"
        } else {
            "low"
        }
    }
}

/// Weighted capability score for one facility, normalized 0–100 against
/// the facility type's maximum-possible-score constant.
///
/// Only valid claims count, and broken equipment never counts.
pub fn capability_score(extraction: &FacilityExtraction) -> f32 {
    let mut raw = 0.0f32;
    for cap in &extraction.capabilities {
        if !cap.valid || cap.status == OperationalStatus::Broken {
            continue;
        }
        raw += match cap.kind {
            CapabilityKind::Specialty => 5.0,
            CapabilityKind::Equipment => 3.0,
            CapabilityKind::Procedure => 2.0,
        };
    }
    let max = extraction.facility_type.max_raw_score();
    ((raw / max) * 100.0).clamp(0.0, 100.0)
}

/// Composite desert risk: low capability, missing essentials, and broken
/// critical equipment, each capped, clamped to 0–100.
fn desert_risk(average_capability: f32, missing_count: usize, broken_count: usize) -> f32 {
    let capability_factor = (100.0 - average_capability).max(0.0) * WEIGHT_LOW_CAPABILITY;
    let missing_factor = (missing_count as f32 * MISSING_POINTS).min(MISSING_CAP);
    let broken_factor = (broken_count as f32 * BROKEN_POINTS).min(BROKEN_CAP);
    (capability_factor + missing_factor + broken_factor).clamp(0.0, 100.0)
}
