//! Four-stage pipeline orchestrator.
//!
//! Drives Understand Query → Extract → Analyze → Synthesize strictly in
//! order, threading an immutable run context (facilities, vocabulary,
//! config) and a single-owner provenance ledger through the stages. Any
//! unrecoverable stage error transitions to Failed with the partial ledger
//! preserved for diagnosis; Failed is terminal and retry is the caller's
//! responsibility.

use std::collections::BTreeSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::models::{Anomaly, CapabilityKind, Citation, FacilityType, OperationalStatus};
use crate::pipeline::semantic::SemanticExtractor;
use crate::pipeline::{run_extraction, CancelToken, FacilityExtraction};
use crate::provenance::{LedgerReport, ProvenanceLedger};
use crate::query::{understand_query, ParsedQuery, QueryEntities, QueryIntent};
use crate::regional::{RegionalAggregator, RegionalAnalysis, RegionalProfile, Recommendation};
use crate::vocabulary::Vocabulary;

/// Pipeline state. States advance strictly in declaration order within one
/// run; none is skipped or revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    UnderstandingQuery,
    Extracting,
    Analyzing,
    Synthesizing,
    Done,
    Failed,
}

/// Terminal pipeline error. Carries the ledger as it stood when the run
/// failed, so the caller can still see every step that did complete.
#[derive(Debug, Clone, thiserror::Error)]
#[error("pipeline failed while {stage:?}: {reason}")]
pub struct PipelineFailure {
    pub stage: PipelineStage,
    pub reason: String,
    pub partial_trace: LedgerReport,
}

/// One facility matched by a find-facilities query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedFacility {
    pub facility_id: String,
    pub facility_name: String,
    pub region: String,
    pub facility_type: FacilityType,
    pub capability: String,
    pub kind: CapabilityKind,
    pub status: OperationalStatus,
    pub quantity: Option<u32>,
    pub confidence: f32,
    pub citations: Vec<Citation>,
}

/// Run-wide coverage statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageStatistics {
    pub total_facilities: usize,
    pub facilities_with_anomalies: usize,
    pub average_capability_score: f32,
}

/// The assembled answer handed to the presentation layer.
///
/// Serializable without loss — every citation gathered during the run is
/// inside `citations`, and each claim carries its own besides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub intent: QueryIntent,
    pub entities: QueryEntities,
    pub summary: String,
    pub matched_facilities: Vec<MatchedFacility>,
    pub regional_profiles: Vec<RegionalProfile>,
    pub recommendations: Vec<Recommendation>,
    pub statistics: CoverageStatistics,
    pub anomalies: Vec<Anomaly>,
    /// True when semantic augmentation was disabled or failed for any
    /// facility — the response is built from rule-only candidates.
    pub degraded: bool,
    /// Malformed input rows that were isolated: (row index, reason).
    pub skipped_records: Vec<(usize, String)>,
    pub citations: LedgerReport,
    pub processing_time_ms: u64,
}

/// Orchestrates one query end to end. Holds only immutable run context;
/// each `process_query` call runs on a fresh ledger.
pub struct PipelineOrchestrator {
    vocab: Vocabulary,
    config: AnalysisConfig,
    semantic: Option<Box<dyn SemanticExtractor>>,
}

impl PipelineOrchestrator {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            vocab: Vocabulary::medical_default(),
            config,
            semantic: None,
        }
    }

    pub fn with_vocabulary(mut self, vocab: Vocabulary) -> Self {
        self.vocab = vocab;
        self
    }

    pub fn with_semantic(mut self, client: Box<dyn SemanticExtractor>) -> Self {
        self.semantic = Some(client);
        self
    }

    /// Process a natural-language query over the given facility records.
    pub fn process_query(
        &self,
        query: &str,
        facilities: &[crate::models::FacilityRecord],
        cancel: &CancelToken,
    ) -> Result<QueryResponse, PipelineFailure> {
        let start = Instant::now();
        let mut ledger = ProvenanceLedger::new();
        tracing::info!(query, facility_count = facilities.len(), "Starting pipeline run");

        // ── UnderstandingQuery ──
        let step = ledger.start_step("understand_query", format!("query: {query:?}"));
        let regions: BTreeSet<&str> = facilities.iter().map(|f| f.region.as_str()).collect();
        let region_list: Vec<&str> = regions.into_iter().collect();
        let parsed = understand_query(query, &self.vocab, &region_list);
        ledger.end_step(
            step,
            format!(
                "intent {}, {} capability terms, region {:?}",
                parsed.intent.as_str(),
                parsed.entities.capabilities.len(),
                parsed.entities.region
            ),
        );

        // ── Extracting ──
        let step = ledger.start_step(
            "extract_capabilities",
            format!("{} facility records", facilities.len()),
        );
        let semantic_enabled = self.config.enable_semantic_augmentation && self.semantic.is_some();
        let semantic = if semantic_enabled {
            self.semantic.as_deref()
        } else {
            None
        };
        let run = match run_extraction(
            facilities,
            &self.vocab,
            semantic,
            self.config.concurrency_limit,
            cancel,
            &mut ledger,
        ) {
            Ok(run) => run,
            Err(e) => {
                ledger.end_step(step, format!("aborted: {e}"));
                return Err(PipelineFailure {
                    stage: PipelineStage::Extracting,
                    reason: e.to_string(),
                    partial_trace: ledger.report(),
                });
            }
        };
        let total_capabilities: usize = run.extractions.iter().map(|e| e.capabilities.len()).sum();
        ledger.end_step(
            step,
            format!(
                "{} facilities extracted, {} skipped, {} capabilities",
                run.extractions.len(),
                run.skipped.len(),
                total_capabilities
            ),
        );
        let degraded = !semantic_enabled || run.degraded;

        // ── Analyzing ──
        let step = ledger.start_step("analyze", format!("intent: {}", parsed.intent.as_str()));
        let aggregator = RegionalAggregator::new(&self.config);
        let analysis = match aggregator.analyze(&run.extractions) {
            Ok(analysis) => analysis,
            Err(e) => {
                ledger.end_step(step, format!("failed: {e}"));
                return Err(PipelineFailure {
                    stage: PipelineStage::Analyzing,
                    reason: e.to_string(),
                    partial_trace: ledger.report(),
                });
            }
        };
        let matched = if parsed.intent == QueryIntent::FindFacilities {
            search_facilities(&run.extractions, &parsed.entities)
        } else {
            Vec::new()
        };
        for m in &matched {
            ledger.record_citations(step, m.citations.iter().cloned());
        }
        ledger.end_step(
            step,
            format!(
                "{} regional profiles, {} facility matches",
                analysis.profiles.len(),
                matched.len()
            ),
        );

        // ── Synthesizing ──
        let step = ledger.start_step("synthesize", format!("intent: {}", parsed.intent.as_str()));
        let summary = render_summary(&parsed, &matched, &analysis, &aggregator);
        ledger.end_step(step, format!("summary, {} chars", summary.len()));

        let anomalies: Vec<Anomaly> = run
            .extractions
            .iter()
            .flat_map(|e| e.anomalies.iter().cloned())
            .collect();

        let RegionalAnalysis {
            profiles,
            recommendations,
            total_facilities,
            facilities_with_anomalies,
            average_capability_score,
        } = analysis;

        tracing::info!(
            run_id = %ledger.run_id(),
            profiles = profiles.len(),
            anomalies = anomalies.len(),
            degraded,
            "Pipeline run complete"
        );

        Ok(QueryResponse {
            query: query.to_string(),
            intent: parsed.intent,
            entities: parsed.entities,
            summary,
            matched_facilities: matched,
            regional_profiles: profiles,
            recommendations,
            statistics: CoverageStatistics {
                total_facilities,
                facilities_with_anomalies,
                average_capability_score,
            },
            anomalies,
            degraded,
            skipped_records: run.skipped,
            citations: ledger.report(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Filter validated capabilities by the query's entities. With capability
/// terms, matches are exact canonical-name hits; without any, each facility
/// in scope is represented by its highest-confidence capability.
fn search_facilities(
    extractions: &[FacilityExtraction],
    entities: &QueryEntities,
) -> Vec<MatchedFacility> {
    let mut out = Vec::new();
    for ext in extractions {
        if let Some(region) = &entities.region {
            if !ext.region.eq_ignore_ascii_case(region) {
                continue;
            }
        }
        if entities.capabilities.is_empty() {
            if let Some(best) = ext
                .capabilities
                .iter()
                .filter(|c| c.valid)
                .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            {
                out.push(matched(ext, best));
            }
            continue;
        }
        for cap in &ext.capabilities {
            if !cap.valid {
                continue;
            }
            let hit = entities
                .capabilities
                .iter()
                .any(|(kind, name)| *kind == cap.kind && name.eq_ignore_ascii_case(&cap.name));
            if hit {
                out.push(matched(ext, cap));
            }
        }
    }
    out.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.facility_id.cmp(&b.facility_id))
            .then_with(|| a.capability.cmp(&b.capability))
    });
    out
}

fn matched(ext: &FacilityExtraction, cap: &crate::models::ValidatedCapability) -> MatchedFacility {
    MatchedFacility {
        facility_id: ext.facility_id.clone(),
        facility_name: ext.facility_name.clone(),
        region: ext.region.clone(),
        facility_type: ext.facility_type,
        capability: cap.name.clone(),
        kind: cap.kind,
        status: cap.status,
        quantity: cap.quantity,
        confidence: cap.confidence,
        citations: cap.citations.clone(),
    }
}

fn render_summary(
    parsed: &ParsedQuery,
    matched: &[MatchedFacility],
    analysis: &RegionalAnalysis,
    aggregator: &RegionalAggregator,
) -> String {
    match parsed.intent {
        QueryIntent::FindFacilities => render_facility_matches(matched, &parsed.entities),
        QueryIntent::FindMedicalDeserts => render_desert_summary(analysis),
        QueryIntent::IdentifyGaps => render_gap_summary(analysis),
        QueryIntent::AnalyzeCoverage | QueryIntent::General => {
            render_coverage_summary(analysis, aggregator)
        }
    }
}

fn render_facility_matches(matched: &[MatchedFacility], entities: &QueryEntities) -> String {
    let wanted = entities
        .capabilities
        .first()
        .map(|(_, name)| name.as_str())
        .unwrap_or("the requested capability");
    if matched.is_empty() {
        return format!("No facilities found with {wanted}.");
    }

    let mut lines = vec![format!("Found {} facilities with {}:", matched.len(), wanted)];
    for (i, m) in matched.iter().take(5).enumerate() {
        let mut line = format!(
            "{}. {} ({}, {}) — {}",
            i + 1,
            m.facility_name,
            m.facility_type.label(),
            m.region,
            m.capability
        );
        if m.status != OperationalStatus::Operational {
            line.push_str(&format!(" [status: {:?}]", m.status));
        }
        if m.confidence < 0.8 {
            line.push_str(&format!(" (confidence {:.0}%)", m.confidence * 100.0));
        }
        lines.push(line);
    }
    if matched.len() > 5 {
        lines.push(format!("...and {} more facilities", matched.len() - 5));
    }
    lines.join("\n")
}

fn render_desert_summary(analysis: &RegionalAnalysis) -> String {
    let deserts: Vec<&RegionalProfile> = analysis
        .profiles
        .iter()
        .filter(|p| !p.missing_essential.is_empty())
        .collect();
    if deserts.is_empty() {
        return "No medical deserts identified: every region covers the essential \
                capability baseline."
            .to_string();
    }

    let mut lines = vec![format!("Identified {} underserved regions:", deserts.len())];
    for profile in deserts.iter().take(5) {
        lines.push(format!(
            "- {} ({:?}, risk {:.0}/100): missing {} essential capabilities",
            profile.region,
            profile.severity,
            profile.desert_risk_score,
            profile.missing_essential.len()
        ));
        let names: Vec<&str> = profile
            .missing_essential
            .iter()
            .take(3)
            .map(|m| m.name.as_str())
            .collect();
        if !names.is_empty() {
            lines.push(format!("  e.g. {}", names.join(", ")));
        }
    }
    lines.join("\n")
}

fn render_gap_summary(analysis: &RegionalAnalysis) -> String {
    // Aggregate missing capabilities across regions, widest gap first.
    let mut affected: std::collections::BTreeMap<&str, Vec<&str>> = Default::default();
    for profile in &analysis.profiles {
        for missing in &profile.missing_essential {
            affected
                .entry(missing.name.as_str())
                .or_default()
                .push(profile.region.as_str());
        }
    }
    if affected.is_empty() {
        return "No capability gaps identified.".to_string();
    }

    let mut ranked: Vec<(&str, Vec<&str>)> = affected.into_iter().collect();
    ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

    let mut lines = vec!["Capability gaps by reach:".to_string()];
    for (name, regions) in ranked.iter().take(5) {
        lines.push(format!(
            "- {}: missing in {} region(s) ({})",
            name,
            regions.len(),
            regions.join(", ")
        ));
    }
    lines.join("\n")
}

fn render_coverage_summary(analysis: &RegionalAnalysis, aggregator: &RegionalAggregator) -> String {
    let mut lines = vec![
        "Healthcare coverage analysis".to_string(),
        format!("Total facilities: {}", analysis.total_facilities),
        format!(
            "Average capability score: {:.0}/100",
            analysis.average_capability_score
        ),
        format!(
            "Facilities with anomalies: {}",
            analysis.facilities_with_anomalies
        ),
    ];
    if let Some(worst) = analysis.profiles.first() {
        lines.push(format!(
            "Highest-risk region: {} ({} risk, {:.0}/100)",
            worst.region,
            aggregator.risk_band(worst.desert_risk_score),
            worst.desert_risk_score
        ));
    }
    if !analysis.recommendations.is_empty() {
        lines.push("Key recommendations:".to_string());
        for rec in analysis.recommendations.iter().take(3) {
            lines.push(format!("- {}", rec.rationale));
        }
    }
    lines.join("\n")
}
