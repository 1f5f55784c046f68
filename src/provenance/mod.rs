//! Provenance ledger: every derived fact and every multi-step reasoning
//! decision is attached to its originating source text.
//!
//! The ledger is scoped to a single query run — a new run starts fresh, and
//! process-wide state is never shared across runs. Steps are flattened into
//! one linear sequence in insertion order, so the report is deterministic
//! even when extraction runs facilities in parallel (the runner commits
//! per-facility sub-steps in input order, not completion order).

use std::fmt::Write as _;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Citation;

/// Handle to an open ledger step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepId(usize);

/// One recorded pipeline stage or sub-step, with the citations it used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    /// 1-based sequence number in insertion order.
    pub sequence: u32,
    pub name: String,
    pub input_summary: String,
    pub output_summary: String,
    pub citations: Vec<Citation>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: Option<u64>,
}

/// Serializable report handed to the presentation layer — the full trace
/// of the run, losslessly carrying every citation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReport {
    pub run_id: Uuid,
    pub total_steps: usize,
    pub total_citations: usize,
    pub steps: Vec<PipelineStep>,
}

impl LedgerReport {
    /// Human-readable rendering of the full trace.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", "=".repeat(78));
        let _ = writeln!(out, "PIPELINE TRACE {} — {} steps, {} citations", self.run_id, self.total_steps, self.total_citations);
        let _ = writeln!(out, "{}", "=".repeat(78));
        for step in &self.steps {
            let _ = writeln!(out, "\nStep {}: {}", step.sequence, step.name);
            let _ = writeln!(out, "  started: {}", step.started_at.to_rfc3339());
            if let Some(ms) = step.duration_ms {
                let _ = writeln!(out, "  duration: {ms}ms");
            }
            let _ = writeln!(out, "  input:  {}", step.input_summary);
            let _ = writeln!(out, "  output: {}", step.output_summary);
            if step.citations.is_empty() {
                let _ = writeln!(out, "  citations: none");
            } else {
                let _ = writeln!(out, "  citations ({}):", step.citations.len());
                for (i, c) in step.citations.iter().enumerate() {
                    let mut snippet = c.snippet.clone();
                    if snippet.len() > 100 {
                        // Back off to a char boundary so multibyte text
                        // never splits mid-character.
                        let mut end = 100;
                        while end > 0 && !snippet.is_char_boundary(end) {
                            end -= 1;
                        }
                        snippet.truncate(end);
                        snippet.push('…');
                    }
                    let _ = writeln!(
                        out,
                        "    [{}] {} / {} (row {}, conf {:.2}): \"{}\"",
                        i + 1,
                        c.facility_id,
                        c.field.as_str(),
                        c.row_index,
                        c.confidence,
                        snippet
                    );
                }
            }
        }
        out
    }
}

/// Append-only record of every reasoning step in one pipeline run.
pub struct ProvenanceLedger {
    run_id: Uuid,
    steps: Vec<PipelineStep>,
    /// Start instants for duration computation, parallel to `steps`.
    started: Vec<Option<Instant>>,
}

impl ProvenanceLedger {
    /// Fresh, empty ledger for a new run.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            steps: Vec::new(),
            started: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Open a new step. Steps are appended in call order; the returned id
    /// addresses this step for citations and completion.
    pub fn start_step(&mut self, name: impl Into<String>, input_summary: impl Into<String>) -> StepId {
        let id = StepId(self.steps.len());
        self.steps.push(PipelineStep {
            sequence: (self.steps.len() + 1) as u32,
            name: name.into(),
            input_summary: input_summary.into(),
            output_summary: String::new(),
            citations: Vec::new(),
            started_at: Utc::now(),
            duration_ms: None,
        });
        self.started.push(Some(Instant::now()));
        id
    }

    /// Attach a citation to an open (or closed) step.
    pub fn record_citation(&mut self, step: StepId, citation: Citation) {
        if let Some(s) = self.steps.get_mut(step.0) {
            s.citations.push(citation);
        }
    }

    pub fn record_citations(&mut self, step: StepId, citations: impl IntoIterator<Item = Citation>) {
        if let Some(s) = self.steps.get_mut(step.0) {
            s.citations.extend(citations);
        }
    }

    /// Close a step with its output summary.
    pub fn end_step(&mut self, step: StepId, output_summary: impl Into<String>) {
        if let Some(s) = self.steps.get_mut(step.0) {
            s.output_summary = output_summary.into();
            if let Some(Some(start)) = self.started.get_mut(step.0).map(Option::take) {
                s.duration_ms = Some(start.elapsed().as_millis() as u64);
            }
        }
    }

    /// Ordered list of all recorded steps.
    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn total_citations(&self) -> usize {
        self.steps.iter().map(|s| s.citations.len()).sum()
    }

    /// All citations attributed to one facility, across every step.
    pub fn citations_for_facility(&self, facility_id: &str) -> Vec<&Citation> {
        self.steps
            .iter()
            .flat_map(|s| s.citations.iter())
            .filter(|c| c.facility_id == facility_id)
            .collect()
    }

    /// Snapshot the ledger into the serializable report.
    pub fn report(&self) -> LedgerReport {
        LedgerReport {
            run_id: self.run_id,
            total_steps: self.steps.len(),
            total_citations: self.total_citations(),
            steps: self.steps.clone(),
        }
    }
}

impl Default for ProvenanceLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceField;

    fn citation(id: &str) -> Citation {
        Citation::new(id, SourceField::Procedures, "cardiac surgery program", 1, 0.9)
    }

    #[test]
    fn steps_are_sequenced_in_insertion_order() {
        let mut ledger = ProvenanceLedger::new();
        let a = ledger.start_step("understand_query", "q");
        let b = ledger.start_step("extract", "2 facilities");
        ledger.end_step(b, "done");
        ledger.end_step(a, "done");

        let steps = ledger.steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].sequence, 1);
        assert_eq!(steps[0].name, "understand_query");
        assert_eq!(steps[1].sequence, 2);
        // Completion order does not reorder anything.
        assert_eq!(steps[1].name, "extract");
    }

    #[test]
    fn citations_attach_to_the_right_step() {
        let mut ledger = ProvenanceLedger::new();
        let a = ledger.start_step("extract:FAC001", "procedures text");
        let b = ledger.start_step("extract:FAC002", "procedures text");
        ledger.record_citation(a, citation("FAC001"));
        ledger.record_citation(b, citation("FAC002"));
        ledger.record_citation(b, citation("FAC002"));

        assert_eq!(ledger.steps()[0].citations.len(), 1);
        assert_eq!(ledger.steps()[1].citations.len(), 2);
        assert_eq!(ledger.total_citations(), 3);
        assert_eq!(ledger.citations_for_facility("FAC002").len(), 2);
    }

    #[test]
    fn fresh_ledger_per_run() {
        let first = ProvenanceLedger::new();
        let second = ProvenanceLedger::new();
        assert_ne!(first.run_id(), second.run_id());
        assert!(second.steps().is_empty());
    }

    #[test]
    fn report_round_trips_through_json_without_losing_citations() {
        let mut ledger = ProvenanceLedger::new();
        let a = ledger.start_step("extract", "1 facility");
        ledger.record_citation(a, citation("FAC001"));
        ledger.end_step(a, "1 capability");

        let report = ledger.report();
        let json = serde_json::to_string(&report).unwrap();
        let back: LedgerReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_citations, 1);
        assert_eq!(back.steps[0].citations[0].facility_id, "FAC001");
    }

    #[test]
    fn rendered_report_mentions_steps_and_snippets() {
        let mut ledger = ProvenanceLedger::new();
        let a = ledger.start_step("extract:FAC001", "in");
        ledger.record_citation(a, citation("FAC001"));
        ledger.end_step(a, "out");

        let text = ledger.report().render();
        assert!(text.contains("extract:FAC001"));
        assert!(text.contains("cardiac surgery program"));
    }

    #[test]
    fn render_truncates_long_multibyte_snippets_without_panicking() {
        let mut ledger = ProvenanceLedger::new();
        let a = ledger.start_step("extract:FAC001", "in");
        // 3 bytes per char, 120 bytes total: byte 100 is mid-character.
        ledger.record_citation(a, Citation::new(
            "FAC001",
            SourceField::Procedures,
            "€".repeat(40),
            1,
            0.9,
        ));
        ledger.end_step(a, "out");

        let text = ledger.report().render();
        assert!(text.contains('…'));
    }
}
