//! Bounded worker pool over facilities for the Extracting stage.
//!
//! Per-facility work is independent; workers pull indices from a shared
//! counter and write results into per-facility slots. The ledger is written
//! by the coordinating thread only, in facility input order, after all
//! workers finish — so the provenance report is deterministic regardless of
//! worker completion order, without sharing the ledger across threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::models::{FacilityRecord, InputError};
use crate::provenance::ProvenanceLedger;
use crate::vocabulary::Vocabulary;

use super::extractor::{extract_facility, FacilityExtraction};
use super::semantic::SemanticExtractor;
use super::CancelToken;

/// Result of the Extracting stage across all facilities.
#[derive(Debug)]
pub struct ExtractionRun {
    pub extractions: Vec<FacilityExtraction>,
    /// Facilities isolated for malformed records: (row index, reason).
    pub skipped: Vec<(usize, String)>,
    /// True when any facility's semantic augmentation failed.
    pub degraded: bool,
}

/// The run was cancelled before extraction completed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("extraction aborted: run cancelled")]
pub struct ExtractionCancelled;

/// Extract all facilities with at most `concurrency` workers, then commit
/// one ledger sub-step per facility in input order.
pub fn run_extraction(
    facilities: &[FacilityRecord],
    vocab: &Vocabulary,
    semantic: Option<&dyn SemanticExtractor>,
    concurrency: usize,
    cancel: &CancelToken,
    ledger: &mut ProvenanceLedger,
) -> Result<ExtractionRun, ExtractionCancelled> {
    let workers = concurrency.clamp(1, facilities.len().max(1));
    let next = AtomicUsize::new(0);
    let slots: Mutex<Vec<Option<Result<FacilityExtraction, InputError>>>> =
        Mutex::new((0..facilities.len()).map(|_| None).collect());

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                if cancel.is_cancelled() {
                    break;
                }
                let index = next.fetch_add(1, Ordering::SeqCst);
                if index >= facilities.len() {
                    break;
                }
                let result = extract_facility(&facilities[index], vocab, semantic);
                // Slot write is the only lock, held for a single move.
                if let Ok(mut slots) = slots.lock() {
                    slots[index] = Some(result);
                }
            });
        }
    });

    if cancel.is_cancelled() {
        return Err(ExtractionCancelled);
    }

    let slots = slots.into_inner().unwrap_or_default();
    let mut extractions = Vec::with_capacity(facilities.len());
    let mut skipped = Vec::new();
    let mut degraded = false;

    // Commit to the ledger in input order — never completion order.
    for (index, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(Ok(extraction)) => {
                degraded |= extraction.degraded;
                let step = ledger.start_step(
                    format!("extract:{}", extraction.facility_id),
                    format!(
                        "facility '{}' (row {}), 4 text fields",
                        extraction.facility_name, extraction.row_index
                    ),
                );
                ledger.record_citations(step, extraction.citations());
                ledger.end_step(
                    step,
                    format!(
                        "{} capabilities, {} anomalies{}",
                        extraction.capabilities.len(),
                        extraction.anomalies.len(),
                        if extraction.degraded {
                            " (semantic degraded)"
                        } else {
                            ""
                        }
                    ),
                );
                extractions.push(extraction);
            }
            Some(Err(e)) => {
                let row = facilities[index].row_index;
                tracing::warn!(row, error = %e, "Skipping malformed facility record");
                skipped.push((row, e.to_string()));
            }
            // A worker never observed this index (only possible when
            // cancellation raced the counter); treat as skipped.
            None => skipped.push((facilities[index].row_index, "not processed".into())),
        }
    }

    Ok(ExtractionRun {
        extractions,
        skipped,
        degraded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FacilityType;

    fn facility(id: &str, row: usize, region: &str) -> FacilityRecord {
        FacilityRecord {
            facility_id: id.into(),
            facility_name: format!("Hospital {id}"),
            region: region.into(),
            district: String::new(),
            latitude: 6.0,
            longitude: -1.0,
            facility_type: FacilityType::DistrictHospital,
            procedures_text: "Cesarean section and hernia repair".into(),
            equipment_text: "X-ray, ultrasound, operating theater, blood bank".into(),
            specialties_text: "Obstetrics, pediatrics".into(),
            staff_notes: String::new(),
            staff_count: Some(40),
            bed_capacity: Some(80),
            row_index: row,
        }
    }

    #[test]
    fn ledger_sub_steps_follow_input_order_regardless_of_concurrency() {
        let vocab = Vocabulary::medical_default();
        let facilities: Vec<FacilityRecord> = (0..16)
            .map(|i| facility(&format!("FAC{i:03}"), i, "Ashanti"))
            .collect();

        let mut ledger = ProvenanceLedger::new();
        let run = run_extraction(
            &facilities,
            &vocab,
            None,
            8,
            &CancelToken::new(),
            &mut ledger,
        )
        .unwrap();

        assert_eq!(run.extractions.len(), 16);
        let names: Vec<&str> = ledger.steps().iter().map(|s| s.name.as_str()).collect();
        let expected: Vec<String> = (0..16).map(|i| format!("extract:FAC{i:03}")).collect();
        assert_eq!(names, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn malformed_records_are_isolated_not_fatal() {
        let vocab = Vocabulary::medical_default();
        let mut facilities = vec![facility("FAC000", 0, "Volta")];
        let mut bad = facility("", 1, "Volta");
        bad.facility_id = String::new();
        facilities.push(bad);
        facilities.push(facility("FAC002", 2, "Volta"));

        let mut ledger = ProvenanceLedger::new();
        let run = run_extraction(
            &facilities,
            &vocab,
            None,
            2,
            &CancelToken::new(),
            &mut ledger,
        )
        .unwrap();

        assert_eq!(run.extractions.len(), 2);
        assert_eq!(run.skipped.len(), 1);
        assert_eq!(run.skipped[0].0, 1);
    }

    #[test]
    fn skipped_entries_cite_source_row_indices_not_slice_positions() {
        let vocab = Vocabulary::medical_default();
        // Records carry row indices from a larger source table, offset
        // from their positions in this slice.
        let mut facilities = vec![facility("FAC000", 10, "Volta")];
        let mut bad = facility("FAC001", 11, "Volta");
        bad.facility_id = String::new();
        facilities.push(bad);

        let mut ledger = ProvenanceLedger::new();
        let run = run_extraction(
            &facilities,
            &vocab,
            None,
            2,
            &CancelToken::new(),
            &mut ledger,
        )
        .unwrap();

        assert_eq!(run.skipped.len(), 1);
        assert_eq!(run.skipped[0].0, 11);
    }

    #[test]
    fn cancelled_run_returns_error_and_writes_no_steps() {
        let vocab = Vocabulary::medical_default();
        let facilities: Vec<FacilityRecord> = (0..4)
            .map(|i| facility(&format!("FAC{i:03}"), i, "Northern"))
            .collect();

        let cancel = CancelToken::new();
        cancel.cancel();

        let mut ledger = ProvenanceLedger::new();
        let result = run_extraction(&facilities, &vocab, None, 2, &cancel, &mut ledger);
        assert!(result.is_err());
        assert!(ledger.steps().is_empty());
    }

    #[test]
    fn concurrency_one_and_many_yield_identical_capability_sets() {
        let vocab = Vocabulary::medical_default();
        let facilities: Vec<FacilityRecord> = (0..6)
            .map(|i| facility(&format!("FAC{i:03}"), i, "Central"))
            .collect();

        let mut ledger_a = ProvenanceLedger::new();
        let a = run_extraction(&facilities, &vocab, None, 1, &CancelToken::new(), &mut ledger_a)
            .unwrap();
        let mut ledger_b = ProvenanceLedger::new();
        let b = run_extraction(&facilities, &vocab, None, 6, &CancelToken::new(), &mut ledger_b)
            .unwrap();

        let caps = |run: &ExtractionRun| {
            run.extractions
                .iter()
                .map(|e| serde_json::to_string(&e.capabilities).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(caps(&a), caps(&b));
    }
}
