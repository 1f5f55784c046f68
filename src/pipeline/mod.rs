//! Per-facility extraction pipeline: vocabulary matching + semantic
//! augmentation, candidate merging, cross-validation, and the bounded
//! worker pool that runs facilities concurrently.

pub mod extractor;
pub mod merge;
pub mod runner;
pub mod semantic;
pub mod validate;

pub use extractor::{extract_facility, FacilityExtraction};
pub use merge::{merge_candidates, MergedCandidate};
pub use runner::{run_extraction, ExtractionRun};
pub use validate::{cross_validate, ValidationOutcome};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Run-level cancellation flag.
///
/// Cancelling aborts remaining extraction work; the orchestrator then
/// transitions directly to Failed without attempting aggregation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_flips_once_for_all_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
