//! Merging of rule and semantic candidates for one facility.
//!
//! Candidates are keyed by (kind, normalized name). When both extraction
//! paths detect the same capability, the higher-confidence candidate is
//! kept as primary but both citations are retained — provenance is never
//! narrowed by merging.

use std::collections::BTreeMap;

use crate::models::{CandidateSource, CapabilityCandidate, Citation};

/// A deduplicated candidate carrying every citation that contributed to it.
#[derive(Debug, Clone)]
pub struct MergedCandidate {
    pub primary: CapabilityCandidate,
    pub citations: Vec<Citation>,
}

impl MergedCandidate {
    fn from_single(candidate: CapabilityCandidate) -> Self {
        let citation = candidate.citation.clone();
        Self {
            primary: candidate,
            citations: vec![citation],
        }
    }

    fn absorb(&mut self, other: CapabilityCandidate) {
        let other_citation = other.citation.clone();

        // Keep whichever has higher confidence as primary; on a tie the
        // rule candidate wins so the deterministic path stays primary.
        let other_wins = other.confidence > self.primary.confidence
            || (other.confidence == self.primary.confidence
                && other.source == CandidateSource::Rule
                && self.primary.source == CandidateSource::Semantic);

        if other_wins {
            let kept_quantity = self.primary.quantity;
            self.primary = other;
            if self.primary.quantity.is_none() {
                self.primary.quantity = kept_quantity;
            }
        } else if self.primary.quantity.is_none() {
            self.primary.quantity = other.quantity;
        }
        self.citations.push(other_citation);
    }
}

/// Merge rule and semantic candidates by (kind, normalized name).
///
/// Output order is deterministic: sorted by kind, then name.
pub fn merge_candidates(
    rule: Vec<CapabilityCandidate>,
    semantic: Vec<CapabilityCandidate>,
) -> Vec<MergedCandidate> {
    let mut merged: BTreeMap<(crate::models::CapabilityKind, String), MergedCandidate> =
        BTreeMap::new();

    for candidate in rule.into_iter().chain(semantic) {
        let key = (candidate.kind, candidate.name.to_ascii_lowercase());
        match merged.get_mut(&key) {
            Some(existing) => existing.absorb(candidate),
            None => {
                merged.insert(key, MergedCandidate::from_single(candidate));
            }
        }
    }

    merged.into_values().collect()
}
