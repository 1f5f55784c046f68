//! Rule-based phrase matching over the domain vocabulary.
//!
//! Case-insensitive word-bounded matching of canonical terms and synonyms,
//! with a fixed context window around each hit used to infer quantities
//! ("200 cardiac surgeries annually") and operational status ("broken for
//! 6 months"). Malformed text never fails — it just yields no candidates.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{
    CandidateSource, CapabilityCandidate, CapabilityKind, Citation, OperationalStatus, SourceField,
};

use super::Vocabulary;

/// Context window (bytes) captured around each match for status inference
/// and for the citation snippet.
const CONTEXT_WINDOW: usize = 60;

/// Wider window used for procedure volume inference — volume statements
/// ("200 cardiac surgeries annually") often sit a sentence away from the
/// first mention of the procedure.
const VOLUME_WINDOW: usize = 120;

/// Confidence for a hit on the canonical spelling.
const CANONICAL_CONFIDENCE: f32 = 0.90;
/// Confidence for a hit on a synonym — slightly lower by design.
const SYNONYM_CONFIDENCE: f32 = 0.85;

/// Markers that flag equipment or claims as out of service.
const BROKEN_MARKERS: &[&str] = &[
    "broken",
    "not working",
    "non-functional",
    "nonfunctional",
    "out of order",
    "out of service",
    "under repair",
    "awaiting repair",
    "awaiting replacement",
    "broke down",
];

/// Markers that flag a claim as asserted but unverified.
const CLAIMED_MARKERS: &[&str] = &[
    "claims",
    "claimed",
    "reportedly",
    "unverified",
    "not verified",
    "allegedly",
];

/// Procedure volume: a count followed (within a couple of words) by a unit
/// word, e.g. "200 cardiac surgeries annually".
static VOLUME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,6})\s+(?:[a-z-]+\s+){0,2}(?:surgeries|procedures|operations|deliveries|cases|sessions)\b")
        .unwrap()
});

/// Equipment count immediately preceding the term ("2 ultrasound"). A count
/// separated by a strength modifier ("3 Tesla MRI", "128-slice CT") is a
/// specification, not a quantity, and deliberately does not match here.
static COUNT_BEFORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3})\s*(?:x\s*)?$").unwrap());

/// Equipment count in a trailing parenthetical ("x-ray (2 units)").
static COUNT_AFTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\(?(\d{1,3})\)?\s*(?:units?|machines?|scanners?)\b").unwrap());

/// Identifies where a piece of text came from, for citation construction.
#[derive(Debug, Clone)]
pub struct CitationContext<'a> {
    pub facility_id: &'a str,
    pub field: SourceField,
    pub row_index: usize,
}

/// Keyword/pattern extractor over a fixed domain vocabulary.
pub struct VocabularyMatcher<'a> {
    vocab: &'a Vocabulary,
}

struct TermHit {
    /// Byte offset of the earliest match for this canonical term.
    first_pos: usize,
    /// Length of the matched surface form at `first_pos`.
    first_len: usize,
    /// Highest confidence across all surface forms that hit.
    confidence: f32,
}

impl<'a> VocabularyMatcher<'a> {
    pub fn new(vocab: &'a Vocabulary) -> Self {
        Self { vocab }
    }

    /// Extract capability candidates of the given kinds from one free-text
    /// field. Multiple matches of the same canonical term deduplicate,
    /// keeping the highest confidence and the first citation span.
    pub fn match_text(
        &self,
        text: &str,
        kinds: &[CapabilityKind],
        ctx: &CitationContext<'_>,
    ) -> Vec<CapabilityCandidate> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        // ASCII lowering preserves byte offsets, so match positions in the
        // lowered text index directly into the original.
        let lower = text.to_ascii_lowercase();

        let mut candidates = Vec::new();
        for kind in kinds {
            // BTreeMap keyed by canonical name keeps output order stable.
            let mut hits: BTreeMap<&str, TermHit> = BTreeMap::new();

            for term in self.vocab.terms_of_kind(*kind) {
                let canonical_lower = term.canonical.to_ascii_lowercase();
                let mut surfaces: Vec<(String, f32)> = vec![(canonical_lower, CANONICAL_CONFIDENCE)];
                for syn in &term.synonyms {
                    surfaces.push((syn.to_ascii_lowercase(), SYNONYM_CONFIDENCE));
                }

                for (surface, confidence) in surfaces {
                    let Some(pos) = find_word_bounded(&lower, &surface) else {
                        continue;
                    };
                    let entry = hits.entry(term.canonical.as_str()).or_insert(TermHit {
                        first_pos: pos,
                        first_len: surface.len(),
                        confidence,
                    });
                    if confidence > entry.confidence {
                        entry.confidence = confidence;
                    }
                    if pos < entry.first_pos {
                        entry.first_pos = pos;
                        entry.first_len = surface.len();
                    }
                }
            }

            for (canonical, hit) in hits {
                candidates.push(self.build_candidate(text, &lower, *kind, canonical, &hit, ctx));
            }
        }

        candidates
    }

    fn build_candidate(
        &self,
        text: &str,
        lower: &str,
        kind: CapabilityKind,
        canonical: &str,
        hit: &TermHit,
        ctx: &CitationContext<'_>,
    ) -> CapabilityCandidate {
        let window_start = floor_char_boundary(text, hit.first_pos.saturating_sub(CONTEXT_WINDOW));
        let window_end = ceil_char_boundary(
            text,
            (hit.first_pos + hit.first_len + CONTEXT_WINDOW).min(text.len()),
        );
        let snippet = text[window_start..window_end].trim();
        let window_lower = &lower[window_start..window_end];

        let quantity = match kind {
            CapabilityKind::Procedure => {
                let wide_start =
                    floor_char_boundary(text, hit.first_pos.saturating_sub(VOLUME_WINDOW));
                let wide_end = ceil_char_boundary(
                    text,
                    (hit.first_pos + hit.first_len + VOLUME_WINDOW).min(text.len()),
                );
                infer_volume(&lower[wide_start..wide_end])
            }
            CapabilityKind::Equipment => {
                infer_equipment_count(lower, hit.first_pos, hit.first_len, window_start, window_end)
                    .or(Some(1))
            }
            CapabilityKind::Specialty => None,
        };

        CapabilityCandidate {
            kind,
            name: canonical.to_string(),
            quantity,
            status: infer_status(window_lower),
            confidence: hit.confidence,
            source: CandidateSource::Rule,
            citation: Citation::new(
                ctx.facility_id,
                ctx.field,
                snippet,
                ctx.row_index,
                hit.confidence,
            ),
        }
    }
}

/// First occurrence of `needle` in `haystack` at word boundaries on both
/// sides, so "icu" does not fire inside "curriculum".
fn find_word_bounded(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(rel) = haystack[from..].find(needle) {
        let pos = from + rel;
        let end = pos + needle.len();
        let before_ok = pos == 0 || !bytes[pos - 1].is_ascii_alphanumeric();
        let after_ok = end >= bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return Some(pos);
        }
        from = pos + 1;
    }
    None
}

/// Procedure volume from the context window.
fn infer_volume(window_lower: &str) -> Option<u32> {
    VOLUME_RE
        .captures(window_lower)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Explicit equipment count adjacent to the match, if any.
fn infer_equipment_count(
    lower: &str,
    pos: usize,
    len: usize,
    window_start: usize,
    window_end: usize,
) -> Option<u32> {
    let before = &lower[window_start..pos];
    if let Some(caps) = COUNT_BEFORE_RE.captures(before) {
        return caps.get(1).and_then(|m| m.as_str().parse().ok());
    }
    let after = &lower[(pos + len).min(window_end)..window_end];
    COUNT_AFTER_RE
        .captures(after)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Operational status from the state-keyword lexicon.
fn infer_status(window_lower: &str) -> OperationalStatus {
    if BROKEN_MARKERS.iter().any(|m| window_lower.contains(m)) {
        OperationalStatus::Broken
    } else if CLAIMED_MARKERS.iter().any(|m| window_lower.contains(m)) {
        OperationalStatus::ClaimedUnverified
    } else {
        OperationalStatus::Operational
    }
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
