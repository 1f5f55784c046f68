//! Query understanding: intent classification and entity extraction.
//!
//! Intent is classified with a small keyword ruleset; entities are pulled
//! from the query text with the same vocabulary matcher used on facility
//! fields, so a capability named in a question resolves to the same
//! canonical term it resolves to in facility records.

use serde::{Deserialize, Serialize};

use crate::models::{CapabilityKind, SourceField};
use crate::vocabulary::{CitationContext, Vocabulary, VocabularyMatcher};

/// What the caller is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    FindFacilities,
    IdentifyGaps,
    FindMedicalDeserts,
    AnalyzeCoverage,
    General,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::FindFacilities => "find_facilities",
            QueryIntent::IdentifyGaps => "identify_gaps",
            QueryIntent::FindMedicalDeserts => "find_medical_deserts",
            QueryIntent::AnalyzeCoverage => "analyze_coverage",
            QueryIntent::General => "general",
        }
    }
}

/// Entities recognized in the query text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryEntities {
    /// Canonical capability names mentioned in the query, with kind.
    pub capabilities: Vec<(CapabilityKind, String)>,
    /// A region name mentioned in the query, matched against the regions
    /// present in the facility data.
    pub region: Option<String>,
}

/// Parsed query: intent plus extracted entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub intent: QueryIntent,
    pub entities: QueryEntities,
}

const SEARCH_WORDS: &[&str] = &["which", "what", "find", "show", "list", "where"];
const GAP_WORDS: &[&str] = &["gap", "missing", "lack"];

/// Classify intent and extract entities from a natural-language query.
///
/// `known_regions` is the set of region names present in the input data;
/// region matching is case-insensitive substring search, first hit wins.
pub fn understand_query(
    query: &str,
    vocab: &Vocabulary,
    known_regions: &[&str],
) -> ParsedQuery {
    let lowered = query.to_ascii_lowercase();

    let intent = if SEARCH_WORDS.iter().any(|w| lowered.contains(w)) {
        if GAP_WORDS.iter().any(|w| lowered.contains(w)) {
            QueryIntent::IdentifyGaps
        } else if lowered.contains("desert") {
            QueryIntent::FindMedicalDeserts
        } else {
            QueryIntent::FindFacilities
        }
    } else if lowered.contains("analyze") || lowered.contains("coverage") {
        QueryIntent::AnalyzeCoverage
    } else {
        QueryIntent::General
    };

    let matcher = VocabularyMatcher::new(vocab);
    let ctx = CitationContext {
        facility_id: "query",
        field: SourceField::Query,
        row_index: 0,
    };
    let capabilities = matcher
        .match_text(
            query,
            &[
                CapabilityKind::Procedure,
                CapabilityKind::Equipment,
                CapabilityKind::Specialty,
            ],
            &ctx,
        )
        .into_iter()
        .map(|c| (c.kind, c.name))
        .collect();

    let region = known_regions
        .iter()
        .find(|r| lowered.contains(&r.to_ascii_lowercase()))
        .map(|r| r.to_string());

    ParsedQuery {
        intent,
        entities: QueryEntities {
            capabilities,
            region,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGIONS: &[&str] = &["Greater Accra", "Ashanti", "Northern", "Volta"];

    fn parse(query: &str) -> ParsedQuery {
        understand_query(query, &Vocabulary::medical_default(), REGIONS)
    }

    #[test]
    fn facility_search_intent_with_capability_and_region() {
        let parsed = parse("Which facilities in Greater Accra offer cardiac surgery?");
        assert_eq!(parsed.intent, QueryIntent::FindFacilities);
        assert_eq!(parsed.entities.region.as_deref(), Some("Greater Accra"));
        assert!(parsed
            .entities
            .capabilities
            .iter()
            .any(|(k, n)| *k == CapabilityKind::Procedure && n == "Cardiac Surgery"));
    }

    #[test]
    fn gap_words_override_facility_search() {
        let parsed = parse("Show me missing capabilities in the Northern region");
        assert_eq!(parsed.intent, QueryIntent::IdentifyGaps);
        assert_eq!(parsed.entities.region.as_deref(), Some("Northern"));
    }

    #[test]
    fn desert_queries_classify_as_deserts() {
        let parsed = parse("Find medical deserts");
        assert_eq!(parsed.intent, QueryIntent::FindMedicalDeserts);
    }

    #[test]
    fn coverage_queries_classify_as_analysis() {
        let parsed = parse("Analyze healthcare coverage across regions");
        assert_eq!(parsed.intent, QueryIntent::AnalyzeCoverage);
    }

    #[test]
    fn unmatched_queries_fall_back_to_general() {
        let parsed = parse("hello there");
        assert_eq!(parsed.intent, QueryIntent::General);
        assert!(parsed.entities.capabilities.is_empty());
        assert!(parsed.entities.region.is_none());
    }

    #[test]
    fn synonym_in_query_resolves_to_canonical_term() {
        let parsed = parse("Which hospitals have an mri?");
        assert!(parsed
            .entities
            .capabilities
            .iter()
            .any(|(k, n)| *k == CapabilityKind::Equipment && n == "MRI Scanner"));
    }
}
