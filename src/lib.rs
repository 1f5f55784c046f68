//! Desertwatch — capability intelligence for healthcare facility records.
//!
//! Turns free-text facility descriptions into typed, provenance-tracked
//! capability records, cross-validates the claims for consistency, and
//! aggregates them per region to flag underserved areas (medical deserts).
//!
//! The pipeline is a four-stage state machine driven by
//! [`orchestrator::PipelineOrchestrator`]:
//!
//! 1. **Understand query** — classify intent and extract entities from the
//!    user's question ([`query`]).
//! 2. **Extract** — rule-based vocabulary matching ([`vocabulary`]) plus
//!    optional semantic augmentation ([`pipeline::semantic`]), merged and
//!    cross-validated per facility ([`pipeline`]).
//! 3. **Analyze** — regional aggregation and desert-risk scoring
//!    ([`regional`]).
//! 4. **Synthesize** — assemble the response with its full citation trail
//!    ([`provenance`]).
//!
//! Every externally visible claim carries at least one [`models::Citation`]
//! back to the exact source text; a claim with zero citations is treated as
//! an internal defect, never a valid state.

pub mod config;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod provenance;
pub mod query;
pub mod regional;
pub mod vocabulary;

#[cfg(test)]
mod integration_tests;
