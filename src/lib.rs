//! Mail Triage — relevance triage for extracted email archives.
//!
//! Scores a corpus of email records against a caller-supplied entity list
//! and a weighted keyword taxonomy, optionally refines the ranking with an
//! external LLM judge, and builds a deduplicated, deterministically ordered
//! result set for export.

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod judge;
pub mod matching;
pub mod pipeline;
pub mod record;
pub mod results;
pub mod scoring;
