//! Keyword scoring and relevance aggregation.
//!
//! `keywords` scans subject+body against the weighted category taxonomy;
//! `aggregate` folds entity and keyword evidence into the deterministic
//! base score, and merges the optional external judgment into the final
//! score.

pub mod aggregate;
pub mod keywords;

pub use aggregate::{MatchEvidence, PriorityTier, aggregate, merge_judgment};
pub use keywords::{KeywordCategory, KeywordHit, KeywordTaxonomy, KeywordTerm};
