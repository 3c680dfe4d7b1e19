//! Relevance Aggregator — folds entity and keyword evidence into the
//! deterministic base score and merges the optional external judgment.
//!
//! The formula is the sole ranking signal when AI scoring is disabled and
//! is pinned by tests:
//!
//! ```text
//! base = floor(weighted_keyword_score * 100 / MAX_KEYWORD_SCORE)
//!        + entity_bonus (if any entity matched)
//!        capped at 100
//! ```
//!
//! An email with zero entity matches and zero keyword hits is excluded
//! entirely — not scored, not retained. This is the primary filter that
//! keeps the tool tractable on large archives.

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::judge::JudgmentOutcome;
use crate::record::{EmailRecord, ScoredEmail};
use crate::scoring::keywords::KeywordHit;

/// Coarse reviewer-facing bucket derived from the final score.
///
/// `None` exists only transiently; the zero/zero exclusion in
/// [`aggregate`] guarantees it never reaches the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    High,
    Medium,
    Low,
    None,
}

impl PriorityTier {
    /// Tier from a score using the configured thresholds.
    pub fn from_score(score: u32, config: &ScoringConfig) -> Self {
        if score >= config.high_threshold {
            Self::High
        } else if score >= config.medium_threshold {
            Self::Medium
        } else if score > 0 {
            Self::Low
        } else {
            Self::None
        }
    }

    /// Short label for logging and export.
    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::None => "none",
        }
    }
}

/// Deterministic match evidence for one email: a pure function of the
/// record's text and the configured entity/keyword sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEvidence {
    /// Raw strings of every matched entity (empty if none).
    pub entity_matches: Vec<String>,
    /// Every (category, term) keyword hit.
    pub keyword_hits: Vec<KeywordHit>,
    /// Weighted keyword score before normalization.
    pub keyword_score: u32,
    /// The derived base score, 0-100.
    pub base_score: u32,
}

impl MatchEvidence {
    /// Distinct matched category names, in taxonomy order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for hit in &self.keyword_hits {
            if !seen.contains(&hit.category.as_str()) {
                seen.push(hit.category.as_str());
            }
        }
        seen
    }
}

/// Combine entity matches and keyword hits into a scored email.
///
/// Returns `None` — exclusion — when both evidence sets are empty.
pub fn aggregate(
    record: EmailRecord,
    entity_matches: Vec<String>,
    keyword_hits: Vec<KeywordHit>,
    keyword_score: u32,
    max_keyword_score: u32,
    config: &ScoringConfig,
) -> Option<ScoredEmail> {
    if entity_matches.is_empty() && keyword_hits.is_empty() {
        return None;
    }

    let normalized = if max_keyword_score == 0 {
        0
    } else {
        keyword_score * 100 / max_keyword_score
    };
    let bonus = if entity_matches.is_empty() {
        0
    } else {
        config.entity_bonus
    };
    let base_score = (normalized + bonus).min(100);

    let evidence = MatchEvidence {
        entity_matches,
        keyword_hits,
        keyword_score,
        base_score,
    };

    Some(ScoredEmail {
        record,
        evidence,
        judgment: None,
        final_score: base_score,
        tier: PriorityTier::from_score(base_score, config),
    })
}

/// Merge a judgment outcome into a scored email.
///
/// A successful judgment at or above the configured minimum raises the
/// final score to `max(base, judgment)`; anything else leaves the
/// deterministic baseline untouched. The tier is recomputed from the
/// final score. The AI layer can only surface additional relevance,
/// never suppress a keyword/entity hit: `final >= base` always.
pub fn merge_judgment(email: &mut ScoredEmail, outcome: JudgmentOutcome, config: &ScoringConfig) {
    let base = email.evidence.base_score;
    let final_score = match &outcome {
        JudgmentOutcome::Scored(result) if result.score >= config.min_judgment_score => {
            base.max(result.score)
        }
        _ => base,
    };

    email.judgment = Some(outcome);
    email.final_score = final_score;
    email.tier = PriorityTier::from_score(final_score, config);
}
