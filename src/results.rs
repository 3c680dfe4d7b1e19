//! Result Set Builder — dedup, deterministic ordering, truncation, and
//! run statistics.
//!
//! Ordering is part of the work product: the result sequence must be
//! byte-for-byte reproducible across runs on identical input. Sort key is
//! final score descending, then timestamp ascending (earlier
//! correspondence first among equal scores), then identity key ascending
//! as a total-order tiebreak.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::judge::JudgeStats;
use crate::record::ScoredEmail;
use crate::scoring::aggregate::PriorityTier;

/// Counters surfaced to the reviewer so completeness can be assessed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    /// Records supplied by the extraction collaborator.
    pub scanned: usize,
    /// Records excluded by the zero-entity/zero-keyword filter.
    pub excluded: usize,
    /// Unreadable records skipped during extraction.
    pub skipped: usize,
    /// Records in the final result set (after dedup and truncation).
    pub retained: usize,
    /// Duplicates collapsed by the identity key.
    pub deduplicated: usize,
    /// External judgments that produced a score.
    pub judged_ok: usize,
    /// External judgments that failed or were aborted.
    pub judged_failed: usize,
    /// Result count per priority tier.
    pub per_tier: BTreeMap<String, usize>,
    /// Result count per matched entity (raw entity string).
    pub per_entity: BTreeMap<String, usize>,
    /// Result count per keyword category.
    pub per_category: BTreeMap<String, usize>,
}

/// The final, order-stable result set handed to the export collaborator.
/// Fields are fully populated before handoff and never mutated after.
#[derive(Debug, Clone)]
pub struct ResultSet {
    /// Deduplicated, sorted, truncated results.
    pub emails: Vec<ScoredEmail>,
    pub statistics: Statistics,
}

impl ResultSet {
    /// The high-priority view: results in the high tier, in ranking order.
    pub fn high_priority(&self) -> Vec<&ScoredEmail> {
        self.emails
            .iter()
            .filter(|e| e.tier == PriorityTier::High)
            .collect()
    }
}

/// Inputs the builder needs beyond the scored emails themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunCounts {
    pub scanned: usize,
    pub excluded: usize,
    pub skipped: usize,
    pub judge: JudgeStats,
}

/// Build the result set: dedup by identity key (higher final score wins),
/// sort, truncate to `max_results` after sorting, and derive statistics.
pub fn build(
    scored: Vec<ScoredEmail>,
    max_results: Option<usize>,
    counts: RunCounts,
) -> ResultSet {
    let before_dedup = scored.len();

    // Dedup keeps the instance with the higher final score; on equal
    // scores the first one seen wins, which is deterministic because the
    // caller materialized the inputs in extraction order.
    let mut by_identity: BTreeMap<String, ScoredEmail> = BTreeMap::new();
    for email in scored {
        let key = email.record.identity_key();
        match by_identity.get(&key) {
            Some(existing) if existing.final_score >= email.final_score => {
                debug!(key = %key, "Dropping duplicate with lower score");
            }
            _ => {
                by_identity.insert(key, email);
            }
        }
    }

    let deduplicated = before_dedup - by_identity.len();
    let mut emails: Vec<ScoredEmail> = by_identity.into_values().collect();

    emails.sort_by(|a, b| {
        b.final_score
            .cmp(&a.final_score)
            .then_with(|| a.record.timestamp.cmp(&b.record.timestamp))
            .then_with(|| a.record.identity_key().cmp(&b.record.identity_key()))
    });

    // Truncation must follow dedup and sort or the top-N guarantee breaks.
    if let Some(max) = max_results {
        emails.truncate(max);
    }

    let mut statistics = Statistics {
        scanned: counts.scanned,
        excluded: counts.excluded,
        skipped: counts.skipped,
        retained: emails.len(),
        deduplicated,
        judged_ok: counts.judge.succeeded,
        judged_failed: counts.judge.failed,
        ..Statistics::default()
    };

    for email in &emails {
        *statistics
            .per_tier
            .entry(email.tier.label().to_string())
            .or_default() += 1;
        for entity in &email.evidence.entity_matches {
            *statistics.per_entity.entry(entity.clone()).or_default() += 1;
        }
        for category in email.evidence.categories() {
            *statistics.per_category.entry(category.to_string()).or_default() += 1;
        }
    }

    info!(
        scanned = statistics.scanned,
        retained = statistics.retained,
        excluded = statistics.excluded,
        deduplicated = statistics.deduplicated,
        "Result set built"
    );

    ResultSet { emails, statistics }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::record::EmailRecord;
    use crate::scoring::aggregate::aggregate;
    use crate::scoring::keywords::KeywordHit;
    use chrono::{TimeZone, Utc};

    fn make_scored(
        subject: &str,
        folder: &str,
        keyword_score: u32,
        hour: u32,
    ) -> ScoredEmail {
        let record = EmailRecord {
            sender_name: "".into(),
            sender_address: "rep@healthleads.com".into(),
            recipients: vec!["owner@dmeco.com".into()],
            cc: vec![],
            subject: subject.into(),
            body: "body text".into(),
            timestamp: Utc.with_ymd_and_hms(2019, 3, 14, hour, 0, 0).unwrap(),
            folder: folder.into(),
            attachment_names: vec![],
        };
        aggregate(
            record,
            vec!["@healthleads.com".into()],
            vec![KeywordHit {
                category: "doctor_authorization".into(),
                term: "physician order".into(),
            }],
            keyword_score,
            9,
            &ScoringConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn duplicates_collapse_to_higher_score() {
        // Same content in two folders, one copy scored higher (e.g. its
        // judgment landed).
        let low = make_scored("same", "Inbox", 3, 9);
        let mut high = make_scored("same", "Deleted Items", 3, 9);
        high.final_score = 95;

        let set = build(vec![low, high], None, RunCounts::default());
        assert_eq!(set.emails.len(), 1);
        assert_eq!(set.emails[0].final_score, 95);
        assert_eq!(set.statistics.deduplicated, 1);
    }

    #[test]
    fn sorted_by_score_then_timestamp() {
        let set = build(
            vec![
                make_scored("low early", "Inbox", 3, 8),
                make_scored("high", "Inbox", 9, 12),
                make_scored("low late", "Inbox", 3, 16),
            ],
            None,
            RunCounts::default(),
        );
        assert_eq!(set.emails[0].record.subject, "high");
        // Equal scores: earlier correspondence first.
        assert_eq!(set.emails[1].record.subject, "low early");
        assert_eq!(set.emails[2].record.subject, "low late");
    }

    #[test]
    fn ordering_stable_across_runs() {
        let inputs = || {
            vec![
                make_scored("a", "Inbox", 3, 10),
                make_scored("b", "Inbox", 3, 10),
                make_scored("c", "Inbox", 6, 10),
            ]
        };
        let first: Vec<String> = build(inputs(), None, RunCounts::default())
            .emails
            .iter()
            .map(|e| e.record.subject.clone())
            .collect();
        let second: Vec<String> = build(inputs(), None, RunCounts::default())
            .emails
            .iter()
            .map(|e| e.record.subject.clone())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn truncation_happens_after_sort() {
        let set = build(
            vec![
                make_scored("low", "Inbox", 3, 10),
                make_scored("high", "Inbox", 9, 10),
                make_scored("mid", "Inbox", 6, 10),
            ],
            Some(2),
            RunCounts::default(),
        );
        assert_eq!(set.emails.len(), 2);
        assert_eq!(set.emails[0].record.subject, "high");
        assert_eq!(set.emails[1].record.subject, "mid");
    }

    #[test]
    fn truncation_follows_dedup() {
        // A duplicate must not consume a slot of the top-N.
        let dup_a = make_scored("same", "Inbox", 9, 10);
        let dup_b = make_scored("same", "Archive", 9, 10);
        let other = make_scored("other", "Inbox", 3, 10);

        let set = build(vec![dup_a, dup_b, other], Some(2), RunCounts::default());
        assert_eq!(set.emails.len(), 2);
        let subjects: Vec<&str> = set
            .emails
            .iter()
            .map(|e| e.record.subject.as_str())
            .collect();
        assert!(subjects.contains(&"same"));
        assert!(subjects.contains(&"other"));
    }

    #[test]
    fn statistics_counts() {
        let counts = RunCounts {
            scanned: 10,
            excluded: 7,
            skipped: 1,
            judge: JudgeStats {
                succeeded: 1,
                failed: 1,
            },
        };
        let set = build(
            vec![
                make_scored("a", "Inbox", 9, 10),
                make_scored("b", "Inbox", 3, 11),
            ],
            None,
            counts,
        );

        assert_eq!(set.statistics.scanned, 10);
        assert_eq!(set.statistics.excluded, 7);
        assert_eq!(set.statistics.skipped, 1);
        assert_eq!(set.statistics.retained, 2);
        assert_eq!(set.statistics.judged_ok, 1);
        assert_eq!(set.statistics.judged_failed, 1);
        assert_eq!(set.statistics.per_entity["@healthleads.com"], 2);
        assert_eq!(set.statistics.per_category["doctor_authorization"], 2);
        // 9/9*100+20 → 100 high; 3/9*100+20 → 53 medium.
        assert_eq!(set.statistics.per_tier["high"], 1);
        assert_eq!(set.statistics.per_tier["medium"], 1);
    }

    #[test]
    fn high_priority_view_filters_tier() {
        let set = build(
            vec![
                make_scored("high", "Inbox", 9, 10),
                make_scored("mid", "Inbox", 3, 10),
            ],
            None,
            RunCounts::default(),
        );
        let high = set.high_priority();
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].record.subject, "high");
    }

    #[test]
    fn empty_input_is_fine() {
        let set = build(vec![], None, RunCounts::default());
        assert!(set.emails.is_empty());
        assert_eq!(set.statistics.retained, 0);
    }
}
