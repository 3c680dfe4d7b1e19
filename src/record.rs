//! Core record types — the immutable input `EmailRecord` and the scored
//! output `ScoredEmail`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::judge::JudgmentOutcome;
use crate::scoring::aggregate::{MatchEvidence, PriorityTier};

/// A single extracted email. Produced once by the extraction collaborator
/// and owned read-only by the pipeline from then on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Sender display name (may be empty).
    pub sender_name: String,
    /// Sender email address.
    pub sender_address: String,
    /// Recipient addresses, in header order. Display names included where
    /// the source had them, as `Name <addr>` is not reconstructed — the
    /// matcher normalizes either form.
    pub recipients: Vec<String>,
    /// CC addresses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body (HTML stripped by the extractor when needed).
    pub body: String,
    /// Delivery timestamp. Records without a parseable Date header carry
    /// the Unix epoch so tie ordering stays deterministic.
    pub timestamp: DateTime<Utc>,
    /// Source folder path inside the archive. Not part of identity:
    /// the same message filed in two folders is one email.
    pub folder: String,
    /// Attachment file names, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachment_names: Vec<String>,
}

impl EmailRecord {
    /// Stable identity key for deduplication: SHA-256 over the content
    /// fields (sender, recipients, subject, timestamp, body). The folder
    /// path is deliberately excluded.
    pub fn identity_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sender_address.as_bytes());
        hasher.update([0]);
        for recipient in &self.recipients {
            hasher.update(recipient.as_bytes());
            hasher.update([0]);
        }
        hasher.update(self.subject.as_bytes());
        hasher.update([0]);
        hasher.update(self.timestamp.to_rfc3339().as_bytes());
        hasher.update([0]);
        hasher.update(self.body.as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Whether the record has any searchable text at all.
    pub fn has_text(&self) -> bool {
        !self.subject.trim().is_empty() || !self.body.trim().is_empty()
    }
}

/// An email that survived the zero/zero exclusion filter, carrying its
/// deterministic evidence, optional external judgment, and final ranking.
///
/// Created by the aggregator, enriched by the judge pass when enabled,
/// then read-only for the result set builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredEmail {
    pub record: EmailRecord,
    pub evidence: MatchEvidence,
    /// Outcome of the external judge call. `None` when AI scoring is
    /// disabled; `Unavailable` when the judge was consulted but failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judgment: Option<JudgmentOutcome>,
    /// Final combined score, never below `evidence.base_score`.
    pub final_score: u32,
    pub tier: PriorityTier,
}

impl ScoredEmail {
    /// Short rationale string for export, empty when no judgment landed.
    pub fn judgment_summary(&self) -> &str {
        match &self.judgment {
            Some(JudgmentOutcome::Scored(result)) => &result.rationale,
            _ => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_record(folder: &str) -> EmailRecord {
        EmailRecord {
            sender_name: "Jane Rep".into(),
            sender_address: "rep@healthleads.com".into(),
            recipients: vec!["owner@dmeco.com".into()],
            cc: vec![],
            subject: "Physician orders".into(),
            body: "please see attached physician order".into(),
            timestamp: Utc.with_ymd_and_hms(2019, 3, 14, 9, 30, 0).unwrap(),
            folder: folder.into(),
            attachment_names: vec![],
        }
    }

    #[test]
    fn identity_ignores_folder() {
        let a = make_record("Inbox");
        let b = make_record("Deleted Items/Inbox");
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn identity_sensitive_to_body() {
        let a = make_record("Inbox");
        let mut b = make_record("Inbox");
        b.body.push_str(" thanks");
        assert_ne!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn identity_sensitive_to_recipient_order() {
        let mut a = make_record("Inbox");
        a.recipients = vec!["x@a.com".into(), "y@b.com".into()];
        let mut b = make_record("Inbox");
        b.recipients = vec!["y@b.com".into(), "x@a.com".into()];
        assert_ne!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn identity_is_stable() {
        let a = make_record("Inbox");
        assert_eq!(a.identity_key(), a.identity_key());
        assert_eq!(a.identity_key().len(), 64);
    }

    #[test]
    fn has_text_detects_blank_records() {
        let mut record = make_record("Inbox");
        assert!(record.has_text());
        record.subject = "  ".into();
        record.body = "\n".into();
        assert!(!record.has_text());
    }
}
