//! Entity Matcher — tests a record against the normalized entity list.
//!
//! Matching is deliberately liberal: this is a discovery triage tool, and
//! a false positive costs a reviewer seconds while a false negative can
//! silently drop evidence. The substring policy lives entirely in
//! [`company_mentioned`] so the tradeoff stays explicit and adjustable.

use tracing::debug;

use crate::matching::normalize::{EntityEntry, EntityKind};
use crate::record::EmailRecord;

/// Company-name tokens shorter than this are ignored during per-token
/// matching; a 2-3 char token inside unrelated words produces too much
/// noise even for a liberal policy. The full name is always tried.
const MIN_TOKEN_LEN: usize = 4;

/// Normalized, lowercased view of one email's searchable fields, computed
/// once per record and reused across all entities.
#[derive(Debug)]
pub struct SearchText {
    /// Bare addresses (sender + recipients + cc), lowercased.
    addresses: Vec<String>,
    /// Display names, subject and body joined into one whitespace-collapsed
    /// lowercase haystack for company-name matching.
    haystack: String,
}

impl SearchText {
    pub fn from_record(record: &EmailRecord) -> Self {
        let mut addresses = Vec::with_capacity(1 + record.recipients.len() + record.cc.len());
        addresses.push(address_part(&record.sender_address));
        for recipient in record.recipients.iter().chain(record.cc.iter()) {
            addresses.push(address_part(recipient));
        }

        let mut pieces: Vec<&str> = vec![&record.sender_name];
        pieces.extend(record.recipients.iter().map(String::as_str));
        pieces.push(&record.subject);
        pieces.push(&record.body);
        let haystack = collapse(&pieces.join(" "));

        Self { addresses, haystack }
    }

    fn any_address_in_domain(&self, domain: &str) -> bool {
        let suffix = format!("@{domain}");
        self.addresses.iter().any(|addr| addr.ends_with(&suffix))
    }

    fn any_address_equals(&self, address: &str) -> bool {
        self.addresses.iter().any(|addr| addr == address)
    }
}

/// Test an email against the entity list; returns the raw strings of every
/// entity that matched. Empty vec — never an error — when nothing matches
/// or no entities are configured.
pub fn match_entities(record: &EmailRecord, entities: &[EntityEntry]) -> Vec<String> {
    let text = SearchText::from_record(record);
    let mut matched = Vec::new();

    for entity in entities {
        let hit = match entity.kind {
            EntityKind::EmailDomain => text.any_address_in_domain(&entity.canonical),
            EntityKind::EmailAddress => text.any_address_equals(&entity.canonical),
            EntityKind::CompanyName => company_mentioned(entity, &text.haystack),
        };
        if hit {
            debug!(
                entity = %entity.raw,
                sender = %record.sender_address,
                "Entity matched"
            );
            matched.push(entity.raw.clone());
        }
    }

    matched
}

/// The liberal company-name policy: a company matches when its full
/// normalized name, or any of its tokens of at least [`MIN_TOKEN_LEN`]
/// chars, appears as a substring of the haystack. This lets
/// "ABC Marketing" find "ABC Marketing Group" and vice versa.
pub fn company_mentioned(entity: &EntityEntry, haystack: &str) -> bool {
    if entity.canonical.is_empty() {
        return false;
    }
    if haystack.contains(&entity.canonical) {
        return true;
    }
    entity
        .name_tokens()
        .iter()
        .any(|token| token.len() >= MIN_TOKEN_LEN && haystack.contains(token))
}

/// Extract the bare address from `Name <addr>` or a plain address,
/// lowercased.
fn address_part(raw: &str) -> String {
    let raw = raw.trim();
    if let (Some(open), Some(close)) = (raw.find('<'), raw.rfind('>'))
        && close > open
    {
        return raw[open + 1..close].trim().to_lowercase();
    }
    raw.to_lowercase()
}

/// Lowercase and collapse all whitespace runs to single spaces.
fn collapse(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
