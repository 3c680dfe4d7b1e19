//! Entity Normalizer — canonicalizes raw entity strings.
//!
//! Classification rules, applied in order:
//! 1. trim whitespace
//! 2. leading `@` → email domain, remainder lowercased
//! 3. contains `@` with a domain part → full address, lowercased
//! 4. otherwise → company name: lowercased, trailing corporate suffixes
//!    stripped, internal whitespace collapsed
//!
//! Deterministic and idempotent: normalizing a canonical form yields the
//! same entry.

use serde::{Deserialize, Serialize};

/// Corporate suffixes stripped from the tail of company names. Matched as
/// trailing whitespace-delimited tokens only, with or without a leading
/// comma or trailing period, so "Widgets, LLC." and "Widgets LLC" both
/// normalize to "widgets" while "Co-op Partners" keeps its name.
const CORPORATE_SUFFIXES: &[&str] = &["llc", "inc", "corp", "co", "ltd", "company"];

/// What kind of target an entity entry denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A company name; matched liberally against display names and text.
    CompanyName,
    /// An email domain; matched as an address suffix.
    EmailDomain,
    /// A full email address; matched by exact equality.
    EmailAddress,
}

/// One normalized target from the caller's entity list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityEntry {
    /// The raw input line, preserved for reporting.
    pub raw: String,
    /// Canonical lowercased form used for matching.
    pub canonical: String,
    pub kind: EntityKind,
}

impl EntityEntry {
    /// Whitespace-delimited tokens of a company name. Empty for domains
    /// and addresses.
    pub fn name_tokens(&self) -> Vec<&str> {
        match self.kind {
            EntityKind::CompanyName => self.canonical.split_whitespace().collect(),
            _ => Vec::new(),
        }
    }
}

/// Normalize one raw entity line. Returns `None` for blank lines and
/// `#` comments.
pub fn normalize(raw: &str) -> Option<EntityEntry> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    if let Some(domain) = trimmed.strip_prefix('@') {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() {
            return None;
        }
        return Some(EntityEntry {
            raw: trimmed.to_string(),
            canonical: domain,
            kind: EntityKind::EmailDomain,
        });
    }

    if let Some(at) = trimmed.find('@') {
        // Full address only when there's a non-empty domain part.
        if at + 1 < trimmed.len() {
            return Some(EntityEntry {
                raw: trimmed.to_string(),
                canonical: trimmed.to_lowercase(),
                kind: EntityKind::EmailAddress,
            });
        }
    }

    Some(EntityEntry {
        raw: trimmed.to_string(),
        canonical: normalize_company_name(trimmed),
        kind: EntityKind::CompanyName,
    })
}

/// Normalize every line of an entity list, dropping blanks and comments.
pub fn normalize_all<I, S>(lines: I) -> Vec<EntityEntry>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| normalize(line.as_ref()))
        .collect()
}

/// Lowercase, strip trailing corporate suffixes, collapse whitespace.
fn normalize_company_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();

    while let Some(last) = tokens.last() {
        let bare = last
            .trim_start_matches(',')
            .trim_end_matches('.')
            .trim_end_matches(',');
        if tokens.len() > 1 && CORPORATE_SUFFIXES.contains(&bare) {
            tokens.pop();
            // A suffix attached via comma leaves the comma on the previous
            // token ("widgets," "llc"); clean it up.
            if let Some(prev) = tokens.pop() {
                let cleaned = prev.trim_end_matches(',');
                if !cleaned.is_empty() {
                    tokens.push(cleaned);
                }
            }
        } else {
            break;
        }
    }

    tokens.join(" ")
}
