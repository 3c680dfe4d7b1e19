//! Keyword Scorer — weighted category taxonomy scan.
//!
//! Each category is a named set of terms sharing one weight (1-3). Terms
//! match case-insensitively as substrings unless explicitly flagged
//! whole-word, in which case they compile to `\b` regexes at load time.
//! A category counts once toward the weighted score no matter how many of
//! its terms (or occurrences) hit.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::record::EmailRecord;

/// One search term. Bare strings in the taxonomy file get substring
/// semantics; `{"text": "cmn", "whole_word": true}` gets word-boundary
/// semantics (for short terms that would otherwise fire inside unrelated
/// words).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeywordTerm {
    Substring(String),
    WholeWord {
        text: String,
        #[serde(default)]
        whole_word: bool,
    },
}

impl KeywordTerm {
    pub fn text(&self) -> &str {
        match self {
            Self::Substring(text) => text,
            Self::WholeWord { text, .. } => text,
        }
    }

    fn is_whole_word(&self) -> bool {
        matches!(self, Self::WholeWord { whole_word: true, .. })
    }
}

/// Compiled matcher for one term.
#[derive(Debug, Clone)]
enum TermMatcher {
    Substring(String),
    WholeWord(Regex),
}

impl TermMatcher {
    fn matches(&self, haystack: &str) -> bool {
        match self {
            Self::Substring(needle) => haystack.contains(needle),
            Self::WholeWord(regex) => regex.is_match(haystack),
        }
    }
}

/// A named keyword category with its weight and compiled terms.
#[derive(Debug, Clone)]
pub struct KeywordCategory {
    pub name: String,
    /// Importance weight, 1-3, higher is more important. Static per run.
    pub weight: u32,
    terms: Vec<(String, TermMatcher)>,
}

impl KeywordCategory {
    fn build(name: &str, weight: u32, terms: &[KeywordTerm]) -> Result<Self, ConfigError> {
        if !(1..=3).contains(&weight) {
            return Err(ConfigError::InvalidWeight {
                category: name.to_string(),
                weight,
            });
        }
        if terms.is_empty() {
            return Err(ConfigError::EmptyCategory {
                category: name.to_string(),
            });
        }

        let mut compiled = Vec::with_capacity(terms.len());
        for term in terms {
            let lowered = term.text().trim().to_lowercase();
            if lowered.is_empty() {
                continue;
            }
            let matcher = if term.is_whole_word() {
                let pattern = format!(r"\b{}\b", regex::escape(&lowered));
                let regex = Regex::new(&pattern).map_err(|e| ConfigError::InvalidTerm {
                    category: name.to_string(),
                    term: lowered.clone(),
                    reason: e.to_string(),
                })?;
                TermMatcher::WholeWord(regex)
            } else {
                TermMatcher::Substring(lowered.clone())
            };
            compiled.push((lowered, matcher));
        }

        if compiled.is_empty() {
            return Err(ConfigError::EmptyCategory {
                category: name.to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            weight,
            terms: compiled,
        })
    }

    /// Every term of this category that appears in the haystack.
    fn matching_terms<'a>(&'a self, haystack: &str) -> Vec<&'a str> {
        self.terms
            .iter()
            .filter(|(_, matcher)| matcher.matches(haystack))
            .map(|(text, _)| text.as_str())
            .collect()
    }
}

/// One (category, term) keyword hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordHit {
    pub category: String,
    pub term: String,
}

/// The immutable taxonomy: built once at startup, passed explicitly into
/// the scorer and aggregator. Categories are independent; an email may
/// hit several.
#[derive(Debug, Clone)]
pub struct KeywordTaxonomy {
    categories: Vec<KeywordCategory>,
    max_score: u32,
}

/// On-disk shape of one category in the taxonomy JSON file.
#[derive(Debug, Deserialize)]
struct CategorySpec {
    weight: u32,
    terms: Vec<KeywordTerm>,
}

impl KeywordTaxonomy {
    pub fn new(categories: Vec<KeywordCategory>) -> Result<Self, ConfigError> {
        if categories.is_empty() {
            return Err(ConfigError::EmptyTaxonomy);
        }
        let max_score = categories.iter().map(|c| c.weight).sum();
        Ok(Self {
            categories,
            max_score,
        })
    }

    /// Load from a JSON file: `{"category_name": {"weight": 3, "terms": [...]}}`.
    /// A `BTreeMap` keeps category order deterministic regardless of file
    /// order.
    pub fn from_json_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let specs: BTreeMap<String, CategorySpec> =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let mut categories = Vec::with_capacity(specs.len());
        for (name, spec) in &specs {
            categories.push(KeywordCategory::build(name, spec.weight, &spec.terms)?);
        }
        Self::new(categories)
    }

    /// The built-in taxonomy from the original review workflow: doctor
    /// authorizations, compliance issues, termination of marketing
    /// relationships, and general marketing-relationship context.
    pub fn default_taxonomy() -> Self {
        let sub = |terms: &[&str]| -> Vec<KeywordTerm> {
            terms
                .iter()
                .map(|t| KeywordTerm::Substring(t.to_string()))
                .collect()
        };
        let word = |text: &str| KeywordTerm::WholeWord {
            text: text.to_string(),
            whole_word: true,
        };

        let mut doctor_terms = sub(&[
            "doctor authorization",
            "physician authorization",
            "physician order",
            "physician's order",
            "doctor's order",
            "medical authorization",
            "prior authorization",
            "prior auth",
            "face-to-face",
            "face to face",
            "certificate of medical necessity",
            "medical necessity",
            "prescribing physician",
            "referring physician",
            "ordering physician",
            "written order",
            "signed order",
            "order form",
            "dme order",
            "medical records",
            "authorization form",
            "without authorization",
            "no authorization",
            "missing authorization",
            "unauthorized",
        ]);
        doctor_terms.push(word("cmn"));
        doctor_terms.push(word("f2f"));

        let compliance_terms = sub(&[
            "compliance",
            "non-compliance",
            "noncompliance",
            "non-compliant",
            "violation",
            "complaint",
            "audit",
            "investigation",
            "oversight",
            "regulatory",
            "medicare",
            "medicaid",
            "kickback",
            "anti-kickback",
            "false claim",
            "billing issue",
            "billing problem",
            "improper",
            "questionable",
            "cutting corners",
            "failed to",
            "failure to",
            "negligent",
        ]);

        let termination_terms = sub(&[
            "terminate",
            "terminated",
            "termination",
            "terminating",
            "end the relationship",
            "ending the relationship",
            "discontinue",
            "discontinued",
            "cancellation",
            "sever",
            "part ways",
            "parting ways",
            "no longer working",
            "no longer work with",
            "stop working with",
            "stopped working",
            "contract termination",
            "end of contract",
            "breach of contract",
            "effective immediately",
            "final notice",
            "new vendor",
            "different company",
        ]);

        let marketing_terms = sub(&[
            "marketing company",
            "marketing firm",
            "marketing agreement",
            "marketing contract",
            "referral",
            "patient leads",
            "patient referral",
            "sales rep",
            "account manager",
            "partnership",
            "vendor",
            "subcontractor",
            "scope of work",
            "commission",
            "invoice",
        ]);

        let categories = vec![
            KeywordCategory::build("doctor_authorization", 3, &doctor_terms)
                .expect("default taxonomy is valid"),
            KeywordCategory::build("compliance_issues", 2, &compliance_terms)
                .expect("default taxonomy is valid"),
            KeywordCategory::build("termination_language", 3, &termination_terms)
                .expect("default taxonomy is valid"),
            KeywordCategory::build("marketing_relationship", 1, &marketing_terms)
                .expect("default taxonomy is valid"),
        ];
        Self::new(categories).expect("default taxonomy is non-empty")
    }

    /// Sum of all category weights — the normalization ceiling for the
    /// base score formula.
    pub fn max_score(&self) -> u32 {
        self.max_score
    }

    pub fn categories(&self) -> &[KeywordCategory] {
        &self.categories
    }

    /// Human-readable category list for the judge's case context.
    pub fn describe(&self) -> String {
        self.categories
            .iter()
            .map(|c| format!("{} (weight {})", c.name, c.weight))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Scan a record's subject+body. Returns every (category, term) hit
    /// and the weighted score: the sum of weights over categories with at
    /// least one hit. Repeated occurrences within a category never
    /// double-count.
    pub fn scan(&self, record: &EmailRecord) -> (Vec<KeywordHit>, u32) {
        let haystack = format!("{} {}", record.subject, record.body).to_lowercase();
        if haystack.trim().is_empty() {
            return (Vec::new(), 0);
        }

        let mut hits = Vec::new();
        let mut score = 0;
        for category in &self.categories {
            let terms = category.matching_terms(&haystack);
            if terms.is_empty() {
                continue;
            }
            score += category.weight;
            hits.extend(terms.into_iter().map(|term| KeywordHit {
                category: category.name.clone(),
                term: term.to_string(),
            }));
        }
        (hits, score)
    }
}
