//! Configuration types and loaders.

use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Scoring constants. The defaults are the reference values from the
/// original review workflow; callers may override any of them, and the
/// formula itself never changes mid-run.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Flat bonus added to the keyword score when at least one entity
    /// matched. Entity relevance is independently informative of keyword
    /// relevance.
    pub entity_bonus: u32,
    /// Final scores at or above this are high priority.
    pub high_threshold: u32,
    /// Final scores at or above this (and below high) are medium priority.
    pub medium_threshold: u32,
    /// A judge score below this is treated as too uncertain to raise the
    /// deterministic baseline.
    pub min_judgment_score: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            entity_bonus: 20,
            high_threshold: 70,
            medium_threshold: 40,
            min_judgment_score: 50,
        }
    }
}

/// Dispatch options for the external judge pass.
#[derive(Debug, Clone)]
pub struct JudgeOptions {
    /// Maximum in-flight judge calls. Sized to stay under the external
    /// API's rate limit.
    pub concurrency: usize,
    /// Per-call timeout (covers one HTTP attempt, not the retry loop).
    pub call_timeout: Duration,
    /// Total attempts per email, including the first.
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub backoff_base: Duration,
}

impl Default for JudgeOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            call_timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
        }
    }
}

/// Load raw entity lines from a text file.
///
/// One entity per line: a company name, an `@domain`, or a full address.
/// Blank lines and `#` comments are dropped. An empty result is a
/// fail-fast error — matching against nothing would report "no relevant
/// emails" and mean nothing by it.
pub fn load_entity_lines(path: &Path) -> Result<Vec<String>, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let lines: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect();

    if lines.is_empty() {
        return Err(ConfigError::EmptyEntityList {
            path: path.display().to_string(),
        });
    }
    Ok(lines)
}
