//! External Judgment Adapter — optional semantic relevance scoring.
//!
//! The judge is a capability: the pipeline holds an `Arc<dyn Judge>` and
//! never learns whether it talks to a real model or is disabled. The
//! dispatch layer here owns everything operational — bounded concurrency,
//! per-call timeout, retry with backoff, abort — so implementations only
//! perform one call.
//!
//! Failure isolation is the core contract: any judge failure becomes an
//! `Unavailable` outcome on that one email. The pipeline never stops, and
//! export proceeds with whatever judgments were obtained.

pub mod anthropic;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{JudgeOptions, ScoringConfig};
use crate::error::JudgeError;
use crate::record::{EmailRecord, ScoredEmail};
use crate::scoring::aggregate::merge_judgment;

pub use anthropic::AnthropicJudge;

/// A successful external judgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgmentResult {
    /// Relevance score on the 0-100 scale.
    pub score: u32,
    /// One-sentence rationale from the judge.
    pub rationale: String,
    /// Whether the judge flagged the assessment as confident.
    pub confident: bool,
}

/// Outcome of consulting the judge for one email. Absence of a usable
/// score must never block export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JudgmentOutcome {
    Scored(JudgmentResult),
    Unavailable { reason: String },
}

/// Case context sent alongside each email so the judge understands what
/// "relevant" means for this run.
#[derive(Debug, Clone)]
pub struct CaseContext {
    /// Raw entity list lines.
    pub entities: Vec<String>,
    /// Human-readable taxonomy description (category names + weights).
    pub taxonomy: String,
}

/// The external judge capability.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Implementation name for logging.
    fn name(&self) -> &str;

    /// Whether this judge performs real calls. The pipeline skips the
    /// judgment pass entirely when false.
    fn enabled(&self) -> bool {
        true
    }

    /// Score one email. One attempt, one call — retries and timeouts are
    /// the dispatcher's job.
    async fn judge(
        &self,
        email: &EmailRecord,
        context: &CaseContext,
    ) -> Result<JudgmentResult, JudgeError>;
}

/// No-op judge used when AI scoring is disabled.
pub struct DisabledJudge;

#[async_trait]
impl Judge for DisabledJudge {
    fn name(&self) -> &str {
        "disabled"
    }

    fn enabled(&self) -> bool {
        false
    }

    async fn judge(
        &self,
        _email: &EmailRecord,
        _context: &CaseContext,
    ) -> Result<JudgmentResult, JudgeError> {
        Err(JudgeError::Disabled)
    }
}

/// Counts from a judgment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JudgeStats {
    pub succeeded: usize,
    pub failed: usize,
}

/// Run the judge over every scored email with bounded concurrency and
/// merge the outcomes.
///
/// Each email's outcome is keyed by its index in `emails`, so results are
/// never attributed to the wrong record regardless of completion order.
/// Setting `abort` stops new calls from being issued; in-flight calls
/// finish or time out, and their results are kept.
pub async fn run_judgments(
    emails: &mut [ScoredEmail],
    judge: Arc<dyn Judge>,
    context: &CaseContext,
    options: &JudgeOptions,
    scoring: &ScoringConfig,
    abort: Arc<AtomicBool>,
) -> JudgeStats {
    if !judge.enabled() || emails.is_empty() {
        return JudgeStats::default();
    }

    info!(
        judge = judge.name(),
        emails = emails.len(),
        concurrency = options.concurrency,
        "Running external judgment pass"
    );

    // Records are cloned out so the futures don't borrow `emails` while
    // the merge below needs it mutably.
    let jobs: Vec<(usize, EmailRecord)> = emails
        .iter()
        .enumerate()
        .map(|(i, e)| (i, e.record.clone()))
        .collect();

    let outcomes: Vec<(usize, JudgmentOutcome)> = stream::iter(jobs)
        .map(|(index, record)| {
            let judge = Arc::clone(&judge);
            let abort = Arc::clone(&abort);
            async move {
                if abort.load(Ordering::Relaxed) {
                    return (
                        index,
                        JudgmentOutcome::Unavailable {
                            reason: JudgeError::Aborted.to_string(),
                        },
                    );
                }
                let outcome = judge_with_retry(&*judge, &record, context, options).await;
                (index, outcome)
            }
        })
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

    let mut stats = JudgeStats::default();
    for (index, outcome) in outcomes {
        match &outcome {
            JudgmentOutcome::Scored(result) => {
                stats.succeeded += 1;
                debug!(index, score = result.score, "Judgment merged");
            }
            JudgmentOutcome::Unavailable { reason } => {
                stats.failed += 1;
                debug!(index, reason = %reason, "Judgment unavailable");
            }
        }
        merge_judgment(&mut emails[index], outcome, scoring);
    }

    info!(
        succeeded = stats.succeeded,
        failed = stats.failed,
        "Judgment pass complete"
    );
    stats
}

/// One email's retry loop: per-attempt timeout, exponential backoff with
/// jitter for transient failures, immediate stop for permanent ones.
async fn judge_with_retry(
    judge: &dyn Judge,
    record: &EmailRecord,
    context: &CaseContext,
    options: &JudgeOptions,
) -> JudgmentOutcome {
    let mut last_error = JudgeError::Disabled;

    for attempt in 1..=options.max_attempts.max(1) {
        let call = judge.judge(record, context);
        let result = match tokio::time::timeout(options.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(JudgeError::Timeout(options.call_timeout)),
        };

        match result {
            Ok(judgment) => return JudgmentOutcome::Scored(judgment),
            Err(e) => {
                let transient = e.is_transient();
                warn!(
                    sender = %record.sender_address,
                    attempt,
                    transient,
                    error = %e,
                    "Judge call failed"
                );
                last_error = e;
                if !transient || attempt == options.max_attempts {
                    break;
                }
                tokio::time::sleep(backoff_delay(options, attempt)).await;
            }
        }
    }

    JudgmentOutcome::Unavailable {
        reason: last_error.to_string(),
    }
}

/// Exponential backoff with ±50% jitter: base * 2^(attempt-1) * [0.5, 1.5).
fn backoff_delay(options: &JudgeOptions, attempt: u32) -> std::time::Duration {
    let exp = options.backoff_base.as_millis() as u64 * (1u64 << (attempt - 1).min(16));
    let jitter = rand::thread_rng().gen_range(0.5..1.5);
    std::time::Duration::from_millis((exp as f64 * jitter) as u64)
}
