//! Pipeline orchestrator — wires extraction output through matching,
//! scoring, the optional judge pass, and the result set builder.
//!
//! The pipeline owns the run-wide immutable state (entity list, taxonomy,
//! scoring constants) and the judge capability. Per-record work is pure;
//! the only async stage is the judgment pass.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tracing::info;

use crate::config::{JudgeOptions, ScoringConfig};
use crate::error::ConfigError;
use crate::extract::Extraction;
use crate::judge::{CaseContext, DisabledJudge, Judge, run_judgments};
use crate::matching::matcher::match_entities;
use crate::matching::normalize::{EntityEntry, normalize_all};
use crate::record::ScoredEmail;
use crate::results::{ResultSet, RunCounts, build};
use crate::scoring::aggregate::aggregate;
use crate::scoring::keywords::KeywordTaxonomy;

pub struct Pipeline {
    /// Raw entity lines, kept for the judge's case context and statistics.
    raw_entities: Vec<String>,
    entities: Vec<EntityEntry>,
    taxonomy: KeywordTaxonomy,
    scoring: ScoringConfig,
    judge_options: JudgeOptions,
    judge: Arc<dyn Judge>,
    max_results: Option<usize>,
}

impl Pipeline {
    /// Build a pipeline from raw entity lines and a taxonomy. Fails fast
    /// when normalization leaves the entity list empty.
    pub fn new(raw_entities: Vec<String>, taxonomy: KeywordTaxonomy) -> Result<Self, ConfigError> {
        let entities = normalize_all(&raw_entities);
        if entities.is_empty() {
            return Err(ConfigError::EmptyEntityList {
                path: "<entity list>".to_string(),
            });
        }

        Ok(Self {
            raw_entities,
            entities,
            taxonomy,
            scoring: ScoringConfig::default(),
            judge_options: JudgeOptions::default(),
            judge: Arc::new(DisabledJudge),
            max_results: None,
        })
    }

    pub fn with_judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = judge;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_judge_options(mut self, options: JudgeOptions) -> Self {
        self.judge_options = options;
        self
    }

    pub fn with_max_results(mut self, max: Option<usize>) -> Self {
        self.max_results = max;
        self
    }

    /// Run the full pipeline over an extraction. `abort` stops the judge
    /// pass from issuing new calls; everything already scored still flows
    /// into the result set.
    pub async fn run(&self, extraction: Extraction, abort: Arc<AtomicBool>) -> ResultSet {
        let scanned = extraction.records.len();
        info!(
            scanned,
            entities = self.entities.len(),
            categories = self.taxonomy.categories().len(),
            judge = self.judge.name(),
            "Pipeline run started"
        );

        let mut scored: Vec<ScoredEmail> = Vec::new();
        let mut excluded = 0usize;
        for record in extraction.records {
            let entity_matches = match_entities(&record, &self.entities);
            let (keyword_hits, keyword_score) = self.taxonomy.scan(&record);
            match aggregate(
                record,
                entity_matches,
                keyword_hits,
                keyword_score,
                self.taxonomy.max_score(),
                &self.scoring,
            ) {
                Some(email) => scored.push(email),
                None => excluded += 1,
            }
        }

        info!(
            retained = scored.len(),
            excluded, "Deterministic scoring complete"
        );

        let judge_stats = if self.judge.enabled() {
            let context = CaseContext {
                entities: self.raw_entities.clone(),
                taxonomy: self.taxonomy.describe(),
            };
            run_judgments(
                &mut scored,
                Arc::clone(&self.judge),
                &context,
                &self.judge_options,
                &self.scoring,
                abort,
            )
            .await
        } else {
            Default::default()
        };

        build(
            scored,
            self.max_results,
            RunCounts {
                scanned,
                excluded,
                skipped: extraction.skipped,
                judge: judge_stats,
            },
        )
    }
}
