//! Export collaborator — renders a `ResultSet` into CSV views and a
//! human-readable report.
//!
//! Four CSV files mirror the review workflow: a summary (no full body),
//! the high-priority subset, the full content, and the statistics block.
//! Export failures are fatal — a silently-empty deliverable is worse
//! than a crash.
//!
//! The core guarantees the result set is order-stable before handoff;
//! writers here never reorder.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use crate::error::ExportError;
use crate::record::ScoredEmail;
use crate::results::ResultSet;

/// Report body preview length.
const PREVIEW_CHARS: usize = 300;

/// Report caps the top-results section at this many entries.
const REPORT_TOP_N: usize = 25;

/// Write all export artifacts into `output_dir`. Returns the paths
/// written.
pub fn export_all(results: &ResultSet, output_dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    if results.emails.is_empty() {
        return Err(ExportError::Empty);
    }

    std::fs::create_dir_all(output_dir).map_err(|source| ExportError::CreateDir {
        path: output_dir.display().to_string(),
        source,
    })?;

    let paths = vec![
        write_file(output_dir, "summary.csv", summary_csv(&results.emails))?,
        write_file(
            output_dir,
            "high_priority.csv",
            summary_csv(&results.high_priority().into_iter().cloned().collect::<Vec<_>>()),
        )?,
        write_file(output_dir, "full_content.csv", full_content_csv(&results.emails))?,
        write_file(output_dir, "statistics.csv", statistics_csv(results))?,
        write_file(output_dir, "report.txt", text_report(results))?,
    ];

    info!(dir = %output_dir.display(), files = paths.len(), "Export complete");
    Ok(paths)
}

fn write_file(dir: &Path, name: &str, contents: String) -> Result<PathBuf, ExportError> {
    let path = dir.join(name);
    std::fs::write(&path, contents).map_err(|source| ExportError::Write {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path)
}

// ── CSV views ───────────────────────────────────────────────────────

const SUMMARY_HEADER: &str = "date,from,from_address,to,subject,folder,base_score,final_score,tier,matched_entities,matched_categories,matched_terms,judge_score,judge_rationale,has_attachments";

fn summary_csv(emails: &[ScoredEmail]) -> String {
    let mut out = String::new();
    out.push_str(SUMMARY_HEADER);
    out.push('\n');
    for email in emails {
        out.push_str(&summary_row(email));
        out.push('\n');
    }
    out
}

fn summary_row(email: &ScoredEmail) -> String {
    let record = &email.record;
    let judge_score = match &email.judgment {
        Some(crate::judge::JudgmentOutcome::Scored(result)) => result.score.to_string(),
        _ => String::new(),
    };
    let terms: Vec<&str> = email
        .evidence
        .keyword_hits
        .iter()
        .map(|h| h.term.as_str())
        .take(20)
        .collect();

    [
        record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        record.sender_name.clone(),
        record.sender_address.clone(),
        record.recipients.join("; "),
        record.subject.clone(),
        record.folder.clone(),
        email.evidence.base_score.to_string(),
        email.final_score.to_string(),
        email.tier.label().to_string(),
        email.evidence.entity_matches.join("; "),
        email.evidence.categories().join("; "),
        terms.join("; "),
        judge_score,
        email.judgment_summary().to_string(),
        if record.attachment_names.is_empty() { "no" } else { "yes" }.to_string(),
    ]
    .iter()
    .map(|field| csv_escape(field))
    .collect::<Vec<_>>()
    .join(",")
}

fn full_content_csv(emails: &[ScoredEmail]) -> String {
    let mut out = String::new();
    out.push_str("date,from_address,to,subject,final_score,tier,matched_entities,judge_rationale,body\n");
    for email in emails {
        let record = &email.record;
        let row = [
            record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.sender_address.clone(),
            record.recipients.join("; "),
            record.subject.clone(),
            email.final_score.to_string(),
            email.tier.label().to_string(),
            email.evidence.entity_matches.join("; "),
            email.judgment_summary().to_string(),
            record.body.clone(),
        ]
        .iter()
        .map(|field| csv_escape(field))
        .collect::<Vec<_>>()
        .join(",");
        out.push_str(&row);
        out.push('\n');
    }
    out
}

fn statistics_csv(results: &ResultSet) -> String {
    let stats = &results.statistics;
    let mut out = String::from("metric,value\n");
    let mut push = |metric: &str, value: String| {
        out.push_str(&csv_escape(metric));
        out.push(',');
        out.push_str(&csv_escape(&value));
        out.push('\n');
    };

    push("emails scanned", stats.scanned.to_string());
    push("emails retained", stats.retained.to_string());
    push("emails excluded (no match)", stats.excluded.to_string());
    push("emails skipped (unreadable)", stats.skipped.to_string());
    push("duplicates collapsed", stats.deduplicated.to_string());
    push("ai judgments succeeded", stats.judged_ok.to_string());
    push("ai judgments failed", stats.judged_failed.to_string());
    for (tier, count) in &stats.per_tier {
        push(&format!("tier: {tier}"), count.to_string());
    }
    for (entity, count) in &stats.per_entity {
        push(&format!("entity: {entity}"), count.to_string());
    }
    for (category, count) in &stats.per_category {
        push(&format!("category: {category}"), count.to_string());
    }
    out
}

/// Quote a CSV field when it contains a comma, quote, or newline.
fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

// ── Text report ─────────────────────────────────────────────────────

fn text_report(results: &ResultSet) -> String {
    let stats = &results.statistics;
    let mut out = String::new();
    let rule = "=".repeat(70);
    let thin = "-".repeat(70);

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "EMAIL TRIAGE REPORT");
    let _ = writeln!(out, "Generated: {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "{rule}\n");
    let _ = writeln!(
        out,
        "Scanned {} emails; retained {} ({} excluded, {} unreadable, {} duplicates).",
        stats.scanned, stats.retained, stats.excluded, stats.skipped, stats.deduplicated
    );
    if stats.judged_ok + stats.judged_failed > 0 {
        let _ = writeln!(
            out,
            "AI judgments: {} succeeded, {} failed.",
            stats.judged_ok, stats.judged_failed
        );
    }

    let _ = writeln!(out, "\n{thin}");
    let _ = writeln!(out, "TOP {} MOST RELEVANT EMAILS", REPORT_TOP_N.min(results.emails.len()));
    let _ = writeln!(out, "{thin}\n");

    for (i, email) in results.emails.iter().take(REPORT_TOP_N).enumerate() {
        let record = &email.record;
        let _ = writeln!(
            out,
            "#{} [score {} / {}]",
            i + 1,
            email.final_score,
            email.tier.label()
        );
        let _ = writeln!(out, "  Date:    {}", record.timestamp.format("%Y-%m-%d %H:%M"));
        let _ = writeln!(
            out,
            "  From:    {} ({})",
            record.sender_name, record.sender_address
        );
        let _ = writeln!(out, "  To:      {}", record.recipients.join("; "));
        let _ = writeln!(out, "  Subject: {}", record.subject);
        if !email.evidence.entity_matches.is_empty() {
            let _ = writeln!(
                out,
                "  Entities: {}",
                email.evidence.entity_matches.join(", ")
            );
        }
        if !email.evidence.keyword_hits.is_empty() {
            let _ = writeln!(out, "  Categories: {}", email.evidence.categories().join(", "));
        }
        if !email.judgment_summary().is_empty() {
            let _ = writeln!(out, "  Judge: {}", email.judgment_summary());
        }
        let preview: String = record.body.chars().take(PREVIEW_CHARS).collect();
        let _ = writeln!(out, "  Preview: {}", preview.split_whitespace().collect::<Vec<_>>().join(" "));
        let _ = writeln!(out);
    }

    // Per-entity breakdown, busiest entity first.
    let mut by_entity: BTreeMap<&str, Vec<&ScoredEmail>> = BTreeMap::new();
    for email in &results.emails {
        for entity in &email.evidence.entity_matches {
            by_entity.entry(entity.as_str()).or_default().push(email);
        }
    }
    if !by_entity.is_empty() {
        let _ = writeln!(out, "{thin}");
        let _ = writeln!(out, "RESULTS BY ENTITY");
        let _ = writeln!(out, "{thin}");
        let mut entries: Vec<_> = by_entity.into_iter().collect();
        entries.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(b.0)));
        for (entity, emails) in entries {
            let _ = writeln!(out, "\n{entity}: {} relevant emails", emails.len());
            for email in emails.iter().take(5) {
                let _ = writeln!(
                    out,
                    "  - [{}] {} (score {})",
                    email.record.timestamp.format("%Y-%m-%d"),
                    email.record.subject,
                    email.final_score
                );
            }
            if emails.len() > 5 {
                let _ = writeln!(out, "  ... and {} more", emails.len() - 5);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::judge::JudgeStats;
    use crate::record::EmailRecord;
    use crate::results::{RunCounts, build};
    use crate::scoring::aggregate::aggregate;
    use crate::scoring::keywords::KeywordHit;
    use chrono::{TimeZone, Utc};

    fn make_result_set() -> ResultSet {
        let record = EmailRecord {
            sender_name: "Jane Rep".into(),
            sender_address: "rep@healthleads.com".into(),
            recipients: vec!["owner@dmeco.com".into()],
            cc: vec![],
            subject: "Orders, missing \"again\"".into(),
            body: "please see attached physician order\nsecond line".into(),
            timestamp: Utc.with_ymd_and_hms(2019, 3, 14, 9, 30, 0).unwrap(),
            folder: "Inbox".into(),
            attachment_names: vec!["order.pdf".into()],
        };
        let scored = aggregate(
            record,
            vec!["@healthleads.com".into()],
            vec![KeywordHit {
                category: "doctor_authorization".into(),
                term: "physician order".into(),
            }],
            3,
            3,
            &ScoringConfig::default(),
        )
        .unwrap();
        build(
            vec![scored],
            None,
            RunCounts {
                scanned: 5,
                excluded: 4,
                skipped: 0,
                judge: JudgeStats::default(),
            },
        )
    }

    #[test]
    fn csv_escape_rules() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn summary_csv_has_header_and_rows() {
        let set = make_result_set();
        let csv = summary_csv(&set.emails);
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), SUMMARY_HEADER);
        let row = lines.next().unwrap();
        assert!(row.contains("rep@healthleads.com"));
        assert!(row.contains("\"Orders, missing \"\"again\"\"\""));
        assert!(row.contains("high"));
        assert!(row.ends_with("yes"));
    }

    #[test]
    fn full_content_keeps_body() {
        let set = make_result_set();
        let csv = full_content_csv(&set.emails);
        assert!(csv.contains("physician order"));
        // Embedded newline forces quoting.
        assert!(csv.contains("\"please see attached"));
    }

    #[test]
    fn statistics_csv_lists_counters() {
        let set = make_result_set();
        let csv = statistics_csv(&set);
        assert!(csv.contains("emails scanned,5"));
        assert!(csv.contains("emails retained,1"));
        assert!(csv.contains("emails excluded (no match),4"));
        assert!(csv.contains("tier: high,1"));
        assert!(csv.contains("entity: @healthleads.com,1"));
        assert!(csv.contains("category: doctor_authorization,1"));
    }

    #[test]
    fn report_mentions_top_results_and_entities() {
        let set = make_result_set();
        let report = text_report(&set);
        assert!(report.contains("TOP 1 MOST RELEVANT EMAILS"));
        assert!(report.contains("Jane Rep"));
        assert!(report.contains("RESULTS BY ENTITY"));
        assert!(report.contains("@healthleads.com: 1 relevant emails"));
    }

    #[test]
    fn export_all_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let set = make_result_set();
        let paths = export_all(&set, dir.path()).unwrap();
        assert_eq!(paths.len(), 5);
        for path in &paths {
            assert!(path.exists(), "missing {}", path.display());
        }
    }

    #[test]
    fn empty_result_set_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let set = build(vec![], None, RunCounts::default());
        assert!(matches!(
            export_all(&set, dir.path()),
            Err(ExportError::Empty)
        ));
    }
}
