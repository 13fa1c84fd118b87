//! Plain-text report rendering for the console and text export.

use std::fmt::Write as _;

use crate::cache::repository::CacheRepository;
use crate::rules::engine::RuleRunReport;
use crate::scoring::model::MessageScore;
use crate::search::query::SearchHit;

/// Renders a cache overview: metadata plus the busiest domains.
#[must_use]
pub fn cache_report(cache: &CacheRepository, top: usize) -> String {
    let metadata = cache.metadata();
    let mut out = String::new();
    let _ = writeln!(out, "Mailbox:   {}", metadata.mailbox_email);
    let _ = writeln!(out, "Messages:  {}", cache.message_count());
    let _ = writeln!(out, "Domains:   {}", cache.domain_count());
    let _ = writeln!(
        out,
        "Updated:   {}",
        metadata
            .last_updated
            .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
    );
    let _ = writeln!(out, "Valid:     {}", metadata.is_valid);

    let counts = cache.domain_counts();
    if !counts.is_empty() {
        let _ = writeln!(out, "\nTop domains:");
        for (domain, count) in counts.iter().take(top) {
            let _ = writeln!(out, "  {count:>5}  {domain}");
        }
    }
    out
}

/// Renders the outcome of one rule run.
#[must_use]
pub fn run_report(report: &RuleRunReport) -> String {
    let mut out = String::new();
    if report.dry_run {
        let _ = writeln!(out, "Dry run: no mailbox changes were made.");
    }
    if report.cancelled {
        let _ = writeln!(out, "Run was cancelled before completion.");
    }
    let _ = writeln!(out, "Rules considered:   {}", report.rules_considered);
    let _ = writeln!(out, "Messages processed: {}", report.messages_processed);
    let _ = writeln!(out, "Actions executed:   {}", report.actions_executed);
    let _ = writeln!(out, "Errors:             {}", report.errors);

    let fired: Vec<_> = report.outcomes.iter().filter(|o| o.matched > 0).collect();
    if !fired.is_empty() {
        let _ = writeln!(out, "\nPer rule:");
        for outcome in fired {
            let _ = writeln!(
                out,
                "  {}: matched {}, executed {}, failed {}",
                outcome.rule_name, outcome.matched, outcome.executed, outcome.failed
            );
        }
    }
    out
}

/// Renders scored messages with their evidence.
#[must_use]
pub fn score_report(scores: &[MessageScore]) -> String {
    if scores.is_empty() {
        return "No messages were flagged.\n".to_string();
    }
    let mut out = String::new();
    for score in scores {
        let _ = writeln!(
            out,
            "[{}] score {}: {} (from {})",
            score.level, score.score, score.subject, score.sender_email
        );
        for reason in &score.evidence {
            let _ = writeln!(out, "    - {reason}");
        }
    }
    out
}

/// Renders search hits, one line per match.
#[must_use]
pub fn search_report(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No matches.\n".to_string();
    }
    let mut out = String::new();
    for hit in hits {
        let _ = writeln!(
            out,
            "{:.2}  {}  {}  (from {})",
            hit.score,
            hit.received_at.format("%Y-%m-%d"),
            hit.subject,
            hit.sender_email
        );
    }
    out
}
