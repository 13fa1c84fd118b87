//! Rule execution orchestration over cached messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::model::MessageRecord;
use crate::config::RulesConfig;
use crate::error::Result;
use crate::rules::actions::{self, ActionOutcome};
use crate::rules::audit::{AuditEntry, AuditLog};
use crate::rules::conditions;
use crate::rules::model::AutomationRule;
use crate::rules::repository::RuleRepository;
use crate::service::mail::MailService;

/// Cooperative cancellation flag, honored between messages.
///
/// Cancelling never interrupts an in-flight action; the run stops before
/// the next message is considered.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a flag in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-rule breakdown of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RuleOutcome {
    /// Rule identifier.
    pub rule_id: Uuid,
    /// Rule name at run time.
    pub rule_name: String,
    /// Messages this rule matched (as the winning rule).
    pub matched: u64,
    /// Matches whose action succeeded (or would have, in dry-run).
    pub executed: u64,
    /// Matches whose action failed.
    pub failed: u64,
}

impl RuleOutcome {
    fn for_rule(rule: &AutomationRule) -> Self {
        Self {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            matched: 0,
            executed: 0,
            failed: 0,
        }
    }
}

/// Reference to a message that a successful live action removed from the
/// inbox. The caller uses these to evict records from the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRef {
    /// Domain bucket the message lives under.
    pub domain: String,
    /// Message identifier.
    pub message_id: String,
}

/// Aggregate statistics of one orchestration run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleRunReport {
    /// Whether the run was simulated.
    pub dry_run: bool,
    /// Whether the run stopped early on cancellation.
    pub cancelled: bool,
    /// Enabled rules that participated.
    pub rules_considered: usize,
    /// Messages scanned.
    pub messages_processed: usize,
    /// Actions that succeeded (or would have, in dry-run).
    pub actions_executed: usize,
    /// Actions that failed.
    pub errors: usize,
    /// Per-rule breakdown, in execution order.
    pub outcomes: Vec<RuleOutcome>,
    /// Messages removed from the inbox by successful live actions.
    pub removals: Vec<MessageRef>,
}

impl RuleRunReport {
    fn disabled(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }
}

/// Orchestrates rule execution: messages against enabled rules, highest
/// priority first, at most one rule per message.
#[derive(Debug)]
pub struct RuleEngine<'a, S: MailService> {
    service: &'a mut S,
    rules: &'a RuleRepository,
    audit: &'a AuditLog,
    config: &'a RulesConfig,
}

impl<'a, S: MailService> RuleEngine<'a, S> {
    /// Binds an engine to a mailbox provider, rule store, and audit log.
    #[must_use]
    pub fn new(
        service: &'a mut S,
        rules: &'a RuleRepository,
        audit: &'a AuditLog,
        config: &'a RulesConfig,
    ) -> Self {
        Self {
            service,
            rules,
            audit,
            config,
        }
    }

    /// Runs every enabled rule over the given messages.
    ///
    /// Rules execute in priority order, highest first, with stored order
    /// breaking ties. The first rule that matches a message wins; no
    /// further rules are evaluated for it. Dry runs produce the same
    /// statistics and audit entries as live runs but never touch the
    /// mailbox or the persisted rule counters.
    ///
    /// # Errors
    ///
    /// Returns an error when the updated rule counters cannot be
    /// persisted. Provider failures never surface here; they are
    /// captured per message in the report. An unwritable audit log is
    /// logged and skipped.
    pub async fn execute(
        &mut self,
        messages: &[MessageRecord],
        dry_run: bool,
        cancel: &CancelFlag,
    ) -> Result<RuleRunReport> {
        if !self.config.enabled {
            info!("Rule engine is disabled; nothing to do");
            return Ok(RuleRunReport::disabled(dry_run));
        }

        let now = Utc::now();
        let mut rules: Vec<AutomationRule> = self
            .rules
            .list()
            .await
            .into_iter()
            .filter(|r| r.enabled)
            .collect();
        // Stable sort: equal priorities keep their stored order.
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut report = RuleRunReport {
            dry_run,
            rules_considered: rules.len(),
            outcomes: rules.iter().map(RuleOutcome::for_rule).collect(),
            ..RuleRunReport::default()
        };
        if rules.is_empty() {
            info!("No enabled rules; nothing to do");
            return Ok(report);
        }

        info!(
            rules = rules.len(),
            messages = messages.len(),
            dry_run,
            "Starting rule run"
        );

        for message in messages {
            if cancel.is_cancelled() {
                warn!(
                    processed = report.messages_processed,
                    "Rule run cancelled; stopping before the next message"
                );
                report.cancelled = true;
                break;
            }
            report.messages_processed += 1;

            for (idx, rule) in rules.iter_mut().enumerate() {
                if !conditions::evaluate(message, &rule.conditions, now) {
                    continue;
                }
                report.outcomes[idx].matched += 1;

                let outcome =
                    actions::dispatch(self.service, message, &rule.action, dry_run).await;
                record_outcome(&mut report, idx, rule, message, &outcome, dry_run);
                if let Err(err) = self
                    .audit
                    .append(&audit_entry(rule, message, &outcome, dry_run))
                    .await
                {
                    warn!(error = %err, "Failed to append audit entry");
                }
                break;
            }
        }

        if !dry_run {
            self.rules.apply_counters(&rules).await?;
        }

        info!(
            messages = report.messages_processed,
            executed = report.actions_executed,
            errors = report.errors,
            dry_run,
            "Rule run finished"
        );
        Ok(report)
    }
}

fn record_outcome(
    report: &mut RuleRunReport,
    idx: usize,
    rule: &mut AutomationRule,
    message: &MessageRecord,
    outcome: &ActionOutcome,
    dry_run: bool,
) {
    if outcome.success {
        report.outcomes[idx].executed += 1;
        report.actions_executed += 1;
        if !dry_run && rule.action.removes_from_inbox() {
            report.removals.push(MessageRef {
                domain: message.domain(),
                message_id: message.id.clone(),
            });
        }
    } else {
        report.outcomes[idx].failed += 1;
        report.errors += 1;
    }

    if !dry_run {
        rule.execution_count += 1;
        if outcome.success {
            rule.success_count += 1;
        } else {
            rule.failure_count += 1;
        }
        rule.last_executed_at = Some(Utc::now());
    }
}

fn audit_entry(
    rule: &AutomationRule,
    message: &MessageRecord,
    outcome: &ActionOutcome,
    dry_run: bool,
) -> AuditEntry {
    let result = if outcome.success {
        "Success".to_string()
    } else {
        format!(
            "Failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        )
    };
    AuditEntry::new(
        &rule.name,
        dry_run,
        rule.action.kind(),
        &message.subject,
        result,
    )
}
