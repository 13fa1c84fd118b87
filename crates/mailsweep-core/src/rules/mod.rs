//! Declarative cleanup rules: storage, evaluation, dispatch, and
//! orchestration.

pub mod actions;
pub mod audit;
pub mod conditions;
pub mod engine;
pub mod model;
pub mod repository;

pub use actions::ActionOutcome;
pub use audit::{AuditEntry, AuditLog};
pub use engine::{CancelFlag, MessageRef, RuleEngine, RuleOutcome, RuleRunReport};
pub use model::{AutomationRule, MatchOperator, RuleAction, RuleBuilder, RuleConditions};
pub use repository::{RULES_FORMAT_VERSION, RuleRepository};
