//! `vatline-engine`: invoice amount derivation and line-item classification.
//!
//! Pure engine crate: receives sanitized records and a normalized rule set,
//! returns filled-in records with reports. No CLI or IO dependencies.

pub mod config;
pub mod consistency;
pub mod derive;
pub mod error;
pub mod jurisdiction;
pub mod model;
pub mod money;
pub mod pipeline;
pub mod rules;
pub mod summary;

pub use config::EngineConfig;
pub use error::{EngineError, RuleSetError, RuleViolation};
pub use jurisdiction::{classify, JurisdictionCode};
pub use model::{LineItem, Party, PartialFinancialRecord};
pub use pipeline::{process_document, ProcessedDocument};
pub use rules::{apply_rules, best_rule, normalize_rules, ClassificationRule, RuleDraft, RuleId};
