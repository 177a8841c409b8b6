use std::fmt;

use serde::Serialize;

use crate::rules::RuleId;

#[derive(Debug)]
pub enum EngineError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (negative tolerance, inverted export tiers).
    ConfigValidation(String),
    /// JSON record could not be deserialized at all.
    RecordParse(String),
    /// JSON rule list could not be deserialized at all.
    RuleSetParse(String),
    /// Rule set failed normalization.
    Rules(RuleSetError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::RecordParse(msg) => write!(f, "record parse error: {msg}"),
            Self::RuleSetParse(msg) => write!(f, "rule set parse error: {msg}"),
            Self::Rules(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<RuleSetError> for EngineError {
    fn from(err: RuleSetError) -> Self {
        Self::Rules(err)
    }
}

/// A single broken invariant found while normalizing a rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleViolation {
    /// Two or more rules were submitted with the same explicit id.
    DuplicateId { id: RuleId },
    /// Rule has no active condition and is not a catch-all.
    MissingCondition { id: RuleId },
    /// Rule result has an empty classification code.
    EmptyResultCode { id: RuleId },
    /// VAT-percent condition has an unknown comparator or a non-numeric value.
    InvalidVatCondition { id: RuleId, reason: String },
    /// More than one enabled catch-all rule.
    MultipleEnabledCatchAll { ids: Vec<RuleId> },
    /// Rules whose normalized conditions are identical.
    DuplicateSignature { ids: Vec<RuleId> },
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { id } => write!(f, "rule id {id} is used more than once"),
            Self::MissingCondition { id } => {
                write!(f, "rule {id}: at least one condition is required unless the rule is a catch-all")
            }
            Self::EmptyResultCode { id } => write!(f, "rule {id}: result code must not be empty"),
            Self::InvalidVatCondition { id, reason } => {
                write!(f, "rule {id}: invalid VAT percent condition: {reason}")
            }
            Self::MultipleEnabledCatchAll { ids } => {
                write!(f, "only one enabled catch-all rule is allowed, found {}", join_ids(ids))
            }
            Self::DuplicateSignature { ids } => {
                write!(f, "rules {} have identical conditions", join_ids(ids))
            }
        }
    }
}

fn join_ids(ids: &[RuleId]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

/// Every violation found in a rule set. Never partial: normalization either
/// returns the full normalized set or this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSetError {
    pub violations: Vec<RuleViolation>,
}

impl fmt::Display for RuleSetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule set is invalid ({} problem(s))", self.violations.len())?;
        for v in &self.violations {
            write!(f, "\n  - {v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RuleSetError {}
