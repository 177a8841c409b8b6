//! User-authored line-item classification rules.
//!
//! Rules are authored as loose [`RuleDraft`]s, validated as a whole set by
//! [`normalize_rules`] on every save, and consumed read-only by the matcher.

pub mod matcher;
pub mod normalize;
pub mod text;

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::money::lenient;

pub use matcher::{apply_rules, best_rule, rule_score};
pub use normalize::normalize_rules;

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u32);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// ---------------------------------------------------------------------------
// Drafts (as authored)
// ---------------------------------------------------------------------------

/// A rule as submitted by the user. Anything may be missing or malformed;
/// [`normalize_rules`] decides what is acceptable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDraft {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<u32>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub catch_all: bool,
    #[serde(default)]
    pub conditions: ConditionsDraft,
    #[serde(default)]
    pub result: ResultDraft,
}

impl Default for RuleDraft {
    fn default() -> Self {
        Self {
            id: None,
            enabled: true,
            catch_all: false,
            conditions: ConditionsDraft::default(),
            result: ResultDraft::default(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Ids of zero, negative, or non-numeric values count as "not assigned yet".
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient::decimal(deserializer)?;
    Ok(value
        .filter(|d| d.is_integer() && d.is_sign_positive() && !d.is_zero())
        .and_then(|d| d.to_u32()))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionsDraft {
    #[serde(default, deserialize_with = "lenient::text")]
    pub buyer_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub buyer_vat_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub seller_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub seller_vat_code: Option<String>,
    #[serde(default)]
    pub vat_percent: Option<VatConditionDraft>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name_contains: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VatConditionDraft {
    #[serde(default, deserialize_with = "lenient::text")]
    pub op: Option<String>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub value: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultDraft {
    #[serde(default, deserialize_with = "lenient::text")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub item_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub barcode: Option<String>,
}

// ---------------------------------------------------------------------------
// Normalized rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub id: RuleId,
    pub enabled: bool,
    pub catch_all: bool,
    pub conditions: RuleConditions,
    pub result: RuleResult,
}

/// Every field is independently optional. Codes are upper-cased; the name
/// filter keeps the display text and a folded form used for matching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConditions {
    pub buyer_code: Option<String>,
    pub buyer_vat_code: Option<String>,
    pub seller_code: Option<String>,
    pub seller_vat_code: Option<String>,
    pub vat_percent: Option<VatCondition>,
    pub name_contains: Option<NameFilter>,
}

impl RuleConditions {
    /// Number of condition kinds present.
    pub fn count(&self) -> u8 {
        [
            self.buyer_code.is_some(),
            self.buyer_vat_code.is_some(),
            self.seller_code.is_some(),
            self.seller_vat_code.is_some(),
            self.vat_percent.is_some(),
            self.name_contains.is_some(),
        ]
        .iter()
        .filter(|&&present| present)
        .count() as u8
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// The normalized, present conditions; two rules with equal signatures
    /// would always match the same lines.
    pub fn signature(&self) -> ConditionSignature {
        ConditionSignature {
            buyer_code: self.buyer_code.clone(),
            buyer_vat_code: self.buyer_vat_code.clone(),
            seller_code: self.seller_code.clone(),
            seller_vat_code: self.seller_vat_code.clone(),
            vat_percent: self.vat_percent.map(|c| (c.op, c.value.normalize())),
            name_contains: self.name_contains.as_ref().map(|n| n.normalized.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConditionSignature {
    buyer_code: Option<String>,
    buyer_vat_code: Option<String>,
    seller_code: Option<String>,
    seller_vat_code: Option<String>,
    vat_percent: Option<(Comparator, Decimal)>,
    name_contains: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = ">")]
    Gt,
}

impl Comparator {
    pub fn parse(op: &str) -> Option<Self> {
        match op.trim() {
            "<" => Some(Self::Lt),
            "<=" | "=<" | "≤" => Some(Self::Le),
            "=" | "==" => Some(Self::Eq),
            ">=" | "=>" | "≥" => Some(Self::Ge),
            ">" => Some(Self::Gt),
            _ => None,
        }
    }

    pub fn holds(&self, left: Decimal, right: Decimal) -> bool {
        match self {
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Eq => left == right,
            Self::Ge => left >= right,
            Self::Gt => left > right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VatCondition {
    pub op: Comparator,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameFilter {
    /// As the user typed it.
    pub display: String,
    /// Case-folded, diacritics stripped.
    pub normalized: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub code: String,
    pub item_type: Option<String>,
    pub name: Option<String>,
    pub barcode: Option<String>,
}

/// Parse a JSON array of rule drafts. Individual malformed values are
/// tolerated here and reported by [`normalize_rules`].
pub fn drafts_from_json(input: &str) -> Result<Vec<RuleDraft>, crate::EngineError> {
    serde_json::from_str(input).map_err(|e| crate::EngineError::RuleSetParse(e.to_string()))
}
