use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::EngineError;
use crate::jurisdiction::JurisdictionCode;
use crate::money::lenient;
use crate::rules::RuleId;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which side of the transaction the document owner is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    #[serde(alias = "pirkimas")]
    Purchase,
    #[serde(alias = "pardavimas")]
    Sale,
}

impl Direction {
    /// Case-insensitive; `None` for anything unrecognised.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "purchase" | "pirkimas" => Some(Self::Purchase),
            "sale" | "pardavimas" => Some(Self::Sale),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Purchase => write!(f, "purchase"),
            Self::Sale => write!(f, "sale"),
        }
    }
}

/// Goods vs services; decides the zero-rate cross-border code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    #[serde(alias = "preke", alias = "prekė")]
    Goods,
    #[serde(alias = "paslauga")]
    Services,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ProductType {
    /// Map a free-form line type tag (as written by rule results) to a product type.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "goods" | "good" | "preke" | "prekė" | "product" => Self::Goods,
            "services" | "service" | "paslauga" | "paslaugos" => Self::Services,
            _ => Self::Unknown,
        }
    }
}

// ---------------------------------------------------------------------------
// Parties
// ---------------------------------------------------------------------------

/// Buyer or seller as extracted from the document. Codes are upper-cased at
/// the boundary so rule conditions compare against normalized values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Party {
    #[serde(default, deserialize_with = "lenient::code")]
    pub id_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::code")]
    pub vat_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    /// ISO 3166-1 alpha-2.
    #[serde(default, deserialize_with = "lenient::code")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub has_vat_code: Option<bool>,
}

impl Party {
    pub fn is_vat_registered(&self) -> bool {
        self.has_vat_code.unwrap_or(self.vat_code.is_some())
    }
}

// ---------------------------------------------------------------------------
// Line items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub quantity: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub unit_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub subtotal: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub vat_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub vat_percent: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub total: Option<Decimal>,

    #[serde(default, deserialize_with = "lenient::text")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub barcode: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub item_type: Option<String>,

    #[serde(default)]
    pub jurisdiction: JurisdictionCode,
    #[serde(default, deserialize_with = "lenient_rule_id")]
    pub applied_rule: Option<RuleId>,
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A document whose amounts may be partially unknown. `None` means
/// "unknown", never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialFinancialRecord {
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub net: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub vat_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub vat_percent: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub gross: Option<Decimal>,

    #[serde(default, deserialize_with = "lenient_direction")]
    pub direction: Direction,
    #[serde(default, deserialize_with = "lenient::object")]
    pub buyer: Party,
    #[serde(default, deserialize_with = "lenient::object")]
    pub seller: Party,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub multiple_vat_rates: Option<bool>,
    #[serde(default, deserialize_with = "lenient_product_type")]
    pub product_type: ProductType,

    #[serde(default, deserialize_with = "lenient::text")]
    pub document_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub invoice_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::code")]
    pub currency: Option<String>,

    #[serde(default)]
    pub jurisdiction: JurisdictionCode,
    #[serde(default, deserialize_with = "lenient::list")]
    pub line_items: Vec<LineItem>,
}

impl PartialFinancialRecord {
    /// Parse one record from extraction JSON. Only structurally broken JSON
    /// fails; malformed individual values become `None`.
    pub fn from_json(input: &str) -> Result<Self, EngineError> {
        serde_json::from_str(input).map_err(|e| EngineError::RecordParse(e.to_string()))
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d", "%d.%m.%Y"];

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = lenient::text(deserializer)? else {
        return Ok(None);
    };
    Ok(DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&raw, fmt).ok()))
}

fn lenient_direction<'de, D>(deserializer: D) -> Result<Direction, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient::text(deserializer)?
        .and_then(|tag| Direction::from_tag(&tag))
        .unwrap_or_default())
}

fn lenient_product_type<'de, D>(deserializer: D) -> Result<ProductType, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient::text(deserializer)?
        .map(|tag| ProductType::from_tag(&tag))
        .unwrap_or_default())
}

/// Positive integer ids only; anything else is "no rule applied".
fn lenient_rule_id<'de, D>(deserializer: D) -> Result<Option<RuleId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient::decimal(deserializer)?
        .filter(|d| d.fract().is_zero())
        .and_then(|d| d.to_u32())
        .filter(|&id| id > 0)
        .map(RuleId))
}
