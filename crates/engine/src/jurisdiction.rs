//! VAT jurisdiction classification.
//!
//! Pure lookup: a document (or line) is mapped to a tax-treatment code from
//! its VAT percent and the seller/buyer country pair. Tables are static and
//! never mutated.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::{Direction, ProductType};

/// Country whose domestic rates and zero-rate codes this classifier emits.
pub const HOME_COUNTRY: &str = "LT";

/// EU member states (ISO 3166-1 alpha-2; Greece as `GR`, with `EL` alias).
pub static EU_MEMBERS: [&str; 28] = [
    "AT", "BE", "BG", "CY", "CZ", "DE", "DK", "EE", "EL", "ES", "FI", "FR", "GR", "HR",
    "HU", "IE", "IT", "LT", "LU", "LV", "MT", "NL", "PL", "PT", "RO", "SE", "SI", "SK",
];

/// Non-zero domestic rates and their codes. These rates only occur on
/// domestic supplies, so the country pair is not consulted.
static DOMESTIC_RATES: [(u32, JurisdictionCode); 3] = [
    (21, JurisdictionCode::StandardRate),
    (9, JurisdictionCode::ReducedRate),
    (5, JurisdictionCode::SuperReducedRate),
];

pub fn is_eu_member(country: &str) -> bool {
    EU_MEMBERS.contains(&country)
}

// ---------------------------------------------------------------------------
// Codes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JurisdictionCode {
    /// 21 % domestic supply.
    StandardRate,
    /// 9 % domestic supply.
    ReducedRate,
    /// 5 % domestic supply.
    SuperReducedRate,
    /// 0 % with both parties in the home country.
    DomesticZeroRated,
    /// 0 % goods dispatched to another EU member state.
    IntraEuGoods,
    /// 0 % services supplied to another EU member state.
    IntraEuServices,
    /// 0 % goods exported outside the EU (or imported from outside it).
    ExportGoods,
    /// 0 % services supplied outside the EU (or received from outside it).
    ExportServices,
    /// Document carries more than one VAT rate.
    MultipleRates,
    #[default]
    Unclassified,
}

impl JurisdictionCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::StandardRate => "PVM1",
            Self::ReducedRate => "PVM2",
            Self::SuperReducedRate => "PVM3",
            Self::DomesticZeroRated => "PVM5",
            Self::ExportGoods => "PVM12",
            Self::IntraEuGoods => "PVM13",
            Self::ExportServices => "PVM14",
            Self::IntraEuServices => "PVM21",
            Self::MultipleRates => "Keli skirtingi PVM",
            Self::Unclassified => "",
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "PVM1" => Self::StandardRate,
            "PVM2" => Self::ReducedRate,
            "PVM3" => Self::SuperReducedRate,
            "PVM5" => Self::DomesticZeroRated,
            "PVM12" => Self::ExportGoods,
            "PVM13" => Self::IntraEuGoods,
            "PVM14" => Self::ExportServices,
            "PVM21" => Self::IntraEuServices,
            "Keli skirtingi PVM" => Self::MultipleRates,
            _ => Self::Unclassified,
        }
    }

    pub fn is_classified(&self) -> bool {
        !matches!(self, Self::Unclassified)
    }
}

impl std::fmt::Display for JurisdictionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for JurisdictionCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for JurisdictionCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Self::from_code(&s),
            _ => Self::default(),
        })
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify a supply. Precedence: multi-rate flag, then domestic non-zero
/// rate, then the zero-rate country table, else unclassified.
pub fn classify(
    direction: Direction,
    buyer_country: Option<&str>,
    seller_country: Option<&str>,
    product_type: ProductType,
    vat_percent: Option<Decimal>,
    multi_rate: bool,
) -> JurisdictionCode {
    if multi_rate {
        return JurisdictionCode::MultipleRates;
    }

    let Some(percent) = vat_percent else {
        return JurisdictionCode::Unclassified;
    };

    if !percent.is_zero() {
        return domestic_rate_code(percent).unwrap_or(JurisdictionCode::Unclassified);
    }

    zero_rate_code(direction, buyer_country, seller_country, product_type)
}

fn domestic_rate_code(percent: Decimal) -> Option<JurisdictionCode> {
    DOMESTIC_RATES
        .iter()
        .find(|(rate, _)| percent == Decimal::from(*rate))
        .map(|(_, code)| *code)
}

fn zero_rate_code(
    direction: Direction,
    buyer_country: Option<&str>,
    seller_country: Option<&str>,
    product_type: ProductType,
) -> JurisdictionCode {
    let (Some(buyer), Some(seller)) = (buyer_country, seller_country) else {
        return JurisdictionCode::Unclassified;
    };
    let services = product_type == ProductType::Services;

    let buyer_home = buyer == HOME_COUNTRY;
    let seller_home = seller == HOME_COUNTRY;

    if buyer_home && seller_home {
        return JurisdictionCode::DomesticZeroRated;
    }

    if seller_home {
        return if is_eu_member(buyer) {
            if services {
                JurisdictionCode::IntraEuServices
            } else {
                JurisdictionCode::IntraEuGoods
            }
        } else if services {
            JurisdictionCode::ExportServices
        } else {
            JurisdictionCode::ExportGoods
        };
    }

    if buyer_home && direction == Direction::Purchase && !is_eu_member(seller) {
        return if services {
            JurisdictionCode::ExportServices
        } else {
            JurisdictionCode::ExportGoods
        };
    }

    JurisdictionCode::Unclassified
}
