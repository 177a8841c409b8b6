//! Fixed-point money helpers.
//!
//! Every amount in the engine is a `rust_decimal::Decimal`. Values are
//! rounded half-up right after each derivation step, never only at the end.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Scale for every derived value except unit prices.
pub const MONEY_DP: u32 = 2;
/// Scale for unit prices.
pub const PRICE_DP: u32 = 4;

pub const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Round half-up (away from zero on .5) to `dp` decimal places.
pub fn round_to(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

pub fn round_money(value: Decimal) -> Decimal {
    round_to(value, MONEY_DP)
}

/// Division that refuses absent or zero divisors.
pub fn checked_div(numerator: Decimal, divisor: Decimal) -> Option<Decimal> {
    if divisor.is_zero() {
        return None;
    }
    numerator.checked_div(divisor)
}

/// `1 + percent/100`, the gross/net ratio for a VAT percent.
pub fn gross_factor(percent: Decimal) -> Decimal {
    Decimal::ONE + percent / HUNDRED
}

/// Parse an amount the way it shows up in extracted invoice text.
///
/// Accepts `1234.5`, `1 234,50`, `1.234,50`, `1,234.50`, `21%`, `€ 12,00`.
/// Returns `None` for anything that is not a number after cleanup.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+'))
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');
    let commas = cleaned.matches(',').count();
    let dots = cleaned.matches('.').count();

    let normalized = match (last_dot, last_comma) {
        // Both present: whichever comes last is the decimal separator.
        (Some(d), Some(c)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(_)) if commas == 1 => cleaned.replace(',', "."),
        (None, Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) if dots > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    Decimal::from_str(&normalized).ok()
}

/// Lenient serde adapters for raw extraction output.
///
/// Malformed values deserialize to `None` instead of failing the record.
pub mod lenient {
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::parse_amount;

    /// `Option<Decimal>` from a JSON number, numeric string, or anything else (→ `None`).
    pub fn decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Number(n) => Decimal::from_str(&n.to_string())
                .ok()
                .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
            Value::String(s) => parse_amount(&s),
            _ => None,
        })
    }

    /// Trimmed text; empty or non-string values become `None`.
    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => non_empty(&s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    /// Identifier codes and country codes: trimmed, upper-cased.
    pub fn code<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(text(deserializer)?.map(|s| s.to_uppercase()))
    }

    /// Booleans that may arrive as `"true"`, `1`, `"yes"` or be missing.
    pub fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Bool(b) => Some(b),
            Value::Number(n) => n.as_i64().map(|i| i != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "taip" => Some(true),
                "false" | "no" | "0" | "ne" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    /// A nested object; `null` or a non-object value gives `T::default()`.
    pub fn object<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        if value.is_object() {
            Ok(serde_json::from_value(value).unwrap_or_default())
        } else {
            Ok(T::default())
        }
    }

    /// A list of objects; non-array values give an empty list and entries
    /// that are not objects are skipped.
    pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let Value::Array(items) = Value::deserialize(deserializer)? else {
            return Ok(Vec::new());
        };
        Ok(items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect())
    }

    pub(crate) fn non_empty(s: &str) -> Option<String> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}
