//! Rule matching and application for a single line item.

use std::cmp::Reverse;

use crate::model::{LineItem, Party};

use super::text::{normalize_code, normalize_name};
use super::{ClassificationRule, RuleConditions, RuleId};

/// Specificity score of `rule` against the line, or `None` if it does not
/// match. Disabled rules never match; catch-alls always match with score 0.
pub fn rule_score(
    rule: &ClassificationRule,
    line: &LineItem,
    buyer: &Party,
    seller: &Party,
) -> Option<u8> {
    if !rule.enabled {
        return None;
    }
    if rule.catch_all {
        return Some(0);
    }
    conditions_hold(&rule.conditions, line, buyer, seller).then(|| rule.conditions.count())
}

fn conditions_hold(c: &RuleConditions, line: &LineItem, buyer: &Party, seller: &Party) -> bool {
    code_equals(c.buyer_code.as_deref(), buyer.id_code.as_deref())
        && code_equals(c.buyer_vat_code.as_deref(), buyer.vat_code.as_deref())
        && code_equals(c.seller_code.as_deref(), seller.id_code.as_deref())
        && code_equals(c.seller_vat_code.as_deref(), seller.vat_code.as_deref())
        && c.vat_percent.map_or(true, |cond| {
            line.vat_percent
                .is_some_and(|percent| cond.op.holds(percent, cond.value))
        })
        && c.name_contains.as_ref().map_or(true, |filter| {
            line.name
                .as_deref()
                .is_some_and(|name| normalize_name(name).contains(&filter.normalized))
        })
}

/// An absent condition holds; a present one needs an equal party code.
fn code_equals(expected: Option<&str>, actual: Option<&str>) -> bool {
    match expected {
        None => true,
        Some(expected) => actual.is_some_and(|a| normalize_code(a) == expected),
    }
}

/// The winning rule for a line: any non-catch-all beats a catch-all, then the
/// higher score, then the lower id.
pub fn best_rule<'r>(
    rules: &'r [ClassificationRule],
    line: &LineItem,
    buyer: &Party,
    seller: &Party,
) -> Option<&'r ClassificationRule> {
    rules
        .iter()
        .filter_map(|rule| {
            rule_score(rule, line, buyer, seller)
                .map(|score| ((!rule.catch_all, score, Reverse(rule.id)), rule))
        })
        .max_by_key(|(key, _)| *key)
        .map(|(_, rule)| rule)
}

/// Apply the winning rule to the line. Code, type and name are filled only
/// where the line has none; the barcode is always replaced by the rule's
/// (cleared when the rule has none). Returns the applied rule id.
pub fn apply_rules(
    rules: &[ClassificationRule],
    line: &mut LineItem,
    buyer: &Party,
    seller: &Party,
) -> Option<RuleId> {
    let rule = best_rule(rules, line, buyer, seller)?;
    let result = &rule.result;

    if line.code.is_none() {
        line.code = Some(result.code.clone());
    }
    if line.item_type.is_none() {
        line.item_type = result.item_type.clone();
    }
    if line.name.is_none() {
        line.name = result.name.clone();
    }
    line.barcode = result.barcode.clone();
    line.applied_rule = Some(rule.id);

    log::debug!(
        "rule {} applied to line {:?} (code {})",
        rule.id,
        line.name.as_deref().unwrap_or(""),
        result.code
    );
    Some(rule.id)
}
