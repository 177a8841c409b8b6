use std::collections::{BTreeMap, HashMap};

use crate::error::{RuleSetError, RuleViolation};

use super::text::{normalize_code, normalize_name};
use super::{
    ClassificationRule, Comparator, ConditionSignature, ConditionsDraft, NameFilter, RuleConditions,
    RuleDraft, RuleId, RuleResult, VatCondition, VatConditionDraft,
};

/// Validate and normalize a complete rule set.
///
/// Either every rule comes back normalized, in input order, or the error
/// lists every violation found. Rules without an id get sequential ids
/// continuing past the highest explicit one.
pub fn normalize_rules(drafts: Vec<RuleDraft>) -> Result<Vec<ClassificationRule>, RuleSetError> {
    let mut violations = Vec::new();

    let ids = assign_ids(&drafts, &mut violations);

    let rules: Vec<ClassificationRule> = drafts
        .into_iter()
        .zip(ids)
        .map(|(draft, id)| normalize_one(draft, id, &mut violations))
        .collect();

    check_catch_alls(&rules, &mut violations);
    check_signatures(&rules, &mut violations);

    if violations.is_empty() {
        log::debug!("normalized {} classification rule(s)", rules.len());
        Ok(rules)
    } else {
        log::debug!("rule set rejected with {} violation(s)", violations.len());
        Err(RuleSetError { violations })
    }
}

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

fn assign_ids(drafts: &[RuleDraft], violations: &mut Vec<RuleViolation>) -> Vec<RuleId> {
    let mut seen: BTreeMap<u32, usize> = BTreeMap::new();
    for id in drafts.iter().filter_map(|d| d.id) {
        *seen.entry(id).or_default() += 1;
    }
    for (&id, &count) in &seen {
        if count > 1 {
            violations.push(RuleViolation::DuplicateId { id: RuleId(id) });
        }
    }

    let mut next = seen.keys().next_back().copied().unwrap_or(0);
    drafts
        .iter()
        .map(|d| match d.id {
            Some(id) => RuleId(id),
            None => {
                next = next.saturating_add(1);
                RuleId(next)
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Per-rule
// ---------------------------------------------------------------------------

/// Problems are recorded but the rule is always returned, so set-level
/// checks still see it. A rule without a result code keeps an empty one;
/// the recorded violation keeps it out of any returned set.
fn normalize_one(draft: RuleDraft, id: RuleId, violations: &mut Vec<RuleViolation>) -> ClassificationRule {
    let conditions = if draft.catch_all {
        RuleConditions::default()
    } else {
        let (conditions, vat_invalid) = normalize_conditions(draft.conditions, id, violations);
        if conditions.is_empty() && !vat_invalid {
            violations.push(RuleViolation::MissingCondition { id });
        }
        conditions
    };

    let code = draft
        .result
        .code
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if code.is_empty() {
        violations.push(RuleViolation::EmptyResultCode { id });
    }

    ClassificationRule {
        id,
        enabled: draft.enabled,
        catch_all: draft.catch_all,
        conditions,
        result: RuleResult {
            code,
            item_type: draft.result.item_type,
            name: draft.result.name,
            barcode: draft.result.barcode,
        },
    }
}

fn normalize_conditions(
    draft: ConditionsDraft,
    id: RuleId,
    violations: &mut Vec<RuleViolation>,
) -> (RuleConditions, bool) {
    let mut vat_invalid = false;
    let vat_percent = match draft.vat_percent.map(normalize_vat) {
        Some(Ok(condition)) => condition,
        Some(Err(reason)) => {
            violations.push(RuleViolation::InvalidVatCondition { id, reason });
            vat_invalid = true;
            None
        }
        None => None,
    };

    let name_contains = draft.name_contains.and_then(|display| {
        let normalized = normalize_name(&display);
        (!normalized.is_empty()).then_some(NameFilter { display, normalized })
    });

    let conditions = RuleConditions {
        buyer_code: code_condition(draft.buyer_code),
        buyer_vat_code: code_condition(draft.buyer_vat_code),
        seller_code: code_condition(draft.seller_code),
        seller_vat_code: code_condition(draft.seller_vat_code),
        vat_percent,
        name_contains,
    };
    (conditions, vat_invalid)
}

fn code_condition(raw: Option<String>) -> Option<String> {
    raw.map(|c| normalize_code(&c)).filter(|c| !c.is_empty())
}

/// `{op: null, value: null}` is an absent condition; a half-filled one is an error.
fn normalize_vat(draft: VatConditionDraft) -> Result<Option<VatCondition>, String> {
    match (draft.op, draft.value) {
        (None, None) => Ok(None),
        (Some(op), Some(value)) => match Comparator::parse(&op) {
            Some(op) => Ok(Some(VatCondition { op, value })),
            None => Err(format!("unknown comparator `{op}`")),
        },
        (Some(_), None) => Err("missing or non-numeric value".into()),
        (None, Some(_)) => Err("missing comparator".into()),
    }
}

// ---------------------------------------------------------------------------
// Set-level
// ---------------------------------------------------------------------------

fn check_catch_alls(rules: &[ClassificationRule], violations: &mut Vec<RuleViolation>) {
    let mut ids: Vec<RuleId> = rules
        .iter()
        .filter(|r| r.catch_all && r.enabled)
        .map(|r| r.id)
        .collect();
    if ids.len() > 1 {
        ids.sort();
        violations.push(RuleViolation::MultipleEnabledCatchAll { ids });
    }
}

/// Catch-alls have no conditions, so they never take part here.
fn check_signatures(rules: &[ClassificationRule], violations: &mut Vec<RuleViolation>) {
    let mut order: Vec<ConditionSignature> = Vec::new();
    let mut groups: HashMap<ConditionSignature, Vec<RuleId>> = HashMap::new();

    for rule in rules.iter().filter(|r| !r.catch_all && !r.conditions.is_empty()) {
        let signature = rule.conditions.signature();
        let group = groups.entry(signature.clone()).or_default();
        if group.is_empty() {
            order.push(signature);
        }
        group.push(rule.id);
    }

    for signature in order {
        if let Some(mut ids) = groups.remove(&signature) {
            if ids.len() > 1 {
                ids.sort();
                violations.push(RuleViolation::DuplicateSignature { ids });
            }
        }
    }
}
