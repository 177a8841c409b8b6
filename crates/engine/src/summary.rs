use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::LineItem;
use crate::rules::{ClassificationRule, RuleId};

/// Per-document classification counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingSummary {
    pub lines: usize,
    pub matched_lines: usize,
    pub unmatched_lines: usize,
    /// Lines that only a catch-all rule matched.
    pub catch_all_lines: usize,
    pub rule_counts: BTreeMap<RuleId, usize>,
    /// Keyed by jurisdiction code; unclassified lines count under `""`.
    pub jurisdiction_counts: BTreeMap<String, usize>,
}

pub fn compute_summary(lines: &[LineItem], rules: &[ClassificationRule]) -> ProcessingSummary {
    let mut summary = ProcessingSummary {
        lines: lines.len(),
        ..ProcessingSummary::default()
    };

    for line in lines {
        *summary
            .jurisdiction_counts
            .entry(line.jurisdiction.code().to_string())
            .or_insert(0) += 1;

        let Some(id) = line.applied_rule else {
            summary.unmatched_lines += 1;
            continue;
        };
        summary.matched_lines += 1;
        *summary.rule_counts.entry(id).or_insert(0) += 1;

        if rules.iter().any(|r| r.id == id && r.catch_all) {
            summary.catch_all_lines += 1;
        }
    }

    summary
}
