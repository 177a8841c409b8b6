//! One document through the whole engine:
//! derive → infer rate flag → match rules → classify → check.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::consistency::{check_export_readiness, check_totals, ExportReadiness, TotalsReport};
use crate::derive::{derive_document, derive_line, Derivation};
use crate::jurisdiction::{classify, JurisdictionCode};
use crate::model::{LineItem, PartialFinancialRecord, ProductType};
use crate::rules::{apply_rules, ClassificationRule};
use crate::summary::{compute_summary, ProcessingSummary};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedDocument {
    pub record: PartialFinancialRecord,
    /// Document-level derivations.
    pub provenance: Vec<Derivation>,
    /// One entry per line item, same order as `record.line_items`.
    pub line_provenance: Vec<Vec<Derivation>>,
    pub totals: TotalsReport,
    pub readiness: ExportReadiness,
    pub summary: ProcessingSummary,
}

/// Run the engine over one raw record. `rules` must already be normalized.
///
/// The input is never mutated, so re-processing the same record with the
/// same rules produces the same output.
pub fn process_document(
    raw: &PartialFinancialRecord,
    rules: &[ClassificationRule],
    config: &EngineConfig,
) -> ProcessedDocument {
    let doc = derive_document(raw);
    let mut record = doc.value;

    let mut line_provenance = Vec::with_capacity(record.line_items.len());
    let mut lines = Vec::with_capacity(record.line_items.len());
    for line in &record.line_items {
        let derived = derive_line(line);
        line_provenance.push(derived.provenance);
        lines.push(derived.value);
    }

    if record.multiple_vat_rates.is_none() && config.rates.infer_multiple_rates {
        record.multiple_vat_rates = infer_multiple_rates(&lines);
    }

    for line in &mut lines {
        apply_rules(rules, line, &record.buyer, &record.seller);
        let code = classify_line(&record, line);
        if code.is_classified() {
            line.jurisdiction = code;
        }
    }
    record.line_items = lines;

    let code = classify(
        record.direction,
        record.buyer.country.as_deref(),
        record.seller.country.as_deref(),
        record.product_type,
        record.vat_percent,
        record.multiple_vat_rates.unwrap_or(false),
    );
    if code.is_classified() {
        record.jurisdiction = code;
    }

    let totals = check_totals(&record, &config.totals);
    let readiness = check_export_readiness(&record, &config.export);
    let summary = compute_summary(&record.line_items, rules);

    log::info!(
        "processed document {}: {} line(s), {} matched, jurisdiction {:?}, totals {}, export {}",
        record.document_number.as_deref().unwrap_or("?"),
        summary.lines,
        summary.matched_lines,
        record.jurisdiction.code(),
        if totals.all_match() { "consistent" } else { "mismatch" },
        if readiness.ready { "ready" } else { "blocked" },
    );

    ProcessedDocument {
        record,
        provenance: doc.provenance,
        line_provenance,
        totals,
        readiness,
        summary,
    }
}

/// A line carries a single rate, so the multi-rate flag never applies.
/// Its own type tag decides goods vs services, falling back to the document's.
fn classify_line(record: &PartialFinancialRecord, line: &LineItem) -> JurisdictionCode {
    let product_type = match line.item_type.as_deref().map(ProductType::from_tag) {
        Some(ProductType::Unknown) | None => record.product_type,
        Some(known) => known,
    };
    classify(
        record.direction,
        record.buyer.country.as_deref(),
        record.seller.country.as_deref(),
        product_type,
        line.vat_percent,
        false,
    )
}

/// `Some(true)` with two or more distinct line rates, `Some(false)` with
/// exactly one, `None` when no line states a rate.
fn infer_multiple_rates(lines: &[LineItem]) -> Option<bool> {
    let rates: BTreeSet<Decimal> = lines
        .iter()
        .filter_map(|l| l.vat_percent)
        .map(|p| p.normalize())
        .collect();
    match rates.len() {
        0 => None,
        n => Some(n > 1),
    }
}
