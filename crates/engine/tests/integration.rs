use std::path::PathBuf;

use rust_decimal_macros::dec;
use vatline_engine::consistency::ToleranceTier;
use vatline_engine::rules::drafts_from_json;
use vatline_engine::{
    normalize_rules, process_document, ClassificationRule, EngineConfig, JurisdictionCode,
    PartialFinancialRecord, ProcessedDocument, RuleId, RuleViolation,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read_fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn load_record() -> PartialFinancialRecord {
    PartialFinancialRecord::from_json(&read_fixture("purchase_lt.json")).unwrap()
}

fn load_rules() -> Vec<ClassificationRule> {
    normalize_rules(drafts_from_json(&read_fixture("rules.json")).unwrap()).unwrap()
}

fn run(record: &PartialFinancialRecord, config: &EngineConfig) -> ProcessedDocument {
    process_document(record, &load_rules(), config)
}

// -------------------------------------------------------------------------
// Full document
// -------------------------------------------------------------------------

#[test]
fn purchase_document_end_to_end() {
    let out = run(&load_record(), &EngineConfig::default());
    let rec = &out.record;

    assert_eq!(rec.net, Some(dec!(200.00)));
    assert_eq!(rec.vat_amount, Some(dec!(39.60)));
    assert_eq!(rec.vat_percent, Some(dec!(19.80)));
    assert_eq!(rec.gross, Some(dec!(239.60)));
    assert_eq!(rec.multiple_vat_rates, Some(true));
    assert_eq!(rec.jurisdiction, JurisdictionCode::MultipleRates);

    let fuel = &rec.line_items[0];
    assert_eq!(fuel.subtotal, Some(dec!(150.00)));
    assert_eq!(fuel.vat_amount, Some(dec!(31.50)));
    assert_eq!(fuel.total, Some(dec!(181.50)));
    assert_eq!(fuel.applied_rule, Some(RuleId(2)));
    assert_eq!(fuel.code.as_deref(), Some("FUEL"));
    assert_eq!(fuel.jurisdiction, JurisdictionCode::StandardRate);

    // Rules 1 and 3 both score 1 here; the lower id wins and clears the barcode.
    let fluid = &rec.line_items[1];
    assert_eq!(fluid.subtotal, Some(dec!(30.00)));
    assert_eq!(fluid.quantity, Some(dec!(1)));
    assert_eq!(fluid.unit_price, Some(dec!(30.00)));
    assert_eq!(fluid.applied_rule, Some(RuleId(1)));
    assert_eq!(fluid.code.as_deref(), Some("VAT21"));
    assert_eq!(fluid.barcode, None);

    // Only the catch-all (id assigned past the maximum) matches the 9 % line.
    let coffee = &rec.line_items[2];
    assert_eq!(coffee.subtotal, Some(dec!(20.00)));
    assert_eq!(coffee.vat_percent, Some(dec!(9.00)));
    assert_eq!(coffee.applied_rule, Some(RuleId(4)));
    assert_eq!(coffee.code.as_deref(), Some("OTHER"));
    assert_eq!(coffee.name.as_deref(), Some("Kava"));
    assert_eq!(coffee.item_type.as_deref(), Some("services"));
    assert_eq!(coffee.jurisdiction, JurisdictionCode::ReducedRate);

    assert!(out.totals.all_match());
    for cmp in out.totals.comparisons() {
        assert_eq!(cmp.diff, Some(dec!(0)));
    }

    assert!(out.readiness.ready);
    assert!(out.readiness.totals.iter().all(|t| t.tier == ToleranceTier::Exact));

    assert_eq!(out.summary.lines, 3);
    assert_eq!(out.summary.matched_lines, 3);
    assert_eq!(out.summary.catch_all_lines, 1);
    assert_eq!(out.summary.jurisdiction_counts["PVM1"], 2);
}

#[test]
fn reprocessing_does_not_drift() {
    let raw = load_record();
    let first = run(&raw, &EngineConfig::default());
    let again = run(&raw, &EngineConfig::default());
    assert_eq!(first, again);

    // Feeding the output back in changes nothing either.
    let fed_back = run(&first.record, &EngineConfig::default());
    assert_eq!(fed_back.record, first.record);
    assert!(fed_back.provenance.is_empty());
}

#[test]
fn output_serializes_to_json() {
    let out = run(&load_record(), &EngineConfig::default());
    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["record"]["jurisdiction"], "Keli skirtingi PVM");
    assert_eq!(json["record"]["line_items"][0]["applied_rule"], 2);
    assert_eq!(json["record"]["line_items"][2]["jurisdiction"], "PVM2");
    assert_eq!(json["totals"]["net"]["matches"], true);
    assert_eq!(json["readiness"]["ready"], true);
}

// -------------------------------------------------------------------------
// Tolerance tiers from config
// -------------------------------------------------------------------------

#[test]
fn strict_config_blocks_what_default_allows() {
    let mut raw = load_record();
    raw.gross = Some(dec!(239.75));

    let lenient = run(&raw, &EngineConfig::default());
    assert!(!lenient.totals.all_match());
    assert!(lenient.readiness.ready);
    let gross_tier = lenient.readiness.totals[2].tier;
    assert_eq!(gross_tier, ToleranceTier::WithinTolerance);

    let strict = EngineConfig::from_toml(&read_fixture("strict.toml")).unwrap();
    let blocked = run(&raw, &strict);
    assert!(!blocked.readiness.ready);
    assert_eq!(blocked.readiness.totals[2].tier, ToleranceTier::Exceeded);
}

#[test]
fn missing_business_fields_block_export() {
    let mut raw = load_record();
    raw.document_number = None;
    raw.buyer.name = None;
    let out = run(&raw, &EngineConfig::default());
    assert!(!out.readiness.ready);
    assert_eq!(out.readiness.missing_fields.len(), 2);
}

// -------------------------------------------------------------------------
// Rule sets
// -------------------------------------------------------------------------

#[test]
fn invalid_rule_set_reports_everything() {
    let drafts = drafts_from_json(&read_fixture("rules_invalid.json")).unwrap();
    let err = normalize_rules(drafts).unwrap_err();
    assert_eq!(
        err.violations,
        vec![
            RuleViolation::MissingCondition { id: RuleId(4) },
            RuleViolation::EmptyResultCode { id: RuleId(5) },
            RuleViolation::MultipleEnabledCatchAll { ids: vec![RuleId(6), RuleId(7)] },
            RuleViolation::DuplicateSignature { ids: vec![RuleId(2), RuleId(3)] },
        ]
    );
}

#[test]
fn no_rules_leaves_classification_fields_alone() {
    let raw = load_record();
    let out = process_document(&raw, &[], &EngineConfig::default());
    for (before, after) in raw.line_items.iter().zip(&out.record.line_items) {
        assert_eq!(before.code, after.code);
        assert_eq!(before.barcode, after.barcode);
        assert_eq!(after.applied_rule, None);
    }
    assert_eq!(out.summary.unmatched_lines, 3);
}
