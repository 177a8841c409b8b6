// Integration tests enforcing the --json stdout contract and exit codes.
//
// These tests guarantee that stdout from --json commands is:
//   1. Valid JSON
//   2. Exactly one JSON value (no extra lines, no banners, no log output)
//   3. The correct shape for its command type
//
// Run with: cargo test -p vatline-cli --test json_contract_tests -- --nocapture

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> String {
    fixtures_dir().join(name).to_string_lossy().into_owned()
}

/// Isolated from any user config: the config dir points at an empty temp dir.
fn vatline(config_home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vatline"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd.env("XDG_CONFIG_HOME", config_home);
    cmd.env("HOME", config_home);
    cmd.env_remove("VATLINE_CONFIG");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn run(args: &[&str]) -> Output {
    let home = tempfile::tempdir().unwrap();
    vatline(home.path()).args(args).output().expect("spawn vatline")
}

/// Assert stdout is a single, parseable JSON value with no extra lines.
fn assert_single_json(stdout: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    assert!(!trimmed.is_empty(), "stdout should not be empty");
    serde_json::from_str(trimmed).unwrap_or_else(|e| {
        panic!("stdout must be valid JSON.\nParse error: {e}\nstdout:\n{trimmed}")
    })
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Decimals serialize as strings; compare numerically.
fn num(value: &serde_json::Value) -> f64 {
    match value {
        serde_json::Value::String(s) => s.parse().unwrap(),
        other => other.as_f64().unwrap(),
    }
}

// ===========================================================================
// derive
// ===========================================================================

#[test]
fn derive_json_fills_anchors_and_lines() {
    let output = run(&["derive", &fixture("invoice.json"), "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&output.stdout);
    let record = &val["record"];
    assert_eq!(num(&record["vat_amount"]), 0.0);
    assert_eq!(num(&record["gross"]), 1000.0);
    assert_eq!(num(&record["line_items"][0]["subtotal"]), 800.0);
    assert_eq!(num(&record["line_items"][1]["total"]), 200.0);

    let provenance = val["provenance"].as_array().expect("provenance array");
    assert!(provenance.iter().any(|d| d["field"] == "gross"));
    assert_eq!(val["line_provenance"].as_array().unwrap().len(), 2);
}

#[test]
fn derive_reads_stdin() {
    let home = tempfile::tempdir().unwrap();
    let mut child = vatline(home.path())
        .args(["derive", "-", "--json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(br#"{"gross": 121, "vat_amount": 21}"#)
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&output.stdout);
    assert_eq!(num(&val["record"]["net"]), 100.0);
    assert_eq!(num(&val["record"]["vat_percent"]), 21.0);
}

#[test]
fn derive_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("derived.json");
    let output = run(&["derive", &fixture("invoice.json"), "--output", out.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(num(&written["record"]["gross"]), 1000.0);
}

#[test]
fn malformed_record_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ \"net\": ").unwrap();
    let output = run(&["derive", path.to_str().unwrap(), "--json"]);
    assert_eq!(output.status.code(), Some(11));
    assert!(output.stdout.is_empty());
    assert!(stderr(&output).contains("record parse error"));
}

#[test]
fn missing_file_is_an_io_error() {
    let output = run(&["derive", "does/not/exist.json"]);
    assert_eq!(output.status.code(), Some(10));
    assert!(stderr(&output).contains("cannot read"));
}

// ===========================================================================
// check
// ===========================================================================

#[test]
fn check_ready_document_exits_zero() {
    let output = run(&["check", &fixture("invoice.json"), "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&output.stdout);
    assert_eq!(val["readiness"]["ready"], true);
    assert_eq!(val["totals"]["gross"]["matches"], true);
    for tier in val["readiness"]["totals"].as_array().unwrap() {
        assert_eq!(tier["tier"], "exact");
    }
}

#[test]
fn check_blocked_document_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("incomplete.json");
    std::fs::write(&path, r#"{"net": 100, "vat_percent": 21, "currency": "EUR"}"#).unwrap();

    let output = run(&["check", path.to_str().unwrap(), "--json"]);
    assert_eq!(output.status.code(), Some(1));

    let val = assert_single_json(&output.stdout);
    assert_eq!(val["readiness"]["ready"], false);
    let missing: Vec<&str> = val["readiness"]["missing_fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(missing, vec!["seller_name", "buyer_name", "invoice_date", "document_number"]);
}

#[test]
fn check_honours_config_tiers() {
    let dir = tempfile::tempdir().unwrap();
    let record = dir.path().join("off.json");
    // Lines sum to 100.00 / 21.00 / 121.00; the document is 0.15 off on VAT and gross.
    std::fs::write(
        &record,
        r#"{
            "document_number": "A-1", "invoice_date": "2025-01-02", "currency": "EUR",
            "seller": {"name": "S"}, "buyer": {"name": "B"},
            "net": 100, "vat_amount": 21.15, "gross": 121.15,
            "line_items": [{"subtotal": 100, "vat_percent": 21}]
        }"#,
    )
    .unwrap();

    let output = run(&["check", record.to_str().unwrap(), "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let val = assert_single_json(&output.stdout);
    assert_eq!(val["readiness"]["totals"][2]["tier"], "within_tolerance");
    assert_eq!(val["totals"]["gross"]["matches"], false);

    let config = dir.path().join("strict.toml");
    std::fs::write(&config, "[export]\nexact = \"0.01\"\ntolerance = \"0.10\"\n").unwrap();
    let output = run(&[
        "check",
        record.to_str().unwrap(),
        "--json",
        "--config",
        config.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));
    let val = assert_single_json(&output.stdout);
    assert_eq!(val["readiness"]["totals"][2]["tier"], "exceeded");
}

#[test]
fn invalid_config_exits_twelve() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "[export]\nexact = \"0.50\"\ntolerance = \"0.10\"\n").unwrap();
    let output = run(&["check", &fixture("invoice.json"), "--config", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(12));
    assert!(stderr(&output).contains("must not exceed"));
}

// ===========================================================================
// classify
// ===========================================================================

#[test]
fn classify_intra_eu_goods() {
    let output = run(&[
        "classify",
        "--direction",
        "sale",
        "--seller-country",
        "lt",
        "--buyer-country",
        "DE",
        "--vat-percent",
        "0",
        "--product",
        "goods",
        "--json",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let val = assert_single_json(&output.stdout);
    assert_eq!(val["code"], "PVM13");
    assert_eq!(val["classified"], true);
}

#[test]
fn classify_multi_rate_and_human_output() {
    let output = run(&["classify", "--vat-percent", "21", "--multi"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "Keli skirtingi PVM");

    let output = run(&["classify", "--vat-percent", "19"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "(unclassified)");
}

#[test]
fn classify_rejects_non_numeric_percent() {
    let output = run(&["classify", "--vat-percent", "abc"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("invalid --vat-percent"));
}

// ===========================================================================
// rules
// ===========================================================================

#[test]
fn rules_normalize_json_returns_normalized_set() {
    let output = run(&["rules", "normalize", &fixture("rules.json"), "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&output.stdout);
    let rules = val.as_array().expect("array of rules");
    assert_eq!(rules.len(), 3);
    assert_eq!(rules[0]["conditions"]["name_contains"]["normalized"], "lentos");
    assert_eq!(rules[1]["conditions"]["buyer_vat_code"], "DE123456789");
    assert_eq!(rules[2]["id"], 3);
    assert_eq!(rules[2]["catch_all"], true);
}

#[test]
fn rules_normalize_reports_every_violation() {
    let output = run(&["rules", "normalize", &fixture("rules_invalid.json"), "--json"]);
    assert_eq!(output.status.code(), Some(3));

    let val = assert_single_json(&output.stdout);
    assert_eq!(val["valid"], false);
    let kinds: Vec<&str> = val["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["missing_condition", "invalid_vat_condition", "duplicate_signature"]);
}

#[test]
fn rules_normalize_human_error_lists_problems() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("normalized.json");
    let output = run(&[
        "rules",
        "normalize",
        &fixture("rules_invalid.json"),
        "--output",
        out.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(3));
    let err = stderr(&output);
    assert!(err.contains("3 problem(s)"), "stderr: {err}");
    assert!(err.contains("rule 3: at least one condition"));
    assert!(err.contains("rules 1, 2 have identical conditions"));
    assert!(!out.exists(), "an invalid set must not be written");
}

#[test]
fn rules_match_explains_the_winner() {
    let output = run(&["rules", "match", &fixture("rules.json"), &fixture("invoice.json"), "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&output.stdout);
    let lines = val.as_array().unwrap();
    assert_eq!(lines[0]["winner"], 1);
    assert_eq!(lines[1]["winner"], 2);
    // Specific rules come first, the catch-all last.
    let candidates = lines[1]["candidates"].as_array().unwrap();
    assert_eq!(candidates[0]["id"], 2);
    assert_eq!(candidates[0]["score"], 2);
    assert_eq!(candidates.last().unwrap()["catch_all"], true);
}

// ===========================================================================
// process
// ===========================================================================

#[test]
fn process_json_annotates_lines() {
    let output = run(&[
        "process",
        &fixture("invoice.json"),
        "--rules",
        &fixture("rules.json"),
        "--json",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&output.stdout);
    let record = &val["record"];
    assert_eq!(record["jurisdiction"], "PVM13");

    let lines = record["line_items"].as_array().unwrap();
    assert_eq!(lines[0]["applied_rule"], 1);
    assert_eq!(lines[0]["code"], "2001");
    assert_eq!(lines[0]["jurisdiction"], "PVM13");
    assert_eq!(lines[1]["applied_rule"], 2);
    assert_eq!(lines[1]["code"], "TRANSPORT");
    assert_eq!(lines[1]["jurisdiction"], "PVM21");

    assert_eq!(val["summary"]["matched_lines"], 2);
    assert_eq!(val["summary"]["catch_all_lines"], 0);
    assert_eq!(val["readiness"]["ready"], true);
}

#[test]
fn process_with_invalid_rules_exits_three() {
    let output = run(&[
        "process",
        &fixture("invoice.json"),
        "--rules",
        &fixture("rules_invalid.json"),
        "--json",
    ]);
    assert_eq!(output.status.code(), Some(3));
    assert!(output.stdout.is_empty());
}

#[test]
fn process_human_summary() {
    let output = run(&["process", &fixture("invoice.json"), "--rules", &fixture("rules.json")]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 line(s): 2 matched (0 by catch-all), 0 unmatched"), "stdout: {stdout}");
    assert!(stdout.contains("jurisdiction: PVM13"));
    assert!(stdout.contains("export: ready"));
}
