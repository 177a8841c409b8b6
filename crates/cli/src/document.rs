//! `vatline derive`, `check`, `process` and `classify`.

use std::path::PathBuf;

use clap::ValueEnum;
use serde::Serialize;
use vatline_engine::consistency::{check_export_readiness, check_totals, ExportReadiness, TotalsReport};
use vatline_engine::derive::{derive_document, derive_line, Derivation};
use vatline_engine::model::{Direction, ProductType};
use vatline_engine::money::parse_amount;
use vatline_engine::{classify, process_document, PartialFinancialRecord};

use crate::exit_codes::{EXIT_CHECK_BLOCKED, EXIT_USAGE};
use crate::input::{emit_json, load_config, load_record, load_rules};
use crate::CliError;

// ---------------------------------------------------------------------------
// derive
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct DeriveOutput {
    record: PartialFinancialRecord,
    provenance: Vec<Derivation>,
    line_provenance: Vec<Vec<Derivation>>,
}

fn derive_all(raw: &PartialFinancialRecord) -> DeriveOutput {
    let doc = derive_document(raw);
    let mut record = doc.value;
    let mut line_provenance = Vec::with_capacity(record.line_items.len());
    for line in &mut record.line_items {
        let derived = derive_line(line);
        *line = derived.value;
        line_provenance.push(derived.provenance);
    }
    DeriveOutput {
        record,
        provenance: doc.provenance,
        line_provenance,
    }
}

pub fn cmd_derive(record: PathBuf, json: bool, output: Option<PathBuf>) -> Result<(), CliError> {
    let raw = load_record(&record)?;
    let out = derive_all(&raw);

    if json || output.is_some() {
        emit_json(&out, json, output.as_deref())?;
    }
    if !json {
        print_anchors(&out.record);
        for d in &out.provenance {
            println!("  derived {:?} = {} via {:?}", d.field, d.value, d.rule);
        }
        for (i, log) in out.line_provenance.iter().enumerate() {
            for d in log {
                println!("  line {}: derived {:?} = {} via {:?}", i + 1, d.field, d.value, d.rule);
            }
        }
    }
    Ok(())
}

fn show<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn print_anchors(record: &PartialFinancialRecord) {
    println!(
        "net {}  vat {}  percent {}  gross {}",
        show(record.net),
        show(record.vat_amount),
        show(record.vat_percent),
        show(record.gross),
    );
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CheckOutput {
    totals: TotalsReport,
    readiness: ExportReadiness,
}

pub fn cmd_check(record: PathBuf, config: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let config = load_config(config.as_deref())?;
    let derived = derive_all(&load_record(&record)?).record;

    let out = CheckOutput {
        totals: check_totals(&derived, &config.totals),
        readiness: check_export_readiness(&derived, &config.export),
    };

    if json {
        emit_json(&out, true, None)?;
    } else {
        for c in out.totals.comparisons() {
            println!(
                "{:<12} document {:>12}  lines {:>12}  {}",
                format!("{:?}", c.field),
                show(c.document),
                show(c.lines),
                if c.matches { "ok" } else { "MISMATCH" },
            );
        }
        for t in &out.readiness.totals {
            println!("{:<12} diff {:>8}  {:?}", format!("{:?}", t.field), show(t.diff), t.tier);
        }
        if !out.readiness.missing_fields.is_empty() {
            println!("missing fields: {:?}", out.readiness.missing_fields);
        }
        if !out.readiness.missing_amounts.is_empty() {
            println!("missing amounts: {:?}", out.readiness.missing_amounts);
        }
        println!("export: {}", if out.readiness.ready { "ready" } else { "blocked" });
    }

    if out.readiness.ready {
        Ok(())
    } else {
        // Details already printed; no extra error line.
        Err(CliError::new(EXIT_CHECK_BLOCKED, ""))
    }
}

// ---------------------------------------------------------------------------
// process
// ---------------------------------------------------------------------------

pub fn cmd_process(
    record: PathBuf,
    rules: Option<PathBuf>,
    config: Option<PathBuf>,
    json: bool,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(config.as_deref())?;
    let rules = match rules {
        Some(path) => load_rules(&path)?,
        None => Vec::new(),
    };
    let raw = load_record(&record)?;

    let out = process_document(&raw, &rules, &config);

    if json || output.is_some() {
        emit_json(&out, json, output.as_deref())?;
    }
    if !json {
        let s = &out.summary;
        print_anchors(&out.record);
        println!(
            "{} line(s): {} matched ({} by catch-all), {} unmatched",
            s.lines, s.matched_lines, s.catch_all_lines, s.unmatched_lines,
        );
        println!("jurisdiction: {}", display_code(out.record.jurisdiction.code()));
        println!(
            "totals: {}, export: {}",
            if out.totals.all_match() { "consistent" } else { "mismatch" },
            if out.readiness.ready { "ready" } else { "blocked" },
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, ValueEnum)]
pub enum DirectionArg {
    Purchase,
    Sale,
}

impl From<DirectionArg> for Direction {
    fn from(d: DirectionArg) -> Self {
        match d {
            DirectionArg::Purchase => Direction::Purchase,
            DirectionArg::Sale => Direction::Sale,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ProductArg {
    Goods,
    Services,
    Unknown,
}

impl From<ProductArg> for ProductType {
    fn from(p: ProductArg) -> Self {
        match p {
            ProductArg::Goods => ProductType::Goods,
            ProductArg::Services => ProductType::Services,
            ProductArg::Unknown => ProductType::Unknown,
        }
    }
}

#[derive(Serialize)]
struct ClassifyOutput {
    code: String,
    classified: bool,
}

pub struct ClassifyArgs {
    pub direction: DirectionArg,
    pub buyer_country: Option<String>,
    pub seller_country: Option<String>,
    pub product: ProductArg,
    pub vat_percent: Option<String>,
    pub multi: bool,
    pub json: bool,
}

pub fn cmd_classify(args: ClassifyArgs) -> Result<(), CliError> {
    let vat_percent = match args.vat_percent.as_deref() {
        Some(raw) => Some(parse_amount(raw).ok_or_else(|| {
            CliError::new(EXIT_USAGE, format!("invalid --vat-percent: {raw:?}"))
                .with_hint("use a number such as 21, 0 or 9.00")
        })?),
        None => None,
    };
    let buyer = args.buyer_country.map(|c| c.trim().to_uppercase());
    let seller = args.seller_country.map(|c| c.trim().to_uppercase());

    let code = classify(
        args.direction.into(),
        buyer.as_deref(),
        seller.as_deref(),
        args.product.into(),
        vat_percent,
        args.multi,
    );

    if args.json {
        emit_json(
            &ClassifyOutput {
                code: code.code().to_string(),
                classified: code.is_classified(),
            },
            true,
            None,
        )
    } else {
        println!("{}", display_code(code.code()));
        Ok(())
    }
}

fn display_code(code: &str) -> &str {
    if code.is_empty() {
        "(unclassified)"
    } else {
        code
    }
}
