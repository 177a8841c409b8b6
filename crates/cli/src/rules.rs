//! `vatline rules`: validate rule sets and explain matches.

use std::path::PathBuf;

use clap::Subcommand;
use serde::Serialize;
use vatline_engine::derive::derive_line;
use vatline_engine::rules::{best_rule, drafts_from_json, rule_score};
use vatline_engine::{normalize_rules, RuleId, RuleViolation};

use crate::exit_codes::{EXIT_INPUT_PARSE, EXIT_RULES_INVALID};
use crate::input::{emit_json, load_record, load_rules, read_input};
use crate::CliError;

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Validate and normalize a rule set; report every problem at once
    #[command(after_help = "\
Examples:
  vatline rules normalize rules.json
  vatline rules normalize rules.json --json
  vatline rules normalize rules.json --output rules.normalized.json")]
    Normalize {
        /// Path to a JSON array of rules (`-` for stdin)
        rules: PathBuf,

        /// Output JSON to stdout instead of a human summary
        #[arg(long)]
        json: bool,

        /// Write the normalized rule set to file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show which rules match each line of a record, and which one wins
    #[command(after_help = "\
Examples:
  vatline rules match rules.json invoice.json
  vatline rules match rules.json invoice.json --json")]
    Match {
        /// Path to a JSON array of rules
        rules: PathBuf,

        /// Path to the record JSON
        record: PathBuf,

        /// Output JSON to stdout instead of a table
        #[arg(long)]
        json: bool,
    },
}

pub fn cmd_rules(cmd: RulesCommands) -> Result<(), CliError> {
    match cmd {
        RulesCommands::Normalize { rules, json, output } => cmd_rules_normalize(rules, json, output),
        RulesCommands::Match { rules, record, json } => cmd_rules_match(rules, record, json),
    }
}

// ---------------------------------------------------------------------------
// normalize
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct InvalidOutput<'a> {
    valid: bool,
    violations: &'a [RuleViolation],
}

fn cmd_rules_normalize(path: PathBuf, json: bool, output: Option<PathBuf>) -> Result<(), CliError> {
    let text = read_input(&path)?;
    let drafts = drafts_from_json(&text)
        .map_err(|e| CliError::new(EXIT_INPUT_PARSE, format!("{}: {e}", path.display())))?;

    let rules = match normalize_rules(drafts) {
        Ok(rules) => rules,
        Err(err) if json => {
            emit_json(
                &InvalidOutput {
                    valid: false,
                    violations: &err.violations,
                },
                true,
                None,
            )?;
            return Err(CliError::new(EXIT_RULES_INVALID, ""));
        }
        Err(err) => {
            return Err(CliError::new(EXIT_RULES_INVALID, err.to_string())
                .with_hint("nothing was written; fix every listed rule and retry"));
        }
    };

    if json || output.is_some() {
        emit_json(&rules, json, output.as_deref())?;
    }
    if !json {
        println!("{} rule(s) valid", rules.len());
        for rule in &rules {
            let kind = if rule.catch_all {
                "catch-all".to_string()
            } else {
                format!("{} condition(s)", rule.conditions.count())
            };
            println!(
                "  #{:<4} {:<14} -> {}{}",
                rule.id,
                kind,
                rule.result.code,
                if rule.enabled { "" } else { "  (disabled)" },
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// match
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Candidate {
    id: RuleId,
    score: u8,
    catch_all: bool,
}

#[derive(Serialize)]
struct LineMatch {
    line: usize,
    name: Option<String>,
    candidates: Vec<Candidate>,
    winner: Option<RuleId>,
}

fn cmd_rules_match(rules: PathBuf, record: PathBuf, json: bool) -> Result<(), CliError> {
    let rules = load_rules(&rules)?;
    let record = load_record(&record)?;

    let matches: Vec<LineMatch> = record
        .line_items
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            // Rules compare against the line's derived VAT percent.
            let line = derive_line(raw).value;
            let mut candidates: Vec<Candidate> = rules
                .iter()
                .filter_map(|rule| {
                    rule_score(rule, &line, &record.buyer, &record.seller).map(|score| Candidate {
                        id: rule.id,
                        score,
                        catch_all: rule.catch_all,
                    })
                })
                .collect();
            candidates.sort_by_key(|c| (c.catch_all, std::cmp::Reverse(c.score), c.id));
            LineMatch {
                line: i + 1,
                name: line.name.clone(),
                winner: best_rule(&rules, &line, &record.buyer, &record.seller).map(|r| r.id),
                candidates,
            }
        })
        .collect();

    if json {
        return emit_json(&matches, true, None);
    }

    for m in &matches {
        let winner = m.winner.map_or_else(|| "none".to_string(), |id| format!("#{id}"));
        println!("line {} {:?}: winner {}", m.line, m.name.as_deref().unwrap_or(""), winner);
        for c in &m.candidates {
            println!(
                "    #{:<4} score {}{}",
                c.id,
                c.score,
                if c.catch_all { " (catch-all)" } else { "" },
            );
        }
    }
    Ok(())
}
