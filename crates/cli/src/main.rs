// vatline - invoice amount derivation, checks and line classification

mod document;
mod exit_codes;
mod input;
mod rules;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use document::{ClassifyArgs, DirectionArg, ProductArg};
use exit_codes::EXIT_SUCCESS;
use rules::RulesCommands;

#[derive(Parser)]
#[command(name = "vatline")]
#[command(about = "Derive, check and classify partially extracted invoices")]
#[command(version)]
#[command(long_version = long_version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Engine config TOML (default: <config dir>/vatline/config.toml if present)
    #[arg(long, global = true, env = "VATLINE_CONFIG")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill every derivable amount on a record and show where each came from
    #[command(after_help = "\
Examples:
  vatline derive invoice.json
  vatline derive invoice.json --json
  cat invoice.json | vatline derive - --json")]
    Derive {
        /// Path to the record JSON (`-` for stdin)
        record: PathBuf,

        /// Output JSON to stdout instead of a human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Compare line sums with document totals and run the export gate (exit 1 if blocked)
    #[command(after_help = "\
Examples:
  vatline check invoice.json
  vatline check invoice.json --json --config strict.toml")]
    Check {
        /// Path to the record JSON (`-` for stdin)
        record: PathBuf,

        /// Output JSON to stdout instead of a human summary
        #[arg(long)]
        json: bool,
    },

    /// Look up the VAT jurisdiction code for a supply
    #[command(after_help = "\
Examples:
  vatline classify --direction sale --seller-country LT --buyer-country DE --vat-percent 0 --product goods
  vatline classify --vat-percent 21
  vatline classify --multi --json")]
    Classify {
        #[arg(long, value_enum, default_value = "purchase")]
        direction: DirectionArg,

        /// ISO 3166-1 alpha-2 buyer country
        #[arg(long)]
        buyer_country: Option<String>,

        /// ISO 3166-1 alpha-2 seller country
        #[arg(long)]
        seller_country: Option<String>,

        #[arg(long, value_enum, default_value = "unknown")]
        product: ProductArg,

        /// VAT percent (e.g. 21, 0, "9,00")
        #[arg(long)]
        vat_percent: Option<String>,

        /// Document carries more than one VAT rate
        #[arg(long)]
        multi: bool,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Run the full engine on one record: derive, match rules, classify, check
    #[command(after_help = "\
Examples:
  vatline process invoice.json --rules rules.json
  vatline process invoice.json --rules rules.json --json
  vatline process invoice.json --rules rules.json --output result.json")]
    Process {
        /// Path to the record JSON (`-` for stdin)
        record: PathBuf,

        /// Rule set (JSON array); normalized before use
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Output JSON to stdout instead of a human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Classification rule sets
    #[command(subcommand)]
    Rules(RulesCommands),
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("VATLINE_GIT_HASH"), ")",
        "\nengine:  vatline-engine ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("VATLINE_TARGET"),
        "\ncontract_version(json): 1",
    )
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // stdout carries JSON output; logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        None => {
            // No subcommand = show usage
            eprintln!("Usage: vatline <command> [options]");
            eprintln!("       vatline --help for more information");
            Ok(())
        }
        Some(Commands::Derive { record, json, output }) => document::cmd_derive(record, json, output),
        Some(Commands::Check { record, json }) => document::cmd_check(record, cli.config, json),
        Some(Commands::Classify {
            direction,
            buyer_country,
            seller_country,
            product,
            vat_percent,
            multi,
            json,
        }) => document::cmd_classify(ClassifyArgs {
            direction,
            buyer_country,
            seller_country,
            product,
            vat_percent,
            multi,
            json,
        }),
        Some(Commands::Process { record, rules, json, output }) => {
            document::cmd_process(record, rules, cli.config, json, output)
        }
        Some(Commands::Rules(cmd)) => rules::cmd_rules(cmd),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
