//! Reading records, rule sets and config; writing JSON results.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use vatline_engine::rules::drafts_from_json;
use vatline_engine::{normalize_rules, ClassificationRule, EngineConfig, PartialFinancialRecord};

use crate::exit_codes::{EXIT_CONFIG_INVALID, EXIT_ERROR, EXIT_INPUT_PARSE, EXIT_IO, EXIT_RULES_INVALID};
use crate::CliError;

/// Read a file, or stdin when the path is `-`.
pub(crate) fn read_input(path: &Path) -> Result<String, CliError> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| CliError::new(EXIT_IO, format!("cannot read stdin: {e}")))?;
        return Ok(buf);
    }
    std::fs::read_to_string(path)
        .map_err(|e| CliError::new(EXIT_IO, format!("cannot read {}: {e}", path.display())))
}

pub(crate) fn load_record(path: &Path) -> Result<PartialFinancialRecord, CliError> {
    let text = read_input(path)?;
    PartialFinancialRecord::from_json(&text).map_err(|e| {
        CliError::new(EXIT_INPUT_PARSE, format!("{}: {e}", path.display()))
            .with_hint("the record must be a single JSON object")
    })
}

/// Load a rule list as authored and normalize it. An invalid set is an
/// error carrying every violation.
pub(crate) fn load_rules(path: &Path) -> Result<Vec<ClassificationRule>, CliError> {
    let text = read_input(path)?;
    let drafts = drafts_from_json(&text).map_err(|e| {
        CliError::new(EXIT_INPUT_PARSE, format!("{}: {e}", path.display()))
            .with_hint("the rule set must be a JSON array of rule objects")
    })?;
    normalize_rules(drafts).map_err(|e| CliError::new(EXIT_RULES_INVALID, e.to_string()))
}

/// Default config location: `<config dir>/vatline/config.toml`.
pub(crate) fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vatline").join("config.toml"))
}

/// An explicit `--config` must exist; the default location is optional.
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<EngineConfig, CliError> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) if p.is_file() => p,
            _ => {
                log::debug!("no config file, using defaults");
                return Ok(EngineConfig::default());
            }
        },
    };

    let text = std::fs::read_to_string(&path)
        .map_err(|e| CliError::new(EXIT_IO, format!("cannot read config {}: {e}", path.display())))?;
    let config = EngineConfig::from_toml(&text)
        .map_err(|e| CliError::new(EXIT_CONFIG_INVALID, format!("{}: {e}", path.display())))?;
    log::debug!("loaded config from {}", path.display());
    Ok(config)
}

/// Pretty JSON to `output` (if given) and to stdout (if `to_stdout`).
pub(crate) fn emit_json<T: Serialize>(
    value: &T,
    to_stdout: bool,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;

    if let Some(path) = output {
        std::fs::write(path, &json)
            .map_err(|e| CliError::new(EXIT_IO, format!("cannot write {}: {e}", path.display())))?;
        eprintln!("wrote {}", path.display());
    }

    if to_stdout {
        println!("{json}");
    }
    Ok(())
}
