use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Engine tuning. Every section has defaults, so an empty file is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub totals: TotalsTolerance,
    #[serde(default)]
    pub export: ExportTolerance,
    #[serde(default)]
    pub rates: RateDetection,
}

// ---------------------------------------------------------------------------
// Tolerance
// ---------------------------------------------------------------------------

/// Advisory line-sum vs document check.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TotalsTolerance {
    #[serde(default = "default_totals_tolerance")]
    pub tolerance: Decimal,
}

impl Default for TotalsTolerance {
    fn default() -> Self {
        Self {
            tolerance: default_totals_tolerance(),
        }
    }
}

fn default_totals_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Two-tier export gate: `|diff| <= exact` passes as exact,
/// `exact < |diff| <= tolerance` passes within tolerance, above blocks.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportTolerance {
    #[serde(default = "default_export_exact")]
    pub exact: Decimal,
    #[serde(default = "default_export_tolerance")]
    pub tolerance: Decimal,
}

impl Default for ExportTolerance {
    fn default() -> Self {
        Self {
            exact: default_export_exact(),
            tolerance: default_export_tolerance(),
        }
    }
}

fn default_export_exact() -> Decimal {
    Decimal::new(2, 2)
}

fn default_export_tolerance() -> Decimal {
    Decimal::new(20, 2)
}

// ---------------------------------------------------------------------------
// Rate detection
// ---------------------------------------------------------------------------

/// Whether the pipeline infers the multiple-VAT-rates flag from line items
/// when extraction did not supply it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateDetection {
    #[serde(default = "default_true")]
    pub infer_multiple_rates: bool,
}

impl Default for RateDetection {
    fn default() -> Self {
        Self {
            infer_multiple_rates: true,
        }
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl EngineConfig {
    pub fn from_toml(input: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            toml::from_str(input).map_err(|e| EngineError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.totals.tolerance.is_sign_negative() {
            return Err(EngineError::ConfigValidation(format!(
                "totals.tolerance must not be negative, got {}",
                self.totals.tolerance
            )));
        }

        if self.export.exact.is_sign_negative() || self.export.tolerance.is_sign_negative() {
            return Err(EngineError::ConfigValidation(
                "export tolerances must not be negative".into(),
            ));
        }

        if self.export.exact > self.export.tolerance {
            return Err(EngineError::ConfigValidation(format!(
                "export.exact ({}) must not exceed export.tolerance ({})",
                self.export.exact, self.export.tolerance
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
