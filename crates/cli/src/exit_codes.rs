//! CLI Exit Code Registry
//!
//! Single source of truth for all `vatline` exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                               |
//! |---------|------------|-------------------------------------------|
//! | 0       | Universal  | Success                                   |
//! | 1       | Universal  | General error / document blocked (check)  |
//! | 2       | Universal  | CLI usage error (bad args)                |
//! | 3-9     | rules      | Rule set validation                       |
//! | 10-19   | input      | Reading records, rule sets and config     |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Export readiness gate failed. Like `diff(1)`, exit 1 means "not clean".
pub const EXIT_CHECK_BLOCKED: u8 = 1;

/// Usage error - bad arguments, unparseable flag values.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Rules (3-9)
// =============================================================================

/// Rule set failed normalization; every violation is printed.
pub const EXIT_RULES_INVALID: u8 = 3;

// =============================================================================
// Input (10-19)
// =============================================================================

/// Cannot read an input file or write an output file.
pub const EXIT_IO: u8 = 10;

/// Record or rule-set JSON is structurally broken.
pub const EXIT_INPUT_PARSE: u8 = 11;

/// Engine config TOML failed to parse or validate.
pub const EXIT_CONFIG_INVALID: u8 = 12;
