//! Runtime/CLI configuration, modeled on `cider/src/configuration.rs`:
//! a `Config`/`RuntimeConfig` pair, the former affecting what gets
//! built, the latter affecting how the simulation actually runs.

use std::path::PathBuf;

use argh::FromArgValue;
use bon::{bon, Builder};

/// Settings that affect what elaboration/IR-construction produces
/// (§6's compiler-facing flags).
#[derive(Debug, Default, Clone, Builder)]
pub struct Config {
    /// `--top NAME`: select the top module when multiple candidates
    /// exist.
    pub top: Option<String>,
    /// `-O N`: optimisation level 0-3. Recorded for parity with the
    /// compiler CLI surface; `xsim` interprets the IR directly rather
    /// than invoking a backend, so this does not currently change
    /// codegen.
    pub opt_level: u8,
    /// `--two-state`: compile with a 2-state value model instead of
    /// the default 4-state one.
    pub two_state: bool,
    /// `-o NAME`: output binary name (unused by direct interpretation,
    /// kept so the flag still parses and round-trips for scripts that
    /// pass it).
    pub output_name: String,
}

/// Settings that affect simulation-time behavior (§5, §6).
#[derive(Debug, Default, Clone)]
pub struct RuntimeConfig {
    /// `-R, --run`: execute immediately after elaboration.
    pub run_immediately: bool,
    pub debug_logging: bool,
    pub quiet: bool,
    pub color_config: ColorConfig,
    /// `--sv-lib PATH`, repeatable.
    pub sv_libs: Vec<PathBuf>,
    /// `--vpi-lib PATH`, repeatable.
    pub vpi_libs: Vec<PathBuf>,
}

#[bon]
impl RuntimeConfig {
    #[builder]
    pub fn new(
        run_immediately: bool,
        debug_logging: bool,
        quiet: bool,
        color_config: ColorConfig,
        sv_libs: Vec<PathBuf>,
        vpi_libs: Vec<PathBuf>,
    ) -> Self {
        Self {
            run_immediately,
            debug_logging,
            quiet,
            color_config,
            sv_libs,
            vpi_libs,
        }
    }

    pub fn get_logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            quiet: self.quiet,
            debug_logging: self.debug_logging,
            color_config: self.color_config,
        }
    }
}

/// What a logger should be created with.
pub struct LoggingConfig {
    pub quiet: bool,
    pub debug_logging: bool,
    pub color_config: ColorConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorConfig {
    #[default]
    On,
    Off,
    Auto,
}

impl FromArgValue for ColorConfig {
    fn from_arg_value(value: &str) -> Result<Self, String> {
        match value.to_lowercase().as_str() {
            "true" | "1" | "on" => Ok(ColorConfig::On),
            "false" | "0" | "off" => Ok(ColorConfig::Off),
            "infer" | "auto" => Ok(ColorConfig::Auto),
            _ => Err(format!(
                "invalid color configuration: '{value}'. Expected 'on', 'off', or 'auto'."
            )),
        }
    }
}
