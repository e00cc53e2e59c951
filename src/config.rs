//! Options recognised by the capture pipeline.
//!
//! [`FaultConfig`] can be built in code, deserialized as part of a host
//! configuration file (every field has a default), or read from the
//! environment with [`FaultConfig::from_env`]:
//!
//! - `FAULTLINE` - Comma-separated flags:
//!   - `default_handler` - Let suppressed and handled faults fall through to
//!     the runtime's default handling as well
//!   - `log_to_file` - Append every report to [`log_file`]
//!   - `log_all` - Include cookies, server and environment variables in
//!     ambient snapshots
//!   - `inline_code` - Emit `Error code: N` for every handled fault
//! - `FAULTLINE_LOG_FILE` - Path of the report file
//! - `FAULTLINE_LOOP_THRESHOLD` - Consecutive fatal faults tolerated before
//!   the loop is broken
//! - `FAULTLINE_REPORTING` - Reporting mask as an integer
//!
//! [`log_file`]: FaultConfig::log_file
//!
//! # Examples
//!
//! ```rust
//! use faultline::config::FaultConfig;
//!
//! let config = FaultConfig {
//!     log_to_file: true,
//!     log_file: "/var/log/app/errors.html".into(),
//!     ..FaultConfig::default()
//! };
//! assert_eq!(config.loop_break_threshold, 2);
//! ```

use std::{env, ffi::OsString, path::PathBuf};

use serde::Deserialize;

use crate::{Error, severity::Severity};

/// Default number of consecutive fatal faults tolerated before the loop is
/// broken.
pub const DEFAULT_LOOP_BREAK_THRESHOLD: u32 = 2;

/// Default report file.
pub const DEFAULT_LOG_FILE: &str = "error_log.html";

/// Configuration of the capture pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FaultConfig {
    /// Whether the runtime's default fault handling should run as well.
    pub use_default_handler: bool,
    /// Whether reports are appended to [`log_file`](Self::log_file).
    pub log_to_file: bool,
    /// Whether ambient snapshots include cookies, server and environment
    /// variables.
    pub log_all_ambient_state: bool,
    /// Whether handled faults emit their numeric code inline.
    pub output_error_code_inline: bool,
    /// Number of consecutive fatal faults tolerated before the loop-break
    /// page is served instead of a redirect.
    pub loop_break_threshold: u32,
    /// Severities handled by [`FaultCapture::on_fault`]; all others are
    /// suppressed.
    ///
    /// [`FaultCapture::on_fault`]: crate::capture::FaultCapture::on_fault
    pub reporting_mask: Severity,
    /// Report file used when [`log_to_file`](Self::log_to_file) is set.
    pub log_file: PathBuf,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            use_default_handler: false,
            log_to_file: false,
            log_all_ambient_state: false,
            output_error_code_inline: false,
            loop_break_threshold: DEFAULT_LOOP_BREAK_THRESHOLD,
            reporting_mask: Severity::ALL,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl FaultConfig {
    /// Reads the configuration from the process environment.
    ///
    /// Unset variables keep their defaults; unknown flags in `FAULTLINE` are
    /// ignored.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(|name| env::var_os(name))
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_vars(lookup: impl Fn(&'static str) -> Option<OsString>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(flags) = lookup("FAULTLINE") {
            for flag in flags.to_string_lossy().split(',') {
                let flag = flag.trim();
                if flag.eq_ignore_ascii_case("default_handler") {
                    config.use_default_handler = true;
                } else if flag.eq_ignore_ascii_case("log_to_file") {
                    config.log_to_file = true;
                } else if flag.eq_ignore_ascii_case("log_all") {
                    config.log_all_ambient_state = true;
                } else if flag.eq_ignore_ascii_case("inline_code") {
                    config.output_error_code_inline = true;
                }
            }
        }

        if let Some(path) = lookup("FAULTLINE_LOG_FILE") {
            config.log_file = PathBuf::from(path);
        }

        if let Some(threshold) = lookup("FAULTLINE_LOOP_THRESHOLD") {
            config.loop_break_threshold = parse_u32("FAULTLINE_LOOP_THRESHOLD", threshold)?;
        }

        if let Some(mask) = lookup("FAULTLINE_REPORTING") {
            config.reporting_mask = Severity(parse_u32("FAULTLINE_REPORTING", mask)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that cannot be expressed in the field types.
    pub fn validate(&self) -> Result<(), Error> {
        if self.loop_break_threshold == 0 {
            return Err(Error::InvalidThreshold(self.loop_break_threshold));
        }
        Ok(())
    }
}

fn parse_u32(name: &'static str, value: OsString) -> Result<u32, Error> {
    match value.to_str().and_then(|s| s.trim().parse().ok()) {
        Some(n) => Ok(n),
        None => Err(Error::InvalidEnv { name, value }),
    }
}
