//! Severity codes and their classification.
//!
//! Faults carry a flat integer severity code taken from the classic runtime
//! fault taxonomy (`1` for a fatal run-time error, `2` for a warning, and so
//! on, each code being a distinct bit). This module turns such a code into a
//! [`SeverityClassification`] and answers the two filtering questions the
//! capture pipeline asks:
//!
//! - [`is_reportable`]: should a fault signaled during execution be handled at
//!   all, given the operator's reporting mask?
//! - [`handled_at_termination`]: should the fault still pending when a request
//!   ends be forwarded into the pipeline?
//!
//! The two lookups are deliberately independent tables. They disagree on a
//! handful of codes (`CORE_WARNING`, `COMPILE_WARNING` and `STRICT` are
//! forwarded at termination even though they never redirect, and the
//! deprecation entry of the description table is keyed on `8191`), and both
//! are preserved as-is.
//!
//! # Examples
//!
//! ```rust
//! use faultline::severity::{Severity, classify, is_reportable};
//!
//! let classification = classify(Severity::ERROR);
//! assert_eq!(classification.category, "FATAL");
//! assert!(classification.fatal);
//!
//! assert!(is_reportable(Severity::USER_NOTICE, Severity::ALL));
//! assert!(!is_reportable(Severity::USER_NOTICE, Severity::ERROR));
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

/// A raw severity code.
///
/// Any non-negative integer is a valid code; the named constants cover the
/// codes that have an entry in the classification table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Severity(pub u32);

impl Severity {
    /// Fatal run-time error.
    pub const ERROR: Self = Self(1);
    /// Non-fatal run-time warning.
    pub const WARNING: Self = Self(2);
    /// Compile-time parse error.
    pub const PARSE: Self = Self(4);
    /// Run-time notice.
    pub const NOTICE: Self = Self(8);
    /// Fatal error during startup.
    pub const CORE_ERROR: Self = Self(16);
    /// Warning during startup.
    pub const CORE_WARNING: Self = Self(32);
    /// Fatal compile-time error.
    pub const COMPILE_ERROR: Self = Self(64);
    /// Compile-time warning.
    pub const COMPILE_WARNING: Self = Self(128);
    /// User-triggered fatal error.
    pub const USER_ERROR: Self = Self(256);
    /// User-triggered warning.
    pub const USER_WARNING: Self = Self(512);
    /// User-triggered notice.
    pub const USER_NOTICE: Self = Self(1024);
    /// Interoperability suggestion.
    pub const STRICT: Self = Self(2048);
    /// Catchable fatal error.
    pub const RECOVERABLE_ERROR: Self = Self(4096);
    /// Deprecation notice.
    pub const DEPRECATED: Self = Self(8192);
    /// User-triggered deprecation notice.
    pub const USER_DEPRECATED: Self = Self(16384);
    /// Every severity; the default reporting mask.
    pub const ALL: Self = Self(32767);

    /// Returns the raw integer code.
    #[inline]
    pub const fn code(self) -> u32 {
        self.0
    }
}

impl From<u32> for Severity {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The label, human description and fatality of a severity code.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeverityClassification {
    /// Short upper-case label, e.g. `FATAL` or `USER_NOTICE`.
    pub category: &'static str,
    /// One-sentence description of the condition.
    pub description: &'static str,
    /// Whether the fault halts the current request.
    pub fatal: bool,
}

impl SeverityClassification {
    const fn new(category: &'static str, description: &'static str, fatal: bool) -> Self {
        Self {
            category,
            description,
            fatal,
        }
    }

    /// Classification used for codes without a table entry.
    pub const UNKNOWN: Self = Self::new("ERROR", "Problem with code.", false);
}

/// Classifies a severity code.
///
/// Codes outside the table classify as [`SeverityClassification::UNKNOWN`].
pub fn classify(code: Severity) -> SeverityClassification {
    use SeverityClassification as C;

    match code.0 {
        1 => C::new(
            "FATAL",
            "Fatal run-time error. Execution of the script is halted.",
            true,
        ),
        2 => C::new(
            "WARNING",
            "Non-fatal run-time error. Execution of the script is not halted.",
            false,
        ),
        4 => C::new(
            "PARSE",
            "Compile-time parse errors. Parse errors should only be generated by the parser.",
            true,
        ),
        8 => C::new(
            "NOTICE",
            "Run-time notice. The script found something that might be an error, but could also happen when running a script normally.",
            false,
        ),
        16 => C::new(
            "CORE_ERROR",
            "Fatal errors that occur during initial startup.",
            true,
        ),
        32 => C::new(
            "CORE_WARNING",
            "Warnings (non-fatal errors) that occur during initial startup.",
            false,
        ),
        64 => C::new("COMPILE_ERROR", "Fatal compile-time errors.", true),
        128 => C::new(
            "COMPILE_WARNING",
            "Compile-time warnings (non-fatal errors).",
            false,
        ),
        256 => C::new(
            "USER_ERROR",
            "Fatal user-generated error. This is like an E_ERROR set by the programmer using the PHP function trigger_error().",
            true,
        ),
        512 => C::new(
            "USER_WARNING",
            "Non-fatal user-generated warning. This is like an E_WARNING set by the programmer using the PHP function trigger_error().",
            false,
        ),
        1024 => C::new(
            "USER_NOTICE",
            "User-generated notice. This is like an E_NOTICE set by the programmer using the PHP function trigger_error().",
            false,
        ),
        2048 => C::new(
            "STRICT",
            "Suggested changes to code which will ensure the best interoperability and forward compatibility of your code..",
            false,
        ),
        4096 => C::new(
            "RECOVERABLE_ERROR",
            "Catchable fatal error. This is like an E_ERROR but can be caught by a user defined handle (see also set_err or_handler()).",
            true,
        ),
        8191 => C::new(
            "DEPRECATED",
            "Run-time notices. Warnings about code that will not work in future versions.",
            false,
        ),
        16384 => C::new(
            "USER_DEPRECATED",
            "User-generated warning message.",
            false,
        ),
        32767 => C::new(
            "ALL",
            "All errors and warnings, as supported, except of level E_STRICT prior to PHP 5.4.0.",
            false,
        ),
        _ => C::UNKNOWN,
    }
}

/// Returns whether a fault signaled during execution should be handled.
///
/// A fault is reportable iff its code shares at least one bit with `mask`.
#[inline]
pub const fn is_reportable(code: Severity, mask: Severity) -> bool {
    code.0 & mask.0 != 0
}

/// Returns whether the fault still pending at request termination is
/// forwarded into the capture pipeline.
///
/// Faults that were recoverable have already gone through the synchronous
/// path, so only codes that could not have been intercepted there are
/// forwarded.
pub const fn handled_at_termination(code: Severity) -> bool {
    matches!(code.0, 1 | 4 | 16 | 32 | 64 | 128 | 2048)
}
