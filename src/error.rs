//! Errors returned by the fallible parts of the public API.
//!
//! The capture pipeline itself never fails; these only surface while
//! configuring it.

use std::ffi::OsString;

/// Errors produced while configuring or installing fault capture.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value {value:?} for environment variable {name}")]
    InvalidEnv {
        /// The variable name.
        name: &'static str,
        /// The offending value.
        value: OsString,
    },

    /// The loop-break threshold must be at least 1.
    #[error("loop break threshold must be at least 1, got {0}")]
    InvalidThreshold(u32),

    /// The panic hook was already installed.
    #[error(transparent)]
    HooksAlreadyInstalled(#[from] crate::hooks::HooksAlreadyInstalledError),
}
