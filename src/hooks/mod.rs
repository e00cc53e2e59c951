//! Registration of fault capture with the host runtime.
//!
//! The capture pipeline in [`crate::capture`] is a set of plain functions with
//! no registration side effects. This module is the thin shim that connects
//! it to the process:
//!
//! - a [`FrameCollector`] supplies native stack frames whenever a fault is
//!   captured;
//! - [`Hooks`] installs a panic hook that records every panic as a fatal
//!   [`Fault`] in a per-thread "last fault" slot, which the host drains with
//!   [`panic::take_last_fault`] at the end of each request and hands to
//!   [`FaultCapture::on_termination`].
//!
//! # Quick Start
//!
//! ```rust
//! use faultline::hooks::{Hooks, panic::catch_fault};
//!
//! Hooks::new()
//!     .chain_previous(false)
//!     .install()
//!     .expect("failed to install hooks");
//!
//! let caught = catch_fault(|| -> u32 { panic!("division error") });
//! assert!(caught.value.is_none());
//! assert_eq!(caught.fault.unwrap().message(), "division error");
//! ```
//!
//! [`Fault`]: crate::fault::Fault
//! [`FaultCapture::on_termination`]: crate::capture::FaultCapture::on_termination

pub mod panic;

use std::sync::Arc;

use crate::fault::StackFrame;

/// A source of native stack frames.
///
/// Frames must be returned innermost call first. Closures returning a
/// `Vec<StackFrame>` implement this trait.
///
/// # Examples
///
/// ```rust
/// use faultline::{fault::StackFrame, hooks::FrameCollector};
///
/// let collector = || vec![StackFrame::new("src/main.rs", "main", 3)];
/// assert_eq!(collector.collect().len(), 1);
/// ```
pub trait FrameCollector: Send + Sync + 'static {
    /// Captures the current call stack.
    fn collect(&self) -> Vec<StackFrame>;
}

impl<F> FrameCollector for F
where
    F: Fn() -> Vec<StackFrame> + Send + Sync + 'static,
{
    fn collect(&self) -> Vec<StackFrame> {
        self()
    }
}

/// Builder for the process-wide panic hook.
///
/// # Examples
///
/// ```rust
/// use faultline::{fault::StackFrame, hooks::Hooks};
///
/// let hooks = Hooks::new()
///     .frame_collector(|| Vec::<StackFrame>::new())
///     .chain_previous(true);
/// # let _ = hooks;
/// ```
#[must_use]
pub struct Hooks {
    pub(crate) frame_collector: Option<Arc<dyn FrameCollector>>,
    pub(crate) chain_previous: bool,
}

impl Default for Hooks {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hooks")
            .field("frame_collector", &self.frame_collector.is_some())
            .field("chain_previous", &self.chain_previous)
            .finish()
    }
}

impl Hooks {
    /// Creates a builder that chains the previously installed panic hook and
    /// collects no stack frames.
    pub fn new() -> Self {
        Self {
            frame_collector: None,
            chain_previous: true,
        }
    }

    /// Collects stack frames with `collector` whenever a panic is recorded.
    pub fn frame_collector<C: FrameCollector>(mut self, collector: C) -> Self {
        self.frame_collector = Some(Arc::new(collector));
        self
    }

    /// Shares an already boxed collector, e.g. the one used by a
    /// [`FaultCapture`](crate::capture::FaultCapture).
    pub fn shared_frame_collector(mut self, collector: Arc<dyn FrameCollector>) -> Self {
        self.frame_collector = Some(collector);
        self
    }

    /// Whether the panic hook that was installed before this one still runs
    /// after a panic has been recorded. Enabled by default.
    pub fn chain_previous(mut self, chain: bool) -> Self {
        self.chain_previous = chain;
        self
    }

    /// Installs the panic hook for the whole process.
    ///
    /// Fails with [`HooksAlreadyInstalledError`], returning the hooks, if a
    /// hook from this crate is already installed.
    pub fn install(self) -> Result<(), HooksAlreadyInstalledError> {
        panic::install(self)
    }
}

/// Error returned when attempting to install hooks when they're already
/// installed.
///
/// Contains the hooks that were attempted to be installed, allowing you to
/// recover them if needed.
pub struct HooksAlreadyInstalledError(pub Hooks);

impl core::fmt::Debug for HooksAlreadyInstalledError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HooksAlreadyInstalledError").finish()
    }
}

impl core::fmt::Display for HooksAlreadyInstalledError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "hooks are already installed globally")
    }
}

impl core::error::Error for HooksAlreadyInstalledError {}
