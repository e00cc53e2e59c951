#![deny(
    missing_docs,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Request-scoped fault capture, diagnostic reports and redirect-loop
//! protection for web request handlers.
//!
//! ## Overview
//!
//! When a request handler hits an unrecoverable fault, this crate classifies
//! the fault, writes a detailed HTML report (stack trace, request details,
//! session and request state) and decides how the client should be answered.
//! Normally the answer is a redirect that retries the page, since transient
//! faults often go away on the next attempt. If the same client keeps
//! faulting, the chain of redirects is broken with a terminal error page
//! before it turns into an endless loop.
//!
//! Loop state lives in the client's session, so detection works across
//! otherwise stateless requests.
//!
//! ## Quick Example
//!
//! ```
//! use faultline::prelude::*;
//!
//! let capture = FaultCapture::new(FaultConfig::default());
//! let mut session = MemorySession::new();
//! let request = RequestContext::builder()
//!     .method("GET")
//!     .request_uri("/shop/cart")
//!     .build();
//!
//! // The first fatal fault redirects to the parent page...
//! let mut scope = RequestScope::new(&mut session, &request);
//! let handling = capture.on_fault(&mut scope, Severity::ERROR, "Division by zero", "cart.rs", 12);
//! assert_eq!(handling.outcome.redirect_location(), Some("/shop"));
//!
//! // ...the second retries the page itself...
//! let mut scope = RequestScope::new(&mut session, &request);
//! let handling = capture.on_fault(&mut scope, Severity::ERROR, "Division by zero", "cart.rs", 12);
//! assert_eq!(handling.outcome.redirect_location(), Some("/shop/cart"));
//!
//! // ...and the third breaks the loop.
//! let mut scope = RequestScope::new(&mut session, &request);
//! let handling = capture.on_fault(&mut scope, Severity::ERROR, "Division by zero", "cart.rs", 12);
//! let page = handling.outcome.terminal_page().unwrap();
//! assert_eq!(page.status, 500);
//! assert_eq!(page.body, "Error: Page loop occurred");
//! ```
//!
//! ## Components
//!
//! - [`severity`] classifies raw severity codes;
//! - [`report`] assembles the HTML report;
//! - [`sink`] persists it to the session and an optional file;
//! - [`loop_guard`] tracks consecutive fatal faults and picks the response;
//! - [`diagnostics`] renders ambient state for reports and operator pages;
//! - [`capture`] wires them into one pipeline.
//!
//! The host supplies a [`SessionStore`](session::SessionStore), a
//! [`RequestContext`](request::RequestContext) and an
//! [`Authorizer`](scope::Authorizer) through a
//! [`RequestScope`](scope::RequestScope), and applies the returned
//! [`Outcome`](outcome::Outcome) to its response.
//!
//! ## Runtime integration
//!
//! [`hooks`] installs a panic hook that records panics as fatal faults.
//! [`FaultCapture::guarded`](capture::FaultCapture::guarded) runs a handler
//! under `catch_unwind` and routes whatever it left behind to
//! [`FaultCapture::on_termination`](capture::FaultCapture::on_termination).
//! Native stack frames are supplied by a
//! [`FrameCollector`](hooks::FrameCollector); the `faultline-backtrace` crate
//! provides one based on the `backtrace` crate.
//!
//! ## Logging
//!
//! The pipeline emits [`tracing`] events: classification at `debug`, fatal
//! faults and failed report-file writes at `warn`, broken loops at `info`.
//! No subscriber is installed.

pub mod capture;
pub mod config;
pub mod diagnostics;
mod error;
pub mod fault;
pub mod hooks;
pub mod loop_guard;
pub mod outcome;
pub mod prelude;
pub mod report;
pub mod request;
pub mod scope;
pub mod session;
pub mod severity;
pub mod sink;
pub mod value;

pub use self::{
    capture::{FaultCapture, Handling},
    config::FaultConfig,
    error::Error,
    fault::{Fault, SourceLocation, StackFrame},
    outcome::{Outcome, TerminalPage},
    report::DiagnosticReport,
    severity::{Severity, SeverityClassification},
};

/// Result type with this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

#[doc(hidden)]
pub mod __private {
    // Used by faultline-backtrace
    pub const FAULTLINE_MANIFEST_DIR: &str = env!("CARGO_MANIFEST_DIR");
}
