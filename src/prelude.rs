//! Commonly used items for convenient importing.
//!
//! The prelude module re-exports the types a host needs to wire fault capture
//! into a request handler, so everything can be imported with a single use
//! statement.
//!
//! # Usage
//!
//! ```rust
//! use faultline::prelude::*;
//!
//! let capture = FaultCapture::new(FaultConfig::default());
//! let mut session = MemorySession::new();
//! let request = RequestContext::builder().request_uri("/").build();
//!
//! let mut scope = RequestScope::new(&mut session, &request);
//! let handling = capture.on_termination(&mut scope, None);
//! assert_eq!(handling.outcome, Outcome::Continue);
//! ```
//!
//! # What's Included
//!
//! - **[`FaultCapture`]** and **[`FaultConfig`]**: the pipeline and its options
//! - **[`RequestScope`]**, **[`RequestContext`]** and **[`Authorizer`]**: the
//!   per-request inputs
//! - **[`SessionStore`]** and **[`MemorySession`]**: session access
//! - **[`Outcome`]** and **[`TerminalPage`]**: the responses to apply
//! - **[`Severity`]**, **[`Fault`]** and **[`SourceLocation`]**: fault data
//! - **[`Render`]** and **[`Value`]**: ambient data rendering

pub use crate::{
    capture::{FaultCapture, Handling},
    config::FaultConfig,
    fault::{Fault, SourceLocation, StackFrame},
    outcome::{Outcome, TerminalPage},
    request::RequestContext,
    scope::{Authorizer, RequestScope},
    session::{MemorySession, SessionStore},
    severity::Severity,
    value::{Render, Value},
};
