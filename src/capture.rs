//! The fault-capture pipeline.
//!
//! [`FaultCapture`] is the entry point hosts call into. It has two intake
//! paths:
//!
//! - [`on_fault`](FaultCapture::on_fault) for faults signaled while the
//!   request runs, filtered by the configured reporting mask;
//! - [`on_termination`](FaultCapture::on_termination) once the request has
//!   finished, with the last fault the runtime recorded, if any.
//!
//! Both feed the same pipeline: classify, build a report, persist it, and for
//! fatal faults let the [`LoopGuard`] pick between a redirect and a terminal
//! page. Non-fatal faults drop the session backlog and let the request go on.
//!
//! # Examples
//!
//! ```rust
//! use faultline::prelude::*;
//!
//! let capture = FaultCapture::new(FaultConfig::default());
//! let mut session = MemorySession::new();
//! let request = RequestContext::builder().request_uri("/shop/cart").build();
//!
//! let mut scope = RequestScope::new(&mut session, &request);
//! let handling = capture.on_fault(&mut scope, Severity::ERROR, "Division by zero", "cart.rs", 12);
//! assert_eq!(handling.outcome.redirect_location(), Some("/shop"));
//! ```

use std::{sync::Arc, time::Instant};

use crate::{
    Error,
    config::FaultConfig,
    diagnostics::DiagnosticsView,
    fault::{Fault, SourceLocation},
    hooks::{FrameCollector, panic::catch_fault},
    loop_guard::LoopGuard,
    outcome::Outcome,
    report::{DiagnosticReport, ReportBuilder},
    scope::RequestScope,
    session::LoopState,
    severity::{self, Severity},
    sink::LogSink,
};

/// What happened to a fault passed to [`FaultCapture::on_fault`] or
/// [`FaultCapture::on_termination`].
#[derive(Clone, Debug)]
pub struct Handling {
    /// What the host must do with the request.
    pub outcome: Outcome,
    /// Whether the runtime's default handling should run as well.
    pub use_default_handler: bool,
    /// `Error code: N`, to be written to the response, when inline codes are
    /// enabled.
    pub inline_notice: Option<String>,
    /// The report, unless the fault was suppressed or there was none.
    pub report: Option<DiagnosticReport>,
}

impl Handling {
    fn unreported(use_default_handler: bool) -> Self {
        Self {
            outcome: Outcome::Continue,
            use_default_handler,
            inline_notice: None,
            report: None,
        }
    }
}

/// Result of [`FaultCapture::guarded`].
#[derive(Debug)]
pub struct Guarded<R> {
    /// The handler's return value, `None` if it panicked.
    pub value: Option<R>,
    /// How the end of the request was handled.
    pub handling: Handling,
}

/// Captures faults, reports them and protects against redirect loops.
#[derive(Clone)]
pub struct FaultCapture {
    config: FaultConfig,
    builder: ReportBuilder,
    sink: LogSink,
    guard: LoopGuard,
    view: DiagnosticsView,
    frame_collector: Option<Arc<dyn FrameCollector>>,
}

impl core::fmt::Debug for FaultCapture {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FaultCapture")
            .field("config", &self.config)
            .field("frame_collector", &self.frame_collector.is_some())
            .finish_non_exhaustive()
    }
}

impl FaultCapture {
    /// Creates a pipeline for `config`.
    ///
    /// The configuration is used as is; see [`try_new`](Self::try_new) for a
    /// validating constructor.
    pub fn new(config: FaultConfig) -> Self {
        let view = DiagnosticsView::new(config.log_all_ambient_state);
        let sink = if config.log_to_file {
            LogSink::with_file(config.log_file.clone())
        } else {
            LogSink::session_only()
        };

        Self {
            builder: ReportBuilder::new(view),
            sink,
            guard: LoopGuard::new(config.loop_break_threshold, view),
            view,
            frame_collector: None,
            config,
        }
    }

    /// Validates `config` and creates a pipeline for it.
    pub fn try_new(config: FaultConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Creates a pipeline configured from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        FaultConfig::from_env().map(Self::new)
    }

    /// Collects native stack frames with `collector` for faults signaled
    /// through [`on_fault`](Self::on_fault).
    #[must_use]
    pub fn with_frame_collector<C: FrameCollector>(mut self, collector: C) -> Self {
        self.frame_collector = Some(Arc::new(collector));
        self
    }

    /// Uses an already shared collector.
    #[must_use]
    pub fn with_shared_frame_collector(mut self, collector: Arc<dyn FrameCollector>) -> Self {
        self.frame_collector = Some(collector);
        self
    }

    /// Replaces the report builder, e.g. to change which crates are left
    /// out of stack traces.
    #[must_use]
    pub fn with_report_builder(mut self, builder: ReportBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &FaultConfig {
        &self.config
    }

    /// The frame collector, if one is configured.
    pub fn frame_collector(&self) -> Option<&Arc<dyn FrameCollector>> {
        self.frame_collector.as_ref()
    }

    /// Handles a fault signaled while the request runs.
    ///
    /// Faults outside the reporting mask are ignored. All others are
    /// reported; fatal ones end the request through
    /// [`Handling::outcome`].
    pub fn on_fault(
        &self,
        scope: &mut RequestScope<'_>,
        code: Severity,
        message: &str,
        file: &str,
        line: u32,
    ) -> Handling {
        if !severity::is_reportable(code, self.config.reporting_mask) {
            tracing::debug!(%code, mask = %self.config.reporting_mask, "fault suppressed by reporting mask");
            return Handling::unreported(self.config.use_default_handler);
        }

        let frames = self
            .frame_collector
            .as_ref()
            .map(|collector| collector.collect())
            .unwrap_or_default();
        let fault = Fault::new(code, message, SourceLocation::new(file, line)).with_frames(frames);

        self.handle(scope, &fault)
    }

    /// Handles the end of a request.
    ///
    /// Without a fault the request succeeded and the loop counter is reset,
    /// unless a fatal fault already answered the request through
    /// [`on_fault`](Self::on_fault). A fault is handled only if its code is
    /// one that could not have been intercepted while the request ran;
    /// others are left alone.
    pub fn on_termination(&self, scope: &mut RequestScope<'_>, last_fault: Option<Fault>) -> Handling {
        if scope.ended_by_fault() {
            tracing::debug!("request already ended by a fatal fault");
            return Handling::unreported(false);
        }

        match last_fault {
            None => {
                LoopState::new(&mut *scope.session).clear_counter();
                Handling::unreported(false)
            }
            Some(fault) if severity::handled_at_termination(fault.code()) => self.handle(scope, &fault),
            Some(fault) => {
                tracing::debug!(code = %fault.code(), "fault left at termination not handled");
                Handling::unreported(false)
            }
        }
    }

    /// Runs `handler` under [`catch_fault`] and passes the fault it left
    /// behind, if any, to [`on_termination`](Self::on_termination).
    pub fn guarded<R>(
        &self,
        scope: &mut RequestScope<'_>,
        handler: impl FnOnce(&mut RequestScope<'_>) -> R,
    ) -> Guarded<R> {
        let caught = catch_fault(|| handler(&mut *scope));
        let handling = self.on_termination(scope, caught.fault);
        Guarded {
            value: caught.value,
            handling,
        }
    }

    /// Runs the reporting pipeline for `fault`, bypassing the reporting
    /// mask.
    pub fn handle(&self, scope: &mut RequestScope<'_>, fault: &Fault) -> Handling {
        let classification = severity::classify(fault.code());
        tracing::debug!(
            code = %fault.code(),
            category = classification.category,
            fatal = classification.fatal,
            "classified fault"
        );

        let inline_notice = self
            .config
            .output_error_code_inline
            .then(|| format!("Error code: {}", fault.code()));

        let report = self.builder.build(fault, classification, scope);
        self.sink.persist(&report, &mut *scope.session);

        let outcome = if classification.fatal {
            tracing::warn!(
                code = %fault.code(),
                message = fault.message(),
                location = %fault.location(),
                "fatal fault captured"
            );
            let outcome = self.guard.evaluate(scope);
            if outcome.ends_request() {
                scope.mark_ended_by_fault();
            }
            outcome
        } else {
            LoopState::new(&mut *scope.session).clear_backlog();
            Outcome::Continue
        };

        Handling {
            outcome,
            use_default_handler: self.config.use_default_handler,
            inline_notice,
            report: Some(report),
        }
    }

    /// Renders an operator diagnostic page for the current request.
    pub fn verbose_dump(&self, scope: &RequestScope<'_>, started: Instant) -> String {
        self.view.verbose_dump(scope, started)
    }
}
