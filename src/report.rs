//! Assembly of the HTML diagnostic report for a captured fault.
//!
//! A report is a single HTML fragment laid out as:
//!
//! 1. the backlog of the previous reports in the current redirect chain;
//! 2. a heading with the category, message and location of this fault;
//! 3. a stack trace, only if the chain does not carry one yet;
//! 4. an `Additional Information` block describing the request;
//! 5. the ambient snapshot, without the session's own report fields;
//! 6. a `Generated:` timestamp.
//!
//! Consecutive faults of one redirect chain are therefore readable top to
//! bottom in the final report, with one stack trace for the whole chain.

use core::fmt;

use chrono::{DateTime, Local};

use crate::{
    diagnostics::DiagnosticsView,
    fault::{Fault, SourceLocation, StackFrame},
    scope::RequestScope,
    session::LoopState,
    severity::{Severity, SeverityClassification},
    value::escape_html,
};

/// Marker that opens the stack-trace section of a report.
pub const STACK_TRACE_MARKER: &str = "Stack trace:";

/// Crates whose frames are left out of stack traces.
pub const INTERNAL_CRATES: &[&str] = &["faultline", "faultline_backtrace", "faultline-backtrace"];

const TIMESTAMP_FORMAT: &str = "%b %d, %Y at %I:%M %p";

/// A finished diagnostic report.
#[derive(Clone, Debug, PartialEq)]
pub struct DiagnosticReport {
    /// The heading block of this fault alone, without backlog or trace.
    pub heading: String,
    /// Classification of the fault.
    pub classification: SeverityClassification,
    /// Severity code of the fault.
    pub code: Severity,
    /// The unescaped fault message.
    pub message: String,
    /// Where the fault was raised.
    pub location: SourceLocation,
    /// The complete sanitized report.
    pub text: String,
    /// When the report was built.
    pub generated_at: DateTime<Local>,
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Builds [`DiagnosticReport`]s and maintains the session backlog.
#[derive(Clone, Copy, Debug)]
pub struct ReportBuilder {
    internal_crates: &'static [&'static str],
    view: DiagnosticsView,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new(DiagnosticsView::default())
    }
}

impl ReportBuilder {
    /// Creates a builder rendering ambient state through `view`.
    pub const fn new(view: DiagnosticsView) -> Self {
        Self {
            internal_crates: INTERNAL_CRATES,
            view,
        }
    }

    /// Replaces the list of crates whose frames are omitted from traces.
    pub const fn with_internal_crates(mut self, crates: &'static [&'static str]) -> Self {
        self.internal_crates = crates;
        self
    }

    /// Builds the report for `fault`, timestamped now.
    ///
    /// Updates the session backlog as a side effect.
    pub fn build(
        &self,
        fault: &Fault,
        classification: SeverityClassification,
        scope: &mut RequestScope<'_>,
    ) -> DiagnosticReport {
        self.build_at(fault, classification, scope, Local::now())
    }

    /// Builds the report for `fault` with a fixed timestamp.
    pub fn build_at(
        &self,
        fault: &Fault,
        classification: SeverityClassification,
        scope: &mut RequestScope<'_>,
        generated_at: DateTime<Local>,
    ) -> DiagnosticReport {
        let heading = heading(fault, classification);

        let mut text = {
            let mut state = LoopState::new(&mut *scope.session);
            let mut text = state.backlog().unwrap_or_default();
            text.push_str(&heading);
            state.set_backlog(&text);

            if !text.contains(STACK_TRACE_MARKER) {
                self.write_stack_trace(&mut text, fault.frames());
                state.set_backlog(&text);
            }
            text
        };

        write_request_info(&mut text, scope);
        text.push_str(&self.view.ambient_snapshot(scope, true));

        let mut text = sanitize(&text);
        text.push_str("<br /><b>Generated:</b> ");
        text.push_str(&generated_at.format(TIMESTAMP_FORMAT).to_string());
        text.push_str("<br /><br />");

        DiagnosticReport {
            heading,
            classification,
            code: fault.code(),
            message: fault.message().to_string(),
            location: fault.location().clone(),
            text,
            generated_at,
        }
    }

    fn is_internal(&self, frame: &StackFrame) -> bool {
        frame
            .crate_name
            .as_deref()
            .is_some_and(|name| self.internal_crates.contains(&name))
    }

    /// Appends the trace outermost call first. Frames of internal crates are
    /// skipped but keep their number.
    fn write_stack_trace(&self, out: &mut String, frames: &[StackFrame]) {
        out.push_str(STACK_TRACE_MARKER);
        out.push('\n');

        for (i, frame) in frames.iter().rev().enumerate() {
            if self.is_internal(frame) {
                continue;
            }

            out.push('#');
            out.push_str(&(i + 1).to_string());
            out.push(' ');
            if let Some(file) = frame.file_basename() {
                out.push_str(&escape_html(file));
                out.push_str(" : ");
            }
            if let Some(type_name) = &frame.type_name {
                out.push_str(&escape_html(type_name));
                out.push_str("::");
            }
            if let Some(function) = &frame.function {
                out.push_str(&escape_html(function));
            }
            out.push_str("()");
            if let Some(line) = frame.line {
                out.push_str(" on line ");
                out.push_str(&line.to_string());
            }
            out.push('\n');
        }
    }
}

fn heading(fault: &Fault, classification: SeverityClassification) -> String {
    let location = fault.location();
    format!(
        "<b>Website Error</b><br /><b>{}:</b> {}<br /><b>{}</b> on line <b>{}</b><br />",
        classification.category,
        escape_html(fault.message()),
        escape_html(&location.file),
        location.line,
    )
}

fn write_request_info(out: &mut String, scope: &RequestScope<'_>) {
    let request = scope.request;
    let field = |value: &Option<String>| match value {
        Some(v) => escape_html(v).into_owned(),
        None => "NA".to_string(),
    };

    out.push_str("\n<b>Additional Information</b>\n");
    out.push_str(&format!("<b>Remote Address:</b> {}\n", field(&request.remote_addr)));
    out.push_str(&format!("<b>Browser:</b> {}\n", field(&request.user_agent)));
    if request.referrer.is_some() {
        out.push_str(&format!("<b>Previous Page:</b> {}\n", field(&request.referrer)));
    }
    out.push_str(&format!("<b>Query:</b> {}\n", field(&request.query_string)));
    out.push_str(&format!("<b>Method:</b> {}\n", field(&request.method)));
    out.push_str(&format!("<b>Script File:</b> {}\n", field(&request.script_path)));
    out.push_str(&format!("<b>Script Name:</b> {}\n", field(&request.script_name)));
    out.push_str(&format!("<b>URI:</b> {}\n", field(&request.request_uri)));
    out.push_str(&format!("<b>Protocol:</b> {}\n", field(&request.protocol)));
    out.push('\n');
}

/// Removes quote characters and converts line breaks to `<br />`, so the
/// report can be embedded in script strings and rendered as HTML.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("<br />");
            }
            '\n' => out.push_str("<br />"),
            c => out.push(c),
        }
    }
    out
}
