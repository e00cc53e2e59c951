//! Ambient-state dumps for reports and operator diagnostic pages.

use std::time::Instant;

use indexmap::IndexMap;

use crate::{
    scope::RequestScope,
    session,
    value::{Render, Value, escape_html, nl2br},
};

/// Renders session and request state as escaped, labelled blocks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiagnosticsView {
    /// Whether cookies, server and environment variables are included.
    pub log_all_ambient_state: bool,
}

impl DiagnosticsView {
    /// Creates a view.
    pub const fn new(log_all_ambient_state: bool) -> Self {
        Self {
            log_all_ambient_state,
        }
    }

    /// Renders the session, query parameters and form fields, followed by
    /// cookies, server and environment variables if
    /// [`log_all_ambient_state`](Self::log_all_ambient_state) is set.
    ///
    /// With `strip_session_fault_fields`, the session's last report and
    /// backlog are left out so that reports do not embed their predecessors
    /// twice.
    pub fn ambient_snapshot(&self, scope: &RequestScope<'_>, strip_session_fault_fields: bool) -> String {
        let mut session = scope.session.snapshot();
        if strip_session_fault_fields {
            session.shift_remove(session::ERROR);
            session.shift_remove(session::ERROR_BACKLOG);
        }

        let request = scope.request;
        let mut out = String::new();
        push_block(&mut out, "Session", &session);
        push_block(&mut out, "Get", &request.query);
        push_block(&mut out, "Post", &request.form);

        if self.log_all_ambient_state {
            push_block(&mut out, "Cookie", &request.cookies);
            push_block(&mut out, "Server", &request.server);
            push_block(&mut out, "Env", &request.env);
        }

        out
    }

    /// Renders an operator diagnostic page: the time elapsed since `started`
    /// followed by the full ambient snapshot, with line breaks converted to
    /// `<br />`.
    pub fn verbose_dump(&self, scope: &RequestScope<'_>, started: Instant) -> String {
        let load_time = started.elapsed().as_secs_f64();
        let mut out = format!("\n\n<b>Load Time:</b> {load_time:.4} seconds\n\n");
        out.push_str(&self.ambient_snapshot(scope, false));
        nl2br(&out)
    }
}

fn push_block(out: &mut String, label: &str, fields: &IndexMap<String, Value>) {
    let rendered = fields.to_value().pretty();
    out.push_str("<b>");
    out.push_str(label);
    out.push_str("</b><pre>");
    out.push_str(&escape_html(&rendered));
    out.push_str("</pre>\n");
}
