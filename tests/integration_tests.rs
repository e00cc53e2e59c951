//! Integration tests for the faultline capture pipeline.
//!
//! Each test drives [`FaultCapture`] the way a host would: one
//! [`RequestScope`] per request, sharing a session across requests.
//!
//! ## Redirect Loop Tests
//! - `test_three_fault_loop_sequence`: parent redirect, self redirect, then
//!   the terminal page, with the session cleared afterwards
//! - `test_fourth_fault_starts_a_new_chain`: after a loop-break the next
//!   fault redirects to the parent again
//! - `test_success_clears_counter`: a completed request resets the chain
//! - `test_custom_threshold`: a higher threshold allows more retries
//! - `test_privileged_terminal_page`: privileged callers get the state dump
//!
//! ## Report Tests
//! - `test_single_stack_trace_in_chain`: chained reports carry one trace
//! - `test_sanitizes_quotes_and_line_breaks`: untrusted input is neutralised
//! - `test_user_notice_reported_and_continues`: non-fatal faults are logged
//! - `test_mask_suppresses_faults`: faults outside the mask are ignored
//!
//! ## Sink Tests
//! - `test_file_sink_appends_reports`: reports land in the report file
//! - `test_unwritable_log_file_does_not_change_outcome`: write failures are
//!   swallowed
//!
//! ## Diagnostics Tests
//! - `test_verbose_dump`: operator pages include load time and all state

use std::time::Instant;

use faultline::{
    prelude::*,
    report::STACK_TRACE_MARKER,
    session::{ERROR, ERROR_BACKLOG, ERROR_LOOP},
};

fn cart_request() -> RequestContext {
    RequestContext::builder()
        .method("GET")
        .request_uri("/shop/cart/checkout")
        .remote_addr("203.0.113.9")
        .protocol("HTTP/1.1")
        .build()
}

fn fatal(capture: &FaultCapture, session: &mut MemorySession, request: &RequestContext) -> Handling {
    let mut scope = RequestScope::new(session, request);
    capture.on_fault(&mut scope, Severity::ERROR, "Division by zero", "/srv/app/src/cart.rs", 42)
}

fn succeed(capture: &FaultCapture, session: &mut MemorySession, request: &RequestContext) -> Outcome {
    let mut scope = RequestScope::new(session, request);
    capture.on_termination(&mut scope, None).outcome
}

#[test]
fn test_three_fault_loop_sequence() {
    let capture = FaultCapture::new(FaultConfig::default());
    let mut session = MemorySession::new();
    let request = cart_request();

    let first = fatal(&capture, &mut session, &request);
    assert_eq!(first.outcome.redirect_location(), Some("/shop/cart"));
    assert_eq!(session.get(ERROR_LOOP), Some(Value::Int(1)));

    let second = fatal(&capture, &mut session, &request);
    assert_eq!(second.outcome.redirect_location(), Some("/shop/cart/checkout"));
    assert_eq!(session.get(ERROR_LOOP), Some(Value::Int(2)));

    let third = fatal(&capture, &mut session, &request);
    let page = third.outcome.terminal_page().expect("third fault breaks the loop");
    assert_eq!(page.status, 500);
    assert_eq!(page.body, "Error: Page loop occurred");
    assert!(page.discard_buffered_output);
    assert!(!page.body.contains(STACK_TRACE_MARKER));

    assert!(!session.contains(ERROR_LOOP));
    assert!(!session.contains(ERROR_BACKLOG));
    assert!(!session.contains(ERROR));
}

#[test]
fn test_fourth_fault_starts_a_new_chain() {
    let capture = FaultCapture::new(FaultConfig::default());
    let mut session = MemorySession::new();
    let request = cart_request();

    for _ in 0..3 {
        fatal(&capture, &mut session, &request);
    }

    let fourth = fatal(&capture, &mut session, &request);
    assert_eq!(fourth.outcome.redirect_location(), Some("/shop/cart"));
    assert_eq!(session.get(ERROR_LOOP), Some(Value::Int(1)));

    let report = fourth.report.expect("fatal faults are reported");
    assert_eq!(report.text.matches("<b>Website Error</b>").count(), 1);
}

#[test]
fn test_success_clears_counter() {
    let capture = FaultCapture::new(FaultConfig::default());
    let mut session = MemorySession::new();
    let request = cart_request();

    fatal(&capture, &mut session, &request);
    assert_eq!(succeed(&capture, &mut session, &request), Outcome::Continue);
    assert!(!session.contains(ERROR_LOOP));

    let again = fatal(&capture, &mut session, &request);
    assert_eq!(again.outcome.redirect_location(), Some("/shop/cart"));

    fatal(&capture, &mut session, &request);
    assert_eq!(succeed(&capture, &mut session, &request), Outcome::Continue);
    let after = fatal(&capture, &mut session, &request);
    assert!(after.outcome.terminal_page().is_none());
}

#[test]
fn test_custom_threshold() {
    let capture = FaultCapture::new(FaultConfig {
        loop_break_threshold: 3,
        ..FaultConfig::default()
    });
    let mut session = MemorySession::new();
    let request = cart_request();

    let outcomes: Vec<Outcome> = (0..4)
        .map(|_| fatal(&capture, &mut session, &request).outcome)
        .collect();
    assert_eq!(outcomes[0].redirect_location(), Some("/shop/cart"));
    assert_eq!(outcomes[1].redirect_location(), Some("/shop/cart/checkout"));
    assert_eq!(outcomes[2].redirect_location(), Some("/shop/cart/checkout"));
    assert!(outcomes[3].terminal_page().is_some());
}

#[test]
fn test_privileged_terminal_page() {
    let capture = FaultCapture::new(FaultConfig::default());
    let mut session = MemorySession::new();
    session.set("user", Value::from("admin"));
    let request = cart_request();
    let is_admin = |request: &RequestContext| request.remote_addr.as_deref() == Some("203.0.113.9");

    let mut outcome = Outcome::Continue;
    for _ in 0..3 {
        let mut scope = RequestScope::new(&mut session, &request).with_authorizer(&is_admin);
        outcome = capture
            .on_fault(&mut scope, Severity::USER_ERROR, "Out of stock", "stock.rs", 9)
            .outcome;
    }

    let page = outcome.terminal_page().expect("loop broken");
    assert_eq!(page.status, 500);
    assert!(page.body.contains("Admin Error Debug Enabled: Page loop occurred"));
    assert!(page.body.contains("[user] =&gt; admin"));
    assert!(page.body.contains("<b>Session</b><pre>"));
    assert!(!session.contains(ERROR));
}

#[test]
fn test_single_stack_trace_in_chain() {
    let capture = FaultCapture::new(FaultConfig::default()).with_frame_collector(|| {
        vec![
            StackFrame::new("/srv/app/src/cart.rs", "total", 42).with_type("shop::Cart"),
            StackFrame::new("/srv/app/src/main.rs", "main", 7),
        ]
    });
    let mut session = MemorySession::new();
    let request = cart_request();

    let reports: Vec<_> = (0..3)
        .map(|_| {
            fatal(&capture, &mut session, &request)
                .report
                .expect("fatal faults are reported")
        })
        .collect();

    for report in &reports {
        assert_eq!(report.text.matches(STACK_TRACE_MARKER).count(), 1);
        assert!(report.text.contains("#1 main.rs : main() on line 7"));
        assert!(report.text.contains("#2 cart.rs : shop::Cart::total() on line 42"));
    }
    assert_eq!(reports[2].text.matches("<b>Website Error</b>").count(), 3);
    assert_eq!(reports[2].text.matches("<b>Additional Information</b>").count(), 1);
}

#[test]
fn test_sanitizes_quotes_and_line_breaks() {
    let capture = FaultCapture::new(FaultConfig::default());
    let mut session = MemorySession::new();
    let request = RequestContext::builder()
        .request_uri("/search")
        .query_string("q=\"<script>alert('x')</script>\"")
        .query_param("q", "\"<script>alert('x')</script>\"")
        .build();

    let mut scope = RequestScope::new(&mut session, &request);
    let handling = capture.on_fault(
        &mut scope,
        Severity::USER_WARNING,
        "Unexpected \"quote\" in 'input'\nsecond line\r\nthird line",
        "search.rs",
        5,
    );

    let text = handling.report.expect("reported").text;
    assert!(!text.contains('"'));
    assert!(!text.contains('\''));
    assert!(!text.contains('\n'));
    assert!(!text.contains('\r'));
    assert!(!text.contains("<script>"));
    assert!(text.contains("Unexpected &quot;quote&quot; in &#039;input&#039;<br />second line<br />third line"));
}

#[test]
fn test_user_notice_reported_and_continues() {
    let capture = FaultCapture::new(FaultConfig::default());
    let mut session = MemorySession::new();
    let request = cart_request();

    let mut scope = RequestScope::new(&mut session, &request);
    let handling = capture.on_fault(&mut scope, Severity::USER_NOTICE, "Coupon expired", "coupon.rs", 3);

    assert_eq!(handling.outcome, Outcome::Continue);
    let report = handling.report.expect("reported");
    assert!(report.text.starts_with("<b>Website Error</b><br /><b>USER_NOTICE:</b> Coupon expired"));
    assert_eq!(session.get(ERROR), Some(Value::Text(report.text)));
    assert!(!session.contains(ERROR_BACKLOG));
    assert!(!session.contains(ERROR_LOOP));
}

#[test]
fn test_mask_suppresses_faults() {
    let capture = FaultCapture::new(FaultConfig {
        reporting_mask: Severity(Severity::ERROR.code() | Severity::USER_ERROR.code()),
        ..FaultConfig::default()
    });
    let mut session = MemorySession::new();
    let request = cart_request();

    let mut scope = RequestScope::new(&mut session, &request);
    let handling = capture.on_fault(&mut scope, Severity::WARNING, "Deprecated call", "legacy.rs", 1);
    assert_eq!(handling.outcome, Outcome::Continue);
    assert!(handling.report.is_none());
    assert!(!handling.use_default_handler);

    let handling = capture.on_fault(&mut scope, Severity::USER_ERROR, "Out of stock", "stock.rs", 9);
    assert!(handling.outcome.ends_request());
}

#[test]
fn test_file_sink_appends_reports() {
    let dir = tempfile::tempdir().expect("temp dir");
    let log_file = dir.path().join("error_log.html");
    let capture = FaultCapture::new(FaultConfig {
        log_to_file: true,
        log_file: log_file.clone(),
        ..FaultConfig::default()
    });
    let mut session = MemorySession::new();
    let request = cart_request();

    let first = fatal(&capture, &mut session, &request).report.expect("reported");
    let second = fatal(&capture, &mut session, &request).report.expect("reported");

    let contents = std::fs::read_to_string(&log_file).expect("log file written");
    assert_eq!(contents, format!("{first}<hr><br />{second}<hr><br />"));
}

#[test]
fn test_unwritable_log_file_does_not_change_outcome() {
    let dir = tempfile::tempdir().expect("temp dir");
    let capture = FaultCapture::new(FaultConfig {
        log_to_file: true,
        // A directory cannot be opened for appending.
        log_file: dir.path().to_path_buf(),
        ..FaultConfig::default()
    });
    let mut session = MemorySession::new();
    let request = cart_request();

    let handling = fatal(&capture, &mut session, &request);
    assert_eq!(handling.outcome.redirect_location(), Some("/shop/cart"));
    assert!(session.contains(ERROR));
}

#[test]
fn test_verbose_dump() {
    let capture = FaultCapture::new(FaultConfig {
        log_all_ambient_state: true,
        ..FaultConfig::default()
    });
    let mut session = MemorySession::new();
    session.set("cart", vec!["apple", "pear"].to_value());
    let request = RequestContext::builder()
        .query_param("page", 2)
        .cookie("sid", "abc123")
        .server_var("SERVER_NAME", "shop.example")
        .build();

    let scope = RequestScope::new(&mut session, &request);
    let dump = capture.verbose_dump(&scope, Instant::now());

    assert!(dump.contains("<b>Load Time:</b> "));
    assert!(dump.contains("[cart] =&gt; Array"));
    assert!(dump.contains("[page] =&gt; 2"));
    assert!(dump.contains("<b>Cookie</b>"));
    assert!(dump.contains("[SERVER_NAME] =&gt; shop.example"));
    assert!(dump.contains("<br />\n"));
}
