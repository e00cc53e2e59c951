//! Redirect-loop detection across requests of one session.
//!
//! Every fatal fault bumps a counter kept in the session. The first fault of
//! a chain redirects to the parent of the failing URI, the following ones
//! retry the URI itself, and once the counter passes the threshold the chain
//! is broken with a terminal page instead of yet another redirect. A request
//! that completes without a fault resets the counter.
//!
//! With the default threshold of 2:
//!
//! | fault | stored counter | outcome |
//! |---|---|---|
//! | 1st | 1 | redirect to parent |
//! | 2nd | 2 | redirect to self |
//! | 3rd | cleared | terminal page |

use crate::{
    config::DEFAULT_LOOP_BREAK_THRESHOLD,
    diagnostics::DiagnosticsView,
    outcome::{Outcome, TerminalPage},
    scope::RequestScope,
    session::LoopState,
};

/// Body served to ordinary callers when a loop is broken.
pub const USER_LOOP_MESSAGE: &str = "Error: Page loop occurred";

/// Headline served to privileged callers when a loop is broken.
pub const ADMIN_LOOP_MESSAGE: &str = "Admin Error Debug Enabled: Page loop occurred";

/// Status of the terminal page.
pub const LOOP_STATUS: u16 = 500;

/// The next step of a redirect chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoopStep {
    /// First fault: store 1 and redirect to the parent URI.
    RedirectToParent,
    /// Repeated fault below the threshold: store `count` and retry.
    RedirectToSelf {
        /// The new counter value.
        count: u32,
    },
    /// The threshold was passed.
    Break,
}

/// Decides between redirecting and breaking the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopGuard {
    threshold: u32,
    view: DiagnosticsView,
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self::new(DEFAULT_LOOP_BREAK_THRESHOLD, DiagnosticsView::default())
    }
}

impl LoopGuard {
    /// Creates a guard tolerating `threshold` consecutive fatal faults.
    ///
    /// Privileged callers get the ambient state rendered by `view` on the
    /// terminal page.
    pub const fn new(threshold: u32, view: DiagnosticsView) -> Self {
        Self { threshold, view }
    }

    /// The configured threshold.
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Computes the step following a stored `counter`.
    pub const fn step(&self, counter: Option<u32>) -> LoopStep {
        match counter {
            None => LoopStep::RedirectToParent,
            Some(n) => {
                let count = n.saturating_add(1);
                if count > self.threshold {
                    LoopStep::Break
                } else {
                    LoopStep::RedirectToSelf { count }
                }
            }
        }
    }

    /// Advances the session's loop state after a fatal fault and returns the
    /// response for the client.
    pub fn evaluate(&self, scope: &mut RequestScope<'_>) -> Outcome {
        let counter = LoopState::new(&mut *scope.session).counter();

        match self.step(counter) {
            LoopStep::RedirectToParent => {
                LoopState::new(&mut *scope.session).set_counter(1);
                Outcome::Redirect {
                    location: scope.request.parent_uri(),
                }
            }
            LoopStep::RedirectToSelf { count } => {
                LoopState::new(&mut *scope.session).set_counter(count);
                Outcome::Redirect {
                    location: scope.request.uri().to_string(),
                }
            }
            LoopStep::Break => {
                let page = self.terminal_page(scope);

                let mut state = LoopState::new(&mut *scope.session);
                state.clear_counter();
                state.clear_backlog();
                state.clear_error();

                tracing::info!(
                    uri = scope.request.uri(),
                    threshold = self.threshold,
                    "redirect loop broken"
                );
                Outcome::Terminate(page)
            }
        }
    }

    fn terminal_page(&self, scope: &RequestScope<'_>) -> TerminalPage {
        let body = if scope.is_privileged() {
            let mut body = String::from("<br />\n<br />\n");
            body.push_str(ADMIN_LOOP_MESSAGE);
            body.push_str("<br />\n");
            body.push_str(&self.view.ambient_snapshot(scope, false));
            body
        } else {
            USER_LOOP_MESSAGE.to_string()
        };

        TerminalPage {
            status: LOOP_STATUS,
            body,
            discard_buffered_output: true,
        }
    }
}
