//! Per-request context handed to the capture pipeline.
//!
//! A [`RequestScope`] bundles the three things the pipeline needs from the
//! host for a single request: the client's session, a snapshot of the
//! request, and the authorization check used at loop-break time.

use core::fmt;

use crate::{request::RequestContext, session::SessionStore};

/// Decides whether the caller of a request may see verbose diagnostics.
///
/// Consulted only when a redirect loop is broken. Closures taking a
/// [`RequestContext`] implement this trait.
///
/// # Examples
///
/// ```rust
/// use faultline::{request::RequestContext, scope::Authorizer};
///
/// let admins_only = |request: &RequestContext| request.remote_addr.as_deref() == Some("10.0.0.1");
/// let request = RequestContext::builder().remote_addr("10.0.0.1").build();
/// assert!(admins_only.is_privileged(&request));
/// ```
pub trait Authorizer {
    /// Returns `true` if the caller is privileged.
    fn is_privileged(&self, request: &RequestContext) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(&RequestContext) -> bool,
{
    fn is_privileged(&self, request: &RequestContext) -> bool {
        self(request)
    }
}

/// An [`Authorizer`] that never grants privileges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Anonymous;

impl Authorizer for Anonymous {
    fn is_privileged(&self, _request: &RequestContext) -> bool {
        false
    }
}

/// Everything the pipeline reads or writes for one request.
pub struct RequestScope<'a> {
    /// The client's session.
    pub session: &'a mut dyn SessionStore,
    /// The request being served.
    pub request: &'a RequestContext,
    /// The privilege check for the caller.
    pub authorizer: &'a dyn Authorizer,
    ended_by_fault: bool,
}

impl<'a> RequestScope<'a> {
    /// Creates a scope for an anonymous caller.
    pub fn new(session: &'a mut dyn SessionStore, request: &'a RequestContext) -> Self {
        Self {
            session,
            request,
            authorizer: &Anonymous,
            ended_by_fault: false,
        }
    }

    /// Uses `authorizer` to decide whether the caller is privileged.
    pub fn with_authorizer(mut self, authorizer: &'a dyn Authorizer) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Returns `true` if the caller is privileged.
    pub fn is_privileged(&self) -> bool {
        self.authorizer.is_privileged(self.request)
    }

    /// Returns `true` once a fatal fault has answered this request with a
    /// redirect or a terminal page.
    pub fn ended_by_fault(&self) -> bool {
        self.ended_by_fault
    }

    pub(crate) fn mark_ended_by_fault(&mut self) {
        self.ended_by_fault = true;
    }
}

impl fmt::Debug for RequestScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("session", &self.session.snapshot())
            .field("request", self.request)
            .field("ended_by_fault", &self.ended_by_fault)
            .finish_non_exhaustive()
    }
}
