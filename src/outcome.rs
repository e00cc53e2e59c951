//! Client-visible decisions produced by the pipeline.
//!
//! The crate never writes to a response itself. It returns an [`Outcome`]
//! and the host applies it: a redirect becomes a `Location` header, a
//! terminal page replaces whatever the handler had buffered.

/// What the host should do with the current request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Carry on with the request.
    Continue,
    /// Stop running application code and redirect the client.
    Redirect {
        /// Target path.
        location: String,
    },
    /// Stop running application code and serve a terminal page.
    Terminate(TerminalPage),
}

impl Outcome {
    /// Returns `true` if no further application code may run.
    pub fn ends_request(&self) -> bool {
        !matches!(self, Outcome::Continue)
    }

    /// The redirect target, if this is a redirect.
    pub fn redirect_location(&self) -> Option<&str> {
        match self {
            Outcome::Redirect { location } => Some(location),
            _ => None,
        }
    }

    /// The terminal page, if this is a termination.
    pub fn terminal_page(&self) -> Option<&TerminalPage> {
        match self {
            Outcome::Terminate(page) => Some(page),
            _ => None,
        }
    }
}

/// Page served when a redirect loop is broken.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerminalPage {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
    /// Whether output already buffered by the handler must be dropped before
    /// writing [`body`](Self::body).
    pub discard_buffered_output: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        assert!(!Outcome::Continue.ends_request());

        let redirect = Outcome::Redirect {
            location: "/shop".to_string(),
        };
        assert!(redirect.ends_request());
        assert_eq!(redirect.redirect_location(), Some("/shop"));
        assert!(redirect.terminal_page().is_none());

        let terminate = Outcome::Terminate(TerminalPage {
            status: 500,
            body: "Error: Page loop occurred".to_string(),
            discard_buffered_output: true,
        });
        assert!(terminate.ends_request());
        assert_eq!(terminate.terminal_page().map(|p| p.status), Some(500));
    }
}
