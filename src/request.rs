//! The request a fault occurred in.
//!
//! [`RequestContext`] is a plain snapshot of what the host knows about the
//! current request: the server variables used in the report's request
//! section, and the parameter maps dumped by the ambient-state snapshot.
//!
//! # Examples
//!
//! ```rust
//! use faultline::request::RequestContext;
//!
//! let request = RequestContext::builder()
//!     .method("GET")
//!     .request_uri("/shop/cart/checkout")
//!     .remote_addr("203.0.113.9")
//!     .query_param("step", "2")
//!     .build();
//!
//! assert_eq!(request.uri(), "/shop/cart/checkout");
//! assert_eq!(request.parent_uri(), "/shop/cart");
//! ```

use indexmap::IndexMap;

use crate::value::Value;

/// Snapshot of the current request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestContext {
    /// Client address.
    pub remote_addr: Option<String>,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
    /// `Referer` header.
    pub referrer: Option<String>,
    /// Raw query string, without the leading `?`.
    pub query_string: Option<String>,
    /// HTTP method.
    pub method: Option<String>,
    /// Resolved path of the script or handler serving the request.
    pub script_path: Option<String>,
    /// Name under which the handler was invoked.
    pub script_name: Option<String>,
    /// Request URI, including any query string.
    pub request_uri: Option<String>,
    /// Protocol, e.g. `HTTP/1.1`.
    pub protocol: Option<String>,
    /// Decoded query parameters.
    pub query: IndexMap<String, Value>,
    /// Decoded form fields.
    pub form: IndexMap<String, Value>,
    /// Request cookies.
    pub cookies: IndexMap<String, Value>,
    /// Server variables.
    pub server: IndexMap<String, Value>,
    /// Process environment.
    pub env: IndexMap<String, Value>,
}

impl RequestContext {
    /// Starts building a request context.
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::default()
    }

    /// The request URI, or `/` when unknown.
    pub fn uri(&self) -> &str {
        match self.request_uri.as_deref() {
            Some(uri) if !uri.is_empty() => uri,
            _ => "/",
        }
    }

    /// The request URI with its last path segment removed.
    ///
    /// The query string is discarded along with the last segment. The root
    /// is its own parent.
    pub fn parent_uri(&self) -> String {
        parent_path(self.uri())
    }
}

/// Strips the last segment of a path, the way `dirname` does.
pub fn parent_path(uri: &str) -> String {
    let path = uri.split_once('?').map_or(uri, |(path, _)| path);
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => match trimmed[..idx].trim_end_matches('/') {
            "" => "/".to_string(),
            parent => parent.to_string(),
        },
        None if path.starts_with('/') => "/".to_string(),
        None => ".".to_string(),
    }
}

/// Builder for [`RequestContext`].
#[derive(Debug, Default)]
#[must_use]
pub struct RequestContextBuilder {
    inner: RequestContext,
}

macro_rules! builder_fields {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $name(mut self, value: impl Into<String>) -> Self {
                self.inner.$name = Some(value.into());
                self
            }
        )*
    };
}

impl RequestContextBuilder {
    builder_fields! {
        /// Sets the client address.
        remote_addr,
        /// Sets the `User-Agent` header.
        user_agent,
        /// Sets the `Referer` header.
        referrer,
        /// Sets the raw query string.
        query_string,
        /// Sets the HTTP method.
        method,
        /// Sets the resolved script path.
        script_path,
        /// Sets the script name.
        script_name,
        /// Sets the request URI.
        request_uri,
        /// Sets the protocol.
        protocol,
    }

    /// Adds a query parameter.
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inner.query.insert(key.into(), value.into());
        self
    }

    /// Adds a form field.
    pub fn form_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inner.form.insert(key.into(), value.into());
        self
    }

    /// Adds a cookie.
    pub fn cookie(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inner.cookies.insert(key.into(), value.into());
        self
    }

    /// Adds a server variable.
    pub fn server_var(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inner.server.insert(key.into(), value.into());
        self
    }

    /// Captures the process environment.
    pub fn env_from_process(mut self) -> Self {
        self.inner.env = std::env::vars()
            .map(|(k, v)| (k, Value::Text(v)))
            .collect();
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> RequestContext {
        self.inner
    }
}
