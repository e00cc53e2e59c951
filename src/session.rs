//! Session-scoped persistence consumed by the loop guard and report builder.
//!
//! The host owns the actual session mechanism; this crate only needs a
//! key-value view of it, expressed by [`SessionStore`]. [`MemorySession`] is
//! an in-memory implementation for hosts that keep sessions in process, and
//! for tests.
//!
//! Three fields are reserved:
//!
//! | key | holds |
//! |---|---|
//! | [`ERROR_LOOP`] | consecutive fatal-fault counter |
//! | [`ERROR_BACKLOG`] | heading block of the most recent report |
//! | [`ERROR`] | the last full report |

use indexmap::IndexMap;

use crate::value::Value;

/// Session key holding the last full report.
pub const ERROR: &str = "error";
/// Session key holding the backlog heading used to chain reports.
pub const ERROR_BACKLOG: &str = "errorBacklog";
/// Session key holding the consecutive fatal-fault counter.
pub const ERROR_LOOP: &str = "errorLoop";

/// A key-value view of one client's session.
///
/// Implementations are accessed by one request at a time; no internal
/// locking is expected.
pub trait SessionStore {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: Value);

    /// Removes `key`, returning its previous value.
    fn unset(&mut self, key: &str) -> Option<Value>;

    /// Returns every field of the session, for diagnostic dumps.
    fn snapshot(&self) -> IndexMap<String, Value>;
}

/// An in-memory [`SessionStore`] preserving insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemorySession {
    fields: IndexMap<String, Value>,
}

impl MemorySession {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Number of stored fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the session holds no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Option<Value> {
        self.fields.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    fn unset(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    fn snapshot(&self) -> IndexMap<String, Value> {
        self.fields.clone()
    }
}

impl<S: SessionStore + ?Sized> SessionStore for &mut S {
    fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        (**self).set(key, value)
    }

    fn unset(&mut self, key: &str) -> Option<Value> {
        (**self).unset(key)
    }

    fn snapshot(&self) -> IndexMap<String, Value> {
        (**self).snapshot()
    }
}

/// Typed accessors for the reserved loop-state fields of a session.
pub struct LoopState<'a, S: SessionStore + ?Sized> {
    session: &'a mut S,
}

impl<'a, S: SessionStore + ?Sized> LoopState<'a, S> {
    /// Wraps a session.
    pub fn new(session: &'a mut S) -> Self {
        Self { session }
    }

    /// The consecutive fatal-fault counter, `None` when absent.
    ///
    /// A value that is not a non-negative integer counts as absent.
    pub fn counter(&self) -> Option<u32> {
        self.session
            .get(ERROR_LOOP)?
            .as_int()
            .and_then(|n| u32::try_from(n).ok())
    }

    /// Stores the counter.
    pub fn set_counter(&mut self, n: u32) {
        self.session.set(ERROR_LOOP, Value::Int(i64::from(n)));
    }

    /// Removes the counter.
    pub fn clear_counter(&mut self) {
        self.session.unset(ERROR_LOOP);
    }

    /// The stored backlog heading.
    pub fn backlog(&self) -> Option<String> {
        match self.session.get(ERROR_BACKLOG)? {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Stores the backlog heading.
    pub fn set_backlog(&mut self, heading: &str) {
        self.session.set(ERROR_BACKLOG, Value::from(heading));
    }

    /// Removes the backlog heading.
    pub fn clear_backlog(&mut self) {
        self.session.unset(ERROR_BACKLOG);
    }

    /// Stores the last full report.
    pub fn set_error(&mut self, report: &str) {
        self.session.set(ERROR, Value::from(report));
    }

    /// Removes the last full report.
    pub fn clear_error(&mut self) {
        self.session.unset(ERROR);
    }
}
