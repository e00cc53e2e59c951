//! The captured fault and its stack frames.

use std::{borrow::Cow, fmt, path::Path};

use crate::severity::Severity;

/// Source file and line a fault was raised at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    /// The source file path.
    pub file: String,
    /// The 1-based line number.
    pub line: u32,
}

impl SourceLocation {
    /// Creates a new location.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl From<&core::panic::Location<'_>> for SourceLocation {
    fn from(location: &core::panic::Location<'_>) -> Self {
        Self::new(location.file(), location.line())
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A single frame of a native call stack.
///
/// Every field is optional since symbol resolution may fail partially.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackFrame {
    /// Path of the source file the frame belongs to.
    pub file: Option<String>,
    /// Qualifying path of the function, e.g. `shop::cart::Cart`.
    pub type_name: Option<String>,
    /// Bare function name.
    pub function: Option<String>,
    /// Line number in `file`.
    pub line: Option<u32>,
    /// Name of the crate owning `file`, when it could be detected.
    pub crate_name: Option<Cow<'static, str>>,
}

impl StackFrame {
    /// Creates a frame for `function` in `file` at `line`.
    pub fn new(file: impl Into<String>, function: impl Into<String>, line: u32) -> Self {
        Self {
            file: Some(file.into()),
            function: Some(function.into()),
            line: Some(line),
            ..Self::default()
        }
    }

    /// Sets the qualifying type path.
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Sets the owning crate.
    pub fn with_crate(mut self, crate_name: impl Into<Cow<'static, str>>) -> Self {
        self.crate_name = Some(crate_name.into());
        self
    }

    /// Returns the last path component of [`file`](Self::file).
    pub fn file_basename(&self) -> Option<&str> {
        let file = self.file.as_deref()?;
        Path::new(file)
            .file_name()
            .and_then(|name| name.to_str())
            .or(Some(file))
    }
}

/// A single abnormal-condition signal.
///
/// Faults are immutable once captured. [`frames`](Fault::frames) are ordered
/// innermost call first, the way unwinders produce them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fault {
    code: Severity,
    message: String,
    location: SourceLocation,
    frames: Vec<StackFrame>,
}

impl Fault {
    /// Creates a fault without stack frames.
    pub fn new(code: Severity, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            code,
            message: message.into(),
            location,
            frames: Vec::new(),
        }
    }

    /// Attaches native stack frames, innermost first.
    pub fn with_frames(mut self, frames: Vec<StackFrame>) -> Self {
        self.frames = frames;
        self
    }

    /// The severity code.
    pub fn code(&self) -> Severity {
        self.code
    }

    /// The fault message, unescaped.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Where the fault was raised.
    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    /// Captured stack frames, innermost first.
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} at {}", self.code, self.message, self.location)
    }
}
