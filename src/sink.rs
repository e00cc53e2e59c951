//! Persistence of finished reports.

use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::{
    report::DiagnosticReport,
    session::{LoopState, SessionStore},
};

/// Appended after every report written to the report file.
pub const REPORT_SEPARATOR: &str = "<hr><br />";

/// Stores reports in the session and, optionally, in an append-only file.
///
/// Persisting never fails: file errors are logged and dropped so that they
/// cannot replace the response to the fault being reported.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogSink {
    log_file: Option<PathBuf>,
}

impl LogSink {
    /// A sink that only writes to the session.
    pub fn session_only() -> Self {
        Self { log_file: None }
    }

    /// A sink that also appends every report to `path`.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            log_file: Some(path.into()),
        }
    }

    /// The report file, if file logging is enabled.
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Records `report` as the session's last report and appends it to the
    /// report file.
    pub fn persist(&self, report: &DiagnosticReport, session: &mut dyn SessionStore) {
        LoopState::new(session).set_error(&report.text);

        if let Some(path) = &self.log_file
            && let Err(error) = append(path, &report.text)
        {
            tracing::warn!(
                path = %path.display(),
                %error,
                "failed to append diagnostic report to file"
            );
        }
    }
}

fn append(path: &Path, text: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    file.write_all(REPORT_SEPARATOR.as_bytes())?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Local;

    use super::*;
    use crate::{
        fault::SourceLocation,
        session::{self, MemorySession},
        severity::{self, Severity},
        value::Value,
    };

    fn report(text: &str) -> DiagnosticReport {
        DiagnosticReport {
            heading: String::new(),
            classification: severity::classify(Severity::ERROR),
            code: Severity::ERROR,
            message: "boom".to_string(),
            location: SourceLocation::new("lib.rs", 1),
            text: text.to_string(),
            generated_at: Local::now(),
        }
    }

    #[test]
    fn test_session_only() {
        let mut session = MemorySession::new();
        LogSink::session_only().persist(&report("first"), &mut session);
        LogSink::session_only().persist(&report("second"), &mut session);
        assert_eq!(session.get(session::ERROR), Some(Value::from("second")));
    }

    #[test]
    fn test_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.html");
        let sink = LogSink::with_file(&path);
        let mut session = MemorySession::new();

        sink.persist(&report("one"), &mut session);
        sink.persist(&report("two"), &mut session);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "one<hr><br />two<hr><br />");
        assert_eq!(sink.log_file(), Some(path.as_path()));
    }

    #[test]
    fn test_file_errors_are_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::with_file(dir.path().join("missing").join("errors.html"));
        let mut session = MemorySession::new();

        sink.persist(&report("kept"), &mut session);
        assert_eq!(session.get(session::ERROR), Some(Value::from("kept")));
    }

    struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_file_errors_are_logged() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::clone(&captured);
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || CapturedWriter(Arc::clone(&writer)))
            .finish();

        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::with_file(dir.path());
        let mut session = MemorySession::new();
        tracing::subscriber::with_default(subscriber, || {
            sink.persist(&report("kept"), &mut session);
        });

        let logs = String::from_utf8(captured.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("WARN"));
        assert!(logs.contains("failed to append diagnostic report to file"));
        assert!(session.contains(session::ERROR));
    }
}
