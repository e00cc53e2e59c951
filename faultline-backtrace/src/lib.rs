#![deny(
    missing_docs,
    unsafe_code,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]

//! Native stack frames for faultline diagnostic reports.
//!
//! This crate provides a [`FrameCollector`] that walks the current call stack
//! with the [`backtrace`] crate and turns every resolved symbol into a
//! [`StackFrame`]: the source file, the qualifying type path, the bare
//! function name, the line number, and the crate the file belongs to.
//!
//! # Quick Start
//!
//! ```rust
//! use faultline::{capture::FaultCapture, config::FaultConfig, hooks::Hooks};
//! use faultline_backtrace::BacktraceCollector;
//!
//! // Frames for faults signaled through `on_fault`
//! let capture = FaultCapture::new(FaultConfig::default())
//!     .with_frame_collector(BacktraceCollector::new_from_env());
//!
//! // Frames for panics recorded by the panic hook
//! let _ = Hooks::new()
//!     .frame_collector(BacktraceCollector::new_from_env())
//!     .install();
//! # let _ = capture;
//! ```
//!
//! # Filtering
//!
//! Raw stacks are noisy. [`BacktraceFilter`] trims them:
//!
//! - frames at the top of the stack belonging to the capture machinery itself
//!   (`backtrace`, `faultline`, the standard library) are dropped;
//! - runs of frames from runtime crates in the middle of the stack are
//!   dropped, unless the run is a single frame;
//! - frames at the bottom of the stack belonging to the runtime (program
//!   start-up, thread spawning) are dropped;
//! - at most [`max_entry_count`](BacktraceFilter::max_entry_count) frames are
//!   kept.
//!
//! # Environment Variables
//!
//! - `RUST_BACKTRACE=full` - Disables all filtering
//!   ([`BacktraceCollector::new_from_env`] only)
//!
//! # Crate Detection
//!
//! The owning crate of a frame is derived from its file path: standard
//! library sources (`std`, `core`, `alloc`), crates unpacked in the cargo
//! registry, and the faultline crates themselves are recognised. Other frames
//! have no crate name; they are usually the application's own code.

use std::{borrow::Cow, sync::OnceLock};

use backtrace::BytesOrWideString;
use faultline::{fault::StackFrame, hooks::FrameCollector};

/// A captured and filtered call stack.
///
/// # Examples
///
/// ```rust
/// use faultline_backtrace::{Backtrace, BacktraceFilter};
///
/// if let Some(backtrace) = Backtrace::capture(&BacktraceFilter::DEFAULT) {
///     println!("captured {} frames", backtrace.frames.len());
/// }
/// ```
#[derive(Debug, Default)]
pub struct Backtrace {
    /// The kept frames, innermost call first.
    pub frames: Vec<StackFrame>,
    /// Number of resolved frames the filter dropped.
    pub total_omitted_frames: usize,
}

/// Collects native stack frames when faults are captured.
///
/// # Examples
///
/// ```rust
/// use faultline::hooks::FrameCollector;
/// use faultline_backtrace::{BacktraceCollector, BacktraceFilter};
///
/// let collector = BacktraceCollector {
///     filter: BacktraceFilter {
///         max_entry_count: 5,
///         ..BacktraceFilter::DEFAULT
///     },
/// };
/// assert!(collector.collect().len() <= 5);
/// ```
#[derive(Copy, Clone, Debug, Default)]
pub struct BacktraceCollector {
    /// Applied to every capture.
    pub filter: BacktraceFilter,
}

/// Which frames a [`Backtrace`] keeps.
///
/// # Examples
///
/// ```rust
/// use faultline_backtrace::BacktraceFilter;
///
/// // Keep up to 50 frames and never skip anything in the middle
/// let filter = BacktraceFilter {
///     skipped_middle_crates: &[],
///     max_entry_count: 50,
///     ..BacktraceFilter::DEFAULT
/// };
/// # let _ = filter;
/// ```
#[derive(Copy, Clone, Debug)]
pub struct BacktraceFilter {
    /// Crates dropped from the innermost end of the stack.
    pub skipped_initial_crates: &'static [&'static str],
    /// Crates whose runs of two or more frames are dropped.
    pub skipped_middle_crates: &'static [&'static str],
    /// Crates dropped from the outermost end of the stack.
    pub skipped_final_crates: &'static [&'static str],
    /// Maximum number of frames to keep.
    pub max_entry_count: usize,
}

impl BacktraceFilter {
    /// Hides the capture machinery, the standard library and `tokio`.
    pub const DEFAULT: Self = Self {
        skipped_initial_crates: &[
            "backtrace",
            "faultline",
            "faultline-backtrace",
            "core",
            "std",
            "alloc",
        ],
        skipped_middle_crates: &["std", "core", "alloc", "tokio"],
        skipped_final_crates: &["std", "core", "alloc", "tokio"],
        max_entry_count: 20,
    };

    /// A filter keeping every frame.
    pub const NONE: Self = Self {
        skipped_initial_crates: &[],
        skipped_middle_crates: &[],
        skipped_final_crates: &[],
        max_entry_count: usize::MAX,
    };
}

impl Default for BacktraceFilter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug)]
struct BacktraceEnvOptions {
    rust_backtrace_full: bool,
}

impl BacktraceEnvOptions {
    fn get() -> &'static Self {
        static FLAGS: OnceLock<BacktraceEnvOptions> = OnceLock::new();

        FLAGS.get_or_init(|| BacktraceEnvOptions {
            rust_backtrace_full: std::env::var_os("RUST_BACKTRACE").is_some_and(|var| var == "full"),
        })
    }
}

impl BacktraceCollector {
    /// Creates a collector configured from the environment.
    ///
    /// With `RUST_BACKTRACE=full` nothing is filtered; otherwise
    /// [`BacktraceFilter::DEFAULT`] is used.
    pub fn new_from_env() -> Self {
        let filter = if BacktraceEnvOptions::get().rust_backtrace_full {
            BacktraceFilter::NONE
        } else {
            BacktraceFilter::DEFAULT
        };
        Self { filter }
    }
}

impl FrameCollector for BacktraceCollector {
    fn collect(&self) -> Vec<StackFrame> {
        Backtrace::capture(&self.filter)
            .map(|backtrace| backtrace.frames)
            .unwrap_or_default()
    }
}

const FAULTLINE_BACKTRACE_DIR: &str = env!("CARGO_MANIFEST_DIR");

impl Backtrace {
    /// Captures the current call stack, filtered according to `filter`.
    ///
    /// Returns `None` if no frame could be resolved.
    pub fn capture(filter: &BacktraceFilter) -> Option<Self> {
        let mut frames = Vec::new();

        backtrace::trace(|frame| {
            backtrace::resolve_frame(frame, |symbol| {
                // Frames without a symbol name or a file are useless in a report.
                if let (Some(name), Some(path)) = (symbol.name(), symbol.filename_raw()) {
                    let (file, crate_name) = classify_path(path);
                    frames.push(to_stack_frame(&format!("{name:#}"), file, symbol.lineno(), crate_name));
                }
            });
            true
        });

        (!frames.is_empty()).then(|| filter.apply(frames))
    }
}

impl BacktraceFilter {
    /// Filters `frames`, innermost call first.
    pub fn apply(&self, frames: Vec<StackFrame>) -> Backtrace {
        let total = frames.len();
        let start = frames
            .iter()
            .position(|frame| !from_any(frame, self.skipped_initial_crates))
            .unwrap_or(total);
        let mut end = total;
        while end > start && is_runtime_entry(&frames[end - 1], self) {
            end -= 1;
        }

        let mut kept = Vec::new();
        let mut run = Vec::new();
        for frame in frames.into_iter().take(end).skip(start) {
            let skippable = from_any(&frame, self.skipped_middle_crates);
            let ends_run = run
                .first()
                .is_some_and(|first| !(skippable && same_crate(first, &frame)));
            if ends_run {
                flush_run(&mut run, &mut kept);
            }
            if skippable {
                run.push(frame);
            } else {
                kept.push(frame);
            }
        }
        flush_run(&mut run, &mut kept);
        kept.truncate(self.max_entry_count);

        Backtrace {
            total_omitted_frames: total - kept.len(),
            frames: kept,
        }
    }
}

fn from_any(frame: &StackFrame, crates: &[&str]) -> bool {
    frame
        .crate_name
        .as_deref()
        .is_some_and(|name| crates.contains(&name))
}

fn same_crate(a: &StackFrame, b: &StackFrame) -> bool {
    a.crate_name == b.crate_name
}

/// A lone frame from a skipped crate is kept, longer runs are dropped.
fn flush_run(run: &mut Vec<StackFrame>, kept: &mut Vec<StackFrame>) {
    if run.len() == 1 {
        kept.append(run);
    } else {
        run.clear();
    }
}

fn is_runtime_entry(frame: &StackFrame, filter: &BacktraceFilter) -> bool {
    if let Some(crate_name) = &frame.crate_name
        && filter.skipped_final_crates.contains(&&**crate_name)
    {
        return true;
    }

    frame.type_name.is_none()
        && matches!(
            frame.function.as_deref(),
            Some("__libc_start_call_main" | "__libc_start_main_impl" | "_start")
        )
}

/// Builds a frame from a demangled symbol.
fn to_stack_frame(
    sym_demangled: &str,
    file: String,
    line: Option<u32>,
    crate_name: Option<Cow<'static, str>>,
) -> StackFrame {
    let (type_name, function) = split_symbol(sym_demangled);
    StackFrame {
        file: Some(file),
        type_name: type_name.map(str::to_string),
        function: Some(function.to_string()),
        line,
        crate_name,
    }
}

/// Splits a demangled symbol into its qualifying path and function name.
///
/// `shop::cart::Cart::total` splits into `shop::cart::Cart` and `total`.
/// Only `::` outside of generics, trait qualifications and closure markers
/// separates the two. Generic arguments of the function itself are dropped.
fn split_symbol(sym: &str) -> (Option<&str>, &str) {
    let mut depth = 0usize;
    let mut prev = '\0';
    let mut last_separator = None;

    for (i, c) in sym.char_indices() {
        match c {
            '<' | '{' | '(' => depth += 1,
            '>' if prev != '-' => depth = depth.saturating_sub(1),
            '}' | ')' => depth = depth.saturating_sub(1),
            ':' if depth == 0 && prev == ':' => last_separator = Some(i - 1),
            _ => {}
        }
        prev = c;
    }

    let (type_name, segment) = match last_separator {
        Some(at) => (Some(&sym[..at]).filter(|path| !path.is_empty()), &sym[at + 2..]),
        None => (None, sym),
    };
    (type_name, leading_identifier(segment))
}

/// The identifier `segment` starts with, or all of it for markers such as
/// `{{closure}}`.
fn leading_identifier(segment: &str) -> &str {
    match segment.chars().next() {
        Some(c) if c == '_' || unicode_ident::is_xid_start(c) => {
            let end = segment
                .char_indices()
                .find(|&(_, c)| !unicode_ident::is_xid_continue(c))
                .map_or(segment.len(), |(i, _)| i);
            &segment[..end]
        }
        _ => segment,
    }
}

/// Returns the lossy path and the owning crate of a frame's source file.
fn classify_path(path: BytesOrWideString<'_>) -> (String, Option<Cow<'static, str>>) {
    let raw_path = path.to_str_lossy().into_owned();
    let crate_name = crate_name_for(&raw_path);
    (raw_path, crate_name)
}

fn crate_name_for(path_str: &str) -> Option<Cow<'static, str>> {
    static REGEXES: OnceLock<Option<[regex::Regex; 2]>> = OnceLock::new();
    let regexes = REGEXES.get_or_init(|| {
        Some([
            // rust-src component or remapped /rustc/<hash> sources
            regex::Regex::new(
                r"(?:/lib/rustlib/src/rust|^/rustc/[0-9a-f]{40})/library/(std|core|alloc)/src/.*$",
            )
            .ok()?,
            // unpacked registry crates, captured without the version
            regex::Regex::new(
                r"/\.cargo/registry/src/[^/]+-[0-9a-f]{16}/([^./]+)-[0-9]+\.[^/]*/src/.*$",
            )
            .ok()?,
        ])
    });

    if let Some(regexes) = regexes {
        for regex in regexes {
            if let Some(crate_capture) = regex.captures(path_str).and_then(|c| c.get(1)) {
                return Some(Cow::Owned(crate_capture.as_str().to_string()));
            }
        }
    }

    if is_crate_source(path_str, FAULTLINE_BACKTRACE_DIR) {
        return Some(Cow::Borrowed("faultline-backtrace"));
    }

    if is_crate_source(path_str, faultline::__private::FAULTLINE_MANIFEST_DIR) {
        return Some(Cow::Borrowed("faultline"));
    }

    None
}

/// Returns `true` if `path` lies in the `src` directory of the crate rooted
/// at `manifest_dir`.
fn is_crate_source(path: &str, manifest_dir: &str) -> bool {
    path.strip_prefix(manifest_dir)
        .and_then(|rest| rest.strip_prefix(['/', '\\']))
        .and_then(|rest| rest.strip_prefix("src"))
        .is_some_and(|rest| rest.starts_with(['/', '\\']))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_symbol() {
        assert_eq!(
            split_symbol("shop::cart::Cart::total"),
            (Some("shop::cart::Cart"), "total")
        );
        assert_eq!(split_symbol("main"), (None, "main"));
        assert_eq!(
            split_symbol("<shop::Cart as core::fmt::Display>::fmt"),
            (Some("<shop::Cart as core::fmt::Display>"), "fmt")
        );
        assert_eq!(
            split_symbol("shop::main::{{closure}}"),
            (Some("shop::main"), "{{closure}}")
        );
        assert_eq!(
            split_symbol("shop::apply<fn() -> u32>"),
            (Some("shop"), "apply")
        );
    }

    #[test]
    fn test_leading_identifier() {
        assert_eq!(leading_identifier("_start"), "_start");
        assert_eq!(leading_identifier("{{closure}}"), "{{closure}}");
        assert_eq!(leading_identifier("parse<T>"), "parse");
    }

    #[test]
    fn test_filter_apply() {
        let app = |function: &str| StackFrame::new("src/orders.rs", function, 1);
        let from = |krate: &'static str, function: &str| StackFrame::new("lib.rs", function, 1).with_crate(krate);
        let frames = vec![
            from("backtrace", "trace"),
            from("faultline", "on_fault"),
            app("place_order"),
            from("core", "call_once"),
            app("handle"),
            from("tokio", "poll"),
            from("tokio", "poll_inner"),
            from("tokio", "run"),
            app("serve"),
            from("std", "lang_start"),
            StackFrame {
                function: Some("_start".to_string()),
                ..StackFrame::default()
            },
        ];

        let backtrace = BacktraceFilter::DEFAULT.apply(frames.clone());
        let kept: Vec<_> = backtrace
            .frames
            .iter()
            .map(|frame| frame.function.as_deref().unwrap())
            .collect();
        assert_eq!(kept, ["place_order", "call_once", "handle", "serve"]);
        assert_eq!(backtrace.total_omitted_frames, 7);

        let limited = BacktraceFilter {
            max_entry_count: 2,
            ..BacktraceFilter::DEFAULT
        }
        .apply(frames.clone());
        assert_eq!(limited.frames.len(), 2);
        assert_eq!(limited.total_omitted_frames, 9);

        assert_eq!(BacktraceFilter::NONE.apply(frames).frames.len(), 10);
    }

    #[test]
    fn test_crate_name_for_std_and_registry() {
        assert_eq!(
            crate_name_for(
                "/rustc/0123456789abcdef0123456789abcdef01234567/library/std/src/panicking.rs"
            )
            .as_deref(),
            Some("std")
        );
        assert_eq!(
            crate_name_for(
                "/home/u/.rustup/toolchains/stable/lib/rustlib/src/rust/library/core/src/ops/function.rs"
            )
            .as_deref(),
            Some("core")
        );
        assert_eq!(
            crate_name_for(
                "/home/u/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/tokio-1.47.1/src/runtime/task/mod.rs"
            )
            .as_deref(),
            Some("tokio")
        );
        assert_eq!(crate_name_for("/srv/app/src/main.rs"), None);
    }

    #[test]
    fn test_crate_name_for_workspace() {
        let own = format!("{FAULTLINE_BACKTRACE_DIR}/src/lib.rs");
        assert_eq!(crate_name_for(&own).as_deref(), Some("faultline-backtrace"));

        let core = format!(
            "{}/src/capture.rs",
            faultline::__private::FAULTLINE_MANIFEST_DIR
        );
        assert_eq!(crate_name_for(&core).as_deref(), Some("faultline"));

        let sibling = format!("{FAULTLINE_BACKTRACE_DIR}/tests/lib.rs");
        assert_eq!(crate_name_for(&sibling), None);
    }

    #[test]
    fn test_runtime_entry() {
        let filter = BacktraceFilter::DEFAULT;
        let start = StackFrame {
            function: Some("__libc_start_main_impl".to_string()),
            ..StackFrame::default()
        };
        assert!(is_runtime_entry(&start, &filter));

        let std_frame = StackFrame::new("rt.rs", "lang_start", 1).with_crate("std");
        assert!(is_runtime_entry(&std_frame, &filter));
        assert!(!is_runtime_entry(&std_frame, &BacktraceFilter::NONE));

        let app = StackFrame::new("main.rs", "main", 3);
        assert!(!is_runtime_entry(&app, &filter));
    }

    #[test]
    fn test_collect_respects_max_entry_count() {
        let collector = BacktraceCollector {
            filter: BacktraceFilter {
                max_entry_count: 3,
                ..BacktraceFilter::NONE
            },
        };
        assert!(collector.collect().len() <= 3);
    }
}
