//! Best-effort inference of where a log call came from.
//!
//! Stack text is parsed only through [`resolve_caller_frame`] and
//! [`parse_frames`], so a structured frame source can replace the pattern
//! matching without touching callers.

use once_cell::sync::Lazy;
use regex::Regex;
use std::backtrace::Backtrace;
use std::panic::Location;

/// How the client fills `function_name` / `file_path` when the caller did not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallerResolution {
    /// Leave both fields to explicit metadata and context.
    Disabled,
    /// `#[track_caller]` location: cheap, yields `file_path` only.
    #[default]
    Location,
    /// Capture and walk a backtrace: yields both fields, costs a symbolized
    /// stack walk per log call.
    Backtrace,
}

/// One parsed stack frame. Either side may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallerFrame {
    pub function_name: Option<String>,
    pub file_path: Option<String>,
}

impl CallerFrame {
    pub fn is_empty(&self) -> bool {
        self.function_name.is_none() && self.file_path.is_none()
    }
}

// at foo (/a/b.js:10:5), at async Foo.bar (file:///x.mjs:1:2), at new Foo (...)
static NAMED_FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*at\s+(?:async\s+|new\s+)?(\S+)\s+\((.+?):(\d+):(\d+)\)\s*$").expect("valid regex")
});

// at /a/b.js:10:5, and the location line of a Rust backtrace
static ANONYMOUS_FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*at\s+(.+?):(\d+):(\d+)\s*$").expect("valid regex"));

// "  12: my_app::handlers::pay" in Rust backtraces
static SYMBOL_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+:\s+(\S.*?)\s*$").expect("valid regex"));

static SYMBOL_HASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"::h[0-9a-f]{16}$").expect("valid regex"));

/// Frames whose symbol starts with one of these are never the caller.
const INTERNAL_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "<std::",
    "<core::",
    "<alloc::",
    "log_collector::",
    "<log_collector::",
    "__rust",
    "rust_begin_unwind",
];

/// Parse every frame out of a textual stack trace.
///
/// Understands `at <fn> (<file>:<line>:<col>)`, `at <file>:<line>:<col>`, and
/// Rust's `N: symbol` line followed by its `at` location line. Unparseable
/// lines are skipped.
pub fn parse_frames(raw_trace: &str) -> Vec<CallerFrame> {
    let mut frames = Vec::new();
    let mut pending_symbol: Option<String> = None;

    for line in raw_trace.lines() {
        if let Some(caps) = NAMED_FRAME.captures(line) {
            if let Some(symbol) = pending_symbol.take() {
                frames.push(CallerFrame { function_name: Some(symbol), file_path: None });
            }
            frames.push(CallerFrame {
                function_name: Some(caps[1].to_string()),
                file_path: Some(caps[2].to_string()),
            });
        } else if let Some(caps) = ANONYMOUS_FRAME.captures(line) {
            frames.push(CallerFrame {
                function_name: pending_symbol.take(),
                file_path: Some(caps[1].to_string()),
            });
        } else if let Some(caps) = SYMBOL_LINE.captures(line) {
            if let Some(symbol) = pending_symbol.take() {
                frames.push(CallerFrame { function_name: Some(symbol), file_path: None });
            }
            pending_symbol = Some(SYMBOL_HASH.replace(&caps[1], "").into_owned());
        }
    }
    if let Some(symbol) = pending_symbol {
        frames.push(CallerFrame { function_name: Some(symbol), file_path: None });
    }
    frames
}

/// First frame of `raw_trace` that names a file, or `None`.
pub fn resolve_caller_frame(raw_trace: &str) -> Option<CallerFrame> {
    parse_frames(raw_trace)
        .into_iter()
        .find(|frame| frame.file_path.is_some())
}

/// First frame of `raw_trace` that does not belong to this crate or the
/// standard library.
pub fn resolve_external_frame(raw_trace: &str) -> Option<CallerFrame> {
    parse_frames(raw_trace).into_iter().find(|frame| match &frame.function_name {
        Some(name) => !is_internal(name),
        None => frame.file_path.is_some(),
    })
}

fn is_internal(symbol: &str) -> bool {
    INTERNAL_PREFIXES.iter().any(|prefix| symbol.starts_with(prefix))
}

/// Resolves the caller of a log call according to a [`CallerResolution`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CallerResolver {
    mode: CallerResolution,
}

impl CallerResolver {
    pub fn new(mode: CallerResolution) -> Self {
        CallerResolver { mode }
    }

    pub fn mode(&self) -> CallerResolution {
        self.mode
    }

    /// Best-effort caller frame. `location` is the `#[track_caller]` site of
    /// the public logging method, which already skips the wrappers.
    pub fn resolve(&self, location: &'static Location<'static>) -> Option<CallerFrame> {
        match self.mode {
            CallerResolution::Disabled => None,
            CallerResolution::Location => Some(CallerFrame {
                function_name: None,
                file_path: Some(location.file().to_string()),
            }),
            CallerResolution::Backtrace => {
                let trace = Backtrace::force_capture().to_string();
                resolve_external_frame(&trace)
                    .filter(|frame| !frame.is_empty())
                    .or_else(|| {
                        Some(CallerFrame {
                            function_name: None,
                            file_path: Some(location.file().to_string()),
                        })
                    })
            }
        }
    }
}

/// Readable name for a closure or future type: the defining path without
/// trailing `{{closure}}` segments.
pub fn callable_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let mut name = full;
    while let Some(stripped) = name.strip_suffix("::{{closure}}") {
        name = stripped;
    }
    if name.is_empty() {
        full.to_string()
    } else {
        name.to_string()
    }
}

/// Last path segment of a type name, generics removed.
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_frame() {
        let trace = "TypeError: x is undefined\n    at foo (/a/b.js:10:5)\n    at bar (/a/c.js:1:1)";
        let frame = resolve_caller_frame(trace).unwrap();
        assert_eq!(frame.function_name.as_deref(), Some("foo"));
        assert_eq!(frame.file_path.as_deref(), Some("/a/b.js"));
    }

    #[test]
    fn parses_anonymous_frame() {
        let trace = "Error: boom\n    at /srv/app/index.js:42:7\n    at foo (/a/b.js:10:5)";
        let frame = resolve_caller_frame(trace).unwrap();
        assert_eq!(frame.function_name, None);
        assert_eq!(frame.file_path.as_deref(), Some("/srv/app/index.js"));
    }

    #[test]
    fn parses_async_and_windows_paths() {
        let trace = "Error\n    at async handler (C:\\srv\\app.js:3:9)";
        let frame = resolve_caller_frame(trace).unwrap();
        assert_eq!(frame.function_name.as_deref(), Some("handler"));
        assert_eq!(frame.file_path.as_deref(), Some("C:\\srv\\app.js"));
    }

    #[test]
    fn parses_rust_backtrace_and_skips_internal_frames() {
        let trace = "   0: std::backtrace::Backtrace::force_capture\n             at /rustc/abc/library/std/src/backtrace.rs:310:9\n   1: log_collector::client::LogClient::emit\n             at ./src/client.rs:120:13\n   2: billing::charge::h0123456789abcdef\n             at ./src/charge.rs:18:5\n   3: main\n";
        let frames = parse_frames(trace);
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[3], CallerFrame { function_name: Some("main".into()), file_path: None });

        let frame = resolve_external_frame(trace).unwrap();
        assert_eq!(frame.function_name.as_deref(), Some("billing::charge"));
        assert_eq!(frame.file_path.as_deref(), Some("./src/charge.rs"));
    }

    #[test]
    fn garbage_yields_nothing() {
        assert_eq!(resolve_caller_frame("no frames here\njust text"), None);
        assert_eq!(resolve_caller_frame(""), None);
    }

    #[test]
    fn location_mode_reports_file_only() {
        let resolver = CallerResolver::new(CallerResolution::Location);
        let frame = resolver.resolve(Location::caller()).unwrap();
        assert_eq!(frame.function_name, None);
        assert!(frame.file_path.is_some());
        assert_eq!(CallerResolver::new(CallerResolution::Disabled).resolve(Location::caller()), None);
    }

    #[test]
    fn backtrace_mode_never_fails() {
        let resolver = CallerResolver::new(CallerResolution::Backtrace);
        assert!(resolver.resolve(Location::caller()).is_some());
    }

    #[test]
    fn callable_names_drop_closure_suffix() {
        fn charge_card() {}
        fn name_of<F>(_: &F) -> String {
            callable_name::<F>()
        }
        assert!(name_of(&charge_card).ends_with("charge_card"));
        let closure = || ();
        assert!(!name_of(&closure).contains("{{closure}}"));
    }

    #[test]
    fn short_type_names() {
        assert_eq!(short_type_name("core::num::error::ParseIntError"), "ParseIntError");
        assert_eq!(short_type_name("alloc::vec::Vec<u8>"), "Vec");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
