//! The diagnostics infrastructure for blang.
//!
//! Every stage (scanner, parser, runtime, assembler, VM) reports failures as
//! its own error type. Those types convert into a [`Diagnostic`] so the
//! command line tools can render them the same way.

use std::fmt;
use std::io::{self, Write};

/// Byte range into the source text.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[inline]
    pub const fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    #[inline]
    pub fn to(self, other: Span) -> Span {
        Span { start: self.start.min(other.start), end: self.end.max(other.end) }
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span { start: range.start, end: range.end }
    }
}

/// Static, human-readable text for an error kind.
pub trait AsStr {
    fn as_str(&self) -> &'static str;
}

/// How bad a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl AsStr for Severity {
    fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }
}

impl Severity {
    const fn color(self) -> &'static str {
        match self {
            Severity::Error => "\x1b[1;31m",
            Severity::Warning => "\x1b[1;33m",
            Severity::Note => "\x1b[1;34m",
        }
    }
}

/// Where in the source a diagnostic points.
///
/// Tokens already know their line and column, runtime errors only carry a
/// byte span, so both forms are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Span(Span),
    LineColumn { line: usize, column: usize },
    Unknown,
}

/// A single reportable message.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Short code such as `syntax` or `runtime`.
    pub code: &'static str,
    pub message: String,
    pub location: Location,
}

impl Diagnostic {
    pub fn error(code: &'static str, message: impl Into<String>, location: Location) -> Self {
        Diagnostic { severity: Severity::Error, code, message: message.into(), location }
    }

    pub fn warning(code: &'static str, message: impl Into<String>, location: Location) -> Self {
        Diagnostic { severity: Severity::Warning, code, message: message.into(), location }
    }

    /// Resolves the location against `src` into 1-based `(line, column)`.
    pub fn line_column(&self, src: &str) -> Option<(usize, usize)> {
        match self.location {
            Location::Span(span) => Some(line_column(src, span.start)),
            Location::LineColumn { line, column } => Some((line, column)),
            Location::Unknown => None,
        }
    }

    /// Writes `file:line:col: severity[code]: message`, the offending source
    /// line and a caret under the column.
    pub fn render(&self, src: &str, filename: &str, out: &mut dyn Write) -> io::Result<()> {
        let color = self.severity.color();
        let reset = "\x1b[0m";
        match self.line_column(src) {
            Some((line, column)) => {
                writeln!(
                    out,
                    "{filename}:{line}:{column}: {color}{}[{}]{reset}: {}",
                    self.severity.as_str(),
                    self.code,
                    self.message
                )?;
                if let Some(text) = src.lines().nth(line.saturating_sub(1)) {
                    let width = match self.location {
                        Location::Span(span) if span.end > span.start => src
                            .get(span.start..span.end.min(src.len()))
                            .and_then(|rest| rest.lines().next())
                            .map_or(1, |l| l.chars().count().max(1)),
                        _ => 1,
                    };
                    writeln!(out, "{line:>4} | {text}")?;
                    writeln!(
                        out,
                        "     | {}{color}{}{reset}",
                        " ".repeat(column.saturating_sub(1)),
                        "^".repeat(width)
                    )?;
                }
            }
            None => {
                writeln!(
                    out,
                    "{filename}: {color}{}[{}]{reset}: {}",
                    self.severity.as_str(),
                    self.code,
                    self.message
                )?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity.as_str(), self.code, self.message)
    }
}

/// An ordered collection of diagnostics.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    pub diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    #[inline]
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Prints every diagnostic to stderr.
    pub fn report(&self, src: &str, filename: &str) {
        let stderr = io::stderr();
        let mut out = stderr.lock();
        for diagnostic in &self.diagnostics {
            // Nothing sensible to do when stderr itself is gone.
            let _ = diagnostic.render(src, filename, &mut out);
        }
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Diagnostics { diagnostics: vec![diagnostic] }
    }
}

/// Computes the 1-based line and column of byte offset `pos`.
///
/// `\n`, a lone `\r` and `\r\n` all count as a single line break, matching the
/// scanner's own bookkeeping.
pub fn line_column(src: &str, pos: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    let bytes = src.as_bytes();
    let end = pos.min(bytes.len());
    let mut i = 0;
    while i < end {
        match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {}
            b'\n' | b'\r' => {
                line += 1;
                column = 1;
            }
            // Continuation bytes do not start a new column.
            b if b & 0xC0 == 0x80 => {}
            _ => column += 1,
        }
        i += 1;
    }
    (line, column)
}
