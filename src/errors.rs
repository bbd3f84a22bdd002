//! Graft Error Handling - Unified Encapsulated API
//!
//! All failure modes of the preprocessing engine flow through a single
//! `GraftError` struct: a typed `ErrorKind`, context-specific source
//! information, and diagnostic enhancement data. Callers classify errors
//! programmatically through `ErrorCategory`, never by matching message text.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use thiserror::Error;

use crate::location;

// ============================================================================
// ERROR TYPE - kind + source info + diagnostic info
// ============================================================================

/// The single error type - no wrapper, no variants, just essential data
#[derive(Debug)]
pub struct GraftError {
    /// What went wrong (type-specific data)
    pub kind: ErrorKind,
    /// Where it happened (context-specific source information)
    pub source_info: SourceInfo,
    /// How to help (auto-populated based on context)
    pub diagnostic_info: DiagnosticInfo,
}

/// All error kinds as a clean enum - no duplicate fields
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    /// Explicit compile-time error raised by user-authored macro code.
    #[error("{message}")]
    StaticError { message: String },

    /// A `static_assert` whose condition did not hold.
    #[error("assertion failed: {message}")]
    AssertionFailure { message: String },

    /// Two attribute bags disagree about one key. This is an internal
    /// consistency violation (two analyses disagreeing about one symbol),
    /// not a user mistake.
    #[error("cannot combine attribute '{key}': have {existing}, got {incoming}")]
    AttributeConflict {
        key: String,
        existing: String,
        incoming: String,
    },

    /// A compile-time module could not be resolved against any search path.
    #[error("module '{name}' not found after trying: {}", .attempts.join(", "))]
    ModuleNotFound { name: String, attempts: Vec<String> },

    /// Macro expansion recursed past the configured depth limit.
    #[error("macro expansion exceeded depth limit of {limit}")]
    ExpansionLimit { limit: usize },

    /// Engine contract breach: unbalanced statement stack, injection into a
    /// missing destination, and similar misuse of the context API.
    #[error("{message}")]
    InternalViolation { message: String },
}

/// Context-specific source information
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
    pub phase: String,
}

/// Diagnostic enhancement data
#[derive(Debug, Clone)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
}

/// Coarse classification for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Diagnostics raised deliberately by compile-time user code.
    Static,
    /// Engine invariants broken; indicates a bug, not a user mistake.
    Internal,
    /// Compile-time module resolution failures.
    Module,
    /// Macro expansion resource limits.
    Expansion,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Static => "static error",
            Self::Internal => "internal error",
            Self::Module => "module error",
            Self::Expansion => "expansion error",
        };
        write!(f, "{}", label)
    }
}

impl ErrorKind {
    /// Get the error category for programmatic classification
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::StaticError { .. } | Self::AssertionFailure { .. } => ErrorCategory::Static,
            Self::AttributeConflict { .. } | Self::InternalViolation { .. } => {
                ErrorCategory::Internal
            }
            Self::ModuleNotFound { .. } => ErrorCategory::Module,
            Self::ExpansionLimit { .. } => ErrorCategory::Expansion,
        }
    }

    /// Get error code suffix for diagnostic codes
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::StaticError { .. } => "static_error",
            Self::AssertionFailure { .. } => "assertion_failure",
            Self::AttributeConflict { .. } => "attribute_conflict",
            Self::ModuleNotFound { .. } => "module_not_found",
            Self::ExpansionLimit { .. } => "expansion_limit",
            Self::InternalViolation { .. } => "internal_violation",
        }
    }
}

/// Context-aware error creation - each context knows how to create appropriate errors
pub trait ErrorReporting {
    /// Create an error with context-appropriate enhancements
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> GraftError;

    fn static_error(&self, message: &str, span: SourceSpan) -> GraftError {
        self.report(
            ErrorKind::StaticError {
                message: message.into(),
            },
            span,
        )
    }

    fn assertion_failure(&self, message: &str, span: SourceSpan) -> GraftError {
        self.report(
            ErrorKind::AssertionFailure {
                message: message.into(),
            },
            span,
        )
    }

    fn module_not_found(&self, name: &str, attempts: Vec<String>, span: SourceSpan) -> GraftError {
        self.report(
            ErrorKind::ModuleNotFound {
                name: name.into(),
                attempts,
            },
            span,
        )
    }

    fn expansion_limit(&self, limit: usize, span: SourceSpan) -> GraftError {
        self.report(ErrorKind::ExpansionLimit { limit }, span)
    }

    /// Creates an internal violation error - these indicate engine bugs or
    /// misuse of the context API, not user errors.
    fn internal_violation(&self, message: &str, span: SourceSpan) -> GraftError {
        let mut error = self.report(
            ErrorKind::InternalViolation {
                message: message.into(),
            },
            span,
        );
        error.diagnostic_info.help =
            Some("This is an internal engine error. Please report this as a bug.".into());
        error
    }
}

impl GraftError {
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Plain one-line rendering plus a source snippet:
    /// `<file>:<line>:<col>: <category>: <message>`.
    ///
    /// Falls back to `<category>: <message>` when the span cannot be
    /// resolved against the stored source (synthetic nodes, fallback
    /// sources). The degradation is silent; location loss is never fatal.
    pub fn brief(&self) -> String {
        let name = self.source_info.source.name();
        let content = self.source_info.source.inner();
        let offset = self.source_info.primary_span.offset();
        match location::resolve_offset(content, offset) {
            Some((line, column, line_start, line_end)) => {
                let snippet = &content[line_start..line_end];
                format!(
                    "{}:{}:{}: {}: {}\n{}",
                    name,
                    line,
                    column,
                    self.category(),
                    self.kind,
                    snippet
                )
            }
            None => format!("{}: {}", self.category(), self.kind),
        }
    }

    fn primary_label(&self) -> String {
        match &self.kind {
            ErrorKind::StaticError { .. } => "raised here".into(),
            ErrorKind::AssertionFailure { .. } => "assertion failed here".into(),
            ErrorKind::AttributeConflict { .. } => "conflicting attribute".into(),
            ErrorKind::ModuleNotFound { .. } => "required here".into(),
            ErrorKind::ExpansionLimit { .. } => "expansion began here".into(),
            ErrorKind::InternalViolation { .. } => "violation here".into(),
        }
    }
}

impl std::error::Error for GraftError {}

impl fmt::Display for GraftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category(), self.kind)
    }
}

impl Diagnostic for GraftError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.primary_label()),
            self.source_info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.source_info.source)
    }
}

// ============================================================================
// STANDALONE CONSTRUCTORS
// ============================================================================

/// Standalone constructor for attribute-merge conflicts.
///
/// This is a special case. Bag merging happens deep inside the node model
/// where no `ErrorReporting` context is available, so this function
/// encapsulates the construction, ensuring `GraftError` structs are not
/// assembled by hand at the merge site.
pub fn attribute_conflict(key: &str, existing: String, incoming: String) -> GraftError {
    GraftError {
        kind: ErrorKind::AttributeConflict {
            key: key.to_string(),
            existing,
            incoming,
        },
        source_info: SourceInfo {
            source: fallback_source("attribute merge"),
            primary_span: unspanned(),
            phase: "analysis".into(),
        },
        diagnostic_info: DiagnosticInfo {
            help: Some(
                "Two analyses produced disagreeing facts about one symbol; \
                 this indicates a miscompilation."
                    .into(),
            ),
            error_code: "graft::analysis::attribute_conflict".into(),
        },
    }
}

/// General constructor used by contexts implementing `ErrorReporting`.
pub fn build(
    kind: ErrorKind,
    source: Arc<NamedSource<String>>,
    span: SourceSpan,
    phase: &str,
) -> GraftError {
    let error_code = format!("graft::{}::{}", phase, kind.code_suffix());
    GraftError {
        kind,
        source_info: SourceInfo {
            source,
            primary_span: span,
            phase: phase.to_string(),
        },
        diagnostic_info: DiagnosticInfo {
            help: None,
            error_code,
        },
    }
}

/// Creates a placeholder span for errors not tied to a specific source code
/// location, such as I/O errors or internal engine state failures.
/// This makes the intent of using an empty span explicit and searchable.
pub fn unspanned() -> SourceSpan {
    SourceSpan::from(0..0)
}

/// Creates a placeholder source when no real source is available.
pub fn fallback_source(context: &str) -> Arc<NamedSource<String>> {
    Arc::new(NamedSource::new("fallback", format!("// {}", context)))
}

/// Prints a GraftError with full miette diagnostics
///
/// This provides rich error formatting with source spans, suggestions, and
/// context. Use this for user-facing error display in compiler drivers.
pub fn print_error(error: GraftError) {
    use miette::Report;
    let report = Report::new(error);
    eprintln!("{report:?}");
}
