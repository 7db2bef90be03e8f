//! Error types and diagnostics for feed parsing.
//!
//! Two layers live here. [`Error`] is what every fallible public operation
//! returns: a syntax failure, an API misuse, or an encoding conflict.
//! Underneath it, [`ParseDiagnostic`] is a single record in the parser's
//! [`ErrorLog`], carrying the message, domain, kind, severity, source
//! location, and the name of the source being parsed.
//!
//! Syntax problems are always recorded in the log. Whether they also abort
//! the parse depends on [`ParseOptions::recover`](crate::parser::ParseOptions::recover).

mod log;

pub use log::{ErrorLog, LogFilter};

use std::fmt;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by parser operations.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Malformed input. Fatal unless the parser runs in recovery mode.
    #[error(transparent)]
    Syntax(#[from] ParseError),

    /// The parser API was used out of order, e.g. feeding a closed parser.
    #[error("invalid parser state: {0}")]
    InvalidState(String),

    /// The input carries a text-level encoding (a Unicode string or a byte
    /// order mark) that disagrees with its XML declaration.
    #[error("encoding conflict: input is {actual} but declares encoding '{declared}'")]
    EncodingConflict {
        /// The encoding implied by how the input arrived.
        actual: String,
        /// The encoding named in the XML declaration.
        declared: String,
    },
}

impl Error {
    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Returns the underlying syntax error, if this is one.
    #[must_use]
    pub fn as_syntax(&self) -> Option<&ParseError> {
        match self {
            Self::Syntax(err) => Some(err),
            _ => None,
        }
    }
}

/// Severity level for a parse diagnostic.
///
/// Ordered from least to most severe so logs can be filtered with
/// [`ErrorLog::filter_from_level`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// A non-fatal issue that doesn't prevent parsing.
    Warning,
    /// A recoverable error. The parser can continue but the document is malformed.
    Error,
    /// An unrecoverable error. Parsing must stop.
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Fatal => write!(f, "fatal error"),
        }
    }
}

/// The subsystem that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorDomain {
    /// Lexical scanning and well-formedness.
    Parser,
    /// Namespace prefix binding and resolution.
    Namespace,
    /// Byte decoding and encoding declarations.
    Encoding,
    /// The lenient HTML dialect.
    Html,
}

impl fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parser => write!(f, "parser"),
            Self::Namespace => write!(f, "namespace"),
            Self::Encoding => write!(f, "encoding"),
            Self::Html => write!(f, "html"),
        }
    }
}

/// What went wrong, independent of the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Input ended inside a token.
    UnexpectedEof,
    /// An element or attribute name is not a valid XML name.
    InvalidName,
    /// A character outside the XML `Char` production.
    InvalidChar,
    /// Malformed attribute list (missing `=`, quote, or separator).
    AttributeSyntax,
    /// The same attribute appears twice on one element.
    AttributeRedefined,
    /// An end tag does not match the open element.
    TagNameMismatch,
    /// Elements were still open when input ended.
    UnclosedTag,
    /// Character data or markup outside the root element.
    ContentOutsideRoot,
    /// No root element was found.
    DocumentEmpty,
    /// A malformed comment.
    Comment,
    /// A malformed processing instruction, or a misplaced XML declaration.
    ProcessingInstruction,
    /// A malformed XML declaration.
    XmlDeclaration,
    /// A malformed or misplaced document type declaration.
    Doctype,
    /// A malformed CDATA section.
    CData,
    /// A malformed character or entity reference.
    Reference,
    /// A reference to an entity that was never declared.
    UndeclaredEntity,
    /// A prefix used without a namespace declaration in scope.
    UndefinedNamespace,
    /// A malformed namespace declaration.
    NamespaceDeclaration,
    /// A security limit (depth, name length, text length, entity expansions)
    /// was exceeded.
    LimitExceeded,
    /// An encoding label that is not supported.
    UnsupportedEncoding,
    /// Byte sequences that are invalid for the detected encoding.
    MalformedBytes,
    /// An HTML tag that was ignored or implied.
    HtmlTag,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UnexpectedEof => "unexpected-eof",
            Self::InvalidName => "invalid-name",
            Self::InvalidChar => "invalid-char",
            Self::AttributeSyntax => "attribute-syntax",
            Self::AttributeRedefined => "attribute-redefined",
            Self::TagNameMismatch => "tag-name-mismatch",
            Self::UnclosedTag => "unclosed-tag",
            Self::ContentOutsideRoot => "content-outside-root",
            Self::DocumentEmpty => "document-empty",
            Self::Comment => "comment",
            Self::ProcessingInstruction => "processing-instruction",
            Self::XmlDeclaration => "xml-declaration",
            Self::Doctype => "doctype",
            Self::CData => "cdata",
            Self::Reference => "reference",
            Self::UndeclaredEntity => "undeclared-entity",
            Self::UndefinedNamespace => "undefined-namespace",
            Self::NamespaceDeclaration => "namespace-declaration",
            Self::LimitExceeded => "limit-exceeded",
            Self::UnsupportedEncoding => "unsupported-encoding",
            Self::MalformedBytes => "malformed-bytes",
            Self::HtmlTag => "html-tag",
        };
        f.write_str(name)
    }
}

impl ErrorKind {
    /// Returns the domain this kind of problem belongs to.
    #[must_use]
    pub fn domain(self) -> ErrorDomain {
        match self {
            Self::UndefinedNamespace | Self::NamespaceDeclaration => ErrorDomain::Namespace,
            Self::UnsupportedEncoding | Self::MalformedBytes => ErrorDomain::Encoding,
            Self::HtmlTag => ErrorDomain::Html,
            _ => ErrorDomain::Parser,
        }
    }
}

/// Source location within the parsed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset into the decoded input.
    pub byte_offset: usize,
}

impl SourceLocation {
    /// The location of the first character of a document.
    pub const START: Self = Self {
        line: 1,
        column: 1,
        byte_offset: 0,
    };
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single record in an [`ErrorLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    /// Human-readable message.
    pub message: String,
    /// The subsystem that produced the record.
    pub domain: ErrorDomain,
    /// Machine-readable classification.
    pub kind: ErrorKind,
    /// How bad it is.
    pub severity: ErrorSeverity,
    /// Where in the source it happened.
    pub location: SourceLocation,
    /// Name of the source being parsed (file name, URL), if one was given.
    pub source_name: Option<String>,
}

impl ParseDiagnostic {
    pub(crate) fn new(
        kind: ErrorKind,
        severity: ErrorSeverity,
        message: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Self {
            message: message.into(),
            domain: kind.domain(),
            kind,
            severity,
            location,
            source_name: None,
        }
    }

    /// 1-based line of the record.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.location.line
    }

    /// 1-based column of the record.
    #[must_use]
    pub fn column(&self) -> u32 {
        self.location.column
    }
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.source_name {
            write!(f, "{name}:")?;
        }
        write!(
            f,
            "{}: {}: {} at {}",
            self.severity, self.domain, self.message, self.location
        )
    }
}

/// The error type returned when parsing fails on malformed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The primary error message.
    pub message: String,
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// Where in the source the fatal error occurred.
    pub location: SourceLocation,
    /// All diagnostics collected up to and including the fatal error.
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl ParseError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            kind,
            location,
            diagnostics: Vec::new(),
        }
    }

    /// Converts the error into the log record describing it.
    #[must_use]
    pub fn to_diagnostic(&self) -> ParseDiagnostic {
        ParseDiagnostic::new(
            self.kind,
            ErrorSeverity::Fatal,
            self.message.clone(),
            self.location,
        )
    }
}

impl From<ParseDiagnostic> for ParseError {
    fn from(diag: ParseDiagnostic) -> Self {
        Self::new(diag.kind, diag.message, diag.location)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at {}: {}", self.location, self.message)
    }
}

impl std::error::Error for ParseError {}
