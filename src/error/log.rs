//! Ordered, append-only diagnostic log with field filters.

use std::fmt;

use super::{ErrorDomain, ErrorKind, ErrorSeverity, ParseDiagnostic};

/// The diagnostics recorded while parsing, in the order they occurred.
///
/// A whole-document parse stores its log on the resulting
/// [`Document`](crate::tree::Document); a [`FeedParser`](crate::FeedParser)
/// keeps its own for the document currently being fed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLog {
    entries: Vec<ParseDiagnostic>,
}

impl ErrorLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, diagnostic: ParseDiagnostic) {
        self.entries.push(diagnostic);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the records in order.
    pub fn iter(&self) -> std::slice::Iter<'_, ParseDiagnostic> {
        self.entries.iter()
    }

    /// Returns the most recent record of severity error or worse.
    #[must_use]
    pub fn last_error(&self) -> Option<&ParseDiagnostic> {
        self.entries
            .iter()
            .rev()
            .find(|d| d.severity >= ErrorSeverity::Error)
    }

    /// Returns the records matching every field set in `filter`.
    #[must_use]
    pub fn filter(&self, filter: &LogFilter) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|d| filter.matches(d))
                .cloned()
                .collect(),
        }
    }

    /// Returns the records from any of `domains`.
    #[must_use]
    pub fn filter_domains(&self, domains: &[ErrorDomain]) -> Self {
        self.filter(&LogFilter {
            domains: Some(domains.to_vec()),
            ..LogFilter::default()
        })
    }

    /// Returns the records of any of `kinds`.
    #[must_use]
    pub fn filter_kinds(&self, kinds: &[ErrorKind]) -> Self {
        self.filter(&LogFilter {
            kinds: Some(kinds.to_vec()),
            ..LogFilter::default()
        })
    }

    /// Returns the records with exactly one of `levels`.
    #[must_use]
    pub fn filter_levels(&self, levels: &[ErrorSeverity]) -> Self {
        self.filter(&LogFilter {
            levels: Some(levels.to_vec()),
            ..LogFilter::default()
        })
    }

    /// Returns the records at `level` or above.
    #[must_use]
    pub fn filter_from_level(&self, level: ErrorSeverity) -> Self {
        self.filter(&LogFilter {
            min_level: Some(level),
            ..LogFilter::default()
        })
    }

    /// Returns the errors and fatal errors.
    #[must_use]
    pub fn filter_from_errors(&self) -> Self {
        self.filter_from_level(ErrorSeverity::Error)
    }

    /// Returns everything from warnings up.
    #[must_use]
    pub fn filter_from_warnings(&self) -> Self {
        self.filter_from_level(ErrorSeverity::Warning)
    }
}

impl<'a> IntoIterator for &'a ErrorLog {
    type Item = &'a ParseDiagnostic;
    type IntoIter = std::slice::Iter<'a, ParseDiagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

/// A conjunction of optional field constraints over log records.
///
/// Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Accepted domains.
    pub domains: Option<Vec<ErrorDomain>>,
    /// Accepted kinds.
    pub kinds: Option<Vec<ErrorKind>>,
    /// Accepted severities, compared exactly.
    pub levels: Option<Vec<ErrorSeverity>>,
    /// Minimum severity.
    pub min_level: Option<ErrorSeverity>,
    /// Accepted line.
    pub line: Option<u32>,
    /// Accepted column.
    pub column: Option<u32>,
    /// Text the message must contain.
    pub message: Option<String>,
    /// Accepted source name.
    pub source_name: Option<String>,
}

impl LogFilter {
    /// Whether `diagnostic` satisfies every set field.
    #[must_use]
    pub fn matches(&self, diagnostic: &ParseDiagnostic) -> bool {
        self.domains
            .as_ref()
            .is_none_or(|d| d.contains(&diagnostic.domain))
            && self
                .kinds
                .as_ref()
                .is_none_or(|k| k.contains(&diagnostic.kind))
            && self
                .levels
                .as_ref()
                .is_none_or(|l| l.contains(&diagnostic.severity))
            && self.min_level.is_none_or(|m| diagnostic.severity >= m)
            && self.line.is_none_or(|l| diagnostic.location.line == l)
            && self.column.is_none_or(|c| diagnostic.location.column == c)
            && self
                .message
                .as_ref()
                .is_none_or(|m| diagnostic.message.contains(m.as_str()))
            && self
                .source_name
                .as_ref()
                .is_none_or(|s| diagnostic.source_name.as_ref() == Some(s))
    }
}
