//! `QName` (qualified name) handling.
//!
//! A lexical `QName` is a name of the form `prefix:localname` or just
//! `localname`. Once the prefix is resolved against the namespace scope, the
//! name is an expanded name: an optional namespace URI plus a local part.
//! [`QName`] carries both, and renders in Clark notation (`{uri}local`).
//!
//! See <https://www.w3.org/TR/xml-names/#NT-QName>

use std::fmt;

/// Splits a `QName` into its prefix and local name parts.
///
/// Returns `(Some(prefix), localname)` if the name contains a colon,
/// or `(None, localname)` if it does not.
///
/// # Examples
///
/// ```
/// use xmlfeed::util::qname::split_qname;
///
/// assert_eq!(split_qname("svg:rect"), (Some("svg"), "rect"));
/// assert_eq!(split_qname("div"), (None, "div"));
/// ```
#[must_use]
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.find(':') {
        Some(pos) => (Some(&qname[..pos]), &qname[pos + 1..]),
        None => (None, qname),
    }
}

/// A namespace-qualified element or attribute name.
///
/// Equality and hashing consider only the namespace URI and the local name;
/// the prefix is kept for serialization.
#[derive(Debug, Clone, Eq)]
pub struct QName {
    /// The namespace URI, if the name is in a namespace.
    pub namespace: Option<String>,
    /// The local part.
    pub local: String,
    /// The prefix used in the source, if any.
    pub prefix: Option<String>,
}

impl QName {
    /// Creates a name in no namespace.
    #[must_use]
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: local.into(),
            prefix: None,
        }
    }

    /// Creates a name in `namespace`.
    #[must_use]
    pub fn namespaced(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local: local.into(),
            prefix: None,
        }
    }

    /// Sets the serialization prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: Option<&str>) -> Self {
        self.prefix = prefix.map(str::to_string);
        self
    }

    /// Parses Clark notation: `{uri}local` or a bare `local`.
    ///
    /// `{}local` is the same as `local`. Returns `None` for an unterminated
    /// brace or an empty local part.
    ///
    /// ```
    /// use xmlfeed::util::qname::QName;
    ///
    /// let name = QName::from_clark("{urn:a}item").unwrap();
    /// assert_eq!(name.namespace.as_deref(), Some("urn:a"));
    /// assert_eq!(name.local, "item");
    /// ```
    #[must_use]
    pub fn from_clark(text: &str) -> Option<Self> {
        let (namespace, local) = match text.strip_prefix('{') {
            Some(rest) => {
                let close = rest.find('}')?;
                let uri = &rest[..close];
                ((!uri.is_empty()).then(|| uri.to_string()), &rest[close + 1..])
            }
            None => (None, text),
        };
        if local.is_empty() {
            return None;
        }
        Some(Self {
            namespace,
            local: local.to_string(),
            prefix: None,
        })
    }

    /// The Clark notation string, `{uri}local` or `local`.
    #[must_use]
    pub fn clark(&self) -> String {
        self.to_string()
    }

    /// The name as written in markup, `prefix:local` or `local`.
    #[must_use]
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.local),
            None => self.local.clone(),
        }
    }

    /// Whether the name is `local` in no namespace.
    #[must_use]
    pub fn is(&self, local: &str) -> bool {
        self.namespace.is_none() && self.local == local
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.local == other.local
    }
}

impl std::hash::Hash for QName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.local.hash(state);
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}
