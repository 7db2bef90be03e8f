//! Tag selectors for filtering `start`/`end` events.
//!
//! Selector syntax, in Clark notation:
//!
//! | selector   | matches                                  |
//! |------------|------------------------------------------|
//! | `*`        | every element                            |
//! | `name`     | `name` in no namespace                   |
//! | `{}name`   | `name` in no namespace                   |
//! | `{uri}name`| `name` in namespace `uri`                |
//! | `{uri}*`   | every element in namespace `uri`         |
//! | `{*}name`  | `name` in any namespace or none          |
//! | `{}*`      | every element in no namespace            |

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::util::qname::QName;

/// The namespace half of a [`TagPattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespacePattern {
    /// `{*}`: any namespace, including none.
    Any,
    /// `{}` or no braces: no namespace.
    None,
    /// `{uri}`.
    Uri(String),
}

/// A single tag selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagPattern {
    /// `*`
    Any,
    /// A namespace pattern plus a local name (`None` is the `*` wildcard).
    Name {
        namespace: NamespacePattern,
        local: Option<String>,
    },
}

impl TagPattern {
    /// Whether `tag` is selected by this pattern.
    #[must_use]
    pub fn matches(&self, tag: &QName) -> bool {
        let Self::Name { namespace, local } = self else {
            return true;
        };
        let namespace_ok = match namespace {
            NamespacePattern::Any => true,
            NamespacePattern::None => tag.namespace.is_none(),
            NamespacePattern::Uri(uri) => tag.namespace.as_deref() == Some(uri.as_str()),
        };
        namespace_ok && local.as_ref().is_none_or(|l| *l == tag.local)
    }
}

impl FromStr for TagPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" {
            return Ok(Self::Any);
        }
        let (namespace, local) = match s.strip_prefix('{') {
            Some(rest) => {
                let (uri, local) = rest
                    .split_once('}')
                    .ok_or_else(|| Error::invalid_state(format!("invalid tag selector '{s}'")))?;
                let namespace = match uri {
                    "*" => NamespacePattern::Any,
                    "" => NamespacePattern::None,
                    uri => NamespacePattern::Uri(uri.to_string()),
                };
                (namespace, local)
            }
            None => (NamespacePattern::None, s),
        };
        if local.is_empty() || local.contains(['{', '}']) {
            return Err(Error::invalid_state(format!("invalid tag selector '{s}'")));
        }
        let local = (local != "*").then(|| local.to_string());
        if namespace == NamespacePattern::Any && local.is_none() {
            return Ok(Self::Any);
        }
        Ok(Self::Name { namespace, local })
    }
}

impl fmt::Display for TagPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self::Name { namespace, local } = self else {
            return f.write_str("*");
        };
        match namespace {
            NamespacePattern::Any => f.write_str("{*}")?,
            NamespacePattern::None => f.write_str("{}")?,
            NamespacePattern::Uri(uri) => write!(f, "{{{uri}}}")?,
        }
        f.write_str(local.as_deref().unwrap_or("*"))
    }
}

/// One or more tag patterns; a tag is selected if any pattern matches.
///
/// ```
/// use xmlfeed::events::TagSelector;
/// use xmlfeed::util::qname::QName;
///
/// let selector: TagSelector = "item {urn:x}*".parse().unwrap();
/// assert!(selector.matches(&QName::local("item")));
/// assert!(selector.matches(&QName::namespaced("urn:x", "other")));
/// assert!(!selector.matches(&QName::namespaced("urn:y", "item")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSelector {
    patterns: Vec<TagPattern>,
}

impl TagSelector {
    /// Combines several patterns.
    pub fn new(patterns: impl IntoIterator<Item = TagPattern>) -> Self {
        Self {
            patterns: patterns.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn patterns(&self) -> &[TagPattern] {
        &self.patterns
    }

    #[must_use]
    pub fn matches(&self, tag: &QName) -> bool {
        self.patterns.iter().any(|p| p.matches(tag))
    }
}

impl From<TagPattern> for TagSelector {
    fn from(pattern: TagPattern) -> Self {
        Self {
            patterns: vec![pattern],
        }
    }
}

impl FromStr for TagSelector {
    type Err = Error;

    /// Parses whitespace-separated patterns.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let patterns = s
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<TagPattern>, _>>()?;
        if patterns.is_empty() {
            return Err(Error::invalid_state("empty tag selector"));
        }
        Ok(Self { patterns })
    }
}
