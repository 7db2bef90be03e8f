//! Classification of whitespace-only text for `remove_blank_text`.

use std::fmt;

use crate::util::qname::QName;

/// Where a run of whitespace-only text sits.
#[derive(Debug, Clone, Copy)]
pub struct BlankContext<'a> {
    /// The element containing the text.
    pub parent: &'a QName,
    /// Whether the element already had child nodes before this text.
    pub parent_has_children: bool,
    /// Whether the next token closes the element.
    pub followed_by_end_tag: bool,
}

impl BlankContext<'_> {
    /// Whether the text is everything the element contains.
    #[must_use]
    pub fn is_sole_content(&self) -> bool {
        !self.parent_has_children && self.followed_by_end_tag
    }
}

/// Decides whether whitespace-only text may be dropped.
pub trait BlankTextPolicy: fmt::Debug + Send + Sync {
    /// Whether the blank `text` can be dropped where `context` says it sits.
    fn is_ignorable(&self, text: &str, context: &BlankContext<'_>) -> bool;
}

/// Whitespace between elements is formatting; whitespace that is an
/// element's only content is data.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementContentHeuristic;

impl BlankTextPolicy for ElementContentHeuristic {
    fn is_ignorable(&self, _text: &str, context: &BlankContext<'_>) -> bool {
        !context.is_sole_content()
    }
}
