//! Parse events and the pull interface.
//!
//! The dispatcher reports six kinds of event. Each parser has one
//! long-lived [`EventQueue`](queue::EventQueue) that collects the kinds the
//! caller asked for (by default only `end`), narrowed by an optional
//! [`TagSelector`]. [`Events`] is a borrowing handle over that queue: every
//! call to `read_events()` resumes the same stream, and an event once
//! returned is never delivered again.
//!
//! ```
//! use xmlfeed::{EventKinds, FeedParser, ParseOptions};
//!
//! let options = ParseOptions::default().events(EventKinds::START | EventKinds::END);
//! let mut parser = FeedParser::with_options(options);
//! parser.feed("<root><a/>").unwrap();
//! let seen: Vec<_> = parser.read_events().map(|e| e.kind().as_str()).collect();
//! assert_eq!(seen, ["start", "start", "end"]);
//! parser.feed("</root>").unwrap();
//! assert_eq!(parser.read_events().count(), 1);
//! ```

pub(crate) mod queue;
mod tag;

pub use tag::{NamespacePattern, TagPattern, TagSelector};

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::target::{Target, TreeBuilder};
use crate::tree::{Document, NodeId};
use queue::EventQueue;

bitflags! {
    /// A set of event kinds to collect.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventKinds: u8 {
        const START = 1;
        const END = 1 << 1;
        const START_NS = 1 << 2;
        const END_NS = 1 << 3;
        const COMMENT = 1 << 4;
        const PI = 1 << 5;
    }
}

impl EventKinds {
    /// Parses a list of event names such as `["start", "end-ns"]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] for an unknown name.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        names
            .into_iter()
            .try_fold(Self::empty(), |set, name| Ok(set | name.parse::<EventKind>()?.flag()))
    }
}

impl Default for EventKinds {
    fn default() -> Self {
        Self::END
    }
}

/// The kind of a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An element opened.
    Start,
    /// An element closed.
    End,
    /// A namespace binding came into scope.
    StartNs,
    /// A namespace binding went out of scope.
    EndNs,
    /// A comment.
    Comment,
    /// A processing instruction.
    Pi,
}

impl EventKind {
    /// The event name: `start`, `end`, `start-ns`, `end-ns`, `comment` or
    /// `pi`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::StartNs => "start-ns",
            Self::EndNs => "end-ns",
            Self::Comment => "comment",
            Self::Pi => "pi",
        }
    }

    /// The matching member of [`EventKinds`].
    #[must_use]
    pub fn flag(self) -> EventKinds {
        match self {
            Self::Start => EventKinds::START,
            Self::End => EventKinds::END,
            Self::StartNs => EventKinds::START_NS,
            Self::EndNs => EventKinds::END_NS,
            Self::Comment => EventKinds::COMMENT,
            Self::Pi => EventKinds::PI,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "start" => Self::Start,
            "end" => Self::End,
            "start-ns" => Self::StartNs,
            "end-ns" => Self::EndNs,
            "comment" => Self::Comment,
            "pi" => Self::Pi,
            _ => return Err(Error::invalid_state(format!("unknown event type '{s}'"))),
        })
    }
}

/// What a target handed back for an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<V> {
    /// A node of the tree being built.
    Node(NodeId),
    /// A value produced by a custom target.
    Custom(V),
    /// Nothing.
    Empty,
}

impl<V> Payload<V> {
    /// The tree node, for a [`Payload::Node`].
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            _ => None,
        }
    }

    /// The target's value, for a [`Payload::Custom`].
    #[must_use]
    pub fn custom(&self) -> Option<&V> {
        match self {
            Self::Custom(value) => Some(value),
            _ => None,
        }
    }
}

/// A pull event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<V> {
    /// An element opened; its tag and attributes are complete.
    Start(Payload<V>),
    /// An element closed; its subtree is complete.
    End(Payload<V>),
    /// A namespace binding, reported before the element declaring it.
    StartNs { prefix: Option<String>, uri: String },
    /// The end of a binding's scope, after the declaring element's `End`.
    EndNs,
    /// A comment.
    Comment(Payload<V>),
    /// A processing instruction.
    Pi(Payload<V>),
}

impl<V> Event<V> {
    /// The kind of event, without its payload.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Start(_) => EventKind::Start,
            Self::End(_) => EventKind::End,
            Self::StartNs { .. } => EventKind::StartNs,
            Self::EndNs => EventKind::EndNs,
            Self::Comment(_) => EventKind::Comment,
            Self::Pi(_) => EventKind::Pi,
        }
    }

    /// The payload, for the kinds that carry one.
    #[must_use]
    pub fn payload(&self) -> Option<&Payload<V>> {
        match self {
            Self::Start(p) | Self::End(p) | Self::Comment(p) | Self::Pi(p) => Some(p),
            Self::StartNs { .. } | Self::EndNs => None,
        }
    }

    /// The tree node the event refers to, if any.
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        self.payload().and_then(Payload::node)
    }
}

/// A borrowing handle over a parser's event queue.
pub struct Events<'p, T: Target> {
    queue: &'p mut EventQueue<T::Value>,
    target: &'p mut T,
}

impl<'p, T: Target> Events<'p, T> {
    pub(crate) fn new(queue: &'p mut EventQueue<T::Value>, target: &'p mut T) -> Self {
        Self { queue, target }
    }

    /// Drops the remaining descendant events of the element whose `start`
    /// or `start-ns` event was returned last.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the last returned event was not a
    /// `start` or `start-ns`.
    pub fn skip_subtree(&mut self) -> Result<()> {
        self.queue.skip_subtree()
    }

    /// Number of events currently waiting.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// The parser's target.
    pub fn target(&self) -> &T {
        self.target
    }

    /// Mutable access to the parser's target.
    pub fn target_mut(&mut self) -> &mut T {
        self.target
    }
}

impl Events<'_, TreeBuilder> {
    /// The tree built so far.
    #[must_use]
    pub fn document(&self) -> &Document {
        self.target.document()
    }

    /// Mutable access to the tree built so far.
    ///
    /// The document still refuses to release elements that are being
    /// parsed, but it knows nothing of the queue: releasing a node whose
    /// events are waiting leaves those events naming a reused slot. Prefer
    /// [`clear`](Self::clear) and
    /// [`remove_preceding_siblings`](Self::remove_preceding_siblings).
    pub fn document_mut(&mut self) -> &mut Document {
        self.target.document_mut()
    }

    /// Whether a waiting event names a node inside the subtree of `id`,
    /// `id` itself excluded.
    fn subtree_queued(&self, id: NodeId) -> bool {
        let doc = self.target.document();
        self.queue
            .holds_node(|node| node != id && doc.ancestors(node).any(|a| a == id))
    }

    /// Detaches a finished element from the tree. Its nodes stay allocated,
    /// so events already queued for them remain valid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if `id` is still open.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        self.target.detach_checked(id)
    }

    /// Releases a finished element's children, text and attributes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if `id` is still open, or if events
    /// for its descendants are still waiting to be read.
    pub fn clear(&mut self, id: NodeId, keep_tail: bool) -> Result<()> {
        if self.subtree_queued(id) {
            return Err(Error::invalid_state(
                "cannot clear an element while events for its descendants are waiting",
            ));
        }
        self.target.clear(id, keep_tail)
    }

    /// Releases the siblings before `id`, nearest first. Stops at a sibling
    /// that is still open or has events waiting for its subtree.
    pub fn remove_preceding_siblings(&mut self, id: NodeId) -> usize {
        let queue = &*self.queue;
        self.target
            .document_mut()
            .remove_preceding_siblings_while(id, |doc, sibling| {
                !queue.holds_node(|node| doc.ancestors(node).any(|a| a == sibling))
            })
    }
}

impl<T: Target> Iterator for Events<'_, T> {
    type Item = Event<T::Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.pop()
    }
}

impl<T: Target> fmt::Debug for Events<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events")
            .field("pending", &self.queue.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_event_names() {
        let kinds = EventKinds::from_names(["start", "end-ns", "pi"]).unwrap();
        assert_eq!(kinds, EventKinds::START | EventKinds::END_NS | EventKinds::PI);
        assert!(EventKinds::from_names(["begin"]).is_err());
        assert_eq!(EventKinds::default(), EventKinds::END);
        assert_eq!(EventKind::StartNs.to_string(), "start-ns");
    }

    #[test]
    fn test_payload_accessors() {
        let id = NodeId::from_index(3);
        let event: Event<()> = Event::End(Payload::Node(id));
        assert_eq!(event.node(), Some(id));
        let custom: Event<&str> = Event::Start(Payload::Custom("X"));
        assert_eq!(custom.payload().and_then(Payload::custom), Some(&"X"));
        assert_eq!(Event::<()>::EndNs.payload(), None);
    }
}
