//! The pull-event queue.
//!
//! Every queued event carries the nesting depth of the element it belongs
//! to: an element's `start`, `end`, `start-ns` and `end-ns` share the
//! element's depth, and a comment or PI inside it sits one level deeper.
//! That is all [`EventQueue::skip_subtree`] needs to find a subtree's
//! events, queued or still to come.

use std::collections::VecDeque;

use super::{Event, EventKind, EventKinds, TagSelector};
use crate::error::{Error, Result};
use crate::tree::NodeId;
use crate::util::qname::QName;

#[derive(Debug)]
enum Slot<V> {
    Event { event: Event<V>, depth: usize },
    /// Stands in for a filtered-out `end` so a later skip can still find
    /// where the element's subtree stops.
    Boundary { depth: usize },
}

#[derive(Debug)]
pub(crate) struct EventQueue<V> {
    kinds: EventKinds,
    tags: Option<TagSelector>,
    items: VecDeque<Slot<V>>,
    /// Drop everything deeper than this until the element at this depth ends.
    suppress_below: Option<usize>,
    last: Option<(EventKind, usize)>,
}

impl<V> EventQueue<V> {
    pub fn new(kinds: EventKinds, tags: Option<TagSelector>) -> Self {
        Self {
            kinds,
            tags,
            items: VecDeque::new(),
            suppress_below: None,
            last: None,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.suppress_below = None;
        self.last = None;
    }

    pub fn len(&self) -> usize {
        self.items
            .iter()
            .filter(|slot| matches!(slot, Slot::Event { .. }))
            .count()
    }

    fn accepts(&self, event: &Event<V>, depth: usize, tag: Option<&QName>) -> bool {
        if self.suppress_below.is_some_and(|d| depth > d) {
            return false;
        }
        let kind = event.kind();
        if !self.kinds.contains(kind.flag()) {
            return false;
        }
        match (kind, &self.tags, tag) {
            (EventKind::Start | EventKind::End, Some(selector), Some(tag)) => selector.matches(tag),
            _ => true,
        }
    }

    /// Queues an event if it passes the filters; returns whether it did.
    ///
    /// `tag` is the element name for `start`/`end` events.
    pub fn push(&mut self, event: Event<V>, depth: usize, tag: Option<&QName>) -> bool {
        if !self.accepts(&event, depth, tag) {
            return false;
        }
        self.items.push_back(Slot::Event { event, depth });
        true
    }

    /// Queues an element's `end`. `head_queued` says whether its `start` or
    /// one of its `start-ns` events made it into the queue.
    pub fn push_end(&mut self, event: Event<V>, depth: usize, tag: &QName, head_queued: bool) {
        if self.suppress_below == Some(depth) {
            self.suppress_below = None;
        }
        if !self.push(event, depth, Some(tag)) && head_queued {
            self.items.push_back(Slot::Boundary { depth });
        }
    }

    /// Whether a waiting event carries a node for which `pred` holds.
    pub fn holds_node(&self, pred: impl Fn(NodeId) -> bool) -> bool {
        self.items.iter().any(|slot| match slot {
            Slot::Event { event, .. } => event.node().is_some_and(&pred),
            Slot::Boundary { .. } => false,
        })
    }

    pub fn pop(&mut self) -> Option<Event<V>> {
        while let Some(slot) = self.items.pop_front() {
            if let Slot::Event { event, depth } = slot {
                self.last = Some((event.kind(), depth));
                return Some(event);
            }
        }
        None
    }

    /// Drops the descendants of the element whose `start` (or `start-ns`)
    /// was popped last, up to but not including its `end`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the last popped event was a
    /// `start` or `start-ns`.
    pub fn skip_subtree(&mut self) -> Result<()> {
        let depth = match self.last.take() {
            Some((EventKind::Start | EventKind::StartNs, depth)) => depth,
            _ => {
                return Err(Error::invalid_state(
                    "skip_subtree() is only valid right after a start or start-ns event",
                ))
            }
        };

        let mut kept = VecDeque::with_capacity(self.items.len());
        let mut found_end = false;
        while let Some(slot) = self.items.pop_front() {
            let (slot_depth, is_end) = match &slot {
                Slot::Event { event, depth } => (*depth, event.kind() == EventKind::End),
                Slot::Boundary { depth } => (*depth, true),
            };
            if slot_depth > depth {
                continue;
            }
            kept.push_back(slot);
            if is_end && slot_depth == depth {
                found_end = true;
                break;
            }
        }
        kept.append(&mut self.items);
        self.items = kept;
        if !found_end {
            self.suppress_below = Some(depth);
        }
        Ok(())
    }
}
