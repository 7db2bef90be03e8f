//! Node type definitions.
//!
//! The `NodeKind` enum carries the node-type-specific payload. Character data
//! is not a node kind: it lives in the `text` and `tail` slots of
//! [`NodeData`](super::NodeData).

use super::{Attribute, NamespaceBinding};
use crate::util::qname::QName;

/// The kind of a node and its associated data.
///
/// Navigation links and character data are stored in `NodeData`, not here.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// The invisible document node, parent of the root element and of any
    /// top-level comments and processing instructions.
    Document,

    /// An element node, e.g., `<div class="x">`.
    Element {
        /// The resolved element name.
        tag: QName,
        /// Attributes in document order. Namespace declarations are not
        /// attributes; they live in `nsmap`.
        attributes: Vec<Attribute>,
        /// Namespace bindings declared on this element, in declaration order.
        nsmap: Vec<NamespaceBinding>,
    },

    /// A comment node, e.g., `<!-- ... -->`.
    Comment {
        /// The comment text (without the `<!--` and `-->` delimiters).
        content: String,
    },

    /// A processing instruction, e.g., `<?target data?>`.
    ProcessingInstruction {
        /// The PI target (e.g., `"xml-stylesheet"`).
        target: String,
        /// The PI data, if any.
        data: Option<String>,
    },

    /// An entity reference left unexpanded (e.g., `&custom;` when entity
    /// resolution is off).
    EntityRef {
        /// The entity name (without `&` and `;`).
        name: String,
    },
}

impl NodeKind {
    /// Whether this is an element.
    #[must_use]
    pub fn is_element(&self) -> bool {
        matches!(self, Self::Element { .. })
    }
}
