//! Arena-based document tree with the text/tail model.
//!
//! All nodes live in a contiguous `Vec<NodeData>` owned by the `Document`,
//! and are referenced by `NodeId`, a newtype over `NonZeroU32`. Parent,
//! child and sibling links are arena indices, so the tree has no reference
//! cycles and dropping the `Document` frees everything at once.
//!
//! Character data is attached to nodes rather than stored as nodes of its
//! own: an element's `text` is the data before its first child, and a
//! node's `tail` is the data after its end and before its next sibling.
//!
//! Subtrees removed with [`Document::release`] return their slots to a free
//! list that later allocations reuse, which is what keeps memory flat when a
//! caller prunes a large document while it is still being parsed.

mod node;

pub use node::NodeKind;

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;

use crate::error::{Error, ErrorLog, Result};
use crate::parser::ParseOptions;
use crate::util::qname::QName;

/// A typed index into the document's node arena.
///
/// `NodeId` is a newtype over `NonZeroU32`, meaning it can never be zero
/// and `Option<NodeId>` has the same size as `NodeId` (niche optimization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    /// Creates a `NodeId` from a raw index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is 0 or does not fit in a `u32`.
    #[allow(clippy::expect_used)]
    pub(crate) fn from_index(index: usize) -> Self {
        let raw = u32::try_from(index).expect("node arena exceeds u32::MAX entries");
        Self(NonZeroU32::new(raw).expect("NodeId index must be non-zero"))
    }

    pub(crate) fn as_index(self) -> usize {
        self.0.get() as usize
    }
}

/// A namespace binding declared on an element: `(prefix, uri)`, with `None`
/// for the default namespace.
pub type NamespaceBinding = (Option<String>, String);

/// Storage for a single node in the document arena.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    /// What kind of node this is and its payload.
    pub kind: NodeKind,
    /// Character data before the first child (elements only).
    pub text: Option<String>,
    /// Character data after this node's end, before the next sibling.
    pub tail: Option<String>,
    /// Whether `text` came from a CDATA section.
    pub text_is_cdata: bool,
    /// Parent node, if any. The document node has no parent.
    pub parent: Option<NodeId>,
    /// First child node.
    pub first_child: Option<NodeId>,
    /// Last child node (for O(1) append).
    pub last_child: Option<NodeId>,
    /// Next sibling.
    pub next_sibling: Option<NodeId>,
    /// Previous sibling.
    pub prev_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            text: None,
            tail: None,
            text_is_cdata: false,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
        }
    }
}

/// An attribute on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The resolved attribute name. Unprefixed attributes are in no namespace.
    pub name: QName,
    /// The attribute value, with references expanded and whitespace normalized.
    pub value: String,
}

impl Attribute {
    /// Creates an attribute in no namespace.
    #[must_use]
    pub fn new(local: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: QName::local(local),
            value: value.into(),
        }
    }
}

/// The XML declaration at the start of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    /// The `version` pseudo-attribute.
    pub version: String,
    /// The `encoding` pseudo-attribute.
    pub encoding: Option<String>,
    /// The `standalone` pseudo-attribute.
    pub standalone: Option<bool>,
}

/// A document type declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Doctype {
    /// The declared root element name.
    pub name: String,
    /// The PUBLIC identifier, if any.
    pub public_id: Option<String>,
    /// The SYSTEM identifier, if any.
    pub system_id: Option<String>,
    /// The raw internal subset between `[` and `]`, if any.
    pub internal_subset: Option<String>,
}

impl Doctype {
    /// Renders the declaration as it would appear in a document.
    ///
    /// ```
    /// use xmlfeed::tree::Doctype;
    ///
    /// let doctype = Doctype {
    ///     name: "html".into(),
    ///     public_id: Some("-//W3C//DTD XHTML 1.0 Strict//EN".into()),
    ///     system_id: Some("http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd".into()),
    ///     internal_subset: None,
    /// };
    /// assert!(doctype.to_declaration().starts_with("<!DOCTYPE html PUBLIC \"-//W3C"));
    /// ```
    #[must_use]
    pub fn to_declaration(&self) -> String {
        let mut out = format!("<!DOCTYPE {}", self.name);
        match (&self.public_id, &self.system_id) {
            (Some(public), Some(system)) => {
                out.push_str(&format!(" PUBLIC \"{public}\" \"{system}\""));
            }
            (Some(public), None) => out.push_str(&format!(" PUBLIC \"{public}\"")),
            (None, Some(system)) => out.push_str(&format!(" SYSTEM \"{system}\"")),
            (None, None) => {}
        }
        if let Some(subset) = &self.internal_subset {
            out.push_str(&format!(" [{subset}]"));
        }
        out.push('>');
        out
    }
}

/// A parsed document.
///
/// The `Document` owns all nodes in an arena and provides methods for
/// tree navigation and mutation. Metadata fields are public and may be
/// changed after parsing.
///
/// # Examples
///
/// ```
/// use xmlfeed::Document;
///
/// let doc = Document::parse_str("<root>hi<child/>there</root>").unwrap();
/// let root = doc.root_element().unwrap();
/// assert_eq!(doc.node_name(root), Some("root"));
/// assert_eq!(doc.text(root), Some("hi"));
/// let child = doc.first_child(root).unwrap();
/// assert_eq!(doc.tail(child), Some("there"));
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    /// The node arena. Index 0 is unused (placeholder for `NonZeroU32`).
    nodes: Vec<NodeData>,
    /// The document node (not the root element).
    root: NodeId,
    /// Released slots available for reuse.
    free: Vec<NodeId>,
    /// Elements still being built by a parser, outermost first.
    open: Vec<NodeId>,
    /// XML version from the XML declaration (e.g., "1.0").
    pub version: Option<String>,
    /// Declared or detected encoding.
    pub encoding: Option<String>,
    /// Standalone flag from the XML declaration.
    pub standalone: Option<bool>,
    /// The document type declaration, if present.
    pub doctype: Option<Doctype>,
    /// Diagnostics recorded while parsing this document as a whole.
    pub error_log: ErrorLog,
    id_map: HashMap<String, NodeId>,
}

impl Document {
    /// Creates a new empty document.
    ///
    /// The document contains a single Document node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(64);
        // Index 0: placeholder (NodeId uses NonZeroU32)
        nodes.push(NodeData::new(NodeKind::Document));
        nodes.push(NodeData::new(NodeKind::Document));
        Self {
            nodes,
            root: NodeId::from_index(1),
            free: Vec::new(),
            open: Vec::new(),
            version: None,
            encoding: None,
            standalone: None,
            doctype: None,
            error_log: ErrorLog::new(),
            id_map: HashMap::new(),
        }
    }

    /// Parses a complete XML string with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not well-formed.
    pub fn parse_str(input: &str) -> Result<Self> {
        crate::parser::parse_str(input, &ParseOptions::default())
    }

    /// Parses a complete XML byte string with default options, detecting
    /// its encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not well-formed or cannot be decoded.
    pub fn parse_bytes(input: &[u8]) -> Result<Self> {
        crate::parser::parse_bytes(input, &ParseOptions::default())
    }

    /// Returns the document node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the root element of the document.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| self.node(id).kind.is_element())
    }

    /// Returns the `NodeData` for the given node.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this document.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_index()]
    }

    /// Returns the resolved tag of an element.
    #[must_use]
    pub fn tag(&self, id: NodeId) -> Option<&QName> {
        match &self.node(id).kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Returns the local name of an element, or the target of a processing
    /// instruction.
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { tag, .. } => Some(&tag.local),
            NodeKind::ProcessingInstruction { target, .. } => Some(target),
            NodeKind::EntityRef { name } => Some(name),
            _ => None,
        }
    }

    /// Returns the namespace URI of an element, if any.
    #[must_use]
    pub fn node_namespace(&self, id: NodeId) -> Option<&str> {
        self.tag(id).and_then(|t| t.namespace.as_deref())
    }

    /// Returns the namespace bindings declared on an element.
    #[must_use]
    pub fn nsmap(&self, id: NodeId) -> &[NamespaceBinding] {
        match &self.node(id).kind {
            NodeKind::Element { nsmap, .. } => nsmap,
            _ => &[],
        }
    }

    /// Returns the content of a comment or the data of a processing instruction.
    #[must_use]
    pub fn content(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Comment { content } => Some(content),
            NodeKind::ProcessingInstruction { data, .. } => data.as_deref(),
            _ => None,
        }
    }

    /// Returns the text before the first child of an element.
    #[must_use]
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.node(id).text.as_deref()
    }

    /// Returns the text following a node, before its next sibling.
    #[must_use]
    pub fn tail(&self, id: NodeId) -> Option<&str> {
        self.node(id).tail.as_deref()
    }

    /// Replaces the text of an element.
    pub fn set_text(&mut self, id: NodeId, text: Option<String>) {
        let node = self.node_mut(id);
        node.text = text;
        node.text_is_cdata = false;
    }

    /// Replaces the tail of a node.
    pub fn set_tail(&mut self, id: NodeId, tail: Option<String>) {
        self.node_mut(id).tail = tail;
    }

    pub(crate) fn append_text(&mut self, id: NodeId, data: &str, cdata: bool) {
        let node = self.node_mut(id);
        node.text.get_or_insert_with(String::new).push_str(data);
        node.text_is_cdata |= cdata;
    }

    pub(crate) fn append_tail(&mut self, id: NodeId, data: &str) {
        self.node_mut(id)
            .tail
            .get_or_insert_with(String::new)
            .push_str(data);
    }

    /// Returns the concatenated character data of an element and its
    /// descendants, excluding the element's own tail.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(text) = self.text(id) {
            out.push_str(text);
        }
        for child in self.children(id) {
            if self.node(child).kind.is_element() {
                out.push_str(&self.text_content(child));
            }
            if let Some(tail) = self.tail(child) {
                out.push_str(tail);
            }
        }
        out
    }

    /// Returns the attributes of an element node.
    ///
    /// Returns an empty slice for non-element nodes.
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match &self.node(id).kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Returns an attribute value by Clark-notation key: `local` for no
    /// namespace, `{uri}local` otherwise.
    #[must_use]
    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        let name = QName::from_clark(key)?;
        self.attributes(id)
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Sets an attribute, replacing an existing one with the same name.
    pub fn set_attribute(&mut self, id: NodeId, name: QName, value: impl Into<String>) {
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind {
            let value = value.into();
            match attributes.iter_mut().find(|a| a.name == name) {
                Some(existing) => existing.value = value,
                None => attributes.push(Attribute { name, value }),
            }
        }
    }

    /// Removes an attribute, returning its value.
    pub fn remove_attribute(&mut self, id: NodeId, key: &str) -> Option<String> {
        let name = QName::from_clark(key)?;
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind {
            let pos = attributes.iter().position(|a| a.name == name)?;
            return Some(attributes.remove(pos).value);
        }
        None
    }

    // --- ID lookup ---

    /// Associates an ID value with an element node.
    pub fn set_id(&mut self, id: &str, node: NodeId) {
        self.id_map.insert(id.to_string(), node);
    }

    /// Looks up an element by its registered ID.
    #[must_use]
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.id_map.get(id).copied()
    }

    // --- Navigation ---

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Returns the first child of a node.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    /// Returns the last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).last_child
    }

    /// Returns the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    /// Returns the previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev_sibling
    }

    /// Returns an iterator over the children of a node.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(id).first_child,
        }
    }

    /// Returns an iterator over a node and its ancestors (walking up to the
    /// document node).
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: Some(id),
        }
    }

    /// Returns an iterator over all descendants of a node (depth-first).
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root: id,
            next: self.first_child(id),
        }
    }

    // --- Mutation ---

    fn create_node(&mut self, kind: NodeKind) -> NodeId {
        if let Some(id) = self.free.pop() {
            *self.node_mut(id) = NodeData::new(kind);
            return id;
        }
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind));
        NodeId::from_index(index)
    }

    /// Allocates a detached element.
    pub fn create_element(&mut self, tag: QName, attributes: Vec<Attribute>) -> NodeId {
        self.create_node(NodeKind::Element {
            tag,
            attributes,
            nsmap: Vec::new(),
        })
    }

    /// Allocates a detached comment.
    pub fn create_comment(&mut self, content: impl Into<String>) -> NodeId {
        self.create_node(NodeKind::Comment {
            content: content.into(),
        })
    }

    /// Allocates a detached processing instruction.
    pub fn create_pi(&mut self, target: impl Into<String>, data: Option<String>) -> NodeId {
        self.create_node(NodeKind::ProcessingInstruction {
            target: target.into(),
            data,
        })
    }

    /// Allocates a detached, unexpanded entity reference.
    pub fn create_entity_ref(&mut self, name: impl Into<String>) -> NodeId {
        self.create_node(NodeKind::EntityRef { name: name.into() })
    }

    pub(crate) fn set_nsmap(&mut self, id: NodeId, bindings: Vec<NamespaceBinding>) {
        if let NodeKind::Element { nsmap, .. } = &mut self.node_mut(id).kind {
            *nsmap = bindings;
        }
    }

    // --- Elements under construction ---

    /// Whether `id` is an element a parser is still adding content to.
    #[must_use]
    pub fn is_open(&self, id: NodeId) -> bool {
        self.open.contains(&id)
    }

    /// The elements still being built, outermost first.
    #[must_use]
    pub fn open_elements(&self) -> &[NodeId] {
        &self.open
    }

    pub(crate) fn begin_element(&mut self, id: NodeId) {
        self.open.push(id);
    }

    pub(crate) fn end_element(&mut self) -> Option<NodeId> {
        self.open.pop()
    }

    pub(crate) fn finish_building(&mut self) {
        self.open.clear();
    }

    /// Whether an open element sits inside the subtree of `id`, `id`
    /// itself included.
    fn holds_open(&self, id: NodeId) -> bool {
        self.open
            .iter()
            .any(|&open| self.ancestors(open).any(|a| a == id))
    }

    /// Appends a child node to the end of a parent's child list.
    ///
    /// A child that is still attached elsewhere is detached first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if `child` is `parent` or one of its
    /// ancestors.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.ancestors(parent).any(|a| a == child) {
            return Err(Error::invalid_state("cannot append a node to itself or its descendant"));
        }
        self.link_last(parent, child);
        Ok(())
    }

    /// Appends `child` without the cycle check; `child` must not be an
    /// ancestor of `parent`.
    pub(crate) fn link_last(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.node_mut(child).parent = Some(parent);

        if let Some(last) = self.node(parent).last_child {
            self.node_mut(last).next_sibling = Some(child);
            self.node_mut(child).prev_sibling = Some(last);
            self.node_mut(parent).last_child = Some(child);
        } else {
            self.node_mut(parent).first_child = Some(child);
            self.node_mut(parent).last_child = Some(child);
        }
    }

    /// Inserts `new_child` before `reference` in the parent's child list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if `reference` has no parent, or if
    /// `new_child` is `reference` or one of its ancestors.
    pub fn insert_before(&mut self, reference: NodeId, new_child: NodeId) -> Result<()> {
        let parent = self
            .node(reference)
            .parent
            .ok_or_else(|| Error::invalid_state("reference node has no parent"))?;
        if self.ancestors(reference).any(|a| a == new_child) {
            return Err(Error::invalid_state("cannot insert a node next to itself or its descendant"));
        }
        self.detach(new_child);
        self.node_mut(new_child).parent = Some(parent);

        if let Some(prev) = self.node(reference).prev_sibling {
            self.node_mut(prev).next_sibling = Some(new_child);
            self.node_mut(new_child).prev_sibling = Some(prev);
        } else {
            self.node_mut(parent).first_child = Some(new_child);
        }

        self.node_mut(new_child).next_sibling = Some(reference);
        self.node_mut(reference).prev_sibling = Some(new_child);
        Ok(())
    }

    /// Detaches a node from its parent. The node keeps its subtree and stays
    /// allocated; it can be re-attached.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };

        let prev = self.node(id).prev_sibling;
        let next = self.node(id).next_sibling;

        match prev {
            Some(p) => self.node_mut(p).next_sibling = next,
            None => self.node_mut(parent).first_child = next,
        }

        match next {
            Some(n) => self.node_mut(n).prev_sibling = prev,
            None => self.node_mut(parent).last_child = prev,
        }

        let node = self.node_mut(id);
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    /// Detaches a node and returns its whole subtree's slots to the arena.
    ///
    /// Every `NodeId` inside the subtree becomes invalid and may be reused
    /// by later allocations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] for the document node, and for a
    /// subtree holding an element that is still being parsed.
    pub fn release(&mut self, id: NodeId) -> Result<()> {
        if id == self.root {
            return Err(Error::invalid_state("cannot release the document node"));
        }
        if self.holds_open(id) {
            return Err(Error::invalid_state("cannot release an element that is still being parsed"));
        }
        self.detach(id);
        let mut released: Vec<NodeId> = vec![id];
        released.extend(self.descendants(id));
        if !self.id_map.is_empty() {
            let gone: HashSet<NodeId> = released.iter().copied().collect();
            self.id_map.retain(|_, node| !gone.contains(node));
        }
        for node in &released {
            *self.node_mut(*node) = NodeData::new(NodeKind::Document);
        }
        self.free.extend(released);
        Ok(())
    }

    /// Resets an element: releases its children and drops its text,
    /// attributes, and (unless `keep_tail`) its tail.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if one of the children is still
    /// being parsed.
    pub fn clear(&mut self, id: NodeId, keep_tail: bool) -> Result<()> {
        if self.children(id).any(|child| self.holds_open(child)) {
            return Err(Error::invalid_state("cannot clear an element whose children are still being parsed"));
        }
        while let Some(child) = self.first_child(id) {
            self.release(child)?;
        }
        let node = self.node_mut(id);
        node.text = None;
        node.text_is_cdata = false;
        if !keep_tail {
            node.tail = None;
        }
        if let NodeKind::Element { attributes, .. } = &mut node.kind {
            attributes.clear();
        }
        Ok(())
    }

    /// Releases the preceding siblings of `id`, nearest first, returning
    /// how many were removed. Stops at a sibling that is still being
    /// parsed.
    pub fn remove_preceding_siblings(&mut self, id: NodeId) -> usize {
        self.remove_preceding_siblings_while(id, |_, _| true)
    }

    /// Like [`remove_preceding_siblings`](Self::remove_preceding_siblings),
    /// also stopping at the first sibling for which `removable` is false.
    pub(crate) fn remove_preceding_siblings_while(
        &mut self,
        id: NodeId,
        removable: impl Fn(&Self, NodeId) -> bool,
    ) -> usize {
        let mut removed = 0;
        while let Some(prev) = self.prev_sibling(id) {
            if !removable(self, prev) || self.release(prev).is_err() {
                break;
            }
            removed += 1;
        }
        removed
    }

    /// Returns the total number of slots in the arena, released or not.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1 // subtract placeholder at index 0
    }

    /// Returns the number of slots currently in use.
    #[must_use]
    pub fn live_node_count(&self) -> usize {
        self.node_count() - self.free.len()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// --- Iterators ---

/// Iterator over the children of a node.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).next_sibling;
        Some(current)
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).parent;
        Some(current)
    }
}

/// Depth-first iterator over all descendants of a node.
pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        if let Some(child) = self.doc.first_child(current) {
            self.next = Some(child);
            return Some(current);
        }

        if let Some(sibling) = self.doc.next_sibling(current) {
            self.next = Some(sibling);
            return Some(current);
        }

        let mut ancestor = self.doc.parent(current);
        while let Some(anc) = ancestor {
            if anc == self.root {
                break;
            }
            if let Some(sibling) = self.doc.next_sibling(anc) {
                self.next = Some(sibling);
                return Some(current);
            }
            ancestor = self.doc.parent(anc);
        }

        self.next = None;
        Some(current)
    }
}
