//! The default target: builds a [`Document`].

use std::convert::Infallible;

use super::Target;
use crate::error::{Error, Result};
use crate::events::Payload;
use crate::parser::namespace::XML_NAMESPACE;
use crate::tree::{Attribute, Doctype, Document, NamespaceBinding, NodeId, XmlDeclaration};
use crate::util::qname::QName;

/// Builds the text/tail tree from parse events.
///
/// The stack of elements that are still open lives in the document itself
/// (see [`Document::open_elements`]). Those elements are ancestors of
/// whatever the parser sees next: the document refuses to release them, and
/// the guarded helpers ([`detach_checked`](Self::detach_checked),
/// [`clear`](Self::clear)) refuse to touch them at all.
#[derive(Debug)]
pub struct TreeBuilder {
    doc: Document,
    pending_ns: Vec<NamespaceBinding>,
    collect_ids: bool,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            doc: Document::new(),
            pending_ns: Vec::new(),
            collect_ids: true,
        }
    }

    /// Whether `id` and `xml:id` attributes are indexed for
    /// [`Document::element_by_id`].
    #[must_use]
    pub fn collect_ids(mut self, yes: bool) -> Self {
        self.collect_ids = yes;
        self
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Whether `id` is an element whose end tag has not been seen yet.
    #[must_use]
    pub fn is_open(&self, id: NodeId) -> bool {
        self.doc.is_open(id)
    }

    /// The elements currently open, outermost first.
    #[must_use]
    pub fn open_elements(&self) -> &[NodeId] {
        self.doc.open_elements()
    }

    fn ensure_closed(&self, id: NodeId, action: &str) -> Result<()> {
        if self.is_open(id) {
            return Err(Error::invalid_state(format!(
                "cannot {action} an element that is still being parsed"
            )));
        }
        Ok(())
    }

    /// Detaches a finished node from the tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if `id` is still open.
    pub fn detach_checked(&mut self, id: NodeId) -> Result<()> {
        self.ensure_closed(id, "detach")?;
        self.doc.detach(id);
        Ok(())
    }

    /// Releases a finished element's children and drops its text and
    /// attributes (and tail, unless `keep_tail`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if `id` is still open.
    pub fn clear(&mut self, id: NodeId, keep_tail: bool) -> Result<()> {
        self.ensure_closed(id, "clear")?;
        self.doc.clear(id, keep_tail)
    }

    fn insertion_point(&self) -> NodeId {
        self.doc
            .open_elements()
            .last()
            .copied()
            .unwrap_or_else(|| self.doc.root())
    }

    fn attach(&mut self, node: NodeId) -> Payload<Infallible> {
        let parent = self.insertion_point();
        // A freshly created node has no descendants to form a cycle with.
        self.doc.link_last(parent, node);
        Payload::Node(node)
    }

    fn append_data(&mut self, text: &str, cdata: bool) {
        let parent = self.insertion_point();
        match self.doc.last_child(parent) {
            Some(last) => self.doc.append_tail(last, text),
            None if parent == self.doc.root() => {}
            None => self.doc.append_text(parent, text, cdata),
        }
    }

    fn register_ids(&mut self, node: NodeId, attributes: &[Attribute]) {
        for attr in attributes {
            let is_id = attr.name.local == "id"
                && match attr.name.namespace.as_deref() {
                    None => true,
                    Some(ns) => ns == XML_NAMESPACE,
                };
            if is_id {
                self.doc.set_id(&attr.value, node);
            }
        }
    }
}

impl Target for TreeBuilder {
    type Value = Infallible;
    type Output = Document;

    fn declaration(&mut self, declaration: &XmlDeclaration) {
        self.doc.version = Some(declaration.version.clone());
        self.doc.encoding.clone_from(&declaration.encoding);
        self.doc.standalone = declaration.standalone;
    }

    fn doctype(&mut self, doctype: &Doctype) {
        self.doc.doctype = Some(doctype.clone());
    }

    fn start_ns(&mut self, prefix: Option<&str>, uri: &str) {
        self.pending_ns
            .push((prefix.map(str::to_string), uri.to_string()));
    }

    fn start(&mut self, tag: &QName, attributes: &[Attribute]) -> Payload<Infallible> {
        let node = self.doc.create_element(tag.clone(), attributes.to_vec());
        if !self.pending_ns.is_empty() {
            let bindings = std::mem::take(&mut self.pending_ns);
            self.doc.set_nsmap(node, bindings);
        }
        if self.collect_ids {
            self.register_ids(node, attributes);
        }
        let payload = self.attach(node);
        self.doc.begin_element(node);
        payload
    }

    fn end(&mut self, _tag: &QName) -> Payload<Infallible> {
        self.doc.end_element().map_or(Payload::Empty, Payload::Node)
    }

    fn data(&mut self, text: &str) {
        self.append_data(text, false);
    }

    fn cdata(&mut self, text: &str) {
        self.append_data(text, true);
    }

    fn entity(&mut self, name: &str) {
        let node = self.doc.create_entity_ref(name);
        self.attach(node);
    }

    fn comment(&mut self, text: &str) -> Payload<Infallible> {
        let node = self.doc.create_comment(text);
        self.attach(node)
    }

    fn pi(&mut self, target: &str, data: Option<&str>) -> Payload<Infallible> {
        let node = self.doc.create_pi(target, data.map(str::to_string));
        self.attach(node)
    }

    fn close(&mut self) -> Option<Document> {
        self.doc.finish_building();
        self.pending_ns.clear();
        Some(std::mem::take(&mut self.doc))
    }
}
