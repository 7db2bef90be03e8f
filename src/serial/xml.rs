//! XML serializer.
//!
//! Writes the text/tail tree back out as markup. Namespace declarations come
//! from each element's `nsmap`; a name whose namespace is not in scope with
//! its prefix gets the missing declaration added on the spot, so any
//! subtree serializes to well-formed XML on its own.

use std::fmt::Write;

use crate::parser::namespace::NamespaceStack;
use crate::tree::{Document, NamespaceBinding, NodeId, NodeKind};
use crate::util::qname::QName;

/// Options controlling XML serialization output.
///
/// # Examples
///
/// ```
/// use xmlfeed::Document;
/// use xmlfeed::serial::{serialize_with_options, SerializeOptions};
///
/// let doc = Document::parse_str("<root>caf\u{e9}</root>").unwrap();
/// let opts = SerializeOptions::default().xml_declaration(true).ascii_only(true);
/// let xml = serialize_with_options(&doc, &opts);
/// assert_eq!(xml, "<?xml version=\"1.0\"?>\n<root>caf&#xE9;</root>");
/// ```
#[derive(Debug, Clone)]
pub struct SerializeOptions {
    /// Emit an XML declaration built from the document metadata.
    /// Defaults to `false`.
    pub xml_declaration: bool,
    /// Emit the document type declaration, if the document has one.
    /// Defaults to `true`.
    pub doctype: bool,
    /// Write every non-ASCII character as a character reference.
    /// Defaults to `false`.
    pub ascii_only: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            xml_declaration: false,
            doctype: true,
            ascii_only: false,
        }
    }
}

impl SerializeOptions {
    #[must_use]
    pub fn xml_declaration(mut self, yes: bool) -> Self {
        self.xml_declaration = yes;
        self
    }

    #[must_use]
    pub fn doctype(mut self, yes: bool) -> Self {
        self.doctype = yes;
        self
    }

    #[must_use]
    pub fn ascii_only(mut self, yes: bool) -> Self {
        self.ascii_only = yes;
        self
    }
}

/// Serializes a document to an XML string.
///
/// # Examples
///
/// ```
/// use xmlfeed::Document;
/// use xmlfeed::serial::serialize;
///
/// let doc = Document::parse_str("<root><child a='1'>Hello</child>tail</root>").unwrap();
/// assert_eq!(serialize(&doc), "<root><child a=\"1\">Hello</child>tail</root>");
/// ```
#[must_use]
pub fn serialize(doc: &Document) -> String {
    serialize_with_options(doc, &SerializeOptions::default())
}

/// Serializes a document to an XML string with the given options.
#[must_use]
pub fn serialize_with_options(doc: &Document, options: &SerializeOptions) -> String {
    let mut writer = Writer::new(options);

    if options.xml_declaration {
        let version = doc.version.as_deref().unwrap_or("1.0");
        let _ = write!(writer.out, "<?xml version=\"{version}\"");
        if let Some(encoding) = &doc.encoding {
            let _ = write!(writer.out, " encoding=\"{encoding}\"");
        }
        if let Some(standalone) = doc.standalone {
            let _ = write!(
                writer.out,
                " standalone=\"{}\"",
                if standalone { "yes" } else { "no" }
            );
        }
        writer.out.push_str("?>\n");
    }
    if options.doctype {
        if let Some(doctype) = &doc.doctype {
            writer.out.push_str(&doctype.to_declaration());
            writer.out.push('\n');
        }
    }

    for child in doc.children(doc.root()) {
        writer.node(doc, child, true);
    }
    writer.out
}

/// Serializes one node and its subtree.
///
/// With `with_tail` the text following the node is included, as it would
/// be inside its parent.
///
/// # Examples
///
/// ```
/// use xmlfeed::Document;
/// use xmlfeed::serial::serialize_node;
///
/// let doc = Document::parse_str("<r xmlns:p='urn:p'><p:a>x</p:a> after</r>").unwrap();
/// let a = doc.first_child(doc.root_element().unwrap()).unwrap();
/// assert_eq!(serialize_node(&doc, a, false), "<p:a xmlns:p=\"urn:p\">x</p:a>");
/// assert!(serialize_node(&doc, a, true).ends_with(" after"));
/// ```
#[must_use]
pub fn serialize_node(doc: &Document, id: NodeId, with_tail: bool) -> String {
    let options = SerializeOptions::default();
    if id == doc.root() {
        return serialize_with_options(doc, &options);
    }
    let mut writer = Writer::new(&options);
    writer.node(doc, id, with_tail);
    writer.out
}

struct Writer<'o> {
    out: String,
    scopes: NamespaceStack,
    options: &'o SerializeOptions,
    generated: usize,
}

impl<'o> Writer<'o> {
    fn new(options: &'o SerializeOptions) -> Self {
        Self {
            out: String::new(),
            scopes: NamespaceStack::new(),
            options,
            generated: 0,
        }
    }

    fn node(&mut self, doc: &Document, id: NodeId, with_tail: bool) {
        let data = doc.node(id);
        match &data.kind {
            NodeKind::Element {
                tag,
                attributes,
                nsmap,
            } => {
                let mut declared = nsmap.clone();
                let name = self.element_name(tag, &mut declared);
                let attribute_names: Vec<String> = attributes
                    .iter()
                    .map(|attr| self.attribute_name(&attr.name, &mut declared))
                    .collect();

                self.out.push('<');
                self.out.push_str(&name);
                for (prefix, uri) in &declared {
                    match prefix {
                        Some(prefix) => {
                            let _ = write!(self.out, " xmlns:{prefix}=\"");
                        }
                        None => self.out.push_str(" xmlns=\""),
                    }
                    write_escaped_attr(&mut self.out, uri, self.options.ascii_only);
                    self.out.push('"');
                }
                for (attr, qualified) in attributes.iter().zip(&attribute_names) {
                    let _ = write!(self.out, " {qualified}=\"");
                    write_escaped_attr(&mut self.out, &attr.value, self.options.ascii_only);
                    self.out.push('"');
                }

                let text = data.text.as_deref().filter(|t| !t.is_empty());
                if text.is_none() && data.first_child.is_none() {
                    self.out.push_str("/>");
                } else {
                    self.out.push('>');
                    self.scopes.push_scope(declared);
                    if let Some(text) = text {
                        if data.text_is_cdata && !text.contains("]]>") {
                            let _ = write!(self.out, "<![CDATA[{text}]]>");
                        } else {
                            write_escaped_text(&mut self.out, text, self.options.ascii_only);
                        }
                    }
                    for child in doc.children(id) {
                        self.node(doc, child, true);
                    }
                    self.scopes.pop_scope();
                    let _ = write!(self.out, "</{name}>");
                }
            }
            NodeKind::Comment { content } => {
                let _ = write!(self.out, "<!--{content}-->");
            }
            NodeKind::ProcessingInstruction { target, data } => {
                self.out.push_str("<?");
                self.out.push_str(target);
                if let Some(d) = data {
                    self.out.push(' ');
                    self.out.push_str(d);
                }
                self.out.push_str("?>");
            }
            NodeKind::EntityRef { name } => {
                let _ = write!(self.out, "&{name};");
            }
            NodeKind::Document => {}
        }
        if with_tail {
            if let Some(tail) = &data.tail {
                write_escaped_text(&mut self.out, tail, self.options.ascii_only);
            }
        }
    }

    /// Looks a prefix up in the bindings being declared here, then in scope.
    fn lookup<'a>(&'a self, declared: &'a [NamespaceBinding], prefix: Option<&str>) -> Option<&'a str> {
        match declared.iter().rev().find(|(p, _)| p.as_deref() == prefix) {
            Some((_, uri)) => (!uri.is_empty()).then_some(uri.as_str()),
            None => self.scopes.resolve(prefix),
        }
    }

    fn element_name(&mut self, tag: &QName, declared: &mut Vec<NamespaceBinding>) -> String {
        let prefix = tag.prefix.as_deref();
        let wanted = tag.namespace.as_deref();
        if self.lookup(declared, prefix) != wanted {
            match (prefix, wanted) {
                (_, Some(uri)) => declared.push((prefix.map(str::to_string), uri.to_string())),
                // An unprefixed name in no namespace under a default namespace.
                (None, None) => declared.push((None, String::new())),
                (Some(_), None) => return tag.local.clone(),
            }
        }
        tag.qualified()
    }

    fn attribute_name(&mut self, name: &QName, declared: &mut Vec<NamespaceBinding>) -> String {
        let Some(uri) = name.namespace.as_deref() else {
            return name.local.clone();
        };
        if let Some(prefix) = name.prefix.as_deref() {
            if self.lookup(declared, Some(prefix)) != Some(uri) {
                declared.push((Some(prefix.to_string()), uri.to_string()));
            }
            return name.qualified();
        }
        // Attributes need a prefix to be namespaced; reuse one if bound.
        let bound = declared
            .iter()
            .rev()
            .find(|(p, u)| p.is_some() && u == uri)
            .and_then(|(p, _)| p.clone());
        let prefix = match bound {
            Some(prefix) => prefix,
            None => {
                let prefix = format!("ns{}", self.generated);
                self.generated += 1;
                declared.push((Some(prefix.clone()), uri.to_string()));
                prefix
            }
        };
        format!("{prefix}:{}", name.local)
    }
}

/// Writes a hexadecimal character reference (`&#xHH;`) for a Unicode code point.
fn write_hex_char_ref(out: &mut String, ch: char) {
    let _ = write!(out, "&#x{:X};", ch as u32);
}

/// Escapes character data.
///
/// `<`, `>` and `&` become named references, `\r` becomes `&#13;` so it
/// survives line-end normalization, and other control characters are
/// written as hex references.
fn write_escaped_text(out: &mut String, text: &str, ascii_only: bool) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            '\t' | '\n' => out.push(ch),
            c if (c as u32) < 0x20 => write_hex_char_ref(out, c),
            c if ascii_only && (c as u32) >= 0x80 => write_hex_char_ref(out, c),
            _ => out.push(ch),
        }
    }
}

/// Escapes a double-quoted attribute value.
///
/// Tabs and line breaks are written as references so attribute-value
/// normalization gives them back unchanged.
fn write_escaped_attr(out: &mut String, text: &str, ascii_only: bool) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            c if (c as u32) < 0x20 => write_hex_char_ref(out, c),
            c if ascii_only && (c as u32) >= 0x80 => write_hex_char_ref(out, c),
            _ => out.push(ch),
        }
    }
}
