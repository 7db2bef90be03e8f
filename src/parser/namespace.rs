//! Namespace scope stack.
//!
//! Maintains a stack of binding frames that mirrors the element nesting.
//! Each frame holds the `xmlns` declarations introduced on one element, in
//! declaration order. Resolution walks the stack from top to bottom.

use crate::tree::NamespaceBinding;

/// The well-known XML namespace URI, pre-bound to the `xml` prefix.
pub(crate) const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The namespace URI reserved for `xmlns` declarations themselves.
pub(crate) const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

#[derive(Debug, Clone)]
pub(crate) struct NamespaceStack {
    frames: Vec<Vec<NamespaceBinding>>,
}

impl NamespaceStack {
    /// Creates a stack holding only the implicit `xml` binding.
    pub fn new() -> Self {
        Self {
            frames: vec![vec![(Some("xml".to_string()), XML_NAMESPACE.to_string())]],
        }
    }

    /// Opens a scope for an element with its own declarations.
    pub fn push_scope(&mut self, bindings: Vec<NamespaceBinding>) {
        self.frames.push(bindings);
    }

    /// Closes the innermost element scope, returning its bindings. The
    /// implicit base frame is never popped.
    pub fn pop_scope(&mut self) -> Vec<NamespaceBinding> {
        if self.frames.len() > 1 {
            self.frames.pop().unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    /// Number of open element scopes.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Resolves a prefix to its URI, `None` for the default namespace.
    ///
    /// An empty URI undeclares: `xmlns=""` puts unprefixed names back in no
    /// namespace.
    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p.as_deref() == prefix)
            .and_then(|(_, uri)| (!uri.is_empty()).then_some(uri.as_str()))
    }

    pub fn clear(&mut self) {
        self.frames.truncate(1);
    }
}
