//! Token dispatch.
//!
//! The dispatcher turns lexical tokens into target calls and pull events.
//! It owns the open-element stack and the namespace scope stack and keeps
//! them in lockstep: every `start` pushes one element and one (possibly
//! empty) namespace frame, every `end` pops both.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::blank::{BlankContext, BlankTextPolicy};
use super::html;
use super::input::{is_blank, validate_qname};
use super::namespace::{NamespaceStack, XMLNS_NAMESPACE, XML_NAMESPACE};
use super::scanner::Token;
use crate::error::{ErrorKind, ErrorSeverity, ParseDiagnostic, ParseError, SourceLocation};
use crate::events::queue::EventQueue;
use crate::events::{Event, EventKinds, TagSelector};
use crate::target::Target;
use crate::tree::{Attribute, Doctype, NamespaceBinding};
use crate::util::qname::{split_qname, QName};

/// Dispatcher configuration, derived from the parse options.
#[derive(Debug, Clone)]
pub(crate) struct DispatchSettings {
    pub recover: bool,
    pub html: bool,
    pub strip_cdata: bool,
    pub remove_comments: bool,
    pub remove_pis: bool,
    pub max_depth: Option<usize>,
    pub blank_policy: Option<Arc<dyn BlankTextPolicy>>,
    pub events: EventKinds,
    pub tags: Option<TagSelector>,
}

#[derive(Debug)]
struct OpenElement {
    /// The name as written in the source.
    name: String,
    tag: QName,
    line: u32,
    /// Whether the element's `start` or a `start-ns` was queued.
    head_queued: bool,
    has_children: bool,
}

pub(crate) struct Dispatcher<T: Target> {
    target: T,
    queue: EventQueue<T::Value>,
    namespaces: NamespaceStack,
    open: Vec<OpenElement>,
    deferred_blank: Option<String>,
    root_seen: bool,
    root_closed: bool,
    /// Nesting depth of content being ignored after the root closed.
    ignore_depth: usize,
    settings: DispatchSettings,
    diagnostics: Vec<ParseDiagnostic>,
}

impl<T: Target> Dispatcher<T> {
    pub fn new(target: T, settings: DispatchSettings) -> Self {
        Self {
            target,
            queue: EventQueue::new(settings.events, settings.tags.clone()),
            namespaces: NamespaceStack::new(),
            open: Vec::new(),
            deferred_blank: None,
            root_seen: false,
            root_closed: false,
            ignore_depth: 0,
            settings,
            diagnostics: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.queue.clear();
        self.namespaces.clear();
        self.open.clear();
        self.deferred_blank = None;
        self.root_seen = false;
        self.root_closed = false;
        self.ignore_depth = 0;
        self.diagnostics.clear();
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// Splits out the pieces an event handle needs.
    pub fn events_parts(&mut self) -> (&mut EventQueue<T::Value>, &mut T) {
        (&mut self.queue, &mut self.target)
    }

    /// Current element nesting depth.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn take_diagnostics(&mut self) -> Vec<ParseDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn report(&mut self, kind: ErrorKind, severity: ErrorSeverity, message: impl Into<String>, location: SourceLocation) {
        let diagnostic = ParseDiagnostic::new(kind, severity, message, location);
        warn!(%diagnostic, "recovered");
        self.diagnostics.push(diagnostic);
    }

    /// Logs a well-formedness problem in recovery mode, fails otherwise.
    fn problem(&mut self, kind: ErrorKind, message: impl Into<String>, location: SourceLocation) -> Result<(), ParseError> {
        if self.settings.recover {
            self.report(kind, ErrorSeverity::Error, message, location);
            Ok(())
        } else {
            Err(ParseError::new(kind, message, location))
        }
    }

    pub fn dispatch(&mut self, token: Token, location: SourceLocation) -> Result<(), ParseError> {
        trace!(?token, line = location.line, column = location.column, "token");
        if let Token::Text(text) = &token {
            if self.blank_deferrable(text) {
                self.deferred_blank
                    .get_or_insert_with(String::new)
                    .push_str(text);
                return Ok(());
            }
        }
        self.settle_blank(matches!(token, Token::EndTag { .. }));

        match token {
            Token::Declaration(declaration) => self.target.declaration(&declaration),
            Token::Doctype(doctype) => self.doctype(&doctype, location)?,
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => self.start_tag(name, attributes, self_closing, location)?,
            Token::EndTag { name } => self.end_tag(&name, location)?,
            Token::Text(text) => self.text(&text, false, location)?,
            Token::CData(text) => self.text(&text, true, location)?,
            Token::Comment(text) => self.comment(&text),
            Token::Pi { target, data } => self.pi(&target, data.as_deref()),
            Token::EntityRef(name) => self.entity(&name, location)?,
        }
        Ok(())
    }

    // --- Character data ---

    fn blank_deferrable(&self, text: &str) -> bool {
        self.settings.blank_policy.is_some()
            && !self.open.is_empty()
            && self.ignore_depth == 0
            && is_blank(text)
    }

    /// Delivers or drops deferred whitespace, now that the next token is known.
    fn settle_blank(&mut self, followed_by_end_tag: bool) {
        let Some(text) = self.deferred_blank.take() else {
            return;
        };
        let (Some(policy), Some(top)) = (&self.settings.blank_policy, self.open.last()) else {
            return;
        };
        let context = BlankContext {
            parent: &top.tag,
            parent_has_children: top.has_children,
            followed_by_end_tag,
        };
        if policy.is_ignorable(&text, &context) {
            trace!(len = text.len(), "dropped blank text");
            return;
        }
        self.target.data(&text);
    }

    fn text(&mut self, text: &str, cdata: bool, location: SourceLocation) -> Result<(), ParseError> {
        if self.ignore_depth > 0 {
            return Ok(());
        }
        if self.open.is_empty() {
            if is_blank(text) {
                // Becomes the tail of a top-level node, if there is one.
                self.target.data(text);
                return Ok(());
            }
            return self.outside_root(location);
        }
        if cdata && !self.settings.strip_cdata {
            self.target.cdata(text);
        } else {
            self.target.data(text);
        }
        Ok(())
    }

    fn outside_root(&mut self, location: SourceLocation) -> Result<(), ParseError> {
        let message = if self.root_closed {
            "Extra content at the end of the document"
        } else {
            "Start tag expected, '<' not found"
        };
        self.problem(ErrorKind::ContentOutsideRoot, message, location)
    }

    fn entity(&mut self, name: &str, location: SourceLocation) -> Result<(), ParseError> {
        if self.ignore_depth > 0 {
            return Ok(());
        }
        let Some(top) = self.open.last_mut() else {
            return self.outside_root(location);
        };
        top.has_children = true;
        self.target.entity(name);
        Ok(())
    }

    // --- Comments, PIs, doctype ---

    fn comment(&mut self, text: &str) {
        if self.ignore_depth > 0 || self.settings.remove_comments {
            return;
        }
        let payload = self.target.comment(text);
        self.queue
            .push(Event::Comment(payload), self.open.len() + 1, None);
        if let Some(top) = self.open.last_mut() {
            top.has_children = true;
        }
    }

    fn pi(&mut self, target: &str, data: Option<&str>) {
        if self.ignore_depth > 0 || self.settings.remove_pis {
            return;
        }
        let payload = self.target.pi(target, data);
        self.queue.push(Event::Pi(payload), self.open.len() + 1, None);
        if let Some(top) = self.open.last_mut() {
            top.has_children = true;
        }
    }

    fn doctype(&mut self, doctype: &Doctype, location: SourceLocation) -> Result<(), ParseError> {
        if self.root_seen {
            return self.problem(ErrorKind::Doctype, "DOCTYPE improperly placed", location);
        }
        self.target.doctype(doctype);
        Ok(())
    }

    // --- Elements ---

    fn start_tag(
        &mut self,
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
        location: SourceLocation,
    ) -> Result<(), ParseError> {
        if self.ignore_depth > 0 {
            if !self_closing {
                self.ignore_depth += 1;
            }
            return Ok(());
        }
        if self.open.is_empty() && self.root_closed {
            self.problem(
                ErrorKind::ContentOutsideRoot,
                "Extra content at the end of the document",
                location,
            )?;
            if !self_closing {
                self.ignore_depth = 1;
            }
            return Ok(());
        }
        if self.settings.html {
            while self
                .open
                .last()
                .is_some_and(|top| html::auto_closes(&top.name, &name))
            {
                self.close_top();
            }
        }
        if let Some(max) = self.settings.max_depth {
            if self.open.len() >= max {
                return Err(ParseError::new(
                    ErrorKind::LimitExceeded,
                    format!("Excessive depth in document: {max}, use huge_tree to lift the limit"),
                    location,
                ));
            }
        }

        let mut bindings: Vec<NamespaceBinding> = Vec::new();
        let mut plain = Vec::with_capacity(attributes.len());
        for (attr, value) in attributes {
            if self.settings.html {
                plain.push((attr, value));
            } else if attr == "xmlns" {
                if value == XML_NAMESPACE || value == XMLNS_NAMESPACE {
                    self.problem(
                        ErrorKind::NamespaceDeclaration,
                        format!("xmlns: reserved namespace URI '{value}' used as default"),
                        location,
                    )?;
                    continue;
                }
                bindings.push((None, value));
            } else if let Some(prefix) = attr.strip_prefix("xmlns:") {
                if let Some(message) = check_prefix_declaration(prefix, &value) {
                    self.problem(ErrorKind::NamespaceDeclaration, message, location)?;
                    continue;
                }
                if prefix != "xml" {
                    bindings.push((Some(prefix.to_string()), value));
                }
            } else {
                plain.push((attr, value));
            }
        }
        self.namespaces.push_scope(bindings.clone());

        let tag = self.resolve(&name, false, location)?;
        let mut resolved: Vec<Attribute> = Vec::with_capacity(plain.len());
        for (attr, value) in plain {
            let attr_name = self.resolve(&attr, true, location)?;
            if resolved.iter().any(|a| a.name == attr_name) {
                self.problem(
                    ErrorKind::AttributeRedefined,
                    format!("Namespaced attribute {attr_name} redefined"),
                    location,
                )?;
                continue;
            }
            resolved.push(Attribute {
                name: attr_name,
                value,
            });
        }

        let depth = self.open.len() + 1;
        let mut head_queued = false;
        for (prefix, uri) in bindings {
            self.target.start_ns(prefix.as_deref(), &uri);
            head_queued |= self.queue.push(Event::StartNs { prefix, uri }, depth, None);
        }
        let payload = self.target.start(&tag, &resolved);
        head_queued |= self.queue.push(Event::Start(payload), depth, Some(&tag));
        trace!(%tag, depth, "start");

        if let Some(parent) = self.open.last_mut() {
            parent.has_children = true;
        }
        self.root_seen = true;
        self.open.push(OpenElement {
            name,
            tag,
            line: location.line,
            head_queued,
            has_children: false,
        });
        if self_closing {
            self.close_top();
        }
        Ok(())
    }

    /// Resolves a source name against the namespaces in scope. Unprefixed
    /// attributes are never in a namespace.
    fn resolve(&mut self, name: &str, attribute: bool, location: SourceLocation) -> Result<QName, ParseError> {
        if self.settings.html {
            return Ok(QName::local(name));
        }
        if let Some(message) = validate_qname(name) {
            self.problem(
                ErrorKind::NamespaceDeclaration,
                format!("Failed to parse QName '{name}': {message}"),
                location,
            )?;
            return Ok(QName::local(name));
        }
        let (prefix, local) = split_qname(name);
        let Some(prefix) = prefix else {
            return Ok(match self.namespaces.resolve(None) {
                Some(uri) if !attribute => QName::namespaced(uri, local),
                _ => QName::local(local),
            });
        };
        if let Some(uri) = self.namespaces.resolve(Some(prefix)) {
            return Ok(QName::namespaced(uri, local).with_prefix(Some(prefix)));
        }
        self.problem(
            ErrorKind::UndefinedNamespace,
            format!("Namespace prefix {prefix} on {local} is not defined"),
            location,
        )?;
        Ok(QName::local(name))
    }

    /// Ends the innermost open element.
    fn close_top(&mut self) {
        let Some(element) = self.open.pop() else {
            return;
        };
        let depth = self.open.len() + 1;
        let payload = self.target.end(&element.tag);
        self.queue
            .push_end(Event::End(payload), depth, &element.tag, element.head_queued);
        trace!(tag = %element.tag, depth, "end");
        for (prefix, _) in self.namespaces.pop_scope().into_iter().rev() {
            self.target.end_ns(prefix.as_deref());
            self.queue.push(Event::EndNs, depth, None);
        }
        if self.open.is_empty() {
            self.root_closed = true;
        }
    }

    fn end_tag(&mut self, name: &str, location: SourceLocation) -> Result<(), ParseError> {
        if self.ignore_depth > 0 {
            self.ignore_depth -= 1;
            return Ok(());
        }
        if self.settings.html {
            self.html_end_tag(name, location);
            return Ok(());
        }
        let found = self.open.iter().rposition(|e| e.name == name);
        if found.is_some_and(|i| i + 1 == self.open.len()) {
            self.close_top();
            return Ok(());
        }
        let message = match self.open.last() {
            Some(top) => format!(
                "Opening and ending tag mismatch: {} line {} and {name}",
                top.name, top.line
            ),
            None => format!("Unexpected end tag: {name}"),
        };
        self.problem(ErrorKind::TagNameMismatch, message, location)?;
        if let Some(i) = found {
            while self.open.len() > i {
                self.close_top();
            }
        }
        Ok(())
    }

    /// HTML end tags never fail. `</html>` and `</body>` are deferred to the
    /// end of input so trailing content still lands in the body.
    fn html_end_tag(&mut self, name: &str, location: SourceLocation) {
        if name.is_empty() || matches!(name, "html" | "body") {
            return;
        }
        let Some(i) = self.open.iter().rposition(|e| e.name == name) else {
            self.report(
                ErrorKind::HtmlTag,
                ErrorSeverity::Error,
                format!("Unexpected end tag : {name}"),
                location,
            );
            return;
        };
        let implicit = self.open[i + 1..]
            .iter()
            .find(|e| !html::has_optional_end(&e.name))
            .map(|e| e.name.clone());
        if let Some(unclosed) = implicit {
            self.report(
                ErrorKind::HtmlTag,
                ErrorSeverity::Error,
                format!("Opening and ending tag mismatch: {unclosed} and {name}"),
                location,
            );
        }
        while self.open.len() > i {
            self.close_top();
        }
    }

    /// Finishes the document at end of input.
    pub fn finish(&mut self, location: SourceLocation) -> Result<(), ParseError> {
        self.settle_blank(true);
        if let Some(top) = self.open.last() {
            if !self.settings.html {
                let message = format!("Premature end of data in tag {} line {}", top.name, top.line);
                self.problem(ErrorKind::UnclosedTag, message, location)?;
            }
            while !self.open.is_empty() {
                self.close_top();
            }
        }
        if !self.root_seen {
            self.problem(ErrorKind::DocumentEmpty, "Document is empty", location)?;
        }
        debug!(queued = self.queue.len(), "document finished");
        Ok(())
    }
}

/// Checks an `xmlns:prefix="uri"` declaration.
fn check_prefix_declaration(prefix: &str, uri: &str) -> Option<String> {
    match prefix {
        "xmlns" => Some("xmlns: the prefix 'xmlns' must not be declared".to_string()),
        "xml" if uri != XML_NAMESPACE => {
            Some("xml namespace prefix mapped to wrong URI".to_string())
        }
        "xml" => None,
        _ if prefix.is_empty() || prefix.contains(':') => {
            Some(format!("xmlns:{prefix}: invalid prefix"))
        }
        _ if uri.is_empty() => Some(format!("xmlns:{prefix}: Empty XML namespace is not allowed")),
        _ if uri == XML_NAMESPACE || uri == XMLNS_NAMESPACE => {
            Some(format!("xmlns:{prefix}: reserved namespace URI '{uri}'"))
        }
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::events::Payload;
    use pretty_assertions::assert_eq;

    /// Records target calls as strings.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl Target for Recorder {
        type Value = String;
        type Output = Vec<String>;

        fn start_ns(&mut self, prefix: Option<&str>, uri: &str) {
            self.calls
                .push(format!("start-ns {}={uri}", prefix.unwrap_or("")));
        }

        fn end_ns(&mut self, prefix: Option<&str>) {
            self.calls.push(format!("end-ns {}", prefix.unwrap_or("")));
        }

        fn start(&mut self, tag: &QName, _attributes: &[Attribute]) -> Payload<String> {
            self.calls.push(format!("start {tag}"));
            Payload::Custom(tag.clark())
        }

        fn end(&mut self, tag: &QName) -> Payload<String> {
            self.calls.push(format!("end {tag}"));
            Payload::Custom(tag.clark())
        }

        fn data(&mut self, text: &str) {
            self.calls.push(format!("data {text:?}"));
        }

        fn close(&mut self) -> Option<Vec<String>> {
            Some(std::mem::take(&mut self.calls))
        }
    }

    fn settings(recover: bool) -> DispatchSettings {
        DispatchSettings {
            recover,
            html: false,
            strip_cdata: true,
            remove_comments: false,
            remove_pis: false,
            max_depth: Some(4),
            blank_policy: None,
            events: EventKinds::all(),
            tags: None,
        }
    }

    fn start(name: &str, attrs: &[(&str, &str)], self_closing: bool) -> Token {
        Token::StartTag {
            name: name.into(),
            attributes: attrs
                .iter()
                .map(|(n, v)| ((*n).to_string(), (*v).to_string()))
                .collect(),
            self_closing,
        }
    }

    fn end(name: &str) -> Token {
        Token::EndTag { name: name.into() }
    }

    fn run(d: &mut Dispatcher<Recorder>, tokens: Vec<Token>) -> Result<(), ParseError> {
        for token in tokens {
            d.dispatch(token, SourceLocation::START)?;
        }
        d.finish(SourceLocation::START)
    }

    #[test]
    fn test_namespace_events_wrap_element() {
        let mut d = Dispatcher::new(Recorder::default(), settings(false));
        run(
            &mut d,
            vec![
                start("p:a", &[("xmlns:p", "urn:p"), ("xmlns", "urn:d")], false),
                start("b", &[], true),
                end("p:a"),
            ],
        )
        .unwrap();
        assert_eq!(
            d.target_mut().close().unwrap(),
            vec![
                "start-ns p=urn:p",
                "start-ns =urn:d",
                "start {urn:p}a",
                "start {urn:d}b",
                "end {urn:d}b",
                "end {urn:p}a",
                "end-ns ",
                "end-ns p",
            ]
        );
        assert_eq!(d.namespaces.depth(), 0);
    }

    #[test]
    fn test_undefined_prefix() {
        let mut strict = Dispatcher::new(Recorder::default(), settings(false));
        let err = run(&mut strict, vec![start("x:a", &[], true)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedNamespace);

        let mut lenient = Dispatcher::new(Recorder::default(), settings(true));
        run(&mut lenient, vec![start("x:a", &[], true)]).unwrap();
        assert_eq!(lenient.take_diagnostics().len(), 1);
    }

    #[test]
    fn test_mismatch_recovery_closes_intervening() {
        let mut d = Dispatcher::new(Recorder::default(), settings(true));
        run(
            &mut d,
            vec![start("a", &[], false), start("b", &[], false), end("a")],
        )
        .unwrap();
        let calls = d.target_mut().close().unwrap();
        assert_eq!(calls[2..].to_vec(), vec!["end b", "end a"]);
        assert_eq!(d.take_diagnostics()[0].kind, ErrorKind::TagNameMismatch);
    }

    #[test]
    fn test_stray_end_tag_dropped() {
        let mut d = Dispatcher::new(Recorder::default(), settings(true));
        run(&mut d, vec![start("a", &[], false), end("zz"), end("a")]).unwrap();
        assert_eq!(d.target_mut().close().unwrap(), vec!["start a", "end a"]);
    }

    #[test]
    fn test_unclosed_at_finish() {
        let mut strict = Dispatcher::new(Recorder::default(), settings(false));
        let err = run(&mut strict, vec![start("a", &[], false)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnclosedTag);

        let mut lenient = Dispatcher::new(Recorder::default(), settings(true));
        run(&mut lenient, vec![start("a", &[], false)]).unwrap();
        assert_eq!(lenient.target_mut().close().unwrap(), vec!["start a", "end a"]);
    }

    #[test]
    fn test_depth_limit() {
        let mut d = Dispatcher::new(Recorder::default(), settings(true));
        let tokens = (0..5).map(|_| start("a", &[], false)).collect();
        let err = run(&mut d, tokens).unwrap_err();
        assert_eq!(err.kind, ErrorKind::LimitExceeded);
    }

    #[test]
    fn test_content_after_root() {
        let mut strict = Dispatcher::new(Recorder::default(), settings(false));
        let err = run(
            &mut strict,
            vec![start("a", &[], true), Token::Text("\n".into()), start("b", &[], true)],
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ContentOutsideRoot);

        let mut lenient = Dispatcher::new(Recorder::default(), settings(true));
        run(
            &mut lenient,
            vec![
                start("a", &[], true),
                start("b", &[], false),
                start("c", &[], true),
                end("b"),
                Token::Text("tail".into()),
            ],
        )
        .unwrap();
        assert_eq!(lenient.target_mut().close().unwrap(), vec!["start a", "end a"]);
    }

    #[test]
    fn test_blank_text_policy() {
        let mut s = settings(false);
        s.blank_policy = Some(Arc::new(super::super::blank::ElementContentHeuristic));
        let mut d = Dispatcher::new(Recorder::default(), s);
        run(
            &mut d,
            vec![
                start("a", &[], false),
                Token::Text("\n  ".into()),
                start("b", &[], false),
                Token::Text(" ".into()),
                end("b"),
                Token::Text("\n".into()),
                end("a"),
            ],
        )
        .unwrap();
        assert_eq!(
            d.target_mut().close().unwrap(),
            vec!["start a", "start b", "data \" \"", "end b", "end a"]
        );
    }

    #[test]
    fn test_html_auto_close_and_lenient_end_tags() {
        let mut s = settings(true);
        s.html = true;
        let mut d = Dispatcher::new(Recorder::default(), s);
        run(
            &mut d,
            vec![
                start("html", &[], false),
                start("p", &[], false),
                start("p", &[], false),
                end("html"),
                start("div", &[], false),
            ],
        )
        .unwrap();
        assert_eq!(
            d.target_mut().close().unwrap(),
            vec![
                "start html",
                "start p",
                "end p",
                "start p",
                "end p",
                "start div",
                "end div",
                "end html",
            ]
        );
        assert!(d.take_diagnostics().is_empty());
    }

    #[test]
    fn test_reserved_prefix_rejected() {
        let mut d = Dispatcher::new(Recorder::default(), settings(false));
        let err = run(&mut d, vec![start("a", &[("xmlns:p", "")], true)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NamespaceDeclaration);
        assert_eq!(check_prefix_declaration("xml", XML_NAMESPACE), None);
        assert!(check_prefix_declaration("xmlns", "urn:x").is_some());
    }
}
