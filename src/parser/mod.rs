//! Incremental XML/HTML parsing.
//!
//! Input flows through four stages. The feed buffer decodes and accumulates
//! chunks; the scanner turns the buffered text into lexical tokens, resuming
//! wherever the previous chunk ended; the dispatcher maintains the
//! open-element and namespace stacks and calls the [`Target`]; selected
//! events are queued for [`FeedParser::read_events`].
//!
//! [`parse_str`], [`parse_bytes`] and [`parse_with_target`] run the same
//! pipeline over a complete document.

pub mod blank;
mod dispatch;
mod feed;
mod html;
pub(crate) mod input;
pub(crate) mod namespace;
pub mod push;
mod scanner;

pub use blank::{BlankContext, BlankTextPolicy, ElementContentHeuristic};
pub use push::FeedParser;
pub use scanner::Dialect;

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::events::{EventKinds, TagSelector};
use crate::target::Target;
use crate::tree::Document;

use dispatch::DispatchSettings;
use input::{
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_ENTITY_EXPANSIONS, DEFAULT_MAX_NAME_LENGTH,
    DEFAULT_MAX_TEXT_LENGTH,
};
use scanner::ScanSettings;

/// Parse options controlling parser behavior and security limits.
///
/// Use the builder pattern to configure options:
///
/// ```
/// use xmlfeed::events::EventKinds;
/// use xmlfeed::parser::ParseOptions;
///
/// let opts = ParseOptions::default()
///     .recover(true)
///     .remove_blank_text(true)
///     .events(EventKinds::START | EventKinds::END)
///     .max_depth(128);
/// assert!(opts.recover);
/// ```
#[derive(Clone)]
pub struct ParseOptions {
    /// If true, log malformed input and keep going instead of failing.
    pub recover: bool,
    /// Expand entities declared in the internal subset. When false they
    /// reach the target as entity references.
    pub resolve_entities: bool,
    /// Deliver CDATA sections as plain text. When false the text is
    /// flagged as CDATA.
    pub strip_cdata: bool,
    /// Drop comments before they reach the target.
    pub remove_comments: bool,
    /// Drop processing instructions before they reach the target.
    pub remove_pis: bool,
    /// Drop whitespace-only text the blank-text policy calls ignorable.
    pub remove_blank_text: bool,
    /// Index `id` and `xml:id` attributes while building the tree.
    pub collect_ids: bool,
    /// Lift the depth, text and name limits.
    pub huge_tree: bool,
    /// Decode byte input with this encoding, ignoring the declaration.
    pub encoding: Option<String>,
    /// Event types queued for [`FeedParser::read_events`] (default: `end`).
    pub events: EventKinds,
    /// Restrict queued `start`/`end` events to matching tags.
    pub tag: Option<TagSelector>,
    /// Markup grammar.
    pub dialect: Dialect,
    /// Name of the input (file name, URL), copied into every log record.
    pub source_name: Option<String>,

    // -- Security limits --
    /// Maximum element nesting depth (default: 256).
    pub max_depth: usize,
    /// Maximum length in bytes of a single text run (default: 10 MB).
    pub max_text_length: usize,
    /// Maximum length in bytes of an element or attribute name (default: 50,000).
    pub max_name_length: usize,
    /// Maximum number of entity expansions per document (default: 10,000).
    pub max_entity_expansions: u32,
    /// Classifies whitespace-only text for `remove_blank_text`.
    pub blank_text_policy: Arc<dyn BlankTextPolicy>,
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("recover", &self.recover)
            .field("resolve_entities", &self.resolve_entities)
            .field("strip_cdata", &self.strip_cdata)
            .field("remove_comments", &self.remove_comments)
            .field("remove_pis", &self.remove_pis)
            .field("remove_blank_text", &self.remove_blank_text)
            .field("collect_ids", &self.collect_ids)
            .field("huge_tree", &self.huge_tree)
            .field("encoding", &self.encoding)
            .field("events", &self.events)
            .field("tag", &self.tag)
            .field("dialect", &self.dialect)
            .field("source_name", &self.source_name)
            .field("max_depth", &self.max_depth)
            .field("max_text_length", &self.max_text_length)
            .field("max_name_length", &self.max_name_length)
            .field("max_entity_expansions", &self.max_entity_expansions)
            .field("blank_text_policy", &self.blank_text_policy)
            .finish()
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            recover: false,
            resolve_entities: true,
            strip_cdata: true,
            remove_comments: false,
            remove_pis: false,
            remove_blank_text: false,
            collect_ids: true,
            huge_tree: false,
            encoding: None,
            events: EventKinds::default(),
            tag: None,
            dialect: Dialect::Xml,
            source_name: None,
            max_depth: DEFAULT_MAX_DEPTH,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            max_entity_expansions: DEFAULT_MAX_ENTITY_EXPANSIONS,
            blank_text_policy: Arc::new(ElementContentHeuristic),
        }
    }
}

impl ParseOptions {
    /// Options for the lenient HTML dialect, which always recovers.
    ///
    /// ```
    /// use xmlfeed::parser::{parse_str, ParseOptions};
    ///
    /// let doc = parse_str("<p>one<p>two<br></p>", &ParseOptions::html()).unwrap();
    /// assert!(doc.root_element().is_some());
    /// ```
    #[must_use]
    pub fn html() -> Self {
        Self {
            recover: true,
            dialect: Dialect::Html,
            ..Self::default()
        }
    }

    /// Enables or disables error recovery mode.
    #[must_use]
    pub fn recover(mut self, yes: bool) -> Self {
        self.recover = yes;
        self
    }

    #[must_use]
    pub fn resolve_entities(mut self, yes: bool) -> Self {
        self.resolve_entities = yes;
        self
    }

    #[must_use]
    pub fn strip_cdata(mut self, yes: bool) -> Self {
        self.strip_cdata = yes;
        self
    }

    #[must_use]
    pub fn remove_comments(mut self, yes: bool) -> Self {
        self.remove_comments = yes;
        self
    }

    #[must_use]
    pub fn remove_pis(mut self, yes: bool) -> Self {
        self.remove_pis = yes;
        self
    }

    /// Enables or disables stripping of ignorable blank text.
    #[must_use]
    pub fn remove_blank_text(mut self, yes: bool) -> Self {
        self.remove_blank_text = yes;
        self
    }

    #[must_use]
    pub fn collect_ids(mut self, yes: bool) -> Self {
        self.collect_ids = yes;
        self
    }

    /// Lifts the depth, text and name limits. Entity expansions stay capped.
    #[must_use]
    pub fn huge_tree(mut self, yes: bool) -> Self {
        self.huge_tree = yes;
        self
    }

    /// Forces the encoding of byte input.
    #[must_use]
    pub fn encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }

    /// Sets which event types are queued.
    #[must_use]
    pub fn events(mut self, kinds: EventKinds) -> Self {
        self.events = kinds;
        self
    }

    /// Restricts queued `start`/`end` events to tags matching `selector`.
    #[must_use]
    pub fn tag(mut self, selector: impl Into<TagSelector>) -> Self {
        self.tag = Some(selector.into());
        self
    }

    #[must_use]
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    /// Sets the maximum text run length in bytes.
    #[must_use]
    pub fn max_text_length(mut self, max: usize) -> Self {
        self.max_text_length = max;
        self
    }

    /// Sets the maximum element/attribute name length in bytes.
    #[must_use]
    pub fn max_name_length(mut self, max: usize) -> Self {
        self.max_name_length = max;
        self
    }

    /// Sets the maximum number of entity expansions.
    #[must_use]
    pub fn max_entity_expansions(mut self, max: u32) -> Self {
        self.max_entity_expansions = max;
        self
    }

    /// Replaces the policy used by `remove_blank_text`.
    #[must_use]
    pub fn blank_text_policy(mut self, policy: impl BlankTextPolicy + 'static) -> Self {
        self.blank_text_policy = Arc::new(policy);
        self
    }

    /// Whether malformed input is logged rather than fatal.
    pub(crate) fn recovers(&self) -> bool {
        self.recover || self.dialect == Dialect::Html
    }

    fn limit<N>(&self, value: N) -> Option<N> {
        (!self.huge_tree).then_some(value)
    }

    pub(crate) fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            dialect: self.dialect,
            recover: self.recovers(),
            resolve_entities: self.resolve_entities,
            max_name_length: self.limit(self.max_name_length),
            max_text_length: self.limit(self.max_text_length),
            max_entity_expansions: Some(self.max_entity_expansions),
        }
    }

    pub(crate) fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            recover: self.recovers(),
            html: self.dialect == Dialect::Html,
            strip_cdata: self.strip_cdata,
            remove_comments: self.remove_comments,
            remove_pis: self.remove_pis,
            max_depth: self.limit(self.max_depth),
            blank_policy: self
                .remove_blank_text
                .then(|| Arc::clone(&self.blank_text_policy)),
            events: self.events,
            tags: self.tag.clone(),
        }
    }
}

/// Parses a complete document held in a string.
///
/// The diagnostics end up in [`Document::error_log`].
///
/// # Errors
///
/// Returns [`Error::Syntax`] if the input is malformed and `recover` is off,
/// or [`Error::EncodingConflict`] if it declares a multi-byte encoding.
///
/// # Examples
///
/// ```
/// use xmlfeed::parser::{parse_str, ParseOptions};
///
/// let doc = parse_str("<a><b/>tail</a>", &ParseOptions::default()).unwrap();
/// let b = doc.first_child(doc.root_element().unwrap()).unwrap();
/// assert_eq!(doc.tail(b), Some("tail"));
/// ```
pub fn parse_str(input: &str, options: &ParseOptions) -> Result<Document> {
    let mut parser = FeedParser::with_options(options.clone());
    parser.feed(input)?;
    into_document(parser)
}

/// Parses a complete document held in bytes, detecting its encoding.
///
/// # Errors
///
/// As for [`parse_str`], plus decoding failures.
pub fn parse_bytes(input: &[u8], options: &ParseOptions) -> Result<Document> {
    let mut parser = FeedParser::with_options(options.clone());
    parser.feed_bytes(input)?;
    let detected = parser.detected_encoding();
    let mut doc = into_document(parser)?;
    if doc.encoding.is_none() {
        doc.encoding = detected.map(|d| d.name().to_string());
    }
    Ok(doc)
}

/// Parses a complete document into a custom target and returns what its
/// `close` produced.
///
/// # Errors
///
/// As for [`parse_str`]. The target has been closed either way.
pub fn parse_with_target<T: Target>(
    input: &str,
    options: &ParseOptions,
    target: T,
) -> Result<Option<T::Output>> {
    let mut parser = FeedParser::with_target(options.clone(), target);
    parser.feed(input)?;
    parser.close()
}

fn into_document(mut parser: FeedParser) -> Result<Document> {
    let mut doc = parser
        .close()?
        .ok_or_else(|| Error::invalid_state("tree builder produced no document"))?;
    doc.error_log = parser.take_error_log();
    Ok(doc)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_huge_tree_lifts_limits() {
        let opts = ParseOptions::default().max_depth(2);
        assert_eq!(opts.dispatch_settings().max_depth, Some(2));
        let huge = opts.huge_tree(true);
        assert_eq!(huge.dispatch_settings().max_depth, None);
        assert_eq!(huge.scan_settings().max_name_length, None);
        assert_eq!(huge.scan_settings().max_entity_expansions, Some(10_000));
    }

    #[test]
    fn test_html_always_recovers() {
        let opts = ParseOptions::default().dialect(Dialect::Html);
        assert!(!opts.recover);
        assert!(opts.scan_settings().recover);
        assert!(opts.dispatch_settings().html);
    }

    #[test]
    fn test_blank_policy_only_when_requested() {
        assert!(ParseOptions::default().dispatch_settings().blank_policy.is_none());
        let opts = ParseOptions::default().remove_blank_text(true);
        assert!(opts.dispatch_settings().blank_policy.is_some());
    }

    #[test]
    fn test_parse_str_moves_log_to_document() {
        let opts = ParseOptions::default().recover(true);
        let doc = parse_str("<a><b></a>", &opts).unwrap();
        assert!(!doc.error_log.is_empty());
        let clean = parse_str("<a/>", &ParseOptions::default()).unwrap();
        assert!(clean.error_log.is_empty());
    }

    #[test]
    fn test_parse_error_carries_diagnostics() {
        let err = parse_str("<a>&bogus;</a>", &ParseOptions::default()).unwrap_err();
        let syntax = err.as_syntax().unwrap();
        assert_eq!(syntax.kind, ErrorKind::UndeclaredEntity);
        assert_eq!(syntax.diagnostics.last().unwrap().kind, ErrorKind::UndeclaredEntity);
    }

    #[test]
    fn test_parse_bytes_records_detected_encoding() {
        let doc = parse_bytes(b"<a>\xc3\xa9</a>", &ParseOptions::default()).unwrap();
        assert_eq!(doc.encoding.as_deref(), Some("UTF-8"));
        let declared = parse_bytes(
            b"<?xml version='1.0' encoding='ISO-8859-1'?><a>\xe9</a>",
            &ParseOptions::default(),
        )
        .unwrap();
        let root = declared.root_element().unwrap();
        assert_eq!(declared.text(root), Some("\u{e9}"));
        assert_eq!(declared.encoding.as_deref(), Some("ISO-8859-1"));
    }

    #[test]
    fn test_debug_hides_nothing_important() {
        let debug = format!("{:?}", ParseOptions::default().source_name("in.xml"));
        assert!(debug.contains("recover: false"));
        assert!(debug.contains("in.xml"));
    }
}
