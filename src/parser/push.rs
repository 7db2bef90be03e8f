//! Incremental feed parser.
//!
//! [`FeedParser`] accepts a document in chunks of any size and processes
//! every complete token as soon as it arrives. Events reach the target
//! immediately; the selected ones are also queued for [`read_events`].
//!
//! # Examples
//!
//! ```
//! use xmlfeed::FeedParser;
//!
//! let mut parser = FeedParser::new();
//! parser.feed("<root>").unwrap();
//! parser.feed("<a/></root>").unwrap();
//! let doc = parser.close().unwrap().unwrap();
//! let root = doc.root_element().unwrap();
//! assert_eq!(doc.node_name(root), Some("root"));
//! assert_eq!(doc.children(root).count(), 1);
//! ```
//!
//! [`read_events`]: FeedParser::read_events

use std::fmt;

use tracing::{debug, warn};

use super::dispatch::Dispatcher;
use super::feed::FeedBuffer;
use super::scanner::{Scan, Scanner, Token};
use super::ParseOptions;
use crate::encoding::{DecodeStatus, DetectedEncoding};
use crate::error::{Error, ErrorKind, ErrorLog, ErrorSeverity, ParseDiagnostic, ParseError, Result};
use crate::events::Events;
use crate::target::{Target, TreeBuilder};
use crate::tree::Document;

#[derive(Debug)]
enum State {
    Open,
    /// A fatal error ended the document; it is reported again until reset.
    Failed(Error),
    Closed,
}

/// A push parser fed one chunk at a time.
///
/// The parser owns exactly one [`Target`]. Without a custom target it uses a
/// [`TreeBuilder`] and [`close`](Self::close) returns the finished
/// [`Document`].
///
/// Lifecycle: any number of [`feed`](Self::feed) calls, then exactly one
/// `close`. Feeding a closed parser or closing it twice is an
/// [`Error::InvalidState`]. [`reset`](Self::reset) starts the next document
/// with the same options and target.
pub struct FeedParser<T: Target = TreeBuilder> {
    options: ParseOptions,
    buffer: FeedBuffer,
    scanner: Scanner,
    dispatcher: Dispatcher<T>,
    error_log: ErrorLog,
    state: State,
    target_closed: bool,
}

impl FeedParser<TreeBuilder> {
    /// Creates a tree-building parser with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ParseOptions::default())
    }

    /// Creates a tree-building parser with the given options.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlfeed::{FeedParser, ParseOptions};
    ///
    /// let opts = ParseOptions::default().recover(true);
    /// let mut parser = FeedParser::with_options(opts);
    /// parser.feed("<a><b></a>").unwrap();
    /// let doc = parser.close().unwrap().unwrap();
    /// assert!(doc.root_element().is_some());
    /// assert!(!parser.error_log().is_empty());
    /// ```
    #[must_use]
    pub fn with_options(options: ParseOptions) -> Self {
        let builder = TreeBuilder::new().collect_ids(options.collect_ids);
        Self::with_target(options, builder)
    }

    /// The tree built so far.
    ///
    /// Elements whose end tag has not arrived yet are present but incomplete.
    #[must_use]
    pub fn document(&self) -> &Document {
        self.dispatcher.target().document()
    }

    /// Mutable access to the tree built so far. Elements that are still
    /// being parsed cannot be released through it.
    pub fn document_mut(&mut self) -> &mut Document {
        self.dispatcher.target_mut().document_mut()
    }
}

impl Default for FeedParser<TreeBuilder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Target> FeedParser<T> {
    /// Creates a parser that sends its events to `target`.
    pub fn with_target(options: ParseOptions, target: T) -> Self {
        let scanner = Scanner::new(options.scan_settings());
        let dispatcher = Dispatcher::new(target, options.dispatch_settings());
        Self {
            buffer: FeedBuffer::new(options.encoding.clone()),
            scanner,
            dispatcher,
            error_log: ErrorLog::new(),
            state: State::Open,
            target_closed: false,
            options,
        }
    }

    /// The options this parser was created with.
    #[must_use]
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Feeds a chunk of text.
    ///
    /// Every complete token in the buffered input is processed before this
    /// returns. The chunk may end anywhere, including inside a tag name or
    /// an entity reference.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the parser is closed, or was fed bytes.
    /// - [`Error::Syntax`] on malformed input without recovery. The same
    ///   error is then returned by every later call until [`reset`](Self::reset).
    /// - [`Error::EncodingConflict`] if the XML declaration names an
    ///   encoding a Rust string cannot be in.
    pub fn feed(&mut self, chunk: &str) -> Result<()> {
        self.ensure_open()?;
        self.buffer.push_str(chunk)?;
        self.pump().map_err(|err| self.fail(err))
    }

    /// Feeds a chunk of encoded bytes.
    ///
    /// The encoding is taken from the `encoding` option, a byte order mark,
    /// or the XML declaration, in that order. Bytes of a multi-byte sequence
    /// may be split across chunks.
    ///
    /// # Errors
    ///
    /// As for [`feed`](Self::feed); additionally a conflict between the
    /// override, the byte order mark, and the declaration is fatal, and so
    /// are undecodable bytes unless recovering.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlfeed::FeedParser;
    ///
    /// let mut parser = FeedParser::new();
    /// let bytes = "<r>caf\u{e9}</r>".as_bytes();
    /// parser.feed_bytes(&bytes[..7]).unwrap();
    /// parser.feed_bytes(&bytes[7..]).unwrap();
    /// let doc = parser.close().unwrap().unwrap();
    /// let root = doc.root_element().unwrap();
    /// assert_eq!(doc.text(root), Some("caf\u{e9}"));
    /// ```
    pub fn feed_bytes(&mut self, chunk: &[u8]) -> Result<()> {
        self.ensure_open()?;
        let status = match self.buffer.push_bytes(chunk) {
            Ok(status) => status,
            Err(err @ Error::InvalidState(_)) => return Err(err),
            Err(err) => return Err(self.fail(err)),
        };
        self.ingest(status).map_err(|err| self.fail(err))
    }

    /// Ends the input and finishes the document.
    ///
    /// Returns whatever the target's [`close`](Target::close) returns: the
    /// [`Document`] for a tree-building parser. The parser stays closed
    /// until [`reset`](Self::reset).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the parser is already closed.
    /// - The fatal error that ended the document, if any. The target has
    ///   been closed in that case too.
    pub fn close(&mut self) -> Result<Option<T::Output>> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Closed => Err(Error::invalid_state("parser is already closed")),
            State::Failed(err) => Err(err),
            State::Open => {
                self.buffer.close();
                if let Err(err) = self.finish_input() {
                    let err = self.fail(err);
                    self.state = State::Closed;
                    return Err(err);
                }
                debug!(
                    diagnostics = self.error_log.len(),
                    source = self.options.source_name.as_deref(),
                    "parser closed"
                );
                Ok(self.close_target())
            }
        }
    }

    /// Discards the current document and reopens the parser.
    ///
    /// If the current document was never closed, the target is closed now
    /// and its output dropped.
    pub fn reset(&mut self) {
        drop(self.close_target());
        self.buffer.reset();
        self.scanner.reset();
        self.dispatcher.reset();
        self.error_log.clear();
        self.state = State::Open;
        self.target_closed = false;
        debug!("parser reset");
    }

    /// Returns a handle over the pending pull events.
    ///
    /// Every call hands out a view of the same queue: events taken through
    /// one handle are gone for the next.
    pub fn read_events(&mut self) -> Events<'_, T> {
        let (queue, target) = self.dispatcher.events_parts();
        Events::new(queue, target)
    }

    /// Diagnostics recorded for the current document.
    #[must_use]
    pub fn error_log(&self) -> &ErrorLog {
        &self.error_log
    }

    /// Moves the diagnostics out, leaving the log empty.
    pub fn take_error_log(&mut self) -> ErrorLog {
        std::mem::take(&mut self.error_log)
    }

    /// The target receiving the parse.
    #[must_use]
    pub fn target(&self) -> &T {
        self.dispatcher.target()
    }

    /// Mutable access to the target between feeds.
    pub fn target_mut(&mut self) -> &mut T {
        self.dispatcher.target_mut()
    }

    /// The encoding of the input, once it is known.
    #[must_use]
    pub fn detected_encoding(&self) -> Option<DetectedEncoding> {
        self.buffer.detected()
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Current element nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.dispatcher.depth()
    }

    /// Decoded input waiting for the rest of an incomplete token.
    #[must_use]
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.pending().len()
    }

    fn ensure_open(&self) -> Result<()> {
        match &self.state {
            State::Open => Ok(()),
            State::Failed(err) => Err(err.clone()),
            State::Closed => Err(Error::invalid_state("cannot feed a closed parser")),
        }
    }

    fn finish_input(&mut self) -> Result<()> {
        let status = self.buffer.finish_bytes()?;
        self.ingest(status)?;
        let location = self.scanner.location();
        let finished = self.dispatcher.finish(location);
        self.collect_diagnostics();
        finished?;
        Ok(())
    }

    fn ingest(&mut self, status: DecodeStatus) -> Result<()> {
        if status.had_errors {
            let location = self.scanner.location();
            let message = match self.buffer.detected() {
                Some(detected) => format!("Input is not proper {}", detected.name()),
                None => "Input contains undecodable bytes".to_string(),
            };
            if !self.options.recovers() {
                return Err(ParseError::new(ErrorKind::MalformedBytes, message, location).into());
            }
            let diagnostic = ParseDiagnostic::new(
                ErrorKind::MalformedBytes,
                ErrorSeverity::Warning,
                message,
                location,
            );
            warn!(%diagnostic, "replaced undecodable bytes");
            self.record(diagnostic);
        }
        self.pump()
    }

    /// Scans and dispatches every complete token in the buffer.
    fn pump(&mut self) -> Result<()> {
        let eof = self.buffer.is_closed();
        loop {
            let location = self.scanner.location();
            let scanned = self.scanner.scan(self.buffer.pending(), eof);
            self.collect_diagnostics();
            match scanned? {
                Scan::Token { token, len } => {
                    self.buffer.consume(len);
                    if let Token::Declaration(declaration) = &token {
                        self.check_declared_encoding(declaration.encoding.as_deref())?;
                    }
                    let dispatched = self.dispatcher.dispatch(token, location);
                    self.collect_diagnostics();
                    dispatched?;
                }
                Scan::Skip(len) => self.buffer.consume(len),
                Scan::NeedMore | Scan::Exhausted => break,
            }
        }
        self.buffer.compact();
        Ok(())
    }

    fn check_declared_encoding(&self, declared: Option<&str>) -> Result<()> {
        match (declared, self.buffer.detected()) {
            (Some(declared), Some(detected)) => detected.check_declared(declared),
            _ => Ok(()),
        }
    }

    fn collect_diagnostics(&mut self) {
        let mut found = self.scanner.take_diagnostics();
        found.extend(self.dispatcher.take_diagnostics());
        for diagnostic in found {
            self.record(diagnostic);
        }
    }

    fn record(&mut self, mut diagnostic: ParseDiagnostic) {
        diagnostic.source_name.clone_from(&self.options.source_name);
        self.error_log.push(diagnostic);
    }

    /// Ends the document on a fatal error.
    fn fail(&mut self, err: Error) -> Error {
        let err = match err {
            Error::Syntax(mut parse_error) => {
                self.record(parse_error.to_diagnostic());
                parse_error.diagnostics = self.error_log.iter().cloned().collect();
                Error::Syntax(parse_error)
            }
            other => other,
        };
        debug!(error = %err, "parse failed");
        drop(self.close_target());
        self.state = State::Failed(err.clone());
        err
    }

    fn close_target(&mut self) -> Option<T::Output> {
        if self.target_closed {
            return None;
        }
        self.target_closed = true;
        self.dispatcher.target_mut().close()
    }
}

impl<T: Target> fmt::Debug for FeedParser<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedParser")
            .field("buffered_bytes", &self.buffered_bytes())
            .field("options", &self.options)
            .field("state", &self.state)
            .field("depth", &self.dispatcher.depth())
            .finish_non_exhaustive()
    }
}
