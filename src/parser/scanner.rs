//! Resumable lexical scanner.
//!
//! The scanner turns the unconsumed part of the feed buffer into lexical
//! tokens, one per call. If the buffer ends inside a construct it answers
//! [`Scan::NeedMore`] and nothing is consumed; the next call sees the same
//! token start with more bytes behind it. Character data is held back until
//! the next `<` (or the end of input), so the token stream is the same
//! however the input was chunked.
//!
//! Rescanning stays linear in the size of the unfinished token. A text run
//! keeps the characters already decoded in a resume record, and searches
//! for a terminator (`-->`, `?>`, a raw-text end tag, the end of an internal
//! subset) remember how far they got. Both are only valid for the current
//! token start and are dropped once a token is produced or skipped.
//!
//! Apart from that, the only state carried between calls is what the
//! grammar needs: whether the document start has been passed (for the XML
//! declaration), whether an HTML raw-text element is open, and the internal
//! entities declared by the doctype.
//!
//! Diagnostics raised while scanning a token are staged in an [`Attempt`]
//! and committed only when the token is produced, so rescanning never
//! records the same problem twice.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::html;
use super::input::{
    is_xml_char, is_xml_whitespace, Cursor, Halt, Position, SearchHint, Step,
};
use crate::error::{ErrorKind, ErrorSeverity, ParseDiagnostic, ParseError, SourceLocation};
use crate::tree::{Doctype, XmlDeclaration};

/// Which markup grammar the scanner accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// Well-formed XML with namespaces.
    #[default]
    Xml,
    /// Lenient HTML: case-folded names, void elements, unquoted and
    /// valueless attributes, raw-text `script`/`style`.
    Html,
}

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Declaration(XmlDeclaration),
    Doctype(Doctype),
    StartTag {
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    Text(String),
    CData(String),
    Comment(String),
    Pi {
        target: String,
        data: Option<String>,
    },
    EntityRef(String),
}

/// The outcome of one scan call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Scan {
    /// A complete token spanning the first `len` bytes of the window.
    Token { token: Token, len: usize },
    /// Malformed input of `len` bytes was dropped (recovery mode).
    Skip(usize),
    /// The window ends inside a token.
    NeedMore,
    /// End of input and nothing left.
    Exhausted,
}

/// Scanner configuration, derived from the parse options.
#[derive(Debug, Clone)]
pub(crate) struct ScanSettings {
    pub dialect: Dialect,
    pub recover: bool,
    pub resolve_entities: bool,
    pub max_name_length: Option<usize>,
    pub max_text_length: Option<usize>,
    pub max_entity_expansions: Option<u32>,
}

/// Diagnostics and counters staged while scanning one token.
#[derive(Debug, Default)]
struct Attempt {
    notes: Vec<(usize, ErrorKind, ErrorSeverity, String)>,
    expansions: u32,
}

impl Attempt {
    fn note(&mut self, offset: usize, kind: ErrorKind, severity: ErrorSeverity, message: impl Into<String>) {
        self.notes.push((offset, kind, severity, message.into()));
    }
}

/// A text run cut short by the end of the window.
///
/// Everything before `pos` has been decoded into `out`, with its
/// diagnostics staged in `attempt`.
#[derive(Debug)]
struct TextResume {
    pos: usize,
    out: String,
    attempt: Attempt,
}

/// The state of a text run at the start of one loop step.
#[derive(Debug, Clone, Copy, Default)]
struct TextMark {
    pos: usize,
    out_len: usize,
    notes: usize,
    expansions: u32,
}

impl TextMark {
    fn at(cur: &Cursor<'_>, out: &str, attempt: &Attempt) -> Self {
        Self {
            pos: cur.pos(),
            out_len: out.len(),
            notes: attempt.notes.len(),
            expansions: attempt.expansions,
        }
    }
}

/// An `<!ENTITY>` declaration from the internal subset.
enum EntityDecl {
    Internal(String, String),
    External(String),
}

#[derive(Debug)]
pub(crate) struct Scanner {
    settings: ScanSettings,
    position: Position,
    at_document_start: bool,
    raw_text: Option<String>,
    entities: HashMap<String, String>,
    external_entities: HashSet<String>,
    expansions: u32,
    diagnostics: Vec<ParseDiagnostic>,
    text_resume: Option<TextResume>,
    search_hints: Vec<SearchHint>,
    raw_searched: usize,
}

impl Scanner {
    pub fn new(settings: ScanSettings) -> Self {
        Self {
            settings,
            position: Position::default(),
            at_document_start: true,
            raw_text: None,
            entities: HashMap::new(),
            external_entities: HashSet::new(),
            expansions: 0,
            diagnostics: Vec::new(),
            text_resume: None,
            search_hints: Vec::new(),
            raw_searched: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.settings.clone());
    }

    /// Location of the first unconsumed byte.
    pub fn location(&self) -> SourceLocation {
        self.position.location()
    }

    /// Drains the diagnostics committed since the last call.
    pub fn take_diagnostics(&mut self) -> Vec<ParseDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn is_html(&self) -> bool {
        self.settings.dialect == Dialect::Html
    }

    /// Scans one token from the start of `input`.
    ///
    /// `eof` says that `input` is all that will ever arrive.
    pub fn scan(&mut self, input: &str, eof: bool) -> Result<Scan, ParseError> {
        if input.is_empty() {
            return Ok(if eof { Scan::Exhausted } else { Scan::NeedMore });
        }
        if self.at_document_start && input.starts_with('\u{FEFF}') {
            let len = '\u{FEFF}'.len_utf8();
            self.position.advance(&input[..len]);
            return Ok(Scan::Skip(len));
        }

        if let Some(tag) = self.raw_text.clone() {
            let needle = format!("</{tag}");
            // Bytes already searched cannot hold a match, except for a
            // needle prefix at the old end of the window.
            let from = self.raw_searched.saturating_sub(needle.len() - 1);
            match find_ascii_ci(input, &needle, from) {
                Some(0) => self.raw_text = None,
                Some(at) => {
                    let token = Token::Text(input[..at].to_string());
                    return Ok(self.commit(input, at, token, Attempt::default()));
                }
                None if eof => {
                    self.raw_text = None;
                    let token = Token::Text(input.to_string());
                    return Ok(self.commit(input, input.len(), token, Attempt::default()));
                }
                None => {
                    self.raw_searched = input.len();
                    return Ok(Scan::NeedMore);
                }
            }
        }

        let mut attempt = Attempt::default();
        let hints = std::mem::take(&mut self.search_hints);
        let mut cur = Cursor::new(input, eof).with_hints(hints);
        let result = if input.starts_with('<') {
            self.text_resume = None;
            self.markup(&mut cur, &mut attempt)
        } else {
            self.text(&mut cur, &mut attempt)
        };
        match result {
            Ok(token) => Ok(self.commit(input, cur.pos(), token, attempt)),
            Err(Halt::NeedMore) => {
                self.search_hints = cur.take_hints();
                Ok(Scan::NeedMore)
            }
            Err(Halt::Malformed {
                offset,
                kind,
                message,
            }) => self.recover_from(input, eof, offset, kind, message),
        }
    }

    fn commit(&mut self, input: &str, len: usize, token: Token, attempt: Attempt) -> Scan {
        for (offset, kind, severity, message) in attempt.notes {
            let location = self.position.locate(input, offset);
            self.diagnostics
                .push(ParseDiagnostic::new(kind, severity, message, location));
        }
        self.expansions += attempt.expansions;
        self.position.advance(&input[..len]);
        self.at_document_start = false;
        self.raw_searched = 0;
        if let Token::StartTag {
            name,
            self_closing: false,
            ..
        } = &token
        {
            if self.is_html() && html::is_raw_text_element(name) {
                self.raw_text = Some(name.clone());
            }
        }
        Scan::Token { token, len }
    }

    fn recover_from(
        &mut self,
        input: &str,
        eof: bool,
        offset: usize,
        kind: ErrorKind,
        message: String,
    ) -> Result<Scan, ParseError> {
        let location = self.position.locate(input, offset);
        if !self.settings.recover || kind == ErrorKind::LimitExceeded {
            return Err(ParseError::new(kind, message, location));
        }
        let Some(skip) = skip_malformed(input, eof) else {
            return Ok(Scan::NeedMore);
        };
        self.diagnostics.push(ParseDiagnostic::new(
            kind,
            ErrorSeverity::Error,
            message,
            location,
        ));
        self.position.advance(&input[..skip]);
        self.at_document_start = false;
        self.raw_searched = 0;
        Ok(Scan::Skip(skip))
    }

    // --- Character data ---

    /// Scans character data, picking up where the previous call ran out of
    /// input.
    fn text(&mut self, cur: &mut Cursor<'_>, attempt: &mut Attempt) -> Step<Token> {
        let mut out = String::new();
        if let Some(resume) = self.text_resume.take() {
            if resume.pos <= cur.rest().len() {
                cur.reset_to(resume.pos);
                out = resume.out;
                *attempt = resume.attempt;
            }
        }
        let mut mark = TextMark::default();
        match self.text_run(cur, &mut out, attempt, &mut mark) {
            Err(Halt::NeedMore) => {
                // Drop the half-read step; it is rescanned next time.
                out.truncate(mark.out_len);
                attempt.notes.truncate(mark.notes);
                attempt.expansions = mark.expansions;
                self.text_resume = Some(TextResume {
                    pos: mark.pos,
                    out,
                    attempt: std::mem::take(attempt),
                });
                Err(Halt::NeedMore)
            }
            result => result,
        }
    }

    fn text_run(
        &self,
        cur: &mut Cursor<'_>,
        out: &mut String,
        attempt: &mut Attempt,
        mark: &mut TextMark,
    ) -> Step<Token> {
        let html = self.is_html();
        loop {
            *mark = TextMark::at(cur, out, attempt);
            let rest = cur.rest();
            let run = rest.find(['<', '&', '\r', ']']).unwrap_or(rest.len());
            if run > 0 {
                let chunk = &rest[..run];
                let base = cur.pos();
                if html {
                    out.push_str(chunk);
                } else {
                    self.push_checked(out, chunk, base, cur, attempt)?;
                }
                cur.advance(run);
                self.check_text_length(out, cur)?;
                continue;
            }
            match cur.peek()? {
                None | Some('<') => break,
                Some('\r') => {
                    cur.bump('\r');
                    cur.eat("\n")?;
                    out.push('\n');
                }
                Some(']') => {
                    if !html && cur.looking_at("]]>")? {
                        let message = "Sequence ']]>' not allowed in content";
                        if !self.settings.recover {
                            return Err(cur.fail(ErrorKind::CData, message));
                        }
                        attempt.note(cur.pos(), ErrorKind::CData, ErrorSeverity::Error, message);
                        out.push_str("]]>");
                        cur.advance(3);
                    } else {
                        out.push(']');
                        cur.bump(']');
                    }
                }
                Some('&') => {
                    if html {
                        out.push_str(&html_reference(cur)?);
                        continue;
                    }
                    if !self.settings.resolve_entities {
                        if let Some(name) = self.unexpanded_entity_ahead(cur)? {
                            if out.is_empty() {
                                cur.advance(name.len() + 2);
                                return Ok(Token::EntityRef(name));
                            }
                            break;
                        }
                    }
                    let value = self.reference(cur, attempt)?;
                    out.push_str(&value);
                }
                Some(c) => {
                    out.push(c);
                    cur.bump(c);
                }
            }
        }
        Ok(Token::Text(std::mem::take(out)))
    }

    /// Appends `chunk`, rejecting (or in recovery mode dropping) characters
    /// outside the XML `Char` production.
    fn push_checked(
        &self,
        out: &mut String,
        chunk: &str,
        base: usize,
        cur: &Cursor<'_>,
        attempt: &mut Attempt,
    ) -> Step<()> {
        let mut start = 0;
        for (i, c) in chunk.char_indices() {
            if is_xml_char(c) {
                continue;
            }
            let message = format!("invalid character U+{:04X}", c as u32);
            if !self.settings.recover {
                return Err(cur.fail_at(base + i, ErrorKind::InvalidChar, message));
            }
            attempt.note(base + i, ErrorKind::InvalidChar, ErrorSeverity::Error, message);
            out.push_str(&chunk[start..i]);
            start = i + c.len_utf8();
        }
        out.push_str(&chunk[start..]);
        Ok(())
    }

    fn check_text_length(&self, text: &str, cur: &Cursor<'_>) -> Step<()> {
        match self.settings.max_text_length {
            Some(max) if text.len() > max => Err(cur.fail(
                ErrorKind::LimitExceeded,
                format!("text length {} exceeds maximum {max}", text.len()),
            )),
            _ => Ok(()),
        }
    }

    /// Normalizes line ends and checks characters of a delimited body
    /// (comment, CDATA, PI data).
    fn body_text(&self, body: &str, base: usize, cur: &Cursor<'_>, attempt: &mut Attempt) -> Step<String> {
        let mut out = String::with_capacity(body.len());
        if self.is_html() {
            out.push_str(body);
        } else {
            self.push_checked(&mut out, body, base, cur, attempt)?;
        }
        if out.contains('\r') {
            out = out.replace("\r\n", "\n").replace('\r', "\n");
        }
        Ok(out)
    }

    // --- References ---

    /// If the cursor is at `&name;` naming a declared internal entity,
    /// returns the name.
    fn unexpanded_entity_ahead(&self, cur: &Cursor<'_>) -> Step<Option<String>> {
        let mut ahead = cur.clone();
        ahead.advance(1);
        if ahead.looking_at("#")? {
            return Ok(None);
        }
        match ahead.parse_name(None) {
            Ok(name) => Ok((ahead.looking_at(";")? && self.entities.contains_key(&name)).then_some(name)),
            Err(Halt::NeedMore) => Err(Halt::NeedMore),
            Err(Halt::Malformed { .. }) => Ok(None),
        }
    }

    /// Parses `&...;` at the cursor and returns its replacement text.
    fn reference(&self, cur: &mut Cursor<'_>, attempt: &mut Attempt) -> Step<String> {
        let start = cur.pos();
        cur.advance(1);
        match self.reference_body(cur, attempt, start) {
            Err(Halt::Malformed {
                offset,
                kind,
                message,
            }) if self.settings.recover && kind != ErrorKind::LimitExceeded => {
                attempt.note(offset, kind, ErrorSeverity::Error, message);
                cur.reset_to(start + 1);
                Ok("&".to_string())
            }
            other => other,
        }
    }

    fn reference_body(&self, cur: &mut Cursor<'_>, attempt: &mut Attempt, start: usize) -> Step<String> {
        if cur.eat("#")? {
            let hex = cur.eat("x")?;
            let digits = cur.take_while(|c| {
                if hex {
                    c.is_ascii_hexdigit()
                } else {
                    c.is_ascii_digit()
                }
            })?;
            if !cur.eat(";")? || digits.is_empty() {
                return Err(cur.fail_at(
                    start,
                    ErrorKind::Reference,
                    "malformed character reference",
                ));
            }
            let body = if hex { format!("x{digits}") } else { digits.to_string() };
            return parse_char_ref(&body).map(String::from).ok_or_else(|| {
                cur.fail_at(
                    start,
                    ErrorKind::Reference,
                    format!("character reference &#{body}; does not refer to a valid XML character"),
                )
            });
        }
        let name = cur.parse_name(self.settings.max_name_length)?;
        if !cur.eat(";")? {
            return Err(cur.fail(
                ErrorKind::Reference,
                format!("entity reference '&{name}' must end with ';'"),
            ));
        }
        let mut stack = Vec::new();
        self.expand_entity(&name, &mut stack, attempt, start)
            .map_err(|(kind, message)| cur.fail_at(start, kind, message))
    }

    /// Resolves a named entity to its fully expanded replacement text.
    fn expand_entity(
        &self,
        name: &str,
        stack: &mut Vec<String>,
        attempt: &mut Attempt,
        at: usize,
    ) -> Result<String, (ErrorKind, String)> {
        if let Some(builtin) = builtin_entity(name) {
            return Ok(builtin.to_string());
        }
        if stack.iter().any(|n| n == name) {
            return Err((
                ErrorKind::Reference,
                format!("entity '{name}' references itself"),
            ));
        }
        if self.external_entities.contains(name) {
            return Err((
                ErrorKind::Reference,
                format!("reference to external entity '{name}' is not supported"),
            ));
        }
        let Some(value) = self.entities.get(name) else {
            let message = format!("Entity '{name}' not defined");
            if self.settings.recover {
                attempt.note(at, ErrorKind::UndeclaredEntity, ErrorSeverity::Error, message);
                return Ok(String::new());
            }
            return Err((ErrorKind::UndeclaredEntity, message));
        };

        attempt.expansions += 1;
        if let Some(max) = self.settings.max_entity_expansions {
            if self.expansions + attempt.expansions > max {
                return Err((
                    ErrorKind::LimitExceeded,
                    format!("entity expansion limit exceeded ({max})"),
                ));
            }
        }

        stack.push(name.to_string());
        let mut out = String::with_capacity(value.len());
        let mut rest = value.as_str();
        while let Some(amp) = rest.find('&') {
            out.push_str(&rest[..amp]);
            let after = &rest[amp + 1..];
            let semi = after.find(';').ok_or_else(|| {
                (
                    ErrorKind::Reference,
                    format!("unterminated reference in entity '{name}'"),
                )
            })?;
            let body = &after[..semi];
            rest = &after[semi + 1..];
            if let Some(num) = body.strip_prefix('#') {
                let c = parse_char_ref(num).ok_or_else(|| {
                    (
                        ErrorKind::Reference,
                        format!("invalid character reference &#{num}; in entity '{name}'"),
                    )
                })?;
                out.push(c);
            } else {
                out.push_str(&self.expand_entity(body, stack, attempt, at)?);
            }
        }
        out.push_str(rest);
        stack.pop();
        Ok(out)
    }

    // --- Markup ---

    fn markup(&mut self, cur: &mut Cursor<'_>, attempt: &mut Attempt) -> Step<Token> {
        let html = self.is_html();
        if cur.looking_at("<!--")? {
            return self.comment(cur, attempt);
        }
        if !html && cur.looking_at("<![CDATA[")? {
            return self.cdata(cur, attempt);
        }
        let doctype = if html {
            cur.looking_at_ci("<!DOCTYPE")?
        } else {
            cur.looking_at("<!DOCTYPE")?
        };
        if doctype {
            return self.doctype(cur);
        }
        if cur.looking_at("<!")? || (html && cur.looking_at("<?")?) {
            if html {
                return bogus_comment(cur, attempt);
            }
            return Err(cur.fail(ErrorKind::Doctype, "invalid markup declaration"));
        }
        if cur.looking_at("<?")? {
            return self.processing_instruction(cur, attempt);
        }
        if cur.looking_at("</")? {
            return self.end_tag(cur);
        }

        let mut ahead = cur.clone();
        ahead.advance(1);
        let next = ahead.require("start tag")?;
        let starts_name = if html {
            next.is_ascii_alphabetic()
        } else {
            super::input::is_name_start_char(next)
        };
        if starts_name {
            return self.start_tag(cur, attempt);
        }
        if html {
            cur.advance(1);
            return Ok(Token::Text("<".to_string()));
        }
        Err(ahead.fail(ErrorKind::InvalidName, "StartTag: invalid element name"))
    }

    fn comment(&self, cur: &mut Cursor<'_>, attempt: &mut Attempt) -> Step<Token> {
        cur.advance("<!--".len());
        let base = cur.pos();
        let body = cur.take_until("-->", ErrorKind::Comment, "comment")?;
        if !self.is_html() {
            let bad = body.find("--").or_else(|| body.ends_with('-').then(|| body.len() - 1));
            if let Some(at) = bad {
                let message = "Double hyphen within comment";
                if !self.settings.recover {
                    return Err(cur.fail_at(base + at, ErrorKind::Comment, message));
                }
                attempt.note(base + at, ErrorKind::Comment, ErrorSeverity::Error, message);
            }
        }
        Ok(Token::Comment(self.body_text(body, base, cur, attempt)?))
    }

    fn cdata(&self, cur: &mut Cursor<'_>, attempt: &mut Attempt) -> Step<Token> {
        cur.advance("<![CDATA[".len());
        let base = cur.pos();
        let body = cur.take_until("]]>", ErrorKind::CData, "CDATA section")?;
        let text = self.body_text(body, base, cur, attempt)?;
        self.check_text_length(&text, cur)?;
        Ok(Token::CData(text))
    }

    fn processing_instruction(&self, cur: &mut Cursor<'_>, attempt: &mut Attempt) -> Step<Token> {
        let start = cur.pos();
        cur.advance(2);
        let target = cur.parse_name(self.settings.max_name_length)?;
        if target.eq_ignore_ascii_case("xml") {
            if target == "xml" && self.at_document_start {
                cur.reset_to(start);
                return xml_declaration(cur);
            }
            let message = if target == "xml" {
                "XML declaration allowed only at the start of the document"
            } else {
                "processing instruction target 'xml' is reserved"
            };
            return Err(cur.fail_at(start, ErrorKind::ProcessingInstruction, message));
        }
        if target.contains(':') {
            return Err(cur.fail_at(
                start,
                ErrorKind::ProcessingInstruction,
                "colons are forbidden from PI names",
            ));
        }
        let data = if cur.skip_whitespace()? {
            let base = cur.pos();
            let body = cur.take_until("?>", ErrorKind::ProcessingInstruction, "processing instruction")?;
            let body = self.body_text(body, base, cur, attempt)?;
            (!body.is_empty()).then_some(body)
        } else {
            cur.expect("?>", ErrorKind::ProcessingInstruction)?;
            None
        };
        Ok(Token::Pi { target, data })
    }

    fn doctype(&mut self, cur: &mut Cursor<'_>) -> Step<Token> {
        let html = self.is_html();
        cur.advance("<!DOCTYPE".len());
        if !cur.skip_whitespace()? {
            return Err(cur.fail(ErrorKind::Doctype, "space required after '<!DOCTYPE'"));
        }
        let name = if html {
            cur.take_while(|c| !is_xml_whitespace(c) && c != '>' && c != '[')?
                .to_string()
        } else {
            cur.parse_name(self.settings.max_name_length)?
        };
        if name.is_empty() {
            return Err(cur.fail(ErrorKind::Doctype, "DOCTYPE name expected"));
        }
        cur.skip_whitespace()?;

        let (public_id, system_id) = if keyword_ahead(cur, "PUBLIC", html)? {
            cur.advance("PUBLIC".len());
            cur.skip_whitespace()?;
            let public = quoted_literal(cur, ErrorKind::Doctype)?;
            cur.skip_whitespace()?;
            let system = match cur.peek()? {
                Some('"' | '\'') => Some(quoted_literal(cur, ErrorKind::Doctype)?),
                _ if html => None,
                _ => return Err(cur.fail(ErrorKind::Doctype, "system literal expected after public id")),
            };
            (Some(public), system)
        } else if keyword_ahead(cur, "SYSTEM", html)? {
            cur.advance("SYSTEM".len());
            cur.skip_whitespace()?;
            (None, Some(quoted_literal(cur, ErrorKind::Doctype)?))
        } else {
            (None, None)
        };
        cur.skip_whitespace()?;

        let internal_subset = if cur.eat("[")? {
            let start = cur.pos();
            let end = internal_subset_end(cur)?;
            Some(cur.slice(start, end).to_string())
        } else {
            None
        };
        cur.skip_whitespace()?;
        if html {
            cur.take_until(">", ErrorKind::Doctype, "DOCTYPE")?;
        } else {
            cur.expect(">", ErrorKind::Doctype)?;
        }

        if let Some(subset) = &internal_subset {
            self.declare_entities(subset);
        }
        Ok(Token::Doctype(Doctype {
            name,
            public_id,
            system_id,
            internal_subset,
        }))
    }

    /// Records the general entities of an internal subset. The first
    /// declaration of a name wins; parameter entities are ignored.
    fn declare_entities(&mut self, subset: &str) {
        let mut rest = subset;
        while let Some(at) = rest.find("<!ENTITY") {
            let mut cur = Cursor::new(&rest[at + "<!ENTITY".len()..], true);
            let parsed = entity_declaration(&mut cur);
            rest = cur.rest();
            match parsed {
                Ok(Some(EntityDecl::Internal(name, value))) => {
                    if !self.external_entities.contains(&name) {
                        self.entities.entry(name).or_insert(value);
                    }
                }
                Ok(Some(EntityDecl::External(name))) => {
                    if !self.entities.contains_key(&name) {
                        self.external_entities.insert(name);
                    }
                }
                Ok(None) | Err(_) => {}
            }
        }
        debug!(
            internal = self.entities.len(),
            external = self.external_entities.len(),
            "declared entities"
        );
    }

    fn end_tag(&self, cur: &mut Cursor<'_>) -> Step<Token> {
        cur.advance(2);
        if self.is_html() {
            let name = cur.take_while(|c| !is_xml_whitespace(c) && c != '>' && c != '/')?;
            let name = name.to_ascii_lowercase();
            cur.take_until(">", ErrorKind::HtmlTag, "end tag")?;
            return Ok(Token::EndTag { name });
        }
        let name = cur.parse_name(self.settings.max_name_length)?;
        cur.skip_whitespace()?;
        cur.expect(">", ErrorKind::InvalidName)?;
        Ok(Token::EndTag { name })
    }

    fn start_tag(&self, cur: &mut Cursor<'_>, attempt: &mut Attempt) -> Step<Token> {
        let html = self.is_html();
        let recover = self.settings.recover;
        cur.advance(1);
        let name = if html {
            html_name(cur)?.to_ascii_lowercase()
        } else {
            cur.parse_name(self.settings.max_name_length)?
        };

        let mut attributes: Vec<(String, String)> = Vec::new();
        let self_closing = loop {
            let had_ws = cur.skip_whitespace()?;
            if cur.eat("/>")? {
                break true;
            }
            if cur.eat(">")? {
                break false;
            }
            let at = cur.pos();
            let next = cur.require("start tag")?;
            if html {
                if next == '/' || html_name(&mut cur.clone())?.is_empty() {
                    cur.bump(next);
                    continue;
                }
            } else if !had_ws {
                let message = "attributes construct error";
                if !recover {
                    return Err(cur.fail(ErrorKind::AttributeSyntax, message));
                }
                attempt.note(at, ErrorKind::AttributeSyntax, ErrorSeverity::Error, message);
            }

            let attr_name = if html {
                html_name(cur)?.to_ascii_lowercase()
            } else {
                cur.parse_name(self.settings.max_name_length)?
            };
            cur.skip_whitespace()?;
            let value = if cur.eat("=")? {
                cur.skip_whitespace()?;
                match cur.require("attribute value")? {
                    q @ ('"' | '\'') => self.attribute_value(cur, q, attempt)?,
                    _ => {
                        let message = "AttValue: \" or ' expected";
                        if !html {
                            if !recover {
                                return Err(cur.fail(ErrorKind::AttributeSyntax, message));
                            }
                            attempt.note(cur.pos(), ErrorKind::AttributeSyntax, ErrorSeverity::Error, message);
                        }
                        cur.take_while(|c| !is_xml_whitespace(c) && c != '>')?
                            .to_string()
                    }
                }
            } else if html {
                String::new()
            } else {
                let message = format!("Specification mandates value for attribute {attr_name}");
                if !recover {
                    return Err(cur.fail(ErrorKind::AttributeSyntax, message));
                }
                attempt.note(cur.pos(), ErrorKind::AttributeSyntax, ErrorSeverity::Error, message);
                String::new()
            };

            if attributes.iter().any(|(n, _)| *n == attr_name) {
                if html {
                    continue;
                }
                let message = format!("Attribute {attr_name} redefined");
                if !recover {
                    return Err(cur.fail_at(at, ErrorKind::AttributeRedefined, message));
                }
                attempt.note(at, ErrorKind::AttributeRedefined, ErrorSeverity::Error, message);
                continue;
            }
            attributes.push((attr_name, value));
        };

        let self_closing = self_closing || (html && html::is_void_element(&name));
        Ok(Token::StartTag {
            name,
            attributes,
            self_closing,
        })
    }

    fn attribute_value(&self, cur: &mut Cursor<'_>, quote: char, attempt: &mut Attempt) -> Step<String> {
        let html = self.is_html();
        cur.bump(quote);
        let mut out = String::new();
        loop {
            let c = cur.require("attribute value")?;
            match c {
                _ if c == quote => {
                    cur.bump(c);
                    return Ok(out);
                }
                '&' if html => out.push_str(&html_reference(cur)?),
                '&' => out.push_str(&self.reference(cur, attempt)?),
                '<' if !html => {
                    let message = "Unescaped '<' not allowed in attribute values";
                    if !self.settings.recover {
                        return Err(cur.fail(ErrorKind::AttributeSyntax, message));
                    }
                    attempt.note(cur.pos(), ErrorKind::AttributeSyntax, ErrorSeverity::Error, message);
                    out.push(c);
                    cur.bump(c);
                }
                '\t' | '\n' if !html => {
                    out.push(' ');
                    cur.bump(c);
                }
                '\r' if !html => {
                    cur.bump(c);
                    cur.eat("\n")?;
                    out.push(' ');
                }
                _ => {
                    if !html && !is_xml_char(c) {
                        let message = format!("invalid character U+{:04X}", c as u32);
                        if !self.settings.recover {
                            return Err(cur.fail(ErrorKind::InvalidChar, message));
                        }
                        attempt.note(cur.pos(), ErrorKind::InvalidChar, ErrorSeverity::Error, message);
                    } else {
                        out.push(c);
                    }
                    cur.bump(c);
                }
            }
        }
    }
}

/// Parses an XML declaration (`<?xml version="1.0" ...?>`).
///
/// See XML 1.0 §2.8 production `[23]`.
fn xml_declaration(cur: &mut Cursor<'_>) -> Step<Token> {
    const KIND: ErrorKind = ErrorKind::XmlDeclaration;
    cur.expect("<?xml", KIND)?;
    if !cur.skip_whitespace()? {
        return Err(cur.fail(KIND, "whitespace required after '<?xml'"));
    }

    cur.expect("version", KIND)?;
    equals(cur)?;
    let version = quoted_literal(cur, KIND)?;
    if !is_valid_version_num(&version) {
        return Err(cur.fail(KIND, format!("invalid version number: '{version}'")));
    }

    let had_ws = cur.skip_whitespace()?;
    let encoding = if cur.looking_at("encoding")? {
        if !had_ws {
            return Err(cur.fail(KIND, "whitespace required before encoding"));
        }
        cur.advance("encoding".len());
        equals(cur)?;
        let enc = quoted_literal(cur, KIND)?;
        if !is_valid_encoding_name(&enc) {
            return Err(cur.fail(KIND, format!("invalid encoding name: '{enc}'")));
        }
        Some(enc)
    } else {
        None
    };

    let had_ws = cur.skip_whitespace()? || (encoding.is_none() && had_ws);
    let standalone = if cur.looking_at("standalone")? {
        if !had_ws {
            return Err(cur.fail(KIND, "whitespace required before standalone"));
        }
        cur.advance("standalone".len());
        equals(cur)?;
        match quoted_literal(cur, KIND)?.as_str() {
            "yes" => Some(true),
            "no" => Some(false),
            _ => return Err(cur.fail(KIND, "standalone must be 'yes' or 'no'")),
        }
    } else {
        None
    };

    cur.skip_whitespace()?;
    cur.expect("?>", KIND)?;
    Ok(Token::Declaration(XmlDeclaration {
        version,
        encoding,
        standalone,
    }))
}

fn keyword_ahead(cur: &Cursor<'_>, word: &str, ignore_case: bool) -> Step<bool> {
    if ignore_case {
        cur.looking_at_ci(word)
    } else {
        cur.looking_at(word)
    }
}

fn equals(cur: &mut Cursor<'_>) -> Step<()> {
    cur.skip_whitespace()?;
    cur.expect("=", ErrorKind::XmlDeclaration)?;
    cur.skip_whitespace()?;
    Ok(())
}

fn quoted_literal(cur: &mut Cursor<'_>, kind: ErrorKind) -> Step<String> {
    let quote = cur.require("literal")?;
    let terminator = match quote {
        '"' => "\"",
        '\'' => "'",
        _ => return Err(cur.fail(kind, "quoted literal expected")),
    };
    cur.bump(quote);
    Ok(cur.take_until(terminator, kind, "literal")?.to_string())
}

/// Finds the `]` closing an internal subset, skipping quoted literals and
/// comments. Consumes through the `]` and returns its offset.
fn internal_subset_end(cur: &mut Cursor<'_>) -> Step<usize> {
    const KEY: &str = "internal subset";
    let start = cur.pos();
    if let Some(resume) = cur.resume_point(KEY, start) {
        cur.reset_to(resume);
    }
    loop {
        let mark = cur.pos();
        match internal_subset_step(cur) {
            Ok(Some(end)) => return Ok(end),
            Ok(None) => {}
            Err(Halt::NeedMore) => {
                cur.remember(KEY, start, mark);
                return Err(Halt::NeedMore);
            }
            Err(malformed) => return Err(malformed),
        }
    }
}

/// One character, literal or comment of an internal subset; `Some` at the
/// closing `]`.
fn internal_subset_step(cur: &mut Cursor<'_>) -> Step<Option<usize>> {
    let c = cur.require("internal subset")?;
    match c {
        ']' => {
            let end = cur.pos();
            cur.bump(c);
            return Ok(Some(end));
        }
        '"' | '\'' => {
            cur.bump(c);
            let terminator = if c == '"' { "\"" } else { "'" };
            cur.take_until(terminator, ErrorKind::Doctype, "literal in internal subset")?;
        }
        '<' if cur.looking_at("<!--")? => {
            cur.advance(4);
            cur.take_until("-->", ErrorKind::Doctype, "comment in internal subset")?;
        }
        _ => cur.bump(c),
    }
    Ok(None)
}

fn entity_declaration(cur: &mut Cursor<'_>) -> Step<Option<EntityDecl>> {
    if !cur.skip_whitespace()? || cur.eat("%")? {
        return Ok(None);
    }
    let name = cur.parse_name(None)?;
    cur.skip_whitespace()?;
    match cur.peek()? {
        Some('"' | '\'') => {
            let value = quoted_literal(cur, ErrorKind::Doctype)?;
            Ok(Some(EntityDecl::Internal(name, value)))
        }
        _ => Ok(Some(EntityDecl::External(name))),
    }
}

/// Skips an HTML `<!...>` or `<?...>` construct, surfacing it as a comment.
fn bogus_comment(cur: &mut Cursor<'_>, attempt: &mut Attempt) -> Step<Token> {
    let start = cur.pos();
    cur.advance(2);
    let body = cur.take_until(">", ErrorKind::HtmlTag, "markup declaration")?;
    attempt.note(start, ErrorKind::HtmlTag, ErrorSeverity::Warning, "unexpected markup treated as a comment");
    Ok(Token::Comment(body.trim_end_matches('?').to_string()))
}

fn html_name<'a>(cur: &mut Cursor<'a>) -> Step<&'a str> {
    cur.take_while(|c| !is_xml_whitespace(c) && !matches!(c, '>' | '/' | '=' | '"' | '\'' | '<'))
}

/// Lenient HTML reference: unknown or malformed references stay literal.
fn html_reference(cur: &mut Cursor<'_>) -> Step<String> {
    let start = cur.pos();
    cur.advance(1);
    if cur.eat("#")? {
        let hex = cur.eat("x")? || cur.eat("X")?;
        let digits = cur.take_while(|c| {
            if hex {
                c.is_ascii_hexdigit()
            } else {
                c.is_ascii_digit()
            }
        })?;
        if !digits.is_empty() && cur.eat(";")? {
            let value = u32::from_str_radix(digits, if hex { 16 } else { 10 })
                .ok()
                .and_then(char::from_u32)
                .filter(|&c| c != '\0');
            if let Some(c) = value {
                return Ok(c.to_string());
            }
        }
        cur.reset_to(start + 1);
        return Ok("&".to_string());
    }
    let name = cur.take_while(|c| c.is_ascii_alphanumeric())?;
    if !name.is_empty() {
        if cur.eat(";")? {
            return Ok(html::lookup_entity(name)
                .map_or_else(|| format!("&{name};"), str::to_string));
        }
        if let Some(value) = html::lookup_entity(name) {
            return Ok(value.to_string());
        }
    }
    cur.reset_to(start + 1);
    Ok("&".to_string())
}

fn builtin_entity(name: &str) -> Option<&'static str> {
    match name {
        "amp" => Some("&"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => None,
    }
}

/// Parses the body of a character reference (`x41` or `65`).
fn parse_char_ref(body: &str) -> Option<char> {
    let (digits, radix) = match body.strip_prefix('x') {
        Some(hex) => (hex, 16),
        None => (body, 10),
    };
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, radix)
        .ok()
        .and_then(char::from_u32)
        .filter(|&c| is_xml_char(c))
}

/// Validates an XML version number per XML 1.0 §2.8.
///
/// `VersionNum ::= '1.' [0-9]+`
fn is_valid_version_num(s: &str) -> bool {
    s.strip_prefix("1.")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Validates an encoding name per XML 1.0 §4.3.3.
///
/// `EncName ::= [A-Za-z] ([A-Za-z0-9._] | '-')*`
fn is_valid_encoding_name(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.first().is_some_and(u8::is_ascii_alphabetic)
        && bytes[1..]
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-')
}

/// How many bytes of a malformed construct to drop: through its `>`, or up
/// to the next `<`, whichever comes first. `None` means the end of the
/// construct has not arrived yet.
fn skip_malformed(input: &str, eof: bool) -> Option<usize> {
    let first = input.chars().next().map_or(1, char::len_utf8);
    match input[first..].find(['<', '>']) {
        Some(at) => {
            let at = first + at;
            Some(if input.as_bytes()[at] == b'>' { at + 1 } else { at })
        }
        None if eof => Some(input.len()),
        None => None,
    }
}

/// Finds an ASCII `needle` in `haystack`, ignoring case, looking only at
/// matches that begin at or after byte `from`.
fn find_ascii_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .get(from..)?
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|at| from + at)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings(dialect: Dialect, recover: bool) -> ScanSettings {
        ScanSettings {
            dialect,
            recover,
            resolve_entities: true,
            max_name_length: Some(50_000),
            max_text_length: Some(1024),
            max_entity_expansions: Some(100),
        }
    }

    /// Scans a complete input, returning every token.
    fn tokens_with(settings: ScanSettings, input: &str) -> Result<Vec<Token>, ParseError> {
        let mut scanner = Scanner::new(settings);
        let mut rest = input;
        let mut out = Vec::new();
        loop {
            match scanner.scan(rest, true)? {
                Scan::Token { token, len } => {
                    out.push(token);
                    rest = &rest[len..];
                }
                Scan::Skip(len) => rest = &rest[len..],
                Scan::Exhausted => return Ok(out),
                Scan::NeedMore => panic!("need more at end of input"),
            }
        }
    }

    fn tokens(input: &str) -> Vec<Token> {
        tokens_with(settings(Dialect::Xml, false), input).unwrap()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            tokens("<a x='1'>hi<b/></a>"),
            vec![
                Token::StartTag {
                    name: "a".into(),
                    attributes: vec![("x".into(), "1".into())],
                    self_closing: false,
                },
                Token::Text("hi".into()),
                Token::StartTag {
                    name: "b".into(),
                    attributes: vec![],
                    self_closing: true,
                },
                Token::EndTag { name: "a".into() },
            ]
        );
    }

    #[test]
    fn test_text_held_until_markup() {
        let mut scanner = Scanner::new(settings(Dialect::Xml, false));
        assert_eq!(scanner.scan("hello wor", false).unwrap(), Scan::NeedMore);
        assert_eq!(
            scanner.scan("hello world<", false).unwrap(),
            Scan::Token {
                token: Token::Text("hello world".into()),
                len: 11
            }
        );
    }

    #[test]
    fn test_partial_tag_needs_more() {
        let mut scanner = Scanner::new(settings(Dialect::Xml, false));
        assert_eq!(scanner.scan("<elem attr=\"va", false).unwrap(), Scan::NeedMore);
        assert_eq!(scanner.scan("<!-", false).unwrap(), Scan::NeedMore);
        assert_eq!(scanner.scan("<![CDA", false).unwrap(), Scan::NeedMore);
    }

    #[test]
    fn test_references_and_newlines() {
        assert_eq!(
            tokens("<a>x &amp; &#x41;&#66;\r\ny</a>")[1],
            Token::Text("x & AB\ny".into())
        );
    }

    #[test]
    fn test_attribute_normalization() {
        let toks = tokens("<a v=\"a\tb\nc &lt;\"/>");
        let Token::StartTag { attributes, .. } = &toks[0] else {
            panic!("expected start tag");
        };
        assert_eq!(attributes[0].1, "a b c <");
    }

    #[test]
    fn test_declaration_only_at_start() {
        let toks = tokens("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?><r/>");
        assert_eq!(
            toks[0],
            Token::Declaration(XmlDeclaration {
                version: "1.0".into(),
                encoding: Some("UTF-8".into()),
                standalone: Some(true),
            })
        );
        let err = tokens_with(settings(Dialect::Xml, false), " <?xml version=\"1.0\"?><r/>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProcessingInstruction);
    }

    #[test]
    fn test_internal_entities() {
        let input = "<!DOCTYPE r [<!ENTITY who \"W&inner;\"><!ENTITY inner \"orld\">]><r>Hello &who;</r>";
        let toks = tokens(input);
        assert!(matches!(&toks[0], Token::Doctype(d) if d.name == "r"));
        assert_eq!(toks[2], Token::Text("Hello World".into()));
    }

    #[test]
    fn test_unexpanded_entity_reference() {
        let mut s = settings(Dialect::Xml, false);
        s.resolve_entities = false;
        let toks = tokens_with(s, "<!DOCTYPE r [<!ENTITY e \"x\">]><r>a&e;b&amp;</r>").unwrap();
        assert_eq!(
            toks[2..5].to_vec(),
            vec![
                Token::Text("a".into()),
                Token::EntityRef("e".into()),
                Token::Text("b&".into()),
            ]
        );
    }

    #[test]
    fn test_recursive_entity_rejected() {
        let input = "<!DOCTYPE r [<!ENTITY a \"&b;\"><!ENTITY b \"&a;\">]><r>&a;</r>";
        let err = tokens_with(settings(Dialect::Xml, false), input).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Reference);
    }

    #[test]
    fn test_undeclared_entity_recovered() {
        let mut scanner = Scanner::new(settings(Dialect::Xml, true));
        let scan = scanner.scan("&nope;<", false).unwrap();
        assert_eq!(
            scan,
            Scan::Token {
                token: Token::Text(String::new()),
                len: 6
            }
        );
        let diags = scanner.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, ErrorKind::UndeclaredEntity);
    }

    #[test]
    fn test_diagnostics_not_duplicated_on_rescan() {
        let mut scanner = Scanner::new(settings(Dialect::Xml, true));
        assert_eq!(scanner.scan("<a x=1 y", false).unwrap(), Scan::NeedMore);
        assert!(scanner.take_diagnostics().is_empty());
        assert!(matches!(
            scanner.scan("<a x=1 y='2'>", false).unwrap(),
            Scan::Token { .. }
        ));
        assert_eq!(scanner.take_diagnostics().len(), 1);
    }

    #[test]
    fn test_recovery_skips_broken_markup() {
        let toks = tokens_with(settings(Dialect::Xml, true), "<r><1 x='y'>z</r>").unwrap();
        assert_eq!(
            toks,
            vec![
                Token::StartTag {
                    name: "r".into(),
                    attributes: vec![],
                    self_closing: false
                },
                Token::Text("z".into()),
                Token::EndTag { name: "r".into() },
            ]
        );
    }

    #[test]
    fn test_strict_errors_carry_location() {
        let err = tokens_with(settings(Dialect::Xml, false), "<r>\n  <a b></a></r>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::AttributeSyntax);
        assert_eq!(err.location.line, 2);
    }

    #[test]
    fn test_comment_rules() {
        assert_eq!(tokens("<!-- hi -->")[0], Token::Comment(" hi ".into()));
        let err = tokens_with(settings(Dialect::Xml, false), "<!-- a -- b -->").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Comment);
    }

    #[test]
    fn test_text_length_limit() {
        let big = format!("<r>{}</r>", "x".repeat(2000));
        let err = tokens_with(settings(Dialect::Xml, true), &big).unwrap_err();
        assert_eq!(err.kind, ErrorKind::LimitExceeded);
    }

    #[test]
    fn test_html_dialect() {
        let toks = tokens_with(
            settings(Dialect::Html, true),
            "<!doctype html><P Class=x disabled>a &copy; b<BR><script>if (a < b) {}</script>",
        )
        .unwrap();
        assert!(matches!(&toks[0], Token::Doctype(d) if d.name == "html"));
        assert_eq!(
            toks[1],
            Token::StartTag {
                name: "p".into(),
                attributes: vec![("class".into(), "x".into()), ("disabled".into(), String::new())],
                self_closing: false,
            }
        );
        assert_eq!(toks[2], Token::Text("a \u{A9} b".into()));
        assert!(matches!(&toks[3], Token::StartTag { name, self_closing: true, .. } if name == "br"));
        assert_eq!(toks[5], Token::Text("if (a < b) {}".into()));
        assert_eq!(toks[6], Token::EndTag { name: "script".into() });
    }

    #[test]
    fn test_long_text_run_resumes_where_it_stopped() {
        let mut scanner = Scanner::new(ScanSettings {
            max_text_length: None,
            ..settings(Dialect::Xml, false)
        });
        let chunk = "x".repeat(512);
        let mut input = String::new();
        for _ in 0..2048 {
            input.push_str(&chunk);
            assert_eq!(scanner.scan(&input, false).unwrap(), Scan::NeedMore);
            // The next call starts reading at the first new byte.
            let resume = scanner.text_resume.as_ref().unwrap();
            assert_eq!(resume.pos, input.len());
            assert_eq!(resume.out.len(), input.len());
        }
        input.push('<');
        let Scan::Token {
            token: Token::Text(text),
            len,
        } = scanner.scan(&input, false).unwrap()
        else {
            panic!("expected text");
        };
        assert_eq!(len, 1 << 20);
        assert_eq!(text.len(), 1 << 20);
        assert!(scanner.text_resume.is_none());
    }

    #[test]
    fn test_resumed_text_splits_inside_references() {
        let mut scanner = Scanner::new(settings(Dialect::Xml, false));
        assert_eq!(scanner.scan("a&am", false).unwrap(), Scan::NeedMore);
        assert_eq!(scanner.text_resume.as_ref().unwrap().pos, 1);
        assert_eq!(scanner.scan("a&amp;b\r", false).unwrap(), Scan::NeedMore);
        assert_eq!(scanner.text_resume.as_ref().unwrap().out, "a&b");
        assert_eq!(
            scanner.scan("a&amp;b\r\nc<", false).unwrap(),
            Scan::Token {
                token: Token::Text("a&b\nc".into()),
                len: 10
            }
        );
    }

    #[test]
    fn test_resumed_text_reports_each_problem_once() {
        let mut scanner = Scanner::new(settings(Dialect::Xml, true));
        assert_eq!(scanner.scan("a\u{1}b", false).unwrap(), Scan::NeedMore);
        assert_eq!(scanner.scan("a\u{1}bc", false).unwrap(), Scan::NeedMore);
        assert!(scanner.take_diagnostics().is_empty());
        assert_eq!(
            scanner.scan("a\u{1}bcd<", false).unwrap(),
            Scan::Token {
                token: Token::Text("abcd".into()),
                len: 5
            }
        );
        let diags = scanner.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, ErrorKind::InvalidChar);
    }

    #[test]
    fn test_unfinished_comment_search_resumes() {
        let mut scanner = Scanner::new(settings(Dialect::Xml, false));
        assert_eq!(scanner.scan("<!-- long comment -", false).unwrap(), Scan::NeedMore);
        assert_eq!(scanner.search_hints.len(), 1);
        assert_eq!(
            scanner.scan("<!-- long comment -->", false).unwrap(),
            Scan::Token {
                token: Token::Comment(" long comment ".into()),
                len: 21
            }
        );
        assert!(scanner.search_hints.is_empty());
    }

    #[test]
    fn test_raw_text_search_resumes() {
        let mut scanner = Scanner::new(settings(Dialect::Html, true));
        assert!(matches!(
            scanner.scan("<script>", false).unwrap(),
            Scan::Token { len: 8, .. }
        ));
        assert_eq!(scanner.scan("if (a) {} </scr", false).unwrap(), Scan::NeedMore);
        assert_eq!(scanner.raw_searched, 15);
        assert_eq!(
            scanner.scan("if (a) {} </script>", false).unwrap(),
            Scan::Token {
                token: Token::Text("if (a) {} ".into()),
                len: 10
            }
        );
        assert_eq!(scanner.raw_searched, 0);
    }

    #[test]
    fn test_doctype_fed_byte_by_byte() {
        let doctype = "<!DOCTYPE r [<!ENTITY e \"a ] b\"><!-- ] --><!ENTITY f 'x'>]>";
        let mut scanner = Scanner::new(settings(Dialect::Xml, false));
        for end in 1..doctype.len() {
            assert_eq!(
                scanner.scan(&doctype[..end], false).unwrap(),
                Scan::NeedMore,
                "cut at {end}"
            );
        }
        let Scan::Token {
            token: Token::Doctype(d),
            len,
        } = scanner.scan(doctype, false).unwrap()
        else {
            panic!("expected doctype");
        };
        assert_eq!(len, doctype.len());
        assert_eq!(
            d.internal_subset.as_deref(),
            Some("<!ENTITY e \"a ] b\"><!-- ] --><!ENTITY f 'x'>")
        );
        assert_eq!(scanner.entities.get("e").map(String::as_str), Some("a ] b"));
        assert_eq!(scanner.entities.get("f").map(String::as_str), Some("x"));
    }

    #[test]
    fn test_skip_malformed_extent() {
        assert_eq!(skip_malformed("<a b>rest", false), Some(5));
        assert_eq!(skip_malformed("<a <b>", false), Some(3));
        assert_eq!(skip_malformed("<a b", false), None);
        assert_eq!(skip_malformed("<a b", true), Some(4));
    }
}
