//! Low-level input primitives shared by the scanner dialects.
//!
//! [`Cursor`] walks a window of the feed buffer. Every primitive answers in
//! three ways: a value, [`Halt::NeedMore`] when the window ends before the
//! construct does and more input may still arrive, or [`Halt::Malformed`]
//! when the input is wrong no matter what follows. That split is what lets
//! the scanner stop anywhere and resume on the next chunk from the start of
//! the unfinished token.
//!
//! # Security
//!
//! The limits below guard against denial-of-service inputs. All of them are
//! lifted by `huge_tree`.
//!
//! No external entity loading is performed (immune to XXE).

use crate::error::{ErrorKind, SourceLocation};

// -------------------------------------------------------------------------
// Security defaults
// -------------------------------------------------------------------------

/// Default maximum element nesting depth.
pub(crate) const DEFAULT_MAX_DEPTH: usize = 256;

/// Default maximum length (in bytes) of a text run.
pub(crate) const DEFAULT_MAX_TEXT_LENGTH: usize = 10 * 1024 * 1024; // 10 MB

/// Default maximum length (in bytes) of an element or attribute name.
pub(crate) const DEFAULT_MAX_NAME_LENGTH: usize = 50_000;

/// Default maximum number of entity expansions per document.
pub(crate) const DEFAULT_MAX_ENTITY_EXPANSIONS: u32 = 10_000;

// -------------------------------------------------------------------------
// XML Name character classes (XML 1.0 §2.3)
// -------------------------------------------------------------------------

/// Returns `true` if `c` is a valid `Char` per XML 1.0 §2.2 `[2]`.
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x0001_0000..=0x0010_FFFF
    )
}

/// Returns `true` if `c` is a valid `NameStartChar` per XML 1.0 §2.3 `[4]`.
pub(crate) fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z' |
        '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}' |
        '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' |
        '\u{200C}'..='\u{200D}' | '\u{2070}'..='\u{218F}' |
        '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}' |
        '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' |
        '\u{10000}'..='\u{EFFFF}'
    )
}

/// Returns `true` if `c` is a valid `NameChar` per XML 1.0 §2.3 [4a].
pub(crate) fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' |
            '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}'
        )
}

/// XML whitespace (`S` production): space, tab, CR, LF.
pub(crate) fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Whether `text` consists only of XML whitespace.
pub(crate) fn is_blank(text: &str) -> bool {
    text.chars().all(is_xml_whitespace)
}

/// Validates that a name is a legal `QName` per Namespaces in XML 1.0 §4.
///
/// Returns an error message if invalid, or `None` if valid.
pub(crate) fn validate_qname(name: &str) -> Option<&'static str> {
    let colon_count = name.chars().filter(|&c| c == ':').count();
    if colon_count > 1 {
        return Some("QName contains multiple colons");
    }
    if colon_count == 1 && (name.starts_with(':') || name.ends_with(':')) {
        return Some("QName has empty prefix or local part");
    }
    None
}

// -------------------------------------------------------------------------
// Resumable cursor
// -------------------------------------------------------------------------

/// Why a scan step stopped without producing a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Halt {
    /// The window ended inside a construct; retry with more input.
    NeedMore,
    /// The input is malformed at `offset` (relative to the window start).
    Malformed {
        offset: usize,
        kind: ErrorKind,
        message: String,
    },
}

pub(crate) type Step<T> = Result<T, Halt>;

/// How far an unfinished search got before the window ended.
///
/// A search is identified by its `key` and the offset it started from.
/// When the same token is rescanned with a longer window, the search picks
/// up at `resume` instead of walking the bytes it has already seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SearchHint {
    key: &'static str,
    start: usize,
    resume: usize,
}

/// A position inside the unconsumed part of the feed buffer.
#[derive(Debug, Clone)]
pub(crate) struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    eof: bool,
    hints: Vec<SearchHint>,
    halted: Vec<SearchHint>,
}

impl<'a> Cursor<'a> {
    /// `eof` says whether `src` is everything that will ever arrive.
    pub fn new(src: &'a str, eof: bool) -> Self {
        Self {
            src,
            pos: 0,
            eof,
            hints: Vec::new(),
            halted: Vec::new(),
        }
    }

    /// Starts from the hints left by an earlier scan of the same window.
    pub fn with_hints(mut self, hints: Vec<SearchHint>) -> Self {
        self.hints = hints;
        self
    }

    /// The hints recorded by searches that ran out of input.
    pub fn take_hints(&mut self) -> Vec<SearchHint> {
        std::mem::take(&mut self.halted)
    }

    /// Where the search `key` begun at `start` may pick up.
    pub fn resume_point(&self, key: &'static str, start: usize) -> Option<usize> {
        self.hints
            .iter()
            .find(|h| h.key == key && h.start == start)
            .map(|h| h.resume)
            .filter(|&resume| resume >= start && resume <= self.src.len())
    }

    /// Records that the search `key` begun at `start` has nothing to find
    /// before `resume`.
    pub fn remember(&mut self, key: &'static str, start: usize, resume: usize) {
        self.halted.push(SearchHint { key, start, resume });
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.src[start..end]
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn fail(&self, kind: ErrorKind, message: impl Into<String>) -> Halt {
        self.fail_at(self.pos, kind, message)
    }

    pub fn fail_at(&self, offset: usize, kind: ErrorKind, message: impl Into<String>) -> Halt {
        Halt::Malformed {
            offset,
            kind,
            message: message.into(),
        }
    }

    /// The next character; `None` only at the true end of input.
    pub fn peek(&self) -> Step<Option<char>> {
        match self.rest().chars().next() {
            Some(c) => Ok(Some(c)),
            None if self.eof => Ok(None),
            None => Err(Halt::NeedMore),
        }
    }

    /// The next character, which must exist.
    pub fn require(&self, context: &str) -> Step<char> {
        self.peek()?.ok_or_else(|| {
            self.fail(
                ErrorKind::UnexpectedEof,
                format!("unexpected end of input in {context}"),
            )
        })
    }

    pub fn bump(&mut self, c: char) {
        self.pos += c.len_utf8();
    }

    pub fn advance(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.src.len());
    }

    /// Backtracks to an earlier position.
    pub fn reset_to(&mut self, pos: usize) {
        self.pos = pos.min(self.src.len());
    }

    /// Whether the input continues with `s`. Needs more input while the
    /// window is a proper prefix of `s`.
    pub fn looking_at(&self, s: &str) -> Step<bool> {
        let rest = self.rest();
        if rest.len() >= s.len() {
            return Ok(rest.starts_with(s));
        }
        if !self.eof && s.starts_with(rest) {
            return Err(Halt::NeedMore);
        }
        Ok(false)
    }

    /// ASCII case-insensitive [`looking_at`](Self::looking_at).
    pub fn looking_at_ci(&self, s: &str) -> Step<bool> {
        let rest = self.rest().as_bytes();
        let want = s.as_bytes();
        if rest.len() >= want.len() {
            return Ok(rest[..want.len()].eq_ignore_ascii_case(want));
        }
        if !self.eof && want[..rest.len()].eq_ignore_ascii_case(rest) {
            return Err(Halt::NeedMore);
        }
        Ok(false)
    }

    /// Consumes `s` if the input continues with it.
    pub fn eat(&mut self, s: &str) -> Step<bool> {
        let found = self.looking_at(s)?;
        if found {
            self.pos += s.len();
        }
        Ok(found)
    }

    pub fn expect(&mut self, s: &str, kind: ErrorKind) -> Step<()> {
        if self.eat(s)? {
            return Ok(());
        }
        match self.peek()? {
            Some(c) => Err(self.fail(kind, format!("expected '{s}', found '{c}'"))),
            None => Err(self.fail(
                ErrorKind::UnexpectedEof,
                format!("expected '{s}', found end of input"),
            )),
        }
    }

    /// Skips XML whitespace, returning whether any was skipped.
    pub fn skip_whitespace(&mut self) -> Step<bool> {
        let start = self.pos;
        while let Some(c) = self.peek()? {
            if !is_xml_whitespace(c) {
                break;
            }
            self.bump(c);
        }
        Ok(self.pos > start)
    }

    /// Consumes everything up to and including `terminator`, returning the
    /// text before it.
    ///
    /// A search that runs out of input remembers how far it got, so a
    /// rescan over a longer window only looks at the new bytes.
    pub fn take_until(&mut self, terminator: &'static str, kind: ErrorKind, context: &str) -> Step<&'a str> {
        let start = self.pos;
        let from = self.resume_point(terminator, start).unwrap_or(start);
        match self.src[from..].find(terminator) {
            Some(at) => {
                let end = from + at;
                self.pos = end + terminator.len();
                Ok(&self.src[start..end])
            }
            None if self.eof => Err(self.fail(kind, format!("unterminated {context}"))),
            None => {
                // The terminator may straddle the end of the window.
                let overlap = self.src.len().saturating_sub(terminator.len() - 1).max(start);
                self.remember(terminator, start, floor_char_boundary(self.src, overlap));
                Err(Halt::NeedMore)
            }
        }
    }

    /// Consumes characters while `pred` holds.
    pub fn take_while(&mut self, pred: impl Fn(char) -> bool) -> Step<&'a str> {
        let start = self.pos;
        while let Some(c) = self.peek()? {
            if !pred(c) {
                break;
            }
            self.bump(c);
        }
        Ok(&self.src[start..self.pos])
    }

    /// Parses an XML `Name`.
    pub fn parse_name(&mut self, max_len: Option<usize>) -> Step<String> {
        let start = self.pos;
        let first = self.require("name")?;
        if !is_name_start_char(first) {
            return Err(self.fail(
                ErrorKind::InvalidName,
                format!("invalid name start character '{first}'"),
            ));
        }
        self.bump(first);
        self.take_while(is_name_char)?;
        let name = &self.src[start..self.pos];
        if let Some(max) = max_len {
            if name.len() > max {
                return Err(self.fail_at(
                    start,
                    ErrorKind::LimitExceeded,
                    format!("name length {} exceeds maximum {max}", name.len()),
                ));
            }
        }
        Ok(name.to_string())
    }
}

/// The largest char boundary of `s` at or before `at`.
fn floor_char_boundary(s: &str, mut at: usize) -> usize {
    at = at.min(s.len());
    while !s.is_char_boundary(at) {
        at -= 1;
    }
    at
}

// -------------------------------------------------------------------------
// Location tracking
// -------------------------------------------------------------------------

/// Line/column bookkeeping for the consumed part of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Position {
    line: u32,
    column: u32,
    offset: usize,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            line: 1,
            column: 1,
            offset: 0,
        }
    }
}

impl Position {
    pub fn location(self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            byte_offset: self.offset,
        }
    }

    /// Moves past `consumed`.
    pub fn advance(&mut self, consumed: &str) {
        for c in consumed.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset += consumed.len();
    }

    /// The location `offset` bytes into `window`, which starts here.
    pub fn locate(self, window: &str, offset: usize) -> SourceLocation {
        let mut at = self;
        at.advance(&window[..offset.min(window.len())]);
        at.location()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_char_classes() {
        assert!(is_xml_char('\t'));
        assert!(!is_xml_char('\u{1}'));
        assert!(is_name_start_char('_'));
        assert!(!is_name_start_char('-'));
        assert!(is_name_char('-'));
        assert!(is_blank(" \r\n\t"));
        assert!(!is_blank(" x "));
    }

    #[test]
    fn test_validate_qname() {
        assert_eq!(validate_qname("a:b"), None);
        assert!(validate_qname("a:b:c").is_some());
        assert!(validate_qname(":b").is_some());
    }

    #[test]
    fn test_looking_at_needs_more_on_prefix() {
        let cur = Cursor::new("<!-", false);
        assert_eq!(cur.looking_at("<!--"), Err(Halt::NeedMore));
        assert_eq!(cur.looking_at("<?"), Ok(false));
        let at_end = Cursor::new("<!-", true);
        assert_eq!(at_end.looking_at("<!--"), Ok(false));
    }

    #[test]
    fn test_looking_at_ci() {
        let cur = Cursor::new("<!doctype html>", false);
        assert_eq!(cur.looking_at_ci("<!DOCTYPE"), Ok(true));
        let short = Cursor::new("<!DOC", false);
        assert_eq!(short.looking_at_ci("<!doctype"), Err(Halt::NeedMore));
    }

    #[test]
    fn test_parse_name_waits_for_delimiter() {
        let mut cur = Cursor::new("elem", false);
        assert_eq!(cur.parse_name(None), Err(Halt::NeedMore));
        let mut cur = Cursor::new("elem>", false);
        assert_eq!(cur.parse_name(None).unwrap(), "elem");
        assert_eq!(cur.rest(), ">");
    }

    #[test]
    fn test_parse_name_length_limit() {
        let mut cur = Cursor::new("abcdef ", false);
        assert!(matches!(
            cur.parse_name(Some(3)),
            Err(Halt::Malformed {
                kind: ErrorKind::LimitExceeded,
                ..
            })
        ));
    }

    #[test]
    fn test_take_until() {
        let mut cur = Cursor::new(" a comment -->rest", false);
        assert_eq!(
            cur.take_until("-->", ErrorKind::Comment, "comment").unwrap(),
            " a comment "
        );
        assert_eq!(cur.rest(), "rest");
        let mut open = Cursor::new(" never closed", false);
        assert_eq!(
            open.take_until("-->", ErrorKind::Comment, "comment"),
            Err(Halt::NeedMore)
        );
    }

    #[test]
    fn test_take_until_resumes_after_searched_bytes() {
        let mut first = Cursor::new("abc--", false);
        first.advance(1);
        assert_eq!(
            first.take_until("-->", ErrorKind::Comment, "comment"),
            Err(Halt::NeedMore)
        );
        let hints = first.take_hints();
        // The two trailing bytes may begin the terminator.
        assert_eq!(hints, vec![SearchHint { key: "-->", start: 1, resume: 3 }]);

        let mut second = Cursor::new("abc-->rest", false).with_hints(hints);
        second.advance(1);
        assert_eq!(
            second.take_until("-->", ErrorKind::Comment, "comment").unwrap(),
            "bc"
        );
        assert_eq!(second.rest(), "rest");
        assert!(second.take_hints().is_empty());
    }

    #[test]
    fn test_hints_ignored_for_other_searches() {
        let hint = SearchHint { key: "-->", start: 0, resume: 4 };
        let cur = Cursor::new("ab-->", false).with_hints(vec![hint]);
        assert_eq!(cur.resume_point("-->", 0), Some(4));
        assert_eq!(cur.resume_point("-->", 1), None);
        assert_eq!(cur.resume_point("?>", 0), None);
        let short = Cursor::new("ab", false).with_hints(vec![hint]);
        assert_eq!(short.resume_point("-->", 0), None);
    }

    #[test]
    fn test_floor_char_boundary() {
        let s = "a\u{e9}b";
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(floor_char_boundary(s, 3), 3);
        assert_eq!(floor_char_boundary(s, 99), s.len());
    }

    #[test]
    fn test_position_tracking() {
        let mut pos = Position::default();
        pos.advance("<a>\n  <b>");
        let loc = pos.location();
        assert_eq!((loc.line, loc.column, loc.byte_offset), (2, 6, 9));
        let next = pos.locate("x\ny", 2);
        assert_eq!((next.line, next.column), (3, 1));
    }
}
