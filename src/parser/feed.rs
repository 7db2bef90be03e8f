//! The feed buffer.
//!
//! Holds decoded text that the scanner has not consumed yet. Text chunks are
//! appended as they are; byte chunks go through a [`StreamDecoder`] first,
//! which may hold back a few bytes (an undecided encoding, a split
//! multi-byte sequence) until the next chunk.

use crate::encoding::{DecodeStatus, DetectedEncoding, StreamDecoder};
use crate::error::{Error, Result};

#[derive(Debug)]
enum Source {
    Unset,
    Text,
    Bytes(StreamDecoder),
}

#[derive(Debug)]
pub(crate) struct FeedBuffer {
    text: String,
    consumed: usize,
    closed: bool,
    /// Text input that opened with U+FEFF.
    text_bom: bool,
    source: Source,
    encoding_override: Option<String>,
}

impl FeedBuffer {
    pub fn new(encoding_override: Option<String>) -> Self {
        Self {
            text: String::new(),
            consumed: 0,
            closed: false,
            text_bom: false,
            source: Source::Unset,
            encoding_override,
        }
    }

    pub fn reset(&mut self) {
        self.text.clear();
        self.consumed = 0;
        self.closed = false;
        self.text_bom = false;
        self.source = Source::Unset;
    }

    pub fn push_str(&mut self, chunk: &str) -> Result<()> {
        match self.source {
            Source::Bytes(_) => {
                return Err(Error::invalid_state(
                    "cannot feed text into a parser that was fed bytes",
                ))
            }
            Source::Unset if chunk.is_empty() => return Ok(()),
            Source::Unset => {
                self.source = Source::Text;
                self.text_bom = chunk.starts_with('\u{FEFF}');
            }
            Source::Text => {}
        }
        self.text.push_str(chunk);
        Ok(())
    }

    pub fn push_bytes(&mut self, chunk: &[u8]) -> Result<DecodeStatus> {
        self.decode(chunk, false)
    }

    /// Flushes bytes held by the decoder at end of input.
    pub fn finish_bytes(&mut self) -> Result<DecodeStatus> {
        if matches!(self.source, Source::Bytes(_)) {
            return self.decode(&[], true);
        }
        Ok(DecodeStatus::default())
    }

    fn decode(&mut self, chunk: &[u8], last: bool) -> Result<DecodeStatus> {
        if matches!(self.source, Source::Unset) {
            self.source = Source::Bytes(StreamDecoder::new(self.encoding_override.as_deref())?);
        }
        match &mut self.source {
            Source::Bytes(decoder) => decoder.decode(chunk, last, &mut self.text),
            _ => Err(Error::invalid_state(
                "cannot feed bytes into a parser that was fed text",
            )),
        }
    }

    /// The encoding in effect, if known yet. Text input is always Unicode.
    pub fn detected(&self) -> Option<DetectedEncoding> {
        match &self.source {
            Source::Unset => None,
            Source::Text => Some(DetectedEncoding::text(self.text_bom)),
            Source::Bytes(decoder) => decoder.detected(),
        }
    }

    pub fn pending(&self) -> &str {
        &self.text[self.consumed..]
    }

    pub fn consume(&mut self, len: usize) {
        self.consumed = (self.consumed + len).min(self.text.len());
    }

    /// Drops consumed text once it outweighs what is left.
    pub fn compact(&mut self) {
        if self.consumed > 0 && self.consumed * 2 >= self.text.len() {
            self.text.drain(..self.consumed);
            self.consumed = 0;
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_consume_and_compact() {
        let mut buf = FeedBuffer::new(None);
        buf.push_str("<a>hello").unwrap();
        buf.consume(3);
        assert_eq!(buf.pending(), "hello");
        buf.compact();
        assert_eq!(buf.pending(), "hello");
        buf.push_str("</a>").unwrap();
        assert_eq!(buf.pending(), "hello</a>");
    }

    #[test]
    fn test_mixing_text_and_bytes_rejected() {
        let mut text = FeedBuffer::new(None);
        text.push_str("<a/>").unwrap();
        assert!(matches!(text.push_bytes(b"<b/>"), Err(Error::InvalidState(_))));

        let mut bytes = FeedBuffer::new(None);
        bytes.push_bytes(b"<a/>").unwrap();
        assert!(matches!(bytes.push_str("<b/>"), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_text_bom_is_reported() {
        let mut buf = FeedBuffer::new(None);
        buf.push_str("").unwrap();
        assert!(buf.detected().is_none());
        buf.push_str("\u{FEFF}<a/>").unwrap();
        let detected = buf.detected().unwrap();
        assert!(detected.check_declared("utf-8").is_ok());
        assert!(matches!(
            detected.check_declared("iso-8859-1"),
            Err(Error::EncodingConflict { .. })
        ));
    }

    #[test]
    fn test_split_multibyte_sequence() {
        let mut buf = FeedBuffer::new(None);
        let bytes = "<a>\u{e9}t\u{e9}</a>".as_bytes();
        buf.push_bytes(&bytes[..4]).unwrap();
        buf.push_bytes(&bytes[4..]).unwrap();
        buf.finish_bytes().unwrap();
        assert_eq!(buf.pending(), "<a>\u{e9}t\u{e9}</a>");
        assert_eq!(buf.detected().unwrap().name(), "UTF-8");
    }

    #[test]
    fn test_override_decodes_latin1() {
        let mut buf = FeedBuffer::new(Some("iso-8859-1".to_string()));
        buf.push_bytes(b"<a>\xe9</a>").unwrap();
        buf.finish_bytes().unwrap();
        assert_eq!(buf.pending(), "<a>\u{e9}</a>");
    }
}
