//! Encoding detection and incremental decoding of byte feeds.
//!
//! Implements BOM sniffing and XML declaration encoding detection per
//! XML 1.0 Section 4.3.3 and Appendix F, bridging to `encoding_rs` for the
//! actual conversion. Unlike a whole-document decode, [`StreamDecoder`] works
//! on arbitrary chunks: it holds bytes back until it can decide on an
//! encoding, then streams through an `encoding_rs::Decoder`, which carries
//! multi-byte sequences split across chunk boundaries.
//!
//! # Encoding Detection Strategy
//!
//! 1. A Byte Order Mark wins. An explicit override that contradicts it is an
//!    [`Error::EncodingConflict`].
//! 2. Otherwise an explicit override (from
//!    [`ParseOptions::encoding`](crate::parser::ParseOptions::encoding)) is used.
//! 3. Otherwise the `encoding=` pseudo-attribute of the XML declaration,
//!    read from the raw bytes as ASCII.
//! 4. Otherwise BOM-less UTF-16 is recognized from the `<?` pattern.
//! 5. Otherwise UTF-8.

use encoding_rs::{CoderResult, Decoder, Encoding, UTF_16BE, UTF_16LE, UTF_8};

use crate::error::{Error, ErrorKind, ParseError, SourceLocation};

/// Bytes to inspect for an XML declaration before giving up on finding one.
const DECLARATION_SCAN_LIMIT: usize = 512;

/// How the encoding of the current input was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingOrigin {
    /// The input was fed as text, so it was never encoded.
    Text,
    /// A byte order mark at the start of the input.
    ByteOrderMark,
    /// The caller's explicit override.
    Override,
    /// The XML declaration's `encoding` pseudo-attribute.
    Declaration,
    /// Nothing said otherwise, or the `<?` byte pattern of BOM-less UTF-16.
    Sniffed,
}

/// The encoding chosen for a document and where the choice came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedEncoding {
    /// The encoding used for decoding.
    pub encoding: &'static Encoding,
    /// Why it was chosen.
    pub origin: EncodingOrigin,
}

impl DetectedEncoding {
    /// The detection result for text fed as a Rust string.
    #[must_use]
    pub fn text(with_bom: bool) -> Self {
        Self {
            encoding: UTF_8,
            origin: if with_bom {
                EncodingOrigin::ByteOrderMark
            } else {
                EncodingOrigin::Text
            },
        }
    }

    /// The canonical name of the encoding.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Checks a declared encoding against how the input arrived.
    ///
    /// Text input cannot honour a declaration of a non-ASCII-compatible
    /// encoding. A byte order mark must agree with the declaration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EncodingConflict`] if the declaration contradicts the
    /// input.
    pub fn check_declared(&self, declared: &str) -> Result<(), Error> {
        let conflict = || Error::EncodingConflict {
            actual: match self.origin {
                EncodingOrigin::Text => "a Unicode string".to_string(),
                _ => format!("{} (byte order mark)", self.name()),
            },
            declared: declared.to_string(),
        };
        match self.origin {
            EncodingOrigin::Text => {
                if is_multibyte_label(declared) {
                    return Err(conflict());
                }
                Ok(())
            }
            EncodingOrigin::ByteOrderMark => match Encoding::for_label(declared.trim().as_bytes()) {
                Some(enc) if same_family(enc, self.encoding) => Ok(()),
                _ => Err(conflict()),
            },
            EncodingOrigin::Override | EncodingOrigin::Declaration | EncodingOrigin::Sniffed => {
                Ok(())
            }
        }
    }
}

/// Detects the encoding of an XML byte stream by inspecting the Byte Order Mark.
///
/// Returns the encoding and the number of BOM bytes to skip, or `None` when
/// the input starts without a BOM.
///
/// # Examples
///
/// ```
/// use xmlfeed::encoding::detect_bom;
///
/// let (enc, skip) = detect_bom(b"\xEF\xBB\xBFhello").unwrap();
/// assert_eq!(enc.name(), "UTF-8");
/// assert_eq!(skip, 3);
///
/// assert!(detect_bom(b"<root/>").is_none());
/// ```
#[must_use]
pub fn detect_bom(bytes: &[u8]) -> Option<(&'static Encoding, usize)> {
    Encoding::for_bom(bytes)
}

/// Resolves an encoding label the way XML declarations spell them.
///
/// # Errors
///
/// Returns a [`ParseError`] of kind [`ErrorKind::UnsupportedEncoding`] when
/// `encoding_rs` does not know the label.
pub fn lookup(label: &str) -> Result<&'static Encoding, ParseError> {
    let label = label.trim();
    // encoding_rs maps "UTF-16" to the little-endian form; keep that.
    Encoding::for_label(label.as_bytes()).ok_or_else(|| {
        ParseError::new(
            ErrorKind::UnsupportedEncoding,
            format!("unsupported encoding: {label}"),
            SourceLocation::START,
        )
    })
}

/// Incremental decoder for byte feeds.
#[derive(Debug)]
pub struct StreamDecoder {
    override_label: Option<String>,
    state: DecoderState,
}

enum DecoderState {
    Sniffing(Vec<u8>),
    Decoding {
        decoder: Decoder,
        detected: DetectedEncoding,
    },
}

impl std::fmt::Debug for DecoderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sniffing(held) => f.debug_tuple("Sniffing").field(&held.len()).finish(),
            Self::Decoding { detected, .. } => {
                f.debug_struct("Decoding").field("detected", detected).finish()
            }
        }
    }
}

/// Outcome of decoding one chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStatus {
    /// Malformed sequences were replaced with U+FFFD.
    pub had_errors: bool,
}

impl StreamDecoder {
    /// Creates a decoder, optionally forcing an encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the override label is unknown.
    pub fn new(override_label: Option<&str>) -> Result<Self, Error> {
        if let Some(label) = override_label {
            lookup(label)?;
        }
        Ok(Self {
            override_label: override_label.map(str::to_string),
            state: DecoderState::Sniffing(Vec::new()),
        })
    }

    /// The chosen encoding, once enough bytes were seen to decide.
    #[must_use]
    pub fn detected(&self) -> Option<DetectedEncoding> {
        match &self.state {
            DecoderState::Sniffing(_) => None,
            DecoderState::Decoding { detected, .. } => Some(*detected),
        }
    }

    /// Decodes `bytes`, appending the text to `out`.
    ///
    /// Bytes may be held back while the encoding is still undecided, or
    /// because they end in an incomplete sequence. Pass `last = true` with the
    /// final chunk (possibly empty) to flush everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoding cannot be determined: an unknown
    /// declared label or an override contradicting the byte order mark.
    pub fn decode(&mut self, bytes: &[u8], last: bool, out: &mut String) -> Result<DecodeStatus, Error> {
        if let DecoderState::Sniffing(held) = &mut self.state {
            held.extend_from_slice(bytes);
            if !last && !ready_to_decide(held) {
                return Ok(DecodeStatus::default());
            }
            let held = std::mem::take(held);
            let (detected, skip) = self.decide(&held)?;
            let decoder = detected.encoding.new_decoder_without_bom_handling();
            self.state = DecoderState::Decoding { decoder, detected };
            return self.pump(&held[skip..], last, out);
        }
        self.pump(bytes, last, out)
    }

    fn pump(&mut self, mut src: &[u8], last: bool, out: &mut String) -> Result<DecodeStatus, Error> {
        let DecoderState::Decoding { decoder, .. } = &mut self.state else {
            return Ok(DecodeStatus::default());
        };
        let mut status = DecodeStatus::default();
        loop {
            let needed = decoder
                .max_utf8_buffer_length(src.len())
                .unwrap_or(src.len().saturating_mul(3) + 16);
            out.reserve(needed);
            let (result, read, had_errors) = decoder.decode_to_string(src, out, last);
            status.had_errors |= had_errors;
            src = &src[read..];
            match result {
                CoderResult::InputEmpty => return Ok(status),
                CoderResult::OutputFull => {}
            }
        }
    }

    fn decide(&self, held: &[u8]) -> Result<(DetectedEncoding, usize), Error> {
        if let Some((bom, skip)) = detect_bom(held) {
            if let Some(label) = &self.override_label {
                let forced = lookup(label)?;
                if !same_family(forced, bom) {
                    return Err(Error::EncodingConflict {
                        actual: format!("{} (byte order mark)", bom.name()),
                        declared: label.clone(),
                    });
                }
            }
            return Ok((
                DetectedEncoding {
                    encoding: bom,
                    origin: EncodingOrigin::ByteOrderMark,
                },
                skip,
            ));
        }
        if let Some(label) = &self.override_label {
            let detected = DetectedEncoding {
                encoding: lookup(label)?,
                origin: EncodingOrigin::Override,
            };
            return Ok((detected, 0));
        }
        if let Some(label) = extract_encoding_from_ascii_bytes(held) {
            let encoding = lookup(&label)?;
            // An ASCII-readable declaration cannot be in a UTF-16 encoding.
            if encoding != UTF_16LE && encoding != UTF_16BE {
                let detected = DetectedEncoding {
                    encoding,
                    origin: EncodingOrigin::Declaration,
                };
                return Ok((detected, 0));
            }
        }
        let sniffed = match held {
            [0x3C, 0x00, 0x3F, 0x00, ..] => UTF_16LE,
            [0x00, 0x3C, 0x00, 0x3F, ..] => UTF_16BE,
            _ => UTF_8,
        };
        Ok((
            DetectedEncoding {
                encoding: sniffed,
                origin: EncodingOrigin::Sniffed,
            },
            0,
        ))
    }
}

/// Whether enough leading bytes are buffered to pick an encoding.
fn ready_to_decide(held: &[u8]) -> bool {
    const DECL: &[u8] = b"<?xml";
    if held.len() < DECL.len() {
        return held.len() >= 4 && !DECL.starts_with(held);
    }
    if !held.starts_with(DECL) {
        return true;
    }
    held.len() >= DECLARATION_SCAN_LIMIT || held.windows(2).any(|w| w == b"?>")
}

/// Extracts the `encoding` attribute from raw bytes by treating them as ASCII.
///
/// The XML declaration must be in ASCII-compatible characters, so the bytes
/// can be scanned directly before any decoding happens.
fn extract_encoding_from_ascii_bytes(bytes: &[u8]) -> Option<String> {
    let scan = &bytes[..bytes.len().min(DECLARATION_SCAN_LIMIT)];
    if !scan.starts_with(b"<?xml") {
        return None;
    }
    let decl_end = scan.windows(2).position(|w| w == b"?>")?;
    let decl = &scan[..decl_end];

    let needle = b"encoding";
    let pos = decl.windows(needle.len()).position(|w| w == needle)?;
    let rest = skip_ascii_whitespace(&decl[pos + needle.len()..]);
    let rest = skip_ascii_whitespace(rest.strip_prefix(b"=")?);

    let (&quote, rest) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let end = rest.iter().position(|&b| b == quote)?;
    let label = &rest[..end];
    label
        .is_ascii()
        .then(|| String::from_utf8_lossy(label).into_owned())
}

fn skip_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|&&b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .count();
    &bytes[skip..]
}

/// Encodings that cannot describe text already decoded into a Rust string.
fn is_multibyte_label(label: &str) -> bool {
    let upper = label.trim().to_ascii_uppercase();
    upper.starts_with("UTF-16")
        || upper.starts_with("UTF-32")
        || upper.starts_with("UCS")
        || upper.contains("EBCDIC")
        || upper.starts_with("IBM0")
        || upper.starts_with("CP037")
}

fn same_family(a: &'static Encoding, b: &'static Encoding) -> bool {
    let utf16 = |e: &'static Encoding| e == UTF_16LE || e == UTF_16BE;
    a == b || (utf16(a) && utf16(b))
}
