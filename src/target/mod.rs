//! The parser target protocol.
//!
//! A [`Target`] receives the normalized event stream as method calls.
//! The default target is [`TreeBuilder`], which assembles a [`Document`];
//! a custom target can consume events without building any tree at all.
//!
//! `start`, `end`, `comment` and `pi` return a [`Payload`] that becomes the
//! second half of the corresponding pull event. `close` is called exactly
//! once per document, also when parsing fails, and its return value is the
//! result of the parse.
//!
//! # Examples
//!
//! ```
//! use xmlfeed::{Attribute, FeedParser, ParseOptions, Payload, Target};
//! use xmlfeed::util::qname::QName;
//!
//! #[derive(Default)]
//! struct Depth {
//!     current: usize,
//!     max: usize,
//! }
//!
//! impl Target for Depth {
//!     type Value = ();
//!     type Output = usize;
//!
//!     fn start(&mut self, tag: &QName, attributes: &[Attribute]) -> Payload<()> {
//!         self.current += 1;
//!         self.max = self.max.max(self.current);
//!         Payload::Empty
//!     }
//!
//!     fn end(&mut self, tag: &QName) -> Payload<()> {
//!         self.current -= 1;
//!         Payload::Empty
//!     }
//!
//!     fn close(&mut self) -> Option<usize> {
//!         Some(self.max)
//!     }
//! }
//!
//! let mut parser = FeedParser::with_target(ParseOptions::default(), Depth::default());
//! parser.feed("<a><b><c/></b></a>").unwrap();
//! assert_eq!(parser.close().unwrap(), Some(3));
//! ```
//!
//! [`Document`]: crate::tree::Document

mod builder;

pub use builder::TreeBuilder;

use crate::events::Payload;
use crate::tree::{Attribute, Doctype, XmlDeclaration};
use crate::util::qname::QName;

/// A consumer of parse events.
///
/// Every method has a default no-op implementation, so a target implements
/// only what it cares about.
#[allow(unused_variables)]
pub trait Target {
    /// The custom payload type carried by pull events.
    type Value;
    /// What `close` produces.
    type Output;

    /// Called for the XML declaration.
    fn declaration(&mut self, declaration: &XmlDeclaration) {}

    /// Called for the document type declaration.
    fn doctype(&mut self, doctype: &Doctype) {}

    /// Called before `start` for each namespace the element declares.
    fn start_ns(&mut self, prefix: Option<&str>, uri: &str) {}

    /// Called after `end` for each namespace leaving scope, innermost first.
    fn end_ns(&mut self, prefix: Option<&str>) {}

    /// Called when an element opens. Only the tag and attributes are
    /// complete at this point.
    fn start(&mut self, tag: &QName, attributes: &[Attribute]) -> Payload<Self::Value> {
        Payload::Empty
    }

    /// Called when an element closes.
    fn end(&mut self, tag: &QName) -> Payload<Self::Value> {
        Payload::Empty
    }

    /// Called for character data.
    fn data(&mut self, text: &str) {}

    /// Called for a CDATA section kept as such; defaults to [`data`](Self::data).
    fn cdata(&mut self, text: &str) {
        self.data(text);
    }

    /// Called for an entity reference left unexpanded.
    fn entity(&mut self, name: &str) {}

    /// Called for a comment, unless comments are removed.
    fn comment(&mut self, text: &str) -> Payload<Self::Value> {
        Payload::Empty
    }

    /// Called for a processing instruction, unless they are removed.
    fn pi(&mut self, target: &str, data: Option<&str>) -> Payload<Self::Value> {
        Payload::Empty
    }

    /// Called once at the end of every document.
    fn close(&mut self) -> Option<Self::Output> {
        None
    }
}

impl<T: Target + ?Sized> Target for &mut T {
    type Value = T::Value;
    type Output = T::Output;

    fn declaration(&mut self, declaration: &XmlDeclaration) {
        (**self).declaration(declaration);
    }

    fn doctype(&mut self, doctype: &Doctype) {
        (**self).doctype(doctype);
    }

    fn start_ns(&mut self, prefix: Option<&str>, uri: &str) {
        (**self).start_ns(prefix, uri);
    }

    fn end_ns(&mut self, prefix: Option<&str>) {
        (**self).end_ns(prefix);
    }

    fn start(&mut self, tag: &QName, attributes: &[Attribute]) -> Payload<Self::Value> {
        (**self).start(tag, attributes)
    }

    fn end(&mut self, tag: &QName) -> Payload<Self::Value> {
        (**self).end(tag)
    }

    fn data(&mut self, text: &str) {
        (**self).data(text);
    }

    fn cdata(&mut self, text: &str) {
        (**self).cdata(text);
    }

    fn entity(&mut self, name: &str) {
        (**self).entity(name);
    }

    fn comment(&mut self, text: &str) -> Payload<Self::Value> {
        (**self).comment(text)
    }

    fn pi(&mut self, target: &str, data: Option<&str>) -> Payload<Self::Value> {
        (**self).pi(target, data)
    }

    fn close(&mut self) -> Option<Self::Output> {
        (**self).close()
    }
}
