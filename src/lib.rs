//! # xmlfeed
//!
//! An incremental, event-driven XML/HTML parser. Input arrives in chunks of
//! any size; every complete token is processed as soon as it is seen, and
//! the parse events can be consumed three ways:
//!
//! - as a finished [`Document`], built by the default [`TreeBuilder`] target,
//! - through a custom [`Target`] that never builds a tree,
//! - as filtered pull [`Event`]s drained between feeds, with the partially
//!   built tree open to pruning.
//!
//! ## Quick Start
//!
//! ```
//! use xmlfeed::{FeedParser, ParseOptions};
//! use xmlfeed::events::{Event, EventKinds};
//!
//! let opts = ParseOptions::default().events(EventKinds::END);
//! let mut parser = FeedParser::with_options(opts);
//! let mut names = Vec::new();
//! for chunk in ["<feed><item>1</it", "em><item>2</item></feed>"] {
//!     parser.feed(chunk).unwrap();
//!     let mut events = parser.read_events();
//!     while let Some(Event::End(payload)) = events.next() {
//!         let id = payload.node().unwrap();
//!         names.push(events.document().node_name(id).unwrap().to_string());
//!     }
//! }
//! assert_eq!(names, ["item", "item", "feed"]);
//! let doc = parser.close().unwrap().unwrap();
//! assert_eq!(doc.node_name(doc.root_element().unwrap()), Some("feed"));
//! ```

pub mod encoding;
pub mod error;
pub mod events;
pub mod parser;
pub mod serial;
pub mod target;
pub mod tree;
pub mod util;

// Re-export primary types at the crate root for convenience.
pub use error::{Error, Result};
pub use events::{Event, EventKinds, Payload, TagSelector};
pub use parser::{FeedParser, ParseOptions};
pub use target::{Target, TreeBuilder};
pub use tree::{Attribute, Document, NodeId};
