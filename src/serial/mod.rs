//! XML serialization.
//!
//! Serializes a [`Document`](crate::Document), or any subtree of one, back
//! to XML text. Parsing the output yields the same tree.

pub mod xml;

pub use xml::{serialize, serialize_node, serialize_with_options, SerializeOptions};
