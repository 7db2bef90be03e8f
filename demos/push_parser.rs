//! Feed parser example.
//!
//! The feed parser accepts input in arbitrarily sized chunks, useful when
//! data arrives incrementally (network sockets, pipes, etc.). Every complete
//! token is processed as soon as it arrives, so the tree grows while feeding.
//!
//! Run with: `cargo run --example push_parser`
#![allow(clippy::expect_used)]

use xmlfeed::FeedParser;

fn main() {
    // Simulate receiving XML in chunks (e.g., from a network stream)
    let chunks = [
        b"<?xml version=\"1.0\"?>" as &[u8],
        b"<inventory>",
        b"  <item sku=\"A10",
        b"1\"><name>Bolt</name>",
        b"<qty>500</qty></item>",
        b"  <item sku=\"B202\">",
        b"<name>Nut</name><qty>",
        b"1000</qty></item>",
        b"</inventory>",
    ];

    let mut parser = FeedParser::new();

    for (i, chunk) in chunks.iter().enumerate() {
        parser.feed_bytes(chunk).expect("feed failed");
        println!(
            "Fed chunk {} ({} bytes, {} buffered, depth {})",
            i + 1,
            chunk.len(),
            parser.buffered_bytes(),
            parser.depth()
        );
    }

    let doc = parser.close().expect("parsing failed").expect("no document");
    let root = doc.root_element().expect("no root element");

    println!("\nParsed document:");
    println!("Root: {}", doc.node_name(root).unwrap_or("?"));
    if let Some(encoding) = &doc.encoding {
        println!("Encoding: {encoding}");
    }

    for item in doc.children(root) {
        let sku = doc.attribute(item, "sku").unwrap_or("?");
        print!("  <{} sku=\"{sku}\">", doc.node_name(item).unwrap_or("?"));
        for field in doc.children(item) {
            if let Some(name) = doc.node_name(field) {
                print!(" {name}={}", doc.text_content(field));
            }
        }
        println!();
    }
}
