//! Pull-event example.
//!
//! Reads a large feed in small chunks, handles each `<entry>` as soon as its
//! end tag arrives, then clears it and drops its finished siblings so the
//! tree never holds more than one entry.
//!
//! Run with: `cargo run --example iterparse`
#![allow(clippy::expect_used)]

use std::fmt::Write;

use xmlfeed::events::{Event, EventKinds, TagSelector};
use xmlfeed::{FeedParser, ParseOptions};

fn main() {
    let mut xml = String::from("<feed xmlns=\"http://www.w3.org/2005/Atom\">");
    for i in 0..1000 {
        let _ = write!(
            xml,
            "<entry><id>urn:entry:{i}</id><title>Entry {i}</title><skip><x/><y/></skip></entry>"
        );
    }
    xml.push_str("</feed>");

    let selector: TagSelector = "{http://www.w3.org/2005/Atom}entry {*}skip"
        .parse()
        .expect("bad selector");
    let opts = ParseOptions::default()
        .events(EventKinds::START | EventKinds::END)
        .tag(selector);
    let mut parser = FeedParser::with_options(opts);

    let mut titles = 0;
    let mut peak = 0;
    for chunk in xml.as_bytes().chunks(256) {
        parser.feed_bytes(chunk).expect("feed failed");
        let mut events = parser.read_events();
        while let Some(event) = events.next() {
            let id = event.node().expect("tree builder payload");
            match event {
                Event::Start(_) if events.document().node_name(id) == Some("skip") => {
                    // Nothing below <skip> is interesting.
                    events.skip_subtree().expect("skip after start");
                }
                Event::End(_) if events.document().node_name(id) == Some("entry") => {
                    let doc = events.document();
                    let title = doc
                        .children(id)
                        .find(|&c| doc.node_name(c) == Some("title"))
                        .map(|c| doc.text_content(c))
                        .unwrap_or_default();
                    if title.ends_with("00") {
                        println!("{title}");
                    }
                    titles += 1;
                    events.clear(id, false).expect("entry is finished");
                    events.remove_preceding_siblings(id);
                }
                _ => {}
            }
        }
        peak = peak.max(parser.document().live_node_count());
    }
    parser.close().expect("parsing failed");

    println!("\n{titles} entries, at most {peak} live nodes at a time");
}
