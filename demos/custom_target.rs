//! Custom target example.
//!
//! A target receives the parse events as method calls and never builds a
//! tree. This one counts element names and collects the text of `<price>`
//! elements, then returns a summary from `close`.
//!
//! Run with: `cargo run --example custom_target`
#![allow(clippy::expect_used)]

use std::collections::BTreeMap;

use xmlfeed::events::{Event, EventKinds};
use xmlfeed::util::qname::QName;
use xmlfeed::{Attribute, FeedParser, ParseOptions, Payload, Target};

#[derive(Default)]
struct Summary {
    counts: BTreeMap<String, usize>,
    in_price: bool,
    total: f64,
    text: String,
}

impl Target for Summary {
    type Value = String;
    type Output = (BTreeMap<String, usize>, f64);

    fn start(&mut self, tag: &QName, _attributes: &[Attribute]) -> Payload<String> {
        *self.counts.entry(tag.local.clone()).or_default() += 1;
        self.in_price = tag.local == "price";
        self.text.clear();
        Payload::Custom(tag.local.clone())
    }

    fn end(&mut self, tag: &QName) -> Payload<String> {
        if self.in_price {
            self.total += self.text.trim().parse::<f64>().unwrap_or(0.0);
            self.in_price = false;
        }
        Payload::Custom(tag.local.clone())
    }

    fn data(&mut self, text: &str) {
        if self.in_price {
            self.text.push_str(text);
        }
    }

    fn close(&mut self) -> Option<Self::Output> {
        Some((std::mem::take(&mut self.counts), self.total))
    }
}

fn main() {
    let input = "<catalog><book><title>A</title><price>10.50</price></book>\
                 <book><title>B</title><price>4.25</price></book></catalog>";

    let opts = ParseOptions::default().events(EventKinds::END);
    let mut parser = FeedParser::with_target(opts, Summary::default());
    for chunk in input.as_bytes().chunks(16) {
        parser.feed_bytes(chunk).expect("feed failed");
        for event in parser.read_events() {
            if let Event::End(payload) = event {
                if let Some(name) = payload.custom() {
                    println!("closed <{name}>");
                }
            }
        }
    }

    let (counts, total) = parser.close().expect("parsing failed").expect("summary");
    for (name, count) in &counts {
        println!("{name}: {count}");
    }
    println!("total price: {total:.2}");
}
