#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlfeed::events::EventKinds;
use xmlfeed::{FeedParser, ParseOptions};

fuzz_target!(|data: &[u8]| {
    // The first byte picks the chunk size, the rest is the document.
    let Some((&size, input)) = data.split_first() else {
        return;
    };
    let size = usize::from(size).max(1);
    for opts in [
        ParseOptions::default().events(EventKinds::all()),
        ParseOptions::default().recover(true).events(EventKinds::all()),
        ParseOptions::html().events(EventKinds::all()),
    ] {
        // Feeding and draining events must never panic, whatever the input.
        let mut parser = FeedParser::with_options(opts);
        for chunk in input.chunks(size) {
            if parser.feed_bytes(chunk).is_err() {
                break;
            }
            let mut events = parser.read_events();
            while let Some(event) = events.next() {
                if let Some(id) = event.node() {
                    let _ = events.clear(id, true);
                }
            }
        }
        let _ = parser.close();
        let _ = parser.close();
    }
});
