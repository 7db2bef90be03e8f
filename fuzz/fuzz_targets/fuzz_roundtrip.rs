#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlfeed::parser::{parse_str, ParseOptions};
use xmlfeed::serial::serialize;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Whatever parses must serialize to something that parses the same way.
        if let Ok(doc) = parse_str(s, &ParseOptions::default()) {
            let first = serialize(&doc);
            let reparsed = parse_str(&first, &ParseOptions::default())
                .unwrap_or_else(|e| panic!("serializer output rejected: {e}\n{first}"));
            assert_eq!(first, serialize(&reparsed));
        }
    }
});
