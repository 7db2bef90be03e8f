//! Pull-event tests for xmlfeed.
//!
//! These tests cover the event queue behind [`FeedParser::read_events`]:
//! type and tag filtering, namespace events, subtree skipping, and pruning
//! the tree while it is being built.

#![allow(clippy::unwrap_used)]

use xmlfeed::events::{Event, EventKind, EventKinds, TagSelector};
use xmlfeed::{Document, Error, FeedParser, NodeId, ParseOptions};

/// Renders drained events as `kind name` strings.
fn drain(parser: &mut FeedParser) -> Vec<String> {
    let mut out = Vec::new();
    let mut events = parser.read_events();
    while let Some(event) = events.next() {
        out.push(describe(events.document(), &event));
    }
    out
}

fn describe(doc: &Document, event: &Event<std::convert::Infallible>) -> String {
    match event {
        Event::StartNs { prefix, uri } => {
            format!("start-ns {}={uri}", prefix.as_deref().unwrap_or(""))
        }
        Event::EndNs => "end-ns".to_string(),
        other => {
            let name = other
                .node()
                .map(|id| name_of(doc, id))
                .unwrap_or_default();
            format!("{} {name}", other.kind())
        }
    }
}

fn name_of(doc: &Document, id: NodeId) -> String {
    match doc.tag(id) {
        Some(tag) => tag.clark(),
        None => doc.content(id).unwrap_or_default().to_string(),
    }
}

fn parser_with(kinds: EventKinds) -> FeedParser {
    FeedParser::with_options(ParseOptions::default().events(kinds))
}

// ---------------------------------------------------------------------------
// Type filters
// ---------------------------------------------------------------------------

#[test]
fn test_default_queues_only_end() {
    let mut parser = FeedParser::new();
    parser.feed("<r><a/><!--c--><b/></r>").unwrap();
    assert_eq!(drain(&mut parser), vec!["end a", "end b", "end r"]);
}

#[test]
fn test_all_event_types_in_order() {
    let mut parser = parser_with(EventKinds::all());
    parser
        .feed("<r xmlns:p='urn:p'><!--c--><?pi x?><p:a/></r>")
        .unwrap();
    parser.close().unwrap();
    assert_eq!(
        drain(&mut parser),
        vec![
            "start-ns p=urn:p",
            "start r",
            "comment c",
            "pi x",
            "start {urn:p}a",
            "end {urn:p}a",
            "end r",
            "end-ns",
        ]
    );
}

#[test]
fn test_events_survive_between_feeds() {
    let mut parser = parser_with(EventKinds::START | EventKinds::END);
    parser.feed("<r><a>").unwrap();
    assert_eq!(parser.read_events().next().map(|e| e.kind()), Some(EventKind::Start));
    parser.feed("</a></r>").unwrap();
    // The second start was left in the queue by the dropped handle.
    assert_eq!(drain(&mut parser), vec!["start a", "end a", "end r"]);
}

#[test]
fn test_text_never_queued() {
    let mut parser = parser_with(EventKinds::all());
    parser.feed("<r>one<a/>two</r>").unwrap();
    let kinds: Vec<EventKind> = parser.read_events().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Start, EventKind::Start, EventKind::End, EventKind::End]
    );
}

// ---------------------------------------------------------------------------
// Tag filters
// ---------------------------------------------------------------------------

fn tagged(selector: &str, input: &str) -> Vec<String> {
    let selector: TagSelector = selector.parse().unwrap();
    let opts = ParseOptions::default()
        .events(EventKinds::START | EventKinds::END | EventKinds::COMMENT)
        .tag(selector);
    let mut parser = FeedParser::with_options(opts);
    parser.feed(input).unwrap();
    parser.close().unwrap();
    drain(&mut parser)
}

const MIXED: &str = "<r xmlns:x='urn:x'><item/><x:item/><x:other/><!--c--></r>";

#[test]
fn test_plain_name_means_no_namespace() {
    assert_eq!(tagged("item", MIXED), vec!["start item", "end item", "comment c"]);
}

#[test]
fn test_clark_name() {
    assert_eq!(
        tagged("{urn:x}item", MIXED),
        vec!["start {urn:x}item", "end {urn:x}item", "comment c"]
    );
}

#[test]
fn test_namespace_wildcard() {
    assert_eq!(
        tagged("{urn:x}*", MIXED),
        vec![
            "start {urn:x}item",
            "end {urn:x}item",
            "start {urn:x}other",
            "end {urn:x}other",
            "comment c",
        ]
    );
}

#[test]
fn test_any_namespace_local_name() {
    assert_eq!(
        tagged("{*}item", MIXED),
        vec![
            "start item",
            "end item",
            "start {urn:x}item",
            "end {urn:x}item",
            "comment c",
        ]
    );
}

#[test]
fn test_multiple_selectors() {
    assert_eq!(
        tagged("r {urn:x}other", MIXED),
        vec![
            "start r",
            "start {urn:x}other",
            "end {urn:x}other",
            "comment c",
            "end r",
        ]
    );
}

// ---------------------------------------------------------------------------
// skip_subtree
// ---------------------------------------------------------------------------

#[test]
fn test_skip_subtree_queued() {
    let mut parser = parser_with(EventKinds::START | EventKinds::END);
    parser.feed("<r><a><b/><c/></a><d/></r>").unwrap();
    let mut seen = Vec::new();
    let mut events = parser.read_events();
    while let Some(event) = events.next() {
        let name = name_of(events.document(), event.node().unwrap());
        if event.kind() == EventKind::Start && name == "a" {
            events.skip_subtree().unwrap();
        }
        seen.push(format!("{} {name}", event.kind()));
    }
    assert_eq!(
        seen,
        vec!["start r", "start a", "end a", "start d", "end d", "end r"]
    );
}

#[test]
fn test_skip_subtree_spans_feeds() {
    let mut parser = parser_with(EventKinds::START | EventKinds::END);
    parser.feed("<r><a>").unwrap();
    {
        let mut events = parser.read_events();
        assert_eq!(events.next().map(|e| e.kind()), Some(EventKind::Start));
        assert_eq!(events.next().map(|e| e.kind()), Some(EventKind::Start));
        events.skip_subtree().unwrap();
    }
    parser.feed("<b><c/></b>").unwrap();
    assert!(drain(&mut parser).is_empty());
    parser.feed("</a><d/></r>").unwrap();
    assert_eq!(drain(&mut parser), vec!["end a", "start d", "end d", "end r"]);
}

#[test]
fn test_skip_subtree_after_start_ns() {
    let mut parser = parser_with(EventKinds::all());
    parser
        .feed("<r><a xmlns='urn:a'><b/><!--x--></a></r>")
        .unwrap();
    let mut seen = Vec::new();
    let mut events = parser.read_events();
    while let Some(event) = events.next() {
        if matches!(event, Event::StartNs { .. }) {
            events.skip_subtree().unwrap();
        }
        seen.push(describe(events.document(), &event));
    }
    assert_eq!(
        seen,
        vec![
            "start r",
            "start-ns =urn:a",
            "start {urn:a}a",
            "end {urn:a}a",
            "end-ns",
            "end r",
        ]
    );
}

#[test]
fn test_skip_subtree_with_end_filtered_out() {
    let mut parser = parser_with(EventKinds::START);
    parser.feed("<r><a><b/></a><c/></r>").unwrap();
    let mut seen = Vec::new();
    let mut events = parser.read_events();
    while let Some(event) = events.next() {
        let name = name_of(events.document(), event.node().unwrap());
        if name == "a" {
            events.skip_subtree().unwrap();
        }
        seen.push(name);
    }
    assert_eq!(seen, vec!["r", "a", "c"]);
}

#[test]
fn test_skip_subtree_requires_start() {
    let mut parser = FeedParser::new();
    parser.feed("<r><a/></r>").unwrap();
    let mut events = parser.read_events();
    assert!(matches!(events.skip_subtree(), Err(Error::InvalidState(_))));
    assert_eq!(events.next().map(|e| e.kind()), Some(EventKind::End));
    assert!(matches!(events.skip_subtree(), Err(Error::InvalidState(_))));
}

#[test]
fn test_skip_subtree_only_once_per_start() {
    let mut parser = parser_with(EventKinds::START | EventKinds::END);
    parser.feed("<r><a/></r>").unwrap();
    let mut events = parser.read_events();
    events.next();
    events.skip_subtree().unwrap();
    assert!(events.skip_subtree().is_err());
}

// ---------------------------------------------------------------------------
// Mutating the tree while parsing
// ---------------------------------------------------------------------------

#[test]
fn test_clear_finished_elements_keeps_memory_flat() {
    let mut parser = FeedParser::new();
    parser.feed("<feed>").unwrap();
    let mut seen = 0;
    for i in 0..200 {
        parser
            .feed(&format!("<entry n='{i}'><title>t{i}</title></entry>"))
            .unwrap();
        let mut events = parser.read_events();
        while let Some(event) = events.next() {
            let id = event.node().unwrap();
            if events.document().node_name(id) == Some("entry") {
                seen += 1;
                events.clear(id, false).unwrap();
                events.remove_preceding_siblings(id);
            }
        }
    }
    parser.feed("</feed>").unwrap();
    assert_eq!(seen, 200);
    assert!(parser.document().live_node_count() < 10);
    let doc = parser.close().unwrap().unwrap();
    assert_eq!(doc.children(doc.root_element().unwrap()).count(), 1);
}

#[test]
fn test_open_elements_cannot_be_detached() {
    let mut parser = parser_with(EventKinds::START | EventKinds::END);
    parser.feed("<r><a>").unwrap();
    let mut events = parser.read_events();
    let root = events.next().unwrap().node().unwrap();
    let a = events.next().unwrap().node().unwrap();
    assert!(matches!(events.detach(root), Err(Error::InvalidState(_))));
    assert!(matches!(events.clear(a, false), Err(Error::InvalidState(_))));
    drop(events);

    parser.feed("<b/>").unwrap();
    let mut events = parser.read_events();
    let b = events.next().unwrap().node().unwrap();
    assert_eq!(events.next().unwrap().node(), Some(b));
    events.detach(b).unwrap();
    assert_eq!(events.document().first_child(a), None);
}

#[test]
fn test_clear_waits_for_descendant_events() {
    let mut parser = parser_with(EventKinds::START | EventKinds::END);
    parser.feed("<r><a><b/></a>").unwrap();
    let mut events = parser.read_events();
    events.next();
    let a = events.next().unwrap().node().unwrap();
    // `a` is finished, but the events for `b` have not been read.
    assert!(matches!(events.clear(a, false), Err(Error::InvalidState(_))));
    let b = events.next().unwrap().node().unwrap();
    assert_eq!(events.next().unwrap().node(), Some(b));
    assert_eq!(events.next().unwrap().node(), Some(a));
    events.clear(a, false).unwrap();
    drop(events);

    // New nodes may take the released slot; no waiting event names it.
    parser.feed("<c/></r>").unwrap();
    assert_eq!(drain(&mut parser), vec!["start c", "end c", "end r"]);
}

#[test]
fn test_siblings_with_waiting_events_are_kept() {
    let mut parser = parser_with(EventKinds::START | EventKinds::END);
    parser.feed("<r><a/><b/><c/>").unwrap();
    let mut events = parser.read_events();
    let r = events.next().unwrap().node().unwrap();
    events.next();
    let c = events.document().last_child(r).unwrap();
    assert_eq!(events.remove_preceding_siblings(c), 0);
    events.next();
    events.next();
    // `end b` is still waiting.
    assert_eq!(events.remove_preceding_siblings(c), 0);
    events.next();
    assert_eq!(events.remove_preceding_siblings(c), 2);
    assert_eq!(events.document().first_child(r), Some(c));
    drop(events);

    parser.feed("<d/></r>").unwrap();
    assert_eq!(
        drain(&mut parser),
        vec!["start c", "end c", "start d", "end d", "end r"]
    );
}

#[test]
fn test_document_access_cannot_break_open_elements() {
    let mut parser = FeedParser::new();
    parser.feed("<r><a>").unwrap();
    let r = parser.document().root_element().unwrap();
    let a = parser.document().first_child(r).unwrap();
    let doc = parser.document_mut();
    assert!(matches!(doc.release(a), Err(Error::InvalidState(_))));
    assert!(matches!(doc.release(r), Err(Error::InvalidState(_))));
    assert!(matches!(doc.clear(r, false), Err(Error::InvalidState(_))));
    assert!(matches!(doc.append_child(a, r), Err(Error::InvalidState(_))));
    assert!(matches!(doc.append_child(a, a), Err(Error::InvalidState(_))));

    parser.feed("<b/></a></r>").unwrap();
    let doc = parser.close().unwrap().unwrap();
    assert_eq!(xmlfeed::serial::serialize(&doc), "<r><a><b/></a></r>");
}

#[test]
fn test_attributes_complete_at_start() {
    let mut parser = parser_with(EventKinds::START);
    parser.feed("<r><a k='v' j='w'>").unwrap();
    let mut events = parser.read_events();
    events.next();
    let a = events.next().unwrap().node().unwrap();
    assert_eq!(events.document().attribute(a, "k"), Some("v"));
    assert_eq!(events.document().attribute(a, "j"), Some("w"));
    assert_eq!(events.document().first_child(a), None);
}
