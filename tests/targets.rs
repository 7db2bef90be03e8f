//! Custom target tests for xmlfeed.
//!
//! A recording target checks the exact sequence of target calls the parser
//! makes, the payloads it hands back through pull events, and that `close`
//! runs once per document whatever the outcome.

#![allow(clippy::unwrap_used)]

use xmlfeed::events::{Event, EventKinds, Payload};
use xmlfeed::tree::{Doctype, XmlDeclaration};
use xmlfeed::util::qname::QName;
use xmlfeed::{Attribute, Error, FeedParser, ParseOptions, Target};

/// Records every call as a short string.
#[derive(Default)]
struct Recorder {
    calls: Vec<String>,
    closes: usize,
}

impl Target for Recorder {
    type Value = String;
    type Output = Vec<String>;

    fn declaration(&mut self, declaration: &XmlDeclaration) {
        self.calls.push(format!("declaration {}", declaration.version));
    }

    fn doctype(&mut self, doctype: &Doctype) {
        self.calls.push(format!("doctype {}", doctype.name));
    }

    fn start_ns(&mut self, prefix: Option<&str>, uri: &str) {
        self.calls
            .push(format!("start-ns {}={uri}", prefix.unwrap_or("")));
    }

    fn end_ns(&mut self, prefix: Option<&str>) {
        self.calls.push(format!("end-ns {}", prefix.unwrap_or("")));
    }

    fn start(&mut self, tag: &QName, attributes: &[Attribute]) -> Payload<String> {
        let attrs: Vec<String> = attributes
            .iter()
            .map(|a| format!(" {}={}", a.name, a.value))
            .collect();
        self.calls.push(format!("start {tag}{}", attrs.concat()));
        Payload::Custom(format!("<{tag}>"))
    }

    fn end(&mut self, tag: &QName) -> Payload<String> {
        self.calls.push(format!("end {tag}"));
        Payload::Custom(format!("</{tag}>"))
    }

    fn data(&mut self, text: &str) {
        self.calls.push(format!("data {text}"));
    }

    fn cdata(&mut self, text: &str) {
        self.calls.push(format!("cdata {text}"));
    }

    fn entity(&mut self, name: &str) {
        self.calls.push(format!("entity {name}"));
    }

    fn comment(&mut self, text: &str) -> Payload<String> {
        self.calls.push(format!("comment {text}"));
        Payload::Custom(format!("#{text}"))
    }

    fn pi(&mut self, target: &str, data: Option<&str>) -> Payload<String> {
        self.calls
            .push(format!("pi {target} {}", data.unwrap_or("")));
        Payload::Empty
    }

    fn close(&mut self) -> Option<Vec<String>> {
        self.closes += 1;
        Some(std::mem::take(&mut self.calls))
    }
}

fn record(opts: ParseOptions, input: &str) -> Vec<String> {
    let mut parser = FeedParser::with_target(opts, Recorder::default());
    parser.feed(input).unwrap();
    parser.close().unwrap().unwrap()
}

// ---------------------------------------------------------------------------
// Call sequence
// ---------------------------------------------------------------------------

#[test]
fn test_call_sequence() {
    let calls = record(
        ParseOptions::default(),
        "<?xml version=\"1.0\"?><!DOCTYPE r><r xmlns:p='urn:p' a='1'>\
         <!--c--><?t d?>text<p:x/>tail</r>",
    );
    assert_eq!(
        calls,
        vec![
            "declaration 1.0",
            "doctype r",
            "start-ns p=urn:p",
            "start r a=1",
            "comment c",
            "pi t d",
            "data text",
            "start {urn:p}x",
            "end {urn:p}x",
            "data tail",
            "end r",
            "end-ns p",
        ]
    );
}

#[test]
fn test_namespaces_leave_scope_in_reverse() {
    let calls = record(
        ParseOptions::default(),
        "<r xmlns='urn:a' xmlns:b='urn:b'><b:c/></r>",
    );
    assert_eq!(
        calls,
        vec![
            "start-ns =urn:a",
            "start-ns b=urn:b",
            "start {urn:a}r",
            "start {urn:b}c",
            "end {urn:b}c",
            "end {urn:a}r",
            "end-ns b",
            "end-ns ",
        ]
    );
}

#[test]
fn test_same_calls_for_any_chunking() {
    let input = "<r xmlns:p='urn:p'><!--c--><p:x k='v'>t&amp;t</p:x></r>";
    let whole = record(ParseOptions::default(), input);
    let mut parser = FeedParser::with_target(ParseOptions::default(), Recorder::default());
    for b in input.as_bytes().chunks(3) {
        parser.feed_bytes(b).unwrap();
    }
    let chunked = parser.close().unwrap().unwrap();
    // Text may arrive in pieces; join adjacent data calls before comparing.
    let merge = |calls: Vec<String>| {
        let mut out: Vec<String> = Vec::new();
        for call in calls {
            match (out.last_mut(), call.strip_prefix("data ")) {
                (Some(last), Some(text)) if last.starts_with("data ") => last.push_str(text),
                _ => out.push(call),
            }
        }
        out
    };
    assert_eq!(merge(chunked), merge(whole));
}

// ---------------------------------------------------------------------------
// Option-dependent calls
// ---------------------------------------------------------------------------

#[test]
fn test_cdata_kept_or_stripped() {
    let input = "<r><![CDATA[<x>]]></r>";
    assert_eq!(
        record(ParseOptions::default(), input),
        vec!["start r", "data <x>", "end r"]
    );
    assert_eq!(
        record(ParseOptions::default().strip_cdata(false), input),
        vec!["start r", "cdata <x>", "end r"]
    );
}

#[test]
fn test_declared_entity_left_unexpanded() {
    let input = "<!DOCTYPE r [<!ENTITY e \"v\">]><r>a&e;b&amp;</r>";
    assert_eq!(
        record(ParseOptions::default().resolve_entities(false), input),
        vec!["doctype r", "start r", "data a", "entity e", "data b&", "end r"]
    );
    assert_eq!(
        record(ParseOptions::default(), input),
        vec!["doctype r", "start r", "data avb&", "end r"]
    );
}

#[test]
fn test_removed_comments_and_pis_skip_the_target() {
    let opts = ParseOptions::default().remove_comments(true).remove_pis(true);
    assert_eq!(
        record(opts, "<r><!--c--><?p?></r>"),
        vec!["start r", "end r"]
    );
}

#[test]
fn test_recover_reports_implicit_ends() {
    let calls = record(ParseOptions::default().recover(true), "<r><a><b></r>");
    assert_eq!(
        calls,
        vec!["start r", "start a", "start b", "end b", "end a", "end r"]
    );
}

// ---------------------------------------------------------------------------
// Payloads and close
// ---------------------------------------------------------------------------

#[test]
fn test_payloads_reach_pull_events() {
    let opts = ParseOptions::default().events(EventKinds::all());
    let mut parser = FeedParser::with_target(opts, Recorder::default());
    parser.feed("<r><!--c--><?p?></r>").unwrap();
    let seen: Vec<Option<String>> = parser
        .read_events()
        .map(|event| match event {
            Event::StartNs { .. } | Event::EndNs => None,
            other => other.payload().and_then(|p| p.custom().cloned()),
        })
        .collect();
    assert_eq!(
        seen,
        vec![
            Some("<r>".to_string()),
            Some("#c".to_string()),
            None,
            Some("</r>".to_string()),
        ]
    );
}

#[test]
fn test_close_runs_once_when_close_fails() {
    let mut parser = FeedParser::with_target(ParseOptions::default(), Recorder::default());
    parser.feed("<r><a>").unwrap();
    let err = parser.close().unwrap_err();
    assert!(matches!(err, Error::Syntax(_)));
    assert_eq!(parser.target().closes, 1);
    assert!(matches!(parser.close(), Err(Error::InvalidState(_))));
    assert_eq!(parser.target().closes, 1);
}

#[test]
fn test_close_runs_once_per_document_after_reset() {
    let mut parser = FeedParser::with_target(ParseOptions::default(), Recorder::default());
    parser.feed("<a/>").unwrap();
    assert_eq!(parser.close().unwrap().unwrap(), vec!["start a", "end a"]);
    parser.reset();
    parser.feed("<b/>").unwrap();
    assert_eq!(parser.close().unwrap().unwrap(), vec!["start b", "end b"]);
    assert_eq!(parser.target().closes, 2);
}

#[test]
fn test_reset_closes_unfinished_document() {
    let mut parser = FeedParser::with_target(ParseOptions::default(), Recorder::default());
    parser.feed("<a><b>").unwrap();
    parser.reset();
    assert_eq!(parser.target().closes, 1);
    parser.feed("<c/>").unwrap();
    assert_eq!(parser.close().unwrap().unwrap(), vec!["start c", "end c"]);
}

#[test]
fn test_borrowed_target() {
    let mut recorder = Recorder::default();
    {
        let mut parser = FeedParser::with_target(ParseOptions::default(), &mut recorder);
        parser.feed("<r>x</r>").unwrap();
        parser.close().unwrap();
    }
    assert_eq!(recorder.closes, 1);
}

#[test]
fn test_default_methods_ignore_everything() {
    struct Nothing;
    impl Target for Nothing {
        type Value = ();
        type Output = ();
    }
    let mut parser = FeedParser::with_target(ParseOptions::default(), Nothing);
    parser.feed("<r a='1'><!--c-->text</r>").unwrap();
    assert_eq!(parser.close().unwrap(), None);
}
