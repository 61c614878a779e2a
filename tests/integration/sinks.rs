//! Integration tests for fact sinks
//!
//! Tests handing finished graphs to sinks and reading them back from
//! `MessagePack`.

use planardl_foundation::{Error, ErrorKind, Result, Value};
use planardl_graph::{CollectingSink, FactGraph, FactSink};
use planardl_runtime::serialize::{load_from_file, read_records, save_to_file};
use planardl_runtime::{MsgPackSink, SessionConfig, SubjectFile};

use crate::compose::{COMPOSE_FILE, session, unit};

fn subjects() -> Vec<SubjectFile> {
    vec![
        SubjectFile::new("stack/docker-compose.yml", COMPOSE_FILE),
        SubjectFile::new("stack/empty.yml", "services:\n"),
    ]
}

#[test]
fn msgpack_sink_streams_one_record_per_file() {
    let session = session(SessionConfig::default());
    let unit = unit(&session);

    let mut sink = MsgPackSink::new(Vec::new());
    let diagnostics = session.run_into(&unit, &subjects(), &mut sink).unwrap();
    assert_eq!(sink.written(), 2);

    let records = read_records(sink.into_inner().unwrap().as_slice()).unwrap();
    let sources: Vec<_> = records.iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(sources, vec!["stack/docker-compose.yml", "stack/empty.yml"]);
    assert_eq!(records[0].1.len(), 4);
    assert!(records[1].1.is_empty());

    assert_eq!(diagnostics.len(), 1);
    let err = diagnostics.iter().next().unwrap();
    assert!(matches!(err.kind, ErrorKind::RefinementViolation { .. }));
    assert_eq!(
        err.context.as_ref().and_then(|c| c.source.as_deref()),
        Some("stack/docker-compose.yml")
    );
}

#[test]
fn streamed_graphs_equal_collected_graphs() {
    let session = session(SessionConfig::sequential());
    let unit = unit(&session);

    let mut collected = CollectingSink::new();
    session.run_into(&unit, &subjects(), &mut collected).unwrap();
    let mut streamed = MsgPackSink::new(Vec::new());
    session.run_into(&unit, &subjects(), &mut streamed).unwrap();

    let records = read_records(streamed.into_inner().unwrap().as_slice()).unwrap();
    assert_eq!(records, collected.into_graphs());
}

#[test]
fn graph_survives_a_file_round_trip() {
    let session = session(SessionConfig::sequential());
    let unit = unit(&session);
    let graph = session.run_source(&unit, COMPOSE_FILE).unwrap().graph;

    let path = std::env::temp_dir().join("planardl_integration_compose.msgpack");
    save_to_file(&graph, &path).unwrap();
    let restored = load_from_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(restored, graph);
    let web = &restored.facts()[0];
    assert_eq!(web.field("port"), Some(&Value::Int(8080)));
    assert_eq!(web.origin.map(|n| n.span.line), Some(2));
}

/// Fails on the second graph it sees.
struct FailingSink {
    seen: usize,
}

impl FactSink for FailingSink {
    fn accept(&mut self, source: &str, _graph: &FactGraph) -> Result<()> {
        self.seen += 1;
        if self.seen > 1 {
            return Err(Error::new(ErrorKind::Io(format!("disk full writing {source}"))));
        }
        Ok(())
    }
}

#[test]
fn sink_errors_stop_the_run() {
    let session = session(SessionConfig::sequential());
    let unit = unit(&session);

    let mut sink = FailingSink { seen: 0 };
    let err = session.run_into(&unit, &subjects(), &mut sink).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Io(ref m) if m.contains("empty.yml")));
    assert_eq!(sink.seen, 2);
}
