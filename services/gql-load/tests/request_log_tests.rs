//! Request log sink behavior: ordering, overflow, and file output.

use gql_load::request_log::{LogEntry, RequestLogSink, QUEUE_CAPACITY};
use gql_load::LoadRunner;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{count_spec, StubTransport};
use tokio::io::AsyncReadExt;

const HEADER_LINE: &str = "Date,Status,Request,Response";

fn entry(i: usize) -> LogEntry {
    LogEntry::now(Some(200), format!("request-{}", i), "ok".to_string())
}

#[tokio::test]
async fn test_full_queue_drops_instead_of_blocking() {
    // A tiny pipe nobody reads: the writer stalls on the header.
    let (writer, mut reader) = tokio::io::duplex(16);
    let mut sink = RequestLogSink::with_writer(writer);
    sink.start();
    let logger = sink.logger();

    for i in 0..QUEUE_CAPACITY + 500 {
        logger.log(entry(i));
    }
    assert_eq!(logger.dropped(), 500);

    let read = tokio::spawn(async move {
        let mut text = String::new();
        reader.read_to_string(&mut text).await.unwrap();
        text
    });
    drop(logger);
    sink.stop().await.unwrap();

    let text = read.await.unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), QUEUE_CAPACITY + 1);
    assert_eq!(lines[0], HEADER_LINE);
    assert!(lines[1].ends_with(",200,request-0,ok"));
    assert!(lines[QUEUE_CAPACITY].ends_with(&format!(",200,request-{},ok", QUEUE_CAPACITY - 1)));
}

#[tokio::test]
async fn test_stop_without_start_writes_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.csv");
    let sink = RequestLogSink::create(&path).await.unwrap();
    sink.stop().await.unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, format!("{}\n", HEADER_LINE));
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("twice.csv");
    let mut sink = RequestLogSink::create(&path).await.unwrap();
    sink.start();
    sink.start();
    sink.logger().log(entry(1));
    sink.stop().await.unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().filter(|l| *l == HEADER_LINE).count(), 1);
    assert_eq!(text.lines().count(), 2);
}

#[tokio::test]
async fn test_run_writes_every_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("requests.csv");
    let sink = RequestLogSink::create(&path).await.unwrap();
    assert_eq!(sink.path(), Some(path.as_path()));

    let stub = Arc::new(StubTransport::ok(Duration::from_millis(1)).with_statuses(vec![200, 502]));
    let snapshot = LoadRunner::new(count_spec(20, 4), stub)
        .unwrap()
        .with_log_sink(sink)
        .run()
        .await;
    assert_eq!(snapshot.total, 20);

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 21);
    assert_eq!(lines[0], HEADER_LINE);
    assert_eq!(lines.iter().filter(|l| l.contains(",200,")).count(), 10);
    assert_eq!(lines.iter().filter(|l| l.contains(",502,")).count(), 10);
    // Request bodies are JSON, so they are quoted with doubled quotes.
    assert!(lines[1].contains(r#""{""query"":"#));
}

#[tokio::test]
async fn test_transport_error_is_logged_without_status() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("errors.csv");
    let sink = RequestLogSink::create(&path).await.unwrap();

    let stub = Arc::new(StubTransport::ok(Duration::from_millis(1)).failing("connection reset"));
    LoadRunner::new(count_spec(3, 1), stub)
        .unwrap()
        .with_log_sink(sink)
        .run()
        .await;

    let text = std::fs::read_to_string(&path).unwrap();
    let rows: Vec<&str> = text.lines().skip(1).collect();
    assert_eq!(rows.len(), 3);
    for row in rows {
        // Date, empty status, request, error text.
        let (_, rest) = row.split_once(',').unwrap();
        assert!(rest.starts_with(','), "row {}", row);
        assert!(row.ends_with("transport error: connection reset"));
    }
}
