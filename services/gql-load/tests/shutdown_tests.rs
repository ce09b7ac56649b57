//! SIGTERM ends a run the same way Ctrl-C does.
//!
//! Kept in its own test binary: the signal is delivered to the whole process.

#![cfg(unix)]

use gql_load::{LoadRunner, ShutdownSignal};
use std::sync::Arc;
use std::time::Duration;
use test_utils::{count_spec, StubTransport};

fn send_sigterm_to_self() {
    let status = std::process::Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn test_sigterm_cancels_and_drains_run() {
    let stub = Arc::new(StubTransport::ok(Duration::from_millis(20)));
    let runner = LoadRunner::new(count_spec(500, 2), stub.clone()).unwrap();
    let context = runner.context();

    let mut shutdown = ShutdownSignal::new().unwrap();
    let watched = context.clone();
    let watcher = tokio::spawn(async move { shutdown.cancel_on_signal(&watched).await });

    let terminate = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        send_sigterm_to_self();
    };
    let (snapshot, ()) = tokio::join!(runner.run(), terminate);

    let signal = tokio::time::timeout(Duration::from_secs(5), watcher)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(signal, Some("SIGTERM"));
    assert!(context.is_cancelled());
    assert!(snapshot.total < 500, "run was not cut short: {}", snapshot.total);
    assert!(snapshot.total > 0);
    assert_eq!(snapshot.total, stub.started());
}
