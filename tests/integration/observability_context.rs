//! Integration tests for the process-wide observability context.

use std::time::Duration;

use futures::StreamExt;
use logrelay::config::RelayConfig;
use logrelay::context::Observability;
use logrelay::record::Severity;
use logrelay::relay::client::RelayClient;
use logrelay::relay::Submission;
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.relay.socket_path = Some(dir.path().join("ctx.sock"));
    config.store.capacity = 50;
    config
}

async fn next_value(stream: &mut (impl futures::Stream<Item = bool> + Unpin)) -> bool {
    tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("status update")
        .expect("stream ended")
}

#[tokio::test]
async fn status_subscribers_follow_writes_in_order() {
    let ctx = Observability::new(&RelayConfig::default());
    let cell = ctx.initialization_status();

    let mut early = cell.subscribe();
    assert!(!next_value(&mut early).await);

    cell.set_value(true);
    assert!(next_value(&mut early).await);

    let mut late = cell.subscribe();
    assert!(next_value(&mut late).await, "late subscriber starts from the current value");

    // Repeating the current value is not a change.
    cell.set_value(true);
    cell.set_value(false);
    assert!(!next_value(&mut early).await);
    assert!(!next_value(&mut late).await);

    drop(early);
    cell.set_value(true);
    assert!(next_value(&mut late).await, "detaching one subscriber leaves others intact");
    assert!(!ctx.indexing_status().get_value());
}

#[tokio::test]
async fn indexing_guard_is_observed_as_a_pulse() {
    let ctx = Observability::new(&RelayConfig::default());
    let mut stream = ctx.indexing_status().subscribe();
    assert!(!next_value(&mut stream).await);

    let guard = ctx.indexing_status().enter();
    assert!(next_value(&mut stream).await);
    drop(guard);
    assert!(!next_value(&mut stream).await);
}

#[tokio::test]
async fn context_serves_and_shuts_down_its_relay() {
    let dir = TempDir::new().unwrap();
    let ctx = std::sync::Arc::new(Observability::new(&config_in(&dir)));
    let server = tokio::spawn({
        let ctx = std::sync::Arc::clone(&ctx);
        async move { ctx.serve_relay().await }
    });

    let mut client = None;
    for _ in 0..500 {
        if let Ok(c) = RelayClient::connect(ctx.socket_path()).await {
            client = Some(c);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let mut client = client.expect("relay never came up");
    client
        .submit(Submission::new("ide.indexer", "Index", "42 files", Severity::Info))
        .await
        .unwrap();
    client.close().await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while ctx.store().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("record should arrive");

    ctx.shutdown();
    server.await.unwrap().unwrap();
    assert!(!ctx.socket_path().exists());
    assert_eq!(ctx.store().producers(), vec!["ide.indexer"]);
}
