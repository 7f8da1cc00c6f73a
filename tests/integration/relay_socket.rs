//! End-to-end relay tests over a real Unix socket.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use logrelay::bus::LogBus;
use logrelay::record::{Severity, ELLIPSIS};
use logrelay::relay::client::RelayClient;
use logrelay::relay::server::{serve, ServerSettings};
use logrelay::relay::{LogRelay, SubmitPolicy, Submission};
use logrelay::store::{LogFilter, LogStore};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct RunningRelay {
    relay: Arc<LogRelay>,
    socket: PathBuf,
    shutdown: CancellationToken,
    server: JoinHandle<std::io::Result<()>>,
    _dir: TempDir,
}

impl RunningRelay {
    fn start(store_capacity: usize) -> Self {
        let dir = TempDir::new().unwrap();
        Self::start_at(dir, store_capacity)
    }

    fn start_at(dir: TempDir, store_capacity: usize) -> Self {
        let socket = dir.path().join("relay.sock");
        let relay = LogRelay::shared(
            LogStore::shared(store_capacity),
            LogBus::new(16),
            SubmitPolicy::default(),
        );
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve(
            socket.clone(),
            Arc::clone(&relay),
            ServerSettings::default(),
            shutdown.clone(),
        ));
        Self {
            relay,
            socket,
            shutdown,
            server,
            _dir: dir,
        }
    }

    async fn stop(self) -> Arc<LogRelay> {
        self.shutdown.cancel();
        self.server.await.unwrap().unwrap();
        assert!(!self.socket.exists(), "socket file should be removed on shutdown");
        self.relay
    }
}

async fn connect(path: &Path) -> RelayClient {
    for _ in 0..500 {
        if let Ok(client) = RelayClient::connect(path).await {
            return client;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("relay never came up at {}", path.display());
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let reached = tokio::time::timeout(Duration::from_secs(10), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for {}", what);
}

#[tokio::test]
async fn submitted_records_round_trip_through_the_socket() {
    let running = RunningRelay::start(100);
    let mut live = running.relay.bus().subscribe();

    let mut client = connect(&running.socket).await;
    client.register("com.example.app").await.unwrap();
    client
        .submit(Submission::new("com.example.app", "Main", "started", Severity::Info))
        .await
        .unwrap();
    client
        .submit(Submission {
            producer_id: "com.example.app".to_string(),
            tag: "Net".to_string(),
            message: "retrying".to_string(),
            severity: 999,
            timestamp_ms: -5,
        })
        .await
        .unwrap();
    client.close().await.unwrap();

    let store = Arc::clone(running.relay.store());
    wait_until("two records", || store.len() == 2).await;

    let records = store.query(&LogFilter::new().producer("com.example.app"));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].tag(), "Main");
    assert_eq!(records[0].message(), "started");
    assert_eq!(records[1].severity(), Severity::Info);
    assert!(records[1].timestamp_ms() > 0);

    let first = tokio::time::timeout(Duration::from_secs(5), live.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&*first, "[com.example.app][INFO] Main: started");

    let relay = running.stop().await;
    let health = relay.health().snapshot();
    assert_eq!(health.accepted, 2);
    assert_eq!(health.severity_coerced, 1);
    assert_eq!(health.clock_adjusted, 1);
    assert_eq!(relay.producers(), vec!["com.example.app"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hundred_socket_producers_lose_nothing() {
    let running = RunningRelay::start(5000);

    let mut producers = Vec::new();
    for p in 0..100 {
        let socket = running.socket.clone();
        producers.push(tokio::spawn(async move {
            let producer = format!("producer-{p}");
            let mut client = connect(&socket).await;
            for i in 0..50 {
                client
                    .submit(Submission::new(&producer, "Load", i.to_string(), Severity::Debug))
                    .await
                    .unwrap();
            }
            client.close().await.unwrap();
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    let store = Arc::clone(running.relay.store());
    wait_until("5000 records", || store.len() == 5000).await;

    for p in 0..100 {
        let producer = format!("producer-{p}");
        let records = store.query(&LogFilter::new().producer(&producer));
        let messages: Vec<String> = records.iter().map(|r| r.message().to_string()).collect();
        let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        assert_eq!(messages, expected, "records for {producer} out of order or missing");
        assert!(records.iter().all(|r| r.tag() == "Load" && r.severity() == Severity::Debug));
    }

    let relay = running.stop().await;
    assert_eq!(relay.health().snapshot().connections_total, 100);
    assert_eq!(relay.producers().len(), 100);
}

#[tokio::test]
async fn misbehaving_client_does_not_disturb_others() {
    let running = RunningRelay::start(100);

    let mut rogue = UnixStream::connect(&running.socket).await;
    for _ in 0..100 {
        if rogue.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        rogue = UnixStream::connect(&running.socket).await;
    }
    let mut rogue = rogue.unwrap();
    rogue.write_all(b"{{{{ not a frame\n").await.unwrap();
    rogue
        .write_all(b"{\"op\":\"register\",\"producer_id\":\"\"}\n")
        .await
        .unwrap();
    drop(rogue);

    let mut client = connect(&running.socket).await;
    client
        .submit(Submission::new("good.app", "Main", "still here", Severity::Warn))
        .await
        .unwrap();
    client.close().await.unwrap();

    let store = Arc::clone(running.relay.store());
    wait_until("the good record", || store.len() == 1).await;
    let relay = Arc::clone(&running.relay);
    wait_until("the rogue to be dropped", || {
        relay.health().snapshot().rejected_identity == 1
    })
    .await;
    let relay = running.stop().await;

    let health = relay.health().snapshot();
    assert_eq!(health.malformed_frames, 1);
    assert_eq!(health.rejected_identity, 1);
    assert_eq!(relay.producers(), vec!["good.app"]);
}

#[tokio::test]
async fn stale_socket_file_is_replaced() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("relay.sock"), b"left over from a crash").unwrap();
    let running = RunningRelay::start_at(dir, 10);

    let mut client = connect(&running.socket).await;
    client
        .submit(Submission::new("pkg", "T", "fresh", Severity::Info))
        .await
        .unwrap();
    client.close().await.unwrap();

    let store = Arc::clone(running.relay.store());
    wait_until("one record", || store.len() == 1).await;
    running.stop().await;
}

#[tokio::test]
async fn messages_beyond_the_frame_limit_do_not_cost_later_records() {
    let running = RunningRelay::start(10);

    // A raw producer that ignores the message bound: its huge frame is skipped.
    let mut raw = None;
    for _ in 0..500 {
        if let Ok(stream) = UnixStream::connect(&running.socket).await {
            raw = Some(stream);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let mut raw = raw.expect("relay never came up");
    let huge = format!(
        "{{\"op\":\"submit\",\"producer_id\":\"raw\",\"tag\":\"T\",\"message\":\"{}\",\"severity\":4,\"timestamp_ms\":0}}\n",
        "x".repeat(70_000)
    );
    raw.write_all(huge.as_bytes()).await.unwrap();
    raw.write_all(b"{\"op\":\"submit\",\"producer_id\":\"raw\",\"tag\":\"T\",\"message\":\"after\",\"severity\":4,\"timestamp_ms\":0}\n")
        .await
        .unwrap();
    drop(raw);

    // The client cuts the message to the bound, so the record survives truncated.
    let mut client = connect(&running.socket).await;
    client
        .submit(Submission::new("client", "T", "y".repeat(70_000), Severity::Info))
        .await
        .unwrap();
    client.close().await.unwrap();

    let store = Arc::clone(running.relay.store());
    wait_until("both surviving records", || store.len() == 2).await;
    let relay = running.stop().await;

    let raw_records = store.query(&LogFilter::new().producer("raw"));
    assert_eq!(raw_records.len(), 1);
    assert_eq!(raw_records[0].message(), "after");

    let client_records = store.query(&LogFilter::new().producer("client"));
    assert_eq!(client_records.len(), 1);
    assert_eq!(client_records[0].message().chars().count(), 4096);
    assert!(client_records[0].message().ends_with(ELLIPSIS));

    assert_eq!(relay.health().snapshot().oversized_frames, 1);
}
