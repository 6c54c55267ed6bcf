//! End-to-end tests for the beacon pipeline
//!
//! A real ingestion server runs on its own thread and runtime; the blocking
//! sender talks to it over HTTP from the test thread.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;

use beacon_client::{EventSender, SenderOptions};
use beacon_protocol::{Event, TextEncoding, WireFormat};
use beacon_sinks::{SchemaConfig, SchemaMapper, SqliteStorage, Storage, TableProvisioner};
use beacon_sources::{HttpSource, HttpSourceConfig};
use tempfile::TempDir;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

struct TestServer {
    addr: SocketAddr,
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl TestServer {
    fn start(database: PathBuf) -> Self {
        let (tx, rx) = mpsc::channel();
        let thread = std::thread::spawn(move || {
            let runtime = Runtime::new().unwrap();
            runtime.block_on(async move {
                let storage = SqliteStorage::open(&database).await.unwrap();
                let provisioner = Arc::new(TableProvisioner::new(
                    Arc::new(storage) as Arc<dyn Storage>,
                    SchemaMapper::new(SchemaConfig::default()).unwrap(),
                ));
                let source = HttpSource::new(HttpSourceConfig::default(), provisioner);

                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                let cancel = CancellationToken::new();
                tx.send((listener.local_addr().unwrap(), cancel.clone()))
                    .unwrap();
                source.serve(listener, cancel).await.unwrap();
            });
        });

        let (addr, cancel) = rx.recv().unwrap();
        Self {
            addr,
            cancel,
            thread: Some(thread),
        }
    }

    fn endpoint(&self) -> String {
        format!("http://{}/v1/events", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn query_count(database: &Path, sql: &str) -> i64 {
    Runtime::new().unwrap().block_on(async {
        let storage = SqliteStorage::open(database).await.unwrap();
        sqlx::query_scalar(sql)
            .fetch_one(storage.pool())
            .await
            .unwrap()
    })
}

fn query_text(database: &Path, sql: &str) -> String {
    Runtime::new().unwrap().block_on(async {
        let storage = SqliteStorage::open(database).await.unwrap();
        sqlx::query_scalar(sql)
            .fetch_one(storage.pool())
            .await
            .unwrap()
    })
}

/// Port with nothing listening on it
fn closed_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/v1/events")
}

fn page_view(n: i32) -> Event {
    Event::builder()
        .field("EventName", "page_view")
        .field("path", format!("/page/{n}"))
        .field("n", n)
        .field(
            "client",
            Event::builder().field("lang", "en").field("width", 1280_i32).build(),
        )
        .build()
}

#[test]
fn test_batch_reaches_database() {
    let dir = TempDir::new().unwrap();
    let database = dir.path().join("events.db");
    let server = TestServer::start(database.clone());

    let options = SenderOptions::new(&server.endpoint())
        .unwrap()
        .with_limits(2, 4)
        .unwrap()
        .with_queue_dir(dir.path().join("queue"));
    let sender = EventSender::new(options).unwrap();

    assert!(!sender.batch_event(&page_view(1)).unwrap());
    assert!(sender.batch_event(&page_view(2)).unwrap());
    assert_eq!(sender.pending_count().unwrap(), 0);

    drop(server);
    assert_eq!(query_count(&database, "SELECT COUNT(*) FROM \"page_view\""), 2);
    assert_eq!(
        query_text(
            &database,
            "SELECT \"client.lang\" FROM \"page_view\" ORDER BY \"EventRecordId\" LIMIT 1"
        ),
        "en"
    );
}

#[test]
fn test_offline_queue_survives_until_server_is_up() {
    let dir = TempDir::new().unwrap();
    let database = dir.path().join("events.db");
    let queue = dir.path().join("queue");

    let offline = SenderOptions::new(&closed_endpoint())
        .unwrap()
        .with_limits(2, 3)
        .unwrap()
        .with_queue_dir(&queue);
    let sender = EventSender::new(offline).unwrap();
    for n in 1..=4 {
        assert!(!sender.batch_event(&page_view(n)).unwrap());
    }
    assert_eq!(sender.pending_count().unwrap(), 3);
    drop(sender);

    let server = TestServer::start(database.clone());
    let online = SenderOptions::new(&server.endpoint())
        .unwrap()
        .with_limits(2, 3)
        .unwrap()
        .with_queue_dir(&queue);
    let sender = EventSender::new(online).unwrap();
    assert!(sender.flush().unwrap());
    assert_eq!(sender.pending_count().unwrap(), 0);

    drop(server);
    assert_eq!(query_count(&database, "SELECT COUNT(*) FROM \"page_view\""), 3);
    // The oldest event was evicted while offline
    assert_eq!(
        query_count(&database, "SELECT MIN(\"n\") FROM \"page_view\""),
        2
    );
}

#[test]
fn test_xml_ascii_send_now() {
    let dir = TempDir::new().unwrap();
    let database = dir.path().join("events.db");
    let server = TestServer::start(database.clone());

    let options = SenderOptions::new(&server.endpoint())
        .unwrap()
        .with_queue_dir(dir.path().join("queue"))
        .with_format(WireFormat::Xml)
        .with_encoding(TextEncoding::Ascii);
    let sender = EventSender::new(options).unwrap();

    let event = Event::builder()
        .field("EventName", "visit")
        .field("city", "Zürich")
        .build();
    assert!(sender.send_now(&event).unwrap());

    drop(server);
    assert_eq!(query_text(&database, "SELECT \"city\" FROM \"visit\""), "Zürich");
}

#[test]
fn test_unstorable_event_is_refused() {
    let dir = TempDir::new().unwrap();
    let database = dir.path().join("events.db");
    let server = TestServer::start(database);

    let options = SenderOptions::new(&server.endpoint())
        .unwrap()
        .with_queue_dir(dir.path().join("queue"));
    let sender = EventSender::new(options).unwrap();

    // Case-only duplicate columns cannot be provisioned
    let event = Event::builder().field("Total", 1_i32).field("total", 2_i32).build();
    assert!(!sender.send_now(&event).unwrap());
}
