//! Tests for EventSender batching, eviction and delivery

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use beacon_protocol::{Event, LeafValue, ProtocolError, TextEncoding, WireFormat, codec, wire};
use parking_lot::Mutex;
use reqwest::Url;
use tempfile::TempDir;

use crate::error::TransportError;
use crate::{ClientError, EventSender, SenderOptions, Transport};

const ENDPOINT: &str = "http://collector.test/v1/events";

// =============================================================================
// Test transport
// =============================================================================

#[derive(Debug, Clone)]
struct Delivery {
    destination: String,
    body: String,
    content_type: String,
}

#[derive(Debug, Default)]
struct RecordingTransport {
    failing: AtomicBool,
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingTransport {
    fn succeeding() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn failing() -> Arc<Self> {
        let transport = Self::default();
        transport.failing.store(true, Ordering::SeqCst);
        Arc::new(transport)
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    fn attempts(&self) -> usize {
        self.deliveries.lock().len()
    }
}

impl Transport for RecordingTransport {
    fn deliver(&self, destination: &Url, body: &[u8], content_type: &str) -> Result<(), TransportError> {
        self.deliveries.lock().push(Delivery {
            destination: destination.to_string(),
            body: String::from_utf8_lossy(body).into_owned(),
            content_type: content_type.to_string(),
        });
        if self.failing.load(Ordering::SeqCst) {
            Err(TransportError::Status(503))
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn sender(
    dir: &TempDir,
    batch_size: usize,
    max: usize,
    transport: &Arc<RecordingTransport>,
) -> EventSender<Arc<RecordingTransport>> {
    let options = SenderOptions::new(ENDPOINT)
        .unwrap()
        .with_limits(batch_size, max)
        .unwrap()
        .with_queue_dir(dir.path().join("EventBatches"));
    EventSender::with_transport(options, Arc::clone(transport)).unwrap()
}

fn numbered(n: i64) -> Event {
    Event::builder().field("EventName", "click").field("n", n).build()
}

fn numbers_in_body(body: &str) -> Vec<i64> {
    wire::deserialize(body, WireFormat::Json)
        .unwrap()
        .iter()
        .map(number_of)
        .collect()
}

fn number_of(event: &Event) -> i64 {
    match event.get("n").and_then(Event::as_leaf) {
        Some(LeafValue::I64(n)) => *n,
        other => panic!("unexpected n: {other:?}"),
    }
}

fn queued_numbers(sender: &EventSender<Arc<RecordingTransport>>) -> Vec<i64> {
    let queue = sender.queue();
    queue
        .entries()
        .unwrap()
        .iter()
        .map(|entry| number_of(&codec::decode(&queue.read(entry).unwrap()).unwrap()))
        .collect()
}

// =============================================================================
// Threshold and flush
// =============================================================================

#[test]
fn test_batch_threshold_flushes_on_second_event() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::succeeding();
    let sender = sender(&dir, 2, 3, &transport);

    assert!(!sender.batch_event(&numbered(1)).unwrap());
    assert_eq!(transport.attempts(), 0);
    assert!(sender.batch_event(&numbered(2)).unwrap());

    assert_eq!(sender.pending_count().unwrap(), 0);
    assert_eq!(fs::read_dir(sender.queue().dir()).unwrap().count(), 0);
    assert_eq!(transport.attempts(), 1);
}

#[test]
fn test_flush_is_fifo_and_uses_sequence_shape() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::succeeding();
    let sender = sender(&dir, 3, 3, &transport);

    for n in 1..=3 {
        sender.batch_event(&numbered(n)).unwrap();
    }

    let deliveries = transport.deliveries();
    assert!(deliveries[0].body.starts_with('['));
    assert_eq!(numbers_in_body(&deliveries[0].body), vec![1, 2, 3]);
}

#[test]
fn test_delivery_target_and_content_type() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::succeeding();
    let options = SenderOptions::new(ENDPOINT)
        .unwrap()
        .with_queue_dir(dir.path())
        .with_format(WireFormat::Xml)
        .with_encoding(TextEncoding::Ascii);
    let sender = EventSender::with_transport(options, Arc::clone(&transport)).unwrap();

    assert!(sender.send_now(&numbered(7)).unwrap());

    let delivery = &transport.deliveries()[0];
    assert_eq!(delivery.destination, ENDPOINT);
    assert_eq!(delivery.content_type, "application/xml; charset=us-ascii");
    assert!(delivery.body.contains("<events>"));
}

// =============================================================================
// Failure and eviction
// =============================================================================

#[test]
fn test_eviction_keeps_most_recent() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::failing();
    let sender = sender(&dir, 2, 3, &transport);

    for n in 1..=4 {
        assert!(!sender.batch_event(&numbered(n)).unwrap());
    }

    assert_eq!(sender.pending_count().unwrap(), 3);
    assert_eq!(queued_numbers(&sender), vec![2, 3, 4]);
}

#[test]
fn test_eviction_holds_at_max_under_sustained_failure() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::failing();
    let sender = sender(&dir, 1, 2, &transport);

    for n in 1..=10 {
        assert!(!sender.batch_event(&numbered(n)).unwrap());
        assert!(sender.pending_count().unwrap() <= 2);
    }
    assert_eq!(queued_numbers(&sender), vec![9, 10]);
}

#[test]
fn test_failed_flush_retries_on_next_threshold_call() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::failing();
    let sender = sender(&dir, 2, 5, &transport);

    assert!(!sender.batch_event(&numbered(1)).unwrap());
    assert!(!sender.batch_event(&numbered(2)).unwrap());
    assert_eq!(transport.attempts(), 1);
    assert_eq!(sender.pending_count().unwrap(), 2);

    transport.set_failing(false);
    assert!(sender.batch_event(&numbered(3)).unwrap());

    let deliveries = transport.deliveries();
    assert_eq!(deliveries.len(), 2);
    assert_eq!(numbers_in_body(&deliveries[1].body), vec![1, 2, 3]);
    assert_eq!(sender.pending_count().unwrap(), 0);
}

// =============================================================================
// Immediate sends
// =============================================================================

#[test]
fn test_send_now_bypasses_queue() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::succeeding();
    let sender = sender(&dir, 2, 3, &transport);

    sender.batch_event(&numbered(1)).unwrap();
    assert!(sender.send_now(&numbered(99)).unwrap());

    assert_eq!(numbers_in_body(&transport.deliveries()[0].body), vec![99]);
    assert_eq!(queued_numbers(&sender), vec![1]);
}

#[test]
fn test_send_now_failure_returns_false() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::failing();
    let sender = sender(&dir, 2, 3, &transport);

    assert!(!sender.send_now(&numbered(1)).unwrap());
    assert_eq!(sender.pending_count().unwrap(), 0);
}

#[test]
fn test_send_batch_now() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::succeeding();
    let sender = sender(&dir, 2, 3, &transport);

    let events: Vec<Event> = (1..=4).map(numbered).collect();
    assert!(sender.send_batch_now(&events).unwrap());
    assert_eq!(numbers_in_body(&transport.deliveries()[0].body), vec![1, 2, 3, 4]);
}

// =============================================================================
// Queue maintenance
// =============================================================================

#[test]
fn test_flush_empty_queue_is_noop() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::succeeding();
    let sender = sender(&dir, 2, 3, &transport);

    assert!(sender.flush().unwrap());
    assert_eq!(transport.attempts(), 0);
}

#[test]
fn test_flush_below_threshold() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::failing();
    let sender = sender(&dir, 3, 3, &transport);

    sender.batch_event(&numbered(1)).unwrap();
    sender.batch_event(&numbered(2)).unwrap();

    assert!(!sender.flush().unwrap());
    assert_eq!(sender.pending_count().unwrap(), 2);

    transport.set_failing(false);
    assert!(sender.flush().unwrap());
    assert_eq!(sender.pending_count().unwrap(), 0);
}

#[test]
fn test_clear() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::failing();
    let sender = sender(&dir, 3, 3, &transport);

    sender.batch_event(&numbered(1)).unwrap();
    sender.batch_event(&numbered(2)).unwrap();

    assert_eq!(sender.clear().unwrap(), 2);
    assert_eq!(sender.pending_count().unwrap(), 0);
}

#[test]
fn test_unreadable_entry_is_dropped_during_flush() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::succeeding();
    let sender = sender(&dir, 2, 3, &transport);

    let garbage = sender.queue().dir().join("00000000000000000001-garbage");
    fs::write(&garbage, [0xff, 0x00, 0x13]).unwrap();

    assert!(sender.batch_event(&numbered(5)).unwrap());
    assert!(!garbage.exists());
    assert_eq!(numbers_in_body(&transport.deliveries()[0].body), vec![5]);
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_encode_error_propagates_and_queues_nothing() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::succeeding();
    let sender = sender(&dir, 2, 3, &transport);

    let mut deep = Event::from(1_i32);
    for _ in 0..100 {
        deep = Event::builder().field("inner", deep).build();
    }

    let err = sender.batch_event(&deep).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Protocol(ProtocolError::CycleDetected { .. })
    ));
    assert_eq!(sender.pending_count().unwrap(), 0);
}

#[test]
fn test_wire_error_propagates_from_send_now() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::succeeding();
    let options = SenderOptions::new(ENDPOINT)
        .unwrap()
        .with_queue_dir(dir.path())
        .with_format(WireFormat::Csv)
        .with_encoding(TextEncoding::Ascii);
    let sender = EventSender::with_transport(options, Arc::clone(&transport)).unwrap();

    let event = Event::builder().field("city", "Zürich").build();
    assert!(matches!(
        sender.send_now(&event).unwrap_err(),
        ClientError::Protocol(ProtocolError::UnsupportedType(_))
    ));
    assert_eq!(transport.attempts(), 0);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_callers_deliver_each_event_once() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::succeeding();
    let sender = Arc::new(sender(&dir, 3, 100, &transport));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let sender = Arc::clone(&sender);
            thread::spawn(move || {
                for i in 0..5 {
                    sender.batch_event(&numbered(t * 100 + i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut seen: Vec<i64> = transport
        .deliveries()
        .iter()
        .flat_map(|d| numbers_in_body(&d.body))
        .chain(queued_numbers(&sender))
        .collect();
    seen.sort_unstable();

    let mut expected: Vec<i64> = (0..8).flat_map(|t| (0..5).map(move |i| t * 100 + i)).collect();
    expected.sort_unstable();
    assert_eq!(seen, expected);
}
