//! Event sender: offline queue plus batching and eviction policy
//!
//! `batch_event` persists the event, and once `batch_size` entries are
//! queued it tries to deliver them all in one request:
//!
//! ```text
//! encode ──► queue.push ──► entries ≥ batch_size? ──no──► false
//!                                   │ yes
//!                          decode all, serialize
//!                                   │
//!                          transport.deliver ──ok──► delete flushed ──► true
//!                                   │ err
//!                          evict oldest while count > max ──► false
//! ```
//!
//! Transport failures never surface as errors; they become `false` and
//! the entries wait for the next call that reaches the threshold.
//! Encoding and queue I/O failures are returned to the caller.
//!
//! The list/flush/delete sequence runs under one lock per sender, so
//! callers on several threads never double-deliver or delete an entry
//! that another call is still reading.

use std::slice;

use beacon_protocol::{Event, codec, wire};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::options::SenderOptions;
use crate::queue::{OfflineQueue, QueueEntry};
use crate::transport::{HttpTransport, Transport};

/// Batches events through an offline queue and delivers them
pub struct EventSender<T = HttpTransport> {
    options: SenderOptions,
    queue: OfflineQueue,
    transport: T,
    flush_lock: Mutex<()>,
}

impl EventSender<HttpTransport> {
    /// Create a sender delivering over HTTP
    ///
    /// # Errors
    ///
    /// Fails if the queue directory cannot be created or the HTTP client
    /// cannot be built.
    pub fn new(options: SenderOptions) -> Result<Self> {
        let transport = HttpTransport::new()?;
        Self::with_transport(options, transport)
    }
}

impl<T: Transport> EventSender<T> {
    /// Create a sender with a custom transport
    pub fn with_transport(options: SenderOptions, transport: T) -> Result<Self> {
        let queue = OfflineQueue::open(options.queue_dir())?;
        Ok(Self {
            options,
            queue,
            transport,
            flush_lock: Mutex::new(()),
        })
    }

    /// Options this sender was built with
    #[inline]
    pub fn options(&self) -> &SenderOptions {
        &self.options
    }

    /// Underlying offline queue
    #[inline]
    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    /// Queue an event and flush once the batch threshold is reached
    ///
    /// Returns `true` only if a flush including this event was acknowledged.
    /// `false` means the event is queued for a later attempt, or was evicted
    /// if the queue overflowed.
    pub fn batch_event(&self, event: &Event) -> Result<bool> {
        let payload = codec::encode(event)?;

        let _guard = self.flush_lock.lock();
        self.queue.push(&payload)?;

        let entries = self.queue.entries()?;
        if entries.len() < self.options.batch_size() {
            return Ok(false);
        }

        if self.flush_entries(&entries)? {
            return Ok(true);
        }

        self.evict()?;
        Ok(false)
    }

    /// Deliver one event immediately, bypassing the queue
    pub fn send_now(&self, event: &Event) -> Result<bool> {
        self.deliver(slice::from_ref(event))
    }

    /// Deliver a sequence of events immediately, bypassing the queue
    pub fn send_batch_now(&self, events: &[Event]) -> Result<bool> {
        self.deliver(events)
    }

    /// Deliver everything queued, regardless of the threshold
    ///
    /// A failed flush keeps every entry; nothing is evicted.
    pub fn flush(&self) -> Result<bool> {
        let _guard = self.flush_lock.lock();
        let entries = self.queue.entries()?;
        if entries.is_empty() {
            return Ok(true);
        }
        self.flush_entries(&entries)
    }

    /// Delete every queued entry, returning how many were removed
    pub fn clear(&self) -> Result<usize> {
        let _guard = self.flush_lock.lock();
        let entries = self.queue.entries()?;
        for entry in &entries {
            self.queue.remove(entry)?;
        }
        Ok(entries.len())
    }

    /// Number of events waiting in the queue
    pub fn pending_count(&self) -> Result<usize> {
        self.queue.len()
    }

    /// Decode, deliver and delete the given entries (caller holds the lock)
    fn flush_entries(&self, entries: &[QueueEntry]) -> Result<bool> {
        let mut events = Vec::with_capacity(entries.len());
        let mut flushed = Vec::with_capacity(entries.len());

        for entry in entries {
            let payload = self.queue.read(entry)?;
            match codec::decode(&payload) {
                Ok(event) => {
                    events.push(event);
                    flushed.push(entry);
                }
                Err(e) => {
                    warn!(entry = %entry.name(), error = %e, "dropping unreadable queue entry");
                    self.queue.remove(entry)?;
                }
            }
        }

        if events.is_empty() {
            return Ok(true);
        }
        if !self.deliver(&events)? {
            return Ok(false);
        }

        for entry in flushed {
            self.queue.remove(entry)?;
        }
        debug!(events = events.len(), "flushed offline queue");
        Ok(true)
    }

    /// Drop the oldest entries until at most `max_offline_saved_events` remain
    fn evict(&self) -> Result<()> {
        let entries = self.queue.entries()?;
        let excess = entries
            .len()
            .saturating_sub(self.options.max_offline_saved_events());

        for entry in &entries[..excess] {
            self.queue.remove(entry)?;
            debug!(entry = %entry.name(), "evicted queued event");
        }
        if excess > 0 {
            warn!(
                evicted = excess,
                remaining = entries.len() - excess,
                "offline queue full, dropped oldest events"
            );
        }
        Ok(())
    }

    /// Serialize and send; transport failures become `Ok(false)`
    fn deliver(&self, events: &[Event]) -> Result<bool> {
        let body = wire::serialize_with(events, self.options.format(), self.options.encoding())?;
        let content_type = self.options.content_type();

        match self
            .transport
            .deliver(self.options.endpoint(), body.as_bytes(), &content_type)
        {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(
                    endpoint = %self.options.endpoint(),
                    events = events.len(),
                    error = %e,
                    "event delivery failed"
                );
                Ok(false)
            }
        }
    }
}

impl<T> std::fmt::Debug for EventSender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender")
            .field("options", &self.options)
            .field("queue", &self.queue.dir())
            .finish_non_exhaustive()
    }
}
