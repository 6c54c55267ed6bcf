//! Beacon Client Library
//!
//! Captures events on the producer side, keeps them in a durable offline
//! queue and delivers them in batches over HTTP.
//!
//! # Architecture
//!
//! - [`SenderOptions`] - Validated configuration, one value per sender
//! - [`OfflineQueue`] - Directory of codec-encoded events, one file each
//! - [`EventSender`] - Batching, flushing and eviction policy
//! - [`Transport`] - Blocking delivery capability; [`HttpTransport`] by default
//!
//! # Quick Start
//!
//! ```no_run
//! use beacon_client::{EventSender, SenderOptions};
//! use beacon_protocol::Event;
//!
//! let options = SenderOptions::new("https://collector.example.com/v1/events")?
//!     .with_limits(10, 100)?;
//! let sender = EventSender::new(options)?;
//!
//! let event = Event::builder()
//!     .field("EventName", "page_view")
//!     .field("path", "/home")
//!     .build();
//!
//! // false means "queued, will retry on a later call"
//! let delivered = sender.batch_event(&event)?;
//! # let _ = delivered;
//! # Ok::<(), beacon_client::ClientError>(())
//! ```
//!
//! `EventSender` blocks the calling thread while delivering. From async
//! code, run it inside `spawn_blocking`.

mod error;
mod options;
mod queue;
mod sender;
mod transport;

pub use error::{ClientError, Result, TransportError};
pub use options::{
    DEFAULT_BATCH_SIZE, DEFAULT_MAX_OFFLINE_SAVED_EVENTS, DEFAULT_QUEUE_DIR, SenderOptions,
};
pub use queue::{OfflineQueue, QueueEntry};
pub use sender::EventSender;
pub use transport::{HttpTransport, Transport};

#[cfg(test)]
mod sender_test;
