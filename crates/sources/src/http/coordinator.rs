//! Ingestion coordinator
//!
//! Decodes a request body by its MIME type and persists every event
//! through the table provisioner. Events are independent: a failure is
//! recorded for that event and the rest of the batch still runs.

use std::sync::Arc;

use beacon_protocol::{ProtocolError, wire};
use beacon_sinks::TableProvisioner;
use tracing::{debug, warn};

use super::error::{EventFailure, IngestReport};
use super::metrics::IngestMetrics;

/// Bridges wire decoding to table provisioning
#[derive(Debug)]
pub struct IngestCoordinator {
    provisioner: Arc<TableProvisioner>,
    metrics: Arc<IngestMetrics>,
}

impl IngestCoordinator {
    /// Create a coordinator over a provisioner
    pub fn new(provisioner: Arc<TableProvisioner>, metrics: Arc<IngestMetrics>) -> Self {
        Self {
            provisioner,
            metrics,
        }
    }

    /// Decode and persist one request body
    ///
    /// # Errors
    ///
    /// Returns a `ProtocolError` when the body cannot be decoded at all
    /// (unknown MIME type, invalid text). Per-event storage failures are
    /// reported in the [`IngestReport`] instead.
    pub async fn ingest(
        &self,
        body: &[u8],
        content_type: &str,
    ) -> Result<IngestReport, ProtocolError> {
        let events = wire::deserialize_body(body, content_type)?;
        let mut report = IngestReport::default();

        for (index, event) in events.iter().enumerate() {
            match self.provisioner.persist(event).await {
                Ok(persisted) => {
                    report.accepted += 1;
                    report.tables_created += usize::from(persisted.created);
                    debug!(table = %persisted.table, "stored event");
                }
                Err(e) => {
                    let table = self
                        .provisioner
                        .mapper()
                        .identity_of(event)
                        .unwrap_or_else(|| "<unmapped>".to_string());
                    warn!(index, table = %table, error = %e, "failed to store event");
                    report.failures.push(EventFailure {
                        index,
                        detail: e.to_string(),
                    });
                }
            }
        }

        self.metrics
            .events_processed(report.accepted, report.failures.len());
        self.metrics.tables_created(report.tables_created);
        Ok(report)
    }
}
