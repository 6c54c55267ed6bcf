//! Delivery of encoded batches
//!
//! The sender only needs "deliver bytes with a MIME type, get a status
//! back", so delivery sits behind the [`Transport`] trait. [`HttpTransport`]
//! is the blocking HTTP implementation used outside tests.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;

use crate::error::TransportError;

/// HTTP request timeout
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking delivery channel
///
/// Implementations own their timeout and retry policy; the sender never
/// retries inside one call.
pub trait Transport: Send + Sync {
    /// Deliver one payload, returning `Ok(())` only when the server accepted it
    fn deliver(&self, destination: &Url, body: &[u8], content_type: &str) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn deliver(&self, destination: &Url, body: &[u8], content_type: &str) -> Result<(), TransportError> {
        (**self).deliver(destination, body, content_type)
    }
}

/// POSTs payloads over HTTP(S)
///
/// Any 2xx status counts as accepted.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the default timeout
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(HTTP_TIMEOUT)
    }

    /// Create a transport with a custom request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn deliver(&self, destination: &Url, body: &[u8], content_type: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .post(destination.clone())
            .header(CONTENT_TYPE, content_type)
            .body(body.to_vec())
            .send()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(status.as_u16()))
        }
    }
}
