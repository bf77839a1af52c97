//! Transport capability for collect uploads.
//!
//! The dispatcher and forgetter speak to the network only through
//! [`Transport`], so tests can substitute a scripted implementation. The
//! production [`HttpTransport`] wraps reqwest; every fault it can encounter
//! becomes an outcome, never an error; retry policy lives with the caller.

use std::future::Future;
use tracing::warn;

/// Result of one upload attempt.
///
/// The collect service answers 204 with an empty body on success; anything
/// else, including a network-level failure, is a retryable failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportOutcome {
    /// HTTP status code; zero when the request never reached the server.
    pub status: u16,
    /// True when the failure happened below HTTP (DNS, TLS, timeout, ...).
    pub network_error: bool,
}

impl TransportOutcome {
    /// The sole success condition: 204 and no network-level failure.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == 204 && !self.network_error
    }
}

/// Capability that POSTs a JSON payload and reports the outcome.
pub trait Transport: Send + Sync {
    fn send(&self, url: &str, body: Vec<u8>) -> impl Future<Output = TransportOutcome> + Send;
}

/// Production transport backed by reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    async fn send(&self, url: &str, body: Vec<u8>) -> TransportOutcome {
        let result = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;

        match result {
            Ok(resp) => TransportOutcome {
                status: resp.status().as_u16(),
                network_error: false,
            },
            Err(e) => {
                warn!("collect upload failed at the network level: {e}");
                TransportOutcome {
                    status: 0,
                    network_error: true,
                }
            }
        }
    }
}
