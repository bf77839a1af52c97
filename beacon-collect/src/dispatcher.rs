//! Flush dispatcher.
//!
//! Orchestrates one flush cycle: serialize pending tokens, hand the payload
//! to the transport, then acknowledge or persist depending on the outcome.
//! At most one transmission is outstanding at a time; an external heartbeat
//! owns the retry cadence, so the dispatcher keeps no state between flushes
//! beyond the in-flight guard.

use crate::buffer::Buffer;
use crate::transport::Transport;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Drains one [`Buffer`] to the collect service.
pub struct Dispatcher<T: Transport> {
    buffer: Arc<Mutex<Buffer>>,
    transport: Arc<T>,
    collect_url: String,
    /// Single-flight guard; instance state, set for the lifetime of one
    /// transmission.
    sending: AtomicBool,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(
        buffer: Arc<Mutex<Buffer>>,
        transport: Arc<T>,
        collect_url: impl Into<String>,
    ) -> Self {
        Self {
            buffer,
            transport,
            collect_url: collect_url.into(),
            sending: AtomicBool::new(false),
        }
    }

    /// True while a transmission is outstanding.
    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Runs one flush cycle. A no-op while a prior transmission is still
    /// outstanding, and when there is nothing to send.
    ///
    /// The buffer lock is never held across the transport await, so the
    /// application keeps committing events mid-flight; those stay pending
    /// and ride the next flush.
    pub async fn flush(&self) {
        if self.sending.swap(true, Ordering::AcqRel) {
            debug!("flush skipped, upload already in flight");
            return;
        }

        let payload = { self.buffer.lock().await.serialize() };
        let Some(payload) = payload else {
            self.sending.store(false, Ordering::Release);
            return;
        };

        debug!(
            events = payload.events,
            bytes = payload.body.len(),
            "uploading collect batch"
        );
        let outcome = self
            .transport
            .send(&self.collect_url, payload.body.into_bytes())
            .await;

        let mut buffer = self.buffer.lock().await;
        if outcome.is_success() {
            if let Err(e) = buffer.remove_sent_tokens(payload.events) {
                warn!("failed to acknowledge uploaded events: {e}");
            }
            buffer.clear_disk_cache();
            debug!(events = payload.events, "collect batch acknowledged");
        } else {
            warn!(
                status = outcome.status,
                network_error = outcome.network_error,
                "collect upload failed, persisting pending events"
            );
            buffer.requeue_in_flight();
            buffer.flush_to_disk();
        }
        drop(buffer);

        self.sending.store(false, Ordering::Release);
    }
}
