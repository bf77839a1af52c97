//! One-shot "forget me" uploader.
//!
//! Carries a single fixed erasure event, sent on every heartbeat until the
//! collect service acknowledges it, then never again for the lifetime of the
//! instance. No buffer or disk machinery: the payload is baked once at
//! construction and is cheap to hold in memory across retries.

use crate::error::CollectResult;
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use uuid::Uuid;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Uploads the fixed `ddnaForgetMe` event until it is acknowledged.
pub struct Forgetter<T: Transport> {
    collect_url: String,
    event: Vec<u8>,
    transport: Arc<T>,
    on_success: Box<dyn Fn() + Send + Sync>,
    sending: AtomicBool,
    succeeded: AtomicBool,
}

impl<T: Transport> Forgetter<T> {
    /// Bakes the erasure payload with a fresh event UUID. `calling_method`
    /// records which SDK entry point triggered the request.
    pub fn new(
        collect_url: impl Into<String>,
        transport: Arc<T>,
        user_id: &str,
        timestamp: DateTime<Utc>,
        client_version: &str,
        calling_method: &str,
        on_success: impl Fn() + Send + Sync + 'static,
    ) -> CollectResult<Self> {
        let event = forget_me_payload(user_id, timestamp, client_version, calling_method)?;
        Ok(Self {
            collect_url: collect_url.into(),
            event: event.into_bytes(),
            transport,
            on_success: Box::new(on_success),
            sending: AtomicBool::new(false),
            succeeded: AtomicBool::new(false),
        })
    }

    /// True once the collect service has acknowledged the erasure event.
    pub fn has_succeeded(&self) -> bool {
        self.succeeded.load(Ordering::Acquire)
    }

    /// Sends the erasure event. Idempotent: a no-op while a request is in
    /// flight or after a prior attempt succeeded, so it is safe to call on
    /// every heartbeat. On success the callback fires exactly once.
    pub async fn attempt_to_forget(&self) {
        if self.succeeded.load(Ordering::Acquire) {
            return;
        }
        if self.sending.swap(true, Ordering::AcqRel) {
            return;
        }

        let outcome = self
            .transport
            .send(&self.collect_url, self.event.clone())
            .await;

        if outcome.is_success() {
            self.succeeded.store(true, Ordering::Release);
            (self.on_success)();
            debug!("forget-me event acknowledged");
        } else {
            debug!(
                status = outcome.status,
                network_error = outcome.network_error,
                "forget-me upload failed, will retry on the next attempt"
            );
        }

        self.sending.store(false, Ordering::Release);
    }
}

/// Field order is fixed by the collect service, so the payload is assembled
/// by hand rather than through a serde map.
fn forget_me_payload(
    user_id: &str,
    timestamp: DateTime<Utc>,
    client_version: &str,
    calling_method: &str,
) -> CollectResult<String> {
    let mut body = String::with_capacity(256);
    body.push_str("{\"eventList\":[{\"eventName\":\"ddnaForgetMe\",\"userID\":");
    body.push_str(&serde_json::to_string(user_id)?);
    body.push_str(",\"eventUUID\":\"");
    body.push_str(&Uuid::new_v4().to_string());
    body.push_str("\",\"eventTimestamp\":\"");
    body.push_str(&timestamp.format(TIMESTAMP_FORMAT).to_string());
    body.push_str("\",\"eventVersion\":1,\"eventParams\":{\"clientVersion\":");
    body.push_str(&serde_json::to_string(client_version)?);
    body.push_str(",\"sdkMethod\":");
    body.push_str(&serde_json::to_string(calling_method)?);
    body.push_str("}}]}");
    Ok(body)
}
