//! Collect core for the Beacon analytics SDK.
//!
//! Buffers structured events as pre-serialized wire text and delivers them in
//! batches to the collect service:
//! - Stack-based incremental JSON writer with token-level acknowledgment
//! - Bounded append-only disk cache so unsent events survive process loss
//! - Single-flight dispatcher driven by an external heartbeat
//! - One-shot "forget me" uploader for erasure requests
//!
//! Flush cadence, consent, and session identity are the host's concern; this
//! crate only decides, per flush, whether to transmit, persist, or drop.

pub mod buffer;
pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod forgetter;
pub mod transport;

pub use buffer::{Buffer, Payload};
pub use cache::DiskCache;
pub use config::CollectConfig;
pub use dispatcher::Dispatcher;
pub use error::{CollectError, CollectResult};
pub use forgetter::Forgetter;
pub use transport::{HttpTransport, Transport, TransportOutcome};
