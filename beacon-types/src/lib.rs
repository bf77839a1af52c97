//! Shared event model for the Beacon analytics SDK.
//!
//! An [`Event`] is what the application layer assembles before handing it to
//! the collect buffer: a name, an optional schema version, and an ordered set
//! of typed parameters. The buffer walks this model and writes it out as wire
//! text; nothing here touches the network or the disk.

pub mod event;

pub use event::{Event, EventData, Value};
