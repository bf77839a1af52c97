//! Append-only collect buffer.
//!
//! Events are written incrementally into one contiguous text buffer by a
//! stack-based JSON writer; each committed event is recorded as a token (a
//! byte span) so a partial acknowledgment can drop exactly the events that
//! were delivered. The serialized text is the single source of truth; there
//! is no parsed document tree.
//!
//! The buffer is single-writer. Hosts that share it between the application
//! task and the dispatcher wrap it in a `tokio::sync::Mutex`, which is what
//! [`Dispatcher`](crate::dispatcher::Dispatcher) does.

use crate::cache::DiskCache;
use crate::error::{CollectError, CollectResult};
use beacon_types::{Event, Value};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The unit of acknowledgment: one committed event's span in the buffer text.
#[derive(Clone, Copy, Debug)]
struct Token {
    start: usize,
    len: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Object,
    Array,
}

/// One writer stack level: the open container kind plus whether the next
/// sibling needs a leading comma.
struct Frame {
    scope: Scope,
    needs_separator: bool,
}

/// A serialized batch handed to the transport.
#[derive(Clone, Debug)]
pub struct Payload {
    /// The full `{"eventList":[...]}` envelope.
    pub body: String,
    /// How many tokens the envelope covers; passed back to
    /// [`Buffer::remove_sent_tokens`] on acknowledgment.
    pub events: usize,
}

/// Accumulates committed event text, the token ledger, and the disk mirror.
pub struct Buffer {
    user_id: String,
    session_id: String,
    text: String,
    tokens: Vec<Token>,
    /// Leading tokens included in the outstanding transmission.
    in_flight: usize,
    /// Nested containers of the open event; the bottom frame is `eventParams`.
    stack: Vec<Frame>,
    /// Byte offset where the open event's fragment begins.
    fragment_start: Option<usize>,
    cache: DiskCache,
}

impl Buffer {
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        cache: DiskCache,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            text: String::new(),
            tokens: Vec::new(),
            in_flight: 0,
            stack: Vec::new(),
            fragment_start: None,
            cache,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Committed events not covered by an outstanding transmission.
    pub fn pending_events(&self) -> usize {
        self.tokens.len() - self.in_flight
    }

    /// Committed events covered by the outstanding transmission.
    pub fn in_flight_events(&self) -> usize {
        self.in_flight
    }

    /// True when no events have been committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    // ── Event writer ──

    /// Opens a new event and writes its fragment header. Fails if an event
    /// is already open.
    pub fn push_start_event(
        &mut self,
        name: &str,
        timestamp: DateTime<Utc>,
        version: Option<i32>,
    ) -> CollectResult<()> {
        if self.fragment_start.is_some() {
            return Err(CollectError::InvalidSequence(
                "an event is already open".to_string(),
            ));
        }

        self.fragment_start = Some(self.text.len());
        self.text.push_str("{\"eventName\":");
        self.text.push_str(&serde_json::to_string(name)?);
        self.text.push_str(",\"userID\":");
        self.text.push_str(&serde_json::to_string(&self.user_id)?);
        self.text.push_str(",\"sessionID\":");
        self.text.push_str(&serde_json::to_string(&self.session_id)?);
        self.text.push_str(",\"eventTimestamp\":\"");
        self.text
            .push_str(&timestamp.format(TIMESTAMP_FORMAT).to_string());
        self.text.push('"');
        if let Some(version) = version {
            self.text.push_str(",\"eventVersion\":");
            self.text.push_str(&version.to_string());
        }
        self.text.push_str(",\"eventParams\":{");
        self.stack.push(Frame {
            scope: Scope::Object,
            needs_separator: false,
        });
        Ok(())
    }

    /// Closes the open event and commits it as a token. Fails if a nested
    /// container is still open.
    pub fn push_end_event(&mut self) -> CollectResult<()> {
        let Some(start) = self.fragment_start else {
            return Err(CollectError::InvalidSequence(
                "no event is open".to_string(),
            ));
        };
        if self.stack.len() > 1 {
            return Err(CollectError::InvalidSequence(
                "a nested container is still open".to_string(),
            ));
        }

        self.stack.pop();
        self.text.push_str("}}");
        self.tokens.push(Token {
            start,
            len: self.text.len() - start,
        });
        self.fragment_start = None;
        Ok(())
    }

    pub fn push_int(&mut self, value: i32, key: Option<&str>) -> CollectResult<()> {
        self.push_raw(key, &value.to_string())
    }

    pub fn push_int64(&mut self, value: i64, key: Option<&str>) -> CollectResult<()> {
        self.push_raw(key, &value.to_string())
    }

    pub fn push_float(&mut self, value: f32, key: Option<&str>) -> CollectResult<()> {
        if !value.is_finite() {
            return Err(CollectError::InvalidSequence(
                "non-finite float parameter".to_string(),
            ));
        }
        self.push_raw(key, &value.to_string())
    }

    pub fn push_double(&mut self, value: f64, key: Option<&str>) -> CollectResult<()> {
        if !value.is_finite() {
            return Err(CollectError::InvalidSequence(
                "non-finite double parameter".to_string(),
            ));
        }
        self.push_raw(key, &value.to_string())
    }

    pub fn push_bool(&mut self, value: bool, key: Option<&str>) -> CollectResult<()> {
        self.push_raw(key, if value { "true" } else { "false" })
    }

    pub fn push_string(&mut self, value: &str, key: Option<&str>) -> CollectResult<()> {
        let rendered = serde_json::to_string(value)?;
        self.push_raw(key, &rendered)
    }

    /// Appends a timestamp rendered as a quoted `yyyy-MM-dd HH:mm:ss` UTC
    /// string.
    pub fn push_timestamp(
        &mut self,
        value: DateTime<Utc>,
        key: Option<&str>,
    ) -> CollectResult<()> {
        let rendered = format!("\"{}\"", value.format(TIMESTAMP_FORMAT));
        self.push_raw(key, &rendered)
    }

    pub fn push_object_start(&mut self, key: Option<&str>) -> CollectResult<()> {
        self.open_container(Scope::Object, key)
    }

    pub fn push_object_end(&mut self) -> CollectResult<()> {
        self.close_container(Scope::Object)
    }

    pub fn push_array_start(&mut self, key: Option<&str>) -> CollectResult<()> {
        self.open_container(Scope::Array, key)
    }

    pub fn push_array_end(&mut self) -> CollectResult<()> {
        self.close_container(Scope::Array)
    }

    /// Writes an assembled [`Event`] through the push API, recursing into
    /// nested objects and arrays.
    pub fn push_event(&mut self, event: &Event, timestamp: DateTime<Utc>) -> CollectResult<()> {
        self.push_start_event(event.name(), timestamp, event.version())?;
        for (key, value) in event.parameters.iter() {
            self.push_value(value, Some(key))?;
        }
        self.push_end_event()
    }

    fn push_value(&mut self, value: &Value, key: Option<&str>) -> CollectResult<()> {
        match value {
            Value::Int32(v) => self.push_int(*v, key),
            Value::Int64(v) => self.push_int64(*v, key),
            Value::Float32(v) => self.push_float(*v, key),
            Value::Float64(v) => self.push_double(*v, key),
            Value::Bool(v) => self.push_bool(*v, key),
            Value::String(v) => self.push_string(v, key),
            Value::Timestamp(v) => self.push_timestamp(*v, key),
            Value::Object(data) => {
                self.push_object_start(key)?;
                for (nested_key, nested) in data.iter() {
                    self.push_value(nested, Some(nested_key))?;
                }
                self.push_object_end()
            }
            Value::Array(items) => {
                self.push_array_start(key)?;
                for item in items {
                    self.push_value(item, None)?;
                }
                self.push_array_end()
            }
        }
    }

    /// Writes the separator and optional key for the next item in the open
    /// container, enforcing the key discipline: required inside objects,
    /// forbidden inside arrays.
    fn begin_item(&mut self, key: Option<&str>) -> CollectResult<String> {
        let Some(frame) = self.stack.last_mut() else {
            return Err(CollectError::InvalidSequence(
                "no event is open".to_string(),
            ));
        };

        let mut prefix = String::new();
        if frame.needs_separator {
            prefix.push(',');
        }
        match (frame.scope, key) {
            (Scope::Object, Some(key)) => {
                prefix.push_str(&serde_json::to_string(key)?);
                prefix.push(':');
            }
            (Scope::Object, None) => {
                return Err(CollectError::InvalidSequence(
                    "a key is required inside an object".to_string(),
                ));
            }
            (Scope::Array, None) => {}
            (Scope::Array, Some(_)) => {
                return Err(CollectError::InvalidSequence(
                    "a named value is not valid inside an array".to_string(),
                ));
            }
        }
        frame.needs_separator = true;
        Ok(prefix)
    }

    fn push_raw(&mut self, key: Option<&str>, rendered: &str) -> CollectResult<()> {
        let prefix = self.begin_item(key)?;
        self.text.push_str(&prefix);
        self.text.push_str(rendered);
        Ok(())
    }

    fn open_container(&mut self, scope: Scope, key: Option<&str>) -> CollectResult<()> {
        let prefix = self.begin_item(key)?;
        self.text.push_str(&prefix);
        self.text.push(match scope {
            Scope::Object => '{',
            Scope::Array => '[',
        });
        self.stack.push(Frame {
            scope,
            needs_separator: false,
        });
        Ok(())
    }

    fn close_container(&mut self, scope: Scope) -> CollectResult<()> {
        // The bottom frame is `eventParams`; only push_end_event may close it.
        if self.stack.len() <= 1 {
            return Err(CollectError::InvalidSequence(
                "no nested container is open".to_string(),
            ));
        }
        let frame = &self.stack[self.stack.len() - 1];
        if frame.scope != scope {
            return Err(CollectError::InvalidSequence(match scope {
                Scope::Object => "the open container is an array, not an object".to_string(),
                Scope::Array => "the open container is an object, not an array".to_string(),
            }));
        }

        self.stack.pop();
        self.text.push(match scope {
            Scope::Object => '}',
            Scope::Array => ']',
        });
        Ok(())
    }

    // ── Serialize / acknowledge / persist protocol ──

    /// Wraps all pending tokens in the `eventList` envelope and marks them
    /// in-flight. Returns `None` when there is nothing to send; a second call
    /// with no new commits and no requeue also returns `None`.
    pub fn serialize(&mut self) -> Option<Payload> {
        let pending = &self.tokens[self.in_flight..];
        if pending.is_empty() {
            return None;
        }

        let mut body = String::with_capacity(self.text.len() + 32);
        body.push_str("{\"eventList\":[");
        for (i, token) in pending.iter().enumerate() {
            if i > 0 {
                body.push(',');
            }
            body.push_str(&self.text[token.start..token.start + token.len]);
        }
        body.push_str("]}");

        let events = pending.len();
        self.in_flight = self.tokens.len();
        Some(Payload { body, events })
    }

    /// Permanently removes the first `count` in-flight tokens after a
    /// confirmed acknowledgment. Order-preserving and exact: only tokens
    /// covered by the last [`serialize`](Buffer::serialize) are eligible.
    pub fn remove_sent_tokens(&mut self, count: usize) -> CollectResult<()> {
        if count > self.in_flight {
            return Err(CollectError::InvalidSequence(format!(
                "acknowledged {count} events but only {} are in flight",
                self.in_flight
            )));
        }
        if count == 0 {
            return Ok(());
        }

        let cut = {
            let last = self.tokens[count - 1];
            last.start + last.len
        };
        self.text.drain(..cut);
        self.tokens.drain(..count);
        for token in &mut self.tokens {
            token.start -= cut;
        }
        if let Some(start) = &mut self.fragment_start {
            *start -= cut;
        }
        self.in_flight -= count;
        Ok(())
    }

    /// Returns in-flight tokens to pending after a failed transmission, so
    /// the next serialize re-sends the identical batch (at-least-once).
    pub fn requeue_in_flight(&mut self) {
        self.in_flight = 0;
    }

    // ── Disk mirror ──

    /// Appends all committed fragment text (in-flight or not) to the disk
    /// cache, one event per line. Silent and non-fatal when the cache is at
    /// capacity or the write fails; in-memory state is untouched either way.
    pub fn flush_to_disk(&self) {
        if self.tokens.is_empty() {
            return;
        }

        let mut chunk = String::with_capacity(self.text.len() + self.tokens.len());
        for token in &self.tokens {
            chunk.push_str(&self.text[token.start..token.start + token.len]);
            chunk.push('\n');
        }

        match self.cache.append(&chunk) {
            Ok(true) => debug!(
                events = self.tokens.len(),
                bytes = chunk.len(),
                "collect buffer mirrored to disk"
            ),
            Ok(false) => {}
            Err(e) => warn!("failed to mirror collect buffer to disk: {e}"),
        }
    }

    /// Deletes the disk mirror. Called after a confirmed acknowledgment, or
    /// when a recovered in-memory buffer supersedes the mirror.
    pub fn clear_disk_cache(&self) {
        if let Err(e) = self.cache.clear() {
            warn!("failed to clear disk cache: {e}");
        }
    }

    /// Reads the disk mirror back into pending tokens and deletes the file.
    /// Single-use recovery: if the process dies again before a successful
    /// flush, the data is already in memory and the next
    /// [`flush_to_disk`](Buffer::flush_to_disk) re-persists it.
    ///
    /// Fails only when called while an event is being built.
    pub fn load_from_disk(&mut self) -> CollectResult<usize> {
        if self.fragment_start.is_some() {
            return Err(CollectError::InvalidSequence(
                "cannot recover from disk while an event is open".to_string(),
            ));
        }

        let contents = match self.cache.take() {
            Ok(Some(contents)) => contents,
            Ok(None) => return Ok(0),
            Err(e) => {
                warn!("failed to read disk cache: {e}");
                return Ok(0);
            }
        };

        let mut recovered = 0;
        for line in contents.lines().filter(|line| !line.is_empty()) {
            let start = self.text.len();
            self.text.push_str(line);
            self.tokens.push(Token {
                start,
                len: line.len(),
            });
            recovered += 1;
        }
        if recovered > 0 {
            debug!(events = recovered, "recovered events from disk cache");
        }
        Ok(recovered)
    }
}
