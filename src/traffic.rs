//! Bounded in-memory log of intercepted calls
//!
//! Every call through the gateway owns one [`TrafficRecord`]. The gateway
//! updates it at each boundary of the call and finalizes it exactly once.
//! Finalized records are immutable. Once the ring is full the oldest record
//! is evicted to make room.

use crate::domain::RecorderCapacity;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

/// Monotonically increasing record identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Furthest point a call reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStage {
    Received,
    RequestTransformed,
    BackendCalled,
    ResponseTransformed,
    Sent,
    Error,
    Cancelled,
}

impl RecordStage {
    pub fn is_final(self) -> bool {
        matches!(
            self,
            RecordStage::Sent | RecordStage::Error | RecordStage::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficRecord {
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub endpoint: String,
    /// Peer address of the client connection, when the server knows it
    pub client_ip: Option<String>,
    pub stage: RecordStage,
    pub streamed: bool,
    /// Modules that transformed the call without failing, in order
    pub module_chain: Vec<String>,
    pub skipped_modules: Vec<String>,
    pub request_before: Option<Value>,
    pub request_after: Option<Value>,
    pub response_before: Option<Value>,
    pub response_after: Option<Value>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
    #[serde(skip)]
    started: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecorderStats {
    pub capacity: usize,
    pub retained: usize,
    pub total_recorded: u64,
    pub evicted: u64,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecorderError {
    #[error("traffic record {0} not found")]
    NotFound(RecordId),
}

struct Ring {
    records: VecDeque<TrafficRecord>,
    next_id: u64,
    evicted: u64,
}

/// Ring of traffic records shared by the gateway and the admin API
pub struct TrafficRecorder {
    capacity: usize,
    ring: RwLock<Ring>,
}

impl TrafficRecorder {
    pub fn new(capacity: RecorderCapacity) -> Self {
        let capacity = capacity.into_inner();
        Self {
            capacity,
            ring: RwLock::new(Ring {
                records: VecDeque::with_capacity(capacity),
                next_id: 1,
                evicted: 0,
            }),
        }
    }

    /// Open a record for a call that just entered the gateway
    pub fn begin(
        &self,
        method: impl Into<String>,
        endpoint: impl Into<String>,
        client_ip: Option<String>,
        request_before: Option<Value>,
        streamed: bool,
    ) -> RecordId {
        let mut ring = self.ring.write();
        let id = RecordId(ring.next_id);
        ring.next_id += 1;

        if ring.records.len() == self.capacity {
            if let Some(oldest) = ring.records.pop_front() {
                debug!(record_id = %oldest.id, "Evicting oldest traffic record");
            }
            ring.evicted += 1;
        }

        ring.records.push_back(TrafficRecord {
            id,
            timestamp: Utc::now(),
            method: method.into(),
            endpoint: endpoint.into(),
            client_ip,
            stage: RecordStage::Received,
            streamed,
            module_chain: Vec::new(),
            skipped_modules: Vec::new(),
            request_before,
            request_after: None,
            response_before: None,
            response_after: None,
            error: None,
            duration_ms: None,
            started: Instant::now(),
        });
        id
    }

    pub fn record_module_chain(&self, id: RecordId, names: Vec<String>) {
        self.update(id, "module_chain", |record| record.module_chain = names);
    }

    pub fn record_request_after(&self, id: RecordId, value: Value) {
        self.update(id, "request_after", |record| {
            record.request_after = Some(value);
            record.stage = RecordStage::RequestTransformed;
        });
    }

    /// Backend answered with a stream; snapshots arrive when the stream ends
    pub fn mark_backend_called(&self, id: RecordId) {
        self.update(id, "stage", |record| {
            record.stage = RecordStage::BackendCalled;
        });
    }

    pub fn record_response_before(&self, id: RecordId, value: Value) {
        self.update(id, "response_before", |record| {
            record.response_before = Some(value);
            record.stage = RecordStage::BackendCalled;
        });
    }

    pub fn record_response_after(&self, id: RecordId, value: Value) {
        self.update(id, "response_after", |record| {
            record.response_after = Some(value);
            record.stage = RecordStage::ResponseTransformed;
        });
    }

    /// Add module names whose transform was skipped, keeping first-seen order
    ///
    /// A module that failed any pass no longer counts as applied.
    pub fn record_skipped(&self, id: RecordId, names: &[String]) {
        if names.is_empty() {
            return;
        }
        self.update(id, "skipped_modules", |record| {
            record.module_chain.retain(|name| !names.contains(name));
            for name in names {
                if !record.skipped_modules.contains(name) {
                    record.skipped_modules.push(name.clone());
                }
            }
        });
    }

    pub fn complete(&self, id: RecordId) {
        self.finalize(id, RecordStage::Sent, None);
    }

    pub fn fail(&self, id: RecordId, message: impl Into<String>) {
        self.finalize(id, RecordStage::Error, Some(message.into()));
    }

    pub fn cancel(&self, id: RecordId) {
        self.finalize(
            id,
            RecordStage::Cancelled,
            Some("client disconnected".to_string()),
        );
    }

    /// Records newest first
    pub fn list(&self, limit: usize, offset: usize) -> Vec<TrafficRecord> {
        self.ring
            .read()
            .records
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: RecordId) -> Result<TrafficRecord, RecorderError> {
        let ring = self.ring.read();
        Self::position(&ring, id)
            .map(|index| ring.records[index].clone())
            .ok_or(RecorderError::NotFound(id))
    }

    /// Drop every retained record; ids keep increasing afterwards
    pub fn clear(&self) {
        let mut ring = self.ring.write();
        let dropped = ring.records.len();
        ring.records.clear();
        debug!(dropped, "Traffic log cleared");
    }

    pub fn stats(&self) -> RecorderStats {
        let ring = self.ring.read();
        RecorderStats {
            capacity: self.capacity,
            retained: ring.records.len(),
            total_recorded: ring.next_id - 1,
            evicted: ring.evicted,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn position(ring: &Ring, id: RecordId) -> Option<usize> {
        // Records are appended in id order and only removed from the front
        // or all at once, so ids stay contiguous.
        let front = ring.records.front()?.id.0;
        let index = usize::try_from(id.0.checked_sub(front)?).ok()?;
        (index < ring.records.len()).then_some(index)
    }

    fn update(&self, id: RecordId, field: &'static str, apply: impl FnOnce(&mut TrafficRecord)) {
        let mut ring = self.ring.write();
        let Some(index) = Self::position(&ring, id) else {
            warn!(record_id = %id, field, "Ignoring update for unknown traffic record");
            return;
        };
        let record = &mut ring.records[index];
        if record.stage.is_final() {
            warn!(record_id = %id, field, stage = ?record.stage, "Ignoring update for finalized traffic record");
            return;
        }
        apply(record);
    }

    fn finalize(&self, id: RecordId, stage: RecordStage, error: Option<String>) {
        self.update(id, "stage", |record| {
            record.stage = stage;
            record.error = error;
            record.duration_ms = Some(record.started.elapsed().as_millis() as u64);
        });
    }
}
