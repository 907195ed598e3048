//! Server-sent event relay with per-chunk transforms
//!
//! The upstream body is pulled lazily by the outbound HTTP body. Every
//! complete SSE event is decoded, run through the module chain when it
//! carries a JSON chunk, and re-emitted as `data: <json>\n\n`. The relay
//! always ends with exactly one `data: [DONE]` frame. The upstream body is
//! not read past its own `[DONE]`.
//!
//! The traffic record is finalized when the relay ends: `sent` on a clean
//! end, `error` when the upstream fails or stalls, and `cancelled` when the
//! client goes away and the relay is dropped before finishing.

use crate::domain::ChatResponse;
use crate::modules::ModuleChain;
use crate::pipeline::PipelineExecutor;
use crate::proxy::types::ProxyError;
use crate::traffic::{RecordId, TrafficRecorder};
use bytes::Bytes;
use futures_util::stream::{self, Stream};
use http_body_util::BodyExt;
use hyper::body::Body;
use serde_json::Value;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Payload that terminates an OpenAI stream
pub const DONE_MARKER: &str = "[DONE]";

const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// One decoded SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Joined `data:` lines, if the event had any
    pub data: Option<String>,
    /// Event text as received, without the blank line terminator
    pub raw: String,
}

impl SseEvent {
    fn parse(block: &str) -> Option<Self> {
        if block.trim().is_empty() {
            return None;
        }

        let data_lines: Vec<&str> = block
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|value| value.strip_prefix(' ').unwrap_or(value))
            .collect();

        Some(Self {
            data: (!data_lines.is_empty()).then(|| data_lines.join("\n")),
            raw: block.to_string(),
        })
    }
}

/// Incremental SSE framing over arbitrary byte chunks
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return every event completed by them
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = SseEvent::parse(&String::from_utf8_lossy(&block[..end])) {
                events.push(event);
            }
        }
        events
    }

    /// Trailing event left when the upstream closed without a blank line
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        SseEvent::parse(&String::from_utf8_lossy(&rest))
    }
}

/// Per-call transform state and the handle on the call's traffic record
pub struct StreamContext {
    recorder: Arc<TrafficRecorder>,
    record_id: RecordId,
    executor: PipelineExecutor,
    modules: ModuleChain,
    before: Vec<Value>,
    after: Vec<Value>,
    skipped: Vec<String>,
    finished: bool,
}

impl StreamContext {
    pub fn new(recorder: Arc<TrafficRecorder>, record_id: RecordId, modules: ModuleChain) -> Self {
        Self {
            recorder,
            record_id,
            executor: PipelineExecutor::new(),
            modules,
            before: Vec::new(),
            after: Vec::new(),
            skipped: Vec::new(),
            finished: false,
        }
    }

    /// Run one JSON chunk through the chain and return the payload to emit
    fn transform(&mut self, value: Value) -> String {
        let chunk: ChatResponse = match serde_json::from_value(value.clone()) {
            Ok(chunk) => chunk,
            Err(_) => {
                let payload = value.to_string();
                self.before.push(value.clone());
                self.after.push(value);
                return payload;
            }
        };

        let outcome = self.executor.apply_chunk(chunk, &self.modules);
        for name in outcome.skipped {
            if !self.skipped.contains(&name) {
                self.skipped.push(name);
            }
        }

        let transformed = match serde_json::to_value(&outcome.value) {
            Ok(transformed) => transformed,
            Err(e) => {
                warn!(error = %e, "Transformed chunk is not serializable, relaying original");
                value.clone()
            }
        };
        let payload = transformed.to_string();
        self.before.push(value);
        self.after.push(transformed);
        payload
    }

    fn flush(&mut self) {
        self.recorder.record_skipped(self.record_id, &self.skipped);
        self.recorder.record_response_before(
            self.record_id,
            Value::Array(std::mem::take(&mut self.before)),
        );
        self.recorder.record_response_after(
            self.record_id,
            Value::Array(std::mem::take(&mut self.after)),
        );
    }

    fn complete(&mut self) {
        if self.finished {
            return;
        }
        self.flush();
        self.recorder.complete(self.record_id);
        self.finished = true;
        debug!(record_id = %self.record_id, "Stream relayed");
    }

    fn fail(&mut self, message: String) {
        if self.finished {
            return;
        }
        self.flush();
        self.recorder.fail(self.record_id, message);
        self.finished = true;
    }
}

impl Drop for StreamContext {
    fn drop(&mut self) {
        if !self.finished {
            info!(record_id = %self.record_id, "Client disconnected mid-stream");
            self.flush();
            self.recorder.cancel(self.record_id);
        }
    }
}

struct RelayState<B> {
    body: B,
    decoder: SseDecoder,
    pending: VecDeque<Bytes>,
    idle_timeout: Duration,
    context: StreamContext,
    upstream_done: bool,
    done_sent: bool,
}

impl<B> RelayState<B> {
    fn handle_event(&mut self, event: SseEvent) {
        if self.done_sent {
            debug!("Ignoring event after [DONE]");
            return;
        }

        match event.data.as_deref() {
            Some(DONE_MARKER) => {
                self.push_done();
                self.upstream_done = true;
            }
            Some(data) => match serde_json::from_str::<Value>(data) {
                Ok(value) => {
                    let payload = self.context.transform(value);
                    self.pending.push_back(data_frame(&payload));
                }
                Err(_) => self.pending.push_back(raw_frame(&event.raw)),
            },
            None => self.pending.push_back(raw_frame(&event.raw)),
        }
    }

    fn push_done(&mut self) {
        if !self.done_sent {
            self.pending.push_back(Bytes::from_static(DONE_FRAME));
            self.done_sent = true;
        }
    }

    fn finish(&mut self) {
        self.push_done();
        self.context.complete();
    }

    fn abort(&mut self, error: ProxyError) {
        self.upstream_done = true;
        if self.done_sent {
            debug!(error = %error, "Upstream failed after [DONE]");
            self.context.complete();
            return;
        }

        warn!(error = %error, "Stream aborted");
        if let Ok(payload) = serde_json::to_string(&error.to_openai_error()) {
            self.pending.push_back(data_frame(&payload));
        }
        self.push_done();
        self.context.fail(error.to_string());
    }
}

/// Relay an upstream SSE body through the module chain
pub fn transform_stream<B>(
    body: B,
    idle_timeout: Duration,
    context: StreamContext,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static
where
    B: Body<Data = Bytes> + Unpin + Send + 'static,
    B::Error: Display + Send,
{
    let state = RelayState {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        idle_timeout,
        context,
        upstream_done: false,
        done_sent: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.context.finished {
                return None;
            }
            if state.upstream_done {
                match state.decoder.finish() {
                    Some(event) => state.handle_event(event),
                    None => state.finish(),
                }
                continue;
            }

            match tokio::time::timeout(state.idle_timeout, state.body.frame()).await {
                Err(_) => {
                    let timeout = state.idle_timeout;
                    state.abort(ProxyError::timeout(timeout));
                }
                Ok(None) => state.upstream_done = true,
                Ok(Some(Err(e))) => {
                    state.abort(ProxyError::backend(format!("stream interrupted: {e}")));
                }
                Ok(Some(Ok(frame))) => {
                    if let Ok(data) = frame.into_data() {
                        for event in state.decoder.push(&data) {
                            state.handle_event(event);
                        }
                    }
                }
            }
        }
    })
}

fn data_frame(payload: &str) -> Bytes {
    Bytes::from(format!("data: {payload}\n\n"))
}

fn raw_frame(raw: &str) -> Bytes {
    Bytes::from(format!("{raw}\n\n"))
}
