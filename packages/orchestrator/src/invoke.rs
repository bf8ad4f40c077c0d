//! Invoker
//!
//! Sends requests to a deployed runtime and normalizes its two
//! possible response encodings: line-framed incremental delivery and
//! batched byte-encoded events. Transport and decode failures are
//! folded into an error-tagged result string so higher-level agent
//! workflows are never interrupted mid-chain; they are still logged.

use futures_util::future;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::clients::{
    InvocationClient, InvocationResponse, LineStream, ResponseBody, RuntimeHandle,
    EVENT_STREAM_MARKER,
};
use crate::error::OrchestratorError;

/// Tracks the last emitted full text so resent accumulated output can
/// be reduced to only the newly produced suffix.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    previous: String,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the delta for a new frame. A frame extending the
    /// previous baseline yields only the suffix; an unrelated frame
    /// (or a reset) is emitted verbatim and becomes the new baseline.
    /// A frame identical to the baseline yields nothing.
    pub fn push(&mut self, frame: &str) -> Option<String> {
        if frame.starts_with(&self.previous) {
            let delta = frame[self.previous.len()..].to_string();
            if delta.is_empty() {
                return None;
            }
            self.previous = frame.to_string();
            Some(delta)
        } else {
            self.previous = frame.to_string();
            Some(frame.to_string())
        }
    }
}

/// Handles interaction with a deployed runtime.
pub struct Invoker<C: InvocationClient> {
    client: Arc<C>,
    qualifier: String,
}

impl<C: InvocationClient> Invoker<C> {
    pub fn new(client: Arc<C>, qualifier: &str) -> Self {
        Self {
            client,
            qualifier: qualifier.to_string(),
        }
    }

    fn payload(message: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({ "prompt": message })).unwrap_or_default()
    }

    /// Invoke the runtime and return the normalized response text.
    /// Never fails: transport and decode errors come back as an
    /// error-tagged string and are logged.
    pub async fn invoke(&self, handle: &RuntimeHandle, message: &str) -> String {
        let request_id = Uuid::new_v4();
        info!(
            runtime_id = %handle.runtime_id,
            request_id = %request_id,
            "Invoking runtime"
        );

        let result = match self
            .client
            .invoke(&handle.runtime_id, &self.qualifier, Self::payload(message))
            .await
        {
            Ok(response) => normalize_response(response).await,
            Err(e) => Err(OrchestratorError::Invocation(e.to_string())),
        };

        match result {
            Ok(text) => {
                info!(runtime_id = %handle.runtime_id, request_id = %request_id, "Invocation successful");
                text
            }
            Err(e) => {
                error!(
                    runtime_id = %handle.runtime_id,
                    request_id = %request_id,
                    error = %e,
                    "Failed to invoke runtime"
                );
                format!("Error: {}", e)
            }
        }
    }

    /// Invoke the runtime and return a lazy, finite, non-restartable
    /// sequence of text deltas. Frames pass through the tracker one at
    /// a time as the upstream produces them, so the first delta is
    /// available before the response body has finished arriving.
    /// Upstream frames may resend the whole accumulated output; only
    /// the new suffix reaches the consumer. Failures surface as a
    /// single error-tagged chunk.
    pub async fn invoke_streaming(
        &self,
        handle: &RuntimeHandle,
        message: &str,
    ) -> impl Stream<Item = String> + Unpin {
        let request_id = Uuid::new_v4();
        info!(
            runtime_id = %handle.runtime_id,
            request_id = %request_id,
            "Invoking runtime (streaming)"
        );

        let response = self
            .client
            .invoke(&handle.runtime_id, &self.qualifier, Self::payload(message))
            .await;

        let frames: BoxStream<'static, String> = match response {
            Ok(InvocationResponse {
                body: ResponseBody::EventStream(lines),
                ..
            }) => marker_frames(lines).boxed(),
            // Batched bodies have no incremental frames; emit the
            // normalized result as a single chunk
            Ok(response) => {
                let chunk = match normalize_response(response).await {
                    Ok(text) => text,
                    Err(e) => {
                        error!(request_id = %request_id, error = %e, "Failed to decode batched response");
                        format!("Error: {}", e)
                    }
                };
                stream::once(future::ready(chunk)).boxed()
            }
            Err(e) => {
                error!(request_id = %request_id, error = %e, "Failed to invoke runtime");
                stream::once(future::ready(format!("Error: {}", e))).boxed()
            }
        };

        frames
            .scan(DeltaTracker::new(), |tracker, frame| {
                future::ready(Some(tracker.push(&frame)))
            })
            .filter_map(future::ready)
            .boxed()
    }
}

/// Marker-stripped frames of an event-stream body, in arrival order.
/// Lines without the marker are not frames.
fn marker_frames(lines: LineStream) -> impl Stream<Item = String> + Send {
    lines.filter_map(|line| {
        future::ready(line.strip_prefix(EVENT_STREAM_MARKER).map(str::to_string))
    })
}

/// Normalize a runtime response into plain text. Encoding selection
/// is driven by the declared content type, never by sniffing. An
/// event-stream body is drained to completion here.
pub async fn normalize_response(
    response: InvocationResponse,
) -> Result<String, OrchestratorError> {
    if response.is_event_stream() {
        return match response.body {
            ResponseBody::EventStream(lines) => {
                let frames: Vec<String> = marker_frames(lines).collect().await;
                Ok(frames.join("\n"))
            }
            ResponseBody::Events(_) => Err(OrchestratorError::Invocation(
                "event-stream content type with batched body".to_string(),
            )),
        };
    }

    match response.body {
        ResponseBody::Events(events) => {
            let first = events.first().ok_or_else(|| {
                OrchestratorError::Invocation("empty batched response".to_string())
            })?;
            let value: serde_json::Value = serde_json::from_slice(first)
                .map_err(|e| OrchestratorError::Invocation(format!("undecodable event: {}", e)))?;
            match value.get("result").and_then(|r| r.as_str()) {
                Some(result) => Ok(result.to_string()),
                None => match value {
                    serde_json::Value::String(s) => Ok(s),
                    other => Ok(other.to_string()),
                },
            }
        }
        ResponseBody::EventStream(_) => Err(OrchestratorError::Invocation(
            "batched content type with event-stream body".to_string(),
        )),
    }
}
