//! Request correlation engine.
//!
//! # Responsibilities
//! - Reconstruct complete request records from independently-arriving
//!   lifecycle events, keyed by a generated correlation id
//! - Apply exclusion filters before any bookkeeping happens
//! - Emit lifecycle moments to registered listeners in per-id order
//!
//! # Design Decisions
//! - The in-flight table holds opened-but-not-finalized requests only;
//!   finalization removes the entry, so a second response is a no-op
//! - Failure has no state of its own: a request that never completes simply
//!   never emits a response moment
//! - Events for unknown or filtered ids are silently dropped
//! - Malformed bodies degrade to a null value, never to an error

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::filter::FilterEngine;
use crate::intercept::hook::HookHandlers;
use crate::intercept::listeners::ListenerRegistry;
use crate::intercept::types::{
    now_millis, CompletedRequest, EventKind, PendingRequest, RequestHandle, RequestRecord,
    ResponseBody,
};
use crate::observability::metrics;
use std::collections::HashMap;

/// Correlates scattered lifecycle events into request records.
pub struct CorrelationEngine {
    filter: Arc<FilterEngine>,
    in_flight: DashMap<String, PendingRequest>,
    listeners: Arc<ListenerRegistry>,
}

impl CorrelationEngine {
    pub fn new(filter: Arc<FilterEngine>) -> Self {
        Self {
            filter,
            in_flight: DashMap::new(),
            listeners: Arc::new(ListenerRegistry::new()),
        }
    }

    /// The registry lifecycle moments are dispatched through.
    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// A request was opened. Returns the correlation id, or `None` when the
    /// request is excluded by the filter.
    pub fn on_open(&self, method: &str, url: &str, handle: &RequestHandle) -> Option<String> {
        if self.filter.should_ignore(method, url) {
            return None;
        }

        let id = Uuid::new_v4().simple().to_string();
        handle.bind(id.clone());

        let pending = PendingRequest {
            id: id.clone(),
            method: method.to_owned(),
            url: url.to_owned(),
            ..Default::default()
        };
        self.in_flight.insert(id.clone(), pending.clone());
        metrics::record_request_tracked();

        self.listeners
            .dispatch(EventKind::Open, &RequestRecord::Pending(pending));
        Some(id)
    }

    /// A request header was set. Last write wins per header key.
    pub fn on_request_header(&self, header: &str, value: &str, handle: &RequestHandle) {
        let Some(id) = handle.id() else { return };
        let snapshot = match self.in_flight.get_mut(id) {
            Some(mut entry) => {
                entry
                    .request_headers
                    .insert(header.to_owned(), value.to_owned());
                entry.clone()
            }
            None => return,
        };
        self.listeners
            .dispatch(EventKind::RequestHeader, &RequestRecord::Pending(snapshot));
    }

    /// The request body was handed to the transport. Stamps `start_time`.
    pub fn on_send(&self, data: Option<&str>, handle: &RequestHandle) {
        let Some(id) = handle.id() else { return };
        let snapshot = match self.in_flight.get_mut(id) {
            Some(mut entry) => {
                entry.request_data = data
                    .and_then(|raw| serde_json::from_str(raw).ok())
                    .unwrap_or(Value::Null);
                entry.start_time = Some(now_millis());
                entry.clone()
            }
            None => return,
        };
        self.listeners
            .dispatch(EventKind::Send, &RequestRecord::Pending(snapshot));
    }

    /// Response headers arrived.
    pub fn on_header_received(
        &self,
        content_type: &str,
        size: u64,
        headers: &HashMap<String, String>,
        handle: &RequestHandle,
    ) {
        let Some(id) = handle.id() else { return };
        let snapshot = match self.in_flight.get_mut(id) {
            Some(mut entry) => {
                entry.response_content_type = Some(content_type.to_owned());
                entry.response_size = Some(size);
                entry.response_headers = headers.clone();
                entry.clone()
            }
            None => return,
        };
        self.listeners
            .dispatch(EventKind::HeaderReceived, &RequestRecord::Pending(snapshot));
    }

    /// The response completed. Finalizes the record, emits the response
    /// moment, and forgets the id. Unknown ids are silent no-ops.
    pub fn on_response(
        &self,
        status: u16,
        timeout: u64,
        body: ResponseBody,
        response_url: &str,
        response_type: &str,
        handle: &RequestHandle,
    ) {
        let Some(id) = handle.id() else { return };
        let Some((_, pending)) = self.in_flight.remove(id) else {
            return;
        };

        let end_time = now_millis();
        let duration = end_time.saturating_sub(pending.start_time.unwrap_or(end_time));
        let completed = CompletedRequest {
            request: pending,
            status,
            timeout,
            response_data: decode_body(body),
            response_url: response_url.to_owned(),
            response_type: response_type.to_owned(),
            end_time,
            duration,
        };

        self.listeners
            .dispatch(EventKind::Response, &RequestRecord::Completed(completed));
    }

    /// Wire this engine's handlers into a transport hook.
    pub fn handlers(self: &Arc<Self>) -> HookHandlers {
        let open = Arc::clone(self);
        let request_header = Arc::clone(self);
        let send = Arc::clone(self);
        let header_received = Arc::clone(self);
        let response = Arc::clone(self);
        HookHandlers {
            open: Box::new(move |method, url, handle| {
                open.on_open(method, url, handle);
            }),
            request_header: Box::new(move |header, value, handle| {
                request_header.on_request_header(header, value, handle);
            }),
            send: Box::new(move |data, handle| {
                send.on_send(data, handle);
            }),
            header_received: Box::new(move |content_type, size, headers, handle| {
                header_received.on_header_received(content_type, size, headers, handle);
            }),
            response: Box::new(move |status, timeout, body, url, kind, handle| {
                response.on_response(status, timeout, body, url, kind, handle);
            }),
        }
    }

    /// Number of opened-but-not-finalized requests.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether an id is currently tracked.
    pub fn is_tracked(&self, id: &str) -> bool {
        self.in_flight.contains_key(id)
    }
}

/// Read the body to text and parse it as JSON where possible; anything that
/// fails to parse yields a null body rather than an error.
fn decode_body(body: ResponseBody) -> Value {
    serde_json::from_str(&body.into_text()).unwrap_or(Value::Null)
}
