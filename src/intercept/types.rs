//! Request lifecycle types.
//!
//! A tracked request lives as a [`PendingRequest`] while in flight and is
//! turned into a [`CompletedRequest`] when the response moment fires; the
//! two are joined by the correlation id rather than by mutating one object
//! across phases.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Lifecycle moments observable on a tracked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Open,
    RequestHeader,
    Send,
    HeaderReceived,
    Response,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Open => "open",
            EventKind::RequestHeader => "requestHeader",
            EventKind::Send => "send",
            EventKind::HeaderReceived => "headerReceived",
            EventKind::Response => "response",
        }
    }
}

/// A request that has been opened but not yet finalized.
///
/// Header keys are case-preserved as received; repeated keys are
/// last-write-wins.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub id: String,
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub request_headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub request_data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_size: Option<u64>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub response_headers: HashMap<String, String>,
}

/// A finalized request, produced exactly once per correlation id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedRequest {
    #[serde(flatten)]
    pub request: PendingRequest,
    pub status: u16,
    /// Transport-configured timeout in milliseconds, as reported alongside
    /// the response.
    pub timeout: u64,
    pub response_data: Value,
    pub response_url: String,
    pub response_type: String,
    pub end_time: u64,
    pub duration: u64,
}

/// Record handed to listeners: partial while in flight, complete at the
/// response moment.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RequestRecord {
    Pending(PendingRequest),
    Completed(CompletedRequest),
}

impl RequestRecord {
    /// Correlation id of the underlying request.
    pub fn id(&self) -> &str {
        match self {
            RequestRecord::Pending(p) => &p.id,
            RequestRecord::Completed(c) => &c.request.id,
        }
    }

    pub fn as_pending(&self) -> Option<&PendingRequest> {
        match self {
            RequestRecord::Pending(p) => Some(p),
            RequestRecord::Completed(_) => None,
        }
    }

    pub fn as_completed(&self) -> Option<&CompletedRequest> {
        match self {
            RequestRecord::Pending(_) => None,
            RequestRecord::Completed(c) => Some(c),
        }
    }
}

/// Raw response payload as handed over by the transport hook.
///
/// Binary bodies are read to text before the listener ever sees them.
#[derive(Debug, Clone)]
pub enum ResponseBody {
    Text(String),
    Bytes(Vec<u8>),
}

impl ResponseBody {
    pub(crate) fn into_text(self) -> String {
        match self {
            ResponseBody::Text(text) => text,
            ResponseBody::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

/// Caller-owned handle tying scattered lifecycle events to one request.
///
/// The correlation id is written exactly once, at open time. A handle whose
/// request was filtered out never receives an id, which makes every later
/// lifecycle event for it a natural no-op.
#[derive(Debug, Clone, Default)]
pub struct RequestHandle {
    id: Arc<OnceLock<String>>,
}

impl RequestHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bind(&self, id: String) {
        // A second bind can only come from a transport misusing the handle;
        // the first id wins.
        let _ = self.id.set(id);
    }

    /// The correlation id, if this handle's request is being tracked.
    pub fn id(&self) -> Option<&str> {
        self.id.get().map(String::as_str)
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
