//! Transport hook boundary.
//!
//! # Responsibilities
//! - Define the seam between the relay and the host's request-issuing
//!   primitive
//! - Carry the engine's lifecycle handlers as an explicit value instead of
//!   ambient global callback slots
//!
//! # Design Decisions
//! - `install`/`uninstall` wrap a user-supplied transport; `uninstall` must
//!   restore the original behavior unconditionally
//! - `is_active` lets the relay back off when another observer (e.g. a
//!   debugging tool) already owns the hook

use std::collections::HashMap;

use crate::error::RelayError;
use crate::intercept::types::{RequestHandle, ResponseBody};

/// The engine's lifecycle handlers, one per observation point.
///
/// A hook implementation calls each at the matching point of its transport,
/// always passing the same [`RequestHandle`] it received at open time.
pub struct HookHandlers {
    /// (method, url, handle)
    pub open: Box<dyn Fn(&str, &str, &RequestHandle) + Send + Sync>,
    /// (header, value, handle)
    pub request_header: Box<dyn Fn(&str, &str, &RequestHandle) + Send + Sync>,
    /// (body, handle)
    pub send: Box<dyn Fn(Option<&str>, &RequestHandle) + Send + Sync>,
    /// (content_type, size, headers, handle)
    pub header_received:
        Box<dyn Fn(&str, u64, &HashMap<String, String>, &RequestHandle) + Send + Sync>,
    /// (status, timeout, body, response_url, response_type, handle)
    pub response:
        Box<dyn Fn(u16, u64, ResponseBody, &str, &str, &RequestHandle) + Send + Sync>,
}

/// A hookable outbound transport.
///
/// Implementations wrap whatever primitive the host uses to issue requests
/// and report its lifecycle through the installed [`HookHandlers`].
pub trait TransportHook: Send + Sync {
    /// Install the handlers and start reporting lifecycle events.
    fn install(&self, handlers: HookHandlers) -> Result<(), RelayError>;

    /// Stop reporting and restore the transport's original behavior.
    /// Must be idempotent.
    fn uninstall(&self);

    /// Whether any observer (this one or another) is currently installed.
    fn is_active(&self) -> bool;
}
