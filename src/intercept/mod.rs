//! Request interception subsystem.
//!
//! # Data Flow
//! ```text
//! transport hook (host primitive)
//!     → hook.rs handlers (open / requestHeader / send / headerReceived / response)
//!     → engine.rs (correlate by id, maintain in-flight table)
//!     → listeners.rs (dispatch moments to subscribers)
//!     → delivery (via the relay's own listeners)
//! ```
//!
//! # Design Decisions
//! - Moments for one id are emitted in lifecycle order; moments of distinct
//!   ids interleave arbitrarily
//! - The filter runs before any bookkeeping, so excluded requests cost one
//!   string check and nothing else

pub mod engine;
pub mod hook;
pub mod listeners;
pub mod types;

pub use engine::CorrelationEngine;
pub use hook::{HookHandlers, TransportHook};
pub use listeners::{Listener, ListenerRegistry};
pub use types::{
    CompletedRequest, EventKind, PendingRequest, RequestHandle, RequestRecord, ResponseBody,
};
