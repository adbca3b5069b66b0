//! In-process telemetry pipeline.
//!
//! Captures host log calls and outbound network-request lifecycles,
//! correlates each request's scattered events into a single record,
//! discovers collector endpoints, and best-effort fans records out to all
//! of them. Embeds in a host application; it is not a server.

pub mod config;
pub mod delivery;
pub mod device;
pub mod error;
pub mod filter;
pub mod intercept;
pub mod observability;
pub mod pipeline;
pub mod registry;

pub use config::RelayConfig;
pub use delivery::{Record, RecordKind};
pub use error::RelayError;
pub use intercept::{
    CompletedRequest, EventKind, HookHandlers, PendingRequest, RequestHandle, RequestRecord,
    ResponseBody, TransportHook,
};
pub use pipeline::LogRelay;
pub use registry::{DiscoveryEvent, ResolvedService, ServiceDiscovery};
