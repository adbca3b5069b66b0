//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges)
//! ```
//!
//! # Design Decisions
//! - The relay's own diagnostics go through tracing, never through the
//!   instrumented path, so internal faults can never re-enter the pipeline
//! - Metrics use the facade only; exposition is the host's choice
//! - Metric updates are cheap (atomic increments)

pub mod logging;
pub mod metrics;
