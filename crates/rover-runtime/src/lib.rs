//! `rover-runtime` – Tick Loop & Observability
//!
//! # Modules
//!
//! - [`supervisor`] – [`SupervisorLoop`][supervisor::SupervisorLoop]:
//!   drives the [`StateController`][rover_kernel::StateController] at a fixed
//!   rate, publishes the status heartbeat and dispatches queued bus inputs to
//!   the state controller and the [`StallDetector`][rover_kernel::StallDetector]
//!   between ticks.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   installs the global `tracing` subscriber with an optional OTLP span
//!   exporter.

pub mod supervisor;
pub mod telemetry;

pub use supervisor::{SupervisorConfig, SupervisorLoop};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
