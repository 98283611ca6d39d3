//! `linetrack-runtime` – runs the follower as a node.
//!
//! # Modules
//!
//! - [`node`] – [`FollowerNode`][node::FollowerNode]: owns the
//!   [`NodeContext`][node::NodeContext] built at startup and consumes camera
//!   frames from the bus one at a time, publishing a velocity command for
//!   every frame in which the line is visible.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter. Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export.

pub mod node;
pub mod telemetry;

pub use node::{FollowerNode, NodeContext, NodeStats};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
