//! HELIOS habitat telemetry monitoring and decision pipeline.
//!
//! See [`pipeline`] for the component layout.

pub mod pipeline;
