//! Adaptive loan qualification engine.
//!
//! The `qualification` module holds the core: policy rule evaluation,
//! product eligibility filtering, and adaptive question selection. The
//! remaining modules carry the service plumbing shared with the API
//! binary (configuration, telemetry, top-level error type).

pub mod config;
pub mod error;
pub mod qualification;
pub mod telemetry;
