//! Rescale Infrastructure Library
//!
//! Shared infrastructure for the Rescale entry points:
//! - Telemetry initialization
//! - Error response format

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod error;

#[cfg(feature = "observability-basic")]
pub use telemetry::init_telemetry;

pub use error::ErrorResponse;
