//! Tracing subscriber initialization
//!
//! Log output goes to stderr so stdout stays free for command results.

mod init_basic;

pub use init_basic::init_telemetry;
