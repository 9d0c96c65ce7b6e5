//! Rescale Core Library
//!
//! This crate provides the event and result models, configuration and shared
//! constants used by every Rescale component.

pub mod config;
pub mod constants;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, LogFormat, ResizeBackend};
pub use models::{
    Dimensions, OriginUpdate, RunOutcome, RunResult, RunStage, SkipReason, UploadEvent,
};
pub use storage_types::{DocumentBackend, StorageBackend};
