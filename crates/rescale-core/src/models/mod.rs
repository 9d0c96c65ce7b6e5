//! Event and run models

mod event;
mod run;

pub use event::UploadEvent;
pub use run::{Dimensions, OriginUpdate, RunOutcome, RunResult, RunStage, SkipReason};
