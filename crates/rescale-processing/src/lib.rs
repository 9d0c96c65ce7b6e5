//! Rescale Processing Library
//!
//! The upload pipeline: decide whether a finalized object needs processing,
//! materialize it into scratch space, rescale oversized images, publish the
//! result under a signed URL, delete the original and notify the origin record.

pub mod error;
pub mod filter;
pub mod image;
pub mod pipeline;
pub mod publish;
pub mod scratch;
pub mod transform;

// Re-export commonly used types
pub use error::PipelineError;
pub use filter::{classify, Decision};
pub use self::image::{ConvertResizer, ImageMetrics, NativeImageMetrics, NativeResizer, Resizer};
pub use pipeline::{process_event, Clock, Pipeline, PipelineDeps, PipelineSettings, SystemClock};
pub use publish::PublishedArtifact;
pub use scratch::ScratchArea;
pub use transform::Transformed;
