//! Image capabilities the pipeline consumes: measuring and resizing files on disk.

pub mod convert;
pub mod metrics;
pub mod resize;

pub use convert::ConvertResizer;
pub use metrics::{ImageMetrics, NativeImageMetrics};
pub use resize::{NativeResizer, Resizer};
