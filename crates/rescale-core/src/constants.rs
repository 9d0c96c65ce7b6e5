//! Pipeline-wide constants.

/// Media-type prefix an object must carry to be processed.
pub const IMAGE_CONTENT_TYPE_PREFIX: &str = "image/";

/// Directory segment marking objects that still need processing.
pub const STAGING_DIR: &str = "upload";

/// Sibling directory that receives processed output.
pub const OUTPUT_DIR: &str = "images";

/// Images wider than this are rescaled.
pub const MAX_IMAGE_WIDTH: u32 = 1080;

/// Height oversized images are normalized to (width follows the aspect ratio).
pub const TARGET_HEIGHT: u32 = 1080;

/// Metadata key referencing the document to notify with the final URL.
pub const MESSAGE_ORIGIN_KEY: &str = "messageOrigin";

/// Field written on the origin document.
pub const RESOURCE_FIELD: &str = "resource";

/// Expiry of issued read URLs. Far enough out to never matter in practice.
pub const SIGNED_URL_EXPIRES_AT: &str = "2491-03-09T00:00:00Z";
