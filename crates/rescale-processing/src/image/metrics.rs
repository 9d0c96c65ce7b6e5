use async_trait::async_trait;
use image::ImageReader;
use std::path::Path;

/// Reads basic measurements of an image file.
#[async_trait]
pub trait ImageMetrics: Send + Sync {
    /// Pixel dimensions `(width, height)`. Fails if the file is not a decodable image.
    async fn dimensions(&self, path: &Path) -> Result<(u32, u32), anyhow::Error>;

    /// File size in bytes.
    async fn file_size(&self, path: &Path) -> std::io::Result<u64>;
}

/// `ImageMetrics` backed by the `image` crate.
///
/// Only the header is parsed, so measuring a large original stays cheap.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeImageMetrics;

#[async_trait]
impl ImageMetrics for NativeImageMetrics {
    async fn dimensions(&self, path: &Path) -> Result<(u32, u32), anyhow::Error> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let reader = ImageReader::open(&path)?.with_guessed_format()?;
            if reader.format().is_none() {
                anyhow::bail!("Unrecognized image format");
            }
            Ok(reader.into_dimensions()?)
        })
        .await?
    }

    async fn file_size(&self, path: &Path) -> std::io::Result<u64> {
        Ok(tokio::fs::metadata(path).await?.len())
    }
}
