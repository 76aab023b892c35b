//! Image metadata probing and downloads

use async_trait::async_trait;
use chrono::NaiveDate;
use potd_common::config::SourcesConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::{PipelineError, PipelineResult};

/// Width, height and size of a remote image. Any field may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size_bytes: Option<u64>,
}

impl ImageMetadata {
    /// All three values, or `None` if any is missing
    pub fn complete(&self) -> Option<(u32, u32, u64)> {
        match (self.width, self.height, self.size_bytes) {
            (Some(w), Some(h), Some(s)) => Some((w, h, s)),
            _ => None,
        }
    }
}

/// Bytes fetched by `download`
#[derive(Debug, Clone)]
pub struct DownloadedImage {
    pub bytes: Vec<u8>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size_bytes: u64,
}

#[async_trait]
pub trait ImageResolver: Send + Sync {
    /// Probe dimensions and size. Never fails; unknown values are `None`.
    async fn metadata(&self, url: &str) -> ImageMetadata;

    /// Download unconditionally, writing to `save_path` when given
    async fn download(&self, url: &str, save_path: Option<&Path>)
        -> PipelineResult<DownloadedImage>;
}

/// Storage path relative to the media root:
/// `pictures/{source}/{YYYY}/{MM}/{filename or YYYY-MM-DD.jpg}`
pub fn image_path(source: &str, date: NaiveDate, filename: Option<&str>) -> PathBuf {
    let filename = filename
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}.jpg", date.format("%Y-%m-%d")));

    PathBuf::from("pictures")
        .join(source)
        .join(date.format("%Y").to_string())
        .join(date.format("%m").to_string())
        .join(filename)
}

/// Pixel dimensions if the bytes decode as an image
pub fn decode_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    match image::load_from_memory(bytes) {
        Ok(img) => Some((img.width(), img.height())),
        Err(e) => {
            debug!(error = %e, "Could not decode image");
            None
        }
    }
}

/// Write bytes, creating parent directories first
pub async fn write_image(path: &Path, bytes: &[u8]) -> PipelineResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

/// reqwest-backed resolver
pub struct HttpImageResolver {
    client: reqwest::Client,
}

impl HttpImageResolver {
    pub fn from_config(config: &SourcesConfig) -> PipelineResult<Self> {
        let client = crate::fetchers::http_client(config, config.image_timeout())?;
        Ok(Self { client })
    }

    async fn get_bytes(&self, url: &str) -> PipelineResult<(Vec<u8>, Option<u64>)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::Image(format!("Request failed: {}", e)))?;

        let content_length = response.content_length();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Image(format!("Failed to read body: {}", e)))?;

        Ok((bytes.to_vec(), content_length))
    }
}

#[async_trait]
impl ImageResolver for HttpImageResolver {
    async fn metadata(&self, url: &str) -> ImageMetadata {
        let (bytes, content_length) = match self.get_bytes(url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(url, error = %e, "Image metadata unavailable");
                return ImageMetadata::default();
            }
        };

        let dimensions = decode_dimensions(&bytes);
        ImageMetadata {
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
            size_bytes: Some(content_length.unwrap_or(bytes.len() as u64)),
        }
    }

    async fn download(
        &self,
        url: &str,
        save_path: Option<&Path>,
    ) -> PipelineResult<DownloadedImage> {
        let (bytes, _) = self.get_bytes(url).await?;
        let dimensions = decode_dimensions(&bytes);

        if let Some(path) = save_path {
            write_image(path, &bytes).await?;
            debug!(path = %path.display(), bytes = bytes.len(), "Image saved");
        }

        Ok(DownloadedImage {
            size_bytes: bytes.len() as u64,
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_image_path_layout() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(
            image_path("apod", date, None),
            PathBuf::from("pictures/apod/2024/01/2024-01-05.jpg")
        );
        assert_eq!(
            image_path("bing", date, Some("custom.png")),
            PathBuf::from("pictures/bing/2024/01/custom.png")
        );
    }

    #[test]
    fn test_decode_dimensions() {
        assert_eq!(decode_dimensions(&png_bytes(4, 3)), Some((4, 3)));
        assert_eq!(decode_dimensions(b"not an image"), None);
    }

    #[test]
    fn test_metadata_complete() {
        let partial = ImageMetadata {
            width: None,
            height: None,
            size_bytes: Some(10),
        };
        assert_eq!(partial.complete(), None);

        let full = ImageMetadata {
            width: Some(4),
            height: Some(3),
            size_bytes: Some(10),
        };
        assert_eq!(full.complete(), Some((4, 3, 10)));
    }

    #[tokio::test]
    async fn test_write_image_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let path = dir.path().join(image_path("apod", date, None));

        write_image(&path, &png_bytes(2, 2)).await.unwrap();

        let written = std::fs::read(&path).unwrap();
        assert_eq!(decode_dimensions(&written), Some((2, 2)));
    }

    #[tokio::test]
    async fn test_metadata_network_failure_is_all_absent() {
        let resolver = HttpImageResolver::from_config(&SourcesConfig::default()).unwrap();
        let metadata = resolver.metadata("http://127.0.0.1:9/missing.jpg").await;
        assert_eq!(metadata, ImageMetadata::default());
    }

    #[tokio::test]
    async fn test_download_network_failure_raises() {
        let resolver = HttpImageResolver::from_config(&SourcesConfig::default()).unwrap();
        let err = resolver
            .download("http://127.0.0.1:9/missing.jpg", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Image(_)));
    }
}
