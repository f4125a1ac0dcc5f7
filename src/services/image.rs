use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};

use crate::config::MAX_IMAGE_BYTES;
use crate::error::VisionError;
use crate::models::ProcessedImage;

/// Turns raw upload bytes into a `ProcessedImage`.
///
/// Implementations that downscale or recompress plug in behind this trait;
/// the standard one only validates and encodes.
#[async_trait]
pub trait ImagePreparer: Send + Sync {
    async fn prepare(
        &self,
        bytes: Vec<u8>,
        mime_type: Option<&str>,
    ) -> Result<ProcessedImage, VisionError>;
}

pub struct StandardImagePreparer {
    max_bytes: usize,
}

impl StandardImagePreparer {
    pub fn new() -> Self {
        Self {
            max_bytes: MAX_IMAGE_BYTES,
        }
    }

    #[allow(dead_code)]
    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl Default for StandardImagePreparer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImagePreparer for StandardImagePreparer {
    async fn prepare(
        &self,
        bytes: Vec<u8>,
        mime_type: Option<&str>,
    ) -> Result<ProcessedImage, VisionError> {
        if bytes.is_empty() {
            return Err(VisionError::InvalidImage("image data is empty".to_string()));
        }
        if bytes.len() > self.max_bytes {
            return Err(VisionError::InvalidImage(format!(
                "image is {} bytes, maximum is {}",
                bytes.len(),
                self.max_bytes
            )));
        }

        let mime = match mime_type {
            Some(declared) if declared.starts_with("image/") => declared.to_string(),
            Some(other) => {
                return Err(VisionError::InvalidImage(format!(
                    "unsupported content type: {}",
                    other
                )))
            }
            None => sniff_mime(&bytes).to_string(),
        };

        let base64_data = general_purpose::STANDARD.encode(&bytes);
        log::debug!(
            "📊 Prepared image: {} bytes, {} ({} base64 chars)",
            bytes.len(),
            mime,
            base64_data.len()
        );

        Ok(ProcessedImage {
            byte_size: bytes.len(),
            width: None,
            height: None,
            mime_type: mime,
            base64_data,
            bytes,
        })
    }
}

/// MIME from magic bytes, defaulting to JPEG (the common phone-camera case).
fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prepare_sniffs_png() {
        let preparer = StandardImagePreparer::new();
        let bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

        let image = preparer.prepare(bytes, None).await.unwrap();

        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.byte_size, 8);
        assert!(image.data_url().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_prepare_defaults_unknown_magic_to_jpeg() {
        let preparer = StandardImagePreparer::new();
        let image = preparer.prepare(vec![0x00, 0x01, 0x02], None).await.unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_prepare_rejects_empty_and_oversize() {
        let preparer = StandardImagePreparer::with_max_bytes(4);

        assert!(matches!(
            preparer.prepare(Vec::new(), None).await,
            Err(VisionError::InvalidImage(_))
        ));
        assert!(matches!(
            preparer.prepare(vec![0; 5], None).await,
            Err(VisionError::InvalidImage(_))
        ));
    }

    #[tokio::test]
    async fn test_prepare_rejects_non_image_content_type() {
        let preparer = StandardImagePreparer::new();
        let result = preparer.prepare(vec![1, 2, 3], Some("application/pdf")).await;
        assert!(matches!(result, Err(VisionError::InvalidImage(_))));
    }

    #[tokio::test]
    async fn test_prepare_keeps_declared_image_type() {
        let preparer = StandardImagePreparer::new();
        let image = preparer
            .prepare(vec![1, 2, 3], Some("image/heic"))
            .await
            .unwrap();
        assert_eq!(image.mime_type, "image/heic");
    }
}
