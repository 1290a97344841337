use bytes::Bytes;
use image::{DynamicImage, ImageFormat, ImageReader, Limits};
use std::io::Cursor;
use visiongate_core::{ImageKind, ImageShape};

use crate::validator::ValidationError;

/// A decoded upload. Owned by a single request and dropped with it.
#[derive(Debug)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub kind: ImageKind,
    pub pixels: DynamicImage,
    /// Original encoded bytes, forwarded to remote model backends.
    pub source: Bytes,
}

impl DecodedImage {
    pub fn shape(&self) -> ImageShape {
        ImageShape {
            width: self.width,
            height: self.height,
            channels: self.channels,
        }
    }
}

/// Decoding seam of the pipeline.
pub trait ImageDecoder: Send + Sync + 'static {
    fn decode(&self, bytes: Bytes, kind: ImageKind) -> Result<DecodedImage, ValidationError>;
}

/// Decodes uploads with the `image` crate and rejects unusable results.
#[derive(Debug, Clone)]
pub struct ImageGuard {
    max_dimension: u32,
}

impl ImageGuard {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    fn limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        limits
    }
}

fn image_format(kind: ImageKind) -> ImageFormat {
    match kind {
        ImageKind::Jpeg => ImageFormat::Jpeg,
        ImageKind::Png => ImageFormat::Png,
        ImageKind::Gif => ImageFormat::Gif,
        ImageKind::Bmp => ImageFormat::Bmp,
        ImageKind::WebP => ImageFormat::WebP,
        ImageKind::Tiff => ImageFormat::Tiff,
    }
}

impl ImageDecoder for ImageGuard {
    fn decode(&self, bytes: Bytes, kind: ImageKind) -> Result<DecodedImage, ValidationError> {
        let format = image_format(kind);

        // Header-only pass so oversized images are rejected before allocating pixels.
        let (width, height) = ImageReader::with_format(Cursor::new(bytes.as_ref()), format)
            .into_dimensions()
            .map_err(|e| ValidationError::Undecodable(e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(ValidationError::ZeroDimension { width, height });
        }
        if width > self.max_dimension || height > self.max_dimension {
            return Err(ValidationError::DimensionsTooLarge {
                width,
                height,
                max: self.max_dimension,
            });
        }

        let mut reader = ImageReader::with_format(Cursor::new(bytes.as_ref()), format);
        reader.limits(self.limits());
        let pixels = reader
            .decode()
            .map_err(|e| ValidationError::Undecodable(e.to_string()))?;

        let channels = pixels.color().channel_count();
        if !matches!(channels, 1 | 3 | 4) {
            return Err(ValidationError::UnsupportedChannels { channels });
        }

        tracing::debug!(width, height, channels, format = kind.name(), "Image decoded");

        Ok(DecodedImage {
            width,
            height,
            channels,
            kind,
            pixels,
            source: bytes,
        })
    }
}
