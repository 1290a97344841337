use visiongate_core::config::UploadConfig;
use visiongate_core::{AppError, ErrorKind, ImageKind, UploadedBlob};

/// Validation errors for uploaded images
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid filename: {0:?} has no file extension")]
    InvalidFilename(String),

    #[error("Invalid file extension: {extension} (allowed: {allowed:?})")]
    InvalidExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("File content is not a valid {expected} file (detected: {})", kind_name(.detected))]
    SignatureMismatch {
        expected: &'static str,
        detected: Option<ImageKind>,
    },

    #[error("Invalid image: {0}")]
    Undecodable(String),

    #[error("Invalid image: dimensions {width}x{height} are not usable")]
    ZeroDimension { width: u32, height: u32 },

    #[error("Invalid image: {channels} channels (expected 1, 3 or 4)")]
    UnsupportedChannels { channels: u8 },

    #[error("Invalid image: {width}x{height} exceeds maximum dimension of {max}")]
    DimensionsTooLarge { width: u32, height: u32, max: u32 },
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::InvalidFilename(_)
            | ValidationError::InvalidExtension { .. }
            | ValidationError::SignatureMismatch { .. } => ErrorKind::UnsupportedFileType,
            ValidationError::FileTooLarge { .. } => ErrorKind::FileSizeExceeded,
            ValidationError::Undecodable(_)
            | ValidationError::ZeroDimension { .. }
            | ValidationError::UnsupportedChannels { .. }
            | ValidationError::DimensionsTooLarge { .. } => ErrorKind::InvalidImage,
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::FileTooLarge { size, max } => AppError::FileSizeExceeded { size, max },
            other if other.kind() == ErrorKind::UnsupportedFileType => {
                AppError::UnsupportedFileType(other.to_string())
            }
            other => AppError::InvalidImage(other.to_string()),
        }
    }
}

fn kind_name(kind: &Option<ImageKind>) -> &'static str {
    kind.map(|k| k.name()).unwrap_or("unknown")
}

/// Pass (with the format implied by the extension) or the first failing check.
pub type ValidationVerdict = Result<ImageKind, ValidationError>;

/// Leading bytes needed to tell every supported format apart.
const SNIFF_LEN: usize = 12;

/// Identify a blob's format from its magic number.
pub fn sniff_format(bytes: &[u8]) -> Option<ImageKind> {
    if bytes.len() < SNIFF_LEN {
        return None;
    }
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some(ImageKind::Jpeg),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(ImageKind::Png),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(ImageKind::Gif),
        [b'B', b'M', ..] => Some(ImageKind::Bmp),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(ImageKind::WebP),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Some(ImageKind::Tiff),
        _ => None,
    }
}

/// Cheap structural checks run on every upload before any decoding.
///
/// Checks run in a fixed order and stop at the first failure:
/// extension allow-list, received byte count, magic number agreeing with the
/// extension.
#[derive(Debug, Clone)]
pub struct FileGuard {
    max_file_size: usize,
    allowed_extensions: Vec<String>,
}

impl FileGuard {
    pub fn new(max_file_size: usize, allowed_extensions: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.max_file_size, config.allowed_extensions.clone())
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub fn validate(&self, blob: &UploadedBlob) -> ValidationVerdict {
        let kind = self.validate_extension(blob)?;
        self.validate_file_size(blob.len())?;
        self.validate_signature(&blob.bytes, kind)?;
        Ok(kind)
    }

    /// Validate the declared filename's extension against the allow-list
    pub fn validate_extension(&self, blob: &UploadedBlob) -> Result<ImageKind, ValidationError> {
        let extension = blob
            .extension()
            .ok_or_else(|| ValidationError::InvalidFilename(blob.filename.clone()))?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::InvalidExtension {
                extension,
                allowed: self.allowed_extensions.clone(),
            });
        }

        ImageKind::from_extension(&extension).ok_or_else(|| ValidationError::InvalidExtension {
            extension,
            allowed: self.allowed_extensions.clone(),
        })
    }

    /// Validate file size against the received byte count
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Validate that the magic number matches the format implied by the extension
    pub fn validate_signature(
        &self,
        bytes: &[u8],
        expected: ImageKind,
    ) -> Result<(), ValidationError> {
        let detected = sniff_format(bytes);
        if detected != Some(expected) {
            tracing::debug!(
                expected = expected.name(),
                detected = kind_name(&detected),
                "Upload signature does not match extension"
            );
            return Err(ValidationError::SignatureMismatch {
                expected: expected.name(),
                detected,
            });
        }
        Ok(())
    }
}
