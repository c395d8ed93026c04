use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for the segmentation service.
///
/// Each variant carries the context of its failure domain (model lifecycle,
/// uploaded image, palette lookup, grid geometry, filesystem) so callers can
/// map failures to a response without parsing error strings.
#[derive(Error, Debug)]
pub enum PetSegError {
    #[error("Model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    #[error("Invalid image: {reason}")]
    InvalidImage { reason: String },

    #[error("Unsupported media type: {content_type}")]
    UnsupportedMediaType { content_type: String },

    #[error("Payload too large: {reason}")]
    PayloadTooLarge { reason: String },

    #[error("Unknown class index {index} (color table has {table_len} entries)")]
    UnknownClassIndex { index: u8, table_len: usize },

    #[error("Dimension mismatch: expected {}x{}, got {}x{}", expected.0, expected.1, actual.0, actual.1)]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoding error: {operation} failed")]
    Encoding {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type Result<T> = std::result::Result<T, PetSegError>;

impl PetSegError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable name of the variant, used in HTTP error bodies.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ModelUnavailable { .. } => "model_unavailable",
            Self::InvalidImage { .. } => "invalid_image",
            Self::UnsupportedMediaType { .. } => "unsupported_media_type",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::UnknownClassIndex { .. } => "unknown_class_index",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::Configuration { .. } => "configuration",
            Self::Validation { .. } => "validation",
            Self::Model { .. } => "model",
            Self::FileSystem { .. } => "filesystem",
            Self::Encoding { .. } => "encoding",
        }
    }
}

/// Convert anyhow errors to configuration errors.
///
/// anyhow only shows up at the binary boundary and in startup helpers, so
/// anything arriving through it is treated as a configuration problem.
impl From<anyhow::Error> for PetSegError {
    fn from(err: anyhow::Error) -> Self {
        PetSegError::Configuration {
            message: err.to_string(),
        }
    }
}

/// Convert I/O errors to filesystem errors.
///
/// Code that knows the path and operation should build
/// `PetSegError::FileSystem` directly.
impl From<std::io::Error> for PetSegError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

/// Decoding failures are the only `image` errors that reach this conversion;
/// encoders wrap their errors in `Encoding` explicitly.
impl From<image::ImageError> for PetSegError {
    fn from(err: image::ImageError) -> Self {
        Self::InvalidImage {
            reason: err.to_string(),
        }
    }
}

/// Convert ONNX Runtime errors to model errors.
impl From<ort::Error> for PetSegError {
    fn from(err: ort::Error) -> Self {
        Self::Model {
            operation: "ort operation".to_string(),
            source: Box::new(err),
        }
    }
}

/// Shape errors come out of tensor reshaping around inference, so they are
/// reported as model errors.
impl From<ndarray::ShapeError> for PetSegError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Model {
            operation: "tensor shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_message() {
        let err = PetSegError::DimensionMismatch {
            expected: (4, 3),
            actual: (2, 2),
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 4x3, got 2x2");
        assert_eq!(err.kind(), "dimension_mismatch");
    }

    #[test]
    fn test_io_error_conversion() {
        let err: PetSegError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, PetSegError::FileSystem { .. }));
    }
}
