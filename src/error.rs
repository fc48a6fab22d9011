//! Error taxonomy shared by the editor, the model client and the API layer

use thiserror::Error;

/// Convenience result type for editor operations
pub type EditorResult<T> = Result<T, EditorError>;

/// Failures of the external generative model call
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model response could not be parsed: {0}")]
    InvalidResponse(String),
    #[error("No image generated in response")]
    NoImage,
    #[error("model API key is not configured")]
    MissingApiKey,
}

/// Top-level error taxonomy for editor operations
#[derive(Debug, Error)]
pub enum EditorError {
    /// Invalid user-provided parameters or payloads
    #[error("{0}")]
    InvalidInput(String),

    /// Upload that is not a JPEG, PNG, WebP or GIF image
    #[error("Please upload a valid image file (JPEG, PNG, WEBP, GIF)")]
    UnsupportedFormat,

    /// Upload larger than the configured limit
    #[error("Image is too large ({size} bytes, max {max} bytes)")]
    TooLarge { size: usize, max: usize },

    /// Generative fill submitted without any painted mask pixel
    #[error("No mask drawn. Please draw a mask on the areas you want to edit.")]
    EmptyMask,

    /// Another tool is still processing the same session
    #[error("Another operation is still processing this image")]
    Busy,

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Storage(anyhow::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EditorError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Stable machine-readable code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            EditorError::InvalidInput(_) => "INVALID_INPUT",
            EditorError::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            EditorError::TooLarge { .. } => "TOO_LARGE",
            EditorError::EmptyMask => "EMPTY_MASK",
            EditorError::Busy => "BUSY",
            EditorError::NotFound(_) => "NOT_FOUND",
            EditorError::Model(_) => "MODEL_FAILED",
            EditorError::Storage(_) => "STORAGE_FAILED",
            EditorError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<image::ImageError> for EditorError {
    fn from(err: image::ImageError) -> Self {
        EditorError::InvalidInput(format!("Failed to process image: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(EditorError::EmptyMask.code(), "EMPTY_MASK");
        assert_eq!(EditorError::from(ModelError::NoImage).code(), "MODEL_FAILED");
        assert_eq!(EditorError::not_found("x").code(), "NOT_FOUND");
    }

    #[test]
    fn test_model_error_message() {
        let err = EditorError::from(ModelError::NoImage);
        assert_eq!(err.to_string(), "No image generated in response");
    }
}
