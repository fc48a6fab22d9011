//! Generative image model boundary
//!
//! The editor only sees the `ImageModel` trait; `GeminiClient` is the HTTP
//! implementation used by the binary.

pub mod gemini;
pub mod prompts;

use async_trait::async_trait;

use crate::error::{EditorError, EditorResult};
use crate::utils::image::{parse_data_url, to_data_url};

pub use gemini::GeminiClient;
pub use prompts::AiFilter;

/// Maximum number of images attached to one request (image + mask)
pub const MAX_REQUEST_IMAGES: usize = 2;

/// Image payload exchanged with the model
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn png(data: Vec<u8>) -> Self {
        Self::new("image/png", data)
    }

    pub fn to_data_url(&self) -> String {
        to_data_url(&self.mime_type, &self.data)
    }

    pub fn from_data_url(url: &str) -> EditorResult<Self> {
        let (mime_type, data) =
            parse_data_url(url).map_err(|e| EditorError::invalid(e.to_string()))?;
        Ok(Self { mime_type, data })
    }
}

/// One instruction plus zero to two images
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub instruction: String,
    pub images: Vec<InlineImage>,
}

impl ModelRequest {
    pub fn text(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.images.push(image);
        self
    }

    pub fn validate(&self) -> EditorResult<()> {
        if self.instruction.trim().is_empty() {
            return Err(EditorError::invalid("Model instruction is empty"));
        }
        if self.images.len() > MAX_REQUEST_IMAGES {
            return Err(EditorError::invalid(format!(
                "At most {} images can be sent to the model",
                MAX_REQUEST_IMAGES
            )));
        }
        Ok(())
    }
}

/// Text+images in, one image out
#[async_trait]
pub trait ImageModel: Send + Sync + 'static {
    async fn edit(&self, request: ModelRequest) -> EditorResult<InlineImage>;
}
