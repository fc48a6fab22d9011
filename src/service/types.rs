//! Service layer types

use serde::{Deserialize, Serialize};

/// State of an edit session after an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub width: u32,
    pub height: u32,
    /// Working buffer differs from the upload
    pub modified: bool,
    /// Painted mask pixels
    pub mask_coverage: usize,
}

/// Image produced from a text prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    /// `data:` URL of the model output
    pub image: String,
    /// Token for opening the image in the editor
    pub handoff: String,
    pub width: u32,
    pub height: u32,
}

/// Request to save an image to a user's account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveImageRequest {
    pub email: Option<String>,
    /// Display name used when the user is created
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub resolution: Option<String>,
}

/// Title/description change for a saved image
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
}
