//! REST API request/response data transfer objects

use serde::{Deserialize, Serialize};

use crate::storage::{GalleryEntry, ImageRecord};

/// Query parameters for `/images`
#[derive(Debug, Default, Deserialize)]
pub struct ImagesQuery {
    pub email: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub success: bool,
    pub image: ImageRecord,
}

#[derive(Debug, Serialize)]
pub struct ImagesResponse {
    pub success: bool,
    pub images: Vec<ImageRecord>,
}

/// Delete response
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

/// Open an editor from a handoff token or an inline image URL
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub handoff: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RotateRequest {
    pub degrees: f32,
}

#[derive(Debug, Default, Deserialize)]
pub struct FillRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct AiFilterRequest {
    pub filter: String,
    pub prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub resolution: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FilterDto {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ResolutionDto {
    pub id: &'static str,
    pub label: &'static str,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct EditorOptionsResponse {
    pub filters: Vec<FilterDto>,
    pub resolutions: Vec<ResolutionDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub save_to_gallery: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub image: String,
    pub handoff: String,
    pub width: u32,
    pub height: u32,
    pub gallery_entry: Option<GalleryEntry>,
    /// Set when the image was generated but could not be kept in the gallery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gallery_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PromptsResponse {
    pub prompts: Vec<&'static str>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GalleryQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GalleryAddRequest {
    pub url: String,
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GalleryResponse {
    pub images: Vec<GalleryEntry>,
}

#[derive(Debug, Serialize)]
pub struct HandoffResponse {
    pub handoff: String,
}

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
    pub open_sessions: usize,
    pub uptime_seconds: u64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            code: code.to_string(),
        }
    }
}
