//! Storage abstraction traits
//!
//! Defines the interface for account and saved-image persistence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use anyhow::Result;

/// A registered user, keyed by email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Unique user ID (UUID)
    pub id: String,
    pub email: String,
    pub name: String,
    /// Creation timestamp (unix ms)
    pub created_at: i64,
}

/// An image saved to a user's account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Unique image ID (UUID)
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// Image location; usually a data URL
    pub url: String,
    pub thumbnail_url: Option<String>,
    /// Export resolution the image was saved at
    pub resolution: Option<String>,
    pub user_id: String,
    /// Creation timestamp (unix ms)
    pub created_at: i64,
    /// Last updated timestamp (unix ms)
    pub updated_at: i64,
}

/// Image storage trait
/// Implementations must be thread-safe and async-compatible
#[async_trait]
pub trait ImageStorage: Send + Sync + 'static {
    /// Create the user or return the existing one with the same email.
    /// Must be a single atomic operation.
    async fn upsert_user(&self, email: &str, name: &str) -> Result<UserRecord>;

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    /// Save a new image record
    async fn create_image(&self, record: &ImageRecord) -> Result<()>;

    async fn get_image(&self, id: &str) -> Result<Option<ImageRecord>>;

    /// All images of a user, newest first
    async fn list_images_by_user(&self, user_id: &str) -> Result<Vec<ImageRecord>>;

    /// Update title and/or description; `None` when the image doesn't exist
    async fn update_image(
        &self,
        id: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<ImageRecord>>;

    /// Delete an image record
    async fn delete_image(&self, id: &str) -> Result<bool>;

    /// Get total image count
    async fn count_images(&self) -> Result<i64>;
}
