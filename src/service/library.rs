//! Library service - saved images and the local gallery
//!
//! Storage failures are logged and surfaced as `EditorError::Storage`; nothing
//! is retried.

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::engine::codec::decode_data_url;
use crate::engine::export::thumbnail;
use crate::error::{EditorError, EditorResult};
use crate::storage::{GalleryEntry, GalleryRepository, ImageRecord, ImageStorage, UserRecord};
use crate::utils::image::{encode_jpeg, to_data_url};

use super::types::{ImageUpdate, SaveImageRequest};

pub const DEFAULT_TITLE: &str = "Untitled Image";

/// Generated images are named after their prompt, cut to this many characters
pub const GALLERY_NAME_MAX_CHARS: usize = 40;

pub const GENERATED_TAGS: [&str; 2] = ["generated", "gemini-ai"];
pub const EDITED_TAGS: [&str; 2] = ["edited", "gemini-ai"];

fn storage_error(context: &str, err: anyhow::Error) -> EditorError {
    error!("{}: {:#}", context, err);
    EditorError::Storage(err.context(context.to_string()))
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Default display name: the part of the email before `@`
fn name_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Name for a generated gallery entry
pub fn generated_name(prompt: &str) -> String {
    if prompt.chars().count() > GALLERY_NAME_MAX_CHARS {
        let cut: String = prompt.chars().take(GALLERY_NAME_MAX_CHARS).collect();
        format!("{}...", cut)
    } else {
        prompt.to_string()
    }
}

pub struct LibraryService<S: ImageStorage, G: GalleryRepository> {
    storage: Arc<S>,
    gallery: Arc<G>,
    max_upload_bytes: usize,
}

impl<S: ImageStorage, G: GalleryRepository> LibraryService<S, G> {
    pub fn new(storage: Arc<S>, gallery: Arc<G>, max_upload_bytes: usize) -> Self {
        Self {
            storage,
            gallery,
            max_upload_bytes,
        }
    }

    /// Get a reference to the storage
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Save an image to the account identified by email.
    ///
    /// Identity and image URL are checked before storage is touched.
    pub async fn save_image(&self, request: SaveImageRequest) -> EditorResult<ImageRecord> {
        let email = non_empty(request.email);
        let image_url = non_empty(request.image_url);
        let (email, image_url) = match (email, image_url) {
            (Some(email), Some(url)) => (email, url),
            _ => return Err(EditorError::invalid("Email and image URL are required")),
        };

        let name = non_empty(request.name).unwrap_or_else(|| name_from_email(&email));
        let user = self
            .storage
            .upsert_user(&email, &name)
            .await
            .map_err(|e| storage_error("Failed to create or load user", e))?;

        let thumbnail_url = match non_empty(request.thumbnail_url) {
            Some(url) => Some(url),
            None => self.make_thumbnail(&image_url).await,
        };

        let now = now_ms();
        let record = ImageRecord {
            id: Uuid::new_v4().to_string(),
            title: non_empty(request.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: non_empty(request.description),
            url: image_url,
            thumbnail_url,
            resolution: non_empty(request.resolution),
            user_id: user.id.clone(),
            created_at: now,
            updated_at: now,
        };

        self.storage
            .create_image(&record)
            .await
            .map_err(|e| storage_error("Failed to save image", e))?;

        info!("Saved image {} for user {}", record.id, user.id);
        Ok(record)
    }

    /// JPEG thumbnail for inline images; remote URLs get none
    async fn make_thumbnail(&self, image_url: &str) -> Option<String> {
        if !image_url.starts_with("data:") {
            return None;
        }
        let url = image_url.to_string();
        let max = self.max_upload_bytes;
        let result = tokio::task::spawn_blocking(move || -> EditorResult<String> {
            let image = decode_data_url(&url, max)?;
            let jpeg = encode_jpeg(&thumbnail(&image))?;
            Ok(to_data_url("image/jpeg", &jpeg))
        })
        .await;

        match result {
            Ok(Ok(url)) => Some(url),
            Ok(Err(e)) => {
                info!("Skipping thumbnail: {}", e);
                None
            }
            Err(e) => {
                error!("Thumbnail task failed: {}", e);
                None
            }
        }
    }

    /// Images of the user with this email, newest first
    pub async fn list_images(&self, email: &str) -> EditorResult<Vec<ImageRecord>> {
        let user = self.find_user(email).await?;
        self.storage
            .list_images_by_user(&user.id)
            .await
            .map_err(|e| storage_error("Failed to list images", e))
    }

    pub async fn find_user(&self, email: &str) -> EditorResult<UserRecord> {
        let email = email.trim();
        if email.is_empty() {
            return Err(EditorError::invalid("Email is required"));
        }
        self.storage
            .get_user_by_email(email)
            .await
            .map_err(|e| storage_error("Failed to load user", e))?
            .ok_or_else(|| EditorError::not_found("User not found"))
    }

    pub async fn get_image(&self, id: &str) -> EditorResult<ImageRecord> {
        self.storage
            .get_image(id)
            .await
            .map_err(|e| storage_error("Failed to load image", e))?
            .ok_or_else(|| EditorError::not_found("Image not found"))
    }

    pub async fn update_image(&self, id: &str, update: ImageUpdate) -> EditorResult<ImageRecord> {
        if id.trim().is_empty() {
            return Err(EditorError::invalid("Image ID is required"));
        }
        let title = non_empty(update.title);
        let description = update.description.map(|d| d.trim().to_string());
        if title.is_none() && description.is_none() {
            return Err(EditorError::invalid("Nothing to update"));
        }

        self.storage
            .update_image(id, title.as_deref(), description.as_deref())
            .await
            .map_err(|e| storage_error("Failed to update image", e))?
            .ok_or_else(|| EditorError::not_found("Image not found"))
    }

    pub async fn delete_image(&self, id: &str) -> EditorResult<()> {
        if id.trim().is_empty() {
            return Err(EditorError::invalid("Image ID is required"));
        }
        let deleted = self
            .storage
            .delete_image(id)
            .await
            .map_err(|e| storage_error("Failed to delete image", e))?;

        if deleted {
            info!("Deleted image {}", id);
            Ok(())
        } else {
            Err(EditorError::not_found("Image not found"))
        }
    }

    pub async fn gallery_add(
        &self,
        url: String,
        name: String,
        tags: Vec<String>,
    ) -> EditorResult<GalleryEntry> {
        if url.trim().is_empty() {
            return Err(EditorError::invalid("Image URL is required"));
        }
        let entry = GalleryEntry {
            id: Uuid::new_v4().to_string(),
            url,
            name,
            created_at: now_ms(),
            tags,
        };
        self.gallery
            .add(entry.clone())
            .await
            .map_err(|e| storage_error("Failed to save to gallery", e))?;
        Ok(entry)
    }

    /// Store a freshly generated image under its prompt
    pub async fn gallery_add_generated(
        &self,
        image_url: String,
        prompt: &str,
    ) -> EditorResult<GalleryEntry> {
        let tags = GENERATED_TAGS.iter().map(|t| t.to_string()).collect();
        self.gallery_add(image_url, generated_name(prompt.trim()), tags)
            .await
    }

    /// Store the current editor result
    pub async fn gallery_add_edited(&self, png: &[u8]) -> EditorResult<GalleryEntry> {
        let name = format!("Edited Image {}", chrono::Local::now().format("%Y-%m-%d"));
        let tags = EDITED_TAGS.iter().map(|t| t.to_string()).collect();
        self.gallery_add(to_data_url("image/png", png), name, tags)
            .await
    }

    /// Entries matching `search` on name or tag, newest first
    pub async fn gallery_list(&self, search: Option<&str>) -> EditorResult<Vec<GalleryEntry>> {
        let mut entries = self
            .gallery
            .list()
            .await
            .map_err(|e| storage_error("Failed to read gallery", e))?;

        let term = search.unwrap_or_default();
        entries.retain(|e| e.matches(term));
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    pub async fn gallery_get(&self, id: &str) -> EditorResult<GalleryEntry> {
        self.gallery
            .list()
            .await
            .map_err(|e| storage_error("Failed to read gallery", e))?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| EditorError::not_found("Gallery image not found"))
    }

    pub async fn gallery_delete(&self, id: &str) -> EditorResult<()> {
        let deleted = self
            .gallery
            .delete(id)
            .await
            .map_err(|e| storage_error("Failed to delete from gallery", e))?;
        if deleted {
            Ok(())
        } else {
            Err(EditorError::not_found("Gallery image not found"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    use crate::storage::{MemoryGalleryStore, SqliteStorage};
    use crate::utils::image::encode_png;

    async fn library(
        dir: &tempfile::TempDir,
    ) -> LibraryService<SqliteStorage, MemoryGalleryStore> {
        let db_path = dir.path().join("library.db");
        let storage = SqliteStorage::new(db_path.to_str().unwrap()).await.unwrap();
        LibraryService::new(
            Arc::new(storage),
            Arc::new(MemoryGalleryStore::new()),
            10 * 1024 * 1024,
        )
    }

    fn png_data_url(w: u32, h: u32) -> String {
        let png = encode_png(&RgbaImage::from_pixel(w, h, Rgba([9, 9, 9, 255]))).unwrap();
        to_data_url("image/png", &png)
    }

    fn request(email: &str, url: &str) -> SaveImageRequest {
        SaveImageRequest {
            email: Some(email.to_string()),
            image_url: Some(url.to_string()),
            ..SaveImageRequest::default()
        }
    }

    #[tokio::test]
    async fn test_save_requires_email_and_url() {
        let dir = tempdir().unwrap();
        let lib = library(&dir).await;

        let err = lib.save_image(request("", "https://x/y.png")).await.unwrap_err();
        assert_eq!(err.to_string(), "Email and image URL are required");
        let err = lib.save_image(request("a@b.c", "  ")).await.unwrap_err();
        assert!(matches!(err, EditorError::InvalidInput(_)));
        assert_eq!(lib.storage().count_images().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_twice_reuses_user() {
        let dir = tempdir().unwrap();
        let lib = library(&dir).await;

        let first = lib
            .save_image(request("ann@example.com", &png_data_url(800, 600)))
            .await
            .unwrap();
        let second = lib
            .save_image(request("ann@example.com", "https://cdn.example.com/a.png"))
            .await
            .unwrap();

        assert_eq!(first.user_id, second.user_id);
        assert_eq!(first.title, DEFAULT_TITLE);
        assert!(first
            .thumbnail_url
            .as_deref()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
        assert!(second.thumbnail_url.is_none());

        let user = lib.find_user("ann@example.com").await.unwrap();
        assert_eq!(user.name, "ann");

        let images = lib.list_images("ann@example.com").await.unwrap();
        assert_eq!(images.len(), 2);
        assert!(images[0].created_at >= images[1].created_at);
    }

    #[tokio::test]
    async fn test_list_unknown_user_is_not_found() {
        let dir = tempdir().unwrap();
        let lib = library(&dir).await;
        assert!(matches!(
            lib.list_images("ghost@example.com").await,
            Err(EditorError::NotFound(_))
        ));
        assert!(matches!(lib.list_images("").await, Err(EditorError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_delete_missing_image_fails() {
        let dir = tempdir().unwrap();
        let lib = library(&dir).await;
        assert!(matches!(
            lib.delete_image("does-not-exist").await,
            Err(EditorError::NotFound(_))
        ));

        let saved = lib
            .save_image(request("ann@example.com", "https://x/y.png"))
            .await
            .unwrap();
        lib.delete_image(&saved.id).await.unwrap();
        assert!(lib.get_image(&saved.id).await.is_err());
    }

    #[tokio::test]
    async fn test_update_image_title() {
        let dir = tempdir().unwrap();
        let lib = library(&dir).await;
        let saved = lib
            .save_image(request("ann@example.com", "https://x/y.png"))
            .await
            .unwrap();

        let updated = lib
            .update_image(
                &saved.id,
                ImageUpdate {
                    title: Some("Harbour".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Harbour");
        assert!(lib.update_image(&saved.id, ImageUpdate::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_gallery_generated_and_search() {
        let dir = tempdir().unwrap();
        let lib = library(&dir).await;

        let long_prompt = "A serene sunset over a mountain lake with reflections of pink and orange clouds";
        let generated = lib
            .gallery_add_generated(png_data_url(2, 2), long_prompt)
            .await
            .unwrap();
        assert_eq!(generated.name, "A serene sunset over a mountain lake wit...");
        assert_eq!(generated.tags, vec!["generated", "gemini-ai"]);

        let png = encode_png(&RgbaImage::new(2, 2)).unwrap();
        let edited = lib.gallery_add_edited(&png).await.unwrap();
        assert!(edited.name.starts_with("Edited Image "));

        assert_eq!(lib.gallery_list(None).await.unwrap().len(), 2);
        let hits = lib.gallery_list(Some("SUNSET")).await.unwrap();
        assert_eq!(hits.len(), 1);
        let hits = lib.gallery_list(Some("edited")).await.unwrap();
        assert_eq!(hits[0].id, edited.id);

        lib.gallery_delete(&generated.id).await.unwrap();
        assert!(lib.gallery_delete(&generated.id).await.is_err());
    }

    #[test]
    fn test_generated_name_short_prompt() {
        assert_eq!(generated_name("A cat"), "A cat");
    }
}
