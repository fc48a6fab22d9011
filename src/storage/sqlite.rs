//! SQLite storage implementation

use std::path::Path;

use async_trait::async_trait;
use sqlx::{sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow}, Row};
use anyhow::{Result, Context};
use tracing::{info, debug};

use super::traits::{ImageStorage, ImageRecord, UserRecord};

const IMAGE_COLUMNS: &str =
    "id, title, description, url, thumbnail_url, resolution, user_id, created_at, updated_at";

/// SQLite-based account and image storage
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage
    pub async fn new(db_path: &str) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", db_path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let storage = Self { pool };
        storage.initialize().await?;

        Ok(storage)
    }

    /// Initialize database schema
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS images (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                url TEXT NOT NULL,
                thumbnail_url TEXT,
                resolution TEXT,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_images_user_created ON images(user_id, created_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("SQLite database initialized");
        Ok(())
    }
}

fn user_from_row(row: &SqliteRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

fn image_from_row(row: &SqliteRow) -> ImageRecord {
    ImageRecord {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        url: row.get("url"),
        thumbnail_url: row.get("thumbnail_url"),
        resolution: row.get("resolution"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl ImageStorage for SqliteStorage {
    async fn upsert_user(&self, email: &str, name: &str) -> Result<UserRecord> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let row = sqlx::query(
            r#"
            INSERT INTO users (id, email, name, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET email = excluded.email
            RETURNING id, email, name, created_at
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(email)
        .bind(name)
        .bind(chrono::Utc::now().timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert user")?;

        let user = user_from_row(&row);
        debug!("Upserted user: {}", user.id);
        Ok(user)
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT id, email, name, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT id, email, name, created_at FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn create_image(&self, record: &ImageRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO images (id, title, description, url, thumbnail_url, resolution, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.url)
        .bind(&record.thumbnail_url)
        .bind(&record.resolution)
        .bind(&record.user_id)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Saved image: {}", record.id);
        Ok(())
    }

    async fn get_image(&self, id: &str) -> Result<Option<ImageRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM images WHERE id = ?", IMAGE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(image_from_row))
    }

    async fn list_images_by_user(&self, user_id: &str) -> Result<Vec<ImageRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM images WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
            IMAGE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(image_from_row).collect())
    }

    async fn update_image(
        &self,
        id: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<ImageRecord>> {
        let result = sqlx::query(
            r#"
            UPDATE images
            SET title = COALESCE(?, title), description = COALESCE(?, description), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(chrono::Utc::now().timestamp_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_image(id).await
    }

    async fn delete_image(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_images(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM images")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("count"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn image(id: &str, user_id: &str, created_at: i64) -> ImageRecord {
        ImageRecord {
            id: id.to_string(),
            title: "Untitled Image".to_string(),
            description: None,
            url: "data:image/png;base64,AAAA".to_string(),
            thumbnail_url: None,
            resolution: Some("hd".to_string()),
            user_id: user_id.to_string(),
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn test_upsert_user_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested/test.db");
        let storage = SqliteStorage::new(db_path.to_str().unwrap()).await.unwrap();

        let first = storage.upsert_user("ann@example.com", "ann").await.unwrap();
        let second = storage.upsert_user("ann@example.com", "someone else").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "ann");

        let other = storage.upsert_user("bob@example.com", "bob").await.unwrap();
        assert_ne!(first.id, other.id);

        let by_email = storage.get_user_by_email("ann@example.com").await.unwrap();
        assert_eq!(by_email, Some(first.clone()));
        assert_eq!(storage.get_user(&first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_image_crud() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(db_path.to_str().unwrap()).await.unwrap();

        let user = storage.upsert_user("ann@example.com", "ann").await.unwrap();
        storage.create_image(&image("img-1", &user.id, 1000)).await.unwrap();
        storage.create_image(&image("img-2", &user.id, 2000)).await.unwrap();

        // Newest first
        let list = storage.list_images_by_user(&user.id).await.unwrap();
        let ids: Vec<&str> = list.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["img-2", "img-1"]);
        assert_eq!(storage.count_images().await.unwrap(), 2);

        // Update
        let updated = storage
            .update_image("img-1", Some("Beach"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Beach");
        assert!(updated.description.is_none());
        assert!(storage.update_image("missing", Some("x"), None).await.unwrap().is_none());

        // Delete
        assert!(storage.delete_image("img-1").await.unwrap());
        assert!(!storage.delete_image("img-1").await.unwrap());
        assert!(storage.get_image("img-1").await.unwrap().is_none());
        assert_eq!(storage.count_images().await.unwrap(), 1);
    }
}
