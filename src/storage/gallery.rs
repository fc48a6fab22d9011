//! Local gallery persistence
//!
//! Entries are kept newest first. The JSON store rewrites the whole file on
//! every change through a temp file and a rename.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One image in the local gallery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryEntry {
    pub id: String,
    pub url: String,
    pub name: String,
    /// Creation timestamp (unix ms)
    pub created_at: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl GalleryEntry {
    /// Case-insensitive match on the name or any tag; an empty term matches all
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&term)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&term))
    }
}

#[async_trait]
pub trait GalleryRepository: Send + Sync + 'static {
    /// All entries, newest first
    async fn list(&self) -> Result<Vec<GalleryEntry>>;

    async fn add(&self, entry: GalleryEntry) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<bool>;
}

/// In-process gallery, lost on restart
#[derive(Default)]
pub struct MemoryGalleryStore {
    entries: Mutex<Vec<GalleryEntry>>,
}

impl MemoryGalleryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GalleryRepository for MemoryGalleryStore {
    async fn list(&self) -> Result<Vec<GalleryEntry>> {
        Ok(self.entries.lock().clone())
    }

    async fn add(&self, entry: GalleryEntry) -> Result<()> {
        self.entries.lock().insert(0, entry);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        Ok(entries.len() != before)
    }
}

/// Gallery persisted as a JSON array on disk.
///
/// The async lock is held across the file write so the in-memory list and
/// the file change together, one writer at a time.
pub struct JsonGalleryStore {
    path: PathBuf,
    entries: tokio::sync::Mutex<Vec<GalleryEntry>>,
}

impl JsonGalleryStore {
    /// Open the gallery file, starting empty when it doesn't exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries: Vec<GalleryEntry> = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read gallery file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid gallery file {}", path.display()))?
        } else {
            Vec::new()
        };

        info!("Gallery loaded from {} ({} entries)", path.display(), entries.len());
        Ok(Self {
            path,
            entries: tokio::sync::Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `entries` on the blocking pool and hand them back once on disk
    async fn persist(&self, entries: Vec<GalleryEntry>) -> Result<Vec<GalleryEntry>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<GalleryEntry>> {
            write_gallery(&path, &entries)?;
            Ok(entries)
        })
        .await
        .context("Gallery write task failed")?
    }
}

fn write_gallery(path: &Path, entries: &[GalleryEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let content = serde_json::to_string(entries)?;
    std::fs::write(&tmp, content).context("Failed to write gallery file")?;
    std::fs::rename(&tmp, path).context("Failed to replace gallery file")?;
    debug!("Gallery saved ({} entries)", entries.len());
    Ok(())
}

#[async_trait]
impl GalleryRepository for JsonGalleryStore {
    async fn list(&self) -> Result<Vec<GalleryEntry>> {
        Ok(self.entries.lock().await.clone())
    }

    async fn add(&self, entry: GalleryEntry) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        next.insert(0, entry);
        *entries = self.persist(next).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let next: Vec<GalleryEntry> = entries.iter().filter(|e| e.id != id).cloned().collect();
        if next.len() == entries.len() {
            return Ok(false);
        }
        *entries = self.persist(next).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(id: &str, name: &str, tags: &[&str]) -> GalleryEntry {
        GalleryEntry {
            id: id.to_string(),
            url: "data:image/png;base64,AAAA".to_string(),
            name: name.to_string(),
            created_at: 0,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_matches_name_or_tag() {
        let e = entry("1", "Sunset Lake", &["generated", "gemini-ai"]);
        assert!(e.matches("sunset"));
        assert!(e.matches("GEMINI"));
        assert!(e.matches(""));
        assert!(!e.matches("forest"));
    }

    #[tokio::test]
    async fn test_memory_store_prepends() {
        let store = MemoryGalleryStore::new();
        store.add(entry("a", "first", &[])).await.unwrap();
        store.add(entry("b", "second", &[])).await.unwrap();
        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_json_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data/gallery.json");

        let store = JsonGalleryStore::open(&path).unwrap();
        store.add(entry("a", "first", &["edited"])).await.unwrap();
        store.add(entry("b", "second", &[])).await.unwrap();
        assert!(store.delete("a").await.unwrap());
        drop(store);

        let reopened = JsonGalleryStore::open(&path).unwrap();
        let list = reopened.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "b");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_json_store_failed_write_keeps_entries() {
        let dir = tempdir().unwrap();
        // A directory where the file should be makes the final rename fail
        let path = dir.path().join("gallery.json");
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        let store = JsonGalleryStore::open(dir.path().join("missing.json")).unwrap();
        store.add(entry("a", "first", &[])).await.unwrap();

        let blocked = JsonGalleryStore {
            path: path.clone(),
            entries: tokio::sync::Mutex::new(store.list().await.unwrap()),
        };
        assert!(blocked.add(entry("b", "second", &[])).await.is_err());
        let ids: Vec<String> = blocked.list().await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[tokio::test]
    async fn test_json_store_concurrent_adds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gallery.json");
        let store = std::sync::Arc::new(JsonGalleryStore::open(&path).unwrap());

        let mut tasks = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.add(entry(&i.to_string(), "n", &[])).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.list().await.unwrap().len(), 8);
        let reopened = JsonGalleryStore::open(&path).unwrap();
        assert_eq!(reopened.list().await.unwrap().len(), 8);
    }
}
