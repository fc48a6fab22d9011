//! Storage module for accounts, saved images and the local gallery

pub mod gallery;
pub mod sqlite;
pub mod traits;

pub use gallery::{GalleryEntry, GalleryRepository, JsonGalleryStore, MemoryGalleryStore};
pub use sqlite::SqliteStorage;
pub use traits::{ImageRecord, ImageStorage, UserRecord};
