//! Service configuration

use serde::Deserialize;
use std::path::PathBuf;

use crate::engine::codec::DEFAULT_MAX_UPLOAD_BYTES;

/// Environment variable consulted when `generative.api_key` is unset
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub generative: GenerativeConfig,
    pub editor: EditorConfig,
    pub gallery: GalleryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub rest_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub sqlite_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerativeConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Request timeout in seconds, 0 for none
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub max_upload_bytes: usize,
    /// Seconds before an untouched edit session is dropped
    pub session_idle_timeout: u64,
    /// Request body limit; must fit the upload plus multipart overhead
    pub body_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub path: PathBuf,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_path() -> &'static str {
        "config.toml"
    }
}

impl GenerativeConfig {
    /// Configured key, falling back to the environment
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { rest_port: 3000 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/retouch.db"),
        }
    }
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash-exp-image-generation".to_string(),
            api_key: None,
            timeout_secs: 0,
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            session_idle_timeout: 1800,
            body_limit: DEFAULT_MAX_UPLOAD_BYTES * 2,
        }
    }
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/gallery.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            rest_port = 8080

            [generative]
            api_key = "abc"
            timeout_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.server.rest_port, 8080);
        assert_eq!(config.generative.resolved_api_key().as_deref(), Some("abc"));
        assert_eq!(config.generative.timeout_secs, 30);
        assert_eq!(config.generative.model, "gemini-2.0-flash-exp-image-generation");
        assert_eq!(config.editor.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.storage.sqlite_path, PathBuf::from("data/retouch.db"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(Config::load(path.to_str().unwrap()).is_err());
    }
}
