use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::markdown::MarkdownEngine;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub server_url: Option<String>,
    pub download_dir: Option<PathBuf>,
    pub markdown: Option<MarkdownEngine>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            server_url: Some(DEFAULT_SERVER_URL.to_string()),
            ..Self::default()
        }
    }

    /// A missing file yields defaults.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let config_path = dir.join("config.json");

        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(dir.join("config.json"), config_content)?;
        Ok(())
    }

    pub fn server_url(&self) -> &str {
        self.server_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_SERVER_URL)
    }

    pub fn markdown_engine(&self) -> MarkdownEngine {
        self.markdown.unwrap_or_default()
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    /// Where exports land: configured dir, platform downloads, or the cwd.
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// `<platform config dir>/streamchat`
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("streamchat"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.server_url(), DEFAULT_SERVER_URL);
        assert_eq!(config.markdown_engine(), MarkdownEngine::CommonMark);
        assert_eq!(config.request_timeout_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            server_url: Some("http://chat.local:8080/".into()),
            download_dir: Some(dir.path().join("exports")),
            markdown: Some(MarkdownEngine::Basic),
            request_timeout_secs: Some(30),
        };
        config.save_to(dir.path()).unwrap();

        let loaded = Config::load_from(dir.path()).unwrap();
        assert_eq!(loaded.server_url(), "http://chat.local:8080");
        assert_eq!(loaded.markdown_engine(), MarkdownEngine::Basic);
        assert_eq!(loaded.download_dir(), dir.path().join("exports"));
        assert_eq!(loaded.request_timeout_secs(), 30);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), r#"{"markdown":"basic"}"#).unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.server_url(), DEFAULT_SERVER_URL);
        assert_eq!(config.markdown_engine(), MarkdownEngine::Basic);
    }
}
