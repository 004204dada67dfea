// ⚙️ Configuration
// Resolution order:
//   1. --config <path> argument
//   2. INVADERS_CONFIG environment variable
//   3. ./invaders.toml
//   4. compiled defaults

use crate::error::InvaderError;
use crate::feeds::{FeedProvider, GeoJsonFileFeed, HttpGeoJsonFeed};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "INVADERS_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "invaders.toml";

/// A location feed, listed in priority order. Exactly one of `url` and
/// `path` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Local GeoJSON export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl FeedConfig {
    pub fn from_url(name: &str, url: &str) -> Self {
        FeedConfig {
            name: name.to_string(),
            url: Some(url.to_string()),
            path: None,
        }
    }

    pub fn from_path(name: &str, path: &Path) -> Self {
        FeedConfig {
            name: name.to_string(),
            url: None,
            path: Some(path.to_path_buf()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base directory for every relative path below
    pub data_dir: PathBuf,

    /// Scraper dump
    pub catalog_file: PathBuf,

    /// Catalog with fused locations
    pub located_file: PathBuf,

    /// Reconciled output
    pub to_flash_file: PathBuf,

    pub database_file: PathBuf,

    /// Known-invalid names, never proposed
    pub exclusion_file: Option<PathBuf>,

    /// First feed is the ground truth for any id it mentions
    pub feeds: Vec<FeedConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("data"),
            catalog_file: PathBuf::from("invaders-dump.csv"),
            located_file: PathBuf::from("invaders-with-locations.csv"),
            to_flash_file: PathBuf::from("invaders-to-flash.csv"),
            database_file: PathBuf::from("invaders.db"),
            exclusion_file: None,
            feeds: vec![
                FeedConfig::from_url(
                    "dump-positions",
                    "https://umap.openstreetmap.fr/fr/datalayer/1000818/3083389/",
                ),
                FeedConfig::from_url(
                    "space-invaders",
                    "https://umap.openstreetmap.fr/fr/datalayer/425001/1180599/",
                ),
                FeedConfig::from_url(
                    "invader-world",
                    "https://umap.openstreetmap.fr/fr/datalayer/952127/2923771/",
                ),
            ],
        }
    }
}

impl Config {
    /// Parse and validate a TOML config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Config::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config following the documented priority order
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            return Config::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Config::from_file(path);
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Config::from_file(local);
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Config::default())
    }

    pub fn validate(&self) -> Result<(), InvaderError> {
        if self.feeds.is_empty() {
            return Err(InvaderError::Config("at least one location feed is required".to_string()));
        }

        let mut seen = HashSet::new();
        for feed in &self.feeds {
            if !seen.insert(feed.name.as_str()) {
                return Err(InvaderError::Config(format!("duplicate feed name '{}'", feed.name)));
            }
            if feed.url.is_some() == feed.path.is_some() {
                return Err(InvaderError::Config(format!(
                    "feed '{}' needs exactly one of 'url' or 'path'",
                    feed.name
                )));
            }
        }

        Ok(())
    }

    /// Relative paths live under `data_dir`
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.resolve_path(&self.catalog_file)
    }

    pub fn located_path(&self) -> PathBuf {
        self.resolve_path(&self.located_file)
    }

    pub fn to_flash_path(&self) -> PathBuf {
        self.resolve_path(&self.to_flash_file)
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve_path(&self.database_file)
    }

    pub fn exclusion_path(&self) -> Option<PathBuf> {
        self.exclusion_file.as_deref().map(|path| self.resolve_path(path))
    }

    /// Feed providers in priority order
    pub fn providers(&self) -> Result<Vec<Box<dyn FeedProvider>>, InvaderError> {
        self.feeds
            .iter()
            .map(|feed| -> Result<Box<dyn FeedProvider>, InvaderError> {
                match (&feed.url, &feed.path) {
                    (Some(url), None) => Ok(Box::new(HttpGeoJsonFeed::new(&feed.name, url))),
                    (None, Some(path)) => Ok(Box::new(GeoJsonFileFeed::new(
                        &feed.name,
                        &self.resolve_path(path),
                    ))),
                    _ => Err(InvaderError::Config(format!(
                        "feed '{}' needs exactly one of 'url' or 'path'",
                        feed.name
                    ))),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.catalog_path(), PathBuf::from("data/invaders-dump.csv"));
        let providers = config.providers().unwrap();
        assert_eq!(providers.len(), 3);
        assert_eq!(providers[0].name(), "dump-positions");
        assert!(config.feeds.iter().all(|feed| feed.url.is_some()));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            data_dir = "/srv/invaders"
            exclusion_file = "exclude.txt"

            [[feeds]]
            name = "mine"
            path = "/tmp/mine.geojson"

            [[feeds]]
            name = "umap"
            path = "umap.geojson"
            "#,
        )
        .unwrap();

        assert_eq!(config.located_file, PathBuf::from("invaders-with-locations.csv"));
        assert_eq!(config.exclusion_path(), Some(PathBuf::from("/srv/invaders/exclude.txt")));
        assert_eq!(config.feeds.len(), 2);
        let paths: Vec<PathBuf> = config
            .feeds
            .iter()
            .map(|feed| config.resolve_path(feed.path.as_deref().unwrap()))
            .collect();
        assert_eq!(paths[0], PathBuf::from("/tmp/mine.geojson"));
        assert_eq!(paths[1], PathBuf::from("/srv/invaders/umap.geojson"));
    }

    #[test]
    fn test_url_and_path_feeds() {
        let config = Config::from_toml(
            r#"
            [[feeds]]
            name = "umap"
            url = "https://umap.openstreetmap.fr/fr/datalayer/425001/1180599/"

            [[feeds]]
            name = "local"
            path = "local.geojson"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.feeds[0],
            FeedConfig::from_url("umap", "https://umap.openstreetmap.fr/fr/datalayer/425001/1180599/")
        );
        assert_eq!(config.feeds[1], FeedConfig::from_path("local", Path::new("local.geojson")));

        let names: Vec<String> = config
            .providers()
            .unwrap()
            .iter()
            .map(|provider| provider.name().to_string())
            .collect();
        assert_eq!(names, vec!["umap", "local"]);
    }

    #[test]
    fn test_feed_needs_exactly_one_source() {
        let both = Config::from_toml(
            r#"
            [[feeds]]
            name = "umap"
            url = "https://example.org/layer/"
            path = "umap.geojson"
            "#,
        )
        .unwrap_err();
        assert!(both.to_string().contains("exactly one of 'url' or 'path'"));

        let neither = Config::from_toml(
            r#"
            [[feeds]]
            name = "umap"
            "#,
        )
        .unwrap_err();
        assert!(neither.to_string().contains("exactly one of 'url' or 'path'"));
    }

    #[test]
    fn test_rejects_duplicate_feed_names() {
        let err = Config::from_toml(
            r#"
            [[feeds]]
            name = "umap"
            path = "a.geojson"

            [[feeds]]
            name = "umap"
            path = "b.geojson"
            "#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("duplicate feed name"));
    }

    #[test]
    fn test_rejects_empty_feed_list() {
        assert!(Config::from_toml("feeds = []").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invaders.toml");
        fs::write(&path, "data_dir = \"elsewhere\"\n").unwrap();

        let config = Config::resolve(Some(&path)).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("elsewhere"));

        assert!(Config::from_file(dir.path().join("missing.toml")).is_err());
    }
}
