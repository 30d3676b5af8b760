//! Configuration parsing and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid config value for `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

/// Main configuration struct matching the hugopub.yml schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,

    /// Width of the batch runner
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Fenced code language rewritten into a diagram shortcode
    #[serde(default = "default_diagram_language")]
    pub diagram_language: String,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_workers() -> usize {
    4
}

fn default_diagram_language() -> String {
    String::from("mermaid")
}

fn default_mapping_file() -> PathBuf {
    PathBuf::from("tag_category_mapping.yaml")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the note vault
    pub notes: PathBuf,

    /// Root of the Hugo site
    pub hugo: PathBuf,

    /// Global asset directory searched before the note's own directory
    #[serde(default)]
    pub images: Option<PathBuf>,

    /// Tag-category mapping file, relative to the Hugo root
    #[serde(default = "default_mapping_file")]
    pub mapping: PathBuf,
}

impl Config {
    /// Build a config in code with default settings
    pub fn new(notes: impl Into<PathBuf>, hugo: impl Into<PathBuf>) -> Self {
        Self {
            paths: PathsConfig {
                notes: notes.into(),
                hugo: hugo.into(),
                images: None,
                mapping: default_mapping_file(),
            },
            workers: default_workers(),
            diagram_language: default_diagram_language(),
            config_path: None,
        }
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;

        config.config_path = Some(path.to_path_buf());
        config.validate()?;

        Ok(config)
    }

    pub fn with_images(mut self, images: impl Into<PathBuf>) -> Self {
        self.paths.images = Some(images.into());
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid {
                field: "workers".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.diagram_language.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "diagram_language".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Get the notes directory, resolved relative to config file
    pub fn notes_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.notes)
    }

    /// Get the Hugo site root, resolved relative to config file
    pub fn hugo_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.hugo)
    }

    /// Directory holding one subdirectory per generated post
    pub fn posts_dir(&self) -> PathBuf {
        self.hugo_dir().join("content").join("post")
    }

    /// Get the global asset directory (None when not configured)
    pub fn images_dir(&self) -> Option<PathBuf> {
        self.paths.images.as_ref().map(|p| self.resolve_path(p))
    }

    /// Location of the tag-category mapping file
    pub fn mapping_file(&self) -> PathBuf {
        let mapping = expand_home(&self.paths.mapping);
        if mapping.is_absolute() {
            mapping
        } else {
            self.hugo_dir().join(mapping)
        }
    }

    /// Resolve a path relative to the config file location
    fn resolve_path(&self, path: &Path) -> PathBuf {
        let path = expand_home(path);
        if path.is_absolute() {
            path
        } else if let Some(parent) = self.config_path.as_deref().and_then(Path::parent) {
            parent.join(path)
        } else {
            path
        }
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_values() {
        let config = Config::new("vault", "blog");

        assert_eq!(config.workers, 4);
        assert_eq!(config.diagram_language, "mermaid");
        assert_eq!(config.images_dir(), None);
        assert_eq!(
            config.mapping_file(),
            PathBuf::from("blog").join("tag_category_mapping.yaml")
        );
        assert_eq!(
            config.posts_dir(),
            PathBuf::from("blog").join("content").join("post")
        );
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hugopub.yml");
        std::fs::write(
            &path,
            "paths:\n  notes: vault\n  hugo: site\n  images: vault/images\nworkers: 2\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.notes_dir(), dir.path().join("vault"));
        assert_eq!(config.hugo_dir(), dir.path().join("site"));
        assert_eq!(config.images_dir(), Some(dir.path().join("vault/images")));
        assert_eq!(
            config.mapping_file(),
            dir.path().join("site").join("tag_category_mapping.yaml")
        );
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hugopub.yml");
        std::fs::write(&path, "paths:\n  notes: a\n  hugo: b\nworkers: 0\n").unwrap();

        match Config::from_file(&path) {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "workers"),
            other => panic!("expected invalid workers, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_required_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hugopub.yml");
        std::fs::write(&path, "paths:\n  notes: a\n").unwrap();

        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_expand_home() {
        let plain = Path::new("relative/dir");
        assert_eq!(expand_home(plain), plain.to_path_buf());

        let home = dirs::home_dir().expect("home directory");
        assert_eq!(expand_home(Path::new("~/blog")), home.join("blog"));
        assert_eq!(expand_home(Path::new("~")), home);
        assert_eq!(
            expand_home(Path::new("~notes/x")),
            PathBuf::from("~notes/x")
        );
    }
}
