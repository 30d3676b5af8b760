//! Tag to category learning from already generated posts.
//!
//! Every rebuild scans the posts directory, merges what it sees into the
//! persisted mapping file and writes the result back, sorted by tag.

use crate::context::Context;
use crate::frontmatter::parse_frontmatter;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const MAPPING_HEADER: &str = "\
# Tag to category mapping
# Format:
# tag_name: category_name
# A tag maps to exactly one category
# A category may collect many tags

";

#[derive(Error, Debug)]
pub enum TaxonomyError {
    #[error("Failed to read mapping file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid mapping file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Mapping file is not a key/value mapping")]
    NotAMapping,

    #[error("Failed to write mapping file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Persisted tag -> category association
pub type TagMapping = BTreeMap<String, String>;

/// Categories seen per tag, in first-seen order without repeats
pub type Observations = BTreeMap<String, Vec<String>>;

/// A tag seen with several categories and no existing entry to settle it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub tag: String,
    pub chosen: String,
    pub discarded: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub mapping: TagMapping,
    pub collisions: Vec<Collision>,
}

pub struct TagLearner {
    posts_dir: PathBuf,
    mapping_file: PathBuf,
}

impl TagLearner {
    pub fn new(ctx: &Context) -> Self {
        Self {
            posts_dir: ctx.config().posts_dir(),
            mapping_file: ctx.config().mapping_file(),
        }
    }

    pub fn mapping_file(&self) -> &Path {
        &self.mapping_file
    }

    /// Record every (tag, category) pair of posts that carry both.
    ///
    /// Posts are visited in file name order so "first seen" does not depend
    /// on the platform's directory order.
    pub fn scan(&self, posts_root: &Path) -> Observations {
        let mut observed = Observations::new();
        if !posts_root.is_dir() {
            return observed;
        }

        let posts = WalkDir::new(posts_root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"));

        for entry in posts {
            let content = match fs::read_to_string(entry.path()) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping unreadable post {:?}: {}", entry.path(), e);
                    continue;
                }
            };
            let metadata = match parse_frontmatter(&content) {
                Ok(Some((metadata, _))) => metadata,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping post with invalid header {:?}: {}", entry.path(), e);
                    continue;
                }
            };
            if metadata.tags.is_empty() || metadata.categories.is_empty() {
                continue;
            }

            for tag in &metadata.tags {
                let seen = observed.entry(tag.clone()).or_default();
                for category in &metadata.categories {
                    if !seen.contains(category) {
                        seen.push(category.clone());
                    }
                }
            }
        }

        observed
    }

    /// Merge fresh observations into the existing mapping
    pub fn merge(observed: &Observations, existing: &TagMapping) -> Resolution {
        let mut resolution = Resolution::default();

        for (tag, categories) in observed {
            match categories.as_slice() {
                [] => {}
                [only] => {
                    resolution.mapping.insert(tag.clone(), only.clone());
                }
                [first, rest @ ..] => {
                    if let Some(current) = existing.get(tag) {
                        resolution.mapping.insert(tag.clone(), current.clone());
                    } else {
                        warn!(
                            "Tag '{}' appears under several categories, using '{}' and ignoring {:?}",
                            tag, first, rest
                        );
                        resolution.mapping.insert(tag.clone(), first.clone());
                        resolution.collisions.push(Collision {
                            tag: tag.clone(),
                            chosen: first.clone(),
                            discarded: rest.to_vec(),
                        });
                    }
                }
            }
        }

        for (tag, category) in existing {
            resolution
                .mapping
                .entry(tag.clone())
                .or_insert_with(|| category.clone());
        }

        for (tag, category) in &resolution.mapping {
            if let Some(seen) = observed.get(tag) {
                if !seen.contains(category) {
                    warn!(
                        "Tag '{}' maps to '{}', which none of its posts use ({:?})",
                        tag, category, seen
                    );
                }
            }
        }

        resolution
    }

    /// Read the mapping file; a missing file is an empty mapping
    pub fn try_load(&self) -> Result<TagMapping, TaxonomyError> {
        let content = match fs::read_to_string(&self.mapping_file) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(TagMapping::new()),
            Err(source) => {
                return Err(TaxonomyError::Read {
                    path: self.mapping_file.clone(),
                    source,
                })
            }
        };

        let entries = match serde_yaml::from_str::<Value>(&content)? {
            Value::Null => return Ok(TagMapping::new()),
            Value::Mapping(entries) => entries,
            _ => return Err(TaxonomyError::NotAMapping),
        };

        let mut mapping = TagMapping::new();
        for (key, value) in entries {
            match (scalar_text(&key), scalar_text(&value)) {
                (Some(tag), Some(category)) => {
                    mapping.insert(tag, category);
                }
                _ => warn!("Skipping mapping entry {:?}: {:?}", key, value),
            }
        }
        Ok(mapping)
    }

    /// Soft variant of [`TagLearner::try_load`]: failures are logged and read
    /// as an empty mapping.
    pub fn load(&self) -> TagMapping {
        self.try_load().unwrap_or_else(|e| {
            warn!("{}", e);
            TagMapping::new()
        })
    }

    /// Write the mapping sorted case-insensitively by tag
    pub fn persist(&self, mapping: &TagMapping) -> Result<(), TaxonomyError> {
        let write_err = |source: io::Error| TaxonomyError::Write {
            path: self.mapping_file.clone(),
            source,
        };

        let mut entries: Vec<(&String, &String)> = mapping.iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.to_lowercase().cmp(&b.to_lowercase()).then(a.cmp(b)));

        let mut document = Mapping::new();
        for (tag, category) in entries {
            document.insert(Value::String(tag.clone()), Value::String(category.clone()));
        }

        let mut content = MAPPING_HEADER.to_string();
        if !document.is_empty() {
            content.push_str(&serde_yaml::to_string(&document)?);
        }

        if let Some(parent) = self.mapping_file.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(&self.mapping_file, content).map_err(write_err)?;
        Ok(())
    }

    /// Scan the posts directory, merge with the file on disk and persist.
    ///
    /// Returns the resolved mapping even when writing it back failed.
    pub fn rebuild(&self) -> TagMapping {
        let observed = self.scan(&self.posts_dir);
        let existing = self.load();
        let resolution = Self::merge(&observed, &existing);

        match self.persist(&resolution.mapping) {
            Ok(()) => info!(
                "Updated tag mapping {:?} ({} tags)",
                self.mapping_file,
                resolution.mapping.len()
            ),
            Err(e) => warn!("{}", e),
        }
        debug!("{} tags observed in {:?}", observed.len(), self.posts_dir);

        resolution.mapping
    }
}

/// Categories for `tags`, in tag order without repeats.
///
/// Tags without an entry contribute nothing.
pub fn categories_for_tags(tags: &[String], mapping: &TagMapping) -> Vec<String> {
    let mut categories: Vec<String> = Vec::new();
    for category in tags.iter().filter_map(|tag| mapping.get(tag)) {
        if !categories.contains(category) {
            categories.push(category.clone());
        }
    }
    categories
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}
