//! Publish state: the note's `publish` flag and its generated post directory.
//!
//! A note counts as published when its flag is set and
//! `<posts>/<slug>/` exists. [`PublishManager`] is the only component that
//! writes either half. It does not repair a flag whose directory was removed
//! by hand.

use crate::context::Context;
use crate::frontmatter::{parse_frontmatter, Metadata, Note};
use crate::slug::{is_plain_slug, post_slug};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Ordering for [`PublishManager::list_publishable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest modification first
    Mtime,
    Title,
    Path,
}

#[derive(Error, Debug)]
#[error("unknown sort order `{0}` (expected mtime, title or path)")]
pub struct ParseSortOrderError(String);

impl FromStr for SortOrder {
    type Err = ParseSortOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mtime" | "time" => Ok(Self::Mtime),
            "title" => Ok(Self::Title),
            "path" => Ok(Self::Path),
            other => Err(ParseSortOrderError(other.to_string())),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mtime => "mtime",
            Self::Title => "title",
            Self::Path => "path",
        };
        f.write_str(name)
    }
}

/// What [`PublishManager::unpublish`] changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnpublishOutcome {
    pub flag_cleared: bool,
    pub post_removed: bool,
}

#[derive(Debug, Clone)]
pub struct PublishManager {
    posts_dir: PathBuf,
}

impl PublishManager {
    pub fn new(ctx: &Context) -> Self {
        Self {
            posts_dir: ctx.config().posts_dir(),
        }
    }

    /// Directory of the generated post for `slug`
    pub fn post_dir(&self, slug: &str) -> PathBuf {
        self.posts_dir.join(slug)
    }

    pub fn is_generated(&self, slug: &str) -> bool {
        is_plain_slug(slug) && self.post_dir(slug).is_dir()
    }

    /// Set the note's `publish` flag, rewriting the file in place.
    ///
    /// Returns `false` without touching the file when the note has no header
    /// or already carries `value`. Failures are logged and reported as
    /// `false`.
    pub fn set_publish_flag(&self, note_path: &Path, value: bool) -> bool {
        let mut note = match Note::load(note_path) {
            Ok(Some(note)) => note,
            Ok(None) => {
                debug!("{:?} has no header, publish flag untouched", note_path);
                return false;
            }
            Err(e) => {
                warn!("Cannot update publish flag of {:?}: {}", note_path, e);
                return false;
            }
        };
        if note.metadata.publish == value {
            return false;
        }

        note.metadata.publish = value;
        match note.save() {
            Ok(()) => {
                info!("Set publish: {} on {:?}", value, note_path);
                true
            }
            Err(e) => {
                warn!("Failed to write {:?}: {}", note_path, e);
                false
            }
        }
    }

    /// Delete the generated post directory for `slug`.
    ///
    /// Returns whether something was deleted; a missing directory is not an
    /// error.
    pub fn remove_generated_post(&self, slug: &str) -> bool {
        if !is_plain_slug(slug) {
            warn!("Refusing to remove post for slug {:?}", slug);
            return false;
        }
        let dir = self.post_dir(slug);
        if !dir.exists() {
            return false;
        }
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!("Removed generated post {:?}", dir);
                true
            }
            Err(e) => {
                warn!("Failed to remove {:?}: {}", dir, e);
                false
            }
        }
    }

    /// Clear the flag and remove the generated post of one note
    pub fn unpublish(&self, note_path: &Path) -> UnpublishOutcome {
        let slug = slug_for_note(note_path);
        UnpublishOutcome {
            flag_cleared: self.set_publish_flag(note_path, false),
            post_removed: self.remove_generated_post(&slug),
        }
    }

    /// Every note under `source_root` whose header sets `publish: true`.
    ///
    /// Notes that cannot be read or whose header does not parse are skipped
    /// with a warning.
    pub fn list_publishable(
        &self,
        source_root: &Path,
        order: Option<SortOrder>,
    ) -> Vec<(PathBuf, Metadata)> {
        let mut notes = Vec::new();

        for entry in WalkDir::new(source_root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Cannot read directory entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "md") {
                continue;
            }

            let content = match fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping unreadable note {:?}: {}", path, e);
                    continue;
                }
            };
            match parse_frontmatter(&content) {
                Ok(Some((metadata, _))) if metadata.publish => {
                    notes.push((path.to_path_buf(), metadata));
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping {:?}: invalid header: {}", path, e),
            }
        }

        match order {
            Some(SortOrder::Mtime) => notes.sort_by_key(|(path, _)| modified(path)),
            Some(SortOrder::Title) => notes.sort_by_cached_key(|(path, meta)| title_key(path, meta)),
            Some(SortOrder::Path) => notes.sort_by(|(a, _), (b, _)| a.cmp(b)),
            None => {}
        }
        notes
    }
}

/// Slug of the post generated from the note at `note_path`
pub fn slug_for_note(note_path: &Path) -> String {
    let title = match Note::load(note_path) {
        Ok(Some(note)) => note.display_title(),
        _ => file_stem(note_path),
    };
    post_slug(&title)
}

fn modified(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lower-cased title, or the file stem when the title is not ASCII
fn title_key(path: &Path, metadata: &Metadata) -> String {
    let title = metadata.title().trim();
    if !title.is_empty() && title.is_ascii() {
        title.to_lowercase()
    } else {
        file_stem(path).to_lowercase()
    }
}
