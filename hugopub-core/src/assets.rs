//! Asset discovery, copying and link rewriting.
//!
//! Two link forms are recognized: the embed form `![[name.png]]` (optionally
//! `![[name.png|caption]]`) and the regular image form `![alt](target)`.

use crate::batch::{BatchItem, BatchRunner};
use crate::context::Context;
use crate::transform::{captures_outside_code, replace_outside_code};
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("asset `{0}` not found in any search root")]
    NotFound(String),

    #[error("failed to copy {path:?}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One asset link found in a note body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    /// Matched link text, replaced verbatim
    pub original: String,
    /// Cleaned file name or relative path to look up
    pub target: String,
    pub alt: String,
    pub source: Option<PathBuf>,
    pub new_name: Option<String>,
}

impl AssetReference {
    /// Normalized image link pointing at the copied file
    pub fn rewritten(&self) -> Option<String> {
        self.new_name
            .as_ref()
            .map(|name| format!("![{}]({})", self.alt, name))
    }
}

impl BatchItem for AssetReference {
    fn label(&self) -> String {
        format!("asset `{}`", self.target)
    }
}

fn asset_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"!\[\[(?P<embed>[^\]\n]+)\]\]|!\[(?P<alt>[^\]\n]*)\]\((?P<target>[^)\n]+)\)",
        )
        .unwrap()
    })
}

/// Whether a link target points at the network rather than a local file
pub fn is_network_reference(target: &str) -> bool {
    let lower = target.trim().to_ascii_lowercase();
    lower.starts_with("//") || lower.starts_with("data:") || lower.contains("://")
}

/// Drop fragment/query suffixes and decode `%20`
fn clean_name(raw: &str) -> String {
    let end = raw.find(['#', '?']).unwrap_or(raw.len());
    raw[..end].replace("%20", " ").trim().to_string()
}

/// Strip `<...>` wrapping and a trailing `"title"` from a link destination
fn link_destination(raw: &str) -> &str {
    let raw = raw.trim();
    if let Some(inner) = raw.strip_prefix('<').and_then(|r| r.strip_suffix('>')) {
        return inner;
    }
    match raw.find(" \"") {
        Some(pos) => raw[..pos].trim_end(),
        None => raw,
    }
}

fn is_size_hint(s: &str) -> bool {
    !s.is_empty() && s.split('x').all(|part| part.chars().all(|c| c.is_ascii_digit()))
}

fn reference_from_captures(caps: &Captures<'_>) -> Option<AssetReference> {
    let original = caps.get(0)?.as_str().to_string();

    if let Some(embed) = caps.name("embed") {
        let (name, caption) = match embed.as_str().split_once('|') {
            Some((name, caption)) => (name, Some(caption.trim())),
            None => (embed.as_str(), None),
        };
        if is_network_reference(name) {
            return None;
        }
        let target = clean_name(name);
        let alt = match caption {
            Some(caption) if !is_size_hint(caption) => caption.to_string(),
            _ => target.rsplit('/').next().unwrap_or(&target).to_string(),
        };
        return Some(AssetReference {
            original,
            target,
            alt,
            source: None,
            new_name: None,
        });
    }

    let raw_target = link_destination(caps.name("target")?.as_str());
    if is_network_reference(raw_target) {
        return None;
    }
    Some(AssetReference {
        original,
        target: clean_name(raw_target),
        alt: caps
            .name("alt")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        source: None,
        new_name: None,
    })
}

/// All local asset links in `body`, one per distinct link text
pub fn find_references(body: &str) -> Vec<AssetReference> {
    let mut seen = HashSet::new();
    let matches = captures_outside_code(body, asset_regex());
    matches
        .iter()
        .filter_map(reference_from_captures)
        .filter(|r| !r.target.is_empty() && seen.insert(r.original.clone()))
        .collect()
}

/// First local image target, used as the post's cover image
pub fn first_local_image(body: &str) -> Option<String> {
    find_references(body).into_iter().next().map(|r| {
        r.target
            .strip_prefix("/images/")
            .map(str::to_string)
            .unwrap_or(r.target)
    })
}

/// Name variants tried for every search root, exact name first
fn name_variants(name: &str) -> Vec<String> {
    let mut variants = vec![name.to_string()];
    for variant in [name.replace(' ', "-"), name.replace('-', " ")] {
        if !variants.contains(&variant) {
            variants.push(variant);
        }
    }
    variants
}

/// Destination file name for a copied asset: base name with spaces hyphenated
pub fn destination_name(source: &Path) -> Option<String> {
    source
        .file_name()
        .map(|name| name.to_string_lossy().replace(' ', "-"))
}

/// Locates assets referenced by notes and copies them next to generated posts
#[derive(Debug, Clone)]
pub struct AssetResolver {
    images_dir: Option<PathBuf>,
    runner: BatchRunner,
}

impl AssetResolver {
    pub fn new(ctx: &Context) -> Self {
        Self {
            images_dir: ctx.config().images_dir(),
            runner: ctx.runner().clone(),
        }
    }

    /// Find the file behind `raw_name`.
    ///
    /// Roots are searched in order: the global asset directory, the note's
    /// directory, then `extra_root`. Within a root the exact name wins over
    /// the space/hyphen variants.
    pub fn resolve(
        &self,
        raw_name: &str,
        note_path: &Path,
        extra_root: Option<&Path>,
    ) -> Option<PathBuf> {
        let name = clean_name(raw_name);
        if name.is_empty() {
            return None;
        }
        let variants = name_variants(&name);

        let roots = [
            self.images_dir.as_deref(),
            note_path.parent(),
            extra_root,
        ];
        for root in roots.into_iter().flatten() {
            for variant in &variants {
                let candidate = root.join(variant);
                if candidate.is_file() {
                    tracing::debug!("Resolved asset `{}` to {:?}", raw_name, candidate);
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// Copy `source` into `target_dir`, overwriting, and return the new name
    pub fn copy(&self, source: &Path, target_dir: &Path) -> Result<String, AssetError> {
        let copy_error = |source_err| AssetError::Copy {
            path: source.to_path_buf(),
            source: source_err,
        };

        let new_name = destination_name(source)
            .ok_or_else(|| AssetError::NotFound(source.display().to_string()))?;
        fs::create_dir_all(target_dir).map_err(copy_error)?;

        let dest = target_dir.join(&new_name);
        let same_file = match (fs::canonicalize(source), fs::canonicalize(&dest)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if !same_file {
            fs::copy(source, &dest).map_err(copy_error)?;
        }
        Ok(new_name)
    }

    fn resolve_and_copy(
        &self,
        mut reference: AssetReference,
        note_path: &Path,
        target_dir: &Path,
        extra_root: Option<&Path>,
    ) -> Result<AssetReference, AssetError> {
        let source = self
            .resolve(&reference.target, note_path, extra_root)
            .ok_or_else(|| AssetError::NotFound(reference.target.clone()))?;
        let new_name = self.copy(&source, target_dir)?;
        reference.source = Some(source);
        reference.new_name = Some(new_name);
        Ok(reference)
    }

    /// Copy every local asset referenced in `body` into `target_dir` and
    /// point the links at the copies.
    ///
    /// References that cannot be resolved or copied stay as they are.
    pub fn rewrite_links(
        &self,
        body: &str,
        note_path: &Path,
        target_dir: &Path,
        extra_root: Option<&Path>,
    ) -> String {
        let references = find_references(body);
        if references.is_empty() {
            return body.to_string();
        }

        let resolved = self.runner.map(references, |reference| {
            self.resolve_and_copy(reference, note_path, target_dir, extra_root)
        });

        let replacements: HashMap<String, String> = resolved
            .into_iter()
            .filter_map(|r| r.rewritten().map(|link| (r.original, link)))
            .collect();

        replace_outside_code(body, asset_regex(), |caps: &Captures<'_>| {
            replacements.get(&caps[0]).cloned()
        })
    }
}
