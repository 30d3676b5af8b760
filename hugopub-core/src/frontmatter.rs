//! Note header parsing, normalization and serialization.
//!
//! A header is a YAML block opened by a `---` line at the very top of the
//! file and closed by the next `---` line. Everything after the closing line
//! is the body.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DELIMITER: &str = "---";

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("Invalid YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Header is not a key/value mapping")]
    NotAMapping,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Typed view over a note header.
///
/// `tags` and `categories` are always lists and no field ever holds a null:
/// explicit nulls become empty strings (or `false` for flags). Unknown keys
/// are kept in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_or_empty"
    )]
    pub title: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_or_empty"
    )]
    pub date: Option<String>,

    #[serde(default, deserialize_with = "flag")]
    pub draft: bool,

    #[serde(default, deserialize_with = "flag")]
    pub publish: bool,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_or_empty"
    )]
    pub description: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_or_empty"
    )]
    pub image: Option<String>,

    #[serde(default, deserialize_with = "string_list")]
    pub tags: Vec<String>,

    #[serde(default, deserialize_with = "string_list")]
    pub categories: Vec<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Metadata {
    /// Parse the YAML text between the delimiters
    pub fn from_yaml(yaml: &str) -> Result<Self, FrontmatterError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_yaml::from_str(yaml)?;
        match value {
            Value::Null => Ok(Self::default()),
            Value::Mapping(_) => Self::from_value(value),
            _ => Err(FrontmatterError::NotAMapping),
        }
    }

    fn from_value(value: Value) -> Result<Self, FrontmatterError> {
        let mut metadata: Metadata = serde_yaml::from_value(value)?;
        metadata.normalize();
        Ok(metadata)
    }

    fn normalize(&mut self) {
        for value in self.extra.values_mut() {
            if value.is_null() {
                *value = Value::String(String::new());
            }
        }
    }

    /// Shallow-merge `fields` into the header and normalize again.
    ///
    /// On error the header is left unchanged.
    pub fn update(&mut self, fields: Mapping) -> Result<(), FrontmatterError> {
        let mut merged = match serde_yaml::to_value(&*self)? {
            Value::Mapping(map) => map,
            _ => return Err(FrontmatterError::NotAMapping),
        };
        for (key, value) in fields {
            merged.insert(key, value);
        }
        *self = Self::from_value(Value::Mapping(merged))?;
        Ok(())
    }

    /// Serialize the header fields as YAML (without delimiters)
    pub fn to_yaml(&self) -> Result<String, FrontmatterError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Full note text: delimited header followed by `body` verbatim
    pub fn render(&self, body: &str) -> Result<String, FrontmatterError> {
        let yaml = self.to_yaml()?;
        Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{body}"))
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    pub fn date(&self) -> &str {
        self.date.as_deref().unwrap_or("")
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn image(&self) -> &str {
        self.image.as_deref().unwrap_or("")
    }
}

/// A note read from disk
#[derive(Debug, Clone)]
pub struct Note {
    pub path: PathBuf,
    pub metadata: Metadata,
    pub body: String,
}

impl Note {
    /// Read a note; `Ok(None)` when it has no header
    pub fn load(path: &Path) -> Result<Option<Self>, FrontmatterError> {
        let content = fs::read_to_string(path)?;
        Ok(parse_frontmatter(&content)?.map(|(metadata, body)| Self {
            path: path.to_path_buf(),
            metadata,
            body: body.to_string(),
        }))
    }

    /// Title, falling back to the file stem
    pub fn display_title(&self) -> String {
        let title = self.metadata.title().trim();
        if title.is_empty() {
            self.path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "untitled".to_string())
        } else {
            title.to_string()
        }
    }

    /// Write header and body back to the note's path
    pub fn save(&self) -> Result<(), FrontmatterError> {
        fs::write(&self.path, self.metadata.render(&self.body)?)?;
        Ok(())
    }
}

/// Split a document into header YAML and body.
///
/// Returns `None` when the document does not open with a delimiter line or
/// the header is never closed.
pub fn split_header(content: &str) -> Option<(&str, &str)> {
    let mut lines = content.split_inclusive('\n');
    let first = lines.next()?;
    if !first.ends_with('\n') || first.trim_end() != DELIMITER {
        return None;
    }

    let header_start = first.len();
    let mut offset = header_start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            return Some((&content[header_start..offset], &content[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Parse the header of a note.
///
/// `Ok(None)` means the note has no (closed) header. A closed header that is
/// not valid YAML, or whose fields have the wrong shape, is an error.
///
/// # Example
///
/// ```
/// use hugopub_core::frontmatter::parse_frontmatter;
///
/// let content = "---\ntitle: My Post\npublish: true\n---\n# Hello World\n";
///
/// let (meta, body) = parse_frontmatter(content).unwrap().unwrap();
/// assert_eq!(meta.title(), "My Post");
/// assert!(meta.publish);
/// assert_eq!(body, "# Hello World\n");
/// ```
pub fn parse_frontmatter(content: &str) -> Result<Option<(Metadata, &str)>, FrontmatterError> {
    match split_header(content) {
        Some((yaml, body)) => Ok(Some((Metadata::from_yaml(yaml)?, body))),
        None => Ok(None),
    }
}

/// Soft variant of [`parse_frontmatter`]: any failure yields no metadata and
/// the whole text as body.
pub fn parse(content: &str) -> (Option<Metadata>, String) {
    match parse_frontmatter(content) {
        Ok(Some((metadata, body))) => (Some(metadata), body.to_string()),
        Ok(None) => (None, content.to_string()),
        Err(e) => {
            tracing::debug!("Ignoring unparsable header: {}", e);
            (None, content.to_string())
        }
    }
}

fn scalar_to_string(value: Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Tagged(tagged) => scalar_to_string(tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => Err("expected a scalar value".to_string()),
    }
}

fn scalar_or_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_to_string(value)
        .map(|s| Some(s.unwrap_or_default()))
        .map_err(de::Error::custom)
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "" | "false" | "no" => Ok(false),
            "true" | "yes" => Ok(true),
            other => Err(de::Error::custom(format!("expected a boolean, found `{other}`"))),
        },
        other => Err(de::Error::custom(format!(
            "expected a boolean, found {other:?}"
        ))),
    }
}

fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(s) = scalar_to_string(item).map_err(de::Error::custom)? {
                    out.push(s);
                }
            }
            Ok(out)
        }
        Value::Mapping(_) => Err(de::Error::custom("expected a list or a single value")),
        other => Ok(scalar_to_string(other)
            .map_err(de::Error::custom)?
            .into_iter()
            .collect()),
    }
}
