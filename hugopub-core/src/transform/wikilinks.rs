//! Wikilink transformation for [[target]] and [[target|text]] syntax.
//!
//! Links become Hugo `ref` shortcodes pointing at the target's post
//! directory; `[[#Heading]]` becomes a same-page anchor. Embeds (`![[...]]`)
//! and triple brackets are left alone.

use super::{replace_outside_code, DocumentContext, Transform};
use crate::slug::{post_slug, slugify};
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn wikilink_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[(?P<inner>[^\[\]\n]+)\]\]").unwrap())
}

/// Transformer for wikilink syntax
#[derive(Debug, Default)]
pub struct WikilinkTransformer;

impl WikilinkTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Rewrite every wikilink outside code
    pub fn convert(&self, text: &str) -> String {
        replace_outside_code(text, wikilink_regex(), |caps: &Captures<'_>| {
            let whole = caps.get(0)?;
            let before = &text[..whole.start()];
            let after = &text[whole.end()..];
            if before.ends_with(['[', '!']) || after.starts_with(']') {
                return None;
            }
            create_link(caps.name("inner")?.as_str())
        })
    }
}

impl Transform for WikilinkTransformer {
    fn name(&self) -> &'static str {
        "wikilinks"
    }

    fn transform(&self, text: &str, _doc: &DocumentContext<'_>) -> String {
        self.convert(text)
    }
}

fn create_link(wikilink: &str) -> Option<String> {
    // Parse [[target|display text]] or [[target]]
    let (target, display) = match wikilink.split_once('|') {
        Some((target, display)) => (target.trim(), Some(display.trim())),
        None => (wikilink.trim(), None),
    };

    let (page, heading) = match target.split_once('#') {
        Some((page, heading)) => (page.trim(), Some(heading.trim())),
        None => (target, None),
    };
    let page = page.strip_suffix(".md").unwrap_or(page);
    let anchor = heading.map(slugify).filter(|a| !a.is_empty());

    if page.is_empty() {
        // [[#Heading]]: same-page anchor
        let anchor = anchor?;
        let text = display.or(heading).unwrap_or_default();
        return Some(format!("[{text}](#{anchor})"));
    }

    let mut reference = format!("/post/{}", post_slug(page));
    if let Some(anchor) = &anchor {
        reference.push('#');
        reference.push_str(anchor);
    }
    let text = display.filter(|d| !d.is_empty()).unwrap_or(target);

    Some(format!(
        "[{text}]({{{{< ref \"{}\" >}}}})",
        reference.replace('"', "")
    ))
}
