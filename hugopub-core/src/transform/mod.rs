//! Ordered text rewriting applied to a note body before it becomes a post.
//!
//! Each stage is a [`Transform`]: plain text in, plain text out, never
//! failing. The [`Pipeline`] owns the stage order.

pub mod assets;
pub mod callouts;
pub mod diagrams;
pub mod math;
pub mod wikilinks;

use crate::context::Context;
use pulldown_cmark::{Event, Options, Parser, Tag};
use regex::{Captures, Regex};
use std::ops::Range;
use std::path::Path;

pub use assets::AssetTransformer;
pub use callouts::CalloutTransformer;
pub use diagrams::DiagramTransformer;
pub use math::MathTransformer;
pub use wikilinks::WikilinkTransformer;

/// Where the body being transformed comes from and where its post goes
#[derive(Debug, Clone, Copy)]
pub struct DocumentContext<'a> {
    pub note_path: &'a Path,
    pub post_dir: &'a Path,
    pub extra_root: Option<&'a Path>,
}

impl<'a> DocumentContext<'a> {
    pub fn new(note_path: &'a Path, post_dir: &'a Path) -> Self {
        Self {
            note_path,
            post_dir,
            extra_root: None,
        }
    }

    pub fn with_extra_root(mut self, root: &'a Path) -> Self {
        self.extra_root = Some(root);
        self
    }
}

/// One rewrite stage
pub trait Transform: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rewrite `text`; a stage that finds nothing to do returns it unchanged
    fn transform(&self, text: &str, doc: &DocumentContext<'_>) -> String;
}

/// Ordered list of stages
pub struct Pipeline {
    stages: Vec<Box<dyn Transform>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Assets first, so later stages never see raw asset embeds they could
    /// mistake for links.
    pub fn standard(ctx: &Context) -> Self {
        Self::new()
            .with_stage(AssetTransformer::new(ctx))
            .with_stage(WikilinkTransformer::new())
            .with_stage(DiagramTransformer::new(&ctx.config().diagram_language))
            .with_stage(CalloutTransformer::new())
            .with_stage(MathTransformer::new())
    }

    pub fn with_stage(mut self, stage: impl Transform + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, body: &str, doc: &DocumentContext<'_>) -> String {
        self.stages.iter().fold(body.to_string(), |text, stage| {
            let out = stage.transform(&text, doc);
            if out != text {
                tracing::debug!("{} rewrote {:?}", stage.name(), doc.note_path);
            }
            out
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte ranges of code blocks and inline code spans
pub(crate) fn code_ranges(text: &str) -> Vec<Range<usize>> {
    Parser::new_ext(text, Options::empty())
        .into_offset_iter()
        .filter_map(|(event, range)| match event {
            Event::Start(Tag::CodeBlock(_)) | Event::Code(_) => Some(range),
            _ => None,
        })
        .collect()
}

/// Matches of `re` that do not start inside code
pub(crate) fn captures_outside_code<'t>(text: &'t str, re: &Regex) -> Vec<Captures<'t>> {
    let mut code: Option<Vec<Range<usize>>> = None;
    re.captures_iter(text)
        .filter(|caps| {
            let Some(whole) = caps.get(0) else {
                return false;
            };
            let code = code.get_or_insert_with(|| code_ranges(text));
            !code.iter().any(|r| r.contains(&whole.start()))
        })
        .collect()
}

/// Replace matches of `re` that do not start inside code.
///
/// `replace` returning `None` keeps the match as is.
pub(crate) fn replace_outside_code<F>(text: &str, re: &Regex, mut replace: F) -> String
where
    F: FnMut(&Captures<'_>) -> Option<String>,
{
    let mut code: Option<Vec<Range<usize>>> = None;
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        // Parse lazily; most bodies have no match at all
        let code = code.get_or_insert_with(|| code_ranges(text));
        if code.iter().any(|r| r.contains(&whole.start())) {
            continue;
        }
        if let Some(replacement) = replace(&caps) {
            out.push_str(&text[last..whole.start()]);
            out.push_str(&replacement);
            last = whole.end();
        }
    }

    out.push_str(&text[last..]);
    out
}
