//! Asset link rewriting stage.

use super::{DocumentContext, Transform};
use crate::assets::AssetResolver;
use crate::context::Context;

/// Copies referenced assets next to the post and relinks them
pub struct AssetTransformer {
    resolver: AssetResolver,
}

impl AssetTransformer {
    pub fn new(ctx: &Context) -> Self {
        Self {
            resolver: AssetResolver::new(ctx),
        }
    }
}

impl Transform for AssetTransformer {
    fn name(&self) -> &'static str {
        "assets"
    }

    fn transform(&self, text: &str, doc: &DocumentContext<'_>) -> String {
        self.resolver
            .rewrite_links(text, doc.note_path, doc.post_dir, doc.extra_root)
    }
}
