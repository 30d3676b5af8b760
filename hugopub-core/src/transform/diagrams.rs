//! Fenced diagram blocks to Hugo shortcodes.

use super::{code_ranges, DocumentContext, Transform};
use regex::Regex;

/// Rewrites ```` ```mermaid ```` fences into `{{< mermaid >}}` pairs
pub struct DiagramTransformer {
    language: String,
    fence: Regex,
}

impl DiagramTransformer {
    pub fn new(language: &str) -> Self {
        let language = language.trim().to_string();
        // Whitespace around the fence markers varies between editors. The
        // block ends at the first line holding only a closing fence.
        let fence = Regex::new(&format!(
            r"(?m)```{}[ \t]*\r?\n(?P<inner>(?:[^\n]*\n)*?)[ \t]*```[ \t]*\r?$",
            regex::escape(&language)
        ))
        .unwrap();
        Self { language, fence }
    }

    fn render(&self, inner: &str) -> String {
        let inner = inner.trim_end();
        if inner.is_empty() {
            format!("{{{{< {lang} >}}}}\n{{{{< /{lang} >}}}}", lang = self.language)
        } else {
            format!(
                "{{{{< {lang} >}}}}\n{}\n{{{{< /{lang} >}}}}",
                inner,
                lang = self.language
            )
        }
    }
}

impl Transform for DiagramTransformer {
    fn name(&self) -> &'static str {
        "diagrams"
    }

    fn transform(&self, text: &str, _doc: &DocumentContext<'_>) -> String {
        if !self.fence.is_match(text) {
            return text.to_string();
        }

        let code = code_ranges(text);
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in self.fence.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            // A fence inside another code block is an example, not a diagram
            let nested = code.iter().any(|r| {
                r.start < whole.start()
                    && whole.start() < r.end
                    && !text[r.start..whole.start()].trim().is_empty()
            });
            if nested {
                continue;
            }
            out.push_str(&text[last..whole.start()]);
            out.push_str(&self.render(caps.name("inner").map_or("", |m| m.as_str())));
            last = whole.end();
        }
        out.push_str(&text[last..]);
        out
    }
}
