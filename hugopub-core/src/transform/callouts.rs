//! Callout block quotes (`> [!NOTE] Title`) to admonition shortcodes.

use super::{replace_outside_code, DocumentContext, Transform};
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn callout_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^>[ \t]?\[!(?P<kind>[A-Za-z]+)\][+-]?(?:[ \t]+(?P<title>[^\n]*?))?[ \t]*(?:\r?\n|\z)(?P<body>(?:>[^\n]*(?:\n|$))*)",
        )
        .unwrap()
    })
}

#[derive(Debug, Default)]
pub struct CalloutTransformer;

impl CalloutTransformer {
    pub fn new() -> Self {
        Self
    }

    pub fn convert(&self, text: &str) -> String {
        replace_outside_code(text, callout_regex(), |caps: &Captures<'_>| {
            let kind = caps.name("kind")?.as_str().to_lowercase();
            let title = caps
                .name("title")
                .map(|m| m.as_str().trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| capitalize(&kind));
            let body = caps.name("body").map_or("", |m| m.as_str());
            let trailing_newline = caps.get(0)?.as_str().ends_with('\n');

            Some(render(&kind, &title, body, trailing_newline))
        })
    }
}

impl Transform for CalloutTransformer {
    fn name(&self) -> &'static str {
        "callouts"
    }

    fn transform(&self, text: &str, _doc: &DocumentContext<'_>) -> String {
        self.convert(text)
    }
}

fn render(kind: &str, title: &str, body: &str, trailing_newline: bool) -> String {
    let content = body
        .lines()
        .map(|line| {
            let line = line.trim_end_matches('\r');
            line.strip_prefix("> ")
                .or_else(|| line.strip_prefix('>'))
                .unwrap_or(line)
        })
        .collect::<Vec<_>>()
        .join("\n");
    let content = content.trim_matches('\n');

    let mut out = format!(
        "{{{{< admonition type=\"{}\" title=\"{}\" >}}}}\n",
        kind,
        title.replace('"', "&quot;")
    );
    if !content.is_empty() {
        out.push_str(content);
        out.push('\n');
    }
    out.push_str("{{< /admonition >}}");
    // The quote's final newline was consumed by the match
    if trailing_newline {
        out.push('\n');
    }
    out
}

fn capitalize(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}
