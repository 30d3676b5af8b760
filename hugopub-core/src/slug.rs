//! Slug generation for post directories and heading anchors.

use regex::Regex;
use std::sync::OnceLock;
use unicode_segmentation::UnicodeSegmentation;

/// Directory name of the generated post for a note title.
///
/// Lower-cases the title and replaces spaces and path separators with
/// hyphens. Nothing else is touched, so existing post directories keep their
/// names across versions. Titles that still do not name a single directory
/// (empty, `.` or `..`) are caught by [`is_plain_slug`].
///
/// # Examples
///
/// ```
/// use hugopub_core::post_slug;
///
/// assert_eq!(post_slug("Hello World"), "hello-world");
/// assert_eq!(post_slug("Rust & Safety"), "rust-&-safety");
/// assert_eq!(post_slug("A/B Testing"), "a-b-testing");
/// ```
pub fn post_slug(title: &str) -> String {
    title.to_lowercase().replace([' ', '/', '\\'], "-")
}

/// Whether `slug` names exactly one directory below the posts root
pub fn is_plain_slug(slug: &str) -> bool {
    !slug.is_empty() && slug != "." && slug != ".." && !slug.contains(['/', '\\'])
}

/// Convert a heading to the anchor id Hugo generates for it
///
/// Rules:
/// - Lowercase
/// - Replace whitespace with hyphens
/// - Remove special characters (except hyphens)
/// - Collapse multiple hyphens
/// - Trim leading/trailing hyphens
///
/// # Examples
///
/// ```
/// use hugopub_core::slugify;
///
/// assert_eq!(slugify("Hello World"), "hello-world");
/// assert_eq!(slugify("Rust & Safety"), "rust-safety");
/// assert_eq!(slugify("C++ Programming"), "c-programming");
/// ```
pub fn slugify(input: &str) -> String {
    let lowercased = input.to_lowercase();

    let with_hyphens = lowercased
        .graphemes(true)
        .map(|g| match g {
            " " | "_" | "\t" | "\n" => "-",
            _ => g,
        })
        .collect::<String>();

    // Keep ascii alphanumerics, hyphens and unicode letters (CJK headings)
    let cleaned = with_hyphens
        .graphemes(true)
        .filter(|g| {
            g.chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '-' || c.is_alphabetic())
        })
        .collect::<String>();

    let collapsed = hyphen_run_regex().replace_all(&cleaned, "-");
    collapsed.trim_matches('-').to_string()
}

fn hyphen_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-+").unwrap())
}
