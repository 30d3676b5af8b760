//! Display math (`$$ ... $$`) normalization.
//!
//! Note editors let formulas wrap over several lines, sometimes with list
//! bullets leaking in. Hugo's Markdown renderer would turn those lines into
//! paragraphs or lists, so every block is folded onto one line. Long
//! equations with sums are laid out as an `aligned` environment instead.

use super::{replace_outside_code, DocumentContext, Transform};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Formulas longer than this are always aligned when they contain `=`
const LONG_FORMULA: usize = 80;
/// Right-hand sides at least this long are aligned if they add, and split
const LONG_RHS: usize = 60;

fn display_math_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\$\$(?P<inner>.+?)\$\$").unwrap())
}

fn list_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\*|\d+\.)[ \t]+").unwrap())
}

#[derive(Debug, Default)]
pub struct MathTransformer;

impl MathTransformer {
    pub fn new() -> Self {
        Self
    }

    pub fn convert(&self, text: &str) -> String {
        replace_outside_code(text, display_math_regex(), |caps: &Captures<'_>| {
            normalize(caps.name("inner")?.as_str())
        })
    }
}

impl Transform for MathTransformer {
    fn name(&self) -> &'static str {
        "math"
    }

    fn transform(&self, text: &str, _doc: &DocumentContext<'_>) -> String {
        self.convert(text)
    }
}

/// Fold a formula onto one line, dropping bullet and numbering markers.
///
/// Leading `+` and `-` are operators here, not list markers, and are kept.
pub fn clean_formula(inner: &str) -> String {
    let joined = inner
        .lines()
        .map(|line| {
            let line = line.trim();
            list_marker_regex().replace(line, "").into_owned()
        })
        .collect::<Vec<_>>()
        .join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize(inner: &str) -> Option<String> {
    let formula = clean_formula(inner);
    if formula.is_empty() {
        return None;
    }

    // Already laid out by hand
    if formula.contains(r"\begin{") || formula.contains(r"\\") || formula.contains('&') {
        return Some(format!("$${formula}$$"));
    }

    let Some((lhs, rhs)) = formula.split_once('=') else {
        return Some(format!("$${formula}$$"));
    };
    let (lhs, rhs) = (lhs.trim(), rhs.trim());

    // Thresholds count characters, not bytes
    let rhs_len = rhs.chars().count();
    let aligned =
        formula.chars().count() > LONG_FORMULA || (formula.contains('+') && rhs_len >= LONG_RHS);
    if !aligned {
        return Some(format!("$${formula}$$"));
    }

    let mut body = format!("{lhs} &= {rhs}");
    if rhs_len >= LONG_RHS {
        let plus = top_level_plus(rhs);
        if let Some(&split) = plus.get(plus.len() / 2) {
            let head = rhs[..split].trim();
            let tail = rhs[split + 1..].trim();
            body = format!("{lhs} &= {head} \\\\\n&\\quad + {tail}");
        }
    }

    Some(format!("$$\n\\begin{{aligned}}\n{body}\n\\end{{aligned}}\n$$"))
}

/// Byte offsets of `+` outside any `{...}` group
fn top_level_plus(expr: &str) -> Vec<usize> {
    let mut depth = 0usize;
    let mut escaped = false;
    let mut positions = Vec::new();

    for (idx, ch) in expr.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '+' if depth == 0 => positions.push(idx),
            _ => {}
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(text: &str) -> String {
        MathTransformer::new().convert(text)
    }

    #[test]
    fn test_short_sum_stays_single_line() {
        assert_eq!(convert("$$a + b + c + d = e$$"), "$$a + b + c + d = e$$");
    }

    #[test]
    fn test_line_breaks_and_bullets_folded() {
        let text = "Energy:\n$$\n* E =\n  mc^2\n$$\ndone";
        assert_eq!(convert(text), "Energy:\n$$E = mc^2$$\ndone");

        let numbered = "$$\n1. x\n2. = y\n$$";
        assert_eq!(convert(numbered), "$$x = y$$");
    }

    #[test]
    fn test_leading_operators_kept() {
        assert_eq!(convert("$$\ny = a\n- b\n+ c\n$$"), "$$y = a - b + c$$");
    }

    #[test]
    fn test_long_sum_is_aligned_and_split() {
        let text = "$$f(x) = a_1 x^1 + a_2 x^2 + a_3 x^3 + a_4 x^4 + a_5 x^5 + a_6 x^6 + a_7 x^7$$";
        insta::assert_snapshot!(convert(text), @r###"
        $$
        \begin{aligned}
        f(x) &= a_1 x^1 + a_2 x^2 + a_3 x^3 + a_4 x^4 \\
        &\quad + a_5 x^5 + a_6 x^6 + a_7 x^7
        \end{aligned}
        $$
        "###);
    }

    #[test]
    fn test_long_formula_without_sum_is_aligned_unsplit() {
        let rhs = r"\frac{\partial^2 u}{\partial t^2} \cdot \frac{\partial^2 u}{\partial x^2} \cdot \sigma";
        let text = format!("$$u(x, t) = {rhs}$$");
        assert!(text.len() > LONG_FORMULA);
        assert_eq!(
            convert(&text),
            format!("$$\n\\begin{{aligned}}\nu(x, t) &= {rhs}\n\\end{{aligned}}\n$$")
        );
    }

    #[test]
    fn test_lengths_count_characters() {
        // 69 characters, 129 bytes
        let greek = "αβγδεζηθικλμνξο";
        let text = format!("$${greek} + {greek} = {greek} + {greek}$$");
        assert_eq!(convert(&text), text);
    }

    #[test]
    fn test_plus_inside_braces_not_split_point() {
        assert_eq!(top_level_plus("a + {b + c} + d"), vec![2, 12]);
        assert_eq!(top_level_plus(r"\{ + x"), vec![3]);
    }

    #[test]
    fn test_existing_environments_untouched() {
        let text = "$$\n\\begin{aligned}\nx &= 1 \\\\\ny &= 2\n\\end{aligned}\n$$";
        assert_eq!(
            convert(text),
            "$$\\begin{aligned} x &= 1 \\\\ y &= 2 \\end{aligned}$$"
        );
    }

    #[test]
    fn test_no_equals_stays_single_line() {
        let long = "x_1 + x_2 + x_3 + x_4 + x_5 + x_6 + x_7 + x_8 + x_9 + x_10 + x_11 + x_12 + x_13";
        assert_eq!(convert(&format!("$${long}$$")), format!("$${long}$$"));
    }

    #[test]
    fn test_empty_and_code_untouched() {
        assert_eq!(convert("$$  $$"), "$$  $$");
        let code = "`$$a\nb$$`\n";
        assert_eq!(convert(code), code);
    }
}
