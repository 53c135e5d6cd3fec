//! Comment normalization used by the pre-submit guards.

use regex::Regex;
use std::sync::OnceLock;

static TAG_PATTERN: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn tag_pattern() -> &'static Regex {
    TAG_PATTERN.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static tag pattern"))
}

fn whitespace_pattern() -> &'static Regex {
    WHITESPACE_PATTERN.get_or_init(|| Regex::new(r"\s+").expect("static whitespace pattern"))
}

/// Strip markup and collapse whitespace so two comments can be compared by content.
///
/// Tags become spaces (so `<p>a</p><p>b</p>` reads "a b"), the handful of
/// entities a rich-text editor emits are decoded, and runs of whitespace
/// including non-breaking spaces collapse to one space.
pub fn clean_comment(html: &str) -> String {
    let without_tags = tag_pattern().replace_all(html, " ");
    let decoded = decode_entities(&without_tags);
    whitespace_pattern()
        .replace_all(&decoded.replace('\u{a0}', " "), " ")
        .trim()
        .to_string()
}

fn decode_entities(text: &str) -> String {
    // &amp; last so "&amp;lt;" stays "&lt;"
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// True when the comment still carries no content of its own.
pub fn is_blank(html: &str) -> bool {
    clean_comment(html).is_empty()
}

/// True when the user left the pre-filled template untouched (ignoring markup and spacing).
pub fn matches_template(comment_html: &str, template_html: &str) -> bool {
    clean_comment(comment_html) == clean_comment(template_html)
}
