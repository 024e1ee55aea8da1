//! Text normalization shared by the parser and the bulk loader.

use std::sync::OnceLock;

use regex::Regex;

fn tag_pattern() -> &'static Regex {
    static RE_TAGS: OnceLock<Regex> = OnceLock::new();
    RE_TAGS.get_or_init(|| {
        Regex::new(r"(?is)<!--.*?-->|<(script|style)\b.*?</(script|style)\s*>|</?[a-z!][^>]*>")
            .expect("static HTML tag pattern compiles")
    })
}

/// Drop every non-ASCII code point.
#[must_use]
pub fn ascii_only(s: &str) -> String {
    s.chars().filter(char::is_ascii).collect()
}

/// Strip HTML markup and return plain text.
///
/// Removes comments, `<script>`/`<style>` blocks and tags, decodes HTML
/// entities, and collapses runs of whitespace into single spaces.
#[must_use]
pub fn strip_html(html: &str) -> String {
    let without_tags = tag_pattern().replace_all(html, " ");
    let decoded = html_escape::decode_html_entities(&without_tags);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
