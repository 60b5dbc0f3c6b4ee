//! Plain-text extraction for HTML product descriptions.

use regex::Regex;
use std::sync::LazyLock;

/// Comments, script/style blocks and tags. Quoted attribute values may
/// contain `>`.
static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<!--.*?-->|<(?:script|style)\b(?:[^>"']|"[^"]*"|'[^']*')*>.*?</(?:script|style)\s*>|</?[a-z!](?:[^>"']|"[^"]*"|'[^']*')*>"#,
    )
    .expect("tag pattern is valid")
});

/// Strip tags from an HTML fragment, one text run per line.
///
/// Entities (named and numeric) are decoded after the tags are removed, so
/// an escaped `&lt;b&gt;` survives as literal text. Empty input yields an
/// empty string.
pub fn clean_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let text = TAG.replace_all(html, "\n");
    let text = html_escape::decode_html_entities(&text).replace('\u{a0}', " ");

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
