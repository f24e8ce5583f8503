//! Markup sanitization.
//!
//! Normalizes the handful of non-text elements the bot's markup vocabulary
//! allows into plain-text equivalents, so the segmenter only ever sees
//! line breaks and balance-tracked inline elements. Applied once, before
//! segmentation.

use std::sync::LazyLock;

use regex::Regex;

static BR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("br pattern is valid"));
static HR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<hr\s*/?>").expect("hr pattern is valid"));
static IMG_ALT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img[^>]*alt="([^"]*)"[^>]*>"#).expect("img pattern is valid"));
static IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img[^>]*>").expect("img pattern is valid"));
static METADATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:meta|link|input)[^>]*>").expect("metadata pattern is valid"));

/// Converts line-break, rule, image and metadata elements to text.
///
/// - `<br>` → newline
/// - `<hr>` → `\n---\n`
/// - `<img alt="chart">` → `[Image: chart]`, `<img>` without alt → `[Image]`
/// - `<meta>` / `<link>` / `<input>` → removed
pub fn sanitize(text: &str) -> String {
    let text = BR_RE.replace_all(text, "\n");
    let text = HR_RE.replace_all(&text, "\n---\n");
    let text = IMG_ALT_RE.replace_all(&text, "[Image: $1]");
    let text = IMG_RE.replace_all(&text, "[Image]");
    METADATA_RE.replace_all(&text, "").into_owned()
}

/// Escapes `&`, `<`, `>` and `"` for embedding untrusted text in markup.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::{escape_html, sanitize};

    #[test]
    fn line_breaks_become_newlines() {
        assert_eq!(sanitize("a<br>b<br/>c<br />d<BR>e"), "a\nb\nc\nd\ne");
    }

    #[test]
    fn rules_become_dashes() {
        assert_eq!(sanitize("above<hr>below"), "above\n---\nbelow");
    }

    #[test]
    fn images_become_placeholders() {
        assert_eq!(sanitize(r#"<img src="x.png" alt="chart">"#), "[Image: chart]");
        assert_eq!(sanitize(r#"<img alt="">"#), "[Image: ]");
        assert_eq!(sanitize(r#"<img src="x.png">"#), "[Image]");
    }

    #[test]
    fn metadata_elements_are_stripped() {
        assert_eq!(
            sanitize(r#"<meta charset="utf-8">text<link rel="x"><input type="text">"#),
            "text"
        );
    }

    #[test]
    fn inline_markup_passes_through() {
        assert_eq!(sanitize("<b>bold</b> and <i>italic</i>"), "<b>bold</b> and <i>italic</i>");
    }

    #[test]
    fn escape_covers_the_four_specials() {
        assert_eq!(escape_html(r#"a & <b> "c""#), "a &amp; &lt;b&gt; &quot;c&quot;");
        assert_eq!(escape_html("plain"), "plain");
    }
}
