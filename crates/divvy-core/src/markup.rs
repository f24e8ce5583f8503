//! Tag balance tracking.
//!
//! The transport requires every delivered message to be well-formed on its
//! own, so the segmenter needs to know which elements are open at any point
//! in the accumulated text. Balancing is lenient: closing tokens match the
//! nearest open entry of the same name scanning backward, and closers with
//! no match are ignored. Malformed markup never raises an error here.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Tag grammar: `<`, optional `/`, element name, optional attributes, `>`.
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?([a-z]+)[^>]*>").expect("tag pattern is valid"));

/// An opening markup token currently on the open stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagToken {
    /// Lower-cased element name.
    pub name: String,
    /// Exact source text of the token, attributes included.
    pub literal: String,
}

/// Which element names are void (self-closing, never text-bearing).
///
/// Void elements never enter the open set: they are not pushed on open and
/// not matched on close. The set is configuration, not a hard-coded rule,
/// so the engine stays transport-agnostic.
#[derive(Debug, Clone)]
pub struct MarkupOptions {
    void_elements: HashSet<String>,
}

impl Default for MarkupOptions {
    fn default() -> Self {
        Self::with_void_elements(["br", "hr", "img", "meta", "link", "input"])
    }
}

impl MarkupOptions {
    pub fn with_void_elements<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            void_elements: names
                .into_iter()
                .map(|name| name.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn is_void(&self, name: &str) -> bool {
        self.void_elements.contains(name)
    }
}

/// Returns the elements open at the end of `text`, in opening order.
///
/// Pure query: re-scans the full text on every call, no state is retained
/// between calls.
pub fn open_tags(text: &str, options: &MarkupOptions) -> Vec<TagToken> {
    let mut open: Vec<TagToken> = Vec::new();

    for captures in TAG_RE.captures_iter(text) {
        let literal = &captures[0];
        let name = captures[1].to_ascii_lowercase();

        if options.is_void(&name) {
            continue;
        }

        if literal.starts_with("</") {
            // Lenient balancing: drop the nearest matching open entry,
            // tolerating out-of-order closes. No match means the closer
            // is silently ignored.
            if let Some(position) = open.iter().rposition(|tag| tag.name == name) {
                open.remove(position);
            }
        } else {
            open.push(TagToken {
                name,
                literal: literal.to_string(),
            });
        }
    }

    open
}

/// Renders the minimal suffix that balances `open`: a closing token for
/// every entry, last-opened first.
pub fn closing_sequence(open: &[TagToken]) -> String {
    open.iter()
        .rev()
        .map(|tag| format!("</{}>", tag.name))
        .collect()
}

/// Renders the opening tokens of `open` in their original order, used to
/// carry markup context into the next chunk.
pub fn reopen_sequence(open: &[TagToken]) -> String {
    open.iter().map(|tag| tag.literal.as_str()).collect()
}
