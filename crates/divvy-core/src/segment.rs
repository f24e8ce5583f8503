//! Length-bounded, markup-safe segmentation.
//!
//! Splits a sanitized message into chunks that each fit the transport's
//! hard length limit and are independently well-formed: a chunk never ends
//! inside a tag token, tags still open at a boundary are closed with a
//! synthetic suffix and reopened at the start of the next chunk.
//!
//! Lengths are counted in Unicode scalar values; split indices are char
//! indices mapped to byte offsets before slicing.

use crate::markup::{self, MarkupOptions, TagToken};

/// Telegram's per-message limit, the reference transport.
pub const DEFAULT_MAX_LENGTH: usize = 4096;

#[derive(Debug, Clone)]
pub struct SegmentOptions {
    /// Hard per-chunk length limit imposed by the transport.
    pub max_length: usize,
    pub markup: MarkupOptions,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            markup: MarkupOptions::default(),
        }
    }
}

impl SegmentOptions {
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            ..Self::default()
        }
    }
}

/// A finished, self-contained unit of the message: trimmed text plus any
/// synthetic closing tags. Immutable once produced; list order is the
/// required transmission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Splits `text` into transport-legal chunks.
///
/// Works line by line: lines accumulate into the current chunk while they
/// fit the budget (the limit minus room for the closing sequence and a
/// trailing separator). A line that does not fit flushes the buffer and
/// reopens the flushed chunk's tags; a line longer than a whole chunk is
/// force-split, preferring whitespace, never inside a tag token where a
/// legal cut exists. Malformed markup degrades gracefully and never
/// aborts segmentation.
pub fn segment(text: &str, options: &SegmentOptions) -> Vec<Chunk> {
    let max_length = options.max_length.max(1);
    let markup_options = &options.markup;

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current = String::new();
    // Byte length of the synthetic reopen prefix seeding `current`; only
    // text past this offset counts as real content.
    let mut reopen_prefix_len = 0usize;

    for line in text.split('\n') {
        let mut line: &str = line;
        let mut open = markup::open_tags(&current, markup_options);

        if !line_fits(&current, line, &open, max_length, markup_options) {
            if has_real_content(&current, reopen_prefix_len) {
                let closing = markup::closing_sequence(&open);
                chunks.push(flush_chunk(&current, &closing));
                current = markup::reopen_sequence(&open);
                reopen_prefix_len = current.len();
            }

            // The line may exceed a whole chunk on its own: split it until
            // the remainder fits. Each pass consumes at least one character
            // of the line, so this terminates.
            while !line.is_empty()
                && !line_fits(&current, line, &open, max_length, markup_options)
            {
                let closing = markup::closing_sequence(&open);
                let available =
                    line_budget(max_length, &closing).saturating_sub(char_count(&current));
                let split =
                    choose_split_index(line, available, &current, max_length, markup_options);
                let (head, rest) = split_at_chars(line, split);

                current.push_str(head);
                let flushed_open = markup::open_tags(&current, markup_options);
                let flushed_closing = markup::closing_sequence(&flushed_open);
                chunks.push(flush_chunk(&current, &flushed_closing));

                current = markup::reopen_sequence(&flushed_open);
                reopen_prefix_len = current.len();
                open = flushed_open;
                line = rest.trim();
            }
        }

        current.push_str(line);
        current.push('\n');
    }

    if has_real_content(&current, reopen_prefix_len) {
        let open = markup::open_tags(&current, markup_options);
        let closing = markup::closing_sequence(&open);
        chunks.push(flush_chunk(&current, &closing));
    }

    chunks
}

/// A line fits when it leaves room for the closing sequence and a trailing
/// separator — both for the tags already open and for any tags the line
/// itself opens near the boundary.
fn line_fits(
    current: &str,
    line: &str,
    open: &[TagToken],
    max_length: usize,
    options: &MarkupOptions,
) -> bool {
    let closing = markup::closing_sequence(open);
    if char_count(current) + char_count(line) > line_budget(max_length, &closing) {
        return false;
    }
    flushed_len(current, line, options) <= max_length
}

/// Length the chunk would have if `line` were appended and the buffer
/// flushed right away: trimmed content plus its own closing sequence.
fn flushed_len(current: &str, line: &str, options: &MarkupOptions) -> usize {
    let mut candidate = String::with_capacity(current.len() + line.len());
    candidate.push_str(current);
    candidate.push_str(line);
    let closing = markup::closing_sequence(&markup::open_tags(&candidate, options));
    char_count(candidate.trim()) + char_count(&closing)
}

fn line_budget(max_length: usize, closing: &str) -> usize {
    // Reserve the closing sequence plus one trailing line separator.
    max_length.saturating_sub(char_count(closing) + 1)
}

fn has_real_content(current: &str, reopen_prefix_len: usize) -> bool {
    !current[reopen_prefix_len..].trim().is_empty()
}

fn flush_chunk(current: &str, closing: &str) -> Chunk {
    let mut content = current.trim().to_string();
    content.push_str(closing);
    Chunk { content }
}

/// Picks how many characters of `line` to take into the current chunk.
///
/// Prefers the last whitespace at or before the available budget and falls
/// back to a hard cut. Tags the head opens grow the closing sequence, so
/// the would-be flush is re-checked against the limit and the cut shrinks
/// until it fits. Minimum index 1 guarantees progress.
fn choose_split_index(
    line: &str,
    available: usize,
    current: &str,
    max_length: usize,
    options: &MarkupOptions,
) -> usize {
    let mut available = available.max(1);
    loop {
        let split = split_index_within(line, available);
        let (head, _) = split_at_chars(line, split);
        let overflow = flushed_len(current, head, options).saturating_sub(max_length);
        if overflow == 0 || split <= 1 {
            return split;
        }
        available = split.saturating_sub(overflow).max(1);
    }
}

fn split_index_within(line: &str, available: usize) -> usize {
    let line_len = char_count(line);
    let limit = available.min(line_len.saturating_sub(1));

    let mut last_whitespace = None;
    for (index, ch) in line.chars().enumerate().take(limit + 1) {
        if ch.is_whitespace() {
            last_whitespace = Some(index);
        }
    }

    let mut split = match last_whitespace {
        Some(index) if index > 0 => index,
        // No usable whitespace in range: hard character cut.
        _ => available.max(1),
    };

    // Never cut strictly inside a tag token. When the offending token does
    // not start the line, back off to just before its `<`; a token longer
    // than the whole budget is cut anyway so the loop keeps moving.
    let mut in_tag = false;
    let mut tag_start = 0usize;
    for (index, ch) in line.chars().enumerate().take(split) {
        match ch {
            '<' => {
                in_tag = true;
                tag_start = index;
            }
            '>' => in_tag = false,
            _ => {}
        }
    }
    if in_tag && tag_start > 0 {
        split = tag_start;
    }

    split
}

fn split_at_chars(text: &str, index: usize) -> (&str, &str) {
    match text.char_indices().nth(index) {
        Some((byte_offset, _)) => text.split_at(byte_offset),
        None => (text, ""),
    }
}

fn char_count(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::{Chunk, SegmentOptions, segment};
    use crate::markup::{MarkupOptions, open_tags};

    fn segment_with_max(text: &str, max_length: usize) -> Vec<Chunk> {
        segment(text, &SegmentOptions::with_max_length(max_length))
    }

    fn assert_transport_legal(chunks: &[Chunk], max_length: usize) {
        let options = MarkupOptions::default();
        for chunk in chunks {
            assert!(
                chunk.char_len() <= max_length,
                "chunk exceeds limit: {:?} ({} > {})",
                chunk.content,
                chunk.char_len(),
                max_length
            );
            assert!(
                open_tags(&chunk.content, &options).is_empty(),
                "chunk is not self-balanced: {:?}",
                chunk.content
            );
            let mut in_tag = false;
            for ch in chunk.content.chars() {
                match ch {
                    '<' => in_tag = true,
                    '>' => in_tag = false,
                    _ => {}
                }
            }
            assert!(!in_tag, "chunk ends mid-tag: {:?}", chunk.content);
        }
    }

    #[test]
    fn short_message_is_a_single_chunk() {
        let chunks = segment_with_max("hello world", 20);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "hello world");
    }

    #[test]
    fn empty_and_whitespace_input_produce_no_chunks() {
        assert!(segment_with_max("", 20).is_empty());
        assert!(segment_with_max("\n\n  \n", 20).is_empty());
    }

    #[test]
    fn long_bold_run_splits_and_stays_balanced() {
        let input = format!("<b>{}</b>", "x".repeat(30));
        let chunks = segment_with_max(&input, 20);

        assert!(chunks.len() > 1);
        assert_transport_legal(&chunks, 20);

        // Stripping tags (original and synthetic alike) leaves all thirty
        // payload characters, in order.
        let payload: String = chunks
            .iter()
            .map(|chunk| chunk.content.replace("<b>", "").replace("</b>", ""))
            .collect();
        assert_eq!(payload, "x".repeat(30));
        // Every continuation chunk reopens the bold context.
        for chunk in &chunks[1..] {
            assert!(chunk.content.starts_with("<b>"));
        }
    }

    #[test]
    fn unmatched_closer_passes_through_unchanged() {
        let chunks = segment_with_max("plain </i> text", 20);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "plain </i> text");
    }

    #[test]
    fn lines_accumulate_until_the_budget_runs_out() {
        let chunks = segment_with_max("hello\nworld", 20);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "hello\nworld");

        let chunks = segment_with_max("aaaaaaaaaa\nbbbbbbbbbb", 20);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "aaaaaaaaaa");
        assert_eq!(chunks[1].content, "bbbbbbbbbb");
    }

    #[test]
    fn open_markup_carries_across_a_line_boundary_flush() {
        let chunks = segment_with_max("<b>first\nsecond</b>", 12);
        assert!(chunks.len() > 1);
        assert_transport_legal(&chunks, 12);
        assert_eq!(chunks[0].content, "<b>first</b>");
        assert!(chunks[1].content.starts_with("<b>"));
    }

    #[test]
    fn overlong_line_prefers_whitespace_splits() {
        let chunks = segment_with_max("aaaa bbbb cccc dddd eeee", 20);
        assert_transport_legal(&chunks, 20);
        assert_eq!(chunks[0].content, "aaaa bbbb cccc dddd");
        assert_eq!(chunks[1].content, "eeee");
    }

    #[test]
    fn overlong_line_without_whitespace_hard_cuts() {
        let chunks = segment_with_max(&"x".repeat(50), 20);
        assert_transport_legal(&chunks, 20);
        let rejoined: String = chunks.iter().map(|chunk| chunk.content.as_str()).collect();
        assert_eq!(rejoined, "x".repeat(50));
    }

    #[test]
    fn split_never_lands_inside_a_tag_token() {
        // The <i> token straddles the hard cut at offset 19; the split must
        // back off to just before its opening bracket.
        let input = format!("{}<i>emphasis</i>", "x".repeat(17));
        let chunks = segment_with_max(&input, 20);
        assert_transport_legal(&chunks, 20);
        assert_eq!(chunks[0].content, "x".repeat(17));
        assert_eq!(chunks[1].content, "<i>emphasis</i>");
    }

    #[test]
    fn leading_blank_lines_do_not_produce_empty_chunks() {
        let chunks = segment_with_max("\n\n\nhello world", 20);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "hello world");
    }

    #[test]
    fn reconstruction_preserves_words_in_order() {
        let input = "the quick brown fox jumps over the lazy dog\nand then \
                     runs far away across the wide open field";
        let chunks = segment_with_max(input, 25);
        assert_transport_legal(&chunks, 25);

        let expected: Vec<&str> = input.split_whitespace().collect();
        let actual: Vec<String> = chunks
            .iter()
            .flat_map(|chunk| chunk.content.split_whitespace().map(str::to_string))
            .collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn chunk_count_is_bounded_for_plain_text() {
        let input = "word ".repeat(200);
        let max_length = 40;
        let chunks = segment_with_max(input.trim_end(), max_length);
        assert_transport_legal(&chunks, max_length);
        // Roughly ceil(len / usable-budget); generous bound proves termination
        // did not degenerate into per-character chunks.
        assert!(chunks.len() <= input.len() / 10);
    }

    #[test]
    fn nested_markup_closes_and_reopens_in_order() {
        let input = format!("<b><i>{}</i></b>", "y ".repeat(30).trim_end());
        let chunks = segment_with_max(&input, 24);
        assert_transport_legal(&chunks, 24);
        for chunk in &chunks[1..] {
            // Reopen order matches original opening order.
            assert!(chunk.content.starts_with("<b><i>"), "{:?}", chunk.content);
        }
    }

    #[test]
    fn default_options_use_the_transport_limit() {
        let options = SegmentOptions::default();
        assert_eq!(options.max_length, 4096);
    }

    #[test]
    fn multibyte_text_is_counted_in_characters() {
        let input = "é".repeat(30);
        let chunks = segment_with_max(&input, 20);
        assert_transport_legal(&chunks, 20);
        let rejoined: String = chunks.iter().map(|chunk| chunk.content.as_str()).collect();
        assert_eq!(rejoined, input);
    }
}
