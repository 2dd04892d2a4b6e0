use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Content length limit for ordinary pages before chunking kicks in
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 8000;

/// Patents are sent with a larger limit since their sections are long
pub const PATENT_MAX_CONTENT_LENGTH: usize = 30000;

const SECTION_MARKERS: [&str; 4] = ["TITLE:", "ABSTRACT:", "CLAIMS:", "DESCRIPTION:"];

fn section_boundary() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    BOUNDARY.get_or_init(|| {
        Regex::new(r"\n\n(?:TITLE:|ABSTRACT:|CLAIMS:|DESCRIPTION:)").expect("valid section regex")
    })
}

/// How the document is split into atomic units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// Split before `TITLE:` / `ABSTRACT:` / `CLAIMS:` / `DESCRIPTION:` labels
    Sections,
    /// Split on blank lines
    Paragraphs,
}

impl SplitMode {
    pub fn detect(content: &str) -> Self {
        if content.contains("TITLE:") && content.contains("ABSTRACT:") {
            SplitMode::Sections
        } else {
            SplitMode::Paragraphs
        }
    }
}

/// Patent-structured content carries all three leading section labels.
pub fn is_patent_content(content: &str) -> bool {
    SECTION_MARKERS[..3].iter().all(|marker| content.contains(marker))
}

/// Size limit a single request may carry for this content.
pub fn max_content_length(content: &str) -> usize {
    if is_patent_content(content) {
        PATENT_MAX_CONTENT_LENGTH
    } else {
        DEFAULT_MAX_CONTENT_LENGTH
    }
}

/// Whether the content must go through the multi-request path.
pub fn needs_chunking(content: &str) -> bool {
    content.chars().count() > max_content_length(content)
}

/// Split content into its atomic units (sections or paragraphs), untrimmed.
pub fn split_units_with(content: &str, mode: SplitMode) -> Vec<&str> {
    match mode {
        SplitMode::Sections => {
            let mut units = Vec::new();
            let mut start = 0;
            for boundary in section_boundary().find_iter(content) {
                units.push(&content[start..boundary.start()]);
                // The label belongs to the next unit; the blank line does not
                start = boundary.start() + 2;
            }
            units.push(&content[start..]);
            units
        }
        SplitMode::Paragraphs => content.split("\n\n").collect(),
    }
}

/// Greedy, order-preserving chunker over sections or paragraphs
#[derive(Debug, Clone)]
pub struct SmartChunker {
    max_chunk_size: usize,
}

impl Default for SmartChunker {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CONTENT_LENGTH,
        }
    }
}

impl SmartChunker {
    pub fn new(max_chunk_size: usize) -> Self {
        Self {
            max_chunk_size: max_chunk_size.max(1),
        }
    }

    /// Split `content` into trimmed, non-empty chunks of at most
    /// `max_chunk_size` characters. A single unit larger than the limit is
    /// emitted whole as its own chunk.
    pub fn chunk(&self, content: &str) -> Vec<String> {
        let mode = SplitMode::detect(content);
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for unit in split_units_with(content, mode) {
            let unit_len = unit.chars().count();
            let joiner_len = if current.is_empty() { 0 } else { 2 };
            if current_len > 0 && current_len + joiner_len + unit_len > self.max_chunk_size {
                push_trimmed(&mut chunks, &current);
                current = unit.to_string();
                current_len = unit_len;
            } else {
                if !current.is_empty() {
                    current.push_str("\n\n");
                    current_len += 2;
                }
                current.push_str(unit);
                current_len += unit_len;
            }
        }

        push_trimmed(&mut chunks, &current);

        debug!(
            mode = ?mode,
            chunk_count = chunks.len(),
            max_chunk_size = self.max_chunk_size,
            "✂️ Split content into chunks"
        );

        chunks
    }
}

fn push_trimmed(chunks: &mut Vec<String>, buffer: &str) {
    let trimmed = buffer.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Shorthand for `SmartChunker::new(max_chunk_size).chunk(content)`
pub fn chunk(content: &str, max_chunk_size: usize) -> Vec<String> {
    SmartChunker::new(max_chunk_size).chunk(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized_units(text: &str, mode: SplitMode) -> Vec<String> {
        split_units_with(text, mode)
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect()
    }

    #[test]
    fn test_patent_sections_kept_whole() {
        let chunks = chunk("TITLE:\nFoo\n\nABSTRACT:\nBar baz", 5);
        assert_eq!(chunks, vec!["TITLE:\nFoo", "ABSTRACT:\nBar baz"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk("", 100).is_empty());
        assert!(chunk("\n\n   \n\n", 100).is_empty());
    }

    #[test]
    fn test_paragraphs_accumulate_until_limit() {
        let content = "aaaa\n\nbbbb\n\ncccc\n\ndddd";
        let chunks = chunk(content, 10);
        assert_eq!(chunks, vec!["aaaa\n\nbbbb", "cccc\n\ndddd"]);
    }

    #[test]
    fn test_joiner_counts_toward_limit() {
        // 4 + 2 + 4 = 10 characters once joined
        assert_eq!(chunk("aaaa\n\nbbbb", 8), vec!["aaaa", "bbbb"]);
        assert_eq!(chunk("aaaa\n\nbbbb", 9), vec!["aaaa", "bbbb"]);
        assert_eq!(chunk("aaaa\n\nbbbb", 10), vec!["aaaa\n\nbbbb"]);
    }

    #[test]
    fn test_oversized_paragraph_not_split() {
        let long = "x".repeat(50);
        let content = format!("short\n\n{}\n\ntail", long);
        let chunks = chunk(&content, 10);
        assert_eq!(chunks, vec!["short".to_string(), long, "tail".to_string()]);
    }

    #[test]
    fn test_section_split_ignores_inline_labels() {
        let content = "TITLE:\nWidget\n\nABSTRACT:\nA widget. See CLAIMS: below\n\nmore abstract\n\nCLAIMS:\n1. A widget.";
        let units = normalized_units(content, SplitMode::detect(content));
        assert_eq!(units.len(), 3);
        assert!(units[1].starts_with("ABSTRACT:"));
        assert!(units[1].contains("more abstract"));
        assert!(units[2].starts_with("CLAIMS:"));
    }

    #[test]
    fn test_chunks_preserve_units_and_bounds() {
        let samples = [
            "alpha beta\n\ngamma\n\n\n\ndelta epsilon zeta\n\neta",
            "TITLE:\nT\n\nABSTRACT:\nabstract text here\n\nCLAIMS:\n1. one\n\n2. two\n\nDESCRIPTION:\nlong description body",
            "  leading\n\ntrailing  \n\n",
            "ünïcödé ß\n\nçà\n\n日本語のテキスト",
        ];
        for content in samples {
            let mode = SplitMode::detect(content);
            for max in [1usize, 5, 12, 40, 1000] {
                let chunks = chunk(content, max);
                for c in &chunks {
                    assert!(!c.trim().is_empty());
                    let units = normalized_units(c, mode);
                    assert!(c.chars().count() <= max || units.len() == 1, "chunk {:?} over {}", c, max);
                }
                let rejoined: Vec<String> = chunks.iter().flat_map(|c| normalized_units(c, mode)).collect();
                assert_eq!(rejoined, normalized_units(content, mode));
            }
        }
    }

    #[test]
    fn test_limits_by_content_type() {
        let patent = "TITLE:\nx\n\nABSTRACT:\ny\n\nCLAIMS:\nz";
        assert_eq!(max_content_length(patent), PATENT_MAX_CONTENT_LENGTH);
        assert_eq!(max_content_length("plain page"), DEFAULT_MAX_CONTENT_LENGTH);
        assert!(!needs_chunking(patent));
        assert!(needs_chunking(&"p".repeat(DEFAULT_MAX_CONTENT_LENGTH + 1)));
    }
}
