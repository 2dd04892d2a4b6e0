use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;
use tracing::{debug, info};

use crate::color::{ConceptColorMap, Rgb, TINT_AMOUNT};
use crate::document::{Document, ElementData, NodeId, NON_RENDERED_TAGS};

/// Class carried by every inserted marker element
pub const MARKER_CLASS: &str = "ai-concept-highlight";

/// Explanation used when the model does not provide one
pub const DEFAULT_EXPLANATION: &str = "AI identified this as relevant";

/// Visual weight of a highlight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    High,
    #[default]
    Medium,
    Low,
}

impl Relevance {
    /// Case-insensitive parse. A blank tier counts as missing (`Medium`);
    /// unrecognized tiers render as `Low`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "" | "medium" => Relevance::Medium,
            "high" => Relevance::High,
            _ => Relevance::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relevance::High => "high",
            Relevance::Medium => "medium",
            Relevance::Low => "low",
        }
    }
}

impl fmt::Display for Relevance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One passage the model asked to highlight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub text: String,
    pub concepts: Vec<String>,
    pub relevance: Relevance,
    pub explanation: String,
}

impl Highlight {
    pub fn new(text: impl Into<String>, concepts: Vec<String>, relevance: Relevance) -> Self {
        Self {
            text: text.into(),
            concepts,
            relevance,
            explanation: DEFAULT_EXPLANATION.to_string(),
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }
}

/// A highlight together with how many markers it produced
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedHighlight {
    pub highlight: Highlight,
    pub color: Rgb,
    pub markers: usize,
}

/// Inline CSS for a marker. Pure in `(relevance, color, tint)`.
pub fn relevance_style(relevance: Relevance, color: Rgb, tint: Rgb) -> String {
    let mut rules = vec![
        ("border-radius", "3px".to_string()),
        ("padding", "2px 4px".to_string()),
        ("margin", "0 1px".to_string()),
        ("transition", "all 0.3s ease".to_string()),
        ("cursor", "pointer".to_string()),
        ("position", "relative".to_string()),
        ("display", "inline".to_string()),
        ("background-color", tint.to_string()),
    ];

    match relevance {
        Relevance::High => {
            rules.push(("border-left", format!("4px solid {}", color)));
            rules.push(("font-weight", "bold".to_string()));
            rules.push(("text-decoration", "underline".to_string()));
            rules.push(("text-decoration-color", color.to_string()));
            rules.push(("box-shadow", "0 1px 3px rgba(0, 0, 0, 0.2)".to_string()));
        }
        Relevance::Medium => {
            rules.push(("border-left", format!("3px solid {}", color)));
            rules.push(("text-decoration", "underline".to_string()));
            rules.push(("text-decoration-color", color.to_string()));
        }
        Relevance::Low => {
            rules.push(("border-left", format!("2px solid {}", color)));
        }
    }

    rules
        .into_iter()
        .map(|(property, value)| format!("{}: {} !important;", property, value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Byte range of the first case-insensitive occurrence of `needle`.
///
/// Matching folds each character with `char::to_lowercase`, so the range
/// always lands on character boundaries of the original haystack.
pub fn find_case_insensitive(haystack: &str, needle: &str) -> Option<Range<usize>> {
    let folded: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if folded.is_empty() {
        return None;
    }

    'start: for (start, _) in haystack.char_indices() {
        let mut pending = folded.as_slice();
        for (offset, ch) in haystack[start..].char_indices() {
            for lower in ch.to_lowercase() {
                match pending.split_first() {
                    Some((&expected, rest)) if expected == lower => pending = rest,
                    _ => continue 'start,
                }
            }
            if pending.is_empty() {
                return Some(start..start + offset + ch.len_utf8());
            }
        }
        // Haystack exhausted mid-match; later starts are shorter still
        return None;
    }

    None
}

/// Applies highlight markers to a document and reverses them
#[derive(Debug, Default)]
pub struct Highlighter {
    applied: Vec<AppliedHighlight>,
}

impl Highlighter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highlights from the most recent `apply`
    pub fn applied(&self) -> &[AppliedHighlight] {
        &self.applied
    }

    /// Clear existing markers, then apply `highlights` in order.
    /// Returns the number of markers inserted.
    pub fn apply(&mut self, document: &mut Document, highlights: &[Highlight], colors: &ConceptColorMap) -> usize {
        self.clear(document);

        let mut applied = Vec::with_capacity(highlights.len());
        let mut total = 0;

        for (index, highlight) in highlights.iter().enumerate() {
            let color = colors.resolve(&highlight.concepts);
            let markers = highlight_text(document, highlight, color);
            debug!(
                index = index + 1,
                text = %highlight.text,
                color = %color,
                relevance = %highlight.relevance,
                markers,
                "🖍️ Applied highlight"
            );
            total += markers;
            applied.push(AppliedHighlight {
                highlight: highlight.clone(),
                color,
                markers,
            });
        }

        self.applied = applied;
        info!("🖍️ Applied {} highlights ({} markers)", highlights.len(), total);
        total
    }

    /// Remove every marker in the document, restoring the plain text.
    /// Returns the number of markers removed.
    pub fn clear(&mut self, document: &mut Document) -> usize {
        let markers = document.elements_with_class(MARKER_CLASS);
        let mut parents = BTreeSet::new();
        let mut removed = 0;

        for marker in markers {
            let Some(parent) = document.parent(marker) else {
                continue;
            };
            let text = document.text_content(marker);
            let replacement = document.create_text(text);
            if document.replace(marker, replacement).is_some() {
                parents.insert(parent);
                removed += 1;
            }
        }

        for parent in parents {
            document.normalize(parent);
        }

        if removed > 0 {
            debug!("🧹 Cleared {} existing highlights", removed);
        }
        self.applied.clear();
        removed
    }
}

/// Text nodes a highlight may land in: rendered, and not inside a marker.
fn is_highlightable(document: &Document, node: NodeId) -> bool {
    document.ancestors(node).all(|ancestor| match document.element(ancestor) {
        Some(element) => {
            !NON_RENDERED_TAGS.contains(&element.name.as_str()) && !element.has_class(MARKER_CLASS)
        }
        None => true,
    })
}

fn marker_element(highlight: &Highlight, color: Rgb) -> ElementData {
    let tint = color.lighten(TINT_AMOUNT);
    let concepts = highlight.concepts.join(", ");
    let explanation = if highlight.explanation.trim().is_empty() {
        DEFAULT_EXPLANATION
    } else {
        highlight.explanation.as_str()
    };
    let title = format!(
        "Concepts: {}\nRelevance: {}\nExplanation: {}",
        concepts,
        highlight.relevance.as_str().to_uppercase(),
        explanation
    );

    ElementData {
        name: "span".to_string(),
        attrs: vec![
            ("class".to_string(), MARKER_CLASS.to_string()),
            ("style".to_string(), relevance_style(highlight.relevance, color, tint)),
            ("data-concept-color".to_string(), color.to_string()),
            ("data-concepts".to_string(), concepts),
            ("data-relevance".to_string(), highlight.relevance.as_str().to_string()),
            ("data-explanation".to_string(), explanation.to_string()),
            ("title".to_string(), title),
        ],
    }
}

/// Wrap the first occurrence of the highlight text in every matching node.
fn highlight_text(document: &mut Document, highlight: &Highlight, color: Rgb) -> usize {
    let body = document.body();
    let candidates: Vec<NodeId> = document
        .text_nodes(body)
        .into_iter()
        .filter(|&node| is_highlightable(document, node))
        .filter(|&node| {
            document
                .text(node)
                .map(|text| find_case_insensitive(text, &highlight.text).is_some())
                .unwrap_or(false)
        })
        .collect();

    let mut inserted = 0;
    for node in candidates {
        if wrap_match(document, node, highlight, color).is_some() {
            inserted += 1;
        }
    }
    inserted
}

/// Split `node` into prefix / marker / suffix. `None` when the node no
/// longer matches or has been detached.
fn wrap_match(document: &mut Document, node: NodeId, highlight: &Highlight, color: Rgb) -> Option<()> {
    document.parent(node)?;
    let content = document.text(node)?.to_string();
    let range = find_case_insensitive(&content, &highlight.text)?;

    let before = &content[..range.start];
    let matched = &content[range.clone()];
    let after = &content[range.end..];

    let marker = document.create_element(marker_element(highlight, color));
    let matched_node = document.create_text(matched);
    document.append_child(marker, matched_node);

    if !before.is_empty() {
        let prefix = document.create_text(before);
        document.insert_before(node, prefix)?;
    }
    document.insert_before(node, marker)?;
    if !after.is_empty() {
        let suffix = document.create_text(after);
        document.insert_before(node, suffix)?;
    }
    document.detach(node);
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NodeData;

    fn red_map() -> ConceptColorMap {
        vec![("AI", Rgb::new(255, 0, 0))].into_iter().collect()
    }

    fn single_paragraph(text: &str) -> (Document, NodeId) {
        let doc = Document::parse(&format!("<html><body><p>{}</p></body></html>", text));
        let p = doc.find_element("p").unwrap();
        (doc, p)
    }

    #[test]
    fn test_machine_learning_scenario() {
        let (mut doc, p) = single_paragraph("Machine learning is powerful");
        let mut highlighter = Highlighter::new();
        let highlight = Highlight::new("Machine learning", vec!["AI".to_string()], Relevance::High);

        assert_eq!(highlighter.apply(&mut doc, &[highlight], &red_map()), 1);

        let children = doc.children(p).to_vec();
        assert_eq!(children.len(), 2);
        let marker = doc.element(children[0]).unwrap();
        assert!(marker.has_class(MARKER_CLASS));
        assert_eq!(doc.text_content(children[0]), "Machine learning");
        let style = marker.attr("style").unwrap();
        assert!(style.contains("font-weight: bold"));
        assert!(style.contains("text-decoration: underline"));
        assert!(style.contains("border-left: 4px solid #ff0000"));
        assert_eq!(marker.attr("data-concept-color"), Some("#ff0000"));
        assert_eq!(marker.attr("data-relevance"), Some("high"));
        assert_eq!(doc.text(children[1]), Some(" is powerful"));

        assert_eq!(highlighter.clear(&mut doc), 1);
        let children = doc.children(p).to_vec();
        assert_eq!(children.len(), 1);
        assert_eq!(doc.data(children[0]), &NodeData::Text("Machine learning is powerful".to_string()));
        assert!(highlighter.applied().is_empty());
    }

    #[test]
    fn test_duplicate_highlight_skipped() {
        let (mut doc, _) = single_paragraph("Neural networks learn");
        let mut highlighter = Highlighter::new();
        let first = Highlight::new("neural networks", vec!["AI".to_string()], Relevance::Medium);
        let second = Highlight::new("Neural Networks", vec!["AI".to_string()], Relevance::Low);

        assert_eq!(highlighter.apply(&mut doc, &[first, second], &red_map()), 1);
        assert_eq!(highlighter.applied()[0].markers, 1);
        assert_eq!(highlighter.applied()[1].markers, 0);
        assert_eq!(doc.elements_with_class(MARKER_CLASS).len(), 1);
    }

    #[test]
    fn test_round_trip_restores_text() {
        let html = "<html><body><h1>Robotics and AI</h1><p>AI drives <b>robotics</b> research. AI again.</p>\
                    <script>var ai = 'AI';</script><p>Nothing here</p></body></html>";
        let mut doc = Document::parse(html);
        let before = doc.text_content(doc.root());
        let before_html = doc.to_html();

        let highlights = vec![
            Highlight::new("AI", vec!["AI".to_string()], Relevance::High),
            Highlight::new("robotics", vec!["Robotics".to_string()], Relevance::Low),
            Highlight::new("research. AI", vec!["AI".to_string()], Relevance::Medium),
            Highlight::new("absent text", vec!["AI".to_string()], Relevance::Medium),
        ];
        let mut highlighter = Highlighter::new();
        let inserted = highlighter.apply(&mut doc, &highlights, &red_map());
        assert!(inserted >= 3);
        assert_eq!(doc.text_content(doc.root()), before);

        // Script content is never wrapped
        let script = doc.find_element("script").unwrap();
        assert_eq!(doc.children(script).len(), 1);

        highlighter.clear(&mut doc);
        assert_eq!(doc.text_content(doc.root()), before);
        assert_eq!(doc.to_html(), before_html);
        assert!(doc.elements_with_class(MARKER_CLASS).is_empty());
    }

    #[test]
    fn test_apply_clears_previous_state() {
        let (mut doc, _) = single_paragraph("quantum computing and quantum physics");
        let mut highlighter = Highlighter::new();
        let colors = ConceptColorMap::new();
        highlighter.apply(&mut doc, &[Highlight::new("quantum computing", vec!["Q".into()], Relevance::Low)], &colors);
        highlighter.apply(&mut doc, &[Highlight::new("physics", vec!["Q".into()], Relevance::Low)], &colors);

        let markers = doc.elements_with_class(MARKER_CLASS);
        assert_eq!(markers.len(), 1);
        assert_eq!(doc.text_content(markers[0]), "physics");
        assert_eq!(highlighter.applied().len(), 1);
        // Unknown concept falls back to the default color
        assert_eq!(doc.element(markers[0]).unwrap().attr("data-concept-color"), Some("#a8edea"));
    }

    #[test]
    fn test_relevance_style_determinism() {
        let color = Rgb::new(0x45, 0xb7, 0xd1);
        let tint = color.lighten(TINT_AMOUNT);
        for relevance in [Relevance::High, Relevance::Medium, Relevance::Low] {
            assert_eq!(relevance_style(relevance, color, tint), relevance_style(relevance, color, tint));
        }
        let low = relevance_style(Relevance::Low, color, tint);
        assert!(low.contains("border-left: 2px solid #45b7d1"));
        assert!(!low.contains("underline"));
        let medium = relevance_style(Relevance::Medium, color, tint);
        assert!(medium.contains("underline"));
        assert!(!medium.contains("bold"));
    }

    #[test]
    fn test_find_case_insensitive() {
        assert_eq!(find_case_insensitive("Hello World", "world"), Some(6..11));
        assert_eq!(find_case_insensitive("ÜBER alles", "über"), Some(0..5));
        assert_eq!(find_case_insensitive("abc", "abcd"), None);
        assert_eq!(find_case_insensitive("abc", ""), None);
        assert_eq!(find_case_insensitive("aab", "ab"), Some(1..3));
    }

    #[test]
    fn test_marker_keeps_configured_color_spelling() {
        let (mut doc, _) = single_paragraph("Robots everywhere");
        let colors: ConceptColorMap = vec![("Robotics", "#FF6B6B".parse::<Rgb>().unwrap())].into_iter().collect();
        let highlight = Highlight::new("Robots", vec!["Robotics".to_string()], Relevance::Low);

        Highlighter::new().apply(&mut doc, &[highlight], &colors);
        let marker = doc.elements_with_class(MARKER_CLASS)[0];
        let marker = doc.element(marker).unwrap();
        assert_eq!(marker.attr("data-concept-color"), Some("#FF6B6B"));
        assert!(marker.attr("style").unwrap().contains("border-left: 2px solid #FF6B6B"));
    }

    #[test]
    fn test_relevance_parsing() {
        assert_eq!(Relevance::parse_lenient("HIGH"), Relevance::High);
        assert_eq!(Relevance::parse_lenient(" medium "), Relevance::Medium);
        assert_eq!(Relevance::parse_lenient("critical"), Relevance::Low);
        assert_eq!(Relevance::parse_lenient(""), Relevance::Medium);
        assert_eq!(Relevance::parse_lenient("   "), Relevance::Medium);
    }
}
