use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use concept_highlighter::highlighter::MARKER_CLASS;
use concept_highlighter::{
    chunk, lighten, AnalyzerConfig, Concept, ConceptAnalyzer, ConceptColorMap, Document, GenerationRequest, Highlight,
    Highlighter, HighlighterResult, LanguageModel, Page, PageAnalyzer, PageOutcome, Relevance, Rgb, Settings,
};

/// Answers every prompt with the same response and counts the prompts
struct CannedModel {
    response: String,
    prompts: Mutex<Vec<String>>,
}

impl CannedModel {
    fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LanguageModel for CannedModel {
    async fn generate(&self, request: &GenerationRequest) -> HighlighterResult<String> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok(self.response.clone())
    }
}

fn settings(concepts: &[(&str, Rgb)]) -> Settings {
    Settings {
        api_key: "k".repeat(39),
        enabled: true,
        concepts: concepts.iter().map(|(text, color)| Concept::new(*text, *color)).collect(),
        ..Settings::default()
    }
}

#[test]
fn test_patent_sections_chunk_scenario() {
    let chunks = chunk("TITLE:\nFoo\n\nABSTRACT:\nBar baz", 5);
    assert_eq!(chunks, vec!["TITLE:\nFoo", "ABSTRACT:\nBar baz"]);
}

#[test]
fn test_highlight_round_trip_scenario() {
    let mut document = Document::parse("<html><head></head><body><p>Machine learning is powerful</p></body></html>");
    let original_html = document.to_html();
    let paragraph = document.find_element("p").unwrap();

    let colors: ConceptColorMap = [("AI", Rgb::new(0xff, 0, 0))].into_iter().collect();
    let highlights = vec![Highlight::new("Machine learning", vec!["AI".to_string()], Relevance::High)];

    let mut highlighter = Highlighter::new();
    assert_eq!(highlighter.apply(&mut document, &highlights, &colors), 1);

    let children = document.children(paragraph).to_vec();
    assert_eq!(children.len(), 2);
    let marker = document.element(children[0]).unwrap();
    assert!(marker.has_class(MARKER_CLASS));
    assert_eq!(marker.attr("data-relevance"), Some("high"));
    assert_eq!(document.text_content(children[0]), "Machine learning");
    assert_eq!(document.text(children[1]), Some(" is powerful"));

    assert_eq!(highlighter.clear(&mut document), 1);
    assert_eq!(document.children(paragraph).len(), 1);
    assert_eq!(document.to_html(), original_html);
}

#[test]
fn test_lighten_bounds() {
    for color in ["#000000", "#ff0000", "#a8edea", "#123456", "#ffffff"] {
        let original: Rgb = color.parse().unwrap();
        let tinted: Rgb = lighten(color, 0.85).parse().unwrap();
        assert!(tinted.r >= original.r && tinted.g >= original.g && tinted.b >= original.b);
    }
    assert_eq!(lighten("#FF0000", 0.85), "#ffd9d9");
}

#[tokio::test]
async fn test_page_analysis_end_to_end() {
    let html = r#"<html><head><title>ML</title><style>p { color: red; }</style></head><body>
        <nav>Home | About</nav>
        <article>
            <h1>Intro to machine learning</h1>
            <p>Machine learning lets computers learn patterns from data without explicit rules.</p>
            <p>Neural networks are one popular family of machine learning models.</p>
        </article>
        <script>var machine = "learning";</script>
        </body></html>"#;

    let response = r#"Here is the analysis:
    {"highlights": [
        {"text": "machine learning", "concepts": ["AI"], "relevance": "high", "explanation": "Core topic"},
        {"text": "Neural networks", "concepts": ["Deep Learning", "AI"], "relevance": "medium"},
        {"text": "not on this page", "concepts": ["AI"], "relevance": "low"}
    ], "conceptsFound": ["AI", "Deep Learning"]}"#;

    let model = CannedModel::new(response);
    let analyzer = PageAnalyzer::new(
        ConceptAnalyzer::new(model, &AnalyzerConfig::default()).with_chunk_delay(Duration::ZERO),
    );
    let settings = settings(&[("AI", Rgb::new(0xff, 0, 0)), ("Deep Learning", Rgb::new(0, 0, 0xff))]);

    let mut page = Page::parse(html, Some("https://example.com/blog/ml"));
    let original_text = page.content();
    assert!(!original_text.contains("var machine"));

    let outcome = analyzer.analyze_page(&mut page, &settings).await.unwrap();
    match &outcome {
        PageOutcome::Highlighted {
            applied,
            highlights,
            concepts_found,
        } => {
            // One marker per matching text node: heading, first and second paragraph
            assert_eq!(*applied, 4);
            assert_eq!(*highlights, 3);
            assert_eq!(concepts_found.len(), 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(outcome.message(), "Found 3 highlights for 2 concepts");

    let highlighted = page.to_html();
    assert!(highlighted.contains("var machine = \"learning\";"));
    assert!(highlighted.contains("data-concept-color=\"#0000ff\""));
    assert_eq!(page.content(), original_text);

    let prompts = analyzer.analyzer().model().prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("these concepts: AI, Deep Learning"));

    page.clear_highlights();
    assert!(page.document.elements_with_class(MARKER_CLASS).is_empty());
    assert_eq!(page.content(), original_text);
}
