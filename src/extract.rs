use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::document::NON_RENDERED_TAGS;

/// Candidate containers for the main page content, most specific first
const CONTENT_SELECTORS: [&str; 8] = [
    "main",
    "article",
    "[role=\"main\"]",
    ".content",
    ".post-content",
    ".entry-content",
    "#content",
    "body",
];

const BLOCK_TAGS: [&str; 32] = [
    "address", "article", "aside", "blockquote", "dd", "details", "div", "dl",
    "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2",
    "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol",
    "p", "pre", "section", "table", "tr", "ul",
];

/// Sections of a Google Patents page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatentContent {
    pub title: String,
    pub r#abstract: String,
    pub claims: String,
    pub description: String,
}

impl PatentContent {
    /// `TITLE:` / `ABSTRACT:` / `CLAIMS:` / `DESCRIPTION:` layout the chunker
    /// recognizes as section boundaries.
    pub fn to_labelled_text(&self) -> String {
        let mut sections = Vec::new();
        if !self.title.is_empty() {
            sections.push(format!("TITLE:\n{}\n", self.title));
        }
        if !self.r#abstract.is_empty() {
            sections.push(format!("ABSTRACT:\n{}\n", self.r#abstract));
        }
        if !self.claims.is_empty() {
            sections.push(format!("CLAIMS:\n{}\n", self.claims));
        }
        if !self.description.is_empty() {
            sections.push(format!("DESCRIPTION:\n{}", self.description));
        }
        sections.join("\n\n")
    }
}

/// True for `patents.google.com/patent/...` URLs
pub fn is_google_patents_url(url: &str) -> bool {
    match reqwest::Url::parse(url) {
        Ok(parsed) => {
            parsed.host_str() == Some("patents.google.com") && parsed.path().contains("/patent/")
        }
        Err(_) => false,
    }
}

/// Visible text of the page that should be sent for analysis.
pub fn extract_page_content(html: &str, url: Option<&str>) -> String {
    let document = Html::parse_document(html);

    if url.map(is_google_patents_url).unwrap_or(false) {
        let patent = extract_patent_content(&document);
        let text = patent.to_labelled_text();
        info!(
            title_chars = patent.title.chars().count(),
            abstract_chars = patent.r#abstract.chars().count(),
            claims_chars = patent.claims.chars().count(),
            description_chars = patent.description.chars().count(),
            "🔍 Extracted Google Patents content"
        );
        if text.is_empty() {
            return "No patent content found".to_string();
        }
        return text;
    }

    let root = CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    debug!("📄 Extracting content from <{}>", root.value().name());
    rendered_text(root)
}

/// Extract the labelled sections of a patent page
pub fn extract_patent_content(document: &Html) -> PatentContent {
    PatentContent {
        title: first_text(document, "h1#title, h1[id=\"title\"]"),
        r#abstract: first_text(document, "section#abstract patent-text, [id=\"abstract\"] patent-text, .abstract"),
        claims: joined_text(
            document,
            "section#claims patent-text, [id=\"claims\"] patent-text, .claims patent-text, ol.claims li",
        ),
        description: joined_text(
            document,
            "section#description patent-text, [id=\"description\"] patent-text, .description-paragraph",
        ),
    }
}

fn first_text(document: &Html, selector: &str) -> String {
    Selector::parse(selector)
        .ok()
        .and_then(|s| document.select(&s).next().map(|e| collapse_whitespace(&e.text().collect::<String>())))
        .unwrap_or_default()
}

fn joined_text(document: &Html, selector: &str) -> String {
    let Ok(selector) = Selector::parse(selector) else {
        return String::new();
    };
    document
        .select(&selector)
        .map(|e| collapse_whitespace(&e.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Approximate rendered text: block elements become paragraphs separated by
/// blank lines, `<br>` becomes a line break, non-rendered elements are skipped.
pub fn rendered_text(root: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(root, &mut raw);

    let mut paragraphs = Vec::new();
    let mut lines: Vec<String> = Vec::new();
    for line in raw.split('\n') {
        let collapsed = collapse_whitespace(line);
        if collapsed.is_empty() {
            if !lines.is_empty() {
                paragraphs.push(lines.join("\n"));
                lines.clear();
            }
        } else {
            lines.push(collapsed);
        }
    }
    if !lines.is_empty() {
        paragraphs.push(lines.join("\n"));
    }

    paragraphs.join("\n\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            // Source line breaks are layout-insignificant
            for ch in text.chars() {
                out.push(if ch == '\n' || ch == '\r' { ' ' } else { ch });
            }
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if NON_RENDERED_TAGS.contains(&name) {
                continue;
            }
            if name == "br" {
                out.push('\n');
                continue;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push_str("\n\n");
            }
            collect_text(child_element, out);
            if block {
                out.push_str("\n\n");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_main_content() {
        let html = r#"<html><body><nav>Menu Home</nav><main><h1>Deep Learning</h1>
            <p>Neural   networks
            are layered.</p><script>var x = 1;</script><p>Second<br>line</p></main></body></html>"#;
        let text = extract_page_content(html, None);
        assert_eq!(text, "Deep Learning\n\nNeural networks are layered.\n\nSecond\nline");
    }

    #[test]
    fn test_falls_back_to_body() {
        let html = "<html><body><div>One</div><div>Two <b>bold</b></div></body></html>";
        assert_eq!(extract_page_content(html, None), "One\n\nTwo bold");
    }

    #[test]
    fn test_patent_url_detection() {
        assert!(is_google_patents_url("https://patents.google.com/patent/US1234567A/en"));
        assert!(!is_google_patents_url("https://patents.google.com/?q=widget"));
        assert!(!is_google_patents_url("https://example.com/patent/US1"));
        assert!(!is_google_patents_url("not a url"));
    }

    #[test]
    fn test_patent_extraction() {
        let html = r#"<html><body>
            <h1 id="title">Widget assembly</h1>
            <section id="abstract"><patent-text>A widget is   described.</patent-text></section>
            <section id="claims"><patent-text>1. A widget.</patent-text><patent-text>2. The widget of claim 1.</patent-text></section>
            <section id="description"><patent-text>Background.</patent-text></section>
            </body></html>"#;
        let text = extract_page_content(html, Some("https://patents.google.com/patent/US1/en"));
        assert_eq!(
            text,
            "TITLE:\nWidget assembly\n\n\nABSTRACT:\nA widget is described.\n\n\nCLAIMS:\n1. A widget.\n\n2. The widget of claim 1.\n\n\nDESCRIPTION:\nBackground."
        );
    }

    #[test]
    fn test_empty_patent_page() {
        let text = extract_page_content("<html><body></body></html>", Some("https://patents.google.com/patent/X"));
        assert_eq!(text, "No patent content found");
    }
}
