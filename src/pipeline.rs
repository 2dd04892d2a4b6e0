use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::analysis::ConceptAnalyzer;
use crate::config::Settings;
use crate::document::Document;
use crate::error::{HighlighterError, HighlighterResult};
use crate::extract::extract_page_content;
use crate::gemini::LanguageModel;
use crate::highlighter::Highlighter;

/// Pages with less extracted text than this are not analyzed
pub const MIN_CONTENT_CHARS: usize = 50;

/// A loaded page: its node tree, where it came from and its markers
#[derive(Debug)]
pub struct Page {
    pub document: Document,
    pub url: Option<String>,
    pub highlighter: Highlighter,
}

impl Page {
    pub fn new(document: Document, url: Option<String>) -> Self {
        Self {
            document,
            url,
            highlighter: Highlighter::new(),
        }
    }

    pub fn parse(html: &str, url: Option<&str>) -> Self {
        Self::new(Document::parse(html), url.map(str::to_string))
    }

    /// Text that would be sent for analysis
    pub fn content(&self) -> String {
        extract_page_content(&self.document.to_html(), self.url.as_deref())
    }

    /// Remove all markers and release the nodes they detached. Node ids
    /// held across this call are invalidated.
    pub fn clear_highlights(&mut self) -> usize {
        let removed = self.highlighter.clear(&mut self.document);
        let freed = self.document.compact();
        if freed > 0 {
            debug!(freed, "🧹 Compacted page document");
        }
        removed
    }

    pub fn to_html(&self) -> String {
        self.document.to_html()
    }
}

/// What happened to a page analysis request
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// Another analysis was still running
    Busy,
    Disabled,
    NotConfigured { message: String },
    ContentTooShort { length: usize },
    NoMatches { concepts_found: Vec<String> },
    Highlighted {
        applied: usize,
        highlights: usize,
        concepts_found: Vec<String>,
    },
}

impl PageOutcome {
    /// Notification text for the user
    pub fn message(&self) -> String {
        match self {
            PageOutcome::Busy => "Analysis already in progress".to_string(),
            PageOutcome::Disabled => "Concept highlighting is disabled".to_string(),
            PageOutcome::NotConfigured { message } => format!("Please configure settings first: {}", message),
            PageOutcome::ContentTooShort { .. } => "Not enough content to analyze".to_string(),
            PageOutcome::NoMatches { .. } => "No relevant content found for your concepts".to_string(),
            PageOutcome::Highlighted {
                highlights,
                concepts_found,
                ..
            } => format!("Found {} highlights for {} concepts", highlights, concepts_found.len()),
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Extract → analyze → highlight, one page at a time
pub struct PageAnalyzer<M> {
    analyzer: ConceptAnalyzer<M>,
    in_flight: AtomicBool,
}

impl<M: LanguageModel> PageAnalyzer<M> {
    pub fn new(analyzer: ConceptAnalyzer<M>) -> Self {
        Self {
            analyzer,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn analyzer(&self) -> &ConceptAnalyzer<M> {
        &self.analyzer
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn analyze_page(&self, page: &mut Page, settings: &Settings) -> HighlighterResult<PageOutcome> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            warn!("⏳ Analysis already in progress, ignoring request");
            return Ok(PageOutcome::Busy);
        };

        if !settings.enabled {
            return Ok(PageOutcome::Disabled);
        }
        if let Err(e) = settings.ensure_configured() {
            let message = match e {
                HighlighterError::Configuration { message } => message,
                other => other.to_string(),
            };
            return Ok(PageOutcome::NotConfigured { message });
        }

        let content = page.content();
        let length = content.chars().count();
        if length < MIN_CONTENT_CHARS {
            info!(length, "📄 Not enough content to analyze");
            return Ok(PageOutcome::ContentTooShort { length });
        }

        let result = self.analyzer.analyze(&content, &settings.concept_texts()).await?;
        page.clear_highlights();
        if result.is_empty() {
            return Ok(PageOutcome::NoMatches {
                concepts_found: result.concepts_found,
            });
        }

        let applied = page
            .highlighter
            .apply(&mut page.document, &result.highlights, &settings.color_map());
        let outcome = PageOutcome::Highlighted {
            applied,
            highlights: result.highlights.len(),
            concepts_found: result.concepts_found,
        };
        info!("✨ {}", outcome.message());
        Ok(outcome)
    }

    /// Summary of the page focused on the configured concepts
    pub async fn summarize_page(&self, page: &Page, settings: &Settings) -> HighlighterResult<String> {
        if !settings.has_api_key() {
            return Err(HighlighterError::configuration("API key not configured"));
        }

        let content = page.content();
        if content.chars().count() < MIN_CONTENT_CHARS {
            return Err(HighlighterError::invalid_input("Not enough content to summarize"));
        }

        self.analyzer.summarize(&content, &settings.concept_texts()).await
    }
}
