use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::chunker::{self, SmartChunker};
use crate::config::AnalyzerConfig;
use crate::error::{HighlighterError, HighlighterResult};
use crate::gemini::{GenerationRequest, LanguageModel};
use crate::highlighter::{Highlight, Relevance, DEFAULT_EXPLANATION};
use crate::log_error;
use crate::logging::PerformanceTimer;

/// Longest highlight text accepted from the model
pub const MAX_HIGHLIGHT_TEXT_CHARS: usize = 200;

/// Highlights kept from a single response
pub const MAX_HIGHLIGHTS_PER_RESPONSE: usize = 20;

/// Highlights kept after merging all chunk responses
pub const MAX_MERGED_HIGHLIGHTS: usize = 50;

/// `conceptsFound` entries kept from a single response
pub const MAX_CONCEPTS_FOUND: usize = 10;

/// Content sent for a summary is cut to this many characters
pub const MAX_SUMMARY_CONTENT_CHARS: usize = 6000;

const ANALYSIS_TEMPERATURE: f32 = 0.1;
const ANALYSIS_MAX_TOKENS: u32 = 2048;
const SUMMARY_TEMPERATURE: f32 = 0.3;
const SUMMARY_MAX_TOKENS: u32 = 1024;

const RELEVANCE_GUIDELINES: &str = "\
Relevance scoring guidelines:
- HIGH: Direct mentions, key definitions, core examples, primary focus areas
- MEDIUM: Related discussions, supporting examples, indirect references
- LOW: Tangential mentions, background context, minor connections";

const RESPONSE_SHAPE: &str = r#"Return the response as a JSON object with this structure:
{
  "highlights": [
    {
      "text": "exact text to highlight",
      "concepts": ["related concept 1", "related concept 2"],
      "explanation": "brief explanation",
      "relevance": "high|medium|low"
    }
  ],
  "conceptsFound": ["concept1", "concept2"]
}"#;

/// Validated outcome of one or more analysis requests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResult {
    pub highlights: Vec<Highlight>,
    pub concepts_found: Vec<String>,
}

impl AnalysisResult {
    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawHighlight {
    text: String,
    #[serde(default)]
    concepts: Vec<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    relevance: Option<String>,
}

impl RawHighlight {
    fn into_highlight(self) -> Option<Highlight> {
        let text_chars = self.text.chars().count();
        if self.text.trim().is_empty() || text_chars > MAX_HIGHLIGHT_TEXT_CHARS {
            return None;
        }

        let concepts: Vec<String> = self
            .concepts
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if concepts.is_empty() {
            return None;
        }

        let relevance = self
            .relevance
            .as_deref()
            .map(Relevance::parse_lenient)
            .unwrap_or_default();
        let explanation = self
            .explanation
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string());

        Some(Highlight::new(self.text, concepts, relevance).with_explanation(explanation))
    }
}

/// Slice from the first `{` to the last `}` of a free-text response.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse and validate a model response. Never fails: anything that cannot
/// be read degrades to an empty result.
pub fn parse_analysis_response(text: &str) -> AnalysisResult {
    let Some(json) = extract_json_object(text) else {
        warn!("⚠️ No JSON found in model response");
        return AnalysisResult::default();
    };

    let value: serde_json::Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "⚠️ Failed to parse model response JSON");
            return AnalysisResult::default();
        }
    };

    let raw_highlights = value
        .get("highlights")
        .and_then(|h| h.as_array())
        .cloned()
        .unwrap_or_default();
    let original_count = raw_highlights.len();

    let highlights: Vec<Highlight> = raw_highlights
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawHighlight>(item).ok())
        .filter_map(RawHighlight::into_highlight)
        .take(MAX_HIGHLIGHTS_PER_RESPONSE)
        .collect();

    let concepts_found: Vec<String> = value
        .get("conceptsFound")
        .and_then(|c| c.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|c| c.as_str())
                .filter(|c| !c.trim().is_empty())
                .map(str::to_string)
                .take(MAX_CONCEPTS_FOUND)
                .collect()
        })
        .unwrap_or_default();

    debug!(
        original_highlights = original_count,
        kept_highlights = highlights.len(),
        concepts_found = concepts_found.len(),
        "🧹 Validated model response"
    );

    AnalysisResult {
        highlights,
        concepts_found,
    }
}

/// Prompt for a whole document that fits in one request
pub fn analysis_prompt(content: &str, concepts: &[String]) -> String {
    format!(
        "Analyze the following text and identify segments that are related to these concepts: {concepts}.

For each relevant text segment, provide:
1. The exact text that should be highlighted (keep it concise, max 100 characters)
2. Which concept(s) it relates to
3. A brief explanation of the relevance
4. A relevance score: \"high\", \"medium\", or \"low\"

{RELEVANCE_GUIDELINES}

Important guidelines:
- Only highlight text that is directly and clearly related to the concepts
- Avoid highlighting common words or phrases unless they're specifically relevant
- Prefer shorter, more specific text segments over long paragraphs
- Maximum 20 highlights per analysis
- Be precise with relevance scoring

{RESPONSE_SHAPE}

Text to analyze:
{content}",
        concepts = concepts.join(", "),
    )
}

/// Prompt for one chunk of a larger document (`chunk_number` is 1-based)
pub fn chunk_prompt(chunk: &str, concepts: &[String], chunk_number: usize) -> String {
    format!(
        "Analyze the following text chunk and identify segments that are related to these concepts: {concepts}.

This is chunk {chunk_number} of a larger document. Focus on finding relevant content within this section.

For each relevant text segment, provide:
1. The exact text that should be highlighted (keep it concise, max 100 characters)
2. Which concept(s) it relates to
3. A brief explanation of the relevance
4. A relevance score: \"high\", \"medium\", or \"low\"

{RELEVANCE_GUIDELINES}

Important guidelines:
- Only highlight text that is directly and clearly related to the concepts
- Prefer shorter, more specific text segments over long paragraphs
- Avoid highlighting common words or phrases unless they're specifically relevant
- Maximum 15 highlights per chunk
- Be precise with relevance scoring

{RESPONSE_SHAPE}

Text chunk to analyze:
{chunk}",
        concepts = concepts.join(", "),
    )
}

/// Prompt for a page summary, focused on `concepts` when any are given
pub fn summary_prompt(content: &str, concepts: &[String]) -> String {
    let content = truncate_for_summary(content);
    if concepts.is_empty() {
        format!(
            "Please provide a comprehensive summary of the following text.

Instructions:
1. Create a clear, well-structured summary (200-300 words)
2. Identify and highlight the main topics, key points, and important details
3. Use clear, engaging language that's easy to understand
4. Structure the summary with clear paragraphs
5. Focus on the most important and relevant information

Text to summarize:
{content}"
        )
    } else {
        let concepts = concepts.join(", ");
        format!(
            "Please provide a comprehensive summary of the following text with special focus on these concepts: {concepts}.

Instructions:
1. Create a clear, well-structured summary (200-300 words)
2. Pay special attention to content related to: {concepts}
3. Highlight key points, main ideas, and important details
4. If the concepts appear in the text, explain their context and significance
5. Use clear, engaging language that's easy to understand
6. Structure the summary with clear paragraphs

Text to summarize:
{content}"
        )
    }
}

fn truncate_for_summary(content: &str) -> String {
    match content.char_indices().nth(MAX_SUMMARY_CONTENT_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Runs concept analysis and summaries against a language model
pub struct ConceptAnalyzer<M> {
    model: M,
    chunk_delay: Duration,
}

impl<M: LanguageModel> ConceptAnalyzer<M> {
    pub fn new(model: M, config: &AnalyzerConfig) -> Self {
        Self {
            model,
            chunk_delay: Duration::from_millis(config.chunk_delay_ms),
        }
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Find passages related to `concepts`. Content over the size limit is
    /// chunked and analyzed one request at a time.
    pub async fn analyze(&self, content: &str, concepts: &[String]) -> HighlighterResult<AnalysisResult> {
        if content.trim().is_empty() {
            return Err(HighlighterError::invalid_input("Invalid content provided for analysis"));
        }
        if concepts.is_empty() {
            return Err(HighlighterError::invalid_input("No concepts provided for analysis"));
        }

        let timer = PerformanceTimer::start("concept analysis");
        let max_length = chunker::max_content_length(content);
        let content_chars = content.chars().count();
        info!(
            content_chars,
            max_length,
            patent = chunker::is_patent_content(content),
            concepts = %concepts.join(", "),
            "🤖 Starting concept analysis"
        );

        if content_chars > max_length {
            info!("📄 Content too large, splitting into multiple queries");
            return self.analyze_chunked(content, concepts, max_length).await;
        }

        let request = GenerationRequest::new(analysis_prompt(content, concepts), ANALYSIS_TEMPERATURE, ANALYSIS_MAX_TOKENS);
        let response = self.model.generate(&request).await?;
        timer.checkpoint("model response");
        let result = parse_analysis_response(&response);
        info!("✅ Analysis found {} highlights", result.highlights.len());
        Ok(result)
    }

    async fn analyze_chunked(
        &self,
        content: &str,
        concepts: &[String],
        max_chunk_size: usize,
    ) -> HighlighterResult<AnalysisResult> {
        let chunks = SmartChunker::new(max_chunk_size).chunk(content);
        info!("📊 Split content into {} chunks", chunks.len());

        let mut highlights = Vec::new();
        let mut concepts_found = Vec::new();
        let mut seen_concepts = HashSet::new();

        for (index, chunk) in chunks.iter().enumerate() {
            let chunk_number = index + 1;
            info!(
                "🔍 Processing chunk {}/{} ({} chars)",
                chunk_number,
                chunks.len(),
                chunk.chars().count()
            );

            let request = GenerationRequest::new(
                chunk_prompt(chunk, concepts, chunk_number),
                ANALYSIS_TEMPERATURE,
                ANALYSIS_MAX_TOKENS,
            );
            match self.model.generate(&request).await {
                Ok(response) => {
                    let result = parse_analysis_response(&response);
                    debug!("✅ Chunk {}: {} highlights", chunk_number, result.highlights.len());
                    highlights.extend(result.highlights);
                    for concept in result.concepts_found {
                        if seen_concepts.insert(concept.clone()) {
                            concepts_found.push(concept);
                        }
                    }
                }
                Err(e) => {
                    log_error!(e, format!("chunk {}", chunk_number).as_str());
                }
            }

            if chunk_number < chunks.len() && !self.chunk_delay.is_zero() {
                debug!("⏳ Waiting {:?} before next chunk", self.chunk_delay);
                tokio::time::sleep(self.chunk_delay).await;
            }
        }

        highlights.truncate(MAX_MERGED_HIGHLIGHTS);
        info!("✅ Chunked analysis complete: {} highlights", highlights.len());

        Ok(AnalysisResult {
            highlights,
            concepts_found,
        })
    }

    /// Summarize the page, focusing on `concepts` when given.
    pub async fn summarize(&self, content: &str, concepts: &[String]) -> HighlighterResult<String> {
        if content.trim().is_empty() {
            return Err(HighlighterError::invalid_input("Invalid content provided for summary"));
        }

        let _timer = PerformanceTimer::start("page summary");
        let request = GenerationRequest::new(summary_prompt(content, concepts), SUMMARY_TEMPERATURE, SUMMARY_MAX_TOKENS);
        let summary = self.model.generate(&request).await?;
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(HighlighterError::invalid_response("Empty summary from Gemini API"));
        }
        Ok(summary.to_string())
    }
}
