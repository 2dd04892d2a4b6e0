// Public module exports for the binary crate
pub mod analysis;
pub mod chunker;
pub mod cli;
pub mod color;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod gemini;
pub mod highlighter;
pub mod logging;
pub mod pipeline;

pub use analysis::{AnalysisResult, ConceptAnalyzer};
pub use chunker::{chunk, SmartChunker};
pub use color::{lighten, ConceptColorMap, Rgb};
pub use config::{AnalyzerConfig, Concept, HighlighterConfig, Settings};
pub use document::{Document, NodeId};
pub use error::{HighlighterError, HighlighterResult};
pub use gemini::{GeminiClient, GenerationRequest, LanguageModel};
pub use highlighter::{Highlight, Highlighter, Relevance};
pub use pipeline::{Page, PageAnalyzer, PageOutcome};
