use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::color::{ConceptColorMap, Rgb, DEFAULT_HIGHLIGHT_COLOR};
use crate::error::{ErrorContext, HighlighterError, HighlighterResult};
use crate::logging::LoggingConfig;

/// A user-defined concept and the color its highlights are drawn in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Concept {
    pub text: String,
    pub color: Rgb,
}

impl Concept {
    pub fn new(text: impl Into<String>, color: Rgb) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }
}

/// Concepts were once stored as bare strings; both shapes are accepted.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredConcept {
    Plain(String),
    Colored { text: String, color: Option<Rgb> },
}

impl From<StoredConcept> for Concept {
    fn from(stored: StoredConcept) -> Self {
        match stored {
            StoredConcept::Plain(text) => {
                let color = Rgb::palette_for(&text);
                Concept { text, color }
            }
            StoredConcept::Colored { text, color } => {
                let color = color.unwrap_or_else(|| Rgb::palette_for(&text));
                Concept { text, color }
            }
        }
    }
}

impl<'de> Deserialize<'de> for Concept {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        StoredConcept::deserialize(deserializer).map(Concept::from)
    }
}

/// User settings for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: String,
    pub enabled: bool,
    pub auto_analyze: bool,
    pub highlight_color: Rgb,
    pub concepts: Vec<Concept>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            enabled: false,
            auto_analyze: true,
            highlight_color: DEFAULT_HIGHLIGHT_COLOR,
            concepts: Vec::new(),
        }
    }
}

impl Settings {
    /// Trim concept labels, drop blank ones and keep the first of each label.
    pub fn normalize_concepts(&mut self) {
        let mut seen = Vec::<String>::new();
        self.concepts = std::mem::take(&mut self.concepts)
            .into_iter()
            .filter_map(|mut concept| {
                concept.text = concept.text.trim().to_string();
                if concept.text.is_empty() || seen.contains(&concept.text) {
                    return None;
                }
                seen.push(concept.text.clone());
                Some(concept)
            })
            .collect();
    }

    /// Concept labels in configured order
    pub fn concept_texts(&self) -> Vec<String> {
        self.concepts.iter().map(|c| c.text.clone()).collect()
    }

    /// Case-insensitive label → color map; unknown labels get `highlight_color`
    pub fn color_map(&self) -> ConceptColorMap {
        self.concepts
            .iter()
            .map(|c| (c.text.as_str(), c.color))
            .collect::<ConceptColorMap>()
            .with_fallback(self.highlight_color)
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Error when an analysis cannot be attempted with these settings
    pub fn ensure_configured(&self) -> HighlighterResult<()> {
        if !self.has_api_key() {
            return Err(HighlighterError::configuration("API key not configured"));
        }
        if self.concepts.is_empty() {
            return Err(HighlighterError::configuration("No concepts configured"));
        }
        Ok(())
    }

    /// Override with environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("HIGHLIGHTER_API_KEY") {
            if !key.trim().is_empty() {
                debug!("Using API key from HIGHLIGHTER_API_KEY");
                self.api_key = key.trim().to_string();
            }
        }

        if let Ok(enabled) = std::env::var("HIGHLIGHTER_ENABLED") {
            self.enabled = enabled.to_lowercase() == "true";
        }
    }
}

/// Settings for the Gemini-backed analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub model: String,
    pub base_url: String,
    /// Pause between consecutive chunk requests
    pub chunk_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash-latest".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            chunk_delay_ms: 1000,
            request_timeout_secs: 60,
        }
    }
}

/// Everything stored in `highlighter.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlighterConfig {
    pub settings: Settings,
    pub analyzer: AnalyzerConfig,
    pub logging: LoggingConfig,
}

impl HighlighterConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> HighlighterResult<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let content = std::fs::read_to_string(path.as_ref()).with_path(&path_str)?;

        let mut config: HighlighterConfig = toml::from_str(&content)
            .map_err(|e| HighlighterError::configuration(format!("Failed to parse config file {}: {}", path_str, e)))?;
        config.settings.normalize_concepts();

        info!("⚙️ Loaded config from {} ({} concepts)", path_str, config.settings.concepts.len());
        Ok(config)
    }

    /// Load the file when it exists, otherwise start from defaults; then
    /// apply environment overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> HighlighterResult<Self> {
        let mut config = if path.as_ref().exists() {
            Self::load_from_file(path)?
        } else {
            debug!("No config at {}, using defaults", path.as_ref().display());
            Self::default()
        };
        config.settings.apply_env_overrides();
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> HighlighterResult<()> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let content = toml::to_string_pretty(self)
            .map_err(|e| HighlighterError::configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), content).with_path(&path_str)?;

        Ok(())
    }
}
