use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analysis::ConceptAnalyzer;
use crate::chunker::{self, SmartChunker};
use crate::config::HighlighterConfig;
use crate::document::Document;
use crate::gemini::GeminiClient;
use crate::highlighter::Highlighter;
use crate::pipeline::{Page, PageAnalyzer, PageOutcome};

fn page_analyzer(config: &HighlighterConfig) -> Result<PageAnalyzer<GeminiClient>> {
    let client = GeminiClient::new(config.settings.api_key.clone(), &config.analyzer)?;
    Ok(PageAnalyzer::new(ConceptAnalyzer::new(client, &config.analyzer)))
}

/// `page.html` → `page_<suffix>.html` next to the input
fn default_output(input: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("page");
    input.with_file_name(format!("{}_{}.html", stem, suffix))
}

async fn read_html(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(anyhow::anyhow!("HTML file not found: {:?}", path));
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))
}

/// Analyze a saved page and write it back with highlight markers
pub async fn highlight_command(
    html_path: PathBuf,
    url: Option<String>,
    output: Option<PathBuf>,
    config: &HighlighterConfig,
) -> Result<()> {
    info!("🔍 Highlighting concepts in {:?}", html_path);
    let html = read_html(&html_path).await?;
    let mut page = Page::parse(&html, url.as_deref());

    let analyzer = page_analyzer(config)?;
    let outcome = analyzer.analyze_page(&mut page, &config.settings).await?;
    println!("{}", outcome.message());

    if let PageOutcome::Highlighted { .. } = outcome {
        for applied in page.highlighter.applied() {
            println!(
                "  {} [{}] {} → {} marker(s)",
                applied.color,
                applied.highlight.relevance,
                applied.highlight.text,
                applied.markers
            );
        }

        let output_path = output.unwrap_or_else(|| default_output(&html_path, "highlighted"));
        tokio::fs::write(&output_path, page.to_html()).await?;
        info!("📝 Highlighted page saved to: {:?}", output_path);
    }

    Ok(())
}

/// Strip every highlight marker from a page
pub async fn clear_command(html_path: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let html = read_html(&html_path).await?;
    let mut document = Document::parse(&html);
    let removed = Highlighter::new().clear(&mut document);

    let output_path = output.unwrap_or_else(|| html_path.clone());
    tokio::fs::write(&output_path, document.to_html()).await?;
    println!("🧹 Removed {} highlights, saved to {:?}", removed, output_path);
    Ok(())
}

pub async fn summarize_command(html_path: PathBuf, url: Option<String>, config: &HighlighterConfig) -> Result<()> {
    let html = read_html(&html_path).await?;
    let page = Page::parse(&html, url.as_deref());

    let analyzer = page_analyzer(config)?;
    let summary = analyzer.summarize_page(&page, &config.settings).await?;
    println!("{}", summary);
    Ok(())
}

/// Print the chunks a text file would be split into
pub async fn chunk_command(file: PathBuf, max_size: Option<usize>) -> Result<()> {
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;

    let max_size = max_size.unwrap_or_else(|| chunker::max_content_length(&content));
    let needs_chunking = chunker::needs_chunking(&content);
    let chunks = SmartChunker::new(max_size).chunk(&content);

    println!(
        "📄 {} chars, limit {} (chunking {}), {} chunk(s)",
        content.chars().count(),
        max_size,
        if needs_chunking { "required" } else { "not required" },
        chunks.len()
    );
    for (index, chunk) in chunks.iter().enumerate() {
        println!("\n--- chunk {} ({} chars) ---\n{}", index + 1, chunk.chars().count(), chunk);
    }
    Ok(())
}

pub async fn validate_key_command(config: &HighlighterConfig) -> Result<()> {
    let client = GeminiClient::new(config.settings.api_key.clone(), &config.analyzer)?;
    match client.validate_api_key().await {
        Ok(()) => {
            println!("✅ API key is valid");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(e.user_message())),
    }
}

/// Write a default config file unless one already exists
pub fn config_init_command(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(anyhow::anyhow!("Config file already exists: {:?}", path));
    }
    HighlighterConfig::default().save_to_file(path)?;
    println!("⚙️ Wrote default config to {:?}", path);
    Ok(())
}

pub fn config_show_command(config: &HighlighterConfig) -> Result<()> {
    let mut shown = config.clone();
    if shown.settings.has_api_key() {
        shown.settings.api_key = "********".to_string();
    }
    let rendered = toml::to_string_pretty(&shown).context("Failed to render config")?;
    println!("{}", rendered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_output_path() {
        let output = default_output(Path::new("/tmp/pages/article.html"), "highlighted");
        assert_eq!(output, PathBuf::from("/tmp/pages/article_highlighted.html"));
    }

    #[tokio::test]
    async fn test_clear_command_strips_markers() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("page.html");
        std::fs::write(
            &input,
            r#"<html><head></head><body><p><span class="ai-concept-highlight" data-concepts="AI">Machine learning</span> is powerful</p></body></html>"#,
        )
        .unwrap();

        let output = dir.path().join("clean.html");
        clear_command(input, Some(output.clone())).await.unwrap();
        let cleaned = std::fs::read_to_string(output).unwrap();
        assert!(cleaned.contains("<p>Machine learning is powerful</p>"));
        assert!(!cleaned.contains("ai-concept-highlight"));
    }

    #[test]
    fn test_config_init_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("highlighter.toml");
        config_init_command(&path).unwrap();
        assert!(HighlighterConfig::load_from_file(&path).is_ok());
        assert!(config_init_command(&path).is_err());
    }
}
