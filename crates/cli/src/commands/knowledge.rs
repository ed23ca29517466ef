//! Knowledge command handler.
//!
//! Manages the enterprise document base used by `search_documents`.

use advisor_core::config::AppConfig;
use advisor_knowledge::{KnowledgeBase, SearchOutcome};
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Knowledge base management
#[derive(Args, Debug)]
pub struct KnowledgeCommand {
    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Ingest a file or every supported file below a folder
    Ingest(KnowledgeIngestCommand),
    /// Rank passages for a query
    Search(KnowledgeSearchCommand),
    /// Show knowledge base statistics
    Stats(KnowledgeStatsCommand),
    /// Delete the knowledge base index
    Clean(KnowledgeCleanCommand),
}

/// Base selection shared by every knowledge subcommand
#[derive(Args, Debug)]
pub struct BaseArg {
    /// Knowledge base name (default: knowledge.base from config)
    #[arg(short, long)]
    pub base: Option<String>,
}

impl BaseArg {
    fn resolve<'a>(&'a self, config: &'a AppConfig) -> &'a str {
        self.base.as_deref().unwrap_or(&config.knowledge.base)
    }
}

async fn open(config: &AppConfig, base: &str) -> anyhow::Result<KnowledgeBase> {
    Ok(KnowledgeBase::open(&config.workspace, base, config.provider_endpoint()).await?)
}

#[derive(Args, Debug)]
pub struct KnowledgeIngestCommand {
    /// File or folder to ingest
    pub path: PathBuf,

    #[command(flatten)]
    pub base: BaseArg,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeIngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let base = self.base.resolve(config);
        tracing::info!("Ingesting {:?} into '{}'", self.path, base);

        let kb = open(config, base).await?;
        let stats = kb.indexer.ingest_path(&self.path).await?;

        if self.json {
            let output = serde_json::json!({
                "base": base,
                "sourcesCount": stats.sources,
                "chunksCount": stats.chunks,
                "failures": stats.failures,
                "bytesProcessed": stats.bytes_processed,
                "durationSecs": stats.duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Ingested {} sources ({} chunks, {} failures, {} bytes) in {:.2}s",
                stats.sources,
                stats.chunks,
                stats.failures,
                stats.bytes_processed,
                stats.duration_secs
            );
        }

        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct KnowledgeSearchCommand {
    /// Query text
    pub query: String,

    #[command(flatten)]
    pub base: BaseArg,

    /// Number of passages to return (default: topK of the base)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeSearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let kb = open(config, self.base.resolve(config)).await?;
        let top_k = self.top_k.unwrap_or_else(|| kb.retriever.default_top_k());
        let outcome = kb.retriever.search(&self.query, top_k).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            return Ok(());
        }

        match outcome {
            SearchOutcome::Found { results } => {
                for result in results {
                    println!(
                        "{}. [{}] score {:.3}",
                        result.rank,
                        result.chunk.id(),
                        result.relevance_score
                    );
                    println!("   {}", preview(&result.chunk.text, 160));
                }
            }
            SearchOutcome::NoResults { reason } => println!("No results: {}", reason),
        }

        Ok(())
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max_chars {
        format!("{}...", flat.chars().take(max_chars).collect::<String>())
    } else {
        flat
    }
}

#[derive(Args, Debug)]
pub struct KnowledgeStatsCommand {
    #[command(flatten)]
    pub base: BaseArg,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeStatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let kb = open(config, self.base.resolve(config)).await?;
        let stats = kb.stats(&config.workspace)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("Knowledge base: {}", stats.base_name);
            println!("  Sources: {}", stats.sources_count);
            println!("  Chunks: {}", stats.chunks_count);
            println!("  DB size: {} bytes", stats.db_size_bytes);
            if let Some(at) = stats.last_ingested_at {
                println!("  Last ingested: {}", at);
            }
        }

        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct KnowledgeCleanCommand {
    #[command(flatten)]
    pub base: BaseArg,
}

impl KnowledgeCleanCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let base = self.base.resolve(config);
        advisor_knowledge::clean(&config.workspace, base)?;
        println!("Knowledge base '{}' cleaned", base);
        Ok(())
    }
}

impl KnowledgeCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        match &self.action {
            KnowledgeAction::Ingest(cmd) => cmd.execute(config).await,
            KnowledgeAction::Search(cmd) => cmd.execute(config).await,
            KnowledgeAction::Stats(cmd) => cmd.execute(config).await,
            KnowledgeAction::Clean(cmd) => cmd.execute(config).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_flattens_and_truncates() {
        assert_eq!(preview("a\n\n b   c", 10), "a b c");
        assert_eq!(preview("abcdefghij", 4), "abcd...");
    }
}
