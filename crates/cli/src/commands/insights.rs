//! Insights command handler.
//!
//! Runs a structured tabular query directly against the customer dataset.

use super::read_input;
use advisor_core::config::AppConfig;
use advisor_insights::{Dataset, InsightsEngine};
use anyhow::{anyhow, Context};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

/// Query the customer dataset with a JSON query spec
#[derive(Args, Debug)]
pub struct InsightsCommand {
    /// Query spec, e.g. '{"operation":{"kind":"describe"}}'
    pub spec: Option<String>,

    /// Read the query spec from a file
    #[arg(short, long, conflicts_with = "spec")]
    pub file: Option<PathBuf>,

    /// Dataset file (default: insights.datasetPath from config)
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Maximum rows to print in table output
    #[arg(long, default_value = "20")]
    pub max_rows: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl InsightsCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let raw = read_input(self.spec.as_deref(), self.file.as_ref(), "query spec")?;
        let spec: serde_json::Value =
            serde_json::from_str(&raw).context("Query spec is not valid JSON")?;

        let path = self
            .dataset
            .clone()
            .or_else(|| config.dataset_path())
            .ok_or_else(|| anyhow!("No dataset configured; set insights.datasetPath or --dataset"))?;
        let dataset = Dataset::load(&path)?;
        let engine = InsightsEngine::new(Arc::new(dataset));

        let result = engine.query_value(&spec)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            println!("{} [{}]", result.summary, result.query_id);
            println!();
            println!("{}", result.to_markdown(self.max_rows));
        }

        Ok(())
    }
}
