//! Check command handler.
//!
//! Runs the compliance battery over a draft without orchestrating anything.

use super::read_input;
use advisor_compliance::{ComplianceValidator, Severity};
use advisor_core::config::AppConfig;
use clap::Args;
use std::path::PathBuf;

/// Validate a draft answer against the compliance rules
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Draft text
    pub draft: Option<String>,

    /// Read the draft from a file
    #[arg(short, long, conflicts_with = "draft")]
    pub file: Option<PathBuf>,

    /// The question the draft answers
    #[arg(short, long)]
    pub query: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CheckCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let draft = read_input(self.draft.as_deref(), self.file.as_ref(), "draft")?;
        let validator = ComplianceValidator::from_settings(&config.compliance)?;
        let report = validator.validate(&draft, &self.query);

        if self.json {
            let output = serde_json::json!({
                "approved": report.is_approved(),
                "findings": report.findings,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        for finding in &report.findings {
            let label = match finding.severity {
                Severity::Pass => "PASS",
                Severity::Fail => "FAIL",
            };
            println!("{} {}: {}", label, finding.rule_id, finding.message);
            if let Some(fix) = &finding.suggested_fix {
                println!("     fix: {}", fix);
            }
        }
        println!();
        println!(
            "{}",
            if report.is_approved() {
                "APPROVED"
            } else {
                "NOT APPROVED"
            }
        );

        Ok(())
    }
}
