//! Ask command handler.
//!
//! Runs one question through the orchestrator and prints the approved (or
//! unapproved) answer with its citations.

use super::read_input;
use advisor_core::config::AppConfig;
use advisor_orchestrator::{AdvisorContext, EntryOutcome, OrchestrationOutcome};
use clap::Args;
use std::path::PathBuf;

/// Ask the advisor assistant a question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "query")]
    pub file: Option<PathBuf>,

    /// Conversation id; prior turns of the session are passed as context
    #[arg(long)]
    pub session: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Include the orchestration trace
    #[arg(long)]
    pub trace: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let query = read_input(self.query.as_deref(), self.file.as_ref(), "question")?;
        tracing::info!("Executing ask command");

        let context = AdvisorContext::build(config).await?;
        let outcome = context.ask(self.session.as_deref(), &query).await?;

        if self.json {
            let mut output = serde_json::json!({
                "queryId": outcome.query_id,
                "state": outcome.state,
                "response": outcome.response,
                "citations": outcome.citations,
                "complianceApproved": outcome.compliance_approved,
                "outstandingFindings": outcome.outstanding,
                "revisions": outcome.revisions,
            });
            if self.trace {
                output["trace"] = serde_json::to_value(&outcome.trace)?;
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_outcome(&outcome, self.trace);
        }

        Ok(())
    }
}

fn print_outcome(outcome: &OrchestrationOutcome, with_trace: bool) {
    println!("{}", outcome.response);

    if !outcome.citations.is_empty() {
        println!();
        println!("Sources:");
        for citation in &outcome.citations {
            println!("- {}", citation);
        }
    }

    if !outcome.compliance_approved {
        println!();
        println!(
            "Compliance: NOT APPROVED after {} revisions",
            outcome.revisions
        );
        for finding in &outcome.outstanding {
            println!("  [{}] {}", finding.rule_id, finding.message);
        }
    }

    if with_trace {
        println!();
        println!("Trace ({}):", outcome.query_id);
        for entry in &outcome.trace.entries {
            let status = match &entry.outcome {
                EntryOutcome::Succeeded => "ok".to_string(),
                EntryOutcome::NoResults { reason } => format!("no results: {}", reason),
                EntryOutcome::Rejected { code, reason } => format!("skipped [{}]: {}", code, reason),
                EntryOutcome::TimedOut { timeout_secs } => format!("timed out after {}s", timeout_secs),
                EntryOutcome::Failed { code, message } => format!("failed [{}]: {}", code, message),
            };
            println!(
                "  {} {} ({}ms, {} attempts) {}",
                entry.capability, entry.input, entry.latency_ms, entry.attempts, status
            );
        }
        let states: Vec<String> = outcome
            .trace
            .transitions
            .iter()
            .map(|t| t.to.to_string())
            .collect();
        println!("  states: routing -> {}", states.join(" -> "));
    }
}
