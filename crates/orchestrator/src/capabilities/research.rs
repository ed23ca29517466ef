use crate::evidence::{CapabilityOutput, EvidenceItem};
use crate::registry::{Capability, CapabilityDescriptor, ParamKind, ParamSpec};
use advisor_core::{AppError, AppResult};
use advisor_llm::{LlmClient, LlmRequest};
use advisor_prompt::{build_prompt, load_prompt, PromptDefinition, RESEARCH_PROMPT_ID};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;

pub const WEB_RESEARCH: &str = "web_research";

const MAX_SENTENCES: u32 = 5;

/// External market research through the language model.
///
/// Not idempotent: each call may return different content, so the
/// orchestrator never retries it.
pub struct WebResearch {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
    descriptor: CapabilityDescriptor,
}

impl WebResearch {
    pub fn new(client: Arc<dyn LlmClient>, model: &str, workspace: &Path) -> AppResult<Self> {
        let prompt = load_prompt(workspace, RESEARCH_PROMPT_ID)?;
        Ok(Self {
            client,
            model: model.to_string(),
            prompt,
            descriptor: CapabilityDescriptor {
                name: WEB_RESEARCH.to_string(),
                description: "Research current market news, rates and trends".to_string(),
                params: vec![ParamSpec::required(
                    "query",
                    ParamKind::String,
                    "Topic to research",
                )],
                output: "A short sourced summary cited as web:<id>".to_string(),
                idempotent: false,
            },
        })
    }
}

fn research_citation(query: &str) -> String {
    let digest = Sha256::digest(query.trim().to_lowercase().as_bytes());
    let hex: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
    format!("web:{}", hex)
}

#[async_trait::async_trait]
impl Capability for WebResearch {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, arguments: Value) -> AppResult<CapabilityOutput> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| AppError::SchemaViolation("query must be a string".to_string()))?;

        let built = build_prompt(
            &self.prompt,
            &json!({ "query": query, "maxSentences": MAX_SENTENCES }),
        )?;

        let mut request = LlmRequest::new(built.user, &self.model);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        if let Some(temperature) = built.metadata.temperature {
            request = request.with_temperature(temperature);
        }

        let response = self.client.complete(&request).await?;
        let text = response.content.trim();
        if text.is_empty() {
            return Ok(CapabilityOutput::empty("web research returned no content"));
        }

        let citation = research_citation(query);
        Ok(CapabilityOutput::found(
            vec![EvidenceItem::passage(WEB_RESEARCH, Some(citation.clone()), text)],
            format!("research summary {} ({} chars)", citation, text.len()),
        ))
    }
}
