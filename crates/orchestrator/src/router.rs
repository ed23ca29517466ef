//! Routing: asking a reasoning engine which capabilities to invoke and
//! parsing its answer.
//!
//! Engines return raw text. The accepted shapes are:
//!
//! * `{"type":"final","text":"..."}`
//! * `{"type":"invoke","capabilityName":"...","arguments":{...}}`
//! * `{"type":"invoke","calls":[<invoke>, ...]}`
//! * `[<invoke>, ...]`
//!
//! The payload may be wrapped in prose or a markdown code fence.

use crate::capabilities::{QUERY_CUSTOMER_DATA, SEARCH_DOCUMENTS, WEB_RESEARCH};
use crate::registry::CapabilityDescriptor;
use crate::session::Turn;
use advisor_compliance::segment_sub_questions;
use advisor_core::{AppError, AppResult};
use advisor_llm::{LlmClient, LlmRequest};
use advisor_prompt::{build_prompt, load_prompt, PromptDefinition, ROUTE_PROMPT_ID};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

/// Everything a reasoning engine sees.
pub struct RoutingRequest<'a> {
    pub query: &'a str,
    pub context: &'a [Turn],
    pub descriptors: Vec<&'a CapabilityDescriptor>,
}

/// The component that selects capabilities. Its output is not assumed to be
/// deterministic or well-formed.
#[async_trait::async_trait]
pub trait ReasoningEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn route(&self, request: &RoutingRequest<'_>) -> AppResult<String>;
}

/// A proposed capability call, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub capability: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoutingDecision {
    /// Answer directly without capabilities
    Final(String),
    /// Calls in proposal order; a malformed call carries its parse error
    Invoke(Vec<Result<Invocation, String>>),
}

/// Parse raw engine output into a routing decision.
pub fn parse_routing_output(raw: &str) -> AppResult<RoutingDecision> {
    let payload = extract_json(raw)
        .ok_or_else(|| AppError::Routing(format!("no JSON payload in: {}", preview(raw))))?;
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| AppError::Routing(format!("invalid JSON: {}", e)))?;

    match &value {
        Value::Array(calls) => Ok(RoutingDecision::Invoke(
            calls.iter().map(parse_call).collect(),
        )),
        Value::Object(map) => match map.get("type").and_then(Value::as_str) {
            Some("final") => map
                .get("text")
                .and_then(Value::as_str)
                .map(|t| RoutingDecision::Final(t.to_string()))
                .ok_or_else(|| AppError::Routing("final decision without text".to_string())),
            Some("invoke") => match map.get("calls") {
                Some(Value::Array(calls)) => Ok(RoutingDecision::Invoke(
                    calls.iter().map(parse_call).collect(),
                )),
                Some(_) => Err(AppError::Routing("calls must be an array".to_string())),
                None => Ok(RoutingDecision::Invoke(vec![parse_call(&value)])),
            },
            Some(other) => Err(AppError::Routing(format!(
                "unknown decision type '{}'",
                other
            ))),
            None => Err(AppError::Routing("decision has no type".to_string())),
        },
        other => Err(AppError::Routing(format!(
            "expected an object or array, got {}",
            other
        ))),
    }
}

fn parse_call(value: &Value) -> Result<Invocation, String> {
    let map = value
        .as_object()
        .ok_or_else(|| format!("call is not an object: {}", value))?;

    if let Some(kind) = map.get("type") {
        if kind.as_str() != Some("invoke") {
            return Err(format!("call has type {}, expected \"invoke\"", kind));
        }
    }

    let capability = map
        .get("capabilityName")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| "call has no capabilityName".to_string())?;

    let arguments = match map.get("arguments") {
        None | Some(Value::Null) => json!({}),
        Some(Value::Object(args)) => Value::Object(args.clone()),
        Some(other) => return Err(format!("arguments of {} are not an object: {}", capability, other)),
    };

    Ok(Invocation {
        capability: capability.to_string(),
        arguments,
    })
}

/// Locate the outermost JSON object or array in `raw`.
fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find(['{', '['])?;
    let close = if raw[start..].starts_with('{') { '}' } else { ']' };
    let end = raw.rfind(close)?;
    (end > start).then(|| &raw[start..=end])
}

fn preview(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() > 80 {
        format!("{}...", trimmed.chars().take(80).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

/// Routes through a language model using the `advisor.route` prompt.
pub struct LlmReasoningEngine {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
}

impl LlmReasoningEngine {
    pub fn new(client: Arc<dyn LlmClient>, model: &str, workspace: &Path) -> AppResult<Self> {
        Ok(Self {
            client,
            model: model.to_string(),
            prompt: load_prompt(workspace, ROUTE_PROMPT_ID)?,
        })
    }
}

#[async_trait::async_trait]
impl ReasoningEngine for LlmReasoningEngine {
    fn name(&self) -> &str {
        "llm"
    }

    async fn route(&self, request: &RoutingRequest<'_>) -> AppResult<String> {
        let capabilities = request
            .descriptors
            .iter()
            .map(|d| format!("- {}", d.signature()))
            .collect::<Vec<_>>()
            .join("\n");
        let context: Vec<Value> = request
            .context
            .iter()
            .map(|t| json!({ "role": t.role, "text": t.text }))
            .collect();

        let built = build_prompt(
            &self.prompt,
            &json!({
                "capabilities": capabilities,
                "context": context,
                "query": request.query,
            }),
        )?;

        let mut llm_request = LlmRequest::new(built.user, &self.model);
        if let Some(system) = built.system {
            llm_request = llm_request.with_system(system);
        }
        if let Some(temperature) = built.metadata.temperature {
            llm_request = llm_request.with_temperature(temperature);
        }
        if built.metadata.expects_json {
            llm_request = llm_request.with_json_mode();
        }

        let response = self.client.complete(&llm_request).await?;
        tracing::debug!("Router reply: {}", preview(&response.content));
        Ok(response.content)
    }
}

const DATA_WORDS: &[&str] = &[
    "customer", "customers", "client", "clients", "segment", "segments", "balance",
    "balances", "engagement", "crm", "lead", "leads", "advisor", "advisors", "dataset",
    "how many", "average", "top",
];

const MARKET_WORDS: &[&str] = &[
    "market", "markets", "news", "trend", "trends", "inflation", "economy", "economic",
    "latest", "today", "this week", "outlook", "forecast",
];

/// Deterministic offline router.
///
/// Each sub-question goes to customer data when it mentions customers or
/// aggregates, to research when it mentions markets or news, and to
/// document search otherwise.
#[derive(Debug, Default)]
pub struct KeywordReasoningEngine;

impl KeywordReasoningEngine {
    fn customer_operation(text: &str) -> Value {
        let metric = if mentions(text, &["engagement"]) {
            "engagement_score"
        } else if mentions(text, &["age", "ages", "older", "younger"]) {
            "age"
        } else {
            "balance"
        };
        let group_by: Vec<&str> = ["segment", "country", "product", "advisor"]
            .iter()
            .filter(|g| text.contains(&format!("by {}", g)) || text.contains(&format!("per {}", g)))
            .map(|g| if *g == "advisor" { "advisor_id" } else { *g })
            .collect();
        let n = first_number(text).unwrap_or(5);

        if mentions(text, &["top", "highest", "largest", "biggest"]) {
            json!({"kind": "topN", "column": metric, "n": n, "order": "desc"})
        } else if mentions(text, &["lowest", "smallest", "bottom"]) {
            json!({"kind": "topN", "column": metric, "n": n, "order": "asc"})
        } else if mentions(text, &["average", "mean"]) {
            json!({"kind": "aggregate", "groupBy": group_by, "metrics": [{"fn": "mean", "column": metric}]})
        } else if mentions(text, &["total", "sum"]) {
            json!({"kind": "aggregate", "groupBy": group_by, "metrics": [{"fn": "sum", "column": metric}]})
        } else if mentions(text, &["how many", "count", "number of"]) {
            json!({"kind": "aggregate", "groupBy": group_by, "metrics": [{"fn": "count"}]})
        } else {
            json!({"kind": "describe"})
        }
    }
}

fn first_number(text: &str) -> Option<u64> {
    text.split(|c: char| !c.is_ascii_digit())
        .find(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
        .filter(|n| (1..=1000).contains(n))
}

fn mentions(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| {
        if w.contains(' ') {
            text.contains(w)
        } else {
            text.split(|c: char| !c.is_alphanumeric()).any(|t| t == *w)
        }
    })
}

#[async_trait::async_trait]
impl ReasoningEngine for KeywordReasoningEngine {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn route(&self, request: &RoutingRequest<'_>) -> AppResult<String> {
        let available = |name: &str| request.descriptors.iter().any(|d| d.name == name);

        let mut sub_questions = segment_sub_questions(request.query);
        if sub_questions.is_empty() {
            sub_questions.push(request.query.trim().to_string());
        }

        let mut calls: Vec<Value> = Vec::new();
        let mut push = |name: &str, arguments: Value| {
            if available(name) && !calls.iter().any(|c| c["capabilityName"] == name) {
                calls.push(json!({"capabilityName": name, "arguments": arguments}));
            }
        };

        for sub in &sub_questions {
            let lower = sub.to_lowercase();
            if mentions(&lower, DATA_WORDS) {
                push(
                    QUERY_CUSTOMER_DATA,
                    json!({"operation": Self::customer_operation(&lower)}),
                );
            } else if mentions(&lower, MARKET_WORDS) {
                push(WEB_RESEARCH, json!({"query": sub}));
            } else {
                push(SEARCH_DOCUMENTS, json!({"query": request.query}));
            }
        }

        if calls.is_empty() {
            return Ok(json!({
                "type": "final",
                "text": "No capability is available to answer this question."
            })
            .to_string());
        }

        Ok(json!({"type": "invoke", "calls": calls}).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CapabilityDescriptor, ParamKind, ParamSpec};

    fn invocations(decision: RoutingDecision) -> Vec<Result<Invocation, String>> {
        match decision {
            RoutingDecision::Invoke(calls) => calls,
            other => panic!("expected invoke, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_final() {
        let decision = parse_routing_output(r#"{"type":"final","text":"Hello"}"#).unwrap();
        assert_eq!(decision, RoutingDecision::Final("Hello".to_string()));
    }

    #[test]
    fn test_parse_single_invoke_in_code_fence() {
        let raw = "Sure!\n```json\n{\"type\":\"invoke\",\"capabilityName\":\"search_documents\",\"arguments\":{\"query\":\"fees\"}}\n```";
        let calls = invocations(parse_routing_output(raw).unwrap());
        assert_eq!(calls.len(), 1);
        let call = calls[0].as_ref().unwrap();
        assert_eq!(call.capability, "search_documents");
        assert_eq!(call.arguments, json!({"query": "fees"}));
    }

    #[test]
    fn test_parse_array_and_calls_forms() {
        let array = r#"[{"type":"invoke","capabilityName":"a"},{"capabilityName":"b","arguments":{}}]"#;
        assert_eq!(invocations(parse_routing_output(array).unwrap()).len(), 2);

        let calls = r#"{"type":"invoke","calls":[{"capabilityName":"a"}]}"#;
        let parsed = invocations(parse_routing_output(calls).unwrap());
        assert_eq!(parsed[0].as_ref().unwrap().arguments, json!({}));
    }

    #[test]
    fn test_malformed_call_does_not_affect_others() {
        let raw = r#"[{"capabilityName":"search_documents","arguments":{"query":"x"}},
                      {"arguments":{}},
                      {"capabilityName":"web_research","arguments":"oops"},
                      {"type":"final","capabilityName":"web_research"}]"#;
        let calls = invocations(parse_routing_output(raw).unwrap());
        assert_eq!(calls.len(), 4);
        assert!(calls[0].is_ok());
        assert!(calls[1].as_ref().unwrap_err().contains("no capabilityName"));
        assert!(calls[2].as_ref().unwrap_err().contains("not an object"));
        assert!(calls[3].is_err());
    }

    #[test]
    fn test_invalid_shapes_are_routing_errors() {
        for raw in [
            "I think you should search the documents.",
            r#"{"type":"shrug"}"#,
            r#"{"capabilityName":"a"}"#,
            r#"{"type":"final"}"#,
            r#"{"type":"invoke","calls":"a"}"#,
            r#"{"type":"invoke", broken"#,
            "42",
        ] {
            let err = parse_routing_output(raw).unwrap_err();
            assert_eq!(err.code(), "ROUTING_ERROR", "input: {}", raw);
        }
    }

    fn descriptor(name: &str) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: name.to_string(),
            description: String::new(),
            params: vec![ParamSpec::required("query", ParamKind::String, "")],
            output: String::new(),
            idempotent: true,
        }
    }

    async fn keyword_route(query: &str, names: &[&str]) -> Vec<Invocation> {
        let descriptors: Vec<CapabilityDescriptor> = names.iter().map(|n| descriptor(n)).collect();
        let request = RoutingRequest {
            query,
            context: &[],
            descriptors: descriptors.iter().collect(),
        };
        let raw = KeywordReasoningEngine.route(&request).await.unwrap();
        match parse_routing_output(&raw).unwrap() {
            RoutingDecision::Invoke(calls) => calls.into_iter().map(|c| c.unwrap()).collect(),
            RoutingDecision::Final(_) => Vec::new(),
        }
    }

    const ALL: &[&str] = &[SEARCH_DOCUMENTS, QUERY_CUSTOMER_DATA, WEB_RESEARCH];

    #[tokio::test]
    async fn test_keyword_routes_policy_question_to_documents() {
        let calls = keyword_route("What is the penalty for early withdrawal?", ALL).await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].capability, SEARCH_DOCUMENTS);
    }

    #[tokio::test]
    async fn test_keyword_fans_out_compound_query() {
        let calls = keyword_route(
            "Who are my top 3 clients by balance and what is the market outlook for bonds?",
            ALL,
        )
        .await;
        let names: Vec<&str> = calls.iter().map(|c| c.capability.as_str()).collect();
        assert_eq!(names, vec![QUERY_CUSTOMER_DATA, WEB_RESEARCH]);
        assert_eq!(
            calls[0].arguments["operation"],
            json!({"kind": "topN", "column": "balance", "n": 3, "order": "desc"})
        );
    }

    #[tokio::test]
    async fn test_keyword_aggregate_with_group_by() {
        let calls = keyword_route("Average engagement by segment for customers", ALL).await;
        assert_eq!(
            calls[0].arguments["operation"],
            json!({"kind": "aggregate", "groupBy": ["segment"],
                   "metrics": [{"fn": "mean", "column": "engagement_score"}]})
        );
    }

    #[tokio::test]
    async fn test_keyword_only_uses_registered_capabilities() {
        let calls = keyword_route("How many clients do we have?", &[SEARCH_DOCUMENTS]).await;
        assert!(calls.is_empty());

        let calls = keyword_route("What are the fees?", &[]).await;
        assert!(calls.is_empty());
    }
}
