//! Prompt definitions shipped with the binary.
//!
//! Workspaces may override any of these by placing a file with the same id
//! under `.advisor/prompts/`.

/// Tool-selection prompt used by the LLM reasoning engine.
pub const ROUTE_PROMPT_ID: &str = "advisor.route";

/// Research prompt used by the `web_research` capability.
pub const RESEARCH_PROMPT_ID: &str = "advisor.research";

const ROUTE_PROMPT_YAML: &str = r#"
id: advisor.route
title: Capability routing
apiVersion: "1.0"
createdBy: advisor
behavior:
  tone: neutral
  style: concise
  temperature: 0.0
system: |
  You are the routing component of an assistant for financial advisors.
  You never answer the question yourself unless no capability applies.
  Reply with a single JSON document and nothing else.
template: |
  Available capabilities:
  {{capabilities}}

  {{#if context}}
  Conversation so far:
  {{#each context}}
  - {{this.role}}: {{this.text}}
  {{/each}}

  {{/if}}
  Question: {{query}}

  Choose the capabilities needed to answer the question. Reply with either
  {"type":"invoke","calls":[{"capabilityName":"<name>","arguments":{...}}]}
  or, when no capability applies,
  {"type":"final","text":"<answer>"}.
output:
  format: json
"#;

const RESEARCH_PROMPT_YAML: &str = r#"
id: advisor.research
title: Market research
apiVersion: "1.0"
createdBy: advisor
behavior:
  tone: professional
  style: concise
  temperature: 0.2
system: |
  You are a research assistant for financial advisors. Report recent,
  verifiable market information. Name the source of every statement.
  Never give personal investment recommendations.
template: |
  Research the following topic and summarise the findings in at most
  {{maxSentences}} sentences:

  {{query}}
output:
  format: text
"#;

/// Raw YAML of a built-in prompt, if one exists for `prompt_id`.
pub fn builtin_yaml(prompt_id: &str) -> Option<&'static str> {
    match prompt_id {
        ROUTE_PROMPT_ID => Some(ROUTE_PROMPT_YAML),
        RESEARCH_PROMPT_ID => Some(RESEARCH_PROMPT_YAML),
        _ => None,
    }
}

/// Ids of every built-in prompt.
pub fn builtin_ids() -> &'static [&'static str] {
    &[ROUTE_PROMPT_ID, RESEARCH_PROMPT_ID]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PromptDefinition;

    #[test]
    fn test_builtins_parse() {
        for id in builtin_ids() {
            let yaml = builtin_yaml(id).unwrap();
            let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
            assert_eq!(&def.id, id);
        }
    }

    #[test]
    fn test_route_prompt_expects_json() {
        let def: PromptDefinition =
            serde_yaml::from_str(builtin_yaml(ROUTE_PROMPT_ID).unwrap()).unwrap();
        assert!(def.output.is_json());
        assert!(def.system.is_some());
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(builtin_yaml("agent.ask.default").is_none());
    }
}
