//! Completion backend for the outreach capabilities.
//!
//! One blocking HTTP client drives all four capability calls against an
//! OpenAI-compatible `/chat/completions` endpoint (OpenAI itself, or
//! any local server exposing the same shape). Models reply with free
//! text that embeds a JSON payload; the payload is located by brace
//! scanning and parsed with serde. Quality-gate feedback is appended to
//! the prompt as a correction instruction.

use serde::{Deserialize, Serialize};

use super::error::CapabilityError;
use super::traits::Capabilities;
use super::types::{MessageVariant, Prospect, ResearchContext, ScoreOutcome, SelectedMessage};

/// Candidate messages requested per prospect.
pub const VARIANTS_PER_PROSPECT: usize = 5;

pub struct LlmCapabilities {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl LlmCapabilities {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            client,
            timeout_secs,
        }
    }

    fn complete(&self, system: &str, prompt: &str) -> Result<String, CapabilityError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(|e| {
            if e.is_connect() {
                CapabilityError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                CapabilityError::Timeout(self.timeout_secs)
            } else {
                CapabilityError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CapabilityError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| CapabilityError::ResponseParsing(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CapabilityError::ResponseParsing("completion had no choices".into()))
    }
}

impl Capabilities for LlmCapabilities {
    fn research(&self, company: &str, feedback: Option<&str>) -> Result<String, CapabilityError> {
        let prompt = with_feedback(research_prompt(company), feedback);
        let findings = self.complete(RESEARCH_SYSTEM, &prompt)?;
        Ok(findings.trim().to_string())
    }

    fn score_prospect(
        &self,
        prospect: &Prospect,
        context: &ResearchContext,
        feedback: Option<&str>,
    ) -> Result<ScoreOutcome, CapabilityError> {
        let prompt = with_feedback(scoring_prompt(prospect, context), feedback);
        let response = self.complete(SCORING_SYSTEM, &prompt)?;
        parse_embedded(&response, "score object")
    }

    fn generate_variants(
        &self,
        prospect: &Prospect,
        context: &ResearchContext,
        feedback: Option<&str>,
    ) -> Result<Vec<MessageVariant>, CapabilityError> {
        let prompt = with_feedback(generation_prompt(prospect, context), feedback);
        let response = self.complete(GENERATION_SYSTEM, &prompt)?;
        let payload: VariantsPayload = parse_embedded(&response, "variants object")?;
        Ok(payload.variants)
    }

    fn select_best(
        &self,
        variants: &[MessageVariant],
        prospect: &Prospect,
        context: &ResearchContext,
        feedback: Option<&str>,
    ) -> Result<SelectedMessage, CapabilityError> {
        let prompt = with_feedback(selection_prompt(variants, prospect, context), feedback);
        let response = self.complete(SELECTION_SYSTEM, &prompt)?;
        parse_embedded(&response, "selection object")
    }
}

// ---------------------------------------------------------------------------
// Wire types (chat completions)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct VariantsPayload {
    variants: Vec<MessageVariant>,
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

const RESEARCH_SYSTEM: &str = "You are a B2B sales researcher. Be factual and concise.";
const SCORING_SYSTEM: &str = "You are an outreach targeting analyst. Output valid JSON only.";
const GENERATION_SYSTEM: &str =
    "You are an expert at writing short, personalized outreach messages. Output valid JSON only.";
const SELECTION_SYSTEM: &str =
    "You are a critical reviewer of outreach messages. Output valid JSON only.";

fn research_prompt(company: &str) -> String {
    format!(
        "Research the company \"{company}\" for a sales outreach campaign.\n\
         Cover: what they build, recent news or funding, team size and growth,\n\
         and current technical or business challenges.\n\
         Reply with plain-text findings, no preamble."
    )
}

fn scoring_prompt(prospect: &Prospect, context: &ResearchContext) -> String {
    format!(
        "Score this person as an outreach target for {company}, 0-100.\n\
         Consider seniority, decision-making power, and relevance to the\n\
         company research below.\n\n\
         PERSON:\n{profile}\n\n\
         COMPANY RESEARCH:\n{findings}\n\n\
         Reply with a JSON object: {{\"score\": <integer 0-100>, \"reasoning\": \"<one or two sentences>\"}}",
        company = context.company,
        profile = prospect.profile_text(),
        findings = if context.is_empty() {
            "(no research available)"
        } else {
            context.findings.as_str()
        },
    )
}

fn generation_prompt(prospect: &Prospect, context: &ResearchContext) -> String {
    format!(
        "Write {n} diverse outreach message variants for this person. Each\n\
         variant takes a different rhetorical approach and self-reports a\n\
         probability weight for how likely it is to get a reply.\n\n\
         PERSON:\n{profile}\n\n\
         COMPANY RESEARCH:\n{findings}\n\n\
         Reply with a JSON object:\n\
         {{\"variants\": [{{\"message\": \"...\", \"probability\": 0.0-1.0, \"hook_type\": \"...\"}}, ...]}}",
        n = VARIANTS_PER_PROSPECT,
        profile = prospect.profile_text(),
        findings = if context.is_empty() {
            "(no research available)"
        } else {
            context.findings.as_str()
        },
    )
}

fn selection_prompt(
    variants: &[MessageVariant],
    prospect: &Prospect,
    context: &ResearchContext,
) -> String {
    let listed = variants
        .iter()
        .enumerate()
        .map(|(i, v)| format!("{}. [{}] (weight {:.2}) {}", i + 1, v.tag, v.weight, v.text))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Pick the single best outreach message for this person and score it\n\
         1-10. Explain the pick and why each rejected variant lost.\n\n\
         PERSON:\n{profile}\n\n\
         COMPANY RESEARCH:\n{findings}\n\n\
         VARIANTS:\n{listed}\n\n\
         Reply with a JSON object:\n\
         {{\"message\": \"<the chosen message verbatim>\", \"score\": <integer 1-10>,\n\
          \"reason\": \"...\", \"rejected_reasons\": \"...\"}}",
        profile = prospect.profile_text(),
        findings = if context.is_empty() {
            "(no research available)"
        } else {
            context.findings.as_str()
        },
    )
}

/// Append quality-gate feedback to a prompt as a correction instruction.
fn with_feedback(prompt: String, feedback: Option<&str>) -> String {
    match feedback {
        Some(fb) => format!(
            "{prompt}\n\nYour previous attempt was rejected: {fb}\nCorrect this in your answer."
        ),
        None => prompt,
    }
}

// ---------------------------------------------------------------------------
// Embedded-JSON extraction
// ---------------------------------------------------------------------------

/// Locate the first balanced JSON object or array embedded in free text.
/// Tracks string literals so braces inside quoted text are ignored.
pub(crate) fn extract_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        if b == b'"' {
            in_string = true;
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(&text[start..=i]);
            }
        }
    }
    None
}

fn parse_embedded<T: serde::de::DeserializeOwned>(
    text: &str,
    what: &str,
) -> Result<T, CapabilityError> {
    let json = extract_json(text).ok_or_else(|| {
        CapabilityError::ResponseParsing(format!("no JSON {what} found in response"))
    })?;
    serde_json::from_str(json)
        .map_err(|e| CapabilityError::ResponseParsing(format!("{what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn extract_json_finds_object_in_prose() {
        let text = "Sure! Here is the score:\n{\"score\": 85, \"reasoning\": \"VP role\"}\nHope that helps.";
        assert_eq!(
            extract_json(text),
            Some(r#"{"score": 85, "reasoning": "VP role"}"#)
        );
    }

    #[test]
    fn extract_json_handles_nested_structures() {
        let text = r#"{"variants": [{"message": "hi"}, {"message": "yo"}]}"#;
        assert_eq!(extract_json(text), Some(text));
    }

    #[test]
    fn extract_json_ignores_braces_inside_strings() {
        let text = r#"{"reasoning": "uses {braces} and \"quotes\" freely"}"#;
        assert_eq!(extract_json(text), Some(text));
    }

    #[test]
    fn extract_json_finds_array() {
        let text = "results: [1, 2, 3] done";
        assert_eq!(extract_json(text), Some("[1, 2, 3]"));
    }

    #[test]
    fn extract_json_returns_none_without_json() {
        assert_eq!(extract_json("no structured data here"), None);
        assert_eq!(extract_json("unbalanced { forever"), None);
    }

    #[test]
    fn parse_embedded_reads_score_from_chatty_response() {
        let response = "Based on the profile, here is my assessment:\n\
                        {\"score\": 92, \"reasoning\": \"CTO with buying power\"}";
        let outcome: ScoreOutcome = parse_embedded(response, "score object").unwrap();
        assert_eq!(outcome.score, 92);
        assert_eq!(outcome.reasoning, "CTO with buying power");
    }

    #[test]
    fn parse_embedded_reads_variants_payload() {
        let response = r#"{"variants": [
            {"message": "Hi Sarah", "probability": 0.4, "hook_type": "direct"},
            {"message": "Saw your talk", "probability": 0.3, "hook_type": "shared-interest"}
        ]}"#;
        let payload: VariantsPayload = parse_embedded(response, "variants object").unwrap();
        assert_eq!(payload.variants.len(), 2);
        assert_eq!(payload.variants[1].tag, "shared-interest");
    }

    #[test]
    fn parse_embedded_rejects_mismatched_shape() {
        let err = parse_embedded::<ScoreOutcome>("{\"nope\": true}", "score object").unwrap_err();
        assert!(matches!(err, CapabilityError::ResponseParsing(_)));
    }

    #[test]
    fn feedback_is_appended_to_prompt() {
        let prompt = with_feedback("base prompt".to_string(), Some("score was out of range"));
        assert!(prompt.starts_with("base prompt"));
        assert!(prompt.contains("score was out of range"));

        assert_eq!(with_feedback("base".to_string(), None), "base");
    }

    #[test]
    fn prompts_note_missing_research() {
        let prospect = Prospect::new("p1".into(), BTreeMap::new());
        let ctx = ResearchContext::empty("Acme");
        assert!(scoring_prompt(&prospect, &ctx).contains("(no research available)"));
        assert!(generation_prompt(&prospect, &ctx).contains("(no research available)"));
    }

    #[test]
    fn selection_prompt_lists_all_variants() {
        let prospect = Prospect::new("p1".into(), BTreeMap::new());
        let ctx = ResearchContext::empty("Acme");
        let variants = vec![
            MessageVariant {
                text: "Hi there".into(),
                weight: 0.5,
                tag: "direct".into(),
            },
            MessageVariant {
                text: "Quick question".into(),
                weight: 0.2,
                tag: "curiosity".into(),
            },
        ];
        let prompt = selection_prompt(&variants, &prospect, &ctx);
        assert!(prompt.contains("1. [direct]"));
        assert!(prompt.contains("2. [curiosity]"));
        assert!(prompt.contains("Quick question"));
    }
}
