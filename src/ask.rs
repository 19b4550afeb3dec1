//! The question-answering pipeline.
//!
//! ```text
//! AskRequest ─▶ validate ─▶ pre_screen ──blocked──▶ refusal
//!                              │
//!                              ▼
//!                     Retriever::search ──empty──▶ "No documents available…"
//!                              │
//!                              ▼
//!                     relevance_guard ──low──▶ "The question looks unrelated…"
//!                              │
//!                              ▼
//!                   build_prompts ─▶ Generator::generate ─▶ AskResponse
//! ```
//!
//! Blocked and low-relevance outcomes are successful responses: the answer
//! explains the refusal, citations are empty and the guardrail findings are
//! returned so callers can see why.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use knowledge_assistant_core::generation::Generator;
use knowledge_assistant_core::guardrails::{GuardrailAction, GuardrailFinding, Guardrails};
use knowledge_assistant_core::{Error, Result};

use crate::config::{Config, MAX_TOP_K};
use crate::prompts::{build_prompts, find_template, ContextBlock};
use crate::retriever::Retriever;

pub const MIN_QUESTION_CHARS: usize = 3;
pub const MAX_QUESTION_CHARS: usize = 4000;

pub const NO_DOCUMENTS_ANSWER: &str = "No documents available to answer this question.";
pub const LOW_RELEVANCE_ANSWER: &str = "The question looks unrelated to the enterprise knowledge base. \
                                        Please ask about policies, incidents, or runbooks.";
const BLOCKED_FALLBACK_ANSWER: &str = "Request blocked by safety policy.";

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Unknown names fall back to the configured template.
    #[serde(default)]
    pub prompt_template: Option<String>,
    /// Include the rendered prompts in the response.
    #[serde(default)]
    pub debug_prompt: bool,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: None,
            prompt_template: None,
            debug_prompt: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let len = self.question.trim().chars().count();
        if !(MIN_QUESTION_CHARS..=MAX_QUESTION_CHARS).contains(&len) {
            return Err(Error::Validation(format!(
                "question must be between {MIN_QUESTION_CHARS} and {MAX_QUESTION_CHARS} characters"
            )));
        }
        if let Some(top_k) = self.top_k {
            validate_top_k(top_k)?;
        }
        Ok(())
    }
}

/// Reject a `top_k` outside `1..=MAX_TOP_K`.
pub fn validate_top_k(top_k: usize) -> Result<()> {
    if !(1..=MAX_TOP_K).contains(&top_k) {
        return Err(Error::Validation(format!(
            "top_k must be between 1 and {MAX_TOP_K}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub doc_id: String,
    pub chunk_id: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptTrace {
    pub template: String,
    pub version: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub request_id: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PromptTrace>,
    pub guardrails: Vec<GuardrailFinding>,
}

/// Owns everything one `ask` needs. Shared behind `Arc` by the server.
pub struct Assistant {
    retriever: Arc<Retriever>,
    generator: Arc<dyn Generator>,
    guardrails: Guardrails,
    default_top_k: usize,
    default_template: String,
}

impl Assistant {
    pub fn new(config: &Config, retriever: Arc<Retriever>, generator: Arc<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
            guardrails: Guardrails::new(config.retrieval.min_relevance_score),
            default_top_k: config.retrieval.top_k,
            default_template: config.prompts.template.clone(),
        }
    }

    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    pub async fn ask(&self, request_id: &str, req: AskRequest) -> Result<AskResponse> {
        let start = Instant::now();
        req.validate()?;

        let model = self.generator.model_name();
        let mut findings: Vec<GuardrailFinding> = Vec::new();

        let precheck = self.guardrails.pre_screen(&req.question);
        findings.extend(precheck.findings);
        if precheck.blocked {
            let latency_ms = elapsed_ms(start);
            warn!(
                event = "ask_blocked",
                request_id,
                model,
                latency_ms,
                categories = ?categories(&findings),
                "request blocked"
            );
            return Ok(AskResponse {
                request_id: request_id.to_string(),
                answer: precheck
                    .message
                    .unwrap_or_else(|| BLOCKED_FALLBACK_ANSWER.to_string()),
                citations: Vec::new(),
                latency_ms,
                prompt: None,
                guardrails: findings,
            });
        }

        let top_k = req.top_k.unwrap_or(self.default_top_k);
        let results = self.retriever.search(&req.question, top_k).await?;

        let Some(top) = results.first() else {
            return Ok(AskResponse {
                request_id: request_id.to_string(),
                answer: NO_DOCUMENTS_ANSWER.to_string(),
                citations: Vec::new(),
                latency_ms: elapsed_ms(start),
                prompt: None,
                guardrails: findings,
            });
        };
        let top_score = top.score;

        if let Some(finding) = self.guardrails.relevance_guard(top_score) {
            findings.push(finding);
            let latency_ms = elapsed_ms(start);
            info!(
                event = "ask_low_relevance",
                request_id,
                model,
                top_k,
                top_score,
                latency_ms,
                categories = ?categories(&findings),
                "top match below relevance threshold"
            );
            return Ok(AskResponse {
                request_id: request_id.to_string(),
                answer: LOW_RELEVANCE_ANSWER.to_string(),
                citations: Vec::new(),
                latency_ms,
                prompt: None,
                guardrails: findings,
            });
        }

        let context: Vec<ContextBlock<'_>> = results
            .iter()
            .map(|r| ContextBlock {
                doc_id: &r.chunk.doc_id,
                chunk_id: &r.chunk.chunk_id,
                text: &r.chunk.text,
            })
            .collect();
        let safety_notes: Vec<String> = findings
            .iter()
            .filter(|f| f.action == GuardrailAction::Warn)
            .map(|f| f.detail.clone())
            .collect();

        let template_name = req
            .prompt_template
            .as_deref()
            .filter(|name| find_template(name).is_some())
            .unwrap_or(&self.default_template);
        let rendered = build_prompts(&req.question, &context, Some(template_name), &safety_notes);

        let answer = self
            .generator
            .generate(&rendered.system, &rendered.user)
            .await?;

        let citations: Vec<Citation> = results
            .iter()
            .map(|r| Citation {
                doc_id: r.chunk.doc_id.clone(),
                chunk_id: r.chunk.chunk_id.clone(),
                score: r.score,
            })
            .collect();

        let (system_prompt, user_prompt) = if req.debug_prompt {
            (Some(rendered.system), Some(rendered.user))
        } else {
            (None, None)
        };
        let prompt = PromptTrace {
            template: rendered.template.name.to_string(),
            version: rendered.template.version.to_string(),
            description: rendered.template.description.to_string(),
            system_prompt,
            user_prompt,
        };

        let latency_ms = elapsed_ms(start);
        info!(
            event = "ask_ok",
            request_id,
            model,
            top_k,
            top_score,
            latency_ms,
            citations = citations.len(),
            prompt_template = %prompt.template,
            categories = ?categories(&findings),
            "answered"
        );

        Ok(AskResponse {
            request_id: request_id.to_string(),
            answer,
            citations,
            latency_ms,
            prompt: Some(prompt),
            guardrails: findings,
        })
    }
}

fn categories(findings: &[GuardrailFinding]) -> Vec<&str> {
    findings.iter().map(|f| f.category.as_str()).collect()
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_question_length() {
        assert!(AskRequest::new("ok?").validate().is_ok());
        assert!(matches!(
            AskRequest::new("  hi  ").validate(),
            Err(Error::Validation(_))
        ));
        assert!(AskRequest::new("x".repeat(MAX_QUESTION_CHARS)).validate().is_ok());
        assert!(AskRequest::new("x".repeat(MAX_QUESTION_CHARS + 1))
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_top_k_bounds() {
        let mut req = AskRequest::new("what is the policy?");
        for (top_k, ok) in [(0, false), (1, true), (MAX_TOP_K, true), (MAX_TOP_K + 1, false)] {
            req.top_k = Some(top_k);
            assert_eq!(req.validate().is_ok(), ok, "top_k = {top_k}");
        }
    }

    #[test]
    fn test_request_defaults_from_json() {
        let req: AskRequest = serde_json::from_str(r#"{"question": "How do I escalate?"}"#).unwrap();
        assert_eq!(req.top_k, None);
        assert_eq!(req.prompt_template, None);
        assert!(!req.debug_prompt);
    }
}
