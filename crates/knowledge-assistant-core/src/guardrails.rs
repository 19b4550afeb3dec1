//! Rule-based request screening.
//!
//! Two checks bracket retrieval:
//!
//! - [`Guardrails::pre_screen`] runs on the raw question. A denylist of
//!   pattern categories is tested in priority order and the first match
//!   blocks the request. Otherwise a list of off-topic keywords may add a
//!   single `warn` finding.
//! - [`Guardrails::relevance_guard`] runs on the best retrieval score and
//!   flags questions the corpus cannot ground.
//!
//! Both are synchronous, deterministic, and network-free. They screen
//! obvious misuse; the generation prompt still tells the model to ignore
//! instructions found inside retrieved context.

use regex::Regex;
use serde::Serialize;

pub const PROMPT_INJECTION: &str = "prompt_injection";
pub const CREDENTIAL_EXFILTRATION: &str = "credential_exfiltration";
pub const DESTRUCTIVE_OPS: &str = "destructive_ops";
pub const OFF_TOPIC: &str = "off_topic";
pub const LOW_RELEVANCE: &str = "low_relevance";

/// Default minimum top-match score below which answers are withheld.
pub const DEFAULT_MIN_RELEVANCE_SCORE: f32 = 0.22;

const BLOCK_DETAIL: &str = "Rejected due to unsafe or system-override intent.";
const BLOCK_MESSAGE: &str = "This assistant only answers enterprise documentation questions; \
                             this request was blocked by safety rules.";

/// Denylist in priority order: earlier categories win.
const DENYLIST: &[(&str, &str)] = &[
    (
        PROMPT_INJECTION,
        r"ignore (all )?previous instructions|reset the rules",
    ),
    (
        CREDENTIAL_EXFILTRATION,
        r"(password|api key|secret key|token|credential)",
    ),
    (
        DESTRUCTIVE_OPS,
        r"(drop (table|database)|rm -rf|format c:|shutdown)",
    ),
];

const OFF_TOPIC_KEYWORDS: &[&str] = &[
    "movie",
    "recipe",
    "song",
    "weather",
    "politics",
    "sports",
    "celebrity",
    "stock price",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardrailAction {
    Block,
    Warn,
    Info,
}

impl GuardrailAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardrailAction::Block => "block",
            GuardrailAction::Warn => "warn",
            GuardrailAction::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardrailFinding {
    pub category: String,
    pub action: GuardrailAction,
    pub detail: String,
}

/// Verdict of [`Guardrails::pre_screen`].
#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailDecision {
    pub blocked: bool,
    pub findings: Vec<GuardrailFinding>,
    /// User-facing explanation, set when `blocked`.
    pub message: Option<String>,
}

/// Stateless rule engine. Patterns are compiled once at construction.
#[derive(Debug, Clone)]
pub struct Guardrails {
    min_relevance_score: f32,
    denylist: Vec<(&'static str, Regex)>,
}

impl Guardrails {
    pub fn new(min_relevance_score: f32) -> Self {
        let denylist = DENYLIST
            .iter()
            .map(|(category, pattern)| {
                let re = Regex::new(&format!("(?i){pattern}"))
                    .expect("guardrail pattern should compile");
                (*category, re)
            })
            .collect();

        Self {
            min_relevance_score,
            denylist,
        }
    }

    pub fn min_relevance_score(&self) -> f32 {
        self.min_relevance_score
    }

    /// Screen a question before any retrieval work.
    pub fn pre_screen(&self, question: &str) -> GuardrailDecision {
        let q = question.to_lowercase();

        if let Some((category, _)) = self.denylist.iter().find(|(_, re)| re.is_match(&q)) {
            return GuardrailDecision {
                blocked: true,
                findings: vec![GuardrailFinding {
                    category: (*category).to_string(),
                    action: GuardrailAction::Block,
                    detail: BLOCK_DETAIL.to_string(),
                }],
                message: Some(BLOCK_MESSAGE.to_string()),
            };
        }

        let findings = OFF_TOPIC_KEYWORDS
            .iter()
            .find(|keyword| q.contains(*keyword))
            .map(|keyword| GuardrailFinding {
                category: OFF_TOPIC.to_string(),
                action: GuardrailAction::Warn,
                detail: format!(
                    "Question appears unrelated to enterprise docs (keyword: {keyword})."
                ),
            })
            .into_iter()
            .collect();

        GuardrailDecision {
            blocked: false,
            findings,
            message: None,
        }
    }

    /// Flag a retrieval whose best score is strictly below the threshold.
    pub fn relevance_guard(&self, top_score: f32) -> Option<GuardrailFinding> {
        if top_score < self.min_relevance_score {
            return Some(GuardrailFinding {
                category: LOW_RELEVANCE.to_string(),
                action: GuardrailAction::Warn,
                detail: format!(
                    "Top match score {top_score:.2} is below threshold {}.",
                    self.min_relevance_score
                ),
            });
        }
        None
    }
}

impl Default for Guardrails {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_RELEVANCE_SCORE)
    }
}
