//! Text-evaluation oracle client
//!
//! The oracle is an untrusted, non-deterministic classifier: given a
//! transcript and rubric items it returns raw evidence judgements. Every
//! failure mode (timeout, non-2xx, malformed JSON) surfaces as an
//! [`OracleError`], which callers treat as "no matches this round".

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use groupsight_common::config::OracleConfig;
use groupsight_common::{RawMatch, RubricItem};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::num::NonZeroU32;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("GroupSight/", env!("CARGO_PKG_VERSION"));

const SYSTEM_PROMPT: &str = "You assess classroom group discussions against a rubric. \
For each rubric item, decide whether the transcript contains evidence for it. \
Reply with JSON only: {\"matches\":[{\"criterion_index\":<index>,\"status\":\"GREEN\"|\"RED\"|\"GREY\",\
\"quote\":\"<verbatim words from the transcript>\",\"rationale\":\"<short reason>\"}]}. \
GREEN means the evidence satisfies the rubric, RED means it is attempted but incomplete or incorrect, \
GREY means no evidence. Quotes must be copied exactly from the transcript. \
Never use one quote for two criteria.";

/// Oracle errors
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Oracle API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[async_trait]
pub trait Oracle: Send + Sync {
    /// Evaluate a transcript against the given rubric items
    async fn evaluate(
        &self,
        transcript: &str,
        rubric_items: &[RubricItem],
        context: &str,
    ) -> Result<Vec<RawMatch>, OracleError>;
}

/// Stand-in used when no oracle endpoint is configured
pub struct DisabledOracle;

#[async_trait]
impl Oracle for DisabledOracle {
    async fn evaluate(
        &self,
        _transcript: &str,
        _rubric_items: &[RubricItem],
        _context: &str,
    ) -> Result<Vec<RawMatch>, OracleError> {
        Err(OracleError::NotConfigured)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// OpenAI-compatible chat-completions oracle
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HttpOracle {
    pub fn new(
        endpoint: impl Into<String>,
        config: &OracleConfig,
        api_key: Option<String>,
    ) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()
            .map_err(|e| OracleError::Network(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: config.model.clone(),
            api_key,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn evaluate(
        &self,
        transcript: &str,
        rubric_items: &[RubricItem],
        context: &str,
    ) -> Result<Vec<RawMatch>, OracleError> {
        self.rate_limiter.until_ready().await;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(transcript, rubric_items, context),
                },
            ],
            temperature: 0.0,
            response_format: json!({"type": "json_object"}),
        };

        debug!(
            endpoint = %self.endpoint,
            items = rubric_items.len(),
            transcript_chars = transcript.len(),
            "Querying oracle"
        );

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Api(status.as_u16(), body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Parse(e.to_string()))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| OracleError::Parse("response has no choices".to_string()))?;

        parse_matches(&content)
    }
}

/// User prompt listing the rubric items with the indices to echo back
pub fn build_prompt(transcript: &str, rubric_items: &[RubricItem], context: &str) -> String {
    let mut prompt = String::new();

    if !context.trim().is_empty() {
        prompt.push_str("Activity context:\n");
        prompt.push_str(context.trim());
        prompt.push_str("\n\n");
    }

    prompt.push_str("Rubric items:\n");
    for item in rubric_items {
        prompt.push_str(&format!(
            "- criterion_index {}: {} (rubric: {})\n",
            item.criterion_index, item.description, item.rubric
        ));
    }

    prompt.push_str("\nTranscript:\n");
    prompt.push_str(transcript);
    prompt
}

/// Parse oracle reply content into raw matches
///
/// Tolerates a Markdown code fence and prose around the JSON object. Items
/// that do not deserialize are dropped; a reply without a `matches` array is
/// a parse error.
pub fn parse_matches(content: &str) -> Result<Vec<RawMatch>, OracleError> {
    let start = content
        .find('{')
        .ok_or_else(|| OracleError::Parse("no JSON object in reply".to_string()))?;
    let end = content
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| OracleError::Parse("unterminated JSON object in reply".to_string()))?;

    let value: Value = serde_json::from_str(&content[start..=end])
        .map_err(|e| OracleError::Parse(e.to_string()))?;

    let items = value
        .get("matches")
        .and_then(Value::as_array)
        .ok_or_else(|| OracleError::Parse("reply has no matches array".to_string()))?;

    let matches = items
        .iter()
        .filter_map(|item| match serde_json::from_value::<RawMatch>(item.clone()) {
            Ok(raw) => Some(raw),
            Err(e) => {
                debug!("Dropping unparseable oracle match: {}", e);
                None
            }
        })
        .collect();

    Ok(matches)
}
