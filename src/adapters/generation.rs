//! Text generation backend for post drafts.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint. The reply must be
//! a JSON array of `{variant, content}` objects; anything else is a
//! [`GenerationFailure`] and the caller falls back to templates.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::timeout;

use crate::domain::{Event, Variant};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(20);

const SYSTEM_PROMPT: &str = "You write short social media posts about space news for an \
educational audience. Rules you must never break:\n\
1. Every post names its source, either \"via <source>\" or \"Source: <source>\".\n\
2. Medium and ship_voice posts include the source URL exactly as given.\n\
3. If the source text mentions NET, a window, or that timing is subject to change, \
the post must say so too.\n\
4. Never say anything is confirmed or official unless the source text says so.\n\
Reply with only a JSON array of three objects: \
[{\"variant\":\"short\",\"content\":\"...\"},{\"variant\":\"medium\",\"content\":\"...\"},\
{\"variant\":\"ship_voice\",\"content\":\"...\"}]. \
short is under 100 characters, medium under 200, ship_voice under 280 and written in \
the voice of a friendly spacecraft.";

/// Why the generation service could not produce drafts
#[derive(Debug, Error)]
pub enum GenerationFailure {
    #[error("No generation API key configured")]
    MissingCredentials,

    #[error("Generation service returned HTTP {0}")]
    Status(u16),

    #[error("Generation request failed: {0}")]
    Transport(String),

    #[error("Generation reply was not usable: {0}")]
    Malformed(String),
}

/// One draft as returned by the service
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedDraft {
    pub variant: Variant,
    pub content: String,
}

#[derive(Deserialize)]
struct RawDraft {
    variant: String,
    content: String,
}

/// Produces candidate post texts for an event
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, event: &Event) -> Result<Vec<GeneratedDraft>, GenerationFailure>;
}

/// Settings for [`OpenAiGenerator`]
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client
pub struct OpenAiGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
}

impl OpenAiGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.config.api_key.as_deref().map_or(false, |k| !k.trim().is_empty())
    }

    async fn complete(&self, api_key: &str, prompt: String) -> Result<String, GenerationFailure> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.4,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationFailure::Status(status.as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationFailure::Malformed(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationFailure::Malformed("reply had no content".to_string()))
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, event: &Event) -> Result<Vec<GeneratedDraft>, GenerationFailure> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(GenerationFailure::MissingCredentials)?;

        let reply = timeout(self.config.timeout, self.complete(api_key, user_prompt(event)))
            .await
            .map_err(|_| {
                GenerationFailure::Transport(format!("timed out after {:?}", self.config.timeout))
            })??;

        parse_generated(&reply)
    }
}

/// Event facts handed to the model
pub fn user_prompt(event: &Event) -> String {
    format!(
        "Source: {}\nURL: {}\nTitle: {}\nSummary: {}\nPublished: {}\nCategory: {}",
        event.source,
        if event.url.is_empty() { "(none)" } else { event.url.as_str() },
        event.title,
        event.summary,
        event.published_at.to_rfc3339(),
        event.category,
    )
}

/// Parse a reply into drafts, tolerating Markdown code fences
pub fn parse_generated(reply: &str) -> Result<Vec<GeneratedDraft>, GenerationFailure> {
    let json = strip_code_fence(reply);

    let raw: Vec<RawDraft> =
        serde_json::from_str(json).map_err(|e| GenerationFailure::Malformed(e.to_string()))?;

    let drafts: Vec<GeneratedDraft> = raw
        .into_iter()
        .filter(|d| !d.content.trim().is_empty())
        .filter_map(|d| {
            let variant = Variant::parse(&d.variant);
            if variant.is_none() {
                tracing::debug!(variant = %d.variant, "Ignoring draft with unknown variant");
            }
            variant.map(|variant| GeneratedDraft {
                variant,
                content: d.content.trim().to_string(),
            })
        })
        .collect();

    if drafts.is_empty() {
        return Err(GenerationFailure::Malformed("no drafts in reply".to_string()));
    }

    Ok(drafts)
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (e.g. "json") up to the first newline
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
