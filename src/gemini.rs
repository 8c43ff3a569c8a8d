use anyhow::{anyhow, Context, Result};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::error;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const MODEL: &str = "gemini-1.5-flash";
const MAX_OUTPUT_TOKENS: u32 = 250;

/// Exact token the model is instructed to emit for off-topic queries.
const OUT_OF_CONTEXT: &str = "OUT_OF_CONTEXT";

const REDIRECT_REPLY: &str =
    "I can only answer questions about Jharkhand tourism. How can I help you with your trip?";
const INCOMPLETE_REPLY: &str =
    "I couldn't complete the response. Please try rephrasing your question.";
pub const ERROR_REPLY: &str = "Sorry, an error occurred while contacting the AI model.";

/// Gateway to the generative language backend. Never fails outward: every
/// transport, protocol, or parse problem collapses into a fixed reply.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    blank_lines: Regex,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    pub fn new(http: Client, api_key: String) -> Result<Self> {
        Self::with_base_url(http, api_key, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(http: Client, api_key: String, base_url: String) -> Result<Self> {
        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            blank_lines: Regex::new(r"\n{2,}")?,
        })
    }

    pub async fn generate_reply(&self, message: &str) -> String {
        match self.try_generate(message).await {
            Ok((text, finish_reason)) => self.post_process(&text, finish_reason.as_deref()),
            Err(e) => {
                error!("Error calling the generative model: {e:#}");
                ERROR_REPLY.to_string()
            }
        }
    }

    async fn try_generate(&self, message: &str) -> Result<(String, Option<String>)> {
        let prompt = format!(
            "First, determine if the following user query is related to Jharkhand \
             tourism, travel, or local culture. If it is NOT related, your only \
             response must be the exact string '{OUT_OF_CONTEXT}'. If it IS related, \
             answer the question briefly and concisely, in 2-3 sentences, as a \
             helpful tourism assistant. User Query: '{message}'"
        );

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        let response = self
            .http
            .post(format!(
                "{}/v1beta/models/{MODEL}:generateContent",
                self.base_url
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Request to the generative language API failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Generative language API returned {status}: {detail}"
            ));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .context("Failed to decode generative language API response")?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Response contained no candidates"))?;

        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        Ok((text, candidate.finish_reason))
    }

    /// Sentinel check first, then the finish-reason policy: only a normal
    /// stop may surface model text, with blank-line runs collapsed.
    fn post_process(&self, text: &str, finish_reason: Option<&str>) -> String {
        let reply = text.trim();

        if reply == OUT_OF_CONTEXT {
            return REDIRECT_REPLY.to_string();
        }

        if finish_reason == Some("STOP") {
            self.blank_lines.replace_all(reply, "\n").into_owned()
        } else {
            INCOMPLETE_REPLY.to_string()
        }
    }
}
