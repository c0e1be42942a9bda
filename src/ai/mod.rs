//! Vision-to-suggestion gateway. Proxies one chat-completion call to the
//! upstream model and returns its `{title, content}` JSON to the client.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{AppError, AppResult};

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const MODEL: &str = "gpt-4o-mini";
const MAX_TOKENS: u32 = 300;
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

const PROMPT: &str = "You are an expert veterinarian helping colleagues share clinical knowledge. \
Analyze this veterinary image and suggest a professional yet engaging title and content for \
sharing on a veterinary social network. The post can be about: clinical cases, injuries, \
treatments, diagnostic findings, pet health insights, or interesting animal photography.\n\n\
Return ONLY a valid JSON object (no comments, no code blocks, no explanations) with exactly \
these fields:\n{\n  \"title\": \"Professional title for the post (2-5 words)\",\n  \
\"content\": \"Engaging clinical insight or educational content (1-2 sentences)\"\n}\n\n\
Make it informative for veterinary professionals while remaining accessible to the community.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    pub content: String,
}

#[derive(Clone)]
pub struct AiClient {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl AiClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub async fn suggest(&self, image_base64: &str, image_media_type: &str) -> AppResult<Suggestion> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Internal("OPENAI_API_KEY is not configured".into()))?;

        let payload = json!({
            "model": MODEL,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image_url",
                        "image_url": {
                            "url": format!("data:{image_media_type};base64,{image_base64}"),
                        },
                    },
                    { "type": "text", "text": PROMPT },
                ],
            }],
            "max_tokens": MAX_TOKENS,
        });

        let response = self
            .client
            .post(OPENAI_URL)
            .bearer_auth(api_key)
            .timeout(UPSTREAM_TIMEOUT)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Upstream AI call failed with {}: {}", status, body);
            return Err(AppError::Internal("upstream AI call failed".into()));
        }

        let body: Value = response.json().await?;
        parse_suggestion(&body)
    }
}

fn parse_suggestion(body: &Value) -> AppResult<Suggestion> {
    let content = body
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::Internal("upstream AI response had no content".into()))?;

    serde_json::from_str(strip_code_fence(content))
        .map_err(|e| AppError::Internal(format!("upstream AI response was not JSON: {e}")))
}

// The prompt forbids code blocks, but the model occasionally wraps the JSON
// in a ```json fence anyway.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim()
}
