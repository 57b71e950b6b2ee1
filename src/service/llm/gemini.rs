//! Integration with the Gemini `generateContent` API.
//!
//! This module provides a thin wrapper around the Gemini REST API for
//! generating in-persona replies to user messages, carrying the per-user
//! conversation history as context.
//!
//! The module implements the `GenericLlmClient` trait defined in the parent
//! module; generation failures are surfaced to the caller, which degrades to
//! a static fallback reply.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::timeout;
use tracing::{instrument, warn};

use crate::base::{
    config::Config,
    types::{ConversationTurn, Res, Role},
};

use super::{GenericLlmClient, LlmClient};

// Extra methods on `LlmClient` applied by the gemini implementation.

impl LlmClient {
    pub fn gemini(config: &Config) -> Self {
        let client = GeminiLlmClient::new(config);
        Self { inner: Arc::new(client) }
    }
}

// Specific implementations.

/// Gemini LLM client implementation.
#[derive(Clone)]
pub struct GeminiLlmClient {
    client: reqwest::Client,
    config: Config,
}

impl GeminiLlmClient {
    /// Create a new Gemini LLM client.
    #[instrument(name = "GeminiLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: config.clone(),
        }
    }

    /// Build the request body: persona directive as the system instruction,
    /// prior turns as alternating contents, the new message last.
    #[instrument(name = "GeminiLlmClient::build_request_body", skip_all)]
    fn build_request_body(&self, text: &str, history: &[ConversationTurn]) -> Value {
        let mut contents: Vec<Value> = history
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                json!({ "role": role, "parts": [{ "text": turn.content }] })
            })
            .collect();

        contents.push(json!({ "role": "user", "parts": [{ "text": text }] }));

        json!({
            "contents": contents,
            "systemInstruction": { "parts": [{ "text": self.config.persona_directive }] },
            "generationConfig": {
                "temperature": self.config.gemini_temperature,
                "maxOutputTokens": self.config.gemini_max_tokens,
            },
        })
    }

    /// Helper function to make Gemini API calls with retry logic and timeout handling.
    async fn call_gemini_api(&self, body: &Value) -> Res<Value> {
        const MAX_RETRIES: u32 = 3;
        const RETRY_DELAY_MS: u64 = 1000;

        let url = format!("{}/v1beta/models/{}:generateContent", self.config.gemini_api_url, self.config.gemini_model);

        let mut retries = 0;

        loop {
            let request = self.client.post(&url).header("x-goog-api-key", &self.config.gemini_api_key).json(body).send();

            let result = timeout(Duration::from_secs(self.config.http_timeout_secs), request).await;

            match result {
                Ok(Ok(response)) if response.status().is_success() => {
                    return Ok(response.json::<Value>().await?);
                }
                Ok(Ok(response)) => {
                    let status = response.status();
                    let body_text = response.text().await.unwrap_or_default();
                    if retries >= MAX_RETRIES {
                        return Err(anyhow::anyhow!("Gemini API call failed after {MAX_RETRIES} retries: HTTP {status}: {body_text}"));
                    }
                    retries += 1;
                    warn!("Gemini API returned HTTP {status}, retrying {retries}/{MAX_RETRIES}");
                }
                Ok(Err(err)) => {
                    if retries >= MAX_RETRIES {
                        return Err(anyhow::anyhow!("Gemini API call failed after {MAX_RETRIES} retries: {err}"));
                    }
                    retries += 1;
                    warn!("Gemini API call failed, retrying {retries}/{MAX_RETRIES}: {err}");
                }
                Err(_) => {
                    if retries >= MAX_RETRIES {
                        return Err(anyhow::anyhow!("Gemini API call timed out after {MAX_RETRIES} attempts"));
                    }
                    retries += 1;
                    warn!("Gemini API call timed out, retrying {retries}/{MAX_RETRIES}");
                }
            }

            // Add exponential backoff for retries.
            let delay = Duration::from_millis(RETRY_DELAY_MS * 2_u64.pow(retries - 1));
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl GenericLlmClient for GeminiLlmClient {
    #[instrument(name = "GeminiLlmClient::generate_reply", skip_all, fields(user = %user_id))]
    async fn generate_reply(&self, user_id: &str, text: &str, history: &[ConversationTurn]) -> Res<String> {
        let body = self.build_request_body(text, history);
        let response = self.call_gemini_api(&body).await?;
        let reply = extract_reply(&response)?;

        Ok(sanitize_reply(&reply, &self.config.bot_name))
    }
}

/// Pull the reply text out of the first candidate.
fn extract_reply(response: &Value) -> Res<String> {
    let parts = response["candidates"][0]["content"]["parts"].as_array().cloned().unwrap_or_default();

    let text = parts.iter().filter_map(|p| p["text"].as_str()).collect::<Vec<_>>().join("");

    if text.trim().is_empty() {
        return Err(anyhow::anyhow!("Gemini response contained no text."));
    }

    Ok(text)
}

/// Instagram caps DM text at 1000 characters.
const MAX_REPLY_CHARS: usize = 1000;

/// Normalize model output into something sendable as a DM.
///
/// Strips the speaker-label prefixes the model sometimes emits, surrounding
/// quotes, and clamps to the Instagram text limit.
pub fn sanitize_reply(raw: &str, bot_name: &str) -> String {
    let mut reply = raw.trim().to_string();

    let prefixes = ["reply:", "response:", "me:", "message:", "dm:"];
    for prefix in prefixes {
        if let Some(head) = reply.get(..prefix.len())
            && head.eq_ignore_ascii_case(prefix)
        {
            reply = reply[prefix.len()..].trim_start().to_string();
            break;
        }
    }

    // The model occasionally narrates as itself.
    let name_prefix = format!("{bot_name}:");
    if let Some(head) = reply.get(..name_prefix.len())
        && head.eq_ignore_ascii_case(&name_prefix)
    {
        reply = reply[name_prefix.len()..].trim_start().to_string();
    }

    if reply.len() >= 2 && reply.starts_with('"') && reply.ends_with('"') {
        reply = reply[1..reply.len() - 1].to_string();
    }

    if reply.chars().count() > MAX_REPLY_CHARS {
        reply = reply.chars().take(MAX_REPLY_CHARS - 3).collect::<String>() + "...";
    }

    reply
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::config::ConfigInner;

    fn test_config() -> Config {
        Config {
            inner: Arc::new(ConfigInner {
                gemini_api_key: "test_key".to_string(),
                persona_directive: "Be brief.".to_string(),
                bot_name: "sam".to_string(),
                ..Default::default()
            }),
        }
    }

    fn turn(role: Role, content: &str) -> ConversationTurn {
        ConversationTurn {
            role,
            content: content.to_string(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn request_body_maps_roles_and_appends_message() {
        let client = GeminiLlmClient::new(&test_config());
        let history = vec![turn(Role::User, "hi"), turn(Role::Assistant, "hey!")];

        let body = client.build_request_body("how are you?", &history);

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"][0]["text"], "how are you?");

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 500);
    }

    #[test]
    fn reply_extracted_from_first_candidate() {
        let response = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "hello " }, { "text": "there" }], "role": "model" }
            }],
            "usageMetadata": { "promptTokenCount": 4, "candidatesTokenCount": 2 }
        });

        assert_eq!(extract_reply(&response).unwrap(), "hello there");
    }

    #[test]
    fn empty_response_is_an_error() {
        let response = serde_json::json!({ "candidates": [] });

        assert!(extract_reply(&response).is_err());
    }

    #[test]
    fn sanitize_strips_label_prefixes() {
        assert_eq!(sanitize_reply("Reply: sounds good", "sam"), "sounds good");
        assert_eq!(sanitize_reply("sam: on my way", "sam"), "on my way");
        assert_eq!(sanitize_reply("no prefix here", "sam"), "no prefix here");
    }

    #[test]
    fn sanitize_strips_surrounding_quotes() {
        assert_eq!(sanitize_reply("\"sure thing\"", "sam"), "sure thing");
        assert_eq!(sanitize_reply("\"unbalanced", "sam"), "\"unbalanced");
    }

    #[test]
    fn sanitize_clamps_long_replies() {
        let long = "a".repeat(2000);
        let clamped = sanitize_reply(&long, "sam");

        assert_eq!(clamped.chars().count(), MAX_REPLY_CHARS);
        assert!(clamped.ends_with("..."));
    }
}
