//! Transcript preprocessing
//!
//! Turns a multi-turn conversation (one string per utterance, with "Q:" /
//! "A:" turn labels) into a single document optimized for dense retrieval.
//! Uses an OpenAI-compatible chat endpoint when an API key is configured;
//! degrades to a local heuristic otherwise, or when the remote call fails.
//! Never returns an error: the caller always gets a usable string.

use crate::config::PreprocessConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are a preprocessing assistant for a retrieval system. \
Given raw multi-turn chat transcripts, produce a clean, concise text that preserves facts \
and is optimal for dense retrieval embeddings. The transcript uses explicit turn labels: \
'Q:' for user questions and 'A:' for assistant answers. Strictly preserve Q/A labels and \
turn order in the output. Remove filler, normalize spacing and casing, expand abbreviations, \
and keep key entities, dates, amounts, and tasks. Keep the input's original language.";

/// Conversation normalizer with remote-LLM and heuristic strategies
pub struct Preprocessor {
    config: PreprocessConfig,
    api_key: Option<String>,
    /// `None` when the HTTP client could not be built; remote
    /// normalization is then disabled and the heuristic always runs.
    client: Option<reqwest::Client>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        let api_key = config.resolve_api_key();
        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
        {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(
                    "Failed to build preprocessing HTTP client ({}). \
                     Remote normalization disabled",
                    e
                );
                None
            }
        };

        Self {
            config,
            api_key,
            client,
        }
    }

    /// Normalize a conversation into one embedding-ready document.
    pub async fn preprocess(&self, messages: &[String]) -> String {
        let joined = messages
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let (Some(api_key), Some(client)) = (&self.api_key, &self.client) else {
            debug!("Remote preprocessing unavailable, using heuristic normalization");
            return heuristic_normalize(&joined);
        };

        match self.call_remote(client, api_key, &joined).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Remote preprocessing failed ({}). Using heuristic normalization", e);
                heuristic_normalize(&joined)
            }
        }
    }

    /// Call the OpenAI-compatible chat completions endpoint
    async fn call_remote(
        &self,
        client: &reqwest::Client,
        api_key: &str,
        text: &str,
    ) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let user_prompt = format!(
            "Below is a multi-speaker conversation transcript with Q/A turn prefixes. \
             Keep every 'Q:' and 'A:' prefix, and produce a normalized text optimal for \
             vector embeddings. Drop filler, but preserve facts, meaning, entities, dates, \
             amounts, and action items.\n\n{text}"
        );

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: 0.2,
            max_tokens: 800,
        };

        let response = client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("chat response contained no choices"))?;

        Ok(content.trim().to_string())
    }
}

/// Local fallback normalization: collapse whitespace, strip bullet
/// decorations and empty lines. Deterministic and offline.
pub fn heuristic_normalize(text: &str) -> String {
    let mut text = text.replace('\r', "\n");
    while text.contains("  ") {
        text = text.replace("  ", " ");
    }

    text.lines()
        .map(|line| line.trim_matches(|c: char| c == ' ' || c == '-' || c == '•' || c == '\t'))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_collapses_whitespace() {
        let text = "Q:  what   is    due?\nA: the  report";
        assert_eq!(heuristic_normalize(text), "Q: what is due?\nA: the report");
    }

    #[test]
    fn test_heuristic_strips_bullets_and_blank_lines() {
        let text = "- Q: item one\n\n• A: item two\n   \n";
        assert_eq!(heuristic_normalize(text), "Q: item one\nA: item two");
    }

    #[test]
    fn test_heuristic_handles_carriage_returns() {
        let text = "Q: hello\r\nA: hi";
        assert_eq!(heuristic_normalize(text), "Q: hello\nA: hi");
    }

    #[tokio::test]
    async fn test_preprocess_without_key_uses_heuristic() {
        let preprocessor = Preprocessor {
            config: PreprocessConfig::default(),
            api_key: None,
            client: Some(reqwest::Client::new()),
        };

        let messages = vec![
            "Q: when is the   launch?".to_string(),
            String::new(),
            "A: March  3rd".to_string(),
        ];
        let out = preprocessor.preprocess(&messages).await;
        assert_eq!(out, "Q: when is the launch?\nA: March 3rd");
    }

    #[tokio::test]
    async fn test_preprocess_without_client_uses_heuristic() {
        // Even with a key configured, a missing client means no remote
        // call is ever attempted
        let preprocessor = Preprocessor {
            config: PreprocessConfig::default(),
            api_key: Some("key".to_string()),
            client: None,
        };

        let out = preprocessor
            .preprocess(&["Q:  any  updates?".to_string()])
            .await;
        assert_eq!(out, "Q: any updates?");
    }
}
