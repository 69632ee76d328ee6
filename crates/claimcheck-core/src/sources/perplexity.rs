use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Research, ResearchAnswer, ensure_success};
use crate::SecretValue;
use crate::config::PerplexityConfig;
use crate::error::SourceError;

/// Perplexity chat-completions client used for open web research.
pub struct PerplexityClient {
    client: reqwest::Client,
    base_url: String,
    key: Option<SecretValue>,
    key_env: String,
    model: String,
}

impl PerplexityClient {
    pub fn new(client: reqwest::Client, config: &PerplexityConfig, key: Option<SecretValue>) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key,
            key_env: config.api_key_env.clone(),
            model: config.model.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

impl From<ChatResponse> for ResearchAnswer {
    fn from(response: ChatResponse) -> Self {
        let answer = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .map(|message| message.content)
            .unwrap_or_default();
        ResearchAnswer {
            answer,
            citations: response.citations,
        }
    }
}

#[async_trait]
impl Research for PerplexityClient {
    async fn research(&self, prompt: &str) -> Result<ResearchAnswer, SourceError> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| SourceError::MissingCredential(self.key_env.clone()))?;

        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key.expose())
            .json(&request)
            .send()
            .await?;

        let body: ChatResponse = ensure_success(resp).await?.json().await?;
        let answer = ResearchAnswer::from(body);
        debug!(
            citations = answer.citations.len(),
            answer_len = answer.answer.len(),
            "research query answered"
        );
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice_and_citations() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"The claim is false."}},{"message":{"content":"ignored"}}],
                     "citations":["https://nasa.example/earth","https://edu.example/shape"]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let answer = ResearchAnswer::from(parsed);

        assert_eq!(answer.answer, "The claim is false.");
        assert_eq!(answer.citations.len(), 2);
    }

    #[test]
    fn empty_response_yields_empty_answer() {
        let parsed: ChatResponse = serde_json::from_str("{}").unwrap();
        let answer = ResearchAnswer::from(parsed);
        assert!(answer.answer.is_empty());
        assert!(answer.citations.is_empty());
    }

    #[test]
    fn request_shape_matches_chat_api() {
        let request = ChatRequest {
            model: "sonar",
            messages: [ChatMessage {
                role: "user",
                content: "hi",
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "sonar");
        assert_eq!(value["messages"][0]["role"], "user");
    }
}
