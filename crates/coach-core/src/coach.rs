use crate::mode::CoachingMode;
use crate::{Role, Turn};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::Deserialize;

pub const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "llama-3.3-70b-versatile";

/// Canned assistant turn substituted when a completion call fails. It is
/// appended to history, spoken, and counted toward usage like a real reply.
pub const COMPLETION_APOLOGY: &str = "Sorry, I'm having trouble responding. Please try again.";
/// Substitute turn for rate-limit failures specifically.
pub const RATE_LIMIT_APOLOGY: &str =
    "Rate limit reached. Please wait 10 seconds before continuing.";

#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    #[error("completion endpoint rate limited")]
    RateLimited,
    #[error("completion endpoint error: {0}")]
    Api(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub content: String,
}

// The `CoachModel` trait is the contract for the synthetic expert: one
// bounded reply per call during the session, and one summarization pass
// afterwards. The session controller depends on this abstraction rather
// than a concrete provider, so tests drive it with a mockall mock and the
// runtime can swap providers without touching the turn state machine.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait CoachModel {
    /// One assistant reply for the current history, guided by the
    /// mode-specific system directive.
    async fn complete(
        &self,
        mode: CoachingMode,
        topic: &str,
        history: &[Turn],
    ) -> Result<String, CoachError>;

    /// Post-session feedback (evaluative modes) or notes (the rest) over the
    /// full transcript.
    async fn summarize(
        &self,
        mode: CoachingMode,
        topic: &str,
        history: &[Turn],
    ) -> Result<String, CoachError>;
}

pub struct GroqClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GroqClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }

    async fn chat(
        &self,
        body: serde_json::Value,
    ) -> Result<String, CoachError> {
        let resp = self
            .client
            .post(GROQ_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoachError::RateLimited);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(CoachError::Api(format!("{status}: {detail}")));
        }

        let parsed = resp.json::<LlmResponse>().await?;
        let answer = parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| CoachError::Api("no choices in response".to_string()))?;
        Ok(answer)
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl CoachModel for GroqClient {
    async fn complete(
        &self,
        mode: CoachingMode,
        topic: &str,
        history: &[Turn],
    ) -> Result<String, CoachError> {
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": mode.system_prompt(topic),
        })];
        for turn in history {
            messages.push(serde_json::json!({
                "role": role_name(turn.role),
                "content": turn.content,
            }));
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": 300,
            "temperature": 0.7,
        });
        self.chat(body).await
    }

    async fn summarize(
        &self,
        mode: CoachingMode,
        topic: &str,
        history: &[Turn],
    ) -> Result<String, CoachError> {
        let transcript = history
            .iter()
            .map(|turn| {
                let speaker = match turn.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                format!("{speaker}: {}", turn.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": mode.summary_prompt(topic) },
                {
                    "role": "user",
                    "content": format!("Here is the conversation to analyze:\n\n{transcript}"),
                },
            ],
            "max_tokens": 1500,
            "temperature": 0.5,
        });
        self.chat(body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Live integration test against the Groq API; ignored so `cargo test`
    // runs without a key. Run with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn test_complete_lecture_turn() {
        dotenvy::dotenv_override().ok();
        let api_key = env::var("GROQ_API_KEY").expect("GROQ_API_KEY not set");
        let coach = GroqClient::new(api_key, DEFAULT_CHAT_MODEL.to_string());

        let history = vec![
            Turn::assistant("Welcome! Today's lecture is on operating systems."),
            Turn::user("What does a scheduler do?"),
        ];
        let reply = coach
            .complete(CoachingMode::Lecture, "operating systems", &history)
            .await
            .expect("completion failed");
        assert!(!reply.is_empty());
    }

    // Live integration test; see the note above.
    #[tokio::test]
    #[ignore]
    async fn test_summarize_produces_notes() {
        dotenvy::dotenv_override().ok();
        let api_key = env::var("GROQ_API_KEY").expect("GROQ_API_KEY not set");
        let coach = GroqClient::new(api_key, DEFAULT_CHAT_MODEL.to_string());

        let history = vec![
            Turn::assistant("Welcome! Today's lecture is on TCP/IP."),
            Turn::user("TCP/IP is a suite of networking protocols."),
            Turn::assistant("Exactly. Let's look at the layers in detail."),
        ];
        let notes = coach
            .summarize(CoachingMode::Lecture, "TCP/IP", &history)
            .await
            .expect("summarization failed");
        assert!(!notes.is_empty());
    }
}
