//! Rules assistant backed by a hosted text-generation API.
//!
//! The assistant never fails from the caller's point of view: every problem is logged and
//! answered with a fixed line.

use tracing::warn;

use crate::{config::AssistantConfig, state::SharedState};

pub const OFFLINE_ANSWER: &str =
    "I'm currently offline (API Key missing). Please check the configuration.";
pub const ERROR_ANSWER: &str =
    "The spirits of the cards are silent right now. (Error connecting to AI)";
pub const EMPTY_ANSWER: &str = "I couldn't read the cards on that one. Try again.";

#[cfg_attr(not(feature = "assistant"), allow(dead_code))]
const SYSTEM_INSTRUCTION: &str = "You are the 'Rummy Sage', an expert Rummy card game referee and \
strategist. Keep answers concise (under 50 words), witty, and helpful. You speak with a slight \
casino dealer charm.";

/// Configured client for the text-generation endpoint.
pub struct Assistant {
    config: AssistantConfig,
    #[cfg(feature = "assistant")]
    client: Option<reqwest::Client>,
}

impl Assistant {
    pub fn new(config: AssistantConfig) -> Self {
        #[cfg(feature = "assistant")]
        let client = match reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
        {
            Ok(client) => Some(client),
            Err(err) => {
                warn!(error = %err, "failed to build assistant HTTP client");
                None
            }
        };

        Self {
            config,
            #[cfg(feature = "assistant")]
            client,
        }
    }

    /// Whether a question can reach the remote service at all.
    pub fn is_configured(&self) -> bool {
        #[cfg(feature = "assistant")]
        {
            self.config.api_key.is_some() && self.client.is_some()
        }
        #[cfg(not(feature = "assistant"))]
        {
            false
        }
    }

    #[cfg(feature = "assistant")]
    async fn generate(&self, question: &str) -> Result<Option<String>, reqwest::Error> {
        let (Some(client), Some(api_key)) = (&self.client, &self.config.api_key) else {
            return Ok(None);
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        );
        let body = wire::GenerateRequest::new(SYSTEM_INSTRUCTION, question);

        let response = client
            .post(url)
            .query(&[("key", api_key.as_str())])
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<wire::GenerateResponse>()
            .await?;

        Ok(response.text())
    }
}

/// Ask the assistant a free-form question.
pub async fn ask(state: &SharedState, question: &str) -> String {
    let assistant = state.assistant();
    if !assistant.is_configured() {
        return OFFLINE_ANSWER.to_string();
    }

    #[cfg(feature = "assistant")]
    {
        match assistant.generate(question).await {
            Ok(Some(text)) => text,
            Ok(None) => EMPTY_ANSWER.to_string(),
            Err(err) => {
                warn!(error = %err, "assistant request failed");
                ERROR_ANSWER.to_string()
            }
        }
    }
    #[cfg(not(feature = "assistant"))]
    {
        let _ = question;
        warn!("assistant support is not compiled in");
        OFFLINE_ANSWER.to_string()
    }
}

#[cfg(feature = "assistant")]
mod wire {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GenerateRequest<'a> {
        system_instruction: Content<'a>,
        contents: Vec<Content<'a>>,
    }

    impl<'a> GenerateRequest<'a> {
        pub(super) fn new(system: &'a str, question: &'a str) -> Self {
            Self {
                system_instruction: Content {
                    role: None,
                    parts: vec![Part { text: system }],
                },
                contents: vec![Content {
                    role: Some("user"),
                    parts: vec![Part { text: question }],
                }],
            }
        }
    }

    #[derive(Debug, Serialize)]
    struct Content<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        role: Option<&'a str>,
        parts: Vec<Part<'a>>,
    }

    #[derive(Debug, Serialize)]
    struct Part<'a> {
        text: &'a str,
    }

    #[derive(Debug, Default, Deserialize)]
    pub(super) struct GenerateResponse {
        #[serde(default)]
        candidates: Vec<Candidate>,
    }

    #[derive(Debug, Deserialize)]
    struct Candidate {
        content: Option<CandidateContent>,
    }

    #[derive(Debug, Deserialize)]
    struct CandidateContent {
        #[serde(default)]
        parts: Vec<CandidatePart>,
    }

    #[derive(Debug, Deserialize)]
    struct CandidatePart {
        text: Option<String>,
    }

    impl GenerateResponse {
        /// Concatenated text of the first candidate, if it carries any.
        pub(super) fn text(self) -> Option<String> {
            let content = self.candidates.into_iter().next()?.content?;
            let text = content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>();
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
    }

}
