use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ApiSettings;
use crate::error::ApiError;
use crate::language::Direction;
use crate::models::{GrammarAnalysis, GrammarCorrection};
use crate::prompts::{analysis_prompt, correction_prompt, parse_correction, translate_prompt};
use crate::store::{self, KeyValueStore};

/// The remote language service. Every call fails with [`ApiError::MissingKey`]
/// before touching the network when no key is stored.
#[async_trait]
pub trait LanguageApi: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        context: &str,
        direction: Direction,
    ) -> Result<String, ApiError>;

    async fn analyze_grammar(&self, text: &str) -> Result<GrammarAnalysis, ApiError>;

    async fn correct_grammar(&self, text: &str) -> Result<GrammarCorrection, ApiError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Per-call sampling parameters.
#[derive(Clone, Copy, Debug)]
struct Sampling {
    temperature: Option<f32>,
    max_tokens: u32,
}

const TRANSLATE: Sampling = Sampling {
    temperature: Some(0.3),
    max_tokens: 256,
};
const ANALYZE: Sampling = Sampling {
    temperature: Some(0.2),
    max_tokens: 1024,
};
const CORRECT: Sampling = Sampling {
    temperature: Some(0.3),
    max_tokens: 1024,
};
const VALIDATE: Sampling = Sampling {
    temperature: None,
    max_tokens: 5,
};

/// Chat-completions client for the DeepSeek API.
pub struct DeepSeekClient {
    http: reqwest::Client,
    store: Arc<dyn KeyValueStore>,
    endpoint: String,
    model: String,
}

impl DeepSeekClient {
    pub fn new(settings: &ApiSettings, store: Arc<dyn KeyValueStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            store,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
        })
    }

    /// Sends a tiny request with `key` to check that the service accepts it.
    pub async fn validate_key(&self, key: &str) -> Result<(), ApiError> {
        self.complete_with_key(key, "Test API key.", VALIDATE)
            .await
            .map(|_| ())
    }

    async fn complete(&self, prompt: &str, sampling: Sampling) -> Result<String, ApiError> {
        let key = store::api_key(self.store.as_ref())
            .await?
            .ok_or(ApiError::MissingKey)?;
        self.complete_with_key(&key, prompt, sampling).await
    }

    async fn complete_with_key(
        &self,
        key: &str,
        prompt: &str,
        sampling: Sampling,
    ) -> Result<String, ApiError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
        };
        debug!(endpoint = %self.endpoint, model = %self.model, max_tokens = sampling.max_tokens, "chat completion");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status(error_message(status, &body)));
        }
        first_choice(&body)
    }
}

#[async_trait]
impl LanguageApi for DeepSeekClient {
    async fn translate(
        &self,
        text: &str,
        context: &str,
        direction: Direction,
    ) -> Result<String, ApiError> {
        info!(%direction, chars = text.chars().count(), "translate");
        self.complete(&translate_prompt(text, context, direction), TRANSLATE)
            .await
    }

    async fn analyze_grammar(&self, text: &str) -> Result<GrammarAnalysis, ApiError> {
        info!(chars = text.chars().count(), "analyze grammar");
        let structure = self.complete(&analysis_prompt(text), ANALYZE).await?;
        Ok(GrammarAnalysis { structure })
    }

    async fn correct_grammar(&self, text: &str) -> Result<GrammarCorrection, ApiError> {
        info!(chars = text.chars().count(), "correct grammar");
        let content = self.complete(&correction_prompt(text), CORRECT).await?;
        if content.is_empty() {
            return Ok(GrammarCorrection::default());
        }
        Ok(parse_correction(&content, text))
    }
}

/// Message from an error body, falling back to the HTTP reason phrase.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .ok()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string())
        })
}

/// Trimmed content of the first choice. Empty content is not an error here.
fn first_choice(body: &str) -> Result<String, ApiError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| ApiError::Malformed(e.to_string()))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Malformed("response has no choices".to_string()))?;
    Ok(choice.message.content.unwrap_or_default().trim().to_string())
}
