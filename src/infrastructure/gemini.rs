//! Gemini text generation client.

use crate::config::GeminiSettings;
use crate::infrastructure::traits::TextGenerator;
use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("generation provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("unrecognized generation response: {raw}")]
    UnrecognizedResponse { raw: String },

    #[error("failed to render prompt: {0}")]
    Prompt(#[from] minijinja::Error),

    #[error("generation client misconfigured: {0}")]
    Config(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [OutgoingPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct OutgoingPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CandidateContent {
    Parts { parts: Vec<TextPart> },
    Text(String),
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    content: Vec<TextPart>,
}

/// Response bodies the provider is known to produce, in the order they are tried.
#[derive(Debug)]
pub enum GenerationResponse {
    /// `candidates[].content.parts[].text`, or `candidates[].content` as a string.
    Candidates(Vec<String>),
    /// `output[0].content[0].text`
    Output(String),
    /// top-level `text`
    Text(String),
}

impl GenerationResponse {
    pub fn parse(body: &Value) -> Option<GenerationResponse> {
        Self::candidates(body)
            .or_else(|| Self::output(body))
            .or_else(|| Self::text(body))
    }

    fn candidates(body: &Value) -> Option<GenerationResponse> {
        let candidates: Vec<Candidate> =
            serde_json::from_value(body.get("candidates")?.clone()).ok()?;

        let texts: Vec<String> = candidates
            .into_iter()
            .map(|candidate| match candidate.content {
                CandidateContent::Parts { parts } => {
                    parts.into_iter().map(|p| p.text).collect::<String>()
                }
                CandidateContent::Text(text) => text,
            })
            .collect();

        (!texts.is_empty()).then_some(GenerationResponse::Candidates(texts))
    }

    fn output(body: &Value) -> Option<GenerationResponse> {
        let output: Vec<OutputItem> = serde_json::from_value(body.get("output")?.clone()).ok()?;
        let text = output.into_iter().next()?.content.into_iter().next()?.text;
        Some(GenerationResponse::Output(text))
    }

    fn text(body: &Value) -> Option<GenerationResponse> {
        body.get("text")?
            .as_str()
            .map(|text| GenerationResponse::Text(text.to_owned()))
    }

    pub fn into_text(self) -> String {
        match self {
            GenerationResponse::Candidates(texts) => texts.join("\n"),
            GenerationResponse::Output(text) | GenerationResponse::Text(text) => text,
        }
    }
}

/// Pulls the generated text out of a response body, or reports the raw body.
pub fn extract_text(body: &Value) -> Result<String, GenerationError> {
    GenerationResponse::parse(body)
        .map(GenerationResponse::into_text)
        .ok_or_else(|| GenerationError::UnrecognizedResponse {
            raw: body.to_string(),
        })
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderError,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    status: Option<String>,
    message: String,
}

pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(settings: &GeminiSettings) -> Result<GeminiClient, GenerationError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(key) = &settings.api_key {
            headers.insert(
                "x-goog-api-key",
                HeaderValue::from_str(key)
                    .map_err(|_| GenerationError::Config("API key is not a valid header".into()))?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| GenerationError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(GeminiClient {
            http,
            endpoint: format!(
                "{}/models/{}:generateContent",
                settings.api_url.trim_end_matches('/'),
                settings.model
            ),
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [OutgoingPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(GenerationError::Transport)?;

        let status = response.status();
        debug!("generation response status {status}");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ProviderErrorBody>(&body) {
                Ok(ProviderErrorBody { error }) => match error.status {
                    Some(code) => format!("{code}: {}", error.message),
                    None => error.message,
                },
                Err(_) => body,
            };
            error!("generation provider error {status}: {message}");
            return Err(GenerationError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await.map_err(GenerationError::Transport)?;
        extract_text(&body)
    }
}
