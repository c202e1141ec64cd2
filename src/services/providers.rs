// Remote Classifier Transport
// Implements the Gemini generateContent call behind a swappable trait

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::config_store::{ClassifierSettings, ConfigStore};

pub const PROVIDER_NAME: &str = "gemini";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured")]
    MissingApiKey,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestPart {
    Text(String),
    InlineImage { mime_type: String, data: String },
}

/// Everything the remote model needs for one classification call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: String,
    pub parts: Vec<RequestPart>,
    /// Structured-output schema; `None` for models that do not support one.
    pub response_schema: Option<Value>,
    pub grounded_search: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WebSource {
    pub title: Option<String>,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateReply {
    pub text: String,
    pub grounding: Vec<WebSource>,
    pub latency_ms: i64,
}

/// Outbound seam to the hosted model. Tests plug in a fake implementation.
#[async_trait]
pub trait ClassifierTransport: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateReply, ProviderError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    grounding_chunks: Option<Vec<GroundingChunk>>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, settings: &ClassifierSettings) -> Result<Self, ProviderError> {
        Self::build(api_key, settings, None)
    }

    pub fn with_proxy(
        api_key: &str,
        settings: &ClassifierSettings,
        proxy_url: &str,
    ) -> Result<Self, ProviderError> {
        Self::build(api_key, settings, Some(proxy_url))
    }

    fn build(
        api_key: &str,
        settings: &ClassifierSettings,
        proxy_url: Option<&str>,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ProviderError::MissingApiKey);
        }

        let mut builder = Client::builder().timeout(Duration::from_secs(settings.timeout_secs));
        if let Some(proxy_url) = proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        let base_url = env::var("GEMINI_API_URL").unwrap_or_else(|_| settings.base_url.clone());

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl ClassifierTransport for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateReply, ProviderError> {
        let body = build_request_body(request);
        let start = Instant::now();

        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        extract_reply(data, latency_ms)
    }
}

/// Map a `GenerateRequest` onto the generateContent JSON body.
pub fn build_request_body(request: &GenerateRequest) -> Value {
    let parts: Vec<Value> = request
        .parts
        .iter()
        .map(|p| match p {
            RequestPart::Text(text) => json!({ "text": text }),
            RequestPart::InlineImage { mime_type, data } => json!({
                "inlineData": { "mimeType": mime_type, "data": data }
            }),
        })
        .collect();

    let mut body = json!({
        "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
        "contents": [{ "role": "user", "parts": parts }],
    });

    if let Some(schema) = &request.response_schema {
        body["generationConfig"] = json!({
            "responseMimeType": "application/json",
            "responseSchema": schema,
        });
    }

    if request.grounded_search {
        body["tools"] = json!([{ "googleSearch": {} }]);
    }

    body
}

fn extract_reply(data: GenerateContentResponse, latency_ms: i64) -> Result<GenerateReply, ProviderError> {
    let candidate = data
        .candidates
        .and_then(|c| c.into_iter().next())
        .ok_or(ProviderError::MissingContent)?;

    let text: String = candidate
        .content
        .and_then(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();

    if text.trim().is_empty() {
        return Err(ProviderError::MissingContent);
    }

    let grounding = candidate
        .grounding_metadata
        .and_then(|g| g.grounding_chunks)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|chunk| chunk.web)
        .collect();

    Ok(GenerateReply {
        text,
        grounding,
        latency_ms,
    })
}

/// Get API key from environment or config file
pub fn get_api_key() -> Option<String> {
    for key in ["GEMINI_API_KEY", "SCAMSHIELD_API_KEY", "API_KEY"] {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    let config_dir = ConfigStore::default_config_dir()?;
    ConfigStore::new(config_dir)
        .get_api_key(PROVIDER_NAME)
        .ok()
        .flatten()
}
