#![doc = "HTTP generation backend for the CLI: implements the core GenerationClient trait against the Gemini generateContent API."]
//
//! # Generation backend (CLI <-> Core)
//!
//! [`GeminiClient`] is the production implementation of
//! [`deckgen::contract::GenerationClient`]. It owns the HTTP transport and the
//! API key; the core crate only ever sees typed results and classified
//! [`RequestError`]s.
//!
//! The backend's JSON envelope is parsed into private serde types right here
//! and converted immediately, so none of its shape leaks past this module.

use async_trait::async_trait;
use base64::prelude::*;
use deckgen::contract::{AspectRatio, GeneratedImage, GeneratedText, GenerationClient};
use deckgen::error::{RequestError, RequestErrorKind};
use deckgen::slide::VisualAsset;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::info!(base_url = %base_url, "Initialized GeminiClient");
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn post(&self, model: &str, body: &Value) -> Result<String, RequestError> {
        let url = self.endpoint(model);
        tracing::debug!(url = %url, model = %model, "Calling generation backend");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, model = %model, "Generation request failed to send");
                RequestError::new(RequestErrorKind::Network, model, e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RequestError::new(RequestErrorKind::Network, model, e.to_string()))?;

        if !status.is_success() {
            let err = parse_error(status.as_u16(), &text, model);
            tracing::error!(status = %status, model = %model, error = %err, "Generation backend returned error");
            return Err(err);
        }
        Ok(text)
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate_text(&self, prompt: &str, model: &str) -> Result<GeneratedText, RequestError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });
        let text = self.post(model, &body).await?;
        parse_text(&text, model)
    }

    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        model: &str,
    ) -> Result<GeneratedImage, RequestError> {
        let body = image_body(vec![json!({ "text": prompt })], aspect_ratio);
        let text = self.post(model, &body).await?;
        parse_image(&text, model)
    }

    async fn edit_image(
        &self,
        asset: &VisualAsset,
        instruction: &str,
        aspect_ratio: AspectRatio,
        model: &str,
    ) -> Result<GeneratedImage, RequestError> {
        let parts = vec![
            json!({
                "inlineData": {
                    "mimeType": asset.mime_type,
                    "data": BASE64_STANDARD.encode(&asset.data),
                }
            }),
            json!({ "text": instruction }),
        ];
        let body = image_body(parts, aspect_ratio);
        let text = self.post(model, &body).await?;
        parse_image(&text, model)
    }
}

fn image_body(parts: Vec<Value>, aspect_ratio: AspectRatio) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseModalities": ["IMAGE"],
            "imageConfig": { "aspectRatio": aspect_ratio.as_str() }
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    status: Option<String>,
}

fn malformed(model: &str, message: impl Into<String>) -> RequestError {
    RequestError::new(RequestErrorKind::MalformedResponse, model, message)
}

fn parse_parts(body: &str, model: &str) -> Result<Vec<Part>, RequestError> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| malformed(model, format!("invalid response body: {e}")))?;
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| malformed(model, "response contained no candidates"))?;
    match candidate.content {
        Some(content) if !content.parts.is_empty() => Ok(content.parts),
        _ => Err(malformed(
            model,
            format!(
                "candidate has no content (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ),
        )),
    }
}

pub(crate) fn parse_text(body: &str, model: &str) -> Result<GeneratedText, RequestError> {
    let text: String = parse_parts(body, model)?
        .into_iter()
        .filter(|p| !p.thought)
        .filter_map(|p| p.text)
        .collect();
    if text.trim().is_empty() {
        return Err(malformed(model, "response contained no text"));
    }
    Ok(GeneratedText {
        text,
        model: model.to_string(),
    })
}

pub(crate) fn parse_image(body: &str, model: &str) -> Result<GeneratedImage, RequestError> {
    let inline = parse_parts(body, model)?
        .into_iter()
        .find_map(|p| p.inline_data)
        .ok_or_else(|| malformed(model, "response contained no image data"))?;
    let data = BASE64_STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| malformed(model, format!("image data is not valid base64: {e}")))?;
    Ok(GeneratedImage {
        mime_type: inline.mime_type,
        data,
        model: model.to_string(),
    })
}

pub(crate) fn parse_error(status: u16, body: &str, model: &str) -> RequestError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => RequestError::from_status(
            status,
            envelope.error.status.as_deref(),
            model,
            envelope.error.message,
        ),
        Err(_) => RequestError::from_status(status, None, model, body.trim().to_string()),
    }
}
