//! Gemini `generateContent` client

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ImageModel, InlineImage, ModelRequest};
use crate::config::GenerativeConfig;
use crate::error::{EditorResult, ModelError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(
        rename = "inline_data",
        alias = "inlineData",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    inline_data: Option<Blob>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Blob {
    #[serde(alias = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// HTTP client for the hosted image model
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &GenerativeConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.resolved_api_key(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        )
    }
}

fn build_request(request: &ModelRequest) -> GenerateRequest {
    let mut parts = vec![Part {
        text: Some(request.instruction.clone()),
        inline_data: None,
    }];
    for image in &request.images {
        parts.push(Part {
            text: None,
            inline_data: Some(Blob {
                mime_type: image.mime_type.clone(),
                data: STANDARD.encode(&image.data),
            }),
        });
    }

    GenerateRequest {
        contents: vec![Content { parts }],
        generation_config: GenerationConfig {
            response_modalities: vec!["TEXT", "IMAGE"],
        },
    }
}

/// First inline image of the first candidate
fn extract_image(response: GenerateResponse) -> Result<InlineImage, ModelError> {
    let blob = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|content| content.parts.into_iter().find_map(|p| p.inline_data))
        .ok_or(ModelError::NoImage)?;

    let data = STANDARD
        .decode(blob.data.trim())
        .map_err(|e| ModelError::InvalidResponse(format!("invalid base64 image: {}", e)))?;
    Ok(InlineImage::new(blob.mime_type, data))
}

#[async_trait]
impl ImageModel for GeminiClient {
    async fn edit(&self, request: ModelRequest) -> EditorResult<InlineImage> {
        request.validate()?;
        let api_key = self.api_key.as_deref().ok_or(ModelError::MissingApiKey)?;

        debug!(
            "Calling {} with {} image(s)",
            self.model,
            request.images.len()
        );

        let response = self
            .http
            .post(self.url())
            .query(&[("key", api_key)])
            .json(&build_request(&request))
            .send()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Model call failed with status {}", status);
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        Ok(extract_image(parsed)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let req = ModelRequest::text("Make it night")
            .with_image(InlineImage::png(vec![1, 2, 3]));
        let body = serde_json::to_value(build_request(&req)).unwrap();

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "Make it night");
        assert!(parts[0].get("inline_data").is_none());
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], STANDARD.encode([1u8, 2, 3]));
        assert_eq!(
            body["generationConfig"]["responseModalities"],
            serde_json::json!(["TEXT", "IMAGE"])
        );
    }

    #[test]
    fn test_extract_first_inline_image() {
        let json = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Here you go" },
                        { "inlineData": { "mimeType": "image/png", "data": STANDARD.encode([7u8, 7]) } },
                        { "inlineData": { "mimeType": "image/jpeg", "data": STANDARD.encode([8u8]) } }
                    ]
                }
            }]
        });
        let response: GenerateResponse = serde_json::from_value(json).unwrap();
        let image = extract_image(response).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, vec![7, 7]);
    }

    #[test]
    fn test_text_only_response_is_no_image() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "I can't do that" }] } }]
        });
        let response: GenerateResponse = serde_json::from_value(json).unwrap();
        assert!(matches!(extract_image(response), Err(ModelError::NoImage)));

        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(extract_image(empty), Err(ModelError::NoImage)));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_request() {
        let config = GenerativeConfig {
            api_key: None,
            endpoint: "http://127.0.0.1:9".to_string(),
            ..GenerativeConfig::default()
        };
        let mut client = GeminiClient::new(&config).unwrap();
        client.api_key = None;
        let err = client
            .edit(ModelRequest::text("hello"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MODEL_FAILED");
    }
}
