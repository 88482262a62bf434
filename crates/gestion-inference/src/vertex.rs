//! Gemini on Vertex AI via the `generateContent` REST method.

use std::sync::Arc;

use async_trait::async_trait;
use gestion_core::{CredentialProvider, Error, GenerativePart, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::vision::VisionBackend;

pub struct VertexVisionBackend {
    endpoint: String,
    model: String,
    credentials: Arc<dyn CredentialProvider>,
    client: reqwest::Client,
}

impl VertexVisionBackend {
    pub fn new(
        project_id: &str,
        location: &str,
        model: String,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let base_url = format!("https://{}-aiplatform.googleapis.com", location);
        Self::with_base_url(base_url, project_id, location, model, credentials)
    }

    /// Use a different host (regional override, tests).
    pub fn with_base_url(
        base_url: String,
        project_id: &str,
        location: &str,
        model: String,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let endpoint = format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            project_id,
            location,
            model
        );
        Self {
            endpoint,
            model,
            credentials,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestPart<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

fn build_request<'a>(part: &'a GenerativePart, prompt: &'a str) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![
                RequestPart {
                    inline_data: Some(InlineData {
                        mime_type: &part.mime_type,
                        data: &part.base64_data,
                    }),
                    text: None,
                },
                RequestPart {
                    inline_data: None,
                    text: Some(prompt),
                },
            ],
        }],
    }
}

/// Concatenated text of the first candidate, or `None` when there is none.
fn extract_text(response: GenerateContentResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let texts: Vec<String> = content.parts.into_iter().filter_map(|p| p.text).collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.concat())
    }
}

#[async_trait]
impl VisionBackend for VertexVisionBackend {
    async fn generate(&self, part: &GenerativePart, prompt: &str) -> Result<String> {
        let token = self.credentials.access_token().await?;
        debug!(model = %self.model, mime_type = %part.mime_type, "vertex: generateContent");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&build_request(part, prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!(
                "Vertex AI returned {}: {}",
                status, body
            )));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "vertex: unparseable response");
            Error::InvalidAiResponse
        })?;

        extract_text(parsed).ok_or(Error::InvalidAiResponse)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
