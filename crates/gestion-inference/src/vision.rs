//! Vision backend trait and the Ollama implementation.

use async_trait::async_trait;
use gestion_core::{Error, GenerativePart, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Backend that answers a text instruction about one inline image or document.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Send `part` and `prompt` as a single user turn and return the model's text.
    ///
    /// A response without the expected text is [`Error::InvalidAiResponse`].
    async fn generate(&self, part: &GenerativePart, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Ollama-based vision backend (e.g., qwen3-vl, llava), for local development.
pub struct OllamaVisionBackend {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaVisionBackend {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<&'a str>, // base64 encoded
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: Option<String>,
}

#[async_trait]
impl VisionBackend for OllamaVisionBackend {
    async fn generate(&self, part: &GenerativePart, prompt: &str) -> Result<String> {
        let request = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            images: vec![&part.base64_data],
            stream: false,
        };

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Request(format!("Vision request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!(
                "Vision API returned {}: {}",
                status, body
            )));
        }

        let result: OllamaGenerateResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "ollama: unparseable response");
            Error::InvalidAiResponse
        })?;

        result
            .response
            .ok_or(Error::InvalidAiResponse)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_vision_backend_new() {
        let backend =
            OllamaVisionBackend::new("http://localhost:11434/".to_string(), "llava".to_string());
        assert_eq!(backend.base_url, "http://localhost:11434");
        assert_eq!(backend.model_name(), "llava");
    }

    #[test]
    fn test_ollama_generate_request_serialization() {
        let request = OllamaGenerateRequest {
            model: "llava",
            prompt: "What was paid?",
            images: vec!["base64data"],
            stream: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llava");
        assert_eq!(json["prompt"], "What was paid?");
        assert_eq!(json["images"][0], "base64data");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_ollama_generate_response_without_text() {
        let response: OllamaGenerateResponse = serde_json::from_str(r#"{"done": true}"#).unwrap();
        assert!(response.response.is_none());
    }
}
