//! AI invocation with a bounded wait and caller-safe failures.

use std::sync::Arc;
use std::time::Duration;

use gestion_core::{Error, GenerativePart, Result};
use tracing::{debug, error};

use crate::vision::VisionBackend;

/// Wraps a [`VisionBackend`] with a timeout.
///
/// Every failure leaves here as [`Error::AiFailed`] or
/// [`Error::InvalidAiResponse`]; the upstream error is only logged.
#[derive(Clone)]
pub struct AiInvoker {
    backend: Arc<dyn VisionBackend>,
    timeout: Duration,
}

impl AiInvoker {
    pub fn new(backend: Arc<dyn VisionBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    pub async fn invoke(&self, part: &GenerativePart, prompt: &str) -> Result<String> {
        let outcome = tokio::time::timeout(self.timeout, self.backend.generate(part, prompt)).await;

        match outcome {
            Ok(Ok(text)) => {
                debug!(model = %self.model_name(), chars = text.len(), "AI answer received");
                Ok(text)
            }
            Ok(Err(Error::InvalidAiResponse)) => {
                error!(model = %self.model_name(), "AI response had no text");
                Err(Error::InvalidAiResponse)
            }
            Ok(Err(e)) => {
                error!(model = %self.model_name(), error = %e, "AI call failed");
                Err(Error::AiFailed)
            }
            Err(_) => {
                error!(
                    model = %self.model_name(),
                    timeout_secs = self.timeout.as_secs(),
                    "AI call timed out"
                );
                Err(Error::AiFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gestion_core::{AI_FAILURE_MESSAGE, INVALID_AI_RESPONSE_MESSAGE};

    enum Behavior {
        Answer(&'static str),
        Fail,
        NoText,
        Hang,
    }

    struct ScriptedBackend(Behavior);

    #[async_trait]
    impl VisionBackend for ScriptedBackend {
        async fn generate(&self, _part: &GenerativePart, _prompt: &str) -> Result<String> {
            match self.0 {
                Behavior::Answer(text) => Ok(text.to_string()),
                Behavior::Fail => Err(Error::Request("quota exceeded for project".into())),
                Behavior::NoText => Err(Error::InvalidAiResponse),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok("never".into())
                }
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn part() -> GenerativePart {
        GenerativePart {
            mime_type: "image/png".into(),
            base64_data: "AAAA".into(),
        }
    }

    fn invoker(behavior: Behavior) -> AiInvoker {
        AiInvoker::new(Arc::new(ScriptedBackend(behavior)), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_answer_passes_through() {
        let text = invoker(Behavior::Answer("500.00")).invoke(&part(), "p").await.unwrap();
        assert_eq!(text, "500.00");
    }

    #[tokio::test]
    async fn test_call_failure_is_generic() {
        let err = invoker(Behavior::Fail).invoke(&part(), "p").await.unwrap_err();
        assert!(matches!(err, Error::AiFailed));
        assert_eq!(err.public_message(), AI_FAILURE_MESSAGE);
        assert!(!err.to_string().contains("quota"));
    }

    #[tokio::test]
    async fn test_missing_text_is_invalid_response() {
        let err = invoker(Behavior::NoText).invoke(&part(), "p").await.unwrap_err();
        assert!(matches!(err, Error::InvalidAiResponse));
        assert_eq!(err.public_message(), INVALID_AI_RESPONSE_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_generic_failure() {
        let err = invoker(Behavior::Hang).invoke(&part(), "p").await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), AI_FAILURE_MESSAGE);
    }
}
