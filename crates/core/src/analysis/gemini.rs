use super::{AnalysisClient, AnalysisRequest, AnalysisResult};
use crate::config::Config;
use crate::error::AnalysisError;
use gemini_rust::{Blob, Content, Gemini, Message, Part, Role};

const SYSTEM_PROMPT: &str = "You analyse screenshots of programming problems. \
Answer with a single JSON object with the string fields \"explanation\" (a short summary), \
\"solution\" (the code, wrapped in a fenced code block with a language tag) and \
\"explanationDetailed\" (a step by step walkthrough including complexity). \
Do not add any text outside the JSON object.";

/// Production backend: Google Gemini vision models.
pub struct GeminiClient {
    client: Gemini,
    model_name: String,
}

impl GeminiClient {
    /// # Errors
    ///
    /// Returns [`AnalysisError::Config`] without an API key or if the client
    /// cannot be built.
    pub fn new(config: &Config) -> Result<Self, AnalysisError> {
        let api_key = config
            .gemini_api_key
            .as_deref()
            .ok_or_else(|| AnalysisError::Config("GEMINI_API_KEY is not set".into()))?;

        // Explicit base URL avoids the BadScheme error of the default one
        let base_url = url::Url::parse("https://generativelanguage.googleapis.com/v1beta/")
            .map_err(|e| AnalysisError::Config(format!("Invalid base URL: {}", e)))?;

        let model_name = if config.model_name.starts_with("models/") {
            config.model_name.clone()
        } else {
            format!("models/{}", config.model_name)
        };
        let model_url = format!("https://generativelanguage.googleapis.com/v1beta/{}", model_name);

        let client = Gemini::with_model_and_base_url(api_key, model_url, base_url)
            .map_err(|e| AnalysisError::Config(format!("Failed to create Gemini client: {}", e)))?;

        Ok(Self {
            client,
            model_name,
        })
    }

    /// Prompt first, then every screenshot as inline PNG data.
    fn build_message(request: AnalysisRequest) -> Message {
        let mut parts = Vec::with_capacity(request.artifacts.len() + 1);
        parts.push(Part::Text {
            text: request.prompt_text,
            thought: None,
            thought_signature: None,
        });
        parts.extend(request.artifacts.into_iter().map(|artifact| Part::InlineData {
            inline_data: Blob {
                mime_type: "image/png".to_string(),
                data: artifact.image_data,
            },
            media_resolution: None,
        }));

        Message {
            role: Role::User,
            content: Content {
                role: Some(Role::User),
                parts: Some(parts),
            },
        }
    }
}

impl AnalysisClient for GeminiClient {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        log::info!(
            "Sending {} screenshot(s) to {}",
            request.artifacts.len(),
            self.model_name
        );
        let message = Self::build_message(request);

        let response = self
            .client
            .generate_content()
            .with_system_prompt(SYSTEM_PROMPT)
            .with_messages(vec![message])
            .execute()
            .await
            .map_err(|e| {
                let detail = format!("{:?}", e);
                if detail.contains("429") || detail.contains("RESOURCE_EXHAUSTED") {
                    AnalysisError::RateLimited
                } else {
                    AnalysisError::request(detail)
                }
            })?;

        // Join every non-thought text part of the first candidate
        let text: String = response
            .candidates
            .first()
            .and_then(|candidate| candidate.content.parts.as_ref())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| match part {
                        Part::Text { text, thought, .. } if !thought.unwrap_or(false) => {
                            Some(text.as_str())
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AnalysisError::parse("No text response received from Gemini"));
        }
        AnalysisResult::from_completion(&text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ScreenshotArtifact;

    #[test]
    fn message_carries_prompt_and_every_image() {
        let request = AnalysisRequest::new(
            "solve it",
            "default",
            vec![
                ScreenshotArtifact::new("AAA".into()),
                ScreenshotArtifact::new("BBB".into()),
            ],
        );
        let message = GeminiClient::build_message(request);
        let parts = message.content.parts.unwrap();

        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[0], Part::Text { text, .. } if text == "solve it"));
        assert!(matches!(
            &parts[2],
            Part::InlineData { inline_data, .. } if inline_data.data == "BBB" && inline_data.mime_type == "image/png"
        ));
    }

    #[test]
    fn requires_api_key() {
        let config = Config::default();
        assert!(matches!(
            GeminiClient::new(&config),
            Err(AnalysisError::Config(_))
        ));
    }
}
