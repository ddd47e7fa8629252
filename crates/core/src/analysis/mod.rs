//! Analysis of captured screenshots.
//!
//! The workflow only knows the [`AnalysisClient`] trait. Three backends
//! implement it:
//!
//! - [`SeededClient`]: canned results picked at random, no network
//! - [`ServerClient`]: canned results fetched from a local json-server
//! - [`GeminiClient`]: a real vision model
//!
//! [`Backend`] picks one of them from the [`Config`].

mod gemini;
mod seeded;
mod server;

pub use gemini::GeminiClient;
pub use seeded::SeededClient;
pub use server::ServerClient;

use crate::capture::ScreenshotArtifact;
use crate::config::{BackendKind, Config};
use crate::error::AnalysisError;
use rand::seq::SliceRandom;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::LazyLock;

static FENCE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(```|~~~)[\w+#.\-]*\s*$").expect("fence line pattern is valid")
});

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(```|~~~)[\w+#.\-]*[ \t]*\r?\n.*?(```|~~~)").expect("fenced block pattern is valid")
});

/// Everything sent to the backend for one submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub prompt_text: String,
    pub artifacts: Vec<ScreenshotArtifact>,
}

impl AnalysisRequest {
    /// Uses `description` as the prompt, or `default_prompt` when it is
    /// blank.
    pub fn new(description: &str, default_prompt: &str, artifacts: Vec<ScreenshotArtifact>) -> Self {
        let description = description.trim();
        let prompt_text = if description.is_empty() {
            default_prompt.to_string()
        } else {
            description.to_string()
        };
        Self {
            prompt_text,
            artifacts,
        }
    }
}

/// Structured answer of the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisResult {
    pub explanation: Option<String>,
    /// May still be wrapped in fence markers; see [`Self::clean_solution`].
    pub solution: Option<String>,
    pub explanation_detailed: Option<String>,
}

impl AnalysisResult {
    /// The solution with fence markers removed, if there is one.
    pub fn clean_solution(&self) -> Option<String> {
        self.solution
            .as_deref()
            .map(strip_code_fences)
            .filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.explanation.is_none() && self.solution.is_none() && self.explanation_detailed.is_none()
    }

    /// Interprets free-form model output.
    ///
    /// A JSON object (optionally fenced) is taken as is. Otherwise the first
    /// fenced block becomes the solution and the remaining text the
    /// explanation.
    pub fn from_completion(text: &str) -> Result<Self, AnalysisError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AnalysisError::Empty);
        }

        if let Ok(result) = serde_json::from_str::<AnalysisResult>(&strip_code_fences(text)) {
            if !result.is_empty() {
                return Ok(result);
            }
        }

        let Some(block) = FENCED_BLOCK.find(text) else {
            return Ok(Self {
                explanation: Some(text.to_string()),
                ..Self::default()
            });
        };

        // Text around the block is rejoined with a single blank line
        let rest = [text[..block.start()].trim(), text[block.end()..].trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(Self {
            explanation: (!rest.is_empty()).then_some(rest),
            solution: Some(block.as_str().to_string()),
            explanation_detailed: None,
        })
    }
}

/// One entry of a json-server style collection: `{ "id": 1, "response": {...} }`.
#[derive(Debug, Deserialize)]
pub(crate) struct SeededEntry {
    pub response: AnalysisResult,
}

/// Removes a leading and a trailing fence line and surrounding whitespace.
///
/// `"```python\nprint(1)\n```"` becomes `"print(1)"`.
pub fn strip_code_fences(text: &str) -> String {
    let mut lines: Vec<&str> = text.trim().lines().collect();
    if lines.first().is_some_and(|l| FENCE_LINE.is_match(l)) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| FENCE_LINE.is_match(l)) {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

/// Uniform random pick; `None` for an empty slice.
pub(crate) fn pick_random(results: &[AnalysisResult]) -> Option<AnalysisResult> {
    results.choose(&mut rand::thread_rng()).cloned()
}

/// Submits screenshots plus prompt and returns the structured result.
///
/// Implementations do not retry.
pub trait AnalysisClient: Send + Sync + 'static {
    fn analyze(
        &self,
        request: AnalysisRequest,
    ) -> impl Future<Output = Result<AnalysisResult, AnalysisError>> + Send;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Runtime-selected backend.
pub enum Backend {
    Seeded(SeededClient),
    Server(ServerClient),
    Gemini(GeminiClient),
}

impl Backend {
    /// Builds the backend named in the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Config`] for a bad URL, an unreadable seed
    /// file or a missing API key.
    pub fn from_config(config: &Config) -> Result<Self, AnalysisError> {
        let backend = match config.backend {
            BackendKind::Seeded => match &config.seed_file {
                Some(path) => Self::Seeded(SeededClient::from_file(path)?),
                None => Self::Seeded(SeededClient::builtin()),
            },
            BackendKind::Server => Self::Server(ServerClient::new(&config.server_url)?),
            BackendKind::Gemini => Self::Gemini(GeminiClient::new(config)?),
        };
        log::info!("Using {} analysis backend", backend.name());
        Ok(backend)
    }
}

impl AnalysisClient for Backend {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        match self {
            Self::Seeded(client) => client.analyze(request).await,
            Self::Server(client) => client.analyze(request).await,
            Self::Gemini(client) => client.analyze(request).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Seeded(client) => client.name(),
            Self::Server(client) => client.name(),
            Self::Gemini(client) => client.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences_around_code() {
        assert_eq!(strip_code_fences("```python\nprint(1)\n```"), "print(1)");
        assert_eq!(strip_code_fences("```\r\nlet x = 1;\r\n```\r\n"), "let x = 1;");
        assert_eq!(strip_code_fences("~~~c++\nint x;\n~~~"), "int x;");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences("  print(1)\n"), "print(1)");
        assert_eq!(strip_code_fences("a ``` b"), "a ``` b");
    }

    #[test]
    fn keeps_inner_fences() {
        let text = "```md\n```js\nx\n```\n```";
        assert_eq!(strip_code_fences(text), "```js\nx\n```");
    }

    #[test]
    fn clean_solution_drops_blank_code() {
        let result = AnalysisResult {
            solution: Some("```\n```".into()),
            ..Default::default()
        };
        assert_eq!(result.clean_solution(), None);
    }

    #[test]
    fn result_uses_camel_case_keys() {
        let result: AnalysisResult = serde_json::from_str(
            r#"{ "explanation": "short", "explanationDetailed": "long" }"#,
        )
        .unwrap();
        assert_eq!(result.explanation_detailed.as_deref(), Some("long"));
        assert!(result.solution.is_none());
    }

    #[test]
    fn completion_as_json_object() {
        let text = "```json\n{\"explanation\":\"e\",\"solution\":\"```py\\nx\\n```\"}\n```";
        let result = AnalysisResult::from_completion(text).unwrap();
        assert_eq!(result.explanation.as_deref(), Some("e"));
        assert_eq!(result.clean_solution().as_deref(), Some("x"));
    }

    #[test]
    fn completion_with_code_block() {
        let text = "Use a set.\n\n```python\nprint(len(set(xs)))\n```\n\nRuns in O(n).";
        let result = AnalysisResult::from_completion(text).unwrap();
        assert_eq!(result.clean_solution().as_deref(), Some("print(len(set(xs)))"));
        assert_eq!(
            result.explanation.as_deref(),
            Some("Use a set.\n\nRuns in O(n).")
        );
    }

    #[test]
    fn completion_starting_with_code_block() {
        let result = AnalysisResult::from_completion("```js\nx()\n```\n\n\nCalls x.").unwrap();
        assert_eq!(result.clean_solution().as_deref(), Some("x()"));
        assert_eq!(result.explanation.as_deref(), Some("Calls x."));
    }

    #[test]
    fn completion_plain_text() {
        let result = AnalysisResult::from_completion("It is a cat.").unwrap();
        assert_eq!(result.explanation.as_deref(), Some("It is a cat."));
        assert!(result.solution.is_none());
        assert_eq!(AnalysisResult::from_completion("  "), Err(AnalysisError::Empty));
    }

    #[test]
    fn request_falls_back_to_default_prompt() {
        let request = AnalysisRequest::new("   ", "default", Vec::new());
        assert_eq!(request.prompt_text, "default");
        let request = AnalysisRequest::new(" why? ", "default", Vec::new());
        assert_eq!(request.prompt_text, "why?");
    }

    #[test]
    fn pick_random_handles_empty() {
        assert!(pick_random(&[]).is_none());
        let only = AnalysisResult {
            explanation: Some("x".into()),
            ..Default::default()
        };
        assert_eq!(pick_random(std::slice::from_ref(&only)), Some(only));
    }
}
