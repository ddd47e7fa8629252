//! Offline stand-in backend.
//!
//! Answers every request with one result picked at random from a fixed
//! collection, after an artificial delay. Screenshot contents are ignored.

use super::{AnalysisClient, AnalysisRequest, AnalysisResult, SeededEntry, pick_random};
use crate::error::AnalysisError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const SIMULATED_LATENCY: Duration = Duration::from_millis(600);

/// json-server `db.json` layout.
#[derive(Deserialize)]
struct SeedFile {
    responses: Vec<SeededEntry>,
}

#[derive(Debug)]
pub struct SeededClient {
    results: Vec<AnalysisResult>,
    latency: Duration,
}

impl SeededClient {
    pub fn new(results: Vec<AnalysisResult>, latency: Duration) -> Self {
        Self { results, latency }
    }

    /// The collection shipped with the application.
    pub fn builtin() -> Self {
        Self::new(builtin_results(), SIMULATED_LATENCY)
    }

    /// Reads the `responses` array of a json-server database file.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Config`] if the file cannot be read or
    /// parsed.
    pub fn from_file(path: &Path) -> Result<Self, AnalysisError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::Config(format!("cannot read seed file {}: {}", path.display(), e))
        })?;
        let seed: SeedFile = serde_json::from_str(&content).map_err(|e| {
            AnalysisError::Config(format!("invalid seed file {}: {}", path.display(), e))
        })?;
        log::info!("Loaded {} seeded results from {}", seed.responses.len(), path.display());
        Ok(Self::new(
            seed.responses.into_iter().map(|e| e.response).collect(),
            SIMULATED_LATENCY,
        ))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl AnalysisClient for SeededClient {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        log::debug!(
            "Seeded analysis of {} screenshot(s), prompt {:?}",
            request.artifacts.len(),
            request.prompt_text
        );
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        pick_random(&self.results).ok_or(AnalysisError::Empty)
    }

    fn name(&self) -> &str {
        "seeded"
    }
}

fn builtin_results() -> Vec<AnalysisResult> {
    vec![
        AnalysisResult {
            explanation: Some(
                "The task asks for the indices of two numbers that add up to a target. \
                 A hash map of seen values gives a single pass solution."
                    .into(),
            ),
            solution: Some(
                "```python\ndef two_sum(nums, target):\n    seen = {}\n    for i, n in enumerate(nums):\n        if target - n in seen:\n            return [seen[target - n], i]\n        seen[n] = i\n    return []\n```"
                    .into(),
            ),
            explanation_detailed: Some(
                "For every element we check whether its complement was already seen. \
                 Lookups are O(1) on average, so the whole pass is O(n) time and O(n) space."
                    .into(),
            ),
        },
        AnalysisResult {
            explanation: Some(
                "The screenshot shows a string reversal exercise. Iterating from both ends \
                 and swapping in place avoids extra allocations."
                    .into(),
            ),
            solution: Some(
                "```javascript\nfunction reverseString(s) {\n  let i = 0, j = s.length - 1;\n  while (i < j) {\n    [s[i], s[j]] = [s[j], s[i]];\n    i++; j--;\n  }\n  return s;\n}\n```"
                    .into(),
            ),
            explanation_detailed: Some(
                "Two pointers start at the first and last index and move towards each other, \
                 swapping as they go. Runs in O(n) time with O(1) extra space."
                    .into(),
            ),
        },
        AnalysisResult {
            explanation: Some(
                "The query needs the second highest salary. Excluding the maximum and taking \
                 the maximum of what is left handles ties and the single-row case."
                    .into(),
            ),
            solution: Some(
                "```sql\nSELECT MAX(salary) AS SecondHighestSalary\nFROM Employee\nWHERE salary < (SELECT MAX(salary) FROM Employee);\n```"
                    .into(),
            ),
            explanation_detailed: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn picks_from_the_collection() {
        let client = SeededClient::new(builtin_results(), Duration::ZERO);
        let result = client
            .analyze(AnalysisRequest::new("", "explain", Vec::new()))
            .await
            .unwrap();
        assert!(builtin_results().contains(&result));
        assert!(result.clean_solution().is_some());
    }

    #[tokio::test]
    async fn empty_collection_is_an_error() {
        let client = SeededClient::new(Vec::new(), Duration::ZERO);
        let err = client
            .analyze(AnalysisRequest::new("", "explain", Vec::new()))
            .await
            .unwrap_err();
        assert_eq!(err, AnalysisError::Empty);
    }

    #[test]
    fn reads_json_server_database() {
        let path = std::env::temp_dir().join(format!("shade-shot-seed-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{ "responses": [
                { "id": 1, "response": { "explanation": "a", "solution": "```\nb\n```" } },
                { "id": 2, "response": { "explanationDetailed": "c" } }
            ] }"#,
        )
        .unwrap();

        let client = SeededClient::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(client.len(), 2);
    }

    #[test]
    fn missing_seed_file_is_a_config_error() {
        let err = SeededClient::from_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }
}
