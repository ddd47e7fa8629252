//! Stand-in backend served over HTTP.
//!
//! Fetches the pre-seeded result collection from a json-server instance
//! (`GET {base}/responses`) and picks one entry at random.

use super::{AnalysisClient, AnalysisRequest, AnalysisResult, SeededEntry, pick_random};
use crate::error::AnalysisError;
use reqwest::StatusCode;
use url::Url;

pub struct ServerClient {
    http: reqwest::Client,
    responses_url: Url,
}

impl ServerClient {
    /// # Errors
    ///
    /// Returns [`AnalysisError::Config`] if `base_url` is not a valid URL.
    pub fn new(base_url: &str) -> Result<Self, AnalysisError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| AnalysisError::Config(format!("invalid server URL {base_url:?}: {e}")))?;
        // `join` replaces the last segment unless the path ends with a slash
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let responses_url = base
            .join("responses")
            .map_err(|e| AnalysisError::Config(format!("invalid server URL {base_url:?}: {e}")))?;

        Ok(Self {
            http: reqwest::Client::new(),
            responses_url,
        })
    }

    pub fn responses_url(&self) -> &Url {
        &self.responses_url
    }
}

impl AnalysisClient for ServerClient {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        log::debug!(
            "Requesting seeded results from {} for {} screenshot(s)",
            self.responses_url,
            request.artifacts.len()
        );

        let response = self
            .http
            .get(self.responses_url.clone())
            .send()
            .await
            .map_err(|e| AnalysisError::request(e.to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(AnalysisError::RateLimited),
            status if !status.is_success() => return Err(AnalysisError::Status(status.as_u16())),
            _ => {}
        }

        let entries: Vec<SeededEntry> = response
            .json()
            .await
            .map_err(|e| AnalysisError::parse(e.to_string()))?;
        let results: Vec<AnalysisResult> = entries.into_iter().map(|e| e.response).collect();

        pick_random(&results).ok_or(AnalysisError::Empty)
    }

    fn name(&self) -> &str {
        "json-server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AnalysisRequest {
        AnalysisRequest::new("what is this?", "explain", Vec::new())
    }

    #[test]
    fn responses_url_keeps_base_path() {
        let client = ServerClient::new("http://localhost:3000").unwrap();
        assert_eq!(client.responses_url().as_str(), "http://localhost:3000/responses");

        let client = ServerClient::new("http://localhost:3000/api").unwrap();
        assert_eq!(client.responses_url().as_str(), "http://localhost:3000/api/responses");
    }

    #[test]
    fn rejects_invalid_url() {
        assert!(matches!(
            ServerClient::new("not a url"),
            Err(AnalysisError::Config(_))
        ));
    }

    #[tokio::test]
    async fn returns_one_of_the_served_results() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/responses")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    { "id": 1, "response": { "explanation": "first", "solution": "```py\nprint(1)\n```" } },
                    { "id": 2, "response": { "explanation": "second" } }
                ]"#,
            )
            .create_async()
            .await;

        let client = ServerClient::new(&server.url()).unwrap();
        let result = client.analyze(request()).await.unwrap();

        mock.assert_async().await;
        let explanation = result.explanation.unwrap();
        assert!(explanation == "first" || explanation == "second");
    }

    #[tokio::test]
    async fn server_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/responses")
            .with_status(500)
            .create_async()
            .await;

        let client = ServerClient::new(&server.url()).unwrap();
        assert_eq!(client.analyze(request()).await, Err(AnalysisError::Status(500)));
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/responses")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let client = ServerClient::new(&server.url()).unwrap();
        assert!(matches!(
            client.analyze(request()).await,
            Err(AnalysisError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn empty_collection_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/responses")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = ServerClient::new(&server.url()).unwrap();
        assert_eq!(client.analyze(request()).await, Err(AnalysisError::Empty));
    }
}
