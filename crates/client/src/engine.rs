//! Client for the external markup-extraction engine.

use std::time::Duration;

use readgate_core::AppConfig;
use url::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("extractor request failed: {0}")]
    Network(String),
    #[error("extractor timed out after {0:?}")]
    Timeout(Duration),
    #[error("extractor returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    html: &'a str,
    url: &'a str,
}

/// What the engine made of the markup. `score` is on the engine's own
/// scale; the pipeline only compares it against the configured threshold.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineResponse {
    pub title: String,
    pub text: String,
    pub score: f64,
    pub success: bool,
    pub engine: String,
}

pub struct EngineClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl EngineClient {
    pub fn new(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .use_rustls_tls()
            .build()?;
        Ok(Self {
            http,
            endpoint: config.extractor_endpoint.trim_end_matches('/').to_string(),
            timeout: config.extract_timeout(),
        })
    }

    pub async fn extract(&self, html: &str, url: &Url) -> Result<EngineResponse, EngineError> {
        let request = self
            .http
            .post(format!("{}/extract", self.endpoint))
            .json(&ExtractRequest { html, url: url.as_str() })
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| EngineError::Timeout(self.timeout))?
            .map_err(|e| EngineError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Status(status));
        }

        let body = tokio::time::timeout(self.timeout, response.json::<EngineResponse>())
            .await
            .map_err(|_| EngineError::Timeout(self.timeout))?
            .map_err(|e| EngineError::Network(e.to_string()))?;

        tracing::debug!(
            url = %url,
            engine = %body.engine,
            score = body.score,
            success = body.success,
            "extractor response"
        );
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_from_config() {
        let config = AppConfig {
            extractor_endpoint: "http://extractor:8000/".to_string(),
            ..AppConfig::default()
        };
        let client = EngineClient::new(&config).unwrap();
        assert_eq!(client.endpoint, "http://extractor:8000");
    }

    #[test]
    fn test_response_deserializes() {
        let body = r#"{"title":"T","text":"body","score":73.5,"success":true,"engine":"trafilatura"}"#;
        let parsed: EngineResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.title, "T");
        assert!(parsed.success);
        assert!((parsed.score - 73.5).abs() < f64::EPSILON);
    }
}
