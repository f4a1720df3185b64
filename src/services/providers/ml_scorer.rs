//! HTTP client for the outfit scoring server
//!
//! POST {base_url}/recommend with the candidate items and sampled weights.

use std::time::Duration;

use reqwest::Client as HttpClient;

use crate::{
    error::{AppError, AppResult},
    services::providers::{ScoreRequest, ScoreResponse, Scorer},
};

#[derive(Clone)]
pub struct MlScorer {
    http_client: HttpClient,
    base_url: String,
    timeout: Duration,
}

impl MlScorer {
    pub fn new(base_url: String, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/recommend", self.base_url)
    }

    async fn send(&self, request: &ScoreRequest) -> AppResult<ScoreResponse> {
        let response = self
            .http_client
            .post(self.endpoint())
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Scorer request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Scorer returned an error status");
            return Err(AppError::UpstreamUnavailable(format!(
                "Scorer returned status {}",
                status
            )));
        }

        response
            .json::<ScoreResponse>()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Malformed scorer response: {}", e)))
    }
}

#[async_trait::async_trait]
impl Scorer for MlScorer {
    async fn score(&self, request: &ScoreRequest) -> AppResult<ScoreResponse> {
        tracing::debug!(
            candidates = request.closet_items.len(),
            top_k = request.top_k,
            "Calling outfit scorer"
        );

        match tokio::time::timeout(self.timeout, self.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::UpstreamUnavailable(format!(
                "Scorer timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "ml-server"
    }
}
