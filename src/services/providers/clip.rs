//! CLIP embedding service client
//!
//! Text: POST {base_url}/encode-text {"text": ..} → {"vector": [..]}
//! Image: POST {base_url}/encode-image multipart "image" → {"vector": [..]}

use std::time::Duration;

use reqwest::{multipart, Client as HttpClient};
use serde::Deserialize;
use serde_json::json;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    services::providers::Embedder,
};

const TEXT_VECTOR_CACHE_TTL: u64 = 86400; // 1 day

#[derive(Debug, Deserialize)]
struct VectorResponse {
    vector: Vec<f32>,
}

impl VectorResponse {
    fn into_vector(self) -> AppResult<Vec<f32>> {
        if self.vector.is_empty() || self.vector.iter().any(|v| !v.is_finite()) {
            return Err(AppError::UpstreamUnavailable(
                "Embedder returned an empty or non-finite vector".to_string(),
            ));
        }
        Ok(self.vector)
    }
}

#[derive(Clone)]
pub struct ClipEmbedder {
    http_client: HttpClient,
    base_url: String,
    text_timeout: Duration,
    image_timeout: Duration,
}

impl ClipEmbedder {
    pub fn new(base_url: String, text_timeout: Duration, image_timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            http_client: HttpClient::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            text_timeout,
            image_timeout,
        })
    }

    async fn read_vector(response: reqwest::Response) -> AppResult<Vec<f32>> {
        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(status = %status, "Embedder returned an error status");
            return Err(AppError::UpstreamUnavailable(format!(
                "Embedder returned status {}",
                status
            )));
        }
        response
            .json::<VectorResponse>()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Malformed embedder response: {}", e)))?
            .into_vector()
    }
}

fn upstream(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::UpstreamUnavailable("Embedder timed out".to_string())
    } else {
        AppError::UpstreamUnavailable(format!("Embedder request failed: {}", e))
    }
}

#[async_trait::async_trait]
impl Embedder for ClipEmbedder {
    async fn encode_text(&self, text: &str) -> AppResult<Vec<f32>> {
        let response = self
            .http_client
            .post(format!("{}/encode-text", self.base_url))
            .timeout(self.text_timeout)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(upstream)?;
        Self::read_vector(response).await
    }

    async fn encode_image(&self, image: Vec<u8>, file_name: String) -> AppResult<Vec<f32>> {
        let form = multipart::Form::new().part("image", multipart::Part::bytes(image).file_name(file_name));
        let response = self
            .http_client
            .post(format!("{}/encode-image", self.base_url))
            .timeout(self.image_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(upstream)?;
        Self::read_vector(response).await
    }
}

/// Embedder wrapper that caches text vectors in Redis
pub struct CachedEmbedder<E> {
    inner: E,
    cache: Cache,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn new(inner: E, cache: Cache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait::async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    async fn encode_text(&self, text: &str) -> AppResult<Vec<f32>> {
        let key = CacheKey::TextVector(text.to_string());
        cached!(self.cache, key, TEXT_VECTOR_CACHE_TTL, self.inner.encode_text(text))
    }

    async fn encode_image(&self, image: Vec<u8>, file_name: String) -> AppResult<Vec<f32>> {
        self.inner.encode_image(image, file_name).await
    }
}
