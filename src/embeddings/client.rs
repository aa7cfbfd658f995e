//! Concrete HTTP implementation of the embedding-service contract.
//!
//! A `reqwest::Client` built once with default headers, calls wrapped in
//! `tokio::time::timeout`, and anyhow-contextualized errors on the way out.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::EmbeddingClient;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Talks to an embedding service over HTTP POST at a configured URL.
pub struct ReqwestEmbeddingClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl ReqwestEmbeddingClient {
    pub fn new(url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build embedding HTTP client")?;
        Ok(Self { client, url, timeout })
    }
}

#[async_trait]
impl EmbeddingClient for ReqwestEmbeddingClient {
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let body = EmbedRequest { model, input: text };

        let response = tokio::time::timeout(
            self.timeout,
            self.client.post(&self.url).json(&body).send(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("embedding request to {} timed out", self.url))?
        .map_err(|e| anyhow::anyhow!("embedding request to {} failed: {e}", self.url))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "embedding service at {} returned status {}",
                self.url,
                response.status()
            );
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .context("failed to parse embedding response")?;

        parsed
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow::anyhow!("embedding service at {} returned an empty vector", self.url))
    }
}
