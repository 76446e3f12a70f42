//! Remote embedding providers and strategy selection.
//!
//! - **[`OpenAIProvider`]** calls `POST https://api.openai.com/v1/embeddings`.
//! - **[`OllamaProvider`]** calls `POST {url}/api/embed` on a local Ollama.
//!
//! Both make a single attempt per text. A failure is not retried here; the
//! core [`Embedder`] substitutes the deterministic vector for that call.
//!
//! # Strategy selection
//!
//! [`create_embedder`] decides once, at startup:
//!
//! | `embedding.provider` | Condition | Strategy |
//! |----------------------|-----------|----------|
//! | `"disabled"` | | deterministic |
//! | `"openai"` | `OPENAI_API_KEY` unset | deterministic |
//! | `"openai"` | key present | remote |
//! | `"ollama"` | | remote |

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

use infragraph_core::embedding::{Embedder, EmbeddingProvider};

use crate::config::EmbeddingConfig;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Embedding provider using the OpenAI API.
pub struct OpenAIProvider {
    client: reqwest::Client,
    model: String,
    api_key: String,
    endpoint: String,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            model,
            api_key,
            endpoint: OPENAI_EMBEDDINGS_URL.to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("OpenAI connection error")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }
        let json: serde_json::Value = response.json().await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[0].embedding`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data[0].embedding"))?;
    to_f32(embedding).context("Invalid OpenAI response")
}

/// Embedding provider using a local Ollama instance.
pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    url: String,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for Ollama provider"))?;
        let url = config
            .url
            .as_deref()
            .unwrap_or(DEFAULT_OLLAMA_URL)
            .trim_end_matches('/')
            .to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, model, url })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Ollama connection error (is Ollama running at {}?)", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Ollama API error {}: {}", status, body_text);
        }
        let json: serde_json::Value = response.json().await?;
        parse_ollama_response(&json)
    }
}

/// Extract `embeddings[0]`.
fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .and_then(|e| e.first())
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings[0]"))?;
    to_f32(embedding).context("Invalid Ollama response")
}

/// Every entry must be a number; anything else rejects the whole vector.
fn to_f32(values: &[serde_json::Value]) -> Result<Vec<f32>> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("non-numeric embedding value at index {}: {}", i, v))
        })
        .collect()
}

/// Build the [`Embedder`] for this run, reading `OPENAI_API_KEY` from the
/// environment.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Embedder> {
    select_embedder(config, std::env::var("OPENAI_API_KEY").ok())
}

fn select_embedder(config: &EmbeddingConfig, openai_key: Option<String>) -> Result<Embedder> {
    if !config.is_enabled() {
        let embedder = Embedder::deterministic();
        info!(strategy = ?embedder.strategy(), "embedding provider disabled");
        return Ok(embedder);
    }
    let embedder = match config.provider.as_str() {
        "openai" => match openai_key.filter(|k| !k.is_empty()) {
            Some(key) => Embedder::remote(Box::new(OpenAIProvider::new(config, key)?)),
            None => {
                warn!("OPENAI_API_KEY not set, using deterministic embeddings");
                Embedder::deterministic()
            }
        },
        "ollama" => Embedder::remote(Box::new(OllamaProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    };
    info!(
        strategy = ?embedder.strategy(),
        model = embedder.model_name(),
        "embedding strategy selected"
    );
    Ok(embedder)
}
