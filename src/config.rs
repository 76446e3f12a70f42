//! TOML configuration parsing and validation.
//!
//! Every command reads one file (default `./config/igraph.toml`). Only
//! `[fleet]` and `[store]` are required; `[embedding]` defaults to the
//! deterministic fallback and `[graph]` to the query defaults.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub fleet: FleetConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FleetConfig {
    pub base_url: String,
    /// Name of the env var holding the bearer token, if the API needs one.
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_collection_prefix() -> String {
    "fleet".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Ollama base URL.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            url: None,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GraphConfig {
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
    #[serde(default = "default_clear_delay_secs")]
    pub clear_delay_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
            min_score: default_min_score(),
            scan_limit: default_scan_limit(),
            list_limit: default_list_limit(),
            clear_delay_secs: default_clear_delay_secs(),
        }
    }
}

fn default_search_limit() -> usize {
    infragraph_core::query::DEFAULT_SEARCH_LIMIT
}
fn default_min_score() -> f32 {
    infragraph_core::query::DEFAULT_MIN_SCORE
}
fn default_scan_limit() -> usize {
    infragraph_core::query::DEFAULT_SCAN_LIMIT
}
fn default_list_limit() -> usize {
    infragraph_core::query::DEFAULT_LIST_LIMIT
}
fn default_clear_delay_secs() -> u64 {
    5
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.fleet.base_url.trim().is_empty() {
        bail!("fleet.base_url must not be empty");
    }
    if config.store.url.trim().is_empty() {
        bail!("store.url must not be empty");
    }

    let g = &config.graph;
    if !(0.0..=1.0).contains(&g.min_score) {
        bail!("graph.min_score must be in [0.0, 1.0]");
    }
    if g.search_limit == 0 || g.scan_limit == 0 || g.list_limit == 0 {
        bail!("graph.search_limit, graph.scan_limit and graph.list_limit must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    const MINIMAL: &str = r#"
[fleet]
base_url = "http://fleet.local/api/v1"

[store]
url = "http://localhost:6333"
"#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let f = write(MINIMAL);
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.store.collection_prefix, "fleet");
        assert!(!cfg.embedding.is_enabled());
        assert_eq!(cfg.graph.search_limit, 10);
        assert_eq!(cfg.graph.min_score, 0.5);
        assert_eq!(cfg.graph.scan_limit, 1000);
        assert_eq!(cfg.graph.list_limit, 10_000);
        assert_eq!(cfg.graph.clear_delay_secs, 5);
        assert_eq!(cfg.fleet.timeout_secs, 30);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/igraph.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let f = write(&format!("{}\n[embedding]\nprovider = \"local\"\n", MINIMAL));
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_remote_provider_needs_model() {
        let f = write(&format!("{}\n[embedding]\nprovider = \"ollama\"\n", MINIMAL));
        assert!(load_config(f.path()).is_err());

        let f = write(&format!(
            "{}\n[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\n",
            MINIMAL
        ));
        assert!(load_config(f.path()).unwrap().embedding.is_enabled());
    }

    #[test]
    fn test_min_score_range() {
        let f = write(&format!("{}\n[graph]\nmin_score = 1.5\n", MINIMAL));
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let f = write("[fleet]\nbase_url = \" \"\n[store]\nurl = \"http://q\"\n");
        assert!(load_config(f.path()).is_err());
    }
}
