//! HTTP [`FleetSource`] for the fleet-management REST API.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use infragraph_core::fleet::{
    parse_items, ApplicationResource, FleetSource, ProjectResource, ServerResource,
    ServiceResource,
};

use crate::config::FleetConfig;

pub struct FleetClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl FleetClient {
    /// Build a client from `[fleet]`. Fails if `token_env` names an unset
    /// variable.
    pub fn new(config: &FleetConfig) -> Result<Self> {
        let token = match &config.token_env {
            Some(var) => Some(
                std::env::var(var)
                    .with_context(|| format!("fleet.token_env names {} but it is not set", var))?,
            ),
            None => None,
        };
        Self::with_token(&config.base_url, token, config.timeout_secs)
    }

    pub fn with_token(base_url: &str, token: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");
        let mut req = self.client.get(&url).header("Accept", "application/json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let response = req
            .send()
            .await
            .with_context(|| format!("Fleet API request failed: GET {}", path))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Fleet API error {} on GET {}: {}", status, path, body);
        }
        response
            .json()
            .await
            .with_context(|| format!("Invalid Fleet API response for GET {}", path))
    }

    /// A list endpoint, parsed item by item so one odd resource does not
    /// cost the whole category.
    async fn list<T: DeserializeOwned>(&self, path: &str, kind: &str) -> Result<Vec<T>> {
        let items: Vec<serde_json::Value> = self.get(path).await?;
        Ok(parse_items(kind, items))
    }
}

#[async_trait]
impl FleetSource for FleetClient {
    async fn list_servers(&self) -> Result<Vec<ServerResource>> {
        self.list("/servers", "servers").await
    }

    async fn list_projects(&self) -> Result<Vec<ProjectResource>> {
        self.list("/projects", "projects").await
    }

    async fn get_project(&self, uuid: &str) -> Result<ProjectResource> {
        self.get(&format!("/projects/{}", uuid)).await
    }

    async fn list_services(&self) -> Result<Vec<ServiceResource>> {
        self.list("/services", "services").await
    }

    async fn list_applications(&self) -> Result<Vec<ApplicationResource>> {
        self.list("/applications", "applications").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let c = FleetClient::with_token("http://fleet.local/api/v1/", None, 5).unwrap();
        assert_eq!(c.base_url, "http://fleet.local/api/v1");
    }

    #[test]
    fn test_unset_token_env_fails() {
        let cfg = FleetConfig {
            base_url: "http://fleet.local".into(),
            token_env: Some("IGRAPH_TEST_SURELY_UNSET_FLEET_TOKEN".into()),
            timeout_secs: 5,
        };
        assert!(FleetClient::new(&cfg).is_err());
    }
}
