//! Fleet-management API resource shapes and the [`FleetSource`] trait.
//!
//! The upstream API returns loosely-shaped JSON. Every field the mapper
//! reads is optional here and a value of the wrong shape reads as absent;
//! anything else lands in `extra` and is ignored.
//! A resource without a `uuid` (or an environment without an `id` or
//! `name`) cannot be given a stable node id and is skipped by the mapper.

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::warn;

/// Read-only access to the fleet-management API.
///
/// The application crate implements this over HTTP; tests implement it
/// with canned resources.
#[async_trait]
pub trait FleetSource: Send + Sync {
    /// `GET /servers`
    async fn list_servers(&self) -> Result<Vec<ServerResource>>;
    /// `GET /projects`
    async fn list_projects(&self) -> Result<Vec<ProjectResource>>;
    /// `GET /projects/{uuid}`, which includes `environments`.
    async fn get_project(&self, uuid: &str) -> Result<ProjectResource>;
    /// `GET /services`
    async fn list_services(&self) -> Result<Vec<ServiceResource>>;
    /// `GET /applications`
    async fn list_applications(&self) -> Result<Vec<ApplicationResource>>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerResource {
    #[serde(default, deserialize_with = "opt_text")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub ip: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub user: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerResource {
    /// SSH port, whether sent as a number or a string.
    pub fn port(&self) -> Option<u16> {
        match self.extra.get("port")? {
            Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Reachability flag, top-level or under `settings`.
    pub fn is_reachable(&self) -> Option<bool> {
        self.extra
            .get("is_reachable")
            .or_else(|| self.extra.get("settings")?.get("is_reachable"))
            .and_then(Value::as_bool)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectResource {
    #[serde(default, deserialize_with = "opt_text")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub description: Option<String>,
    /// Only populated by the detail endpoint.
    #[serde(default, deserialize_with = "lenient_list")]
    pub environments: Vec<EnvironmentResource>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentResource {
    /// Numeric upstream; kept as raw JSON so strings also work.
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, deserialize_with = "opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub updated_at: Option<String>,
}

impl EnvironmentResource {
    /// The natural key of the environment, if it has a usable id.
    pub fn key(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }
}

/// Where a service or application is deployed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DestinationRef {
    #[serde(default, deserialize_with = "opt_lenient")]
    pub server: Option<ServerRef>,
    #[serde(default, deserialize_with = "opt_text")]
    pub server_uuid: Option<String>,
}

impl DestinationRef {
    pub fn server_uuid(&self) -> Option<&str> {
        self.server
            .as_ref()
            .and_then(|s| s.uuid.as_deref())
            .or(self.server_uuid.as_deref())
            .filter(|u| !u.is_empty())
    }

    pub fn server_label(&self) -> Option<&str> {
        let server = self.server.as_ref()?;
        server.name.as_deref().or(server.ip.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerRef {
    #[serde(default, deserialize_with = "opt_text")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectRef {
    #[serde(default, deserialize_with = "opt_text")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub name: Option<String>,
}

impl ProjectRef {
    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref().filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceResource {
    #[serde(default, deserialize_with = "opt_text")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub service_type: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "opt_lenient")]
    pub destination: Option<DestinationRef>,
    #[serde(default, deserialize_with = "opt_lenient")]
    pub project: Option<ProjectRef>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub applications: Vec<ServiceApplication>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An application nested inside a service definition.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceApplication {
    #[serde(default, deserialize_with = "opt_text")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub fqdn: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationResource {
    #[serde(default, deserialize_with = "opt_text")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub fqdn: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub git_repository: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub git_branch: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub build_pack: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub ports_exposes: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "opt_lenient")]
    pub destination: Option<DestinationRef>,
    #[serde(default, deserialize_with = "opt_lenient")]
    pub project: Option<ProjectRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parse each element of a list response on its own, logging and dropping
/// the ones that do not fit `T`.
pub fn parse_items<T: DeserializeOwned>(kind: &str, items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(kind, index = i, error = %e, "Skipping malformed fleet resource");
                None
            }
        })
        .collect()
}

/// Strings pass through, numbers and booleans are stringified, anything
/// else reads as absent.
fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn opt_lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(serde_json::from_value(Value::deserialize(deserializer)?).ok())
}

/// Null or a non-array is an empty list; elements that do not fit are dropped.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()),
        _ => Ok(Vec::new()),
    }
}

/// Trimmed, non-empty `fqdn`, or `None`.
pub fn clean_fqdn(fqdn: Option<&str>) -> Option<&str> {
    fqdn.map(str::trim).filter(|f| !f.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_fields_degrade_to_none() {
        let s: ServiceResource = serde_json::from_value(json!({ "name": "redis" })).unwrap();
        assert!(s.uuid.is_none());
        assert!(s.destination.is_none());
        assert!(s.applications.is_empty());

        let nulls: ServiceResource =
            serde_json::from_value(json!({ "uuid": "s1", "applications": null })).unwrap();
        assert!(nulls.applications.is_empty());
    }

    #[test]
    fn test_destination_prefers_nested_server() {
        let d: DestinationRef = serde_json::from_value(json!({
            "server": { "uuid": "srv-1", "name": "edge" },
            "server_uuid": "srv-2"
        }))
        .unwrap();
        assert_eq!(d.server_uuid(), Some("srv-1"));
        assert_eq!(d.server_label(), Some("edge"));

        let flat: DestinationRef = serde_json::from_value(json!({ "server_uuid": "srv-2" })).unwrap();
        assert_eq!(flat.server_uuid(), Some("srv-2"));
    }

    #[test]
    fn test_environment_key_accepts_number_or_string() {
        let n: EnvironmentResource = serde_json::from_value(json!({ "id": 12 })).unwrap();
        assert_eq!(n.key().as_deref(), Some("12"));
        let s: EnvironmentResource = serde_json::from_value(json!({ "id": "env-a" })).unwrap();
        assert_eq!(s.key().as_deref(), Some("env-a"));
        let none: EnvironmentResource = serde_json::from_value(json!({ "name": "prod" })).unwrap();
        assert!(none.key().is_none());
    }

    #[test]
    fn test_server_port_and_reachability_are_lenient() {
        let s: ServerResource = serde_json::from_value(json!({
            "uuid": "srv-1",
            "port": "22",
            "settings": { "is_reachable": true }
        }))
        .unwrap();
        assert_eq!(s.port(), Some(22));
        assert_eq!(s.is_reachable(), Some(true));

        let odd: ServerResource = serde_json::from_value(json!({ "port": [1] })).unwrap();
        assert_eq!(odd.port(), None);
        assert_eq!(odd.is_reachable(), None);
    }

    #[test]
    fn test_wrong_typed_fields_read_as_absent() {
        let s: ServerResource = serde_json::from_value(json!({
            "uuid": "srv-1",
            "name": 42,
            "description": { "text": "nested" },
            "ip": ["10.0.0.1"]
        }))
        .unwrap();
        assert_eq!(s.uuid.as_deref(), Some("srv-1"));
        assert_eq!(s.name.as_deref(), Some("42"));
        assert!(s.description.is_none());
        assert!(s.ip.is_none());

        let svc: ServiceResource = serde_json::from_value(json!({
            "uuid": "svc-1",
            "destination": "srv-1",
            "project": 7,
            "applications": [{ "name": "web", "fqdn": "a.test" }, "junk"]
        }))
        .unwrap();
        assert!(svc.destination.is_none());
        assert!(svc.project.is_none());
        assert_eq!(svc.applications.len(), 1);

        let p: ProjectResource =
            serde_json::from_value(json!({ "uuid": "p", "environments": "none" })).unwrap();
        assert!(p.environments.is_empty());
    }

    #[test]
    fn test_parse_items_skips_only_bad_entries() {
        let items = vec![
            json!({ "uuid": "a", "name": "ok" }),
            json!("not an object"),
            json!({ "uuid": "b", "name": 42 }),
        ];
        let servers: Vec<ServerResource> = parse_items("servers", items);
        let uuids: Vec<_> = servers.iter().filter_map(|s| s.uuid.as_deref()).collect();
        assert_eq!(uuids, vec!["a", "b"]);
    }

    #[test]
    fn test_clean_fqdn() {
        assert_eq!(clean_fqdn(Some("  a.test ")), Some("a.test"));
        assert_eq!(clean_fqdn(Some("   ")), None);
        assert_eq!(clean_fqdn(None), None);
    }
}
