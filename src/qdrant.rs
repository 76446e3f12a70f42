//! Qdrant-backed [`VectorStore`] over the REST API.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | exists | `GET /collections/{c}` (404 → `false`) |
//! | create | `PUT /collections/{c}` |
//! | upsert | `PUT /collections/{c}/points?wait=true` |
//! | retrieve | `POST /collections/{c}/points` |
//! | search | `POST /collections/{c}/points/search` |
//! | scroll | `POST /collections/{c}/points/scroll` (one page) |
//! | delete all | `POST /collections/{c}/points/delete?wait=true` |
//!
//! Writes use `wait=true` so they are visible to the next read. Nothing is
//! retried; non-2xx responses become errors carrying status and body.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use infragraph_core::gateway::VectorGateway;
use infragraph_core::store::{Distance, PayloadFilter, Point, ScoredPoint, StoredPoint, VectorStore};

use crate::config::StoreConfig;

/// A gateway over Qdrant using `[store]`'s URL, key and collection prefix.
pub fn open_gateway(config: &StoreConfig) -> Result<VectorGateway<QdrantStore>> {
    Ok(VectorGateway::new(
        QdrantStore::new(config)?,
        config.collection_prefix.clone(),
    ))
}

pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let api_key = match &config.api_key_env {
            Some(var) => Some(
                std::env::var(var)
                    .with_context(|| format!("store.api_key_env names {} but it is not set", var))?,
            ),
            None => None,
        };
        Self::with_api_key(&config.url, api_key, config.timeout_secs)
    }

    pub fn with_api_key(url: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => req.header("api-key", key),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
        let response = req
            .send()
            .await
            .with_context(|| format!("Qdrant {} request failed (is Qdrant running at {}?)", what, self.base_url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Qdrant {} error {}: {}", what, status, body);
        }
        Ok(response)
    }

    async fn result<T: for<'de> Deserialize<'de>>(&self, req: RequestBuilder, what: &str) -> Result<T> {
        let envelope: Envelope<T> = self
            .send(req, what)
            .await?
            .json()
            .await
            .with_context(|| format!("Invalid Qdrant {} response", what))?;
        Ok(envelope.result)
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct RawPoint {
    id: Value,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    score: Option<f32>,
}

impl RawPoint {
    fn into_stored(self) -> Result<StoredPoint> {
        Ok(StoredPoint {
            id: point_id_string(&self.id)?,
            payload: self.payload.unwrap_or(Value::Null),
        })
    }

    fn into_scored(self) -> Result<ScoredPoint> {
        Ok(ScoredPoint {
            id: point_id_string(&self.id)?,
            score: self.score.unwrap_or(0.0),
            payload: self.payload.unwrap_or(Value::Null),
        })
    }
}

#[derive(Deserialize)]
struct ScrollPage {
    points: Vec<RawPoint>,
}

/// Qdrant ids are either a UUID string or an unsigned integer.
fn point_id_string(id: &Value) -> Result<String> {
    match id {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(anyhow!("unexpected Qdrant point id: {}", other)),
    }
}

fn distance_name(distance: Distance) -> &'static str {
    match distance {
        Distance::Cosine => "Cosine",
    }
}

fn filter_json(filter: &PayloadFilter) -> Value {
    json!({ "must": [{ "key": filter.key, "match": { "value": filter.value } }] })
}

fn with_filter(mut body: Value, filter: Option<&PayloadFilter>) -> Value {
    if let (Some(f), Some(obj)) = (filter, body.as_object_mut()) {
        obj.insert("filter".to_string(), filter_json(f));
    }
    body
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let response = self
            .request(Method::GET, &format!("/collections/{}", collection))
            .send()
            .await
            .with_context(|| format!("Qdrant unreachable at {}", self.base_url))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => {
                let body = response.text().await.unwrap_or_default();
                bail!("Qdrant collection check error {}: {}", s, body)
            }
        }
    }

    async fn create_collection(
        &self,
        collection: &str,
        dims: usize,
        distance: Distance,
    ) -> Result<()> {
        let body = json!({ "vectors": { "size": dims, "distance": distance_name(distance) } });
        self.send(
            self.request(Method::PUT, &format!("/collections/{}", collection))
                .json(&body),
            "create collection",
        )
        .await?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: Point) -> Result<()> {
        let body = json!({
            "points": [{ "id": point.id, "vector": point.vector, "payload": point.payload }]
        });
        self.send(
            self.request(
                Method::PUT,
                &format!("/collections/{}/points?wait=true", collection),
            )
            .json(&body),
            "upsert",
        )
        .await?;
        Ok(())
    }

    async fn retrieve(&self, collection: &str, ids: &[String]) -> Result<Vec<StoredPoint>> {
        let body = json!({ "ids": ids, "with_payload": true, "with_vector": false });
        let points: Vec<RawPoint> = self
            .result(
                self.request(Method::POST, &format!("/collections/{}/points", collection))
                    .json(&body),
                "retrieve",
            )
            .await?;
        points.into_iter().map(RawPoint::into_stored).collect()
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let body = with_filter(
            json!({ "vector": vector, "limit": limit, "with_payload": true }),
            filter,
        );
        let points: Vec<RawPoint> = self
            .result(
                self.request(
                    Method::POST,
                    &format!("/collections/{}/points/search", collection),
                )
                .json(&body),
                "search",
            )
            .await?;
        points.into_iter().map(RawPoint::into_scored).collect()
    }

    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<StoredPoint>> {
        let body = with_filter(
            json!({ "limit": limit, "with_payload": true, "with_vector": false }),
            filter,
        );
        let page: ScrollPage = self
            .result(
                self.request(
                    Method::POST,
                    &format!("/collections/{}/points/scroll", collection),
                )
                .json(&body),
                "scroll",
            )
            .await?;
        page.points.into_iter().map(RawPoint::into_stored).collect()
    }

    async fn delete_all(&self, collection: &str) -> Result<()> {
        let body = json!({ "filter": { "must": [] } });
        self.send(
            self.request(
                Method::POST,
                &format!("/collections/{}/points/delete?wait=true", collection),
            )
            .json(&body),
            "delete",
        )
        .await?;
        Ok(())
    }
}
