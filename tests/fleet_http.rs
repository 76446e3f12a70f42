//! Crawl a mock fleet API over real HTTP with `FleetClient`, index into the
//! in-memory store, and query the result.

use axum::extract::{Path, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use infragraph::config::GraphConfig;
use infragraph::fleet_client::FleetClient;
use infragraph::map_cmd::map_with;
use infragraph::query_cmd::{execute, Query};
use infragraph_core::embedding::Embedder;
use infragraph_core::gateway::VectorGateway;
use infragraph_core::models::NodeType;
use infragraph_core::store::memory::InMemoryStore;

const TOKEN: &str = "test-token";

#[derive(Clone, Copy, Default)]
struct Mock {
    fail_services: bool,
    odd_servers: bool,
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {}", TOKEN);
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(expected.as_str())
}

fn guarded(headers: &HeaderMap, body: Value) -> Response {
    if !authorized(headers) {
        return (StatusCode::UNAUTHORIZED, "Unauthenticated.").into_response();
    }
    Json(body).into_response()
}

async fn servers(headers: HeaderMap, State(mock): State<Mock>) -> Response {
    let mut list = vec![
        json!({ "uuid": "srv-1", "name": "edge-1", "ip": "10.0.0.1", "port": 22,
                "settings": { "is_reachable": true } }),
        json!({ "uuid": "srv-2", "name": "edge-2", "ip": "10.0.0.2", "port": "2222" }),
    ];
    if mock.odd_servers {
        list.push(json!({ "uuid": "srv-3", "name": 42, "ip": { "v4": "10.0.0.3" } }));
        list.push(json!("srv-4"));
    }
    guarded(&headers, Value::Array(list))
}

async fn projects(headers: HeaderMap) -> Response {
    guarded(&headers, json!([{ "uuid": "prj-1", "name": "shop", "environments": null }]))
}

async fn project(headers: HeaderMap, Path(uuid): Path<String>) -> Response {
    if uuid != "prj-1" {
        return (StatusCode::NOT_FOUND, "Project not found.").into_response();
    }
    guarded(
        &headers,
        json!({
            "uuid": "prj-1",
            "name": "shop",
            "environments": [
                { "id": 10, "name": "production", "created_at": "2024-05-01T10:00:00Z" },
                { "name": "preview" }
            ]
        }),
    )
}

async fn services(headers: HeaderMap, State(mock): State<Mock>) -> Response {
    if mock.fail_services {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    guarded(
        &headers,
        json!([{
            "uuid": "svc-1",
            "name": "plausible",
            "service_type": "plausible-analytics",
            "destination": { "server": { "uuid": "srv-1", "name": "edge-1" } },
            "project": { "uuid": "prj-1", "name": "shop" },
            "applications": [
                { "name": "plausible", "fqdn": "stats.shop.test" },
                { "name": "clickhouse", "fqdn": null }
            ]
        }]),
    )
}

async fn applications(headers: HeaderMap) -> Response {
    guarded(
        &headers,
        json!([{
            "uuid": "app-1",
            "name": "storefront",
            "fqdn": "shop.test",
            "git_repository": "acme/storefront",
            "git_branch": "main",
            "build_pack": "nixpacks",
            "destination": { "server_uuid": "srv-2" },
            "project": { "uuid": "prj-1" }
        }]),
    )
}

async fn spawn_fleet(mock: Mock) -> String {
    let app = Router::new()
        .route("/servers", get(servers))
        .route("/projects", get(projects))
        .route("/projects/{uuid}", get(project))
        .route("/services", get(services))
        .route("/applications", get(applications))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_map_over_http() {
    let base = spawn_fleet(Mock::default()).await;
    let fleet = FleetClient::with_token(&base, Some(TOKEN.to_string()), 5).unwrap();
    let gateway = VectorGateway::new(InMemoryStore::new(), "fleet");
    let embedder = Embedder::deterministic();

    let report = map_with(&fleet, &gateway, &embedder).await.unwrap();
    assert!(report.errors.is_empty(), "{:?}", report.errors);

    let counts = report.counts_by_type();
    assert_eq!(counts[&NodeType::Server], 2);
    assert_eq!(counts[&NodeType::Project], 1);
    assert_eq!(counts[&NodeType::Environment], 2);
    assert_eq!(counts[&NodeType::Service], 1);
    assert_eq!(counts[&NodeType::Domain], 1);
    assert_eq!(counts[&NodeType::Application], 1);
    assert_eq!(report.indexed, report.nodes.len());

    // the preview environment has no id and falls back to <project>/<name>
    assert!(report.nodes.iter().any(|n| n.id == "environment:10"));
    assert!(report.nodes.iter().any(|n| n.id == "environment:prj-1/preview"));

    let server: Value = serde_json::to_value(
        report.nodes.iter().find(|n| n.id == "server:srv-2").unwrap(),
    )
    .unwrap();
    assert_eq!(server["type"], "server");
    assert_eq!(server["metadata"]["port"], 2222);
}

#[tokio::test]
async fn test_queries_over_mapped_graph() {
    let base = spawn_fleet(Mock::default()).await;
    let fleet = FleetClient::with_token(&base, Some(TOKEN.to_string()), 5).unwrap();
    let gateway = VectorGateway::new(InMemoryStore::new(), "fleet");
    let embedder = Embedder::deterministic();
    map_with(&fleet, &gateway, &embedder).await.unwrap();
    let graph = GraphConfig::default();

    let on_srv1: Value = serde_json::from_str(
        &execute(&gateway, &embedder, &graph, Query::Server("srv-1".into()))
            .await
            .unwrap(),
    )
    .unwrap();
    assert_eq!(on_srv1["server"]["id"], "server:srv-1");
    assert_eq!(on_srv1["services"][0]["id"], "service:svc-1");
    assert_eq!(on_srv1["applications"].as_array().unwrap().len(), 0);

    let hierarchy: Value = serde_json::from_str(
        &execute(&gateway, &embedder, &graph, Query::Project("project:prj-1".into()))
            .await
            .unwrap(),
    )
    .unwrap();
    assert_eq!(hierarchy["environments"].as_array().unwrap().len(), 2);
    assert_eq!(hierarchy["services"].as_array().unwrap().len(), 1);
    assert_eq!(hierarchy["applications"][0]["id"], "application:app-1");

    let domains: Value = serde_json::from_str(
        &execute(&gateway, &embedder, &graph, Query::Domains)
            .await
            .unwrap(),
    )
    .unwrap();
    let domains = domains.as_array().unwrap();
    assert_eq!(domains.len(), 1);
    assert_eq!(domains[0]["domain"]["id"], "domain:stats.shop.test");
    assert_eq!(domains[0]["service"], "service:svc-1");
}

#[tokio::test]
async fn test_bad_token_fails_every_category() {
    let base = spawn_fleet(Mock::default()).await;
    let fleet = FleetClient::with_token(&base, Some("wrong".to_string()), 5).unwrap();
    let gateway = VectorGateway::new(InMemoryStore::new(), "fleet");
    let embedder = Embedder::deterministic();

    let report = map_with(&fleet, &gateway, &embedder).await.unwrap();
    assert!(report.nodes.is_empty());
    assert_eq!(report.errors.len(), 4);
    assert!(report.errors.iter().all(|e| e.contains("401")), "{:?}", report.errors);
}

#[tokio::test]
async fn test_server_error_on_one_category() {
    let base = spawn_fleet(Mock {
        fail_services: true,
        ..Mock::default()
    })
    .await;
    let fleet = FleetClient::with_token(&base, Some(TOKEN.to_string()), 5).unwrap();
    let gateway = VectorGateway::new(InMemoryStore::new(), "fleet");
    let embedder = Embedder::deterministic();

    let report = map_with(&fleet, &gateway, &embedder).await.unwrap();
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("500"));
    assert!(report.errors[0].contains("boom"));
    assert!(report.nodes.iter().any(|n| n.id == "application:app-1"));
    assert!(!report.nodes.iter().any(|n| n.id == "domain:stats.shop.test"));
}

#[tokio::test]
async fn test_malformed_server_does_not_drop_its_neighbours() {
    let base = spawn_fleet(Mock {
        odd_servers: true,
        ..Mock::default()
    })
    .await;
    let fleet = FleetClient::with_token(&base, Some(TOKEN.to_string()), 5).unwrap();
    let gateway = VectorGateway::new(InMemoryStore::new(), "fleet");
    let embedder = Embedder::deterministic();

    let report = map_with(&fleet, &gateway, &embedder).await.unwrap();
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.counts_by_type()[&NodeType::Server], 3);
    assert!(report.nodes.iter().any(|n| n.id == "server:srv-1"));

    let odd = report.nodes.iter().find(|n| n.id == "server:srv-3").unwrap();
    assert_eq!(odd.name, "42");
    let odd: Value = serde_json::to_value(odd).unwrap();
    assert!(odd["metadata"].get("ip").is_none());
}
