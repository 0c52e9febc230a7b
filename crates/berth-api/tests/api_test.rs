//! Integration tests for the HTTP gateway.
//!
//! Each test builds the router over an in-memory runtime and drives it
//! with `oneshot` requests.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use berth_api::{AppState, create_router};
use berth_common::types::{PortMapping, RunSpec};
use berth_runtime::backend::RuntimeBackend;
use berth_runtime::backend::memory::MemoryBackend;
use berth_runtime::coordinator::Coordinator;
use berth_runtime::registry::Registry;
use berth_runtime::translate::PortTranslator;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn app_with(rt: MemoryBackend) -> (Arc<MemoryBackend>, Router) {
    let rt = Arc::new(rt);
    let backend = Arc::clone(&rt) as Arc<dyn RuntimeBackend>;
    let registry = Arc::new(Registry::new(Arc::clone(&backend), TIMEOUT));
    let _ = registry.refresh().await.expect("initial refresh");
    let state = AppState {
        coordinator: Arc::new(Coordinator::new(backend, registry, TIMEOUT)),
        translator: PortTranslator::default(),
    };
    (rt, create_router(state))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

// ============================================================================
// Read endpoints
// ============================================================================

#[tokio::test]
async fn version_reports_backend() {
    let (_rt, app) = app_with(MemoryBackend::new()).await;
    let (status, json) = send_json(&app, Method::GET, "/api/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "berth");
    assert_eq!(json["backend"], "memory");
}

#[tokio::test]
async fn projects_are_grouped_with_host_addresses() {
    let rt = MemoryBackend::new();
    let _ = rt.seed(Some("shop"), &RunSpec::new("nginx").with_name("web"), true);
    let _ = rt.seed(None, &RunSpec::new("alpine").with_name("tool"), false);
    let (_rt, app) = app_with(rt).await;

    let (status, json) = send_json(&app, Method::GET, "/api/projects", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["generation"], 1);
    assert_eq!(json["stale"], false);
    let projects = json["projects"].as_array().unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0]["name"], "default");
    assert_eq!(projects[1]["name"], "shop");
    let web = &projects[1]["containers"][0];
    assert_eq!(web["name"], "web");
    assert_eq!(web["address"], "10.10.0.2");
    assert_eq!(web["host_address"], "127.0.0.2");
}

#[tokio::test]
async fn projects_report_stale_after_failed_refresh() {
    let rt = MemoryBackend::new();
    let _ = rt.seed(None, &RunSpec::new("nginx"), true);
    let (rt, app) = app_with(rt).await;

    rt.set_available(false);
    let (status, json) = send_json(&app, Method::POST, "/api/refresh", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "unavailable");

    let (_, json) = send_json(&app, Method::GET, "/api/projects", None).await;
    assert_eq!(json["stale"], true);
    assert!(json["last_error"].is_string());
    assert_eq!(json["projects"][0]["containers"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_container_is_404() {
    let (_rt, app) = app_with(MemoryBackend::new()).await;
    let (status, json) = send_json(&app, Method::GET, "/api/containers/c-missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
    assert!(json["message"].as_str().unwrap().contains("c-missing"));
}

#[tokio::test]
async fn images_are_listed() {
    let (_rt, app) = app_with(MemoryBackend::new().with_images(["busybox:1.36"])).await;
    let (status, json) = send_json(&app, Method::GET, "/api/images", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!(["busybox:1.36"]));
}

// ============================================================================
// Lifecycle endpoints
// ============================================================================

#[tokio::test]
async fn run_with_command_string_creates_container() {
    let (_rt, app) = app_with(MemoryBackend::new()).await;
    let body = json!({
        "image": "alpine",
        "name": "sleeper",
        "command": "sh -c \"sleep 1000\"",
        "ports": ["8080:80"],
    });
    let (status, json) = send_json(&app, Method::POST, "/api/containers", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = json["id"].as_str().unwrap().to_owned();

    let (status, json) = send_json(&app, Method::GET, &format!("/api/containers/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["args"], json!(["sh", "-c", "sleep 1000"]));
    assert_eq!(json["ports"][0], json!({"host": 8080, "container": 80}));
    assert_eq!(json["status"], "Running");
}

#[tokio::test]
async fn run_without_image_is_400() {
    let (rt, app) = app_with(MemoryBackend::new()).await;
    let (status, json) = send_json(&app, Method::POST, "/api/containers", Some(json!({"name": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_spec");
    assert_eq!(rt.invocations("create"), 0);
}

#[tokio::test]
async fn zero_port_in_body_is_400() {
    let (_rt, app) = app_with(MemoryBackend::new()).await;
    let body = json!({"image": "nginx", "ports": [{"Host": 0, "Container": 80}]});
    let (status, json) = send_json(&app, Method::POST, "/api/containers", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_spec");
}

#[tokio::test]
async fn start_and_stop_report_outcomes() {
    let rt = MemoryBackend::new();
    let id = rt.seed(None, &RunSpec::new("nginx"), false);
    let (rt, app) = app_with(rt).await;

    let start = format!("/api/containers/{id}/start");
    let stop = format!("/api/containers/{id}/stop");
    assert_eq!(send_json(&app, Method::POST, &start, None).await.1["outcome"], "done");
    assert_eq!(send_json(&app, Method::POST, &start, None).await.1["outcome"], "already_running");
    assert_eq!(send_json(&app, Method::POST, &stop, None).await.1["outcome"], "done");
    assert_eq!(send_json(&app, Method::POST, &stop, None).await.1["outcome"], "not_running");
    assert_eq!(rt.invocations("start"), 1);
    assert_eq!(rt.invocations("stop"), 1);
}

#[tokio::test]
async fn deleting_running_container_is_409() {
    let rt = MemoryBackend::new();
    let id = rt.seed(None, &RunSpec::new("nginx"), true);
    let (rt, app) = app_with(rt).await;

    let (status, json) = send_json(&app, Method::DELETE, &format!("/api/containers/{id}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "in_use");
    assert!(rt.peek(&id).is_some());
}

#[tokio::test]
async fn deleting_stopped_container_is_204() {
    let rt = MemoryBackend::new();
    let id = rt.seed(None, &RunSpec::new("nginx"), false);
    let (rt, app) = app_with(rt).await;

    let (status, _) = send(&app, Method::DELETE, &format!("/api/containers/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(rt.peek(&id).is_none());
}

#[tokio::test]
async fn update_keeps_unspecified_image() {
    let rt = MemoryBackend::new();
    let id = rt.seed(None, &RunSpec::new("nginx").with_name("web"), true);
    let (_rt, app) = app_with(rt).await;

    let uri = format!("/api/containers/{id}");
    let (status, _) = send(&app, Method::PUT, &uri, Some(json!({"args": ["nginx", "-T"]}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, json) = send_json(&app, Method::GET, &uri, None).await;
    assert_eq!(json["image"], "nginx");
    assert_eq!(json["name"], "web");
    assert_eq!(json["args"], json!(["nginx", "-T"]));
    assert_eq!(json["status"], "Running");
}

#[tokio::test]
async fn clone_returns_derived_spec() {
    let rt = MemoryBackend::new();
    let spec = RunSpec::new("nginx")
        .with_args(["nginx"])
        .with_port(PortMapping::new(8080, 80).unwrap())
        .with_port(PortMapping::new(8443, 443).unwrap());
    let id = rt.seed(None, &spec, true);
    let (_rt, app) = app_with(rt).await;

    let (status, json) = send_json(&app, Method::GET, &format!("/api/containers/{id}/clone"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["image"], "nginx");
    assert_eq!(json["name"], format!("{id}-copy"));
    assert_eq!(json["ports"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn logs_are_plain_text() {
    let (_rt, app) = app_with(MemoryBackend::new()).await;
    let (_, json) = send_json(&app, Method::POST, "/api/containers", Some(json!({"image": "alpine", "args": ["top"]}))).await;
    let id = json["id"].as_str().unwrap();

    let (status, bytes) = send(&app, Method::GET, &format!("/api/containers/{id}/logs"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(bytes).unwrap().contains("started alpine top"));
}

#[tokio::test]
async fn runtime_failure_is_502() {
    let rt = MemoryBackend::new();
    let id = rt.seed(None, &RunSpec::new("nginx"), false);
    rt.fail_on("start");
    let (_rt, app) = app_with(rt).await;

    let (status, json) = send_json(&app, Method::POST, &format!("/api/containers/{id}/start"), None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "runtime");
}

#[tokio::test(start_paused = true)]
async fn concurrent_mutation_on_same_container_is_423() {
    let rt = MemoryBackend::new().with_latency(Duration::from_secs(1));
    let id = rt.seed(None, &RunSpec::new("nginx"), false);
    let (_rt, app) = app_with(rt).await;

    let uri = format!("/api/containers/{id}/start");
    let (a, b) = tokio::join!(
        send_json(&app, Method::POST, &uri, None),
        send_json(&app, Method::POST, &uri, None)
    );
    let mut statuses = [a.0, b.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::LOCKED]);
}
