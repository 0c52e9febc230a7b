//! Request handlers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Value, json};

use berth_common::types::{ContainerId, RunSpec};

use crate::error::Result;
use crate::router::AppState;
use crate::view::{ContainerView, Created, ProjectsResponse, SpecBody};

/// `GET /api/version`
pub async fn version(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": berth_common::constants::APP_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.coordinator.backend_name(),
    }))
}

/// `GET /api/projects`
pub async fn list_projects(State(state): State<AppState>) -> Json<ProjectsResponse> {
    let registry = state.coordinator.registry();
    Json(ProjectsResponse::new(
        &registry.snapshot(),
        registry.health(),
        &state.translator,
    ))
}

/// `POST /api/refresh`
pub async fn refresh(State(state): State<AppState>) -> Result<Json<ProjectsResponse>> {
    let registry = state.coordinator.registry();
    let snapshot = registry.refresh().await?;
    Ok(Json(ProjectsResponse::new(
        &snapshot,
        registry.health(),
        &state.translator,
    )))
}

/// `GET /api/containers`
pub async fn list_containers(State(state): State<AppState>) -> Json<Vec<ContainerView>> {
    let snapshot = state.coordinator.registry().snapshot();
    Json(
        snapshot
            .containers()
            .map(|c| ContainerView::new(c.clone(), &state.translator))
            .collect(),
    )
}

/// `GET /api/containers/{id}`
pub async fn get_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ContainerView>> {
    let container = state.coordinator.registry().find_container(&ContainerId::new(id))?;
    Ok(Json(ContainerView::new(container, &state.translator)))
}

/// `GET /api/images`
pub async fn list_images(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    Ok(Json(state.coordinator.images().await?))
}

/// `POST /api/containers`
pub async fn run_container(
    State(state): State<AppState>,
    body: std::result::Result<Json<SpecBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Created>)> {
    let Json(body) = body?;
    let id = state.coordinator.run(body.into_spec()?).await?;
    tracing::info!(id = %id, "container run via api");
    Ok((StatusCode::CREATED, Json(Created { id: id.to_string() })))
}

/// `PUT /api/containers/{id}`
pub async fn update_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: std::result::Result<Json<SpecBody>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(body) = body?;
    state
        .coordinator
        .update(&ContainerId::new(id), body.into_spec()?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/containers/{id}`
pub async fn remove_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.coordinator.remove(&ContainerId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/containers/{id}/start`
pub async fn start_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let outcome = state.coordinator.start(&ContainerId::new(id)).await?;
    Ok(Json(json!({ "outcome": outcome })))
}

/// `POST /api/containers/{id}/stop`
pub async fn stop_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let outcome = state.coordinator.stop(&ContainerId::new(id)).await?;
    Ok(Json(json!({ "outcome": outcome })))
}

/// `GET /api/containers/{id}/clone`
pub async fn clone_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunSpec>> {
    Ok(Json(state.coordinator.clone_spec(&ContainerId::new(id))?))
}

/// `GET /api/containers/{id}/logs`
pub async fn container_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<String> {
    Ok(state.coordinator.logs(&ContainerId::new(id)).await?)
}
