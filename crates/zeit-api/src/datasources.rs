//! Handlers for `/data-sources`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde::{Deserialize, Serialize};
use zeit_core::{
  datasource::{DataSource, DataSourceRegistry},
  template::EventTemplate,
};

use crate::error::ApiError;

/// `GET /data-sources`
pub async fn list(State(registry): State<Arc<DataSourceRegistry>>) -> Json<Vec<DataSource>> {
  Json(registry.sources())
}

/// `GET /data-sources/{id}`
pub async fn get(
  State(registry): State<Arc<DataSourceRegistry>>,
  Path(id): Path<String>,
) -> Result<Json<DataSource>, ApiError> {
  Ok(Json(registry.get(&id)?))
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub name:            String,
  #[serde(default)]
  pub description:     String,
  #[serde(default)]
  pub event_templates: Vec<EventTemplate>,
  /// The sender name the source inserts under.
  #[serde(default)]
  pub sender:          Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Registered {
  pub enabled: bool,
}

/// `PUT /data-sources/{id}`: register or refresh a source.
pub async fn register(
  State(registry): State<Arc<DataSourceRegistry>>,
  Path(id): Path<String>,
  Json(body): Json<RegisterBody>,
) -> Result<Json<Registered>, ApiError> {
  let enabled = registry.register(
    &id,
    body.name,
    body.description,
    body.event_templates,
    body.sender.as_deref(),
  )?;
  Ok(Json(Registered { enabled }))
}

#[derive(Debug, Deserialize)]
pub struct EnabledBody {
  pub enabled: bool,
}

/// `PUT /data-sources/{id}/enabled`
pub async fn set_enabled(
  State(registry): State<Arc<DataSourceRegistry>>,
  Path(id): Path<String>,
  Json(body): Json<EnabledBody>,
) -> Result<StatusCode, ApiError> {
  registry.set_enabled(&id, body.enabled)?;
  Ok(StatusCode::NO_CONTENT)
}
