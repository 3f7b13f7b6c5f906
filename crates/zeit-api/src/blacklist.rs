//! Handlers for `/blacklist`.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use zeit_core::{blacklist::Blacklist, template::EventTemplate};

use crate::error::ApiError;

/// `GET /blacklist`
pub async fn list(State(blacklist): State<Arc<Blacklist>>) -> Json<BTreeMap<String, EventTemplate>> {
  Json(blacklist.templates())
}

/// `PUT /blacklist/{id}`: add or replace a template.
pub async fn add(
  State(blacklist): State<Arc<Blacklist>>,
  Path(id): Path<String>,
  Json(template): Json<EventTemplate>,
) -> Result<StatusCode, ApiError> {
  blacklist.add_template(id, template)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /blacklist/{id}`: returns the removed template.
pub async fn remove(
  State(blacklist): State<Arc<Blacklist>>,
  Path(id): Path<String>,
) -> Result<Json<EventTemplate>, ApiError> {
  Ok(Json(blacklist.remove_template(&id)?))
}
