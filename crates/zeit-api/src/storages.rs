//! Handlers for `/storages`: the storage media registry.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde::Deserialize;
use zeit_core::store::{EventLog, StorageMedium};

use crate::error::ApiError;

/// `GET /storages`
pub async fn list<S: EventLog>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<StorageMedium>>, ApiError> {
  let media = store.storages().await.map_err(ApiError::from_store)?;
  Ok(Json(media))
}

#[derive(Debug, Default, Deserialize)]
pub struct AvailableBody {
  pub icon:         Option<String>,
  pub display_name: Option<String>,
}

/// `PUT /storages/{medium}`: the medium was mounted.
pub async fn available<S: EventLog>(
  State(store): State<Arc<S>>,
  Path(medium): Path<String>,
  Json(body): Json<AvailableBody>,
) -> Result<StatusCode, ApiError> {
  store
    .storage_available(medium, body.icon, body.display_name)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /storages/{medium}`: the medium went away.
pub async fn unavailable<S: EventLog>(
  State(store): State<Arc<S>>,
  Path(medium): Path<String>,
) -> Result<StatusCode, ApiError> {
  store.storage_unavailable(medium).await.map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}
