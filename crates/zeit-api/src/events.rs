//! Handlers for `/events` and `/related-uris`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/events` | Body: [`InsertBody`]; one id per event, `0` for rejected ones |
//! | `POST` | `/events/get` | Body: [`IdsBody`]; `null` for unknown ids |
//! | `POST` | `/events/delete` | Body: [`IdsBody`]; the deleted time span or `null` |
//! | `POST` | `/events/find-ids` | Body: [`FindQuery`] |
//! | `POST` | `/events/find` | Body: [`FindBody`] |
//! | `POST` | `/related-uris` | Body: [`RelatedQuery`] |
//! | `DELETE` | `/log` | Drops every event; `204` |
//!
//! Queries travel as POST bodies because templates do not fit a query
//! string.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use zeit_core::{
  Event, EventId,
  query::TimeRange,
  store::{EventLog, FindQuery, RelatedQuery},
};

use crate::error::ApiError;

// ─── Insert ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct InsertBody {
  pub events: Vec<Event>,
  /// Identifies the caller to extensions.
  #[serde(default)]
  pub sender: Option<String>,
}

/// `POST /events`
pub async fn insert<S: EventLog>(
  State(store): State<Arc<S>>,
  Json(body): Json<InsertBody>,
) -> Result<Json<Vec<EventId>>, ApiError> {
  let ids = store
    .insert_events(body.events, body.sender)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(ids))
}

// ─── Get / delete ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct IdsBody {
  pub ids:    Vec<EventId>,
  #[serde(default)]
  pub sender: Option<String>,
}

/// `POST /events/get`
pub async fn get<S: EventLog>(
  State(store): State<Arc<S>>,
  Json(body): Json<IdsBody>,
) -> Result<Json<Vec<Option<Event>>>, ApiError> {
  let events = store
    .get_events(body.ids, body.sender)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(events))
}

/// `POST /events/delete`
pub async fn delete<S: EventLog>(
  State(store): State<Arc<S>>,
  Json(body): Json<IdsBody>,
) -> Result<Json<Option<TimeRange>>, ApiError> {
  let span = store
    .delete_events(body.ids, body.sender)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(span))
}

// ─── Find ────────────────────────────────────────────────────────────────────

/// `POST /events/find-ids`
pub async fn find_ids<S: EventLog>(
  State(store): State<Arc<S>>,
  Json(query): Json<FindQuery>,
) -> Result<Json<Vec<EventId>>, ApiError> {
  let ids = store.find_event_ids(query).await.map_err(ApiError::from_store)?;
  Ok(Json(ids))
}

/// A [`FindQuery`] plus the caller's name.
#[derive(Debug, Deserialize)]
pub struct FindBody {
  #[serde(flatten)]
  pub query:  FindQuery,
  #[serde(default)]
  pub sender: Option<String>,
}

/// `POST /events/find`
pub async fn find<S: EventLog>(
  State(store): State<Arc<S>>,
  Json(body): Json<FindBody>,
) -> Result<Json<Vec<Event>>, ApiError> {
  let events = store
    .find_events(body.query, body.sender)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(events))
}

/// `POST /related-uris`
pub async fn related_uris<S: EventLog>(
  State(store): State<Arc<S>>,
  Json(query): Json<RelatedQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
  let uris = store.find_related_uris(query).await.map_err(ApiError::from_store)?;
  Ok(Json(uris))
}

/// `DELETE /log`
pub async fn delete_log<S: EventLog>(State(store): State<Arc<S>>) -> Result<StatusCode, ApiError> {
  store.delete_log().await.map_err(ApiError::from_store)?;
  tracing::warn!("event log deleted over the api");
  Ok(StatusCode::NO_CONTENT)
}
