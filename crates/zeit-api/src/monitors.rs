//! Handlers for `/monitors`.
//!
//! Installing a monitor answers with a server-sent event stream. The first
//! event is `installed`, carrying `{"id": n}`; after that each notification
//! arrives as an `insert` or `delete` event whose data is the JSON-encoded
//! [`Notification`]. The stream ends when the monitor is removed, the store
//! closes, or the client goes away.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use serde::Deserialize;
use serde_json::json;
use tokio_stream::{Stream, StreamExt as _, wrappers::ReceiverStream};
use zeit_core::{
  monitor::{MonitorId, Notification},
  query::TimeRange,
  store::EventLog,
  template::EventTemplate,
};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct InstallBody {
  #[serde(default = "TimeRange::always")]
  pub time_range: TimeRange,
  #[serde(default)]
  pub templates:  Vec<EventTemplate>,
}

fn notification_event(notification: Notification) -> Result<SseEvent, axum::Error> {
  SseEvent::default().event(notification.kind()).json_data(&notification)
}

/// `POST /monitors`
pub async fn install<S: EventLog>(
  State(store): State<Arc<S>>,
  Json(body): Json<InstallBody>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, axum::Error>>>, ApiError> {
  let (id, rx) = store
    .install_monitor(body.time_range, body.templates)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(id, "monitor stream opened");

  let installed = SseEvent::default().event("installed").json_data(json!({ "id": id }));
  let stream = tokio_stream::once(installed).chain(ReceiverStream::new(rx).map(notification_event));
  Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// `DELETE /monitors/{id}`
pub async fn remove<S: EventLog>(
  State(store): State<Arc<S>>,
  Path(id): Path<MonitorId>,
) -> Result<StatusCode, ApiError> {
  store.remove_monitor(id).await.map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}
