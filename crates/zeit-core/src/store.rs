//! The `EventLog` trait and its query types.
//!
//! Backends (e.g. `zeit-store-sqlite`) implement the trait; the HTTP layer
//! depends only on this abstraction.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  Event, EventId,
  error::Classify,
  monitor::{MonitorId, MonitorReceiver},
  query::{RelatedResultType, ResultType, StorageState, TimeRange},
  template::EventTemplate,
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`EventLog::find_event_ids`] and [`EventLog::find_events`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindQuery {
  #[serde(default)]
  pub time_range:    TimeRange,
  /// OR-ed together; empty matches every event.
  #[serde(default)]
  pub templates:     Vec<EventTemplate>,
  #[serde(default)]
  pub storage_state: StorageState,
  /// `0` means unbounded.
  #[serde(default)]
  pub max_events:    u32,
  #[serde(default)]
  pub order:         ResultType,
}

/// Parameters for [`EventLog::find_related_uris`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelatedQuery {
  #[serde(default)]
  pub time_range:             TimeRange,
  /// Selects the seed events.
  #[serde(default)]
  pub event_templates:        Vec<EventTemplate>,
  /// When non-empty, restricts which neighbouring events may contribute.
  #[serde(default)]
  pub result_event_templates: Vec<EventTemplate>,
  #[serde(default)]
  pub storage_state:          StorageState,
  pub num_results:            u32,
  #[serde(default)]
  pub result_type:            RelatedResultType,
}

/// A known storage medium and whether it is currently reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMedium {
  pub value:        String,
  pub available:    bool,
  pub icon:         Option<String>,
  pub display_name: Option<String>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an event log backend.
///
/// Every method fails with a "closed" error after [`EventLog::close`].
pub trait EventLog: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Insert a batch of events. The result has one slot per input event:
  /// the new (or, for a duplicate, the existing) id, or `0` when the event
  /// was rejected.
  fn insert_events(
    &self,
    events: Vec<Event>,
    sender: Option<String>,
  ) -> impl Future<Output = Result<Vec<EventId>, Self::Error>> + Send + '_;

  /// Delete events by id and return the time span they covered, or `None`
  /// when none of the ids existed.
  fn delete_events(
    &self,
    ids: Vec<EventId>,
    sender: Option<String>,
  ) -> impl Future<Output = Result<Option<TimeRange>, Self::Error>> + Send + '_;

  /// Delete every event and every symbol they used. Storage media that
  /// have reported a state are kept.
  fn delete_log(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Fetch events by id, preserving order and multiplicity. Unknown,
  /// broken and extension-hidden events are `None`.
  fn get_events(
    &self,
    ids: Vec<EventId>,
    sender: Option<String>,
  ) -> impl Future<Output = Result<Vec<Option<Event>>, Self::Error>> + Send + '_;

  fn find_event_ids(
    &self,
    query: FindQuery,
  ) -> impl Future<Output = Result<Vec<EventId>, Self::Error>> + Send + '_;

  /// [`EventLog::find_event_ids`] followed by [`EventLog::get_events`],
  /// with absent slots dropped.
  fn find_events(
    &self,
    query: FindQuery,
    sender: Option<String>,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  /// Subject URIs that co-occur with the events matching the query.
  fn find_related_uris(
    &self,
    query: RelatedQuery,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  // ── Storage media ─────────────────────────────────────────────────────

  fn storage_available(
    &self,
    medium: String,
    icon: Option<String>,
    display_name: Option<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn storage_unavailable(
    &self,
    medium: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn storages(
    &self,
  ) -> impl Future<Output = Result<Vec<StorageMedium>, Self::Error>> + Send + '_;

  // ── Monitors ──────────────────────────────────────────────────────────

  /// Subscribe to inserts of events in `time_range` matching any of
  /// `templates`, and to deletes overlapping `time_range`. Dropping the
  /// receiver removes the monitor.
  fn install_monitor(
    &self,
    time_range: TimeRange,
    templates: Vec<EventTemplate>,
  ) -> impl Future<Output = Result<(MonitorId, MonitorReceiver), Self::Error>> + Send + '_;

  fn remove_monitor(
    &self,
    id: MonitorId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Lifecycle ─────────────────────────────────────────────────────────

  /// Check the store's caches, unload extensions, end every monitor and
  /// refuse further calls. Closing twice is a no-op.
  fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
