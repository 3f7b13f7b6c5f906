//! [`SqliteStore`]: the SQLite implementation of [`EventLog`].

use std::{
  path::Path,
  sync::{Arc, Mutex},
};

use zeit_core::{
  Event, EventId,
  monitor::{MonitorId, MonitorReceiver},
  query::{StorageState, TimeRange},
  store::{EventLog, FindQuery, RelatedQuery, StorageMedium},
  template::EventTemplate,
};

use crate::{
  Error, Result,
  engine::{Engine, StoreOptions},
  schema::schema_sql,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Zeitgeist event log backed by a single SQLite file.
///
/// Cloning is cheap; clones share the connection and the in-process caches.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  engine: Arc<Mutex<Engine>>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, options).await
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory(options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, options).await
  }

  async fn init(conn: tokio_rusqlite::Connection, options: StoreOptions) -> Result<Self> {
    let engine = conn
      .call(move |conn| {
        conn.execute_batch(&schema_sql())?;
        Ok(Engine::open(conn, options))
      })
      .await??;
    Ok(Self { conn, engine: Arc::new(Mutex::new(engine)) })
  }

  /// Run `f` against the engine on the connection thread.
  async fn with_engine<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Engine, &mut rusqlite::Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    let engine = Arc::clone(&self.engine);
    self
      .conn
      .call(move |conn| {
        let Ok(mut engine) = engine.lock() else {
          return Ok(Err(Error::Poisoned));
        };
        Ok(f(&mut engine, conn))
      })
      .await?
  }

  #[cfg(test)]
  pub(crate) async fn inspect<T, F>(&self, f: F) -> T
  where
    F: FnOnce(&Engine, &rusqlite::Connection) -> T + Send + 'static,
    T: Send + 'static,
  {
    self
      .with_engine(move |engine, conn| Ok(f(engine, conn)))
      .await
      .expect("engine inspection")
  }
}

// ─── EventLog impl ───────────────────────────────────────────────────────────

impl EventLog for SqliteStore {
  type Error = Error;

  async fn insert_events(&self, events: Vec<Event>, sender: Option<String>) -> Result<Vec<EventId>> {
    self
      .with_engine(move |engine, conn| engine.insert_events(conn, events, sender.as_deref()))
      .await
  }

  async fn delete_events(
    &self,
    ids: Vec<EventId>,
    sender: Option<String>,
  ) -> Result<Option<TimeRange>> {
    self
      .with_engine(move |engine, conn| engine.delete_events(conn, ids, sender.as_deref()))
      .await
  }

  async fn delete_log(&self) -> Result<()> {
    self.with_engine(|engine, conn| engine.delete_log(conn)).await
  }

  async fn get_events(
    &self,
    ids: Vec<EventId>,
    sender: Option<String>,
  ) -> Result<Vec<Option<Event>>> {
    self
      .with_engine(move |engine, conn| engine.get_events(conn, &ids, sender.as_deref()))
      .await
  }

  async fn find_event_ids(&self, query: FindQuery) -> Result<Vec<EventId>> {
    self
      .with_engine(move |engine, conn| engine.find_event_ids(conn, &query))
      .await
  }

  async fn find_events(&self, query: FindQuery, sender: Option<String>) -> Result<Vec<Event>> {
    self
      .with_engine(move |engine, conn| engine.find_events(conn, &query, sender.as_deref()))
      .await
  }

  async fn find_related_uris(&self, query: RelatedQuery) -> Result<Vec<String>> {
    self
      .with_engine(move |engine, conn| engine.find_related_uris(conn, &query))
      .await
  }

  async fn storage_available(
    &self,
    medium: String,
    icon: Option<String>,
    display_name: Option<String>,
  ) -> Result<()> {
    self
      .with_engine(move |engine, conn| {
        engine.set_storage_state(
          conn,
          &medium,
          StorageState::Available,
          icon.as_deref(),
          display_name.as_deref(),
        )
      })
      .await
  }

  async fn storage_unavailable(&self, medium: String) -> Result<()> {
    self
      .with_engine(move |engine, conn| {
        engine.set_storage_state(conn, &medium, StorageState::NotAvailable, None, None)
      })
      .await
  }

  async fn storages(&self) -> Result<Vec<StorageMedium>> {
    self.with_engine(|engine, conn| engine.storages(conn)).await
  }

  async fn install_monitor(
    &self,
    time_range: TimeRange,
    templates: Vec<EventTemplate>,
  ) -> Result<(MonitorId, MonitorReceiver)> {
    self
      .with_engine(move |engine, _| engine.install_monitor(time_range, templates))
      .await
  }

  async fn remove_monitor(&self, id: MonitorId) -> Result<()> {
    self.with_engine(move |engine, _| engine.remove_monitor(id)).await
  }

  async fn close(&self) -> Result<()> {
    self.with_engine(|engine, conn| engine.close(conn)).await
  }
}
