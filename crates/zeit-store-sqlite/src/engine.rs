//! The synchronous engine behind [`SqliteStore`](crate::SqliteStore).
//!
//! All methods run on the connection thread with exclusive access to the
//! in-process caches. Public operations commit their own transaction; on a
//! database failure the transaction rolls back and the caches are reset
//! so they cannot describe rows that no longer exist.

use std::{
  collections::{BTreeSet, HashMap},
  sync::Arc,
  time::Instant,
};

use rusqlite::{
  Connection, ErrorCode, OptionalExtension as _, Transaction, params, params_from_iter,
  types::Value,
};
use zeit_core::{
  Event, EventId, MOVE_EVENT,
  event::timestamp_now,
  extension::ExtensionChain,
  monitor::{MonitorId, MonitorReceiver, Monitors},
  query::{RelatedResultType, ResultType, StorageState, TimeRange},
  store::{FindQuery, RelatedQuery, StorageMedium},
  taxonomy::Taxonomy,
  template::EventTemplate,
};

use crate::{
  Error, Result,
  cache::{DEFAULT_CACHE_SIZE, EventCache},
  compile::Compiler,
  encode::{self, EVENT_COLUMNS, RawEventRow},
  order, schema,
  symbol::Symbols,
};

/// Upper bound on `?` parameters per `IN (...)` list.
const CHUNK: usize = 500;

/// Default half-width of the related-URI window, in event ids.
pub const DEFAULT_RELATED_WINDOW: u32 = 2;

/// Library-level configuration of a store.
#[derive(Clone, Debug)]
pub struct StoreOptions {
  pub cache_size:     usize,
  pub related_window: u32,
  pub taxonomy:       Arc<Taxonomy>,
  pub extensions:     ExtensionChain,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      cache_size:     DEFAULT_CACHE_SIZE,
      related_window: DEFAULT_RELATED_WINDOW,
      taxonomy:       Arc::default(),
      extensions:     ExtensionChain::default(),
    }
  }
}

fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

fn id_values(ids: &[EventId]) -> impl Iterator<Item = Value> + '_ {
  ids.iter().map(|id| Value::Integer((*id).into()))
}

/// How writing one event's rows ended.
enum Written {
  New,
  /// The 4-tuple already exists under this id.
  Duplicate(EventId),
  /// A row violated the uniqueness constraint.
  Conflict,
}

pub(crate) struct Engine {
  symbols:        Symbols,
  cache:          EventCache,
  last_id:        EventId,
  extensions:     ExtensionChain,
  monitors:       Monitors,
  taxonomy:       Arc<Taxonomy>,
  related_window: u32,
  closed:         bool,
}

impl Engine {
  /// Load the symbol caches and the id counter from an initialised
  /// database.
  pub fn open(conn: &Connection, options: StoreOptions) -> Result<Self> {
    let started = Instant::now();
    let engine = Self {
      symbols:        Symbols::load(conn)?,
      cache:          EventCache::new(options.cache_size),
      last_id:        Self::max_id(conn)?,
      extensions:     options.extensions,
      monitors:       Monitors::new(options.taxonomy.clone()),
      taxonomy:       options.taxonomy,
      related_window: options.related_window,
      closed:         false,
    };
    tracing::info!(
      last_id = engine.last_id,
      extensions = ?engine.extensions.names(),
      elapsed = ?started.elapsed(),
      "event log opened"
    );
    Ok(engine)
  }

  fn max_id(conn: &Connection) -> Result<EventId> {
    let id: Option<EventId> = conn.query_row("SELECT MAX(id) FROM event", [], |r| r.get(0))?;
    Ok(id.unwrap_or(0))
  }

  fn ensure_open(&self) -> Result<()> {
    if self.closed { Err(Error::StoreClosed) } else { Ok(()) }
  }

  /// Drop every cached fact that a rolled-back transaction may have
  /// touched and reseed the id counter.
  fn reset_after_failure(&mut self, conn: &Connection) {
    self.cache.clear();
    self.symbols.rollback_to(Default::default());
    match Self::max_id(conn) {
      Ok(id) => self.last_id = id,
      Err(e) => tracing::error!(error = %e, "failed to reseed the event id counter"),
    }
  }

  // ─── Insert ────────────────────────────────────────────────────────────────

  pub fn insert_events(
    &mut self,
    conn: &mut Connection,
    events: Vec<Event>,
    sender: Option<&str>,
  ) -> Result<Vec<EventId>> {
    self.ensure_open()?;
    let started = Instant::now();
    let total = events.len();
    let result = self.insert_batch(conn, events, sender);
    match &result {
      Ok(ids) => tracing::debug!(
        inserted = ids.iter().filter(|id| **id != 0).count(),
        total,
        elapsed = ?started.elapsed(),
        "inserted events"
      ),
      Err(e) => {
        tracing::error!(error = %e, "insert batch rolled back");
        self.reset_after_failure(conn);
      }
    }
    result
  }

  fn insert_batch(
    &mut self,
    conn: &mut Connection,
    events: Vec<Event>,
    sender: Option<&str>,
  ) -> Result<Vec<EventId>> {
    let mut tx = conn.transaction()?;
    let mut ids = Vec::with_capacity(events.len());
    let mut inserted = Vec::new();
    for event in events {
      let id = self.insert_one(&mut tx, event, sender, &mut inserted)?;
      ids.push(id);
    }
    tx.commit()?;
    self.symbols.commit();
    for event in &inserted {
      self.extensions.apply_post_insert(event, sender);
    }
    self.monitors.notify_insert(&inserted);
    Ok(ids)
  }

  /// Insert one event inside its own savepoint. Per-event rejections are
  /// `Ok(0)`; only database failures are errors.
  fn insert_one(
    &mut self,
    tx: &mut Transaction<'_>,
    mut event: Event,
    sender: Option<&str>,
    inserted: &mut Vec<Event>,
  ) -> Result<EventId> {
    if let Err(e) = event.prepare_for_insert(timestamp_now()) {
      tracing::warn!(error = %e, "rejected event");
      return Ok(0);
    }

    self.last_id += 1;
    let id = self.last_id;
    event.id = Some(id);
    let Some(mut event) = self.extensions.apply_pre_insert(event, sender) else {
      tracing::warn!(error = %Error::VetoedByExtension(id), "rejected event");
      return Ok(0);
    };
    event.id = Some(id);
    if let Err(e) = event.validate() {
      tracing::warn!(error = %e, "extension produced an invalid event");
      return Ok(0);
    }

    let mark = self.symbols.mark();
    let sp = tx.savepoint()?;
    match self.write_event(&sp, &event)? {
      Written::New => {}
      Written::Duplicate(existing) => {
        drop(sp);
        self.symbols.rollback_to(mark);
        self.last_id -= 1;
        tracing::debug!(id = existing, "duplicate event");
        return Ok(existing);
      }
      Written::Conflict => {
        drop(sp);
        self.symbols.rollback_to(mark);
        self.last_id -= 1;
        tracing::warn!(
          timestamp = event.timestamp,
          "rejected event: it repeats a subject"
        );
        return Ok(0);
      }
    }
    if event.is_move() {
      self.move_subjects(&sp, &event)?;
    }
    sp.commit()?;

    if event.is_move() {
      for subject in &event.subjects {
        self.cache.apply_move(&subject.uri, &subject.current_uri, event.timestamp);
      }
    }
    inserted.push(event);
    Ok(id)
  }

  fn write_event(&mut self, conn: &Connection, event: &Event) -> Result<Written> {
    let interpretation = self.symbols.interpretation.id_for(conn, &event.interpretation)?;
    let manifestation = self.symbols.manifestation.id_for(conn, &event.manifestation)?;
    let actor = self.symbols.actor.id_for(conn, &event.actor)?;

    let existing: Option<EventId> = conn
      .query_row(
        "SELECT id FROM event
         WHERE timestamp = ?1 AND interpretation = ?2 AND manifestation = ?3 AND actor = ?4
         LIMIT 1",
        params![event.timestamp, interpretation, manifestation, actor],
        |r| r.get(0),
      )
      .optional()?;
    if let Some(existing) = existing {
      return Ok(Written::Duplicate(existing));
    }

    let payload = if event.payload.is_empty() {
      None
    } else {
      conn.execute("INSERT INTO payload (value) VALUES (?1)", [&event.payload])?;
      Some(conn.last_insert_rowid())
    };

    let uris = event.origin.iter().chain(event.subjects.iter().flat_map(|s| {
      [Some(&s.uri), Some(&s.current_uri), s.origin.as_ref()].into_iter().flatten()
    }));
    for uri in uris {
      conn.execute("INSERT OR IGNORE INTO uri (value) VALUES (?1)", [uri])?;
    }
    for text in event.subjects.iter().filter_map(|s| s.text.as_ref()) {
      conn.execute("INSERT OR IGNORE INTO text (value) VALUES (?1)", [text])?;
    }
    for storage in event.subjects.iter().filter_map(|s| s.storage.as_ref()) {
      conn.execute("INSERT OR IGNORE INTO storage (value) VALUES (?1)", [storage])?;
    }

    for subject in &event.subjects {
      let subj_interpretation = self.symbols.interpretation.id_for(conn, &subject.interpretation)?;
      let subj_manifestation = self.symbols.manifestation.id_for(conn, &subject.manifestation)?;
      let subj_mimetype = subject
        .mimetype
        .as_deref()
        .map(|m| self.symbols.mimetype.id_for(conn, m))
        .transpose()?;
      let written = conn.execute(
        "INSERT INTO event (
           id, timestamp, interpretation, manifestation, actor, origin, payload,
           subj_id, subj_id_current, subj_interpretation, subj_manifestation,
           subj_origin, subj_mimetype, subj_text, subj_storage
         ) VALUES (
           ?1, ?2, ?3, ?4, ?5,
           (SELECT id FROM uri WHERE value = ?6),
           ?7,
           (SELECT id FROM uri WHERE value = ?8),
           (SELECT id FROM uri WHERE value = ?9),
           ?10, ?11,
           (SELECT id FROM uri WHERE value = ?12),
           ?13,
           (SELECT id FROM text WHERE value = ?14),
           (SELECT id FROM storage WHERE value = ?15)
         )",
        params![
          event.id,
          event.timestamp,
          interpretation,
          manifestation,
          actor,
          event.origin,
          payload,
          subject.uri,
          subject.current_uri,
          subj_interpretation,
          subj_manifestation,
          subject.origin,
          subj_mimetype,
          subject.text,
          subject.storage,
        ],
      );
      match written {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
          return Ok(Written::Conflict);
        }
        Err(e) => return Err(e.into()),
      }
    }
    Ok(Written::New)
  }

  /// Point every earlier non-move event at each subject's new location.
  fn move_subjects(&mut self, conn: &Connection, event: &Event) -> Result<()> {
    let move_id = self.symbols.interpretation.id_for(conn, MOVE_EVENT)?;
    for subject in &event.subjects {
      let moved = conn.execute(
        "UPDATE event
         SET subj_id_current = (SELECT id FROM uri WHERE value = ?1)
         WHERE subj_id_current = (SELECT id FROM uri WHERE value = ?2)
           AND interpretation != ?3 AND timestamp < ?4",
        params![subject.current_uri, subject.uri, move_id, event.timestamp],
      )?;
      tracing::debug!(from = %subject.uri, to = %subject.current_uri, rows = moved, "moved subject");
    }
    Ok(())
  }

  // ─── Get ───────────────────────────────────────────────────────────────────

  pub fn get_events(
    &mut self,
    conn: &Connection,
    ids: &[EventId],
    sender: Option<&str>,
  ) -> Result<Vec<Option<Event>>> {
    self.ensure_open()?;
    let started = Instant::now();
    let use_cache = ids.len() <= self.cache.batch_limit();

    let mut positions: HashMap<EventId, Vec<usize>> = HashMap::new();
    for (pos, id) in ids.iter().enumerate() {
      positions.entry(*id).or_default().push(pos);
    }

    let mut found: Vec<Event> = Vec::with_capacity(positions.len());
    let mut missing: Vec<EventId> = Vec::new();
    for id in positions.keys() {
      match use_cache.then(|| self.cache.get(*id)).flatten() {
        Some(event) => found.push(event),
        None => missing.push(*id),
      }
    }
    let cached = found.len();
    missing.sort_unstable();

    for chunk in missing.chunks(CHUNK) {
      let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM event_view WHERE id IN ({}) ORDER BY id, subj_position",
        placeholders(chunk.len())
      );
      let mut stmt = conn.prepare(&sql)?;
      let rows = stmt
        .query_map(params_from_iter(id_values(chunk)), RawEventRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      for (id, event) in encode::collate(rows, conn, &mut self.symbols) {
        match event {
          Ok(event) => {
            if use_cache {
              self.cache.insert(&event);
            }
            found.push(event);
          }
          Err(e) => tracing::error!(id, error = %e, "skipping broken stored event"),
        }
      }
    }

    let mut out = vec![None; ids.len()];
    for event in found {
      let Some(id) = event.id else { continue };
      let Some(slots) = positions.get(&id) else { continue };
      if let Some(event) = self.extensions.apply_get(event, sender) {
        for pos in slots {
          out[*pos] = Some(event.clone());
        }
      }
    }
    tracing::debug!(
      requested = ids.len(),
      cached,
      bypassed = !use_cache,
      elapsed = ?started.elapsed(),
      "got events"
    );
    Ok(out)
  }

  // ─── Find ──────────────────────────────────────────────────────────────────

  pub fn find_event_ids(&mut self, conn: &Connection, query: &FindQuery) -> Result<Vec<EventId>> {
    self.ensure_open()?;
    let started = Instant::now();
    let filter = Compiler::new(conn, &mut self.symbols, &self.taxonomy).filter(
      query.time_range,
      &query.templates,
      query.storage_state,
    )?;
    if !filter.may_have_results() {
      tracing::debug!("query cannot match; skipping the database");
      return Ok(Vec::new());
    }
    let (sql, args) = order::find_ids_sql(&filter, query.order, query.max_events);
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
      .query_map(params_from_iter(args), |r| r.get::<_, EventId>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    tracing::debug!(
      order = ?query.order,
      found = ids.len(),
      elapsed = ?started.elapsed(),
      "found event ids"
    );
    Ok(ids)
  }

  pub fn find_events(
    &mut self,
    conn: &Connection,
    query: &FindQuery,
    sender: Option<&str>,
  ) -> Result<Vec<Event>> {
    let ids = self.find_event_ids(conn, query)?;
    Ok(self.get_events(conn, &ids, sender)?.into_iter().flatten().collect())
  }

  fn seed_ids(
    &mut self,
    conn: &Connection,
    time_range: TimeRange,
    templates: &[EventTemplate],
    storage_state: StorageState,
  ) -> Result<Vec<EventId>> {
    let query = FindQuery {
      time_range,
      templates: templates.to_vec(),
      storage_state,
      max_events: 0,
      order: ResultType::LeastRecentEvents,
    };
    self.find_event_ids(conn, &query)
  }

  pub fn find_related_uris(&mut self, conn: &Connection, query: &RelatedQuery) -> Result<Vec<String>> {
    self.ensure_open()?;
    let started = Instant::now();
    let seeds = self.seed_ids(conn, query.time_range, &query.event_templates, query.storage_state)?;
    if seeds.is_empty() || query.num_results == 0 {
      return Ok(Vec::new());
    }
    // `None` lets every neighbour contribute, including when the result
    // templates match nothing.
    let allowed: Option<BTreeSet<EventId>> = if query.result_event_templates.is_empty() {
      None
    } else {
      let ids =
        self.seed_ids(conn, query.time_range, &query.result_event_templates, query.storage_state)?;
      (!ids.is_empty()).then(|| ids.into_iter().collect())
    };

    let seed_set: BTreeSet<EventId> = seeds.iter().copied().collect();
    let window = self.related_window;
    let pool: Vec<EventId> = seeds
      .iter()
      .flat_map(|seed| seed.saturating_sub(window).max(1)..=seed.saturating_add(window))
      .filter(|id| allowed.as_ref().is_none_or(|allowed| allowed.contains(id)))
      .filter(|id| !seed_set.contains(id))
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect();

    // uri -> (occurrences, latest timestamp)
    let mut tally: HashMap<String, (u64, i64)> = HashMap::new();
    for chunk in pool.chunks(CHUNK) {
      let sql = format!(
        "SELECT timestamp, subj_uri FROM event_view WHERE id IN ({})",
        placeholders(chunk.len())
      );
      let mut stmt = conn.prepare(&sql)?;
      let rows = stmt.query_map(params_from_iter(id_values(chunk)), |r| {
        Ok((r.get::<_, i64>(0)?, r.get::<_, Option<String>>(1)?))
      })?;
      for row in rows {
        let (timestamp, uri) = row?;
        let Some(uri) = uri else { continue };
        let entry = tally.entry(uri).or_insert((0, i64::MIN));
        entry.0 += 1;
        entry.1 = entry.1.max(timestamp);
      }
    }

    let mut ranked: Vec<(String, (u64, i64))> = tally.into_iter().collect();
    match query.result_type {
      RelatedResultType::Popularity => ranked.sort_by(|(ua, (ca, ta)), (ub, (cb, tb))| {
        cb.cmp(ca).then(tb.cmp(ta)).then(ua.cmp(ub))
      }),
      RelatedResultType::Recency => ranked.sort_by(|(ua, (ca, ta)), (ub, (cb, tb))| {
        tb.cmp(ta).then(cb.cmp(ca)).then(ua.cmp(ub))
      }),
    }
    let uris: Vec<String> = ranked
      .into_iter()
      .take(query.num_results as usize)
      .map(|(uri, _)| uri)
      .collect();
    tracing::debug!(
      seeds = seeds.len(),
      pool = pool.len(),
      results = uris.len(),
      elapsed = ?started.elapsed(),
      "ranked related uris"
    );
    Ok(uris)
  }

  // ─── Delete ────────────────────────────────────────────────────────────────

  pub fn delete_events(
    &mut self,
    conn: &mut Connection,
    ids: Vec<EventId>,
    sender: Option<&str>,
  ) -> Result<Option<TimeRange>> {
    self.ensure_open()?;
    let started = Instant::now();
    let ids = self.extensions.apply_pre_delete(ids, sender);
    if ids.is_empty() {
      return Ok(None);
    }
    let result = self.delete_batch(conn, &ids);
    match &result {
      Ok(Some(range)) => {
        tracing::debug!(count = ids.len(), ?range, elapsed = ?started.elapsed(), "deleted events");
        self.extensions.apply_post_delete(&ids, sender);
        self.monitors.notify_delete(*range, &ids);
      }
      Ok(None) => tracing::debug!(?ids, "tried to delete non-existing events"),
      Err(e) => {
        tracing::error!(error = %e, "delete rolled back");
        self.reset_after_failure(conn);
      }
    }
    result
  }

  fn delete_batch(&mut self, conn: &mut Connection, ids: &[EventId]) -> Result<Option<TimeRange>> {
    let tx = conn.transaction()?;
    let mut span: Option<TimeRange> = None;
    for chunk in ids.chunks(CHUNK) {
      let (min, max): (Option<i64>, Option<i64>) = tx.query_row(
        &format!(
          "SELECT MIN(timestamp), MAX(timestamp) FROM event WHERE id IN ({})",
          placeholders(chunk.len())
        ),
        params_from_iter(id_values(chunk)),
        |r| Ok((r.get(0)?, r.get(1)?)),
      )?;
      if let (Some(min), Some(max)) = (min, max) {
        span = Some(match span {
          Some(s) => TimeRange::new(s.start.min(min), s.end.max(max)),
          None => TimeRange::new(min, max),
        });
      }
    }
    let Some(span) = span else {
      return Ok(None);
    };

    for id in ids {
      self.cache.remove(*id);
    }
    for chunk in ids.chunks(CHUNK) {
      tx.execute(
        &format!("DELETE FROM event WHERE id IN ({})", placeholders(chunk.len())),
        params_from_iter(id_values(chunk)),
      )?;
    }
    self.drain_repair_log(&tx)?;
    tx.commit()?;
    Ok(Some(span))
  }

  /// Evict every symbol the delete triggers removed, then empty the log.
  fn drain_repair_log(&mut self, conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("SELECT table_name, removed_id FROM repair_log")?;
    let removed = stmt
      .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    for (table, id) in &removed {
      let symbols = self
        .symbols
        .by_name(table)
        .ok_or_else(|| Error::CacheOutOfSync(format!("no cache for table {table:?}")))?;
      symbols.forget(*id);
    }
    if !removed.is_empty() {
      tracing::debug!(count = removed.len(), "evicted removed symbols");
      conn.execute("DELETE FROM repair_log", [])?;
    }
    Ok(())
  }

  pub fn delete_log(&mut self, conn: &mut Connection) -> Result<()> {
    self.ensure_open()?;
    let started = Instant::now();
    match self.wipe(conn) {
      Ok(events) => {
        tracing::info!(events, elapsed = ?started.elapsed(), "event log wiped");
        Ok(())
      }
      Err(e) => {
        tracing::error!(error = %e, "wiping the log rolled back");
        self.reset_after_failure(conn);
        Err(e)
      }
    }
  }

  /// Empty the event and symbol tables. The per-row collection triggers
  /// are dropped for the duration; every table they maintain is emptied
  /// anyway.
  fn wipe(&mut self, conn: &mut Connection) -> Result<usize> {
    let tx = conn.transaction()?;
    let events: usize = tx.query_row("SELECT COUNT(DISTINCT id) FROM event", [], |r| r.get(0))?;
    tx.execute_batch(&schema::drop_gc_triggers())?;
    tx.execute("DELETE FROM event", [])?;
    for (table, _) in schema::REFERENCES {
      tx.execute(&format!("DELETE FROM {table}"), [])?;
    }
    tx.execute("DELETE FROM storage WHERE state IS NULL", [])?;
    tx.execute("DELETE FROM repair_log", [])?;
    tx.execute_batch(&schema::gc_triggers())?;
    tx.commit()?;

    self.symbols = Symbols::load(conn)?;
    self.cache.clear();
    self.last_id = 0;
    Ok(events)
  }

  // ─── Monitors ──────────────────────────────────────────────────────────────

  pub fn install_monitor(
    &mut self,
    time_range: TimeRange,
    templates: Vec<EventTemplate>,
  ) -> Result<(MonitorId, MonitorReceiver)> {
    self.ensure_open()?;
    Ok(self.monitors.install(time_range, templates)?)
  }

  pub fn remove_monitor(&mut self, id: MonitorId) -> Result<()> {
    self.ensure_open()?;
    Ok(self.monitors.remove(id)?)
  }

  // ─── Storage media ─────────────────────────────────────────────────────────

  pub fn set_storage_state(
    &mut self,
    conn: &Connection,
    medium: &str,
    state: StorageState,
    icon: Option<&str>,
    display_name: Option<&str>,
  ) -> Result<()> {
    self.ensure_open()?;
    let code = u32::from(state);
    if state == StorageState::Available {
      conn.execute(
        "INSERT INTO storage (value, state, icon, display_name) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(value) DO UPDATE
           SET state = excluded.state, icon = excluded.icon, display_name = excluded.display_name",
        params![medium, code, icon, display_name],
      )?;
    } else {
      conn.execute(
        "INSERT INTO storage (value, state) VALUES (?1, ?2)
         ON CONFLICT(value) DO UPDATE SET state = excluded.state",
        params![medium, code],
      )?;
    }
    tracing::info!(%medium, ?state, "storage medium changed state");
    Ok(())
  }

  pub fn storages(&self, conn: &Connection) -> Result<Vec<StorageMedium>> {
    self.ensure_open()?;
    let mut stmt =
      conn.prepare("SELECT value, state, icon, display_name FROM storage ORDER BY value")?;
    let media = stmt
      .query_map([], |r| {
        Ok(StorageMedium {
          value:        r.get(0)?,
          available:    r.get::<_, Option<u32>>(1)? == Some(StorageState::Available.into()),
          icon:         r.get(2)?,
          display_name: r.get(3)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(media)
  }

  // ─── Lifecycle ─────────────────────────────────────────────────────────────

  pub fn close(&mut self, conn: &Connection) -> Result<()> {
    if self.closed {
      return Ok(());
    }
    let pending: i64 = conn.query_row("SELECT COUNT(*) FROM repair_log", [], |r| r.get(0))?;
    self.extensions.unload();
    tracing::debug!(monitors = self.monitors.len(), "ending monitors");
    self.monitors.clear();
    self.closed = true;
    if pending > 0 {
      return Err(Error::CacheOutOfSync(format!("{pending} repair entries were never drained")));
    }
    tracing::info!(last_id = self.last_id, "event log closed");
    Ok(())
  }

  #[cfg(test)]
  pub fn cache(&self) -> &EventCache { &self.cache }

  #[cfg(test)]
  pub fn symbols(&self) -> &Symbols { &self.symbols }
}
