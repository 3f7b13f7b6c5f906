//! Decoding `event_view` rows back into events.
//!
//! Each event spans one row per subject. Symbol columns hold interned ids
//! that are resolved through the [`Symbols`] caches; URI, text and storage
//! columns already carry their string values.

use std::collections::BTreeMap;

use rusqlite::{Connection, Row};
use zeit_core::{Event, EventId, Subject};

use crate::{Result, symbol::Symbols};

/// Columns selected by [`RawEventRow::from_row`], in order.
pub const EVENT_COLUMNS: &str = "id, timestamp, interpretation, manifestation, actor, payload, \
  event_origin_uri, subj_uri, subj_current_uri, subj_interpretation, subj_manifestation, \
  subj_origin_uri, subj_mimetype, subj_text, subj_storage";

/// One `(event, subject)` row with symbols still interned.
#[derive(Debug)]
pub struct RawEventRow {
  pub id:                  EventId,
  pub timestamp:           i64,
  pub interpretation:      i64,
  pub manifestation:       i64,
  pub actor:               i64,
  pub payload:             Option<Vec<u8>>,
  pub origin:              Option<String>,
  pub subj_uri:            Option<String>,
  pub subj_current_uri:    Option<String>,
  pub subj_interpretation: i64,
  pub subj_manifestation:  i64,
  pub subj_origin:         Option<String>,
  pub subj_mimetype:       Option<i64>,
  pub subj_text:           Option<String>,
  pub subj_storage:        Option<String>,
}

impl RawEventRow {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                  row.get(0)?,
      timestamp:           row.get(1)?,
      interpretation:      row.get(2)?,
      manifestation:       row.get(3)?,
      actor:               row.get(4)?,
      payload:             row.get(5)?,
      origin:              row.get(6)?,
      subj_uri:            row.get(7)?,
      subj_current_uri:    row.get(8)?,
      subj_interpretation: row.get(9)?,
      subj_manifestation:  row.get(10)?,
      subj_origin:         row.get(11)?,
      subj_mimetype:       row.get(12)?,
      subj_text:           row.get(13)?,
      subj_storage:        row.get(14)?,
    })
  }

  fn event(&self, conn: &Connection, symbols: &mut Symbols) -> Result<Event> {
    Ok(Event {
      id:             Some(self.id),
      timestamp:      self.timestamp,
      interpretation: symbols.interpretation.symbol_for(conn, self.interpretation)?,
      manifestation:  symbols.manifestation.symbol_for(conn, self.manifestation)?,
      actor:          symbols.actor.symbol_for(conn, self.actor)?,
      origin:         self.origin.clone(),
      payload:        self.payload.clone().unwrap_or_default(),
      subjects:       Vec::new(),
    })
  }

  fn subject(self, conn: &Connection, symbols: &mut Symbols) -> Result<Subject> {
    let mimetype = self
      .subj_mimetype
      .map(|id| symbols.mimetype.symbol_for(conn, id))
      .transpose()?;
    Ok(Subject {
      uri: self.subj_uri.unwrap_or_default(),
      current_uri: self.subj_current_uri.unwrap_or_default(),
      interpretation: symbols.interpretation.symbol_for(conn, self.subj_interpretation)?,
      manifestation: symbols.manifestation.symbol_for(conn, self.subj_manifestation)?,
      origin: self.subj_origin,
      mimetype,
      text: self.subj_text,
      storage: self.subj_storage,
    })
  }
}

/// Group rows by event id. An event with any undecodable row is an `Err`
/// in its slot; the rest are unaffected.
pub fn collate(
  rows: Vec<RawEventRow>,
  conn: &Connection,
  symbols: &mut Symbols,
) -> BTreeMap<EventId, Result<Event>> {
  let mut events: BTreeMap<EventId, Result<Event>> = BTreeMap::new();
  for row in rows {
    let id = row.id;
    let slot = events.entry(id).or_insert_with(|| row.event(conn, symbols));
    let Ok(event) = slot else {
      continue;
    };
    match row.subject(conn, symbols) {
      Ok(subject) => event.subjects.push(subject),
      Err(e) => *slot = Err(e),
    }
  }
  events
}
