//! SQL schema for the Zeitgeist SQLite store.
//!
//! Executed at connection startup; every statement is idempotent. The
//! garbage-collection and repair triggers are generated from
//! [`REFERENCES`] and [`JOURNALED`].

pub const SCHEMA_VERSION: i64 = 1;

/// Interned tables, the event table, the repair journal and indexes.
const TABLES: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS uri            (id INTEGER PRIMARY KEY, value VARCHAR UNIQUE);
CREATE TABLE IF NOT EXISTS interpretation (id INTEGER PRIMARY KEY, value VARCHAR UNIQUE);
CREATE TABLE IF NOT EXISTS manifestation  (id INTEGER PRIMARY KEY, value VARCHAR UNIQUE);
CREATE TABLE IF NOT EXISTS mimetype       (id INTEGER PRIMARY KEY, value VARCHAR UNIQUE);
CREATE TABLE IF NOT EXISTS actor          (id INTEGER PRIMARY KEY, value VARCHAR UNIQUE);
CREATE TABLE IF NOT EXISTS text           (id INTEGER PRIMARY KEY, value VARCHAR UNIQUE);
CREATE TABLE IF NOT EXISTS payload        (id INTEGER PRIMARY KEY, value BLOB);

-- state holds a StorageState code; NULL means never reported.
CREATE TABLE IF NOT EXISTS storage (
    id           INTEGER PRIMARY KEY,
    value        VARCHAR UNIQUE,
    state        INTEGER,
    icon         VARCHAR,
    display_name VARCHAR
);

-- One row per (event, subject). Rows of one event share id.
CREATE TABLE IF NOT EXISTS event (
    id                  INTEGER,
    timestamp           INTEGER,
    interpretation      INTEGER,
    manifestation       INTEGER,
    actor               INTEGER,
    payload             INTEGER,
    subj_id             INTEGER,
    subj_id_current     INTEGER,
    subj_interpretation INTEGER,
    subj_manifestation  INTEGER,
    subj_origin         INTEGER,
    subj_mimetype       INTEGER,
    subj_text           INTEGER,
    subj_storage        INTEGER,
    origin              INTEGER,
    CONSTRAINT unique_event
        UNIQUE (timestamp, interpretation, manifestation, actor, subj_id)
);

CREATE INDEX IF NOT EXISTS event_id                  ON event(id);
CREATE INDEX IF NOT EXISTS event_timestamp           ON event(timestamp);
CREATE INDEX IF NOT EXISTS event_interpretation      ON event(interpretation);
CREATE INDEX IF NOT EXISTS event_manifestation       ON event(manifestation);
CREATE INDEX IF NOT EXISTS event_actor               ON event(actor);
CREATE INDEX IF NOT EXISTS event_origin              ON event(origin);
CREATE INDEX IF NOT EXISTS event_subj_id             ON event(subj_id);
CREATE INDEX IF NOT EXISTS event_subj_id_current     ON event(subj_id_current);
CREATE INDEX IF NOT EXISTS event_subj_interpretation ON event(subj_interpretation);
CREATE INDEX IF NOT EXISTS event_subj_manifestation  ON event(subj_manifestation);
CREATE INDEX IF NOT EXISTS event_subj_origin         ON event(subj_origin);
CREATE INDEX IF NOT EXISTS event_subj_mimetype       ON event(subj_mimetype);
CREATE INDEX IF NOT EXISTS event_subj_text           ON event(subj_text);
CREATE INDEX IF NOT EXISTS event_subj_storage        ON event(subj_storage);

-- Symbol rows removed by the triggers below; drained after every delete.
CREATE TABLE IF NOT EXISTS repair_log (
    table_name VARCHAR NOT NULL,
    removed_id INTEGER NOT NULL
);
";

/// Materialises the string value behind every id column.
const VIEW: &str = "
DROP VIEW IF EXISTS event_view;
CREATE VIEW event_view AS
    SELECT event.id,
        event.timestamp,
        event.interpretation,
        event.manifestation,
        event.actor,
        (SELECT value FROM payload WHERE payload.id = event.payload) AS payload,
        (SELECT value FROM uri WHERE uri.id = event.subj_id) AS subj_uri,
        event.subj_id,
        event.subj_interpretation,
        event.subj_manifestation,
        event.subj_origin,
        (SELECT value FROM uri WHERE uri.id = event.subj_origin) AS subj_origin_uri,
        event.subj_mimetype,
        (SELECT value FROM text WHERE text.id = event.subj_text) AS subj_text,
        (SELECT value FROM storage WHERE storage.id = event.subj_storage) AS subj_storage,
        (SELECT state FROM storage WHERE storage.id = event.subj_storage) AS subj_storage_state,
        event.origin,
        (SELECT value FROM uri WHERE uri.id = event.origin) AS event_origin_uri,
        (SELECT value FROM uri WHERE uri.id = event.subj_id_current) AS subj_current_uri,
        event.subj_id_current,
        event.rowid AS subj_position
    FROM event;
";

/// Event columns referencing each garbage-collected table. A row is removed
/// once no event row references it through any of its columns.
///
/// `storage` is absent: its rows carry media state and outlive their events.
pub const REFERENCES: &[(&str, &[&str])] = &[
  ("uri", &["origin", "subj_id", "subj_id_current", "subj_origin"]),
  ("interpretation", &["interpretation", "subj_interpretation"]),
  ("manifestation", &["manifestation", "subj_manifestation"]),
  ("actor", &["actor"]),
  ("mimetype", &["subj_mimetype"]),
  ("text", &["subj_text"]),
  ("payload", &["payload"]),
];

/// Tables whose deletions are journaled for the in-process symbol caches.
pub const JOURNALED: &[&str] = &["interpretation", "manifestation", "mimetype", "actor"];

fn gc_trigger_names() -> impl Iterator<Item = String> {
  REFERENCES.iter().flat_map(|(table, columns)| {
    columns.iter().map(move |column| format!("gc_{table}_{column}"))
  })
}

pub fn gc_triggers() -> String {
  let mut sql = String::new();
  for (table, columns) in REFERENCES {
    for column in *columns {
      let uses = columns
        .iter()
        .map(|c| format!("{c} = OLD.{column}"))
        .collect::<Vec<_>>()
        .join(" OR ");
      sql.push_str(&format!(
        "CREATE TRIGGER IF NOT EXISTS gc_{table}_{column}
         BEFORE DELETE ON event
         WHEN OLD.{column} IS NOT NULL
           AND (SELECT COUNT(*) FROM event WHERE {uses}) < 2
         BEGIN
           DELETE FROM {table} WHERE id = OLD.{column};
         END;\n"
      ));
    }
  }
  sql
}

/// Drops every trigger [`gc_triggers`] creates.
pub fn drop_gc_triggers() -> String {
  gc_trigger_names()
    .map(|name| format!("DROP TRIGGER IF EXISTS {name};\n"))
    .collect()
}

fn repair_triggers() -> String {
  JOURNALED
    .iter()
    .map(|table| {
      format!(
        "CREATE TRIGGER IF NOT EXISTS repair_{table}
         AFTER DELETE ON {table}
         BEGIN
           INSERT INTO repair_log (table_name, removed_id) VALUES ('{table}', OLD.id);
         END;\n"
      )
    })
    .collect()
}

/// Full schema DDL.
pub fn schema_sql() -> String {
  format!(
    "{TABLES}\n{VIEW}\n{}\n{}\nPRAGMA user_version = {SCHEMA_VERSION};\n",
    gc_triggers(),
    repair_triggers()
  )
}
