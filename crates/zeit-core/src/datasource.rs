//! The data-source registry: the programs that insert events, and whether
//! each of them is currently allowed to.
//!
//! A source registers under a stable unique id and names the sender it
//! inserts as. Events from a sender whose source is disabled are vetoed.
//! The registry can be persisted as a JSON array; `running` is never
//! restored from disk.

use std::{
  collections::{BTreeMap, BTreeSet, HashMap},
  path::{Path, PathBuf},
  sync::RwLock,
};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Event, Result, event::timestamp_now, extension::Extension, template::EventTemplate,
};

fn enabled_by_default() -> bool { true }

/// A program known to insert events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
  pub unique_id:       String,
  pub name:            String,
  pub description:     String,
  /// Informational: the kinds of event the source logs.
  #[serde(default)]
  pub event_templates: Vec<EventTemplate>,
  /// Registered since the log started.
  #[serde(default)]
  pub running:         bool,
  /// Last registration or insert, in ms.
  #[serde(default)]
  pub last_seen:       i64,
  #[serde(default = "enabled_by_default")]
  pub enabled:         bool,
}

#[derive(Default)]
struct Registry {
  sources: BTreeMap<String, DataSource>,
  /// unique id -> senders registered under it
  senders: HashMap<String, BTreeSet<String>>,
}

#[derive(Default)]
pub struct DataSourceRegistry {
  state: RwLock<Registry>,
  path:  Option<PathBuf>,
}

impl DataSourceRegistry {
  /// An empty, in-memory registry.
  pub fn new() -> Self { Self::default() }

  /// A registry backed by `path`. A missing file starts empty; an
  /// unreadable one is logged and ignored.
  pub fn open(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    let sources = if path.exists() {
      match Self::read(&path) {
        Ok(sources) => {
          tracing::debug!(path = %path.display(), count = sources.len(), "data sources loaded");
          sources
        }
        Err(e) => {
          tracing::warn!(path = %path.display(), error = %e, "failed to load data sources");
          BTreeMap::new()
        }
      }
    } else {
      tracing::debug!(path = %path.display(), "no existing data sources");
      BTreeMap::new()
    };
    let state = Registry { sources, senders: HashMap::new() };
    Self { state: RwLock::new(state), path: Some(path) }
  }

  fn read(path: &Path) -> Result<BTreeMap<String, DataSource>> {
    let raw = std::fs::read_to_string(path)?;
    let sources: Vec<DataSource> = serde_json::from_str(&raw)?;
    Ok(
      sources
        .into_iter()
        .map(|source| (source.unique_id.clone(), DataSource { running: false, ..source }))
        .collect(),
    )
  }

  fn persist(&self, sources: &BTreeMap<String, DataSource>) -> Result<()> {
    let Some(path) = &self.path else {
      return Ok(());
    };
    let sources: Vec<&DataSource> = sources.values().collect();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec(&sources)?)?;
    Ok(())
  }

  /// Register `unique_id`, or refresh its metadata if already known, and
  /// associate `sender` with it. Returns whether the source is enabled.
  pub fn register(
    &self,
    unique_id: &str,
    name: String,
    description: String,
    event_templates: Vec<EventTemplate>,
    sender: Option<&str>,
  ) -> Result<bool> {
    for template in &event_templates {
      template.validate()?;
    }
    let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
    let mut next = state.sources.clone();
    let now = timestamp_now();
    let source = next
      .entry(unique_id.to_string())
      .or_insert_with(|| DataSource {
        unique_id: unique_id.to_string(),
        name: String::new(),
        description: String::new(),
        event_templates: Vec::new(),
        running: false,
        last_seen: now,
        enabled: true,
      });
    source.name = name;
    source.description = description;
    source.event_templates = event_templates;
    source.running = true;
    source.last_seen = now;
    let enabled = source.enabled;

    self.persist(&next)?;
    state.sources = next;
    if let Some(sender) = sender {
      state.senders.entry(unique_id.to_string()).or_default().insert(sender.to_string());
    }
    tracing::info!(%unique_id, sender = sender.unwrap_or("-"), enabled, "data source registered");
    Ok(enabled)
  }

  pub fn sources(&self) -> Vec<DataSource> {
    let state = self.state.read().unwrap_or_else(|e| e.into_inner());
    state.sources.values().cloned().collect()
  }

  pub fn get(&self, unique_id: &str) -> Result<DataSource> {
    let state = self.state.read().unwrap_or_else(|e| e.into_inner());
    state
      .sources
      .get(unique_id)
      .cloned()
      .ok_or_else(|| Error::UnknownDataSource(unique_id.to_string()))
  }

  /// Allow or refuse inserts from `unique_id`'s senders.
  pub fn set_enabled(&self, unique_id: &str, enabled: bool) -> Result<()> {
    let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
    let mut next = state.sources.clone();
    let source = next
      .get_mut(unique_id)
      .ok_or_else(|| Error::UnknownDataSource(unique_id.to_string()))?;
    if source.enabled == enabled {
      return Ok(());
    }
    source.enabled = enabled;
    self.persist(&next)?;
    state.sources = next;
    tracing::info!(%unique_id, enabled, "data source toggled");
    Ok(())
  }
}

impl Extension for DataSourceRegistry {
  fn name(&self) -> &str { "datasource_registry" }

  fn pre_insert(&self, event: Event, sender: Option<&str>) -> Option<Event> {
    let Some(sender) = sender else {
      return Some(event);
    };
    let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
    let Registry { sources, senders } = &mut *state;
    let now = timestamp_now();
    let mut allowed = true;
    for (unique_id, names) in senders.iter() {
      if !names.contains(sender) {
        continue;
      }
      if let Some(source) = sources.get_mut(unique_id) {
        source.last_seen = now;
        if !source.enabled {
          tracing::debug!(%unique_id, sender, "event from disabled data source dropped");
          allowed = false;
        }
      }
    }
    allowed.then_some(event)
  }

  fn unload(&self) {
    let state = self.state.read().unwrap_or_else(|e| e.into_inner());
    if let Err(e) = self.persist(&state.sources) {
      tracing::warn!(error = %e, "failed to save data sources");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Subject;

  fn event() -> Event {
    Event::new(1, "acc", "ua", "app://a").with_subject(Subject::new("file:///x"))
  }

  fn register(registry: &DataSourceRegistry, id: &str, sender: &str) -> bool {
    registry
      .register(id, "Name".into(), "Desc".into(), vec![], Some(sender))
      .unwrap()
  }

  #[test]
  fn disabled_sources_are_vetoed() {
    let registry = DataSourceRegistry::new();
    assert!(register(&registry, "org.example.editor", "editor-1"));
    assert!(registry.pre_insert(event(), Some("editor-1")).is_some());

    registry.set_enabled("org.example.editor", false).unwrap();
    assert!(registry.pre_insert(event(), Some("editor-1")).is_none());
    assert!(registry.pre_insert(event(), Some("someone-else")).is_some());
    assert!(registry.pre_insert(event(), None).is_some());

    // Registering again reports the stored flag.
    assert!(!register(&registry, "org.example.editor", "editor-2"));
    assert!(registry.pre_insert(event(), Some("editor-2")).is_none());
  }

  #[test]
  fn unknown_sources_error() {
    let registry = DataSourceRegistry::new();
    assert!(matches!(
      registry.set_enabled("nope", false),
      Err(Error::UnknownDataSource(_))
    ));
    assert!(matches!(registry.get("nope"), Err(Error::UnknownDataSource(_))));
  }

  #[test]
  fn reregistering_updates_metadata() {
    let registry = DataSourceRegistry::new();
    register(&registry, "src", "s");
    registry
      .register("src", "Renamed".into(), "New".into(), vec![EventTemplate::default()], Some("s"))
      .unwrap();
    let source = registry.get("src").unwrap();
    assert_eq!(source.name, "Renamed");
    assert_eq!(source.event_templates.len(), 1);
    assert!(source.running);
    assert_eq!(registry.sources().len(), 1);
  }

  #[test]
  fn persists_without_running_state() {
    let dir = std::env::temp_dir().join(format!("zeit-datasources-{}", std::process::id()));
    let path = dir.join("datasources.json");

    let registry = DataSourceRegistry::open(&path);
    register(&registry, "src", "s");
    registry.set_enabled("src", false).unwrap();
    registry.unload();

    let reloaded = DataSourceRegistry::open(&path);
    let source = reloaded.get("src").unwrap();
    assert!(!source.enabled);
    assert!(!source.running);
    std::fs::remove_dir_all(&dir).unwrap();
  }
}
