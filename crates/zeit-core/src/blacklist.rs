//! The blacklist extension: named templates whose matching events are never
//! inserted.
//!
//! Events already in the log are unaffected. The template set can be
//! persisted as a JSON object mapping ids to wire-form templates; it is
//! rewritten after every change.

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
  sync::{Arc, RwLock},
};

use crate::{
  Error, Event, Result,
  extension::Extension,
  taxonomy::Taxonomy,
  template::EventTemplate,
  wire::{self, WireTemplate},
};

pub struct Blacklist {
  templates: RwLock<BTreeMap<String, EventTemplate>>,
  path:      Option<PathBuf>,
  taxonomy:  Arc<Taxonomy>,
}

impl Blacklist {
  /// An empty, in-memory blacklist.
  pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
    Self { templates: RwLock::default(), path: None, taxonomy }
  }

  /// A blacklist backed by `path`. A missing file starts empty; an
  /// unreadable one is logged and ignored.
  pub fn open(path: impl Into<PathBuf>, taxonomy: Arc<Taxonomy>) -> Self {
    let path = path.into();
    let templates = if path.exists() {
      match Self::read(&path) {
        Ok(templates) => {
          tracing::debug!(path = %path.display(), count = templates.len(), "blacklist loaded");
          templates
        }
        Err(e) => {
          tracing::warn!(path = %path.display(), error = %e, "failed to load blacklist");
          BTreeMap::new()
        }
      }
    } else {
      tracing::debug!(path = %path.display(), "no existing blacklist");
      BTreeMap::new()
    };
    Self { templates: RwLock::new(templates), path: Some(path), taxonomy }
  }

  fn read(path: &Path) -> Result<BTreeMap<String, EventTemplate>> {
    let raw = std::fs::read_to_string(path)?;
    let wire: BTreeMap<String, WireTemplate> = serde_json::from_str(&raw)?;
    wire
      .into_iter()
      .map(|(id, t)| Ok((id, wire::template_from_wire(t)?)))
      .collect()
  }

  fn persist(&self, templates: &BTreeMap<String, EventTemplate>) -> Result<()> {
    let Some(path) = &self.path else {
      return Ok(());
    };
    let wire: BTreeMap<&str, WireTemplate> = templates
      .iter()
      .map(|(id, t)| (id.as_str(), wire::template_to_wire(t)))
      .collect();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec(&wire)?)?;
    Ok(())
  }

  /// Insert or replace the template named `id`. The in-memory set only
  /// changes once the new set is persisted.
  pub fn add_template(&self, id: impl Into<String>, template: EventTemplate) -> Result<()> {
    template.validate()?;
    let id = id.into();
    let mut templates = self.templates.write().unwrap_or_else(|e| e.into_inner());
    let mut next = templates.clone();
    next.insert(id.clone(), template);
    self.persist(&next)?;
    *templates = next;
    tracing::debug!(%id, "blacklist template added");
    Ok(())
  }

  /// Remove and return the template named `id`.
  pub fn remove_template(&self, id: &str) -> Result<EventTemplate> {
    let mut templates = self.templates.write().unwrap_or_else(|e| e.into_inner());
    let mut next = templates.clone();
    let removed = next
      .remove(id)
      .ok_or_else(|| Error::UnknownBlacklist(id.to_string()))?;
    self.persist(&next)?;
    *templates = next;
    tracing::debug!(%id, "blacklist template removed");
    Ok(removed)
  }

  pub fn templates(&self) -> BTreeMap<String, EventTemplate> {
    self.templates.read().unwrap_or_else(|e| e.into_inner()).clone()
  }

  /// The id of the first template `event` matches.
  pub fn blocking(&self, event: &Event) -> Option<String> {
    let templates = self.templates.read().unwrap_or_else(|e| e.into_inner());
    templates.iter().find_map(|(id, template)| {
      match template.matches(event, &self.taxonomy) {
        Ok(true) => Some(id.clone()),
        Ok(false) => None,
        Err(e) => {
          tracing::warn!(%id, error = %e, "skipping malformed blacklist template");
          None
        }
      }
    })
  }
}

impl Extension for Blacklist {
  fn name(&self) -> &str { "blacklist" }

  fn pre_insert(&self, event: Event, sender: Option<&str>) -> Option<Event> {
    match self.blocking(&event) {
      Some(id) => {
        tracing::debug!(template = %id, sender = sender.unwrap_or("-"), "event blacklisted");
        None
      }
      None => Some(event),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{Subject, template::SubjectTemplate};

  fn event(actor: &str) -> Event {
    Event::new(1, "acc", "ua", actor).with_subject(Subject::new("file:///x"))
  }

  #[test]
  fn matching_events_are_vetoed() {
    let blacklist = Blacklist::new(Arc::default());
    blacklist
      .add_template("no-b", EventTemplate::default().with_actor("app://b*"))
      .unwrap();
    assert!(blacklist.pre_insert(event("app://bad"), None).is_none());
    assert!(blacklist.pre_insert(event("app://good"), None).is_some());
  }

  #[test]
  fn remove_unknown_template_errors() {
    let blacklist = Blacklist::new(Arc::default());
    assert!(matches!(blacklist.remove_template("nope"), Err(Error::UnknownBlacklist(_))));
  }

  #[test]
  fn invalid_templates_are_refused() {
    let blacklist = Blacklist::new(Arc::default());
    let template = EventTemplate { id: "!1".into(), ..Default::default() };
    assert!(matches!(
      blacklist.add_template("bad", template),
      Err(Error::NotSupported { .. })
    ));
    assert!(blacklist.templates().is_empty());
  }

  #[test]
  fn failed_writes_leave_the_set_unchanged() {
    let dir = std::env::temp_dir().join(format!("zeit-blacklist-ro-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let blocker = dir.join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();

    let stored = Blacklist::open(dir.join("blacklist.json"), Arc::default());
    stored.add_template("kept", EventTemplate::default().with_actor("k")).unwrap();

    let broken = Blacklist::open(blocker.join("blacklist.json"), Arc::default());
    assert!(broken.add_template("t", EventTemplate::default().with_actor("x")).is_err());
    assert!(broken.templates().is_empty());
    assert!(broken.pre_insert(event("x"), None).is_some());

    *broken.templates.write().unwrap() = stored.templates();
    assert!(broken.remove_template("kept").is_err());
    assert!(broken.templates().contains_key("kept"));
    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn persists_and_reloads() {
    let dir = std::env::temp_dir().join(format!("zeit-blacklist-{}", std::process::id()));
    let path = dir.join("blacklist.json");
    let template = EventTemplate::default()
      .with_interpretation("acc")
      .with_subject(SubjectTemplate { uri: "file:///secret*".into(), ..Default::default() });

    let blacklist = Blacklist::open(&path, Arc::default());
    blacklist.add_template("secret", template.clone()).unwrap();
    blacklist.add_template("other", EventTemplate::default().with_actor("x")).unwrap();
    blacklist.remove_template("other").unwrap();

    let reloaded = Blacklist::open(&path, Arc::default());
    let templates = reloaded.templates();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates["secret"], template);
    std::fs::remove_dir_all(&dir).unwrap();
  }
}
