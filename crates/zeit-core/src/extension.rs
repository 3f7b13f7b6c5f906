//! Hooks that observe, rewrite or veto events as they pass through the log.
//!
//! Extensions run in registration order. The output of each `pre_*` and
//! `get` hook is the input of the next; a `None` from `pre_insert` or `get`
//! stops the chain.

use std::sync::Arc;

use crate::{Event, EventId};

/// An engine extension. Every hook has a pass-through default.
pub trait Extension: Send + Sync {
  fn name(&self) -> &str;

  /// Called before an event is written, after its id is assigned. `None`
  /// vetoes the insert.
  fn pre_insert(&self, event: Event, _sender: Option<&str>) -> Option<Event> {
    Some(event)
  }

  fn post_insert(&self, _event: &Event, _sender: Option<&str>) {}

  /// Called for each event on its way out of `get_events`. `None` hides it.
  fn get(&self, event: Event, _sender: Option<&str>) -> Option<Event> {
    Some(event)
  }

  /// May shrink or rewrite the id list before deletion.
  fn pre_delete(&self, ids: Vec<EventId>, _sender: Option<&str>) -> Vec<EventId> {
    ids
  }

  fn post_delete(&self, _ids: &[EventId], _sender: Option<&str>) {}

  /// Called once when the log closes.
  fn unload(&self) {}
}

#[derive(Clone, Default)]
pub struct ExtensionChain {
  extensions: Vec<Arc<dyn Extension>>,
}

impl std::fmt::Debug for ExtensionChain {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_list().entries(self.names()).finish()
  }
}

impl ExtensionChain {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, extension: Arc<dyn Extension>) {
    tracing::debug!(name = extension.name(), "extension loaded");
    self.extensions.push(extension);
  }

  pub fn with(mut self, extension: Arc<dyn Extension>) -> Self {
    self.push(extension);
    self
  }

  pub fn names(&self) -> Vec<&str> { self.extensions.iter().map(|e| e.name()).collect() }

  pub fn apply_pre_insert(&self, mut event: Event, sender: Option<&str>) -> Option<Event> {
    for extension in &self.extensions {
      event = extension.pre_insert(event, sender)?;
    }
    Some(event)
  }

  pub fn apply_post_insert(&self, event: &Event, sender: Option<&str>) {
    for extension in &self.extensions {
      extension.post_insert(event, sender);
    }
  }

  pub fn apply_get(&self, mut event: Event, sender: Option<&str>) -> Option<Event> {
    for extension in &self.extensions {
      event = extension.get(event, sender)?;
    }
    Some(event)
  }

  pub fn apply_pre_delete(&self, mut ids: Vec<EventId>, sender: Option<&str>) -> Vec<EventId> {
    for extension in &self.extensions {
      ids = extension.pre_delete(ids, sender);
    }
    ids
  }

  pub fn apply_post_delete(&self, ids: &[EventId], sender: Option<&str>) {
    for extension in &self.extensions {
      extension.post_delete(ids, sender);
    }
  }

  pub fn unload(&self) {
    for extension in &self.extensions {
      tracing::debug!(name = extension.name(), "unloading extension");
      extension.unload();
    }
  }
}
