//! LRU cache of fully hydrated events, keyed by id.

use std::num::NonZeroUsize;

use lru::LruCache;
use zeit_core::{Event, EventId};

/// Default number of cached events.
pub const DEFAULT_CACHE_SIZE: usize = 2000;

pub(crate) struct EventCache {
  /// `None` when caching is disabled (capacity 0).
  entries: Option<LruCache<EventId, Event>>,
}

impl EventCache {
  pub fn new(capacity: usize) -> Self {
    Self { entries: NonZeroUsize::new(capacity).map(LruCache::new) }
  }

  pub fn capacity(&self) -> usize { self.entries.as_ref().map_or(0, |c| c.cap().get()) }

  /// Batches larger than this bypass the cache.
  pub fn batch_limit(&self) -> usize { self.capacity() / 2 }

  #[cfg(test)]
  pub fn len(&self) -> usize { self.entries.as_ref().map_or(0, LruCache::len) }

  pub fn get(&mut self, id: EventId) -> Option<Event> {
    self.entries.as_mut()?.get(&id).cloned()
  }

  #[cfg(test)]
  pub fn contains(&self, id: EventId) -> bool {
    self.entries.as_ref().is_some_and(|c| c.contains(&id))
  }

  /// Cache `event` unless it carries a payload.
  pub fn insert(&mut self, event: &Event) {
    let (Some(entries), Some(id)) = (self.entries.as_mut(), event.id) else {
      return;
    };
    if event.payload.is_empty() {
      entries.put(id, event.clone());
    }
  }

  pub fn remove(&mut self, id: EventId) {
    if let Some(entries) = self.entries.as_mut() {
      entries.pop(&id);
    }
  }

  pub fn clear(&mut self) {
    if let Some(entries) = self.entries.as_mut() {
      entries.clear();
    }
  }

  /// Mirror a move event: cached non-move events older than `timestamp`
  /// whose subject currently lives at `from` now live at `to`.
  pub fn apply_move(&mut self, from: &str, to: &str, timestamp: i64) {
    let Some(entries) = self.entries.as_mut() else {
      return;
    };
    for (_, event) in entries.iter_mut() {
      if event.timestamp >= timestamp || event.is_move() {
        continue;
      }
      for subject in &mut event.subjects {
        if subject.current_uri == from {
          subject.current_uri = to.to_string();
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use zeit_core::{MOVE_EVENT, Subject};

  use super::*;

  fn event(id: EventId, timestamp: i64, uri: &str) -> Event {
    let mut event = Event::new(timestamp, "acc", "ua", "app://a").with_subject(Subject::new(uri));
    event.id = Some(id);
    event
  }

  #[test]
  fn payload_events_are_not_cached() {
    let mut cache = EventCache::new(4);
    cache.insert(&event(1, 1, "file:///x").with_payload(b"blob".to_vec()));
    cache.insert(&event(2, 1, "file:///x"));
    assert!(!cache.contains(1));
    assert!(cache.contains(2));
  }

  #[test]
  fn least_recently_used_is_evicted() {
    let mut cache = EventCache::new(2);
    cache.insert(&event(1, 1, "a"));
    cache.insert(&event(2, 1, "b"));
    cache.get(1);
    cache.insert(&event(3, 1, "c"));
    assert!(cache.contains(1));
    assert!(!cache.contains(2));
    assert!(cache.contains(3));
  }

  #[test]
  fn batch_limit_is_half_the_capacity() {
    assert_eq!(EventCache::new(DEFAULT_CACHE_SIZE).batch_limit(), 1000);
    assert_eq!(EventCache::new(0).batch_limit(), 0);
  }

  #[test]
  fn zero_capacity_disables_caching() {
    let mut cache = EventCache::new(0);
    cache.insert(&event(1, 1, "a"));
    assert_eq!(cache.len(), 0);
    assert!(cache.get(1).is_none());
  }

  #[test]
  fn move_rewrites_older_entries_only() {
    let mut cache = EventCache::new(8);
    cache.insert(&event(1, 100, "file:///x"));
    cache.insert(&event(2, 200, "file:///x"));
    let mut earlier_move = event(3, 50, "file:///w");
    earlier_move.interpretation = MOVE_EVENT.into();
    earlier_move.subjects[0].current_uri = "file:///x".into();
    cache.insert(&earlier_move);

    cache.apply_move("file:///x", "file:///y", 150);

    assert_eq!(cache.get(1).unwrap().subjects[0].current_uri, "file:///y");
    assert_eq!(cache.get(2).unwrap().subjects[0].current_uri, "file:///x");
    assert_eq!(cache.get(3).unwrap().subjects[0].current_uri, "file:///x");
  }
}
