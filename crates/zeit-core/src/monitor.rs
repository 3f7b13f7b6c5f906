//! Monitors: standing queries that are told about matching inserts and
//! about deletes overlapping their time range.
//!
//! Each monitor owns the sending half of a bounded channel. A monitor whose
//! receiver has been dropped is forgotten the next time a notification is
//! dispatched.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
  },
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{
  Error, Event, EventId, Result, query::TimeRange, taxonomy::Taxonomy, template::EventTemplate,
};

pub type MonitorId = u64;

/// Notifications queued per monitor before new ones are dropped.
pub const MONITOR_BUFFER: usize = 256;

/// What a monitor is told.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
  /// Newly inserted events matching the monitor. `time_range` is the span
  /// of the inserted batch clipped to the monitor's range.
  Insert {
    time_range: TimeRange,
    events:     Vec<Event>,
  },
  /// Ids deleted by one call whose span overlaps the monitor's range.
  Delete {
    time_range: TimeRange,
    ids:        Vec<EventId>,
  },
}

impl Notification {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Insert { .. } => "insert",
      Self::Delete { .. } => "delete",
    }
  }
}

pub type MonitorReceiver = mpsc::Receiver<Notification>;

struct Monitor {
  time_range: TimeRange,
  templates:  Vec<EventTemplate>,
  tx:         mpsc::Sender<Notification>,
}

impl Monitor {
  fn matches(&self, event: &Event, taxonomy: &Taxonomy) -> bool {
    self.time_range.contains(event.timestamp)
      && (self.templates.is_empty()
        || self
          .templates
          .iter()
          .any(|t| t.matches(event, taxonomy).unwrap_or(false)))
  }

  /// Queue `notification`. Returns whether the monitor is still listening.
  fn deliver(&self, id: MonitorId, notification: Notification) -> bool {
    match self.tx.try_send(notification) {
      Ok(()) => true,
      Err(TrySendError::Full(n)) => {
        tracing::warn!(id, kind = n.kind(), "monitor is not keeping up; notification dropped");
        true
      }
      Err(TrySendError::Closed(_)) => {
        tracing::debug!(id, "monitor receiver dropped");
        false
      }
    }
  }
}

/// The set of installed monitors.
#[derive(Default)]
pub struct Monitors {
  next_id:  AtomicU64,
  monitors: Mutex<HashMap<MonitorId, Monitor>>,
  taxonomy: Arc<Taxonomy>,
}

impl Monitors {
  pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
    Self { taxonomy, ..Default::default() }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<MonitorId, Monitor>> {
    self.monitors.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Install a monitor. An empty template list matches every event in
  /// `time_range`.
  pub fn install(
    &self,
    time_range: TimeRange,
    templates: Vec<EventTemplate>,
  ) -> Result<(MonitorId, MonitorReceiver)> {
    for template in &templates {
      template.validate()?;
    }
    let (tx, rx) = mpsc::channel(MONITOR_BUFFER);
    let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
    self.lock().insert(id, Monitor { time_range, templates, tx });
    tracing::debug!(id, ?time_range, "monitor installed");
    Ok((id, rx))
  }

  pub fn remove(&self, id: MonitorId) -> Result<()> {
    self.lock().remove(&id).ok_or(Error::UnknownMonitor(id))?;
    tracing::debug!(id, "monitor removed");
    Ok(())
  }

  pub fn len(&self) -> usize { self.lock().len() }

  /// Drop every monitor, ending their streams.
  pub fn clear(&self) { self.lock().clear(); }

  /// Tell each monitor about the inserted events it matches.
  pub fn notify_insert(&self, events: &[Event]) {
    let Some(span) = events
      .iter()
      .map(|e| TimeRange::new(e.timestamp, e.timestamp))
      .reduce(|a, b| TimeRange::new(a.start.min(b.start), a.end.max(b.end)))
    else {
      return;
    };
    self.lock().retain(|id, monitor| {
      let matching: Vec<Event> = events
        .iter()
        .filter(|e| monitor.matches(e, &self.taxonomy))
        .cloned()
        .collect();
      if matching.is_empty() {
        return !monitor.tx.is_closed();
      }
      let time_range = span.intersect(&monitor.time_range).unwrap_or(span);
      monitor.deliver(*id, Notification::Insert { time_range, events: matching })
    });
  }

  /// Tell each monitor whose range overlaps `span` about the deleted ids.
  pub fn notify_delete(&self, span: TimeRange, ids: &[EventId]) {
    self.lock().retain(|id, monitor| match span.intersect(&monitor.time_range) {
      Some(time_range) => {
        monitor.deliver(*id, Notification::Delete { time_range, ids: ids.to_vec() })
      }
      None => !monitor.tx.is_closed(),
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Subject;

  fn event(id: EventId, timestamp: i64, actor: &str) -> Event {
    let mut event = Event::new(timestamp, "acc", "ua", actor).with_subject(Subject::new("x"));
    event.id = Some(id);
    event
  }

  #[test]
  fn inserts_are_filtered_by_template_and_range() {
    let monitors = Monitors::default();
    let (_, mut rx) = monitors
      .install(TimeRange::new(0, 50), vec![EventTemplate::default().with_actor("app://a")])
      .unwrap();

    monitors.notify_insert(&[event(1, 10, "app://a"), event(2, 20, "app://b"), event(3, 90, "app://a")]);
    let Notification::Insert { time_range, events } = rx.try_recv().unwrap() else {
      panic!("expected an insert notification");
    };
    assert_eq!(time_range, TimeRange::new(10, 50));
    assert_eq!(events.iter().map(|e| e.id).collect::<Vec<_>>(), vec![Some(1)]);

    monitors.notify_insert(&[event(4, 30, "app://b")]);
    assert!(rx.try_recv().is_err());
  }

  #[test]
  fn deletes_need_an_overlapping_range() {
    let monitors = Monitors::default();
    let (_, mut rx) = monitors.install(TimeRange::new(100, 200), vec![]).unwrap();

    monitors.notify_delete(TimeRange::new(10, 20), &[1]);
    assert!(rx.try_recv().is_err());

    monitors.notify_delete(TimeRange::new(150, 300), &[2, 3]);
    assert_eq!(rx.try_recv().unwrap(), Notification::Delete {
      time_range: TimeRange::new(150, 200),
      ids:        vec![2, 3],
    });
  }

  #[test]
  fn dropped_receivers_are_forgotten() {
    let monitors = Monitors::default();
    let (_, rx) = monitors.install(TimeRange::always(), vec![]).unwrap();
    let (kept, _rx) = monitors.install(TimeRange::always(), vec![]).unwrap();
    drop(rx);
    monitors.notify_delete(TimeRange::new(1, 1), &[1]);
    assert_eq!(monitors.len(), 1);
    monitors.remove(kept).unwrap();
    assert!(matches!(monitors.remove(kept), Err(Error::UnknownMonitor(_))));
  }

  #[test]
  fn invalid_templates_are_refused() {
    let monitors = Monitors::default();
    let template = EventTemplate { id: "!1".into(), ..Default::default() };
    assert!(monitors.install(TimeRange::always(), vec![template]).is_err());
    assert_eq!(monitors.len(), 0);
  }
}
