//! Events and subjects: the records the log stores.
//!
//! An event describes one interaction (what happened, how, and by whom) with
//! one or more subjects. Events are immutable once stored; the only field the
//! log rewrites afterwards is [`Subject::current_uri`], which follows move
//! events.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Identifier assigned by the log on insert. `0` is never assigned.
pub type EventId = u32;

/// Interpretation marking an event that moved its subjects from `uri` to
/// `current_uri`.
pub const MOVE_EVENT: &str =
  "http://www.zeitgeist-project.com/ontologies/2010/01/27/zg#MoveEvent";

/// Milliseconds since the Unix epoch, as stored in the `timestamp` column.
pub fn timestamp_now() -> i64 { Utc::now().timestamp_millis() }

// ─── Subject ─────────────────────────────────────────────────────────────────

/// A URI-identified entity involved in an event. Owned by its event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  /// The URI at the moment of the event.
  pub uri:            String,
  /// Where the subject lives now; follows later move events.
  #[serde(default)]
  pub current_uri:    String,
  #[serde(default)]
  pub interpretation: String,
  #[serde(default)]
  pub manifestation:  String,
  /// Container of the subject (parent directory, web page, ...).
  #[serde(default)]
  pub origin:         Option<String>,
  #[serde(default)]
  pub mimetype:       Option<String>,
  /// Short display string.
  #[serde(default)]
  pub text:           Option<String>,
  /// Identifier of the physical store (volume UUID, `net`, ...).
  #[serde(default)]
  pub storage:        Option<String>,
}

impl Subject {
  /// A subject with `current_uri == uri` and everything else empty.
  pub fn new(uri: impl Into<String>) -> Self {
    let uri = uri.into();
    Self { current_uri: uri.clone(), uri, ..Default::default() }
  }

  pub fn with_interpretation(mut self, interpretation: impl Into<String>) -> Self {
    self.interpretation = interpretation.into();
    self
  }

  pub fn with_manifestation(mut self, manifestation: impl Into<String>) -> Self {
    self.manifestation = manifestation.into();
    self
  }

  pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
    self.mimetype = Some(mimetype.into());
    self
  }

  pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
    self.origin = Some(origin.into());
    self
  }

  pub fn with_text(mut self, text: impl Into<String>) -> Self {
    self.text = Some(text.into());
    self
  }

  pub fn with_storage(mut self, storage: impl Into<String>) -> Self {
    self.storage = Some(storage.into());
    self
  }

  pub fn with_current_uri(mut self, current_uri: impl Into<String>) -> Self {
    self.current_uri = current_uri.into();
    self
  }
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// A record of one user interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
  /// Assigned by the log; must be `None` on insert.
  #[serde(default)]
  pub id:             Option<EventId>,
  /// Milliseconds since the Unix epoch; `0` means "now" on insert.
  #[serde(default)]
  pub timestamp:      i64,
  pub interpretation: String,
  pub manifestation:  String,
  pub actor:          String,
  #[serde(default)]
  pub origin:         Option<String>,
  /// Opaque bytes; never indexed or queried.
  #[serde(default)]
  pub payload:        Vec<u8>,
  pub subjects:       Vec<Subject>,
}

impl Event {
  /// Convenience constructor with no origin, payload or subjects.
  pub fn new(
    timestamp:      i64,
    interpretation: impl Into<String>,
    manifestation:  impl Into<String>,
    actor:          impl Into<String>,
  ) -> Self {
    Self {
      id: None,
      timestamp,
      interpretation: interpretation.into(),
      manifestation: manifestation.into(),
      actor: actor.into(),
      origin: None,
      payload: Vec::new(),
      subjects: Vec::new(),
    }
  }

  pub fn with_subject(mut self, subject: Subject) -> Self {
    self.subjects.push(subject);
    self
  }

  pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
    self.origin = Some(origin.into());
    self
  }

  pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
    self.payload = payload.into();
    self
  }

  pub fn is_move(&self) -> bool { self.interpretation == MOVE_EVENT }

  /// Normalise the event for storage and check the insert invariants.
  ///
  /// Fills a zero timestamp with `now`, collapses empty optional slots to
  /// `None` and, for non-move events, defaults an empty `current_uri` to
  /// `uri`.
  pub fn prepare_for_insert(&mut self, now: i64) -> Result<()> {
    if self.id.is_some() {
      return Err(Error::InvalidEvent("predefined event id".into()));
    }
    if self.timestamp == 0 {
      self.timestamp = now;
    }
    self.origin = self.origin.take().filter(|o| !o.is_empty());
    let is_move = self.is_move();
    for subject in &mut self.subjects {
      subject.origin = subject.origin.take().filter(|v| !v.is_empty());
      subject.mimetype = subject.mimetype.take().filter(|v| !v.is_empty());
      subject.text = subject.text.take().filter(|v| !v.is_empty());
      subject.storage = subject.storage.take().filter(|v| !v.is_empty());
      if !is_move && subject.current_uri.is_empty() {
        subject.current_uri = subject.uri.clone();
      }
    }
    self.validate()
  }

  /// Check the structural invariants without modifying the event.
  pub fn validate(&self) -> Result<()> {
    if self.subjects.is_empty() {
      return Err(Error::InvalidEvent("event has no subjects".into()));
    }
    if self.is_move() {
      let redundant = self.subjects.iter().any(|s| {
        s.uri.is_empty() || s.current_uri.is_empty() || s.uri == s.current_uri
      });
      if redundant {
        return Err(Error::RedundantMove);
      }
    } else if let Some(s) = self.subjects.iter().find(|s| s.uri != s.current_uri) {
      return Err(Error::InvalidEvent(format!(
        "subject {} has current_uri {} but the event is not a move",
        s.uri, s.current_uri
      )));
    }
    Ok(())
  }
}
