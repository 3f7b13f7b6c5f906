//! Positional tuple form of event templates, as persisted by the
//! blacklist.
//!
//! Event slots: `[id, timestamp, interpretation, manifestation, actor,
//! origin]`. Subject slots: `[uri, interpretation, manifestation, origin,
//! mimetype, text, storage, current_uri]`. Missing trailing slots read as
//! empty strings; surplus slots are an error.

use crate::{
  Error, Result,
  template::{EventTemplate, SubjectTemplate},
};

pub const EVENT_SLOTS: usize = 6;
pub const SUBJECT_SLOTS: usize = 8;

/// `(event slots, subject slot lists)`. `None` subjects match any subject.
pub type WireTemplate = (Vec<String>, Option<Vec<Vec<String>>>);

fn slots(raw: Vec<String>, len: usize, what: &str) -> Result<Vec<String>> {
  if raw.len() > len {
    return Err(Error::Wire(format!(
      "{what} has {} slots, expected at most {len}",
      raw.len()
    )));
  }
  let mut raw = raw;
  raw.resize(len, String::new());
  Ok(raw)
}

// ─── Templates ───────────────────────────────────────────────────────────────

pub fn template_to_wire(template: &EventTemplate) -> WireTemplate {
  let head = vec![
    template.id.clone(),
    String::new(),
    template.interpretation.clone(),
    template.manifestation.clone(),
    template.actor.clone(),
    template.origin.clone(),
  ];
  let subjects = (!template.subjects.is_empty()).then(|| {
    template
      .subjects
      .iter()
      .map(|s| {
        vec![
          s.uri.clone(),
          s.interpretation.clone(),
          s.manifestation.clone(),
          s.origin.clone(),
          s.mimetype.clone(),
          s.text.clone(),
          s.storage.clone(),
          s.current_uri.clone(),
        ]
      })
      .collect()
  });
  (head, subjects)
}

/// The timestamp slot of a template is ignored; time filtering goes through
/// the query's time range.
pub fn template_from_wire((head, subjects): WireTemplate) -> Result<EventTemplate> {
  let [id, _timestamp, interpretation, manifestation, actor, origin]: [String; EVENT_SLOTS] =
    slots(head, EVENT_SLOTS, "event template")?
      .try_into()
      .map_err(|_| Error::Wire("event template slots".into()))?;
  let subjects = subjects
    .unwrap_or_default()
    .into_iter()
    .map(|raw| {
      let [uri, interpretation, manifestation, origin, mimetype, text, storage, current_uri]: [String;
        SUBJECT_SLOTS] = slots(raw, SUBJECT_SLOTS, "subject template")?
        .try_into()
        .map_err(|_| Error::Wire("subject template slots".into()))?;
      Ok(SubjectTemplate {
        uri,
        current_uri,
        interpretation,
        manifestation,
        origin,
        mimetype,
        text,
        storage,
      })
    })
    .collect::<Result<Vec<_>>>()?;
  Ok(EventTemplate { id, interpretation, manifestation, actor, origin, subjects })
}
