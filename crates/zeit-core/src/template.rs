//! Event and subject templates: partial records used as query predicates.
//!
//! Every slot is a string; an empty slot is unconstrained. Slots accept two
//! operators:
//!
//! - a leading `!` negates the match,
//! - a trailing `*` turns equality into a prefix match.
//!
//! Which operators a slot honours is described by [`Field::operators`].
//! Interpretation and manifestation slots are additionally expanded through
//! the [`Taxonomy`] before matching.

use serde::{Deserialize, Serialize};

use crate::{Error, Event, Result, Subject, taxonomy::Taxonomy};

// ─── Templates ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectTemplate {
  #[serde(default)]
  pub uri:            String,
  #[serde(default)]
  pub current_uri:    String,
  #[serde(default)]
  pub interpretation: String,
  #[serde(default)]
  pub manifestation:  String,
  #[serde(default)]
  pub origin:         String,
  #[serde(default)]
  pub mimetype:       String,
  /// Matched literally: `!` and `*` carry no meaning here.
  #[serde(default)]
  pub text:           String,
  #[serde(default)]
  pub storage:        String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTemplate {
  /// Exact event id, in decimal.
  #[serde(default)]
  pub id:             String,
  #[serde(default)]
  pub interpretation: String,
  #[serde(default)]
  pub manifestation:  String,
  #[serde(default)]
  pub actor:          String,
  #[serde(default)]
  pub origin:         String,
  /// All subject templates must hold for one and the same subject. Empty
  /// matches any subject.
  #[serde(default)]
  pub subjects:       Vec<SubjectTemplate>,
}

impl EventTemplate {
  pub fn with_interpretation(mut self, value: impl Into<String>) -> Self {
    self.interpretation = value.into();
    self
  }

  pub fn with_manifestation(mut self, value: impl Into<String>) -> Self {
    self.manifestation = value.into();
    self
  }

  pub fn with_actor(mut self, value: impl Into<String>) -> Self {
    self.actor = value.into();
    self
  }

  pub fn with_subject(mut self, subject: SubjectTemplate) -> Self {
    self.subjects.push(subject);
    self
  }

  /// The exact id this template asks for, if any.
  pub fn event_id(&self) -> Result<Option<u32>> {
    Field::EventId
      .parse(&self.id)?
      .map(|p| parse_event_id(p.value))
      .transpose()
  }

  /// Reject slot values no query could compile.
  pub fn validate(&self) -> Result<()> { self.event_id().map(|_| ()) }

  /// Evaluate the template against an in-memory event, with the same
  /// semantics the stores use for queries.
  pub fn matches(&self, event: &Event, taxonomy: &Taxonomy) -> Result<bool> {
    if let Some(id) = self.event_id()? {
      if event.id != Some(id) {
        return Ok(false);
      }
    }
    let event_ok = Field::EventInterpretation.matches(
      &self.interpretation,
      Some(event.interpretation.as_str()),
      taxonomy,
    )? && Field::EventManifestation.matches(
      &self.manifestation,
      Some(event.manifestation.as_str()),
      taxonomy,
    )? && Field::Actor.matches(&self.actor, Some(event.actor.as_str()), taxonomy)?
      && Field::EventOrigin.matches(&self.origin, event.origin.as_deref(), taxonomy)?;
    if !event_ok {
      return Ok(false);
    }
    if self.subjects.is_empty() {
      return Ok(true);
    }
    for subject in &event.subjects {
      let mut all = true;
      for template in &self.subjects {
        if !template.matches(subject, taxonomy)? {
          all = false;
          break;
        }
      }
      if all {
        return Ok(true);
      }
    }
    Ok(false)
  }
}

impl SubjectTemplate {
  pub fn matches(&self, subject: &Subject, taxonomy: &Taxonomy) -> Result<bool> {
    let checks: [(Field, &str, Option<&str>); 8] = [
      (Field::SubjectUri, self.uri.as_str(), Some(subject.uri.as_str())),
      (
        Field::SubjectCurrentUri,
        self.current_uri.as_str(),
        Some(subject.current_uri.as_str()),
      ),
      (
        Field::SubjectInterpretation,
        self.interpretation.as_str(),
        Some(subject.interpretation.as_str()),
      ),
      (
        Field::SubjectManifestation,
        self.manifestation.as_str(),
        Some(subject.manifestation.as_str()),
      ),
      (Field::SubjectOrigin, self.origin.as_str(), subject.origin.as_deref()),
      (Field::SubjectMimetype, self.mimetype.as_str(), subject.mimetype.as_deref()),
      (Field::SubjectText, self.text.as_str(), subject.text.as_deref()),
      (Field::SubjectStorage, self.storage.as_str(), subject.storage.as_deref()),
    ];
    for (field, pattern, value) in checks {
      if !field.matches(pattern, value, taxonomy)? {
        return Ok(false);
      }
    }
    Ok(true)
  }
}

/// The decimal id held by an event-id slot.
pub fn parse_event_id(value: &str) -> Result<u32> {
  value
    .parse()
    .map_err(|_| Error::Wire(format!("event id {value:?} is not a number")))
}

// ─── Fields & operators ──────────────────────────────────────────────────────

/// A template slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
  EventId,
  EventInterpretation,
  EventManifestation,
  Actor,
  EventOrigin,
  SubjectUri,
  SubjectCurrentUri,
  SubjectInterpretation,
  SubjectManifestation,
  SubjectOrigin,
  SubjectMimetype,
  SubjectText,
  SubjectStorage,
}

/// How a slot treats the `!` and `*` operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operators {
  /// Both operators are recognised.
  Full,
  /// Operator characters are part of the value.
  Literal,
  /// Operators are an error.
  Rejected,
}

/// A slot value with its operators split off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern<'a> {
  pub value:    &'a str,
  pub negated:  bool,
  pub wildcard: bool,
}

impl Pattern<'_> {
  /// The same operators applied to another value.
  pub fn with_value<'b>(&self, value: &'b str) -> Pattern<'b> {
    Pattern { value, negated: self.negated, wildcard: self.wildcard }
  }

  /// Equality or prefix test, ignoring negation.
  pub fn hits(&self, candidate: &str) -> bool {
    if self.wildcard {
      candidate.starts_with(self.value)
    } else {
      candidate == self.value
    }
  }
}

impl Field {
  pub fn name(self) -> &'static str {
    match self {
      Self::EventId => "id",
      Self::EventInterpretation => "interpretation",
      Self::EventManifestation => "manifestation",
      Self::Actor => "actor",
      Self::EventOrigin => "origin",
      Self::SubjectUri => "subject uri",
      Self::SubjectCurrentUri => "subject current_uri",
      Self::SubjectInterpretation => "subject interpretation",
      Self::SubjectManifestation => "subject manifestation",
      Self::SubjectOrigin => "subject origin",
      Self::SubjectMimetype => "subject mimetype",
      Self::SubjectText => "subject text",
      Self::SubjectStorage => "subject storage",
    }
  }

  pub fn operators(self) -> Operators {
    match self {
      Self::EventId => Operators::Rejected,
      Self::SubjectText => Operators::Literal,
      _ => Operators::Full,
    }
  }

  /// Interpretation and manifestation slots expand through the taxonomy.
  pub fn uses_taxonomy(self) -> bool {
    matches!(
      self,
      Self::EventInterpretation
        | Self::EventManifestation
        | Self::SubjectInterpretation
        | Self::SubjectManifestation
    )
  }

  /// Split the operators off `raw`. Returns `None` for an unconstrained
  /// slot.
  pub fn parse(self, raw: &str) -> Result<Option<Pattern<'_>>> {
    let mut pattern = Pattern { value: raw, negated: false, wildcard: false };
    match self.operators() {
      Operators::Literal => {}
      Operators::Rejected => {
        if raw.starts_with('!') {
          return Err(Error::NotSupported { field: self.name(), operator: "negation" });
        }
        if raw.ends_with('*') {
          return Err(Error::NotSupported { field: self.name(), operator: "wildcard" });
        }
      }
      Operators::Full => {
        if let Some(rest) = pattern.value.strip_prefix('!') {
          pattern.value = rest;
          pattern.negated = true;
        }
        if let Some(rest) = pattern.value.strip_suffix('*') {
          pattern.value = rest;
          pattern.wildcard = true;
        }
      }
    }
    if pattern.value.is_empty() {
      return Ok(None);
    }
    Ok(Some(pattern))
  }

  /// Evaluate `raw` against a stored value. `None` stands for a NULL
  /// column, which only negated patterns accept.
  pub fn matches(
    self,
    raw: &str,
    value: Option<&str>,
    taxonomy: &Taxonomy,
  ) -> Result<bool> {
    let Some(pattern) = self.parse(raw)? else {
      return Ok(true);
    };
    let hit = match value {
      None => false,
      Some(value) if self.uses_taxonomy() => taxonomy
        .expand(pattern.value)
        .iter()
        .any(|member| pattern.with_value(member).hits(value)),
      Some(value) => pattern.hits(value),
    };
    Ok(hit != pattern.negated)
  }
}
