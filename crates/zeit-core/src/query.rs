//! Query parameter types: time ranges, storage filters and result orderings.
//!
//! The integer codes of [`StorageState`], [`ResultType`] and
//! [`RelatedResultType`] appear on the wire and must never change.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, FromRepr};

use crate::{Error, Result};

// ─── TimeRange ───────────────────────────────────────────────────────────────

/// An inclusive range of millisecond timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
  pub start: i64,
  pub end:   i64,
}

impl TimeRange {
  pub fn new(start: i64, end: i64) -> Self { Self { start, end } }

  /// The range that matches every event.
  pub fn always() -> Self { Self { start: 0, end: i64::MAX } }

  pub fn contains(&self, timestamp: i64) -> bool {
    self.start <= timestamp && timestamp <= self.end
  }

  /// The overlap of two ranges, if they share any timestamp.
  pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
    let start = self.start.max(other.start);
    let end = self.end.min(other.end);
    (start <= end).then_some(TimeRange { start, end })
  }
}

impl Default for TimeRange {
  fn default() -> Self { Self::always() }
}

// ─── StorageState ────────────────────────────────────────────────────────────

/// Filter on whether a subject's storage medium is currently reachable.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, FromRepr,
)]
#[serde(try_from = "u32", into = "u32")]
#[repr(u32)]
pub enum StorageState {
  #[default]
  Any          = 0,
  Available    = 1,
  NotAvailable = 2,
}

impl TryFrom<u32> for StorageState {
  type Error = Error;

  fn try_from(code: u32) -> Result<Self> {
    Self::from_repr(code).ok_or(Error::UnknownStorageState(code))
  }
}

impl From<StorageState> for u32 {
  fn from(state: StorageState) -> Self { state as u32 }
}

// ─── ResultType ──────────────────────────────────────────────────────────────

/// How `find_event_ids` / `find_events` group and order their results.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  FromRepr,
  EnumIter,
)]
#[serde(try_from = "u32", into = "u32")]
#[repr(u32)]
pub enum ResultType {
  #[default]
  MostRecentEvents                  = 0,
  LeastRecentEvents                 = 1,
  MostRecentSubjects                = 2,
  LeastRecentSubjects               = 3,
  MostPopularSubjects               = 4,
  LeastPopularSubjects              = 5,
  MostPopularActor                  = 6,
  LeastPopularActor                 = 7,
  MostRecentActor                   = 8,
  LeastRecentActor                  = 9,
  MostRecentOrigin                  = 10,
  LeastRecentOrigin                 = 11,
  MostPopularOrigin                 = 12,
  LeastPopularOrigin                = 13,
  OldestActor                       = 14,
  MostRecentSubjectInterpretation   = 15,
  LeastRecentSubjectInterpretation  = 16,
  MostPopularSubjectInterpretation  = 17,
  LeastPopularSubjectInterpretation = 18,
  MostRecentMimeType                = 19,
  LeastRecentMimeType               = 20,
  MostPopularMimeType               = 21,
  LeastPopularMimeType              = 22,
  MostRecentCurrentUri              = 23,
  LeastRecentCurrentUri             = 24,
  MostPopularCurrentUri             = 25,
  LeastPopularCurrentUri            = 26,
  MostRecentEventOrigin             = 27,
  LeastRecentEventOrigin            = 28,
  MostPopularEventOrigin            = 29,
  LeastPopularEventOrigin           = 30,
}

impl TryFrom<u32> for ResultType {
  type Error = Error;

  fn try_from(code: u32) -> Result<Self> {
    Self::from_repr(code).ok_or(Error::UnsupportedOrder(code))
  }
}

impl From<ResultType> for u32 {
  fn from(order: ResultType) -> Self { order as u32 }
}

/// The value a grouped result type collapses events on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
  EventOrigin,
  /// The subject's original URI.
  Subject,
  CurrentUri,
  Actor,
  /// The subject's origin.
  SubjectOrigin,
  SubjectInterpretation,
  MimeType,
}

/// Which aggregate over `timestamp` represents a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
  Max,
  Min,
}

/// Parameters of a grouped ordering.
///
/// Every grouped result type is the same query shape: keep the row with the
/// aggregate timestamp of each group, optionally rank groups by size, then
/// sort by that timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grouping {
  pub field:           GroupField,
  pub aggregate:       Aggregate,
  pub time_ascending:  bool,
  /// `Some(ascending)` ranks groups by their event count first.
  pub count_ascending: Option<bool>,
}

impl Grouping {
  const fn recent(field: GroupField, ascending: bool) -> Self {
    Self {
      field,
      aggregate: Aggregate::Max,
      time_ascending: ascending,
      count_ascending: None,
    }
  }

  const fn popular(field: GroupField, ascending: bool) -> Self {
    Self {
      field,
      aggregate: Aggregate::Max,
      time_ascending: ascending,
      count_ascending: Some(ascending),
    }
  }
}

impl ResultType {
  /// The grouping this result type performs, or `None` for the two plain
  /// event orderings.
  pub fn grouping(self) -> Option<Grouping> {
    use GroupField as F;
    use ResultType as R;

    let grouping = match self {
      R::MostRecentEvents | R::LeastRecentEvents => return None,
      R::MostRecentEventOrigin => Grouping::recent(F::EventOrigin, false),
      R::LeastRecentEventOrigin => Grouping::recent(F::EventOrigin, true),
      R::MostPopularEventOrigin => Grouping::popular(F::EventOrigin, false),
      R::LeastPopularEventOrigin => Grouping::popular(F::EventOrigin, true),
      R::MostRecentSubjects => Grouping::recent(F::Subject, false),
      R::LeastRecentSubjects => Grouping::recent(F::Subject, true),
      R::MostPopularSubjects => Grouping::popular(F::Subject, false),
      R::LeastPopularSubjects => Grouping::popular(F::Subject, true),
      R::MostRecentCurrentUri => Grouping::recent(F::CurrentUri, false),
      R::LeastRecentCurrentUri => Grouping::recent(F::CurrentUri, true),
      R::MostPopularCurrentUri => Grouping::popular(F::CurrentUri, false),
      R::LeastPopularCurrentUri => Grouping::popular(F::CurrentUri, true),
      R::MostRecentActor => Grouping::recent(F::Actor, false),
      R::LeastRecentActor => Grouping::recent(F::Actor, true),
      R::MostPopularActor => Grouping::popular(F::Actor, false),
      R::LeastPopularActor => Grouping::popular(F::Actor, true),
      R::OldestActor => Grouping {
        aggregate: Aggregate::Min,
        ..Grouping::recent(F::Actor, true)
      },
      R::MostRecentOrigin => Grouping::recent(F::SubjectOrigin, false),
      R::LeastRecentOrigin => Grouping::recent(F::SubjectOrigin, true),
      R::MostPopularOrigin => Grouping::popular(F::SubjectOrigin, false),
      R::LeastPopularOrigin => Grouping::popular(F::SubjectOrigin, true),
      R::MostRecentSubjectInterpretation => {
        Grouping::recent(F::SubjectInterpretation, false)
      }
      R::LeastRecentSubjectInterpretation => {
        Grouping::recent(F::SubjectInterpretation, true)
      }
      R::MostPopularSubjectInterpretation => {
        Grouping::popular(F::SubjectInterpretation, false)
      }
      R::LeastPopularSubjectInterpretation => {
        Grouping::popular(F::SubjectInterpretation, true)
      }
      R::MostRecentMimeType => Grouping::recent(F::MimeType, false),
      R::LeastRecentMimeType => Grouping::recent(F::MimeType, true),
      R::MostPopularMimeType => Grouping::popular(F::MimeType, false),
      R::LeastPopularMimeType => Grouping::popular(F::MimeType, true),
    };
    Some(grouping)
  }

  /// Sort direction on `timestamp` for the ungrouped orderings.
  pub fn time_ascending(self) -> bool {
    match self.grouping() {
      Some(g) => g.time_ascending,
      None => self == Self::LeastRecentEvents,
    }
  }
}

// ─── RelatedResultType ───────────────────────────────────────────────────────

/// Ranking used by `find_related_uris`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, FromRepr,
)]
#[serde(try_from = "u32", into = "u32")]
#[repr(u32)]
pub enum RelatedResultType {
  /// Most co-occurrences first.
  #[default]
  Popularity = 0,
  /// Most recently seen first.
  Recency    = 1,
}

impl TryFrom<u32> for RelatedResultType {
  type Error = Error;

  fn try_from(code: u32) -> Result<Self> {
    Self::from_repr(code).ok_or(Error::UnsupportedRelatedType(code))
  }
}

impl From<RelatedResultType> for u32 {
  fn from(kind: RelatedResultType) -> Self { kind as u32 }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator;

  use super::*;

  #[test]
  fn time_ranges_intersect_inclusively() {
    let a = TimeRange::new(10, 20);
    assert_eq!(a.intersect(&TimeRange::new(20, 30)), Some(TimeRange::new(20, 20)));
    assert_eq!(a.intersect(&TimeRange::always()), Some(a));
    assert_eq!(a.intersect(&TimeRange::new(21, 30)), None);
  }

  #[test]
  fn result_type_codes_are_dense_and_stable() {
    for (code, order) in ResultType::iter().enumerate() {
      assert_eq!(u32::from(order), code as u32);
      assert_eq!(ResultType::try_from(code as u32).unwrap(), order);
    }
    assert_eq!(ResultType::iter().count(), 31);
    assert_eq!(u32::from(ResultType::OldestActor), 14);
    assert_eq!(u32::from(ResultType::LeastPopularEventOrigin), 30);
  }

  #[test]
  fn unknown_codes_are_rejected() {
    assert!(matches!(
      ResultType::try_from(31),
      Err(Error::UnsupportedOrder(31))
    ));
    assert!(matches!(
      RelatedResultType::try_from(2),
      Err(Error::UnsupportedRelatedType(2))
    ));
    assert!(matches!(
      StorageState::try_from(9),
      Err(Error::UnknownStorageState(9))
    ));
  }

  #[test]
  fn only_event_orderings_are_ungrouped() {
    let ungrouped: Vec<_> =
      ResultType::iter().filter(|r| r.grouping().is_none()).collect();
    assert_eq!(ungrouped, vec![
      ResultType::MostRecentEvents,
      ResultType::LeastRecentEvents
    ]);
  }

  #[test]
  fn oldest_actor_uses_min() {
    let g = ResultType::OldestActor.grouping().unwrap();
    assert_eq!(g.field, GroupField::Actor);
    assert_eq!(g.aggregate, Aggregate::Min);
    assert!(g.time_ascending);
    assert_eq!(g.count_ascending, None);
  }

  #[test]
  fn popular_orderings_rank_by_count() {
    let g = ResultType::MostPopularMimeType.grouping().unwrap();
    assert_eq!(g.count_ascending, Some(false));
    assert!(!g.time_ascending);
    let g = ResultType::LeastPopularSubjects.grouping().unwrap();
    assert_eq!(g.count_ascending, Some(true));
    assert!(g.time_ascending);
  }

  #[test]
  fn result_type_serialises_as_integer() {
    let json = serde_json::to_string(&ResultType::MostRecentSubjects).unwrap();
    assert_eq!(json, "2");
    let back: ResultType = serde_json::from_str("27").unwrap();
    assert_eq!(back, ResultType::MostRecentEventOrigin);
    assert!(serde_json::from_str::<ResultType>("99").is_err());
  }
}
