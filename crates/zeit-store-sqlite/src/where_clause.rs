//! Parameterised predicate trees.

use rusqlite::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Relation {
  And,
  Or,
}

impl Relation {
  fn joiner(self) -> &'static str {
    match self {
      Self::And => " AND ",
      Self::Or => " OR ",
    }
  }
}

/// A conjunction or disjunction of SQL conditions, optionally negated.
///
/// Besides its conditions a clause tracks two facts the SQL alone cannot
/// express: that one of its members can never match (`no_result`) and,
/// for disjunctions, that one member matches everything (`unconditional`).
#[derive(Debug, Clone)]
pub(crate) struct WhereClause {
  relation:      Relation,
  negated:       bool,
  conditions:    Vec<String>,
  args:          Vec<Value>,
  no_result:     bool,
  unconditional: bool,
}

impl WhereClause {
  pub fn new(relation: Relation) -> Self {
    Self {
      relation,
      negated: false,
      conditions: Vec::new(),
      args: Vec::new(),
      no_result: false,
      unconditional: false,
    }
  }

  pub fn and() -> Self { Self::new(Relation::And) }

  pub fn or() -> Self { Self::new(Relation::Or) }

  pub fn negated(mut self, negated: bool) -> Self {
    self.negated = negated;
    self
  }

  pub fn add(&mut self, condition: impl Into<String>, args: impl IntoIterator<Item = Value>) {
    self.conditions.push(condition.into());
    self.args.extend(args);
  }

  /// Record a member that cannot match any row.
  pub fn register_no_result(&mut self) { self.no_result = true; }

  pub fn may_have_results(&self) -> bool {
    match self.relation {
      Relation::And => !self.no_result,
      Relation::Or => !self.conditions.is_empty() || self.unconditional || !self.no_result,
    }
  }

  /// Add `other` as a single member.
  pub fn extend(&mut self, other: WhereClause) {
    if !other.may_have_results() {
      if self.relation == Relation::And {
        self.conditions.clear();
        self.args.clear();
      }
      self.register_no_result();
      return;
    }
    match other.render() {
      Some((sql, args)) => self.add(sql, args),
      None if self.relation == Relation::Or => self.unconditional = true,
      None => {}
    }
  }

  /// SQL and arguments, or `None` when the clause imposes no condition.
  ///
  /// Callers must check [`WhereClause::may_have_results`] first: a clause
  /// that cannot match also renders as `None`.
  pub fn render(&self) -> Option<(String, Vec<Value>)> {
    if self.conditions.is_empty() || !self.may_have_results() {
      return None;
    }
    if self.relation == Relation::Or && self.unconditional {
      return None;
    }
    let not = if self.negated { "NOT " } else { "" };
    let sql = format!("{not}({})", self.conditions.join(self.relation.joiner()));
    Some((sql, self.args.clone()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn int(v: i64) -> Value { Value::Integer(v) }

  #[test]
  fn renders_nested_clauses() {
    let mut inner = WhereClause::or().negated(true);
    inner.add("interpretation = ?", [int(1)]);
    inner.add("interpretation = ?", [int(2)]);
    let mut outer = WhereClause::and();
    outer.add("+timestamp >= ?", [int(10)]);
    outer.extend(inner);
    let (sql, args) = outer.render().unwrap();
    assert_eq!(
      sql,
      "(+timestamp >= ? AND NOT (interpretation = ? OR interpretation = ?))"
    );
    assert_eq!(args, vec![int(10), int(1), int(2)]);
  }

  #[test]
  fn empty_clause_renders_nothing() {
    assert!(WhereClause::and().render().is_none());
    assert!(WhereClause::or().may_have_results());
  }

  #[test]
  fn and_with_a_dead_member_is_dead() {
    let mut dead = WhereClause::and();
    dead.register_no_result();
    let mut clause = WhereClause::and();
    clause.add("actor = ?", [int(1)]);
    clause.extend(dead);
    assert!(!clause.may_have_results());
    clause.add("origin = ?", [int(2)]);
    assert!(!clause.may_have_results());
    assert!(clause.render().is_none());
  }

  #[test]
  fn or_survives_dead_members() {
    let mut dead = WhereClause::and();
    dead.register_no_result();
    let mut live = WhereClause::and();
    live.add("actor = ?", [int(1)]);

    let mut only_dead = WhereClause::or();
    only_dead.extend(dead.clone());
    assert!(!only_dead.may_have_results());

    let mut mixed = WhereClause::or();
    mixed.extend(dead);
    mixed.extend(live);
    assert!(mixed.may_have_results());
    assert_eq!(mixed.render().unwrap().0, "((actor = ?))");
  }

  #[test]
  fn unconstrained_member_makes_or_unconditional() {
    let mut live = WhereClause::and();
    live.add("actor = ?", [int(1)]);
    let mut dead = WhereClause::and();
    dead.register_no_result();

    let mut templates = WhereClause::or();
    templates.extend(live);
    templates.extend(dead);
    templates.extend(WhereClause::and());
    assert!(templates.may_have_results());
    assert!(templates.render().is_none());
  }

  #[test]
  fn empty_negation_is_vacuous() {
    let mut clause = WhereClause::and();
    clause.extend(WhereClause::or().negated(true));
    assert!(clause.may_have_results());
    assert!(clause.render().is_none());
  }
}
