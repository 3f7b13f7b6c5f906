//! Template compilation: time range, storage filter and event templates to
//! a [`WhereClause`] over `event_view`.

use rusqlite::{Connection, types::Value};
use zeit_core::{
  query::{StorageState, TimeRange},
  taxonomy::Taxonomy,
  template::{EventTemplate, Field, Pattern, SubjectTemplate, parse_event_id},
};

use crate::{
  Result,
  symbol::{SymbolTable, Symbols},
  where_clause::WhereClause,
};

/// Smallest string greater than every string starting with `prefix`, if
/// one exists.
pub(crate) fn prefix_upper_bound(prefix: &str) -> Option<String> {
  let mut chars: Vec<char> = prefix.chars().collect();
  while let Some(last) = chars.pop() {
    let next = (last as u32 + 1..=char::MAX as u32).find_map(char::from_u32);
    if let Some(next) = next {
      chars.push(next);
      return Some(chars.into_iter().collect());
    }
  }
  None
}

/// `column` starts with `prefix`, as an index-friendly range.
fn prefix_range(column: &str, prefix: &str) -> (String, Vec<Value>) {
  match prefix_upper_bound(prefix) {
    Some(upper) => (
      format!("{column} >= ? AND {column} < ?"),
      vec![Value::Text(prefix.into()), Value::Text(upper)],
    ),
    None => (format!("{column} >= ?"), vec![Value::Text(prefix.into())]),
  }
}

/// The interned table behind a symbol column.
#[derive(Clone, Copy)]
enum Interned {
  Interpretation,
  Manifestation,
  Actor,
  Mimetype,
}

/// Where each field lives in `event_view`.
enum Column {
  /// The integer event id.
  Id,
  /// Interned through a [`SymbolTable`]; `id_column` holds the id.
  Symbol { id_column: &'static str, interned: Interned },
  /// A string column of the view.
  Value { column: &'static str },
}

fn column(field: Field) -> Column {
  use Interned::*;
  let symbol = |id_column, interned| Column::Symbol { id_column, interned };
  match field {
    Field::EventId => Column::Id,
    Field::EventInterpretation => symbol("interpretation", Interpretation),
    Field::EventManifestation => symbol("manifestation", Manifestation),
    Field::Actor => symbol("actor", Actor),
    Field::EventOrigin => Column::Value { column: "event_origin_uri" },
    Field::SubjectUri => Column::Value { column: "subj_uri" },
    Field::SubjectCurrentUri => Column::Value { column: "subj_current_uri" },
    Field::SubjectInterpretation => symbol("subj_interpretation", Interpretation),
    Field::SubjectManifestation => symbol("subj_manifestation", Manifestation),
    Field::SubjectOrigin => Column::Value { column: "subj_origin_uri" },
    Field::SubjectMimetype => symbol("subj_mimetype", Mimetype),
    Field::SubjectText => Column::Value { column: "subj_text" },
    Field::SubjectStorage => Column::Value { column: "subj_storage" },
  }
}

pub(crate) struct Compiler<'a> {
  conn:     &'a Connection,
  symbols:  &'a mut Symbols,
  taxonomy: &'a Taxonomy,
}

impl<'a> Compiler<'a> {
  pub fn new(conn: &'a Connection, symbols: &'a mut Symbols, taxonomy: &'a Taxonomy) -> Self {
    Self { conn, symbols, taxonomy }
  }

  /// The full filter of a find query.
  pub fn filter(
    &mut self,
    time_range: TimeRange,
    templates: &[EventTemplate],
    storage_state: StorageState,
  ) -> Result<WhereClause> {
    let mut clause = WhereClause::and();

    // The unary `+` keeps SQLite from choosing the timestamp index, which
    // is slower than the others on large logs.
    if time_range.start != 0 {
      clause.add("+timestamp >= ?", [Value::Integer(time_range.start)]);
    }
    if time_range.end != i64::MAX {
      clause.add("+timestamp <= ?", [Value::Integer(time_range.end)]);
    }

    match storage_state {
      StorageState::Any => {}
      state => clause.add(
        "(subj_storage_state = ? OR subj_storage_state IS NULL)",
        [Value::Integer(u32::from(state).into())],
      ),
    }

    clause.extend(self.templates(templates)?);
    Ok(clause)
  }

  /// OR of the templates. No templates means no constraint.
  pub fn templates(&mut self, templates: &[EventTemplate]) -> Result<WhereClause> {
    let mut any = WhereClause::or();
    for template in templates {
      let compiled = self.event_template(template)?;
      if !compiled.may_have_results() {
        tracing::debug!(?template, "template references unknown symbols");
      }
      any.extend(compiled);
    }
    Ok(any)
  }

  fn event_template(&mut self, template: &EventTemplate) -> Result<WhereClause> {
    let mut all = WhereClause::and();
    self.field(&mut all, Field::EventId, &template.id)?;
    self.field(&mut all, Field::EventInterpretation, &template.interpretation)?;
    self.field(&mut all, Field::EventManifestation, &template.manifestation)?;
    self.field(&mut all, Field::Actor, &template.actor)?;
    self.field(&mut all, Field::EventOrigin, &template.origin)?;
    for subject in &template.subjects {
      self.subject_template(&mut all, subject)?;
    }
    Ok(all)
  }

  fn subject_template(&mut self, all: &mut WhereClause, subject: &SubjectTemplate) -> Result<()> {
    self.field(all, Field::SubjectUri, &subject.uri)?;
    self.field(all, Field::SubjectCurrentUri, &subject.current_uri)?;
    self.field(all, Field::SubjectInterpretation, &subject.interpretation)?;
    self.field(all, Field::SubjectManifestation, &subject.manifestation)?;
    self.field(all, Field::SubjectOrigin, &subject.origin)?;
    self.field(all, Field::SubjectMimetype, &subject.mimetype)?;
    self.field(all, Field::SubjectText, &subject.text)?;
    self.field(all, Field::SubjectStorage, &subject.storage)?;
    Ok(())
  }

  fn table(&mut self, interned: Interned) -> &mut SymbolTable {
    match interned {
      Interned::Interpretation => &mut self.symbols.interpretation,
      Interned::Manifestation => &mut self.symbols.manifestation,
      Interned::Actor => &mut self.symbols.actor,
      Interned::Mimetype => &mut self.symbols.mimetype,
    }
  }

  /// AND one slot's condition into `all`.
  fn field(&mut self, all: &mut WhereClause, field: Field, raw: &str) -> Result<()> {
    let Some(pattern) = field.parse(raw)? else {
      return Ok(());
    };
    match column(field) {
      // `Field::parse` has already refused operators on the id.
      Column::Id => {
        let id = parse_event_id(pattern.value)?;
        all.add("id = ?", [Value::Integer(id.into())]);
      }
      Column::Value { column } => {
        let (sql, args) = value_condition(column, pattern);
        all.add(sql, args);
      }
      Column::Symbol { id_column, interned } if field.uses_taxonomy() => {
        // Positive: any member matches. Negated: no member matches.
        let mut any = WhereClause::or().negated(pattern.negated);
        for member in self.taxonomy.expand(pattern.value) {
          let member = pattern.with_value(&member);
          self.symbol_member(&mut any, interned, id_column, member)?;
        }
        all.extend(any);
      }
      Column::Symbol { id_column, interned } => {
        let table = self.table(interned).table();
        if pattern.wildcard {
          let (range, args) = prefix_range("value", pattern.value);
          let subquery = format!("SELECT id FROM {table} WHERE {range}");
          if pattern.negated {
            all.add(format!("({id_column} NOT IN ({subquery}) OR {id_column} IS NULL)"), args);
          } else {
            all.add(format!("{id_column} IN ({subquery})"), args);
          }
          return Ok(());
        }
        let conn = self.conn;
        match self.table(interned).lookup(conn, pattern.value)? {
          Some(id) if pattern.negated => all.add(
            format!("({id_column} != ? OR {id_column} IS NULL)"),
            [Value::Integer(id)],
          ),
          Some(id) => all.add(format!("{id_column} = ?"), [Value::Integer(id)]),
          // Nothing carries an unknown symbol, so its negation holds for
          // every row.
          None if pattern.negated => {}
          None => all.register_no_result(),
        }
      }
    }
    Ok(())
  }

  /// One taxonomy member as a positive disjunct; negation is carried by
  /// the enclosing clause.
  fn symbol_member(
    &mut self,
    any: &mut WhereClause,
    interned: Interned,
    id_column: &str,
    member: Pattern<'_>,
  ) -> Result<()> {
    let table = self.table(interned).table();
    if member.wildcard {
      let (range, args) = prefix_range("value", member.value);
      any.add(format!("{id_column} IN (SELECT id FROM {table} WHERE {range})"), args);
      return Ok(());
    }
    let conn = self.conn;
    match self.table(interned).lookup(conn, member.value)? {
      Some(id) => any.add(format!("{id_column} = ?"), [Value::Integer(id)]),
      None if member.negated => {}
      None => any.register_no_result(),
    }
    Ok(())
  }
}

/// Condition on a string column of the view. Negated forms also match NULL.
fn value_condition(column: &str, pattern: Pattern<'_>) -> (String, Vec<Value>) {
  let (sql, args) = if pattern.wildcard {
    let (range, args) = prefix_range(column, pattern.value);
    (format!("({range})"), args)
  } else {
    (format!("{column} = ?"), vec![Value::Text(pattern.value.into())])
  };
  if pattern.negated {
    (format!("({column} IS NULL OR NOT {sql})"), args)
  } else {
    (sql, args)
  }
}
