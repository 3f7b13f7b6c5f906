//! SQL for the result orderings of `find_event_ids`.
//!
//! Every grouped ordering is one template: join `event_view` against a
//! subquery holding the aggregate timestamp (and optionally the size) of
//! each group, keep one row per group and sort.

use rusqlite::types::Value;
use zeit_core::query::{Aggregate, GroupField, ResultType};

use crate::where_clause::WhereClause;

fn group_column(field: GroupField) -> &'static str {
  match field {
    GroupField::EventOrigin => "origin",
    GroupField::Subject => "subj_id",
    GroupField::CurrentUri => "subj_id_current",
    GroupField::Actor => "actor",
    GroupField::SubjectOrigin => "subj_origin",
    GroupField::SubjectInterpretation => "subj_interpretation",
    GroupField::MimeType => "subj_mimetype",
  }
}

fn direction(ascending: bool) -> &'static str { if ascending { "ASC" } else { "DESC" } }

/// The id query for `filter` under `order`. `filter` must be able to match.
pub(crate) fn find_ids_sql(
  filter: &WhereClause,
  order: ResultType,
  max_events: u32,
) -> (String, Vec<Value>) {
  let (where_sql, where_args) = match filter.render() {
    Some((sql, args)) => (format!(" WHERE {sql}"), args),
    None => (String::new(), Vec::new()),
  };

  let (mut sql, mut args) = match order.grouping() {
    None => {
      let dir = direction(order.time_ascending());
      (
        format!("SELECT DISTINCT id FROM event_view{where_sql} ORDER BY timestamp {dir}, id {dir}"),
        where_args,
      )
    }
    Some(grouping) => {
      let field = group_column(grouping.field);
      let aggregate = match grouping.aggregate {
        Aggregate::Max => "MAX",
        Aggregate::Min => "MIN",
      };
      let (count_sql, count_order) = match grouping.count_ascending {
        Some(ascending) => (
          format!(", COUNT({field}) AS num_events"),
          format!("num_events {}, ", direction(ascending)),
        ),
        None => (String::new(), String::new()),
      };
      let dir = direction(grouping.time_ascending);
      let sql = format!(
        "SELECT DISTINCT id FROM event_view \
         NATURAL JOIN (\
           SELECT {field}, {aggregate}(timestamp) AS timestamp{count_sql} \
           FROM event_view{where_sql} GROUP BY {field}\
         ){where_sql} \
         GROUP BY {field} \
         ORDER BY {count_order}timestamp {dir}, id {dir}"
      );
      // The filter applies inside the subquery and to the joined rows.
      let mut args = where_args.clone();
      args.extend(where_args);
      (sql, args)
    }
  };

  if max_events > 0 {
    sql.push_str(" LIMIT ?");
    args.push(Value::Integer(max_events.into()));
  }
  (sql, args)
}
