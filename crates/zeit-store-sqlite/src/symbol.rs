//! Write-through interners for the enumerated string columns.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension as _};

use crate::{Error, Result};

/// Maps the values of one `(id, value)` table to their ids.
///
/// The cache is a subset of the table. Misses fall through to the
/// database, so an evicted id is simply reloaded on next use.
#[derive(Debug)]
pub(crate) struct SymbolTable {
  table:    &'static str,
  by_value: HashMap<String, i64>,
  by_id:    HashMap<i64, String>,
  /// Ids inserted since the last commit, oldest first.
  fresh:    Vec<i64>,
}

impl SymbolTable {
  pub fn load(conn: &Connection, table: &'static str) -> Result<Self> {
    let mut symbols = Self {
      table,
      by_value: HashMap::new(),
      by_id: HashMap::new(),
      fresh: Vec::new(),
    };
    let mut stmt = conn.prepare(&format!("SELECT id, value FROM {table}"))?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))?;
    for row in rows {
      let (id, value) = row?;
      symbols.remember(id, value);
    }
    Ok(symbols)
  }

  pub fn table(&self) -> &'static str { self.table }

  fn remember(&mut self, id: i64, value: String) {
    self.by_value.insert(value.clone(), id);
    self.by_id.insert(id, value);
  }

  /// The id of `value`, inserting it when absent.
  pub fn id_for(&mut self, conn: &Connection, value: &str) -> Result<i64> {
    if let Some(id) = self.lookup(conn, value)? {
      return Ok(id);
    }
    conn.execute(&format!("INSERT INTO {} (value) VALUES (?1)", self.table), [value])?;
    let id = conn.last_insert_rowid();
    self.remember(id, value.to_string());
    self.fresh.push(id);
    Ok(id)
  }

  /// The id of `value` if it is interned. Never inserts.
  pub fn lookup(&mut self, conn: &Connection, value: &str) -> Result<Option<i64>> {
    if let Some(id) = self.by_value.get(value) {
      return Ok(Some(*id));
    }
    let id: Option<i64> = conn
      .query_row(
        &format!("SELECT id FROM {} WHERE value = ?1", self.table),
        [value],
        |r| r.get(0),
      )
      .optional()?;
    if let Some(id) = id {
      self.remember(id, value.to_string());
    }
    Ok(id)
  }

  pub fn symbol_for(&mut self, conn: &Connection, id: i64) -> Result<String> {
    if let Some(value) = self.by_id.get(&id) {
      return Ok(value.clone());
    }
    let value: Option<String> = conn
      .query_row(
        &format!("SELECT value FROM {} WHERE id = ?1", self.table),
        [id],
        |r| r.get(0),
      )
      .optional()?;
    match value {
      Some(value) => {
        self.remember(id, value.clone());
        Ok(value)
      }
      None => Err(Error::UnknownSymbol { table: self.table, id }),
    }
  }

  /// Drop `id` from the cache only.
  pub fn forget(&mut self, id: i64) {
    if let Some(value) = self.by_id.remove(&id) {
      self.by_value.remove(&value);
    }
  }

  #[cfg(test)]
  pub fn is_cached(&self, id: i64) -> bool { self.by_id.contains_key(&id) }

  /// Position to roll back to with [`SymbolTable::rollback_to`].
  pub fn mark(&self) -> usize { self.fresh.len() }

  /// Forget ids inserted after `mark`; their rows were rolled back.
  pub fn rollback_to(&mut self, mark: usize) {
    for id in self.fresh.split_off(mark.min(self.fresh.len())) {
      self.forget(id);
    }
  }

  /// The current transaction committed; fresh ids are now durable.
  pub fn commit(&mut self) { self.fresh.clear(); }
}

/// The four interned symbol columns.
#[derive(Debug)]
pub(crate) struct Symbols {
  pub interpretation: SymbolTable,
  pub manifestation:  SymbolTable,
  pub mimetype:       SymbolTable,
  pub actor:          SymbolTable,
}

/// Rollback positions for every table of [`Symbols`].
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SymbolMark([usize; 4]);

impl Symbols {
  pub fn load(conn: &Connection) -> Result<Self> {
    Ok(Self {
      interpretation: SymbolTable::load(conn, "interpretation")?,
      manifestation:  SymbolTable::load(conn, "manifestation")?,
      mimetype:       SymbolTable::load(conn, "mimetype")?,
      actor:          SymbolTable::load(conn, "actor")?,
    })
  }

  fn tables_mut(&mut self) -> [&mut SymbolTable; 4] {
    [
      &mut self.interpretation,
      &mut self.manifestation,
      &mut self.mimetype,
      &mut self.actor,
    ]
  }

  pub fn by_name(&mut self, table: &str) -> Option<&mut SymbolTable> {
    self.tables_mut().into_iter().find(|t| t.table() == table)
  }

  pub fn mark(&self) -> SymbolMark {
    SymbolMark([
      self.interpretation.mark(),
      self.manifestation.mark(),
      self.mimetype.mark(),
      self.actor.mark(),
    ])
  }

  pub fn rollback_to(&mut self, mark: SymbolMark) {
    for (table, mark) in self.tables_mut().into_iter().zip(mark.0) {
      table.rollback_to(mark);
    }
  }

  pub fn commit(&mut self) {
    for table in self.tables_mut() {
      table.commit();
    }
  }
}
