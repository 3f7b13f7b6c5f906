//! Error type for `zeit-store-sqlite`.

use thiserror::Error;
use zeit_core::{
  EventId,
  error::{Classify, ErrorKind},
};

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] zeit_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  /// A `pre_insert` extension dropped the event.
  #[error("event {0} was vetoed by an extension")]
  VetoedByExtension(EventId),

  /// A stored row references a symbol id its table does not contain.
  #[error("unknown {table} id {id}")]
  UnknownSymbol { table: &'static str, id: i64 },

  #[error("the event log is closed")]
  StoreClosed,

  /// The repair journal named something the engine cannot reconcile.
  #[error("symbol cache out of sync: {0}")]
  CacheOutOfSync(String),

  #[error("engine state lock poisoned")]
  Poisoned,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Core(e) => e.kind(),
      Self::StoreClosed => ErrorKind::Closed,
      Self::VetoedByExtension(_) => ErrorKind::InvalidInput,
      _ => ErrorKind::Internal,
    }
  }
}
