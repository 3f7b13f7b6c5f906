//! Error types for `zeit-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The event breaks one of the insert invariants (no subjects, a
  /// predefined id, `uri != current_uri` outside a move).
  #[error("invalid event: {0}")]
  InvalidEvent(String),

  /// A move event whose subjects do not actually move anything.
  #[error("redundant move: subject uri and current_uri must differ and be non-empty")]
  RedundantMove,

  #[error("unsupported result type: {0}")]
  UnsupportedOrder(u32),

  #[error("unsupported related result type: {0}")]
  UnsupportedRelatedType(u32),

  #[error("unknown storage state: {0}")]
  UnknownStorageState(u32),

  #[error("the {field} field does not support {operator}")]
  NotSupported {
    field:    &'static str,
    operator: &'static str,
  },

  #[error("no blacklist template named {0:?}")]
  UnknownBlacklist(String),

  #[error("no monitor with id {0}")]
  UnknownMonitor(u64),

  #[error("no data source registered as {0:?}")]
  UnknownDataSource(String),

  #[error("malformed wire value: {0}")]
  Wire(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse category of a failure, for transports that map errors onto
/// status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// The request itself was malformed or unsupported.
  InvalidInput,
  NotFound,
  /// The log has been closed.
  Closed,
  Internal,
}

/// Errors that know their [`ErrorKind`].
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::InvalidEvent(_)
      | Self::RedundantMove
      | Self::UnsupportedOrder(_)
      | Self::UnsupportedRelatedType(_)
      | Self::UnknownStorageState(_)
      | Self::NotSupported { .. }
      | Self::Wire(_) => ErrorKind::InvalidInput,
      Self::UnknownBlacklist(_) | Self::UnknownMonitor(_) | Self::UnknownDataSource(_) => {
        ErrorKind::NotFound
      }
      Self::Serialization(_) | Self::Io(_) => ErrorKind::Internal,
    }
  }
}
