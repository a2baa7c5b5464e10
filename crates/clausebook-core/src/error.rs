//! Error types for `clausebook-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// A malformed or incomplete request, rejected before any write.
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("clause not found: {0}")]
  ClauseNotFound(Uuid),

  #[error("version {version} of clause {clause_uuid} not found")]
  VersionNotFound { clause_uuid: Uuid, version: u32 },

  #[error("policy not found: {0}")]
  PolicyNotFound(Uuid),

  /// A structurally disallowed mutation; the store is left unchanged.
  #[error("invalid operation: {0}")]
  InvalidOperation(String),

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("xlsx error: {0}")]
  Xlsx(#[from] calamine::XlsxError),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification of a failure, used by callers to decide how to
/// surface it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Validation,
  NotFound,
  InvalidOperation,
  Storage,
}

/// Implemented by every error type a [`ClauseStore`](crate::store::ClauseStore)
/// backend returns.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation(_) | Self::Csv(_) | Self::Xlsx(_) => ErrorKind::Validation,
      Self::ClauseNotFound(_)
      | Self::VersionNotFound { .. }
      | Self::PolicyNotFound(_) => ErrorKind::NotFound,
      Self::InvalidOperation(_) => ErrorKind::InvalidOperation,
      Self::Serialization(_) => ErrorKind::Storage,
    }
  }
}
