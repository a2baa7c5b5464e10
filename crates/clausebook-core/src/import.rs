//! Bulk import pipeline: incoming library rows → per-row store decisions.
//!
//! Rows are classified by comparing their content against the clause's
//! current content, never by a dirty flag, so importing the same unchanged
//! file twice is free of side effects.

use std::collections::HashMap;

use uuid::Uuid;

use crate::{Error, Result, clause::ClauseRecord};

/// What importing one row does to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
  /// Unknown UUID: create the clause and its first version.
  Created,
  /// Known UUID with a different title or body: append a version and make
  /// it current.
  Updated,
  /// Known UUID with identical content: refresh tags only.
  Unchanged,
}

/// Check the batch-wide constraints. Runs before any write; the first
/// violation rejects the whole batch.
pub fn validate_batch(rows: &[ClauseRecord]) -> Result<()> {
  let mut seen: HashMap<Uuid, usize> = HashMap::with_capacity(rows.len());

  for (idx, row) in rows.iter().enumerate() {
    let line = idx + 1;
    if row.clause_uuid.is_nil() {
      return Err(Error::Validation(format!("row {line}: uuid is empty")));
    }
    if let Some(first) = seen.insert(row.clause_uuid, line) {
      return Err(Error::Validation(format!(
        "row {line}: duplicate uuid {} (first seen on row {first})",
        row.clause_uuid
      )));
    }
    if row.title.trim().is_empty() {
      return Err(Error::Validation(format!(
        "row {line}: clause {} has an empty title",
        row.clause_uuid
      )));
    }
    if row.body.trim().is_empty() {
      return Err(Error::Validation(format!(
        "row {line}: clause {} has an empty body",
        row.clause_uuid
      )));
    }
  }

  Ok(())
}

/// Decide what importing `incoming` does, given the `(title, body)` of the
/// clause's current version, or `None` if the clause doesn't exist yet.
pub fn classify(current: Option<(&str, &str)>, incoming: &ClauseRecord) -> RowChange {
  match current {
    None => RowChange::Created,
    Some((title, body)) if incoming.same_content(title, body) => RowChange::Unchanged,
    Some(_) => RowChange::Updated,
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
