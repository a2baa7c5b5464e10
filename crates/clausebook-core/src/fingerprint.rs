//! Content fingerprints for clauses, used as HTTP ETags.
//!
//! A fingerprint is a SHA-256 over the clause uuid, the current version
//! number, and the title and body. Tags are not included; changing them
//! doesn't invalidate an editor's view of the text.

use sha2::{Digest, Sha256};

use crate::clause::Clause;

/// Compute the quoted ETag for the clause's current content.
pub fn clause_etag(clause: &Clause) -> String {
  let mut hasher = Sha256::new();
  hasher.update(clause.clause_uuid.as_bytes());
  hasher.update(clause.version_number.to_le_bytes());
  // Length prefixes keep ("ab", "c") and ("a", "bc") apart.
  for part in [&clause.title, &clause.body] {
    hasher.update((part.len() as u64).to_le_bytes());
    hasher.update(part.as_bytes());
  }
  format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// Compare an `If-Match` header value against an ETag, accepting both
/// quoted and bare forms.
pub fn etag_matches(etag: &str, header: &str) -> bool {
  header
    .split(',')
    .map(str::trim)
    .any(|candidate| candidate == "*" || strip_quotes(candidate) == strip_quotes(etag))
}

fn strip_quotes(s: &str) -> &str {
  s.trim_start_matches("W/").trim_matches('"')
}
