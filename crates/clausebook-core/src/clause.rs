//! Clause types: the reusable units of legal text and their history.
//!
//! A clause row is a mutable pointer into an immutable version history. The
//! title and body on the clause always mirror the version it points at; the
//! tags (`insurance_type`, `company`, `library_tag`) and phonetic search keys
//! are not versioned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Notes ───────────────────────────────────────────────────────────────────

/// Note attached to the version created by the first import of a clause.
pub const NOTE_INITIAL_IMPORT: &str = "initial import";
/// Note attached to versions created when a library import changes content.
pub const NOTE_LIBRARY_IMPORT: &str = "library import";
/// Note used for editor saves that don't supply one.
pub const NOTE_EDITED: &str = "edited";

// ─── Record ──────────────────────────────────────────────────────────────────

/// One row of a clause library, as imported or exported in tabular form.
///
/// Every field is always present; a blank cell is an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseRecord {
  pub clause_uuid:       Uuid,
  pub title:             String,
  pub body:              String,
  /// Full phonetic spelling of the title, used for search.
  pub phonetic_full:     String,
  /// Initial letters of the phonetic spelling, used for search.
  pub phonetic_initials: String,
  pub insurance_type:    String,
  pub company:           String,
  /// Library / year edition the clause was published in.
  pub library_tag:       String,
}

impl ClauseRecord {
  /// True when `title` and `body` match byte for byte.
  pub fn same_content(&self, title: &str, body: &str) -> bool {
    self.title == title && self.body == body
  }
}

// ─── Clause ──────────────────────────────────────────────────────────────────

/// The live row of a clause. `title` and `body` mirror the content of the
/// version `version_number` points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
  pub clause_uuid:       Uuid,
  pub title:             String,
  pub body:              String,
  pub phonetic_full:     String,
  pub phonetic_initials: String,
  pub insurance_type:    String,
  pub company:           String,
  pub library_tag:       String,
  /// The current ("active") version.
  pub version_number:    u32,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

impl Clause {
  /// Project the clause back into its tabular record form.
  pub fn to_record(&self) -> ClauseRecord {
    ClauseRecord {
      clause_uuid:       self.clause_uuid,
      title:             self.title.clone(),
      body:              self.body.clone(),
      phonetic_full:     self.phonetic_full.clone(),
      phonetic_initials: self.phonetic_initials.clone(),
      insurance_type:    self.insurance_type.clone(),
      company:           self.company.clone(),
      library_tag:       self.library_tag.clone(),
    }
  }
}

// ─── Version ─────────────────────────────────────────────────────────────────

/// An immutable snapshot of a clause's title and body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseVersion {
  /// Identity referenced by policy bindings.
  pub version_id:     Uuid,
  pub clause_uuid:    Uuid,
  /// Strictly increasing per clause, starting at 1; never reused.
  pub version_number: u32,
  pub title:          String,
  pub body:           String,
  pub note:           String,
  pub created_at:     DateTime<Utc>,
}

// ─── Edits ───────────────────────────────────────────────────────────────────

/// Input to [`crate::store::ClauseStore::update_clause`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClauseEdit {
  /// New title; `None` keeps the current one.
  pub title: Option<String>,
  pub body:  String,
  /// Free-text note stored on the new version.
  pub note:  Option<String>,
}

impl ClauseEdit {
  pub fn body(body: impl Into<String>) -> Self {
    Self { title: None, body: body.into(), note: None }
  }
}

/// What an edit did to the clause.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
  /// Submitted content was identical to the current version.
  Unchanged { clause: Clause },
  /// A new version was created and is now current.
  Versioned { clause: Clause, version: ClauseVersion },
}

impl UpdateOutcome {
  pub fn clause(&self) -> &Clause {
    match self {
      Self::Unchanged { clause } | Self::Versioned { clause, .. } => clause,
    }
  }

  pub fn is_versioned(&self) -> bool { matches!(self, Self::Versioned { .. }) }
}
