//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use clausebook_core::{
  clause::{Clause, ClauseVersion},
  policy::{Policy, PolicyDetails, SelectedClause},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── PolicyDetails ────────────────────────────────────────────────────────────

pub fn encode_details(details: &PolicyDetails) -> Result<String> {
  Ok(serde_json::to_string(details)?)
}

pub fn decode_details(s: &str) -> Result<PolicyDetails> { Ok(serde_json::from_str(s)?) }

// ─── Clause rows ─────────────────────────────────────────────────────────────

/// Column list matching [`RawClause::from_row`].
pub const CLAUSE_COLUMNS: &str = "clause_uuid, title, body, phonetic_full, \
  phonetic_initials, insurance_type, company, library_tag, version_number, \
  last_version_number, created_at, updated_at";

/// Raw values read directly from a `clauses` row.
pub struct RawClause {
  pub clause_uuid:         String,
  pub title:               String,
  pub body:                String,
  pub phonetic_full:       String,
  pub phonetic_initials:   String,
  pub insurance_type:      String,
  pub company:             String,
  pub library_tag:         String,
  pub version_number:      u32,
  pub last_version_number: u32,
  pub created_at:          String,
  pub updated_at:          String,
}

impl RawClause {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      clause_uuid:         row.get(0)?,
      title:               row.get(1)?,
      body:                row.get(2)?,
      phonetic_full:       row.get(3)?,
      phonetic_initials:   row.get(4)?,
      insurance_type:      row.get(5)?,
      company:             row.get(6)?,
      library_tag:         row.get(7)?,
      version_number:      row.get(8)?,
      last_version_number: row.get(9)?,
      created_at:          row.get(10)?,
      updated_at:          row.get(11)?,
    })
  }

  pub fn into_clause(self) -> Result<Clause> {
    Ok(Clause {
      clause_uuid:       decode_uuid(&self.clause_uuid)?,
      title:             self.title,
      body:              self.body,
      phonetic_full:     self.phonetic_full,
      phonetic_initials: self.phonetic_initials,
      insurance_type:    self.insurance_type,
      company:           self.company,
      library_tag:       self.library_tag,
      version_number:    self.version_number,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Version rows ────────────────────────────────────────────────────────────

/// Column list matching [`RawVersion::from_row`].
pub const VERSION_COLUMNS: &str =
  "version_id, clause_uuid, version_number, title, body, note, created_at";

pub struct RawVersion {
  pub version_id:     String,
  pub clause_uuid:    String,
  pub version_number: u32,
  pub title:          String,
  pub body:           String,
  pub note:           String,
  pub created_at:     String,
}

impl RawVersion {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      version_id:     row.get(0)?,
      clause_uuid:    row.get(1)?,
      version_number: row.get(2)?,
      title:          row.get(3)?,
      body:           row.get(4)?,
      note:           row.get(5)?,
      created_at:     row.get(6)?,
    })
  }

  pub fn into_version(self) -> Result<ClauseVersion> {
    Ok(ClauseVersion {
      version_id:     decode_uuid(&self.version_id)?,
      clause_uuid:    decode_uuid(&self.clause_uuid)?,
      version_number: self.version_number,
      title:          self.title,
      body:           self.body,
      note:           self.note,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

// ─── Policy rows ─────────────────────────────────────────────────────────────

pub const POLICY_COLUMNS: &str =
  "policy_id, name, description, details, created_at, updated_at";

pub struct RawPolicy {
  pub policy_id:   String,
  pub name:        String,
  pub description: String,
  pub details:     String,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawPolicy {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      policy_id:   row.get(0)?,
      name:        row.get(1)?,
      description: row.get(2)?,
      details:     row.get(3)?,
      created_at:  row.get(4)?,
      updated_at:  row.get(5)?,
    })
  }

  pub fn into_policy(self) -> Result<Policy> {
    Ok(Policy {
      policy_id:   decode_uuid(&self.policy_id)?,
      name:        self.name,
      description: self.description,
      details:     decode_details(&self.details)?,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Binding snapshot rows ───────────────────────────────────────────────────

/// Raw values from a binding joined with its version and clause.
pub struct RawSelected {
  pub clause_uuid:    String,
  pub version_id:     String,
  pub version_number: u32,
  pub title:          String,
  pub body:           String,
  pub insurance_type: String,
  pub company:        String,
  pub library_tag:    String,
  pub pinned:         bool,
}

impl RawSelected {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      clause_uuid:    row.get(0)?,
      version_id:     row.get(1)?,
      version_number: row.get(2)?,
      title:          row.get(3)?,
      body:           row.get(4)?,
      insurance_type: row.get(5)?,
      company:        row.get(6)?,
      library_tag:    row.get(7)?,
      pinned:         row.get(8)?,
    })
  }

  pub fn into_selected(self) -> Result<SelectedClause> {
    Ok(SelectedClause {
      clause_uuid:    decode_uuid(&self.clause_uuid)?,
      version_id:     decode_uuid(&self.version_id)?,
      version_number: self.version_number,
      title:          self.title,
      body:           self.body,
      insurance_type: self.insurance_type,
      company:        self.company,
      library_tag:    self.library_tag,
      pinned:         self.pinned,
    })
  }
}
