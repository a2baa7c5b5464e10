//! SQL schema for the Clausebook SQLite store.
//!
//! Executed at connection startup, followed by [`migrate`]. `PRAGMA
//! user_version` records the schema revision.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- The live row of each clause. title/body mirror the version that
-- version_number points at. last_version_number is the high-water mark used
-- to allocate version numbers, so deleted numbers are never reused.
CREATE TABLE IF NOT EXISTS clauses (
    clause_uuid         TEXT PRIMARY KEY,
    title               TEXT NOT NULL,
    body                TEXT NOT NULL,
    phonetic_full       TEXT NOT NULL DEFAULT '',
    phonetic_initials   TEXT NOT NULL DEFAULT '',
    insurance_type      TEXT NOT NULL DEFAULT '',
    company             TEXT NOT NULL DEFAULT '',
    library_tag         TEXT NOT NULL DEFAULT '',
    version_number      INTEGER NOT NULL,
    last_version_number INTEGER NOT NULL,
    created_at          TEXT NOT NULL,   -- ISO 8601 UTC
    updated_at          TEXT NOT NULL,
    CHECK (version_number BETWEEN 1 AND last_version_number)
);

-- Version rows are immutable: inserted, possibly deleted, never updated.
CREATE TABLE IF NOT EXISTS clause_versions (
    version_id     TEXT PRIMARY KEY,
    clause_uuid    TEXT NOT NULL REFERENCES clauses(clause_uuid),
    version_number INTEGER NOT NULL,
    title          TEXT NOT NULL,
    body           TEXT NOT NULL,
    note           TEXT NOT NULL DEFAULT '',
    created_at     TEXT NOT NULL,
    UNIQUE (clause_uuid, version_number)
);

CREATE TABLE IF NOT EXISTS policies (
    policy_id   TEXT PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    details     TEXT NOT NULL DEFAULT '{}',  -- PolicyDetails as JSON
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- A policy's pinned reference to one exact clause version.
CREATE TABLE IF NOT EXISTS policy_clause_versions (
    policy_id   TEXT NOT NULL REFERENCES policies(policy_id),
    clause_uuid TEXT NOT NULL REFERENCES clauses(clause_uuid),
    version_id  TEXT NOT NULL REFERENCES clause_versions(version_id),
    position    INTEGER NOT NULL,   -- selection order
    pinned      INTEGER NOT NULL DEFAULT 0,
    bound_at    TEXT NOT NULL,
    PRIMARY KEY (policy_id, clause_uuid)
);

CREATE INDEX IF NOT EXISTS versions_clause_idx ON clause_versions(clause_uuid);
CREATE INDEX IF NOT EXISTS bindings_version_idx ON policy_clause_versions(version_id);
";

/// Revision written to `PRAGMA user_version` once [`migrate`] has run.
///
/// 1: initial layout. 2: `policies.details`.
pub const SCHEMA_VERSION: u32 = 2;

/// Columns every accepted revision has, per table. A snapshot is only
/// swapped in if each of these selects cleanly.
pub const REQUIRED_COLUMNS: [(&str, &str); 4] = [
  (
    "clauses",
    "clause_uuid, title, body, phonetic_full, phonetic_initials, insurance_type, \
     company, library_tag, version_number, last_version_number, created_at, updated_at",
  ),
  (
    "clause_versions",
    "version_id, clause_uuid, version_number, title, body, note, created_at",
  ),
  ("policies", "policy_id, name, description, created_at, updated_at"),
  (
    "policy_clause_versions",
    "policy_id, clause_uuid, version_id, position, pinned, bound_at",
  ),
];

/// Bring a database created by an older revision up to [`SCHEMA_VERSION`].
/// Runs after [`SCHEMA`], so every table exists.
pub fn migrate(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
  let version: u32 = conn.pragma_query_value(None, "user_version", |r| r.get(0))?;
  if version >= SCHEMA_VERSION {
    return Ok(());
  }

  if !has_column(conn, "policies", "details")? {
    conn.execute_batch("ALTER TABLE policies ADD COLUMN details TEXT NOT NULL DEFAULT '{}'")?;
  }
  conn.pragma_update(None, "user_version", SCHEMA_VERSION)
}

fn has_column(conn: &rusqlite::Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
  let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
  let names = stmt
    .query_map([], |r| r.get::<_, String>(1))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(names.iter().any(|n| n == column))
}
