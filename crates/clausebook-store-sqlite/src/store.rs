//! [`SqliteStore`], the SQLite implementation of [`ClauseStore`].

use std::{
  collections::{HashMap, HashSet},
  path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use clausebook_core::{
  Error as CoreError,
  clause::{
    Clause, ClauseEdit, ClauseRecord, ClauseVersion, NOTE_EDITED, NOTE_INITIAL_IMPORT,
    NOTE_LIBRARY_IMPORT, UpdateOutcome,
  },
  import::{self, RowChange},
  policy::{BindSummary, ClauseSelection, NewPolicy, Policy, PolicyDetails, SelectedClause},
  store::{ClauseQuery, ClauseStore, ImportSummary},
};

use crate::{
  Result,
  encode::{
    CLAUSE_COLUMNS, POLICY_COLUMNS, RawClause, RawPolicy, RawSelected, RawVersion,
    VERSION_COLUMNS, decode_uuid, encode_details, encode_dt, encode_uuid,
  },
  schema::{self, SCHEMA},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A clause store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All clones
/// share one connection thread, which serialises every operation.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  /// `None` for in-memory stores.
  pub(crate) path: Option<PathBuf>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let conn = tokio_rusqlite::Connection::open(&path).await?;
    let store = Self { conn, path: Some(path) };
    if let Err(e) = store.init_schema().await {
      // Release the file before the caller moves it.
      if let Err(close) = store.conn.close().await {
        tracing::debug!(error = %close, "closing store after failed init");
      }
      return Err(e);
    }
    Ok(store)
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, path: None };
    store.init_schema().await?;
    Ok(store)
  }

  /// The database file, if the store is file-backed.
  pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        schema::migrate(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` inside one transaction on the connection thread.
  ///
  /// The transaction commits only if `f` returns `Ok`; otherwise it is
  /// dropped, which rolls every statement back.
  async fn transact<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T> + Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        match f(&tx) {
          Ok(value) => {
            tx.commit()?;
            Ok(Ok(value))
          }
          Err(e) => Ok(Err(e)),
        }
      })
      .await?
  }

  /// Run a read-only closure on the connection thread.
  async fn read<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }
}

// ─── ClauseStore impl ────────────────────────────────────────────────────────

impl ClauseStore for SqliteStore {
  type Error = crate::Error;

  // ── Clauses ───────────────────────────────────────────────────────────────

  async fn import_clauses(&self, rows: Vec<ClauseRecord>) -> Result<ImportSummary> {
    import::validate_batch(&rows)?;
    let total = rows.len();
    let now = Utc::now();

    let summary = self
      .transact(move |tx| {
        let mut summary = ImportSummary::default();

        for row in &rows {
          let current = load_clause(tx, row.clause_uuid)?;
          let content = current.as_ref().map(|c| (c.title.as_str(), c.body.as_str()));

          match import::classify(content, row) {
            RowChange::Created => {
              insert_clause(tx, row, now)?;
              insert_version(
                tx,
                &new_version(row.clause_uuid, 1, &row.title, &row.body, NOTE_INITIAL_IMPORT, now),
              )?;
              summary.created += 1;
            }
            RowChange::Updated => {
              let next = current.map_or(1, |c| c.last_version_number + 1);
              insert_version(
                tx,
                &new_version(row.clause_uuid, next, &row.title, &row.body, NOTE_LIBRARY_IMPORT, now),
              )?;
              promote_record(tx, row, next, now)?;
              summary.updated += 1;
            }
            RowChange::Unchanged => {
              if current.is_some_and(|c| tags_differ(&c, row)) {
                refresh_tags(tx, row, now)?;
              }
              summary.unchanged += 1;
            }
          }
        }

        Ok(summary)
      })
      .await?;

    tracing::info!(
      rows = total,
      created = summary.created,
      updated = summary.updated,
      unchanged = summary.unchanged,
      "imported clause library"
    );
    Ok(summary)
  }

  async fn update_clause(&self, clause_uuid: Uuid, edit: ClauseEdit) -> Result<UpdateOutcome> {
    if edit.body.trim().is_empty() {
      return Err(CoreError::Validation("clause body must not be empty".into()).into());
    }
    if edit.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
      return Err(CoreError::Validation("clause title must not be empty".into()).into());
    }

    let now = Utc::now();
    let outcome = self
      .transact(move |tx| {
        let current = require_clause(tx, clause_uuid)?;
        let title = edit.title.unwrap_or_else(|| current.title.clone());

        if current.title == title && current.body == edit.body {
          return Ok(UpdateOutcome::Unchanged { clause: current.into_clause()? });
        }

        let note = edit
          .note
          .filter(|n| !n.trim().is_empty())
          .unwrap_or_else(|| NOTE_EDITED.to_owned());
        let next = current.last_version_number + 1;
        let version = new_version(clause_uuid, next, &title, &edit.body, &note, now);

        insert_version(tx, &version)?;
        promote(tx, clause_uuid, &title, &edit.body, next, next, now)?;

        let clause = require_clause(tx, clause_uuid)?.into_clause()?;
        Ok(UpdateOutcome::Versioned { clause, version })
      })
      .await?;

    tracing::debug!(
      %clause_uuid,
      versioned = outcome.is_versioned(),
      version = outcome.clause().version_number,
      "updated clause"
    );
    Ok(outcome)
  }

  async fn get_clause(&self, clause_uuid: Uuid) -> Result<Option<Clause>> {
    let raw = self.read(move |conn| load_clause(conn, clause_uuid)).await?;
    raw.map(RawClause::into_clause).transpose()
  }

  async fn list_clauses(&self, query: ClauseQuery) -> Result<Vec<Clause>> {
    let pattern = query
      .text
      .as_deref()
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .map(like_pattern);
    let limit = query.limit.map(|l| sql_int("limit", l)).transpose()?.unwrap_or(-1);
    let offset = query.offset.map(|o| sql_int("offset", o)).transpose()?.unwrap_or(0);

    let raws: Vec<RawClause> = self
      .read(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CLAUSE_COLUMNS} FROM clauses
           WHERE (?1 IS NULL
                  OR title LIKE ?1 ESCAPE '\\'
                  OR body LIKE ?1 ESCAPE '\\'
                  OR phonetic_full LIKE ?1 ESCAPE '\\'
                  OR phonetic_initials LIKE ?1 ESCAPE '\\')
             AND (?2 IS NULL OR insurance_type = ?2)
             AND (?3 IS NULL OR company = ?3)
             AND (?4 IS NULL OR library_tag = ?4)
           ORDER BY rowid
           LIMIT ?5 OFFSET ?6"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              pattern,
              query.insurance_type,
              query.company,
              query.library_tag,
              limit,
              offset,
            ],
            RawClause::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawClause::into_clause).collect()
  }

  // ── Versions ──────────────────────────────────────────────────────────────

  async fn get_versions(&self, clause_uuid: Uuid) -> Result<Vec<ClauseVersion>> {
    let raws: Vec<RawVersion> = self
      .read(move |conn| {
        require_clause(conn, clause_uuid)?;
        let mut stmt = conn.prepare(&format!(
          "SELECT {VERSION_COLUMNS} FROM clause_versions
           WHERE clause_uuid = ?1
           ORDER BY version_number DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![encode_uuid(clause_uuid)], RawVersion::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVersion::into_version).collect()
  }

  async fn get_version(&self, clause_uuid: Uuid, version: u32) -> Result<Option<ClauseVersion>> {
    let raw = self
      .read(move |conn| load_version(conn, clause_uuid, version))
      .await?;
    raw.map(RawVersion::into_version).transpose()
  }

  async fn activate_version(&self, clause_uuid: Uuid, version: u32) -> Result<Clause> {
    let now = Utc::now();
    let clause = self
      .transact(move |tx| {
        let current = require_clause(tx, clause_uuid)?;
        let target = load_version(tx, clause_uuid, version)?
          .ok_or(CoreError::VersionNotFound { clause_uuid, version })?;

        if current.version_number == version {
          return current.into_clause();
        }

        promote(
          tx,
          clause_uuid,
          &target.title,
          &target.body,
          version,
          current.last_version_number,
          now,
        )?;
        require_clause(tx, clause_uuid)?.into_clause()
      })
      .await?;

    tracing::debug!(%clause_uuid, version, "activated version");
    Ok(clause)
  }

  async fn delete_version(&self, clause_uuid: Uuid, version: u32) -> Result<()> {
    self
      .transact(move |tx| {
        let current = require_clause(tx, clause_uuid)?;
        let target = load_version(tx, clause_uuid, version)?
          .ok_or(CoreError::VersionNotFound { clause_uuid, version })?;

        let count: u32 = tx.query_row(
          "SELECT COUNT(*) FROM clause_versions WHERE clause_uuid = ?1",
          rusqlite::params![encode_uuid(clause_uuid)],
          |r| r.get(0),
        )?;
        if count <= 1 {
          return Err(
            CoreError::InvalidOperation(format!(
              "cannot delete version {version}: it is the only version of clause {clause_uuid}"
            ))
            .into(),
          );
        }
        if current.version_number == version {
          return Err(
            CoreError::InvalidOperation(format!(
              "cannot delete version {version}: it is the current version of clause {clause_uuid}"
            ))
            .into(),
          );
        }

        let bound_by: Option<String> = tx
          .query_row(
            "SELECT p.name
             FROM policy_clause_versions b
             JOIN policies p ON p.policy_id = b.policy_id
             WHERE b.version_id = ?1
             ORDER BY p.name
             LIMIT 1",
            rusqlite::params![target.version_id],
            |r| r.get(0),
          )
          .optional()?;
        if let Some(name) = bound_by {
          return Err(
            CoreError::InvalidOperation(format!(
              "cannot delete version {version} of clause {clause_uuid}: bound by policy '{name}'"
            ))
            .into(),
          );
        }

        tx.execute(
          "DELETE FROM clause_versions WHERE version_id = ?1",
          rusqlite::params![target.version_id],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(%clause_uuid, version, "deleted version");
    Ok(())
  }

  // ── Export ────────────────────────────────────────────────────────────────

  async fn export_all(&self) -> Result<Vec<Clause>> {
    self.list_clauses(ClauseQuery::default()).await
  }

  async fn export_selected(&self, clause_uuids: Vec<Uuid>) -> Result<Vec<Clause>> {
    let raws: Vec<RawClause> = self
      .read(move |conn| {
        clause_uuids
          .into_iter()
          .map(|id| require_clause(conn, id))
          .collect()
      })
      .await?;

    raws.into_iter().map(RawClause::into_clause).collect()
  }

  async fn clear(&self) -> Result<()> {
    self
      .transact(|tx| {
        tx.execute_batch(
          "DELETE FROM policy_clause_versions;
           DELETE FROM policies;
           DELETE FROM clause_versions;
           DELETE FROM clauses;",
        )?;
        Ok(())
      })
      .await?;

    tracing::info!("cleared clause store");
    Ok(())
  }

  // ── Policies ──────────────────────────────────────────────────────────────

  async fn create_policy(&self, input: NewPolicy) -> Result<Policy> {
    let name = input.name.trim().to_owned();
    if name.is_empty() {
      return Err(CoreError::Validation("policy name must not be empty".into()).into());
    }

    let now = Utc::now();
    let policy = Policy {
      policy_id:   Uuid::new_v4(),
      name,
      description: input.description,
      details:     input.details,
      created_at:  now,
      updated_at:  now,
    };

    let row = policy.clone();
    let details = encode_details(&row.details)?;
    self
      .transact(move |tx| {
        let taken: bool = tx
          .query_row(
            "SELECT 1 FROM policies WHERE name = ?1",
            rusqlite::params![row.name],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if taken {
          return Err(
            CoreError::Validation(format!("a policy named '{}' already exists", row.name))
              .into(),
          );
        }

        tx.execute(
          "INSERT INTO policies (policy_id, name, description, details, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            encode_uuid(row.policy_id),
            row.name,
            row.description,
            details,
            encode_dt(row.created_at),
            encode_dt(row.updated_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(policy_id = %policy.policy_id, name = %policy.name, "created policy");
    Ok(policy)
  }

  async fn get_policy(&self, policy_id: Uuid) -> Result<Option<Policy>> {
    let raw = self.read(move |conn| load_policy(conn, policy_id)).await?;
    raw.map(RawPolicy::into_policy).transpose()
  }

  async fn find_policy_by_name(&self, name: String) -> Result<Option<Policy>> {
    let raw: Option<RawPolicy> = self
      .read(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {POLICY_COLUMNS} FROM policies WHERE name = ?1"),
              rusqlite::params![name.trim()],
              RawPolicy::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPolicy::into_policy).transpose()
  }

  async fn update_policy_details(
    &self,
    policy_id: Uuid,
    details: PolicyDetails,
  ) -> Result<Policy> {
    let encoded = encode_details(&details)?;
    let now = Utc::now();

    let raw = self
      .transact(move |tx| {
        require_policy(tx, policy_id)?;
        tx.execute(
          "UPDATE policies SET details = ?2, updated_at = ?3 WHERE policy_id = ?1",
          rusqlite::params![encode_uuid(policy_id), encoded, encode_dt(now)],
        )?;
        require_policy(tx, policy_id)
      })
      .await?;

    tracing::debug!(%policy_id, "updated policy details");
    raw.into_policy()
  }

  async fn list_policies(&self) -> Result<Vec<Policy>> {
    let raws: Vec<RawPolicy> = self
      .read(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {POLICY_COLUMNS} FROM policies ORDER BY updated_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map([], RawPolicy::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPolicy::into_policy).collect()
  }

  async fn delete_policy(&self, policy_id: Uuid) -> Result<()> {
    self
      .transact(move |tx| {
        require_policy(tx, policy_id)?;
        let id = encode_uuid(policy_id);
        tx.execute(
          "DELETE FROM policy_clause_versions WHERE policy_id = ?1",
          rusqlite::params![id],
        )?;
        tx.execute("DELETE FROM policies WHERE policy_id = ?1", rusqlite::params![id])?;
        Ok(())
      })
      .await?;

    tracing::debug!(%policy_id, "deleted policy");
    Ok(())
  }

  // ── Bindings ──────────────────────────────────────────────────────────────

  async fn bind_clauses(
    &self,
    policy_id: Uuid,
    selection: Vec<ClauseSelection>,
  ) -> Result<BindSummary> {
    let mut seen = HashSet::with_capacity(selection.len());
    for entry in &selection {
      if !seen.insert(entry.clause_uuid) {
        return Err(
          CoreError::Validation(format!(
            "clause {} appears more than once in the selection",
            entry.clause_uuid
          ))
          .into(),
        );
      }
    }

    let now = Utc::now();
    let summary = self
      .transact(move |tx| {
        require_policy(tx, policy_id)?;
        let pid = encode_uuid(policy_id);

        // Resolve every entry before touching a binding.
        let mut desired = Vec::with_capacity(selection.len());
        for (position, entry) in selection.iter().enumerate() {
          let clause = require_clause(tx, entry.clause_uuid)?;
          let version = entry.pinned_version.unwrap_or(clause.version_number);
          let target = load_version(tx, entry.clause_uuid, version)?.ok_or(
            CoreError::VersionNotFound { clause_uuid: entry.clause_uuid, version },
          )?;
          desired.push(Binding {
            clause_uuid: clause.clause_uuid,
            version_id:  target.version_id,
            position:    position as i64,
            pinned:      entry.pinned_version.is_some(),
          });
        }

        let mut existing: HashMap<String, Binding> = load_bindings(tx, &pid)?
          .into_iter()
          .map(|b| (b.clause_uuid.clone(), b))
          .collect();

        let mut summary = BindSummary::default();
        for want in desired {
          match existing.remove(&want.clause_uuid) {
            None => {
              tx.execute(
                "INSERT INTO policy_clause_versions
                   (policy_id, clause_uuid, version_id, position, pinned, bound_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                  pid,
                  want.clause_uuid,
                  want.version_id,
                  want.position,
                  want.pinned,
                  encode_dt(now),
                ],
              )?;
              summary.bound += 1;
            }
            Some(have) if have == want => summary.unchanged += 1,
            Some(_) => {
              tx.execute(
                "UPDATE policy_clause_versions
                 SET version_id = ?3, position = ?4, pinned = ?5, bound_at = ?6
                 WHERE policy_id = ?1 AND clause_uuid = ?2",
                rusqlite::params![
                  pid,
                  want.clause_uuid,
                  want.version_id,
                  want.position,
                  want.pinned,
                  encode_dt(now),
                ],
              )?;
              summary.rebound += 1;
            }
          }
        }

        for stale in existing.into_values() {
          tx.execute(
            "DELETE FROM policy_clause_versions WHERE policy_id = ?1 AND clause_uuid = ?2",
            rusqlite::params![pid, stale.clause_uuid],
          )?;
          summary.removed += 1;
        }

        if !summary.is_noop() {
          tx.execute(
            "UPDATE policies SET updated_at = ?2 WHERE policy_id = ?1",
            rusqlite::params![pid, encode_dt(now)],
          )?;
        }

        Ok(summary)
      })
      .await?;

    tracing::debug!(%policy_id, ?summary, "reconciled bindings");
    Ok(summary)
  }

  async fn bound_clause_uuids(&self, policy_id: Uuid) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = self
      .read(move |conn| {
        require_policy(conn, policy_id)?;
        let mut stmt = conn.prepare(
          "SELECT v.clause_uuid
           FROM policy_clause_versions b
           JOIN clause_versions v ON v.version_id = b.version_id
           WHERE b.policy_id = ?1
           ORDER BY b.position",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![encode_uuid(policy_id)], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids.iter().map(|s| decode_uuid(s)).collect()
  }

  async fn bound_version(
    &self,
    policy_id: Uuid,
    clause_uuid: Uuid,
  ) -> Result<Option<ClauseVersion>> {
    let raw: Option<RawVersion> = self
      .read(move |conn| {
        require_policy(conn, policy_id)?;
        Ok(
          conn
            .query_row(
              "SELECT v.version_id, v.clause_uuid, v.version_number, v.title, v.body,
                      v.note, v.created_at
               FROM policy_clause_versions b
               JOIN clause_versions v ON v.version_id = b.version_id
               WHERE b.policy_id = ?1 AND b.clause_uuid = ?2",
              rusqlite::params![encode_uuid(policy_id), encode_uuid(clause_uuid)],
              RawVersion::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVersion::into_version).transpose()
  }

  async fn bound_clauses(&self, policy_id: Uuid) -> Result<Vec<SelectedClause>> {
    let raws: Vec<RawSelected> = self
      .read(move |conn| {
        require_policy(conn, policy_id)?;
        let mut stmt = conn.prepare(
          "SELECT v.clause_uuid, v.version_id, v.version_number, v.title, v.body,
                  c.insurance_type, c.company, c.library_tag, b.pinned
           FROM policy_clause_versions b
           JOIN clause_versions v ON v.version_id = b.version_id
           JOIN clauses c ON c.clause_uuid = v.clause_uuid
           WHERE b.policy_id = ?1
           ORDER BY b.position",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![encode_uuid(policy_id)], RawSelected::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSelected::into_selected).collect()
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────
//
// Synchronous helpers run on the connection thread. They take a plain
// `Connection` so they work both inside and outside a transaction.

/// One row of `policy_clause_versions`, minus the timestamp.
#[derive(PartialEq, Eq)]
struct Binding {
  clause_uuid: String,
  version_id:  String,
  position:    i64,
  pinned:      bool,
}

impl Binding {
  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      clause_uuid: row.get(0)?,
      version_id:  row.get(1)?,
      position:    row.get(2)?,
      pinned:      row.get(3)?,
    })
  }
}

fn load_bindings(conn: &rusqlite::Connection, policy_id: &str) -> Result<Vec<Binding>> {
  let mut stmt = conn.prepare(
    "SELECT clause_uuid, version_id, position, pinned
     FROM policy_clause_versions WHERE policy_id = ?1",
  )?;
  let rows = stmt
    .query_map(rusqlite::params![policy_id], Binding::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn load_clause(conn: &rusqlite::Connection, clause_uuid: Uuid) -> Result<Option<RawClause>> {
  Ok(
    conn
      .query_row(
        &format!("SELECT {CLAUSE_COLUMNS} FROM clauses WHERE clause_uuid = ?1"),
        rusqlite::params![encode_uuid(clause_uuid)],
        RawClause::from_row,
      )
      .optional()?,
  )
}

fn require_clause(conn: &rusqlite::Connection, clause_uuid: Uuid) -> Result<RawClause> {
  load_clause(conn, clause_uuid)?.ok_or_else(|| CoreError::ClauseNotFound(clause_uuid).into())
}

fn load_version(
  conn: &rusqlite::Connection,
  clause_uuid: Uuid,
  version: u32,
) -> Result<Option<RawVersion>> {
  Ok(
    conn
      .query_row(
        &format!(
          "SELECT {VERSION_COLUMNS} FROM clause_versions
           WHERE clause_uuid = ?1 AND version_number = ?2"
        ),
        rusqlite::params![encode_uuid(clause_uuid), version],
        RawVersion::from_row,
      )
      .optional()?,
  )
}

fn load_policy(conn: &rusqlite::Connection, policy_id: Uuid) -> Result<Option<RawPolicy>> {
  Ok(
    conn
      .query_row(
        &format!("SELECT {POLICY_COLUMNS} FROM policies WHERE policy_id = ?1"),
        rusqlite::params![encode_uuid(policy_id)],
        RawPolicy::from_row,
      )
      .optional()?,
  )
}

fn require_policy(conn: &rusqlite::Connection, policy_id: Uuid) -> Result<RawPolicy> {
  load_policy(conn, policy_id)?.ok_or_else(|| CoreError::PolicyNotFound(policy_id).into())
}

fn new_version(
  clause_uuid: Uuid,
  version_number: u32,
  title: &str,
  body: &str,
  note: &str,
  now: DateTime<Utc>,
) -> ClauseVersion {
  ClauseVersion {
    version_id: Uuid::new_v4(),
    clause_uuid,
    version_number,
    title: title.to_owned(),
    body: body.to_owned(),
    note: note.to_owned(),
    created_at: now,
  }
}

fn insert_version(conn: &rusqlite::Connection, version: &ClauseVersion) -> Result<()> {
  conn.execute(
    "INSERT INTO clause_versions
       (version_id, clause_uuid, version_number, title, body, note, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    rusqlite::params![
      encode_uuid(version.version_id),
      encode_uuid(version.clause_uuid),
      version.version_number,
      version.title,
      version.body,
      version.note,
      encode_dt(version.created_at),
    ],
  )?;
  Ok(())
}

fn insert_clause(conn: &rusqlite::Connection, row: &ClauseRecord, now: DateTime<Utc>) -> Result<()> {
  let at = encode_dt(now);
  conn.execute(
    "INSERT INTO clauses (
       clause_uuid, title, body, phonetic_full, phonetic_initials,
       insurance_type, company, library_tag,
       version_number, last_version_number, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, 1, ?9, ?9)",
    rusqlite::params![
      encode_uuid(row.clause_uuid),
      row.title,
      row.body,
      row.phonetic_full,
      row.phonetic_initials,
      row.insurance_type,
      row.company,
      row.library_tag,
      at,
    ],
  )?;
  Ok(())
}

/// Point the clause at `version` and mirror its content.
fn promote(
  conn: &rusqlite::Connection,
  clause_uuid: Uuid,
  title: &str,
  body: &str,
  version: u32,
  last_version: u32,
  now: DateTime<Utc>,
) -> Result<()> {
  conn.execute(
    "UPDATE clauses
     SET title = ?2, body = ?3, version_number = ?4, last_version_number = ?5,
         updated_at = ?6
     WHERE clause_uuid = ?1",
    rusqlite::params![encode_uuid(clause_uuid), title, body, version, last_version, encode_dt(now)],
  )?;
  Ok(())
}

/// [`promote`] plus a tag refresh, for imported rows with new content.
fn promote_record(
  conn: &rusqlite::Connection,
  row: &ClauseRecord,
  version: u32,
  now: DateTime<Utc>,
) -> Result<()> {
  promote(conn, row.clause_uuid, &row.title, &row.body, version, version, now)?;
  refresh_tags(conn, row, now)
}

fn refresh_tags(conn: &rusqlite::Connection, row: &ClauseRecord, now: DateTime<Utc>) -> Result<()> {
  conn.execute(
    "UPDATE clauses
     SET phonetic_full = ?2, phonetic_initials = ?3, insurance_type = ?4,
         company = ?5, library_tag = ?6, updated_at = ?7
     WHERE clause_uuid = ?1",
    rusqlite::params![
      encode_uuid(row.clause_uuid),
      row.phonetic_full,
      row.phonetic_initials,
      row.insurance_type,
      row.company,
      row.library_tag,
      encode_dt(now),
    ],
  )?;
  Ok(())
}

fn tags_differ(current: &RawClause, row: &ClauseRecord) -> bool {
  current.phonetic_full != row.phonetic_full
    || current.phonetic_initials != row.phonetic_initials
    || current.insurance_type != row.insurance_type
    || current.company != row.company
    || current.library_tag != row.library_tag
}

/// A `usize` query bound as an SQLite integer.
fn sql_int(name: &str, value: usize) -> Result<i64> {
  i64::try_from(value)
    .map_err(|_| CoreError::Validation(format!("{name} {value} is out of range")).into())
}

/// `%text%` with LIKE wildcards in `text` escaped by `\`.
fn like_pattern(text: &str) -> String {
  let mut out = String::with_capacity(text.len() + 2);
  out.push('%');
  for ch in text.chars() {
    if matches!(ch, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(ch);
  }
  out.push('%');
  out
}
