//! The `ClauseStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `clausebook-store-sqlite`). The session layer, the REST API and the CLI
//! depend on this abstraction, not on a concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  clause::{Clause, ClauseEdit, ClauseRecord, ClauseVersion, UpdateOutcome},
  error::Classify,
  policy::{BindSummary, ClauseSelection, NewPolicy, Policy, PolicyDetails, SelectedClause},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`ClauseStore::list_clauses`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClauseQuery {
  /// Substring matched against title, body and both phonetic fields.
  pub text:           Option<String>,
  pub insurance_type: Option<String>,
  pub company:        Option<String>,
  pub library_tag:    Option<String>,
  pub limit:          Option<usize>,
  pub offset:         Option<usize>,
}

// ─── Import summary ──────────────────────────────────────────────────────────

/// Per-batch counts returned by [`ClauseStore::import_clauses`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
  pub created:   usize,
  pub updated:   usize,
  pub unchanged: usize,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a clause store backend.
///
/// Version rows are immutable once written. Every operation that touches
/// more than one row is atomic: it either commits entirely or leaves the
/// store as it was.
pub trait ClauseStore: Send + Sync {
  type Error: std::error::Error
    + Classify
    + From<crate::Error>
    + Send
    + Sync
    + 'static;

  // ── Clauses ───────────────────────────────────────────────────────────

  /// Bulk upsert a clause library.
  ///
  /// The whole batch is validated before anything is written. Rows whose
  /// title and body match the clause's current content only refresh the
  /// tags; rows with new content append a version and make it current.
  fn import_clauses(
    &self,
    rows: Vec<ClauseRecord>,
  ) -> impl Future<Output = Result<ImportSummary, Self::Error>> + Send + '_;

  /// Commit an edit as a new current version, or do nothing if the content
  /// is identical to the current version.
  fn update_clause(
    &self,
    clause_uuid: Uuid,
    edit: ClauseEdit,
  ) -> impl Future<Output = Result<UpdateOutcome, Self::Error>> + Send + '_;

  /// Retrieve a clause by UUID. Returns `None` if not found.
  fn get_clause(
    &self,
    clause_uuid: Uuid,
  ) -> impl Future<Output = Result<Option<Clause>, Self::Error>> + Send + '_;

  /// List clauses in library (import) order.
  fn list_clauses(
    &self,
    query: ClauseQuery,
  ) -> impl Future<Output = Result<Vec<Clause>, Self::Error>> + Send + '_;

  // ── Versions ──────────────────────────────────────────────────────────

  /// Full history of a clause, newest first. Never empty for an existing
  /// clause.
  fn get_versions(
    &self,
    clause_uuid: Uuid,
  ) -> impl Future<Output = Result<Vec<ClauseVersion>, Self::Error>> + Send + '_;

  fn get_version(
    &self,
    clause_uuid: Uuid,
    version: u32,
  ) -> impl Future<Output = Result<Option<ClauseVersion>, Self::Error>> + Send + '_;

  /// Point the clause at an existing version and copy its content onto the
  /// clause row. Creates no version.
  fn activate_version(
    &self,
    clause_uuid: Uuid,
    version: u32,
  ) -> impl Future<Output = Result<Clause, Self::Error>> + Send + '_;

  /// Remove a version from history.
  ///
  /// Fails if it is the clause's only version, its current version, or is
  /// referenced by a policy binding.
  fn delete_version(
    &self,
    clause_uuid: Uuid,
    version: u32,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Export ────────────────────────────────────────────────────────────

  /// Every clause in library order.
  fn export_all(
    &self,
  ) -> impl Future<Output = Result<Vec<Clause>, Self::Error>> + Send + '_;

  /// The given clauses, in the given order.
  fn export_selected(
    &self,
    clause_uuids: Vec<Uuid>,
  ) -> impl Future<Output = Result<Vec<Clause>, Self::Error>> + Send + '_;

  /// Wipe clauses, versions, policies and bindings.
  fn clear(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Policies ──────────────────────────────────────────────────────────

  fn create_policy(
    &self,
    input: NewPolicy,
  ) -> impl Future<Output = Result<Policy, Self::Error>> + Send + '_;

  fn get_policy(
    &self,
    policy_id: Uuid,
  ) -> impl Future<Output = Result<Option<Policy>, Self::Error>> + Send + '_;

  fn find_policy_by_name(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Option<Policy>, Self::Error>> + Send + '_;

  /// Replace the policy's insurance details and return the updated policy.
  fn update_policy_details(
    &self,
    policy_id: Uuid,
    details: PolicyDetails,
  ) -> impl Future<Output = Result<Policy, Self::Error>> + Send + '_;

  /// All policies, most recently updated first.
  fn list_policies(
    &self,
  ) -> impl Future<Output = Result<Vec<Policy>, Self::Error>> + Send + '_;

  /// Delete a policy together with its bindings.
  fn delete_policy(
    &self,
    policy_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Bindings ──────────────────────────────────────────────────────────

  /// Reconcile the policy's bindings to exactly `selection`, in order.
  ///
  /// Each entry binds its pinned version if given, else the clause's current
  /// version. Bindings are only rewritten where they differ; clauses absent
  /// from `selection` are unbound.
  fn bind_clauses(
    &self,
    policy_id: Uuid,
    selection: Vec<ClauseSelection>,
  ) -> impl Future<Output = Result<BindSummary, Self::Error>> + Send + '_;

  /// The policy's bound clause UUIDs in selection order.
  fn bound_clause_uuids(
    &self,
    policy_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// The exact version bound for `clause_uuid`, if any.
  fn bound_version(
    &self,
    policy_id: Uuid,
    clause_uuid: Uuid,
  ) -> impl Future<Output = Result<Option<ClauseVersion>, Self::Error>> + Send + '_;

  /// Denormalised snapshot of every bound clause in selection order.
  fn bound_clauses(
    &self,
    policy_id: Uuid,
  ) -> impl Future<Output = Result<Vec<SelectedClause>, Self::Error>> + Send + '_;
}
