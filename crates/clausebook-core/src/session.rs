//! The selection layer: an explicit per-session working set for one policy.
//!
//! A [`Session`] caches the policy's bound clauses as denormalised
//! [`SelectedClause`] snapshots. The store stays the source of truth: every
//! mutation made through the session re-runs the binding reconciliation and
//! reloads the cache before returning, so a read never sees stale text.
//! Pins are persisted on the bindings themselves, so [`Session::open`] can
//! rebuild the whole session from the store, catching up any unpinned
//! binding whose clause has moved on since.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::{
  Error,
  clause::{ClauseEdit, ClauseRecord, UpdateOutcome},
  policy::{BindSummary, ClauseSelection, Policy, SelectedClause},
  render,
  store::{ClauseStore, ImportSummary},
};

#[derive(Debug, Clone)]
pub struct Session {
  policy_id: Uuid,
  /// Clause uuid → version the selection is held at, regardless of the
  /// clause's current pointer.
  pins:      BTreeMap<Uuid, u32>,
  selection: Vec<SelectedClause>,
}

impl Session {
  /// Load the session for `policy_id` from its bindings.
  ///
  /// Unpinned clauses are re-bound to their current version first, so edits,
  /// activations and imports made without a session are picked up here.
  pub async fn open<S: ClauseStore>(store: &S, policy_id: Uuid) -> Result<Self, S::Error> {
    if store.get_policy(policy_id).await?.is_none() {
      return Err(Error::PolicyNotFound(policy_id).into());
    }

    let selection = store.bound_clauses(policy_id).await?;
    let pins = selection
      .iter()
      .filter(|c| c.pinned)
      .map(|c| (c.clause_uuid, c.version_number))
      .collect();
    let mut session = Self { policy_id, pins, selection };

    if session.selection.iter().any(|c| !c.pinned) {
      session.reconcile(store).await?;
    }

    tracing::debug!(%policy_id, selected = session.selection.len(), "opened session");
    Ok(session)
  }

  pub fn policy_id(&self) -> Uuid { self.policy_id }

  /// The selection snapshot in display order.
  pub fn selection(&self) -> &[SelectedClause] { &self.selection }

  pub fn pins(&self) -> &BTreeMap<Uuid, u32> { &self.pins }

  pub fn selected_uuids(&self) -> Vec<Uuid> {
    self.selection.iter().map(|c| c.clause_uuid).collect()
  }

  pub fn is_selected(&self, clause_uuid: Uuid) -> bool {
    self.selection.iter().any(|c| c.clause_uuid == clause_uuid)
  }

  /// Render the policy document from the current selection.
  pub fn document(&self, policy: &Policy) -> String {
    render::policy_markdown(policy, &self.selection)
  }

  // ── Selection changes ─────────────────────────────────────────────────

  /// Replace the selection with `clause_uuids`, in that order. Pins of
  /// clauses that leave the selection are dropped.
  pub async fn select<S: ClauseStore>(
    &mut self,
    store: &S,
    clause_uuids: Vec<Uuid>,
  ) -> Result<BindSummary, S::Error> {
    let mut pins = self.pins.clone();
    pins.retain(|uuid, _| clause_uuids.contains(uuid));
    self.apply(store, clause_uuids, pins).await
  }

  /// Append a clause to the end of the selection if it isn't already there.
  pub async fn add<S: ClauseStore>(
    &mut self,
    store: &S,
    clause_uuid: Uuid,
  ) -> Result<BindSummary, S::Error> {
    let mut order = self.selected_uuids();
    if !order.contains(&clause_uuid) {
      order.push(clause_uuid);
    }
    self.select(store, order).await
  }

  pub async fn remove<S: ClauseStore>(
    &mut self,
    store: &S,
    clause_uuid: Uuid,
  ) -> Result<BindSummary, S::Error> {
    let order = self
      .selected_uuids()
      .into_iter()
      .filter(|uuid| *uuid != clause_uuid)
      .collect();
    self.select(store, order).await
  }

  /// Hold a selected clause at `version` independent of its current pointer.
  pub async fn pin<S: ClauseStore>(
    &mut self,
    store: &S,
    clause_uuid: Uuid,
    version: u32,
  ) -> Result<BindSummary, S::Error> {
    if !self.is_selected(clause_uuid) {
      return Err(
        Error::Validation(format!("clause {clause_uuid} is not selected")).into(),
      );
    }
    let mut pins = self.pins.clone();
    pins.insert(clause_uuid, version);
    self.apply(store, self.selected_uuids(), pins).await
  }

  /// Let a selected clause follow its current version again.
  pub async fn unpin<S: ClauseStore>(
    &mut self,
    store: &S,
    clause_uuid: Uuid,
  ) -> Result<BindSummary, S::Error> {
    let mut pins = self.pins.clone();
    pins.remove(&clause_uuid);
    self.apply(store, self.selected_uuids(), pins).await
  }

  /// Re-bind the current selection and reload the cache.
  pub async fn reconcile<S: ClauseStore>(&mut self, store: &S) -> Result<BindSummary, S::Error> {
    self.apply(store, self.selected_uuids(), self.pins.clone()).await
  }

  // ── Store mutations ───────────────────────────────────────────────────

  pub async fn import_clauses<S: ClauseStore>(
    &mut self,
    store: &S,
    rows: Vec<ClauseRecord>,
  ) -> Result<ImportSummary, S::Error> {
    let summary = store.import_clauses(rows).await?;
    // Unchanged rows may still carry new tags.
    if !self.selection.is_empty() {
      self.reconcile(store).await?;
    }
    Ok(summary)
  }

  pub async fn update_clause<S: ClauseStore>(
    &mut self,
    store: &S,
    clause_uuid: Uuid,
    edit: ClauseEdit,
  ) -> Result<UpdateOutcome, S::Error> {
    let outcome = store.update_clause(clause_uuid, edit).await?;
    if outcome.is_versioned() && self.is_selected(clause_uuid) {
      self.reconcile(store).await?;
    }
    Ok(outcome)
  }

  pub async fn activate_version<S: ClauseStore>(
    &mut self,
    store: &S,
    clause_uuid: Uuid,
    version: u32,
  ) -> Result<(), S::Error> {
    store.activate_version(clause_uuid, version).await?;
    if self.is_selected(clause_uuid) {
      self.reconcile(store).await?;
    }
    Ok(())
  }

  /// Versions bound by this (or any) policy can't be deleted, so this never
  /// invalidates the cache.
  pub async fn delete_version<S: ClauseStore>(
    &self,
    store: &S,
    clause_uuid: Uuid,
    version: u32,
  ) -> Result<(), S::Error> {
    store.delete_version(clause_uuid, version).await
  }

  // ── Internals ─────────────────────────────────────────────────────────

  /// Bind `order` with `pins` and, on success only, adopt the new state.
  async fn apply<S: ClauseStore>(
    &mut self,
    store: &S,
    order: Vec<Uuid>,
    pins: BTreeMap<Uuid, u32>,
  ) -> Result<BindSummary, S::Error> {
    let desired: Vec<ClauseSelection> = order
      .iter()
      .map(|uuid| ClauseSelection {
        clause_uuid:    *uuid,
        pinned_version: pins.get(uuid).copied(),
      })
      .collect();

    let summary = store.bind_clauses(self.policy_id, desired).await?;
    self.selection = store.bound_clauses(self.policy_id).await?;
    self.pins = pins;

    tracing::debug!(
      policy_id = %self.policy_id,
      selected = self.selection.len(),
      ?summary,
      "reconciled selection"
    );
    Ok(summary)
  }
}
