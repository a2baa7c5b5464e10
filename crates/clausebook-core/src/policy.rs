//! Policies and their clause bindings.
//!
//! A policy binds each clause it uses to one specific [`ClauseVersion`]
//! (`crate::clause::ClauseVersion`), not to the clause itself, so later edits
//! to a shared clause never change wording a policy already bound.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named proposal that selects and binds a set of clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
  pub policy_id:   Uuid,
  pub name:        String,
  pub description: String,
  pub details:     PolicyDetails,
  pub created_at:  DateTime<Utc>,
  /// Touched whenever the policy's bindings or details change.
  pub updated_at:  DateTime<Utc>,
}

/// Input to [`crate::store::ClauseStore::create_policy`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPolicy {
  pub name:        String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub details:     PolicyDetails,
}

impl NewPolicy {
  pub fn named(name: impl Into<String>) -> Self {
    Self { name: name.into(), ..Self::default() }
  }
}

// ─── Insurance details ───────────────────────────────────────────────────────

/// The structured insurance data a policy document opens with, ahead of the
/// special provisions.
///
/// Every field is optional on input; missing fields deserialise empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDetails {
  pub policyholder:  String,
  pub insured:       Insured,
  pub property:      InsuredProperty,
  /// Part one of the main cover.
  pub material_loss: Vec<MaterialLossItem>,
  /// Part two of the main cover.
  pub liability:     Vec<LiabilityItem>,
  pub deductibles:   Vec<Deductible>,
  /// Free-form extra sections, rendered after the main cover.
  pub other_info:    Vec<InfoSection>,
}

impl PolicyDetails {
  pub fn is_empty(&self) -> bool { *self == Self::default() }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Insured {
  pub name:      String,
  pub id_type:   IdType,
  pub id_number: String,
  pub contact:   Contact,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdType {
  #[default]
  IdentityCard,
  /// Unified social credit code, for organisations.
  CreditCode,
}

impl IdType {
  pub fn label(self) -> &'static str {
    match self {
      Self::IdentityCard => "Identity card",
      Self::CreditCode => "Unified social credit code",
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
  pub name:        String,
  pub phone:       String,
  pub email:       String,
  pub address:     String,
  pub postal_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsuredProperty {
  pub name:    String,
  pub address: String,
}

/// One row of the material loss schedule. Amounts are in yuan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialLossItem {
  pub category:     String,
  pub sum_insured:  Option<f64>,
  pub rate_percent: Option<f64>,
  pub premium:      Option<f64>,
}

/// One row of the third-party liability schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiabilityItem {
  pub limit_name: String,
  pub limit:      Option<f64>,
  pub premium:    Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deductible {
  pub item:  String,
  pub terms: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoSection {
  pub name: String,
  pub rows: Vec<InfoRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoRow {
  pub item:        String,
  pub description: String,
}

/// One entry of a desired selection passed to
/// [`crate::store::ClauseStore::bind_clauses`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseSelection {
  pub clause_uuid:    Uuid,
  /// Bind this version instead of the clause's current one.
  #[serde(default)]
  pub pinned_version: Option<u32>,
}

impl ClauseSelection {
  pub fn current(clause_uuid: Uuid) -> Self {
    Self { clause_uuid, pinned_version: None }
  }

  pub fn pinned(clause_uuid: Uuid, version: u32) -> Self {
    Self { clause_uuid, pinned_version: Some(version) }
  }
}

/// A denormalised snapshot of one bound clause, as the selection layer and
/// the document generator see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedClause {
  pub clause_uuid:    Uuid,
  pub version_id:     Uuid,
  pub version_number: u32,
  pub title:          String,
  pub body:           String,
  pub insurance_type: String,
  pub company:        String,
  pub library_tag:    String,
  /// Whether the binding was made against an explicitly requested version.
  pub pinned:         bool,
}

/// Counts returned by a binding reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BindSummary {
  /// Clauses that had no binding before.
  pub bound:     usize,
  /// Existing bindings moved to a different version, position or pin state.
  pub rebound:   usize,
  pub unchanged: usize,
  /// Bindings dropped because the clause left the selection.
  pub removed:   usize,
}

impl BindSummary {
  pub fn is_noop(&self) -> bool {
    self.bound == 0 && self.rebound == 0 && self.removed == 0
  }
}
