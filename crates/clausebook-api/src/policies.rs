//! Handlers for `/policies` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/policies` | Most recently updated first |
//! | `POST` | `/policies` | Body: [`NewPolicy`]; returns 201 |
//! | `GET`  | `/policies/{id}` | |
//! | `DELETE` | `/policies/{id}` | Drops its bindings too |
//! | `PUT`  | `/policies/{id}/details` | Body: [`PolicyDetails`] |
//! | `GET`  | `/policies/{id}/clauses` | Bound clause snapshots in order |
//! | `PUT`  | `/policies/{id}/clauses` | Body: array of [`ClauseSelection`]s |
//! | `GET`  | `/policies/{id}/clauses/{uuid}` | The exact bound version |
//! | `GET`  | `/policies/{id}/document` | Markdown policy document |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::{StatusCode, header},
  response::IntoResponse,
};
use clausebook_core::{
  policy::{ClauseSelection, NewPolicy, Policy, PolicyDetails},
  session::Session,
  store::ClauseStore,
};
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /policies`
pub async fn list<S>(State(store): State<Arc<S>>) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  let policies = store.list_policies().await.map_err(ApiError::from_store)?;
  Ok(Json(policies))
}

/// `POST /policies`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewPolicy>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  let policy = store.create_policy(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(policy)))
}

/// `GET /policies/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(policy_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  Ok(Json(require_policy(&*store, policy_id).await?))
}

/// `DELETE /policies/{id}`: 204 on success.
pub async fn delete<S>(
  State(store): State<Arc<S>>,
  Path(policy_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  store.delete_policy(policy_id).await.map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `PUT /policies/{id}/details`: replace the insurance details wholesale.
pub async fn update_details<S>(
  State(store): State<Arc<S>>,
  Path(policy_id): Path<Uuid>,
  Json(details): Json<PolicyDetails>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  let policy = store
    .update_policy_details(policy_id, details)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(policy))
}

// ─── Bindings ─────────────────────────────────────────────────────────────────

/// `GET /policies/{id}/clauses`
pub async fn bound_clauses<S>(
  State(store): State<Arc<S>>,
  Path(policy_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  let session = open_session(&*store, policy_id).await?;
  Ok(Json(session.selection().to_vec()))
}

/// `PUT /policies/{id}/clauses`: reconcile the bindings to exactly the
/// given selection; returns the [`BindSummary`](clausebook_core::policy::BindSummary).
pub async fn bind<S>(
  State(store): State<Arc<S>>,
  Path(policy_id): Path<Uuid>,
  Json(selection): Json<Vec<ClauseSelection>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  let summary = store
    .bind_clauses(policy_id, selection)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(summary))
}

/// `GET /policies/{id}/clauses/{uuid}`
pub async fn bound_version<S>(
  State(store): State<Arc<S>>,
  Path((policy_id, clause_uuid)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  open_session(&*store, policy_id).await?;
  let version = store
    .bound_version(policy_id, clause_uuid)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("clause {clause_uuid} is not bound by policy {policy_id}"))
    })?;
  Ok(Json(version))
}

// ─── Document ─────────────────────────────────────────────────────────────────

/// `GET /policies/{id}/document`
pub async fn document<S>(
  State(store): State<Arc<S>>,
  Path(policy_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  let policy = require_policy(&*store, policy_id).await?;
  let session = open_session(&*store, policy_id).await?;

  Ok((
    [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
    session.document(&policy),
  ))
}

/// Reads go through a session so unpinned bindings reflect the clauses'
/// current versions.
async fn open_session<S: ClauseStore>(store: &S, policy_id: Uuid) -> Result<Session, ApiError> {
  Session::open(store, policy_id)
    .await
    .map_err(ApiError::from_store)
}

async fn require_policy<S: ClauseStore>(store: &S, policy_id: Uuid) -> Result<Policy, ApiError> {
  store
    .get_policy(policy_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("policy {policy_id} not found")))
}
