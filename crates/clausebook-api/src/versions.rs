//! Handlers for a clause's version history.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/clauses/{uuid}/versions` | Newest first |
//! | `GET`    | `/clauses/{uuid}/versions/{n}` | Single version |
//! | `DELETE` | `/clauses/{uuid}/versions/{n}` | 409 if sole, current or bound |
//! | `POST`   | `/clauses/{uuid}/versions/{n}/activate` | Returns the clause |
//! | `GET`    | `/clauses/{uuid}/versions/{n}/diff` | `?against=m`, defaults to current |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{StatusCode, header},
  response::IntoResponse,
};
use clausebook_core::{clause::ClauseVersion, diff, store::ClauseStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /clauses/{uuid}/versions`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path(clause_uuid): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  let versions = store.get_versions(clause_uuid).await.map_err(ApiError::from_store)?;
  Ok(Json(versions))
}

/// `GET /clauses/{uuid}/versions/{n}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path((clause_uuid, version)): Path<(Uuid, u32)>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  Ok(Json(require_version(&*store, clause_uuid, version).await?))
}

/// `POST /clauses/{uuid}/versions/{n}/activate`
pub async fn activate<S>(
  State(store): State<Arc<S>>,
  Path((clause_uuid, version)): Path<(Uuid, u32)>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  let clause = store
    .activate_version(clause_uuid, version)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(clause))
}

/// `DELETE /clauses/{uuid}/versions/{n}`: 204 on success.
pub async fn delete<S>(
  State(store): State<Arc<S>>,
  Path((clause_uuid, version)): Path<(Uuid, u32)>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  store
    .delete_version(clause_uuid, version)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct DiffParams {
  pub against: Option<u32>,
}

/// `GET /clauses/{uuid}/versions/{n}/diff[?against=m]`: unified line diff
/// from version `m` (the current version by default) to version `n`.
pub async fn diff<S>(
  State(store): State<Arc<S>>,
  Path((clause_uuid, version)): Path<(Uuid, u32)>,
  Query(params): Query<DiffParams>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  let base = match params.against {
    Some(n) => n,
    None => {
      store
        .get_clause(clause_uuid)
        .await
        .map_err(ApiError::from_store)?
        .ok_or_else(|| ApiError::NotFound(format!("clause {clause_uuid} not found")))?
        .version_number
    }
  };

  let old = require_version(&*store, clause_uuid, base).await?;
  let new = require_version(&*store, clause_uuid, version).await?;

  let lines = diff::line_diff(&old.body, &new.body);
  Ok((
    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
    diff::render_unified(&lines),
  ))
}

async fn require_version<S: ClauseStore>(
  store: &S,
  clause_uuid: Uuid,
  version: u32,
) -> Result<ClauseVersion, ApiError> {
  store
    .get_version(clause_uuid, version)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("version {version} of clause {clause_uuid} not found"))
    })
}
