//! Handlers for `/clauses` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/clauses` | Optional `text`, `insurance_type`, `company`, `library_tag`, `limit`, `offset` |
//! | `POST` | `/clauses/import` | Body: JSON array of [`ClauseRecord`]s |
//! | `GET`  | `/clauses/export` | `?format=csv\|json\|markdown[&uuids=a,b]` |
//! | `GET`  | `/clauses/{uuid}` | Sets `ETag` |
//! | `PUT`  | `/clauses/{uuid}` | Body: [`ClauseEdit`]; honours `If-Match` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, header},
  response::IntoResponse,
};
use clausebook_core::{
  clause::{ClauseEdit, ClauseRecord},
  fingerprint::{clause_etag, etag_matches},
  render::{self, ExportFormat},
  store::{ClauseQuery, ClauseStore},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /clauses[?text=...][&insurance_type=...][&limit=..&offset=..]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(query): Query<ClauseQuery>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  let clauses = store.list_clauses(query).await.map_err(ApiError::from_store)?;
  Ok(Json(clauses))
}

// ─── Import ───────────────────────────────────────────────────────────────────

/// `POST /clauses/import`: returns the [`ImportSummary`](clausebook_core::store::ImportSummary).
pub async fn import<S>(
  State(store): State<Arc<S>>,
  Json(rows): Json<Vec<ClauseRecord>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  let summary = store.import_clauses(rows).await.map_err(ApiError::from_store)?;
  Ok(Json(summary))
}

// ─── Export ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
  /// `csv` (default), `json` or `markdown`.
  pub format: Option<String>,
  /// Comma-separated clause UUIDs; exports everything when absent.
  pub uuids:  Option<String>,
}

/// `GET /clauses/export`
pub async fn export<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  let format = params
    .format
    .as_deref()
    .map(str::parse::<ExportFormat>)
    .transpose()
    .map_err(ApiError::from_store)?
    .unwrap_or_default();

  let clauses = match params.uuids.as_deref().map(parse_uuid_list).transpose()? {
    Some(ids) => store.export_selected(ids).await,
    None => store.export_all().await,
  }
  .map_err(ApiError::from_store)?;

  let body = render::export(&clauses, format).map_err(ApiError::from_store)?;
  let disposition = format!("attachment; filename=\"clauses.{}\"", format.extension());

  Ok((
    [
      (header::CONTENT_TYPE, format.media_type().to_owned()),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    body,
  ))
}

fn parse_uuid_list(raw: &str) -> Result<Vec<Uuid>, ApiError> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(|s| {
      Uuid::parse_str(s).map_err(|e| ApiError::BadRequest(format!("invalid uuid {s:?}: {e}")))
    })
    .collect()
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /clauses/{uuid}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(clause_uuid): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  let clause = store
    .get_clause(clause_uuid)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("clause {clause_uuid} not found")))?;

  Ok(([(header::ETAG, clause_etag(&clause))], Json(clause)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /clauses/{uuid}`: commits an edit, returning the
/// [`UpdateOutcome`](clausebook_core::clause::UpdateOutcome).
///
/// With `If-Match`, the edit is only applied if the clause still has the
/// given ETag; otherwise 412.
pub async fn update<S>(
  State(store): State<Arc<S>>,
  Path(clause_uuid): Path<Uuid>,
  headers: HeaderMap,
  Json(edit): Json<ClauseEdit>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClauseStore,
{
  let if_match = headers
    .get(header::IF_MATCH)
    .and_then(|v| v.to_str().ok())
    .map(str::to_owned);

  if let Some(expected) = if_match {
    let current = store
      .get_clause(clause_uuid)
      .await
      .map_err(ApiError::from_store)?
      .ok_or_else(|| ApiError::NotFound(format!("clause {clause_uuid} not found")))?;
    let etag = clause_etag(&current);
    if !etag_matches(&etag, &expected) {
      return Err(ApiError::PreconditionFailed(format!(
        "clause {clause_uuid} has changed (current etag {etag})"
      )));
    }
  }

  let outcome = store
    .update_clause(clause_uuid, edit)
    .await
    .map_err(ApiError::from_store)?;

  Ok(([(header::ETAG, clause_etag(outcome.clause()))], Json(outcome)))
}
