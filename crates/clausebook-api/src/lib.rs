//! JSON REST API for Clausebook.
//!
//! Exposes an axum [`Router`] backed by any
//! [`clausebook_core::store::ClauseStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", clausebook_api::api_router(store.clone()))
//! ```

pub mod clauses;
pub mod error;
pub mod policies;
pub mod versions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use clausebook_core::store::ClauseStore;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ClauseStore + 'static,
{
  Router::new()
    // Clauses
    .route("/clauses", get(clauses::list::<S>))
    .route("/clauses/import", post(clauses::import::<S>))
    .route("/clauses/export", get(clauses::export::<S>))
    .route("/clauses/{uuid}", get(clauses::get_one::<S>).put(clauses::update::<S>))
    // Versions
    .route("/clauses/{uuid}/versions", get(versions::list::<S>))
    .route(
      "/clauses/{uuid}/versions/{n}",
      get(versions::get_one::<S>).delete(versions::delete::<S>),
    )
    .route("/clauses/{uuid}/versions/{n}/activate", post(versions::activate::<S>))
    .route("/clauses/{uuid}/versions/{n}/diff", get(versions::diff::<S>))
    // Policies
    .route("/policies", get(policies::list::<S>).post(policies::create::<S>))
    .route(
      "/policies/{id}",
      get(policies::get_one::<S>).delete(policies::delete::<S>),
    )
    .route(
      "/policies/{id}/clauses",
      get(policies::bound_clauses::<S>).put(policies::bind::<S>),
    )
    .route("/policies/{id}/details", put(policies::update_details::<S>))
    .route("/policies/{id}/clauses/{uuid}", get(policies::bound_version::<S>))
    .route("/policies/{id}/document", get(policies::document::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(store)
}

// ─── Integration tests ────────────────────────────────────────────────────────
