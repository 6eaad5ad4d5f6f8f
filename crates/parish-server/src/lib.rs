//! HTTP surface for the parish intake and review system.
//!
//! Exposes an axum [`Router`] backed by any [`ParishStore`]: the public,
//! token-scoped intake form and the authenticated review, link-management and
//! parishioner routes under `/api`.

pub mod auth;
pub mod error;
pub mod handlers;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use parish_core::store::ParishStore;
use parish_intake::{captcha::CaptchaConfig, gate::AbuseGate};
use serde::Deserialize;

use auth::{AuthConfig, ReviewerAccount};
use handlers::{links, parishioners, public, review};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `PARISH__*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  /// Prefix of the public URL handed out for each link.
  pub base_url:   String,
  pub store_path: PathBuf,
  #[serde(default)]
  pub reviewers:  Vec<ReviewerAccount>,
  #[serde(default)]
  pub captcha:    CaptchaConfig,
  #[serde(default = "default_cleanup_secs")]
  pub rate_limit_cleanup_secs: u64,
}

fn default_cleanup_secs() -> u64 { 600 }

impl ServerConfig {
  /// The address a visitor opens for `token`.
  pub fn public_url(&self, token: &str) -> String {
    format!(
      "{}{}/{token}",
      self.base_url.trim_end_matches('/'),
      public::SUBMIT_PATH
    )
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: ParishStore> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  pub auth:   Arc<AuthConfig>,
  pub gate:   AbuseGate,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application [`Router`].
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ParishStore + Clone + 'static,
{
  Router::new()
    // Public intake
    .route("/public/submit/success",          get(public::success))
    .route("/public/submit/error",            get(public::error_view))
    .route("/public/submit/{token}",          get(public::form::<S>).post(public::submit::<S>))
    // Review
    .route("/api/submissions",                get(review::list::<S>))
    .route("/api/submissions/pending-count",  get(review::pending_count::<S>))
    .route("/api/submissions/history",        get(review::history::<S>))
    .route("/api/submissions/{id}",           get(review::detail::<S>))
    .route("/api/submissions/{id}/target",    post(review::assign_target::<S>))
    .route("/api/submissions/{id}/approve",   post(review::approve::<S>))
    .route("/api/submissions/{id}/reject",    post(review::reject::<S>))
    // Links
    .route("/api/links",                      get(links::mine::<S>).post(links::create::<S>))
    .route("/api/links/active",               get(links::active::<S>))
    .route("/api/links/{id}",                 get(links::get_one::<S>))
    .route("/api/links/{id}/deactivate",      post(links::deactivate::<S>))
    .route("/api/links/{id}/submissions",     get(links::submissions::<S>))
    // Parishioners
    .route("/api/parishioners",               get(parishioners::list::<S>).post(parishioners::create::<S>))
    .route("/api/parishioners/{id}",          get(parishioners::get_one::<S>))
    .route("/api/parishioners/{id}/marry",    post(parishioners::marry::<S>))
    .route("/api/parishioners/{id}/divorce",  post(parishioners::divorce::<S>))
    .route("/api/parishioners/{id}/departed", post(parishioners::departed::<S>))
    .route("/api/households",                 get(parishioners::households::<S>).post(parishioners::create_household::<S>))
    .with_state(state)
}

#[cfg(test)]
pub(crate) mod testing;
