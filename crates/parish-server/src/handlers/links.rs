//! Handlers for `/api/links` endpoints. Every route requires a reviewing
//! role.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/links` | Links created by the caller, newest first |
//! | `POST` | `/api/links` | Body: `{"description":"…","expires_on":"2025-01-31","max_submissions":50}` |
//! | `GET`  | `/api/links/active` | |
//! | `GET`  | `/api/links/{id}` | 404 if not found |
//! | `POST` | `/api/links/{id}/deactivate` | Idempotent |
//! | `GET`  | `/api/links/{id}/submissions` | Newest first |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use parish_core::{
  link::{LinkStatus, NewLink, SubmissionLink},
  store::ParishStore,
  submission::Submission,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  AppState, ServerConfig,
  auth::Privileged,
  error::{Error, Result},
};

/// A link as shown to reviewers.
#[derive(Debug, Serialize)]
pub struct LinkView {
  #[serde(flatten)]
  pub link:       SubmissionLink,
  pub public_url: String,
  pub status:     LinkStatus,
}

impl LinkView {
  fn new(link: SubmissionLink, config: &ServerConfig) -> Self {
    Self {
      public_url: config.public_url(&link.token),
      status:     link.status(Utc::now()),
      link,
    }
  }
}

fn views(links: Vec<SubmissionLink>, config: &ServerConfig) -> Vec<LinkView> {
  links.into_iter().map(|l| LinkView::new(l, config)).collect()
}

async fn load<S>(store: &S, id: i64) -> Result<SubmissionLink>
where
  S: ParishStore,
{
  store
    .link(id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::NotFound(format!("link {id} not found")))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateBody {
  pub description:     Option<String>,
  /// Last day the link accepts submissions; it expires at 23:59:59 UTC.
  pub expires_on:      Option<NaiveDate>,
  /// Absent means unlimited.
  pub max_submissions: Option<u32>,
}

/// `POST /api/links`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Privileged(reviewer): Privileged,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse>
where
  S: ParishStore + Clone + 'static,
{
  if body.max_submissions == Some(0) {
    return Err(Error::BadRequest(
      "max_submissions must be at least 1".to_owned(),
    ));
  }
  let expires_at = body
    .expires_on
    .and_then(|day| day.and_hms_opt(23, 59, 59))
    .map(|dt| dt.and_utc());

  let link = state
    .store
    .create_link(NewLink {
      created_by:      reviewer.email,
      expires_at,
      description:     body
        .description
        .map(|d| d.trim().to_owned())
        .filter(|d| !d.is_empty()),
      max_submissions: body.max_submissions,
    })
    .await
    .map_err(Error::store)?;

  info!(
    id = link.id,
    created_by = %link.created_by,
    expires_at = ?link.expires_at,
    max_submissions = ?link.max_submissions,
    "created submission link"
  );
  Ok((StatusCode::CREATED, Json(LinkView::new(link, &state.config))))
}

// ─── Listing ──────────────────────────────────────────────────────────────────

/// `GET /api/links`
pub async fn mine<S>(
  State(state): State<AppState<S>>,
  Privileged(reviewer): Privileged,
) -> Result<Json<Vec<LinkView>>>
where
  S: ParishStore + Clone + 'static,
{
  let links = state
    .store
    .links_by_creator(&reviewer.email)
    .await
    .map_err(Error::store)?;
  Ok(Json(views(links, &state.config)))
}

/// `GET /api/links/active`
pub async fn active<S>(
  State(state): State<AppState<S>>,
  _: Privileged,
) -> Result<Json<Vec<LinkView>>>
where
  S: ParishStore + Clone + 'static,
{
  let links = state.store.active_links().await.map_err(Error::store)?;
  Ok(Json(views(links, &state.config)))
}

/// `GET /api/links/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  _: Privileged,
  Path(id): Path<i64>,
) -> Result<Json<LinkView>>
where
  S: ParishStore + Clone + 'static,
{
  let link = load(state.store.as_ref(), id).await?;
  Ok(Json(LinkView::new(link, &state.config)))
}

/// `GET /api/links/{id}/submissions`
pub async fn submissions<S>(
  State(state): State<AppState<S>>,
  _: Privileged,
  Path(id): Path<i64>,
) -> Result<Json<Vec<Submission>>>
where
  S: ParishStore + Clone + 'static,
{
  load(state.store.as_ref(), id).await?;
  let submissions = state
    .store
    .submissions_for_link(id)
    .await
    .map_err(Error::store)?;
  Ok(Json(submissions))
}

// ─── Deactivate ───────────────────────────────────────────────────────────────

/// `POST /api/links/{id}/deactivate`
pub async fn deactivate<S>(
  State(state): State<AppState<S>>,
  Privileged(reviewer): Privileged,
  Path(id): Path<i64>,
) -> Result<Json<LinkView>>
where
  S: ParishStore + Clone + 'static,
{
  let link = state.store.deactivate_link(id).await.map_err(Error::store)?;
  info!(id, by = %reviewer.email, "deactivated submission link");
  Ok(Json(LinkView::new(link, &state.config)))
}
