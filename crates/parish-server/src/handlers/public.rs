//! Handlers for the public, token-scoped intake form.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/public/submit/{token}` | Form view with choices and `form_load_time` |
//! | `POST` | `/public/submit/{token}` | JSON [`PublicForm`]; 303 to the success view |
//! | `GET`  | `/public/submit/success` | |
//! | `GET`  | `/public/submit/error` | |

use std::{convert::Infallible, net::SocketAddr};

use axum::{
  Json,
  extract::{ConnectInfo, FromRequestParts, Path, State},
  http::{HeaderMap, request::Parts},
  response::Redirect,
};
use chrono::Utc;
use parish_core::{
  AsDomainError, Error as DomainError,
  link::token_prefix,
  parishioner::{MaritalStatus, MembershipStatus},
  store::ParishStore,
  submission::SubmissionType,
};
use parish_intake::{
  Rejection,
  client_ip::client_ip,
  gate::{PublicForm, Verdict, build_submission},
};
use serde::Serialize;
use serde_json::{Value, json};
use strum::IntoEnumIterator;
use tracing::{error, info};

use crate::{AppState, error::{Error, Result}};

pub const SUBMIT_PATH: &str = "/public/submit";
pub const SUCCESS_PATH: &str = "/public/submit/success";

// ─── Client address ──────────────────────────────────────────────────────────

/// The address a public request is attributed to.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
  headers.get(name).and_then(|v| v.to_str().ok())
}

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
  type Rejection = Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let peer = parts
      .extensions
      .get::<ConnectInfo<SocketAddr>>()
      .map(|ConnectInfo(addr)| *addr);
    Ok(ClientIp(client_ip(
      header(&parts.headers, "x-forwarded-for"),
      header(&parts.headers, "x-real-ip"),
      peer,
    )))
  }
}

// ─── Form view ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct FormView {
  pub token:               String,
  pub description:         Option<String>,
  /// Epoch seconds; echoed back by the POST for the timing check.
  pub form_load_time:      i64,
  pub submission_types:    Vec<&'static str>,
  pub membership_statuses: Vec<&'static str>,
  pub marital_statuses:    Vec<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub captcha_site_key:    Option<String>,
}

fn choices<E>() -> Vec<&'static str>
where
  E: IntoEnumIterator + Into<&'static str>,
{
  E::iter().map(Into::into).collect()
}

/// `GET /public/submit/{token}`
pub async fn form<S>(
  State(state): State<AppState<S>>,
  Path(token): Path<String>,
  ClientIp(ip): ClientIp,
) -> Result<Json<FormView>>
where
  S: ParishStore + Clone + 'static,
{
  let now = Utc::now();
  let link = state.store.link_by_token(&token).await.map_err(Error::store)?;
  let link = state.gate.admit_view(&token, link.as_ref(), &ip, now)?;

  let link = state
    .store
    .record_link_access(link.id)
    .await
    .map_err(Error::store)?;
  info!(
    token = token_prefix(&token),
    access_count = link.access_count,
    "served submission form"
  );

  Ok(Json(FormView {
    token:               link.token,
    description:         link.description,
    form_load_time:      now.timestamp(),
    submission_types:    choices::<SubmissionType>(),
    membership_statuses: choices::<MembershipStatus>(),
    marital_statuses:    choices::<MaritalStatus>(),
    captcha_site_key:    state.gate.captcha().map(|c| c.site_key().to_owned()),
  }))
}

// ─── Submit ──────────────────────────────────────────────────────────────────

/// `POST /public/submit/{token}`
pub async fn submit<S>(
  State(state): State<AppState<S>>,
  Path(token): Path<String>,
  ClientIp(ip): ClientIp,
  Json(form): Json<PublicForm>,
) -> Result<Redirect>
where
  S: ParishStore + Clone + 'static,
{
  let now = Utc::now();
  if state.gate.screen(&form, &token, &ip, now).await? == Verdict::Decoy {
    return Ok(Redirect::to(SUCCESS_PATH));
  }

  let link = state.store.link_by_token(&token).await.map_err(Error::store)?;
  let link = state.gate.admit_link(&token, link.as_ref(), now)?;
  let input = build_submission(&form, now.date_naive())?;

  let submission = state
    .store
    .create_submission(link.id, input)
    .await
    .map_err(|e| save_failure(&token, &ip, e))?;

  state.gate.record_accepted(&ip, &token, now);
  info!(
    id = submission.id,
    token = token_prefix(&token),
    "created pending submission"
  );
  Ok(Redirect::to(SUCCESS_PATH))
}

/// A link that became unusable between the check and the write keeps its
/// specific message; anything else is a generic save failure.
fn save_failure<E>(token: &str, ip: &str, e: E) -> Error
where
  E: std::error::Error + AsDomainError,
{
  let link_state = match e.as_domain() {
    Some(DomainError::LinkUnavailable(status)) => Rejection::for_link(*status),
    _ => None,
  };
  if let Some(rejection) = link_state {
    return rejection.into();
  }
  error!(ip, token = token_prefix(token), error = %e, "failed to save submission");
  Rejection::SaveFailed.into()
}

// ─── Static views ────────────────────────────────────────────────────────────

/// `GET /public/submit/success`
pub async fn success() -> Json<Value> {
  Json(json!({
    "message": "Thank you! Your submission has been received and will be reviewed.",
  }))
}

/// `GET /public/submit/error`
pub async fn error_view() -> Json<Value> {
  Json(json!({ "error": "An error occurred. Please try again." }))
}
