//! HTTP Basic-auth extractors and the review role policy.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use crate::{AppState, error::Error};
use parish_core::store::ParishStore;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
  Priest,
  Secretary,
  /// Authenticated, read-only.
  Viewer,
}

/// Roles allowed to review submissions, manage links and edit parishioners.
pub const REVIEW_ROLES: &[Role] = &[Role::Priest, Role::Secretary];

/// One entry of the configured reviewer table.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewerAccount {
  pub email:         String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub role:          Role,
}

/// Credentials accepted as valid for this server instance.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
  pub reviewers: Vec<ReviewerAccount>,
}

/// The authenticated principal. `email` is the identity stamped on links and
/// review decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reviewer {
  pub email: String,
  pub role:  Role,
}

impl Reviewer {
  pub fn can_review(&self) -> bool { REVIEW_ROLES.contains(&self.role) }
}

/// A reviewer whose role is in [`REVIEW_ROLES`].
#[derive(Debug, Clone)]
pub struct Privileged(pub Reviewer);

/// Verify credentials directly from headers.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Reviewer, Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (email, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  let account = config
    .reviewers
    .iter()
    .find(|a| a.email.eq_ignore_ascii_case(email))
    .ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&account.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(Reviewer { email: account.email.clone(), role: account.role })
}

impl<S> FromRequestParts<AppState<S>> for Reviewer
where
  S: ParishStore + Clone + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    verify_auth(&parts.headers, &state.auth)
  }
}

impl<S> FromRequestParts<AppState<S>> for Privileged
where
  S: ParishStore + Clone + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let reviewer = verify_auth(&parts.headers, &state.auth)?;
    if !reviewer.can_review() {
      warn!(email = %reviewer.email, role = %reviewer.role, "role may not review");
      return Err(Error::Forbidden);
    }
    Ok(Privileged(reviewer))
  }
}
