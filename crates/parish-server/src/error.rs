//! Error type and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use parish_core::{AsDomainError, Error as DomainError};
use parish_intake::Rejection;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,

  #[error("forbidden")]
  Forbidden,

  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  BadRequest(String),

  /// A public request turned away by the intake gate.
  #[error(transparent)]
  Rejected(#[from] Rejection),

  /// A domain failure surfaced through the store, already classified.
  #[error("{message}")]
  Domain { status: StatusCode, message: String },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Classify a backend error: domain failures keep their message and get a
  /// specific status, anything else is a storage fault.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + AsDomainError + Send + Sync + 'static,
  {
    match e.as_domain() {
      Some(domain) => Error::Domain {
        status:  domain_status(domain),
        message: domain.to_string(),
      },
      None => Error::Store(Box::new(e)),
    }
  }
}

fn domain_status(e: &DomainError) -> StatusCode {
  match e {
    DomainError::SubmissionNotFound(_)
    | DomainError::ParishionerNotFound(_)
    | DomainError::HouseholdNotFound(_)
    | DomainError::LinkNotFound(_) => StatusCode::NOT_FOUND,
    DomainError::AlreadyProcessed { .. } => StatusCode::CONFLICT,
    DomainError::WrongSubmissionType { .. }
    | DomainError::MissingTarget(_)
    | DomainError::Validation(_)
    | DomainError::SelfRelationship(_)
    | DomainError::SpouseConflict { .. }
    | DomainError::StaleSpouse { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    DomainError::LinkUnavailable(_) => StatusCode::FORBIDDEN,
    DomainError::CounterOverflow(_) | DomainError::Serialization(_) => {
      StatusCode::INTERNAL_SERVER_ERROR
    }
  }
}

fn rejection_status(r: &Rejection) -> StatusCode {
  match r {
    _ if r.is_rate_limit() => StatusCode::TOO_MANY_REQUESTS,
    Rejection::UnknownLink => StatusCode::NOT_FOUND,
    Rejection::LinkInactive
    | Rejection::LinkExpired
    | Rejection::LinkAtLimit
    | Rejection::CaptchaFailed => StatusCode::FORBIDDEN,
    Rejection::SaveFailed => StatusCode::INTERNAL_SERVER_ERROR,
    _ => StatusCode::BAD_REQUEST,
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      Error::Unauthorized => {
        let mut res = (
          StatusCode::UNAUTHORIZED,
          Json(json!({ "error": "Unauthorized" })),
        )
          .into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"parish\""),
        );
        return res;
      }
      Error::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_owned()),
      Error::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      Error::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      Error::Rejected(r) => (rejection_status(r), r.to_string()),
      Error::Domain { status, message } => (*status, message.clone()),
      Error::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use parish_core::submission::SubmissionStatus;

  use super::*;

  #[test]
  fn domain_errors_are_classified() {
    let conflict = Error::store(DomainError::AlreadyProcessed {
      id:     4,
      status: SubmissionStatus::Approved,
    });
    assert!(matches!(
      conflict,
      Error::Domain { status: StatusCode::CONFLICT, .. }
    ));

    let invalid =
      Error::store(DomainError::Validation("Birthday cannot be in the future".into()));
    assert_eq!(invalid.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

    let missing = Error::store(DomainError::ParishionerNotFound(9));
    assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);
  }

  #[test]
  fn rejections_map_to_public_statuses() {
    let status = |r: Rejection| Error::from(r).into_response().status();
    assert_eq!(status(Rejection::IpRateLimited), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(status(Rejection::UnknownLink), StatusCode::NOT_FOUND);
    assert_eq!(status(Rejection::LinkExpired), StatusCode::FORBIDDEN);
    assert_eq!(status(Rejection::TooFast), StatusCode::BAD_REQUEST);
  }

  #[test]
  fn unauthorized_carries_a_challenge() {
    let res = Error::Unauthorized.into_response();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));
  }
}
