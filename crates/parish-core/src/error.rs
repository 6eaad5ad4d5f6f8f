//! Error types for `parish-core`.

use thiserror::Error;

use crate::submission::SubmissionStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("submission not found: {0}")]
  SubmissionNotFound(i64),

  #[error("parishioner not found: {0}")]
  ParishionerNotFound(i64),

  #[error("household not found: {0}")]
  HouseholdNotFound(i64),

  #[error("submission link not found: {0}")]
  LinkNotFound(i64),

  /// The submission was already approved or rejected.
  #[error("Submission {id} has already been processed (status: {status})")]
  AlreadyProcessed { id: i64, status: SubmissionStatus },

  #[error("submission {id} is not of type {expected}")]
  WrongSubmissionType { id: i64, expected: &'static str },

  #[error("Target parishioner not set for update submission {0}")]
  MissingTarget(i64),

  /// A date or field check failed. The message is shown to the reviewer as-is.
  #[error("{0}")]
  Validation(String),

  #[error("Cannot assign a person as their own {0}")]
  SelfRelationship(&'static str),

  #[error("Selected spouse ({spouse}) is already married to {partner}")]
  SpouseConflict { spouse: String, partner: String },

  /// `marry` was called while one side still points at a third party.
  #[error("parishioner {id} is still married to {partner_id}; sever that link first")]
  StaleSpouse { id: i64, partner_id: i64 },

  #[error("the link is not accepting submissions: {0}")]
  LinkUnavailable(crate::link::LinkStatus),

  #[error("counter overflow on link {0}")]
  CounterOverflow(i64),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Backend errors that may carry a domain [`Error`], so callers can tell a
/// conflict or validation failure apart from a storage fault.
pub trait AsDomainError {
  fn as_domain(&self) -> Option<&Error>;
}

impl AsDomainError for Error {
  fn as_domain(&self) -> Option<&Error> { Some(self) }
}
