use parish_core::link::LinkStatus;
use thiserror::Error;

/// A public request that was turned away. Every variant's `Display` is the
/// message shown to the visitor, so none of them carry internal detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
  // ── Link ──────────────────────────────────────────────────────────────
  #[error("This link is invalid.")]
  UnknownLink,

  #[error("This link is no longer active.")]
  LinkInactive,

  #[error("This link has expired.")]
  LinkExpired,

  #[error("This link has reached its maximum number of submissions.")]
  LinkAtLimit,

  // ── Abuse checks ──────────────────────────────────────────────────────
  #[error("Too many requests. Please try again later.")]
  TooManyRequests,

  #[error("Too many submissions from your location. Please try again later.")]
  IpRateLimited,

  #[error("Too many submissions on this link. Please try again later.")]
  TokenRateLimited,

  #[error(
    "Form submitted too quickly. Please take your time filling out the form."
  )]
  TooFast,

  #[error("Your session has expired. Please reload the form and try again.")]
  SessionExpired,

  #[error("Security verification failed. Please try again.")]
  CaptchaFailed,

  #[error("Invalid characters detected in submission.")]
  SuspiciousContent,

  // ── Field checks ──────────────────────────────────────────────────────
  #[error("First name is required and must contain valid characters.")]
  FirstNameRequired,

  #[error("Please enter a valid email address.")]
  InvalidEmail,

  #[error("Invalid submission type.")]
  InvalidSubmissionType,

  #[error("Birthday cannot be in the future.")]
  FutureBirthday,

  #[error("Marriage date cannot be in the future.")]
  FutureMarriage,

  #[error("{}", .0.join("; "))]
  Invalid(Vec<String>),

  #[error("Error processing submission. Please try again.")]
  SaveFailed,
}

impl Rejection {
  /// The rejection for a link that does not accept submissions, or `None`
  /// if it does.
  pub fn for_link(status: LinkStatus) -> Option<Self> {
    match status {
      LinkStatus::Valid => None,
      LinkStatus::Inactive => Some(Self::LinkInactive),
      LinkStatus::Expired => Some(Self::LinkExpired),
      LinkStatus::AtLimit => Some(Self::LinkAtLimit),
    }
  }

  /// Whether this is a rate-limit outcome (HTTP 429 territory).
  pub fn is_rate_limit(&self) -> bool {
    matches!(
      self,
      Self::TooManyRequests | Self::IpRateLimited | Self::TokenRateLimited
    )
  }
}

pub type Result<T, E = Rejection> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn link_statuses_have_distinct_messages() {
    let messages: Vec<String> =
      [LinkStatus::Inactive, LinkStatus::Expired, LinkStatus::AtLimit]
        .into_iter()
        .filter_map(Rejection::for_link)
        .map(|r| r.to_string())
        .collect();
    assert_eq!(messages.len(), 3);
    assert_ne!(messages[0], messages[1]);
    assert_ne!(messages[1], messages[2]);
    assert!(Rejection::for_link(LinkStatus::Valid).is_none());
  }

  #[test]
  fn invalid_joins_messages() {
    let r = Rejection::Invalid(vec![
      "Last name is required".into(),
      "Invalid email format".into(),
    ]);
    assert_eq!(r.to_string(), "Last name is required; Invalid email format");
  }
}
