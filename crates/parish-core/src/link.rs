//! Submission links, the token-scoped entry points to the public intake form.
//!
//! A link is created by a reviewer and handed out (printed, emailed, QR-coded).
//! Its token is the only credential a visitor holds, so it is an unguessable
//! random UUID rather than a sequential id. Links are never deleted; they stop
//! accepting submissions when deactivated, expired, or exhausted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::{Error, Result};

/// Length of a hyphenated UUID token.
pub const TOKEN_LEN: usize = 36;

/// Generate a fresh, cryptographically random link token.
pub fn generate_token() -> String { Uuid::new_v4().hyphenated().to_string() }

/// The first eight characters of a token, for log lines.
pub fn token_prefix(token: &str) -> &str {
  match token.char_indices().nth(8) {
    Some((idx, _)) => &token[..idx],
    None => token,
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Why a link does or does not accept submissions, checked in this order:
/// inactive, expired, at limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LinkStatus {
  Valid,
  Inactive,
  Expired,
  AtLimit,
}

impl LinkStatus {
  pub fn is_valid(self) -> bool { self == Self::Valid }
}

// ─── Link ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionLink {
  pub id:               i64,
  pub token:            String,
  /// Identity of the reviewer who created the link.
  pub created_by:       String,
  pub created_at:       DateTime<Utc>,
  /// `None` never expires.
  pub expires_at:       Option<DateTime<Utc>>,
  pub is_active:        bool,
  /// Incremented on every form view.
  pub access_count:     u32,
  pub description:      Option<String>,
  /// `None` accepts an unlimited number of submissions.
  pub max_submissions:  Option<u32>,
  /// Incremented on every accepted submission.
  pub submission_count: u32,
}

impl SubmissionLink {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expires_at.is_some_and(|at| now > at)
  }

  pub fn has_reached_limit(&self) -> bool {
    self
      .max_submissions
      .is_some_and(|max| self.submission_count >= max)
  }

  pub fn status(&self, now: DateTime<Utc>) -> LinkStatus {
    if !self.is_active {
      LinkStatus::Inactive
    } else if self.is_expired(now) {
      LinkStatus::Expired
    } else if self.has_reached_limit() {
      LinkStatus::AtLimit
    } else {
      LinkStatus::Valid
    }
  }

  pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
    self.status(now).is_valid()
  }

  pub fn record_access(&mut self) -> Result<()> {
    self.access_count = self
      .access_count
      .checked_add(1)
      .ok_or(Error::CounterOverflow(self.id))?;
    Ok(())
  }

  pub fn record_submission(&mut self) -> Result<()> {
    self.submission_count = self
      .submission_count
      .checked_add(1)
      .ok_or(Error::CounterOverflow(self.id))?;
    Ok(())
  }

  /// One-way transition; calling it again is a no-op.
  pub fn deactivate(&mut self) { self.is_active = false; }
}

// ─── NewLink ─────────────────────────────────────────────────────────────────

/// Input to [`crate::store::ParishStore::create_link`]. The token, creation
/// time and counters are assigned by the store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewLink {
  pub created_by:      String,
  pub expires_at:      Option<DateTime<Utc>>,
  pub description:     Option<String>,
  pub max_submissions: Option<u32>,
}

impl NewLink {
  /// Build the persisted form of this link with a fresh token.
  pub fn into_link(self, id: i64, now: DateTime<Utc>) -> SubmissionLink {
    SubmissionLink {
      id,
      token: generate_token(),
      created_by: self.created_by,
      created_at: now,
      expires_at: self.expires_at,
      is_active: true,
      access_count: 0,
      description: self.description,
      max_submissions: self.max_submissions,
      submission_count: 0,
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  fn link() -> SubmissionLink {
    NewLink {
      created_by: "priest@example.org".into(),
      ..NewLink::default()
    }
    .into_link(1, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
  }

  #[test]
  fn fresh_link_is_valid_with_zeroed_counters() {
    let l = link();
    assert!(l.is_active);
    assert_eq!(l.access_count, 0);
    assert_eq!(l.submission_count, 0);
    assert_eq!(l.token.len(), TOKEN_LEN);
    assert!(l.is_valid(Utc::now()));
  }

  #[test]
  fn tokens_are_unique() {
    assert_ne!(link().token, link().token);
  }

  #[test]
  fn null_expiry_never_expires() {
    let l = link();
    let far = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
    assert!(!l.is_expired(far));
    assert_eq!(l.status(far), LinkStatus::Valid);
  }

  #[test]
  fn expiry_is_strictly_after() {
    let mut l = link();
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    l.expires_at = Some(at);
    assert!(!l.is_expired(at));
    assert!(l.is_expired(at + Duration::seconds(1)));
    assert_eq!(l.status(at + Duration::seconds(1)), LinkStatus::Expired);
  }

  #[test]
  fn null_cap_never_reaches_limit() {
    let mut l = link();
    l.submission_count = u32::MAX;
    assert!(!l.has_reached_limit());
  }

  #[test]
  fn cap_is_reached_at_equality() {
    let mut l = link();
    l.max_submissions = Some(1);
    assert!(!l.has_reached_limit());
    l.record_submission().unwrap();
    assert!(l.has_reached_limit());
    assert_eq!(l.status(Utc::now()), LinkStatus::AtLimit);
  }

  #[test]
  fn inactive_takes_precedence_over_expired_and_limit() {
    let mut l = link();
    l.max_submissions = Some(0);
    l.expires_at = Some(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
    assert_eq!(l.status(Utc::now()), LinkStatus::Expired);
    l.deactivate();
    assert_eq!(l.status(Utc::now()), LinkStatus::Inactive);
  }

  #[test]
  fn deactivate_is_idempotent() {
    let mut once = link();
    once.deactivate();
    let mut twice = once.clone();
    twice.deactivate();
    assert_eq!(once, twice);
  }

  #[test]
  fn counters_refuse_to_overflow() {
    let mut l = link();
    l.access_count = u32::MAX;
    assert!(matches!(l.record_access(), Err(Error::CounterOverflow(1))));
    assert_eq!(l.access_count, u32::MAX);
  }

  #[test]
  fn token_prefix_is_eight_chars() {
    assert_eq!(token_prefix("0123456789abcdef"), "01234567");
    assert_eq!(token_prefix("abc"), "abc");
  }
}
