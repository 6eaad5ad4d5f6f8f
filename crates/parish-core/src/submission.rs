//! Submission records: visitor-entered data staged for review.
//!
//! A submission is a denormalised snapshot. It does not reference the live
//! parishioner graph except through `target_parishioner_id` (UPDATE type,
//! set at review time) and `pending_spouse_submission_id` (deferred marriage
//! linking between two submissions).

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
  Error, Result,
  parishioner::{MaritalStatus, MembershipStatus},
};

// ─── Enumerations ────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum SubmissionType {
  /// Create a new parishioner.
  New,
  /// Amend an existing parishioner.
  Update,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum SubmissionStatus {
  Pending,
  Approved,
  Rejected,
}

impl SubmissionStatus {
  /// Approved and rejected are terminal.
  pub fn is_terminal(self) -> bool { self != Self::Pending }
}

// ─── Children ────────────────────────────────────────────────────────────────

/// One entry of the children list as the visitor typed it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildEntry {
  /// Free text, usually "First Last".
  pub name:     Option<String>,
  pub birthday: Option<NaiveDate>,
}

impl ChildEntry {
  /// Split the name on the first run of whitespace. A single word takes
  /// `fallback_last` as the last name. Returns `None` for a blank name.
  pub fn split_name(&self, fallback_last: &str) -> Option<(String, String)> {
    let name = self.name.as_deref()?.trim();
    let mut parts = name.splitn(2, char::is_whitespace);
    let first = parts.next().filter(|s| !s.is_empty())?;
    let last = parts
      .next()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .unwrap_or(fallback_last);
    Some((first.to_owned(), last.to_owned()))
  }
}

// ─── Data ────────────────────────────────────────────────────────────────────

/// Everything the visitor entered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionData {
  pub first_name:        String,
  pub last_name:         String,
  pub name_suffix:       Option<String>,
  pub birthday:          Option<NaiveDate>,
  pub email:             Option<String>,
  pub phone_number:      Option<String>,
  pub membership_status: Option<MembershipStatus>,
  pub marital_status:    Option<MaritalStatus>,
  pub marriage_date:     Option<NaiveDate>,

  // ── Orthodox block; ignored unless `is_orthodox` ──────────────────────
  pub is_orthodox:      bool,
  pub baptismal_name:   Option<String>,
  pub patron_saint:     Option<String>,
  pub baptism_date:     Option<NaiveDate>,
  pub chrismation_date: Option<NaiveDate>,

  // ── Relationships by free-text name ───────────────────────────────────
  pub manual_spouse_name:    Option<String>,
  pub manual_godfather_name: Option<String>,
  pub manual_godmother_name: Option<String>,
  pub manual_sponsor_name:   Option<String>,

  // ── Inline spouse record ──────────────────────────────────────────────
  pub spouse_first_name:   Option<String>,
  pub spouse_last_name:    Option<String>,
  pub spouse_email:        Option<String>,
  pub spouse_phone_number: Option<String>,

  // ── Address ───────────────────────────────────────────────────────────
  pub address:  Option<String>,
  pub city:     Option<String>,
  pub zip_code: Option<String>,

  /// JSON array of [`ChildEntry`]. Read through [`Self::children`].
  pub children_json: Option<String>,
}

impl SubmissionData {
  /// Decode the children list. Malformed JSON yields an empty list rather
  /// than an error so a corrupted row never blocks review.
  pub fn children(&self) -> Vec<ChildEntry> {
    let Some(json) = self.children_json.as_deref().filter(|s| !s.is_empty())
    else {
      return Vec::new();
    };
    match serde_json::from_str(json) {
      Ok(children) => children,
      Err(e) => {
        tracing::debug!(error = %e, "discarding unparseable children list");
        Vec::new()
      }
    }
  }

  pub fn set_children(&mut self, children: &[ChildEntry]) -> Result<()> {
    self.children_json = if children.is_empty() {
      None
    } else {
      Some(serde_json::to_string(children)?)
    };
    Ok(())
  }

  pub fn has_address(&self) -> bool {
    [&self.address, &self.city, &self.zip_code]
      .into_iter()
      .any(|f| f.as_deref().is_some_and(|s| !s.trim().is_empty()))
  }

  pub fn has_inline_spouse(&self) -> bool {
    [&self.spouse_first_name, &self.spouse_last_name]
      .into_iter()
      .any(|f| f.as_deref().is_some_and(|s| !s.is_empty()))
  }
}

// ─── Submission ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
  pub id:                           i64,
  /// The link the submission arrived through.
  pub link_id:                      i64,
  pub submission_type:              SubmissionType,
  pub status:                       SubmissionStatus,
  pub submitted_at:                 DateTime<Utc>,
  pub reviewed_at:                  Option<DateTime<Utc>>,
  pub reviewed_by:                  Option<String>,
  pub review_notes:                 Option<String>,
  pub target_parishioner_id:        Option<i64>,
  pub pending_spouse_submission_id: Option<i64>,
  #[serde(flatten)]
  pub data:                         SubmissionData,
}

impl Submission {
  /// Fail with [`Error::AlreadyProcessed`] unless still pending.
  pub fn ensure_pending(&self) -> Result<()> {
    if self.status.is_terminal() {
      return Err(Error::AlreadyProcessed {
        id:     self.id,
        status: self.status,
      });
    }
    Ok(())
  }

  /// Terminal transition. Callers check [`Self::ensure_pending`] first.
  pub fn mark_reviewed(
    &mut self,
    status: SubmissionStatus,
    reviewer: &str,
    now: DateTime<Utc>,
  ) {
    self.status = status;
    self.reviewed_by = Some(reviewer.to_owned());
    self.reviewed_at = Some(now);
  }
}

/// A screened public submission ready to be persisted as PENDING.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
  pub submission_type: SubmissionType,
  pub data:            SubmissionData,
}

impl NewSubmission {
  pub fn into_submission(
    self,
    id: i64,
    link_id: i64,
    now: DateTime<Utc>,
  ) -> Submission {
    Submission {
      id,
      link_id,
      submission_type: self.submission_type,
      status: SubmissionStatus::Pending,
      submitted_at: now,
      reviewed_at: None,
      reviewed_by: None,
      review_notes: None,
      target_parishioner_id: None,
      pending_spouse_submission_id: None,
      data: self.data,
    }
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[A-Za-z0-9+_.-]+@(.+)$").expect("static regex is valid")
});

/// Required-field and shape checks. UPDATE submissions do not need a target
/// here; that is assigned during review.
pub fn validate(data: &SubmissionData) -> Vec<String> {
  let mut errors = Vec::new();
  if data.first_name.trim().is_empty() {
    errors.push("First name is required".to_owned());
  }
  if data.last_name.trim().is_empty() {
    errors.push("Last name is required".to_owned());
  }
  if let Some(email) = data.email.as_deref().filter(|e| !e.is_empty())
    && !EMAIL_SHAPE.is_match(email)
  {
    errors.push("Invalid email format".to_owned());
  }
  errors
}

/// Chronological sanity checks run at approval time. The first violation
/// aborts.
pub fn validate_dates(data: &SubmissionData, today: NaiveDate) -> Result<()> {
  let fail = |msg: &str| Err(Error::Validation(msg.to_owned()));

  if data.birthday.is_some_and(|b| b > today) {
    return fail("Birthday cannot be in the future");
  }
  if let (Some(married), Some(born)) = (data.marriage_date, data.birthday)
    && married < born
  {
    return fail("Marriage date cannot be before birth date");
  }
  if data.marriage_date.is_some_and(|m| m > today) {
    return fail("Marriage date cannot be in the future");
  }
  // The Orthodox block is only ever copied when flagged.
  if !data.is_orthodox {
    return Ok(());
  }
  if let (Some(baptised), Some(born)) = (data.baptism_date, data.birthday)
    && baptised < born
  {
    return fail("Baptism date cannot be before birth date");
  }
  if let (Some(chrismated), Some(baptised)) =
    (data.chrismation_date, data.baptism_date)
    && chrismated < baptised
  {
    return fail("Chrismation date cannot be before baptism date");
  }
  Ok(())
}

// ─── Reviewer edits ──────────────────────────────────────────────────────────

/// Corrections a reviewer makes before approving. `Some("")` clears an
/// optional field; `None` leaves it as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SubmissionEdits {
  pub first_name:            Option<String>,
  pub last_name:             Option<String>,
  pub name_suffix:           Option<String>,
  pub birthday:              Option<NaiveDate>,
  pub email:                 Option<String>,
  pub phone_number:          Option<String>,
  pub membership_status:     Option<MembershipStatus>,
  pub marital_status:        Option<MaritalStatus>,
  pub marriage_date:         Option<NaiveDate>,
  pub is_orthodox:           Option<bool>,
  pub baptismal_name:        Option<String>,
  pub patron_saint:          Option<String>,
  pub baptism_date:          Option<NaiveDate>,
  pub chrismation_date:      Option<NaiveDate>,
  pub manual_spouse_name:    Option<String>,
  pub manual_godfather_name: Option<String>,
  pub manual_godmother_name: Option<String>,
  pub manual_sponsor_name:   Option<String>,
  pub address:               Option<String>,
  pub city:                  Option<String>,
  pub zip_code:              Option<String>,
}

fn edit_text(slot: &mut Option<String>, edit: Option<String>) {
  if let Some(value) = edit {
    let value = value.trim();
    *slot = (!value.is_empty()).then(|| value.to_owned());
  }
}

fn edit_value<T>(slot: &mut Option<T>, edit: Option<T>) {
  if edit.is_some() {
    *slot = edit;
  }
}

impl SubmissionEdits {
  pub fn is_empty(&self) -> bool { *self == Self::default() }

  pub fn apply(self, data: &mut SubmissionData) {
    if let Some(first) = self.first_name {
      data.first_name = first.trim().to_owned();
    }
    if let Some(last) = self.last_name {
      data.last_name = last.trim().to_owned();
    }
    if let Some(orthodox) = self.is_orthodox {
      data.is_orthodox = orthodox;
    }
    edit_text(&mut data.name_suffix, self.name_suffix);
    edit_text(&mut data.email, self.email);
    edit_text(&mut data.phone_number, self.phone_number);
    edit_text(&mut data.baptismal_name, self.baptismal_name);
    edit_text(&mut data.patron_saint, self.patron_saint);
    edit_text(&mut data.manual_spouse_name, self.manual_spouse_name);
    edit_text(&mut data.manual_godfather_name, self.manual_godfather_name);
    edit_text(&mut data.manual_godmother_name, self.manual_godmother_name);
    edit_text(&mut data.manual_sponsor_name, self.manual_sponsor_name);
    edit_text(&mut data.address, self.address);
    edit_text(&mut data.city, self.city);
    edit_text(&mut data.zip_code, self.zip_code);
    edit_value(&mut data.birthday, self.birthday);
    edit_value(&mut data.membership_status, self.membership_status);
    edit_value(&mut data.marital_status, self.marital_status);
    edit_value(&mut data.marriage_date, self.marriage_date);
    edit_value(&mut data.baptism_date, self.baptism_date);
    edit_value(&mut data.chrismation_date, self.chrismation_date);
  }
}

// ─── Update allowlist ────────────────────────────────────────────────────────

/// A field an UPDATE approval may write to the target parishioner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionField {
  FirstName,
  LastName,
  NameSuffix,
  Birthday,
  Email,
  PhoneNumber,
  MembershipStatus,
  MaritalStatus,
  MarriageDate,
  BaptismalName,
  PatronSaint,
  BaptismDate,
  ChrismationDate,
  ManualSpouseName,
  ManualGodfatherName,
  ManualGodmotherName,
  ManualSponsorName,
  Address,
  City,
  ZipCode,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn data(first: &str, last: &str) -> SubmissionData {
    SubmissionData {
      first_name: first.into(),
      last_name: last.into(),
      ..SubmissionData::default()
    }
  }

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn blank_first_name_is_reported() {
    let errors = validate(&data("   ", "Pappas"));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("First name"));
  }

  #[test]
  fn email_must_have_local_and_domain() {
    let mut d = data("Anna", "Pappas");
    d.email = Some("anna.example.org".into());
    assert_eq!(validate(&d), vec!["Invalid email format".to_owned()]);
    d.email = Some("anna@example.org".into());
    assert!(validate(&d).is_empty());
    d.email = Some(String::new());
    assert!(validate(&d).is_empty());
  }

  #[test]
  fn children_round_trip_through_json() {
    let mut d = data("Anna", "Pappas");
    let kids = vec![ChildEntry {
      name:     Some("Nikolas Pappas".into()),
      birthday: Some(date(2015, 3, 2)),
    }];
    d.set_children(&kids).unwrap();
    assert_eq!(d.children(), kids);
  }

  #[test]
  fn malformed_children_json_degrades_to_empty() {
    let mut d = data("Anna", "Pappas");
    d.children_json = Some("[{not json".into());
    assert!(d.children().is_empty());
  }

  #[test]
  fn child_name_splits_on_first_whitespace() {
    let child = |n: &str| ChildEntry {
      name:     Some(n.into()),
      birthday: None,
    };
    assert_eq!(
      child("  Mary Ann  Smith ").split_name("Pappas"),
      Some(("Mary".into(), "Ann  Smith".into()))
    );
    assert_eq!(
      child("Eleni").split_name("Pappas"),
      Some(("Eleni".into(), "Pappas".into()))
    );
    assert_eq!(child("   ").split_name("Pappas"), None);
  }

  #[test]
  fn date_checks_run_in_order() {
    let today = date(2024, 6, 1);
    let mut d = data("Anna", "Pappas");
    d.birthday = Some(date(2030, 1, 1));
    assert_eq!(
      validate_dates(&d, today).unwrap_err().to_string(),
      "Birthday cannot be in the future"
    );

    d.birthday = Some(date(1990, 1, 1));
    d.marriage_date = Some(date(1980, 1, 1));
    assert_eq!(
      validate_dates(&d, today).unwrap_err().to_string(),
      "Marriage date cannot be before birth date"
    );

    d.marriage_date = None;
    d.is_orthodox = true;
    d.baptism_date = Some(date(1995, 1, 1));
    d.chrismation_date = Some(date(1994, 1, 1));
    assert_eq!(
      validate_dates(&d, today).unwrap_err().to_string(),
      "Chrismation date cannot be before baptism date"
    );

    d.chrismation_date = Some(date(1995, 1, 1));
    assert!(validate_dates(&d, today).is_ok());
  }

  #[test]
  fn sacrament_dates_are_ignored_unless_orthodox() {
    let today = date(2024, 6, 1);
    let mut d = data("Anna", "Pappas");
    d.birthday = Some(date(1990, 1, 1));
    d.baptism_date = Some(date(1985, 1, 1));
    d.chrismation_date = Some(date(1980, 1, 1));
    assert!(validate_dates(&d, today).is_ok());

    d.is_orthodox = true;
    assert_eq!(
      validate_dates(&d, today).unwrap_err().to_string(),
      "Baptism date cannot be before birth date"
    );
  }

  #[test]
  fn edits_overwrite_and_clear() {
    let mut d = data("Ana", "Papas");
    d.city = Some("Boston".into());
    SubmissionEdits {
      first_name: Some(" Anna ".into()),
      city: Some(String::new()),
      ..SubmissionEdits::default()
    }
    .apply(&mut d);
    assert_eq!(d.first_name, "Anna");
    assert_eq!(d.last_name, "Papas");
    assert_eq!(d.city, None);
  }

  #[test]
  fn reviewed_submission_is_not_pending() {
    let mut s = NewSubmission {
      submission_type: SubmissionType::New,
      data:            data("Anna", "Pappas"),
    }
    .into_submission(3, 1, Utc::now());
    assert!(s.ensure_pending().is_ok());
    s.mark_reviewed(SubmissionStatus::Rejected, "priest@example.org", Utc::now());
    assert!(matches!(
      s.ensure_pending(),
      Err(Error::AlreadyProcessed {
        id:     3,
        status: SubmissionStatus::Rejected,
      })
    ));
  }
}
