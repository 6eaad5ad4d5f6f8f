//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 UTC strings with fixed microsecond precision, so
//! they sort lexically. Dates are `YYYY-MM-DD`. Enums use their
//! SCREAMING_SNAKE_CASE names.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use parish_core::{
  link::SubmissionLink,
  parishioner::{Household, Parishioner},
  submission::{Submission, SubmissionData},
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

fn opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
  s.as_deref().map(decode_date).transpose()
}

/// Any strum enum with `IntoStaticStr`.
pub fn encode_enum<E: Into<&'static str>>(e: E) -> &'static str { e.into() }

pub fn decode_enum<E: FromStr>(column: &'static str, s: &str) -> Result<E> {
  E::from_str(s).map_err(|_| Error::UnknownValue {
    column,
    value: s.to_owned(),
  })
}

fn opt_enum<E: FromStr>(
  column: &'static str,
  s: Option<String>,
) -> Result<Option<E>> {
  s.as_deref().map(|s| decode_enum(column, s)).transpose()
}

fn count(n: i64) -> u32 { u32::try_from(n).unwrap_or(u32::MAX) }

// ─── Links ───────────────────────────────────────────────────────────────────

pub const LINK_COLUMNS: &str = "link_id, token, created_by, created_at, \
  expires_at, is_active, access_count, description, max_submissions, \
  submission_count";

/// Raw values read directly from a `submission_links` row.
pub struct RawLink {
  pub link_id:          i64,
  pub token:            String,
  pub created_by:       String,
  pub created_at:       String,
  pub expires_at:       Option<String>,
  pub is_active:        bool,
  pub access_count:     i64,
  pub description:      Option<String>,
  pub max_submissions:  Option<i64>,
  pub submission_count: i64,
}

impl RawLink {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      link_id:          row.get(0)?,
      token:            row.get(1)?,
      created_by:       row.get(2)?,
      created_at:       row.get(3)?,
      expires_at:       row.get(4)?,
      is_active:        row.get(5)?,
      access_count:     row.get(6)?,
      description:      row.get(7)?,
      max_submissions:  row.get(8)?,
      submission_count: row.get(9)?,
    })
  }

  pub fn into_link(self) -> Result<SubmissionLink> {
    Ok(SubmissionLink {
      id:               self.link_id,
      token:            self.token,
      created_by:       self.created_by,
      created_at:       decode_dt(&self.created_at)?,
      expires_at:       opt_dt(self.expires_at)?,
      is_active:        self.is_active,
      access_count:     count(self.access_count),
      description:      self.description,
      max_submissions:  self.max_submissions.map(count),
      submission_count: count(self.submission_count),
    })
  }
}

// ─── Households ──────────────────────────────────────────────────────────────

pub const HOUSEHOLD_COLUMNS: &str =
  "household_id, family_name, address, city, zip_code, phone_number, email";

pub fn household_from_row(row: &Row<'_>) -> rusqlite::Result<Household> {
  Ok(Household {
    id:           row.get(0)?,
    family_name:  row.get(1)?,
    address:      row.get(2)?,
    city:         row.get(3)?,
    zip_code:     row.get(4)?,
    phone_number: row.get(5)?,
    email:        row.get(6)?,
  })
}

// ─── Parishioners ────────────────────────────────────────────────────────────

pub const PARISHIONER_COLUMNS: &str = "parishioner_id, first_name, last_name, \
  name_suffix, birthday, death_date, email, phone_number, status, \
  marital_status, marriage_date, baptismal_name, patron_saint, baptism_date, \
  chrismation_date, spouse_id, godfather_id, godmother_id, \
  wedding_sponsor_id, household_id, manual_spouse_name, \
  manual_godfather_name, manual_godmother_name, manual_sponsor_name";

/// Raw values read directly from a `parishioners` row.
pub struct RawParishioner {
  pub id:                    i64,
  pub first_name:            String,
  pub last_name:             String,
  pub name_suffix:           Option<String>,
  pub birthday:              Option<String>,
  pub death_date:            Option<String>,
  pub email:                 Option<String>,
  pub phone_number:          Option<String>,
  pub status:                Option<String>,
  pub marital_status:        Option<String>,
  pub marriage_date:         Option<String>,
  pub baptismal_name:        Option<String>,
  pub patron_saint:          Option<String>,
  pub baptism_date:          Option<String>,
  pub chrismation_date:      Option<String>,
  pub spouse_id:             Option<i64>,
  pub godfather_id:          Option<i64>,
  pub godmother_id:          Option<i64>,
  pub wedding_sponsor_id:    Option<i64>,
  pub household_id:          Option<i64>,
  pub manual_spouse_name:    Option<String>,
  pub manual_godfather_name: Option<String>,
  pub manual_godmother_name: Option<String>,
  pub manual_sponsor_name:   Option<String>,
}

impl RawParishioner {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                    row.get(0)?,
      first_name:            row.get(1)?,
      last_name:             row.get(2)?,
      name_suffix:           row.get(3)?,
      birthday:              row.get(4)?,
      death_date:            row.get(5)?,
      email:                 row.get(6)?,
      phone_number:          row.get(7)?,
      status:                row.get(8)?,
      marital_status:        row.get(9)?,
      marriage_date:         row.get(10)?,
      baptismal_name:        row.get(11)?,
      patron_saint:          row.get(12)?,
      baptism_date:          row.get(13)?,
      chrismation_date:      row.get(14)?,
      spouse_id:             row.get(15)?,
      godfather_id:          row.get(16)?,
      godmother_id:          row.get(17)?,
      wedding_sponsor_id:    row.get(18)?,
      household_id:          row.get(19)?,
      manual_spouse_name:    row.get(20)?,
      manual_godfather_name: row.get(21)?,
      manual_godmother_name: row.get(22)?,
      manual_sponsor_name:   row.get(23)?,
    })
  }

  /// Derived godchildren lists are left empty; the caller fills them.
  pub fn into_parishioner(self) -> Result<Parishioner> {
    Ok(Parishioner {
      id:                       self.id,
      first_name:               self.first_name,
      last_name:                self.last_name,
      name_suffix:              self.name_suffix,
      birthday:                 opt_date(self.birthday)?,
      death_date:               opt_date(self.death_date)?,
      email:                    self.email,
      phone_number:             self.phone_number,
      status:                   opt_enum("status", self.status)?,
      marital_status:           opt_enum("marital_status", self.marital_status)?,
      marriage_date:            opt_date(self.marriage_date)?,
      baptismal_name:           self.baptismal_name,
      patron_saint:             self.patron_saint,
      baptism_date:             opt_date(self.baptism_date)?,
      chrismation_date:         opt_date(self.chrismation_date)?,
      spouse_id:                self.spouse_id,
      godfather_id:             self.godfather_id,
      godmother_id:             self.godmother_id,
      wedding_sponsor_id:       self.wedding_sponsor_id,
      household_id:             self.household_id,
      godchildren_as_godfather: Vec::new(),
      godchildren_as_godmother: Vec::new(),
      manual_spouse_name:       self.manual_spouse_name,
      manual_godfather_name:    self.manual_godfather_name,
      manual_godmother_name:    self.manual_godmother_name,
      manual_sponsor_name:      self.manual_sponsor_name,
    })
  }
}

// ─── Submissions ─────────────────────────────────────────────────────────────

pub const SUBMISSION_COLUMNS: &str = "submission_id, link_id, \
  submission_type, status, submitted_at, reviewed_at, reviewed_by, \
  review_notes, target_parishioner_id, pending_spouse_submission_id, \
  data_json";

/// Raw values read directly from a `submissions` row.
pub struct RawSubmission {
  pub id:                           i64,
  pub link_id:                      i64,
  pub submission_type:              String,
  pub status:                       String,
  pub submitted_at:                 String,
  pub reviewed_at:                  Option<String>,
  pub reviewed_by:                  Option<String>,
  pub review_notes:                 Option<String>,
  pub target_parishioner_id:        Option<i64>,
  pub pending_spouse_submission_id: Option<i64>,
  pub data_json:                    String,
}

impl RawSubmission {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                           row.get(0)?,
      link_id:                      row.get(1)?,
      submission_type:              row.get(2)?,
      status:                       row.get(3)?,
      submitted_at:                 row.get(4)?,
      reviewed_at:                  row.get(5)?,
      reviewed_by:                  row.get(6)?,
      review_notes:                 row.get(7)?,
      target_parishioner_id:        row.get(8)?,
      pending_spouse_submission_id: row.get(9)?,
      data_json:                    row.get(10)?,
    })
  }

  pub fn into_submission(self) -> Result<Submission> {
    let data: SubmissionData = serde_json::from_str(&self.data_json)?;
    Ok(Submission {
      id: self.id,
      link_id: self.link_id,
      submission_type: decode_enum("submission_type", &self.submission_type)?,
      status: decode_enum("status", &self.status)?,
      submitted_at: decode_dt(&self.submitted_at)?,
      reviewed_at: opt_dt(self.reviewed_at)?,
      reviewed_by: self.reviewed_by,
      review_notes: self.review_notes,
      target_parishioner_id: self.target_parishioner_id,
      pending_spouse_submission_id: self.pending_spouse_submission_id,
      data,
    })
  }
}
