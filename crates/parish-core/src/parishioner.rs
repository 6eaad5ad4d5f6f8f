//! Parishioners and households: the live relational graph that approved
//! submissions are merged into.
//!
//! Relationships are stored as plain ids. Only the helpers in
//! [`crate::graph`] mutate them, so both sides of a spouse link always agree.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

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
pub enum MembershipStatus {
  /// Attending, no formal relationship yet.
  Visitor,
  Inquirer,
  /// Formally preparing for baptism or chrismation.
  Catechumen,
  Member,
  /// Reposed; kept for commemoration.
  Departed,
  Inactive,
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
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum MaritalStatus {
  Single,
  Married,
  Divorced,
  Widowed,
}

// ─── Household ───────────────────────────────────────────────────────────────

/// A loose grouping of parishioners sharing an address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
  pub id:           i64,
  /// e.g. "The Papadopoulos Family".
  pub family_name:  Option<String>,
  pub address:      Option<String>,
  pub city:         Option<String>,
  pub zip_code:     Option<String>,
  pub phone_number: Option<String>,
  pub email:        Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewHousehold {
  pub family_name:  Option<String>,
  pub address:      Option<String>,
  pub city:         Option<String>,
  pub zip_code:     Option<String>,
  pub phone_number: Option<String>,
  pub email:        Option<String>,
}

// ─── Parishioner ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parishioner {
  pub id:                 i64,
  pub first_name:         String,
  pub last_name:          String,
  pub name_suffix:        Option<String>,
  pub birthday:           Option<NaiveDate>,
  pub death_date:         Option<NaiveDate>,
  pub email:              Option<String>,
  pub phone_number:       Option<String>,
  pub status:             Option<MembershipStatus>,
  pub marital_status:     Option<MaritalStatus>,
  /// The crowning date.
  pub marriage_date:      Option<NaiveDate>,

  // ── Orthodox specifics ────────────────────────────────────────────────
  pub baptismal_name:     Option<String>,
  pub patron_saint:       Option<String>,
  pub baptism_date:       Option<NaiveDate>,
  pub chrismation_date:   Option<NaiveDate>,

  // ── Links ─────────────────────────────────────────────────────────────
  /// Symmetric: the spouse's `spouse_id` points back here.
  pub spouse_id:          Option<i64>,
  pub godfather_id:       Option<i64>,
  pub godmother_id:       Option<i64>,
  /// The koumbaros / koumbara.
  pub wedding_sponsor_id: Option<i64>,
  pub household_id:       Option<i64>,

  /// Derived from other parishioners' `godfather_id`; never stored.
  pub godchildren_as_godfather: Vec<i64>,
  /// Derived from other parishioners' `godmother_id`; never stored.
  pub godchildren_as_godmother: Vec<i64>,

  // ── Free-text names for people who are not (yet) records ──────────────
  pub manual_spouse_name:    Option<String>,
  pub manual_godfather_name: Option<String>,
  pub manual_godmother_name: Option<String>,
  pub manual_sponsor_name:   Option<String>,
}

impl Parishioner {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
      .trim()
      .to_owned()
  }
}

/// Input to `insert_parishioner`; the id is assigned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NewParishioner {
  pub first_name:         String,
  pub last_name:          String,
  pub name_suffix:        Option<String>,
  pub birthday:           Option<NaiveDate>,
  pub email:              Option<String>,
  pub phone_number:       Option<String>,
  pub status:             Option<MembershipStatus>,
  pub marital_status:     Option<MaritalStatus>,
  pub marriage_date:      Option<NaiveDate>,
  pub baptismal_name:     Option<String>,
  pub patron_saint:       Option<String>,
  pub baptism_date:       Option<NaiveDate>,
  pub chrismation_date:   Option<NaiveDate>,
  pub household_id:       Option<i64>,
  pub manual_spouse_name:    Option<String>,
  pub manual_godfather_name: Option<String>,
  pub manual_godmother_name: Option<String>,
  pub manual_sponsor_name:   Option<String>,
}

impl NewParishioner {
  pub fn named(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
    Self {
      first_name: first_name.into(),
      last_name: last_name.into(),
      ..Self::default()
    }
  }

  /// Materialise with a store-assigned id. Links other than the household
  /// start empty; they are only ever set through [`crate::graph`].
  pub fn into_parishioner(self, id: i64) -> Parishioner {
    Parishioner {
      id,
      first_name: self.first_name,
      last_name: self.last_name,
      name_suffix: self.name_suffix,
      birthday: self.birthday,
      death_date: None,
      email: self.email,
      phone_number: self.phone_number,
      status: self.status,
      marital_status: self.marital_status,
      marriage_date: self.marriage_date,
      baptismal_name: self.baptismal_name,
      patron_saint: self.patron_saint,
      baptism_date: self.baptism_date,
      chrismation_date: self.chrismation_date,
      household_id: self.household_id,
      manual_spouse_name: self.manual_spouse_name,
      manual_godfather_name: self.manual_godfather_name,
      manual_godmother_name: self.manual_godmother_name,
      manual_sponsor_name: self.manual_sponsor_name,
      ..Parishioner::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr as _;

  use super::*;

  #[test]
  fn statuses_parse_case_insensitively() {
    assert_eq!(
      MembershipStatus::from_str("catechumen").unwrap(),
      MembershipStatus::Catechumen
    );
    assert_eq!(MaritalStatus::from_str("WIDOWED").unwrap(), MaritalStatus::Widowed);
    assert!(MaritalStatus::from_str("engaged").is_err());
  }

  #[test]
  fn statuses_render_screaming_snake() {
    assert_eq!(MembershipStatus::Departed.to_string(), "DEPARTED");
    let s: &'static str = MaritalStatus::Married.into();
    assert_eq!(s, "MARRIED");
  }

  #[test]
  fn into_parishioner_starts_unlinked() {
    let mut input = NewParishioner::named("Maria", "Pappas");
    input.household_id = Some(4);
    let p = input.into_parishioner(9);
    assert_eq!(p.id, 9);
    assert_eq!(p.household_id, Some(4));
    assert!(p.spouse_id.is_none());
    assert!(p.godchildren_as_godfather.is_empty());
    assert_eq!(p.full_name(), "Maria Pappas");
  }
}
