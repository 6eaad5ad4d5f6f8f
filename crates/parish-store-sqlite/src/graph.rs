//! [`TxGraph`]: the [`GraphTx`] view of one open SQLite transaction.

use rusqlite::{Connection, params};

use parish_core::{
  parishioner::{Household, NewHousehold, NewParishioner, Parishioner},
  store::GraphTx,
  submission::{Submission, SubmissionStatus},
};

use crate::{
  Error, Result,
  encode::encode_enum,
  queries,
};

pub struct TxGraph<'c>(pub &'c Connection);

impl GraphTx for TxGraph<'_> {
  type Error = Error;

  fn submission(&mut self, id: i64) -> Result<Option<Submission>> {
    queries::submission_by_id(self.0, id)
  }

  fn approved_waiting_on(&mut self, id: i64) -> Result<Vec<Submission>> {
    queries::submissions_where(
      self.0,
      "WHERE pending_spouse_submission_id = ?1 AND status = ?2
        ORDER BY submission_id",
      params![id, encode_enum(SubmissionStatus::Approved)],
    )
  }

  fn save_submission(&mut self, submission: &Submission) -> Result<()> {
    queries::update_submission(self.0, submission)
  }

  fn parishioner(&mut self, id: i64) -> Result<Option<Parishioner>> {
    queries::parishioner_by_id(self.0, id)
  }

  fn insert_parishioner(&mut self, input: NewParishioner) -> Result<Parishioner> {
    queries::insert_parishioner(self.0, input)
  }

  fn save_parishioner(&mut self, parishioner: &Parishioner) -> Result<()> {
    queries::update_parishioner(self.0, parishioner)
  }

  fn household(&mut self, id: i64) -> Result<Option<Household>> {
    queries::household_by_id(self.0, id)
  }

  fn insert_household(&mut self, input: NewHousehold) -> Result<Household> {
    queries::insert_household(self.0, input)
  }

  fn save_household(&mut self, household: &Household) -> Result<()> {
    queries::update_household(self.0, household)
  }
}
