//! An in-memory `GraphTx` for unit tests.

use std::collections::BTreeMap;

use crate::{
  Error,
  parishioner::{Household, NewHousehold, NewParishioner, Parishioner},
  store::GraphTx,
  submission::{Submission, SubmissionStatus},
};

#[derive(Debug, Default)]
pub struct MemoryGraph {
  pub parishioners: BTreeMap<i64, Parishioner>,
  pub households:   BTreeMap<i64, Household>,
  pub submissions:  BTreeMap<i64, Submission>,
  last_id:          i64,
}

impl MemoryGraph {
  pub fn next_id(&mut self) -> i64 {
    self.last_id += 1;
    self.last_id
  }

  pub fn add(&mut self, p: Parishioner) -> i64 {
    let id = p.id;
    self.last_id = self.last_id.max(id);
    self.parishioners.insert(id, p);
    id
  }

  pub fn put_submission(&mut self, s: Submission) {
    self.last_id = self.last_id.max(s.id);
    self.submissions.insert(s.id, s);
  }

  /// A parishioner with its derived godchildren lists.
  pub fn get(&self, id: i64) -> Parishioner {
    self.derived(id).expect("parishioner exists")
  }

  fn derived(&self, id: i64) -> Option<Parishioner> {
    let mut p = self.parishioners.get(&id)?.clone();
    let others = self.parishioners.values();
    p.godchildren_as_godfather = others
      .clone()
      .filter(|c| c.godfather_id == Some(id))
      .map(|c| c.id)
      .collect();
    p.godchildren_as_godmother = others
      .filter(|c| c.godmother_id == Some(id))
      .map(|c| c.id)
      .collect();
    Some(p)
  }
}

impl GraphTx for MemoryGraph {
  type Error = Error;

  fn submission(&mut self, id: i64) -> Result<Option<Submission>, Error> {
    Ok(self.submissions.get(&id).cloned())
  }

  fn approved_waiting_on(&mut self, id: i64) -> Result<Vec<Submission>, Error> {
    Ok(
      self
        .submissions
        .values()
        .filter(|s| {
          s.status == SubmissionStatus::Approved
            && s.pending_spouse_submission_id == Some(id)
        })
        .cloned()
        .collect(),
    )
  }

  fn save_submission(&mut self, submission: &Submission) -> Result<(), Error> {
    self.submissions.insert(submission.id, submission.clone());
    Ok(())
  }

  fn parishioner(&mut self, id: i64) -> Result<Option<Parishioner>, Error> {
    Ok(self.derived(id))
  }

  fn insert_parishioner(
    &mut self,
    input: NewParishioner,
  ) -> Result<Parishioner, Error> {
    let p = input.into_parishioner(self.next_id());
    self.parishioners.insert(p.id, p.clone());
    Ok(p)
  }

  fn save_parishioner(&mut self, parishioner: &Parishioner) -> Result<(), Error> {
    let mut stored = parishioner.clone();
    stored.godchildren_as_godfather.clear();
    stored.godchildren_as_godmother.clear();
    self.parishioners.insert(stored.id, stored);
    Ok(())
  }

  fn household(&mut self, id: i64) -> Result<Option<Household>, Error> {
    Ok(self.households.get(&id).cloned())
  }

  fn insert_household(&mut self, input: NewHousehold) -> Result<Household, Error> {
    let h = Household {
      id:           self.next_id(),
      family_name:  input.family_name,
      address:      input.address,
      city:         input.city,
      zip_code:     input.zip_code,
      phone_number: input.phone_number,
      email:        input.email,
    };
    self.households.insert(h.id, h.clone());
    Ok(h)
  }

  fn save_household(&mut self, household: &Household) -> Result<(), Error> {
    self.households.insert(household.id, household.clone());
    Ok(())
  }
}
