//! The `ParishStore` trait and the synchronous `GraphTx` seam.
//!
//! `ParishStore` is implemented by storage backends (e.g.
//! `parish-store-sqlite`); the HTTP layer depends only on this abstraction.
//! `GraphTx` is the view of one open transaction that the approval engine
//! and the relationship helpers run against, so the engine itself stays free
//! of any database dependency.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  AsDomainError, Error,
  link::{NewLink, SubmissionLink},
  parishioner::{Household, NewHousehold, NewParishioner, Parishioner},
  review::{Approval, ApprovalRequest},
  submission::{
    NewSubmission, Submission, SubmissionEdits, SubmissionStatus,
  },
};

// ─── Transaction view ────────────────────────────────────────────────────────

/// Reads and writes inside one atomic unit of work. Every method either
/// succeeds or the whole enclosing transaction is rolled back by the caller.
pub trait GraphTx {
  type Error: From<Error>;

  fn submission(&mut self, id: i64) -> Result<Option<Submission>, Self::Error>;

  /// APPROVED submissions whose `pending_spouse_submission_id` is `id`,
  /// oldest first.
  fn approved_waiting_on(
    &mut self,
    id: i64,
  ) -> Result<Vec<Submission>, Self::Error>;

  fn save_submission(&mut self, submission: &Submission)
  -> Result<(), Self::Error>;

  /// Loads a parishioner with its derived godchildren lists filled in.
  fn parishioner(&mut self, id: i64)
  -> Result<Option<Parishioner>, Self::Error>;

  fn insert_parishioner(
    &mut self,
    input: NewParishioner,
  ) -> Result<Parishioner, Self::Error>;

  /// Writes every stored column. Derived lists are ignored.
  fn save_parishioner(
    &mut self,
    parishioner: &Parishioner,
  ) -> Result<(), Self::Error>;

  fn household(&mut self, id: i64) -> Result<Option<Household>, Self::Error>;

  fn insert_household(
    &mut self,
    input: NewHousehold,
  ) -> Result<Household, Self::Error>;

  fn save_household(&mut self, household: &Household)
  -> Result<(), Self::Error>;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a parish store backend.
///
/// Every multi-row write runs in a single transaction. All methods return
/// `Send` futures so the trait can be used behind `axum`.
pub trait ParishStore: Send + Sync {
  type Error: std::error::Error + AsDomainError + Send + Sync + 'static;

  // ── Links ─────────────────────────────────────────────────────────────

  /// Persist a new active link with a fresh random token.
  fn create_link(
    &self,
    input: NewLink,
  ) -> impl Future<Output = Result<SubmissionLink, Self::Error>> + Send + '_;

  /// Returns `None` for an unknown token.
  fn link_by_token<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<Option<SubmissionLink>, Self::Error>> + Send + 'a;

  fn link(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<SubmissionLink>, Self::Error>> + Send + '_;

  /// Links created by `creator`, newest first.
  fn links_by_creator<'a>(
    &'a self,
    creator: &'a str,
  ) -> impl Future<Output = Result<Vec<SubmissionLink>, Self::Error>> + Send + 'a;

  fn active_links(
    &self,
  ) -> impl Future<Output = Result<Vec<SubmissionLink>, Self::Error>> + Send + '_;

  /// Increment the access counter for a form view.
  fn record_link_access(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<SubmissionLink, Self::Error>> + Send + '_;

  /// Idempotent.
  fn deactivate_link(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<SubmissionLink, Self::Error>> + Send + '_;

  // ── Submissions ───────────────────────────────────────────────────────

  /// Persist a PENDING submission and bump the link's submission counter in
  /// one transaction. The link status is re-checked inside the transaction;
  /// an unusable link fails with [`Error::LinkUnavailable`].
  fn create_submission(
    &self,
    link_id: i64,
    input: NewSubmission,
  ) -> impl Future<Output = Result<Submission, Self::Error>> + Send + '_;

  fn submission(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Submission>, Self::Error>> + Send + '_;

  /// Newest first.
  fn submissions_by_status(
    &self,
    status: SubmissionStatus,
  ) -> impl Future<Output = Result<Vec<Submission>, Self::Error>> + Send + '_;

  /// Newest first.
  fn submissions_for_link(
    &self,
    link_id: i64,
  ) -> impl Future<Output = Result<Vec<Submission>, Self::Error>> + Send + '_;

  fn pending_count(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Point a pending submission at an existing parishioner.
  fn assign_target(
    &self,
    id: i64,
    parishioner_id: i64,
  ) -> impl Future<Output = Result<Submission, Self::Error>> + Send + '_;

  /// Run [`crate::review::approve`] inside one transaction.
  fn approve_submission(
    &self,
    id: i64,
    reviewer: String,
    edits: SubmissionEdits,
    request: ApprovalRequest,
  ) -> impl Future<Output = Result<Approval, Self::Error>> + Send + '_;

  /// Run [`crate::review::reject`] inside one transaction.
  fn reject_submission(
    &self,
    id: i64,
    reviewer: String,
    notes: Option<String>,
  ) -> impl Future<Output = Result<Submission, Self::Error>> + Send + '_;

  // ── Parishioners ──────────────────────────────────────────────────────

  fn parishioner(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Parishioner>, Self::Error>> + Send + '_;

  /// Ordered by last name, then first name.
  fn list_parishioners(
    &self,
  ) -> impl Future<Output = Result<Vec<Parishioner>, Self::Error>> + Send + '_;

  fn list_households(
    &self,
  ) -> impl Future<Output = Result<Vec<Household>, Self::Error>> + Send + '_;

  fn add_parishioner(
    &self,
    input: NewParishioner,
  ) -> impl Future<Output = Result<Parishioner, Self::Error>> + Send + '_;

  fn add_household(
    &self,
    input: NewHousehold,
  ) -> impl Future<Output = Result<Household, Self::Error>> + Send + '_;

  /// Marry two parishioners, first severing any link either has to a third
  /// party. Returns both sides as saved.
  fn marry(
    &self,
    a: i64,
    b: i64,
  ) -> impl Future<Output = Result<(Parishioner, Parishioner), Self::Error>> + Send + '_;

  /// Sever a marriage; both sides become DIVORCED.
  fn divorce(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<(Parishioner, Parishioner), Self::Error>> + Send + '_;

  /// Mark a parishioner departed on `on`; a surviving spouse is widowed.
  fn mark_departed(
    &self,
    id: i64,
    on: NaiveDate,
  ) -> impl Future<Output = Result<Parishioner, Self::Error>> + Send + '_;
}
