//! [`SqliteStore`]: the SQLite implementation of [`ParishStore`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior, params};
use tracing::info;

use parish_core::{
  graph,
  link::{NewLink, SubmissionLink, token_prefix},
  parishioner::{Household, NewHousehold, NewParishioner, Parishioner},
  review::{self, Approval, ApprovalRequest},
  store::ParishStore,
  submission::{NewSubmission, Submission, SubmissionEdits, SubmissionStatus},
};

use crate::{Result, graph::TxGraph, queries, schema::SCHEMA};

type CoreError = parish_core::Error;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A parish store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread.
  async fn run<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Run `f` inside an `IMMEDIATE` transaction, committing only on `Ok`.
  /// Dropping the transaction on the error path rolls it back.
  async fn run_tx<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self
      .run(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
      })
      .await
  }

  fn require_link(conn: &Connection, id: i64) -> Result<SubmissionLink> {
    queries::link_by_id(conn, id)?
      .ok_or_else(|| CoreError::LinkNotFound(id).into())
  }
}

// ─── ParishStore impl ────────────────────────────────────────────────────────

impl ParishStore for SqliteStore {
  type Error = crate::Error;

  // ── Links ─────────────────────────────────────────────────────────────

  async fn create_link(&self, input: NewLink) -> Result<SubmissionLink> {
    let mut link = input.into_link(0, Utc::now());
    self
      .run(move |conn| {
        link.id = queries::insert_link(conn, &link)?;
        info!(
          link = link.id,
          token = token_prefix(&link.token),
          created_by = %link.created_by,
          "created submission link"
        );
        Ok(link)
      })
      .await
  }

  async fn link_by_token(&self, token: &str) -> Result<Option<SubmissionLink>> {
    let token = token.to_owned();
    self
      .run(move |conn| queries::link_by_token(conn, &token))
      .await
  }

  async fn link(&self, id: i64) -> Result<Option<SubmissionLink>> {
    self.run(move |conn| queries::link_by_id(conn, id)).await
  }

  async fn links_by_creator(&self, creator: &str) -> Result<Vec<SubmissionLink>> {
    let creator = creator.to_owned();
    self
      .run(move |conn| {
        queries::links_where(
          conn,
          "WHERE created_by = ?1 ORDER BY created_at DESC, link_id DESC",
          params![creator],
        )
      })
      .await
  }

  async fn active_links(&self) -> Result<Vec<SubmissionLink>> {
    self
      .run(|conn| {
        queries::links_where(
          conn,
          "WHERE is_active = 1 ORDER BY created_at DESC, link_id DESC",
          [],
        )
      })
      .await
  }

  async fn record_link_access(&self, id: i64) -> Result<SubmissionLink> {
    self
      .run_tx(move |tx| {
        let mut link = Self::require_link(tx, id)?;
        link.record_access()?;
        queries::save_link_state(tx, &link)?;
        Ok(link)
      })
      .await
  }

  async fn deactivate_link(&self, id: i64) -> Result<SubmissionLink> {
    self
      .run_tx(move |tx| {
        let mut link = Self::require_link(tx, id)?;
        if link.is_active {
          link.deactivate();
          queries::save_link_state(tx, &link)?;
          info!(link = id, "deactivated submission link");
        }
        Ok(link)
      })
      .await
  }

  // ── Submissions ───────────────────────────────────────────────────────

  async fn create_submission(
    &self,
    link_id: i64,
    input: NewSubmission,
  ) -> Result<Submission> {
    self
      .run_tx(move |tx| {
        let now = Utc::now();
        let mut link = Self::require_link(tx, link_id)?;
        let status = link.status(now);
        if !status.is_valid() {
          return Err(CoreError::LinkUnavailable(status).into());
        }
        link.record_submission()?;
        queries::save_link_state(tx, &link)?;

        let mut submission = input.into_submission(0, link_id, now);
        submission.id = queries::insert_submission(tx, &submission)?;
        Ok(submission)
      })
      .await
  }

  async fn submission(&self, id: i64) -> Result<Option<Submission>> {
    self.run(move |conn| queries::submission_by_id(conn, id)).await
  }

  async fn submissions_by_status(
    &self,
    status: SubmissionStatus,
  ) -> Result<Vec<Submission>> {
    self
      .run(move |conn| queries::submissions_by_status(conn, status))
      .await
  }

  async fn submissions_for_link(&self, link_id: i64) -> Result<Vec<Submission>> {
    self
      .run(move |conn| {
        queries::submissions_where(
          conn,
          "WHERE link_id = ?1 ORDER BY submitted_at DESC, submission_id DESC",
          params![link_id],
        )
      })
      .await
  }

  async fn pending_count(&self) -> Result<u64> {
    self
      .run(|conn| queries::count_by_status(conn, SubmissionStatus::Pending))
      .await
  }

  async fn assign_target(
    &self,
    id: i64,
    parishioner_id: i64,
  ) -> Result<Submission> {
    self
      .run_tx(move |tx| {
        review::assign_target(&mut TxGraph(tx), id, parishioner_id)
      })
      .await
  }

  async fn approve_submission(
    &self,
    id: i64,
    reviewer: String,
    edits: SubmissionEdits,
    request: ApprovalRequest,
  ) -> Result<Approval> {
    self
      .run_tx(move |tx| {
        review::approve(
          &mut TxGraph(tx),
          id,
          &reviewer,
          edits,
          &request,
          Utc::now(),
        )
      })
      .await
  }

  async fn reject_submission(
    &self,
    id: i64,
    reviewer: String,
    notes: Option<String>,
  ) -> Result<Submission> {
    self
      .run_tx(move |tx| {
        review::reject(&mut TxGraph(tx), id, &reviewer, notes, Utc::now())
      })
      .await
  }

  // ── Parishioners ──────────────────────────────────────────────────────

  async fn parishioner(&self, id: i64) -> Result<Option<Parishioner>> {
    self.run(move |conn| queries::parishioner_by_id(conn, id)).await
  }

  async fn list_parishioners(&self) -> Result<Vec<Parishioner>> {
    self
      .run(|conn| {
        queries::parishioners_where(
          conn,
          "ORDER BY last_name, first_name, parishioner_id",
          [],
        )
      })
      .await
  }

  async fn list_households(&self) -> Result<Vec<Household>> {
    self.run(|conn| queries::all_households(conn)).await
  }

  async fn add_parishioner(&self, input: NewParishioner) -> Result<Parishioner> {
    self
      .run_tx(move |tx| queries::insert_parishioner(tx, input))
      .await
  }

  async fn add_household(&self, input: NewHousehold) -> Result<Household> {
    self
      .run(move |conn| queries::insert_household(conn, input))
      .await
  }

  async fn marry(&self, a: i64, b: i64) -> Result<(Parishioner, Parishioner)> {
    self
      .run_tx(move |tx| graph::link_spouses(&mut TxGraph(tx), a, b))
      .await
  }

  async fn divorce(&self, id: i64) -> Result<(Parishioner, Parishioner)> {
    self
      .run_tx(move |tx| graph::divorce(&mut TxGraph(tx), id))
      .await
  }

  async fn mark_departed(&self, id: i64, on: NaiveDate) -> Result<Parishioner> {
    self
      .run_tx(move |tx| graph::depart(&mut TxGraph(tx), id, on))
      .await
  }
}
