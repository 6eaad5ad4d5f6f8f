//! Handlers for `/api/submissions` endpoints. Every route requires a
//! reviewing role.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/submissions` | Optional `?status=PENDING\|APPROVED\|REJECTED` |
//! | `GET`  | `/api/submissions/pending-count` | |
//! | `GET`  | `/api/submissions/history` | Approved and rejected, newest first |
//! | `GET`  | `/api/submissions/{id}` | Detail with target and spouse candidates |
//! | `POST` | `/api/submissions/{id}/target` | Body: `{"parishioner_id":7}` |
//! | `POST` | `/api/submissions/{id}/approve` | Body: edits plus approval choices |
//! | `POST` | `/api/submissions/{id}/reject` | Body: `{"notes":"…"}` |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use parish_core::{
  review::{Approval, ApprovalRequest, ReviewDetail},
  store::ParishStore,
  submission::{Submission, SubmissionEdits, SubmissionStatus, SubmissionType},
};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  auth::Privileged,
  error::{Error, Result},
};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  /// Unrecognised values fall back to PENDING.
  pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionList {
  pub submissions:    Vec<Submission>,
  pub pending_count:  u64,
  pub current_status: SubmissionStatus,
}

/// `GET /api/submissions[?status=<status>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  _: Privileged,
  Query(params): Query<ListParams>,
) -> Result<Json<SubmissionList>>
where
  S: ParishStore + Clone + 'static,
{
  let status = params
    .status
    .as_deref()
    .and_then(|s| s.trim().parse().ok())
    .unwrap_or(SubmissionStatus::Pending);

  let submissions = state
    .store
    .submissions_by_status(status)
    .await
    .map_err(Error::store)?;
  let pending_count = state.store.pending_count().await.map_err(Error::store)?;

  Ok(Json(SubmissionList {
    submissions,
    pending_count,
    current_status: status,
  }))
}

#[derive(Debug, Serialize)]
pub struct PendingCount {
  pub pending: u64,
}

/// `GET /api/submissions/pending-count`
pub async fn pending_count<S>(
  State(state): State<AppState<S>>,
  _: Privileged,
) -> Result<Json<PendingCount>>
where
  S: ParishStore + Clone + 'static,
{
  let pending = state.store.pending_count().await.map_err(Error::store)?;
  Ok(Json(PendingCount { pending }))
}

#[derive(Debug, Serialize)]
pub struct History {
  pub approved: Vec<Submission>,
  pub rejected: Vec<Submission>,
}

/// `GET /api/submissions/history`
pub async fn history<S>(
  State(state): State<AppState<S>>,
  _: Privileged,
) -> Result<Json<History>>
where
  S: ParishStore + Clone + 'static,
{
  let approved = state
    .store
    .submissions_by_status(SubmissionStatus::Approved)
    .await
    .map_err(Error::store)?;
  let rejected = state
    .store
    .submissions_by_status(SubmissionStatus::Rejected)
    .await
    .map_err(Error::store)?;
  Ok(Json(History { approved, rejected }))
}

// ─── Detail ───────────────────────────────────────────────────────────────────

async fn load<S>(store: &S, id: i64) -> Result<Submission>
where
  S: ParishStore,
{
  store
    .submission(id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::NotFound(format!("submission {id} not found")))
}

/// `GET /api/submissions/{id}`
pub async fn detail<S>(
  State(state): State<AppState<S>>,
  _: Privileged,
  Path(id): Path<i64>,
) -> Result<Json<ReviewDetail>>
where
  S: ParishStore + Clone + 'static,
{
  let submission = load(state.store.as_ref(), id).await?;

  let target = match (submission.submission_type, submission.target_parishioner_id) {
    (SubmissionType::Update, Some(pid)) => {
      state.store.parishioner(pid).await.map_err(Error::store)?
    }
    _ => None,
  };

  let other_pending = state
    .store
    .submissions_by_status(SubmissionStatus::Pending)
    .await
    .map_err(Error::store)?
    .into_iter()
    .filter(|s| s.id != id)
    .collect();

  Ok(Json(ReviewDetail {
    children: submission.data.children(),
    submission,
    target,
    other_pending,
  }))
}

// ─── Decisions ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TargetBody {
  pub parishioner_id: i64,
}

/// `POST /api/submissions/{id}/target`
pub async fn assign_target<S>(
  State(state): State<AppState<S>>,
  _: Privileged,
  Path(id): Path<i64>,
  Json(body): Json<TargetBody>,
) -> Result<Json<Submission>>
where
  S: ParishStore + Clone + 'static,
{
  let submission = state
    .store
    .assign_target(id, body.parishioner_id)
    .await
    .map_err(Error::store)?;
  Ok(Json(submission))
}

/// Field corrections plus the relationship, household and children choices.
#[derive(Debug, Default, Deserialize)]
pub struct ApproveBody {
  #[serde(default)]
  pub edits:   SubmissionEdits,
  #[serde(flatten)]
  pub request: ApprovalRequest,
}

/// `POST /api/submissions/{id}/approve`
pub async fn approve<S>(
  State(state): State<AppState<S>>,
  Privileged(reviewer): Privileged,
  Path(id): Path<i64>,
  Json(body): Json<ApproveBody>,
) -> Result<Json<Approval>>
where
  S: ParishStore + Clone + 'static,
{
  let approval = state
    .store
    .approve_submission(id, reviewer.email, body.edits, body.request)
    .await
    .map_err(Error::store)?;
  Ok(Json(approval))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RejectBody {
  pub notes: Option<String>,
}

/// `POST /api/submissions/{id}/reject`
pub async fn reject<S>(
  State(state): State<AppState<S>>,
  Privileged(reviewer): Privileged,
  Path(id): Path<i64>,
  Json(body): Json<RejectBody>,
) -> Result<Json<Submission>>
where
  S: ParishStore + Clone + 'static,
{
  let submission = state
    .store
    .reject_submission(id, reviewer.email, body.notes)
    .await
    .map_err(Error::store)?;
  Ok(Json(submission))
}
