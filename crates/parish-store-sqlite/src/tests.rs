//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, NaiveDate, Utc};
use parish_core::{
  link::{LinkStatus, NewLink},
  parishioner::{MaritalStatus, MembershipStatus, NewParishioner},
  review::ApprovalRequest,
  store::ParishStore,
  submission::{
    ChildEntry, NewSubmission, SubmissionData, SubmissionEdits, SubmissionField,
    SubmissionStatus, SubmissionType,
  },
};

use crate::{Error, SqliteStore};

const PRIEST: &str = "priest@example.org";

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_link() -> NewLink {
  NewLink {
    created_by: PRIEST.into(),
    description: Some("Sunday bulletin".into()),
    ..NewLink::default()
  }
}

fn data(first: &str, last: &str) -> SubmissionData {
  SubmissionData {
    first_name: first.into(),
    last_name: last.into(),
    ..SubmissionData::default()
  }
}

fn new_submission(first: &str, last: &str) -> NewSubmission {
  NewSubmission {
    submission_type: SubmissionType::New,
    data:            data(first, last),
  }
}

async fn submit(s: &SqliteStore, first: &str, last: &str) -> i64 {
  let link = s.create_link(new_link()).await.unwrap();
  s.create_submission(link.id, new_submission(first, last))
    .await
    .unwrap()
    .id
}

async fn approve(
  s: &SqliteStore,
  id: i64,
  request: ApprovalRequest,
) -> Result<parish_core::review::Approval, Error> {
  s.approve_submission(id, PRIEST.into(), SubmissionEdits::default(), request)
    .await
}

// ─── Links ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_find_link_by_token() {
  let s = store().await;
  let link = s.create_link(new_link()).await.unwrap();
  assert!(link.id > 0);
  assert!(link.is_active);

  let found = s.link_by_token(&link.token).await.unwrap().unwrap();
  assert_eq!(found, link);
  assert!(s.link_by_token("no-such-token").await.unwrap().is_none());
}

#[tokio::test]
async fn access_counter_increments() {
  let s = store().await;
  let link = s.create_link(new_link()).await.unwrap();
  s.record_link_access(link.id).await.unwrap();
  let after = s.record_link_access(link.id).await.unwrap();
  assert_eq!(after.access_count, 2);
}

#[tokio::test]
async fn deactivate_is_idempotent_and_hides_from_active() {
  let s = store().await;
  let link = s.create_link(new_link()).await.unwrap();
  let once = s.deactivate_link(link.id).await.unwrap();
  let twice = s.deactivate_link(link.id).await.unwrap();
  assert_eq!(once, twice);
  assert!(!twice.is_active);
  assert!(s.active_links().await.unwrap().is_empty());
}

#[tokio::test]
async fn links_by_creator_newest_first() {
  let s = store().await;
  let first = s.create_link(new_link()).await.unwrap();
  let second = s.create_link(new_link()).await.unwrap();
  s.create_link(NewLink {
    created_by: "secretary@example.org".into(),
    ..NewLink::default()
  })
  .await
  .unwrap();

  let mine = s.links_by_creator(PRIEST).await.unwrap();
  let ids: Vec<_> = mine.iter().map(|l| l.id).collect();
  assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn single_use_link_rejects_second_submission() {
  let s = store().await;
  let link = s
    .create_link(NewLink {
      max_submissions: Some(1),
      ..new_link()
    })
    .await
    .unwrap();

  s.create_submission(link.id, new_submission("Anna", "Pappas"))
    .await
    .unwrap();
  let after = s.link(link.id).await.unwrap().unwrap();
  assert_eq!(after.submission_count, 1);
  assert_eq!(after.status(Utc::now()), LinkStatus::AtLimit);

  let err = s
    .create_submission(link.id, new_submission("Anna", "Pappas"))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(parish_core::Error::LinkUnavailable(LinkStatus::AtLimit))
  ));
  assert_eq!(s.submissions_for_link(link.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn expired_link_refuses_submissions() {
  let s = store().await;
  let link = s
    .create_link(NewLink {
      expires_at: Some(Utc::now() - Duration::hours(1)),
      ..new_link()
    })
    .await
    .unwrap();
  let err = s
    .create_submission(link.id, new_submission("Anna", "Pappas"))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(parish_core::Error::LinkUnavailable(LinkStatus::Expired))
  ));
}

// ─── Submissions ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn submission_data_survives_storage() {
  let s = store().await;
  let link = s.create_link(new_link()).await.unwrap();
  let mut d = data("Anna", "Pappas");
  d.is_orthodox = true;
  d.baptism_date = NaiveDate::from_ymd_opt(1990, 5, 1);
  d.set_children(&[ChildEntry {
    name:     Some("Eleni".into()),
    birthday: None,
  }])
  .unwrap();

  let created = s
    .create_submission(link.id, NewSubmission {
      submission_type: SubmissionType::New,
      data:            d.clone(),
    })
    .await
    .unwrap();
  let fetched = s.submission(created.id).await.unwrap().unwrap();
  assert_eq!(fetched.data, d);
  assert_eq!(fetched.status, SubmissionStatus::Pending);
  assert_eq!(fetched.data.children().len(), 1);
  assert_eq!(s.pending_count().await.unwrap(), 1);
}

#[tokio::test]
async fn queue_is_newest_first() {
  let s = store().await;
  let a = submit(&s, "Anna", "Pappas").await;
  let b = submit(&s, "Nick", "Pappas").await;
  let pending = s
    .submissions_by_status(SubmissionStatus::Pending)
    .await
    .unwrap();
  let ids: Vec<_> = pending.iter().map(|p| p.id).collect();
  assert_eq!(ids, vec![b, a]);
}

// ─── Approval ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn approve_new_then_history() {
  let s = store().await;
  let id = submit(&s, "Anna", "Pappas").await;
  let approval = approve(&s, id, ApprovalRequest::default()).await.unwrap();
  assert_eq!(approval.parishioner.full_name(), "Anna Pappas");
  assert_eq!(approval.submission.status, SubmissionStatus::Approved);

  let approved = s
    .submissions_by_status(SubmissionStatus::Approved)
    .await
    .unwrap();
  assert_eq!(approved.len(), 1);
  assert_eq!(
    approved[0].target_parishioner_id,
    Some(approval.parishioner.id)
  );
  assert_eq!(s.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn concurrent_double_approval_creates_one_parishioner() {
  let s = store().await;
  let id = submit(&s, "Anna", "Pappas").await;

  let (first, second) = tokio::join!(
    approve(&s, id, ApprovalRequest::default()),
    approve(&s, id, ApprovalRequest::default()),
  );
  let outcomes = [first, second];
  let ok = outcomes.iter().filter(|r| r.is_ok()).count();
  let conflicts = outcomes
    .iter()
    .filter(|r| {
      matches!(r, Err(Error::Core(parish_core::Error::AlreadyProcessed { .. })))
    })
    .count();
  assert_eq!((ok, conflicts), (1, 1));
  assert_eq!(s.list_parishioners().await.unwrap().len(), 1);
}

#[tokio::test]
async fn spouse_conflict_rolls_back_everything() {
  let s = store().await;
  let george = s
    .add_parishioner(NewParishioner::named("George", "Pappas"))
    .await
    .unwrap();
  let helen = s
    .add_parishioner(NewParishioner::named("Helen", "Pappas"))
    .await
    .unwrap();
  s.marry(george.id, helen.id).await.unwrap();

  let link = s.create_link(new_link()).await.unwrap();
  let mut d = data("Anna", "Smith");
  d.address = Some("1 Main St".into());
  let id = s
    .create_submission(link.id, NewSubmission {
      submission_type: SubmissionType::New,
      data:            d,
    })
    .await
    .unwrap()
    .id;

  let err = approve(&s, id, ApprovalRequest {
    selected_spouse_id: Some(george.id),
    ..ApprovalRequest::default()
  })
  .await
  .unwrap_err();
  assert_eq!(
    err.to_string(),
    "Selected spouse (George Pappas) is already married to Helen Pappas"
  );
  assert_eq!(s.list_parishioners().await.unwrap().len(), 2);
  assert!(s.list_households().await.unwrap().is_empty());
  let stored = s.submission(id).await.unwrap().unwrap();
  assert_eq!(stored.status, SubmissionStatus::Pending);
}

#[tokio::test]
async fn failed_approval_discards_reviewer_edits() {
  let s = store().await;
  let id = submit(&s, "Anna", "Pappas").await;
  let edits = SubmissionEdits {
    first_name: Some("Ann".into()),
    birthday: NaiveDate::from_ymd_opt(2999, 1, 1),
    ..SubmissionEdits::default()
  };
  let err = s
    .approve_submission(id, PRIEST.into(), edits, ApprovalRequest::default())
    .await
    .unwrap_err();
  assert_eq!(err.to_string(), "Birthday cannot be in the future");
  let stored = s.submission(id).await.unwrap().unwrap();
  assert_eq!(stored.data.first_name, "Anna");
}

#[tokio::test]
async fn cross_referenced_couple() {
  let s = store().await;
  let first = submit(&s, "Anna", "Pappas").await;
  let second = submit(&s, "Nick", "Pappas").await;

  let a = approve(&s, first, ApprovalRequest {
    pending_spouse_submission_id: Some(second),
    ..ApprovalRequest::default()
  })
  .await
  .unwrap();
  assert_eq!(a.parishioner.spouse_id, None);

  let b = approve(&s, second, ApprovalRequest {
    pending_spouse_submission_id: Some(first),
    ..ApprovalRequest::default()
  })
  .await
  .unwrap();

  let anna = s.parishioner(a.parishioner.id).await.unwrap().unwrap();
  let nick = s.parishioner(b.parishioner.id).await.unwrap().unwrap();
  assert_eq!(anna.spouse_id, Some(nick.id));
  assert_eq!(nick.spouse_id, Some(anna.id));
  assert_eq!(anna.marital_status, Some(MaritalStatus::Married));
}

#[tokio::test]
async fn godparents_are_derived_on_read() {
  let s = store().await;
  let sponsor = s
    .add_parishioner(NewParishioner::named("Kosta", "Demos"))
    .await
    .unwrap();
  let id = submit(&s, "Anna", "Pappas").await;
  let approval = approve(&s, id, ApprovalRequest {
    selected_godfather_id: Some(sponsor.id),
    selected_sponsor_id: Some(sponsor.id),
    ..ApprovalRequest::default()
  })
  .await
  .unwrap();
  assert_eq!(approval.parishioner.godfather_id, Some(sponsor.id));
  assert_eq!(approval.parishioner.wedding_sponsor_id, Some(sponsor.id));

  let sponsor = s.parishioner(sponsor.id).await.unwrap().unwrap();
  assert_eq!(sponsor.godchildren_as_godfather, vec![approval.parishioner.id]);
}

#[tokio::test]
async fn update_writes_only_allowed_fields_and_creates_household() {
  let s = store().await;
  let target = s
    .add_parishioner(NewParishioner::named("Ana", "Papas"))
    .await
    .unwrap();
  let link = s.create_link(new_link()).await.unwrap();
  let mut d = data("Anna", "Pappas");
  d.city = Some("Boston".into());
  d.phone_number = Some("555-0100".into());
  let id = s
    .create_submission(link.id, NewSubmission {
      submission_type: SubmissionType::Update,
      data:            d,
    })
    .await
    .unwrap()
    .id;

  s.assign_target(id, target.id).await.unwrap();
  let approval = approve(&s, id, ApprovalRequest {
    fields_to_update: vec![SubmissionField::City, SubmissionField::PhoneNumber],
    ..ApprovalRequest::default()
  })
  .await
  .unwrap();

  let p = approval.parishioner;
  assert_eq!(p.id, target.id);
  assert_eq!(p.first_name, "Ana");
  assert_eq!(p.phone_number.as_deref(), Some("555-0100"));
  let households = s.list_households().await.unwrap();
  assert_eq!(households.len(), 1);
  assert_eq!(p.household_id, Some(households[0].id));
  assert_eq!(households[0].city.as_deref(), Some("Boston"));
}

#[tokio::test]
async fn reject_is_terminal() {
  let s = store().await;
  let id = submit(&s, "Anna", "Pappas").await;
  let rejected = s
    .reject_submission(id, PRIEST.into(), Some("spam".into()))
    .await
    .unwrap();
  assert_eq!(rejected.status, SubmissionStatus::Rejected);
  assert_eq!(rejected.review_notes.as_deref(), Some("spam"));

  assert!(approve(&s, id, ApprovalRequest::default()).await.is_err());
  assert!(s.list_parishioners().await.unwrap().is_empty());
}

// ─── Direct edits ────────────────────────────────────────────────────────────

#[tokio::test]
async fn remarriage_severs_previous_spouses() {
  let s = store().await;
  let mut ids = Vec::new();
  for name in ["A", "B", "C", "D"] {
    ids.push(
      s.add_parishioner(NewParishioner::named(name, "Test"))
        .await
        .unwrap()
        .id,
    );
  }
  let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);
  s.marry(a, c).await.unwrap();
  s.marry(b, d).await.unwrap();
  s.marry(a, b).await.unwrap();

  for (id, spouse) in [(a, Some(b)), (b, Some(a)), (c, None), (d, None)] {
    let p = s.parishioner(id).await.unwrap().unwrap();
    assert_eq!(p.spouse_id, spouse, "parishioner {id}");
  }
}

#[tokio::test]
async fn departure_widows_spouse() {
  let s = store().await;
  let a = s
    .add_parishioner(NewParishioner::named("George", "Pappas"))
    .await
    .unwrap();
  let b = s
    .add_parishioner(NewParishioner::named("Helen", "Pappas"))
    .await
    .unwrap();
  s.marry(a.id, b.id).await.unwrap();

  let on = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
  let departed = s.mark_departed(a.id, on).await.unwrap();
  assert_eq!(departed.status, Some(MembershipStatus::Departed));
  assert_eq!(departed.death_date, Some(on));

  let widow = s.parishioner(b.id).await.unwrap().unwrap();
  assert_eq!(widow.spouse_id, None);
  assert_eq!(widow.marital_status, Some(MaritalStatus::Widowed));
}

#[tokio::test]
async fn divorce_clears_both_sides() {
  let s = store().await;
  let a = s
    .add_parishioner(NewParishioner::named("George", "Pappas"))
    .await
    .unwrap();
  let b = s
    .add_parishioner(NewParishioner::named("Helen", "Pappas"))
    .await
    .unwrap();
  s.marry(a.id, b.id).await.unwrap();
  let (x, y) = s.divorce(a.id).await.unwrap();
  assert_eq!((x.spouse_id, y.spouse_id), (None, None));
  assert_eq!(y.marital_status, Some(MaritalStatus::Divorced));
}
