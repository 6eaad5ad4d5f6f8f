//! The review/approval engine.
//!
//! Every entry point runs against one [`GraphTx`]; the caller commits only if
//! the function returns `Ok`. The PENDING check and the final status write
//! happen in the same transaction, which closes the double-approval race.
//!
//! Validation (dates, required fields, relationship selections) runs before
//! the first write. After that, a relationship whose target has vanished is
//! logged and skipped rather than failing the approval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
  Error,
  graph::{self, GodparentRole, load},
  parishioner::{Household, NewHousehold, NewParishioner, Parishioner},
  store::GraphTx,
  submission::{
    ChildEntry, Submission, SubmissionData, SubmissionEdits, SubmissionField,
    SubmissionStatus, SubmissionType, validate, validate_dates,
  },
};

// ─── Request / response ──────────────────────────────────────────────────────

/// Reviewer decisions accompanying an approval. Ids `<= 0` count as "not
/// selected".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApprovalRequest {
  /// For UPDATE: the parishioner to amend, if not already assigned.
  pub target_parishioner_id:        Option<i64>,
  /// For UPDATE: fields to write. Empty writes every submitted field.
  pub fields_to_update:             Vec<SubmissionField>,
  pub selected_spouse_id:           Option<i64>,
  pub selected_godfather_id:        Option<i64>,
  pub selected_godmother_id:        Option<i64>,
  pub selected_sponsor_id:          Option<i64>,
  pub selected_household_id:        Option<i64>,
  pub new_household_name:           Option<String>,
  /// Per child index: an existing parishioner to attach instead of creating.
  pub child_link_ids:               Vec<Option<i64>>,
  /// Child indexes to create as new parishioners.
  pub child_create_indexes:         Vec<usize>,
  /// For NEW: the other half of a couple who submitted separately.
  pub pending_spouse_submission_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Approval {
  pub submission:  Submission,
  /// The created (NEW) or amended (UPDATE) parishioner.
  pub parishioner: Parishioner,
}

/// What a reviewer sees before deciding.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewDetail {
  pub submission:    Submission,
  pub target:        Option<Parishioner>,
  pub children:      Vec<ChildEntry>,
  /// Other PENDING submissions, candidates for deferred spouse linking.
  pub other_pending: Vec<Submission>,
}

fn selected(id: Option<i64>) -> Option<i64> { id.filter(|&i| i > 0) }

fn non_blank(s: &Option<String>) -> bool {
  s.as_deref().is_some_and(|s| !s.trim().is_empty())
}

fn trimmed(s: &Option<String>) -> Option<String> {
  s.as_deref().map(|s| s.trim().to_owned())
}

fn load_submission<T: GraphTx + ?Sized>(
  tx: &mut T,
  id: i64,
) -> Result<Submission, T::Error> {
  tx.submission(id)?
    .ok_or_else(|| Error::SubmissionNotFound(id).into())
}

// ─── Entry points ────────────────────────────────────────────────────────────

/// Approve submission `id`, merging it into the parishioner graph.
pub fn approve<T: GraphTx + ?Sized>(
  tx: &mut T,
  id: i64,
  reviewer: &str,
  edits: SubmissionEdits,
  request: &ApprovalRequest,
  now: DateTime<Utc>,
) -> Result<Approval, T::Error> {
  let mut submission = load_submission(tx, id)?;
  submission.ensure_pending()?;
  info!(
    submission = id,
    kind = %submission.submission_type,
    reviewer,
    "approving submission"
  );

  edits.apply(&mut submission.data);
  if let Some(target) = selected(request.target_parishioner_id) {
    submission.target_parishioner_id = Some(target);
  }

  let errors = validate(&submission.data);
  if !errors.is_empty() {
    return Err(Error::Validation(errors.join("; ")).into());
  }
  validate_dates(&submission.data, now.date_naive())?;

  let parishioner_id = match submission.submission_type {
    SubmissionType::New => approve_new(tx, &mut submission, request)?,
    SubmissionType::Update => approve_update(tx, &submission, request)?,
  };

  submission.mark_reviewed(SubmissionStatus::Approved, reviewer, now);
  submission.target_parishioner_id = Some(parishioner_id);
  tx.save_submission(&submission)?;

  let parishioner = load(tx, parishioner_id)?;
  info!(
    submission = id,
    parishioner = parishioner_id,
    "submission approved"
  );
  Ok(Approval { submission, parishioner })
}

/// Reject submission `id`. No graph mutation.
pub fn reject<T: GraphTx + ?Sized>(
  tx: &mut T,
  id: i64,
  reviewer: &str,
  notes: Option<String>,
  now: DateTime<Utc>,
) -> Result<Submission, T::Error> {
  let mut submission = load_submission(tx, id)?;
  submission.ensure_pending()?;
  submission.mark_reviewed(SubmissionStatus::Rejected, reviewer, now);
  submission.review_notes = notes
    .map(|n| n.trim().to_owned())
    .filter(|n| !n.is_empty());
  tx.save_submission(&submission)?;
  info!(submission = id, reviewer, "submission rejected");
  Ok(submission)
}

/// Record the parishioner an UPDATE submission amends.
pub fn assign_target<T: GraphTx + ?Sized>(
  tx: &mut T,
  id: i64,
  parishioner_id: i64,
) -> Result<Submission, T::Error> {
  let mut submission = load_submission(tx, id)?;
  submission.ensure_pending()?;
  if submission.submission_type != SubmissionType::Update {
    return Err(
      Error::WrongSubmissionType { id, expected: SubmissionType::Update.into() }
        .into(),
    );
  }
  load(tx, parishioner_id)?;
  submission.target_parishioner_id = Some(parishioner_id);
  tx.save_submission(&submission)?;
  Ok(submission)
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Self-assignment and marriage-conflict checks. `me` is `None` for a NEW
/// approval, whose parishioner does not exist yet.
fn validate_relationships<T: GraphTx + ?Sized>(
  tx: &mut T,
  me: Option<i64>,
  request: &ApprovalRequest,
) -> Result<(), T::Error> {
  if let Some(me) = me {
    let picks = [
      (request.selected_spouse_id, "spouse"),
      (request.selected_godfather_id, "godfather"),
      (request.selected_godmother_id, "godmother"),
      (request.selected_sponsor_id, "sponsor"),
    ];
    if let Some((_, role)) = picks.into_iter().find(|(id, _)| *id == Some(me)) {
      return Err(Error::SelfRelationship(role).into());
    }
  }

  let Some(spouse_id) = selected(request.selected_spouse_id) else {
    return Ok(());
  };
  let Some(spouse) = tx.parishioner(spouse_id)? else {
    return Ok(());
  };
  match spouse.spouse_id {
    Some(partner_id) if Some(partner_id) != me => {
      let partner = tx
        .parishioner(partner_id)?
        .map(|p| p.full_name())
        .unwrap_or_else(|| format!("parishioner {partner_id}"));
      Err(
        Error::SpouseConflict { spouse: spouse.full_name(), partner }.into(),
      )
    }
    _ => Ok(()),
  }
}

// ─── NEW ─────────────────────────────────────────────────────────────────────

fn approve_new<T: GraphTx + ?Sized>(
  tx: &mut T,
  submission: &mut Submission,
  request: &ApprovalRequest,
) -> Result<i64, T::Error> {
  validate_relationships(tx, None, request)?;

  let household = resolve_household(tx, &submission.data, request)?;
  let household_id = household.as_ref().map(|h| h.id);

  let d = &submission.data;
  let mut input = NewParishioner {
    first_name: d.first_name.trim().to_owned(),
    last_name: d.last_name.trim().to_owned(),
    name_suffix: d.name_suffix.clone(),
    birthday: d.birthday,
    email: trimmed(&d.email),
    phone_number: d.phone_number.clone(),
    status: d.membership_status,
    marital_status: d.marital_status,
    marriage_date: d.marriage_date,
    household_id,
    manual_spouse_name: d.manual_spouse_name.clone(),
    manual_godfather_name: d.manual_godfather_name.clone(),
    manual_godmother_name: d.manual_godmother_name.clone(),
    manual_sponsor_name: d.manual_sponsor_name.clone(),
    ..NewParishioner::default()
  };
  if d.is_orthodox {
    input.baptismal_name = d.baptismal_name.clone();
    input.patron_saint = d.patron_saint.clone();
    input.baptism_date = d.baptism_date;
    input.chrismation_date = d.chrismation_date;
  }
  let created = tx.insert_parishioner(input)?;
  let pid = created.id;
  info!(parishioner = pid, name = %created.full_name(), "created parishioner");

  apply_relationships(tx, pid, request)?;
  link_pending_spouse(tx, submission, pid, request)?;
  link_waiting_spouse(tx, submission.id, pid)?;

  if submission.data.has_inline_spouse() && load(tx, pid)?.spouse_id.is_none()
  {
    let d = &submission.data;
    let spouse = tx.insert_parishioner(NewParishioner {
      first_name: trimmed(&d.spouse_first_name).unwrap_or_default(),
      last_name: trimmed(&d.spouse_last_name).unwrap_or_default(),
      email: trimmed(&d.spouse_email),
      phone_number: d.spouse_phone_number.clone(),
      marital_status: d.marital_status,
      household_id,
      ..NewParishioner::default()
    })?;
    graph::link_spouses(tx, pid, spouse.id)?;
    info!(parishioner = pid, spouse = spouse.id, "created inline spouse");
  }

  let parent_last = load(tx, pid)?.last_name;
  process_children(tx, &submission.data.children(), request, household_id, &parent_last)?;
  Ok(pid)
}

/// Selected household, else a new named one, else one synthesised from the
/// submitted address, else none. A selected id that no longer exists falls
/// through to the next option.
fn resolve_household<T: GraphTx + ?Sized>(
  tx: &mut T,
  d: &SubmissionData,
  request: &ApprovalRequest,
) -> Result<Option<Household>, T::Error> {
  if let Some(hid) = selected(request.selected_household_id) {
    if let Some(household) = tx.household(hid)? {
      return Ok(Some(household));
    }
    warn!(household = hid, "selected household not found");
  }

  let name = request
    .new_household_name
    .as_deref()
    .map(str::trim)
    .filter(|n| !n.is_empty());
  if name.is_none() && !d.has_address() {
    return Ok(None);
  }
  let household = tx.insert_household(NewHousehold {
    family_name: name.map(str::to_owned),
    address: d.address.clone(),
    city: d.city.clone(),
    zip_code: d.zip_code.clone(),
    ..NewHousehold::default()
  })?;
  info!(household = household.id, named = name.is_some(), "created household");
  Ok(Some(household))
}

/// Record the couple reference and, if the other half is already approved,
/// link to its parishioner now.
fn link_pending_spouse<T: GraphTx + ?Sized>(
  tx: &mut T,
  submission: &mut Submission,
  pid: i64,
  request: &ApprovalRequest,
) -> Result<(), T::Error> {
  let Some(other_id) = selected(request.pending_spouse_submission_id) else {
    return Ok(());
  };
  submission.pending_spouse_submission_id = Some(other_id);

  let Some(other) = tx.submission(other_id)? else {
    warn!(submission = other_id, "pending spouse submission not found");
    return Ok(());
  };
  match (other.status, other.target_parishioner_id) {
    (SubmissionStatus::Approved, Some(spouse)) => {
      if link_if_free(tx, pid, spouse)? {
        info!(parishioner = pid, spouse, "linked to already-approved spouse");
      }
    }
    _ => info!(
      submission = submission.id,
      waiting_on = other_id,
      "deferring spouse link"
    ),
  }
  Ok(())
}

/// Complete the link for the first approved submission that was waiting on
/// this one.
fn link_waiting_spouse<T: GraphTx + ?Sized>(
  tx: &mut T,
  submission_id: i64,
  pid: i64,
) -> Result<(), T::Error> {
  let waiting = tx.approved_waiting_on(submission_id)?;
  let Some((from, spouse)) = waiting
    .iter()
    .find_map(|w| w.target_parishioner_id.map(|t| (w.id, t)))
  else {
    return Ok(());
  };
  if link_if_free(tx, pid, spouse)? {
    info!(parishioner = pid, spouse, from, "linked waiting spouse");
  }
  Ok(())
}

/// Link `a` and `b` unless either is missing or already married elsewhere.
fn link_if_free<T: GraphTx + ?Sized>(
  tx: &mut T,
  a: i64,
  b: i64,
) -> Result<bool, T::Error> {
  let (Some(pa), Some(pb)) = (tx.parishioner(a)?, tx.parishioner(b)?) else {
    warn!(a, b, "spouse link skipped: parishioner missing");
    return Ok(false);
  };
  if pa.spouse_id == Some(b) {
    return Ok(false);
  }
  let taken = |p: &Parishioner, other: i64| p.spouse_id.is_some_and(|s| s != other);
  if taken(&pa, b) || taken(&pb, a) {
    warn!(a, b, "spouse link skipped: already married");
    return Ok(false);
  }
  graph::link_spouses(tx, a, b)?;
  Ok(true)
}

// ─── UPDATE ──────────────────────────────────────────────────────────────────

fn approve_update<T: GraphTx + ?Sized>(
  tx: &mut T,
  submission: &Submission,
  request: &ApprovalRequest,
) -> Result<i64, T::Error> {
  let target = submission
    .target_parishioner_id
    .ok_or(Error::MissingTarget(submission.id))?;
  let mut p = load(tx, target)?;
  validate_relationships(tx, Some(target), request)?;

  let allow = |f: SubmissionField| {
    request.fields_to_update.is_empty() || request.fields_to_update.contains(&f)
  };
  let d = &submission.data;

  if allow(SubmissionField::FirstName) && !d.first_name.is_empty() {
    p.first_name = d.first_name.trim().to_owned();
  }
  if allow(SubmissionField::LastName) && !d.last_name.is_empty() {
    p.last_name = d.last_name.trim().to_owned();
  }
  let text = [
    (SubmissionField::NameSuffix, &d.name_suffix, &mut p.name_suffix),
    (SubmissionField::Email, &d.email, &mut p.email),
    (SubmissionField::PhoneNumber, &d.phone_number, &mut p.phone_number),
    (SubmissionField::ManualSpouseName, &d.manual_spouse_name, &mut p.manual_spouse_name),
    (SubmissionField::ManualGodfatherName, &d.manual_godfather_name, &mut p.manual_godfather_name),
    (SubmissionField::ManualGodmotherName, &d.manual_godmother_name, &mut p.manual_godmother_name),
    (SubmissionField::ManualSponsorName, &d.manual_sponsor_name, &mut p.manual_sponsor_name),
  ];
  for (field, value, slot) in text {
    if allow(field) && value.is_some() {
      *slot = trimmed(value);
    }
  }
  let dates = [
    (SubmissionField::Birthday, d.birthday, &mut p.birthday),
    (SubmissionField::MarriageDate, d.marriage_date, &mut p.marriage_date),
  ];
  for (field, value, slot) in dates {
    if allow(field) && value.is_some() {
      *slot = value;
    }
  }
  if allow(SubmissionField::MembershipStatus) && d.membership_status.is_some() {
    p.status = d.membership_status;
  }
  if allow(SubmissionField::MaritalStatus) && d.marital_status.is_some() {
    p.marital_status = d.marital_status;
  }
  if d.is_orthodox {
    for (field, value, slot) in [
      (SubmissionField::BaptismalName, &d.baptismal_name, &mut p.baptismal_name),
      (SubmissionField::PatronSaint, &d.patron_saint, &mut p.patron_saint),
    ] {
      if allow(field) && value.is_some() {
        *slot = value.clone();
      }
    }
    for (field, value, slot) in [
      (SubmissionField::BaptismDate, d.baptism_date, &mut p.baptism_date),
      (SubmissionField::ChrismationDate, d.chrismation_date, &mut p.chrismation_date),
    ] {
      if allow(field) && value.is_some() {
        *slot = value;
      }
    }
  }

  update_household_address(
    tx,
    &mut p,
    d,
    [
      allow(SubmissionField::Address),
      allow(SubmissionField::City),
      allow(SubmissionField::ZipCode),
    ],
  )?;
  tx.save_parishioner(&p)?;
  info!(parishioner = target, "updated parishioner");

  apply_relationships(tx, target, request)?;

  if let Some(hid) = selected(request.selected_household_id) {
    if tx.household(hid)?.is_some() {
      let mut p = load(tx, target)?;
      p.household_id = Some(hid);
      tx.save_parishioner(&p)?;
    } else {
      warn!(household = hid, "selected household not found");
    }
  } else if let Some(name) = request
    .new_household_name
    .as_deref()
    .map(str::trim)
    .filter(|n| !n.is_empty())
  {
    let household = tx.insert_household(NewHousehold {
      family_name: Some(name.to_owned()),
      address: d.address.clone(),
      city: d.city.clone(),
      zip_code: d.zip_code.clone(),
      ..NewHousehold::default()
    })?;
    let mut p = load(tx, target)?;
    p.household_id = Some(household.id);
    tx.save_parishioner(&p)?;
  }

  let p = load(tx, target)?;
  process_children(tx, &d.children(), request, p.household_id, &p.last_name)?;
  Ok(target)
}

/// Write allowed address fields to the target's household, creating one if
/// there is none and some allowed field carries data.
fn update_household_address<T: GraphTx + ?Sized>(
  tx: &mut T,
  p: &mut Parishioner,
  d: &SubmissionData,
  [address, city, zip]: [bool; 3],
) -> Result<(), T::Error> {
  if !(address || city || zip) {
    return Ok(());
  }
  let mut household = match p.household_id {
    Some(hid) => tx.household(hid)?,
    None => None,
  };
  if household.is_none() {
    let has_data = (address && non_blank(&d.address))
      || (city && non_blank(&d.city))
      || (zip && non_blank(&d.zip_code));
    if has_data {
      let created = tx.insert_household(NewHousehold::default())?;
      p.household_id = Some(created.id);
      household = Some(created);
    }
  }
  let Some(mut household) = household else {
    return Ok(());
  };
  for (allowed, value, slot) in [
    (address, &d.address, &mut household.address),
    (city, &d.city, &mut household.city),
    (zip, &d.zip_code, &mut household.zip_code),
  ] {
    if allowed && value.is_some() {
      *slot = value.clone();
    }
  }
  tx.save_household(&household)
}

// ─── Shared ──────────────────────────────────────────────────────────────────

/// Spouse, godparents and wedding sponsor, each only when selected. Missing
/// targets are skipped.
fn apply_relationships<T: GraphTx + ?Sized>(
  tx: &mut T,
  pid: i64,
  request: &ApprovalRequest,
) -> Result<(), T::Error> {
  if let Some(spouse) = selected(request.selected_spouse_id) {
    if tx.parishioner(spouse)?.is_some() {
      graph::link_spouses(tx, pid, spouse)?;
      info!(parishioner = pid, spouse, "assigned spouse");
    } else {
      warn!(parishioner = pid, spouse, "selected spouse not found");
    }
  }

  for (pick, role) in [
    (request.selected_godfather_id, GodparentRole::Godfather),
    (request.selected_godmother_id, GodparentRole::Godmother),
  ] {
    let Some(sponsor_id) = selected(pick) else { continue };
    let Some(mut sponsor) = tx.parishioner(sponsor_id)? else {
      warn!(parishioner = pid, sponsor = sponsor_id, role = role.as_str(), "selected godparent not found");
      continue;
    };
    let mut p = load(tx, pid)?;
    graph::assign_godparent(&mut p, &mut sponsor, role)?;
    tx.save_parishioner(&p)?;
    tx.save_parishioner(&sponsor)?;
    info!(parishioner = pid, sponsor = sponsor_id, role = role.as_str(), "assigned godparent");
  }

  if let Some(sponsor_id) = selected(request.selected_sponsor_id) {
    match tx.parishioner(sponsor_id)? {
      Some(sponsor) => {
        let mut p = load(tx, pid)?;
        graph::assign_wedding_sponsor(&mut p, &sponsor)?;
        tx.save_parishioner(&p)?;
        info!(parishioner = pid, sponsor = sponsor_id, "assigned wedding sponsor");
      }
      None => {
        warn!(parishioner = pid, sponsor = sponsor_id, "selected sponsor not found");
      }
    }
  }
  Ok(())
}

/// Attach or create children. Only indexes the reviewer linked or marked for
/// creation are touched.
fn process_children<T: GraphTx + ?Sized>(
  tx: &mut T,
  children: &[ChildEntry],
  request: &ApprovalRequest,
  household_id: Option<i64>,
  parent_last: &str,
) -> Result<(), T::Error> {
  if children.is_empty()
    || (request.child_link_ids.is_empty()
      && request.child_create_indexes.is_empty())
  {
    return Ok(());
  }

  for (i, child) in children.iter().enumerate() {
    if let Some(link_id) = request.child_link_ids.get(i).copied().flatten() {
      match tx.parishioner(link_id)? {
        Some(mut existing) => {
          if let Some(hid) = household_id {
            existing.household_id = Some(hid);
            tx.save_parishioner(&existing)?;
            info!(child = link_id, household = hid, "linked existing child");
          }
        }
        None => warn!(child = link_id, "child link target not found"),
      }
    } else if request.child_create_indexes.contains(&i) {
      let Some((first_name, last_name)) = child.split_name(parent_last) else {
        warn!(index = i, "skipping child with blank name");
        continue;
      };
      let created = tx.insert_parishioner(NewParishioner {
        first_name,
        last_name,
        birthday: child.birthday,
        household_id,
        ..NewParishioner::default()
      })?;
      info!(child = created.id, "created child");
    }
  }
  Ok(())
}
