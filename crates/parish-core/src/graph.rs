//! Invariant-preserving mutators for the parishioner relationship graph.
//!
//! The record-level helpers (`marry`, `sever`, `assign_godparent`, ...) work
//! on two in-memory parishioners and keep both sides consistent. The
//! transaction-level helpers (`link_spouses`, `divorce`, `depart`) load,
//! mutate and save through a [`GraphTx`], and are shared by the approval
//! engine and direct reviewer edits.

use chrono::NaiveDate;
use tracing::info;

use crate::{
  Error, Result,
  parishioner::{MaritalStatus, MembershipStatus, Parishioner},
  store::GraphTx,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GodparentRole {
  Godfather,
  Godmother,
}

impl GodparentRole {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Godfather => "godfather",
      Self::Godmother => "godmother",
    }
  }
}

// ─── Record-level helpers ────────────────────────────────────────────────────

/// Establish the symmetric spouse pair `a ↔ b`. Idempotent.
///
/// Fails with [`Error::StaleSpouse`] if either side still points at a third
/// party; callers sever that link first so nobody is silently orphaned.
pub fn marry(a: &mut Parishioner, b: &mut Parishioner) -> Result<()> {
  if a.id == b.id {
    return Err(Error::SelfRelationship("spouse"));
  }
  for (p, other) in [(&*a, b.id), (&*b, a.id)] {
    if let Some(partner_id) = p.spouse_id.filter(|&s| s != other) {
      return Err(Error::StaleSpouse { id: p.id, partner_id });
    }
  }
  a.spouse_id = Some(b.id);
  b.spouse_id = Some(a.id);
  a.marital_status = Some(MaritalStatus::Married);
  b.marital_status = Some(MaritalStatus::Married);
  Ok(())
}

/// Clear the spouse pointers between `a` and `b`. Marital status is left to
/// the caller: divorce and bereavement differ.
pub fn sever(a: &mut Parishioner, b: &mut Parishioner) {
  if a.spouse_id == Some(b.id) {
    a.spouse_id = None;
  }
  if b.spouse_id == Some(a.id) {
    b.spouse_id = None;
  }
}

/// Point `child` at `sponsor` and record the reverse edge once.
pub fn assign_godparent(
  child: &mut Parishioner,
  sponsor: &mut Parishioner,
  role: GodparentRole,
) -> Result<()> {
  if child.id == sponsor.id {
    return Err(Error::SelfRelationship(role.as_str()));
  }
  let (slot, reverse) = match role {
    GodparentRole::Godfather => {
      (&mut child.godfather_id, &mut sponsor.godchildren_as_godfather)
    }
    GodparentRole::Godmother => {
      (&mut child.godmother_id, &mut sponsor.godchildren_as_godmother)
    }
  };
  *slot = Some(sponsor.id);
  if !reverse.contains(&child.id) {
    reverse.push(child.id);
  }
  Ok(())
}

pub fn assign_wedding_sponsor(
  p: &mut Parishioner,
  sponsor: &Parishioner,
) -> Result<()> {
  if p.id == sponsor.id {
    return Err(Error::SelfRelationship("sponsor"));
  }
  p.wedding_sponsor_id = Some(sponsor.id);
  Ok(())
}

/// One-way: DEPARTED with a death date. A surviving spouse becomes WIDOWED
/// and the link is cleared on both sides.
pub fn mark_departed(
  p: &mut Parishioner,
  spouse: Option<&mut Parishioner>,
  on: NaiveDate,
) {
  p.status = Some(MembershipStatus::Departed);
  p.death_date = Some(on);
  if let Some(spouse) = spouse
    && spouse.spouse_id == Some(p.id)
  {
    spouse.marital_status = Some(MaritalStatus::Widowed);
    spouse.spouse_id = None;
  }
  p.spouse_id = None;
}

// ─── Transaction-level helpers ───────────────────────────────────────────────

pub(crate) fn load<T: GraphTx + ?Sized>(
  tx: &mut T,
  id: i64,
) -> Result<Parishioner, T::Error> {
  tx.parishioner(id)?
    .ok_or_else(|| Error::ParishionerNotFound(id).into())
}

/// Drop `p`'s link to anyone other than `keep`, clearing the third party's
/// back-pointer too.
fn detach_stale<T: GraphTx + ?Sized>(
  tx: &mut T,
  p: &mut Parishioner,
  keep: i64,
) -> Result<(), T::Error> {
  let Some(old) = p.spouse_id.filter(|&s| s != keep) else {
    return Ok(());
  };
  if let Some(mut third) = tx.parishioner(old)?
    && third.spouse_id == Some(p.id)
  {
    third.spouse_id = None;
    tx.save_parishioner(&third)?;
  }
  p.spouse_id = None;
  info!(parishioner = p.id, former_spouse = old, "severed stale spouse link");
  Ok(())
}

/// Marry `a` and `b` by id, severing stale links symmetrically first.
pub fn link_spouses<T: GraphTx + ?Sized>(
  tx: &mut T,
  a_id: i64,
  b_id: i64,
) -> Result<(Parishioner, Parishioner), T::Error> {
  if a_id == b_id {
    return Err(Error::SelfRelationship("spouse").into());
  }
  let mut a = load(tx, a_id)?;
  let mut b = load(tx, b_id)?;
  detach_stale(tx, &mut a, b_id)?;
  detach_stale(tx, &mut b, a_id)?;
  marry(&mut a, &mut b)?;
  tx.save_parishioner(&a)?;
  tx.save_parishioner(&b)?;
  Ok((a, b))
}

/// Sever `id`'s marriage; both sides become DIVORCED.
pub fn divorce<T: GraphTx + ?Sized>(
  tx: &mut T,
  id: i64,
) -> Result<(Parishioner, Parishioner), T::Error> {
  let mut a = load(tx, id)?;
  let Some(spouse_id) = a.spouse_id else {
    return Err(
      Error::Validation(format!("{} has no spouse to divorce", a.full_name()))
        .into(),
    );
  };
  let mut b = load(tx, spouse_id)?;
  sever(&mut a, &mut b);
  a.spouse_id = None;
  a.marital_status = Some(MaritalStatus::Divorced);
  b.marital_status = Some(MaritalStatus::Divorced);
  tx.save_parishioner(&a)?;
  tx.save_parishioner(&b)?;
  Ok((a, b))
}

pub fn depart<T: GraphTx + ?Sized>(
  tx: &mut T,
  id: i64,
  on: NaiveDate,
) -> Result<Parishioner, T::Error> {
  let mut p = load(tx, id)?;
  let mut spouse = match p.spouse_id {
    Some(s) => tx.parishioner(s)?,
    None => None,
  };
  mark_departed(&mut p, spouse.as_mut(), on);
  tx.save_parishioner(&p)?;
  if let Some(spouse) = spouse {
    tx.save_parishioner(&spouse)?;
  }
  Ok(p)
}
