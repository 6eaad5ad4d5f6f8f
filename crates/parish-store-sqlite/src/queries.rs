//! Synchronous row-level queries. Every function takes a plain
//! `rusqlite::Connection` so it can run either directly or inside a
//! transaction (which derefs to one).

use rusqlite::{Connection, OptionalExtension as _, Params, params};

use parish_core::{
  link::SubmissionLink,
  parishioner::{Household, NewHousehold, NewParishioner, Parishioner},
  submission::{Submission, SubmissionStatus},
};

use crate::{
  Result,
  encode::{
    HOUSEHOLD_COLUMNS, LINK_COLUMNS, PARISHIONER_COLUMNS, RawLink,
    RawParishioner, RawSubmission, SUBMISSION_COLUMNS, encode_date, encode_dt,
    encode_enum, household_from_row,
  },
};

// ─── Links ───────────────────────────────────────────────────────────────────

pub fn links_where<P: Params>(
  conn: &Connection,
  clause: &str,
  params: P,
) -> Result<Vec<SubmissionLink>> {
  let sql = format!("SELECT {LINK_COLUMNS} FROM submission_links {clause}");
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(params, RawLink::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawLink::into_link).collect()
}

pub fn link_by_id(conn: &Connection, id: i64) -> Result<Option<SubmissionLink>> {
  Ok(links_where(conn, "WHERE link_id = ?1", params![id])?.pop())
}

pub fn link_by_token(
  conn: &Connection,
  token: &str,
) -> Result<Option<SubmissionLink>> {
  Ok(links_where(conn, "WHERE token = ?1", params![token])?.pop())
}

/// Insert and return the row id. `link.id` is ignored.
pub fn insert_link(conn: &Connection, link: &SubmissionLink) -> Result<i64> {
  conn.execute(
    "INSERT INTO submission_links (
       token, created_by, created_at, expires_at, is_active,
       access_count, description, max_submissions, submission_count
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    params![
      link.token,
      link.created_by,
      encode_dt(link.created_at),
      link.expires_at.map(encode_dt),
      link.is_active,
      link.access_count,
      link.description,
      link.max_submissions,
      link.submission_count,
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

/// Persist the mutable state of a link: active flag and counters.
pub fn save_link_state(conn: &Connection, link: &SubmissionLink) -> Result<()> {
  conn.execute(
    "UPDATE submission_links
        SET is_active = ?2, access_count = ?3, submission_count = ?4
      WHERE link_id = ?1",
    params![
      link.id,
      link.is_active,
      link.access_count,
      link.submission_count
    ],
  )?;
  Ok(())
}

// ─── Submissions ─────────────────────────────────────────────────────────────

pub fn submissions_where<P: Params>(
  conn: &Connection,
  clause: &str,
  params: P,
) -> Result<Vec<Submission>> {
  let sql = format!("SELECT {SUBMISSION_COLUMNS} FROM submissions {clause}");
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(params, RawSubmission::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawSubmission::into_submission).collect()
}

pub fn submission_by_id(conn: &Connection, id: i64) -> Result<Option<Submission>> {
  Ok(submissions_where(conn, "WHERE submission_id = ?1", params![id])?.pop())
}

pub fn submissions_by_status(
  conn: &Connection,
  status: SubmissionStatus,
) -> Result<Vec<Submission>> {
  submissions_where(
    conn,
    "WHERE status = ?1 ORDER BY submitted_at DESC, submission_id DESC",
    params![encode_enum(status)],
  )
}

pub fn count_by_status(conn: &Connection, status: SubmissionStatus) -> Result<u64> {
  let n: i64 = conn.query_row(
    "SELECT COUNT(*) FROM submissions WHERE status = ?1",
    params![encode_enum(status)],
    |r| r.get(0),
  )?;
  Ok(u64::try_from(n).unwrap_or_default())
}

/// Insert and return the row id. `submission.id` is ignored.
pub fn insert_submission(conn: &Connection, s: &Submission) -> Result<i64> {
  conn.execute(
    "INSERT INTO submissions (
       link_id, submission_type, status, submitted_at, reviewed_at,
       reviewed_by, review_notes, target_parishioner_id,
       pending_spouse_submission_id, data_json
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    params![
      s.link_id,
      encode_enum(s.submission_type),
      encode_enum(s.status),
      encode_dt(s.submitted_at),
      s.reviewed_at.map(encode_dt),
      s.reviewed_by,
      s.review_notes,
      s.target_parishioner_id,
      s.pending_spouse_submission_id,
      serde_json::to_string(&s.data)?,
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn update_submission(conn: &Connection, s: &Submission) -> Result<()> {
  conn.execute(
    "UPDATE submissions
        SET status = ?2, reviewed_at = ?3, reviewed_by = ?4,
            review_notes = ?5, target_parishioner_id = ?6,
            pending_spouse_submission_id = ?7, data_json = ?8
      WHERE submission_id = ?1",
    params![
      s.id,
      encode_enum(s.status),
      s.reviewed_at.map(encode_dt),
      s.reviewed_by,
      s.review_notes,
      s.target_parishioner_id,
      s.pending_spouse_submission_id,
      serde_json::to_string(&s.data)?,
    ],
  )?;
  Ok(())
}

// ─── Parishioners ────────────────────────────────────────────────────────────

fn ids_where(conn: &Connection, column: &str, id: i64) -> Result<Vec<i64>> {
  let sql = format!(
    "SELECT parishioner_id FROM parishioners WHERE {column} = ?1
      ORDER BY parishioner_id"
  );
  let mut stmt = conn.prepare(&sql)?;
  let ids = stmt
    .query_map(params![id], |r| r.get(0))?
    .collect::<rusqlite::Result<Vec<i64>>>()?;
  Ok(ids)
}

/// Fill the lists derived from other rows' godparent pointers.
fn with_godchildren(conn: &Connection, mut p: Parishioner) -> Result<Parishioner> {
  p.godchildren_as_godfather = ids_where(conn, "godfather_id", p.id)?;
  p.godchildren_as_godmother = ids_where(conn, "godmother_id", p.id)?;
  Ok(p)
}

pub fn parishioners_where<P: Params>(
  conn: &Connection,
  clause: &str,
  params: P,
) -> Result<Vec<Parishioner>> {
  let sql = format!("SELECT {PARISHIONER_COLUMNS} FROM parishioners {clause}");
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(params, RawParishioner::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws
    .into_iter()
    .map(|raw| with_godchildren(conn, raw.into_parishioner()?))
    .collect()
}

pub fn parishioner_by_id(
  conn: &Connection,
  id: i64,
) -> Result<Option<Parishioner>> {
  Ok(parishioners_where(conn, "WHERE parishioner_id = ?1", params![id])?.pop())
}

pub fn insert_parishioner(
  conn: &Connection,
  input: NewParishioner,
) -> Result<Parishioner> {
  let mut p = input.into_parishioner(0);
  conn.execute(
    "INSERT INTO parishioners (first_name, last_name) VALUES (?1, ?2)",
    params![p.first_name, p.last_name],
  )?;
  p.id = conn.last_insert_rowid();
  update_parishioner(conn, &p)?;
  Ok(p)
}

pub fn update_parishioner(conn: &Connection, p: &Parishioner) -> Result<()> {
  conn.execute(
    "UPDATE parishioners
        SET first_name = ?2, last_name = ?3, name_suffix = ?4,
            birthday = ?5, death_date = ?6, email = ?7, phone_number = ?8,
            status = ?9, marital_status = ?10, marriage_date = ?11,
            baptismal_name = ?12, patron_saint = ?13, baptism_date = ?14,
            chrismation_date = ?15, spouse_id = ?16, godfather_id = ?17,
            godmother_id = ?18, wedding_sponsor_id = ?19, household_id = ?20,
            manual_spouse_name = ?21, manual_godfather_name = ?22,
            manual_godmother_name = ?23, manual_sponsor_name = ?24
      WHERE parishioner_id = ?1",
    params![
      p.id,
      p.first_name,
      p.last_name,
      p.name_suffix,
      p.birthday.map(encode_date),
      p.death_date.map(encode_date),
      p.email,
      p.phone_number,
      p.status.map(encode_enum),
      p.marital_status.map(encode_enum),
      p.marriage_date.map(encode_date),
      p.baptismal_name,
      p.patron_saint,
      p.baptism_date.map(encode_date),
      p.chrismation_date.map(encode_date),
      p.spouse_id,
      p.godfather_id,
      p.godmother_id,
      p.wedding_sponsor_id,
      p.household_id,
      p.manual_spouse_name,
      p.manual_godfather_name,
      p.manual_godmother_name,
      p.manual_sponsor_name,
    ],
  )?;
  Ok(())
}

// ─── Households ──────────────────────────────────────────────────────────────

pub fn household_by_id(conn: &Connection, id: i64) -> Result<Option<Household>> {
  Ok(
    conn
      .query_row(
        &format!(
          "SELECT {HOUSEHOLD_COLUMNS} FROM households WHERE household_id = ?1"
        ),
        params![id],
        household_from_row,
      )
      .optional()?,
  )
}

pub fn all_households(conn: &Connection) -> Result<Vec<Household>> {
  let sql = format!(
    "SELECT {HOUSEHOLD_COLUMNS} FROM households
      ORDER BY family_name IS NULL, family_name, household_id"
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map([], household_from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

pub fn insert_household(conn: &Connection, input: NewHousehold) -> Result<Household> {
  conn.execute(
    "INSERT INTO households (
       family_name, address, city, zip_code, phone_number, email
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      input.family_name,
      input.address,
      input.city,
      input.zip_code,
      input.phone_number,
      input.email,
    ],
  )?;
  Ok(Household {
    id:           conn.last_insert_rowid(),
    family_name:  input.family_name,
    address:      input.address,
    city:         input.city,
    zip_code:     input.zip_code,
    phone_number: input.phone_number,
    email:        input.email,
  })
}

pub fn update_household(conn: &Connection, h: &Household) -> Result<()> {
  conn.execute(
    "UPDATE households
        SET family_name = ?2, address = ?3, city = ?4, zip_code = ?5,
            phone_number = ?6, email = ?7
      WHERE household_id = ?1",
    params![
      h.id,
      h.family_name,
      h.address,
      h.city,
      h.zip_code,
      h.phone_number,
      h.email,
    ],
  )?;
  Ok(())
}
