//! The ordered abuse-resistance gate.
//!
//! A public POST passes through, in order: honeypot, timing window, per-IP
//! limit, per-token limit, CAPTCHA, suspicious-content scan. The caller then
//! resolves the link with [`AbuseGate::admit_link`], turns the form into a
//! submission with [`build_submission`], persists it, and finally calls
//! [`AbuseGate::record_accepted`].
//!
//! Log lines carry at most the first eight characters of a token.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use parish_core::{
  link::{SubmissionLink, token_prefix},
  parishioner::{MaritalStatus, MembershipStatus},
  submission::{ChildEntry, NewSubmission, SubmissionData, SubmissionType, validate},
};

use crate::{
  Rejection, Result,
  captcha::RecaptchaVerifier,
  rate_limit::RateLimiter,
  sanitize::{
    MAX_GENERAL_LENGTH, MAX_NAME_LENGTH, MAX_SUFFIX_LENGTH,
    contains_suspicious_content, sanitize_address, sanitize_city,
    sanitize_email, sanitize_name, sanitize_phone, sanitize_zip_code,
  },
};

/// Seconds a human needs at minimum to fill in the form.
pub const MIN_FILL_SECS: i64 = 5;
/// Seconds after which a loaded form is considered stale.
pub const MAX_FILL_SECS: i64 = 1800;
/// Children beyond this many are ignored.
pub const MAX_CHILDREN: usize = 20;

// ─── Form ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChildForm {
  pub name:     String,
  pub birthday: Option<String>,
}

/// Raw public form input, before any cleanup. Dates arrive as strings so an
/// unparseable value can be dropped instead of failing the whole request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PublicForm {
  pub submission_type:   String,
  pub first_name:        String,
  pub last_name:         Option<String>,
  pub name_suffix:       Option<String>,
  pub birthday:          Option<String>,
  pub email:             Option<String>,
  pub phone_number:      Option<String>,
  pub membership_status: Option<String>,
  pub marital_status:    Option<String>,
  pub marriage_date:     Option<String>,

  pub is_orthodox:      bool,
  pub baptismal_name:   Option<String>,
  pub patron_saint:     Option<String>,
  pub baptism_date:     Option<String>,
  pub chrismation_date: Option<String>,

  pub manual_spouse_name:    Option<String>,
  pub manual_godfather_name: Option<String>,
  pub manual_godmother_name: Option<String>,
  pub manual_sponsor_name:   Option<String>,

  pub spouse_first_name:   Option<String>,
  pub spouse_last_name:    Option<String>,
  pub spouse_email:        Option<String>,
  pub spouse_phone_number: Option<String>,

  pub address:  Option<String>,
  pub city:     Option<String>,
  pub zip_code: Option<String>,

  pub children: Vec<ChildForm>,

  /// Honeypot. Hidden from humans; anything here means a bot.
  pub website:        Option<String>,
  /// Epoch seconds issued with the form view.
  pub form_load_time: Option<i64>,
  pub captcha_token:  Option<String>,
}

/// Outcome of a screen that did not reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
  /// Proceed with the submission.
  Accept,
  /// Honeypot tripped. Answer as if accepted, persist nothing.
  Decoy,
}

// ─── Gate ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AbuseGate {
  limiter: Arc<dyn RateLimiter>,
  captcha: Option<RecaptchaVerifier>,
}

impl AbuseGate {
  /// `captcha` is `None` when verification is switched off.
  pub fn new(
    limiter: Arc<dyn RateLimiter>,
    captcha: Option<RecaptchaVerifier>,
  ) -> Self {
    Self { limiter, captcha }
  }

  pub fn limiter(&self) -> &Arc<dyn RateLimiter> { &self.limiter }

  pub fn captcha(&self) -> Option<&RecaptchaVerifier> { self.captcha.as_ref() }

  /// Checks for a form view: address limit, then link status, then the
  /// token limit.
  pub fn admit_view<'l>(
    &self,
    token: &str,
    link: Option<&'l SubmissionLink>,
    ip: &str,
    now: DateTime<Utc>,
  ) -> Result<&'l SubmissionLink> {
    if !self.limiter.is_ip_allowed(ip, now) {
      warn!(ip, "rate limited address requested form");
      return Err(Rejection::TooManyRequests);
    }
    let link = self.admit_link(token, link, now)?;
    if !self.limiter.is_token_allowed(token, now) {
      warn!(token = token_prefix(token), "rate limited link requested form");
      return Err(Rejection::TokenRateLimited);
    }
    Ok(link)
  }

  /// The link must exist and currently accept submissions.
  pub fn admit_link<'l>(
    &self,
    token: &str,
    link: Option<&'l SubmissionLink>,
    now: DateTime<Utc>,
  ) -> Result<&'l SubmissionLink> {
    let Some(link) = link else {
      warn!(token = token_prefix(token), "unknown link token");
      return Err(Rejection::UnknownLink);
    };
    let status = link.status(now);
    if let Some(rejection) = Rejection::for_link(status) {
      warn!(
        token = token_prefix(token),
        %status,
        "link does not accept submissions"
      );
      return Err(rejection);
    }
    Ok(link)
  }

  /// Run the ordered abuse checks over a POSTed form.
  pub async fn screen(
    &self,
    form: &PublicForm,
    token: &str,
    ip: &str,
    now: DateTime<Utc>,
  ) -> Result<Verdict> {
    let prefix = token_prefix(token);

    if form.website.as_deref().is_some_and(|w| !w.trim().is_empty()) {
      warn!(ip, token = prefix, "honeypot triggered");
      return Ok(Verdict::Decoy);
    }

    let Some(loaded_at) = form.form_load_time else {
      warn!(ip, token = prefix, "form submitted without load time");
      return Err(Rejection::SessionExpired);
    };
    let Some(elapsed) = now.timestamp().checked_sub(loaded_at) else {
      warn!(ip, token = prefix, loaded_at, "form load time out of range");
      return Err(Rejection::SessionExpired);
    };
    if elapsed < MIN_FILL_SECS {
      warn!(ip, token = prefix, elapsed, "form submitted too quickly");
      return Err(Rejection::TooFast);
    }
    if elapsed > MAX_FILL_SECS {
      warn!(ip, token = prefix, elapsed, "form session expired");
      return Err(Rejection::SessionExpired);
    }

    if !self.limiter.is_ip_allowed(ip, now) {
      warn!(ip, token = prefix, "rate limited address attempted submission");
      return Err(Rejection::IpRateLimited);
    }
    if !self.limiter.is_token_allowed(token, now) {
      warn!(token = prefix, "rate limited link attempted submission");
      return Err(Rejection::TokenRateLimited);
    }

    if let Some(captcha) = &self.captcha {
      let response = form.captcha_token.as_deref().unwrap_or_default();
      if !captcha.passes(response, ip).await {
        warn!(ip, token = prefix, "captcha verification failed");
        return Err(Rejection::CaptchaFailed);
      }
    }

    let screened = [
      Some(form.first_name.as_str()),
      form.last_name.as_deref(),
      form.email.as_deref(),
      form.address.as_deref(),
    ];
    if screened.into_iter().flatten().any(contains_suspicious_content) {
      warn!(ip, token = prefix, "suspicious content in submission");
      return Err(Rejection::SuspiciousContent);
    }

    Ok(Verdict::Accept)
  }

  /// Count an accepted submission against both limits.
  pub fn record_accepted(&self, ip: &str, token: &str, now: DateTime<Utc>) {
    self.limiter.record_ip_submission(ip, now);
    self.limiter.record_token_submission(token, now);
    info!(ip, token = token_prefix(token), "accepted public submission");
  }
}

// ─── Building ────────────────────────────────────────────────────────────────

fn name(raw: &Option<String>, max: usize) -> Option<String> {
  raw.as_deref().and_then(|s| sanitize_name(s, max))
}

fn date(field: &'static str, raw: &Option<String>) -> Option<NaiveDate> {
  let raw = raw.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
  match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
    Ok(d) => Some(d),
    Err(_) => {
      debug!(field, value = raw, "dropping unparseable date");
      None
    }
  }
}

fn membership(raw: &Option<String>) -> Option<MembershipStatus> {
  let raw = raw.as_deref().filter(|s| !s.is_empty())?;
  Some(raw.parse().unwrap_or(MembershipStatus::Visitor))
}

fn marital(raw: &Option<String>) -> Option<MaritalStatus> {
  raw.as_deref().and_then(|s| s.parse().ok())
}

fn children(form: &PublicForm) -> Vec<ChildEntry> {
  form
    .children
    .iter()
    .take(MAX_CHILDREN)
    .filter_map(|child| {
      let name = sanitize_name(&child.name, MAX_NAME_LENGTH)?;
      Some(ChildEntry {
        name:     Some(name),
        birthday: date("child_birthday", &child.birthday),
      })
    })
    .collect()
}

/// Sanitise and type-check a screened form. `today` bounds birthday and
/// marriage date.
pub fn build_submission(
  form: &PublicForm,
  today: NaiveDate,
) -> Result<NewSubmission> {
  let first_name = sanitize_name(&form.first_name, MAX_NAME_LENGTH)
    .ok_or(Rejection::FirstNameRequired)?;

  let email = form.email.as_deref().and_then(sanitize_email);
  if email.is_none()
    && form.email.as_deref().is_some_and(|e| !e.trim().is_empty())
  {
    return Err(Rejection::InvalidEmail);
  }

  let submission_type: SubmissionType = form
    .submission_type
    .trim()
    .parse()
    .map_err(|_| Rejection::InvalidSubmissionType)?;

  let birthday = date("birthday", &form.birthday);
  if birthday.is_some_and(|b| b > today) {
    return Err(Rejection::FutureBirthday);
  }
  let marriage_date = date("marriage_date", &form.marriage_date);
  if marriage_date.is_some_and(|m| m > today) {
    return Err(Rejection::FutureMarriage);
  }

  let orthodox = form.is_orthodox;
  let mut data = SubmissionData {
    first_name,
    last_name: name(&form.last_name, MAX_NAME_LENGTH).unwrap_or_default(),
    name_suffix: name(&form.name_suffix, MAX_SUFFIX_LENGTH),
    birthday,
    email,
    phone_number: form.phone_number.as_deref().and_then(sanitize_phone),
    membership_status: membership(&form.membership_status),
    marital_status: marital(&form.marital_status),
    marriage_date,

    is_orthodox: orthodox,
    baptismal_name: orthodox
      .then(|| name(&form.baptismal_name, MAX_NAME_LENGTH))
      .flatten(),
    patron_saint: orthodox
      .then(|| name(&form.patron_saint, MAX_GENERAL_LENGTH))
      .flatten(),
    baptism_date: orthodox
      .then(|| date("baptism_date", &form.baptism_date))
      .flatten(),
    chrismation_date: orthodox
      .then(|| date("chrismation_date", &form.chrismation_date))
      .flatten(),

    manual_spouse_name: name(&form.manual_spouse_name, MAX_NAME_LENGTH),
    manual_godfather_name: name(&form.manual_godfather_name, MAX_NAME_LENGTH),
    manual_godmother_name: name(&form.manual_godmother_name, MAX_NAME_LENGTH),
    manual_sponsor_name: name(&form.manual_sponsor_name, MAX_NAME_LENGTH),

    spouse_first_name: name(&form.spouse_first_name, MAX_NAME_LENGTH),
    spouse_last_name: name(&form.spouse_last_name, MAX_NAME_LENGTH),
    spouse_email: form.spouse_email.as_deref().and_then(sanitize_email),
    spouse_phone_number: form
      .spouse_phone_number
      .as_deref()
      .and_then(sanitize_phone),

    address: form.address.as_deref().and_then(sanitize_address),
    city: form.city.as_deref().and_then(sanitize_city),
    zip_code: form.zip_code.as_deref().and_then(sanitize_zip_code),

    children_json: None,
  };
  data
    .set_children(&children(form))
    .map_err(|_| Rejection::SaveFailed)?;

  let errors = validate(&data);
  if !errors.is_empty() {
    return Err(Rejection::Invalid(errors));
  }

  Ok(NewSubmission { submission_type, data })
}

#[cfg(test)]
mod tests {
  use chrono::{TimeDelta, TimeZone};
  use parish_core::link::NewLink;

  use super::*;
  use crate::rate_limit::InMemoryRateLimiter;

  const TOKEN: &str = "0b7c1d2e-3f40-4a5b-8c6d-7e8f90a1b2c3";
  const IP: &str = "203.0.113.20";

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() }

  fn today() -> NaiveDate { now().date_naive() }

  fn gate() -> AbuseGate {
    AbuseGate::new(Arc::new(InMemoryRateLimiter::default()), None)
  }

  fn form() -> PublicForm {
    PublicForm {
      submission_type: "NEW".into(),
      first_name: "Mary".into(),
      last_name: Some("Smith".into()),
      form_load_time: Some(now().timestamp() - 60),
      ..Default::default()
    }
  }

  fn link() -> SubmissionLink {
    NewLink {
      created_by:      "priest@example.org".into(),
      expires_at:      None,
      description:     None,
      max_submissions: Some(1),
    }
    .into_link(1, now())
  }

  // ── Screening ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn clean_form_is_accepted() {
    assert_eq!(gate().screen(&form(), TOKEN, IP, now()).await, Ok(Verdict::Accept));
  }

  #[tokio::test]
  async fn honeypot_is_a_silent_decoy() {
    let f = PublicForm {
      website: Some("http://spam.example".into()),
      first_name: "<script>x</script>".into(),
      form_load_time: None,
      ..form()
    };
    assert_eq!(gate().screen(&f, TOKEN, IP, now()).await, Ok(Verdict::Decoy));
  }

  #[tokio::test]
  async fn timing_window_is_enforced() {
    let gate = gate();
    let at = |secs: i64| PublicForm {
      form_load_time: Some(now().timestamp() - secs),
      ..form()
    };

    assert_eq!(
      gate.screen(&at(2), TOKEN, IP, now()).await,
      Err(Rejection::TooFast)
    );
    assert_eq!(
      gate.screen(&at(1801), TOKEN, IP, now()).await,
      Err(Rejection::SessionExpired)
    );
    assert_eq!(gate.screen(&at(5), TOKEN, IP, now()).await, Ok(Verdict::Accept));
    assert_eq!(
      gate.screen(&at(1800), TOKEN, IP, now()).await,
      Ok(Verdict::Accept)
    );

    let missing = PublicForm { form_load_time: None, ..form() };
    assert_eq!(
      gate.screen(&missing, TOKEN, IP, now()).await,
      Err(Rejection::SessionExpired)
    );
  }

  #[tokio::test]
  async fn extreme_load_times_are_refused_without_overflow() {
    let gate = gate();
    let at = |loaded: i64| PublicForm { form_load_time: Some(loaded), ..form() };

    assert_eq!(
      gate.screen(&at(i64::MIN), TOKEN, IP, now()).await,
      Err(Rejection::SessionExpired)
    );
    assert_eq!(
      gate.screen(&at(i64::MAX), TOKEN, IP, now()).await,
      Err(Rejection::TooFast)
    );
  }

  #[tokio::test]
  async fn sixth_submission_from_an_address_is_refused_on_any_link() {
    let gate = gate();
    for i in 0..5 {
      let at = now() + TimeDelta::minutes(i);
      let token = format!("token-{i}");
      assert_eq!(
        gate.screen(&form(), &token, IP, at).await.map(|_| ()),
        Ok(()),
        "attempt {i}"
      );
      gate.record_accepted(IP, &token, at);
    }

    let later = now() + TimeDelta::minutes(10);
    let fresh = PublicForm { form_load_time: Some(later.timestamp() - 30), ..form() };
    assert_eq!(
      gate.screen(&fresh, "a-brand-new-token", IP, later).await,
      Err(Rejection::IpRateLimited)
    );
    assert_eq!(
      gate.screen(&fresh, "a-brand-new-token", "198.51.100.1", later).await,
      Ok(Verdict::Accept)
    );
  }

  #[tokio::test]
  async fn token_limit_applies_across_addresses() {
    let gate = gate();
    for i in 0..10 {
      gate.record_accepted(&format!("10.0.0.{i}"), TOKEN, now());
    }
    assert_eq!(
      gate.screen(&form(), TOKEN, IP, now()).await,
      Err(Rejection::TokenRateLimited)
    );
  }

  #[tokio::test]
  async fn suspicious_content_is_rejected() {
    let gate = gate();
    let f = PublicForm {
      address: Some("1 Main St' UNION SELECT password".into()),
      ..form()
    };
    assert_eq!(
      gate.screen(&f, TOKEN, IP, now()).await,
      Err(Rejection::SuspiciousContent)
    );

    let f = PublicForm { email: Some("x@y.com --".into()), ..form() };
    assert_eq!(
      gate.screen(&f, TOKEN, IP, now()).await,
      Err(Rejection::SuspiciousContent)
    );

    let f = PublicForm {
      first_name: "Mary onfocus=alert(1)".into(),
      ..form()
    };
    assert_eq!(
      gate.screen(&f, TOKEN, IP, now()).await,
      Err(Rejection::SuspiciousContent)
    );
  }

  // ── Links ───────────────────────────────────────────────────────────────

  #[test]
  fn link_checks_report_the_violated_condition() {
    let gate = gate();
    assert_eq!(
      gate.admit_link(TOKEN, None, now()).map(|_| ()),
      Err(Rejection::UnknownLink)
    );

    let mut exhausted = link();
    exhausted.submission_count = 1;
    assert_eq!(
      gate.admit_link(TOKEN, Some(&exhausted), now()).map(|_| ()),
      Err(Rejection::LinkAtLimit)
    );

    let mut expired = link();
    expired.expires_at = Some(now() - TimeDelta::seconds(1));
    assert_eq!(
      gate.admit_link(TOKEN, Some(&expired), now()).map(|_| ()),
      Err(Rejection::LinkExpired)
    );

    let mut inactive = expired.clone();
    inactive.deactivate();
    assert_eq!(
      gate.admit_link(TOKEN, Some(&inactive), now()).map(|_| ()),
      Err(Rejection::LinkInactive)
    );

    let ok = link();
    assert_eq!(gate.admit_link(TOKEN, Some(&ok), now()).map(|l| l.id), Ok(1));
  }

  #[test]
  fn form_view_checks_address_before_link() {
    let gate = gate();
    for _ in 0..5 {
      gate.limiter().record_ip_submission(IP, now());
    }
    assert_eq!(
      gate.admit_view(TOKEN, None, IP, now()).map(|_| ()),
      Err(Rejection::TooManyRequests)
    );
    assert_eq!(
      gate.admit_view(TOKEN, None, "198.51.100.2", now()).map(|_| ()),
      Err(Rejection::UnknownLink)
    );
  }

  // ── Building ────────────────────────────────────────────────────────────

  #[test]
  fn blank_first_name_is_rejected() {
    let f = PublicForm { first_name: "   <b></b> ".into(), ..form() };
    let err = build_submission(&f, today()).unwrap_err();
    assert_eq!(err, Rejection::FirstNameRequired);
    assert!(err.to_string().contains("First name"));
  }

  #[test]
  fn missing_last_name_fails_validation() {
    let f = PublicForm { last_name: None, ..form() };
    assert_eq!(
      build_submission(&f, today()),
      Err(Rejection::Invalid(vec!["Last name is required".into()]))
    );
  }

  #[test]
  fn bad_email_and_type_are_rejected() {
    let f = PublicForm { email: Some("nobody at home".into()), ..form() };
    assert_eq!(build_submission(&f, today()), Err(Rejection::InvalidEmail));

    let f = PublicForm { submission_type: "DELETE".into(), ..form() };
    assert_eq!(
      build_submission(&f, today()),
      Err(Rejection::InvalidSubmissionType)
    );
  }

  #[test]
  fn future_dates_are_rejected_and_garbage_dropped() {
    let f = PublicForm { birthday: Some("2030-01-01".into()), ..form() };
    assert_eq!(build_submission(&f, today()), Err(Rejection::FutureBirthday));

    let f = PublicForm { marriage_date: Some("2024-06-02".into()), ..form() };
    assert_eq!(build_submission(&f, today()), Err(Rejection::FutureMarriage));

    let f = PublicForm { birthday: Some("last tuesday".into()), ..form() };
    assert_eq!(build_submission(&f, today()).unwrap().data.birthday, None);
  }

  #[test]
  fn fields_are_sanitised_and_statuses_fall_back() {
    let f = PublicForm {
      submission_type: "UPDATE".into(),
      first_name: "  <i>Mary</i>   Ann ".into(),
      email: Some("Mary@Example.com".into()),
      phone_number: Some("not a phone".into()),
      membership_status: Some("ARCHBISHOP".into()),
      marital_status: Some("ENGAGED".into()),
      zip_code: Some("10001".into()),
      ..form()
    };
    let new = build_submission(&f, today()).unwrap();
    assert_eq!(new.submission_type, SubmissionType::Update);
    assert_eq!(new.data.first_name, "Mary Ann");
    assert_eq!(new.data.email.as_deref(), Some("mary@example.com"));
    assert_eq!(new.data.phone_number, None);
    assert_eq!(new.data.membership_status, Some(MembershipStatus::Visitor));
    assert_eq!(new.data.marital_status, None);
    assert_eq!(new.data.zip_code.as_deref(), Some("10001"));
  }

  #[test]
  fn orthodox_block_is_read_only_when_flagged() {
    let mut f = PublicForm {
      baptismal_name: Some("Photini".into()),
      baptism_date: Some("2000-01-06".into()),
      ..form()
    };
    let plain = build_submission(&f, today()).unwrap();
    assert_eq!(plain.data.baptismal_name, None);
    assert_eq!(plain.data.baptism_date, None);

    f.is_orthodox = true;
    let orthodox = build_submission(&f, today()).unwrap();
    assert_eq!(orthodox.data.baptismal_name.as_deref(), Some("Photini"));
    assert_eq!(
      orthodox.data.baptism_date,
      NaiveDate::from_ymd_opt(2000, 1, 6)
    );
  }

  #[test]
  fn children_are_capped_and_blank_names_skipped() {
    let mut kids: Vec<ChildForm> = (0..25)
      .map(|i| ChildForm {
        name:     format!("Child {i}"),
        birthday: Some("2015-03-04".into()),
      })
      .collect();
    kids[0].name = "<br>".into();
    kids[1].birthday = Some("soon".into());

    let f = PublicForm { children: kids, ..form() };
    let new = build_submission(&f, today()).unwrap();
    let children = new.data.children();
    assert_eq!(children.len(), MAX_CHILDREN - 1);
    assert_eq!(children[0].name.as_deref(), Some("Child 1"));
    assert_eq!(children[0].birthday, None);
    assert_eq!(children[1].birthday, NaiveDate::from_ymd_opt(2015, 3, 4));
  }
}
