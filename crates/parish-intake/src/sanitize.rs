//! Free-text cleanup for visitor input.
//!
//! Every accepted string is trimmed, stripped of script blocks and HTML tags,
//! whitespace-collapsed and length-capped. Structured fields (email, phone,
//! zip code) must also match a shape; when they don't, the field is dropped
//! rather than the whole submission rejected.

use std::sync::LazyLock;

use regex::Regex;

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_EMAIL_LENGTH: usize = 100;
pub const MAX_PHONE_LENGTH: usize = 20;
pub const MAX_ADDRESS_LENGTH: usize = 255;
pub const MAX_CITY_LENGTH: usize = 100;
pub const MAX_ZIP_LENGTH: usize = 20;
pub const MAX_SUFFIX_LENGTH: usize = 10;
pub const MAX_GENERAL_LENGTH: usize = 150;

fn regex(pattern: &str) -> Regex {
  Regex::new(pattern).expect("static regex is valid")
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
  regex(
    r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
  )
});
static PHONE: LazyLock<Regex> =
  LazyLock::new(|| regex(r"^[0-9\s().+-]{7,20}$"));
static ZIP_CODE: LazyLock<Regex> =
  LazyLock::new(|| regex(r"^[a-zA-Z0-9\s-]{3,10}$"));
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| regex(r"<[^>]*>"));
static SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
  regex(r"(?is)<script[^>]*>.*?</script>|javascript:|on\w+\s*=")
});
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| regex(r"\s+"));
static EVENT_HANDLER: LazyLock<Regex> =
  LazyLock::new(|| regex(r"(?i)on\w+\s*="));

const SCRIPT_SIGNATURES: &[&str] = &["<script", "javascript:"];
const SQL_SIGNATURES: &[&str] = &["'; drop", "1=1", "union select", "--"];

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Remove script blocks and event-handler attributes first, then any
/// remaining tags.
fn strip_markup(input: &str) -> String {
  let without_scripts = SCRIPT.replace_all(input, "");
  HTML_TAG.replace_all(&without_scripts, "").into_owned()
}

/// Cut `s` to at most `max` characters.
fn truncate(s: &str, max: usize) -> &str {
  match s.char_indices().nth(max) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}

fn non_blank(input: &str) -> Option<&str> {
  let trimmed = input.trim();
  (!trimmed.is_empty()).then_some(trimmed)
}

// ─── Sanitizers ──────────────────────────────────────────────────────────────

/// General cleanup. Returns `None` when nothing survives.
pub fn sanitize(input: &str) -> Option<String> {
  let stripped = strip_markup(input.trim());
  let collapsed = WHITESPACE.replace_all(&stripped, " ");
  non_blank(&collapsed).map(str::to_owned)
}

/// [`sanitize`] then cap at `max` characters.
pub fn sanitize_name(input: &str, max: usize) -> Option<String> {
  let clean = sanitize(input)?;
  non_blank(truncate(&clean, max)).map(str::to_owned)
}

pub fn sanitize_address(input: &str) -> Option<String> {
  sanitize_name(input, MAX_ADDRESS_LENGTH)
}

pub fn sanitize_city(input: &str) -> Option<String> {
  sanitize_name(input, MAX_CITY_LENGTH)
}

/// Lower-cased address, or `None` if blank, too long, or malformed. Over-long
/// addresses are dropped rather than truncated since a cut address is wrong.
pub fn sanitize_email(input: &str) -> Option<String> {
  let lowered = non_blank(input)?.to_lowercase();
  let clean = strip_markup(&lowered);
  if clean.chars().count() > MAX_EMAIL_LENGTH || !EMAIL.is_match(&clean) {
    return None;
  }
  Some(clean)
}

pub fn sanitize_phone(input: &str) -> Option<String> {
  let clean = strip_markup(non_blank(input)?);
  let clean = truncate(&clean, MAX_PHONE_LENGTH);
  PHONE.is_match(clean).then(|| clean.to_owned())
}

pub fn sanitize_zip_code(input: &str) -> Option<String> {
  let clean = strip_markup(&non_blank(input)?.to_uppercase());
  let clean = truncate(&clean, MAX_ZIP_LENGTH);
  ZIP_CODE.is_match(clean).then(|| clean.to_owned())
}

/// Whether `input` carries a script-injection or SQL-injection signature.
pub fn contains_suspicious_content(input: &str) -> bool {
  let lower = input.to_lowercase();
  SCRIPT_SIGNATURES
    .iter()
    .chain(SQL_SIGNATURES)
    .any(|sig| lower.contains(sig))
    || EVENT_HANDLER.is_match(input)
}
