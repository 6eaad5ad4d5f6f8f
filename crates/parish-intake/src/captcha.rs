//! reCAPTCHA v3 token verification.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_VERIFY_URL: &str =
  "https://www.google.com/recaptcha/api/siteverify";

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
  pub enabled:      bool,
  /// Public key handed to the browser widget.
  pub site_key:     String,
  pub secret_key:   String,
  pub verify_url:   String,
  /// Scores below this are treated as bots.
  pub min_score:    f64,
  pub timeout_secs: u64,
}

impl Default for CaptchaConfig {
  fn default() -> Self {
    Self {
      enabled:      false,
      site_key:     String::new(),
      secret_key:   String::new(),
      verify_url:   DEFAULT_VERIFY_URL.to_owned(),
      min_score:    0.5,
      timeout_secs: 5,
    }
  }
}

impl CaptchaConfig {
  /// Verification runs only when switched on and a secret is configured.
  pub fn is_active(&self) -> bool { self.enabled && !self.secret_key.is_empty() }
}

// ─── Verifier ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CaptchaError {
  #[error("verification request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("verification endpoint returned {0}")]
  Status(StatusCode),
}

/// The verification endpoint's answer.
#[derive(Debug, Clone, Deserialize)]
pub struct Verification {
  pub success:     bool,
  /// Absent on v2 responses, which therefore never pass a score threshold.
  #[serde(default)]
  pub score:       f64,
  #[serde(default)]
  pub action:      Option<String>,
  #[serde(default, rename = "error-codes")]
  pub error_codes: Vec<String>,
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct RecaptchaVerifier {
  client: Client,
  config: CaptchaConfig,
}

impl RecaptchaVerifier {
  pub fn new(config: CaptchaConfig) -> Result<Self, CaptchaError> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, config })
  }

  pub fn site_key(&self) -> &str { &self.config.site_key }

  /// Post `token` to the verification endpoint and return its verdict.
  pub async fn verify(
    &self,
    token: &str,
    remote_ip: &str,
  ) -> Result<Verification, CaptchaError> {
    let mut form = vec![
      ("secret", self.config.secret_key.as_str()),
      ("response", token),
    ];
    if !remote_ip.is_empty() {
      form.push(("remoteip", remote_ip));
    }

    let resp = self
      .client
      .post(&self.config.verify_url)
      .form(&form)
      .send()
      .await?;
    if !resp.status().is_success() {
      return Err(CaptchaError::Status(resp.status()));
    }
    Ok(resp.json().await?)
  }

  /// Whether `token` should be accepted. Transport errors, timeouts, a
  /// negative verdict and a low score all fail closed.
  pub async fn passes(&self, token: &str, remote_ip: &str) -> bool {
    if token.is_empty() {
      warn!("captcha token missing");
      return false;
    }
    match self.verify(token, remote_ip).await {
      Err(e) => {
        warn!(error = %e, "captcha verification error");
        false
      }
      Ok(v) if !v.success => {
        warn!(codes = ?v.error_codes, "captcha verification failed");
        false
      }
      Ok(v) if v.score < self.config.min_score => {
        warn!(
          score = v.score,
          min = self.config.min_score,
          "captcha score below threshold"
        );
        false
      }
      Ok(v) => {
        debug!(score = v.score, action = ?v.action, "captcha verification passed");
        true
      }
    }
  }
}
