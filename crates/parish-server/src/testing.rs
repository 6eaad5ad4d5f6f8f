//! Shared fixtures for the server's unit and router tests.

use std::{path::PathBuf, sync::Arc};

use argon2::{
  Algorithm, Argon2, Params, PasswordHasher, Version, password_hash::SaltString,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use parish_intake::{
  captcha::CaptchaConfig,
  gate::AbuseGate,
  rate_limit::InMemoryRateLimiter,
};
use parish_store_sqlite::SqliteStore;
use rand_core::OsRng;

use crate::{
  AppState, ServerConfig,
  auth::{AuthConfig, ReviewerAccount, Role},
};

pub const PASSWORD: &str = "secret";
pub const PRIEST: &str = "priest@parish.test";
pub const SECRETARY: &str = "secretary@parish.test";
pub const VIEWER: &str = "viewer@parish.test";

/// Cheap parameters; verification reads them back from the PHC string.
pub fn hash(password: &str) -> String {
  let salt = SaltString::generate(&mut OsRng);
  let params = Params::new(1024, 1, 1, None).unwrap();
  Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    .hash_password(password.as_bytes(), &salt)
    .unwrap()
    .to_string()
}

pub fn auth_header(email: &str) -> String {
  format!("Basic {}", B64.encode(format!("{email}:{PASSWORD}")))
}

pub async fn make_state() -> AppState<SqliteStore> {
  let hash = hash(PASSWORD);
  let reviewers = [(PRIEST, Role::Priest), (SECRETARY, Role::Secretary), (VIEWER, Role::Viewer)]
    .into_iter()
    .map(|(email, role)| ReviewerAccount {
      email: email.to_owned(),
      password_hash: hash.clone(),
      role,
    })
    .collect::<Vec<_>>();

  AppState {
    store:  Arc::new(SqliteStore::open_in_memory().await.unwrap()),
    config: Arc::new(ServerConfig {
      host:                    "127.0.0.1".to_string(),
      port:                    8080,
      base_url:                "https://parish.test/".to_string(),
      store_path:              PathBuf::from(":memory:"),
      reviewers:               reviewers.clone(),
      captcha:                 CaptchaConfig::default(),
      rate_limit_cleanup_secs: 600,
    }),
    auth:   Arc::new(AuthConfig { reviewers }),
    gate:   AbuseGate::new(Arc::new(InMemoryRateLimiter::default()), None),
  }
}
