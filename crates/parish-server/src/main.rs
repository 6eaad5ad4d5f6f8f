//! parish-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered with
//! `PARISH__*` environment variables, opens the SQLite store, and serves the
//! public intake form and the review API over HTTP.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for a reviewer's `password_hash`:
//!
//! ```text
//! cargo run -p parish-server -- --hash-password
//! ```

use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use chrono::Utc;
use clap::Parser;
use parish_intake::{
  captcha::RecaptchaVerifier,
  gate::AbuseGate,
  rate_limit::{InMemoryRateLimiter, RateLimiter},
};
use parish_server::{AppState, ServerConfig, auth::AuthConfig};
use parish_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Parish submission intake and review server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = rpassword_or_stdin()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("PARISH")
        .prefix_separator("__")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  if server_cfg.reviewers.is_empty() {
    tracing::warn!("no reviewers configured; the review API will refuse every request");
  }

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Abuse gate: shared limiter plus optional CAPTCHA.
  let limiter: Arc<dyn RateLimiter> = Arc::new(InMemoryRateLimiter::default());
  let captcha = if server_cfg.captcha.is_active() {
    tracing::info!("captcha verification enabled");
    Some(
      RecaptchaVerifier::new(server_cfg.captcha.clone())
        .context("failed to build captcha client")?,
    )
  } else {
    None
  };
  spawn_cleanup(limiter.clone(), server_cfg.rate_limit_cleanup_secs);

  let state = AppState {
    store:  Arc::new(store),
    auth:   Arc::new(AuthConfig { reviewers: server_cfg.reviewers.clone() }),
    gate:   AbuseGate::new(limiter, captcha),
    config: Arc::new(server_cfg.clone()),
  };

  let app = parish_server::router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .await
  .context("server error")?;

  Ok(())
}

/// Periodically drop expired blocks and stale rate-limit buckets.
fn spawn_cleanup(limiter: Arc<dyn RateLimiter>, every_secs: u64) {
  tokio::spawn(async move {
    let mut interval = tokio::time::interval(Duration::from_secs(every_secs.max(1)));
    // The first tick completes immediately.
    interval.tick().await;
    loop {
      interval.tick().await;
      limiter.cleanup(Utc::now());
      tracing::debug!("rate limiter cleanup finished");
    }
  });
}

/// Read a password from stdin (no echo).
fn rpassword_or_stdin() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
